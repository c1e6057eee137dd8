//! Pattern-based parsing of plain-English questions into query parameters.
//!
//! A small, ordered template list; the first matching template wins and
//! anything unmatched returns `None` for the caller to handle. This layer
//! only extracts parameters, it never runs queries itself.

use std::sync::LazyLock;

use regex::Regex;

/// A recognized question, shaped as façade-call parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedQuestion {
    CandidateSpending {
        candidate: String,
        year: Option<i32>,
    },
    TopContributors {
        candidate: Option<String>,
        year: Option<i32>,
        top_n: i64,
    },
    EntitySearch {
        entity: String,
        year: Option<i32>,
    },
    CandidateSearch {
        term: String,
    },
    Stats,
}

const DEFAULT_TOP_N: i64 = 10;

static SPENDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^how much did (.+?) spend(?: in (\d{4}))?\s*\??$").unwrap()
});
static GAVE_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^who (?:donated|gave|contributed)(?: money)? to (.+?)(?: in (\d{4}))?\s*\??$")
        .unwrap()
});
static TOP_DONORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:show (?:me )?)?top (?:(\d+) )?(?:contributors|donors)(?: in (\d{4}))?\s*\??$")
        .unwrap()
});
static RECEIVED_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^who received money from (.+?)(?: in (\d{4}))?\s*\??$").unwrap()
});
static FIND_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:find|search for) candidate (.+?)\s*\??$").unwrap()
});
static STATS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:show (?:me )?)?(?:database )?(?:stats|statistics|summary)\s*\??$").unwrap()
});

fn year_capture(caps: &regex::Captures<'_>, index: usize) -> Option<i32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

/// Matches a question against the template list, first match wins.
pub fn parse_question(question: &str) -> Option<ParsedQuestion> {
    let question = question.trim();

    if let Some(caps) = SPENDING.captures(question) {
        return Some(ParsedQuestion::CandidateSpending {
            candidate: caps[1].to_string(),
            year: year_capture(&caps, 2),
        });
    }
    if let Some(caps) = GAVE_TO.captures(question) {
        return Some(ParsedQuestion::TopContributors {
            candidate: Some(caps[1].to_string()),
            year: year_capture(&caps, 2),
            top_n: DEFAULT_TOP_N,
        });
    }
    if let Some(caps) = TOP_DONORS.captures(question) {
        let top_n = caps
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(DEFAULT_TOP_N);
        return Some(ParsedQuestion::TopContributors {
            candidate: None,
            year: year_capture(&caps, 2),
            top_n,
        });
    }
    if let Some(caps) = RECEIVED_FROM.captures(question) {
        return Some(ParsedQuestion::EntitySearch {
            entity: caps[1].to_string(),
            year: year_capture(&caps, 2),
        });
    }
    if let Some(caps) = FIND_CANDIDATE.captures(question) {
        return Some(ParsedQuestion::CandidateSearch {
            term: caps[1].to_string(),
        });
    }
    if STATS.is_match(question) {
        return Some(ParsedQuestion::Stats);
    }
    None
}
