//! Name normalization and fuzzy matching for campaign-finance entities.
//!
//! Decades of filings name the same person three ways: as themselves
//! ("JAY LEFTWICH"), as their committee ("Leftwich for Delegate - Jay"),
//! and surname-first ("LEFTWICH, JAY"). Grouping by raw strings scatters
//! one candidate's money across all three, so every stored name carries a
//! derived canonical key produced here. The key is lossy by design: this
//! is approximate grouping for analysis, not legal identity resolution.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Default similarity score above which two names are treated as the same
/// person. Tunable; callers pass their own threshold to [`is_same_person`].
pub const SAME_PERSON_THRESHOLD: f64 = 0.8;

static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Office phrases recognized in "X FOR <office>" committee names. Closed
/// list: an unrecognized word after FOR means the name is not a campaign
/// committee ("AMERICANS FOR PROSPERITY" stays intact).
const OFFICE_WORDS: &str = "HOUSE OF DELEGATES|DELEGATES|DELEGATE|STATE SENATE|SENATE|SENATOR\
|LIEUTENANT GOVERNOR|LT GOVERNOR|GOVERNOR|ATTORNEY GENERAL|MAYOR|SHERIFF\
|BOARD OF SUPERVISORS|SUPERVISOR|CITY COUNCIL|TOWN COUNCIL|COUNCIL|SCHOOL BOARD\
|TREASURER|CLERK OF COURT|COMMONWEALTH ATTORNEY|COMMISSIONER OF REVENUE|CONGRESS|VIRGINIA|VA";

static LAST_COMMA_FIRST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z'.-]*),\s+([A-Z][A-Z'. -]*)$").unwrap());
static COMMITTEE_TO_ELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^COMMITTEE TO ELECT (.+)$").unwrap());
static FOR_OFFICE_DASHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(.+?)\s+FOR\s+(?:{OFFICE_WORDS})\s*-\s*(.+)$")).unwrap()
});
static FOR_OFFICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(.+?)\s+FOR\s+(?:{OFFICE_WORDS})$")).unwrap());
static FRIENDS_OF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^FRIENDS OF (.+)$").unwrap());
static FOR_OFFICE_INNER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\s+FOR\s+(?:{OFFICE_WORDS})\b")).unwrap());

static PAC_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bPOLITICAL\s+ACTION\s+COMMITTEE\b").unwrap());
static ASSOCIATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bASSOCIATION\b").unwrap());
static ASSN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bASSN\b").unwrap());
static VIRGINIA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bVIRGINIA\b").unwrap());
static HIGHWAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bHIGHWAY\b").unwrap());

/// Trailing decoration words dropped one at a time from the end of a name.
const TRAILING_WORDS: &[&str] = &["PAC", "INC", "LLC", "CORP", "LTD", "COMMITTEE", "CAMPAIGN"];

/// Corporate-suffix tokens that disqualify the "LAST, FIRST" restructuring;
/// "DOMINION ENERGY, INC." is a company, not a surname-first person.
const CORPORATE_TOKENS: &[&str] = &["INC", "LLC", "LTD", "CORP", "CO", "PC", "PLLC", "PAC"];

/// Filings for Dominion's PAC alone spell the donor three dozen ways; these
/// are the cleaned-up forms left over after the generic stages, folded to a
/// single canonical key.
const DOMINION_EXACT: &[&str] = &[
    "DOMINION",
    "DOMINION POWER",
    "DOMINION VA POWER",
    "DOMINION RESOURCES",
    "DOMINION EMPLOYEES",
    "DOMINIONENERGY",
    "DOMINION ENGERGY",
];
const CLEAN_VA_EXACT: &[&str] = &["CLEAN VA", "CLEAN VA FUND", "CLEAN VA ACTION FUND"];

/// Canonicalizes a raw name into a stable grouping key.
///
/// Total and deterministic: any string input (including empty) yields a
/// result without panicking, and `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let mut current = SPACES.replace_all(&trimmed.to_uppercase(), " ").into_owned();
    // Punctuation can mask a framing phrase ("FRIENDS OF, X") until the
    // literal stages remove it, so the whole pass repeats to a fixed point.
    // A repeated pass can only shorten the name, so this terminates.
    loop {
        let next = normalize_pass(&current);
        if next == current {
            break;
        }
        current = next;
    }
    fold_aliases(&current)
}

fn normalize_pass(name: &str) -> String {
    let mut result = restructure(name);

    // Unconditional literal replacements; order among these does not matter.
    result = result
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | '\'' | '\u{2019}' | '"' | '(' | ')'))
        .collect();
    result = FOR_OFFICE_INNER.replace_all(&result, "").into_owned();
    result = PAC_PHRASE.replace_all(&result, "PAC").into_owned();
    result = ASSOCIATION.replace_all(&result, "ASSOC").into_owned();
    result = ASSN.replace_all(&result, "ASSOC").into_owned();
    result = VIRGINIA.replace_all(&result, "VA").into_owned();
    result = HIGHWAY.replace_all(&result, "HWY").into_owned();
    result = strip_trailing_words(&result);

    SPACES.replace_all(result.trim(), " ").into_owned()
}

/// Converts legal-entity framings back to the candidate's own name.
///
/// Patterns are tried in priority order, first match wins. Nested framings
/// ("COMMITTEE TO ELECT SMITH, JOHN") re-enter the list until no pattern
/// applies; every pattern strictly shortens its input, so this terminates
/// and keeps the full pipeline idempotent.
fn restructure(name: &str) -> String {
    let mut current = name.to_string();
    loop {
        let next = restructure_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn restructure_once(name: &str) -> String {
    if let Some(caps) = LAST_COMMA_FIRST.captures(name) {
        let last = &caps[1];
        let first = &caps[2];
        let lead = first
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_end_matches('.');
        if !CORPORATE_TOKENS.contains(&lead) {
            return format!("{first} {last}");
        }
        return name.to_string();
    }
    if let Some(caps) = COMMITTEE_TO_ELECT.captures(name) {
        return caps[1].to_string();
    }
    if let Some(caps) = FOR_OFFICE_DASHED.captures(name) {
        return format!("{} {}", &caps[2], &caps[1]);
    }
    if let Some(caps) = FOR_OFFICE.captures(name) {
        return caps[1].to_string();
    }
    if let Some(caps) = FRIENDS_OF.captures(name) {
        return caps[1].to_string();
    }
    name.to_string()
}

fn strip_trailing_words(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    while let Some(last) = tokens.last() {
        if TRAILING_WORDS.contains(last) && tokens.len() > 1 {
            tokens.pop();
        } else {
            break;
        }
    }
    tokens.join(" ")
}

/// Political, honorific, military, and professional titles stripped from
/// person names. Longer alternatives come first so "LIEUTENANT GOVERNOR"
/// wins over "LT". Family suffixes (JR, III) are deliberately absent; they
/// distinguish people and are kept by [`extract_first_last`].
static TITLES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:THE HONORABLE|HONORABLE|HON|LIEUTENANT GOVERNOR|LIEUT GOV|LT GOV",
        r"|ATTORNEY GENERAL|DELEGATE|DEL|SENATOR|SEN|GOVERNOR|GOV|MAYOR|SHERIFF",
        r"|MRS|MR|MS|MISS|DOCTOR|DR|PROFESSOR|PROF|REVEREND|REV",
        r"|CAPTAIN|CAPT|COLONEL|COL|MAJOR|MAJ|LIEUTENANT|LT|GENERAL|GEN|ESQUIRE|ESQ)\b",
    ))
    .unwrap()
});

/// Family suffixes kept (not dropped) when shortening to first/last.
const NAME_SUFFIXES: &[&str] = &["JR", "SR", "III", "IV", "V", "JUNIOR", "SENIOR"];

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Canonical key for a person, stricter than [`normalize`]: titles and
/// honorifics are stripped and the name is shortened to first + last
/// (+ family suffix), so "Hon. Mary Ann Smith" and "SMITH, MARY" converge.
pub fn normalize_person(name: &str) -> String {
    let mut result = normalize(name);
    result = TITLES.replace_all(&result, " ").into_owned();
    result = SPACES.replace_all(result.trim(), " ").into_owned();
    extract_first_last(&result)
}

/// First and last name only, dropping middle names/initials. Hyphens fold
/// to spaces so hyphenated and unhyphenated spellings match; family
/// suffixes are re-appended after the last name. Names with fewer than two
/// non-suffix tokens come back unchanged.
pub fn extract_first_last(name: &str) -> String {
    let dehyphenated = name.replace('-', " ");
    let mut names: Vec<&str> = Vec::new();
    let mut suffixes: Vec<&str> = Vec::new();
    for token in dehyphenated.split_whitespace() {
        if NAME_SUFFIXES.contains(&token) {
            suffixes.push(token);
        } else {
            names.push(token);
        }
    }
    if names.len() < 2 {
        return name.to_string();
    }

    let mut parts = vec![names[0], names[names.len() - 1]];
    parts.extend(suffixes);
    parts.join(" ")
}

/// Folds the free-text `office_sought` field to a standard category
/// (lowercase), so "HOD", "House of Delegates" and "Delegate - 78th"
/// all become "delegate". Unrecognized offices come back cleaned but
/// unmapped.
pub fn normalize_office(office: &str) -> String {
    let office = office.trim().to_lowercase();
    if office.is_empty() {
        return String::new();
    }

    // District decorations ride along after a dash or as a county phrase.
    let mut clean = match office.split_once('-') {
        Some((head, _)) => head.to_string(),
        None => office,
    };
    for phrase in [
        "prince william county",
        "blue ridge district",
        "arlington county",
        "at large",
    ] {
        clean = clean.replace(phrase, "");
    }
    let clean = SPACES.replace_all(clean.trim(), " ").into_owned();

    let has = |needle: &str| clean.contains(needle);
    match clean.as_str() {
        "hod" | "h.o.d." => return "delegate".to_string(),
        "ag" | "a.g." => return "attorney general".to_string(),
        "gov" | "governor" => return "governor".to_string(),
        _ => {}
    }
    if ["lt gov", "lt. gov", "lieutenant gov", "lieut gov", "lieu gov"]
        .iter()
        .any(|abbrev| has(abbrev))
    {
        "lieutenant governor".to_string()
    } else if has("delegate") || has("hod") {
        "delegate".to_string()
    } else if has("senator") || has("senate") {
        "senator".to_string()
    } else if has("governor") && !has("lieutenant") && !has("lt") {
        "governor".to_string()
    } else if has("attorney") && has("general") {
        "attorney general".to_string()
    } else if has("treasurer") {
        "treasurer".to_string()
    } else if has("secretary") && has("commonwealth") {
        "secretary of the commonwealth".to_string()
    } else if (has("supervisor") || has("county board")) && (has("chair") || has("chairman")) {
        "chair board of supervisors".to_string()
    } else if (has("member") && has("board") && !has("school"))
        || has("supervisor")
        || has("county board")
    {
        "member board of supervisors".to_string()
    } else if has("school") && has("board") && (has("chair") || has("chairman")) {
        "chair school board".to_string()
    } else if has("school") && has("board") {
        "school board".to_string()
    } else if has("city council") || has("town council") {
        "city council".to_string()
    } else if has("mayor") {
        "mayor".to_string()
    } else if has("sheriff") {
        "sheriff".to_string()
    } else if has("clerk") && has("court") {
        "clerk of court".to_string()
    } else if has("commonwealth") && has("attorney") {
        "commonwealth attorney".to_string()
    } else {
        clean
    }
}

/// Reduces a district to its number with no leading zeros ("District 078"
/// becomes "78"); at-large seats become "0". Districts with no number come
/// back trimmed but otherwise untouched.
pub fn normalize_district(district: &str) -> String {
    let trimmed = district.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    if ["at large", "at-large", "atlarge"]
        .iter()
        .any(|term| lower.contains(term))
    {
        return "0".to_string();
    }
    if let Some(found) = DIGITS.find(trimmed) {
        let digits = found.as_str().trim_start_matches('0');
        return if digits.is_empty() {
            "0".to_string()
        } else {
            digits.to_string()
        };
    }
    trimmed.to_string()
}

fn fold_aliases(name: &str) -> String {
    if DOMINION_EXACT.contains(&name)
        || name.starts_with("DOMINION ENERGY")
        || name.starts_with("DOMINION PAC")
        || name.starts_with("DOMINION POLITICAL")
    {
        return "DOMINION ENERGY".to_string();
    }
    if CLEAN_VA_EXACT.contains(&name) {
        return "CLEAN VA FUND".to_string();
    }
    name.to_string()
}

/// Similarity between two names in `[0, 1]`: 1.0 for identical normalized
/// forms, otherwise `1 - edit_distance / longer_length`. Returns 0.0 when
/// exactly one side normalizes to empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let na = normalize(a);
    let nb = normalize(b);
    if na == nb {
        return 1.0;
    }
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    let longer = na.chars().count().max(nb.chars().count());
    let distance = strsim::levenshtein(&na, &nb);
    1.0 - distance as f64 / longer as f64
}

/// Whether two names score at or above `threshold` (see
/// [`SAME_PERSON_THRESHOLD`] for the conventional default).
pub fn is_same_person(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}

/// Spellings worth probing when fuzzy-searching for `name`: the canonical
/// key, the raw upper-cased form, and shortened first/last variants. Seeds
/// candidate lists only; never stored.
pub fn variations(name: &str) -> BTreeSet<String> {
    let mut set = BTreeSet::new();
    let normalized = normalize(name);
    if normalized.is_empty() {
        return set;
    }

    let raw_upper = SPACES
        .replace_all(&name.trim().to_uppercase(), " ")
        .into_owned();
    if raw_upper != normalized {
        set.insert(raw_upper);
    }

    let tokens: Vec<&str> = normalized
        .split_whitespace()
        .filter(|token| !NAME_SUFFIXES.contains(token))
        .collect();
    if tokens.len() >= 3 {
        set.insert(format!("{} {}", tokens[0], tokens[tokens.len() - 1]));
    }
    if tokens.len() >= 2 {
        if let Some(initial) = tokens[0].chars().next() {
            set.insert(format!("{} {}", initial, tokens[tokens.len() - 1]));
        }
    }
    set.insert(normalized);
    set
}
