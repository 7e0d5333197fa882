//! Normalizers that turn scraped text fragments into canonical field values.
//!
//! Every function here is total: malformed input yields `None` (or a neutral
//! default), never an error, so one odd review cannot take down a page.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Collapses runs of whitespace to single spaces and strips control
/// characters.
pub fn clean_text(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

static RATING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\d+[.,]\d+)\s*sur\s*5",
        r"(\d+[.,]\d+)",
        r"(\d+)\s*sur\s*5",
        r"(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Extracts a star rating from text such as `"4,0 sur 5 étoiles"`.
///
/// Patterns are tried most-specific first; a candidate outside `1.0..=5.0`
/// falls through to the next pattern rather than being clamped.
pub fn normalize_rating(raw: &str) -> Option<f64> {
    for pattern in RATING_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(raw) {
            if let Ok(candidate) = caps[1].replace(',', ".").parse::<f64>() {
                if (1.0..=5.0).contains(&candidate) {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

static LEADING_STARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+([.,]\d+)?\s*sur\s*5(\s*étoiles)?\s*").unwrap()
});

/// Drops the star phrase Amazon nests inside the title element, so
/// `"4,0 sur 5 étoiles Très bon"` becomes `"Très bon"`.
pub fn strip_rating_prefix(title: &str) -> String {
    LEADING_STARS.replace(title, "").trim().to_string()
}

static WORD_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})\s+(\p{L}+)\s+(\d{4})").unwrap());
static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

fn month_number(name: &str) -> Option<u32> {
    let n = match name {
        "janvier" => 1,
        "février" | "fevrier" => 2,
        "mars" => 3,
        "avril" => 4,
        "mai" => 5,
        "juin" => 6,
        "juillet" => 7,
        "août" | "aout" => 8,
        "septembre" => 9,
        "octobre" => 10,
        "novembre" => 11,
        "décembre" | "decembre" => 12,
        _ => return None,
    };
    Some(n)
}

fn iso_if_valid(year: i32, month: u32, day: u32) -> Option<String> {
    // Rejects impossible calendar dates such as 32 janvier.
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Parses a review date into ISO `YYYY-MM-DD`.
///
/// Handles the localized form (`"le 15 janvier 2024"`, with or without the
/// leading article), `DD/MM/YYYY`, and already-ISO input. Anything else,
/// including calendar-impossible dates, yields `None`.
pub fn normalize_date(raw: &str) -> Option<String> {
    let text = raw.to_lowercase();
    if let Some(caps) = WORD_DATE.captures(&text) {
        if let (Ok(day), Some(month), Ok(year)) = (
            caps[1].parse::<u32>(),
            month_number(&caps[2]),
            caps[3].parse::<i32>(),
        ) {
            return iso_if_valid(year, month, day);
        }
    }
    if let Some(caps) = SLASH_DATE.captures(&text) {
        if let (Ok(day), Ok(month), Ok(year)) = (
            caps[1].parse::<u32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<i32>(),
        ) {
            return iso_if_valid(year, month, day);
        }
    }
    if let Some(caps) = ISO_DATE.captures(&text) {
        if let (Ok(year), Ok(month), Ok(day)) = (
            caps[1].parse::<i32>(),
            caps[2].parse::<u32>(),
            caps[3].parse::<u32>(),
        ) {
            return iso_if_valid(year, month, day);
        }
    }
    None
}

static VOTES_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(\d+)\s+personnes?\s+ont\s+trouvé",
        r"(\d+)\s+people\s+found",
        r"(\d+)\s+personne",
        r"(\d+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Extracts a helpful-vote count, defaulting to 0 when no number is present.
/// The phrasing "Une personne a trouvé..." counts as one vote.
pub fn normalize_helpful_votes(raw: &str) -> i64 {
    let text = raw.to_lowercase();
    for pattern in VOTES_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&text) {
            if let Ok(n) = caps[1].parse::<i64>() {
                return n.max(0);
            }
        }
    }
    if text.contains("une personne") || text.contains("one person") {
        return 1;
    }
    0
}

const VERIFIED_INDICATORS: &[&str] = &["achat vérifié", "verified purchase", "vérifié", "verified"];

/// Whether badge text marks the review as a verified purchase.
pub fn normalize_verified_purchase(raw: &str) -> bool {
    let text = raw.to_lowercase();
    VERIFIED_INDICATORS.iter().any(|i| text.contains(i))
}

static PERMALINK_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"reviews/([A-Z0-9]{6,})").unwrap());

/// Pulls a review id out of a permalink path such as
/// `/gp/customer-reviews/R1ABCDEF/...`.
pub fn review_id_from_permalink(href: &str) -> Option<String> {
    PERMALINK_ID
        .captures(href)
        .map(|caps| caps[1].to_string())
}

/// Deterministic fallback identity for reviews whose native id is not in
/// the DOM. Built over the cleaned title and body so re-scrapes of the same
/// review always collide.
pub fn fallback_review_id(title: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(body.as_bytes());
    format!("generated_{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
