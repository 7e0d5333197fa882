use serde::{Deserialize, Serialize};

/// A review extracted from one listing-page block, normalized and carrying a
/// resolved identity, but not yet tagged with a product or persisted.
///
/// ## Identity
/// `review_id` is either the platform-native id (shaped like `R…`) or a
/// deterministic `generated_` content hash when no native id could be
/// extracted. Either way it is unique per product once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDraft {
    pub review_id: String,
    /// Whitespace-collapsed title; `None` when the block carried no title.
    pub title: Option<String>,
    /// Whitespace-collapsed body text.
    pub body: Option<String>,
    /// Star rating in `[1.0, 5.0]`; out-of-range or unparseable text is `None`.
    pub rating: Option<f64>,
    /// Normalized `YYYY-MM-DD` calendar date.
    pub review_date: Option<String>,
    pub verified_purchase: bool,
    pub helpful_votes: i64,
    pub reviewer_name: Option<String>,
    /// Purchased variant description, e.g. `"Couleur: Noir"`.
    pub variant: Option<String>,
}

impl ReviewDraft {
    /// Returns `true` if the draft's id is a platform-native review id rather
    /// than a generated content hash.
    #[must_use]
    pub fn has_native_id(&self) -> bool {
        is_native_review_id(&self.review_id)
    }
}

/// Whether `id` has the platform-native review-id shape: an `R` followed by
/// at least six uppercase alphanumerics.
#[must_use]
pub fn is_native_review_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix('R') else {
        return false;
    };
    rest.len() >= 6
        && rest
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}
