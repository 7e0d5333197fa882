//! Listing and product-page URL construction.
//!
//! The query-parameter layout must match the storefront exactly:
//! `pageNumber` is omitted for page 1 and `filterByLanguage` is only present
//! when a language was explicitly configured.

/// Options applied to a review-listing URL.
#[derive(Debug, Clone, Default)]
pub struct ListingOptions {
    pub language: Option<String>,
    pub sort: Option<String>,
    pub reviewer_type: Option<String>,
}

/// Validates the product-identifier format: exactly 10 ASCII alphanumerics.
#[must_use]
pub fn validate_asin(asin: &str) -> bool {
    asin.len() == 10 && asin.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Builds the review-listing URL for `asin` at `page` (1-based).
#[must_use]
pub fn review_listing_url(domain: &str, asin: &str, page: u32, opts: &ListingOptions) -> String {
    let reviewer_type = opts.reviewer_type.as_deref().unwrap_or("all_reviews");
    let sort = opts.sort.as_deref().unwrap_or("recent");

    let mut url = format!(
        "https://{domain}/product-reviews/{asin}/?reviewerType={reviewer_type}&sortBy={sort}&filterByStar=all_stars"
    );
    if let Some(language) = opts.language.as_deref() {
        url.push_str("&filterByLanguage=");
        url.push_str(language);
    }
    if page > 1 {
        url.push_str("&pageNumber=");
        url.push_str(&page.to_string());
    }
    url
}

/// Builds the stable product-page (`/dp/`) URL used for session warm-up.
#[must_use]
pub fn product_page_url(domain: &str, asin: &str) -> String {
    format!("https://{domain}/dp/{asin}")
}

/// Fields recovered from a pasted storefront URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedListingUrl {
    pub asin: String,
    pub domain: String,
    pub language: Option<String>,
    pub sort: Option<String>,
    pub reviewer_type: Option<String>,
}

/// Parses a review-listing or product (`/dp/`, `/gp/product/`) URL and
/// recovers the asin plus any listing parameters it carries.
///
/// Returns `None` when the URL does not parse or no asin segment is present.
#[must_use]
pub fn parse_listing_url(raw: &str) -> Option<ParsedListingUrl> {
    let url = url::Url::parse(raw).ok()?;
    let domain = url.host_str()?.to_string();
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let asin = asin_from_segments(&segments)?;
    if !validate_asin(asin) {
        return None;
    }

    let mut language = None;
    let mut sort = None;
    let mut reviewer_type = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "filterByLanguage" | "language" | "languageLocale" => {
                language = Some(value.into_owned());
            }
            "sortBy" => sort = Some(value.into_owned()),
            "reviewerType" => reviewer_type = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(ParsedListingUrl {
        asin: asin.to_string(),
        domain,
        language,
        sort,
        reviewer_type,
    })
}

fn asin_from_segments<'a>(segments: &[&'a str]) -> Option<&'a str> {
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "product-reviews" | "dp" => return segments.get(i + 1).copied(),
            "gp" if segments.get(i + 1) == Some(&"product") => {
                return segments.get(i + 2).copied();
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[path = "urls_test.rs"]
mod tests;
