//! CSS selectors for the review listing DOM, ordered most-specific first.

/// Strategies for locating review blocks. The first one that matches at
/// least one element on the page wins for that page.
pub const REVIEW_BLOCKS: &[&str] = &[
    "[data-hook=\"review\"]",
    "#cm_cr-review_list [data-hook=\"review\"]",
    "div#cm_cr-review_list div[data-hook=\"review\"]",
    "[id^=\"customer_review-\"]",
    "div[data-hook*=\"review\"]",
    "div.a-section.review.aok-relative",
];

/// Field selectors, scoped to a single review block.
pub const TITLE: &str = "[data-hook=\"review-title\"]";
pub const BODY: &str = "[data-hook=\"review-body\"]";
pub const RATING: &str = "[data-hook=\"review-star-rating\"], [data-hook=\"cmps-review-star-rating\"]";
pub const DATE: &str = "[data-hook=\"review-date\"]";
pub const VERIFIED_BADGE: &str = "[data-hook=\"avp-badge\"]";
pub const HELPFUL_VOTES: &str = "[data-hook=\"helpful-vote-statement\"]";
pub const REVIEWER_NAME: &str = ".a-profile-name";
pub const VARIANT: &str = "[data-hook=\"format-strip\"]";

/// Nested element carrying the native review id when the block itself lacks one.
pub const NESTED_ID: &str = "[id^=\"customer_review-\"]";
pub const NESTED_ID_PREFIX: &str = "customer_review-";

/// Permalink anchors embedding the review id in their path.
pub const PERMALINK: &str = "a[href*=\"/customer-reviews/\"], a[href*=\"/reviews/\"]";

/// Next-page controls, tried in order. A control inside `li.a-disabled` is
/// skipped by the click implementation.
pub const NEXT_PAGE: &[&str] = &[
    "ul.a-pagination li.a-last a",
    "li.a-last a",
    "a[aria-label*=\"Suivant\"]",
    "a[aria-label*=\"Next\"]",
    "ul.a-pagination a[href*=\"pageNumber=\"]",
];

/// Element whose presence signals the listing finished rendering.
pub const LISTING_READY: &str = "#cm_cr-review_list, [data-hook=\"review\"]";

/// Consent banner dismissal buttons, tried in order after navigation.
pub const COOKIE_BANNERS: &[&str] = &[
    "#sp-cc-accept",
    "input[name=\"accept\"]",
    "#a-autoid-0",
];
