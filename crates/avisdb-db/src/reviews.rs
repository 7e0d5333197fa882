//! Database operations for the `reviews` table: idempotent ingestion with
//! two-tier identity resolution and offline duplicate collapse.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use avisdb_core::review::is_native_review_id;
use avisdb_core::ReviewDraft;

use crate::DbError;

/// A row from the `reviews` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub asin: String,
    pub review_id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub rating: Option<f64>,
    /// Normalized `YYYY-MM-DD`, or `NULL` when the source date was unparseable.
    pub review_date: Option<String>,
    pub verified_purchase: bool,
    pub helpful_votes: i64,
    pub reviewer_name: Option<String>,
    pub variant: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persists `drafts` for `asin`, returning how many rows were actually
/// inserted. Rejected inserts are duplicates, not errors.
///
/// Identity is resolved in two tiers:
/// 1. A platform-native `review_id` is authoritative: the insert is skipped
///    when a row with that exact id exists. The UNIQUE index on `review_id`
///    backstops the check; a constraint violation is also counted as a
///    duplicate.
/// 2. A generated id falls back to content equivalence: the insert is
///    skipped when a row exists with identical trimmed `(asin, title, body)`,
///    and identical `review_date` when the draft carries one. This tier has
///    no storage-level constraint; under concurrent writers it can race
///    (known gap, see DESIGN.md).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any storage failure other than a `review_id`
/// uniqueness violation.
pub async fn save_reviews(
    pool: &SqlitePool,
    asin: &str,
    drafts: &[ReviewDraft],
) -> Result<u64, DbError> {
    let mut inserted = 0u64;

    for draft in drafts {
        let review_id = draft.review_id.trim();
        if review_id.is_empty() {
            tracing::warn!(asin, "skipping draft with empty review id");
            continue;
        }

        let title = draft.title.as_deref().map(str::trim).unwrap_or_default();
        let body = draft.body.as_deref().map(str::trim).unwrap_or_default();
        let date = draft
            .review_date
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();

        if is_native_review_id(review_id) {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM reviews WHERE review_id = ?)")
                    .bind(review_id)
                    .fetch_one(pool)
                    .await?;
            if exists {
                tracing::debug!(asin, review_id, "duplicate review (native id match)");
                continue;
            }
        } else {
            let exists: bool = if date.is_empty() {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM reviews \
                     WHERE asin = ? \
                       AND TRIM(COALESCE(title, '')) = ? \
                       AND TRIM(COALESCE(body, '')) = ?)",
                )
                .bind(asin)
                .bind(title)
                .bind(body)
                .fetch_one(pool)
                .await?
            } else {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM reviews \
                     WHERE asin = ? \
                       AND TRIM(COALESCE(title, '')) = ? \
                       AND TRIM(COALESCE(body, '')) = ? \
                       AND TRIM(COALESCE(review_date, '')) = ?)",
                )
                .bind(asin)
                .bind(title)
                .bind(body)
                .bind(date)
                .fetch_one(pool)
                .await?
            };
            if exists {
                tracing::debug!(asin, review_id, "duplicate review (content equivalence)");
                continue;
            }
        }

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO reviews \
                 (asin, review_id, title, body, rating, review_date, verified_purchase, \
                  helpful_votes, reviewer_name, variant, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(asin)
        .bind(review_id)
        .bind(&draft.title)
        .bind(&draft.body)
        .bind(draft.rating)
        .bind(&draft.review_date)
        .bind(draft.verified_purchase)
        .bind(draft.helpful_votes)
        .bind(&draft.reviewer_name)
        .bind(&draft.variant)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await;

        match result {
            Ok(_) => inserted += 1,
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!(asin, review_id, "duplicate review (unique constraint)");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(inserted)
}

/// Lists reviews for one product, newest review date first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reviews_for_asin(
    pool: &SqlitePool,
    asin: &str,
    limit: Option<i64>,
) -> Result<Vec<ReviewRow>, DbError> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        "SELECT * FROM reviews WHERE asin = ? \
         ORDER BY review_date DESC, id DESC \
         LIMIT ?",
    )
    .bind(asin)
    .bind(limit.unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Lists all stored reviews, most recently inserted first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_all_reviews(
    pool: &SqlitePool,
    limit: Option<i64>,
) -> Result<Vec<ReviewRow>, DbError> {
    let rows = sqlx::query_as::<_, ReviewRow>(
        "SELECT * FROM reviews ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit.unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Counts stored reviews for one product.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_reviews_for_asin(pool: &SqlitePool, asin: &str) -> Result<i64, DbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE asin = ?")
        .bind(asin)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Deletes every review stored for `asin`, returning the number of rows
/// removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_reviews_for_asin(pool: &SqlitePool, asin: &str) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM reviews WHERE asin = ?")
        .bind(asin)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Outcome of a [`dedupe_reviews`] pass.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DedupeReport {
    /// Rows identified as redundant within their content group.
    pub candidates: usize,
    /// Rows actually deleted (`0` on a dry run).
    pub deleted: u64,
}

/// Collapses duplicate rows sharing trimmed `(asin, title, body, review_date)`.
///
/// Within each group exactly one survivor is kept: a row bearing a
/// platform-native `review_id` wins over one with a generated id; among
/// equally qualified rows the earliest `created_at` wins, then the lowest
/// primary key for a total order. With `apply == false` nothing is deleted
/// and only the candidate count is reported.
///
/// Idempotent: a second consecutive applied run deletes zero rows.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if reading or deleting fails.
pub async fn dedupe_reviews(pool: &SqlitePool, apply: bool) -> Result<DedupeReport, DbError> {
    #[derive(sqlx::FromRow)]
    struct Candidate {
        id: i64,
        asin: String,
        review_id: String,
        title: Option<String>,
        body: Option<String>,
        review_date: Option<String>,
        created_at: DateTime<Utc>,
    }

    let rows = sqlx::query_as::<_, Candidate>(
        "SELECT id, asin, review_id, title, body, review_date, created_at \
         FROM reviews ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    let mut survivors: std::collections::HashMap<(String, String, String, String), &Candidate> =
        std::collections::HashMap::new();
    let mut to_delete: Vec<i64> = Vec::new();

    // `prefer` returns true when `a` should survive over `b`.
    let prefer = |a: &Candidate, b: &Candidate| -> bool {
        let a_native = is_native_review_id(a.review_id.trim());
        let b_native = is_native_review_id(b.review_id.trim());
        if a_native != b_native {
            return a_native;
        }
        if a.created_at != b.created_at {
            return a.created_at < b.created_at;
        }
        a.id < b.id
    };

    for row in &rows {
        let key = (
            row.asin.trim().to_string(),
            row.title.as_deref().map(str::trim).unwrap_or_default().to_string(),
            row.body.as_deref().map(str::trim).unwrap_or_default().to_string(),
            row.review_date
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
        );
        match survivors.entry(key) {
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(row);
            }
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                if prefer(row, slot.get()) {
                    to_delete.push(slot.get().id);
                    slot.insert(row);
                } else {
                    to_delete.push(row.id);
                }
            }
        }
    }

    let candidates = to_delete.len();
    if !apply || to_delete.is_empty() {
        return Ok(DedupeReport {
            candidates,
            deleted: 0,
        });
    }

    let mut tx = pool.begin().await?;
    let mut deleted = 0u64;
    for id in &to_delete {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        deleted += result.rows_affected();
    }
    tx.commit().await?;

    tracing::info!(candidates, deleted, "dedupe pass complete");
    Ok(DedupeReport {
        candidates,
        deleted,
    })
}
