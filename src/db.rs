use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::PersistenceError;
use crate::models::review::{
    next_timestamp, timestamp_now, NewReview, Rating, Review, ReviewUpdate,
};


const REVIEW_COLUMNS: &str = "id, service_id, user_id, rating, comment, created_at, updated_at";

/// Handle to the review store. Cloning shares the same connection.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    // Open a connection; ":memory:" gives a private in-memory store
    pub fn new(db_path: &str) -> Result<Self, PersistenceError> {
        let conn = Connection::open(db_path)?;
        info!("[DB] Connection established at: {}", db_path);
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open(config: &StoreConfig) -> Result<Self, PersistenceError> {
        Self::new(&config.database_path)
    }

    /// Creates the `reviews` table and its lookup indexes if they are missing.
    pub async fn create_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().await;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS reviews (
                id TEXT PRIMARY KEY,
                service_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                rating REAL NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(|e| {
            warn!("[DB] Failed creating reviews table: {}", e);
            e
        })?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_reviews_service_id ON reviews (service_id);
            CREATE INDEX IF NOT EXISTS idx_reviews_user_id ON reviews (user_id);",
        )
        .map_err(|e| {
            warn!("[DB] Failed creating review indexes: {}", e);
            e
        })?;

        debug!("[DB] Review schema ready");
        Ok(())
    }

    /// First write of a review: assigns the id and both timestamps.
    pub async fn create_review(&self, review: &NewReview) -> Result<Review, PersistenceError> {
        let now = timestamp_now();
        let stored = Review {
            id: ObjectId::new(),
            service_id: review.service_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO reviews (id, service_id, user_id, rating, comment, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                stored.id.to_hex(),
                stored.service_id.to_hex(),
                stored.user_id.to_hex(),
                f64::from(stored.rating),
                &stored.comment,
                encode_timestamp(&stored.created_at),
                encode_timestamp(&stored.updated_at),
            ],
        )?;

        info!(
            review_id = %stored.id,
            service_id = %stored.service_id,
            user_id = %stored.user_id,
            "[DB] Review created"
        );
        Ok(stored)
    }

    pub async fn get_review(&self, id: &ObjectId) -> Result<Option<Review>, PersistenceError> {
        let conn = self.conn.lock().await;
        let review = fetch_review(&conn, id)?;
        debug!("[DB] Lookup of review {}: found={}", id, review.is_some());
        Ok(review)
    }

    /// Whole-document write of an existing review.
    ///
    /// `created_at` always comes from the stored row, whatever the caller
    /// passes. `updated_at` moves strictly forward.
    pub async fn save_review(&self, review: &Review) -> Result<Review, PersistenceError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let existing = match fetch_review(&tx, &review.id)? {
            Some(existing) => existing,
            None => {
                warn!("[DB] Save of missing review {}", review.id);
                return Err(PersistenceError::NotFound(review.id));
            }
        };

        let saved = Review {
            created_at: existing.created_at,
            updated_at: next_timestamp(existing.updated_at),
            ..review.clone()
        };
        write_review(&tx, &saved)?;
        tx.commit()?;

        info!(review_id = %saved.id, "[DB] Review saved");
        Ok(saved)
    }

    /// Applies a partial edit to the stored review and returns the result.
    pub async fn update_review(
        &self,
        id: &ObjectId,
        update: &ReviewUpdate,
    ) -> Result<Review, PersistenceError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let mut review = match fetch_review(&tx, id)? {
            Some(review) => review,
            None => {
                warn!("[DB] Update of missing review {}", id);
                return Err(PersistenceError::NotFound(*id));
            }
        };

        review.apply(update);
        review.updated_at = next_timestamp(review.updated_at);
        write_review(&tx, &review)?;
        tx.commit()?;

        info!(review_id = %id, "[DB] Review updated");
        Ok(review)
    }

    pub async fn delete_review(&self, id: &ObjectId) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM reviews WHERE id = ?1", [id.to_hex()])?;
        if deleted == 0 {
            warn!("[DB] Delete of missing review {}", id);
            return Err(PersistenceError::NotFound(*id));
        }
        info!(review_id = %id, "[DB] Review deleted");
        Ok(())
    }

    /// Reviews of one service, oldest first.
    pub async fn reviews_for_service(
        &self,
        service_id: &ObjectId,
    ) -> Result<Vec<Review>, PersistenceError> {
        self.reviews_where("service_id", service_id).await
    }

    /// Reviews written by one user, oldest first.
    pub async fn reviews_by_user(&self, user_id: &ObjectId) -> Result<Vec<Review>, PersistenceError> {
        self.reviews_where("user_id", user_id).await
    }

    // `column` is always one of the fixed reference columns above
    async fn reviews_where(
        &self,
        column: &'static str,
        id: &ObjectId,
    ) -> Result<Vec<Review>, PersistenceError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews
            WHERE {column} = ?1
            ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map([id.to_hex()], ReviewRow::from_row)?;

        let mut reviews = Vec::new();
        for row in rows {
            reviews.push(Review::try_from(row?)?);
        }
        debug!("[DB] Fetched {} reviews by {} {}", reviews.len(), column, id);
        Ok(reviews)
    }
}

fn fetch_review(conn: &Connection, id: &ObjectId) -> Result<Option<Review>, PersistenceError> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1"),
        [id.to_hex()],
        ReviewRow::from_row,
    )
    .optional()?
    .map(Review::try_from)
    .transpose()
}

fn write_review(conn: &Connection, review: &Review) -> Result<(), PersistenceError> {
    conn.execute(
        "UPDATE reviews
        SET service_id = ?2, user_id = ?3, rating = ?4, comment = ?5, updated_at = ?6
        WHERE id = ?1",
        params![
            review.id.to_hex(),
            review.service_id.to_hex(),
            review.user_id.to_hex(),
            f64::from(review.rating),
            &review.comment,
            encode_timestamp(&review.updated_at),
        ],
    )?;
    Ok(())
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// A review row as stored, before any of its columns are checked
#[derive(Debug)]
struct ReviewRow {
    id: String,
    service_id: String,
    user_id: String,
    rating: f64,
    comment: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ReviewRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ReviewRow {
            id: row.get(0)?,
            service_id: row.get(1)?,
            user_id: row.get(2)?,
            rating: row.get(3)?,
            comment: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn corrupt(&self, reason: impl std::fmt::Display) -> PersistenceError {
        warn!("[DB] Corrupt review row {}: {}", self.id, reason);
        PersistenceError::CorruptRecord {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }

    fn id_column(&self, name: &str, raw: &str) -> Result<ObjectId, PersistenceError> {
        ObjectId::parse_str(raw).map_err(|e| self.corrupt(format!("{name}: {e}")))
    }

    fn timestamp_column(&self, name: &str, raw: &str) -> Result<DateTime<Utc>, PersistenceError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| self.corrupt(format!("{name}: {e}")))
    }
}

impl TryFrom<ReviewRow> for Review {
    type Error = PersistenceError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Review {
            id: row.id_column("id", &row.id)?,
            service_id: row.id_column("service_id", &row.service_id)?,
            user_id: row.id_column("user_id", &row.user_id)?,
            rating: Rating::new(row.rating).map_err(|e| row.corrupt(e))?,
            created_at: row.timestamp_column("created_at", &row.created_at)?,
            updated_at: row.timestamp_column("updated_at", &row.updated_at)?,
            comment: row.comment,
        })
    }
}
