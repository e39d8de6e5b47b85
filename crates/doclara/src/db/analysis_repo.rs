//! Analysis repository for the `user_analyses` table.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use crate::workflow::UserToken;

use super::{Database, DatabaseError};

/// A finished analysis ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub thread_id: String,
    pub user_id: String,
    pub doc_type: String,
    pub simplified_explanation: String,
    pub identified_risks: Vec<String>,
    pub action_items: Vec<String>,
    pub confidence_score: f64,
    pub language: String,
    /// Already truncated by the caller. `None` when the document had no text.
    pub raw_text: Option<String>,
}

/// A stored analysis as read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub id: i64,
    pub thread_id: String,
    pub user_id: String,
    pub doc_type: String,
    pub simplified_explanation: String,
    pub identified_risks: Vec<String>,
    pub action_items: Vec<String>,
    pub confidence_score: f64,
    pub language: String,
    pub raw_text: Option<String>,
    pub created_at: String,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            thread_id: row.get("thread_id")?,
            user_id: row.get("user_id")?,
            doc_type: row.get("doc_type")?,
            simplified_explanation: row.get("simplified_explanation")?,
            identified_risks: json_list(row, "identified_risks")?,
            action_items: json_list(row, "action_items")?,
            confidence_score: row.get("confidence_score")?,
            language: row.get("language")?,
            raw_text: row.get("raw_text")?,
            created_at: row.get("created_at")?,
        })
    }
}

fn json_list(row: &Row<'_>, column: &str) -> Result<Vec<String>, rusqlite::Error> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn encode_list(column: &'static str, items: &[String]) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|source| DatabaseError::Json { column, source })
}

/// Storage for finished analyses, scoped by user.
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Stores one analysis on behalf of the token holder. Returns the row id.
    async fn insert(&self, record: &AnalysisRecord, token: &UserToken) -> Result<i64, DatabaseError>;

    /// Newest first, with the total number of rows the user owns.
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<AnalysisRow>, u64), DatabaseError>;

    /// Latest analysis of a thread, only if the user owns it.
    async fn find_by_thread(
        &self,
        user_id: &str,
        thread_id: &str,
    ) -> Result<Option<AnalysisRow>, DatabaseError>;
}

#[derive(Clone)]
pub struct SqliteAnalysisRepository {
    db: Database,
}

impl SqliteAnalysisRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AnalysisRepository for SqliteAnalysisRepository {
    async fn insert(&self, record: &AnalysisRecord, token: &UserToken) -> Result<i64, DatabaseError> {
        if token.is_empty() {
            log::warn!(
                "Storing analysis for thread {} without a user token",
                record.thread_id
            );
        }

        let risks = encode_list("identified_risks", &record.identified_risks)?;
        let actions = encode_list("action_items", &record.action_items)?;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_analyses (thread_id, user_id, doc_type, simplified_explanation,
                 identified_risks, action_items, confidence_score, language, raw_text, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.thread_id,
                    record.user_id,
                    record.doc_type,
                    record.simplified_explanation,
                    risks,
                    actions,
                    record.confidence_score,
                    record.language,
                    record.raw_text,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<AnalysisRow>, u64), DatabaseError> {
        self.db.with_conn(|conn| {
            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM user_analyses WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT * FROM user_analyses WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit, offset], AnalysisRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    async fn find_by_thread(
        &self,
        user_id: &str,
        thread_id: &str,
    ) -> Result<Option<AnalysisRow>, DatabaseError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM user_analyses WHERE user_id = ?1 AND thread_id = ?2
                     ORDER BY created_at DESC, id DESC LIMIT 1",
                    params![user_id, thread_id],
                    AnalysisRow::from_row,
                )
                .optional()?;
            Ok(row)
        })
    }
}
