//! Queue token database operations.
//!
//! Numbering restarts at 1 for every (department, date). The next number is
//! computed and claimed by a single `INSERT ... SELECT MAX(...) + 1`
//! statement; the unique index on (department, date, token_number) stays as
//! the backstop.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::patients::fetch_patient;
use super::{require_date, Database, DbError, DbResult};
use crate::models::{QueueToken, TokenPriority, TokenRequest, TokenStatus};

const TOKEN_COLUMNS: &str = r#"
    token_id, department, date, token_number, status, counter, priority,
    patient_id, created_by, created_at, updated_at
"#;

impl Database {
    /// Issue the next token for a department on `date`.
    pub fn issue_token(&self, request: &TokenRequest, date: &str) -> DbResult<QueueToken> {
        let department = request.department.trim();
        if department.is_empty() {
            return Err(DbError::Validation("Department required".into()));
        }
        require_date("date", date)?;
        if let Some(patient_id) = &request.patient_id {
            if fetch_patient(&self.conn, patient_id)?.is_none() {
                return Err(DbError::NotFound(format!("Patient {patient_id} not found")));
            }
        }

        let token_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.conn
            .execute(
                r#"
                INSERT INTO queue_tokens (
                    token_id, department, date, token_number, status, priority,
                    patient_id, created_by, created_at, updated_at
                )
                SELECT ?1, ?2, ?3, COALESCE(MAX(token_number), 0) + 1, 'waiting', ?4,
                       ?5, ?6, ?7, ?7
                FROM queue_tokens
                WHERE department = ?2 AND date = ?3
                "#,
                params![
                    token_id,
                    department,
                    date,
                    request.priority.as_str(),
                    request.patient_id,
                    request.created_by,
                    now,
                ],
            )
            .map_err(|e| {
                DbError::on_write(e, || {
                    format!("token number already issued for {department} on {date}")
                })
            })?;

        let token = load_token(&self.conn, &token_id)?;
        tracing::debug!(
            department = %token.department,
            date = %token.date,
            token_number = token.token_number,
            "token issued"
        );
        Ok(token)
    }

    /// Get a token by ID.
    pub fn get_token(&self, token_id: &str) -> DbResult<Option<QueueToken>> {
        fetch_token(&self.conn, token_id)
    }

    /// List tokens for a date, optionally narrowed by department and status,
    /// in token-number order.
    pub fn list_tokens(
        &self,
        date: &str,
        department: Option<&str>,
        status: Option<TokenStatus>,
    ) -> DbResult<Vec<QueueToken>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM queue_tokens
            WHERE date = ?1
              AND (?2 IS NULL OR department = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY department, token_number
            "#
        ))?;

        let rows = stmt.query_map(
            params![date, department.map(str::trim), status.map(|s| s.as_str())],
            TokenRow::from_row,
        )?;

        let mut tokens = Vec::new();
        for row in rows {
            tokens.push(row?.try_into()?);
        }
        Ok(tokens)
    }

    /// Flip the lowest-numbered waiting token of a department to `called`.
    pub fn call_next_token(
        &self,
        department: &str,
        date: &str,
        counter: Option<&str>,
    ) -> DbResult<QueueToken> {
        let department = department.trim();
        if department.is_empty() {
            return Err(DbError::Validation("Department required".into()));
        }

        let tx = self.conn.unchecked_transaction()?;
        let next: Option<String> = tx
            .query_row(
                r#"
                SELECT token_id FROM queue_tokens
                WHERE department = ?1 AND date = ?2 AND status = 'waiting'
                ORDER BY token_number
                LIMIT 1
                "#,
                params![department, date],
                |row| row.get(0),
            )
            .optional()?;

        let token_id = next.ok_or_else(|| DbError::NotFound("No waiting tokens".into()))?;

        tx.execute(
            "UPDATE queue_tokens SET status = 'called', counter = ?2, updated_at = ?3 WHERE token_id = ?1",
            params![token_id, counter, chrono::Utc::now().to_rfc3339()],
        )?;
        let token = load_token(&tx, &token_id)?;
        tx.commit()?;

        tracing::debug!(department, token_number = token.token_number, "token called");
        Ok(token)
    }

    /// Set a token's status directly.
    pub fn set_token_status(&self, token_id: &str, status: TokenStatus) -> DbResult<QueueToken> {
        let rows_affected = self.conn.execute(
            "UPDATE queue_tokens SET status = ?2, updated_at = ?3 WHERE token_id = ?1",
            params![token_id, status.as_str(), chrono::Utc::now().to_rfc3339()],
        )?;
        if rows_affected == 0 {
            return Err(DbError::NotFound("Token not found".into()));
        }
        load_token(&self.conn, token_id)
    }
}

fn fetch_token(conn: &Connection, token_id: &str) -> DbResult<Option<QueueToken>> {
    conn.query_row(
        &format!("SELECT {TOKEN_COLUMNS} FROM queue_tokens WHERE token_id = ?"),
        [token_id],
        TokenRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

fn load_token(conn: &Connection, token_id: &str) -> DbResult<QueueToken> {
    fetch_token(conn, token_id)?.ok_or_else(|| DbError::NotFound("Token not found".into()))
}

/// Intermediate row struct for database mapping.
struct TokenRow {
    token_id: String,
    department: String,
    date: String,
    token_number: u32,
    status: String,
    counter: Option<String>,
    priority: String,
    patient_id: Option<String>,
    created_by: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TokenRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            token_id: row.get(0)?,
            department: row.get(1)?,
            date: row.get(2)?,
            token_number: row.get(3)?,
            status: row.get(4)?,
            counter: row.get(5)?,
            priority: row.get(6)?,
            patient_id: row.get(7)?,
            created_by: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl TryFrom<TokenRow> for QueueToken {
    type Error = DbError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let status = TokenStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown token status: {}", row.status)))?;
        let priority = TokenPriority::parse(&row.priority)
            .ok_or_else(|| DbError::Constraint(format!("Unknown token priority: {}", row.priority)))?;

        Ok(QueueToken {
            token_id: row.token_id,
            department: row.department,
            date: row.date,
            token_number: row.token_number,
            status,
            counter: row.counter,
            priority,
            patient_id: row.patient_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
