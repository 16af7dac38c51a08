//! Append-only audit log.

use rusqlite::{params, Row};

use super::{Database, DbResult};
use crate::models::AuditEntry;

/// Default page size for audit listings.
pub const DEFAULT_AUDIT_LIMIT: usize = 100;

impl Database {
    /// Append an audit entry.
    pub fn record_audit(&self, entry: &AuditEntry) -> DbResult<()> {
        let details = entry
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO audit_log (
                audit_id, user_id, action, resource, resource_id, details, ip_address, timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                entry.audit_id,
                entry.user_id,
                entry.action,
                entry.resource,
                entry.resource_id,
                details,
                entry.ip_address,
                entry.timestamp,
            ],
        )?;
        Ok(())
    }

    /// Most recent entries first, optionally filtered by resource and user.
    pub fn list_audit(
        &self,
        resource: Option<&str>,
        user_id: Option<&str>,
        limit: usize,
    ) -> DbResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT audit_id, user_id, action, resource, resource_id, details, ip_address, timestamp
            FROM audit_log
            WHERE (?1 IS NULL OR resource = ?1)
              AND (?2 IS NULL OR user_id = ?2)
            ORDER BY timestamp DESC, rowid DESC
            LIMIT ?3
            "#,
        )?;

        let rows = stmt.query_map(params![resource, user_id, limit as i64], audit_from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            let (mut entry, details) = row?;
            entry.details = details.as_deref().map(serde_json::from_str).transpose()?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<(AuditEntry, Option<String>)> {
    Ok((
        AuditEntry {
            audit_id: row.get(0)?,
            user_id: row.get(1)?,
            action: row.get(2)?,
            resource: row.get(3)?,
            resource_id: row.get(4)?,
            details: None,
            ip_address: row.get(6)?,
            timestamp: row.get(7)?,
        },
        row.get(5)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_list() {
        let db = Database::open_in_memory().unwrap();

        let mut entry = AuditEntry::new("admin-1".into(), "create", "billing");
        entry.resource_id = Some("inv-1".into());
        entry.details = Some(serde_json::json!({"method": "POST", "path": "/api/billing"}));
        db.record_audit(&entry).unwrap();
        db.record_audit(&AuditEntry::new("nurse-1".into(), "create", "roster"))
            .unwrap();

        let all = db.list_audit(None, None, DEFAULT_AUDIT_LIMIT).unwrap();
        assert_eq!(all.len(), 2);

        let billing = db.list_audit(Some("billing"), None, 10).unwrap();
        assert_eq!(billing, vec![entry]);

        let nurse = db.list_audit(None, Some("nurse-1"), 10).unwrap();
        assert_eq!(nurse.len(), 1);
        assert_eq!(nurse[0].resource, "roster");
    }

    #[test]
    fn test_newest_first_and_limit() {
        let db = Database::open_in_memory().unwrap();
        for (i, ts) in ["2024-05-01T08:00:00Z", "2024-05-01T09:00:00Z", "2024-05-01T07:00:00Z"]
            .iter()
            .enumerate()
        {
            let mut entry = AuditEntry::new(format!("user-{i}"), "update", "queue");
            entry.timestamp = ts.to_string();
            db.record_audit(&entry).unwrap();
        }

        let latest = db.list_audit(None, None, 2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].user_id, "user-1");
        assert_eq!(latest[1].user_id, "user-0");
    }
}
