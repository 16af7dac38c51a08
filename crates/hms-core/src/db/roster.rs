//! Staff roster database operations.
//!
//! A staff member holds at most one shift per date. That rule lives in the
//! unique index on (staff_id, date); a duplicate-key failure surfaces as
//! [`DbError::Conflict`].

use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{require_date, Database, DbError, DbResult};
use crate::models::{RosterEntry, Shift, ShiftAssignment, StaffRole};

const ROSTER_COLUMNS: &str =
    "roster_id, staff_id, role, department, date, shift, notes, created_at, updated_at";

const SHIFT_CONFLICT: &str = "Shift already exists for staff/date";

/// Optional filters for listing roster entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RosterQuery {
    /// Inclusive lower bound; only applied together with `end`
    pub start: Option<String>,
    /// Inclusive upper bound; only applied together with `start`
    pub end: Option<String>,
    pub role: Option<StaffRole>,
}

impl Database {
    /// Record a shift. Fails with a conflict if the staff member already has
    /// an entry on that date.
    pub fn create_shift(&self, assignment: ShiftAssignment) -> DbResult<RosterEntry> {
        validate_assignment(&assignment)?;
        let entry = RosterEntry::new(assignment);

        self.conn
            .execute(
                &format!(
                    "INSERT INTO roster ({ROSTER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    entry.roster_id,
                    entry.staff_id,
                    entry.role.as_str(),
                    entry.department,
                    entry.date,
                    entry.shift.as_str(),
                    entry.notes,
                    entry.created_at,
                    entry.updated_at,
                ],
            )
            .map_err(|e| DbError::on_write(e, || SHIFT_CONFLICT.to_string()))
            .inspect_err(|e| {
                if matches!(e, DbError::Conflict(_)) {
                    tracing::info!(staff = %entry.staff_id, date = %entry.date, "duplicate shift rejected");
                }
            })?;

        Ok(entry)
    }

    /// Get a roster entry by ID.
    pub fn get_shift(&self, roster_id: &str) -> DbResult<Option<RosterEntry>> {
        self.conn
            .query_row(
                &format!("SELECT {ROSTER_COLUMNS} FROM roster WHERE roster_id = ?"),
                [roster_id],
                RosterRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Replace the fields of an existing entry.
    pub fn update_shift(&self, roster_id: &str, assignment: ShiftAssignment) -> DbResult<RosterEntry> {
        validate_assignment(&assignment)?;

        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE roster SET
                    staff_id = ?2,
                    role = ?3,
                    department = ?4,
                    date = ?5,
                    shift = ?6,
                    notes = ?7,
                    updated_at = ?8
                WHERE roster_id = ?1
                "#,
                params![
                    roster_id,
                    assignment.staff_id,
                    assignment.role.as_str(),
                    assignment.department,
                    assignment.date,
                    assignment.shift.as_str(),
                    assignment.notes,
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| DbError::on_write(e, || SHIFT_CONFLICT.to_string()))?;

        if rows_affected == 0 {
            return Err(DbError::NotFound(format!("Roster entry {roster_id} not found")));
        }
        self.get_shift(roster_id)?
            .ok_or_else(|| DbError::NotFound(format!("Roster entry {roster_id} not found")))
    }

    /// Delete a roster entry.
    pub fn delete_shift(&self, roster_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM roster WHERE roster_id = ?", [roster_id])?;
        Ok(rows_affected > 0)
    }

    /// List roster entries ordered by date, then shift.
    pub fn list_shifts(&self, query: &RosterQuery) -> DbResult<Vec<RosterEntry>> {
        let (start, end) = match (&query.start, &query.end) {
            (Some(start), Some(end)) => {
                require_date("start", start)?;
                require_date("end", end)?;
                (Some(start.as_str()), Some(end.as_str()))
            }
            _ => (None, None),
        };

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {ROSTER_COLUMNS}
            FROM roster
            WHERE (?1 IS NULL OR date >= ?1)
              AND (?2 IS NULL OR date <= ?2)
              AND (?3 IS NULL OR role = ?3)
            ORDER BY date,
                     CASE shift WHEN 'morning' THEN 0 WHEN 'evening' THEN 1 ELSE 2 END,
                     staff_id
            "#
        ))?;

        let rows = stmt.query_map(
            params![start, end, query.role.map(|r| r.as_str())],
            RosterRow::from_row,
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }
}

fn validate_assignment(assignment: &ShiftAssignment) -> DbResult<()> {
    if assignment.staff_id.trim().is_empty() {
        return Err(DbError::Validation("staff is required".into()));
    }
    require_date("date", &assignment.date)
}

/// Intermediate row struct for database mapping.
struct RosterRow {
    roster_id: String,
    staff_id: String,
    role: String,
    department: Option<String>,
    date: String,
    shift: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RosterRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            roster_id: row.get(0)?,
            staff_id: row.get(1)?,
            role: row.get(2)?,
            department: row.get(3)?,
            date: row.get(4)?,
            shift: row.get(5)?,
            notes: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl TryFrom<RosterRow> for RosterEntry {
    type Error = DbError;

    fn try_from(row: RosterRow) -> Result<Self, Self::Error> {
        let role = StaffRole::parse(&row.role)
            .ok_or_else(|| DbError::Constraint(format!("Unknown staff role: {}", row.role)))?;
        let shift = Shift::parse(&row.shift)
            .ok_or_else(|| DbError::Constraint(format!("Unknown shift: {}", row.shift)))?;

        Ok(RosterEntry {
            roster_id: row.roster_id,
            staff_id: row.staff_id,
            role,
            department: row.department,
            date: row.date,
            shift,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(staff: &str, date: &str, shift: Shift) -> ShiftAssignment {
        ShiftAssignment {
            staff_id: staff.to_string(),
            role: StaffRole::Nurse,
            department: Some("ICU".into()),
            date: date.to_string(),
            shift,
            notes: None,
        }
    }

    #[test]
    fn test_create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let entry = db
            .create_shift(assignment("nurse-1", "2024-05-01", Shift::Night))
            .unwrap();

        let stored = db.get_shift(&entry.roster_id).unwrap().unwrap();
        assert_eq!(stored, entry);
    }

    #[test]
    fn test_duplicate_staff_date_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let original = db
            .create_shift(assignment("nurse-1", "2024-05-01", Shift::Morning))
            .unwrap();

        let mut second = assignment("nurse-1", "2024-05-01", Shift::Night);
        second.role = StaffRole::Doctor;
        let result = db.create_shift(second);
        assert!(matches!(result, Err(DbError::Conflict(_))));

        // Original untouched
        let stored = db.get_shift(&original.roster_id).unwrap().unwrap();
        assert_eq!(stored.shift, Shift::Morning);
        assert_eq!(db.list_shifts(&RosterQuery::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_validation() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.create_shift(assignment("", "2024-05-01", Shift::Morning)),
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            db.create_shift(assignment("nurse-1", "May 1", Shift::Morning)),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_update_conflict_and_not_found() {
        let db = Database::open_in_memory().unwrap();
        db.create_shift(assignment("nurse-1", "2024-05-01", Shift::Morning))
            .unwrap();
        let other = db
            .create_shift(assignment("nurse-1", "2024-05-02", Shift::Morning))
            .unwrap();

        let moved = db.update_shift(
            &other.roster_id,
            assignment("nurse-1", "2024-05-01", Shift::Evening),
        );
        assert!(matches!(moved, Err(DbError::Conflict(_))));

        let updated = db
            .update_shift(
                &other.roster_id,
                assignment("nurse-1", "2024-05-02", Shift::Evening),
            )
            .unwrap();
        assert_eq!(updated.shift, Shift::Evening);

        assert!(matches!(
            db.update_shift("missing", assignment("nurse-2", "2024-05-02", Shift::Night)),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_range_role_and_order() {
        let db = Database::open_in_memory().unwrap();
        db.create_shift(assignment("nurse-1", "2024-05-02", Shift::Night))
            .unwrap();
        db.create_shift(assignment("nurse-2", "2024-05-02", Shift::Morning))
            .unwrap();
        db.create_shift(assignment("nurse-3", "2024-05-01", Shift::Evening))
            .unwrap();
        let mut doctor = assignment("doc-1", "2024-05-09", Shift::Morning);
        doctor.role = StaffRole::Doctor;
        db.create_shift(doctor).unwrap();

        let all = db.list_shifts(&RosterQuery::default()).unwrap();
        let order: Vec<&str> = all.iter().map(|e| e.staff_id.as_str()).collect();
        assert_eq!(order, vec!["nurse-3", "nurse-2", "nurse-1", "doc-1"]);

        let window = db
            .list_shifts(&RosterQuery {
                start: Some("2024-05-01".into()),
                end: Some("2024-05-02".into()),
                role: None,
            })
            .unwrap();
        assert_eq!(window.len(), 3);

        // A lone bound is ignored
        let open_ended = db
            .list_shifts(&RosterQuery {
                start: Some("2024-05-05".into()),
                end: None,
                role: None,
            })
            .unwrap();
        assert_eq!(open_ended.len(), 4);

        let doctors = db
            .list_shifts(&RosterQuery {
                role: Some(StaffRole::Doctor),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(doctors.len(), 1);
    }

    #[test]
    fn test_delete_shift() {
        let db = Database::open_in_memory().unwrap();
        let entry = db
            .create_shift(assignment("nurse-1", "2024-05-01", Shift::Morning))
            .unwrap();
        assert!(db.delete_shift(&entry.roster_id).unwrap());

        // Freed slot can be reused
        assert!(db
            .create_shift(assignment("nurse-1", "2024-05-01", Shift::Night))
            .is_ok());
    }
}
