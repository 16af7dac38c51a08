//! Patient database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{require_date, Database, DbError, DbResult};
use crate::models::{AdmissionStatus, Patient};

const PATIENT_COLUMNS: &str =
    "patient_id, name, phone, date_of_birth, status, created_at, updated_at";

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        if patient.name.trim().is_empty() {
            return Err(DbError::Validation("patient name is required".into()));
        }
        if let Some(dob) = &patient.date_of_birth {
            require_date("date_of_birth", dob)?;
        }

        self.conn.execute(
            r#"
            INSERT INTO patients (
                patient_id, name, phone, date_of_birth, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                patient.patient_id,
                patient.name.trim(),
                patient.phone,
                patient.date_of_birth,
                patient.status.as_str(),
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: &str) -> DbResult<Option<Patient>> {
        fetch_patient(&self.conn, patient_id)
    }

    /// Search patients by name (prefix match).
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = format!("{}%", escape_like(query));
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE name LIKE ? ESCAPE '\\' ORDER BY name LIMIT ?"
        ))?;

        let rows = stmt.query_map(params![pattern, limit as i64], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List all patients.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY name"))?;

        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Change a patient's admission status.
    pub fn set_patient_status(&self, patient_id: &str, status: AdmissionStatus) -> DbResult<Patient> {
        update_patient_status(&self.conn, patient_id, status)?;
        self.get_patient(patient_id)?
            .ok_or_else(|| DbError::NotFound(format!("Patient {patient_id} not found")))
    }

    /// Delete a patient.
    pub fn delete_patient(&self, patient_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE patient_id = ?", [patient_id])
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref f, _)
                    if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    DbError::Conflict(format!("patient {patient_id} still has records"))
                }
                other => DbError::Sqlite(other),
            })?;
        Ok(rows_affected > 0)
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn fetch_patient(conn: &Connection, patient_id: &str) -> DbResult<Option<Patient>> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE patient_id = ?"),
        [patient_id],
        PatientRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

pub(crate) fn update_patient_status(
    conn: &Connection,
    patient_id: &str,
    status: AdmissionStatus,
) -> DbResult<()> {
    let rows_affected = conn.execute(
        "UPDATE patients SET status = ?2, updated_at = ?3 WHERE patient_id = ?1",
        params![patient_id, status.as_str(), chrono::Utc::now().to_rfc3339()],
    )?;
    if rows_affected == 0 {
        return Err(DbError::NotFound(format!("Patient {patient_id} not found")));
    }
    Ok(())
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    patient_id: String,
    name: String,
    phone: Option<String>,
    date_of_birth: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            patient_id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
            date_of_birth: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let status = AdmissionStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown admission status: {}", row.status)))?;

        Ok(Patient {
            patient_id: row.patient_id,
            name: row.name,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut patient = Patient::new("Asha Rao".into());
        patient.phone = Some("+91 98450 00000".into());
        patient.date_of_birth = Some("1986-03-14".into());

        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.patient_id).unwrap().unwrap();
        assert_eq!(retrieved.name, "Asha Rao");
        assert_eq!(retrieved.date_of_birth, Some("1986-03-14".into()));
        assert_eq!(retrieved.status, AdmissionStatus::Outpatient);
    }

    #[test]
    fn test_insert_rejects_blank_name_and_bad_dob() {
        let db = setup_db();

        let blank = Patient::new("   ".into());
        assert!(matches!(db.insert_patient(&blank), Err(DbError::Validation(_))));

        let mut bad_dob = Patient::new("Ravi".into());
        bad_dob.date_of_birth = Some("14/03/1986".into());
        assert!(matches!(db.insert_patient(&bad_dob), Err(DbError::Validation(_))));
    }

    #[test]
    fn test_status_transitions() {
        let db = setup_db();
        let patient = Patient::new("Asha Rao".into());
        db.insert_patient(&patient).unwrap();

        let admitted = db
            .set_patient_status(&patient.patient_id, AdmissionStatus::Admitted)
            .unwrap();
        assert_eq!(admitted.status, AdmissionStatus::Admitted);

        let discharged = db
            .set_patient_status(&patient.patient_id, AdmissionStatus::Discharged)
            .unwrap();
        assert!(discharged.can_settle_bills());
    }

    #[test]
    fn test_status_unknown_patient() {
        let db = setup_db();
        let result = db.set_patient_status("missing", AdmissionStatus::Admitted);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_search_patients() {
        let db = setup_db();

        db.insert_patient(&Patient::new("Asha Rao".into())).unwrap();
        db.insert_patient(&Patient::new("Ashok Kumar".into())).unwrap();
        db.insert_patient(&Patient::new("Meera Iyer".into())).unwrap();

        let results = db.search_patients("Ash", 10).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|p| p.name == "Asha Rao"));
        assert!(results.iter().any(|p| p.name == "Ashok Kumar"));

        assert_eq!(db.list_patients().unwrap().len(), 3);
    }

    #[test]
    fn test_search_wildcards_match_literally() {
        let db = setup_db();

        db.insert_patient(&Patient::new("Asha Rao".into())).unwrap();
        db.insert_patient(&Patient::new("100% Test".into())).unwrap();
        db.insert_patient(&Patient::new("Under_Score".into())).unwrap();

        assert!(db.search_patients("_", 10).unwrap().is_empty());
        assert!(db.search_patients("%", 10).unwrap().is_empty());

        let percent = db.search_patients("100%", 10).unwrap();
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].name, "100% Test");

        let underscore = db.search_patients("Under_", 10).unwrap();
        assert_eq!(underscore.len(), 1);
        assert_eq!(underscore[0].name, "Under_Score");

        assert!(db.search_patients("Under%", 10).unwrap().is_empty());
    }

    #[test]
    fn test_delete_patient() {
        let db = setup_db();
        let patient = Patient::new("Asha Rao".into());
        db.insert_patient(&patient).unwrap();

        assert!(db.delete_patient(&patient.patient_id).unwrap());
        assert!(!db.delete_patient(&patient.patient_id).unwrap());
        assert!(db.get_patient(&patient.patient_id).unwrap().is_none());
    }
}
