//! Discharge workflow: draft, doctor approval, finalization.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::invoices::insert_invoice;
use super::patients::{fetch_patient, update_patient_status};
use super::{require_date, Database, DbError, DbResult};
use crate::models::{
    AdmissionStatus, Discharge, DischargeDetails, DischargeStatus, LineItemInput, NewInvoice,
};

/// Line description of the invoice raised when a discharge is finalized.
pub const DISCHARGE_PACKAGE_ITEM: &str = "Discharge Summary Package";

const DISCHARGE_COLUMNS: &str = r#"
    discharge_id, patient_id, status, created_by, approved_by, finalized_by,
    discharge_date, details, invoice_id, created_at, updated_at
"#;

impl Database {
    /// Open a draft discharge summary for an existing patient.
    pub fn create_discharge(
        &self,
        patient_id: &str,
        created_by: &str,
        details: DischargeDetails,
    ) -> DbResult<Discharge> {
        if fetch_patient(&self.conn, patient_id)?.is_none() {
            return Err(DbError::NotFound(format!("Patient {patient_id} not found")));
        }
        for (field, value) in [
            ("admission_date", &details.admission_date),
            ("follow_up_date", &details.follow_up_date),
        ] {
            if let Some(date) = value {
                require_date(field, date)?;
            }
        }

        let discharge = Discharge::new(patient_id.to_string(), created_by.to_string(), details);
        self.conn.execute(
            &format!(
                "INSERT INTO discharges ({DISCHARGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                discharge.discharge_id,
                discharge.patient_id,
                discharge.status.as_str(),
                discharge.created_by,
                discharge.approved_by,
                discharge.finalized_by,
                discharge.discharge_date,
                serde_json::to_string(&discharge.details)?,
                discharge.invoice_id,
                discharge.created_at,
                discharge.updated_at,
            ],
        )?;
        Ok(discharge)
    }

    /// Get a discharge by ID.
    pub fn get_discharge(&self, discharge_id: &str) -> DbResult<Option<Discharge>> {
        fetch_discharge(&self.conn, discharge_id)
    }

    /// List discharges, newest first, optionally for one patient.
    pub fn list_discharges(&self, patient_id: Option<&str>) -> DbResult<Vec<Discharge>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {DISCHARGE_COLUMNS}
            FROM discharges
            WHERE (?1 IS NULL OR patient_id = ?1)
            ORDER BY created_at DESC
            "#
        ))?;

        let rows = stmt.query_map(params![patient_id], DischargeRow::from_row)?;

        let mut discharges = Vec::new();
        for row in rows {
            discharges.push(row?.try_into()?);
        }
        Ok(discharges)
    }

    /// Record the doctor's sign-off on a draft.
    pub fn approve_discharge(&self, discharge_id: &str, doctor_id: &str) -> DbResult<Discharge> {
        let tx = self.conn.unchecked_transaction()?;
        let discharge = load_discharge(&tx, discharge_id)?;
        require_status(&discharge, DischargeStatus::Draft, "approved")?;

        tx.execute(
            r#"
            UPDATE discharges SET status = ?2, approved_by = ?3, updated_at = ?4
            WHERE discharge_id = ?1
            "#,
            params![
                discharge_id,
                DischargeStatus::DoctorApproved.as_str(),
                doctor_id,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        let approved = load_discharge(&tx, discharge_id)?;
        tx.commit()?;
        Ok(approved)
    }

    /// Finalize an approved discharge.
    ///
    /// Marks the patient discharged and, for a positive `package_price`,
    /// raises a one-line invoice linked to the discharge. Either everything
    /// is written or nothing is.
    pub fn finalize_discharge(
        &self,
        discharge_id: &str,
        finalized_by: &str,
        package_price: Option<f64>,
        discharge_date: Option<&str>,
    ) -> DbResult<Discharge> {
        let discharge_date = match discharge_date {
            Some(date) => {
                require_date("discharge_date", date)?;
                date.to_string()
            }
            None => chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        };

        let tx = self.conn.unchecked_transaction()?;
        let discharge = load_discharge(&tx, discharge_id)?;
        require_status(&discharge, DischargeStatus::DoctorApproved, "finalized")?;

        update_patient_status(&tx, &discharge.patient_id, AdmissionStatus::Discharged)?;

        let invoice_id = match package_price {
            Some(price) if price > 0.0 => {
                let invoice = insert_invoice(
                    &tx,
                    NewInvoice {
                        patient_id: discharge.patient_id.clone(),
                        doctor_id: discharge.approved_by.clone(),
                        items: vec![LineItemInput {
                            description: DISCHARGE_PACKAGE_ITEM.to_string(),
                            quantity: 1.0,
                            unit_price: price,
                        }],
                        tax: 0.0,
                        discount: 0.0,
                        due_date: None,
                        notes: Some(format!("Discharge {discharge_id}")),
                    },
                )?;
                Some(invoice.invoice_id)
            }
            _ => None,
        };

        tx.execute(
            r#"
            UPDATE discharges SET
                status = ?2,
                finalized_by = ?3,
                discharge_date = ?4,
                invoice_id = ?5,
                updated_at = ?6
            WHERE discharge_id = ?1
            "#,
            params![
                discharge_id,
                DischargeStatus::Finalized.as_str(),
                finalized_by,
                discharge_date,
                invoice_id,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        let finalized = load_discharge(&tx, discharge_id)?;
        tx.commit()?;

        tracing::info!(
            discharge = %discharge_id,
            patient = %finalized.patient_id,
            invoice = ?finalized.invoice_id,
            "discharge finalized"
        );
        Ok(finalized)
    }
}

fn require_status(discharge: &Discharge, expected: DischargeStatus, verb: &str) -> DbResult<()> {
    if discharge.status == expected {
        return Ok(());
    }
    Err(DbError::NotPermitted(format!(
        "Discharge is {} and cannot be {verb}",
        discharge.status.as_str()
    )))
}

fn fetch_discharge(conn: &Connection, discharge_id: &str) -> DbResult<Option<Discharge>> {
    conn.query_row(
        &format!("SELECT {DISCHARGE_COLUMNS} FROM discharges WHERE discharge_id = ?"),
        [discharge_id],
        DischargeRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

fn load_discharge(conn: &Connection, discharge_id: &str) -> DbResult<Discharge> {
    fetch_discharge(conn, discharge_id)?
        .ok_or_else(|| DbError::NotFound(format!("Discharge {discharge_id} not found")))
}

/// Intermediate row struct for database mapping.
struct DischargeRow {
    discharge_id: String,
    patient_id: String,
    status: String,
    created_by: String,
    approved_by: Option<String>,
    finalized_by: Option<String>,
    discharge_date: Option<String>,
    details: String,
    invoice_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl DischargeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            discharge_id: row.get(0)?,
            patient_id: row.get(1)?,
            status: row.get(2)?,
            created_by: row.get(3)?,
            approved_by: row.get(4)?,
            finalized_by: row.get(5)?,
            discharge_date: row.get(6)?,
            details: row.get(7)?,
            invoice_id: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl TryFrom<DischargeRow> for Discharge {
    type Error = DbError;

    fn try_from(row: DischargeRow) -> Result<Self, Self::Error> {
        let status = DischargeStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown discharge status: {}", row.status)))?;

        Ok(Discharge {
            discharge_id: row.discharge_id,
            patient_id: row.patient_id,
            status,
            created_by: row.created_by,
            approved_by: row.approved_by,
            finalized_by: row.finalized_by,
            discharge_date: row.discharge_date,
            details: serde_json::from_str(&row.details)?,
            invoice_id: row.invoice_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
