//! HMS Core Library
//!
//! Storage and business rules for a hospital back office: invoice ledger,
//! daily queue tokens, staff roster and discharge workflow.
//!
//! # Architecture
//!
//! ```text
//!   REST API (hms-api)            Native clients (UniFFI)
//!          │                               │
//!          └───────────────┬───────────────┘
//!                          ▼
//!            ┌───────────────────────────┐
//!            │   Database (one SQLite    │
//!            │   connection, mutex held) │
//!            └─────────────┬─────────────┘
//!                          │
//!     ┌──────────┬─────────┼──────────┬─────────────┐
//!     ▼          ▼         ▼          ▼             ▼
//!  Invoices   Queue     Roster    Discharges    Audit log
//!  + ledger   tokens    shifts    → invoice     (append-only)
//!     │
//!     ▼
//!  Export (JSON / CSV)
//! ```
//!
//! # Core Rules
//!
//! - Invoice numbers are unique; payments never exceed the balance and the
//!   status always follows from the payment ledger.
//! - Token numbers restart at 1 per department per day and never repeat.
//! - A staff member holds at most one shift per date.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Invoice, QueueToken, RosterEntry, etc.)
//! - [`export`]: Invoice statements and batch export

pub mod db;
pub mod export;
pub mod models;

// Re-export commonly used types
pub use db::{Database, DbError, DbResult};
pub use models::{
    AdmissionStatus, AuditEntry, Discharge, DischargeStatus, Invoice, InvoiceStatus,
    LedgerError, LineItemInput, NewInvoice, Patient, PaymentInput, PaymentMethod, QueueToken,
    RosterEntry, Shift, ShiftAssignment, StaffRole, TokenPriority, TokenRequest, TokenStatus,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum HmsError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not permitted: {0}")]
    NotPermitted(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<db::DbError> for HmsError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(msg) => HmsError::NotFound(msg),
            db::DbError::Conflict(msg) => HmsError::Conflict(msg),
            db::DbError::NotPermitted(msg) => HmsError::NotPermitted(msg),
            db::DbError::Validation(msg) => HmsError::InvalidInput(msg),
            db::DbError::Ledger(err) => HmsError::InvalidInput(err.to_string()),
            db::DbError::Json(err) => HmsError::SerializationError(err.to_string()),
            other => HmsError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for HmsError {
    fn from(e: serde_json::Error) -> Self {
        HmsError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for HmsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        HmsError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<HmsCore>, HmsError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(HmsCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<HmsCore>, HmsError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(HmsCore {
        db: Arc::new(Mutex::new(db)),
    }))
}

fn today() -> String {
    chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct HmsCore {
    db: Arc<Mutex<Database>>,
}

#[uniffi::export]
impl HmsCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a new outpatient.
    pub fn create_patient(
        &self,
        name: String,
        phone: Option<String>,
        date_of_birth: Option<String>,
    ) -> Result<FfiPatient, HmsError> {
        let db = self.db.lock()?;
        let mut patient = Patient::new(name);
        patient.phone = phone;
        patient.date_of_birth = date_of_birth;
        db.insert_patient(&patient)?;
        Ok(patient.into())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, HmsError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&patient_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Mark a patient discharged so their bills can be settled.
    pub fn discharge_patient(&self, patient_id: String) -> Result<FfiPatient, HmsError> {
        let db = self.db.lock()?;
        let patient = db.set_patient_status(&patient_id, AdmissionStatus::Discharged)?;
        Ok(patient.into())
    }

    // =========================================================================
    // Invoice Operations
    // =========================================================================

    /// Create an invoice with a freshly allocated number.
    pub fn create_invoice(&self, invoice: FfiNewInvoice) -> Result<FfiInvoice, HmsError> {
        let db = self.db.lock()?;
        let created = db.create_invoice(invoice.into())?;
        Ok(created.into())
    }

    /// Get an invoice by ID.
    pub fn get_invoice(&self, invoice_id: String) -> Result<Option<FfiInvoice>, HmsError> {
        let db = self.db.lock()?;
        let invoice = db.get_invoice(&invoice_id)?;
        Ok(invoice.map(|i| i.into()))
    }

    /// Record a payment against an invoice.
    pub fn add_payment(
        &self,
        invoice_id: String,
        amount: f64,
        method: String,
        transaction_id: Option<String>,
    ) -> Result<FfiInvoice, HmsError> {
        let method = PaymentMethod::parse(&method)
            .ok_or_else(|| HmsError::InvalidInput(format!("unknown payment method {method:?}")))?;
        let db = self.db.lock()?;
        let invoice = db.add_payment(
            &invoice_id,
            PaymentInput {
                amount,
                method,
                transaction_id,
                notes: None,
            },
        )?;
        Ok(invoice.into())
    }

    // =========================================================================
    // Queue Operations
    // =========================================================================

    /// Issue today's next token for a department.
    pub fn issue_token(
        &self,
        department: String,
        patient_id: Option<String>,
        high_priority: bool,
    ) -> Result<FfiQueueToken, HmsError> {
        let db = self.db.lock()?;
        let request = TokenRequest {
            department,
            patient_id,
            priority: if high_priority {
                TokenPriority::High
            } else {
                TokenPriority::Normal
            },
            created_by: None,
        };
        let token = db.issue_token(&request, &today())?;
        Ok(token.into())
    }

    /// Call the lowest-numbered waiting token of a department today.
    pub fn call_next(
        &self,
        department: String,
        counter: Option<String>,
    ) -> Result<FfiQueueToken, HmsError> {
        let db = self.db.lock()?;
        let token = db.call_next_token(&department, &today(), counter.as_deref())?;
        Ok(token.into())
    }

    /// Set a token's status (waiting, called, served or skipped).
    pub fn set_token_status(
        &self,
        token_id: String,
        status: String,
    ) -> Result<FfiQueueToken, HmsError> {
        let status = TokenStatus::parse(&status)
            .ok_or_else(|| HmsError::InvalidInput(format!("unknown token status {status:?}")))?;
        let db = self.db.lock()?;
        let token = db.set_token_status(&token_id, status)?;
        Ok(token.into())
    }

    /// Today's tokens, optionally for one department.
    pub fn list_tokens(&self, department: Option<String>) -> Result<Vec<FfiQueueToken>, HmsError> {
        let db = self.db.lock()?;
        let tokens = db.list_tokens(&today(), department.as_deref(), None)?;
        Ok(tokens.into_iter().map(|t| t.into()).collect())
    }

    // =========================================================================
    // Roster Operations
    // =========================================================================

    /// Assign a shift.
    pub fn create_shift(&self, shift: FfiShiftAssignment) -> Result<FfiRosterEntry, HmsError> {
        let assignment = ShiftAssignment::try_from(shift)?;
        let db = self.db.lock()?;
        let entry = db.create_shift(assignment)?;
        Ok(entry.into())
    }

    /// Shifts between two dates (inclusive).
    pub fn list_shifts(&self, start: String, end: String) -> Result<Vec<FfiRosterEntry>, HmsError> {
        let db = self.db.lock()?;
        let entries = db.list_shifts(&db::RosterQuery {
            start: Some(start),
            end: Some(end),
            role: None,
        })?;
        Ok(entries.into_iter().map(|e| e.into()).collect())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export all invoices as CSV.
    pub fn export_invoices_csv(&self) -> Result<String, HmsError> {
        let db = self.db.lock()?;
        let exporter = export::InvoiceExporter::new(&db);
        let batch = exporter.export_all(None)?;
        Ok(batch.to_csv())
    }

    /// Export all invoices as JSON.
    pub fn export_invoices_json(&self) -> Result<String, HmsError> {
        let db = self.db.lock()?;
        let exporter = export::InvoiceExporter::new(&db);
        let batch = exporter.export_all(None)?;
        Ok(batch.to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub patient_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub status: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            patient_id: patient.patient_id,
            name: patient.name,
            phone: patient.phone,
            date_of_birth: patient.date_of_birth,
            status: patient.status.as_str().to_string(),
        }
    }
}

/// FFI-safe line item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Computed; ignored on input
    pub total: f64,
}

/// FFI-safe invoice request.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewInvoice {
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub items: Vec<FfiLineItem>,
    pub tax: f64,
    pub discount: f64,
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

impl From<FfiNewInvoice> for NewInvoice {
    fn from(invoice: FfiNewInvoice) -> Self {
        NewInvoice {
            patient_id: invoice.patient_id,
            doctor_id: invoice.doctor_id,
            items: invoice
                .items
                .into_iter()
                .map(|item| LineItemInput {
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
            tax: invoice.tax,
            discount: invoice.discount,
            due_date: invoice.due_date,
            notes: invoice.notes,
        }
    }
}

/// FFI-safe payment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPayment {
    pub payment_id: String,
    pub amount: f64,
    pub paid_at: String,
    pub method: String,
    pub transaction_id: Option<String>,
}

/// FFI-safe invoice.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInvoice {
    pub invoice_id: String,
    pub invoice_number: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub invoice_date: String,
    pub due_date: String,
    pub items: Vec<FfiLineItem>,
    pub payments: Vec<FfiPayment>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    pub balance_due: f64,
    pub status: String,
}

impl From<Invoice> for FfiInvoice {
    fn from(invoice: Invoice) -> Self {
        let balance_due = invoice.balance_due();
        Self {
            invoice_id: invoice.invoice_id,
            invoice_number: invoice.invoice_number,
            patient_id: invoice.patient_id,
            doctor_id: invoice.doctor_id,
            invoice_date: invoice.invoice_date,
            due_date: invoice.due_date,
            items: invoice
                .items
                .into_iter()
                .map(|item| FfiLineItem {
                    description: item.description,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total: item.total,
                })
                .collect(),
            payments: invoice
                .payments
                .into_iter()
                .map(|p| FfiPayment {
                    payment_id: p.payment_id,
                    amount: p.amount,
                    paid_at: p.paid_at,
                    method: p.method.as_str().to_string(),
                    transaction_id: p.transaction_id,
                })
                .collect(),
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            discount: invoice.discount,
            total: invoice.total,
            balance_due,
            status: invoice.status.as_str().to_string(),
        }
    }
}

/// FFI-safe queue token.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQueueToken {
    pub token_id: String,
    pub department: String,
    pub date: String,
    pub token_number: u32,
    pub status: String,
    pub counter: Option<String>,
    pub priority: String,
    pub patient_id: Option<String>,
}

impl From<QueueToken> for FfiQueueToken {
    fn from(token: QueueToken) -> Self {
        Self {
            token_id: token.token_id,
            department: token.department,
            date: token.date,
            token_number: token.token_number,
            status: token.status.as_str().to_string(),
            counter: token.counter,
            priority: token.priority.as_str().to_string(),
            patient_id: token.patient_id,
        }
    }
}

/// FFI-safe shift assignment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiShiftAssignment {
    pub staff_id: String,
    pub role: String,
    pub department: Option<String>,
    pub date: String,
    pub shift: String,
    pub notes: Option<String>,
}

impl TryFrom<FfiShiftAssignment> for ShiftAssignment {
    type Error = HmsError;

    fn try_from(shift: FfiShiftAssignment) -> Result<Self, Self::Error> {
        let role = StaffRole::parse(&shift.role)
            .ok_or_else(|| HmsError::InvalidInput(format!("unknown staff role {:?}", shift.role)))?;
        let slot = Shift::parse(&shift.shift)
            .ok_or_else(|| HmsError::InvalidInput(format!("unknown shift {:?}", shift.shift)))?;
        Ok(ShiftAssignment {
            staff_id: shift.staff_id,
            role,
            department: shift.department,
            date: shift.date,
            shift: slot,
            notes: shift.notes,
        })
    }
}

/// FFI-safe roster entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRosterEntry {
    pub roster_id: String,
    pub staff_id: String,
    pub role: String,
    pub department: Option<String>,
    pub date: String,
    pub shift: String,
}

impl From<RosterEntry> for FfiRosterEntry {
    fn from(entry: RosterEntry) -> Self {
        Self {
            roster_id: entry.roster_id,
            staff_id: entry.staff_id,
            role: entry.role.as_str().to_string(),
            department: entry.department,
            date: entry.date,
            shift: entry.shift.as_str().to_string(),
        }
    }
}
