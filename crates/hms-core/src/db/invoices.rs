//! Invoice database operations: numbering, payments and summaries.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::patients::fetch_patient;
use super::{Database, DbError, DbResult};
use crate::models::{
    invoice_number_for_millis, next_invoice_number, Invoice, InvoiceStatus, LedgerError,
    LineItem, LineItemInput, NewInvoice, Payment, PaymentInput, PaymentMethod,
};

/// Upper bound on suffix probing when numbers collide within a millisecond.
const MAX_NUMBER_PROBES: usize = 1_000;

const INVOICE_COLUMNS: &str = r#"
    invoice_id, invoice_number, patient_id, doctor_id, invoice_date, due_date,
    items, subtotal, tax, discount, total, status, payment_method, payments,
    notes, created_at, updated_at
"#;

/// Optional filters for listing and summarising invoices.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvoiceFilter {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
    pub status: Option<InvoiceStatus>,
}

/// Grand total and per-status totals of a set of invoices.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BillingSummary {
    pub invoice_count: usize,
    pub total: f64,
    pub by_status: BTreeMap<String, f64>,
}

impl Database {
    /// Create an invoice, allocating its number in the same transaction.
    pub fn create_invoice(&self, new: NewInvoice) -> DbResult<Invoice> {
        let tx = self.conn.unchecked_transaction()?;
        let invoice = insert_invoice(&tx, new)?;
        tx.commit()?;
        Ok(invoice)
    }

    /// Get an invoice by ID.
    pub fn get_invoice(&self, invoice_id: &str) -> DbResult<Option<Invoice>> {
        fetch_invoice(&self.conn, invoice_id)
    }

    /// Get an invoice by its human-readable number.
    pub fn get_invoice_by_number(&self, invoice_number: &str) -> DbResult<Option<Invoice>> {
        self.conn
            .query_row(
                &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_number = ?"),
                [invoice_number],
                InvoiceRow::from_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List invoices matching the filter, newest first.
    pub fn list_invoices(&self, filter: &InvoiceFilter) -> DbResult<Vec<Invoice>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE (?1 IS NULL OR patient_id = ?1)
              AND (?2 IS NULL OR doctor_id = ?2)
              AND (?3 IS NULL OR status = ?3)
            ORDER BY created_at DESC, invoice_number DESC
            "#
        ))?;

        let rows = stmt.query_map(
            params![
                filter.patient_id,
                filter.doctor_id,
                filter.status.map(|s| s.as_str()),
            ],
            InvoiceRow::from_row,
        )?;

        let mut invoices = Vec::new();
        for row in rows {
            invoices.push(row?.try_into()?);
        }
        Ok(invoices)
    }

    /// Replace line items (and optionally tax/discount) before any payment.
    pub fn update_invoice_items(
        &self,
        invoice_id: &str,
        items: &[LineItemInput],
        tax: Option<f64>,
        discount: Option<f64>,
    ) -> DbResult<Invoice> {
        let tx = self.conn.unchecked_transaction()?;
        let mut invoice = load_invoice(&tx, invoice_id)?;
        invoice.replace_items(items, tax, discount)?;
        save_invoice(&tx, &invoice)?;
        tx.commit()?;
        Ok(invoice)
    }

    /// Append a payment to an invoice.
    ///
    /// The invoice's patient must be discharged, and the amount must fit in
    /// the remaining balance. Nothing is written when a check fails.
    pub fn add_payment(&self, invoice_id: &str, input: PaymentInput) -> DbResult<Invoice> {
        let tx = self.conn.unchecked_transaction()?;
        let mut invoice = load_invoice(&tx, invoice_id)?;

        if invoice.status == InvoiceStatus::Cancelled {
            return Err(LedgerError::Cancelled(invoice.invoice_number).into());
        }

        let settles = fetch_patient(&tx, &invoice.patient_id)?
            .map(|p| p.can_settle_bills())
            .unwrap_or(false);
        if !settles {
            tracing::info!(
                invoice = %invoice.invoice_number,
                "payment refused: patient not discharged"
            );
            return Err(DbError::NotPermitted(
                "Payment only allowed for discharged patients".into(),
            ));
        }

        let amount = input.amount;
        if let Err(e) = invoice.apply_payment(input) {
            tracing::info!(invoice = %invoice.invoice_number, amount, error = %e, "payment rejected");
            return Err(e.into());
        }

        save_invoice(&tx, &invoice)?;
        tx.commit()?;

        tracing::info!(
            invoice = %invoice.invoice_number,
            amount,
            status = invoice.status.as_str(),
            "payment recorded"
        );
        Ok(invoice)
    }

    /// Cancel an invoice that has no payments.
    pub fn cancel_invoice(&self, invoice_id: &str) -> DbResult<Invoice> {
        let tx = self.conn.unchecked_transaction()?;
        let mut invoice = load_invoice(&tx, invoice_id)?;
        invoice.cancel()?;
        save_invoice(&tx, &invoice)?;
        tx.commit()?;
        Ok(invoice)
    }

    /// Flag unsettled invoices whose due date is before `today` as overdue.
    ///
    /// Returns the number of invoices changed.
    pub fn mark_overdue(&self, today: &str) -> DbResult<usize> {
        super::require_date("today", today)?;
        let changed = self.conn.execute(
            r#"
            UPDATE invoices SET status = 'overdue', updated_at = ?2
            WHERE status IN ('pending', 'partial') AND due_date < ?1
            "#,
            params![today, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(changed)
    }

    /// Totals over the invoices matching the filter.
    pub fn billing_summary(&self, filter: &InvoiceFilter) -> DbResult<BillingSummary> {
        let mut summary = BillingSummary::default();
        for invoice in self.list_invoices(filter)? {
            summary.invoice_count += 1;
            summary.total += invoice.total;
            *summary
                .by_status
                .entry(invoice.status.as_str().to_string())
                .or_insert(0.0) += invoice.total;
        }
        Ok(summary)
    }

    /// Delete an invoice.
    pub fn delete_invoice(&self, invoice_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM invoices WHERE invoice_id = ?", [invoice_id])?;
        Ok(rows_affected > 0)
    }
}

/// Insert a new invoice on an open connection or transaction.
pub(crate) fn insert_invoice(conn: &Connection, new: NewInvoice) -> DbResult<Invoice> {
    if fetch_patient(conn, &new.patient_id)?.is_none() {
        return Err(DbError::NotFound(format!("Patient {} not found", new.patient_id)));
    }

    let number = allocate_invoice_number(conn, chrono::Utc::now().timestamp_millis())?;
    let invoice = Invoice::from_new(new, number)?;

    conn.execute(
        &format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            invoice.invoice_id,
            invoice.invoice_number,
            invoice.patient_id,
            invoice.doctor_id,
            invoice.invoice_date,
            invoice.due_date,
            serde_json::to_string(&invoice.items)?,
            invoice.subtotal,
            invoice.tax,
            invoice.discount,
            invoice.total,
            invoice.status.as_str(),
            invoice.payment_method.map(|m| m.as_str()),
            serde_json::to_string(&invoice.payments)?,
            invoice.notes,
            invoice.created_at,
            invoice.updated_at,
        ],
    )
    .map_err(|e| {
        DbError::on_write(e, || format!("invoice number {} already issued", invoice.invoice_number))
    })?;

    tracing::debug!(invoice = %invoice.invoice_number, total = invoice.total, "invoice created");
    Ok(invoice)
}

/// First free invoice number at or after the one derived from `millis`.
fn allocate_invoice_number(conn: &Connection, millis: i64) -> DbResult<String> {
    let mut candidate = invoice_number_for_millis(millis);
    for _ in 0..MAX_NUMBER_PROBES {
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM invoices WHERE invoice_number = ?)",
            [&candidate],
            |row| row.get(0),
        )?;
        if !taken {
            return Ok(candidate);
        }
        candidate = next_invoice_number(&candidate)
            .ok_or_else(|| DbError::Constraint(format!("malformed invoice number {candidate}")))?;
    }
    Err(DbError::Conflict("no free invoice number".into()))
}

fn fetch_invoice(conn: &Connection, invoice_id: &str) -> DbResult<Option<Invoice>> {
    conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = ?"),
        [invoice_id],
        InvoiceRow::from_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

fn load_invoice(conn: &Connection, invoice_id: &str) -> DbResult<Invoice> {
    fetch_invoice(conn, invoice_id)?.ok_or_else(|| DbError::NotFound(format!("Invoice {invoice_id} not found")))
}

fn save_invoice(conn: &Connection, invoice: &Invoice) -> DbResult<()> {
    conn.execute(
        r#"
        UPDATE invoices SET
            items = ?2,
            subtotal = ?3,
            tax = ?4,
            discount = ?5,
            total = ?6,
            status = ?7,
            payment_method = ?8,
            payments = ?9,
            updated_at = ?10
        WHERE invoice_id = ?1
        "#,
        params![
            invoice.invoice_id,
            serde_json::to_string(&invoice.items)?,
            invoice.subtotal,
            invoice.tax,
            invoice.discount,
            invoice.total,
            invoice.status.as_str(),
            invoice.payment_method.map(|m| m.as_str()),
            serde_json::to_string(&invoice.payments)?,
            invoice.updated_at,
        ],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct InvoiceRow {
    invoice_id: String,
    invoice_number: String,
    patient_id: String,
    doctor_id: Option<String>,
    invoice_date: String,
    due_date: String,
    items: String,
    subtotal: f64,
    tax: f64,
    discount: f64,
    total: f64,
    status: String,
    payment_method: Option<String>,
    payments: String,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl InvoiceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            invoice_id: row.get(0)?,
            invoice_number: row.get(1)?,
            patient_id: row.get(2)?,
            doctor_id: row.get(3)?,
            invoice_date: row.get(4)?,
            due_date: row.get(5)?,
            items: row.get(6)?,
            subtotal: row.get(7)?,
            tax: row.get(8)?,
            discount: row.get(9)?,
            total: row.get(10)?,
            status: row.get(11)?,
            payment_method: row.get(12)?,
            payments: row.get(13)?,
            notes: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = DbError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let items: Vec<LineItem> = serde_json::from_str(&row.items)?;
        let payments: Vec<Payment> = serde_json::from_str(&row.payments)?;
        let status = InvoiceStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown invoice status: {}", row.status)))?;
        let payment_method = row
            .payment_method
            .map(|m| {
                PaymentMethod::parse(&m)
                    .ok_or_else(|| DbError::Constraint(format!("Unknown payment method: {m}")))
            })
            .transpose()?;

        Ok(Invoice {
            invoice_id: row.invoice_id,
            invoice_number: row.invoice_number,
            patient_id: row.patient_id,
            doctor_id: row.doctor_id,
            invoice_date: row.invoice_date,
            due_date: row.due_date,
            items,
            subtotal: row.subtotal,
            tax: row.tax,
            discount: row.discount,
            total: row.total,
            status,
            payment_method,
            payments,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
