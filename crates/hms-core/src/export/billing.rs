//! Invoice export for accounting and patient statements.

use serde::{Deserialize, Serialize};

use crate::db::{Database, DbError, DbResult, InvoiceFilter};
use crate::models::{Invoice, InvoiceStatus, LineItem, Payment};

/// Statement for a single invoice: header, lines, payments and balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceStatement {
    pub invoice_number: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub invoice_date: String,
    pub due_date: String,
    pub status: InvoiceStatus,
    pub items: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    pub amount_paid: f64,
    pub balance_due: f64,
    /// Export timestamp
    pub generated_at: String,
}

impl InvoiceStatement {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        Self {
            invoice_number: invoice.invoice_number.clone(),
            patient_id: invoice.patient_id.clone(),
            doctor_id: invoice.doctor_id.clone(),
            invoice_date: invoice.invoice_date.clone(),
            due_date: invoice.due_date.clone(),
            status: invoice.status,
            items: invoice.items.clone(),
            payments: invoice.payments.clone(),
            subtotal: invoice.subtotal,
            tax: invoice.tax,
            discount: invoice.discount,
            total: invoice.total,
            amount_paid: invoice.amount_paid(),
            balance_due: invoice.balance_due(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV: one row per line item and per payment, then totals.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("invoice_number,kind,description,quantity,unit_price,amount,date\n");

        for item in &self.items {
            csv.push_str(&format!(
                "{},item,{},{},{:.2},{:.2},{}\n",
                escape_csv(&self.invoice_number),
                escape_csv(&item.description),
                item.quantity,
                item.unit_price,
                item.total,
                escape_csv(&self.invoice_date),
            ));
        }

        for payment in &self.payments {
            csv.push_str(&format!(
                "{},payment,{},,,{:.2},{}\n",
                escape_csv(&self.invoice_number),
                payment.method.as_str(),
                payment.amount,
                escape_csv(&payment.paid_at),
            ));
        }

        for (label, amount) in [
            ("subtotal", self.subtotal),
            ("tax", self.tax),
            ("discount", self.discount),
            ("total", self.total),
            ("paid", self.amount_paid),
            ("balance", self.balance_due),
        ] {
            csv.push_str(&format!(
                "{},summary,{label},,,{amount:.2},\n",
                escape_csv(&self.invoice_number)
            ));
        }

        csv
    }
}

/// Batch invoice export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInvoiceExport {
    /// Export timestamp
    pub exported_at: String,
    pub invoices: Vec<Invoice>,
    /// Sum of invoice totals
    pub grand_total: f64,
}

impl BatchInvoiceExport {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format, one row per invoice.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("invoice_number,patient_id,doctor_id,invoice_date,due_date,status,subtotal,tax,discount,total,paid,balance\n");

        for invoice in &self.invoices {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2}\n",
                escape_csv(&invoice.invoice_number),
                escape_csv(&invoice.patient_id),
                escape_csv(invoice.doctor_id.as_deref().unwrap_or("")),
                escape_csv(&invoice.invoice_date),
                escape_csv(&invoice.due_date),
                invoice.status.as_str(),
                invoice.subtotal,
                invoice.tax,
                invoice.discount,
                invoice.total,
                invoice.amount_paid(),
                invoice.balance_due(),
            ));
        }

        csv
    }
}

/// Invoice exporter.
pub struct InvoiceExporter<'a> {
    db: &'a Database,
}

impl<'a> InvoiceExporter<'a> {
    /// Create a new invoice exporter.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Export every invoice, optionally only those with `status`.
    pub fn export_all(&self, status: Option<InvoiceStatus>) -> DbResult<BatchInvoiceExport> {
        let invoices = self.db.list_invoices(&InvoiceFilter {
            status,
            ..Default::default()
        })?;
        let grand_total = invoices.iter().map(|i| i.total).sum();

        Ok(BatchInvoiceExport {
            exported_at: chrono::Utc::now().to_rfc3339(),
            invoices,
            grand_total,
        })
    }

    /// Statement for one invoice.
    pub fn statement(&self, invoice_id: &str) -> DbResult<InvoiceStatement> {
        let invoice = self
            .db
            .get_invoice(invoice_id)?
            .ok_or_else(|| DbError::NotFound(format!("Invoice {invoice_id} not found")))?;
        Ok(InvoiceStatement::from_invoice(&invoice))
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
