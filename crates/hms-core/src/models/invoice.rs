//! Invoice models and the payment ledger arithmetic.
//!
//! An invoice carries its own ledger: the list of payments appended to it.
//! The amounts obey three rules that every mutation here preserves:
//!
//! - `total = subtotal + tax - discount`
//! - `sum(payments) <= total`
//! - `status` is derived from `sum(payments)` against `total`

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of every generated invoice number.
pub const INVOICE_PREFIX: &str = "INV-";

/// Invoice numbers keep the low-order 8 digits of the creation timestamp.
const INVOICE_SUFFIX_MODULUS: i64 = 100_000_000;

/// Slack allowed when comparing money amounts held as `f64`.
pub const LEDGER_TOLERANCE: f64 = 1e-6;

/// Days between invoice date and the default due date.
pub const DEFAULT_DUE_DAYS: i64 = 30;

/// Ledger rule violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invoice must have at least one line item")]
    NoLineItems,

    #[error("Invalid line item {index}: {reason}")]
    InvalidLineItem { index: usize, reason: String },

    #[error("Invalid {field}: {value}")]
    InvalidAmount { field: &'static str, value: f64 },

    #[error("Discount {discount} exceeds subtotal plus tax {gross}")]
    DiscountExceedsGross { discount: f64, gross: f64 },

    #[error("Invalid due date: {0}")]
    InvalidDueDate(String),

    #[error("Payment amount must be positive, got {0}")]
    NonPositivePayment(f64),

    #[error("Payment exceeds remaining balance: amount {amount}, remaining {remaining}")]
    Overpayment { amount: f64, remaining: f64 },

    #[error("Invoice {0} is cancelled")]
    Cancelled(String),

    #[error("Invoice {0} already has payments recorded")]
    PaymentsRecorded(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Invoice status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Nothing paid yet
    Pending,
    /// Some, but not all, of the total paid
    Partial,
    /// Fully settled
    Paid,
    /// Unsettled past the due date
    Overdue,
    /// Withdrawn before any payment
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvoiceStatus::Pending),
            "partial" => Some(InvoiceStatus::Partial),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Insurance,
    Online,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Insurance => "insurance",
            PaymentMethod::Online => "online",
            PaymentMethod::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PaymentMethod::Cash),
            "card" => Some(PaymentMethod::Card),
            "insurance" => Some(PaymentMethod::Insurance),
            "online" => Some(PaymentMethod::Online),
            "other" => Some(PaymentMethod::Other),
            _ => None,
        }
    }
}

/// A billable line as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

/// A stored line item with its computed total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// `quantity * unit_price`
    pub total: f64,
}

/// A recorded payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub payment_id: String,
    pub amount: f64,
    pub paid_at: String,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

/// A payment request against an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentInput {
    pub amount: f64,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

/// Parameters for creating an invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewInvoice {
    pub patient_id: String,
    pub doctor_id: Option<String>,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub discount: f64,
    /// YYYY-MM-DD; defaults to 30 days from today
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

/// Monetary totals of an invoice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
}

/// An invoice with its payment ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub invoice_id: String,
    /// Human-readable number, e.g. `INV-48213907`
    pub invoice_number: String,
    pub patient_id: String,
    pub doctor_id: Option<String>,
    /// YYYY-MM-DD
    pub invoice_date: String,
    /// YYYY-MM-DD
    pub due_date: String,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
    pub status: InvoiceStatus,
    /// Method of the most recent payment
    pub payment_method: Option<PaymentMethod>,
    pub payments: Vec<Payment>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Invoice {
    /// Build a pending invoice from caller input and an allocated number.
    pub fn from_new(new: NewInvoice, invoice_number: String) -> LedgerResult<Self> {
        let (items, totals) = compute_totals(&new.items, new.tax, new.discount)?;

        let today = Utc::now().date_naive();
        let due_date = match new.due_date {
            Some(date) => parse_date(&date)
                .ok_or_else(|| LedgerError::InvalidDueDate(date.clone()))?
                .format("%Y-%m-%d")
                .to_string(),
            None => (today + Duration::days(DEFAULT_DUE_DAYS))
                .format("%Y-%m-%d")
                .to_string(),
        };

        let now = Utc::now().to_rfc3339();
        Ok(Self {
            invoice_id: uuid::Uuid::new_v4().to_string(),
            invoice_number,
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            invoice_date: today.format("%Y-%m-%d").to_string(),
            due_date,
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            total: totals.total,
            status: InvoiceStatus::Pending,
            payment_method: None,
            payments: Vec::new(),
            notes: new.notes,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Sum of all recorded payments.
    pub fn amount_paid(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Amount still owed, never negative.
    pub fn balance_due(&self) -> f64 {
        (self.total - self.amount_paid()).max(0.0)
    }

    /// Append a payment if it fits within the remaining balance.
    ///
    /// On error the invoice is left untouched.
    pub fn apply_payment(&mut self, input: PaymentInput) -> LedgerResult<Payment> {
        if self.status == InvoiceStatus::Cancelled {
            return Err(LedgerError::Cancelled(self.invoice_number.clone()));
        }
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(LedgerError::NonPositivePayment(input.amount));
        }

        let remaining = self.total - self.amount_paid();
        if input.amount > remaining + LEDGER_TOLERANCE {
            return Err(LedgerError::Overpayment {
                amount: input.amount,
                remaining: remaining.max(0.0),
            });
        }

        let payment = Payment {
            payment_id: uuid::Uuid::new_v4().to_string(),
            amount: input.amount,
            paid_at: Utc::now().to_rfc3339(),
            method: input.method,
            transaction_id: input.transaction_id,
            notes: input.notes,
        };
        self.payments.push(payment.clone());
        self.payment_method = Some(input.method);
        self.status = status_for(self.total, self.amount_paid());
        self.touch();

        Ok(payment)
    }

    /// Replace the line items (and optionally tax and discount).
    ///
    /// Only allowed before any payment has been recorded.
    pub fn replace_items(
        &mut self,
        items: &[LineItemInput],
        tax: Option<f64>,
        discount: Option<f64>,
    ) -> LedgerResult<()> {
        if self.status == InvoiceStatus::Cancelled {
            return Err(LedgerError::Cancelled(self.invoice_number.clone()));
        }
        if !self.payments.is_empty() {
            return Err(LedgerError::PaymentsRecorded(self.invoice_number.clone()));
        }

        let (lines, totals) = compute_totals(
            items,
            tax.unwrap_or(self.tax),
            discount.unwrap_or(self.discount),
        )?;

        self.items = lines;
        self.subtotal = totals.subtotal;
        self.tax = totals.tax;
        self.discount = totals.discount;
        self.total = totals.total;
        self.touch();
        Ok(())
    }

    /// Withdraw the invoice. Only allowed before any payment.
    pub fn cancel(&mut self) -> LedgerResult<()> {
        if !self.payments.is_empty() {
            return Err(LedgerError::PaymentsRecorded(self.invoice_number.clone()));
        }
        self.status = InvoiceStatus::Cancelled;
        self.touch();
        Ok(())
    }

    /// Whether the overdue sweep should flag this invoice on `today`.
    pub fn is_overdue_on(&self, today: &str) -> bool {
        matches!(self.status, InvoiceStatus::Pending | InvoiceStatus::Partial)
            && self.due_date.as_str() < today
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }
}

/// Price the items and derive subtotal and total.
pub fn compute_totals(
    items: &[LineItemInput],
    tax: f64,
    discount: f64,
) -> LedgerResult<(Vec<LineItem>, Totals)> {
    if items.is_empty() {
        return Err(LedgerError::NoLineItems);
    }
    if !tax.is_finite() || tax < 0.0 {
        return Err(LedgerError::InvalidAmount { field: "tax", value: tax });
    }
    if !discount.is_finite() || discount < 0.0 {
        return Err(LedgerError::InvalidAmount {
            field: "discount",
            value: discount,
        });
    }

    let mut lines = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if !item.quantity.is_finite() || item.quantity < 0.0 {
            return Err(LedgerError::InvalidLineItem {
                index,
                reason: format!("quantity {}", item.quantity),
            });
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(LedgerError::InvalidLineItem {
                index,
                reason: format!("unit price {}", item.unit_price),
            });
        }
        lines.push(LineItem {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.quantity * item.unit_price,
        });
    }

    let subtotal: f64 = lines.iter().map(|l| l.total).sum();
    let gross = subtotal + tax;
    if discount > gross + LEDGER_TOLERANCE {
        return Err(LedgerError::DiscountExceedsGross { discount, gross });
    }

    Ok((
        lines,
        Totals {
            subtotal,
            tax,
            discount,
            total: subtotal + tax - discount,
        },
    ))
}

/// Status implied by the amount paid against the total.
///
/// Nothing paid is always `Pending`, even for a zero total.
pub fn status_for(total: f64, paid: f64) -> InvoiceStatus {
    if paid <= LEDGER_TOLERANCE {
        InvoiceStatus::Pending
    } else if paid + LEDGER_TOLERANCE >= total {
        InvoiceStatus::Paid
    } else {
        InvoiceStatus::Partial
    }
}

/// Invoice number derived from a Unix timestamp in milliseconds.
pub fn invoice_number_for_millis(millis: i64) -> String {
    format!(
        "{}{:08}",
        INVOICE_PREFIX,
        millis.rem_euclid(INVOICE_SUFFIX_MODULUS)
    )
}

/// The number following `number`, wrapping within the 8-digit suffix space.
pub fn next_invoice_number(number: &str) -> Option<String> {
    let suffix: i64 = number.strip_prefix(INVOICE_PREFIX)?.parse().ok()?;
    Some(invoice_number_for_millis(suffix + 1))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
