//! SQLite schema definition.

/// Complete database schema for the hospital core.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT,
    date_of_birth TEXT,
    status TEXT NOT NULL DEFAULT 'outpatient'
        CHECK (status IN ('outpatient', 'admitted', 'discharged')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- ============================================================================
-- Invoices (items and payments held as JSON arrays on the row)
-- ============================================================================

CREATE TABLE IF NOT EXISTS invoices (
    invoice_id TEXT PRIMARY KEY,
    invoice_number TEXT NOT NULL,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    doctor_id TEXT,
    invoice_date TEXT NOT NULL,                  -- YYYY-MM-DD
    due_date TEXT NOT NULL,                      -- YYYY-MM-DD
    items TEXT NOT NULL DEFAULT '[]',            -- JSON array of LineItem
    subtotal REAL NOT NULL DEFAULT 0,
    tax REAL NOT NULL DEFAULT 0,
    discount REAL NOT NULL DEFAULT 0,
    total REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'partial', 'paid', 'overdue', 'cancelled')),
    payment_method TEXT,
    payments TEXT NOT NULL DEFAULT '[]',         -- JSON array of Payment
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_invoices_number ON invoices(invoice_number);
CREATE INDEX IF NOT EXISTS idx_invoices_patient ON invoices(patient_id);
CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoices(status);

-- ============================================================================
-- Queue Tokens (numbering restarts per department per day)
-- ============================================================================

CREATE TABLE IF NOT EXISTS queue_tokens (
    token_id TEXT PRIMARY KEY,
    department TEXT NOT NULL,
    date TEXT NOT NULL,                          -- YYYY-MM-DD
    token_number INTEGER NOT NULL CHECK (token_number >= 1),
    status TEXT NOT NULL DEFAULT 'waiting'
        CHECK (status IN ('waiting', 'called', 'served', 'skipped')),
    counter TEXT,
    priority TEXT NOT NULL DEFAULT 'normal' CHECK (priority IN ('normal', 'high')),
    patient_id TEXT REFERENCES patients(patient_id),
    created_by TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_department_date_number
    ON queue_tokens(department, date, token_number);
CREATE INDEX IF NOT EXISTS idx_queue_status ON queue_tokens(department, date, status);

-- ============================================================================
-- Staff Roster (one shift per staff member per date)
-- ============================================================================

CREATE TABLE IF NOT EXISTS roster (
    roster_id TEXT PRIMARY KEY,
    staff_id TEXT NOT NULL,
    role TEXT NOT NULL
        CHECK (role IN ('doctor', 'nurse', 'lab', 'receptionist', 'admin')),
    department TEXT,
    date TEXT NOT NULL,                          -- YYYY-MM-DD
    shift TEXT NOT NULL CHECK (shift IN ('morning', 'evening', 'night')),
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_roster_staff_date ON roster(staff_id, date);
CREATE INDEX IF NOT EXISTS idx_roster_date ON roster(date);

-- ============================================================================
-- Discharges
-- ============================================================================

CREATE TABLE IF NOT EXISTS discharges (
    discharge_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    status TEXT NOT NULL DEFAULT 'draft'
        CHECK (status IN ('draft', 'doctor_approved', 'finalized')),
    created_by TEXT NOT NULL,
    approved_by TEXT,
    finalized_by TEXT,
    discharge_date TEXT,
    details TEXT NOT NULL DEFAULT '{}',          -- JSON DischargeDetails
    invoice_id TEXT REFERENCES invoices(invoice_id) ON DELETE SET NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_discharges_patient ON discharges(patient_id);

-- ============================================================================
-- Audit Log (append-only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_log (
    audit_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    action TEXT NOT NULL,
    resource TEXT NOT NULL,
    resource_id TEXT,
    details TEXT,                                -- JSON
    ip_address TEXT,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_user ON audit_log(user_id, timestamp);
CREATE INDEX IF NOT EXISTS idx_audit_resource ON audit_log(resource, timestamp);

CREATE TRIGGER IF NOT EXISTS audit_log_no_update BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'Audit entries are immutable');
END;
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_queue_unique_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO queue_tokens (token_id, department, date, token_number) VALUES ('t1', 'OPD', '2024-05-01', 1)",
            [],
        )
        .unwrap();

        // Same number on the same day in the same department
        let result = conn.execute(
            "INSERT INTO queue_tokens (token_id, department, date, token_number) VALUES ('t2', 'OPD', '2024-05-01', 1)",
            [],
        );
        assert!(result.is_err());

        // Same number on another day is fine
        let result = conn.execute(
            "INSERT INTO queue_tokens (token_id, department, date, token_number) VALUES ('t3', 'OPD', '2024-05-02', 1)",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_roster_unique_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO roster (roster_id, staff_id, role, date, shift) VALUES ('r1', 's1', 'nurse', '2024-05-01', 'morning')",
            [],
        )
        .unwrap();

        // Different shift and role on the same date still collides
        let result = conn.execute(
            "INSERT INTO roster (roster_id, staff_id, role, date, shift) VALUES ('r2', 's1', 'doctor', '2024-05-01', 'night')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_audit_log_immutable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO audit_log (audit_id, user_id, action, resource, timestamp) VALUES ('a1', 'u1', 'create', 'billing', '2024-05-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let result = conn.execute("UPDATE audit_log SET action = 'delete' WHERE audit_id = 'a1'", []);
        assert!(result.is_err());
    }
}
