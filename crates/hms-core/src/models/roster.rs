//! Staff roster models.

use serde::{Deserialize, Serialize};

/// Role a staff member works a shift as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Doctor,
    Nurse,
    Lab,
    Receptionist,
    Admin,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Doctor => "doctor",
            StaffRole::Nurse => "nurse",
            StaffRole::Lab => "lab",
            StaffRole::Receptionist => "receptionist",
            StaffRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "doctor" => Some(StaffRole::Doctor),
            "nurse" => Some(StaffRole::Nurse),
            "lab" => Some(StaffRole::Lab),
            "receptionist" => Some(StaffRole::Receptionist),
            "admin" => Some(StaffRole::Admin),
            _ => None,
        }
    }
}

/// Shift slot within a day, in chronological order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Shift {
    Morning,
    Evening,
    Night,
}

impl Shift {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Evening => "evening",
            Shift::Night => "night",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "morning" => Some(Shift::Morning),
            "evening" => Some(Shift::Evening),
            "night" => Some(Shift::Night),
            _ => None,
        }
    }
}

/// One shift assignment. At most one per (staff, date).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterEntry {
    pub roster_id: String,
    pub staff_id: String,
    pub role: StaffRole,
    pub department: Option<String>,
    /// YYYY-MM-DD
    pub date: String,
    pub shift: Shift,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields of a shift assignment as supplied by a caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShiftAssignment {
    pub staff_id: String,
    pub role: StaffRole,
    pub department: Option<String>,
    pub date: String,
    pub shift: Shift,
    pub notes: Option<String>,
}

impl RosterEntry {
    pub fn new(assignment: ShiftAssignment) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            roster_id: uuid::Uuid::new_v4().to_string(),
            staff_id: assignment.staff_id,
            role: assignment.role,
            department: assignment.department,
            date: assignment.date,
            shift: assignment.shift,
            notes: assignment.notes,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
