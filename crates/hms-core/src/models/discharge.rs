//! Discharge summary models.

use serde::{Deserialize, Serialize};

/// Discharge workflow state: draft, then doctor approval, then finalization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DischargeStatus {
    Draft,
    DoctorApproved,
    Finalized,
}

impl DischargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DischargeStatus::Draft => "draft",
            DischargeStatus::DoctorApproved => "doctor_approved",
            DischargeStatus::Finalized => "finalized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DischargeStatus::Draft),
            "doctor_approved" => Some(DischargeStatus::DoctorApproved),
            "finalized" => Some(DischargeStatus::Finalized),
            _ => None,
        }
    }
}

/// Clinical content of a discharge summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DischargeDetails {
    pub admission_date: Option<String>,
    pub diagnosis_summary: Option<String>,
    pub treatment_summary: Option<String>,
    pub lab_summary: Option<String>,
    pub advice: Option<String>,
    pub follow_up_date: Option<String>,
}

/// A patient's discharge summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discharge {
    pub discharge_id: String,
    pub patient_id: String,
    pub status: DischargeStatus,
    pub created_by: String,
    pub approved_by: Option<String>,
    pub finalized_by: Option<String>,
    pub discharge_date: Option<String>,
    #[serde(flatten)]
    pub details: DischargeDetails,
    /// Package invoice raised at finalization, if any
    pub invoice_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Discharge {
    pub fn new(patient_id: String, created_by: String, details: DischargeDetails) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            discharge_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            status: DischargeStatus::Draft,
            created_by,
            approved_by: None,
            finalized_by: None,
            discharge_date: None,
            details,
            invoice_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_discharge_is_draft() {
        let discharge = Discharge::new("p1".into(), "nurse-1".into(), DischargeDetails::default());
        assert_eq!(discharge.status, DischargeStatus::Draft);
        assert!(discharge.approved_by.is_none());
        assert!(discharge.invoice_id.is_none());
    }

    #[test]
    fn test_details_flattened_in_json() {
        let details = DischargeDetails {
            advice: Some("Rest for a week".into()),
            ..Default::default()
        };
        let discharge = Discharge::new("p1".into(), "nurse-1".into(), details);
        let json = serde_json::to_value(&discharge).unwrap();
        assert_eq!(json["advice"], "Rest for a week");
        assert_eq!(json["status"], "draft");
    }
}
