//! Patient models.

use serde::{Deserialize, Serialize};

/// Where a patient currently stands with respect to inpatient care.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionStatus {
    /// Seen without admission
    Outpatient,
    /// Currently occupying a bed
    Admitted,
    /// Discharge finalized; billing may now be settled
    Discharged,
}

impl AdmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionStatus::Outpatient => "outpatient",
            AdmissionStatus::Admitted => "admitted",
            AdmissionStatus::Discharged => "discharged",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "outpatient" => Some(AdmissionStatus::Outpatient),
            "admitted" => Some(AdmissionStatus::Admitted),
            "discharged" => Some(AdmissionStatus::Discharged),
            _ => None,
        }
    }
}

/// A patient record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// UUID, generated on creation
    pub patient_id: String,
    /// Full name
    pub name: String,
    /// Contact phone number
    pub phone: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    pub date_of_birth: Option<String>,
    /// Admission status
    pub status: AdmissionStatus,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new outpatient record.
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            patient_id: uuid::Uuid::new_v4().to_string(),
            name,
            phone: None,
            date_of_birth: None,
            status: AdmissionStatus::Outpatient,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Payments are only accepted once the patient has been discharged.
    pub fn can_settle_bills(&self) -> bool {
        self.status == AdmissionStatus::Discharged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("Asha Rao".into());
        assert_eq!(patient.name, "Asha Rao");
        assert_eq!(patient.status, AdmissionStatus::Outpatient);
        assert!(!patient.can_settle_bills());
        assert_eq!(patient.patient_id.len(), 36);
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            AdmissionStatus::Outpatient,
            AdmissionStatus::Admitted,
            AdmissionStatus::Discharged,
        ] {
            assert_eq!(AdmissionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AdmissionStatus::parse("transferred"), None);
    }
}
