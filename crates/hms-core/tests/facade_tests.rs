//! Tests through the FFI facade.

use hms_core::{open_database_in_memory, FfiLineItem, FfiNewInvoice, FfiShiftAssignment, HmsError};

#[test]
fn test_patient_invoice_payment() {
    let core = open_database_in_memory().unwrap();
    let patient = core
        .create_patient("Asha Rao".into(), None, Some("1986-03-14".into()))
        .unwrap();
    assert_eq!(patient.status, "outpatient");

    let invoice = core
        .create_invoice(FfiNewInvoice {
            patient_id: patient.patient_id.clone(),
            doctor_id: None,
            items: vec![FfiLineItem {
                description: "Consultation".into(),
                quantity: 1.0,
                unit_price: 80.0,
                total: 0.0,
            }],
            tax: 0.0,
            discount: 0.0,
            due_date: None,
            notes: None,
        })
        .unwrap();
    assert_eq!(invoice.items[0].total, 80.0);

    let refused = core.add_payment(invoice.invoice_id.clone(), 20.0, "cash".into(), None);
    assert!(matches!(refused, Err(HmsError::NotPermitted(_))));

    core.discharge_patient(patient.patient_id).unwrap();
    let paid = core
        .add_payment(invoice.invoice_id.clone(), 80.0, "card".into(), Some("txn-9".into()))
        .unwrap();
    assert_eq!(paid.status, "paid");
    assert_eq!(paid.balance_due, 0.0);

    let bad_method = core.add_payment(invoice.invoice_id, 1.0, "barter".into(), None);
    assert!(matches!(bad_method, Err(HmsError::InvalidInput(_))));

    let csv = core.export_invoices_csv().unwrap();
    assert_eq!(csv.lines().count(), 2);
}

#[test]
fn test_queue_through_facade() {
    let core = open_database_in_memory().unwrap();
    core.issue_token("OPD".into(), None, false).unwrap();
    let second = core.issue_token("OPD".into(), None, true).unwrap();
    assert_eq!(second.token_number, 2);
    assert_eq!(second.priority, "high");

    let called = core.call_next("OPD".into(), Some("Room 2".into())).unwrap();
    assert_eq!(called.token_number, 1);
    assert_eq!(called.status, "called");

    let served = core.set_token_status(called.token_id, "served".into()).unwrap();
    assert_eq!(served.status, "served");
    assert_eq!(core.list_tokens(Some("OPD".into())).unwrap().len(), 2);
}

#[test]
fn test_shift_conflict_through_facade() {
    let core = open_database_in_memory().unwrap();
    let shift = FfiShiftAssignment {
        staff_id: "doc-1".into(),
        role: "doctor".into(),
        department: None,
        date: "2024-05-01".into(),
        shift: "morning".into(),
        notes: None,
    };
    core.create_shift(shift.clone()).unwrap();
    assert!(matches!(core.create_shift(shift.clone()), Err(HmsError::Conflict(_))));

    let bad_role = FfiShiftAssignment {
        role: "janitor".into(),
        ..shift
    };
    assert!(matches!(core.create_shift(bad_role), Err(HmsError::InvalidInput(_))));

    let listed = core
        .list_shifts("2024-05-01".into(), "2024-05-31".into())
        .unwrap();
    assert_eq!(listed.len(), 1);
}
