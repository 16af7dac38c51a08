//! HTTP integration tests driving the router in-process.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use hms_api::auth::{issue_token, Role};
use hms_api::{app, ApiConfig, AppState};
use hms_core::Database;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

fn token(user: &str, role: Role) -> String {
    issue_token(SECRET, user, role, chrono::Duration::hours(1)).unwrap()
}

impl TestApp {
    fn new() -> Self {
        let state = AppState::new(
            Database::open_in_memory().unwrap(),
            ApiConfig::for_testing(SECRET),
        );
        Self { router: app(state) }
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        Reply { status, headers, body }
    }

    async fn get(&self, uri: &str, token: &str) -> Reply {
        self.send(Method::GET, uri, Some(token), None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> Reply {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    async fn create_patient(&self, token: &str, name: &str) -> String {
        let reply = self.post("/api/patients", token, json!({ "name": name })).await;
        assert_eq!(reply.status, StatusCode::CREATED);
        reply.json()["patient_id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "ok");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() {
    let app = TestApp::new();

    let reply = app.send(Method::GET, "/api/billing", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let forged = issue_token("other-secret", "u1", Role::Admin, chrono::Duration::hours(1)).unwrap();
    let reply = app.get("/api/billing", &forged).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let app = TestApp::new();
    let admin = token("admin-1", Role::Admin);
    let lab = token("lab-1", Role::Lab);
    let patient_id = app.create_patient(&admin, "Ravi Kumar").await;

    let reply = app
        .post(
            "/api/billing",
            &lab,
            json!({
                "patient_id": patient_id,
                "items": [{ "description": "X-ray", "quantity": 1, "unit_price": 40 }],
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app.get("/api/audit-logs", &lab).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invoice_payment_flow() {
    let app = TestApp::new();
    let desk = token("desk-1", Role::Receptionist);
    let patient_id = app.create_patient(&desk, "Asha Rao").await;

    let reply = app
        .post(
            "/api/billing",
            &desk,
            json!({
                "patient_id": patient_id,
                "doctor_id": "doc-1",
                "items": [
                    { "description": "Consultation", "quantity": 2, "unit_price": 50 },
                    { "description": "Blood panel", "quantity": 1, "unit_price": 30 },
                ],
                "tax": 10,
                "discount": 5,
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let invoice = reply.json();
    assert_eq!(invoice["total"], 135.0);
    assert_eq!(invoice["status"], "pending");
    let payment_uri = format!("/api/billing/{}/payment", invoice["invoice_id"].as_str().unwrap());

    let reply = app
        .post(&payment_uri, &desk, json!({ "amount": 100, "method": "cash" }))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .post(&format!("/api/patients/{patient_id}/discharge"), &desk, json!({}))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "discharged");

    let reply = app
        .post(&payment_uri, &desk, json!({ "amount": 100, "method": "cash" }))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "partial");

    let reply = app
        .post(&payment_uri, &desk, json!({ "amount": 40, "method": "card" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["field"], "amount");

    let reply = app
        .post(&payment_uri, &desk, json!({ "amount": 35, "method": "card" }))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let paid = reply.json();
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["payment_method"], "card");
    assert_eq!(paid["payments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invoice_validation_names_field() {
    let app = TestApp::new();
    let desk = token("desk-1", Role::Receptionist);
    let patient_id = app.create_patient(&desk, "Asha Rao").await;

    let reply = app
        .post("/api/billing", &desk, json!({ "patient_id": patient_id, "items": [] }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["field"], "items");

    let reply = app.get("/api/billing/missing", &desk).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_queue_numbers_and_call_next() {
    let app = TestApp::new();
    let desk = token("desk-1", Role::Receptionist);
    let doctor = token("doc-1", Role::Doctor);

    for expected in 1..=3 {
        let reply = app
            .post("/api/queue", &desk, json!({ "department": "OPD" }))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(reply.json()["token_number"], expected);
    }

    let reply = app
        .post("/api/queue/call-next", &doctor, json!({ "department": "OPD", "counter": "Room 2" }))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let called = reply.json();
    assert_eq!(called["token_number"], 1);
    assert_eq!(called["status"], "called");
    assert_eq!(called["counter"], "Room 2");

    let reply = app
        .post(
            &format!("/api/queue/{}/status", called["token_id"].as_str().unwrap()),
            &doctor,
            json!({ "status": "finished" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["field"], "status");

    let reply = app.get("/api/queue?department=OPD&status=waiting", &desk).await;
    assert_eq!(reply.json().as_array().unwrap().len(), 2);

    let reply = app
        .post("/api/queue/call-next", &doctor, json!({ "department": "Radiology" }))
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.post("/api/queue", &desk, json!({ "department": "  " })).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["field"], "department");
}

#[tokio::test]
async fn test_roster_duplicate_is_conflict() {
    let app = TestApp::new();
    let nurse = token("nurse-1", Role::Nurse);
    let shift = json!({
        "staff_id": "nurse-7",
        "role": "nurse",
        "department": "Ward A",
        "date": "2026-03-01",
        "shift": "morning",
    });

    let reply = app.post("/api/roster", &nurse, shift.clone()).await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let reply = app.post("/api/roster", &nurse, shift).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let reply = app
        .get("/api/roster?start=2026-03-01&end=2026-03-31&role=nurse", &nurse)
        .await;
    assert_eq!(reply.json().as_array().unwrap().len(), 1);

    let reply = app
        .send(Method::DELETE, "/api/roster/missing", Some(&nurse), None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_billing_export_csv() {
    let app = TestApp::new();
    let desk = token("desk-1", Role::Receptionist);
    let patient_id = app.create_patient(&desk, "Asha Rao").await;
    let reply = app
        .post(
            "/api/billing",
            &desk,
            json!({
                "patient_id": patient_id,
                "items": [{ "description": "Consultation", "quantity": 1, "unit_price": 80 }],
            }),
        )
        .await;
    let number = reply.json()["invoice_number"].as_str().unwrap().to_string();

    let reply = app.get("/api/export/billing?format=csv", &desk).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    let body = reply.text();
    assert!(body.contains(&number));
    assert_eq!(body.lines().count(), 2);

    let reply = app.get("/api/export/billing?format=xml", &desk).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_discharge_workflow_raises_package_invoice() {
    let app = TestApp::new();
    let doctor = token("doc-1", Role::Doctor);
    let nurse = token("nurse-1", Role::Nurse);
    let patient_id = app.create_patient(&nurse, "Meera Iyer").await;

    let reply = app
        .post(
            "/api/discharge",
            &doctor,
            json!({
                "patient_id": patient_id,
                "admission_date": "2026-02-20",
                "diagnosis_summary": "Community acquired pneumonia",
                "follow_up_date": "2026-03-10",
            }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let draft = reply.json();
    assert_eq!(draft["status"], "draft");
    let id = draft["discharge_id"].as_str().unwrap().to_string();

    let reply = app
        .post(&format!("/api/discharge/{id}/finalize"), &nurse, json!({ "package_price": 500 }))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .post(&format!("/api/discharge/{id}/approve-doctor"), &nurse, json!({}))
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = app
        .post(&format!("/api/discharge/{id}/approve-doctor"), &doctor, json!({}))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["status"], "doctor_approved");

    let reply = app
        .post(
            &format!("/api/discharge/{id}/finalize"),
            &nurse,
            json!({ "package_price": 500, "discharge_date": "2026-03-01" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let finalized = reply.json();
    assert_eq!(finalized["status"], "finalized");
    assert_eq!(finalized["discharge_date"], "2026-03-01");
    let invoice_id = finalized["invoice_id"].as_str().unwrap();

    let reply = app.get(&format!("/api/billing/{invoice_id}"), &nurse).await;
    assert_eq!(reply.status, StatusCode::OK);
    let invoice = reply.json();
    assert_eq!(invoice["total"], 500.0);
    assert_eq!(invoice["doctor_id"], "doc-1");

    let reply = app.get(&format!("/api/patients/{patient_id}"), &nurse).await;
    assert_eq!(reply.json()["status"], "discharged");
}

#[tokio::test]
async fn test_audit_log_records_mutations() {
    let app = TestApp::new();
    let admin = token("admin-1", Role::Admin);
    let patient_id = app.create_patient(&admin, "Ravi Kumar").await;
    app.post("/api/queue", &admin, json!({ "department": "OPD" })).await;

    let reply = app.get("/api/audit-logs?resource=patients", &admin).await;
    assert_eq!(reply.status, StatusCode::OK);
    let entries = reply.json();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "create");
    assert_eq!(entries[0]["user_id"], "admin-1");
    assert_eq!(entries[0]["resource_id"], patient_id.as_str());
    assert_eq!(entries[0]["details"]["method"], "POST");

    let reply = app.get("/api/audit-logs?limit=1", &admin).await;
    assert_eq!(reply.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_bodies_are_json_validation_errors() {
    let app = TestApp::new();
    let nurse = token("nurse-1", Role::Nurse);
    let desk = token("desk-1", Role::Receptionist);
    let patient = token("pt-1", Role::Patient);

    let reply = app
        .post("/api/roster", &nurse, json!({ "staff_id": "s1", "date": "2026-05-01" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    assert!(reply.json()["message"].as_str().unwrap().contains("role"));

    let reply = app
        .post("/api/billing/any/payment", &desk, json!({ "amount": 10, "method": "bitcoin" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["message"].as_str().unwrap().contains("bitcoin"));

    let reply = app.post("/api/billing", &patient, json!({ "bogus": 1 })).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_finalize_body_is_optional_but_must_be_valid() {
    let app = TestApp::new();
    let doctor = token("doc-1", Role::Doctor);
    let nurse = token("nurse-1", Role::Nurse);
    let patient_id = app.create_patient(&nurse, "Meera Iyer").await;

    let reply = app
        .post("/api/discharge", &doctor, json!({ "patient_id": patient_id }))
        .await;
    let id = reply.json()["discharge_id"].as_str().unwrap().to_string();
    app.post(&format!("/api/discharge/{id}/approve-doctor"), &doctor, json!({}))
        .await;

    let reply = app
        .post(&format!("/api/discharge/{id}/finalize"), &nurse, json!({ "package_price": "lots" }))
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);

    let reply = app
        .send(Method::POST, &format!("/api/discharge/{id}/finalize"), Some(&nurse), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let finalized = reply.json();
    assert_eq!(finalized["status"], "finalized");
    assert!(finalized["invoice_id"].is_null());
}
