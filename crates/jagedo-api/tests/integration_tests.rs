//! # Integration Tests for jagedo-api
//!
//! Drives the router end to end: health probes, caller headers, the
//! competitive and restricted lifecycles, error mapping, outbound events,
//! metrics, and the OpenAPI document.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use jagedo_api::state::{AppConfig, AppState};

/// Helper: build the test app with the default configuration.
fn test_app() -> axum::Router {
    jagedo_api::app(AppState::new().unwrap())
}

/// A caller's headers.
#[derive(Clone, Copy)]
struct As<'a> {
    role: &'a str,
    id: &'a str,
}

const CUSTOMER: As<'static> = As {
    role: "CUSTOMER",
    id: "11111111-1111-4111-8111-111111111111",
};
const ADMIN: As<'static> = As {
    role: "ADMIN",
    id: "22222222-2222-4222-8222-222222222222",
};
const CONTRACTOR: As<'static> = As {
    role: "CONTRACTOR",
    id: "33333333-3333-4333-8333-333333333333",
};
const OTHER_CONTRACTOR: As<'static> = As {
    role: "CONTRACTOR",
    id: "44444444-4444-4444-8444-444444444444",
};

fn post(uri: &str, caller: As<'_>, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-caller-role", caller.role)
        .header("x-caller-id", caller.id);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn get(uri: &str, caller: As<'_>) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-caller-role", caller.role)
        .header("x-caller-id", caller.id)
        .body(Body::empty())
        .unwrap()
}

/// Helper: send a request and decode the JSON body.
async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

fn contractor_job(managed_by: &str) -> Value {
    json!({
        "kind": "JOB",
        "category": "CONTRACTOR",
        "managed_by": managed_by,
        "title": "Four-bedroom villa, Kitengela"
    })
}

/// Create a contractor job and move it into BIDDING; returns its id.
async fn bidding_request(app: &axum::Router, managed_by: &str) -> String {
    let (status, body) = send(app, post("/v1/requests", CUSTOMER, Some(contractor_job(managed_by)))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_string();
    for (path, caller) in [("submit", CUSTOMER), ("review", ADMIN), ("assignment/competitive", ADMIN)] {
        let (status, _) = send(app, post(&format!("/v1/requests/{id}/{path}"), caller, None)).await;
        assert_eq!(status, StatusCode::OK, "{path}");
    }
    id
}

fn bid_body(total: &str) -> Value {
    json!({
        "total_amount": total,
        "commission_rate": "0.10",
        "milestone_plan": [
            {"name": "Foundation", "percentage_disbursement": 30},
            {"name": "Walling", "percentage_disbursement": 40},
            {"name": "Roofing", "percentage_disbursement": 30}
        ]
    })
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Request::builder().uri("/health/liveness").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn test_readiness_probe() {
    let app = test_app();
    let (status, body) = send(
        &app,
        Request::builder().uri("/health/readiness").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

// -- Caller headers -----------------------------------------------------------

#[tokio::test]
async fn test_missing_caller_headers_are_rejected() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/requests")
        .header("content-type", "application/json")
        .body(Body::from(contractor_job("SELF").to_string()))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_role_is_rejected() {
    let app = test_app();
    let caller = As {
        role: "PLUMBER",
        id: CUSTOMER.id,
    };
    let (status, _) = send(&app, post("/v1/requests", caller, Some(contractor_job("SELF")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// -- Competitive lifecycle ----------------------------------------------------

#[tokio::test]
async fn test_competitive_job_end_to_end() {
    let app = test_app();
    let id = bidding_request(&app, "SELF").await;

    // Two bids; the cheaper one wins.
    let (status, winner) = send(
        &app,
        post(&format!("/v1/requests/{id}/bids"), CONTRACTOR, Some(bid_body("100000.00"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(winner["jagedo_commission"], "10000.00");
    assert_eq!(winner["payable_to_provider"], "90000.00");
    let (status, loser) = send(
        &app,
        post(&format!("/v1/requests/{id}/bids"), OTHER_CONTRACTOR, Some(bid_body("120000.00"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let winner_id = winner["id"].as_str().unwrap();
    let (status, request) = send(
        &app,
        post(&format!("/v1/requests/{id}/bids/{winner_id}/accept"), CUSTOMER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["stage"], "ASSIGNED");
    assert_eq!(request["accepted_bid_id"], winner["id"]);

    let (_, bids) = send(&app, get(&format!("/v1/requests/{id}/bids"), CUSTOMER)).await;
    let loser_status = bids
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["id"] == loser["id"])
        .map(|b| b["status"].clone());
    assert_eq!(loser_status, Some(json!("REJECTED")));

    // Customer view of a SELF-managed job carries the 20% discount.
    let (status, quote) = send(&app, get(&format!("/v1/requests/{id}/quote"), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["discount"], "20000.00");
    assert_eq!(quote["discounted_total"], "80000.00");
    let (_, provider_quote) = send(&app, get(&format!("/v1/requests/{id}/quote"), CONTRACTOR)).await;
    assert_eq!(provider_quote["discount"], "0.00");

    let (status, _) = send(&app, post(&format!("/v1/requests/{id}/begin"), ADMIN, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, milestones) = send(&app, get(&format!("/v1/bids/{winner_id}/milestones"), CUSTOMER)).await;
    assert_eq!(status, StatusCode::OK);
    let milestones = milestones.as_array().unwrap().clone();
    let amounts: Vec<_> = milestones.iter().map(|m| m["amount"].clone()).collect();
    assert_eq!(amounts, vec![json!("30000.00"), json!("40000.00"), json!("30000.00")]);

    for milestone in &milestones {
        let mid = milestone["id"].as_str().unwrap();
        let (status, approved) = send(&app, post(&format!("/v1/milestones/{mid}/approve"), CONTRACTOR, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["status"], "APPROVED");

        let (status, payment) = send(
            &app,
            post(
                &format!("/v1/milestones/{mid}/payments"),
                ADMIN,
                Some(json!({"amount": milestone["amount"], "payment_type": "MILESTONE"})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let pid = payment["id"].as_str().unwrap();

        let (status, completed) = send(&app, post(&format!("/v1/payments/{pid}/complete"), ADMIN, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(completed["status"], "COMPLETED");

        let (status, confirmed) = send(&app, post(&format!("/v1/payments/{pid}/confirm"), ADMIN, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(confirmed["payment"]["approved"], true);
        assert_eq!(confirmed["milestone"]["status"], "PAID");
    }

    let (_, request) = send(&app, get(&format!("/v1/requests/{id}"), CUSTOMER)).await;
    assert_eq!(request["stage"], "COMPLETE");
    let (_, payments) = send(&app, get(&format!("/v1/requests/{id}/payments"), ADMIN)).await;
    assert_eq!(payments.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_replayed_review_keeps_version() {
    let app = test_app();
    let (_, created) = send(&app, post("/v1/requests", CUSTOMER, Some(contractor_job("JAGEDO")))).await;
    let id = created["id"].as_str().unwrap();
    send(&app, post(&format!("/v1/requests/{id}/submit"), CUSTOMER, None)).await;

    let (_, first) = send(&app, post(&format!("/v1/requests/{id}/review"), ADMIN, None)).await;
    let (status, second) = send(&app, post(&format!("/v1/requests/{id}/review"), ADMIN, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["stage"], "UNDERREVIEW");
    assert_eq!(second["version"], first["version"]);
}

// -- Restricted lifecycle -----------------------------------------------------

#[tokio::test]
async fn test_fundi_job_is_assigned_directly() {
    let app = test_app();
    let job = json!({
        "kind": "JOB",
        "category": "FUNDI",
        "managed_by": "SELF",
        "title": "Fix leaking roof"
    });
    let (_, created) = send(&app, post("/v1/requests", CUSTOMER, Some(job))).await;
    let id = created["id"].as_str().unwrap();
    send(&app, post(&format!("/v1/requests/{id}/submit"), CUSTOMER, None)).await;
    send(&app, post(&format!("/v1/requests/{id}/review"), ADMIN, None)).await;

    // Fundi jobs never go to bidding; with no ids there is nobody to assign.
    let (status, body) = send(&app, post(&format!("/v1/requests/{id}/assignment/competitive"), ADMIN, None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "NO_CANDIDATE_PROVIDERS");

    let fundi = "55555555-5555-4555-8555-555555555555";
    let (status, assigned) = send(
        &app,
        post(
            &format!("/v1/requests/{id}/assignment/restricted"),
            ADMIN,
            Some(json!({"provider_ids": [fundi]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["stage"], "ASSIGNED");
    assert_eq!(assigned["assignment_method"], "RESTRICTED");
    assert_eq!(assigned["assigned_provider_ids"], json!([fundi]));
    assert_eq!(assigned["accepted_bid_id"], Value::Null);

    send(&app, post(&format!("/v1/requests/{id}/begin"), ADMIN, None)).await;
    let (status, done) = send(&app, post(&format!("/v1/requests/{id}/complete"), ADMIN, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["stage"], "COMPLETE");
}

// -- Error mapping ------------------------------------------------------------

#[tokio::test]
async fn test_unknown_request_is_404() {
    let app = test_app();
    let (status, body) = send(
        &app,
        get("/v1/requests/00000000-0000-4000-8000-000000000000", CUSTOMER),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_transition_is_409_with_details() {
    let app = test_app();
    let (_, created) = send(&app, post("/v1/requests", CUSTOMER, Some(contractor_job("SELF")))).await;
    let id = created["id"].as_str().unwrap();
    let (status, body) = send(&app, post(&format!("/v1/requests/{id}/begin"), ADMIN, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
    assert_eq!(body["error"]["details"]["from"], "DRAFT");
    assert_eq!(body["error"]["details"]["command"], "begin");
}

#[tokio::test]
async fn test_recall_rules() {
    let app = test_app();
    let id = bidding_request(&app, "JAGEDO").await;

    let (status, body) = send(
        &app,
        post(&format!("/v1/requests/{id}/recall"), CUSTOMER, Some(json!({"reason": "  "}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "MISSING_REASON");

    let (status, body) = send(
        &app,
        post(
            &format!("/v1/requests/{id}/recall"),
            CUSTOMER,
            Some(json!({"reason": "Project postponed"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "RECALLED");
    assert_eq!(body["recall_reason"], "Project postponed");
}

#[tokio::test]
async fn test_bad_milestone_plan_is_422() {
    let app = test_app();
    let id = bidding_request(&app, "SELF").await;
    let body = json!({
        "total_amount": "50000.00",
        "commission_rate": "0.10",
        "milestone_plan": [
            {"name": "Start", "percentage_disbursement": 50},
            {"name": "Finish", "percentage_disbursement": 40}
        ]
    });
    let (status, body) = send(&app, post(&format!("/v1/requests/{id}/bids"), CONTRACTOR, Some(body))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "PERCENTAGE_MISMATCH");
}

#[tokio::test]
async fn test_fractional_milestone_plan_is_accepted() {
    let app = test_app();
    let id = bidding_request(&app, "SELF").await;
    let body = json!({
        "total_amount": "100.00",
        "commission_rate": "0.10",
        "milestone_plan": [
            {"name": "Deposit", "percentage_disbursement": 33.33},
            {"name": "Works", "percentage_disbursement": "33.33"},
            {"name": "Handover", "percentage_disbursement": 33.34}
        ]
    });
    let (status, bid) = send(&app, post(&format!("/v1/requests/{id}/bids"), CONTRACTOR, Some(body))).await;
    assert_eq!(status, StatusCode::CREATED);
    let bid_id = bid["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        post(&format!("/v1/requests/{id}/bids/{bid_id}/accept"), CUSTOMER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, milestones) = send(&app, get(&format!("/v1/bids/{bid_id}/milestones"), CUSTOMER)).await;
    let milestones = milestones.as_array().unwrap();
    let amounts: Vec<_> = milestones.iter().map(|m| m["amount"].clone()).collect();
    assert_eq!(amounts, vec![json!("33.33"), json!("33.33"), json!("33.34")]);
    assert_eq!(milestones[2]["percentage_disbursement"], json!(33.34));
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/requests")
        .header("x-caller-role", CUSTOMER.role)
        .header("x-caller-id", CUSTOMER.id)
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// -- Events, metrics, OpenAPI -------------------------------------------------

#[tokio::test]
async fn test_events_window_reports_transitions() {
    let state = AppState::with_config(AppConfig {
        event_log_capacity: 2,
        ..AppConfig::default()
    })
    .unwrap();
    let app = jagedo_api::app(state);
    bidding_request(&app, "SELF").await;

    let (status, events) = send(&app, get("/v1/events", ADMIN)).await;
    assert_eq!(status, StatusCode::OK);
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1]["event"]["type"], "request_stage_changed");
    assert_eq!(events[1]["event"]["new_stage"], "BIDDING");

    let (_, limited) = send(&app, get("/v1/events?limit=1", ADMIN)).await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_stages() {
    let app = test_app();
    bidding_request(&app, "SELF").await;
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("jagedo_http_requests_total"));
    assert!(text.contains("jagedo_requests{stage=\"BIDDING\"} 1"));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = test_app();
    let (status, doc) = send(
        &app,
        Request::builder().uri("/openapi.json").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/v1/requests/{id}/recall"].is_object());
}
