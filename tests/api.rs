//! End-to-end tests over the HTTP boundary: admission, availability board,
//! cancellation, email lookup, and the admin surface.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Days;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use courtbook::api::{ADMIN_SECRET_HEADER, AppState, router};
use courtbook::auth::AdminSecret;
use courtbook::clock::VenueClock;
use courtbook::directory::Directory;
use courtbook::engine::Engine;
use courtbook::notify::NotifyHub;

const ADMIN_SECRET: &str = "sesame";

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("courtbook_test_api");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn test_state(name: &str) -> AppState {
    let directory = Arc::new(Directory::builtin());
    let engine = Arc::new(
        Engine::new(
            test_wal_path(name),
            Arc::new(NotifyHub::new()),
            directory.clone(),
            VenueClock::default(),
        )
        .unwrap(),
    );
    AppState {
        engine,
        directory,
        admin: Arc::new(AdminSecret::new(ADMIN_SECRET)),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn booking_request(house: &str, date: &str, start: &str, email: &str) -> Value {
    json!({
        "house_id": house,
        "court_id": "padel",
        "booking_date": date,
        "start_time": start,
        "booker_name": "John Doe",
        "booker_email": email,
    })
}

fn tomorrow(state: &AppState) -> String {
    state
        .engine
        .today()
        .checked_add_days(Days::new(1))
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn booking_flow_with_board_and_cancellation() {
    let state = test_state("flow.wal");
    let app = router(state.clone());
    let date = tomorrow(&state);

    // Admission
    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-coco", &date, "05:00", "john@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["start_time"], "05:00");
    assert_eq!(body["end_time"], "06:00");
    let token = body["cancellation_token"].as_str().unwrap().to_owned();
    assert_eq!(token.len(), 32);

    // Board shows the 05:00 and 05:30 starts as taken, attributed by name
    let (status, board) = send(&app, get(&format!("/api/slots?court_id=padel&date={date}"))).await;
    assert_eq!(status, StatusCode::OK);
    let cells = board.as_array().unwrap();
    assert_eq!(cells.len(), 32);
    assert_eq!(cells[0]["taken"], true);
    assert_eq!(cells[0]["taken_by"], "Casa Coco");
    assert_eq!(cells[1]["taken"], true);
    assert_eq!(cells[2]["taken"], false);

    // Overlapping request from another house loses
    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-rhino", &date, "05:30", "ana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "slot_taken");

    // Cancellation is idempotent
    let (status, body) = send(&app, post_json("/api/cancellations", &json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let (status, body) = send(&app, post_json("/api/cancellations", &json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_cancelled");

    let (status, body) = send(
        &app,
        post_json("/api/cancellations", &json!({ "token": "not-a-real-token" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "invalid_token");

    // The slot opens up again
    let (status, _) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-rhino", &date, "05:00", "ana@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn rejections_have_stable_error_codes() {
    let state = test_state("rejections.wal");
    let app = router(state.clone());
    let date = tomorrow(&state);

    let too_far = state
        .engine
        .today()
        .checked_add_days(Days::new(8))
        .unwrap()
        .to_string();
    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-coco", &too_far, "05:00", ""),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "out_of_window");

    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-coco", &date, "05:15", ""),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "off_grid_start");

    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-coco", &date, "5 am", ""),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_start_time");

    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-nowhere", &date, "05:00", ""),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "unknown_house");

    // Cap: two bookings, then the third fails
    for (day, start) in [(&date, "06:00"), (&date, "08:00")] {
        let (status, _) = send(
            &app,
            post_json("/api/bookings", &booking_request("casa-coco", day, start, "")),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-coco", &date, "10:00", ""),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "house_cap_exceeded");
}

#[tokio::test]
async fn preflight_gives_fast_feedback() {
    let state = test_state("preflight.wal");
    let app = router(state.clone());
    let date = tomorrow(&state);

    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings/preflight",
            &json!({ "house_id": "casa-coco", "court_id": "padel", "booking_date": date }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let past = state
        .engine
        .today()
        .checked_sub_days(Days::new(1))
        .unwrap()
        .to_string();
    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings/preflight",
            &json!({ "house_id": "casa-coco", "court_id": "padel", "booking_date": past }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "out_of_window");
}

#[tokio::test]
async fn lookup_is_scoped_to_the_booker() {
    let state = test_state("lookup.wal");
    let app = router(state.clone());
    let date = tomorrow(&state);

    for (house, start, email) in [
        ("casa-coco", "05:00", "john@example.com"),
        ("casa-rhino", "07:00", "ana@example.com"),
    ] {
        let (status, _) = send(
            &app,
            post_json("/api/bookings", &booking_request(house, &date, start, email)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get("/api/bookings?email=john@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["booker_email"], "john@example.com");
    assert_eq!(rows[0]["house_id"], "casa-coco");

    let (status, body) = send(&app, get("/api/bookings?email=nobody@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn reference_data_listing() {
    let state = test_state("reference.wal");
    let app = router(state);

    let (status, body) = send(&app, get("/api/courts")).await;
    assert_eq!(status, StatusCode::OK);
    let courts = body.as_array().unwrap();
    assert_eq!(courts.len(), 2);
    assert!(courts.iter().any(|c| c["id"] == "padel"));

    let (status, body) = send(&app, get("/api/houses")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 13);
}

#[tokio::test]
async fn admin_surface_requires_secret_and_hard_deletes() {
    let state = test_state("admin.wal");
    let app = router(state.clone());
    let date = tomorrow(&state);

    let (status, body) = send(
        &app,
        post_json(
            "/api/bookings",
            &booking_request("casa-coco", &date, "05:00", "john@example.com"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_str().unwrap().to_owned();
    let token = body["cancellation_token"].as_str().unwrap().to_owned();

    // No secret → 401
    let (status, _) = send(&app, get("/api/admin/bookings")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Wrong secret → 401
    let request = Request::builder()
        .uri("/api/admin/bookings")
        .header(ADMIN_SECRET_HEADER, "guess")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Right secret → full listing
    let request = Request::builder()
        .uri("/api/admin/bookings")
        .header(ADMIN_SECRET_HEADER, ADMIN_SECRET)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Hard delete removes the row; the token stops resolving
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/admin/bookings/{id}"))
        .header(ADMIN_SECRET_HEADER, ADMIN_SECRET)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, post_json("/api/cancellations", &json!({ "token": token }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "invalid_token");
}
