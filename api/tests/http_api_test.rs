//! HTTP contract tests: the real router over an in-memory SQLite database,
//! driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower::ServiceExt;

use api::auth::StaticTokenAuthenticator;
use api::{AppState, build_router};
use booking::Db;
use booking::store::SqliteBookingStore;
use reservation::{CoordinatorConfig, FixedClock, ReservationCoordinator};

const TOKENS: &str = "alice:1,bob:2,carol:3,root:100:admin";

struct TestApp {
    _db: Db,
    router: Router,
}

async fn setup() -> TestApp {
    let db = Db::in_memory().await.unwrap();
    db.migrate().await.unwrap();

    let store = Arc::new(SqliteBookingStore::from_pool(db.pool.clone()));
    let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2022, 3, 3).unwrap()));
    let coordinator = ReservationCoordinator::new(store, clock, CoordinatorConfig::default());
    let auth = StaticTokenAuthenticator::parse(TOKENS).unwrap();

    let router = build_router(AppState::new(Arc::new(coordinator), Arc::new(auth)));
    TestApp { _db: db, router }
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }

        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn create_event(&self, body: Value) -> i64 {
        let (status, json) = self
            .call(Method::POST, "/api/events", Some("root"), Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["data"]["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn health_needs_no_login() {
    let app = setup().await;
    let (status, json) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({ "status": "ok" }));
}

#[tokio::test]
async fn missing_or_unknown_token_is_401() {
    let app = setup().await;

    for token in [None, Some("mallory")] {
        let (status, json) = app.call(Method::GET, "/api/events", token, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["status"], "error");
        assert_eq!(json["reason"], "Please login");
    }
}

#[tokio::test]
async fn token_scheme_is_accepted() {
    let app = setup().await;

    let req = Request::builder()
        .uri("/api/events")
        .header(header::AUTHORIZATION, "Token alice")
        .body(Body::empty())
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn only_admins_manage_events() {
    let app = setup().await;

    let (status, json) = app
        .call(
            Method::POST,
            "/api/events",
            Some("alice"),
            Some(json!({ "name": "gig", "valid_until": "2022-03-20" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["reason"], "You don't have permission to create event");

    let id = app
        .create_event(json!({ "name": "gig", "valid_until": "2022-03-20" }))
        .await;

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/events/{id}"),
            Some("bob"),
            Some(json!({ "description": "x", "valid_until": "2022-03-20" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_defaults_and_duplicate_name() {
    let app = setup().await;

    let (status, json) = app
        .call(
            Method::POST,
            "/api/events",
            Some("root"),
            Some(json!({ "name": "gig", "description": "loud", "valid_until": "2022-03-20" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"]["capacity_total"], 10);
    assert_eq!(json["data"]["capacity_remaining"], 10);
    assert_eq!(json["data"]["created"], "2022-03-03");

    let (status, json) = app
        .call(
            Method::POST,
            "/api/events",
            Some("root"),
            Some(json!({ "name": "gig", "valid_until": "2022-03-20" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "name_taken");
    assert_eq!(json["reason"], "Event already exists");
}

#[tokio::test]
async fn register_flow_until_full() {
    let app = setup().await;
    let id = app
        .create_event(json!({
            "name": "workshop",
            "description": "hands on",
            "seats": 2,
            "valid_until": "2022-03-20"
        }))
        .await;
    let uri = format!("/api/events/{id}/register");

    let (status, json) = app.call(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["data"]["event_name"], "workshop");
    assert_eq!(json["data"]["event_description"], "hands on");
    assert_eq!(json["data"]["capacity_remaining"], 1);
    assert!(json["data"]["reservation_id"].is_string());

    let (status, json) = app.call(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "already_reserved");
    assert_eq!(json["reason"], "Event already registered");

    let (status, json) = app.call(Method::POST, &uri, Some("bob"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["capacity_remaining"], 0);

    let (status, json) = app.call(Method::GET, &uri, Some("carol"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "capacity_exhausted");
    assert_eq!(json["reason"], "Event registration full");
}

#[tokio::test]
async fn closed_window_and_unknown_event() {
    let app = setup().await;
    let id = app
        .create_event(json!({ "name": "yesterday", "valid_until": "2022-03-03" }))
        .await;

    let (status, json) = app
        .call(Method::GET, &format!("/api/events/{id}/register"), Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "window_closed");
    assert_eq!(
        json["reason"],
        "Event already over or ongoing. Cannot register now"
    );

    let (status, json) = app
        .call(Method::GET, "/api/events/9999/register", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "event_not_found");

    let (status, json) = app
        .call(Method::GET, "/api/events/abc/register", Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "invalid_path");
}

#[tokio::test]
async fn event_detail_carries_preview() {
    let app = setup().await;
    let id = app
        .create_event(json!({ "name": "talk", "seats": 3, "valid_until": "2022-03-20" }))
        .await;
    let uri = format!("/api/events/{id}");

    let (status, json) = app.call(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["name"], "talk");
    assert_eq!(json["data"]["can_reserve"], true);
    assert!(json["data"].get("reason").is_none());

    app.call(Method::GET, &format!("{uri}/register"), Some("alice"), None)
        .await;

    let (_, json) = app.call(Method::GET, &uri, Some("alice"), None).await;
    assert_eq!(json["data"]["can_reserve"], false);
    assert_eq!(json["data"]["reason"], "Event already registered");
    assert_eq!(json["data"]["capacity_remaining"], 2);

    let (status, json) = app.call(Method::GET, "/api/events/4242", Some("alice"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "Event does not exist");
}

#[tokio::test]
async fn update_rules() {
    let app = setup().await;
    let id = app
        .create_event(json!({ "name": "expo", "seats": 3, "valid_until": "2022-03-20" }))
        .await;
    let uri = format!("/api/events/{id}");

    for who in ["alice", "bob"] {
        app.call(Method::GET, &format!("{uri}/register"), Some(who), None)
            .await;
    }

    let (status, json) = app
        .call(
            Method::PUT,
            &uri,
            Some("root"),
            Some(json!({ "description": "smaller", "valid_until": "2022-03-21", "seats": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "capacity_below_reserved");

    let (status, json) = app
        .call(
            Method::PUT,
            &uri,
            Some("root"),
            Some(json!({ "description": "same", "valid_until": "2022-03-22", "seats": 0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["capacity_total"], 3);
    assert_eq!(json["data"]["valid_until"], "2022-03-22");

    let (status, json) = app
        .call(
            Method::PUT,
            &uri,
            Some("root"),
            Some(json!({ "description": "bigger", "valid_until": "2022-03-22", "seats": 6 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["capacity_total"], 6);
    assert_eq!(json["data"]["capacity_remaining"], 4);

    let (status, json) = app
        .call(
            Method::PUT,
            "/api/events/777",
            Some("root"),
            Some(json!({ "description": "ghost", "valid_until": "2022-03-22" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["reason"], "Event does not exist");
}

#[tokio::test]
async fn my_reservations_are_private() {
    let app = setup().await;
    let a = app
        .create_event(json!({ "name": "a", "valid_until": "2022-03-20" }))
        .await;
    let b = app
        .create_event(json!({ "name": "b", "valid_until": "2022-03-20" }))
        .await;

    app.call(Method::GET, &format!("/api/events/{a}/register"), Some("alice"), None)
        .await;
    app.call(Method::GET, &format!("/api/events/{b}/register"), Some("alice"), None)
        .await;
    app.call(Method::GET, &format!("/api/events/{a}/register"), Some("bob"), None)
        .await;

    let (status, json) = app.call(Method::GET, "/api/reservations", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    let mine = json["data"].as_array().unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|r| r["holder_id"] == 1));

    let (_, json) = app.call(Method::GET, "/api/reservations", Some("carol"), None).await;
    assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn categories_and_filtered_listing() {
    let app = setup().await;

    let (status, json) = app
        .call(Method::POST, "/api/categories", Some("root"), Some(json!({ "name": "music" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let music = json["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .call(Method::POST, "/api/categories", Some("alice"), Some(json!({ "name": "x" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.create_event(json!({ "name": "jazz", "valid_until": "2022-03-20", "categories": [music] }))
        .await;
    app.create_event(json!({ "name": "lecture", "valid_until": "2022-03-20" }))
        .await;

    let (_, json) = app.call(Method::GET, "/api/events", Some("alice"), None).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let (status, json) = app
        .call(Method::GET, &format!("/api/events?category={music}"), Some("alice"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let only = json["data"].as_array().unwrap();
    assert_eq!(only.len(), 1);
    assert_eq!(only[0]["name"], "jazz");

    let (_, json) = app.call(Method::GET, "/api/categories", Some("bob"), None).await;
    assert_eq!(json["data"][0]["name"], "music");

    let (status, json) = app
        .call(
            Method::POST,
            "/api/events",
            Some("root"),
            Some(json!({ "name": "orphan", "valid_until": "2022-03-20", "categories": [999] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "category_not_found");
}

#[tokio::test]
async fn malformed_body_is_400() {
    let app = setup().await;

    let (status, json) = app
        .call(
            Method::POST,
            "/api/events",
            Some("root"),
            Some(json!({ "name": "no date" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["status"], "error");
    assert_eq!(json["code"], "invalid_body");
}
