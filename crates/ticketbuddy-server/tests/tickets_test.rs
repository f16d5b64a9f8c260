//! Ticket routes: creation through the classifier, manual creation, patching.

mod common;

use axum::http::StatusCode;
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_urgent_login_report_creates_high_priority_auth_ticket() {
    let app = app(bare_state().await);

    let response = post(
        &app,
        "/tickets",
        json!({"description": "Users cannot log in, this is urgent"}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    let tickets = response.body["tickets"].as_array().unwrap();
    assert!(!tickets.is_empty());
    assert!(tickets.iter().any(|t| {
        t["importance"] == 3
            && t["name"]
                .as_str()
                .is_some_and(|n| n.to_lowercase().contains("authentication"))
    }));
    assert_eq!(response.body["count"], tickets.len());
}

#[tokio::test]
async fn test_urgency_words_force_priority_three() {
    let app = app(bare_state().await);

    for word in ["urgent", "critical", "emergency", "asap"] {
        let response = post(
            &app,
            "/tickets",
            json!({"description": format!("The page layout looks odd, {}", word)}),
        )
        .await;
        assert_eq!(response.status, StatusCode::OK);
        for ticket in response.body["tickets"].as_array().unwrap() {
            assert_eq!(ticket["importance"], 3, "word: {word}");
        }
    }
}

#[tokio::test]
async fn test_description_without_domain_yields_one_ticket() {
    let app = app(bare_state().await);

    let response = post(
        &app,
        "/tickets",
        json!({"description": "Something odd happened yesterday afternoon"}),
    )
    .await;

    assert_eq!(response.body["count"], 1);
    assert_eq!(
        response.body["tickets"][0]["name"],
        "Something odd happened yesterday afternoon"
    );
    assert_eq!(response.body["tickets"][0]["assignee"], "Triage Team");
}

#[tokio::test]
async fn test_back_to_back_tickets_have_distinct_ids() {
    let app = app(bare_state().await);

    // Three domains in one description, so three inserts in a tight loop.
    let first = post(
        &app,
        "/tickets",
        json!({"description": "Login fails, the database is slow and the button is broken"}),
    )
    .await;
    let second = post(&app, "/tickets", json!({"description": "Another login issue"})).await;

    let mut ids: Vec<String> = first.body["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .chain(second.body["tickets"].as_array().unwrap())
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    let total = ids.len();
    assert!(total >= 4);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[tokio::test]
async fn test_created_ticket_is_listed_open_with_equal_timestamps() {
    let app = app(bare_state().await);

    let created = post(
        &app,
        "/tickets",
        json!({"name": "Refund flow", "description": "Refunds never complete", "importance": 2}),
    )
    .await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.body["count"], 1);
    let id = created.body["tickets"][0]["id"].as_str().unwrap().to_string();

    let listed = get(&app, "/tickets").await;
    let ticket = listed.body["tickets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == id.as_str())
        .cloned()
        .unwrap();

    assert_eq!(ticket["status"], "open");
    assert_eq!(ticket["name"], "Refund flow");
    assert_eq!(ticket["importance"], 2);
    assert_eq!(ticket["createdAt"], ticket["updatedAt"]);

    let single = get(&app, &format!("/tickets/{}", id)).await;
    assert_eq!(single.body["ticket"]["id"], id.as_str());
}

#[tokio::test]
async fn test_model_answer_is_used_when_valid() {
    let app = app(
        model_state(
            r#"Here you go: [{"title":"Reset emails missing","priority":2,"assignee":"Marcus Chen"}]"#,
        )
        .await,
    );

    let response = post(
        &app,
        "/tickets",
        json!({"description": "Password reset emails never arrive"}),
    )
    .await;

    assert_eq!(response.body["count"], 1);
    let ticket = &response.body["tickets"][0];
    assert_eq!(ticket["name"], "Reset emails missing");
    assert_eq!(ticket["assignee"], "Marcus Chen");
    assert_eq!(ticket["description"], "Password reset emails never arrive");
}

#[tokio::test]
async fn test_garbage_model_answer_falls_back_to_keywords() {
    let app = app(model_state("I'm not sure, maybe a login thing?").await);

    let response = post(
        &app,
        "/tickets",
        json!({"description": "Users cannot log in"}),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["tickets"][0]["assignee"], "Alex Rivera");
}

#[tokio::test]
async fn test_create_rejects_blank_description_and_bad_json() {
    let app = app(bare_state().await);

    let blank = post(&app, "/tickets", json!({"description": "   "})).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert!(blank.body["error"].as_str().unwrap().contains("description"));

    let bad_importance = post(
        &app,
        "/tickets",
        json!({"name": "x", "description": "y", "importance": 9}),
    )
    .await;
    assert_eq!(bad_importance.status, StatusCode::BAD_REQUEST);

    let malformed = send(
        &app,
        axum::http::Request::builder()
            .method("POST")
            .uri("/tickets")
            .body(axum::body::Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);

    assert!(get(&app, "/tickets").await.body["tickets"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_patch_with_invalid_importance_changes_nothing() {
    let app = app(bare_state().await);

    let created = post(
        &app,
        "/tickets",
        json!({"name": "Slow search", "description": "Search takes 10s", "importance": 1}),
    )
    .await;
    let ticket = created.body["tickets"][0].clone();
    let uri = format!("/tickets/{}", ticket["id"].as_str().unwrap());

    for importance in [0, 4, 42] {
        let response = patch(&app, &uri, json!({"importance": importance, "status": "qa"})).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    let after = get(&app, &uri).await.body["ticket"].clone();
    assert_eq!(after, ticket);
}

#[tokio::test]
async fn test_patch_updates_fields_and_bumps_updated_at() {
    let app = app(bare_state().await);

    let created = post(
        &app,
        "/tickets",
        json!({"name": "Slow search", "description": "Search takes 10s"}),
    )
    .await;
    let id = created.body["tickets"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/tickets/{}", id);

    // Any status may follow any other.
    for status in ["resolved", "open", "qa", "in-progress"] {
        let response = patch(&app, &uri, json!({"status": status})).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["ticket"]["status"], status);
    }

    let response = patch(
        &app,
        &uri,
        json!({"importance": 3, "assignee": "Priya Patel"}),
    )
    .await;
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["ticket"]["importance"], 3);
    assert_eq!(response.body["ticket"]["assignee"], "Priya Patel");
    assert_eq!(response.body["ticket"]["name"], "Slow search");
}

#[tokio::test]
async fn test_patch_errors() {
    let app = app(bare_state().await);

    let missing = patch(&app, "/tickets/TICKET-0-0000", json!({"status": "qa"})).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let created = post(&app, "/tickets", json!({"name": "n", "description": "d"})).await;
    let uri = format!("/tickets/{}", created.body["tickets"][0]["id"].as_str().unwrap());

    assert_eq!(patch(&app, &uri, json!({})).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        patch(&app, &uri, json!({"status": "done"})).await.status,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(get(&app, "/tickets/nope").await.status, StatusCode::NOT_FOUND);
}
