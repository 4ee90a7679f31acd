//! Store client integration tests against a mocked backend
//!
//! Covers:
//! - Auth flows (sign-in, user lookup, logout)
//! - Collection queries and their PostgREST filters
//! - Upsert conflict targets
//! - Error body decoding

use chrono::{NaiveDate, TimeZone, Utc};
use habit_store_client::*;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> StoreClient {
    StoreClient::new(StoreConfig {
        base_url: server.uri(),
        api_key: "anon-key".into(),
        access_token: token.map(String::from),
        timeout_secs: 5,
    })
    .unwrap()
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_sign_in_stores_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon-key"))
        .and(body_json(serde_json::json!({
            "email": "me@example.com",
            "password": "secret",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "user-token",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": { "id": "user-1", "email": "me@example.com" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let session = client
        .sign_in_with_password("me@example.com", "secret")
        .await
        .unwrap();

    assert_eq!(session.user.id, "user-1");
    assert_eq!(client.access_token().as_deref(), Some("user-token"));
}

#[tokio::test]
async fn test_sign_in_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    let err = client
        .sign_in_with_password("me@example.com", "wrong")
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some("invalid_grant"));
    assert_eq!(err.status(), Some(400));
    assert!(client.access_token().is_none());
}

#[tokio::test]
async fn test_get_user_without_token_skips_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, None);
    assert!(client.get_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_user_with_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "user-1",
            "email": "me@example.com",
            "role": "authenticated"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let user = client.get_user().await.unwrap().unwrap();
    assert_eq!(user.id, "user-1");
    assert_eq!(user.email.as_deref(), Some("me@example.com"));
}

#[tokio::test]
async fn test_get_user_expired_token_is_anonymous() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "code": 401,
            "msg": "invalid JWT"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("stale"));
    assert!(client.get_user().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sign_out_drops_token_even_on_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let result = client.sign_out().await;

    assert!(result.is_err());
    assert!(client.access_token().is_none());
}

// =============================================================================
// Habits
// =============================================================================

#[tokio::test]
async fn test_list_habits_filters_and_orders() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/habits"))
        .and(query_param("user_id", "eq.user-1"))
        .and(query_param("order", "created_at.asc"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "h1", "user_id": "user-1", "name": "Meditate", "created_at": "2025-01-01T00:00:00Z" },
            { "id": "h2", "user_id": "user-1", "name": "Custom X", "template": null }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let habits = client.list_habits("user-1").await.unwrap();

    assert_eq!(habits.len(), 2);
    assert_eq!(habits[0].name, "Meditate");
    assert!(habits[0].created_at.is_some());
    assert_eq!(habits[1].template, None);
}

#[tokio::test]
async fn test_insert_habit_returns_row() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/habits"))
        .and(header("prefer", "return=representation"))
        .and(body_json(serde_json::json!({ "user_id": "user-1", "name": "Read daily" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([
            { "id": "srv-42", "user_id": "user-1", "name": "Read daily" }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let row = client
        .insert_habit(&NewHabit {
            user_id: "user-1".into(),
            name: "Read daily".into(),
            template: None,
        })
        .await
        .unwrap();

    assert_eq!(row.id, "srv-42");
}

#[tokio::test]
async fn test_insert_habit_empty_representation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/habits"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let err = client
        .insert_habit(&NewHabit {
            user_id: "user-1".into(),
            name: "Read daily".into(),
            template: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_update_habit_name() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/habits"))
        .and(query_param("id", "eq.h1"))
        .and(body_json(serde_json::json!({ "name": "Meditate 20 min" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    client.update_habit_name("h1", "Meditate 20 min").await.unwrap();
}

// =============================================================================
// Completion logs
// =============================================================================

#[tokio::test]
async fn test_upsert_log_conflict_target() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/habit_logs"))
        .and(query_param("on_conflict", "user_id,habit_id,day_index,month"))
        .and(body_json(serde_json::json!({
            "user_id": "user-1",
            "habit_id": "h1",
            "month": "2025-03",
            "day_index": 9,
            "completed_at": "2025-03-10T07:30:00Z"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    client
        .upsert_log(&HabitLogUpsert {
            key: HabitLogKey {
                user_id: "user-1".into(),
                habit_id: "h1".into(),
                month: "2025-03".into(),
                day_index: 9,
            },
            completed_at: Utc.with_ymd_and_hms(2025, 3, 10, 7, 30, 0).unwrap(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_log_matches_full_key() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/habit_logs"))
        .and(query_param("user_id", "eq.user-1"))
        .and(query_param("habit_id", "eq.h1"))
        .and(query_param("month", "eq.2025-03"))
        .and(query_param("day_index", "eq.9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    client
        .delete_log(&HabitLogKey {
            user_id: "user-1".into(),
            habit_id: "h1".into(),
            month: "2025-03".into(),
            day_index: 9,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_schema_error_is_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/habit_logs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "code": "42703",
            "details": null,
            "hint": null,
            "message": "column habit_logs.month does not exist"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let err = client.list_logs("user-1", "2025-03").await.unwrap_err();

    match err {
        StoreError::Api { status, code, message } => {
            assert_eq!(status, 400);
            assert_eq!(code.as_deref(), Some("42703"));
            assert!(message.contains("column"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Weekly goals and reflections
// =============================================================================

#[tokio::test]
async fn test_weekly_snapshot_missing_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/weekly_habits"))
        .and(query_param("week_start_date", "eq.2025-03-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let week = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    assert!(client.get_weekly_habits("user-1", week).await.unwrap().is_none());
}

#[tokio::test]
async fn test_weekly_snapshot_null_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/weekly_habits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "habits_state": null }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let week = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    let row = client.get_weekly_habits("user-1", week).await.unwrap().unwrap();
    assert_eq!(row.habits_state, None);
}

#[tokio::test]
async fn test_weekly_snapshot_upsert() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/weekly_habits"))
        .and(query_param("on_conflict", "user_id,week_start_date"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    client
        .upsert_weekly_habits(&WeeklyHabitsUpsert {
            user_id: "user-1".into(),
            week_start_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            habits_state: vec![true, false, false, true, false],
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_monthly_reflection_lookup() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/monthly_reflections"))
        .and(query_param("month", "eq.2025-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "content": "Good month." }
        ])))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("user-token"));
    let row = client
        .get_monthly_reflection("user-1", "2025-03")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.content.as_deref(), Some("Good month."));
}
