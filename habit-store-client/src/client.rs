//! HTTP client for the hosted backend

use crate::error::{Result, StoreError};
use crate::types::*;
use chrono::NaiveDate;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::RwLock;
use std::time::Duration;

const HABITS: &str = "habits";
const HABIT_LOGS: &str = "habit_logs";
const WEEKLY_HABITS: &str = "weekly_habits";
const MONTHLY_REFLECTIONS: &str = "monthly_reflections";

/// HTTP client for the hosted backend
///
/// Holds the project API key and, once signed in, the user's access token.
/// The token is sent as the bearer on every request; without one the API
/// key itself is used, which the backend treats as anonymous.
///
/// # Example
///
/// ```rust,no_run
/// use habit_store_client::{StoreClient, StoreConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = StoreClient::new(StoreConfig {
///     base_url: "https://habits.example.co".into(),
///     api_key: "public-anon-key".into(),
///     access_token: Some("eyJ...".into()),
///     ..Default::default()
/// })?;
///
/// let user = client.get_user().await?;
/// # Ok(())
/// # }
/// ```
pub struct StoreClient {
    config: StoreConfig,
    client: Client,
    access_token: RwLock<Option<String>>,
}

impl StoreClient {
    /// Create a new store client
    pub fn new(config: StoreConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&config.api_key)
                .map_err(|_| StoreError::Config("API key is not a valid header value".into()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let access_token = RwLock::new(config.access_token.clone());

        Ok(Self {
            config,
            client,
            access_token,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current access token, if signed in
    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    /// Replace the access token (e.g. restored from a session cache)
    pub fn set_access_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.access_token.write() {
            *guard = token;
        }
    }

    // ==================== Auth API ====================

    /// Sign in with email and password.
    ///
    /// On success the returned access token is kept for later requests.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession> {
        let url = format!("{}?grant_type=password", self.auth_url("token"));

        let body = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await?;

        let session: AuthSession = self.handle_response(response).await?;
        self.set_access_token(Some(session.access_token.clone()));
        tracing::debug!(user_id = %session.user.id, "Signed in");
        Ok(session)
    }

    /// Look up the signed-in user.
    ///
    /// Returns `None` when there is no token or the backend rejects it.
    pub async fn get_user(&self) -> Result<Option<AuthUser>> {
        let Some(token) = self.access_token() else {
            return Ok(None);
        };

        let response = self
            .client
            .get(self.auth_url("user"))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    /// Invalidate the session.
    ///
    /// The local token is dropped before the request is sent, so the client
    /// is signed out even if the backend cannot be reached.
    pub async fn sign_out(&self) -> Result<()> {
        let token = match self.access_token.write() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(token) = token else {
            return Ok(());
        };

        let response = self
            .client
            .post(self.auth_url("logout"))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        // An already-expired session is as good as a revoked one
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        self.handle_empty(response).await
    }

    // ==================== REST API: Habits ====================

    /// List a user's habits, oldest first
    pub async fn list_habits(&self, user_id: &str) -> Result<Vec<HabitRow>> {
        let url = self.rest_url(
            HABITS,
            &[
                ("select", "*".to_string()),
                ("user_id", eq(user_id)),
                ("order", "created_at.asc".to_string()),
            ],
        );

        let response = self.authorized(self.client.get(&url)).send().await?;
        self.handle_response(response).await
    }

    /// Create a habit and return the stored row
    pub async fn insert_habit(&self, habit: &NewHabit) -> Result<HabitRow> {
        let url = self.rest_url(HABITS, &[]);

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=representation")
            .json(habit)
            .send()
            .await?;

        let rows: Vec<HabitRow> = self.handle_response(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::InvalidResponse("insert returned no rows".into()))
    }

    /// Rename a habit
    pub async fn update_habit_name(&self, habit_id: &str, name: &str) -> Result<()> {
        let url = self.rest_url(HABITS, &[("id", eq(habit_id))]);

        let response = self
            .authorized(self.client.patch(&url))
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        self.handle_empty(response).await
    }

    // ==================== REST API: Completion logs ====================

    /// List a user's completion logs for one month
    pub async fn list_logs(&self, user_id: &str, month: &str) -> Result<Vec<HabitLogRow>> {
        let url = self.rest_url(
            HABIT_LOGS,
            &[
                ("select", "habit_id,day_index,completed_at".to_string()),
                ("user_id", eq(user_id)),
                ("month", eq(month)),
            ],
        );

        let response = self.authorized(self.client.get(&url)).send().await?;
        self.handle_response(response).await
    }

    /// Insert a completion log, or update it if the composite key exists
    pub async fn upsert_log(&self, log: &HabitLogUpsert) -> Result<()> {
        let url = self.rest_url(
            HABIT_LOGS,
            &[("on_conflict", "user_id,habit_id,day_index,month".to_string())],
        );

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(log)
            .send()
            .await?;

        self.handle_empty(response).await
    }

    /// Delete the completion log matching the composite key
    pub async fn delete_log(&self, key: &HabitLogKey) -> Result<()> {
        let url = self.rest_url(
            HABIT_LOGS,
            &[
                ("user_id", eq(&key.user_id)),
                ("habit_id", eq(&key.habit_id)),
                ("month", eq(&key.month)),
                ("day_index", eq(&key.day_index.to_string())),
            ],
        );

        let response = self.authorized(self.client.delete(&url)).send().await?;
        self.handle_empty(response).await
    }

    // ==================== REST API: Weekly goals ====================

    /// Get the weekly goal snapshot for the week starting on `week_start`
    pub async fn get_weekly_habits(
        &self,
        user_id: &str,
        week_start: NaiveDate,
    ) -> Result<Option<WeeklyHabitsRow>> {
        let url = self.rest_url(
            WEEKLY_HABITS,
            &[
                ("select", "habits_state".to_string()),
                ("user_id", eq(user_id)),
                ("week_start_date", eq(&week_start.format("%Y-%m-%d").to_string())),
                ("limit", "1".to_string()),
            ],
        );

        let response = self.authorized(self.client.get(&url)).send().await?;
        let rows: Vec<WeeklyHabitsRow> = self.handle_response(response).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert or replace a weekly goal snapshot
    pub async fn upsert_weekly_habits(&self, snapshot: &WeeklyHabitsUpsert) -> Result<()> {
        let url = self.rest_url(
            WEEKLY_HABITS,
            &[("on_conflict", "user_id,week_start_date".to_string())],
        );

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(snapshot)
            .send()
            .await?;

        self.handle_empty(response).await
    }

    // ==================== REST API: Monthly reflections ====================

    /// Get the reflection for one month
    pub async fn get_monthly_reflection(
        &self,
        user_id: &str,
        month: &str,
    ) -> Result<Option<MonthlyReflectionRow>> {
        let url = self.rest_url(
            MONTHLY_REFLECTIONS,
            &[
                ("select", "content".to_string()),
                ("user_id", eq(user_id)),
                ("month", eq(month)),
                ("limit", "1".to_string()),
            ],
        );

        let response = self.authorized(self.client.get(&url)).send().await?;
        let rows: Vec<MonthlyReflectionRow> = self.handle_response(response).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert or replace a monthly reflection
    pub async fn upsert_monthly_reflection(&self, reflection: &MonthlyReflectionUpsert) -> Result<()> {
        let url = self.rest_url(
            MONTHLY_REFLECTIONS,
            &[("on_conflict", "user_id,month".to_string())],
        );

        let response = self
            .authorized(self.client.post(&url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(reflection)
            .send()
            .await?;

        self.handle_empty(response).await
    }

    // ==================== Helper Methods ====================

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url(), path)
    }

    fn rest_url(&self, table: &str, params: &[(&str, String)]) -> String {
        let mut url = format!("{}/rest/v1/{}", self.base_url(), table);
        if !params.is_empty() {
            let query: Vec<String> = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.config.api_key.clone());
        request.header(header::AUTHORIZATION, format!("Bearer {}", bearer))
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn handle_empty(&self, response: Response) -> Result<()> {
        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }

    async fn error_from(response: Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(&body) {
            if parsed.code().is_some() || parsed.message().is_some() {
                return StoreError::Api {
                    status: status.as_u16(),
                    code: parsed.code(),
                    message: parsed.message().unwrap_or_else(|| status.to_string()),
                };
            }
        }

        if status == StatusCode::UNAUTHORIZED {
            return StoreError::Unauthorized;
        }

        StoreError::Api {
            status: status.as_u16(),
            code: None,
            message: if body.is_empty() { status.to_string() } else { body },
        }
    }
}

/// PostgREST equality filter
fn eq(value: &str) -> String {
    format!("eq.{}", urlencoding::encode(value))
}
