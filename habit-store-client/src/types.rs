//! Types for the store client API

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL of the hosted project (auth and REST live below it)
    pub base_url: String,
    /// Project API key, sent as `apikey` on every request
    pub api_key: String,
    /// Access token of a previously signed-in user
    pub access_token: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            access_token: None,
            timeout_secs: 30,
        }
    }
}

// ==================== Auth ====================

/// Identity of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// User ID (owner key on every record)
    pub id: String,
    /// Email address, when the account has one
    #[serde(default)]
    pub email: Option<String>,
}

/// Response from the password grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token for subsequent requests
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

// ==================== Habits ====================

/// A persisted habit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitRow {
    /// Server-assigned ID
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    /// Key of the default habit this row was created from, if any
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert body for a habit
#[derive(Debug, Clone, Serialize)]
pub struct NewHabit {
    pub user_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

// ==================== Completion logs ====================

/// A completion log as returned by the log listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitLogRow {
    pub habit_id: String,
    /// Zero-based day of month
    pub day_index: i32,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Composite key of a completion log
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HabitLogKey {
    pub user_id: String,
    pub habit_id: String,
    /// Month key, "YYYY-MM"
    pub month: String,
    pub day_index: u32,
}

/// Upsert body for a completion log
#[derive(Debug, Clone, Serialize)]
pub struct HabitLogUpsert {
    #[serde(flatten)]
    pub key: HabitLogKey,
    pub completed_at: DateTime<Utc>,
}

// ==================== Weekly goals ====================

/// Weekly goal snapshot as returned by the snapshot lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyHabitsRow {
    /// Null or absent when the row exists without a stored snapshot
    #[serde(default)]
    pub habits_state: Option<Vec<bool>>,
}

/// Upsert body for a weekly goal snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyHabitsUpsert {
    pub user_id: String,
    /// Monday of the ISO week
    pub week_start_date: NaiveDate,
    pub habits_state: Vec<bool>,
    pub updated_at: DateTime<Utc>,
}

// ==================== Monthly reflections ====================

/// Monthly reflection as returned by the reflection lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReflectionRow {
    #[serde(default)]
    pub content: Option<String>,
}

/// Upsert body for a monthly reflection
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReflectionUpsert {
    pub user_id: String,
    /// Month key, "YYYY-MM"
    pub month: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

// ==================== Errors ====================

/// Error body returned by either surface.
///
/// The REST surface answers `{code, message, details, hint}`; the auth
/// surface answers `{error, error_description}` or `{code, msg}` with a
/// numeric code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl ApiErrorBody {
    /// Error code as a string, whichever surface produced it
    pub fn code(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => self.error.clone(),
        }
    }

    /// Human-readable message, whichever surface produced it
    pub fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.msg.clone())
            .or_else(|| self.details.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_error_body() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"code":"PGRST301","details":null,"hint":null,"message":"JWT expired"}"#,
        )
        .unwrap();
        assert_eq!(body.code().as_deref(), Some("PGRST301"));
        assert_eq!(body.message().as_deref(), Some("JWT expired"));
    }

    #[test]
    fn test_auth_error_body() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        )
        .unwrap();
        assert_eq!(body.code().as_deref(), Some("invalid_grant"));
        assert_eq!(body.message().as_deref(), Some("Invalid login credentials"));

        let body: ApiErrorBody = serde_json::from_str(r#"{"code":400,"msg":"bad"}"#).unwrap();
        assert_eq!(body.code().as_deref(), Some("400"));
        assert_eq!(body.message().as_deref(), Some("bad"));
    }

    #[test]
    fn test_log_upsert_flattens_key() {
        let upsert = HabitLogUpsert {
            key: HabitLogKey {
                user_id: "u1".into(),
                habit_id: "h1".into(),
                month: "2025-03".into(),
                day_index: 4,
            },
            completed_at: DateTime::parse_from_rfc3339("2025-03-05T08:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&upsert).unwrap();
        assert_eq!(json["habit_id"], "h1");
        assert_eq!(json["day_index"], 4);
        assert_eq!(json["month"], "2025-03");
        assert!(json.get("key").is_none());
    }
}
