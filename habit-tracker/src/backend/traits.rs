//! Core trait for remote stores.

use crate::calendar::MonthKey;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use habit_store_client::{
    AuthUser, HabitLogKey, HabitLogRow, HabitLogUpsert, HabitRow, MonthlyReflectionUpsert, NewHabit,
    WeeklyHabitsUpsert,
};

/// Authenticated CRUD over the four record collections.
///
/// Every collection is owned by a user; implementations must only ever
/// return or touch records of the user named in the call.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Backend identifier for logs
    fn id(&self) -> &str;

    /// The signed-in user, or `None` when nobody is
    async fn current_user(&self) -> Result<Option<AuthUser>>;

    /// All habits of a user, oldest first
    async fn list_habits(&self, user_id: &str) -> Result<Vec<HabitRow>>;

    /// Create a habit and return the stored row
    async fn create_habit(&self, habit: NewHabit) -> Result<HabitRow>;

    async fn rename_habit(&self, habit_id: &str, name: &str) -> Result<()>;

    /// Completion logs of one month
    async fn list_completions(&self, user_id: &str, month: &MonthKey) -> Result<Vec<HabitLogRow>>;

    /// Insert or overwrite the log with the same composite key
    async fn upsert_completion(&self, log: HabitLogUpsert) -> Result<()>;

    /// Delete the log with this composite key; absent logs are not an error
    async fn delete_completion(&self, key: HabitLogKey) -> Result<()>;

    /// Weekly goal flags for the week starting on `week_start`
    async fn weekly_goals(&self, user_id: &str, week_start: NaiveDate) -> Result<Option<Vec<bool>>>;

    async fn upsert_weekly_goals(&self, snapshot: WeeklyHabitsUpsert) -> Result<()>;

    /// Reflection text of one month
    async fn monthly_reflection(&self, user_id: &str, month: &MonthKey) -> Result<Option<String>>;

    async fn upsert_monthly_reflection(&self, reflection: MonthlyReflectionUpsert) -> Result<()>;

    /// Invalidate the session
    async fn sign_out(&self) -> Result<()>;
}
