//! Remote store over the hosted project's REST and auth APIs.

use async_trait::async_trait;
use chrono::NaiveDate;
use habit_store_client::{
    AuthUser, HabitLogKey, HabitLogRow, HabitLogUpsert, HabitRow, MonthlyReflectionUpsert, NewHabit,
    StoreClient, WeeklyHabitsUpsert,
};

use super::traits::RemoteStore;
use crate::calendar::MonthKey;
use crate::error::Result;

/// [`RemoteStore`] backed by a [`StoreClient`]
pub struct RestRemote {
    client: StoreClient,
}

impl RestRemote {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Underlying client, for sign-in and token handling
    pub fn client(&self) -> &StoreClient {
        &self.client
    }
}

#[async_trait]
impl RemoteStore for RestRemote {
    fn id(&self) -> &str {
        &self.client.config().base_url
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        Ok(self.client.get_user().await?)
    }

    async fn list_habits(&self, user_id: &str) -> Result<Vec<HabitRow>> {
        Ok(self.client.list_habits(user_id).await?)
    }

    async fn create_habit(&self, habit: NewHabit) -> Result<HabitRow> {
        Ok(self.client.insert_habit(&habit).await?)
    }

    async fn rename_habit(&self, habit_id: &str, name: &str) -> Result<()> {
        Ok(self.client.update_habit_name(habit_id, name).await?)
    }

    async fn list_completions(&self, user_id: &str, month: &MonthKey) -> Result<Vec<HabitLogRow>> {
        Ok(self.client.list_logs(user_id, &month.to_string()).await?)
    }

    async fn upsert_completion(&self, log: HabitLogUpsert) -> Result<()> {
        Ok(self.client.upsert_log(&log).await?)
    }

    async fn delete_completion(&self, key: HabitLogKey) -> Result<()> {
        Ok(self.client.delete_log(&key).await?)
    }

    async fn weekly_goals(&self, user_id: &str, week_start: NaiveDate) -> Result<Option<Vec<bool>>> {
        let row = self.client.get_weekly_habits(user_id, week_start).await?;
        Ok(row.and_then(|r| r.habits_state))
    }

    async fn upsert_weekly_goals(&self, snapshot: WeeklyHabitsUpsert) -> Result<()> {
        Ok(self.client.upsert_weekly_habits(&snapshot).await?)
    }

    async fn monthly_reflection(&self, user_id: &str, month: &MonthKey) -> Result<Option<String>> {
        let row = self
            .client
            .get_monthly_reflection(user_id, &month.to_string())
            .await?;
        Ok(row.and_then(|r| r.content))
    }

    async fn upsert_monthly_reflection(&self, reflection: MonthlyReflectionUpsert) -> Result<()> {
        Ok(self.client.upsert_monthly_reflection(&reflection).await?)
    }

    async fn sign_out(&self) -> Result<()> {
        Ok(self.client.sign_out().await?)
    }
}
