//! In-memory remote store for testing.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use habit_store_client::{
    AuthUser, HabitLogKey, HabitLogRow, HabitLogUpsert, HabitRow, MonthlyReflectionUpsert, NewHabit,
    WeeklyHabitsUpsert,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::traits::RemoteStore;
use crate::calendar::MonthKey;
use crate::error::{Result, TrackerError};

/// Operations of [`RemoteStore`], for failure injection and call inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    CurrentUser,
    ListHabits,
    CreateHabit,
    RenameHabit,
    ListCompletions,
    UpsertCompletion,
    DeleteCompletion,
    WeeklyGoals,
    UpsertWeeklyGoals,
    MonthlyReflection,
    UpsertMonthlyReflection,
    SignOut,
}

type LogKey = (String, String, String, u32);

#[derive(Default)]
struct Tables {
    habits: Vec<HabitRow>,
    logs: BTreeMap<LogKey, DateTime<Utc>>,
    weekly: HashMap<(String, NaiveDate), Vec<bool>>,
    reflections: HashMap<(String, String), String>,
}

#[derive(Clone)]
struct InjectedFailure {
    code: Option<String>,
    message: String,
}

/// Mock remote store.
///
/// Keeps all four collections in memory, records every call, and can be
/// told to fail specific operations or to answer slowly.
pub struct MockRemote {
    user: Mutex<Option<AuthUser>>,
    tables: Mutex<Tables>,
    failures: Mutex<HashMap<RemoteOp, InjectedFailure>>,
    calls: Mutex<Vec<RemoteOp>>,
    latency: Option<Duration>,
    next_id: AtomicU32,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockRemote {
    /// Create an empty store with nobody signed in.
    pub fn new() -> Self {
        Self {
            user: Mutex::new(None),
            tables: Mutex::new(Tables::default()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
            next_id: AtomicU32::new(1),
        }
    }

    /// Create an empty store with `user_id` signed in.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        let remote = Self::new();
        remote.sign_in(user_id);
        remote
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed a habit owned by the signed-in user.
    pub fn with_habit(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.seed_habit(id.into(), name.into(), None);
        self
    }

    /// Seed a habit created from a default template.
    pub fn with_template_habit(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.seed_habit(id.into(), name.into(), Some(template.into()));
        self
    }

    /// Seed a completion log for the signed-in user.
    pub fn with_completion(self, habit_id: impl Into<String>, month: &MonthKey, day_index: u32) -> Self {
        let key = (self.user_id(), habit_id.into(), month.to_string(), day_index);
        lock(&self.tables).logs.insert(key, Utc::now());
        self
    }

    /// Seed a weekly goal snapshot for the signed-in user.
    pub fn with_weekly_goals(self, week_start: NaiveDate, goals: Vec<bool>) -> Self {
        let key = (self.user_id(), week_start);
        lock(&self.tables).weekly.insert(key, goals);
        self
    }

    /// Seed a monthly reflection for the signed-in user.
    pub fn with_reflection(self, month: &MonthKey, content: impl Into<String>) -> Self {
        let key = (self.user_id(), month.to_string());
        lock(&self.tables).reflections.insert(key, content.into());
        self
    }

    /// Fail `op` with a generic error until cleared.
    pub fn failing(self, op: RemoteOp, message: impl Into<String>) -> Self {
        self.fail(op, message);
        self
    }

    pub fn sign_in(&self, user_id: impl Into<String>) {
        *lock(&self.user) = Some(AuthUser {
            id: user_id.into(),
            email: None,
        });
    }

    pub fn is_signed_in(&self) -> bool {
        lock(&self.user).is_some()
    }

    /// Fail `op` with a generic error until cleared.
    pub fn fail(&self, op: RemoteOp, message: impl Into<String>) {
        lock(&self.failures).insert(
            op,
            InjectedFailure {
                code: None,
                message: message.into(),
            },
        );
    }

    /// Fail `op` with a coded error until cleared.
    pub fn fail_with_code(&self, op: RemoteOp, code: impl Into<String>, message: impl Into<String>) {
        lock(&self.failures).insert(
            op,
            InjectedFailure {
                code: Some(code.into()),
                message: message.into(),
            },
        );
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RemoteOp> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, op: RemoteOp) -> usize {
        lock(&self.calls).iter().filter(|c| **c == op).count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Stored habit rows, oldest first.
    pub fn habit_rows(&self) -> Vec<HabitRow> {
        lock(&self.tables).habits.clone()
    }

    /// Stored completed days of one habit for the signed-in user.
    pub fn completed_days(&self, habit_id: &str, month: &MonthKey) -> Vec<u32> {
        let user_id = self.user_id();
        let month = month.to_string();
        lock(&self.tables)
            .logs
            .keys()
            .filter(|(u, h, m, _)| *u == user_id && h == habit_id && *m == month)
            .map(|(_, _, _, day)| *day)
            .collect()
    }

    pub fn stored_weekly_goals(&self, week_start: NaiveDate) -> Option<Vec<bool>> {
        lock(&self.tables)
            .weekly
            .get(&(self.user_id(), week_start))
            .cloned()
    }

    pub fn stored_reflection(&self, month: &MonthKey) -> Option<String> {
        lock(&self.tables)
            .reflections
            .get(&(self.user_id(), month.to_string()))
            .cloned()
    }

    fn user_id(&self) -> String {
        lock(&self.user)
            .as_ref()
            .map(|u| u.id.clone())
            .unwrap_or_default()
    }

    fn seed_habit(&self, id: String, name: String, template: Option<String>) {
        let row = HabitRow {
            id,
            user_id: Some(self.user_id()),
            name,
            template,
            created_at: Some(Utc::now()),
        };
        lock(&self.tables).habits.push(row);
    }

    /// Record the call, wait out the latency, then apply any injected failure
    async fn enter(&self, op: RemoteOp) -> Result<()> {
        lock(&self.calls).push(op);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match lock(&self.failures).get(&op).cloned() {
            Some(failure) => Err(TrackerError::Remote {
                code: failure.code,
                message: failure.message,
            }),
            None => Ok(()),
        }
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    fn id(&self) -> &str {
        "mock"
    }

    async fn current_user(&self) -> Result<Option<AuthUser>> {
        self.enter(RemoteOp::CurrentUser).await?;
        Ok(lock(&self.user).clone())
    }

    async fn list_habits(&self, user_id: &str) -> Result<Vec<HabitRow>> {
        self.enter(RemoteOp::ListHabits).await?;
        Ok(lock(&self.tables)
            .habits
            .iter()
            .filter(|h| h.user_id.as_deref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn create_habit(&self, habit: NewHabit) -> Result<HabitRow> {
        self.enter(RemoteOp::CreateHabit).await?;
        let row = HabitRow {
            id: format!("srv-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            user_id: Some(habit.user_id),
            name: habit.name,
            template: habit.template,
            created_at: Some(Utc::now()),
        };
        lock(&self.tables).habits.push(row.clone());
        Ok(row)
    }

    async fn rename_habit(&self, habit_id: &str, name: &str) -> Result<()> {
        self.enter(RemoteOp::RenameHabit).await?;
        if let Some(row) = lock(&self.tables).habits.iter_mut().find(|h| h.id == habit_id) {
            row.name = name.to_string();
        }
        Ok(())
    }

    async fn list_completions(&self, user_id: &str, month: &MonthKey) -> Result<Vec<HabitLogRow>> {
        self.enter(RemoteOp::ListCompletions).await?;
        let month = month.to_string();
        Ok(lock(&self.tables)
            .logs
            .iter()
            .filter(|((u, _, m, _), _)| u == user_id && *m == month)
            .map(|((_, habit_id, _, day), completed_at)| HabitLogRow {
                habit_id: habit_id.clone(),
                day_index: *day as i32,
                completed_at: Some(*completed_at),
            })
            .collect())
    }

    async fn upsert_completion(&self, log: HabitLogUpsert) -> Result<()> {
        self.enter(RemoteOp::UpsertCompletion).await?;
        let HabitLogKey {
            user_id,
            habit_id,
            month,
            day_index,
        } = log.key;
        lock(&self.tables)
            .logs
            .insert((user_id, habit_id, month, day_index), log.completed_at);
        Ok(())
    }

    async fn delete_completion(&self, key: HabitLogKey) -> Result<()> {
        self.enter(RemoteOp::DeleteCompletion).await?;
        lock(&self.tables)
            .logs
            .remove(&(key.user_id, key.habit_id, key.month, key.day_index));
        Ok(())
    }

    async fn weekly_goals(&self, user_id: &str, week_start: NaiveDate) -> Result<Option<Vec<bool>>> {
        self.enter(RemoteOp::WeeklyGoals).await?;
        Ok(lock(&self.tables)
            .weekly
            .get(&(user_id.to_string(), week_start))
            .cloned())
    }

    async fn upsert_weekly_goals(&self, snapshot: WeeklyHabitsUpsert) -> Result<()> {
        self.enter(RemoteOp::UpsertWeeklyGoals).await?;
        lock(&self.tables)
            .weekly
            .insert((snapshot.user_id, snapshot.week_start_date), snapshot.habits_state);
        Ok(())
    }

    async fn monthly_reflection(&self, user_id: &str, month: &MonthKey) -> Result<Option<String>> {
        self.enter(RemoteOp::MonthlyReflection).await?;
        Ok(lock(&self.tables)
            .reflections
            .get(&(user_id.to_string(), month.to_string()))
            .cloned())
    }

    async fn upsert_monthly_reflection(&self, reflection: MonthlyReflectionUpsert) -> Result<()> {
        self.enter(RemoteOp::UpsertMonthlyReflection).await?;
        lock(&self.tables)
            .reflections
            .insert((reflection.user_id, reflection.month), reflection.content);
        Ok(())
    }

    async fn sign_out(&self) -> Result<()> {
        self.enter(RemoteOp::SignOut).await?;
        *lock(&self.user) = None;
        Ok(())
    }
}
