//! HabitStore - the in-process view of one month's dashboard.
//!
//! Mutations apply to local state first and are then written to the
//! [`RemoteStore`]. Remote failures never reach the caller; they are logged,
//! reported through the [`Notifier`], and handled per [`FailurePolicy`].
//! Adding a habit is the exception to the policy: an unconfirmed habit is
//! always removed again, since it has no server identity to reconcile.
//!
//! Completion writes are serialised per (month, habit, day) and each write
//! sends the cell's local value at the moment it is issued, so the last
//! write for a cell always matches what the user sees.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use habit_store_client::{
    HabitLogKey, HabitLogUpsert, MonthlyReflectionUpsert, NewHabit, WeeklyHabitsUpsert,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::backend::RemoteStore;
use crate::calendar::{week_start, Clock, MonthKey, SystemClock};
use crate::error::{Result, TrackerError};
use crate::notify::{
    Notification, Notifier, TracingNotifier, ADD_HABIT_FAILED, RENAME_HABIT_FAILED,
    SAVE_PROGRESS_FAILED, SAVE_REFLECTION_FAILED, SAVE_WEEKLY_FAILED, SCHEMA_MISMATCH_MESSAGE,
};
use crate::reconcile::reconcile;
use crate::types::{
    DashboardState, Habit, HabitId, WeeklyGoals, DAYS_IN_GRID, WEEKLY_GOAL_COUNT,
};

/// What a mutator does with its local change when the remote write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep the local value until the next fetch
    #[default]
    KeepLocal,
    /// Restore the value from before the mutation
    Revert,
}

/// Result of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Local state was replaced with the server's
    Synced,
    /// Nobody is signed in; local state untouched
    SignedOut,
    /// A retrieval failed; local state untouched, user notified
    Failed,
    /// The month changed while fetching; results discarded
    Superseded,
}

enum Persisted {
    /// Already had a server ID
    Existing(HabitId),
    /// Server row created just now from the local habit
    Created(HabitId),
    /// Temporary habit whose creation did not go through
    Pending,
}

struct Loaded {
    habits: Vec<Habit>,
    weekly_goals: WeeklyGoals,
    reflection: String,
}

/// One async mutex per key, created on first use and dropped once no
/// task holds or waits for it
#[derive(Default)]
struct KeyedLocks {
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: String) -> KeyedGuard<'_> {
        let mutex = lock(&self.locks).entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            owner: self,
            key,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock(&self.locks).len()
    }
}

struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        // Waiters clone the mutex under the map lock, so a count of one
        // here means the map holds the only reference
        let mut locks = lock(&self.owner.locks);
        self.guard.take();
        if locks.get(&self.key).is_some_and(|m| Arc::strong_count(m) == 1) {
            locks.remove(&self.key);
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Normalise a stored weekly snapshot to exactly five flags
fn weekly_goals_from(stored: Option<&[bool]>) -> WeeklyGoals {
    let mut goals = [false; WEEKLY_GOAL_COUNT];
    for (slot, value) in goals.iter_mut().zip(stored.unwrap_or_default()) {
        *slot = *value;
    }
    goals
}

/// Habit state store for one signed-in session.
pub struct HabitStore {
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: FailurePolicy,
    month: RwLock<MonthKey>,
    state: RwLock<DashboardState>,
    /// Fetches in flight
    syncing: AtomicUsize,
    hydrated: AtomicBool,
    /// Serialises remote writes per cell / field
    write_locks: KeyedLocks,
    /// Serialises server-row creation per local habit ID
    habit_locks: KeyedLocks,
    /// Local IDs replaced by server IDs
    aliases: StdMutex<HashMap<HabitId, HabitId>>,
}

impl HabitStore {
    /// Create a store scoped to `month`, holding the default habits.
    pub fn new(remote: Arc<dyn RemoteStore>, month: MonthKey) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            remote,
            notifier: Arc::new(TracingNotifier),
            state: RwLock::new(DashboardState::initial(clock.now())),
            clock,
            policy: FailurePolicy::default(),
            month: RwLock::new(month),
            syncing: AtomicUsize::new(0),
            hydrated: AtomicBool::new(false),
            write_locks: KeyedLocks::default(),
            habit_locks: KeyedLocks::default(),
            aliases: StdMutex::new(HashMap::new()),
        }
    }

    /// Report user-visible failures to `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Take "now" from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state.get_mut().last_updated = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    // ==================== Reading ====================

    /// Copy of the current state
    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    pub async fn habits(&self) -> Vec<Habit> {
        self.state.read().await.habits.clone()
    }

    pub async fn month(&self) -> MonthKey {
        *self.month.read().await
    }

    /// Whether a fetch is in flight
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst) > 0
    }

    /// Whether at least one fetch has finished, successfully or not
    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    // ==================== Fetch ====================

    /// Replace local state with the server's view of the current month.
    ///
    /// All four collections are retrieved before anything is applied; any
    /// failure leaves local state as it was.
    pub async fn fetch(&self) -> FetchOutcome {
        self.syncing.fetch_add(1, Ordering::SeqCst);
        let month = *self.month.read().await;

        let outcome = match self.load(month).await {
            Ok(Some(loaded)) => self.apply(month, loaded).await,
            Ok(None) | Err(TrackerError::Unauthenticated) => {
                debug!(month = %month, "Not signed in, keeping local state");
                FetchOutcome::SignedOut
            }
            Err(e) => {
                self.report_fetch_failure(&e);
                FetchOutcome::Failed
            }
        };

        self.syncing.fetch_sub(1, Ordering::SeqCst);
        self.hydrated.store(true, Ordering::SeqCst);
        outcome
    }

    /// Switch to another month and fetch it.
    ///
    /// Completion flags and the reflection are cleared first so the old
    /// month is never shown under the new key.
    pub async fn set_month(&self, month: MonthKey) -> FetchOutcome {
        {
            let mut current = self.month.write().await;
            if *current != month {
                info!(from = %*current, to = %month, "Switching month");
                *current = month;
                let mut state = self.state.write().await;
                for habit in &mut state.habits {
                    habit.completed_days = [false; DAYS_IN_GRID];
                }
                state.monthly_reflection.clear();
                state.last_updated = self.clock.now();
            }
        }
        self.fetch().await
    }

    async fn load(&self, month: MonthKey) -> Result<Option<Loaded>> {
        let Some(user) = self.remote.current_user().await? else {
            return Ok(None);
        };
        let week = week_start(self.clock.today());

        let (rows, logs, goals, reflection) = tokio::try_join!(
            self.remote.list_habits(&user.id),
            self.remote.list_completions(&user.id, &month),
            self.remote.weekly_goals(&user.id, week),
            self.remote.monthly_reflection(&user.id, &month),
        )?;

        Ok(Some(Loaded {
            habits: reconcile(&rows, &logs),
            weekly_goals: weekly_goals_from(goals.as_deref()),
            reflection: reflection.unwrap_or_default(),
        }))
    }

    async fn apply(&self, month: MonthKey, loaded: Loaded) -> FetchOutcome {
        let current = self.month.read().await;
        if *current != month {
            debug!(fetched = %month, current = %*current, "Discarding fetch for previous month");
            return FetchOutcome::Superseded;
        }

        let mut state = self.state.write().await;
        state.habits = loaded.habits;
        state.weekly_goals = loaded.weekly_goals;
        state.monthly_reflection = loaded.reflection;
        state.last_updated = self.clock.now();
        lock(&self.aliases).clear();

        info!(month = %month, habits = state.habits.len(), "Dashboard synced");
        FetchOutcome::Synced
    }

    fn report_fetch_failure(&self, err: &TrackerError) {
        error!(backend = self.remote.id(), error = %err, "Failed to fetch dashboard");

        let notification = if err.is_schema_mismatch() {
            Notification::error(SCHEMA_MISMATCH_MESSAGE)
        } else {
            match err {
                TrackerError::Remote { message, .. } => Notification::sync_failed(message),
                other => Notification::sync_failed(&other.to_string()),
            }
        };
        self.notifier.notify(notification);
    }

    // ==================== Daily completions ====================

    /// Flip one day of one habit.
    ///
    /// Out-of-range days and unknown habits are ignored.
    pub async fn toggle_day(&self, habit_id: &HabitId, day_index: usize) {
        if day_index >= DAYS_IN_GRID {
            warn!(habit_id = %habit_id, day_index, "Day index out of range, ignoring toggle");
            return;
        }
        let month = *self.month.read().await;

        let (habit_id, previous) = {
            let mut state = self.state.write().await;
            let habit_id = self.resolve(habit_id);
            let Some(habit) = state.habit_mut(&habit_id) else {
                warn!(habit_id = %habit_id, "Unknown habit, ignoring toggle");
                return;
            };
            let previous = habit.completed_days[day_index];
            habit.completed_days[day_index] = !previous;
            state.last_updated = self.clock.now();
            (habit_id, previous)
        };
        debug!(habit_id = %habit_id, day_index, completed = !previous, "Toggled day");

        if let Err(e) = self.persist_day(&habit_id, month, day_index).await {
            if self.report_write_failure("toggle_day", &e, SAVE_PROGRESS_FAILED)
                && self.policy == FailurePolicy::Revert
            {
                let mut state = self.state.write().await;
                let habit_id = self.resolve(&habit_id);
                if let Some(habit) = state.habit_mut(&habit_id) {
                    if habit.completed_days[day_index] != previous {
                        habit.completed_days[day_index] = previous;
                    }
                }
            }
        }
    }

    async fn persist_day(&self, habit_id: &HabitId, month: MonthKey, day_index: usize) -> Result<()> {
        let Some(user) = self.remote.current_user().await? else {
            debug!(habit_id = %habit_id, "Not signed in, completion kept locally");
            return Ok(());
        };

        let server_id = match self.ensure_persisted(&user.id, habit_id).await? {
            Persisted::Existing(id) | Persisted::Created(id) => id,
            Persisted::Pending => {
                debug!(habit_id = %habit_id, "Habit has no server ID, completion kept locally");
                return Ok(());
            }
        };

        let _guard = self
            .write_locks
            .acquire(format!("day:{}:{}:{}", month, server_id, day_index))
            .await;

        if *self.month.read().await != month {
            debug!(month = %month, "Month changed before completion write, skipping");
            return Ok(());
        }
        let completed = match self.state.read().await.habit(&server_id) {
            Some(habit) => habit.completed_days[day_index],
            None => return Ok(()),
        };

        let key = HabitLogKey {
            user_id: user.id,
            habit_id: server_id.to_string(),
            month: month.to_string(),
            day_index: day_index as u32,
        };

        if completed {
            self.remote
                .upsert_completion(HabitLogUpsert {
                    key,
                    completed_at: self.clock.now(),
                })
                .await
        } else {
            self.remote.delete_completion(key).await
        }
    }

    // ==================== Habits ====================

    /// Add a habit named `name` (trimmed) at the end of the list.
    ///
    /// Returns the habit's ID: the server's once the create succeeded, the
    /// temporary one when nobody is signed in, and `None` for a blank name
    /// or a failed create.
    pub async fn add_habit(&self, name: &str) -> Option<HabitId> {
        let name = name.trim();
        if name.is_empty() {
            debug!("Ignoring blank habit name");
            return None;
        }

        let temp_id = HabitId::temporary();
        let _guard = self.habit_locks.acquire(temp_id.to_string()).await;

        {
            let mut state = self.state.write().await;
            state.habits.push(Habit::new(temp_id.clone(), name));
            state.last_updated = self.clock.now();
        }

        let created = match self.remote.current_user().await {
            Ok(Some(user)) => {
                self.remote
                    .create_habit(NewHabit {
                        user_id: user.id,
                        name: name.to_string(),
                        template: None,
                    })
                    .await
            }
            Ok(None) => {
                debug!(habit_id = %temp_id, "Not signed in, habit kept locally");
                return Some(temp_id);
            }
            Err(e) => Err(e),
        };

        match created {
            Ok(row) => {
                let server_id = HabitId::new(row.id);
                self.replace_id(&temp_id, &server_id).await;
                info!(habit_id = %server_id, "Habit added");
                Some(server_id)
            }
            Err(e) => {
                {
                    let mut state = self.state.write().await;
                    state.habits.retain(|h| h.id != temp_id);
                }
                self.report_write_failure("add_habit", &e, ADD_HABIT_FAILED);
                None
            }
        }
    }

    /// Rename a habit. Unknown habits are ignored.
    pub async fn update_habit_name(&self, habit_id: &HabitId, name: &str) {
        let (habit_id, previous) = {
            let mut state = self.state.write().await;
            let habit_id = self.resolve(habit_id);
            let Some(habit) = state.habit_mut(&habit_id) else {
                warn!(habit_id = %habit_id, "Unknown habit, ignoring rename");
                return;
            };
            let previous = std::mem::replace(&mut habit.name, name.to_string());
            state.last_updated = self.clock.now();
            (habit_id, previous)
        };

        if let Err(e) = self.persist_name(&habit_id).await {
            if self.report_write_failure("update_habit_name", &e, RENAME_HABIT_FAILED)
                && self.policy == FailurePolicy::Revert
            {
                let mut state = self.state.write().await;
                let habit_id = self.resolve(&habit_id);
                if let Some(habit) = state.habit_mut(&habit_id) {
                    if habit.name == name {
                        habit.name = previous;
                    }
                }
            }
        }
    }

    async fn persist_name(&self, habit_id: &HabitId) -> Result<()> {
        let Some(user) = self.remote.current_user().await? else {
            debug!(habit_id = %habit_id, "Not signed in, name kept locally");
            return Ok(());
        };

        let server_id = match self.ensure_persisted(&user.id, habit_id).await? {
            Persisted::Existing(id) => id,
            // Stored with its current name already
            Persisted::Created(_) => return Ok(()),
            Persisted::Pending => return Ok(()),
        };

        let _guard = self.write_locks.acquire(format!("name:{}", server_id)).await;

        let name = match self.state.read().await.habit(&server_id) {
            Some(habit) => habit.name.clone(),
            None => return Ok(()),
        };
        self.remote.rename_habit(server_id.as_str(), &name).await
    }

    /// Make sure `habit_id` has a server row.
    ///
    /// Default habits get their row created from the current local name.
    /// Temporary habits wait for their in-flight create.
    async fn ensure_persisted(&self, user_id: &str, habit_id: &HabitId) -> Result<Persisted> {
        if habit_id.is_persisted() {
            return Ok(Persisted::Existing(habit_id.clone()));
        }

        let _guard = self.habit_locks.acquire(habit_id.to_string()).await;

        let current = self.resolve(habit_id);
        if current.is_persisted() {
            return Ok(Persisted::Existing(current));
        }
        let Some(template) = current.template_key() else {
            return Ok(Persisted::Pending);
        };

        let name = match self.state.read().await.habit(&current) {
            Some(habit) => habit.name.clone(),
            None => return Ok(Persisted::Pending),
        };

        let row = self
            .remote
            .create_habit(NewHabit {
                user_id: user_id.to_string(),
                name,
                template: Some(template.to_string()),
            })
            .await?;

        let server_id = HabitId::new(row.id);
        self.replace_id(&current, &server_id).await;
        info!(template, habit_id = %server_id, "Default habit stored");
        Ok(Persisted::Created(server_id))
    }

    async fn replace_id(&self, old: &HabitId, new: &HabitId) {
        let mut state = self.state.write().await;
        lock(&self.aliases).insert(old.clone(), new.clone());
        if let Some(habit) = state.habit_mut(old) {
            habit.id = new.clone();
        }
    }

    fn resolve(&self, habit_id: &HabitId) -> HabitId {
        lock(&self.aliases)
            .get(habit_id)
            .cloned()
            .unwrap_or_else(|| habit_id.clone())
    }

    // ==================== Weekly goals ====================

    /// Replace all five weekly goal flags
    pub async fn set_weekly_habits(&self, goals: WeeklyGoals) {
        self.update_weekly_goals(|current| *current = goals).await;
    }

    /// Flip one weekly goal. Out-of-range indices are ignored.
    pub async fn toggle_weekly_goal(&self, index: usize) {
        if index >= WEEKLY_GOAL_COUNT {
            warn!(index, "Weekly goal index out of range, ignoring toggle");
            return;
        }
        self.update_weekly_goals(|current| current[index] = !current[index]).await;
    }

    async fn update_weekly_goals(&self, change: impl FnOnce(&mut WeeklyGoals)) {
        let (previous, updated) = {
            let mut state = self.state.write().await;
            let previous = state.weekly_goals;
            change(&mut state.weekly_goals);
            state.last_updated = self.clock.now();
            (previous, state.weekly_goals)
        };

        if let Err(e) = self.persist_weekly_goals().await {
            if self.report_write_failure("set_weekly_habits", &e, SAVE_WEEKLY_FAILED)
                && self.policy == FailurePolicy::Revert
            {
                let mut state = self.state.write().await;
                if state.weekly_goals == updated {
                    state.weekly_goals = previous;
                }
            }
        }
    }

    async fn persist_weekly_goals(&self) -> Result<()> {
        let Some(user) = self.remote.current_user().await? else {
            debug!("Not signed in, weekly goals kept locally");
            return Ok(());
        };

        let week = week_start(self.clock.today());
        let _guard = self.write_locks.acquire(format!("weekly:{}", week)).await;

        let goals = self.state.read().await.weekly_goals;
        self.remote
            .upsert_weekly_goals(WeeklyHabitsUpsert {
                user_id: user.id,
                week_start_date: week,
                habits_state: goals.to_vec(),
                updated_at: self.clock.now(),
            })
            .await
    }

    // ==================== Reflection and image ====================

    /// Replace this month's reflection text
    pub async fn set_monthly_reflection(&self, text: &str) {
        let month = *self.month.read().await;
        let previous = {
            let mut state = self.state.write().await;
            let previous = std::mem::replace(&mut state.monthly_reflection, text.to_string());
            state.last_updated = self.clock.now();
            previous
        };

        if let Err(e) = self.persist_reflection(month).await {
            if self.report_write_failure("set_monthly_reflection", &e, SAVE_REFLECTION_FAILED)
                && self.policy == FailurePolicy::Revert
            {
                let mut state = self.state.write().await;
                if state.monthly_reflection == text {
                    state.monthly_reflection = previous;
                }
            }
        }
    }

    async fn persist_reflection(&self, month: MonthKey) -> Result<()> {
        let Some(user) = self.remote.current_user().await? else {
            debug!("Not signed in, reflection kept locally");
            return Ok(());
        };

        let _guard = self.write_locks.acquire(format!("reflection:{}", month)).await;

        if *self.month.read().await != month {
            debug!(month = %month, "Month changed before reflection write, skipping");
            return Ok(());
        }
        let content = self.state.read().await.monthly_reflection.clone();
        self.remote
            .upsert_monthly_reflection(MonthlyReflectionUpsert {
                user_id: user.id,
                month: month.to_string(),
                content,
                updated_at: self.clock.now(),
            })
            .await
    }

    /// Set or clear the affirmation image. Never leaves this process.
    pub async fn set_affirmation_image(&self, image: Option<String>) {
        let mut state = self.state.write().await;
        state.affirmation_image = image;
        state.last_updated = self.clock.now();
    }

    // ==================== Failures ====================

    /// Log and notify a failed write. Returns false when the session had
    /// simply expired, which is not reported.
    fn report_write_failure(&self, operation: &'static str, err: &TrackerError, message: &str) -> bool {
        if matches!(err, TrackerError::Unauthenticated) {
            debug!(operation, "Session expired, write skipped");
            return false;
        }
        error!(operation, backend = self.remote.id(), error = %err, "Remote write failed");
        self.notifier.notify(Notification::error(message));
        true
    }
}
