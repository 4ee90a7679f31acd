//! Habit Tracker
//!
//! State store behind the habit dashboard. Holds one month of habits, the
//! current week's goals and the month's reflection, applies every change
//! locally first and writes it through to a [`RemoteStore`].
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ HabitStore ──▶ RemoteStore (RestRemote │ MockRemote)
//!               │   ▲
//!               │   └── reconcile (defaults + server habits)
//!               └──▶ stats (weekly progress, top habits, month progress)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use habit_tracker::{HabitStore, MockRemote, MonthKey};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = Arc::new(MockRemote::signed_in("user-1"));
//! let store = HabitStore::new(remote, "2025-03".parse::<MonthKey>()?);
//!
//! store.fetch().await;
//! let habits = store.habits().await;
//! store.toggle_day(&habits[0].id, 0).await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cache;
pub mod calendar;
pub mod error;
pub mod notify;
pub mod reconcile;
pub mod session;
pub mod stats;
pub mod store;
pub mod types;

pub use backend::{MockRemote, RemoteOp, RemoteStore, RestRemote};
pub use cache::{FileCache, LocalCache, MemoryCache, LEGACY_STATE_KEY, SESSION_TOKEN_KEY};
pub use calendar::{week_start, Clock, FixedClock, MonthKey, SystemClock};
pub use error::{Result, TrackerError};
pub use notify::{Notification, NotificationLevel, NotificationLog, Notifier, TracingNotifier};
pub use reconcile::reconcile;
pub use session::sign_out;
pub use stats::{
    month_progress, top_habits, weekly_progress, MonthProgress, TopHabit, WeekProgress, WeekWindow,
    TOP_HABIT_COUNT, WEEK_WINDOWS,
};
pub use store::{FailurePolicy, FetchOutcome, HabitStore};
pub use types::*;
