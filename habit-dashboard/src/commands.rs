//! Dashboard commands

use std::sync::Arc;

use anyhow::{anyhow, bail};
use clap::Subcommand;
use habit_store_client::AuthSession;
use habit_tracker::{
    session, Clock, FailurePolicy, FetchOutcome, Habit, HabitId, HabitStore, LocalCache, MonthKey,
    NotificationLevel, NotificationLog, RemoteStore, RestRemote, SESSION_TOKEN_KEY,
};
use tracing::info;

use crate::render::{render_json, render_text, DashboardView};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and remember the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "HABIT_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the month grid and progress
    Show {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Mark or unmark a day
    Toggle {
        /// Habit position, ID or name
        habit: String,
        /// Day of month (1-31)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=31))]
        day: u8,
    },

    /// Add a habit
    Add {
        name: String,
    },

    /// Rename a habit
    Rename {
        /// Habit position, ID or name
        habit: String,
        name: String,
    },

    /// Check or uncheck a weekly goal
    Weekly {
        /// Goal number (1-5)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=5))]
        goal: u8,
    },

    /// Replace this month's reflection
    Reflect {
        text: String,
    },

    /// Sign out and clear the local session
    SignOut,
}

impl Command {
    fn needs_session(&self) -> bool {
        !matches!(self, Command::Show { .. })
    }
}

/// Sign in with email and password and cache the access token
pub async fn login(
    remote: &RestRemote,
    cache: &dyn LocalCache,
    email: &str,
    password: &str,
) -> anyhow::Result<AuthSession> {
    let session = remote.client().sign_in_with_password(email, password).await?;
    cache.set(SESSION_TOKEN_KEY, &session.access_token)?;
    info!(user_id = %session.user.id, "Session cached");
    Ok(session)
}

/// A habit store plus the session it runs in
pub struct Dashboard {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    notifications: Arc<NotificationLog>,
    store: HabitStore,
}

impl Dashboard {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        month: MonthKey,
        policy: FailurePolicy,
    ) -> Self {
        let notifications = Arc::new(NotificationLog::new());
        let store = HabitStore::new(remote.clone(), month)
            .with_notifier(notifications.clone())
            .with_failure_policy(policy);

        Self {
            remote,
            cache,
            notifications,
            store,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.store = self.store.with_clock(clock);
        self
    }

    pub fn store(&self) -> &HabitStore {
        &self.store
    }

    /// Run one command and return what to print
    pub async fn run(&self, command: Command) -> anyhow::Result<String> {
        if let Command::SignOut = command {
            let result = session::sign_out(
                self.cache.as_ref(),
                self.remote.as_ref(),
                self.notifications.as_ref(),
            )
            .await;
            self.notifications.drain();
            result?;
            return Ok("Signed out".to_string());
        }

        match self.store.fetch().await {
            FetchOutcome::Failed => self.check_notifications()?,
            FetchOutcome::SignedOut if command.needs_session() => {
                bail!("Not signed in; run `habit-dashboard login` first")
            }
            _ => {}
        }

        match command {
            Command::Show { json } => return self.render(json).await,
            Command::Toggle { habit, day } => {
                let id = self.find_habit(&habit).await?;
                self.store.toggle_day(&id, usize::from(day) - 1).await;
            }
            Command::Add { name } => {
                if name.trim().is_empty() {
                    bail!("Habit name must not be blank");
                }
                self.store.add_habit(&name).await;
            }
            Command::Rename { habit, name } => {
                let id = self.find_habit(&habit).await?;
                self.store.update_habit_name(&id, &name).await;
            }
            Command::Weekly { goal } => {
                self.store.toggle_weekly_goal(usize::from(goal) - 1).await;
            }
            Command::Reflect { text } => {
                self.store.set_monthly_reflection(&text).await;
            }
            Command::Login { .. } | Command::SignOut => {
                bail!("command is handled before the dashboard starts")
            }
        }

        self.check_notifications()?;
        self.render(false).await
    }

    async fn render(&self, json: bool) -> anyhow::Result<String> {
        let month = self.store.month().await;
        let state = self.store.snapshot().await;
        let view = DashboardView::new(month, &state);
        if json {
            render_json(&view)
        } else {
            Ok(render_text(&view))
        }
    }

    /// Turn error notifications raised so far into a command failure
    fn check_notifications(&self) -> anyhow::Result<()> {
        let errors: Vec<String> = self
            .notifications
            .drain()
            .into_iter()
            .filter(|n| n.level == NotificationLevel::Error)
            .map(|n| n.message)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(errors.join("; ")))
        }
    }

    async fn find_habit(&self, selector: &str) -> anyhow::Result<HabitId> {
        let habits = self.store.habits().await;
        find_habit(&habits, selector).ok_or_else(|| anyhow!("No habit matches {:?}", selector))
    }
}

/// Match a 1-based position, an exact ID, or a name (case-insensitive)
fn find_habit(habits: &[Habit], selector: &str) -> Option<HabitId> {
    if let Ok(position) = selector.parse::<usize>() {
        if let Some(habit) = position.checked_sub(1).and_then(|i| habits.get(i)) {
            return Some(habit.id.clone());
        }
    }

    habits
        .iter()
        .find(|h| h.id.as_str() == selector)
        .or_else(|| habits.iter().find(|h| h.name.eq_ignore_ascii_case(selector)))
        .map(|h| h.id.clone())
}
