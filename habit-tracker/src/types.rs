//! Core data model: habits and the dashboard state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of day slots per habit, regardless of the month's real length
pub const DAYS_IN_GRID: usize = 31;

/// Number of fixed weekly achievement checkboxes
pub const WEEKLY_GOAL_COUNT: usize = 5;

/// Completion flags for one month, index = day of month - 1
pub type CompletedDays = [bool; DAYS_IN_GRID];

/// Weekly achievement flags for one ISO week
pub type WeeklyGoals = [bool; WEEKLY_GOAL_COUNT];

/// Labels of the weekly achievements, in checkbox order
pub const WEEKLY_GOAL_LABELS: [&str; WEEKLY_GOAL_COUNT] = [
    "Plan week ahead",
    "Review weekly spending",
    "Digital declutter",
    "Try one new thing",
    "Connect with a friend",
];

/// A default habit every user starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HabitTemplate {
    /// Stable key, stored on the server row once the habit is persisted
    pub key: &'static str,
    /// Initial display name
    pub name: &'static str,
}

/// The five default habits, in display order
pub const DEFAULT_HABITS: [HabitTemplate; 5] = [
    HabitTemplate { key: "read", name: "Read 10 pages" },
    HabitTemplate { key: "workout", name: "30-min workout" },
    HabitTemplate { key: "meditate", name: "Meditate" },
    HabitTemplate { key: "no-social", name: "No social media after 10 PM" },
    HabitTemplate { key: "water", name: "Drink 8 glasses of water" },
];

/// Identifier of a habit.
///
/// Three shapes exist:
/// - `default:<key>` for a default habit not yet stored on the server
/// - `temp-<uuid>` for a user-created habit awaiting its server ID
/// - anything else is a server-assigned ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(String);

impl HabitId {
    const TEMP_PREFIX: &'static str = "temp-";
    const TEMPLATE_PREFIX: &'static str = "default:";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh local-only ID for an optimistically added habit
    pub fn temporary() -> Self {
        Self(format!("{}{}", Self::TEMP_PREFIX, uuid::Uuid::new_v4()))
    }

    /// Client-side ID of a default habit
    pub fn for_template(key: &str) -> Self {
        Self(format!("{}{}", Self::TEMPLATE_PREFIX, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(Self::TEMP_PREFIX)
    }

    /// Template key, for a default habit that has no server row yet
    pub fn template_key(&self) -> Option<&str> {
        self.0.strip_prefix(Self::TEMPLATE_PREFIX)
    }

    /// Whether this ID was assigned by the server
    pub fn is_persisted(&self) -> bool {
        !self.is_temporary() && self.template_key().is_none()
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for HabitId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for HabitId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A named daily target with one month of completion flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub completed_days: CompletedDays,
}

impl Habit {
    /// Create a habit with no completed days
    pub fn new(id: HabitId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            completed_days: [false; DAYS_IN_GRID],
        }
    }

    /// Zeroed habit for a default template
    pub fn from_template(template: &HabitTemplate) -> Self {
        Self::new(HabitId::for_template(template.key), template.name)
    }

    /// Number of days marked complete
    pub fn completed_count(&self) -> usize {
        self.completed_days.iter().filter(|d| **d).count()
    }

    /// Whether `day_index` is marked complete; out-of-range days are not
    pub fn is_completed(&self, day_index: usize) -> bool {
        self.completed_days.get(day_index).copied().unwrap_or(false)
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Everything the dashboard shows for one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardState {
    pub habits: Vec<Habit>,
    pub last_updated: DateTime<Utc>,
    pub monthly_reflection: String,
    /// Scoped to the current ISO week, not to the month
    pub weekly_goals: WeeklyGoals,
    /// Local-only, never persisted
    pub affirmation_image: Option<String>,
}

impl DashboardState {
    /// State before the first fetch: the five defaults, nothing completed
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            habits: default_habits(),
            last_updated: now,
            monthly_reflection: String::new(),
            weekly_goals: [false; WEEKLY_GOAL_COUNT],
            affirmation_image: None,
        }
    }

    pub fn habit(&self, id: &HabitId) -> Option<&Habit> {
        self.habits.iter().find(|h| &h.id == id)
    }

    pub fn habit_mut(&mut self, id: &HabitId) -> Option<&mut Habit> {
        self.habits.iter_mut().find(|h| &h.id == id)
    }
}

/// Zeroed habits for every default template
pub fn default_habits() -> Vec<Habit> {
    DEFAULT_HABITS.iter().map(Habit::from_template).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_habit_id_shapes() {
        let temp = HabitId::temporary();
        assert!(temp.is_temporary());
        assert!(!temp.is_persisted());
        assert_eq!(temp.template_key(), None);

        let default = HabitId::for_template("meditate");
        assert_eq!(default.template_key(), Some("meditate"));
        assert!(!default.is_persisted());

        let server = HabitId::new("3f1c2a");
        assert!(server.is_persisted());
    }

    #[test]
    fn test_temporary_ids_are_unique() {
        assert_ne!(HabitId::temporary(), HabitId::temporary());
    }

    #[test]
    fn test_initial_state() {
        let state = DashboardState::initial(Utc::now());
        assert_eq!(state.habits.len(), 5);
        assert!(state.habits.iter().all(|h| h.completed_count() == 0));
        assert_eq!(state.habits[2].name, "Meditate");
        assert_eq!(state.habits[2].id, HabitId::for_template("meditate"));
        assert_eq!(state.weekly_goals, [false; WEEKLY_GOAL_COUNT]);
    }

    #[test]
    fn test_is_completed_out_of_range() {
        let mut habit = Habit::new("h".into(), "Read");
        habit.completed_days[30] = true;
        assert!(habit.is_completed(30));
        assert!(!habit.is_completed(31));
    }

    #[test]
    fn test_habit_serializes_full_grid() {
        let habit = Habit::new("h".into(), "Read");
        let json = serde_json::to_value(&habit).unwrap();
        assert_eq!(json["id"], "h");
        assert_eq!(json["completed_days"].as_array().unwrap().len(), DAYS_IN_GRID);
    }
}
