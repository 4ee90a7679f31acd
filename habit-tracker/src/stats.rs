//! Progress figures derived from a habit list

use crate::types::{Habit, HabitId, DAYS_IN_GRID};
use serde::Serialize;
use std::fmt;

/// Number of entries in the top-habits ranking
pub const TOP_HABIT_COUNT: usize = 5;

/// A contiguous run of days in the 31-day grid, 1-based and inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub label: &'static str,
    pub first_day: usize,
    pub last_day: usize,
}

impl WeekWindow {
    pub const fn new(label: &'static str, first_day: usize, last_day: usize) -> Self {
        Self { label, first_day, last_day }
    }

    /// Number of days covered
    pub fn len(&self) -> usize {
        (self.last_day + 1).saturating_sub(self.first_day)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-based grid indices covered
    pub fn day_indices(&self) -> std::ops::Range<usize> {
        let start = self.first_day.saturating_sub(1).min(DAYS_IN_GRID);
        let end = self.last_day.min(DAYS_IN_GRID).max(start);
        start..end
    }
}

/// The five fixed windows of a month grid
pub const WEEK_WINDOWS: [WeekWindow; 5] = [
    WeekWindow::new("Week 1", 1, 7),
    WeekWindow::new("Week 2", 8, 14),
    WeekWindow::new("Week 3", 15, 21),
    WeekWindow::new("Week 4", 22, 28),
    WeekWindow::new("Week 5", 29, 31),
];

/// Completion tally for one week window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekProgress {
    pub label: String,
    pub completed: usize,
    pub possible: usize,
}

impl WeekProgress {
    /// Completed share in percent; 0 when nothing was possible
    pub fn percentage(&self) -> f64 {
        if self.possible == 0 {
            return 0.0;
        }
        self.completed as f64 / self.possible as f64 * 100.0
    }

    pub fn rounded_percentage(&self) -> u32 {
        self.percentage().round() as u32
    }
}

/// Tally each window over every habit that has a name
pub fn weekly_progress(habits: &[Habit], windows: &[WeekWindow]) -> Vec<WeekProgress> {
    let named: Vec<&Habit> = habits.iter().filter(|h| h.has_name()).collect();

    windows
        .iter()
        .map(|window| {
            let completed = named
                .iter()
                .map(|h| h.completed_days[window.day_indices()].iter().filter(|d| **d).count())
                .sum();
            WeekProgress {
                label: window.label.to_string(),
                completed,
                possible: named.len() * window.len(),
            }
        })
        .collect()
}

/// A habit's share of completed days
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopHabit {
    pub id: HabitId,
    pub name: String,
    /// Rounded to the nearest whole percent
    pub percentage: u32,
}

/// Rank habits by completion over the full grid, best first.
///
/// Equal percentages keep their input order. At most `limit` entries.
pub fn top_habits(habits: &[Habit], limit: usize) -> Vec<TopHabit> {
    let mut ranked: Vec<TopHabit> = habits
        .iter()
        .map(|h| TopHabit {
            id: h.id.clone(),
            name: h.name.clone(),
            percentage: (h.completed_count() as f64 / DAYS_IN_GRID as f64 * 100.0).round() as u32,
        })
        .collect();

    // sort_by is stable
    ranked.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    ranked.truncate(limit);
    ranked
}

/// Completed checks across all habits against every possible check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthProgress {
    pub completed: usize,
    pub possible: usize,
}

impl MonthProgress {
    pub fn percentage(&self) -> f64 {
        if self.possible == 0 {
            return 0.0;
        }
        self.completed as f64 / self.possible as f64 * 100.0
    }
}

impl fmt::Display for MonthProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.percentage())
    }
}

pub fn month_progress(habits: &[Habit]) -> MonthProgress {
    MonthProgress {
        completed: habits.iter().map(Habit::completed_count).sum(),
        possible: habits.len() * DAYS_IN_GRID,
    }
}
