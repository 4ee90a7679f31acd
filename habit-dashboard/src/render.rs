//! Plain-text and JSON views of the dashboard

use habit_tracker::{
    month_progress, top_habits, weekly_progress, DashboardState, MonthKey, MonthProgress, TopHabit,
    WeekProgress, TOP_HABIT_COUNT, WEEKLY_GOAL_LABELS, WEEK_WINDOWS,
};
use serde::Serialize;

const NAME_WIDTH: usize = 30;

/// Everything `show --json` prints
#[derive(Debug, Serialize)]
pub struct DashboardView<'a> {
    pub month: MonthKey,
    pub state: &'a DashboardState,
    pub weekly_progress: Vec<WeekProgress>,
    pub top_habits: Vec<TopHabit>,
    pub month_progress: MonthProgress,
}

impl<'a> DashboardView<'a> {
    pub fn new(month: MonthKey, state: &'a DashboardState) -> Self {
        Self {
            month,
            state,
            weekly_progress: weekly_progress(&state.habits, &WEEK_WINDOWS),
            top_habits: top_habits(&state.habits, TOP_HABIT_COUNT),
            month_progress: month_progress(&state.habits),
        }
    }
}

pub fn render_json(view: &DashboardView<'_>) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(view)?)
}

/// Grid, progress figures, weekly goals and reflection as text
pub fn render_text(view: &DashboardView<'_>) -> String {
    let days = view.month.days_in_month() as usize;
    let mut out = String::new();

    out.push_str(&format!("Habits for {}\n\n", view.month));

    let header: String = (1..=days).map(|d| char::from(b'0' + (d % 10) as u8)).collect();
    out.push_str(&format!("{:>3}  {:<NAME_WIDTH$} {}\n", "#", "Habit", header));
    for (position, habit) in view.state.habits.iter().enumerate() {
        let cells: String = habit.completed_days[..days]
            .iter()
            .map(|done| if *done { 'x' } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:>3}  {:<NAME_WIDTH$} {}\n",
            position + 1,
            truncate(&habit.name, NAME_WIDTH),
            cells
        ));
    }

    out.push_str("\nWeekly progress\n");
    for week in &view.weekly_progress {
        out.push_str(&format!(
            "  {:<8} {:>4}/{:<4} {:>3}%\n",
            week.label,
            week.completed,
            week.possible,
            week.rounded_percentage()
        ));
    }

    out.push_str("\nTop habits\n");
    for (rank, top) in view.top_habits.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {:<NAME_WIDTH$} {:>3}%\n",
            rank + 1,
            truncate(&top.name, NAME_WIDTH),
            top.percentage
        ));
    }

    out.push_str(&format!("\nMonth progress: {}\n", view.month_progress));

    out.push_str("\nWeekly goals\n");
    for (index, (label, done)) in WEEKLY_GOAL_LABELS.iter().zip(view.state.weekly_goals).enumerate() {
        let mark = if done { 'x' } else { ' ' };
        out.push_str(&format!("  [{}] {}. {}\n", mark, index + 1, label));
    }

    if !view.state.monthly_reflection.is_empty() {
        out.push_str("\nReflection\n");
        for line in view.state.monthly_reflection.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }

    out
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut short: String = name.chars().take(width - 1).collect();
    short.push('~');
    short
}
