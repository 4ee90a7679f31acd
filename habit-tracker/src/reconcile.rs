//! Rebuilds the local habit list from server rows.
//!
//! The merged list always starts with one entry per default template, in
//! template order, followed by every server habit that is not a default.
//! A server row fills a default slot when its stored template key matches,
//! or failing that when its name equals the template's name. The first
//! matching row wins; further rows matching a default are dropped.

use crate::types::{CompletedDays, Habit, HabitId, HabitTemplate, DAYS_IN_GRID, DEFAULT_HABITS};
use habit_store_client::{HabitLogRow, HabitRow};
use std::collections::HashMap;

/// Merge server habits and this month's logs with the default templates
pub fn reconcile(rows: &[HabitRow], logs: &[HabitLogRow]) -> Vec<Habit> {
    reconcile_with(&DEFAULT_HABITS, rows, logs)
}

/// Same as [`reconcile`] with an explicit template set
pub fn reconcile_with(
    templates: &[HabitTemplate],
    rows: &[HabitRow],
    logs: &[HabitLogRow],
) -> Vec<Habit> {
    let days = completed_days_by_habit(logs);

    let server: Vec<(&HabitRow, Habit)> = rows
        .iter()
        .map(|row| {
            let habit = Habit {
                id: HabitId::new(row.id.clone()),
                name: row.name.clone(),
                completed_days: days
                    .get(row.id.as_str())
                    .copied()
                    .unwrap_or([false; DAYS_IN_GRID]),
            };
            (row, habit)
        })
        .collect();

    let mut merged: Vec<Habit> = templates
        .iter()
        .map(|template| {
            server
                .iter()
                .find(|(row, _)| row.template.as_deref() == Some(template.key))
                .or_else(|| server.iter().find(|(row, _)| row.name == template.name))
                .map(|(_, habit)| habit.clone())
                .unwrap_or_else(|| Habit::from_template(template))
        })
        .collect();

    let customs = server
        .iter()
        .filter(|(row, _)| !templates.iter().any(|t| matches_template(row, t)))
        .map(|(_, habit)| habit.clone());
    merged.extend(customs);

    merged
}

fn matches_template(row: &HabitRow, template: &HabitTemplate) -> bool {
    row.template.as_deref() == Some(template.key) || row.name == template.name
}

/// Fold logs into one completion grid per habit; out-of-range days are ignored
fn completed_days_by_habit(logs: &[HabitLogRow]) -> HashMap<&str, CompletedDays> {
    let mut days: HashMap<&str, CompletedDays> = HashMap::new();
    for log in logs {
        let Ok(index) = usize::try_from(log.day_index) else {
            continue;
        };
        if index >= DAYS_IN_GRID {
            continue;
        }
        days.entry(log.habit_id.as_str())
            .or_insert([false; DAYS_IN_GRID])[index] = true;
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, name: &str) -> HabitRow {
        HabitRow {
            id: id.to_string(),
            user_id: Some("user-1".to_string()),
            name: name.to_string(),
            template: None,
            created_at: None,
        }
    }

    fn log(habit_id: &str, day_index: i32) -> HabitLogRow {
        HabitLogRow {
            habit_id: habit_id.to_string(),
            day_index,
            completed_at: None,
        }
    }

    #[test]
    fn test_no_server_rows_yields_defaults() {
        let merged = reconcile(&[], &[]);
        assert_eq!(merged.len(), 5);
        assert!(merged.iter().all(|h| h.id.template_key().is_some()));
    }

    #[test]
    fn test_default_slot_and_custom() {
        let rows = vec![row("srv-1", "Meditate"), row("srv-2", "Custom X")];
        let logs = vec![log("srv-1", 0), log("srv-1", 14), log("srv-2", 30)];

        let merged = reconcile(&rows, &logs);

        assert_eq!(merged.len(), 6);
        let names: Vec<&str> = merged.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Read 10 pages",
                "30-min workout",
                "Meditate",
                "No social media after 10 PM",
                "Drink 8 glasses of water",
                "Custom X",
            ]
        );

        let meditate = &merged[2];
        assert_eq!(meditate.id.as_str(), "srv-1");
        assert!(meditate.completed_days[0]);
        assert!(meditate.completed_days[14]);
        assert_eq!(meditate.completed_count(), 2);

        for slot in [0, 1, 3, 4] {
            assert_eq!(merged[slot].completed_count(), 0);
            assert!(merged[slot].id.template_key().is_some());
        }

        assert_eq!(merged[5].id.as_str(), "srv-2");
        assert!(merged[5].completed_days[30]);
    }

    #[test]
    fn test_template_key_beats_name() {
        let mut renamed = row("srv-1", "Meditate 20 minutes");
        renamed.template = Some("meditate".into());
        let rows = vec![row("srv-0", "Meditate"), renamed];

        let merged = reconcile(&rows, &[]);

        // The renamed default keeps its slot; the name-only duplicate is dropped
        assert_eq!(merged.len(), 5);
        assert_eq!(merged[2].id.as_str(), "srv-1");
        assert_eq!(merged[2].name, "Meditate 20 minutes");
    }

    #[test]
    fn test_duplicate_names_first_match_wins() {
        let rows = vec![row("srv-a", "Meditate"), row("srv-b", "Meditate")];
        let merged = reconcile(&rows, &[]);

        assert_eq!(merged.len(), 5);
        assert_eq!(merged[2].id.as_str(), "srv-a");
    }

    #[test]
    fn test_renamed_default_without_template_becomes_custom() {
        let rows = vec![row("srv-1", "Meditate daily")];
        let merged = reconcile(&rows, &[]);

        assert_eq!(merged.len(), 6);
        assert!(merged[2].id.template_key().is_some());
        assert_eq!(merged[5].name, "Meditate daily");
    }

    #[test]
    fn test_out_of_range_logs_ignored() {
        let rows = vec![row("srv-2", "Custom X")];
        let logs = vec![log("srv-2", -1), log("srv-2", 31), log("srv-2", 5), log("other", 1)];

        let merged = reconcile(&rows, &logs);
        let custom = &merged[5];
        assert_eq!(custom.completed_count(), 1);
        assert!(custom.completed_days[5]);
    }

    #[test]
    fn test_custom_habits_keep_server_order() {
        let rows = vec![row("c", "Zeta"), row("a", "Alpha"), row("b", "Mid")];
        let merged = reconcile(&rows, &[]);
        let customs: Vec<&str> = merged[5..].iter().map(|h| h.id.as_str()).collect();
        assert_eq!(customs, vec!["c", "a", "b"]);
    }
}
