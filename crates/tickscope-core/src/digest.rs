use std::cmp::Ordering;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::CanonicalTask;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestCounts {
    pub total_todo: usize,
    pub inbox_todo: usize,
    pub today_todo: usize,
    pub next_days_todo: usize,
    pub next_days_thoughts: usize,
}

/// Open work around one anchor date, split into report sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    pub today: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
    pub counts: DigestCounts,
    pub inbox_todo: Vec<CanonicalTask>,
    pub today_todo: Vec<CanonicalTask>,
    pub next_days_todo: Vec<CanonicalTask>,
    pub next_days_thoughts: Vec<CanonicalTask>,
}

impl Digest {
    /// Sections in report order, with their headings.
    pub fn sections(&self) -> [(String, &[CanonicalTask]); 4] {
        [
            ("Inbox Todo".to_string(), self.inbox_todo.as_slice()),
            ("Today Todo".to_string(), self.today_todo.as_slice()),
            (format!("Next {} Days Todo", self.days), self.next_days_todo.as_slice()),
            (
                format!("Next {} Days Thoughts", self.days),
                self.next_days_thoughts.as_slice(),
            ),
        ]
    }
}

/// Dated tasks first by due date, then higher priority first.
pub fn compare_due_then_priority(a: &CanonicalTask, b: &CanonicalTask) -> Ordering {
    let by_due = match (a.due_local_date, b.due_local_date) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_due.then_with(|| b.priority.cmp(&a.priority))
}

fn select(todo: &[&CanonicalTask], keep: impl Fn(&CanonicalTask) -> bool) -> Vec<CanonicalTask> {
    todo.iter().copied().filter(|&t| keep(t)).cloned().collect()
}

fn mentions_any(task: &CanonicalTask, keywords: &[String]) -> bool {
    let text = format!("{} {}", task.title, task.description).to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.is_empty())
        .any(|k| text.contains(&k.to_lowercase()))
}

/// Build the digest for `today` and the `days` that follow it.
///
/// The upcoming window is `today < due <= today + days`; thoughts are the
/// upcoming tasks whose title or description mention a reflection keyword.
pub fn build_digest(
    tasks: &[CanonicalTask],
    today: NaiveDate,
    days: u32,
    thought_keywords: &[String],
) -> Digest {
    let end = today
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX);

    let mut todo: Vec<&CanonicalTask> = tasks.iter().filter(|t| t.status.is_open()).collect();
    todo.sort_by(|a, b| compare_due_then_priority(a, b));

    let inbox_todo = select(&todo, |t| t.is_inbox);
    let today_todo = select(&todo, |t| t.due_local_date == Some(today));
    let next_days_todo = select(&todo, |t| {
        t.due_local_date.is_some_and(|due| due > today && due <= end)
    });
    let next_days_thoughts: Vec<CanonicalTask> = next_days_todo
        .iter()
        .filter(|t| mentions_any(t, thought_keywords))
        .cloned()
        .collect();

    Digest {
        today,
        end,
        days,
        counts: DigestCounts {
            total_todo: todo.len(),
            inbox_todo: inbox_todo.len(),
            today_todo: today_todo.len(),
            next_days_todo: next_days_todo.len(),
            next_days_thoughts: next_days_thoughts.len(),
        },
        inbox_todo,
        today_todo,
        next_days_todo,
        next_days_thoughts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DigestConfig;
    use crate::model::TaskStatus;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn due_task(id: &str, title: &str, due: Option<NaiveDate>, priority: i64) -> CanonicalTask {
        let mut task = CanonicalTask::new(id, title, "p");
        task.due_local_date = due;
        task.priority = priority;
        task
    }

    fn ids(tasks: &[CanonicalTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    fn keywords() -> Vec<String> {
        DigestConfig::default().thought_keywords
    }

    #[test]
    fn test_ordering_dated_first_then_priority() {
        let mut tasks = vec![
            due_task("undated-high", "a", None, 5),
            due_task("late", "b", Some(day(9)), 0),
            due_task("early-low", "c", Some(day(2)), 1),
            due_task("early-high", "d", Some(day(2)), 3),
            due_task("undated-low", "e", None, 0),
        ];
        tasks.sort_by(compare_due_then_priority);
        assert_eq!(
            ids(&tasks),
            vec!["early-high", "early-low", "late", "undated-high", "undated-low"]
        );
    }

    #[test]
    fn test_sections() {
        let mut inbox = due_task("inbox", "inbox item", None, 0);
        inbox.is_inbox = true;
        let mut closed = due_task("closed", "done already", Some(day(1)), 0);
        closed.status = TaskStatus::Other;

        let tasks = vec![
            inbox,
            closed,
            due_task("today", "today item", Some(day(1)), 0),
            due_task("edge", "last day", Some(day(8)), 0),
            due_task("beyond", "too far", Some(day(9)), 0),
            due_task("past", "overdue", Some(day(1).pred_opt().unwrap()), 0),
            due_task("thought", "周复盘", Some(day(3)), 0),
        ];

        let digest = build_digest(&tasks, day(1), 7, &keywords());
        assert_eq!(digest.end, day(8));
        assert_eq!(ids(&digest.inbox_todo), vec!["inbox"]);
        assert_eq!(ids(&digest.today_todo), vec!["today"]);
        assert_eq!(ids(&digest.next_days_todo), vec!["thought", "edge"]);
        assert_eq!(ids(&digest.next_days_thoughts), vec!["thought"]);
        assert_eq!(digest.counts.total_todo, 6);
        assert_eq!(digest.counts.next_days_thoughts, 1);
    }

    #[test]
    fn test_thoughts_match_description_case_insensitively() {
        let mut task = due_task("t", "weekly", Some(day(2)), 0);
        task.description = "Write the RETRO notes".to_string();
        let digest = build_digest(&[task], day(1), 3, &["retro".to_string()]);
        assert_eq!(digest.counts.next_days_thoughts, 1);
    }

    #[test]
    fn test_section_titles_follow_days() {
        let digest = build_digest(&[], day(1), 3, &keywords());
        let titles: Vec<String> = digest.sections().into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            titles,
            vec!["Inbox Todo", "Today Todo", "Next 3 Days Todo", "Next 3 Days Thoughts"]
        );
        assert_eq!(digest.counts, DigestCounts::default());
    }
}
