//! Client-side view filter over a user's task list.
//!
//! The four tabs partition tasks by completion and due date:
//!
//! | tab        | shows                                                    |
//! |------------|----------------------------------------------------------|
//! | `today`    | incomplete, due on the current calendar day              |
//! | `upcoming` | incomplete, due strictly after the current moment        |
//! | `all`      | every incomplete task, due date or not                   |
//! | `done`     | every completed task                                     |
//!
//! Calendar days are compared in the UTC offset of `now`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::model::Task;

/// Rows shown per "show more" step.
pub const PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Today,
    Upcoming,
    #[default]
    All,
    Done,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Today, Tab::Upcoming, Tab::All, Tab::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Today => "today",
            Tab::Upcoming => "upcoming",
            Tab::All => "all",
            Tab::Done => "done",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown tab: {0}")]
pub struct UnknownTab(pub String);

impl FromStr for Tab {
    type Err = UnknownTab;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.as_str() == s)
            .ok_or_else(|| UnknownTab(s.to_string()))
    }
}

pub fn is_due_today(task: &Task, now: &DateTime<FixedOffset>) -> bool {
    task.due_date
        .is_some_and(|due| due.with_timezone(now.offset()).date_naive() == now.date_naive())
}

pub fn matches(task: &Task, now: &DateTime<FixedOffset>, tab: Tab) -> bool {
    match tab {
        Tab::Today => !task.completed && is_due_today(task, now),
        Tab::Upcoming => !task.completed && task.due_date.is_some_and(|due| due > *now),
        Tab::All => !task.completed,
        Tab::Done => task.completed,
    }
}

/// Tasks visible under `tab`, in list order.
pub fn classify(tasks: &[Task], now: &DateTime<FixedOffset>, tab: Tab) -> Vec<Task> {
    tasks.iter().filter(|t| matches(t, now, tab)).cloned().collect()
}

/// Like [`classify`], but with no tab selected every task is visible.
pub fn visible(tasks: &[Task], now: &DateTime<FixedOffset>, tab: Option<Tab>) -> Vec<Task> {
    match tab {
        Some(tab) => classify(tasks, now, tab),
        None => tasks.to_vec(),
    }
}

/// Badge counts shown next to the tab labels.
///
/// `upcoming` counts every incomplete dated task not due today, overdue ones
/// included, so it can exceed the length of the `upcoming` tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TabCounts {
    pub today: usize,
    pub upcoming: usize,
}

impl TabCounts {
    pub fn tally(tasks: &[Task], now: &DateTime<FixedOffset>) -> Self {
        tasks
            .iter()
            .filter(|t| !t.completed && t.due_date.is_some())
            .fold(Self::default(), |mut counts, task| {
                if is_due_today(task, now) {
                    counts.today += 1;
                } else {
                    counts.upcoming += 1;
                }
                counts
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub tasks: Vec<Task>,
    pub has_more: bool,
    pub total: usize,
}

/// Active tab plus how many of its rows are on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    tab: Tab,
    cap: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            tab: Tab::default(),
            cap: PAGE_SIZE,
        }
    }
}

impl ViewState {
    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Switches tab. The cap starts over whenever the tab actually changes.
    pub fn select(&mut self, tab: Tab) {
        if tab != self.tab {
            self.tab = tab;
            self.cap = PAGE_SIZE;
        }
    }

    pub fn show_more(&mut self) {
        self.cap += PAGE_SIZE;
    }

    pub fn page(&self, mut filtered: Vec<Task>) -> Page {
        let total = filtered.len();
        filtered.truncate(self.cap);
        Page {
            tasks: filtered,
            has_more: total > self.cap,
            total,
        }
    }
}
