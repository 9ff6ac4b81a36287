use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tasks::filter::{Page, Tab, TabCounts};
use crate::tasks::model::{due_at_start_of_day, present, Task, TaskPatch};

#[derive(Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub due_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_complete: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl UpdateTask {
    /// Dates are taken as local midnight in `offset`.
    pub fn into_patch(self, offset: &FixedOffset) -> TaskPatch {
        TaskPatch {
            title: self.title,
            description: self.description,
            completed: self.is_complete,
            due_date: self
                .due_date
                .map(|due| due.map(|date| due_at_start_of_day(date, offset))),
        }
    }
}

#[derive(Deserialize)]
pub struct ViewQuery {
    pub tab: Option<String>,
}

#[derive(Deserialize)]
pub struct SelectTab {
    pub tab: Tab,
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    /// `None` when an unrecognized tab was asked for and nothing is filtered.
    pub tab: Option<Tab>,
    pub tasks: Vec<Task>,
    pub has_more: bool,
    pub total: usize,
    pub counts: TabCounts,
    pub completing: Vec<Uuid>,
    pub loading: bool,
}

impl TaskView {
    pub fn new(tab: Option<Tab>, page: Page, counts: TabCounts, completing: Vec<Uuid>, loading: bool) -> Self {
        Self {
            tab,
            tasks: page.tasks,
            has_more: page.has_more,
            total: page.total,
            counts,
            completing,
            loading,
        }
    }
}

#[derive(Serialize)]
pub struct ToggleAccepted {
    pub id: Uuid,
    pub is_complete: bool,
}
