use std::collections::BTreeSet;

use serde::Serialize;
use time::OffsetDateTime;

use crate::custom_field::CustomField;
use crate::date;
use crate::id::{IdError, TaskId};
use crate::wire::{IdRepr, RawStatus, RawTag, RawTask, RawUser};

/// Label used to group tasks that carry no status.
pub const NO_STATUS: &str = "no status";

/// Status of a task as reported by the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    /// Status label; empty when the task has none.
    pub label: String,
    /// Hex colour, when provided.
    pub color: Option<String>,
}

impl TaskStatus {
    /// Returns true when no status label is set.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.label.is_empty()
    }
}

impl From<RawStatus> for TaskStatus {
    fn from(raw: RawStatus) -> Self {
        Self {
            label: raw.status.unwrap_or_default(),
            color: raw.color.filter(|c| !c.is_empty()),
        }
    }
}

/// Assigned user.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct User {
    /// User id.
    pub id: String,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Initials for avatar rendering.
    pub initials: Option<String>,
}

impl User {
    fn from_wire(raw: RawUser) -> Option<Self> {
        let id = raw.id.map(IdRepr::into_string)?;
        Some(Self {
            username: raw.username.unwrap_or_default(),
            id,
            email: raw.email,
            initials: raw.initials,
        })
    }

    /// Best available display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.username.is_empty() {
            return &self.username;
        }
        self.email.as_deref().unwrap_or(&self.id)
    }
}

/// Tag attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Tag {
    /// Tag name.
    pub name: String,
    /// Foreground colour.
    pub fg: Option<String>,
    /// Background colour.
    pub bg: Option<String>,
}

impl Tag {
    fn from_wire(raw: RawTag) -> Option<Self> {
        let name = raw.name.filter(|n| !n.is_empty())?;
        Some(Self {
            name,
            fg: raw.tag_fg,
            bg: raw.tag_bg,
        })
    }
}

/// Full detail record of a single task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// Task name.
    pub name: String,
    /// Current status.
    pub status: TaskStatus,
    /// Start date.
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    /// Due date.
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    /// Description text.
    pub description: String,
    /// Assigned users.
    pub assignees: BTreeSet<User>,
    /// Tags.
    pub tags: BTreeSet<Tag>,
    /// Custom fields in remote order.
    pub custom_fields: Vec<CustomField>,
}

impl Task {
    /// Normalize a wire task.
    ///
    /// Missing status, assignees, tags, custom fields and description fall back
    /// to empty defaults.
    ///
    /// # Errors
    /// Returns an error only when the task id is blank.
    pub fn from_wire(raw: RawTask) -> Result<Self, IdError> {
        Ok(Self {
            id: TaskId::new(raw.id.into_string())?,
            name: raw.name.unwrap_or_default(),
            status: raw.status.map(TaskStatus::from).unwrap_or_default(),
            start_date: date::from_optional_millis(raw.start_date.as_ref()),
            due_date: date::from_optional_millis(raw.due_date.as_ref()),
            description: raw.description.unwrap_or_default(),
            assignees: raw
                .assignees
                .unwrap_or_default()
                .into_iter()
                .filter_map(User::from_wire)
                .collect(),
            tags: raw
                .tags
                .unwrap_or_default()
                .into_iter()
                .filter_map(Tag::from_wire)
                .collect(),
            custom_fields: raw
                .custom_fields
                .unwrap_or_default()
                .into_iter()
                .filter_map(CustomField::from_wire)
                .collect(),
        })
    }

    /// Custom fields that carry a value.
    pub fn filled_fields(&self) -> impl Iterator<Item = &CustomField> {
        self.custom_fields.iter().filter(|f| !f.value.is_empty())
    }

    /// Custom fields without a value.
    pub fn empty_fields(&self) -> impl Iterator<Item = &CustomField> {
        self.custom_fields.iter().filter(|f| f.value.is_empty())
    }
}

/// Row of a list's task listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    /// Task id.
    pub id: TaskId,
    /// Task name.
    pub name: String,
    /// Current status.
    pub status: TaskStatus,
    /// First assignee, if any.
    pub assignee: Option<String>,
    /// Start date.
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    /// Due date.
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
}

impl TaskSummary {
    /// Normalize a wire task into a listing row.
    ///
    /// # Errors
    /// Returns an error only when the task id is blank.
    pub fn from_wire(raw: RawTask) -> Result<Self, IdError> {
        let assignee = raw
            .assignees
            .unwrap_or_default()
            .into_iter()
            .find_map(User::from_wire)
            .map(|user| user.display_name().to_owned());
        Ok(Self {
            id: TaskId::new(raw.id.into_string())?,
            name: raw.name.unwrap_or_default(),
            status: raw.status.map(TaskStatus::from).unwrap_or_default(),
            assignee,
            start_date: date::from_optional_millis(raw.start_date.as_ref()),
            due_date: date::from_optional_millis(raw.due_date.as_ref()),
        })
    }
}

/// Group listing rows by status label, keeping first-seen group order.
#[must_use]
pub fn group_by_status(tasks: &[TaskSummary]) -> Vec<(String, Vec<&TaskSummary>)> {
    let mut groups: Vec<(String, Vec<&TaskSummary>)> = Vec::new();
    for task in tasks {
        let label = if task.status.is_unset() {
            NO_STATUS
        } else {
            task.status.label.as_str()
        };
        match groups.iter_mut().find(|(name, _)| name == label) {
            Some((_, members)) => members.push(task),
            None => groups.push((label.to_owned(), vec![task])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawTask {
        serde_json::from_str(json).unwrap_or_else(|err| panic!("must decode task: {err}"))
    }

    #[test]
    fn bare_task_gets_empty_defaults() {
        let task = Task::from_wire(raw(r#"{"id":"t1","assignees":null,"tags":null}"#))
            .unwrap_or_else(|err| panic!("must normalize: {err}"));
        assert!(task.status.is_unset());
        assert!(task.assignees.is_empty());
        assert!(task.tags.is_empty());
        assert!(task.custom_fields.is_empty());
        assert_eq!(task.description, "");
        assert!(task.start_date.is_none());
    }

    #[test]
    fn full_task_normalizes_every_field() {
        let task = Task::from_wire(raw(
            r##"{
                "id": "t2",
                "name": "Ship it",
                "status": {"status": "in progress", "color": "#4194f6"},
                "start_date": "1700000000000",
                "due_date": 1700086400000,
                "description": "body",
                "assignees": [{"id": 7, "username": "ana"}, {"username": "no id"}],
                "tags": [{"name": "infra", "tag_fg": "#fff"}, {"name": ""}],
                "custom_fields": [
                    {"id": "c1", "name": "Points", "type": "number", "value": "3"},
                    {"id": "c2", "name": "Notes", "type": "text"}
                ]
            }"##,
        ))
        .unwrap_or_else(|err| panic!("must normalize: {err}"));

        assert_eq!(task.status.label, "in progress");
        assert_eq!(task.status.color.as_deref(), Some("#4194f6"));
        assert_eq!(task.start_date.map(|d| d.unix_timestamp()), Some(1_700_000_000));
        assert_eq!(task.due_date.map(|d| d.unix_timestamp()), Some(1_700_086_400));
        assert_eq!(task.assignees.len(), 1);
        assert_eq!(task.tags.len(), 1);
        assert_eq!(task.filled_fields().count(), 1);
        assert_eq!(task.empty_fields().count(), 1);
    }

    #[test]
    fn grouping_keeps_first_seen_order() {
        let tasks: Vec<TaskSummary> = [
            r#"{"id":"a","status":{"status":"open"}}"#,
            r#"{"id":"b"}"#,
            r#"{"id":"c","status":{"status":"open"}}"#,
            r#"{"id":"d","status":{"status":"done"}}"#,
        ]
        .iter()
        .map(|json| TaskSummary::from_wire(raw(json)).unwrap_or_else(|err| panic!("{err}")))
        .collect();

        let groups = group_by_status(&tasks);
        let names: Vec<&str> = groups.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["open", NO_STATUS, "done"]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn summary_takes_first_assignee() {
        let summary = TaskSummary::from_wire(raw(
            r#"{"id":"x","assignees":[{"id":1,"email":"a@example.invalid"},{"id":2,"username":"bo"}]}"#,
        ))
        .unwrap_or_else(|err| panic!("{err}"));
        assert_eq!(summary.assignee.as_deref(), Some("a@example.invalid"));
    }
}
