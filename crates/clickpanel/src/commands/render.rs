use std::fmt::Write as _;

use clickpanel_app::AuthSession;
use clickpanel_core::date::calendar_date;
use clickpanel_core::{HierarchyNode, StatusOption, Task, TaskSummary, group_by_status};
use time::format_description::well_known::Rfc3339;

pub fn session(session: &AuthSession) -> String {
    let since = session
        .established_at()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_owned());
    format!(
        "signed in to workspace {} since {since}",
        session.workspace_id()
    )
}

pub fn node_line(node: &HierarchyNode, depth: usize) -> String {
    format!("{}{} [{}]", "  ".repeat(depth), node.name(), node.key())
}

pub fn nodes(nodes: &[HierarchyNode]) -> String {
    if nodes.is_empty() {
        return "(none)\n".to_owned();
    }
    nodes.iter().fold(String::new(), |mut out, node| {
        let _ = writeln!(out, "{}", node_line(node, 0));
        out
    })
}

pub fn statuses(options: &[StatusOption]) -> String {
    if options.is_empty() {
        return "(no statuses)\n".to_owned();
    }
    options.iter().fold(String::new(), |mut out, option| {
        let color = if option.color.is_empty() { "-" } else { &option.color };
        let _ = writeln!(out, "{:<20} {color}", option.label);
        out
    })
}

pub fn task_groups(tasks: &[TaskSummary]) -> String {
    if tasks.is_empty() {
        return "(no tasks)\n".to_owned();
    }
    let mut out = String::new();
    for (label, members) in group_by_status(tasks) {
        let _ = writeln!(out, "{label} ({})", members.len());
        for task in members {
            let due = task.due_date.map(calendar_date).unwrap_or_default();
            let assignee = task.assignee.as_deref().unwrap_or("");
            let _ = writeln!(out, "  {:<12} {:<40} {assignee:<16} {due}", task.id, task.name);
        }
    }
    out
}

pub fn task(task: &Task, status_color: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} [{}]", task.name, task.id);
    let status = if task.status.is_unset() {
        "-"
    } else {
        task.status.label.as_str()
    };
    match status_color {
        Some(color) => {
            let _ = writeln!(out, "status:     {status} ({color})");
        }
        None => {
            let _ = writeln!(out, "status:     {status}");
        }
    }
    for (label, date) in [("start:", task.start_date), ("due:", task.due_date)] {
        if let Some(date) = date {
            let _ = writeln!(out, "{label:<11} {}", calendar_date(date));
        }
    }
    if !task.assignees.is_empty() {
        let names: Vec<&str> = task.assignees.iter().map(|u| u.display_name()).collect();
        let _ = writeln!(out, "assignees:  {}", names.join(", "));
    }
    if !task.tags.is_empty() {
        let names: Vec<&str> = task.tags.iter().map(|t| t.name.as_str()).collect();
        let _ = writeln!(out, "tags:       {}", names.join(", "));
    }
    if !task.description.trim().is_empty() {
        let _ = writeln!(out, "\n{}\n", task.description.trim());
    }
    let filled: Vec<_> = task.filled_fields().collect();
    if !filled.is_empty() {
        let _ = writeln!(out, "fields:");
        for field in filled {
            let _ = writeln!(out, "  {}: {}", field.name, field.value);
        }
    }
    let empty = task.empty_fields().count();
    if empty > 0 {
        let _ = writeln!(out, "({empty} empty fields)");
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]
    use super::*;
    use clickpanel_core::wire::RawTask;
    use clickpanel_core::{NodeKey, NodeKind};

    fn sample_task() -> Task {
        let raw: RawTask = serde_json::from_value(serde_json::json!({
            "id": "t1",
            "name": "Write docs",
            "status": { "status": "open", "color": "#fff" },
            "due_date": "1700000000000",
            "assignees": [{ "id": 1, "username": "ana" }],
            "custom_fields": [
                { "id": "c1", "name": "Points", "type": "number", "value": 3 },
                { "id": "c2", "name": "Notes", "type": "text" }
            ]
        }))
        .unwrap();
        Task::from_wire(raw).unwrap()
    }

    #[test]
    fn task_detail_lists_filled_fields_and_counts_empty() {
        let text = task(&sample_task(), Some("#fff"));
        assert!(text.starts_with("Write docs [t1]"));
        assert!(text.contains("status:     open (#fff)"));
        assert!(text.contains("due:        2023-11-14"));
        assert!(text.contains("assignees:  ana"));
        assert!(text.contains("  Points: 3"));
        assert!(text.contains("(1 empty fields)"));
    }

    #[test]
    fn node_lines_are_indented_by_depth() {
        let node = HierarchyNode::new(
            NodeKey::new(NodeKind::Folder, "f1").unwrap(),
            None,
            "Roadmap".into(),
            None,
        );
        assert_eq!(node_line(&node, 2), "    Roadmap [folder:f1]");
        assert_eq!(nodes(&[]), "(none)\n");
    }

    #[test]
    fn statuses_show_placeholder_colour() {
        let text = statuses(&[StatusOption::new("OPEN", ""), StatusOption::new("DONE", "#000")]);
        assert!(text.lines().next().unwrap().ends_with(" -"));
        assert!(text.contains("#000"));
    }
}
