use chrono::NaiveDate;
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use occur_core::models::{Priority, TaskStatus, TaskTemplate, VirtualInstance};
use occur_core::recurrence::OccurrenceGenerator;

use crate::config::DisplayConfig;
use crate::util::short_id;

pub fn display_instances(instances: &[VirtualInstance], today: NaiveDate, display: &DisplayConfig) {
    if instances.is_empty() {
        println!("No occurrences found.");
        return;
    }
    println!("{}", instance_table(instances, today, display));
}

pub fn instance_table(instances: &[VirtualInstance], today: NaiveDate, display: &DisplayConfig) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Due", "Title", "Status", "Priority", "Assignees"]);

    for instance in instances {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&instance.parent_template_id)));
        row.add_cell(due_cell(instance, today, display));

        let mut title = instance.title.clone();
        // Edited occurrences are marked so they stand out from the series.
        if instance.is_modified {
            title.push_str(" *");
        }
        let title_cell = if instance.status.is_terminal() {
            Cell::new(title)
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey)
        } else {
            priority_style(Cell::new(title), instance.priority)
        };
        row.add_cell(title_cell);
        row.add_cell(status_cell(instance.status));
        row.add_cell(Cell::new(instance.priority.to_string()));
        row.add_cell(Cell::new(if instance.assignee_ids.is_empty() {
            "None".to_string()
        } else {
            instance.assignee_ids.iter().cloned().collect::<Vec<_>>().join(", ")
        }));
        table.add_row(row);
    }

    table
}

pub fn display_templates(templates: &[TaskTemplate], today: NaiveDate, display: &DisplayConfig) {
    if templates.is_empty() {
        println!("No templates found.");
        return;
    }
    println!("{}", template_table(templates, today, display));
}

pub fn template_table(templates: &[TaskTemplate], today: NaiveDate, display: &DisplayConfig) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Priority", "Starts", "Repeats", "Next"]);

    for template in templates {
        let mut row = Row::new();
        row.add_cell(Cell::new(template.id.to_string()));
        row.add_cell(Cell::new(&template.title));
        row.add_cell(status_cell(template.status));
        row.add_cell(Cell::new(template.priority.to_string()));
        row.add_cell(Cell::new(
            template
                .anchor_date
                .map(|d| d.format(&display.date_format).to_string())
                .unwrap_or_else(|| "None".to_string()),
        ));
        row.add_cell(Cell::new(
            template
                .recurrence
                .map(|r| r.describe())
                .unwrap_or_else(|| "Does not repeat".to_string()),
        ));
        row.add_cell(Cell::new(
            next_due(template, today)
                .map(|d| d.format(&display.date_format).to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
        table.add_row(row);
    }

    table
}

/// First occurrence on or after `today`.
fn next_due(template: &TaskTemplate, today: NaiveDate) -> Option<NaiveDate> {
    OccurrenceGenerator::for_template(template)?.next_after(today.pred_opt()?)
}

fn due_cell(instance: &VirtualInstance, today: NaiveDate, display: &DisplayConfig) -> Cell {
    let mut text = instance.due_date.format(&display.date_format).to_string();
    if display.relative_dates {
        let offset = instance.due_date - today;
        let relative = if offset.num_days() == 0 {
            "today".to_string()
        } else {
            offset.humanize()
        };
        text = format!("{} ({})", text, relative);
    }

    let open = !instance.status.is_terminal();
    if open && instance.due_date < today {
        Cell::new(text).fg(Color::Red) // Overdue
    } else if open && instance.due_date == today {
        Cell::new(text).fg(Color::Yellow)
    } else {
        Cell::new(text)
    }
}

fn status_cell(status: TaskStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        TaskStatus::Todo => cell,
        TaskStatus::InProgress => cell.fg(Color::Cyan),
        TaskStatus::Completed => cell.fg(Color::Green),
        TaskStatus::Cancelled => cell.fg(Color::DarkGrey),
    }
}

fn priority_style(cell: Cell, priority: Priority) -> Cell {
    match priority.value() {
        8..=10 => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        6..=7 => cell.fg(Color::Yellow),
        _ => cell,
    }
}
