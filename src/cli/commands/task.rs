//! Task CLI commands.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{parse_date_arg, parse_repeat_arg, parse_status_arg, parse_time_arg};
use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::dates::{format_date, format_time};
use crate::domain::models::{RepeatFrequency, ScheduledTask, TaskDraft, TaskEdit, TaskStatus};
use crate::domain::ports::TaskStore;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Schedule a new task
    Add {
        /// Task title
        title: String,

        /// Scheduled date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,

        /// Time of day (HH:MM)
        #[arg(long, value_parser = parse_time_arg)]
        time: Option<NaiveTime>,

        /// Due date (YYYY-MM-DD), also the end of repetition
        #[arg(long, value_parser = parse_date_arg)]
        due: Option<NaiveDate>,

        /// Repetition: none, weekly, monthly
        #[arg(long, value_parser = parse_repeat_arg, default_value = "none")]
        repeat: RepeatFrequency,

        /// Longer description
        #[arg(long)]
        description: Option<String>,

        /// Schedule a reminder
        #[arg(long)]
        notify: bool,
    },

    /// List tasks
    List {
        /// Filter by status (upcoming, completed, missed)
        #[arg(long, value_parser = parse_status_arg)]
        status: Option<TaskStatus>,

        /// Only tasks scheduled on or after this date
        #[arg(long, value_parser = parse_date_arg)]
        from: Option<NaiveDate>,
    },

    /// Show task details
    Show {
        /// Task ID or unique prefix
        id: String,
    },

    /// Edit a task
    Edit {
        /// Task ID or unique prefix
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,

        #[arg(long, value_parser = parse_time_arg, conflicts_with = "clear_time")]
        time: Option<NaiveTime>,

        #[arg(long)]
        clear_time: bool,

        #[arg(long, value_parser = parse_date_arg, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        #[arg(long)]
        clear_due: bool,

        #[arg(long, value_parser = parse_repeat_arg)]
        repeat: Option<RepeatFrequency>,

        /// Enable or disable the reminder
        #[arg(long)]
        notify: Option<bool>,
    },

    /// Mark an upcoming task completed
    Complete {
        /// Task ID or unique prefix
        id: String,
    },

    /// Put a completed or missed task back to upcoming
    Reset {
        /// Task ID or unique prefix
        id: String,
    },

    /// Move a missed or completed task to a new date
    Reschedule {
        /// Task ID or unique prefix
        id: String,

        /// New date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,

        #[arg(long, value_parser = parse_time_arg)]
        time: Option<NaiveTime>,

        #[arg(long, value_parser = parse_date_arg)]
        due: Option<NaiveDate>,
    },

    /// Delete a task
    Delete {
        /// Task ID or unique prefix
        id: String,
    },
}

#[derive(Debug, Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub scheduled_date: String,
    pub scheduled_time: Option<String>,
    pub due_date: Option<String>,
    pub repeat_frequency: String,
    pub status: String,
    pub notification_enabled: bool,
    pub notification_handle: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&ScheduledTask> for TaskOutput {
    fn from(t: &ScheduledTask) -> Self {
        Self {
            id: t.id.to_string(),
            title: t.title.clone(),
            description: t.description.clone(),
            scheduled_date: format_date(t.scheduled_date),
            scheduled_time: t.scheduled_time.map(format_time),
            due_date: t.due_date.map(format_date),
            repeat_frequency: t.repeat_frequency.as_str().to_string(),
            status: t.status.as_str().to_string(),
            notification_enabled: t.notification_enabled,
            notification_handle: t.notification_handle.as_ref().map(ToString::to_string),
            created_at: t.created_at.to_rfc3339(),
            updated_at: t.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskOutput>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "date", "time", "title", "repeat", "due", "status"]);
        for t in &self.tasks {
            table.add_row(vec![
                t.id[..8].to_string(),
                t.scheduled_date.clone(),
                t.scheduled_time.clone().unwrap_or_else(|| "-".to_string()),
                truncate(&t.title, 32),
                t.repeat_frequency.clone(),
                t.due_date.clone().unwrap_or_else(|| "-".to_string()),
                t.status.clone(),
            ]);
        }
        render_list("task", &table, self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct TaskDetailOutput {
    #[serde(flatten)]
    pub task: TaskOutput,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let t = &self.task;
        let mut lines = vec![
            format!("Task: {}", t.title),
            format!("ID: {}", t.id),
            format!("Status: {}", t.status),
        ];
        let when = match t.scheduled_time {
            Some(ref time) => format!("{} {time}", t.scheduled_date),
            None => t.scheduled_date.clone(),
        };
        lines.push(format!("Scheduled: {when}"));
        if let Some(ref due) = t.due_date {
            lines.push(format!("Due: {due}"));
        }
        lines.push(format!("Repeats: {}", t.repeat_frequency));
        lines.push(format!(
            "Reminder: {}",
            if t.notification_enabled { "on" } else { "off" }
        ));
        if let Some(ref description) = t.description {
            lines.push(String::new());
            lines.push(description.clone());
        }
        lines.push(String::new());
        lines.push(format!("Created: {}", t.created_at));
        lines.push(format!("Updated: {}", t.updated_at));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct TaskActionOutput {
    pub success: bool,
    pub message: String,
    pub task: Option<TaskOutput>,
}

impl TaskActionOutput {
    fn with_task(message: impl Into<String>, task: &ScheduledTask) -> Self {
        Self {
            success: true,
            message: message.into(),
            task: Some(TaskOutput::from(task)),
        }
    }
}

impl CommandOutput for TaskActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: TaskArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let lifecycle = ctx.lifecycle();

    match args.command {
        TaskCommands::Add { title, date, time, due, repeat, description, notify } => {
            let mut draft = TaskDraft::new(ctx.config.user_id.clone(), title, date)
                .with_repeat(repeat)
                .with_notification(notify);
            draft.scheduled_time = time;
            draft.due_date = due;
            draft.description = description;

            let task = lifecycle.create(draft).await?;
            let out = TaskActionOutput::with_task(
                format!("Scheduled '{}' on {} ({})", task.title, format_date(task.scheduled_date), &task.id.to_string()[..8]),
                &task,
            );
            output(&out, json_mode);
        }

        TaskCommands::List { status, from } => {
            ctx.sweep_on_load().await;

            let mut filter = ctx.user_filter();
            filter.status = status;
            filter.scheduled_from = from;
            let tasks = ctx.store.query(&filter).await.context("Failed to list tasks")?;

            let out = TaskListOutput {
                total: tasks.len(),
                tasks: tasks.iter().map(TaskOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        TaskCommands::Show { id } => {
            ctx.sweep_on_load().await;
            let id = ctx.resolve(&id).await?;
            let task = ctx
                .store
                .get(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Task {id} not found. Use 'almanac task list' to see tasks."))?;

            output(&TaskDetailOutput { task: TaskOutput::from(&task) }, json_mode);
        }

        TaskCommands::Edit {
            id,
            title,
            description,
            clear_description,
            date,
            time,
            clear_time,
            due,
            clear_due,
            repeat,
            notify,
        } => {
            let id = ctx.resolve(&id).await?;
            let edit = TaskEdit {
                title,
                description: clear_or_set(clear_description, description),
                scheduled_date: date,
                scheduled_time: clear_or_set(clear_time, time),
                due_date: clear_or_set(clear_due, due),
                repeat_frequency: repeat,
                notification_enabled: notify,
            };
            if edit.is_empty() {
                anyhow::bail!("Nothing to change. Pass at least one field to edit.");
            }

            let task = lifecycle.update(id, edit).await?;
            output(&TaskActionOutput::with_task(format!("Updated '{}'", task.title), &task), json_mode);
        }

        TaskCommands::Complete { id } => {
            let id = ctx.resolve(&id).await?;
            let task = lifecycle.complete(id).await?;
            output(&TaskActionOutput::with_task(format!("Completed '{}'", task.title), &task), json_mode);
        }

        TaskCommands::Reset { id } => {
            ctx.sweep_on_load().await;
            let id = ctx.resolve(&id).await?;
            let task = lifecycle.reset(id).await?;
            output(&TaskActionOutput::with_task(format!("'{}' is upcoming again", task.title), &task), json_mode);
        }

        TaskCommands::Reschedule { id, date, time, due } => {
            ctx.sweep_on_load().await;
            let id = ctx.resolve(&id).await?;
            let task = lifecycle.reschedule(id, date, time, due).await?;
            let out = TaskActionOutput::with_task(
                format!("Rescheduled '{}' to {}", task.title, format_date(task.scheduled_date)),
                &task,
            );
            output(&out, json_mode);
        }

        TaskCommands::Delete { id } => {
            let id = ctx.resolve(&id).await?;
            lifecycle.delete(id).await?;
            let out = TaskActionOutput {
                success: true,
                message: format!("Deleted task {id}"),
                task: None,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

/// `--clear-x` wins over an absent value; a present value replaces.
fn clear_or_set<T>(clear: bool, value: Option<T>) -> Option<Option<T>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_or_set() {
        assert_eq!(clear_or_set::<u8>(true, None), Some(None));
        assert_eq!(clear_or_set(false, Some(3)), Some(Some(3)));
        assert_eq!(clear_or_set::<u8>(false, None), None);
    }
}
