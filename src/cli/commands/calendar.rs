//! Calendar CLI commands.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Args, Subcommand};
use comfy_table::{presets, Cell, CellAlignment, Table};
use serde::Serialize;

use crate::cli::commands::{parse_date_arg, parse_month_arg};
use crate::cli::context::AppContext;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::dates::{format_date, format_time, CalendarMonth};
use crate::domain::ports::TaskStore;
use crate::services::{CalendarIndex, MonthView, StatusBreakdown};

#[derive(Args, Debug)]
pub struct CalendarArgs {
    #[command(subcommand)]
    pub command: CalendarCommands,
}

#[derive(Subcommand, Debug)]
pub enum CalendarCommands {
    /// Show a month grid with per-day counts
    Month {
        /// Month to show (YYYY-MM), defaults to the current month
        #[arg(value_parser = parse_month_arg)]
        month: Option<CalendarMonth>,
    },

    /// List everything on a single day
    Day {
        /// Date to show (YYYY-MM-DD), defaults to today
        #[arg(value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
}

#[derive(Debug, Serialize)]
pub struct DayCountOutput {
    pub date: String,
    pub direct: usize,
    pub due: usize,
    pub upcoming: usize,
    pub completed: usize,
    pub missed: usize,
}

#[derive(Debug, Serialize)]
pub struct MonthOutput {
    pub month: String,
    pub total_direct: usize,
    pub total_due: usize,
    pub statuses: StatusBreakdown,
    pub days: Vec<DayCountOutput>,
    #[serde(skip)]
    first_weekday: u32,
    #[serde(skip)]
    today: Option<NaiveDate>,
}

impl MonthOutput {
    fn from_view(view: &MonthView, today: NaiveDate) -> Self {
        Self {
            month: view.month.to_string(),
            total_direct: view.total_direct,
            total_due: view.total_due,
            statuses: view.statuses,
            days: view
                .busy_days()
                .map(|d| DayCountOutput {
                    date: format_date(d.date),
                    direct: d.direct_count,
                    due: d.due_count,
                    upcoming: d.statuses.upcoming,
                    completed: d.statuses.completed,
                    missed: d.statuses.missed,
                })
                .collect(),
            first_weekday: view.month.first_day().weekday().num_days_from_monday(),
            today: view.month.contains(today).then_some(today),
        }
    }

    fn cell_for(&self, date: NaiveDate) -> String {
        let key = format_date(date);
        let mut label = format!("{:>2}", date.day());
        if self.today == Some(date) {
            label = format!("[{}]", date.day());
        }
        match self.days.iter().find(|d| d.date == key) {
            Some(day) if day.due > 0 => format!("{label} {}+{}d", day.direct, day.due),
            Some(day) => format!("{label} {}", day.direct),
            None => label,
        }
    }
}

impl CommandOutput for MonthOutput {
    fn to_human(&self) -> String {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED).set_header(
            ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
                .iter()
                .map(|h| Cell::new(h).set_alignment(CellAlignment::Center)),
        );

        let Ok(month) = self.month.parse::<CalendarMonth>() else {
            return format!("Invalid month {}", self.month);
        };

        let mut row: Vec<String> = vec![String::new(); self.first_weekday as usize];
        for date in month.days() {
            row.push(self.cell_for(date));
            if row.len() == 7 {
                table.add_row(std::mem::take(&mut row));
            }
        }
        if !row.is_empty() {
            row.resize(7, String::new());
            table.add_row(row);
        }

        format!(
            "{}\n{table}\n{} scheduled, {} due ({} upcoming, {} completed, {} missed)",
            self.month,
            self.total_direct,
            self.total_due,
            self.statuses.upcoming,
            self.statuses.completed,
            self.statuses.missed,
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct DayEntryOutput {
    pub task_id: String,
    pub title: String,
    pub time: Option<String>,
    pub status: String,
    pub repeat_frequency: String,
    /// Generated from a repeating task; cannot be edited on its own
    pub is_virtual: bool,
}

#[derive(Debug, Serialize)]
pub struct DayOutput {
    pub date: String,
    pub scheduled: Vec<DayEntryOutput>,
    pub due: Vec<DayEntryOutput>,
}

impl CommandOutput for DayOutput {
    fn to_human(&self) -> String {
        if self.scheduled.is_empty() && self.due.is_empty() {
            return format!("Nothing on {}.", self.date);
        }

        let mut lines = vec![self.date.clone()];
        if !self.scheduled.is_empty() {
            lines.push(String::from("Scheduled:"));
            for e in &self.scheduled {
                let marker = if e.is_virtual { " (repeat)" } else { "" };
                lines.push(format!(
                    "  {} {:<5} {:<32} {}{marker}",
                    &e.task_id[..8],
                    e.time.as_deref().unwrap_or("-"),
                    truncate(&e.title, 32),
                    e.status,
                ));
            }
        }
        if !self.due.is_empty() {
            lines.push(String::from("Due:"));
            for e in &self.due {
                lines.push(format!("  {} {:<32} {}", &e.task_id[..8], truncate(&e.title, 32), e.status));
            }
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

async fn load_index(ctx: &AppContext) -> Result<CalendarIndex> {
    ctx.sweep_on_load().await;
    let tasks = ctx
        .store
        .query(&ctx.user_filter())
        .await
        .context("Failed to load tasks")?;
    Ok(CalendarIndex::build(tasks.iter(), &ctx.generator))
}

pub async fn execute(args: CalendarArgs, ctx: &AppContext, json_mode: bool) -> Result<()> {
    let today = ctx.clock.today();
    let index = load_index(ctx).await?;

    match args.command {
        CalendarCommands::Month { month } => {
            let month = month.unwrap_or_else(|| CalendarMonth::of(today));
            let view = index.month_view(month);
            output(&MonthOutput::from_view(&view, today), json_mode);
        }

        CalendarCommands::Day { date } => {
            let date = date.unwrap_or(today);
            let scheduled = index
                .occurrences_on(date)
                .iter()
                .map(|o| {
                    let source = o.source();
                    DayEntryOutput {
                        task_id: source.id.to_string(),
                        title: source.title.clone(),
                        time: source.scheduled_time.map(format_time),
                        status: o.status().to_string(),
                        repeat_frequency: source.repeat_frequency.to_string(),
                        is_virtual: o.is_virtual(),
                    }
                })
                .collect();
            let due = index
                .due_on(date)
                .iter()
                .map(|t| DayEntryOutput {
                    task_id: t.id.to_string(),
                    title: t.title.clone(),
                    time: t.scheduled_time.map(format_time),
                    status: t.status.to_string(),
                    repeat_frequency: t.repeat_frequency.to_string(),
                    is_virtual: false,
                })
                .collect();

            output(
                &DayOutput {
                    date: format_date(date),
                    scheduled,
                    due,
                },
                json_mode,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{RepeatFrequency, TaskDraft};
    use crate::domain::ports::{Clock, FixedClock};
    use crate::services::RecurrenceGenerator;

    fn d(s: &str) -> NaiveDate {
        crate::domain::dates::parse_date(s).unwrap()
    }

    #[tokio::test]
    async fn test_month_grid_marks_counts() {
        let store = crate::adapters::InMemoryTaskStore::new();
        store
            .create(&TaskDraft::new("u", "Standup", d("2024-03-04")).with_repeat(RepeatFrequency::Weekly))
            .await
            .unwrap();
        let tasks = store.query(&Default::default()).await.unwrap();
        let index = CalendarIndex::build(tasks.iter(), &RecurrenceGenerator::default());
        let today = FixedClock::at_date(d("2024-03-11")).today();

        let out = MonthOutput::from_view(&index.month_view(CalendarMonth::of(today)), today);
        assert_eq!(out.total_direct, 4);
        // March 2024 starts on a Friday.
        assert_eq!(out.first_weekday, 4);
        assert_eq!(out.cell_for(d("2024-03-04")), " 4 1");
        assert_eq!(out.cell_for(d("2024-03-11")), "[11] 1");
        assert_eq!(out.cell_for(d("2024-03-05")), " 5");

        let human = out.to_human();
        assert!(human.starts_with("2024-03"));
        assert!(human.contains("4 scheduled, 0 due"));
    }

    #[test]
    fn test_empty_day_message() {
        let out = DayOutput {
            date: "2024-03-01".to_string(),
            scheduled: vec![],
            due: vec![],
        };
        assert_eq!(out.to_human(), "Nothing on 2024-03-01.");
    }
}
