use super::formatter::{format_cell, format_datetime, format_duration};
use super::label::ActivityLabel;
use super::report::WeekReport;
use super::task::Task;
use chrono::NaiveDateTime;
use prettytable::{row, Cell, Row, Table};

pub struct View {}

impl View {
    pub fn tasks(tasks: &[Task], now: NaiveDateTime) {
        let mut table = Table::new();

        table.add_row(row!["REPOSITORY", "ID", "SUMMARY", "PROJECT", "ACTIVITIES", "TOTAL", "RUNNING SINCE"]);
        for task in tasks {
            let total = task
                .activities()
                .iter()
                .fold(chrono::Duration::zero(), |acc, a| acc + a.duration(now));
            table.add_row(row![
                task.id.repository_url,
                task.id.task_id,
                task.summary,
                task.project.as_ref().map(|p| p.title.as_str()).unwrap_or(""),
                task.activities().len(),
                format_duration(&total),
                task.current_activity().map(|a| format_datetime(&a.start)).unwrap_or_default()
            ]);
        }
        table.printstd();
    }

    pub fn week(report: &WeekReport) {
        let mut table = Table::new();

        let mut header = vec![Cell::new("TASK")];
        header.extend(report.dates().iter().map(|d| Cell::new(&d.format("%a %d").to_string())));
        header.push(Cell::new("TOTAL"));
        table.add_row(Row::new(header));

        for line in &report.rows {
            let mut cells = vec![Cell::new(&format!("{} {}", line.task.task_id, line.summary))];
            cells.extend(line.days.iter().map(|d| Cell::new(&format_cell(d))));
            cells.push(Cell::new(&format_duration(&line.total)));
            table.add_row(Row::new(cells));
        }

        let mut totals = vec![Cell::new("TOTAL")];
        totals.extend(report.day_totals.iter().map(|d| Cell::new(&format_cell(d))));
        totals.push(Cell::new(&format_duration(&report.total)));
        table.add_row(Row::new(totals));

        table.printstd();
    }

    pub fn labels(labels: &[ActivityLabel]) {
        let mut table = Table::new();

        table.add_row(row!["NAME", "COLOR"]);
        for label in labels {
            table.add_row(row![label.name, label.color.as_deref().unwrap_or("")]);
        }
        table.printstd();
    }

    pub fn migrations(history: &[(u32, String, String)]) {
        let mut table = Table::new();

        table.add_row(row!["VERSION", "NAME", "APPLIED AT"]);
        for (version, name, applied_at) in history {
            table.add_row(row![version, name, applied_at]);
        }
        table.printstd();
    }
}
