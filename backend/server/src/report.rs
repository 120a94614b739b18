//! Closed-project report: how long each finished project took to fund.
//!
//! Read-only; it never touches allocation state.

use chrono::Duration;
use serde::Serialize;

use crate::models::ProjectRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub name: String,
    /// Human-readable time from creation to closing, e.g. `2 days, 3:04:05`.
    pub duration: String,
    pub duration_secs: i64,
    pub description: String,
    pub invested_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub count: usize,
    pub projects: Vec<ReportRow>,
}

/// Build report rows from closed projects, fastest first.
/// Projects without a `close_date` are skipped.
pub fn build(projects: Vec<ProjectRecord>) -> Report {
    let mut rows: Vec<(Duration, ReportRow)> = projects
        .into_iter()
        .filter_map(|p| {
            let took = p.close_date? - p.create_date;
            Some((
                took,
                ReportRow {
                    name: p.name,
                    duration: format_duration(took),
                    duration_secs: took.num_seconds(),
                    description: p.description,
                    invested_amount: p.invested_amount,
                },
            ))
        })
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

    let projects: Vec<ReportRow> = rows.into_iter().map(|(_, row)| row).collect();
    Report {
        count: projects.len(),
        projects,
    }
}

/// `H:MM:SS`, prefixed with `N day(s), ` once the span reaches a day.
pub fn format_duration(span: Duration) -> String {
    let total = span.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
