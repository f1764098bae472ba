//! Plain-text rendering of the dashboard for the terminal host.

use chrono::{DateTime, Utc};

use crate::auth::AuthState;
use crate::dashboard::{DashboardView, RequestState};
use crate::models::Session;
use crate::pagination::PageWindow;

pub const EMPTY_MESSAGE: &str = "No sessions found. Try adjusting your filters.";
pub const IN_PROGRESS: &str = "Session in progress";
pub const NO_DURATION: &str = "—";

const HEADERS: [&str; 4] = ["Session ID", "Begin Time", "End Time", "Duration"];

/// `1h 2m 3s`, leading zero units dropped
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.round() as u64
    } else {
        0
    };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y %H:%M").to_string()
}

fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

fn session_row(session: &Session) -> [String; 4] {
    [
        session.id.clone(),
        format_timestamp(&session.begin_at),
        session
            .end_at
            .as_ref()
            .map(format_timestamp)
            .unwrap_or_else(|| IN_PROGRESS.to_string()),
        session
            .duration
            .map(format_duration)
            .unwrap_or_else(|| NO_DURATION.to_string()),
    ]
}

fn render_table(sessions: &[Session]) -> String {
    let rows: Vec<[String; 4]> = sessions.iter().map(session_row).collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: [&str; 4]| -> String {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(HEADERS)];
    for row in &rows {
        out.push(line([&row[0], &row[1], &row[2], &row[3]]));
    }
    out.join("\n")
}

pub fn render_pager(window: &PageWindow, total: u64) -> String {
    let prev = if window.has_previous() { "< Prev" } else { "  ----" };
    let next = if window.has_next() { "Next >" } else { "----  " };
    let pages = window
        .visible_pages
        .iter()
        .map(|&page| {
            if window.is_current(page) {
                format!("[{}]", page)
            } else {
                page.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "{}  {}  {}   (page {} of {}, {} sessions)",
        prev, pages, next, window.current_page, window.total_pages, total
    )
}

fn render_filters(view: &DashboardView) -> String {
    let query = view.filters.query();
    let mut parts = vec![format!("show {}", query.limit)];

    if let Some(ref project) = query.project_id {
        parts.push(format!("project {}", project));
    }
    if let Some(ref from) = query.from_date {
        parts.push(format!("from {}", format_date(from)));
    }
    if let Some(ref to) = query.to_date {
        parts.push(format!("to {}", format_date(to)));
    }

    let pending: Vec<String> = [
        view.filters.pending_from().filter(|p| Some(*p) != query.from_date).map(|p| format!("from {}", format_date(&p))),
        view.filters.pending_to().filter(|p| Some(*p) != query.to_date).map(|p| format!("to {}", format_date(&p))),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !pending.is_empty() {
        parts.push(format!("pending: {} (type 'apply')", pending.join(", ")));
    }

    format!("Filters: {}", parts.join(" | "))
}

pub fn render_view(view: &DashboardView) -> String {
    let mut out = vec![format!("== {} ==", view.title()), render_filters(view)];

    if view.is_loading() {
        out.push("Loading...".to_string());
    } else if view.sessions.is_empty() {
        out.push(EMPTY_MESSAGE.to_string());
    } else {
        out.push(render_table(&view.sessions));
        out.push(render_pager(&view.page_window(), view.total));
    }

    // a later success of the same kind hides the message
    let failing = matches!(view.sessions_request, RequestState::Failed(_))
        || matches!(view.project_request, RequestState::Failed(_));
    if let (true, Some(error)) = (failing, view.last_error.as_ref()) {
        out.push(format!("! {}", error));
    }
    out.join("\n")
}

pub fn render_auth(state: &AuthState) -> String {
    if state.loading {
        return "Checking session...".to_string();
    }
    let mut line = match state.me {
        Some(ref me) => match me.email {
            Some(ref email) => format!("Logged in as {} <{}>", me.username, email),
            None => format!("Logged in as {}", me.username),
        },
        None => "Not logged in".to_string(),
    };
    if let Some(ref error) = state.error {
        line.push_str(&format!(" ({})", error));
    }
    line
}
