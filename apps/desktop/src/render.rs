//! Terminal rendering of workflow events.

use client_core::{display::DISCLAIMER, Notice, NoticeLevel, ResultView, WorkflowState};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct JsonOutcome<'a> {
    pub file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

pub fn state_line(file: &str, state: &WorkflowState) -> Option<String> {
    match state {
        WorkflowState::Idle => None,
        WorkflowState::Processing(image) => Some(format!(
            "{file}: processing {} ({} bytes)...",
            image.mime_type(),
            image.size_bytes()
        )),
        WorkflowState::Complete(_) => None,
        WorkflowState::Errored(reason) => Some(format!("{file}: analysis failed: {reason}")),
    }
}

pub fn notice_line(notice: &Notice) -> String {
    let marker = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warn",
    };
    format!("  [{marker}] {}: {}", notice.title, notice.description)
}

pub fn result_card(file: &str, view: &ResultView) -> String {
    let filled = (usize::from(view.confidence_percent) / 5).min(20);
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled));
    let mut card = format!(
        "{file}\n  {}\n  Confidence [{bar}] {}%\n",
        view.headline(),
        view.confidence_percent
    );
    if view.simulated {
        card.push_str("  (fallback simulation: classification endpoint unavailable)\n");
    }
    card.push_str("  ");
    card.push_str(DISCLAIMER);
    card
}
