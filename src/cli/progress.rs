// src/cli/progress.rs — Terminal progress renderer for controller events

use crate::core::types::ProgressEvent;

/// One line per event. Returns `None` for events not worth printing.
pub fn format_event(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::StateChanged { .. } => None,
        ProgressEvent::RequestBuilt {
            index,
            model,
            images,
        } => Some(if *images > 0 {
            format!("[#{index}] generating with {model} (+{images} image(s))")
        } else {
            format!("[#{index}] generating with {model}")
        }),
        ProgressEvent::RecordAppended {
            index,
            kind,
            failure,
        } => Some(match failure {
            Some(f) => format!("[#{index}] {kind} failed: {f}"),
            None => format!("[#{index}] {kind} ok"),
        }),
        ProgressEvent::Finished { state, attempts } => {
            Some(format!("[done] {state} after {attempts} attempt(s)"))
        }
    }
}

/// Build a progress callback that writes to stderr, keeping stdout clean.
/// Suitable for `Controller::with_progress()`.
pub fn terminal_progress() -> impl Fn(ProgressEvent) + Send + 'static {
    move |event| {
        if let Some(line) = format_event(&event) {
            eprintln!("{line}");
        }
    }
}
