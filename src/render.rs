//! Plain-text rendering of a board snapshot for terminals.

use std::fmt::Write;

use crate::layout::BoardSnapshot;
use crate::model::BoxStatus;

/// One block per column, one line per box, then any unplaced boxes.
#[must_use]
pub fn render_board(snapshot: &BoardSnapshot) -> String {
    let mut out = String::new();
    let state = if snapshot.connected { "LIVE" } else { "OFFLINE (last known state)" };
    let _ = writeln!(out, "== boxboard: {state}, {} tracked ==", snapshot.tracked_boxes);

    for (index, column) in snapshot.columns.iter().enumerate() {
        let _ = writeln!(out, "-- column {} --", index + 1);
        for status in column {
            let _ = writeln!(out, "{}", render_box(status));
        }
    }
    if !snapshot.unplaced.is_empty() {
        let _ = writeln!(out, "-- unplaced --");
        for status in &snapshot.unplaced {
            let _ = writeln!(out, "{}", render_box(status));
        }
    }
    out
}

/// `BOX-01  GREEN  OS 42  Ana  Freios 10/25m  [car]`
#[must_use]
pub fn render_box(status: &BoxStatus) -> String {
    let mut line = format!("{:<8} {:<16}", status.name, status.status_color.css_class().to_uppercase());
    if let Some(number) = status.order_service_number {
        let _ = write!(line, " OS {number}");
    }
    if let Some(technician) = &status.technician_name {
        let _ = write!(line, "  {technician}");
    }
    if let Some(task) = &status.current_task_name {
        let _ = write!(line, "  {task}");
        if let (Some(elapsed), Some(estimated)) = (status.task_elapsed_time, status.task_estimated_time) {
            let _ = write!(line, " {elapsed}/{estimated}m");
        }
    }
    if let Some(reason) = &status.pause_reason {
        let _ = write!(line, "  ({reason})");
    }
    if status.car_present {
        line.push_str("  [car]");
    }
    line.trim_end().to_owned()
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
