//! Snapshot derivation: boxes + merge map to display columns.
//!
//! DESIGN
//! ======
//! A pure function of its inputs: the board recomputes the whole snapshot on
//! every change rather than patching the previous one. Grid membership comes
//! from the bootstrap box list only; merge entries for unknown boxes are
//! carried in the map but never drawn.
//!
//! Boxes are placed by the number embedded in their label (`BOX-07` → 7):
//! column `c` holds numbers `c * size + 1 ..= (c + 1) * size`. Labels with no
//! digits get number 0, which no column holds, so they end up in `unplaced`.

use serde::{Deserialize, Serialize};

use crate::merge::MergeMap;
use crate::model::{BoxRecord, BoxStatus, OrderEvent, StatusColor};

pub const DEFAULT_COLUMNS: usize = 4;
pub const DEFAULT_COLUMN_SIZE: u64 = 6;

/// Shape of the display grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutConfig {
    pub columns: usize,
    pub column_size: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self { columns: DEFAULT_COLUMNS, column_size: DEFAULT_COLUMN_SIZE }
    }
}

impl LayoutConfig {
    /// Zero-based column for a box number, `None` when it falls outside the grid.
    #[must_use]
    pub fn column_for(&self, number: u64) -> Option<usize> {
        if number == 0 || self.column_size == 0 {
            return None;
        }
        let column = usize::try_from((number - 1) / self.column_size).ok()?;
        (column < self.columns).then_some(column)
    }
}

/// Display-ready board state handed to consumers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    /// Whether live updates are flowing. `false` means bootstrap data only.
    pub connected: bool,
    pub columns: Vec<Vec<BoxStatus>>,
    /// Known boxes whose number fits no column.
    pub unplaced: Vec<BoxStatus>,
    /// Number of boxes with a merge entry, including ones not on the grid.
    pub tracked_boxes: usize,
}

impl BoardSnapshot {
    /// All drawn boxes, column by column, then the unplaced ones.
    pub fn boxes(&self) -> impl Iterator<Item = &BoxStatus> {
        self.columns.iter().flatten().chain(self.unplaced.iter())
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&BoxStatus> {
        self.boxes().find(|status| status.name == name)
    }
}

/// Number embedded in a box label: every ASCII digit concatenated, 0 if none
/// or if the result does not fit.
#[must_use]
pub fn box_number(name: &str) -> u64 {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Display record for every bootstrap box that has a label, in input order.
#[must_use]
pub fn derive_statuses(boxes: &[BoxRecord], merge: &MergeMap) -> Vec<BoxStatus> {
    boxes
        .iter()
        .filter_map(|record| {
            let name = record.identifier.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
            Some(match merge.get(name) {
                Some(event) => occupied_status(record, name, event),
                None => available_status(record, name),
            })
        })
        .collect()
}

/// Split statuses into grid columns plus leftovers, each sorted by box number.
#[must_use]
pub fn partition(statuses: Vec<BoxStatus>, layout: LayoutConfig) -> (Vec<Vec<BoxStatus>>, Vec<BoxStatus>) {
    let mut columns: Vec<Vec<BoxStatus>> = vec![Vec::new(); layout.columns];
    let mut unplaced = Vec::new();

    for status in statuses {
        match layout.column_for(status.number) {
            Some(index) => columns[index].push(status),
            None => unplaced.push(status),
        }
    }

    for column in &mut columns {
        column.sort_by_key(|s| s.number);
    }
    unplaced.sort_by_key(|s| s.number);

    (columns, unplaced)
}

/// Full snapshot derivation.
#[must_use]
pub fn derive_display(boxes: &[BoxRecord], merge: &MergeMap, layout: LayoutConfig, connected: bool) -> BoardSnapshot {
    let (columns, unplaced) = partition(derive_statuses(boxes, merge), layout);
    BoardSnapshot { connected, columns, unplaced, tracked_boxes: merge.len() }
}

fn occupied_status(record: &BoxRecord, name: &str, event: &OrderEvent) -> BoxStatus {
    BoxStatus {
        id: record.id.clone(),
        name: name.to_owned(),
        number: box_number(name),
        status_color: event.status_color.unwrap_or_default(),
        order_service_id: event.order_service_id.clone(),
        order_service_number: event.order_service_number,
        status: event.status,
        time_status: event.time_status,
        technician_name: event.technician_name.clone(),
        current_task_name: event.current_task_name.clone(),
        task_elapsed_time: event.task_elapsed_time,
        task_estimated_time: event.task_estimated_time,
        pause_reason: event.pause_reason.clone(),
        car_present: event.car_present,
    }
}

fn available_status(record: &BoxRecord, name: &str) -> BoxStatus {
    BoxStatus {
        id: record.id.clone(),
        name: name.to_owned(),
        number: box_number(name),
        status_color: StatusColor::Available,
        order_service_id: None,
        order_service_number: None,
        status: None,
        time_status: None,
        technician_name: None,
        current_task_name: None,
        task_elapsed_time: None,
        task_estimated_time: None,
        pause_reason: None,
        car_present: false,
    }
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
