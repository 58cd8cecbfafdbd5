//! Order drill-down: a box's live display record laid over the full order.
//!
//! Live values win wherever both sides carry the same attribute, since the
//! pushed state is newer than anything the detail endpoint returns.

use serde::{Deserialize, Serialize};

use crate::model::{BoxStatus, OrderDetails, OrderStatus, RecordId, StatusColor, TaskSummary, TimeStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub completed: usize,
    pub total: usize,
}

impl TaskProgress {
    #[must_use]
    pub fn of(tasks: &[TaskSummary]) -> Self {
        let completed = tasks.iter().filter(|task| task.status.is_some_and(OrderStatus::is_done)).count();
        Self { completed, total: tasks.len() }
    }

    /// Whole-number completion percentage; 0 for an order without tasks.
    #[must_use]
    pub fn percent(&self) -> usize {
        if self.total == 0 { 0 } else { self.completed * 100 / self.total }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDrilldown {
    pub box_name: String,
    pub order_service_id: RecordId,
    pub order_service_number: Option<i64>,
    pub status_color: StatusColor,
    pub status: Option<OrderStatus>,
    pub time_status: Option<TimeStatus>,
    pub technician_name: Option<String>,
    pub current_task_name: Option<String>,
    pub task_elapsed_time: Option<i64>,
    pub task_estimated_time: Option<i64>,
    pub pause_reason: Option<String>,
    pub car_present: bool,
    pub vehicle_info: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub tasks: Vec<TaskSummary>,
    pub progress: TaskProgress,
}

/// Merge fetched `details` under the `live` record of the box they belong to.
#[must_use]
pub fn merge_details(live: &BoxStatus, order_service_id: RecordId, details: OrderDetails) -> OrderDrilldown {
    let progress = TaskProgress::of(&details.tasks);
    OrderDrilldown {
        box_name: live.name.clone(),
        order_service_id,
        order_service_number: live.order_service_number.or(details.os_number),
        status_color: live.status_color,
        status: live.status.or(details.status),
        time_status: live.time_status,
        technician_name: live.technician_name.clone().or(details.technician_name),
        current_task_name: live.current_task_name.clone(),
        task_elapsed_time: live.task_elapsed_time,
        task_estimated_time: live.task_estimated_time,
        pause_reason: live.pause_reason.clone().or(details.pause_reason),
        car_present: live.car_present,
        vehicle_info: details.vehicle_info,
        start_time: details.start_time,
        end_time: details.end_time,
        tasks: details.tasks,
        progress,
    }
}

#[cfg(test)]
#[path = "drilldown_test.rs"]
mod tests;
