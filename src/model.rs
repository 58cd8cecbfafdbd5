//! Wire and display types for the occupancy board.
//!
//! DESIGN
//! ======
//! Types mirror the JSON the workshop backend produces (camelCase keys) and
//! are tolerant where the backend has historically been loose: ids arrive as
//! numbers or strings, status colors in any case, and `null` where a list or
//! flag was expected. An event without a box key is the one thing that is
//! rejected outright, since it cannot be merged anywhere.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Opaque backend identifier. Boxes use numeric ids, orders use UUID strings;
/// neither is interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Mirrors the JS falsy check the push producer relies on: empty strings
    /// and `0` never identify an order.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(n) => *n == 0,
            Self::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Traffic-light color of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum StatusColor {
    Available,
    Green,
    Yellow,
    Red,
    Paused,
    #[default]
    Gray,
    AlertSequential,
}

impl StatusColor {
    /// Case-insensitive parse. Unknown colors fall back to gray so a new
    /// backend color never drops a whole event.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AVAILABLE" => Self::Available,
            "GREEN" => Self::Green,
            "YELLOW" => Self::Yellow,
            "RED" => Self::Red,
            "PAUSED" => Self::Paused,
            "ALERT_SEQUENTIAL" => Self::AlertSequential,
            _ => Self::Gray,
        }
    }

    /// Lowercase name used by renderers (`status-green`, ...).
    #[must_use]
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Paused => "paused",
            Self::Gray => "gray",
            Self::AlertSequential => "alert_sequential",
        }
    }
}

impl From<String> for StatusColor {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

/// Lifecycle status of an order or of one of its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    NotStarted,
    InProgress,
    Paused,
    Delayed,
    Completed,
    Finished,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(self, Self::Completed | Self::Finished)
    }
}

/// Deadline standing of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeStatus {
    OnTime,
    Late,
    #[serde(other)]
    Unknown,
}

// =============================================================================
// BOOTSTRAP / WIRE RECORDS
// =============================================================================

/// One physical service bay, as listed by the boxes endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxRecord {
    #[serde(default)]
    pub id: Option<RecordId>,
    /// Human label, e.g. `BOX-01`. Entries without one are skipped by the board.
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_color: Option<StatusColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_service_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_elapsed_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_estimated_time: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub car_present: bool,
}

impl BoxRecord {
    /// Minimal record with just an id and a label.
    #[must_use]
    pub fn new(id: impl Into<RecordId>, identifier: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            identifier: Some(identifier.into()),
            status_color: None,
            order_service_number: None,
            technician_name: None,
            current_task_name: None,
            task_elapsed_time: None,
            task_estimated_time: None,
            car_present: false,
        }
    }
}

/// Point-in-time occupancy update for one box, pushed over the transport and
/// returned by the active-orders endpoint.
///
/// The board keeps only the latest event per box and replaces it whole, so a
/// producer must resend every field it still wants displayed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_identifier: Option<String>,
    /// Older payloads name the box here instead of in `boxIdentifier`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub box_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_service_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_service_number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_color: Option<StatusColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_status: Option<TimeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_name: Option<String>,
    /// Minutes.
    #[serde(default, alias = "elapsedTimeMinutes", skip_serializing_if = "Option::is_none")]
    pub task_elapsed_time: Option<i64>,
    /// Minutes.
    #[serde(default, alias = "estimatedTimeMinutes", skip_serializing_if = "Option::is_none")]
    pub task_estimated_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_reason: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub car_present: bool,
}

/// Why a pushed payload could not become an [`OrderEvent`].
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event has no box identifier")]
    MissingBoxIdentifier,
}

impl OrderEvent {
    /// Event for `box_identifier` with every other field empty.
    #[must_use]
    pub fn for_box(box_identifier: impl Into<String>) -> Self {
        Self { box_identifier: Some(box_identifier.into()), ..Self::default() }
    }

    /// Decode a JSON message body. Succeeds only for events that carry a
    /// usable merge key.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Json`] for malformed JSON and
    /// [`EventError::MissingBoxIdentifier`] when no box key is present.
    pub fn decode(body: &str) -> Result<Self, EventError> {
        let event: Self = serde_json::from_str(body)?;
        if event.merge_key().is_none() {
            return Err(EventError::MissingBoxIdentifier);
        }
        Ok(event)
    }

    /// The box this event belongs to. `boxIdentifier` is canonical; `boxName`
    /// is only consulted when the canonical key is absent or blank.
    #[must_use]
    pub fn merge_key(&self) -> Option<&str> {
        [self.box_identifier.as_deref(), self.box_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|key| !key.is_empty())
    }

    /// The order id worth subscribing to, if any.
    #[must_use]
    pub fn subscribable_order_id(&self) -> Option<&RecordId> {
        self.order_service_id.as_ref().filter(|id| !id.is_blank())
    }
}

/// Full order record returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default, alias = "orderServiceNumber")]
    pub os_number: Option<i64>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub technician_name: Option<String>,
    #[serde(default)]
    pub box_name: Option<String>,
    #[serde(default)]
    pub vehicle_info: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub pause_reason: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tasks: Vec<TaskSummary>,
}

/// One task of an order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    #[serde(default)]
    pub id: Option<RecordId>,
    #[serde(default, alias = "taskName")]
    pub name: Option<String>,
    #[serde(default)]
    pub task_description: Option<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub estimated_time_minutes: Option<i64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

// =============================================================================
// DISPLAY
// =============================================================================

/// Display-ready state of one box on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxStatus {
    pub id: Option<RecordId>,
    pub name: String,
    /// Numeric key extracted from `name`, used for column placement.
    pub number: u64,
    pub status_color: StatusColor,
    pub order_service_id: Option<RecordId>,
    pub order_service_number: Option<i64>,
    pub status: Option<OrderStatus>,
    pub time_status: Option<TimeStatus>,
    pub technician_name: Option<String>,
    pub current_task_name: Option<String>,
    pub task_elapsed_time: Option<i64>,
    pub task_estimated_time: Option<i64>,
    pub pause_reason: Option<String>,
    pub car_present: bool,
}

impl BoxStatus {
    /// Whether the box currently shows a linked order.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.order_service_number.is_some() || self.order_service_id.is_some()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
