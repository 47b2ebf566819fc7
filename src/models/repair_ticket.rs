use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ServiceError;

static REQUEST_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]+-\d{4,}$").expect("request number pattern is valid"));

/// Lifecycle state of a repair ticket.
///
/// The backend speaks Thai labels on the wire; English names are accepted on
/// input so that command-line arguments and older payloads still parse.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum TicketStatus {
    #[serde(rename = "รอดำเนินการ", alias = "Pending", alias = "pending")]
    #[strum(to_string = "Pending", serialize = "รอดำเนินการ")]
    Pending,
    #[serde(
        rename = "กำลังดำเนินการ",
        alias = "InProgress",
        alias = "in_progress",
        alias = "in-progress"
    )]
    #[strum(
        to_string = "InProgress",
        serialize = "in_progress",
        serialize = "in-progress",
        serialize = "กำลังดำเนินการ"
    )]
    InProgress,
    #[serde(rename = "เสร็จสิ้น", alias = "Completed", alias = "completed")]
    #[strum(to_string = "Completed", serialize = "เสร็จสิ้น")]
    Completed,
    #[serde(rename = "ยกเลิก", alias = "Cancelled", alias = "cancelled")]
    #[strum(to_string = "Cancelled", serialize = "ยกเลิก")]
    Cancelled,
}

impl TicketStatus {
    /// Thai label, identical to the wire value.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "รอดำเนินการ",
            Self::InProgress => "กำลังดำเนินการ",
            Self::Completed => "เสร็จสิ้น",
            Self::Cancelled => "ยกเลิก",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl Default for TicketStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum EquipmentType {
    Computer,
    Printer,
    #[serde(rename = "CCTV")]
    #[strum(serialize = "CCTV")]
    Cctv,
    #[serde(rename = "UPS")]
    #[strum(serialize = "UPS")]
    Ups,
    Software,
}

impl Default for EquipmentType {
    fn default() -> Self {
        Self::Computer
    }
}

/// Hotel departments.
///
/// `HR` is accepted as an input spelling of Human Resources and always
/// serialized as the long form.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Department {
    #[serde(rename = "Front Office")]
    #[strum(to_string = "Front Office", serialize = "front-office")]
    FrontOffice,
    Housekeeping,
    #[serde(rename = "Food & Beverage", alias = "F&B")]
    #[strum(to_string = "Food & Beverage", serialize = "F&B", serialize = "food-beverage")]
    FoodAndBeverage,
    Engineering,
    Accounting,
    #[serde(rename = "Sales & Marketing")]
    #[strum(to_string = "Sales & Marketing", serialize = "sales-marketing")]
    SalesAndMarketing,
    Security,
    #[serde(rename = "IT")]
    #[strum(serialize = "IT")]
    It,
    #[serde(rename = "Human Resources", alias = "HR")]
    #[strum(to_string = "Human Resources", serialize = "HR", serialize = "human-resources")]
    HumanResources,
    Reservation,
    Other,
}

impl Default for Department {
    fn default() -> Self {
        Self::It
    }
}

/// Opaque server-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-facing ticket code such as `IT-0001`.
///
/// Parsing upper-cases the input, so lookups are case-insensitive. Values
/// coming from the server are taken as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestNumber(String);

impl RequestNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Department prefix, the part before the dash.
    pub fn prefix(&self) -> &str {
        self.0.split_once('-').map(|(prefix, _)| prefix).unwrap_or(&self.0)
    }

    pub fn is_well_formed(&self) -> bool {
        REQUEST_NUMBER_PATTERN.is_match(&self.0)
    }
}

impl FromStr for RequestNumber {
    type Err = ServiceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty() {
            return Err(ServiceError::ValidationError(
                "กรุณากรอกรหัสคำขอ".to_string(),
            ));
        }
        if !REQUEST_NUMBER_PATTERN.is_match(&normalized) {
            return Err(ServiceError::ValidationError(format!(
                "รหัสคำขอ '{}' ไม่ถูกต้อง (ตัวอย่าง: IT-0001)",
                raw.trim()
            )));
        }
        Ok(Self(normalized))
    }
}

impl fmt::Display for RequestNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Staff member attached to a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignee {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Who recorded a status change: either a bare id or a populated profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaffRef {
    Id(String),
    Profile(Assignee),
}

impl StaffRef {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Profile(profile) => profile
                .full_name
                .as_deref()
                .or(profile.username.as_deref())
                .unwrap_or("-"),
        }
    }
}

/// One immutable row of a ticket's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<TicketStatus>,
    #[serde(alias = "status")]
    pub new_status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(alias = "timestamp")]
    pub changed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<StaffRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairTicket {
    #[serde(rename = "_id", alias = "id")]
    pub id: TicketId,
    pub request_number: RequestNumber,
    pub equipment_type: EquipmentType,
    pub department: Department,
    pub title: String,
    #[serde(default)]
    pub problem_description: String,
    #[serde(default)]
    pub reporter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub status_history: Vec<StatusChangeEntry>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<Assignee>,
}

/// Payload for `POST /repair-requests`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRepairTicket {
    pub equipment_type: EquipmentType,
    pub department: Department,
    #[validate(length(min = 1, max = 200, message = "กรุณากรอกหัวข้อ"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "กรุณาอธิบายปัญหา"))]
    pub problem_description: String,
    #[validate(length(min = 1, max = 200, message = "กรุณากรอกชื่อผู้แจ้ง"))]
    pub reporter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

impl NewRepairTicket {
    /// Trims free-text fields and drops an empty location.
    pub fn normalized(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.problem_description = self.problem_description.trim().to_string();
        self.reporter_name = self.reporter_name.trim().to_string();
        self.location = self
            .location
            .map(|loc| loc.trim().to_string())
            .filter(|loc| !loc.is_empty());
        self
    }
}

/// Payload for `PATCH /admin/repair-requests/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
