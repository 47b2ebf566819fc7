use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Count per category label, keyed by the wire label (e.g. Thai status).
pub type CategoryCounts = BTreeMap<String, u64>;

/// Aggregates for one calendar month, as served by `/reports/monthly-stats`
/// or computed locally from a ticket collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    #[serde(default)]
    pub by_department: CategoryCounts,
    #[serde(default)]
    pub by_status: CategoryCounts,
    #[serde(default)]
    pub by_equipment_type: CategoryCounts,
    #[serde(default)]
    pub by_department_equipment: BTreeMap<String, CategoryCounts>,
    #[serde(default)]
    pub total_requests: u64,
    pub month: u32,
    pub year: i32,
}

/// Per-day snapshot from `/admin/dashboard/daily`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub by_status: CategoryCounts,
    #[serde(default)]
    pub by_equipment_type: CategoryCounts,
    #[serde(default)]
    pub by_department: CategoryCounts,
}

/// A month that has at least one ticket on record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableMonth {
    pub month: u32,
    pub year: i32,
    pub count: u64,
}
