//! Monthly report shaping and calendar helpers.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{AvailableMonth, CategoryCounts, MonthlyStats, RepairTicket, TicketStatus};
use crate::services::{aggregation, lifecycle};

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

/// Offset between the Gregorian and Thai Buddhist calendars.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Thai month name for 1..=12.
pub fn thai_month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|idx| THAI_MONTHS.get(idx as usize))
        .copied()
}

pub fn buddhist_year(year: i32) -> i32 {
    year + BUDDHIST_ERA_OFFSET
}

/// Label for the month picker, e.g. `มีนาคม 2569 (12 รายการ)`.
pub fn month_option_label(month: &AvailableMonth) -> String {
    format!(
        "{} {} ({} รายการ)",
        thai_month_name(month.month).unwrap_or("-"),
        buddhist_year(month.year),
        month.count
    )
}

/// Number of days in the given month, or `None` for an invalid month.
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Builds a date, pulling `day` back to the month's last day when it would
/// overflow (31 March moved to February becomes 28 or 29 February).
pub fn clamp_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let max_day = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, max_day))
}

/// Moves `date` to another month or year, keeping the day where possible.
pub fn shift_to(date: NaiveDate, year: i32, month: u32) -> Option<NaiveDate> {
    clamp_day(year, month, date.day())
}

/// One row of a count + share table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareRow {
    pub label: String,
    pub count: u64,
    pub percentage: f64,
}

impl ShareRow {
    pub fn formatted_percentage(&self) -> String {
        format!("{:.1}", self.percentage)
    }
}

fn share_rows(counts: &CategoryCounts, total: u64) -> Vec<ShareRow> {
    counts
        .iter()
        .map(|(label, &count)| ShareRow {
            label: label.clone(),
            count,
            percentage: aggregation::percentage(count, total),
        })
        .collect()
}

/// Counts per lifecycle state, zero when the server omitted one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
}

impl StatusSummary {
    pub fn from_counts(counts: &CategoryCounts) -> Self {
        let get = |status: TicketStatus| counts.get(status.label()).copied().unwrap_or(0);
        Self {
            pending: get(TicketStatus::Pending),
            in_progress: get(TicketStatus::InProgress),
            completed: get(TicketStatus::Completed),
            cancelled: get(TicketStatus::Cancelled),
        }
    }

    pub fn get(&self, status: TicketStatus) -> u64 {
        match status {
            TicketStatus::Pending => self.pending,
            TicketStatus::InProgress => self.in_progress,
            TicketStatus::Completed => self.completed,
            TicketStatus::Cancelled => self.cancelled,
        }
    }
}

/// Everything the monthly report screen shows above the request table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub month: u32,
    pub year: i32,
    pub month_name: String,
    pub total_requests: u64,
    pub status: StatusSummary,
    pub by_department: Vec<ShareRow>,
    pub by_equipment_type: Vec<ShareRow>,
    pub by_department_equipment: Vec<(String, Vec<(String, u64)>)>,
}

impl MonthlyReport {
    pub fn from_stats(stats: &MonthlyStats) -> Self {
        let matrix = stats
            .by_department_equipment
            .iter()
            .map(|(dept, equipment)| {
                let cells = equipment.iter().map(|(kind, &n)| (kind.clone(), n)).collect();
                (dept.clone(), cells)
            })
            .collect();

        Self {
            month: stats.month,
            year: stats.year,
            month_name: format!(
                "{} {}",
                thai_month_name(stats.month).unwrap_or("-"),
                buddhist_year(stats.year)
            ),
            total_requests: stats.total_requests,
            status: StatusSummary::from_counts(&stats.by_status),
            by_department: share_rows(&stats.by_department, stats.total_requests),
            by_equipment_type: share_rows(&stats.by_equipment_type, stats.total_requests),
            by_department_equipment: matrix,
        }
    }
}

/// Completion date column of the report table, `-` while not completed.
pub fn completion_date_label(ticket: &RepairTicket) -> String {
    lifecycle::find_completion_timestamp(&ticket.status_history)
        .map(|at| at.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}
