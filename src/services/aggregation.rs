//! Category counts for the dashboard and monthly report.
//!
//! Keys are the same labels the backend uses in its statistics payloads:
//! Thai status labels, department names and equipment codes. That way a
//! locally computed [`MonthlyStats`] can be compared with, or substituted
//! for, the server's.

use std::collections::BTreeMap;

use chrono::Datelike;
use strum::IntoEnumIterator;

use crate::models::{
    CategoryCounts, Department, EquipmentType, MonthlyStats, RepairTicket, TicketStatus,
};

/// Counts tickets per key. Tickets for which `key_fn` returns `None` are
/// not counted and produce no entry.
pub fn aggregate_by_key<F>(tickets: &[RepairTicket], key_fn: F) -> CategoryCounts
where
    F: Fn(&RepairTicket) -> Option<String>,
{
    let mut counts = CategoryCounts::new();
    for key in tickets.iter().filter_map(|t| key_fn(t)) {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

pub fn count_by_status(tickets: &[RepairTicket]) -> CategoryCounts {
    aggregate_by_key(tickets, |t| Some(t.status.label().to_string()))
}

pub fn count_by_department(tickets: &[RepairTicket]) -> CategoryCounts {
    aggregate_by_key(tickets, |t| Some(t.department.as_ref().to_string()))
}

pub fn count_by_equipment_type(tickets: &[RepairTicket]) -> CategoryCounts {
    aggregate_by_key(tickets, |t| Some(t.equipment_type.as_ref().to_string()))
}

/// Department x equipment matrix. Only combinations that occur are present.
pub fn cross_tabulate(tickets: &[RepairTicket]) -> BTreeMap<String, CategoryCounts> {
    let mut matrix: BTreeMap<String, CategoryCounts> = BTreeMap::new();
    for ticket in tickets {
        *matrix
            .entry(ticket.department.as_ref().to_string())
            .or_default()
            .entry(ticket.equipment_type.as_ref().to_string())
            .or_insert(0) += 1;
    }
    matrix
}

/// Builds the month's statistics from raw tickets.
///
/// Tickets are bucketed by their UTC creation date.
pub fn monthly_stats(tickets: &[RepairTicket], month: u32, year: i32) -> MonthlyStats {
    let in_month: Vec<RepairTicket> = tickets
        .iter()
        .filter(|t| t.created_at.month() == month && t.created_at.year() == year)
        .cloned()
        .collect();

    MonthlyStats {
        by_department: count_by_department(&in_month),
        by_status: count_by_status(&in_month),
        by_equipment_type: count_by_equipment_type(&in_month),
        by_department_equipment: cross_tabulate(&in_month),
        total_requests: in_month.len() as u64,
        month,
        year,
    }
}

pub fn status_labels() -> Vec<String> {
    TicketStatus::iter().map(|s| s.label().to_string()).collect()
}

pub fn department_labels() -> Vec<String> {
    Department::iter().map(|d| d.as_ref().to_string()).collect()
}

pub fn equipment_labels() -> Vec<String> {
    EquipmentType::iter().map(|e| e.as_ref().to_string()).collect()
}

/// Copy of `counts` with a zero for every known category that is missing.
/// Unknown keys already present are kept.
pub fn with_known_categories<I, S>(counts: &CategoryCounts, known: I) -> CategoryCounts
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut filled = counts.clone();
    for key in known {
        filled.entry(key.into()).or_insert(0);
    }
    filled
}

pub fn total(counts: &CategoryCounts) -> u64 {
    counts.values().sum()
}

/// Share of `count` in `total` as a percentage. Zero when `total` is zero.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}

/// Percentage with one decimal place, e.g. `"33.3"`.
pub fn format_percentage(count: u64, total: u64) -> String {
    format!("{:.1}", percentage(count, total))
}
