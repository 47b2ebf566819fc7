//! Filtering, sorting and paging over ticket collections.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    models::{Department, EquipmentType, RepairTicket, TicketStatus},
    Paginated, Pagination,
};

/// Criteria a ticket must meet to be kept. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub equipment_type: Option<EquipmentType>,
    pub department: Option<Department>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub created_to: Option<DateTime<Utc>>,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &RepairTicket) -> bool {
        self.status.map_or(true, |s| ticket.status == s)
            && self.equipment_type.map_or(true, |e| ticket.equipment_type == e)
            && self.department.map_or(true, |d| ticket.department == d)
            && self.created_from.map_or(true, |from| ticket.created_at >= from)
            && self.created_to.map_or(true, |to| ticket.created_at <= to)
    }
}

/// Columns the report table can be sorted by. Wire names match the
/// backend's `sortBy` parameter.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum SortField {
    #[default]
    CreatedAt,
    RequestNumber,
    Department,
    EquipmentType,
    Status,
    Title,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// The other direction, for toggling a column header.
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Filter plus sort, applied client-side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketQuery {
    pub filter: TicketFilter,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl TicketQuery {
    pub fn new(filter: TicketFilter, sort_by: SortField, order: SortOrder) -> Self {
        Self {
            filter,
            sort_by,
            order,
        }
    }

    /// Matching tickets in sorted order.
    ///
    /// The sort is stable and ties on the chosen column fall back to
    /// `request_number` ascending whatever the direction, so repeated runs
    /// give the same order.
    pub fn apply(&self, tickets: &[RepairTicket]) -> Vec<RepairTicket> {
        let mut selected: Vec<RepairTicket> = tickets
            .iter()
            .filter(|ticket| self.filter.matches(ticket))
            .cloned()
            .collect();

        selected.sort_by(|a, b| {
            let primary = compare_by(self.sort_by, a, b);
            let primary = match self.order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| a.request_number.cmp(&b.request_number))
        });
        selected
    }
}

fn compare_by(field: SortField, a: &RepairTicket, b: &RepairTicket) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::RequestNumber => a.request_number.cmp(&b.request_number),
        SortField::Department => a.department.as_ref().cmp(b.department.as_ref()),
        SortField::EquipmentType => a.equipment_type.as_ref().cmp(b.equipment_type.as_ref()),
        // lifecycle order: pending first, cancelled last
        SortField::Status => a.status.cmp(&b.status),
        SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
    }
}

/// Cuts one page out of `items`.
///
/// Pages are 1-based; page 0 is treated as page 1 and a zero limit as 1. A
/// page past the end yields no rows but still reports the real totals.
pub fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> Paginated<T> {
    let pagination = Pagination::new(page, limit, items.len() as u64);
    let start = (pagination.page as usize - 1).saturating_mul(pagination.limit as usize);
    let data = items
        .iter()
        .skip(start)
        .take(pagination.limit as usize)
        .cloned()
        .collect();

    Paginated { data, pagination }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{advance, at, ticket};

    fn sample() -> Vec<RepairTicket> {
        vec![
            ticket("IT-0003", Department::It, EquipmentType::Printer, at(2026, 3, 2, 9)),
            advance(
                ticket("FO-0001", Department::FrontOffice, EquipmentType::Computer, at(2026, 3, 1, 9)),
                TicketStatus::Completed,
            ),
            advance(
                ticket("HK-0002", Department::Housekeeping, EquipmentType::Cctv, at(2026, 3, 2, 9)),
                TicketStatus::Cancelled,
            ),
            ticket("IT-0004", Department::It, EquipmentType::Computer, at(2026, 4, 1, 9)),
        ]
    }

    fn numbers(tickets: &[RepairTicket]) -> Vec<&str> {
        tickets.iter().map(|t| t.request_number.as_str()).collect()
    }

    #[test]
    fn default_query_is_newest_first() {
        let sorted = TicketQuery::default().apply(&sample());
        // HK-0002 and IT-0003 share a timestamp; request number breaks the tie
        assert_eq!(numbers(&sorted), vec!["IT-0004", "HK-0002", "IT-0003", "FO-0001"]);
    }

    #[test]
    fn ascending_ties_also_break_on_request_number() {
        let query = TicketQuery::new(TicketFilter::default(), SortField::CreatedAt, SortOrder::Asc);
        assert_eq!(
            numbers(&query.apply(&sample())),
            vec!["FO-0001", "HK-0002", "IT-0003", "IT-0004"]
        );
    }

    #[test]
    fn filters_combine() {
        let filter = TicketFilter {
            department: Some(Department::It),
            equipment_type: Some(EquipmentType::Computer),
            ..TicketFilter::default()
        };
        let query = TicketQuery::new(filter, SortField::RequestNumber, SortOrder::Asc);
        assert_eq!(numbers(&query.apply(&sample())), vec!["IT-0004"]);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let filter = TicketFilter {
            created_from: Some(at(2026, 3, 1, 9)),
            created_to: Some(at(2026, 3, 2, 9)),
            ..TicketFilter::default()
        };
        let query = TicketQuery::new(filter, SortField::RequestNumber, SortOrder::Asc);
        assert_eq!(
            numbers(&query.apply(&sample())),
            vec!["FO-0001", "HK-0002", "IT-0003"]
        );
    }

    #[test]
    fn status_sort_follows_lifecycle_order() {
        let query = TicketQuery::new(TicketFilter::default(), SortField::Status, SortOrder::Asc);
        let statuses: Vec<_> = query.apply(&sample()).iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                TicketStatus::Pending,
                TicketStatus::Pending,
                TicketStatus::Completed,
                TicketStatus::Cancelled
            ]
        );
    }

    #[test]
    fn input_is_left_untouched() {
        let tickets = sample();
        let before = tickets.clone();
        let _ = TicketQuery::default().apply(&tickets);
        assert_eq!(tickets, before);
    }

    #[test]
    fn sort_field_wire_names() {
        assert_eq!(serde_json::to_string(&SortField::CreatedAt).unwrap(), "\"createdAt\"");
        assert_eq!("requestNumber".parse::<SortField>().unwrap(), SortField::RequestNumber);
        assert_eq!(SortOrder::Desc.toggled(), SortOrder::Asc);
    }

    #[test]
    fn paginate_cuts_pages_and_reports_totals() {
        let items: Vec<u32> = (1..=25).collect();

        let second = paginate(&items, 2, 10);
        assert_eq!(second.data, (11..=20).collect::<Vec<_>>());
        assert_eq!(second.pagination.total, 25);
        assert_eq!(second.pagination.total_pages, 3);

        let last = paginate(&items, 3, 10);
        assert_eq!(last.data, vec![21, 22, 23, 24, 25]);

        let beyond = paginate(&items, 9, 10);
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.pagination.total, 25);

        let zero = paginate(&items, 0, 0);
        assert_eq!(zero.data, vec![1]);
        assert_eq!(zero.pagination.page, 1);
    }
}
