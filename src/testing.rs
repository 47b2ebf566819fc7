//! Ticket fixtures shared by unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::models::{
    Department, EquipmentType, RepairTicket, RequestNumber, StatusChangeEntry, TicketId,
    TicketStatus,
};
use crate::services::lifecycle::append_status_change_at;

pub(crate) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

/// Pending ticket created at `created_at` with its opening history entry.
pub(crate) fn ticket(
    number: &str,
    department: Department,
    equipment: EquipmentType,
    created_at: DateTime<Utc>,
) -> RepairTicket {
    RepairTicket {
        id: TicketId::new(format!("id-{number}")),
        request_number: number.parse::<RequestNumber>().unwrap(),
        equipment_type: equipment,
        department,
        title: format!("{equipment} problem"),
        problem_description: "Does not work".into(),
        reporter_name: "Reporter".into(),
        location: None,
        status: TicketStatus::Pending,
        status_history: vec![StatusChangeEntry {
            old_status: None,
            new_status: TicketStatus::Pending,
            notes: None,
            changed_at: created_at,
            changed_by: None,
        }],
        created_at,
        updated_at: None,
        assigned_to: None,
    }
}

/// Walks a pending ticket along legal transitions until it reaches `target`.
pub(crate) fn advance(ticket: RepairTicket, target: TicketStatus) -> RepairTicket {
    let path: &[TicketStatus] = match target {
        TicketStatus::Pending => &[],
        TicketStatus::InProgress => &[TicketStatus::InProgress],
        TicketStatus::Completed => &[TicketStatus::InProgress, TicketStatus::Completed],
        TicketStatus::Cancelled => &[TicketStatus::Cancelled],
    };

    path.iter().enumerate().fold(ticket, |current, (step, status)| {
        let when = current.created_at + Duration::hours(step as i64 + 1);
        append_status_change_at(&current, *status, None, None, when)
    })
}
