pub mod repair_ticket;
pub mod reports;

pub use repair_ticket::{
    Assignee, Department, EquipmentType, NewRepairTicket, RepairTicket, RequestNumber, StaffRef,
    StatusChangeEntry, StatusUpdate, TicketId, TicketStatus,
};
pub use reports::{AvailableMonth, CategoryCounts, DailyStats, MonthlyStats};
