//! Repair ticket lifecycle.
//!
//! The transition table and the projections derived from a ticket's status
//! history. Everything here is pure: callers get new values back and the
//! input ticket is never touched, so history entries stay exactly as they
//! were appended.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    errors::ServiceError,
    models::{RepairTicket, StaffRef, StatusChangeEntry, TicketStatus},
};

/// Checks a requested status change against the transition table.
///
/// Fails closed: only the pairs listed below are legal. Requesting the
/// current status again is rejected like any other undefined move.
pub fn validate_transition(
    current: TicketStatus,
    requested: TicketStatus,
) -> Result<(), ServiceError> {
    if is_valid_transition(current, requested) {
        Ok(())
    } else {
        debug!(%current, %requested, "rejected status transition");
        Err(ServiceError::InvalidTransition { current, requested })
    }
}

fn is_valid_transition(from: TicketStatus, to: TicketStatus) -> bool {
    use TicketStatus::*;

    match (from, to) {
        // From pending
        (Pending, InProgress) => true,
        (Pending, Cancelled) => true,

        // From in progress
        (InProgress, Completed) => true,

        // Completed and Cancelled are terminal; identity moves are undefined
        _ => false,
    }
}

/// Statuses reachable from `status` in one step.
pub fn allowed_transitions(status: TicketStatus) -> &'static [TicketStatus] {
    match status {
        TicketStatus::Pending => &[TicketStatus::InProgress, TicketStatus::Cancelled],
        TicketStatus::InProgress => &[TicketStatus::Completed],
        TicketStatus::Completed | TicketStatus::Cancelled => &[],
    }
}

/// Returns a copy of `ticket` with one more history entry stamped now.
/// Blank notes are recorded as `None`.
///
/// Does not consult the transition table; use [`apply_transition`] for a
/// checked change.
pub fn append_status_change(
    ticket: &RepairTicket,
    new_status: TicketStatus,
    notes: Option<String>,
) -> RepairTicket {
    append_status_change_at(ticket, new_status, notes, None, Utc::now())
}

/// Same as [`append_status_change`] with an explicit timestamp and author.
///
/// `changed_at` is clamped to the last entry's timestamp so the trail stays
/// non-decreasing even when the local clock lags the server.
pub fn append_status_change_at(
    ticket: &RepairTicket,
    new_status: TicketStatus,
    notes: Option<String>,
    changed_by: Option<StaffRef>,
    changed_at: DateTime<Utc>,
) -> RepairTicket {
    let changed_at = match ticket.status_history.last() {
        Some(last) if last.changed_at > changed_at => last.changed_at,
        _ => changed_at,
    };

    let mut next = ticket.clone();
    next.status_history.push(StatusChangeEntry {
        old_status: Some(ticket.status),
        new_status,
        notes: notes.filter(|n| !n.trim().is_empty()),
        changed_at,
        changed_by,
    });
    next.status = new_status;
    next.updated_at = Some(changed_at);
    next
}

/// Validated status change: the transition table first, then the append.
pub fn apply_transition(
    ticket: &RepairTicket,
    new_status: TicketStatus,
    notes: Option<String>,
) -> Result<RepairTicket, ServiceError> {
    validate_transition(ticket.status, new_status)?;
    Ok(append_status_change(ticket, new_status, notes))
}

/// Current status as implied by the history alone.
pub fn project_current_status(history: &[StatusChangeEntry]) -> TicketStatus {
    history
        .last()
        .map(|entry| entry.new_status)
        .unwrap_or_default()
}

/// Surfaces a stored status that disagrees with its own history.
///
/// The mismatch is reported, never repaired.
pub fn verify_status_consistency(ticket: &RepairTicket) -> Result<(), ServiceError> {
    let projected = project_current_status(&ticket.status_history);
    if projected == ticket.status {
        return Ok(());
    }

    warn!(
        request_number = %ticket.request_number,
        stored = %ticket.status,
        projected = %projected,
        "ticket status diverges from its history"
    );
    Err(ServiceError::DataIntegrity(format!(
        "ticket {} stores status {} but its history ends in {}",
        ticket.request_number, ticket.status, projected
    )))
}

/// When the ticket was first marked Completed.
///
/// Completed is terminal so at most one such entry should exist; if a
/// malformed history has several, the earliest wins.
pub fn find_completion_timestamp(history: &[StatusChangeEntry]) -> Option<DateTime<Utc>> {
    history
        .iter()
        .filter(|entry| entry.new_status == TicketStatus::Completed)
        .map(|entry| entry.changed_at)
        .min()
}

/// Reporter cancellation without logging in.
pub fn can_self_cancel(ticket: &RepairTicket) -> bool {
    ticket.status == TicketStatus::Pending
}

/// Permanent deletion by an administrator.
pub fn can_admin_delete(ticket: &RepairTicket) -> bool {
    ticket.status == TicketStatus::Cancelled
}

/// One-click admin actions on the request list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum QuickAction {
    Accept,
    Cancel,
    Complete,
    Delete,
}

impl QuickAction {
    /// Target status, or `None` for deletion.
    pub fn target_status(&self) -> Option<TicketStatus> {
        match self {
            Self::Accept => Some(TicketStatus::InProgress),
            Self::Cancel => Some(TicketStatus::Cancelled),
            Self::Complete => Some(TicketStatus::Completed),
            Self::Delete => None,
        }
    }

    pub fn default_notes(&self) -> Option<&'static str> {
        match self {
            Self::Accept => Some("รับงานแล้ว"),
            Self::Cancel => Some("ยกเลิกโดย Admin"),
            Self::Complete => Some("ดำเนินการเสร็จสิ้น"),
            Self::Delete => None,
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Delete)
    }

    /// Whether the action makes sense for a ticket in its current state.
    pub fn is_available_for(&self, ticket: &RepairTicket) -> bool {
        match self.target_status() {
            Some(target) => is_valid_transition(ticket.status, target),
            None => can_admin_delete(ticket),
        }
    }

    /// Actions offered for a ticket, in display order.
    pub fn available_for(ticket: &RepairTicket) -> Vec<QuickAction> {
        use strum::IntoEnumIterator;

        QuickAction::iter()
            .filter(|action| action.is_available_for(ticket))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Department, EquipmentType, RequestNumber, TicketId};
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use strum::IntoEnumIterator;
    use TicketStatus::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn pending_ticket() -> RepairTicket {
        RepairTicket {
            id: TicketId::new("t-1"),
            request_number: "IT-0001".parse::<RequestNumber>().unwrap(),
            equipment_type: EquipmentType::Computer,
            department: Department::It,
            title: "PC will not boot".into(),
            problem_description: "Black screen after power on".into(),
            reporter_name: "Malee".into(),
            location: Some("Back office".into()),
            status: Pending,
            status_history: vec![StatusChangeEntry {
                old_status: None,
                new_status: Pending,
                notes: None,
                changed_at: base_time(),
                changed_by: None,
            }],
            created_at: base_time(),
            updated_at: None,
            assigned_to: None,
        }
    }

    #[rstest]
    #[case(Pending, InProgress)]
    #[case(Pending, Cancelled)]
    #[case(InProgress, Completed)]
    fn legal_transitions_are_accepted(#[case] from: TicketStatus, #[case] to: TicketStatus) {
        assert!(validate_transition(from, to).is_ok());
    }

    #[test]
    fn every_other_pair_is_rejected() {
        let legal = [(Pending, InProgress), (Pending, Cancelled), (InProgress, Completed)];
        for from in TicketStatus::iter() {
            for to in TicketStatus::iter() {
                let result = validate_transition(from, to);
                if legal.contains(&(from, to)) {
                    assert!(result.is_ok());
                } else {
                    match result {
                        Err(ServiceError::InvalidTransition { current, requested }) => {
                            assert_eq!((current, requested), (from, to));
                        }
                        other => panic!("{from} -> {to} should be rejected, got {other:?}"),
                    }
                }
            }
        }
    }

    #[rstest]
    #[case(Pending)]
    #[case(InProgress)]
    #[case(Completed)]
    #[case(Cancelled)]
    fn requesting_the_current_status_is_rejected(#[case] status: TicketStatus) {
        assert!(validate_transition(status, status).is_err());
    }

    #[test]
    fn allowed_transitions_agree_with_validation() {
        for from in TicketStatus::iter() {
            for to in TicketStatus::iter() {
                assert_eq!(
                    allowed_transitions(from).contains(&to),
                    validate_transition(from, to).is_ok()
                );
            }
        }
    }

    #[test]
    fn append_keeps_prior_entries_untouched() {
        let ticket = pending_ticket();
        let next = append_status_change(&ticket, InProgress, Some("รับงานแล้ว".into()));

        assert_eq!(next.status_history.len(), ticket.status_history.len() + 1);
        assert_eq!(next.status_history[..1], ticket.status_history[..]);
        assert_eq!(ticket.status, Pending);
        assert_eq!(next.status, InProgress);

        let last = next.status_history.last().unwrap();
        assert_eq!(last.old_status, Some(Pending));
        assert_eq!(last.notes.as_deref(), Some("รับงานแล้ว"));
    }

    #[test]
    fn append_never_moves_time_backwards() {
        let ticket = pending_ticket();
        let earlier = base_time() - Duration::hours(2);
        let next = append_status_change_at(&ticket, Cancelled, None, None, earlier);
        assert_eq!(next.status_history.last().unwrap().changed_at, base_time());
    }

    #[test]
    fn blank_notes_are_dropped() {
        for blank in ["", "  ", "\t\n"] {
            let next = append_status_change(&pending_ticket(), InProgress, Some(blank.into()));
            assert!(next.status_history.last().unwrap().notes.is_none());
        }

        let next = append_status_change(&pending_ticket(), InProgress, Some(" fan noisy ".into()));
        assert_eq!(
            next.status_history.last().unwrap().notes.as_deref(),
            Some(" fan noisy ")
        );
    }

    #[test]
    fn apply_transition_rejects_leaving_a_terminal_state() {
        let cancelled = apply_transition(&pending_ticket(), Cancelled, None).unwrap();
        let err = apply_transition(&cancelled, InProgress, None).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidTransition {
                current: Cancelled,
                requested: InProgress
            }
        ));
    }

    #[test]
    fn projection_defaults_to_pending_for_empty_history() {
        assert_eq!(project_current_status(&[]), Pending);
    }

    #[test]
    fn divergent_status_is_a_data_integrity_fault() {
        let mut ticket = pending_ticket();
        assert!(verify_status_consistency(&ticket).is_ok());

        ticket.status = Completed;
        assert!(matches!(
            verify_status_consistency(&ticket),
            Err(ServiceError::DataIntegrity(_))
        ));
        // reported, not repaired
        assert_eq!(ticket.status, Completed);
    }

    #[test]
    fn completion_timestamp_is_the_earliest_completed_entry() {
        let ticket = pending_ticket();
        assert_eq!(find_completion_timestamp(&ticket.status_history), None);

        let t1 = base_time() + Duration::hours(1);
        let t2 = base_time() + Duration::hours(3);
        let started = append_status_change_at(&ticket, InProgress, None, None, t1);
        let done = append_status_change_at(&started, Completed, None, None, t2);
        assert_eq!(find_completion_timestamp(&done.status_history), Some(t2));

        // malformed: a second Completed entry recorded out of order
        let mut history = done.status_history.clone();
        history.insert(
            1,
            StatusChangeEntry {
                old_status: Some(Pending),
                new_status: Completed,
                notes: None,
                changed_at: t1,
                changed_by: None,
            },
        );
        assert_eq!(find_completion_timestamp(&history), Some(t1));
    }

    #[test]
    fn self_cancel_only_while_pending() {
        let ticket = pending_ticket();
        assert!(can_self_cancel(&ticket));

        let started = apply_transition(&ticket, InProgress, None).unwrap();
        assert!(!can_self_cancel(&started));
        assert!(!can_admin_delete(&started));
    }

    #[test]
    fn admin_delete_only_when_cancelled() {
        let cancelled = apply_transition(&pending_ticket(), Cancelled, None).unwrap();
        assert!(can_admin_delete(&cancelled));
        assert!(!can_self_cancel(&cancelled));
    }

    #[test]
    fn quick_actions_follow_the_transition_table() {
        let ticket = pending_ticket();
        assert_eq!(
            QuickAction::available_for(&ticket),
            vec![QuickAction::Accept, QuickAction::Cancel]
        );

        let started = apply_transition(&ticket, InProgress, None).unwrap();
        assert_eq!(QuickAction::available_for(&started), vec![QuickAction::Complete]);

        let cancelled = apply_transition(&ticket, Cancelled, None).unwrap();
        assert_eq!(QuickAction::available_for(&cancelled), vec![QuickAction::Delete]);
    }

    #[test]
    fn quick_action_notes_match_the_admin_screen() {
        assert_eq!(QuickAction::Accept.default_notes(), Some("รับงานแล้ว"));
        assert_eq!(QuickAction::Cancel.default_notes(), Some("ยกเลิกโดย Admin"));
        assert_eq!(QuickAction::Complete.default_notes(), Some("ดำเนินการเสร็จสิ้น"));
        assert!(QuickAction::Delete.is_destructive());
        assert_eq!("accept".parse::<QuickAction>().unwrap(), QuickAction::Accept);
    }
}
