use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::{
    auth::{AdminUser, LoginRequest, Session, SessionContext},
    client::{AdminTicketFilter, CreatedTicket, MonthlyRequestsQuery, RepairApi},
    errors::ServiceError,
    models::{
        AvailableMonth, DailyStats, NewRepairTicket, RepairTicket, RequestNumber, StatusUpdate,
        TicketId, TicketStatus,
    },
    reports::MonthlyReport,
    services::{
        lifecycle::{self, QuickAction},
        request_sequencer::{InFlightRegistry, RequestSequencer},
    },
    Paginated,
};

const LOGIN_REQUIRED: &str = "กรุณาเข้าสู่ระบบ";
const DELETE_ONLY_CANCELLED: &str = "ลบได้เฉพาะรายการที่ยกเลิกแล้ว";

/// Result of a quick action on the admin list.
#[derive(Debug, Clone, PartialEq)]
pub enum QuickActionOutcome {
    Updated(RepairTicket),
    Deleted(TicketId),
}

/// Ticket workflows: the public reporter flows and the admin triage flows.
///
/// Every status change is checked against the lifecycle before it is sent,
/// so an invalid move never reaches the backend.
#[derive(Clone)]
pub struct TicketService {
    api: Arc<dyn RepairApi>,
    session: Arc<SessionContext>,
    sequencer: RequestSequencer,
    in_flight: InFlightRegistry,
}

impl TicketService {
    pub fn new(api: Arc<dyn RepairApi>, session: Arc<SessionContext>) -> Self {
        Self {
            api,
            session,
            sequencer: RequestSequencer::new(),
            in_flight: InFlightRegistry::new(),
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn require_admin(&self) -> Result<(), ServiceError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized(LOGIN_REQUIRED.to_string()))
        }
    }

    /// Submits a new repair request and returns its assigned number.
    #[instrument(skip(self, draft))]
    pub async fn submit_ticket(&self, draft: NewRepairTicket) -> Result<CreatedTicket, ServiceError> {
        let draft = draft.normalized();
        draft.validate()?;

        let _guard = self.in_flight.try_acquire("create")?;
        let created = self.api.create_ticket(&draft).await?;
        info!(request_number = %created.request_number, "repair request submitted");
        Ok(created)
    }

    /// Looks a ticket up by its request number, case-insensitively.
    ///
    /// A ticket whose stored status disagrees with its history is reported as
    /// [`ServiceError::DataIntegrity`] instead of being shown.
    #[instrument(skip(self))]
    pub async fn track_ticket(&self, raw_number: &str) -> Result<RepairTicket, ServiceError> {
        let number: RequestNumber = raw_number.parse()?;
        let ticket = self.api.get_ticket(&number).await?;
        lifecycle::verify_status_consistency(&ticket)?;
        Ok(ticket)
    }

    /// Reporter self-cancel; only Pending tickets qualify.
    #[instrument(skip(self, ticket), fields(request_number = %ticket.request_number))]
    pub async fn cancel_own_ticket(&self, ticket: &RepairTicket) -> Result<RepairTicket, ServiceError> {
        if !lifecycle::can_self_cancel(ticket) {
            return Err(ServiceError::InvalidTransition {
                current: ticket.status,
                requested: TicketStatus::Cancelled,
            });
        }
        let expected = lifecycle::apply_transition(ticket, TicketStatus::Cancelled, None)?;

        let _guard = self.in_flight.try_acquire(&format!("cancel:{}", ticket.id))?;
        let updated = self.api.cancel_ticket(&ticket.id).await?;
        info!("repair request cancelled by reporter");
        Ok(updated.unwrap_or(expected))
    }

    /// Admin listing. `None` means a newer listing request superseded this one.
    #[instrument(skip(self))]
    pub async fn list_tickets(
        &self,
        filter: &AdminTicketFilter,
    ) -> Result<Option<Paginated<RepairTicket>>, ServiceError> {
        self.require_admin()?;
        let token = self.sequencer.begin("admin-list");
        let result = self.api.list_tickets(filter).await;
        self.sequencer.settle(&token, result)
    }

    /// Admin status change with an optional note.
    #[instrument(skip(self, ticket, notes), fields(request_number = %ticket.request_number))]
    pub async fn update_status(
        &self,
        ticket: &RepairTicket,
        new_status: TicketStatus,
        notes: Option<String>,
    ) -> Result<RepairTicket, ServiceError> {
        self.require_admin()?;
        let expected = lifecycle::apply_transition(ticket, new_status, notes.clone())?;

        let _guard = self.in_flight.try_acquire(&format!("update:{}", ticket.id))?;
        let update = StatusUpdate {
            status: new_status,
            notes: notes.filter(|n| !n.trim().is_empty()),
        };
        let updated = self.api.update_status(&ticket.id, &update).await?;
        info!(from = %ticket.status, to = %new_status, "ticket status updated");
        Ok(updated.unwrap_or(expected))
    }

    /// Permanently removes a cancelled ticket.
    #[instrument(skip(self, ticket), fields(request_number = %ticket.request_number))]
    pub async fn delete_ticket(&self, ticket: &RepairTicket) -> Result<(), ServiceError> {
        self.require_admin()?;
        if !lifecycle::can_admin_delete(ticket) {
            return Err(ServiceError::ValidationError(DELETE_ONLY_CANCELLED.to_string()));
        }

        let _guard = self.in_flight.try_acquire(&format!("delete:{}", ticket.id))?;
        self.api.delete_ticket(&ticket.id).await?;
        info!("ticket deleted");
        Ok(())
    }

    /// Runs one of the list page's one-click actions.
    pub async fn quick_action(
        &self,
        ticket: &RepairTicket,
        action: QuickAction,
    ) -> Result<QuickActionOutcome, ServiceError> {
        match action.target_status() {
            Some(status) => {
                let notes = action.default_notes().map(str::to_string);
                let updated = self.update_status(ticket, status, notes).await?;
                Ok(QuickActionOutcome::Updated(updated))
            }
            None => {
                self.delete_ticket(ticket).await?;
                Ok(QuickActionOutcome::Deleted(ticket.id.clone()))
            }
        }
    }

    /// Authenticates and stores the session.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn login(&self, credentials: LoginRequest) -> Result<AdminUser, ServiceError> {
        credentials.validate()?;
        let response = self.api.login(&credentials).await?;
        let admin = response.admin.clone();
        self.session.set(Session::from(response))?;
        Ok(admin)
    }

    /// Ends the session. Local state is cleared even if the server call fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ServiceError> {
        if self.session.is_authenticated() {
            if let Err(err) = self.api.logout().await {
                warn!(error = %err, "server logout failed; clearing local session anyway");
            }
        }
        self.session.clear()
    }

    /// Dashboard figures for one day. `None` when superseded.
    #[instrument(skip(self))]
    pub async fn daily_dashboard(&self, date: NaiveDate) -> Result<Option<DailyStats>, ServiceError> {
        self.require_admin()?;
        let token = self.sequencer.begin("dashboard");
        let result = self.api.daily_dashboard(date).await;
        self.sequencer.settle(&token, result)
    }

    /// Monthly report header figures. `None` when superseded.
    #[instrument(skip(self))]
    pub async fn monthly_report(
        &self,
        month: u32,
        year: i32,
    ) -> Result<Option<MonthlyReport>, ServiceError> {
        self.require_admin()?;
        if !(1..=12).contains(&month) {
            return Err(ServiceError::InvalidInput(format!("month {month} is out of range")));
        }
        let token = self.sequencer.begin("monthly-report");
        let result = self.api.monthly_stats(month, year).await;
        Ok(self
            .sequencer
            .settle(&token, result)?
            .map(|stats| MonthlyReport::from_stats(&stats)))
    }

    #[instrument(skip(self))]
    pub async fn monthly_requests(
        &self,
        query: &MonthlyRequestsQuery,
    ) -> Result<Option<Paginated<RepairTicket>>, ServiceError> {
        self.require_admin()?;
        let token = self.sequencer.begin("monthly-requests");
        let result = self.api.monthly_requests(query).await;
        self.sequencer.settle(&token, result)
    }

    pub async fn available_months(&self) -> Result<Vec<AvailableMonth>, ServiceError> {
        self.require_admin()?;
        self.api.available_months().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{LoginResponse, MemorySessionStore, SessionStore},
        client::MockRepairApi,
        models::{Department, EquipmentType},
        testing::{advance, at, ticket},
        Pagination,
    };
    use assert_matches::assert_matches;
    use mockall::predicate::eq;

    fn admin() -> AdminUser {
        AdminUser {
            id: Some("a1".into()),
            username: "admin".into(),
            full_name: None,
            role: None,
        }
    }

    fn logged_in() -> Arc<SessionContext> {
        let store = Arc::new(MemorySessionStore::with_session(Session::new("tok", admin())));
        Arc::new(SessionContext::load(store).unwrap())
    }

    fn pending() -> RepairTicket {
        ticket("IT-0001", Department::It, EquipmentType::Computer, at(2026, 3, 1, 8))
    }

    fn service(api: MockRepairApi, session: Arc<SessionContext>) -> TicketService {
        TicketService::new(Arc::new(api), session)
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_the_server() {
        let mut api = MockRepairApi::new();
        api.expect_create_ticket().never();

        let svc = service(api, Arc::new(SessionContext::in_memory()));
        let result = svc.submit_ticket(NewRepairTicket::default()).await;
        assert_matches!(result, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn submit_sends_trimmed_draft() {
        let mut api = MockRepairApi::new();
        api.expect_create_ticket()
            .withf(|draft| draft.title == "Printer jam" && draft.location.is_none())
            .times(1)
            .returning(|_| {
                Ok(CreatedTicket {
                    request_number: "IT-0010".parse().unwrap(),
                    id: None,
                    status: TicketStatus::Pending,
                })
            });

        let svc = service(api, Arc::new(SessionContext::in_memory()));
        let created = svc
            .submit_ticket(NewRepairTicket {
                equipment_type: EquipmentType::Printer,
                department: Department::It,
                title: "  Printer jam ".into(),
                problem_description: "Paper stuck".into(),
                reporter_name: "Malee".into(),
                location: Some(" ".into()),
            })
            .await
            .unwrap();
        assert_eq!(created.request_number.as_str(), "IT-0010");
    }

    #[tokio::test]
    async fn track_uppercases_the_number() {
        let mut api = MockRepairApi::new();
        let expected: RequestNumber = "IT-0001".parse().unwrap();
        api.expect_get_ticket()
            .with(eq(expected))
            .times(1)
            .returning(|_| Ok(pending()));

        let svc = service(api, Arc::new(SessionContext::in_memory()));
        let found = svc.track_ticket("it-0001").await.unwrap();
        assert_eq!(found.status, TicketStatus::Pending);
    }

    #[tokio::test]
    async fn track_reports_divergent_history() {
        let mut api = MockRepairApi::new();
        api.expect_get_ticket().returning(|_| {
            let mut broken = pending();
            broken.status = TicketStatus::Completed;
            Ok(broken)
        });

        let svc = service(api, Arc::new(SessionContext::in_memory()));
        assert_matches!(
            svc.track_ticket("IT-0001").await,
            Err(ServiceError::DataIntegrity(_))
        );
    }

    #[tokio::test]
    async fn malformed_number_is_rejected_locally() {
        let mut api = MockRepairApi::new();
        api.expect_get_ticket().never();
        let svc = service(api, Arc::new(SessionContext::in_memory()));
        assert_matches!(svc.track_ticket("hello").await, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn self_cancel_of_in_progress_ticket_is_refused() {
        let mut api = MockRepairApi::new();
        api.expect_cancel_ticket().never();

        let svc = service(api, Arc::new(SessionContext::in_memory()));
        let started = advance(pending(), TicketStatus::InProgress);
        assert_matches!(
            svc.cancel_own_ticket(&started).await,
            Err(ServiceError::InvalidTransition {
                current: TicketStatus::InProgress,
                requested: TicketStatus::Cancelled
            })
        );
    }

    #[tokio::test]
    async fn self_cancel_falls_back_to_local_projection() {
        let mut api = MockRepairApi::new();
        api.expect_cancel_ticket().times(1).returning(|_| Ok(None));

        let svc = service(api, Arc::new(SessionContext::in_memory()));
        let cancelled = svc.cancel_own_ticket(&pending()).await.unwrap();
        assert_eq!(cancelled.status, TicketStatus::Cancelled);
        assert_eq!(cancelled.status_history.len(), 2);
    }

    #[tokio::test]
    async fn admin_calls_require_a_session() {
        let mut api = MockRepairApi::new();
        api.expect_list_tickets().never();

        let svc = service(api, Arc::new(SessionContext::in_memory()));
        assert_matches!(
            svc.list_tickets(&AdminTicketFilter::default()).await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn invalid_transition_is_not_sent() {
        let mut api = MockRepairApi::new();
        api.expect_update_status().never();

        let svc = service(api, logged_in());
        let done = advance(pending(), TicketStatus::Completed);
        assert_matches!(
            svc.update_status(&done, TicketStatus::Pending, None).await,
            Err(ServiceError::InvalidTransition { .. })
        );
    }

    #[tokio::test]
    async fn accept_quick_action_sends_canned_note() {
        let mut api = MockRepairApi::new();
        api.expect_update_status()
            .withf(|id, update| {
                id.as_str() == "id-IT-0001"
                    && update.status == TicketStatus::InProgress
                    && update.notes.as_deref() == Some("รับงานแล้ว")
            })
            .times(1)
            .returning(|_, _| Ok(None));

        let svc = service(api, logged_in());
        let outcome = svc.quick_action(&pending(), QuickAction::Accept).await.unwrap();
        assert_matches!(outcome, QuickActionOutcome::Updated(t) if t.status == TicketStatus::InProgress);
    }

    #[tokio::test]
    async fn delete_requires_cancelled_ticket() {
        let mut api = MockRepairApi::new();
        api.expect_delete_ticket().times(1).returning(|_| Ok(()));

        let svc = service(api, logged_in());
        assert_matches!(
            svc.quick_action(&pending(), QuickAction::Delete).await,
            Err(ServiceError::ValidationError(_))
        );

        let cancelled = advance(pending(), TicketStatus::Cancelled);
        let outcome = svc.quick_action(&cancelled, QuickAction::Delete).await.unwrap();
        assert_eq!(outcome, QuickActionOutcome::Deleted(cancelled.id.clone()));
    }

    #[tokio::test]
    async fn login_stores_session_and_logout_clears_it_even_on_failure() {
        let mut api = MockRepairApi::new();
        api.expect_login().times(1).returning(|_| {
            Ok(LoginResponse {
                token: "fresh".into(),
                admin: admin(),
            })
        });
        api.expect_logout()
            .times(1)
            .returning(|| Err(ServiceError::NetworkError("offline".into())));

        let store = Arc::new(MemorySessionStore::new());
        let session = Arc::new(SessionContext::load(store.clone()).unwrap());
        let svc = service(api, session.clone());

        let who = svc.login(LoginRequest::new("admin", "secret")).await.unwrap();
        assert_eq!(who.username, "admin");
        assert_eq!(session.token().as_deref(), Some("fresh"));
        assert!(store.load().unwrap().is_some());

        svc.logout().await.unwrap();
        assert!(!session.is_authenticated());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn listing_returns_server_page() {
        let mut api = MockRepairApi::new();
        api.expect_list_tickets()
            .withf(|filter| filter.status == Some(TicketStatus::Pending) && filter.limit == 10)
            .returning(|_| {
                Ok(Paginated {
                    data: vec![pending()],
                    pagination: Pagination::new(1, 10, 1),
                })
            });

        let svc = service(api, logged_in());
        let filter = AdminTicketFilter {
            status: Some(TicketStatus::Pending),
            ..AdminTicketFilter::default()
        };
        let page = svc.list_tickets(&filter).await.unwrap().unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.pagination.total_pages, 1);
    }

    #[tokio::test]
    async fn month_out_of_range_is_rejected() {
        let mut api = MockRepairApi::new();
        api.expect_monthly_stats().never();
        let svc = service(api, logged_in());
        assert_matches!(svc.monthly_report(13, 2026).await, Err(ServiceError::InvalidInput(_)));
    }
}
