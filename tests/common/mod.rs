#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use hotel_repair_client::{
    auth::{AdminUser, MemorySessionStore, Session, SessionContext},
    client::RepairApiClient,
    models::{
        Department, EquipmentType, RepairTicket, RequestNumber, StatusChangeEntry, TicketId,
        TicketStatus,
    },
    services::{lifecycle, tickets::TicketService},
};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

/// Mock backend plus a client stack pointed at it.
pub struct TestBackend {
    pub server: MockServer,
    pub session: Arc<SessionContext>,
    pub client: Arc<RepairApiClient>,
    pub service: TicketService,
}

impl TestBackend {
    pub async fn start() -> Self {
        Self::with_session(SessionContext::in_memory()).await
    }

    pub async fn start_logged_in() -> Self {
        let store = Arc::new(MemorySessionStore::with_session(Session::new(TOKEN, admin())));
        Self::with_session(SessionContext::load(store).expect("memory store loads")).await
    }

    async fn with_session(session: SessionContext) -> Self {
        let server = MockServer::start().await;
        let session = Arc::new(session);
        let client = Arc::new(
            RepairApiClient::new(&format!("{}/api", server.uri()), session.clone())
                .expect("client builds"),
        );
        let service = TicketService::new(client.clone(), session.clone());
        Self {
            server,
            session,
            client,
            service,
        }
    }
}

pub fn admin() -> AdminUser {
    AdminUser {
        id: Some("admin-1".into()),
        username: "admin".into(),
        full_name: Some("Night Manager".into()),
        role: Some("admin".into()),
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

/// Wire form of a ticket as the backend serves it.
pub fn ticket_json(number: &str, status: TicketStatus, history: Vec<Value>) -> Value {
    json!({
        "_id": format!("id-{number}"),
        "requestNumber": number,
        "equipmentType": "Computer",
        "department": "IT",
        "title": "Computer will not start",
        "problemDescription": "No power light",
        "reporterName": "Malee",
        "location": "Back office",
        "status": status.label(),
        "statusHistory": history,
        "createdAt": base_time().to_rfc3339(),
    })
}

pub fn history_entry(
    old: Option<TicketStatus>,
    new: TicketStatus,
    notes: Option<&str>,
    hours_after_creation: i64,
) -> Value {
    let mut entry = json!({
        "newStatus": new.label(),
        "changedAt": (base_time() + Duration::hours(hours_after_creation)).to_rfc3339(),
    });
    if let Some(old) = old {
        entry["oldStatus"] = json!(old.label());
    }
    if let Some(notes) = notes {
        entry["notes"] = json!(notes);
    }
    entry
}

pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

/// In-memory pending ticket with its opening history entry.
pub fn pending_ticket(number: &str, department: Department, equipment: EquipmentType) -> RepairTicket {
    RepairTicket {
        id: TicketId::new(format!("id-{number}")),
        request_number: number.parse::<RequestNumber>().expect("valid request number"),
        equipment_type: equipment,
        department,
        title: "Broken".into(),
        problem_description: "Broken".into(),
        reporter_name: "Reporter".into(),
        location: None,
        status: TicketStatus::Pending,
        status_history: vec![StatusChangeEntry {
            old_status: None,
            new_status: TicketStatus::Pending,
            notes: None,
            changed_at: base_time(),
            changed_by: None,
        }],
        created_at: base_time(),
        updated_at: None,
        assigned_to: None,
    }
}

/// Applies `requests` in order, ignoring the ones the lifecycle rejects.
pub fn replay(mut ticket: RepairTicket, requests: &[TicketStatus]) -> RepairTicket {
    for &status in requests {
        if let Ok(next) = lifecycle::apply_transition(&ticket, status, None) {
            ticket = next;
        }
    }
    ticket
}
