//! HTTP adapter for the repair backend.
//!
//! [`RepairApi`] is the seam the workflow service talks to;
//! [`RepairApiClient`] is the reqwest implementation. Every request carries
//! the bearer token when a session exists plus an `x-request-id`, and any 401
//! clears the session through [`SessionContext::force_logout`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    auth::{LoginRequest, LoginResponse, SessionContext},
    errors::{ApiOperation, ServiceError},
    models::{
        AvailableMonth, DailyStats, Department, EquipmentType, MonthlyStats, NewRepairTicket,
        RepairTicket, RequestNumber, StatusUpdate, TicketId, TicketStatus,
    },
    services::ticket_query::{SortField, SortOrder},
    ApiEnvelope, Paginated,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Query for `GET /admin/repair-requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminTicketFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_type: Option<EquipmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,
    pub page: u32,
    pub limit: u32,
}

impl Default for AdminTicketFilter {
    fn default() -> Self {
        Self {
            status: None,
            equipment_type: None,
            department: None,
            page: 1,
            limit: 10,
        }
    }
}

/// Query for `GET /reports/monthly-requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRequestsQuery {
    pub month: u32,
    pub year: i32,
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl MonthlyRequestsQuery {
    pub fn new(month: u32, year: i32) -> Self {
        Self {
            month,
            year,
            page: 1,
            limit: 20,
            sort_by: None,
            sort_order: None,
        }
    }
}

/// What `POST /repair-requests` hands back. Only the number is guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTicket {
    pub request_number: RequestNumber,
    #[serde(default, rename = "_id", alias = "id", skip_serializing_if = "Option::is_none")]
    pub id: Option<TicketId>,
    #[serde(default)]
    pub status: TicketStatus,
}

#[derive(Debug, Serialize)]
struct MonthParams {
    month: u32,
    year: i32,
}

#[derive(Debug, Serialize)]
struct DateParam {
    date: String,
}

/// Operations offered by the repair backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RepairApi: Send + Sync {
    async fn create_ticket(&self, ticket: &NewRepairTicket) -> Result<CreatedTicket, ServiceError>;

    async fn get_ticket(&self, number: &RequestNumber) -> Result<RepairTicket, ServiceError>;

    /// Reporter self-cancel. Returns the updated ticket when the server sends it.
    async fn cancel_ticket(&self, id: &TicketId) -> Result<Option<RepairTicket>, ServiceError>;

    async fn list_tickets(
        &self,
        filter: &AdminTicketFilter,
    ) -> Result<Paginated<RepairTicket>, ServiceError>;

    async fn update_status(
        &self,
        id: &TicketId,
        update: &StatusUpdate,
    ) -> Result<Option<RepairTicket>, ServiceError>;

    async fn delete_ticket(&self, id: &TicketId) -> Result<(), ServiceError>;

    async fn daily_dashboard(&self, date: NaiveDate) -> Result<DailyStats, ServiceError>;

    async fn monthly_stats(&self, month: u32, year: i32) -> Result<MonthlyStats, ServiceError>;

    async fn monthly_requests(
        &self,
        query: &MonthlyRequestsQuery,
    ) -> Result<Paginated<RepairTicket>, ServiceError>;

    async fn available_months(&self) -> Result<Vec<AvailableMonth>, ServiceError>;

    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ServiceError>;

    async fn logout(&self) -> Result<(), ServiceError>;
}

/// reqwest-backed [`RepairApi`].
#[derive(Debug, Clone)]
pub struct RepairApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionContext>,
}

impl RepairApiClient {
    /// No request timeout is configured; calls wait for the server.
    pub fn new(base_url: &str, session: Arc<SessionContext>) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("hotel-repair-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http_client(http, base_url, session)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: &str,
        session: Arc<SessionContext>,
    ) -> Result<Self, ServiceError> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ServiceError::InvalidInput(format!("invalid API URL '{base_url}': {e}")))?;

        Ok(Self {
            http,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidInput(format!("API URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> (RequestBuilder, String) {
        let request_id = Uuid::new_v4().to_string();
        let mut builder = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, &request_id);
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        (builder, request_id)
    }

    /// Sends the request and turns any non-2xx answer into a [`ServiceError`].
    async fn execute(
        &self,
        builder: RequestBuilder,
        request_id: &str,
        operation: ApiOperation,
    ) -> Result<Response, ServiceError> {
        let response = builder.send().await.map_err(|e| {
            warn!(%operation, request_id, error = %e, "request failed before a response arrived");
            ServiceError::from(e)
        })?;

        let status = response.status();
        debug!(%operation, request_id, status = status.as_u16(), "response received");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = ServiceError::from_response(status, &body, operation);
        if err.is_unauthorized() {
            self.session.force_logout(&err.to_string());
        }
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        request_id: &str,
        operation: ApiOperation,
    ) -> Result<T, ServiceError> {
        let response = self.execute(builder, request_id, operation).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(%operation, request_id, error = %e, "unexpected response body");
            ServiceError::from(e)
        })
    }

    async fn send_data<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        request_id: &str,
        operation: ApiOperation,
    ) -> Result<T, ServiceError> {
        let envelope: ApiEnvelope<T> = self.send_json(builder, request_id, operation).await?;
        Ok(envelope.data)
    }

    /// For endpoints that may or may not echo the ticket back.
    async fn send_optional_ticket(
        &self,
        builder: RequestBuilder,
        request_id: &str,
        operation: ApiOperation,
    ) -> Result<Option<RepairTicket>, ServiceError> {
        let response = self.execute(builder, request_id, operation).await?;
        let bytes = response.bytes().await?;
        let data = serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|mut body| body.get_mut("data").map(serde_json::Value::take))
            .filter(|data| !data.is_null());
        let Some(data) = data else {
            return Ok(None);
        };

        match serde_json::from_value::<RepairTicket>(data) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(e) => {
                warn!(%operation, request_id, error = %e, "echoed ticket did not decode; using local projection");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl RepairApi for RepairApiClient {
    #[instrument(skip(self, ticket), fields(department = %ticket.department, equipment = %ticket.equipment_type))]
    async fn create_ticket(&self, ticket: &NewRepairTicket) -> Result<CreatedTicket, ServiceError> {
        let url = self.endpoint(&["repair-requests"])?;
        let (builder, request_id) = self.request(Method::POST, url);
        self.send_data(builder.json(ticket), &request_id, ApiOperation::CreateTicket)
            .await
    }

    #[instrument(skip(self), fields(request_number = %number))]
    async fn get_ticket(&self, number: &RequestNumber) -> Result<RepairTicket, ServiceError> {
        let url = self.endpoint(&["repair-requests", number.as_str()])?;
        let (builder, request_id) = self.request(Method::GET, url);
        self.send_data(builder, &request_id, ApiOperation::TrackTicket)
            .await
    }

    #[instrument(skip(self), fields(ticket_id = %id))]
    async fn cancel_ticket(&self, id: &TicketId) -> Result<Option<RepairTicket>, ServiceError> {
        let url = self.endpoint(&["repair-requests", id.as_str(), "cancel"])?;
        let (builder, request_id) = self.request(Method::POST, url);
        self.send_optional_ticket(builder, &request_id, ApiOperation::CancelTicket)
            .await
    }

    #[instrument(skip(self))]
    async fn list_tickets(
        &self,
        filter: &AdminTicketFilter,
    ) -> Result<Paginated<RepairTicket>, ServiceError> {
        let url = self.endpoint(&["admin", "repair-requests"])?;
        let (builder, request_id) = self.request(Method::GET, url);
        self.send_json(builder.query(filter), &request_id, ApiOperation::ListTickets)
            .await
    }

    #[instrument(skip(self, update), fields(ticket_id = %id, status = %update.status))]
    async fn update_status(
        &self,
        id: &TicketId,
        update: &StatusUpdate,
    ) -> Result<Option<RepairTicket>, ServiceError> {
        let url = self.endpoint(&["admin", "repair-requests", id.as_str()])?;
        let (builder, request_id) = self.request(Method::PATCH, url);
        self.send_optional_ticket(builder.json(update), &request_id, ApiOperation::UpdateStatus)
            .await
    }

    #[instrument(skip(self), fields(ticket_id = %id))]
    async fn delete_ticket(&self, id: &TicketId) -> Result<(), ServiceError> {
        let url = self.endpoint(&["admin", "repair-requests", id.as_str()])?;
        let (builder, request_id) = self.request(Method::DELETE, url);
        self.execute(builder, &request_id, ApiOperation::DeleteTicket)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn daily_dashboard(&self, date: NaiveDate) -> Result<DailyStats, ServiceError> {
        let url = self.endpoint(&["admin", "dashboard", "daily"])?;
        let (builder, request_id) = self.request(Method::GET, url);
        let params = DateParam {
            date: date.format("%Y-%m-%d").to_string(),
        };
        self.send_data(builder.query(&params), &request_id, ApiOperation::DailyDashboard)
            .await
    }

    #[instrument(skip(self))]
    async fn monthly_stats(&self, month: u32, year: i32) -> Result<MonthlyStats, ServiceError> {
        let url = self.endpoint(&["reports", "monthly-stats"])?;
        let (builder, request_id) = self.request(Method::GET, url);
        self.send_data(
            builder.query(&MonthParams { month, year }),
            &request_id,
            ApiOperation::MonthlyStats,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn monthly_requests(
        &self,
        query: &MonthlyRequestsQuery,
    ) -> Result<Paginated<RepairTicket>, ServiceError> {
        let url = self.endpoint(&["reports", "monthly-requests"])?;
        let (builder, request_id) = self.request(Method::GET, url);
        self.send_json(builder.query(query), &request_id, ApiOperation::MonthlyRequests)
            .await
    }

    #[instrument(skip(self))]
    async fn available_months(&self) -> Result<Vec<AvailableMonth>, ServiceError> {
        let url = self.endpoint(&["reports", "available-months"])?;
        let (builder, request_id) = self.request(Method::GET, url);
        self.send_data(builder, &request_id, ApiOperation::AvailableMonths)
            .await
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ServiceError> {
        let url = self.endpoint(&["auth", "login"])?;
        let (builder, request_id) = self.request(Method::POST, url);
        self.send_json(builder.json(credentials), &request_id, ApiOperation::Login)
            .await
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), ServiceError> {
        let url = self.endpoint(&["auth", "logout"])?;
        let (builder, request_id) = self.request(Method::POST, url);
        self.execute(builder, &request_id, ApiOperation::Logout)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RepairApiClient {
        RepairApiClient::new(base, Arc::new(SessionContext::in_memory())).unwrap()
    }

    #[test]
    fn endpoints_keep_the_api_prefix() {
        let api = client("https://hotel-repair-backend.onrender.com/api");
        let url = api.endpoint(&["repair-requests", "IT-0001"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://hotel-repair-backend.onrender.com/api/repair-requests/IT-0001"
        );

        let trailing = client("http://localhost:5000/api/");
        assert_eq!(
            trailing.endpoint(&["auth", "login"]).unwrap().as_str(),
            "http://localhost:5000/api/auth/login"
        );
    }

    #[test]
    fn path_segments_are_escaped() {
        let api = client("http://localhost:5000/api");
        let url = api.endpoint(&["admin", "repair-requests", "a/b"]).unwrap();
        assert!(url.as_str().ends_with("/admin/repair-requests/a%2Fb"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = RepairApiClient::new("not a url", Arc::new(SessionContext::in_memory()));
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[test]
    fn admin_filter_omits_unset_fields() {
        let filter = AdminTicketFilter {
            status: Some(TicketStatus::Pending),
            ..AdminTicketFilter::default()
        };
        let value = serde_json::to_value(&filter).unwrap();
        assert_eq!(value["status"], "รอดำเนินการ");
        assert!(value.get("department").is_none());
        assert_eq!(value["limit"], 10);
    }

    #[test]
    fn created_ticket_accepts_number_only() {
        let created: CreatedTicket =
            serde_json::from_str(r#"{"requestNumber":"FO-0012"}"#).unwrap();
        assert_eq!(created.request_number.as_str(), "FO-0012");
        assert!(created.id.is_none());
        assert_eq!(created.status, TicketStatus::Pending);
    }
}
