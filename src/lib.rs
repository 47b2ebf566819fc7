//! Hotel Repair Client Library
//!
//! Typed client for the hotel IT repair-request backend: the ticket
//! lifecycle contract, query and aggregation helpers used by the admin
//! dashboard and reports, the admin session, and an HTTP adapter.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod reports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};

/// Standard backend response wrapper: `{ success, data, message }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Paging metadata as returned alongside list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = total.div_ceil(u64::from(limit));
        Self {
            page: page.max(1),
            limit,
            total,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// One page of results plus its paging metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Commonly used types.
pub mod prelude {
    pub use crate::auth::session::{
        FileSessionStore, MemorySessionStore, Session, SessionContext, SessionStore,
    };
    pub use crate::auth::{AdminUser, LoginRequest, LoginResponse};
    pub use crate::client::{AdminTicketFilter, MonthlyRequestsQuery, RepairApi, RepairApiClient};
    pub use crate::config::AppConfig;
    pub use crate::errors::{ApiOperation, ServiceError};
    pub use crate::models::*;
    pub use crate::services::lifecycle::QuickAction;
    pub use crate::services::tickets::TicketService;
    pub use crate::{ApiEnvelope, Paginated, Pagination};
}
