//! Google Calendar integration.
//!
//! - [`CalendarClient`]: create, get, update, delete and list events against
//!   the Calendar API v3 (or any endpoint speaking the same REST surface).
//! - [`mapper`]: conversion between the request/response schema and API events.
//! - Authentication: [`OAuthSession`] for the browser-based user flow,
//!   [`ServiceAccountSource`] for service account keys, selected by
//!   [`AuthSettings::token_source`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cali_providers::{CalendarClient, StaticToken};
//!
//! let client = CalendarClient::new(Arc::new(StaticToken::new("token")))?
//!     .with_endpoint("http://127.0.0.1:8080/calendar/v3");
//! let event = client.get_event(&GetEventRequest { event_id: "event1".into(), calendar_id: None }).await?;
//! ```

pub mod api;
mod client;
mod config;
mod credentials;
pub mod mapper;
mod oauth;
mod service_account;
mod session;
mod tokens;

pub use client::{CALENDAR_API_BASE, CalendarClient, ListStream, list_query, resolve_time_bounds};
pub use config::{CALENDAR_SCOPE, OAuthConfig, OAuthCredentials};
pub use credentials::{AuthSettings, CredentialType, OAuthSettings, detect_credential_type};
pub use oauth::{CALLBACK_PATH, OAuthClient, PkceFlow, TokenResponse};
pub use service_account::{ServiceAccountKey, ServiceAccountSource};
pub use session::{OAuthSession, SessionState};
pub use tokens::{EXPIRY_BUFFER_SECS, TokenInfo, TokenStorage};
