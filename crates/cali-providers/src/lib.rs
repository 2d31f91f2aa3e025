//! Google Calendar client, event mapping and authentication.
//!
//! ```text
//!  request schema ──► mapper ──► ApiEvent ──► CalendarClient ──► HTTP
//!                                                  │
//!                                            TokenSource
//!                                  (service account │ OAuth │ static)
//! ```
//!
//! Every failure is a [`ProviderError`] whose [`ErrorCategory`] tells callers
//! whether the event was missing, the input was rejected, the upstream
//! failed, the call was cancelled, or credentials are missing.

pub mod error;
pub mod google;
pub mod token_source;

pub use error::{ErrorCategory, ProviderError, ProviderErrorCode, ProviderResult};
pub use google::{AuthSettings, CalendarClient, ListStream, OAuthSettings};
pub use token_source::{AuthKind, BoxFuture, StaticToken, TokenSource};
