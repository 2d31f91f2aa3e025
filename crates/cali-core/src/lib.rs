//! Core types shared by every `cali` crate: the event request/response
//! schema, time helpers, output rendering and tracing setup.

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{
    AddEventRequest, AddEventResponse, DEFAULT_CALENDAR_ID, DeleteEventRequest,
    DeleteEventResponse, Event, EventPage, GetEventRequest, ListEventsRequest, ListEventsResponse,
    UpdateEventRequest, UpdateEventResponse, resolve_calendar_id,
};
pub use format::{FormatError, Output, OutputFormat};
pub use time::{EventTime, TimeBounds, TimestampError};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
