//! Output rendering for command results.
//!
//! Every command result can be rendered as JSON or YAML. iCalendar output is
//! only meaningful for events, so [`Output::render`] rejects it for the
//! add/update/delete acknowledgements.
//!
//! ```rust
//! use cali_core::format::{Output, OutputFormat};
//! use cali_core::DeleteEventResponse;
//!
//! let ack = DeleteEventResponse::deleted("primary");
//! let text = Output::Deleted(&ack).render(OutputFormat::Json).unwrap();
//! assert!(text.contains("\"success\": true"));
//! ```

mod ical;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{AddEventResponse, DeleteEventResponse, Event, EventPage, UpdateEventResponse};

pub use ical::{NEXT_ANCHOR_PROPERTY, to_icalendar};

/// Output format selected with `--format` or the `format` config key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    /// RFC 5545 calendar (events only).
    Ical,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Ical => "ical",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} results cannot be rendered as iCalendar (use json or yaml)")]
    IcalUnsupported(&'static str),
}

/// A renderable command result.
#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    Added(&'a AddEventResponse),
    Updated(&'a UpdateEventResponse),
    Deleted(&'a DeleteEventResponse),
    Event(&'a Event),
    Page(&'a EventPage),
}

impl Output<'_> {
    fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "add",
            Self::Updated(_) => "update",
            Self::Deleted(_) => "delete",
            Self::Event(_) => "get",
            Self::Page(_) => "list",
        }
    }

    /// Renders the result. The returned text ends with a newline.
    pub fn render(&self, format: OutputFormat) -> Result<String, FormatError> {
        let mut text = match format {
            OutputFormat::Json => match self {
                Self::Added(v) => serde_json::to_string_pretty(v)?,
                Self::Updated(v) => serde_json::to_string_pretty(v)?,
                Self::Deleted(v) => serde_json::to_string_pretty(v)?,
                Self::Event(v) => serde_json::to_string_pretty(v)?,
                Self::Page(v) => serde_json::to_string_pretty(v)?,
            },
            OutputFormat::Yaml => match self {
                Self::Added(v) => serde_yaml::to_string(v)?,
                Self::Updated(v) => serde_yaml::to_string(v)?,
                Self::Deleted(v) => serde_yaml::to_string(v)?,
                Self::Event(v) => serde_yaml::to_string(v)?,
                Self::Page(v) => serde_yaml::to_string(v)?,
            },
            OutputFormat::Ical => match self {
                Self::Event(event) => to_icalendar(std::slice::from_ref(*event), None),
                Self::Page(page) => to_icalendar(&page.events, page.next_anchor.as_deref()),
                other => return Err(FormatError::IcalUnsupported(other.kind())),
            },
        };
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }
}
