//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use cali_core::time::parse_timestamp_arg;
use cali_core::{
    AddEventRequest, DeleteEventRequest, GetEventRequest, ListEventsRequest, OutputFormat,
    TimestampError, UpdateEventRequest,
};

/// cali - Google Calendar from the command line
#[derive(Debug, Parser)]
#[command(name = "cali")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "CALI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Output format (defaults to the `format` config key, then json)
    #[arg(long, short, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Path to the daemon socket
    #[arg(long = "socket", global = true, env = "CALI_SOCKET")]
    pub socket_path: Option<PathBuf>,

    /// Route calendar commands through the running daemon
    #[arg(long, short, global = true)]
    pub daemon: bool,

    /// Daemon connection timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an event
    Add(AddArgs),

    /// Patch an existing event; only the given fields change
    Update(UpdateArgs),

    /// Show one event
    Get(EventRef),

    /// Delete an event
    Delete(EventRef),

    /// List events
    List(ListArgs),

    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Start the daemon in the foreground
    Server,

    /// Show daemon status
    Status,

    /// Check that the daemon is reachable
    Ping,
}

impl Command {
    /// Whether the command talks to the calendar API.
    pub fn is_calendar(&self) -> bool {
        matches!(
            self,
            Self::Add(_) | Self::Update(_) | Self::Get(_) | Self::Delete(_) | Self::List(_)
        )
    }
}

/// Optional event fields shared by `add` and `update`.
#[derive(Debug, Clone, Default, Args)]
pub struct EventFields {
    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Start time (RFC3339)
    #[arg(long)]
    pub start: Option<String>,

    /// End time (RFC3339)
    #[arg(long)]
    pub end: Option<String>,

    /// Calendar id (defaults to the `calendar_id` config key, then "primary")
    #[arg(long)]
    pub calendar: Option<String>,

    #[arg(long, value_name = "BOOL")]
    pub guests_can_see_other_guests: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub guests_can_modify: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub guests_can_invite_others: Option<bool>,

    /// Title of the source the event links back to
    #[arg(long)]
    pub source_title: Option<String>,

    #[arg(long)]
    pub source_url: Option<String>,

    /// Mark the slot as busy
    #[arg(long, value_name = "BOOL")]
    pub blocks_time: Option<bool>,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    #[arg(long)]
    pub summary: String,

    /// Used as the event id so retries do not create duplicates
    #[arg(long)]
    pub idempotency_key: Option<String>,

    #[command(flatten)]
    pub fields: EventFields,
}

#[derive(Debug, Clone, Args)]
pub struct UpdateArgs {
    pub event_id: String,

    #[arg(long)]
    pub summary: Option<String>,

    #[command(flatten)]
    pub fields: EventFields,
}

#[derive(Debug, Clone, Args)]
pub struct EventRef {
    pub event_id: String,

    #[arg(long)]
    pub calendar: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub calendar: Option<String>,

    /// Only events starting at or after this time (RFC3339)
    #[arg(long)]
    pub after: Option<String>,

    /// Only events starting before this time (RFC3339)
    #[arg(long)]
    pub before: Option<String>,

    /// Only events starting from now on
    #[arg(long, conflicts_with = "past")]
    pub future: bool,

    /// Only events that started before now
    #[arg(long)]
    pub past: bool,

    /// Page size
    #[arg(long)]
    pub limit: Option<u32>,

    /// Continue from a previous page's next anchor
    #[arg(long)]
    pub anchor: Option<String>,

    /// Follow next anchors until the listing is exhausted
    #[arg(long)]
    pub all: bool,
}

/// Authentication actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Authorize with an OAuth client (browser flow)
    Google {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Client-secrets JSON downloaded from Google Cloud Console
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Run the browser flow even if valid tokens are stored
        #[arg(long)]
        force: bool,
    },

    /// Use a service account key
    ServiceAccount {
        #[arg(long)]
        key_file: PathBuf,
    },

    /// Show which credentials would be used
    Status,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

fn parse_opt(value: Option<&str>) -> Result<Option<chrono::DateTime<chrono::Utc>>, TimestampError> {
    value.map(parse_timestamp_arg).transpose()
}

fn or_default_calendar(calendar: &Option<String>, default: Option<&str>) -> Option<String> {
    calendar.clone().or_else(|| default.map(str::to_string))
}

impl AddArgs {
    pub fn to_request(&self, default_calendar: Option<&str>) -> Result<AddEventRequest, TimestampError> {
        let f = &self.fields;
        Ok(AddEventRequest {
            summary: self.summary.clone(),
            description: f.description.clone(),
            location: f.location.clone(),
            start_time: parse_opt(f.start.as_deref())?,
            end_time: parse_opt(f.end.as_deref())?,
            calendar_id: or_default_calendar(&f.calendar, default_calendar),
            idempotency_key: self.idempotency_key.clone(),
            guests_can_see_other_guests: f.guests_can_see_other_guests,
            guests_can_modify: f.guests_can_modify,
            guests_can_invite_others: f.guests_can_invite_others,
            source_title: f.source_title.clone(),
            source_url: f.source_url.clone(),
            blocks_time: f.blocks_time,
        })
    }
}

impl UpdateArgs {
    pub fn to_request(
        &self,
        default_calendar: Option<&str>,
    ) -> Result<UpdateEventRequest, TimestampError> {
        let f = &self.fields;
        Ok(UpdateEventRequest {
            event_id: self.event_id.clone(),
            calendar_id: or_default_calendar(&f.calendar, default_calendar),
            summary: self.summary.clone(),
            description: f.description.clone(),
            location: f.location.clone(),
            start_time: parse_opt(f.start.as_deref())?,
            end_time: parse_opt(f.end.as_deref())?,
            guests_can_see_other_guests: f.guests_can_see_other_guests,
            guests_can_modify: f.guests_can_modify,
            guests_can_invite_others: f.guests_can_invite_others,
            source_title: f.source_title.clone(),
            source_url: f.source_url.clone(),
            blocks_time: f.blocks_time,
        })
    }
}

impl EventRef {
    pub fn to_get(&self, default_calendar: Option<&str>) -> GetEventRequest {
        GetEventRequest {
            event_id: self.event_id.clone(),
            calendar_id: or_default_calendar(&self.calendar, default_calendar),
        }
    }

    pub fn to_delete(&self, default_calendar: Option<&str>) -> DeleteEventRequest {
        DeleteEventRequest {
            event_id: self.event_id.clone(),
            calendar_id: or_default_calendar(&self.calendar, default_calendar),
        }
    }
}

impl ListArgs {
    pub fn to_request(
        &self,
        default_calendar: Option<&str>,
    ) -> Result<ListEventsRequest, TimestampError> {
        Ok(ListEventsRequest {
            calendar_id: or_default_calendar(&self.calendar, default_calendar),
            after: parse_opt(self.after.as_deref())?,
            before: parse_opt(self.before.as_deref())?,
            future: self.future.then_some(true),
            past: self.past.then_some(true),
            limit: self.limit,
            anchor: self.anchor.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cali").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn add_with_all_fields() {
        let cli = parse(&[
            "add",
            "--summary",
            "Lunch",
            "--start",
            "2024-01-15T12:00:00Z",
            "--end",
            "2024-01-15T13:00:00+01:00",
            "--guests-can-modify",
            "false",
            "--blocks-time",
            "true",
            "--idempotency-key",
            "lunch0115",
        ]);
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        let request = args.to_request(Some("work")).unwrap();
        assert_eq!(request.summary, "Lunch");
        assert_eq!(
            request.start_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(
            request.end_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap())
        );
        assert_eq!(request.guests_can_modify, Some(false));
        assert_eq!(request.guests_can_invite_others, None);
        assert_eq!(request.blocks_time, Some(true));
        assert_eq!(request.calendar_id.as_deref(), Some("work"));
        assert_eq!(request.idempotency_key.as_deref(), Some("lunch0115"));
    }

    #[test]
    fn bad_timestamp_is_reported_not_parsed_by_clap() {
        let cli = parse(&["add", "--summary", "x", "--start", "tomorrow"]);
        let Command::Add(args) = cli.command else {
            panic!("expected add");
        };
        let err = args.to_request(None).unwrap_err();
        assert_eq!(err.input, "tomorrow");
    }

    #[test]
    fn update_keeps_unset_fields_empty() {
        let cli = parse(&["update", "event7", "--location", "Room 2"]);
        let Command::Update(args) = cli.command else {
            panic!("expected update");
        };
        let request = args.to_request(None).unwrap();
        assert_eq!(request.event_id, "event7");
        assert_eq!(request.location.as_deref(), Some("Room 2"));
        assert_eq!(request.summary, None);
        assert_eq!(request.calendar_id, None);
    }

    #[test]
    fn explicit_calendar_beats_config_default() {
        let cli = parse(&["get", "event1", "--calendar", "team"]);
        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.to_get(Some("work")).calendar_id.as_deref(), Some("team"));
    }

    #[test]
    fn list_flags() {
        let cli = parse(&["list", "--future", "--limit", "5", "--all"]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert!(args.all);
        let request = args.to_request(None).unwrap();
        assert_eq!(request.future, Some(true));
        assert_eq!(request.past, None);
        assert_eq!(request.limit, Some(5));

        assert!(
            Cli::try_parse_from(["cali", "list", "--future", "--past"]).is_err(),
            "future and past are exclusive"
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["list", "--format", "yaml", "--daemon", "--socket", "/tmp/x.sock"]);
        assert_eq!(cli.format, Some(OutputFormat::Yaml));
        assert!(cli.daemon);
        assert_eq!(cli.socket_path, Some(PathBuf::from("/tmp/x.sock")));
        assert!(cli.command.is_calendar());
    }

    #[test]
    fn auth_subcommands() {
        let cli = parse(&["auth", "service-account", "--key-file", "/k.json"]);
        assert!(matches!(
            cli.command,
            Command::Auth {
                action: AuthAction::ServiceAccount { .. }
            }
        ));
        let cli = parse(&["auth", "status"]);
        assert!(!cli.command.is_calendar());
    }
}
