//! Event commands: add, update, get, delete, list.
//!
//! Without `--daemon` the calendar client runs in this process; with it,
//! every request goes over the daemon socket.

use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use cali_core::{
    AddEventRequest, AddEventResponse, DeleteEventRequest, DeleteEventResponse, Event, EventPage,
    FormatError, GetEventRequest, ListEventsRequest, Output, OutputFormat, UpdateEventRequest,
    UpdateEventResponse, resolve_calendar_id,
};
use cali_providers::CalendarClient;

use crate::cli::Command;
use crate::commands::Context;
use crate::error::{ClientError, ClientResult};
use crate::socket::SocketClient;

/// Where calendar requests are executed.
pub enum Backend {
    Direct(CalendarClient),
    Daemon(SocketClient),
}

impl Backend {
    pub fn from_context(ctx: &Context) -> ClientResult<Self> {
        if ctx.use_daemon {
            Ok(Self::Daemon(ctx.socket_client()))
        } else {
            Ok(Self::Direct(ctx.config.calendar_client()?))
        }
    }

    pub async fn add(&self, request: AddEventRequest) -> ClientResult<AddEventResponse> {
        match self {
            Self::Direct(client) => Ok(client.create_event(&request).await?),
            Self::Daemon(socket) => socket.add_event(request).await,
        }
    }

    pub async fn update(&self, request: UpdateEventRequest) -> ClientResult<UpdateEventResponse> {
        match self {
            Self::Direct(client) => Ok(client.update_event(&request).await?),
            Self::Daemon(socket) => socket.update_event(request).await,
        }
    }

    pub async fn get(&self, request: GetEventRequest) -> ClientResult<Event> {
        match self {
            Self::Direct(client) => Ok(client.get_event(&request).await?),
            Self::Daemon(socket) => socket.get_event(request).await,
        }
    }

    pub async fn delete(&self, request: DeleteEventRequest) -> ClientResult<DeleteEventResponse> {
        match self {
            Self::Direct(client) => Ok(client.delete_event(&request).await?),
            Self::Daemon(socket) => socket.delete_event(request).await,
        }
    }

    /// One page, or every page when `all` is set.
    pub async fn list(&self, request: ListEventsRequest, all: bool) -> ClientResult<EventPage> {
        match self {
            Self::Direct(client) => {
                let cancel = CancellationToken::new();
                let interrupt = cancel_on_interrupt(cancel.clone());
                let result = if all {
                    client
                        .collect_all(request, cancel)
                        .await
                        .map(|events| EventPage {
                            events,
                            next_anchor: None,
                        })
                } else {
                    client.list_events(request, cancel).collect_page().await
                };
                interrupt.abort();
                Ok(result?)
            }
            Self::Daemon(socket) if all => Ok(EventPage {
                events: socket.list_all(request).await?,
                next_anchor: None,
            }),
            Self::Daemon(socket) => socket.list_events(request).await,
        }
    }
}

/// Cancels an in-process listing on Ctrl+C.
fn cancel_on_interrupt(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupted, cancelling listing");
            cancel.cancel();
        }
    })
}

/// Fails before anything is sent when the result could not be rendered.
fn reject_ical_acknowledgement(command: &Command, format: OutputFormat) -> Result<(), FormatError> {
    let kind = match command {
        Command::Add(_) => "add",
        Command::Update(_) => "update",
        Command::Delete(_) => "delete",
        _ => return Ok(()),
    };
    match format {
        OutputFormat::Ical => Err(FormatError::IcalUnsupported(kind)),
        _ => Ok(()),
    }
}

/// Runs an event command and renders its result.
pub async fn run(ctx: &Context, command: Command, out: &mut impl Write) -> ClientResult<()> {
    reject_ical_acknowledgement(&command, ctx.format)?;
    let backend = Backend::from_context(ctx)?;
    let calendar = ctx.default_calendar();

    let text = match command {
        Command::Add(args) => {
            let response = backend.add(args.to_request(calendar)?).await?;
            Output::Added(&response).render(ctx.format)?
        }
        Command::Update(args) => {
            let response = backend.update(args.to_request(calendar)?).await?;
            Output::Updated(&response).render(ctx.format)?
        }
        Command::Get(args) => {
            let event = backend.get(args.to_get(calendar)).await?;
            Output::Event(&event).render(ctx.format)?
        }
        Command::Delete(args) => {
            let response = backend.delete(args.to_delete(calendar)).await?;
            Output::Deleted(&response).render(ctx.format)?
        }
        Command::List(args) => {
            let request = args.to_request(calendar)?;
            let calendar_id = resolve_calendar_id(request.calendar_id.as_deref()).to_string();
            let page = backend.list(request, args.all).await.inspect_err(|e| {
                error!(calendar_id = %calendar_id, error = %e, "failed to retrieve events");
            })?;
            debug!(
                calendar_id = %calendar_id,
                count = page.events.len(),
                has_next_page = page.next_anchor.is_some(),
                "listed events"
            );
            Output::Page(&page).render(ctx.format)?
        }
        other => {
            return Err(ClientError::config(format!(
                "not a calendar command: {other:?}"
            )));
        }
    };

    out.write_all(text.as_bytes())?;
    Ok(())
}
