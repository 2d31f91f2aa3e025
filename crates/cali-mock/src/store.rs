//! In-memory event store behind the mock server.

use std::collections::HashMap;
use std::sync::Arc;

use cali_core::TimeBounds;
use cali_core::time::parse_rfc3339;
use cali_providers::google::api::{ApiEvent, ApiEventList};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{MockError, MockResult};

const FIRST_ID: u64 = 1;
const HTML_LINK_BASE: &str = "https://calendar.google.com/event?eid=";

/// List parameters as they arrive on the query string.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub max_results: Option<usize>,
    pub page_token: Option<String>,
    pub single_events: bool,
    pub order_by_start_time: bool,
}

impl ListQuery {
    fn bounds(&self) -> TimeBounds {
        TimeBounds {
            min: self.time_min.as_deref().and_then(parse_rfc3339),
            max: self.time_max.as_deref().and_then(parse_rfc3339),
        }
    }

    fn offset(&self) -> MockResult<usize> {
        match self.page_token.as_deref() {
            None | Some("") => Ok(0),
            Some(token) => token
                .parse()
                .map_err(|_| MockError::InvalidPageToken(token.to_string())),
        }
    }
}

/// Events of one calendar keyed by id. `seq` records insertion order.
#[derive(Debug, Default)]
struct Calendar {
    events: HashMap<String, Slot>,
    next_seq: u64,
}

#[derive(Debug)]
struct Slot {
    seq: u64,
    event: ApiEvent,
}

impl Calendar {
    fn get(&self, event_id: &str) -> Option<&ApiEvent> {
        self.events.get(event_id).map(|slot| &slot.event)
    }

    fn contains(&self, event_id: &str) -> bool {
        self.events.contains_key(event_id)
    }

    /// Replaces the event in place (keeping its position) or appends it.
    fn upsert(&mut self, event_id: String, event: ApiEvent) {
        match self.events.get_mut(&event_id) {
            Some(slot) => slot.event = event,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.events.insert(event_id, Slot { seq, event });
            }
        }
    }

    fn remove(&mut self, event_id: &str) -> Option<ApiEvent> {
        self.events.remove(event_id).map(|slot| slot.event)
    }

    /// Events in insertion order.
    fn ordered(&self) -> Vec<&ApiEvent> {
        let mut slots: Vec<&Slot> = self.events.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| &slot.event).collect()
    }
}

#[derive(Debug)]
struct State {
    calendars: HashMap<String, Calendar>,
    next_id: u64,
    last_stamp: Option<DateTime<Utc>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            calendars: HashMap::new(),
            next_id: FIRST_ID,
            last_stamp: None,
        }
    }
}

impl State {
    /// Next unused `event<N>` id. The counter is shared across calendars and never rewinds
    /// except on reset.
    fn allocate_id(&mut self, calendar_id: &str) -> String {
        loop {
            let id = format!("event{}", self.next_id);
            self.next_id += 1;
            let taken = self
                .calendars
                .get(calendar_id)
                .is_some_and(|c| c.contains(&id));
            if !taken {
                return id;
            }
        }
    }

    /// Current time at millisecond precision, strictly after every stamp handed out before.
    fn stamp(&mut self) -> String {
        let mut now = Utc::now().trunc_subsecs(3);
        if let Some(last) = self.last_stamp
            && now <= last
        {
            now = last + Duration::milliseconds(1);
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn calendar(&self, calendar_id: &str) -> MockResult<&Calendar> {
        self.calendars
            .get(calendar_id)
            .ok_or(MockError::CalendarNotFound)
    }

    fn calendar_mut(&mut self, calendar_id: &str) -> MockResult<&mut Calendar> {
        self.calendars
            .get_mut(calendar_id)
            .ok_or(MockError::CalendarNotFound)
    }
}

/// Shared, lock-guarded store of events keyed by calendar.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    inner: Arc<RwLock<State>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new event, replacing any client-supplied id.
    pub async fn insert(&self, calendar_id: &str, mut event: ApiEvent) -> ApiEvent {
        let mut state = self.inner.write().await;
        let id = state.allocate_id(calendar_id);
        let now = state.stamp();

        event.html_link = Some(format!("{HTML_LINK_BASE}{id}"));
        event.id = Some(id.clone());
        event.status = Some("confirmed".to_string());
        event.created = Some(now.clone());
        event.updated = Some(now);

        debug!(calendar_id, event_id = ?event.id, "inserted event");
        state
            .calendars
            .entry(calendar_id.to_string())
            .or_default()
            .upsert(id, event.clone());
        event
    }

    /// One page of a calendar's events. Unknown calendars list as empty.
    pub async fn list(&self, calendar_id: &str, query: &ListQuery) -> MockResult<ApiEventList> {
        let offset = query.offset()?;
        let state = self.inner.read().await;
        let bounds = query.bounds();

        let mut events: Vec<&ApiEvent> = state
            .calendars
            .get(calendar_id)
            .map(|c| c.ordered().into_iter().filter(|e| in_bounds(e, &bounds)).collect())
            .unwrap_or_default();

        if query.order_by_start_time && query.single_events {
            events.sort_by_key(|e| e.start_key());
        }

        if offset > events.len() {
            return Err(MockError::InvalidPageToken(offset.to_string()));
        }
        let page_size = query.max_results.unwrap_or(events.len());
        let end = offset.saturating_add(page_size).min(events.len());
        let next_page_token = (end < events.len()).then(|| end.to_string());

        debug!(
            calendar_id,
            total = events.len(),
            offset,
            returned = end - offset,
            has_next_page = next_page_token.is_some(),
            "listed events"
        );

        Ok(ApiEventList {
            kind: Some("calendar#events".to_string()),
            summary: Some(calendar_id.to_string()),
            items: events[offset..end].iter().map(|e| (*e).clone()).collect(),
            next_page_token,
        })
    }

    pub async fn get(&self, calendar_id: &str, event_id: &str) -> MockResult<ApiEvent> {
        let state = self.inner.read().await;
        let calendar = state.calendar(calendar_id)?;
        calendar
            .get(event_id)
            .cloned()
            .ok_or(MockError::EventNotFound)
    }

    /// Full replace of an existing event; id, creation time and link are kept.
    pub async fn update(
        &self,
        calendar_id: &str,
        event_id: &str,
        mut replacement: ApiEvent,
    ) -> MockResult<ApiEvent> {
        let mut state = self.inner.write().await;
        let (created, html_link) = state
            .calendar(calendar_id)?
            .get(event_id)
            .map(|existing| (existing.created.clone(), existing.html_link.clone()))
            .ok_or(MockError::EventNotFound)?;
        let now = state.stamp();

        replacement.id = Some(event_id.to_string());
        replacement.created = created;
        replacement.html_link = html_link;
        replacement.updated = Some(now);

        state
            .calendar_mut(calendar_id)?
            .upsert(event_id.to_string(), replacement.clone());
        debug!(calendar_id, event_id, "updated event");
        Ok(replacement)
    }

    pub async fn delete(&self, calendar_id: &str, event_id: &str) -> MockResult<()> {
        let mut state = self.inner.write().await;
        let calendar = state.calendar_mut(calendar_id)?;
        calendar.remove(event_id).ok_or(MockError::EventNotFound)?;
        debug!(calendar_id, event_id, "deleted event");
        Ok(())
    }

    /// Seeds an event without going through HTTP. An id is allocated only when the event
    /// has none; metadata is stored as given.
    pub async fn add_event(&self, calendar_id: &str, mut event: ApiEvent) -> ApiEvent {
        let mut state = self.inner.write().await;
        let id = match event.id.clone().filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => state.allocate_id(calendar_id),
        };
        event.id = Some(id.clone());
        state
            .calendars
            .entry(calendar_id.to_string())
            .or_default()
            .upsert(id, event.clone());
        event
    }

    /// Every event of a calendar in insertion order.
    pub async fn events(&self, calendar_id: &str) -> Vec<ApiEvent> {
        let state = self.inner.read().await;
        state
            .calendars
            .get(calendar_id)
            .map(|c| c.ordered().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops all calendars and rewinds the id counter.
    pub async fn reset(&self) {
        *self.inner.write().await = State::default();
    }
}

/// Time filtering only applies to events with a parseable timestamped start.
fn in_bounds(event: &ApiEvent, bounds: &TimeBounds) -> bool {
    let start = event
        .start
        .as_ref()
        .and_then(|s| s.date_time.as_deref())
        .filter(|dt| !dt.is_empty())
        .and_then(parse_rfc3339);
    match start {
        Some(start) => bounds.contains(start),
        None => true,
    }
}
