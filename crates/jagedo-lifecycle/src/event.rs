//! # Outbound Events
//!
//! The engine publishes a [`LifecycleEvent`] for every applied change that
//! other systems care about. Events are collected while a command runs and
//! published only after the command commits and the request lock is
//! released. Replays publish nothing.
//!
//! Delivery is the sink's business. Three sinks ship here:
//!
//! - [`TracingSink`] writes one structured log line per event.
//! - [`InMemorySink`] keeps a bounded window of recent events.
//! - [`FanOutSink`] forwards to several sinks in order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use jagedo_core::{BidId, PaymentId, RequestId, Timestamp};

use crate::request::Stage;

/// Something that happened to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// The request moved between stages.
    RequestStageChanged {
        request_id: RequestId,
        old_stage: Stage,
        new_stage: Stage,
    },
    /// A bid won the request.
    BidAccepted { request_id: RequestId, bid_id: BidId },
    /// A payment was confirmed for the first time.
    PaymentConfirmed {
        request_id: RequestId,
        payment_id: PaymentId,
    },
    /// The request was withdrawn.
    RequestRecalled { request_id: RequestId, reason: String },
}

impl LifecycleEvent {
    /// The request the event concerns.
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::RequestStageChanged { request_id, .. }
            | Self::BidAccepted { request_id, .. }
            | Self::PaymentConfirmed { request_id, .. }
            | Self::RequestRecalled { request_id, .. } => *request_id,
        }
    }

    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestStageChanged { .. } => "request_stage_changed",
            Self::BidAccepted { .. } => "bid_accepted",
            Self::PaymentConfirmed { .. } => "payment_confirmed",
            Self::RequestRecalled { .. } => "request_recalled",
        }
    }
}

/// Receives published events.
pub trait EventSink: Send + Sync {
    /// Deliver one event. Must not block for long; it runs on the caller's
    /// thread after the command has committed.
    fn publish(&self, event: &LifecycleEvent);
}

// ── Tracing ─────────────────────────────────────────────────────────────

/// Logs each event at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::RequestStageChanged {
                request_id,
                old_stage,
                new_stage,
            } => tracing::info!(
                event = event.name(),
                %request_id,
                from = %old_stage,
                to = %new_stage,
                "lifecycle event"
            ),
            LifecycleEvent::BidAccepted { request_id, bid_id } => tracing::info!(
                event = event.name(),
                %request_id,
                %bid_id,
                "lifecycle event"
            ),
            LifecycleEvent::PaymentConfirmed {
                request_id,
                payment_id,
            } => tracing::info!(
                event = event.name(),
                %request_id,
                %payment_id,
                "lifecycle event"
            ),
            LifecycleEvent::RequestRecalled { request_id, reason } => tracing::info!(
                event = event.name(),
                %request_id,
                reason = reason.as_str(),
                "lifecycle event"
            ),
        }
    }
}

// ── In-memory ───────────────────────────────────────────────────────────

/// An event with its publication sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub sequence: u64,
    pub recorded_at: Timestamp,
    pub event: LifecycleEvent,
}

/// Keeps the most recent `capacity` events.
#[derive(Debug)]
pub struct InMemorySink {
    capacity: usize,
    next_sequence: AtomicU64,
    events: Mutex<VecDeque<RecordedEvent>>,
}

impl InMemorySink {
    /// A sink retaining at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            next_sequence: AtomicU64::new(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Every retained event, oldest first.
    pub fn snapshot(&self) -> Vec<RecordedEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// The newest `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<RecordedEvent> {
        let events = self.events.lock();
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    /// Just the events, oldest first.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().iter().map(|r| r.event.clone()).collect()
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether no events are retained.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl EventSink for InMemorySink {
    fn publish(&self, event: &LifecycleEvent) {
        let mut events = self.events.lock();
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(RecordedEvent {
            sequence,
            recorded_at: Timestamp::now(),
            event: event.clone(),
        });
    }
}

// ── Fan-out ─────────────────────────────────────────────────────────────

/// Forwards every event to each inner sink.
#[derive(Default, Clone)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl std::fmt::Debug for FanOutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl EventSink for FanOutSink {
    fn publish(&self, event: &LifecycleEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}
