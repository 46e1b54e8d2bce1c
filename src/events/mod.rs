//! Notification sink for engine lifecycle events.
//!
//! The orchestrator announces lifecycle events on an injected bus
//! rather than a process-global singleton, so it stays unit-testable.
//! Each event kind has its own broadcast channel and any number of
//! independent listeners may subscribe per kind.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{OrderRequest, OrderSide, OrderStatus};

/// Event kinds emitted by the execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrderCreated,
    OrderSubmitted,
    OrderFilled,
    TradeEntry,
    TradeExit,
    ApprovalRequested,
    KillSwitch,
    EngineStarted,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::OrderCreated,
        EventKind::OrderSubmitted,
        EventKind::OrderFilled,
        EventKind::TradeEntry,
        EventKind::TradeExit,
        EventKind::ApprovalRequested,
        EventKind::KillSwitch,
        EventKind::EngineStarted,
    ];
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::OrderCreated => "order_created",
            EventKind::OrderSubmitted => "order_submitted",
            EventKind::OrderFilled => "order_filled",
            EventKind::TradeEntry => "trade_entry",
            EventKind::TradeExit => "trade_exit",
            EventKind::ApprovalRequested => "approval_requested",
            EventKind::KillSwitch => "kill_switch",
            EventKind::EngineStarted => "engine_started",
        };
        write!(f, "{}", name)
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Kind-specific structured payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    OrderCreated {
        task_id: Uuid,
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
        priority: u8,
    },
    OrderSubmitted {
        task_id: Uuid,
        broker_order_id: String,
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
        status: OrderStatus,
        retry_count: u32,
    },
    OrderFilled {
        task_id: Uuid,
        broker_order_id: String,
        symbol: String,
        side: OrderSide,
        filled_quantity: Decimal,
        fill_price: Option<Decimal>,
    },
    TradeEntry {
        task_id: Uuid,
        symbol: String,
        quantity: Decimal,
        price: Option<Decimal>,
    },
    TradeExit {
        task_id: Uuid,
        symbol: String,
        quantity: Decimal,
        price: Option<Decimal>,
    },
    ApprovalRequested {
        task_id: Uuid,
        order: OrderRequest,
        analysis: Option<serde_json::Value>,
    },
    KillSwitch {
        reason: String,
    },
    EngineStarted {
        max_pending_orders: usize,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::OrderCreated { .. } => EventKind::OrderCreated,
            EventPayload::OrderSubmitted { .. } => EventKind::OrderSubmitted,
            EventPayload::OrderFilled { .. } => EventKind::OrderFilled,
            EventPayload::TradeEntry { .. } => EventKind::TradeEntry,
            EventPayload::TradeExit { .. } => EventKind::TradeExit,
            EventPayload::ApprovalRequested { .. } => EventKind::ApprovalRequested,
            EventPayload::KillSwitch { .. } => EventKind::KillSwitch,
            EventPayload::EngineStarted { .. } => EventKind::EngineStarted,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            EventPayload::KillSwitch { .. } => Severity::Critical,
            EventPayload::ApprovalRequested { .. } => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// An engine lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    /// Originating component tag
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: &str, payload: EventPayload) -> Self {
        Self {
            kind: payload.kind(),
            severity: payload.severity(),
            timestamp: Utc::now(),
            source: source.to_string(),
            payload,
        }
    }
}

/// Publish/subscribe channel keyed by event kind.
///
/// Publishing never blocks and never fails the engine; slow subscribers
/// see `RecvError::Lagged` and continue from the newest events.
pub struct EventBus {
    channels: HashMap<EventKind, broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let mut channels = HashMap::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            let (tx, _) = broadcast::channel(capacity);
            channels.insert(kind, tx);
        }
        Self { channels }
    }

    /// Subscribe to one event kind.
    pub fn subscribe(&self, kind: EventKind) -> broadcast::Receiver<Event> {
        self.channels
            .get(&kind)
            .expect("channel exists for every kind")
            .subscribe()
    }

    /// Publish an event; returns the number of subscribers that saw it.
    pub fn publish(&self, event: Event) -> usize {
        match self.channels.get(&event.kind) {
            // A send error only means nobody is listening right now.
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Current subscriber count for a kind.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.channels
            .get(&kind)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
