// 11.0: every state change the simulator makes produces an event. the log is the audit trail
// a report is rendered from. the EventPayload enum lists all event types.

use crate::liquidation::RotationFees;
use crate::types::{Leg, Price, Quote};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub date: NaiveDate,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, date: NaiveDate, payload: EventPayload) -> Self {
        Self { id, date, payload }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Open,
    Rebalance,
    Liquidation,
    Reopen,
    Close,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Open(OpenEvent),
    Rebalance(RebalanceEvent),
    Liquidation(LiquidationEvent),
    Reopen(ReopenEvent),
    Close(CloseEvent),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Open(_) => EventKind::Open,
            EventPayload::Rebalance(_) => EventKind::Rebalance,
            EventPayload::Liquidation(_) => EventKind::Liquidation,
            EventPayload::Reopen(_) => EventKind::Reopen,
            EventPayload::Close(_) => EventKind::Close,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenEvent {
    pub price: Price,
    pub capital: Quote,
    pub notional_per_leg: Quote,
    pub fees: RotationFees,
    pub long_equity: Quote,
    pub short_equity: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceEvent {
    pub price: Price,
    pub source_leg: Leg,
    pub destination_leg: Leg,
    pub amount: Quote,
    pub cost: Quote,
    pub leverage_before: Decimal,
    pub long_equity: Quote,
    pub short_equity: Quote,
    // a leg is still above trigger after the transfer. reported, not retried
    pub anomaly: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub leg: Leg,
    // close the reset happens at
    pub price: Price,
    // intraday extreme that breached maintenance
    pub trigger_price: Price,
    pub penalty: Quote,
    pub long_equity: Quote,
    pub short_equity: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReopenEvent {
    pub price: Price,
    pub notional_per_leg: Quote,
    pub fees: RotationFees,
    pub long_equity: Quote,
    pub short_equity: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseEvent {
    pub price: Price,
    pub close_fee: Quote,
    pub final_equity: Quote,
}

pub fn count_events(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}
