// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod buffer;

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::types::{OrderId, Price};

pub use buffer::{EventBuffer, EventBufferError, EventConsumer, EventProducer};

/// Sequence number for event ordering
///
/// Trades are assigned monotonically increasing sequence numbers per
/// book, so downstream consumers can order executions deterministically.
pub type SequenceNumber = u64;

/// An execution between two orders
///
/// Emitted once per trade by the matching loop. The price is the
/// maker's price (the participant that was resting first); `volume` is
/// the quantity each side exchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
	pub symbol: String,
	pub buy_order_id: OrderId,
	pub sell_order_id: OrderId,
	pub price: Price,
	pub volume: u64,
	pub seq: SequenceNumber,
}

/// Category of a risk alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
	PositionLimit,
	OrderSize,
	StopLoss,
	Halted,
}

/// A risk control notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
	pub kind: AlertKind,
	pub symbol: String,
	pub detail: String,
}

/// Events published by the engine to its observer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
	Fill(Fill),
	Alert(Alert),
}

impl EngineEvent {
	/// Get the symbol this event concerns
	pub fn symbol(&self) -> &str {
		match self {
			EngineEvent::Fill(fill) => &fill.symbol,
			EngineEvent::Alert(alert) => &alert.symbol,
		}
	}
}

/// Observer injected into the engine at construction
///
/// The engine publishes every fill and alert to its sink while still
/// holding the originating symbol's state. Implementations must return
/// promptly and must not call back into the engine.
pub trait EventSink: Send + Sync {
	fn publish(&self, event: EngineEvent);
}

/// In-memory sink collecting events for inspection
///
/// Used by tests and as the default sink when no external consumer is
/// wired up.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
	events: Mutex<Vec<EngineEvent>>,
}

impl MemoryEventSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Take all collected events, leaving the sink empty
	pub fn take(&self) -> Vec<EngineEvent> {
		std::mem::take(&mut *self.events.lock().unwrap())
	}

	/// Snapshot of the fills collected so far
	pub fn fills(&self) -> Vec<Fill> {
		self.events
			.lock()
			.unwrap()
			.iter()
			.filter_map(|e| match e {
				EngineEvent::Fill(fill) => Some(fill.clone()),
				EngineEvent::Alert(_) => None,
			})
			.collect()
	}

	/// Snapshot of the alerts collected so far
	pub fn alerts(&self) -> Vec<Alert> {
		self.events
			.lock()
			.unwrap()
			.iter()
			.filter_map(|e| match e {
				EngineEvent::Alert(alert) => Some(alert.clone()),
				EngineEvent::Fill(_) => None,
			})
			.collect()
	}

	pub fn len(&self) -> usize {
		self.events.lock().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.lock().unwrap().is_empty()
	}
}

impl EventSink for MemoryEventSink {
	fn publish(&self, event: EngineEvent) {
		self.events.lock().unwrap().push(event);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	fn fill(seq: u64) -> Fill {
		Fill {
			symbol: "BTC-USDT".to_string(),
			buy_order_id: OrderId(1),
			sell_order_id: OrderId(2),
			price: Price::from_str("100.0").unwrap(),
			volume: 5,
			seq,
		}
	}

	#[test]
	fn test_memory_sink_collects_in_order() {
		let sink = MemoryEventSink::new();
		sink.publish(EngineEvent::Fill(fill(1)));
		sink.publish(EngineEvent::Alert(Alert {
			kind: AlertKind::StopLoss,
			symbol: "BTC-USDT".to_string(),
			detail: "halted".to_string(),
		}));
		sink.publish(EngineEvent::Fill(fill(2)));

		assert_eq!(sink.len(), 3);
		assert_eq!(sink.fills().len(), 2);
		assert_eq!(sink.alerts().len(), 1);

		let events = sink.take();
		assert_eq!(events.len(), 3);
		assert!(sink.is_empty());
		assert!(matches!(&events[1], EngineEvent::Alert(a) if a.kind == AlertKind::StopLoss));
	}

	#[test]
	fn test_event_serialization() {
		let event = EngineEvent::Fill(fill(9));
		let json = serde_json::to_string(&event).unwrap();
		let decoded: EngineEvent = serde_json::from_str(&json).unwrap();
		assert_eq!(event, decoded);
		assert_eq!(decoded.symbol(), "BTC-USDT");
	}
}
