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

use crossbeam::channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use super::{EngineEvent, EventSink};

/// SPSC event buffer between the engine and a downstream consumer
///
/// The buffer decouples event production (matching) from consumption
/// (feed handlers, recorders), so publishing never blocks the engine.
///
/// Properties:
/// - Single producer (the engine's sink)
/// - Single consumer (the downstream reader)
/// - Bounded capacity for backpressure
/// - Non-blocking send (try_send returns error if full)
pub struct EventBuffer {
	sender: Sender<EngineEvent>,
	receiver: Receiver<EngineEvent>,
}

impl EventBuffer {
	/// Create a new event buffer with the specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the buffer into producer and consumer ends
	///
	/// The producer end is handed to the engine as its event sink.
	/// The consumer end is used by the downstream reader to pull events.
	pub fn split(self) -> (EventProducer, EventConsumer) {
		(
			EventProducer {
				sender: self.sender,
			},
			EventConsumer {
				receiver: self.receiver,
			},
		)
	}
}

/// Producer end of the event buffer
pub struct EventProducer {
	sender: Sender<EngineEvent>,
}

impl EventProducer {
	/// Push an event to the buffer
	///
	/// Returns error if the buffer is full, indicating backpressure.
	pub fn push(&self, event: EngineEvent) -> Result<(), EventBufferError> {
		self.sender.try_send(event).map_err(|e| match e {
			TrySendError::Full(_) => EventBufferError::Full,
			TrySendError::Disconnected(_) => EventBufferError::Disconnected,
		})
	}

	/// Check if the buffer is full
	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}
}

impl EventSink for EventProducer {
	/// Publish without blocking the matching path
	///
	/// A full or disconnected buffer drops the event with a warning;
	/// the engine must never stall on a slow consumer.
	fn publish(&self, event: EngineEvent) {
		if let Err(e) = self.push(event) {
			tracing::warn!(error = %e, "event buffer rejected event, dropping");
		}
	}
}

/// Consumer end of the event buffer
pub struct EventConsumer {
	receiver: Receiver<EngineEvent>,
}

impl EventConsumer {
	/// Try to receive an event from the buffer (non-blocking)
	pub fn try_recv(&self) -> Result<EngineEvent, EventBufferError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => EventBufferError::Empty,
			TryRecvError::Disconnected => EventBufferError::Disconnected,
		})
	}

	/// Receive an event from the buffer (blocking)
	pub fn recv(&self) -> Result<EngineEvent, EventBufferError> {
		self.receiver
			.recv()
			.map_err(|_| EventBufferError::Disconnected)
	}

	/// Drain multiple events from the buffer (non-blocking)
	///
	/// Returns up to `max_count` events, or fewer if the buffer
	/// becomes empty.
	pub fn drain(&self, max_count: usize) -> Vec<EngineEvent> {
		let mut events = Vec::with_capacity(max_count);
		for _ in 0..max_count {
			match self.try_recv() {
				Ok(event) => events.push(event),
				Err(_) => break,
			}
		}
		events
	}
}

/// Errors that can occur when interacting with the event buffer
#[derive(Debug, thiserror::Error)]
pub enum EventBufferError {
	#[error("Event buffer is full")]
	Full,
	#[error("Event buffer is empty")]
	Empty,
	#[error("Event buffer disconnected")]
	Disconnected,
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::Fill;
	use crate::types::{OrderId, Price};
	use std::str::FromStr;

	fn create_test_event(seq: u64) -> EngineEvent {
		EngineEvent::Fill(Fill {
			symbol: "BTC-USDT".to_string(),
			buy_order_id: OrderId(seq),
			sell_order_id: OrderId(seq + 1),
			price: Price::from_str("50000").unwrap(),
			volume: 1,
			seq,
		})
	}

	#[test]
	fn test_push_and_recv() {
		let buffer = EventBuffer::new(10);
		let (producer, consumer) = buffer.split();

		producer.push(create_test_event(1)).unwrap();

		let received = consumer.recv().unwrap();
		assert!(matches!(received, EngineEvent::Fill(f) if f.seq == 1));
	}

	#[test]
	fn test_buffer_full() {
		let buffer = EventBuffer::new(2);
		let (producer, _consumer) = buffer.split();

		producer.push(create_test_event(1)).unwrap();
		producer.push(create_test_event(2)).unwrap();

		let result = producer.push(create_test_event(3));
		assert!(matches!(result, Err(EventBufferError::Full)));
	}

	#[test]
	fn test_full_buffer_drops_on_publish() {
		let buffer = EventBuffer::new(1);
		let (producer, consumer) = buffer.split();

		producer.publish(create_test_event(1));
		producer.publish(create_test_event(2));

		assert_eq!(consumer.drain(10).len(), 1);
	}

	#[test]
	fn test_drain() {
		let buffer = EventBuffer::new(10);
		let (producer, consumer) = buffer.split();

		for i in 0..5 {
			producer.push(create_test_event(i)).unwrap();
		}

		let drained = consumer.drain(10);
		assert_eq!(drained.len(), 5);

		let empty = consumer.drain(10);
		assert_eq!(empty.len(), 0);
	}
}
