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

use crate::types::{OrderId, Price, Side};

/// A mutation request for the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
	Submit {
		symbol: String,
		side: Side,
		price: Price,
		volume: u64,
	},
	Cancel {
		order_id: OrderId,
	},
	Modify {
		order_id: OrderId,
		price: Price,
		volume: u64,
	},
}

/// Ingress queue between command producers and the engine worker
///
/// The queue is the boundary between multi-threaded producers (feed
/// handlers, strategies) and the single worker loop draining commands
/// in arrival order, which gives feed-driven deployments a total order
/// of mutations across all symbols.
///
/// Properties:
/// - Multiple producers (the sender clones freely)
/// - Single consumer (the worker loop)
/// - Bounded capacity for backpressure
/// - Explicit failure semantics when full, never silent dropping
pub struct IngressQueue {
	sender: Sender<EngineCommand>,
	receiver: Receiver<EngineCommand>,
}

impl IngressQueue {
	/// Create a new ingress queue with the specified capacity
	pub fn new(capacity: usize) -> Self {
		let (sender, receiver) = bounded(capacity);
		Self { sender, receiver }
	}

	/// Split the queue into sender and receiver ends
	///
	/// The sender can be cloned across producer threads. The receiver
	/// must remain unique to the single worker loop.
	pub fn split(self) -> (QueueSender, QueueReceiver) {
		(
			QueueSender {
				sender: self.sender,
			},
			QueueReceiver {
				receiver: self.receiver,
			},
		)
	}
}

/// Sender end of the ingress queue
///
/// This can be cloned and shared across multiple threads.
#[derive(Clone)]
pub struct QueueSender {
	sender: Sender<EngineCommand>,
}

impl QueueSender {
	/// Try to enqueue a command (non-blocking)
	///
	/// Returns `QueueError::Full` when the worker is falling behind;
	/// the producer decides whether to retry, shed, or block.
	pub fn try_enqueue(&self, cmd: EngineCommand) -> Result<(), QueueError> {
		self.sender.try_send(cmd).map_err(|e| match e {
			TrySendError::Full(_) => QueueError::Full,
			TrySendError::Disconnected(_) => QueueError::Disconnected,
		})
	}

	/// Check if the queue is full
	pub fn is_full(&self) -> bool {
		self.sender.is_full()
	}
}

/// Receiver end of the ingress queue
///
/// This should NOT be cloned - only one worker loop should consume.
pub struct QueueReceiver {
	receiver: Receiver<EngineCommand>,
}

impl QueueReceiver {
	/// Receive a command (blocking)
	pub fn recv(&self) -> Result<EngineCommand, QueueError> {
		self.receiver.recv().map_err(|_| QueueError::Disconnected)
	}

	/// Try to receive a command (non-blocking)
	///
	/// Used by the worker loop so it can interleave shutdown checks.
	pub fn try_recv(&self) -> Result<EngineCommand, QueueError> {
		self.receiver.try_recv().map_err(|e| match e {
			TryRecvError::Empty => QueueError::Empty,
			TryRecvError::Disconnected => QueueError::Disconnected,
		})
	}
}

/// Errors that can occur when interacting with the ingress queue
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
	#[error("Queue is full")]
	Full,
	#[error("Queue is empty")]
	Empty,
	#[error("Queue disconnected")]
	Disconnected,
}
