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

use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};

use tracing::{debug, error, info};

use crate::engine::MatchingEngine;
use crate::queue::{EngineCommand, QueueError, QueueReceiver};

/// Dedicated worker thread draining the ingress queue into the engine
///
/// Commands are applied strictly in arrival order, so in feed-driven
/// deployments the worker is the single writer and all mutations are
/// totally ordered. Rejections and failures are logged and the loop
/// moves on; only queue disconnection stops it.
///
/// The worker joins its thread on shutdown (and on drop), so no
/// command is being applied once `shutdown` returns.
pub struct EngineWorker {
	thread_handle: Option<JoinHandle<()>>,
	shutdown: Arc<AtomicBool>,
}

impl EngineWorker {
	/// Start the worker loop on a named thread
	pub fn start(engine: Arc<MatchingEngine>, queue_receiver: QueueReceiver) -> Self {
		let shutdown = Arc::new(AtomicBool::new(false));
		let shutdown_clone = shutdown.clone();

		let thread_handle = thread::Builder::new()
			.name("matching-loop".to_string())
			.spawn(move || {
				info!("engine worker started");
				Self::run_loop(&engine, &queue_receiver, &shutdown_clone);
				info!("engine worker stopped");
			})
			.expect("Failed to spawn engine worker thread");

		Self {
			thread_handle: Some(thread_handle),
			shutdown,
		}
	}

	fn run_loop(
		engine: &MatchingEngine,
		queue_receiver: &QueueReceiver,
		shutdown: &Arc<AtomicBool>,
	) {
		loop {
			if shutdown.load(Ordering::Relaxed) {
				break;
			}

			let cmd = match queue_receiver.try_recv() {
				Ok(cmd) => cmd,
				Err(QueueError::Empty) => {
					if shutdown.load(Ordering::Relaxed) {
						break;
					}
					thread::sleep(Duration::from_millis(1));
					continue;
				}
				Err(QueueError::Disconnected) => {
					error!("Ingress queue disconnected");
					break;
				}
				Err(QueueError::Full) => {
					// Should not happen on try_recv
					error!("Unexpected Full error on try_recv");
					continue;
				}
			};

			Self::apply(engine, cmd);
		}
	}

	fn apply(engine: &MatchingEngine, cmd: EngineCommand) {
		match cmd {
			EngineCommand::Submit {
				symbol,
				side,
				price,
				volume,
			} => {
				if let Err(e) = engine.submit_order(&symbol, side, price, volume) {
					debug!(symbol, error = %e, "submit rejected");
				}
			}
			EngineCommand::Cancel { order_id } => {
				if !engine.cancel_order(order_id) {
					debug!(%order_id, "cancel ignored, order not resting");
				}
			}
			EngineCommand::Modify {
				order_id,
				price,
				volume,
			} => {
				if let Err(e) = engine.modify_order(order_id, price, volume) {
					debug!(%order_id, error = %e, "modify rejected");
				}
			}
		}
	}

	/// Signal shutdown and join the worker thread
	pub fn shutdown(&mut self) {
		self.shutdown.store(true, Ordering::Relaxed);
		if let Some(handle) = self.thread_handle.take() {
			if handle.join().is_err() {
				error!("engine worker thread panicked");
			}
		}
	}
}

impl Drop for EngineWorker {
	fn drop(&mut self) {
		self.shutdown();
	}
}
