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

//! Crucible Matching Engine
//!
//! This crate provides a deterministic limit-order matching engine with
//! a pre-trade risk gate. It maintains in-memory order books, applies
//! price-time priority, and folds every execution into a per-symbol
//! position and PnL ledger.
//!
//! Architecture:
//! - Per-symbol single-writer order books (never left crossed)
//! - Risk gate in front of every book with a one-way stop-loss halt
//! - Injected event sink for fills and alerts
//! - MPSC ingress queue + dedicated worker for feed-driven deployments
//! - SPSC event buffer for non-blocking downstream consumption

pub mod config;
pub mod engine;
pub mod event;
pub mod orderbook;
pub mod queue;
pub mod risk;
pub mod types;
pub mod worker;

pub use config::EngineSettings;
pub use engine::{EngineError, MatchingEngine};
pub use event::{
	Alert, AlertKind, EngineEvent, EventBuffer, EventBufferError, EventConsumer, EventProducer,
	EventSink, Fill, MemoryEventSink, SequenceNumber,
};
pub use orderbook::{BookError, OrderBook, PriceLevel};
pub use queue::{EngineCommand, IngressQueue, QueueError, QueueReceiver, QueueSender};
pub use risk::{RiskDecision, RiskGate, RiskLimits, RiskRejection};
pub use types::{Order, OrderId, OrderStatus, Price, Side};
pub use worker::EngineWorker;
