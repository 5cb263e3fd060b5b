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

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Limit price in deterministic fixed-point decimal.
///
/// Prices and PnL never go through floating point, so repeated
/// accumulation cannot drift.
pub type Price = Decimal;

/// Opaque order identifier
///
/// Identifiers are assigned monotonically by the engine at admission and
/// carry no content-derived meaning. They are unique across all symbols
/// handled by one engine, which is what makes cancel-by-id possible
/// without naming the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	Buy,
	Sell,
}

impl Side {
	/// Get the opposite side
	pub fn opposite(&self) -> Self {
		match self {
			Side::Buy => Side::Sell,
			Side::Sell => Side::Buy,
		}
	}
}

/// Order status
///
/// Terminal orders (`Filled`, `Cancelled`) are removed from the book
/// immediately; a status is terminal exactly when the order no longer
/// rests on a price level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
	Active,
	PartiallyFilled,
	Filled,
	Cancelled,
}

impl OrderStatus {
	/// Check whether no further transitions are possible
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
	}
}

/// A resting limit order
///
/// `seq` is the per-book arrival sequence number and is the sole
/// tie-breaker between orders at the same price: lower sequence means
/// earlier arrival means higher priority. Identifier values are never
/// used for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Engine-assigned identifier
	pub id: OrderId,
	/// Order side
	pub side: Side,
	/// Limit price (always positive)
	pub price: Price,
	/// Original volume
	pub volume: u64,
	/// Remaining unfilled volume (0 <= remaining <= volume)
	pub remaining: u64,
	/// Arrival sequence number, strictly increasing per book
	pub seq: u64,
	/// Lifecycle status
	pub status: OrderStatus,
}

impl Order {
	/// Create a new active order with its full volume remaining
	pub fn new(id: OrderId, side: Side, price: Price, volume: u64, seq: u64) -> Self {
		Self {
			id,
			side,
			price,
			volume,
			remaining: volume,
			seq,
			status: OrderStatus::Active,
		}
	}

	/// Apply a fill of `volume` against this order
	///
	/// Remaining volume reaching zero implies `Filled`; any other fill
	/// leaves the order `PartiallyFilled`.
	pub fn fill(&mut self, volume: u64) {
		debug_assert!(volume <= self.remaining, "fill exceeds remaining volume");
		self.remaining -= volume;
		self.status = if self.remaining == 0 {
			OrderStatus::Filled
		} else {
			OrderStatus::PartiallyFilled
		};
	}

	/// Check if the order is completely filled
	pub fn is_filled(&self) -> bool {
		self.remaining == 0
	}
}
