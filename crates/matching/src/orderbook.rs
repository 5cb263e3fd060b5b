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

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::event::Fill;
use crate::types::{Order, OrderId, OrderStatus, Price, Side};

/// Errors for order book operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookError {
	/// Non-positive price or volume, rejected before any state change
	#[error("invalid order: {0}")]
	InvalidOrder(String),
}

/// Price level in the order book
///
/// A price level contains all orders at a specific price, maintained in
/// arrival order (first-in-first-out). Orders are removed the moment
/// they become terminal; a level never holds a filled or cancelled
/// order, and an empty level is deleted from the book immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
	price: Price,
	/// Orders at this price level in arrival-sequence order
	orders: VecDeque<Order>,
	/// Total remaining volume of all orders at this level
	total_volume: u64,
}

impl PriceLevel {
	fn new(price: Price) -> Self {
		Self {
			price,
			orders: VecDeque::new(),
			total_volume: 0,
		}
	}

	/// Append an order at the back of the queue (time priority)
	pub fn push(&mut self, order: Order) {
		self.total_volume += order.remaining;
		self.orders.push_back(order);
	}

	/// Remove an order from the queue by id
	pub fn remove(&mut self, id: OrderId) -> Option<Order> {
		let pos = self.orders.iter().position(|o| o.id == id)?;
		let order = self.orders.remove(pos)?;
		self.total_volume -= order.remaining;
		Some(order)
	}

	/// Peek at the head order without removing it
	pub fn front(&self) -> Option<&Order> {
		self.orders.front()
	}

	/// Apply a fill of `volume` against the head order
	///
	/// Returns the head order if the fill completed it, in which case it
	/// has already been removed from the queue.
	pub fn fill_front(&mut self, volume: u64) -> Option<Order> {
		let front = self.orders.front_mut()?;
		front.fill(volume);
		self.total_volume -= volume;
		if front.is_filled() {
			self.orders.pop_front()
		} else {
			None
		}
	}

	/// Look up an order at this level by id
	pub fn get(&self, id: OrderId) -> Option<&Order> {
		self.orders.iter().find(|o| o.id == id)
	}

	/// Check if the price level is empty
	pub fn is_empty(&self) -> bool {
		self.orders.is_empty()
	}

	/// Price of this level
	pub fn price(&self) -> Price {
		self.price
	}

	/// Total remaining volume at this level
	pub fn total_volume(&self) -> u64 {
		self.total_volume
	}

	/// Number of orders at this level
	pub fn order_count(&self) -> usize {
		self.orders.len()
	}
}

/// Limit order book maintaining buy and sell sides (single-threaded)
///
/// This is a deterministic, single-threaded order book using BTreeMap
/// for price-sorted levels plus an id index for direct cancel/modify
/// lookup. All mutating operations are designed to be called from a
/// single writer.
///
/// Design characteristics:
/// - No concurrent access (no locks, no Arc)
/// - Price-time priority: best price first, ties broken by arrival
///   sequence number
/// - Buy side: highest price first (descending order via Reverse wrapper)
/// - Sell side: lowest price first (natural BTreeMap order)
/// - Immediate removal of terminal orders and empty levels, never
///   tombstones, so top-of-book queries stay O(1)
/// - Matching runs to exhaustion after every submit: the book is never
///   left crossed
#[derive(Debug)]
pub struct OrderBook {
	symbol: String,
	/// Buy side: price (high to low) -> PriceLevel
	bids: BTreeMap<Reverse<Price>, PriceLevel>,
	/// Sell side: price (low to high) -> PriceLevel
	asks: BTreeMap<Price, PriceLevel>,
	/// Resting order location index for cancel/modify
	index: HashMap<OrderId, (Side, Price)>,
	/// Next arrival sequence number to assign
	next_seq: u64,
	/// Next trade sequence number to assign
	next_trade_seq: u64,
	/// Volume accounting for the conservation invariant. `traded`
	/// counts the remaining volume consumed on both sides of each
	/// trade, so submitted == traded + cancelled + resting holds at
	/// all times.
	volume_submitted: u64,
	volume_traded: u64,
	volume_cancelled: u64,
}

impl OrderBook {
	/// Create a new empty order book for a symbol
	pub fn new(symbol: impl Into<String>) -> Self {
		Self {
			symbol: symbol.into(),
			bids: BTreeMap::new(),
			asks: BTreeMap::new(),
			index: HashMap::new(),
			next_seq: 1,
			next_trade_seq: 1,
			volume_submitted: 0,
			volume_traded: 0,
			volume_cancelled: 0,
		}
	}

	/// Get the symbol this book trades
	pub fn symbol(&self) -> &str {
		&self.symbol
	}

	/// Submit a new order and run the matching loop
	///
	/// The order receives the next arrival sequence number and is
	/// appended at the tail of its price level (created if absent).
	/// Matching then runs to exhaustion and the fills it produced are
	/// returned in execution order.
	pub fn submit(
		&mut self,
		id: OrderId,
		side: Side,
		price: Price,
		volume: u64,
	) -> Result<Vec<Fill>, BookError> {
		if price <= Price::ZERO {
			return Err(BookError::InvalidOrder(format!(
				"price must be positive, got {price}"
			)));
		}
		if volume == 0 {
			return Err(BookError::InvalidOrder(
				"volume must be positive".to_string(),
			));
		}

		let seq = self.next_seq;
		self.next_seq += 1;

		let order = Order::new(id, side, price, volume, seq);
		self.index.insert(id, (side, price));
		self.volume_submitted += volume;

		match side {
			Side::Buy => {
				self.bids
					.entry(Reverse(price))
					.or_insert_with(|| PriceLevel::new(price))
					.push(order);
			}
			Side::Sell => {
				self.asks
					.entry(price)
					.or_insert_with(|| PriceLevel::new(price))
					.push(order);
			}
		}

		let fills = self.run_matching();

		debug_assert!(!self.is_crossed(), "book left crossed after submit");
		debug_assert!(self.volume_conserved(), "volume conservation violated");

		Ok(fills)
	}

	/// Cancel a resting order
	///
	/// The order is physically removed from its price level (no
	/// tombstone) and the level is deleted if it was the last occupant.
	/// Returns false for unknown or already-terminal identifiers.
	pub fn cancel(&mut self, id: OrderId) -> bool {
		let Some((side, price)) = self.index.remove(&id) else {
			return false;
		};

		let removed = match side {
			Side::Buy => Self::remove_at(&mut self.bids, &Reverse(price), id),
			Side::Sell => Self::remove_at(&mut self.asks, &price, id),
		};

		match removed {
			Some(mut order) => {
				order.status = OrderStatus::Cancelled;
				self.volume_cancelled += order.remaining;
				debug_assert!(self.volume_conserved(), "volume conservation violated");
				true
			}
			None => {
				debug_assert!(false, "index referenced an order missing from its level");
				false
			}
		}
	}

	/// Replace a resting order with a new price and volume
	///
	/// Semantically cancel-followed-by-submit: the replacement receives
	/// a fresh identifier and sequence number and therefore forfeits its
	/// former queue position, even when only the volume shrinks.
	/// Validation happens before the cancel, so an invalid replacement
	/// leaves the resting order untouched. Returns `None` when `old_id`
	/// is unknown or already terminal.
	pub fn modify(
		&mut self,
		old_id: OrderId,
		new_id: OrderId,
		new_price: Price,
		new_volume: u64,
	) -> Result<Option<Vec<Fill>>, BookError> {
		if new_price <= Price::ZERO {
			return Err(BookError::InvalidOrder(format!(
				"price must be positive, got {new_price}"
			)));
		}
		if new_volume == 0 {
			return Err(BookError::InvalidOrder(
				"volume must be positive".to_string(),
			));
		}

		let Some(&(side, _)) = self.index.get(&old_id) else {
			return Ok(None);
		};

		self.cancel(old_id);
		self.submit(new_id, side, new_price, new_volume).map(Some)
	}

	/// Best bid as (price, total resting volume), O(1)
	pub fn best_bid(&self) -> Option<(Price, u64)> {
		self.bids
			.first_key_value()
			.map(|(_, level)| (level.price(), level.total_volume()))
	}

	/// Best ask as (price, total resting volume), O(1)
	pub fn best_ask(&self) -> Option<(Price, u64)> {
		self.asks
			.first_key_value()
			.map(|(_, level)| (level.price(), level.total_volume()))
	}

	/// Look up a resting order by id
	pub fn order(&self, id: OrderId) -> Option<&Order> {
		let &(side, price) = self.index.get(&id)?;
		let level = match side {
			Side::Buy => self.bids.get(&Reverse(price)),
			Side::Sell => self.asks.get(&price),
		}?;
		level.get(id)
	}

	/// Side of a resting order, if present
	pub fn side_of(&self, id: OrderId) -> Option<Side> {
		self.index.get(&id).map(|&(side, _)| side)
	}

	/// Check whether an order is still resting on the book
	pub fn contains(&self, id: OrderId) -> bool {
		self.index.contains_key(&id)
	}

	/// Total number of resting orders
	pub fn order_count(&self) -> usize {
		self.index.len()
	}

	/// Total remaining volume resting on both sides
	pub fn resting_volume(&self) -> u64 {
		self.bids
			.values()
			.chain(self.asks.values())
			.map(|level| level.total_volume())
			.sum()
	}

	/// Cumulative volume consumed by trades (both sides)
	pub fn volume_traded(&self) -> u64 {
		self.volume_traded
	}

	/// Cumulative remaining volume removed by cancels
	pub fn volume_cancelled(&self) -> u64 {
		self.volume_cancelled
	}

	/// Cumulative volume accepted by submits
	pub fn volume_submitted(&self) -> u64 {
		self.volume_submitted
	}

	/// Check the crossed-book condition: best bid >= best ask
	///
	/// A crossed book after a public operation completes is a
	/// programming defect, not a recoverable state.
	pub fn is_crossed(&self) -> bool {
		match (self.best_bid(), self.best_ask()) {
			(Some((bid, _)), Some((ask, _))) => bid >= ask,
			_ => false,
		}
	}

	/// Check the volume conservation invariant:
	/// submitted == traded + cancelled + resting
	pub fn volume_conserved(&self) -> bool {
		self.volume_submitted
			== self.volume_traded + self.volume_cancelled + self.resting_volume()
	}

	fn remove_at<K: Ord>(
		levels: &mut BTreeMap<K, PriceLevel>,
		key: &K,
		id: OrderId,
	) -> Option<Order> {
		let level = levels.get_mut(key)?;
		let order = level.remove(id)?;
		if level.is_empty() {
			levels.remove(key);
		}
		Some(order)
	}

	/// Run price-time priority matching to exhaustion
	///
	/// While the best bid price crosses the best ask price, the head
	/// orders of the two top levels trade min(remaining) volume at the
	/// maker's price (the order with the lower arrival sequence).
	/// Completed orders and emptied levels are removed immediately.
	/// This is the sole point where the crossing invariant is restored
	/// after a mutation.
	fn run_matching(&mut self) -> Vec<Fill> {
		let mut fills = Vec::new();

		loop {
			let crossed = match (self.bids.first_key_value(), self.asks.first_key_value()) {
				(Some((bid_key, _)), Some((ask_key, _))) => bid_key.0 >= *ask_key,
				_ => false,
			};
			if !crossed {
				break;
			}

			let (Some(mut bid_entry), Some(mut ask_entry)) =
				(self.bids.first_entry(), self.asks.first_entry())
			else {
				break;
			};

			let (buy_id, sell_id, price, volume) = {
				let (Some(buy), Some(sell)) = (bid_entry.get().front(), ask_entry.get().front())
				else {
					break;
				};
				// The maker is whichever order was resting first.
				let price = if buy.seq <= sell.seq {
					buy.price
				} else {
					sell.price
				};
				(buy.id, sell.id, price, buy.remaining.min(sell.remaining))
			};

			let buy_done = bid_entry.get_mut().fill_front(volume);
			let sell_done = ask_entry.get_mut().fill_front(volume);

			if bid_entry.get().is_empty() {
				bid_entry.remove();
			}
			if ask_entry.get().is_empty() {
				ask_entry.remove();
			}

			if buy_done.is_some() {
				self.index.remove(&buy_id);
			}
			if sell_done.is_some() {
				self.index.remove(&sell_id);
			}
			// Both sides consumed `volume` of remaining.
			self.volume_traded += 2 * volume;

			let seq = self.next_trade_seq;
			self.next_trade_seq += 1;

			fills.push(Fill {
				symbol: self.symbol.clone(),
				buy_order_id: buy_id,
				sell_order_id: sell_id,
				price,
				volume,
				seq,
			});
		}

		fills
	}
}
