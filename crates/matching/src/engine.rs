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

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::EngineSettings;
use crate::event::{Alert, AlertKind, EngineEvent, EventSink, Fill};
use crate::orderbook::{BookError, OrderBook};
use crate::risk::{RiskDecision, RiskGate, RiskRejection};
use crate::types::{OrderId, Price, Side};

/// Errors returned by the engine façade
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
	#[error("invalid order: {0}")]
	InvalidOrder(String),
	#[error("risk rejected: {0}")]
	Rejected(#[from] RiskRejection),
	#[error("order {0} not found")]
	NotFound(OrderId),
}

impl From<BookError> for EngineError {
	fn from(e: BookError) -> Self {
		match e {
			BookError::InvalidOrder(msg) => EngineError::InvalidOrder(msg),
		}
	}
}

/// Book and gate for one symbol, owned by one DashMap entry
struct MarketState {
	book: OrderBook,
	gate: RiskGate,
}

impl MarketState {
	fn new(symbol: &str, settings: &EngineSettings) -> Self {
		Self {
			book: OrderBook::new(symbol),
			gate: RiskGate::new(symbol, settings.limits_for(symbol)),
		}
	}
}

/// Matching engine façade composing order books and risk gates
///
/// Each symbol owns one `(OrderBook, RiskGate)` pair behind a DashMap
/// entry, so mutations on one symbol are totally ordered (the entry's
/// exclusive guard is the single-writer discipline) while distinct
/// symbols proceed in parallel.
///
/// Control flow per submission: risk check first (a rejected order
/// never touches the book), then book submit and the matching loop,
/// then every fill is folded into the gate for both participating
/// orders before the call returns. Fills and alerts are published
/// synchronously to the injected sink; sinks must return promptly and
/// must not call back into the engine.
pub struct MatchingEngine {
	markets: DashMap<String, MarketState>,
	/// Engine-wide order location index for cancel/modify by id alone
	order_index: DashMap<OrderId, String>,
	/// Next order identifier, unique across all symbols
	next_order_id: AtomicU64,
	settings: EngineSettings,
	sink: Arc<dyn EventSink>,
}

impl MatchingEngine {
	/// Create an engine with the given settings and event sink
	pub fn new(settings: EngineSettings, sink: Arc<dyn EventSink>) -> Self {
		info!("matching engine created");
		Self {
			markets: DashMap::new(),
			order_index: DashMap::new(),
			next_order_id: AtomicU64::new(1),
			settings,
			sink,
		}
	}

	/// Submit a limit order for a symbol
	///
	/// Returns the engine-assigned identifier on admission. A risk
	/// rejection publishes an alert and returns the rejection without
	/// touching the book; invalid price/volume likewise leaves all
	/// state unchanged.
	pub fn submit_order(
		&self,
		symbol: &str,
		side: Side,
		price: Price,
		volume: u64,
	) -> Result<OrderId, EngineError> {
		let mut market = self.market_entry(symbol);

		if let RiskDecision::Rejected(rejection) = market.gate.check(side, volume) {
			drop(market);
			self.publish_rejection(symbol, &rejection);
			return Err(EngineError::Rejected(rejection));
		}

		let id = self.next_id();
		let fills = market.book.submit(id, side, price, volume)?;

		if market.book.contains(id) {
			self.order_index.insert(id, symbol.to_string());
		}
		self.settle_fills(&mut market, &fills);

		Ok(id)
	}

	/// Cancel an order by id alone
	///
	/// Returns true only when this call removed a resting order.
	/// Unknown, already-filled and already-cancelled ids return false;
	/// cancellation is idempotent.
	pub fn cancel_order(&self, order_id: OrderId) -> bool {
		// Resolve the symbol and release the index guard before taking
		// the market entry; locks are only ever held markets -> index.
		let Some(symbol) = self
			.order_index
			.get(&order_id)
			.map(|entry| entry.value().clone())
		else {
			return false;
		};

		let Some(mut market) = self.markets.get_mut(&symbol) else {
			return false;
		};
		let cancelled = market.book.cancel(order_id);
		drop(market);

		self.order_index.remove(&order_id);
		cancelled
	}

	/// Replace a resting order with a new price and volume
	///
	/// Semantically cancel-plus-resubmit: the replacement gets a fresh
	/// identifier and forfeits queue priority. The replacement is
	/// risk-checked before the original is cancelled, so a rejected
	/// modify leaves the resting order in place.
	pub fn modify_order(
		&self,
		order_id: OrderId,
		price: Price,
		volume: u64,
	) -> Result<OrderId, EngineError> {
		let Some(symbol) = self
			.order_index
			.get(&order_id)
			.map(|entry| entry.value().clone())
		else {
			return Err(EngineError::NotFound(order_id));
		};

		let mut market = self
			.markets
			.get_mut(&symbol)
			.ok_or(EngineError::NotFound(order_id))?;

		// The order may have filled since the index was read.
		let Some(side) = market.book.side_of(order_id) else {
			drop(market);
			self.order_index.remove(&order_id);
			return Err(EngineError::NotFound(order_id));
		};

		if let RiskDecision::Rejected(rejection) = market.gate.check(side, volume) {
			drop(market);
			self.publish_rejection(&symbol, &rejection);
			return Err(EngineError::Rejected(rejection));
		}

		let new_id = self.next_id();
		let fills = market
			.book
			.modify(order_id, new_id, price, volume)?
			.ok_or(EngineError::NotFound(order_id))?;

		self.order_index.remove(&order_id);
		if market.book.contains(new_id) {
			self.order_index.insert(new_id, symbol.clone());
		}
		self.settle_fills(&mut market, &fills);

		Ok(new_id)
	}

	/// Fold an execution report from an external venue into the ledger
	///
	/// Fills produced by this engine's own matching net the per-symbol
	/// ledger flat (both sides fold); one-sided exposure enters through
	/// execution reports recorded here.
	pub fn record_fill(&self, symbol: &str, side: Side, volume: u64, price: Price) {
		let mut market = self.market_entry(symbol);
		let alert = market.gate.on_fill(side, volume, price);
		drop(market);
		if let Some(alert) = alert {
			warn!(symbol, detail = %alert.detail, "stop-loss breached");
			self.sink.publish(EngineEvent::Alert(alert));
		}
	}

	/// Best bid of a symbol's book as (price, total resting volume)
	pub fn best_bid(&self, symbol: &str) -> Option<(Price, u64)> {
		self.markets.get(symbol)?.book.best_bid()
	}

	/// Best ask of a symbol's book as (price, total resting volume)
	pub fn best_ask(&self, symbol: &str) -> Option<(Price, u64)> {
		self.markets.get(symbol)?.book.best_ask()
	}

	/// Signed net position for a symbol (zero if never traded)
	pub fn position(&self, symbol: &str) -> i64 {
		self.markets
			.get(symbol)
			.map(|m| m.gate.position())
			.unwrap_or(0)
	}

	/// Realized PnL for a symbol (zero if never traded)
	pub fn realized_pnl(&self, symbol: &str) -> Decimal {
		self.markets
			.get(symbol)
			.map(|m| m.gate.realized_pnl())
			.unwrap_or(Decimal::ZERO)
	}

	/// Whether a symbol's gate has halted trading
	pub fn is_halted(&self, symbol: &str) -> bool {
		self.markets
			.get(symbol)
			.map(|m| m.gate.is_halted())
			.unwrap_or(false)
	}

	fn market_entry(&self, symbol: &str) -> RefMut<'_, String, MarketState> {
		self.markets
			.entry(symbol.to_string())
			.or_insert_with(|| MarketState::new(symbol, &self.settings))
	}

	fn next_id(&self) -> OrderId {
		OrderId(self.next_order_id.fetch_add(1, Ordering::Relaxed))
	}

	/// Fold fills into the gate and publish, still holding the entry
	///
	/// Both participating orders fold (buy then sell), so internal
	/// crosses net the ledger flat. Fills publish in execution order,
	/// followed by the halt alert if one of the folds tripped it.
	fn settle_fills(&self, market: &mut MarketState, fills: &[Fill]) {
		for fill in fills {
			let buy_alert = market.gate.on_fill(Side::Buy, fill.volume, fill.price);
			let sell_alert = market.gate.on_fill(Side::Sell, fill.volume, fill.price);

			if !market.book.contains(fill.buy_order_id) {
				self.order_index.remove(&fill.buy_order_id);
			}
			if !market.book.contains(fill.sell_order_id) {
				self.order_index.remove(&fill.sell_order_id);
			}

			self.sink.publish(EngineEvent::Fill(fill.clone()));
			for alert in [buy_alert, sell_alert].into_iter().flatten() {
				warn!(symbol = %fill.symbol, detail = %alert.detail, "stop-loss breached");
				self.sink.publish(EngineEvent::Alert(alert));
			}
		}
	}

	fn publish_rejection(&self, symbol: &str, rejection: &RiskRejection) {
		let kind = match rejection {
			RiskRejection::PositionLimitExceeded { .. } => AlertKind::PositionLimit,
			RiskRejection::OrderSizeExceeded { .. } => AlertKind::OrderSize,
			RiskRejection::TradingHalted => AlertKind::Halted,
		};
		warn!(symbol, reason = %rejection, "order rejected by risk gate");
		self.sink.publish(EngineEvent::Alert(Alert {
			kind,
			symbol: symbol.to_string(),
			detail: rejection.to_string(),
		}));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::MemoryEventSink;
	use crate::risk::RiskLimits;
	use std::str::FromStr;

	fn px(s: &str) -> Price {
		Price::from_str(s).unwrap()
	}

	fn engine_with_sink(settings: EngineSettings) -> (MatchingEngine, Arc<MemoryEventSink>) {
		let sink = Arc::new(MemoryEventSink::new());
		(MatchingEngine::new(settings, sink.clone()), sink)
	}

	#[test]
	fn test_submit_and_match_publishes_fill() {
		let (engine, sink) = engine_with_sink(EngineSettings::default());

		let buy = engine
			.submit_order("BTC-USDT", Side::Buy, px("100.0"), 10)
			.unwrap();
		let sell = engine
			.submit_order("BTC-USDT", Side::Sell, px("99.5"), 5)
			.unwrap();

		let fills = sink.fills();
		assert_eq!(fills.len(), 1);
		assert_eq!(fills[0].buy_order_id, buy);
		assert_eq!(fills[0].sell_order_id, sell);
		assert_eq!(fills[0].price, px("100.0"));
		assert_eq!(engine.best_bid("BTC-USDT"), Some((px("100.0"), 5)));
	}

	#[test]
	fn test_risk_rejection_leaves_book_untouched() {
		let settings = EngineSettings {
			risk: RiskLimits {
				max_order_size: 50,
				..Default::default()
			},
			..Default::default()
		};
		let (engine, sink) = engine_with_sink(settings);

		let result = engine.submit_order("BTC-USDT", Side::Buy, px("100.0"), 60);
		assert!(matches!(
			result,
			Err(EngineError::Rejected(RiskRejection::OrderSizeExceeded { .. }))
		));

		assert_eq!(engine.best_bid("BTC-USDT"), None);
		let alerts = sink.alerts();
		assert_eq!(alerts.len(), 1);
		assert_eq!(alerts[0].kind, AlertKind::OrderSize);
	}

	#[test]
	fn test_invalid_order_is_an_error_not_a_rejection() {
		let (engine, sink) = engine_with_sink(EngineSettings::default());

		let result = engine.submit_order("BTC-USDT", Side::Buy, px("0"), 10);
		assert!(matches!(result, Err(EngineError::InvalidOrder(_))));
		assert!(sink.is_empty());
	}

	#[test]
	fn test_cancel_by_id_without_symbol() {
		let (engine, _sink) = engine_with_sink(EngineSettings::default());

		let id = engine
			.submit_order("BTC-USDT", Side::Buy, px("100.0"), 10)
			.unwrap();
		assert!(engine.cancel_order(id));
		assert!(!engine.cancel_order(id));
		assert_eq!(engine.best_bid("BTC-USDT"), None);
	}

	#[test]
	fn test_cancel_filled_order_returns_false() {
		let (engine, _sink) = engine_with_sink(EngineSettings::default());

		let buy = engine
			.submit_order("BTC-USDT", Side::Buy, px("100.0"), 5)
			.unwrap();
		engine
			.submit_order("BTC-USDT", Side::Sell, px("100.0"), 5)
			.unwrap();

		assert!(!engine.cancel_order(buy));
	}

	#[test]
	fn test_modify_unknown_id_is_not_found() {
		let (engine, _sink) = engine_with_sink(EngineSettings::default());
		assert_eq!(
			engine.modify_order(OrderId(42), px("100.0"), 5),
			Err(EngineError::NotFound(OrderId(42)))
		);
	}

	#[test]
	fn test_rejected_modify_keeps_original_resting() {
		let settings = EngineSettings {
			risk: RiskLimits {
				max_order_size: 50,
				..Default::default()
			},
			..Default::default()
		};
		let (engine, _sink) = engine_with_sink(settings);

		let id = engine
			.submit_order("BTC-USDT", Side::Buy, px("100.0"), 10)
			.unwrap();
		let result = engine.modify_order(id, px("101.0"), 60);
		assert!(matches!(result, Err(EngineError::Rejected(_))));

		assert_eq!(engine.best_bid("BTC-USDT"), Some((px("100.0"), 10)));
		assert!(engine.cancel_order(id));
	}

	#[test]
	fn test_internal_cross_nets_ledger_flat() {
		let (engine, _sink) = engine_with_sink(EngineSettings::default());

		engine
			.submit_order("BTC-USDT", Side::Buy, px("100.0"), 5)
			.unwrap();
		engine
			.submit_order("BTC-USDT", Side::Sell, px("100.0"), 5)
			.unwrap();

		assert_eq!(engine.position("BTC-USDT"), 0);
		assert_eq!(engine.realized_pnl("BTC-USDT"), Decimal::ZERO);
		assert!(!engine.is_halted("BTC-USDT"));
	}

	#[test]
	fn test_record_fill_builds_exposure_and_halts() {
		let settings = EngineSettings {
			risk: RiskLimits {
				stop_loss_floor: px("-500"),
				..Default::default()
			},
			..Default::default()
		};
		let (engine, sink) = engine_with_sink(settings);

		engine.record_fill("BTC-USDT", Side::Buy, 4, px("100.0"));
		assert_eq!(engine.position("BTC-USDT"), 4);
		assert!(!engine.is_halted("BTC-USDT"));

		engine.record_fill("BTC-USDT", Side::Buy, 2, px("100.0"));
		assert!(engine.is_halted("BTC-USDT"));
		assert_eq!(sink.alerts().len(), 1);
		assert_eq!(sink.alerts()[0].kind, AlertKind::StopLoss);

		// A halted symbol rejects every new order.
		assert!(matches!(
			engine.submit_order("BTC-USDT", Side::Buy, px("100.0"), 1),
			Err(EngineError::Rejected(RiskRejection::TradingHalted))
		));
	}

	#[test]
	fn test_symbols_are_independent() {
		let settings = EngineSettings {
			risk: RiskLimits {
				stop_loss_floor: px("-100"),
				..Default::default()
			},
			..Default::default()
		};
		let (engine, _sink) = engine_with_sink(settings);

		engine.record_fill("BTC-USDT", Side::Buy, 2, px("100.0"));
		assert!(engine.is_halted("BTC-USDT"));

		// The other symbol's gate and book are untouched.
		assert!(!engine.is_halted("ETH-USDT"));
		let id = engine
			.submit_order("ETH-USDT", Side::Buy, px("50.0"), 10)
			.unwrap();
		assert_eq!(engine.best_bid("ETH-USDT"), Some((px("50.0"), 10)));
		assert!(engine.cancel_order(id));
	}

	#[test]
	fn test_order_ids_are_unique_across_symbols() {
		let (engine, _sink) = engine_with_sink(EngineSettings::default());

		let a = engine
			.submit_order("BTC-USDT", Side::Buy, px("100.0"), 1)
			.unwrap();
		let b = engine
			.submit_order("ETH-USDT", Side::Buy, px("50.0"), 1)
			.unwrap();
		assert_ne!(a, b);
	}
}
