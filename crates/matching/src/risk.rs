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

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::event::{Alert, AlertKind};
use crate::types::{Price, Side};

/// Risk limits for one symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskLimits {
	/// Maximum absolute signed position
	pub max_position: i64,
	/// Maximum volume of a single order
	pub max_order_size: u64,
	/// Realized PnL dropping below this floor halts trading
	pub stop_loss_floor: Decimal,
}

impl Default for RiskLimits {
	fn default() -> Self {
		Self {
			max_position: 1_000,
			max_order_size: 500,
			stop_loss_floor: Decimal::from(-10_000),
		}
	}
}

/// Reasons the risk gate refuses an order
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskRejection {
	#[error("position limit exceeded for {symbol}: projected {projected}, limit {limit}")]
	PositionLimitExceeded {
		symbol: String,
		projected: i64,
		limit: i64,
	},
	#[error("order size {volume} exceeds limit {limit}")]
	OrderSizeExceeded { volume: u64, limit: u64 },
	#[error("trading halted")]
	TradingHalted,
}

/// Outcome of a risk check
#[derive(Debug, Clone, PartialEq)]
pub enum RiskDecision {
	Admitted,
	Rejected(RiskRejection),
}

impl RiskDecision {
	pub fn is_admitted(&self) -> bool {
		matches!(self, RiskDecision::Admitted)
	}
}

/// Pre-trade risk gate for a single symbol
///
/// The gate sits in front of the order book: every order is checked
/// against the symbol's limits before it may touch the book, and every
/// fill is folded into the position and realized-PnL ledger afterwards.
///
/// Halting is one-way. Once realized PnL drops below the stop-loss floor
/// the gate transitions to Halted, rejects every subsequent order, and
/// never resumes on its own; only constructing a fresh gate restores
/// trading. A losing strategy must not be able to trade itself back.
#[derive(Debug)]
pub struct RiskGate {
	symbol: String,
	limits: RiskLimits,
	/// Signed net position: buys add, sells subtract
	position: i64,
	/// Realized PnL: sells add price*volume, buys subtract
	realized_pnl: Decimal,
	trading_enabled: bool,
}

impl RiskGate {
	/// Create a gate with zero position and PnL, trading enabled
	pub fn new(symbol: impl Into<String>, limits: RiskLimits) -> Self {
		Self {
			symbol: symbol.into(),
			limits,
			position: 0,
			realized_pnl: Decimal::ZERO,
			trading_enabled: true,
		}
	}

	/// Check whether an order may be admitted
	///
	/// Pure: no state changes regardless of outcome. Checks run in a
	/// fixed order so rejection reasons are deterministic: halted
	/// first, then the projected position against `max_position`, then
	/// the order volume against `max_order_size`.
	pub fn check(&self, side: Side, volume: u64) -> RiskDecision {
		if !self.trading_enabled {
			return RiskDecision::Rejected(RiskRejection::TradingHalted);
		}

		// Projection assumes the full volume executes at once.
		let signed = match side {
			Side::Buy => volume as i64,
			Side::Sell => -(volume as i64),
		};
		let projected = self.position + signed;
		if projected.abs() > self.limits.max_position {
			return RiskDecision::Rejected(RiskRejection::PositionLimitExceeded {
				symbol: self.symbol.clone(),
				projected,
				limit: self.limits.max_position,
			});
		}

		if volume > self.limits.max_order_size {
			return RiskDecision::Rejected(RiskRejection::OrderSizeExceeded {
				volume,
				limit: self.limits.max_order_size,
			});
		}

		RiskDecision::Admitted
	}

	/// Fold one side of an execution into the ledger
	///
	/// Buys add volume to the position and subtract price*volume from
	/// realized PnL; sells do the opposite. Returns a stop-loss alert
	/// exactly once, on the fill whose fold first takes PnL below the
	/// floor; that same fold flips the gate to Halted.
	pub fn on_fill(&mut self, side: Side, volume: u64, price: Price) -> Option<Alert> {
		let notional = price * Decimal::from(volume);
		match side {
			Side::Buy => {
				self.position += volume as i64;
				self.realized_pnl -= notional;
			}
			Side::Sell => {
				self.position -= volume as i64;
				self.realized_pnl += notional;
			}
		}

		if self.trading_enabled && self.realized_pnl < self.limits.stop_loss_floor {
			self.trading_enabled = false;
			return Some(Alert {
				kind: AlertKind::StopLoss,
				symbol: self.symbol.clone(),
				detail: format!(
					"realized pnl {} breached stop-loss floor {}, trading halted",
					self.realized_pnl, self.limits.stop_loss_floor
				),
			});
		}
		None
	}

	/// Current signed net position
	pub fn position(&self) -> i64 {
		self.position
	}

	/// Current realized PnL
	pub fn realized_pnl(&self) -> Decimal {
		self.realized_pnl
	}

	/// Whether the gate has halted trading
	pub fn is_halted(&self) -> bool {
		!self.trading_enabled
	}

	/// Limits this gate enforces
	pub fn limits(&self) -> &RiskLimits {
		&self.limits
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::str::FromStr;

	fn px(s: &str) -> Price {
		Price::from_str(s).unwrap()
	}

	fn gate(limits: RiskLimits) -> RiskGate {
		RiskGate::new("BTC-USDT", limits)
	}

	#[test]
	fn test_admits_within_limits() {
		let gate = gate(RiskLimits::default());
		assert!(gate.check(Side::Buy, 100).is_admitted());
		assert!(gate.check(Side::Sell, 500).is_admitted());
	}

	#[test]
	fn test_position_limit_uses_projection() {
		let mut gate = gate(RiskLimits {
			max_position: 100,
			..Default::default()
		});
		gate.on_fill(Side::Buy, 80, px("10"));

		assert!(gate.check(Side::Buy, 20).is_admitted());
		assert_eq!(
			gate.check(Side::Buy, 21),
			RiskDecision::Rejected(RiskRejection::PositionLimitExceeded {
				symbol: "BTC-USDT".to_string(),
				projected: 101,
				limit: 100,
			})
		);
		// The limit is on absolute position, shorts count too.
		assert!(gate.check(Side::Sell, 180).is_admitted());
		assert!(!gate.check(Side::Sell, 181).is_admitted());
	}

	#[test]
	fn test_position_limit_checked_before_order_size() {
		// An order failing both checks reports the position breach.
		let gate = gate(RiskLimits {
			max_position: 100,
			max_order_size: 50,
			..Default::default()
		});
		assert!(matches!(
			gate.check(Side::Buy, 200),
			RiskDecision::Rejected(RiskRejection::PositionLimitExceeded { .. })
		));
		assert!(matches!(
			gate.check(Side::Buy, 60),
			RiskDecision::Rejected(RiskRejection::OrderSizeExceeded {
				volume: 60,
				limit: 50
			})
		));
	}

	#[test]
	fn test_check_is_pure() {
		let gate = gate(RiskLimits {
			max_position: 10,
			..Default::default()
		});
		let _ = gate.check(Side::Buy, 100);
		let _ = gate.check(Side::Buy, 100);
		assert_eq!(gate.position(), 0);
		assert_eq!(gate.realized_pnl(), Decimal::ZERO);
		assert!(!gate.is_halted());
	}

	#[test]
	fn test_fill_folding() {
		let mut gate = gate(RiskLimits::default());

		gate.on_fill(Side::Buy, 10, px("100.0"));
		assert_eq!(gate.position(), 10);
		assert_eq!(gate.realized_pnl(), px("-1000.0"));

		gate.on_fill(Side::Sell, 10, px("101.0"));
		assert_eq!(gate.position(), 0);
		assert_eq!(gate.realized_pnl(), px("10.0"));
	}

	#[test]
	fn test_stop_loss_halts_exactly_once() {
		let mut gate = gate(RiskLimits {
			stop_loss_floor: px("-500"),
			..Default::default()
		});

		assert!(gate.on_fill(Side::Buy, 4, px("100.0")).is_none());
		assert!(!gate.is_halted());

		// This buy takes realized PnL to -600, through the floor.
		let alert = gate.on_fill(Side::Buy, 2, px("100.0"));
		assert!(alert.is_some());
		assert_eq!(alert.unwrap().kind, AlertKind::StopLoss);
		assert!(gate.is_halted());

		// Further losing fills still fold but never re-alert.
		assert!(gate.on_fill(Side::Buy, 1, px("100.0")).is_none());
		assert!(gate.is_halted());
	}

	#[test]
	fn test_halt_is_one_way() {
		let mut gate = gate(RiskLimits {
			stop_loss_floor: px("-100"),
			..Default::default()
		});
		gate.on_fill(Side::Buy, 2, px("100.0"));
		assert!(gate.is_halted());

		// PnL recovering above the floor does not resume trading.
		gate.on_fill(Side::Sell, 2, px("200.0"));
		assert!(gate.realized_pnl() > px("-100"));
		assert!(gate.is_halted());
		assert_eq!(
			gate.check(Side::Buy, 1),
			RiskDecision::Rejected(RiskRejection::TradingHalted)
		);
	}

	#[test]
	fn test_halted_rejection_takes_precedence() {
		let mut gate = gate(RiskLimits {
			max_order_size: 10,
			stop_loss_floor: px("-50"),
			..Default::default()
		});
		gate.on_fill(Side::Buy, 1, px("100.0"));
		assert!(gate.is_halted());

		// Oversized order while halted reports the halt, not the size.
		assert_eq!(
			gate.check(Side::Buy, 100),
			RiskDecision::Rejected(RiskRejection::TradingHalted)
		);
	}
}
