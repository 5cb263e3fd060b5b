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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::risk::RiskLimits;

/// Engine configuration
///
/// `risk` supplies the default limits; `symbols` overrides them per
/// symbol. Symbols absent from both get the defaults, so the engine
/// never refuses a symbol for lack of configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
	/// Default risk limits applied to every symbol
	#[serde(default)]
	pub risk: RiskLimits,
	/// Per-symbol risk limit overrides
	#[serde(default)]
	pub symbols: HashMap<String, RiskLimits>,
}

impl EngineSettings {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("CRUCIBLE").separator("__"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("CRUCIBLE").separator("__"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Risk limits in effect for a symbol
	pub fn limits_for(&self, symbol: &str) -> RiskLimits {
		self.symbols.get(symbol).copied().unwrap_or(self.risk)
	}
}
