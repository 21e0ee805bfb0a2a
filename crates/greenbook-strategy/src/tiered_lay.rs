//! Tiered lay staking reference strategy.
//!
//! Lays one runner per race when its best available-to-lay price falls
//! in a configured band, with the stake tiered by zone. The shortest
//! priced runners are treated as favourites and never laid.

use crate::plugin::{Evaluation, EvaluationInput, StrategyPlugin};
use greenbook_core::{
    BetCandidate, Odds, PluginDescriptor, RunnerContext, Stake, Zone,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const PLUGIN_ID: &str = "tiered_lay_v1";

/// Odds bands and stakes. All bounds are inclusive except the strong
/// band's upper edge, which stops just short of the prime band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieredLayConfig {
    #[serde(default = "default_min_odds")]
    pub min_odds: Decimal,
    #[serde(default = "default_max_odds")]
    pub max_odds: Decimal,
    /// PRIME band lower bound; [prime_min, prime_max] -> stake_prime.
    #[serde(default = "default_prime_min")]
    pub prime_min: Decimal,
    #[serde(default = "default_prime_max")]
    pub prime_max: Decimal,
    /// SECONDARY band lower bound; [secondary_min, max_odds].
    #[serde(default = "default_secondary_min")]
    pub secondary_min: Decimal,
    #[serde(default = "default_stake_prime")]
    pub stake_prime: Decimal,
    #[serde(default = "default_stake_other")]
    pub stake_other: Decimal,
    /// Beyond this many minutes to start, the stake is halved.
    #[serde(default = "default_long_horizon_minutes")]
    pub long_horizon_minutes: f64,
    /// The N shortest-priced runners are excluded as favourites.
    #[serde(default = "default_favourites_excluded")]
    pub favourites_excluded: usize,
}

fn default_min_odds() -> Decimal {
    Decimal::new(300, 2) // 3.00
}
fn default_max_odds() -> Decimal {
    Decimal::new(449, 2) // 4.49
}
fn default_prime_min() -> Decimal {
    Decimal::new(350, 2) // 3.50
}
fn default_prime_max() -> Decimal {
    Decimal::new(399, 2) // 3.99
}
fn default_secondary_min() -> Decimal {
    Decimal::new(400, 2) // 4.00
}
fn default_stake_prime() -> Decimal {
    Decimal::new(300, 2) // 3.00
}
fn default_stake_other() -> Decimal {
    Decimal::new(200, 2) // 2.00
}
fn default_long_horizon_minutes() -> f64 {
    420.0
}
fn default_favourites_excluded() -> usize {
    2
}

impl Default for TieredLayConfig {
    fn default() -> Self {
        Self {
            min_odds: default_min_odds(),
            max_odds: default_max_odds(),
            prime_min: default_prime_min(),
            prime_max: default_prime_max(),
            secondary_min: default_secondary_min(),
            stake_prime: default_stake_prime(),
            stake_other: default_stake_other(),
            long_horizon_minutes: default_long_horizon_minutes(),
            favourites_excluded: default_favourites_excluded(),
        }
    }
}

impl TieredLayConfig {
    /// Classify a lay price into a zone, or None outside the band.
    pub fn classify(&self, odds: Odds) -> Option<Zone> {
        let p = odds.inner();
        if p < self.min_odds || p > self.max_odds {
            None
        } else if p >= self.prime_min && p <= self.prime_max {
            Some(Zone::Prime)
        } else if p < self.prime_min {
            Some(Zone::Strong)
        } else {
            // >= secondary_min by construction of the bands
            Some(Zone::Secondary)
        }
    }

    pub fn base_stake(&self, zone: Zone) -> Stake {
        match zone {
            Zone::Prime => Stake::new(self.stake_prime),
            Zone::Strong | Zone::Secondary => Stake::new(self.stake_other),
        }
    }
}

/// The reference strategy.
pub struct TieredLayStrategy;

impl TieredLayStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TieredLayStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyPlugin for TieredLayStrategy {
    fn default_descriptor(&self) -> PluginDescriptor {
        let mut descriptor = PluginDescriptor::new(PLUGIN_ID, "Tiered Lay Staking", "1.0.0");
        descriptor.priority = 10;
        descriptor.config =
            serde_json::to_value(TieredLayConfig::default()).unwrap_or(serde_json::Value::Null);
        descriptor
    }

    fn evaluate(&self, input: &EvaluationInput<'_>, config: &serde_json::Value) -> Evaluation {
        let config: TieredLayConfig = if config.is_null() {
            TieredLayConfig::default()
        } else {
            match serde_json::from_value(config.clone()) {
                Ok(c) => c,
                Err(e) => return Evaluation::skip(format!("invalid config: {e}")),
            }
        };

        // Runners with a usable lay price, shortest first.
        let mut priced: Vec<(&RunnerContext, Odds)> = input
            .market
            .runners
            .iter()
            .filter_map(|r| r.ladder.lay_odds().map(|odds| (r, odds)))
            .filter(|(_, odds)| odds.is_valid())
            .collect();
        if priced.is_empty() {
            return Evaluation::skip("no runners with lay prices");
        }
        priced.sort_by(|a, b| a.1.cmp(&b.1));

        // Favourites are never laid.
        let contenders = &priced[config.favourites_excluded.min(priced.len())..];
        if contenders.is_empty() {
            return Evaluation::reject("all priced runners are excluded favourites");
        }

        let minutes_to_start = input.market.minutes_to_start(input.now);
        let long_horizon = minutes_to_start > config.long_horizon_minutes;

        let mut qualifying: Vec<BetCandidate> = contenders
            .iter()
            .filter_map(|(runner, odds)| {
                let zone = config.classify(*odds)?;
                let mut stake = config.base_stake(zone);
                if long_horizon {
                    stake = stake.halved_clamped(Stake::new(input.settings.min_stake));
                }
                let liability = stake.liability(*odds);
                debug!(
                    market_id = %input.market.market_id,
                    runner = %runner.runner_name,
                    %odds,
                    %zone,
                    %stake,
                    "Qualifying lay candidate"
                );
                Some(BetCandidate {
                    market_id: input.market.market_id.clone(),
                    selection_id: runner.selection_id,
                    runner_name: runner.runner_name.clone(),
                    odds: *odds,
                    stake,
                    liability,
                    zone,
                    confidence: zone.confidence(),
                    reason: format!(
                        "lay {} at {} in {} zone, stake {}{}",
                        runner.runner_name,
                        odds,
                        zone,
                        stake,
                        if long_horizon { " (long horizon, halved)" } else { "" }
                    ),
                })
            })
            .collect();

        if qualifying.is_empty() {
            return Evaluation::reject(format!(
                "no runner in [{}, {}] outside the top {} favourites",
                config.min_odds, config.max_odds, config.favourites_excluded
            ));
        }

        // One bet per race: best zone first, then shortest price.
        qualifying.sort_by(|a, b| {
            a.zone
                .priority()
                .cmp(&b.zone.priority())
                .then(a.odds.cmp(&b.odds))
        });
        qualifying.truncate(1);

        let reason = qualifying[0].reason.clone();
        Evaluation::accept(qualifying, reason)
    }
}
