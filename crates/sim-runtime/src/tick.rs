//! Frame-driven economy tick.
//!
//! The engine accumulates wall-clock time until at least one interval has
//! passed, then applies every production rule scaled by the *whole* elapsed
//! time and restarts the clock at `now`. There is no fixed-step remainder;
//! only the sub-microsecond tail that [`seconds`] cannot express is carried
//! into the next firing.

use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{ResourceKind, SimConfig};
use sim_econ::{BuildingRegistry, ResourceLedger};
use std::time::Duration;
use tracing::debug;

/// Default firing threshold.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// What one firing produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub elapsed: Duration,
    pub credits_added: Decimal,
    pub fuel_added: Decimal,
    pub power_production: Decimal,
    pub power_consumption: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Less than one interval since the last firing; nothing changed.
    Idle,
    Fired(TickReport),
}

impl TickOutcome {
    pub fn fired(&self) -> Option<&TickReport> {
        match self {
            TickOutcome::Idle => None,
            TickOutcome::Fired(r) => Some(r),
        }
    }
}

/// Elapsed time in seconds at microsecond resolution. Saturates at
/// `Decimal::MAX`.
fn seconds(d: Duration) -> Decimal {
    i64::try_from(d.as_micros())
        .map(|us| Decimal::new(us, 6))
        .unwrap_or(Decimal::MAX)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickEngine {
    last_fire: Duration,
    interval: Duration,
}

impl TickEngine {
    /// Start the clock at `start` with a one second threshold.
    pub fn new(start: Duration) -> Self {
        Self::with_interval(start, DEFAULT_TICK_INTERVAL)
    }

    /// A zero interval is raised to one microsecond.
    pub fn with_interval(start: Duration, interval: Duration) -> Self {
        Self {
            last_fire: start,
            interval: interval.max(Duration::from_micros(1)),
        }
    }

    pub fn from_config(cfg: &SimConfig, start: Duration) -> Self {
        Self::with_interval(start, Duration::from_millis(cfg.tick_interval_ms))
    }

    pub fn last_fire(&self) -> Duration {
        self.last_fire
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Move the clock to `now` without producing anything.
    pub fn rebase(&mut self, now: Duration) {
        self.last_fire = now;
    }

    /// Advance the economy to `now`.
    ///
    /// Fires once `now - last_fire` reaches the interval. On firing, credit
    /// and fuel producers add `rate * elapsed` to their stockpile, while power
    /// is a flow: `power_production` is set to the plain sum of power rates
    /// and `power_consumption` to the sum of draws, both overwritten rather
    /// than accumulated. Arithmetic saturates at `Decimal::MAX`.
    ///
    /// Timestamps earlier than the last firing count as zero elapsed time.
    pub fn tick(
        &mut self,
        now: Duration,
        registry: &BuildingRegistry,
        ledger: &mut ResourceLedger,
    ) -> TickOutcome {
        let elapsed = now.saturating_sub(self.last_fire);
        if elapsed < self.interval {
            return TickOutcome::Idle;
        }

        let secs = seconds(elapsed);
        let mut credits = Decimal::ZERO;
        let mut fuel = Decimal::ZERO;
        let mut power = Decimal::ZERO;
        for building in registry.iter() {
            let Some(rule) = building.produces else {
                continue;
            };
            let produced = rule.rate.saturating_mul(secs);
            match rule.resource {
                ResourceKind::Credits => credits = credits.saturating_add(produced),
                ResourceKind::Fuel => fuel = fuel.saturating_add(produced),
                // Power is a flow: the rate is the supply.
                ResourceKind::Power => power = power.saturating_add(rule.rate),
            }
        }
        ledger.add_credits(credits);
        ledger.add_fuel(fuel);
        ledger.set_power_production(power);
        ledger.set_power_consumption(registry.total_power_consumption());
        // Keep the sub-microsecond tail pending for the next firing.
        self.last_fire = now - Duration::from_nanos(u64::from(elapsed.subsec_nanos() % 1_000));

        let report = TickReport {
            elapsed,
            credits_added: credits,
            fuel_added: fuel,
            power_production: ledger.power_production(),
            power_consumption: ledger.power_consumption(),
        };
        debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            credits = %report.credits_added,
            fuel = %report.fuel_added,
            power_in = %report.power_production,
            power_out = %report.power_consumption,
            "economy tick"
        );
        TickOutcome::Fired(report)
    }
}
