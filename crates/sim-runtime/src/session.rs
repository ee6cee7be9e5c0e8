//! The session: owned game state plus change notifications.
//!
//! A [`Session`] bundles the catalog, ledger, registry and tick engine with
//! the RTS/FPS view state. Rendering code subscribes to [`SessionEvent`]s
//! instead of reading a global store.

use crate::tick::{TickEngine, TickOutcome};
use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    validate_config, BuildingCatalog, BuildingId, BuildingKind, GridPos, SimConfig, UnitId,
    ValidationError,
};
use sim_econ::{
    try_place, try_place_named, Building, BuildingRegistry, DamageOutcome, LedgerSnapshot,
    PlacementError, ResourceLedger,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Which view the player is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum GameMode {
    /// Overhead strategy view.
    #[default]
    Rts,
    /// First-person possession of the selected unit.
    Fps,
}

impl GameMode {
    /// HUD caption.
    pub fn label(&self) -> &'static str {
        match self {
            GameMode::Rts => "COMMANDER",
            GameMode::Fps => "FIELD OPERATIVE",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    LedgerChanged(LedgerSnapshot),
    BuildingPlaced {
        id: BuildingId,
        kind: BuildingKind,
        position: GridPos,
    },
    BuildingRemoved(BuildingId),
    BuildingDestroyed {
        id: BuildingId,
        kind: BuildingKind,
        position: GridPos,
    },
    ModeChanged(GameMode),
    SelectionChanged(Option<UnitId>),
    PauseChanged(bool),
    Reset,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModeError {
    /// Possession needs a selected unit.
    #[error("no unit selected")]
    NoUnitSelected,
    /// Selection only changes from the strategy view.
    #[error("selection is locked while possessing a unit")]
    SelectionLocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&SessionEvent) + Send + Sync>;

/// Values the resource HUD renders each frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HudSnapshot {
    pub credits: Decimal,
    pub fuel: Decimal,
    pub power_production: Decimal,
    pub power_consumption: Decimal,
    pub buildings: usize,
    pub mode: &'static str,
    pub paused: bool,
}

pub struct Session {
    catalog: BuildingCatalog,
    ledger: ResourceLedger,
    registry: BuildingRegistry,
    ticker: TickEngine,
    mode: GameMode,
    selected: Option<UnitId>,
    paused: bool,
    /// Timestamp of the latest `tick` call.
    last_seen: Duration,
    /// Time accumulated towards the next firing when the pause began.
    pending_at_pause: Duration,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl Session {
    /// Validate `cfg` and start a session whose clock begins at `start`.
    pub fn new(cfg: SimConfig, start: Duration) -> Result<Self, ValidationError> {
        validate_config(&cfg)?;
        info!(
            credits = %cfg.starting_credits,
            fuel = %cfg.starting_fuel,
            building_types = cfg.buildings.len(),
            "session started"
        );
        Ok(Self {
            ledger: ResourceLedger::from_config(&cfg),
            registry: BuildingRegistry::new(),
            ticker: TickEngine::from_config(&cfg, start),
            catalog: cfg.buildings,
            mode: GameMode::Rts,
            selected: None,
            paused: false,
            last_seen: start,
            pending_at_pause: Duration::ZERO,
            observers: Vec::new(),
            next_subscription: 0,
        })
    }

    pub fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn registry(&self) -> &BuildingRegistry {
        &self.registry
    }

    pub fn tick_engine(&self) -> &TickEngine {
        &self.ticker
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn selected_unit(&self) -> Option<&UnitId> {
        self.selected.as_ref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&SessionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| sid.0 != id.0);
        self.observers.len() != before
    }

    fn emit(&mut self, event: SessionEvent) {
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
    }

    fn emit_ledger(&mut self) {
        let snapshot = self.ledger.snapshot();
        self.emit(SessionEvent::LedgerChanged(snapshot));
    }

    fn placed(&mut self, id: BuildingId, kind: BuildingKind, position: GridPos) {
        info!(%id, %kind, %position, "building placed");
        self.emit(SessionEvent::BuildingPlaced { id, kind, position });
        self.emit_ledger();
    }

    pub fn try_place(
        &mut self,
        kind: BuildingKind,
        position: GridPos,
    ) -> Result<BuildingId, PlacementError> {
        let id = try_place(
            &self.catalog,
            &mut self.ledger,
            &mut self.registry,
            kind,
            position,
        )?;
        self.placed(id, kind, position);
        Ok(id)
    }

    pub fn try_place_named(
        &mut self,
        kind: &str,
        position: GridPos,
    ) -> Result<BuildingId, PlacementError> {
        let id = try_place_named(
            &self.catalog,
            &mut self.ledger,
            &mut self.registry,
            kind,
            position,
        )?;
        if let Some(b) = self.registry.get(id) {
            let (kind, position) = (b.kind, b.position);
            self.placed(id, kind, position);
        }
        Ok(id)
    }

    /// Drive the economy; call once per rendered frame. Paused time is
    /// skipped, never credited; time accumulated before the pause is kept.
    pub fn tick(&mut self, now: Duration) -> TickOutcome {
        self.last_seen = now;
        if self.paused {
            return TickOutcome::Idle;
        }
        let outcome = self.ticker.tick(now, &self.registry, &mut self.ledger);
        if outcome.fired().is_some() {
            self.emit_ledger();
        }
        outcome
    }

    /// Combat hook: apply damage, removing the building at zero health.
    pub fn damage_building(&mut self, id: BuildingId, amount: f32) -> Option<DamageOutcome> {
        let outcome = self.registry.damage(id, amount)?;
        if let DamageOutcome::Destroyed(b) = &outcome {
            let event = SessionEvent::BuildingDestroyed {
                id: b.id,
                kind: b.kind,
                position: b.position,
            };
            self.emit(event);
        }
        Some(outcome)
    }

    pub fn repair_building(&mut self, id: BuildingId, amount: f32) -> Option<f32> {
        self.registry.repair(id, amount)
    }

    /// Demolish a building without refund. Absent ids are a no-op.
    pub fn remove_building(&mut self, id: BuildingId) -> Option<Building> {
        let removed = self.registry.remove(id)?;
        debug!(%id, "building removed");
        self.emit(SessionEvent::BuildingRemoved(id));
        Some(removed)
    }

    /// Change the selection. Only allowed from the strategy view.
    pub fn select_unit(&mut self, unit: Option<UnitId>) -> Result<(), ModeError> {
        if self.mode == GameMode::Fps {
            return Err(ModeError::SelectionLocked);
        }
        if self.selected != unit {
            self.selected = unit.clone();
            self.emit(SessionEvent::SelectionChanged(unit));
        }
        Ok(())
    }

    /// Possess the selected unit.
    pub fn enter_fps(&mut self) -> Result<(), ModeError> {
        if self.mode == GameMode::Fps {
            return Ok(());
        }
        let Some(unit) = &self.selected else {
            return Err(ModeError::NoUnitSelected);
        };
        info!(%unit, "possessing unit");
        self.mode = GameMode::Fps;
        self.emit(SessionEvent::ModeChanged(GameMode::Fps));
        Ok(())
    }

    /// Eject back to the strategy view and drop the selection.
    pub fn exit_fps(&mut self) {
        if self.mode != GameMode::Fps {
            return;
        }
        self.mode = GameMode::Rts;
        self.selected = None;
        self.emit(SessionEvent::ModeChanged(GameMode::Rts));
        self.emit(SessionEvent::SelectionChanged(None));
    }

    /// Returns the new pause state.
    ///
    /// The pause takes effect at the latest frame seen by [`Session::tick`].
    /// On resume the clock is rebased so that only the paused span is skipped.
    pub fn toggle_pause(&mut self) -> bool {
        if self.paused {
            let last_fire = self.last_seen.saturating_sub(self.pending_at_pause);
            self.ticker.rebase(last_fire);
        } else {
            self.pending_at_pause = self.last_seen.saturating_sub(self.ticker.last_fire());
        }
        self.paused = !self.paused;
        let paused = self.paused;
        self.emit(SessionEvent::PauseChanged(paused));
        paused
    }

    /// Back to a fresh session: starting stocks, no buildings, strategy view.
    pub fn reset(&mut self, now: Duration) {
        self.ledger.reset();
        self.registry.clear();
        self.ticker.rebase(now);
        self.last_seen = now;
        self.pending_at_pause = Duration::ZERO;
        self.mode = GameMode::Rts;
        self.selected = None;
        self.paused = false;
        info!("session reset");
        self.emit(SessionEvent::Reset);
        self.emit_ledger();
    }

    pub fn hud(&self) -> HudSnapshot {
        let ledger = self.ledger.snapshot();
        HudSnapshot {
            credits: ledger.credits,
            fuel: ledger.fuel,
            power_production: ledger.power_production,
            power_consumption: ledger.power_consumption,
            buildings: self.registry.len(),
            mode: self.mode.label(),
            paused: self.paused,
        }
    }
}
