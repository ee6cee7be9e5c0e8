#![deny(warnings)]

//! Economy state for Iron Command: the resource ledger, the building
//! registry, and the placement transaction that ties them together.
//!
//! - [`ResourceLedger`] holds credits, fuel and the current power figures.
//!   Debits are all-or-nothing; stockpiles never go below zero.
//! - [`BuildingRegistry`] owns the live buildings and derives aggregate
//!   power production and consumption on demand.
//! - [`try_place`] charges a building's cost and inserts it as a single
//!   transaction: a rejected placement leaves both ledger and registry
//!   exactly as they were.

use rust_decimal::Decimal;
use serde::Serialize;
use sim_core::{
    BuildingCatalog, BuildingId, BuildingKind, BuildingSpec, Cost, GridPos, Production,
    ResourceKind, SimConfig,
};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

fn clamp_input(amount: Decimal, what: &'static str) -> Decimal {
    if amount < Decimal::ZERO {
        warn!(%amount, what, "negative amount clamped to zero");
        return Decimal::ZERO;
    }
    amount
}

/// Point-in-time copy of the ledger, handed to observers and the HUD.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub credits: Decimal,
    pub fuel: Decimal,
    pub power_production: Decimal,
    pub power_consumption: Decimal,
}

impl LedgerSnapshot {
    /// Production minus consumption; negative when the grid is overdrawn.
    pub fn power_balance(&self) -> Decimal {
        self.power_production - self.power_consumption
    }
}

/// Scalar stockpiles plus the current power supply/demand figures.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceLedger {
    credits: Decimal,
    fuel: Decimal,
    power_production: Decimal,
    power_consumption: Decimal,
    initial: Cost,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }
}

impl ResourceLedger {
    /// Create a ledger with the given starting stocks. Negative stocks clamp
    /// to zero.
    pub fn new(credits: Decimal, fuel: Decimal) -> Self {
        let initial = Cost {
            credits: clamp_input(credits, "starting credits"),
            fuel: clamp_input(fuel, "starting fuel"),
        };
        Self {
            credits: initial.credits,
            fuel: initial.fuel,
            power_production: Decimal::ZERO,
            power_consumption: Decimal::ZERO,
            initial,
        }
    }

    pub fn from_config(cfg: &SimConfig) -> Self {
        Self::new(cfg.starting_credits, cfg.starting_fuel)
    }

    pub fn credits(&self) -> Decimal {
        self.credits
    }

    pub fn fuel(&self) -> Decimal {
        self.fuel
    }

    pub fn power_production(&self) -> Decimal {
        self.power_production
    }

    pub fn power_consumption(&self) -> Decimal {
        self.power_consumption
    }

    pub fn power_balance(&self) -> Decimal {
        self.power_production - self.power_consumption
    }

    /// Add credits. Negative input is clamped to zero; the stock saturates
    /// at `Decimal::MAX`.
    pub fn add_credits(&mut self, amount: Decimal) {
        self.credits = self.credits.saturating_add(clamp_input(amount, "credits"));
    }

    /// Add fuel. Negative input is clamped to zero; the stock saturates at
    /// `Decimal::MAX`.
    pub fn add_fuel(&mut self, amount: Decimal) {
        self.fuel = self.fuel.saturating_add(clamp_input(amount, "fuel"));
    }

    /// Debit credits if the stock covers `amount`; otherwise leave it untouched.
    pub fn consume_credits(&mut self, amount: Decimal) -> bool {
        consume(&mut self.credits, amount)
    }

    /// Debit fuel if the stock covers `amount`; otherwise leave it untouched.
    pub fn consume_fuel(&mut self, amount: Decimal) -> bool {
        consume(&mut self.fuel, amount)
    }

    pub fn set_power_production(&mut self, value: Decimal) {
        self.power_production = clamp_input(value, "power production");
    }

    pub fn set_power_consumption(&mut self, value: Decimal) {
        self.power_consumption = clamp_input(value, "power consumption");
    }

    pub fn can_afford(&self, cost: Cost) -> bool {
        self.credits >= cost.credits && self.fuel >= cost.fuel
    }

    /// Debit both stockpiles or neither.
    pub fn try_debit(&mut self, cost: Cost) -> bool {
        if cost.credits < Decimal::ZERO || cost.fuel < Decimal::ZERO || !self.can_afford(cost) {
            return false;
        }
        self.credits -= cost.credits;
        self.fuel -= cost.fuel;
        true
    }

    /// Return a previously debited cost.
    pub fn refund(&mut self, cost: Cost) {
        self.add_credits(cost.credits);
        self.add_fuel(cost.fuel);
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            credits: self.credits,
            fuel: self.fuel,
            power_production: self.power_production,
            power_consumption: self.power_consumption,
        }
    }

    /// Restore the starting stocks and zero the power figures.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial.credits, self.initial.fuel);
    }
}

fn consume(stock: &mut Decimal, amount: Decimal) -> bool {
    if amount < Decimal::ZERO || *stock < amount {
        return false;
    }
    *stock -= amount;
    true
}

/// A placed building.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Building {
    pub id: BuildingId,
    pub kind: BuildingKind,
    pub position: GridPos,
    health: f32,
    max_health: f32,
    pub produces: Option<Production>,
    pub power_draw: Option<Decimal>,
}

impl Building {
    fn from_spec(id: BuildingId, kind: BuildingKind, position: GridPos, spec: &BuildingSpec) -> Self {
        Self {
            id,
            kind,
            position,
            health: spec.max_health,
            max_health: spec.max_health,
            produces: spec.produces,
            power_draw: spec.power_draw,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Power generated per second, zero for non-power buildings.
    pub fn power_output(&self) -> Decimal {
        match self.produces {
            Some(Production {
                resource: ResourceKind::Power,
                rate,
            }) => rate,
            _ => Decimal::ZERO,
        }
    }
}

/// Result of applying damage through [`BuildingRegistry::damage`].
#[derive(Clone, Debug, PartialEq)]
pub enum DamageOutcome {
    /// The building survived with this much health left.
    Damaged { remaining: f32 },
    /// Health reached zero; the building has been removed.
    Destroyed(Building),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("cell {position} is occupied by {occupant}")]
    Occupied {
        position: GridPos,
        occupant: BuildingId,
    },
}

/// The set of live buildings, indexed by id and by grid cell.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingRegistry {
    buildings: BTreeMap<BuildingId, Building>,
    occupied: HashMap<GridPos, BuildingId>,
    next_id: u64,
}

impl Default for BuildingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildingRegistry {
    pub fn new() -> Self {
        Self {
            buildings: BTreeMap::new(),
            occupied: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a new building built from `spec`, at full health.
    ///
    /// Fails without allocating an id if the cell is taken.
    pub fn add(
        &mut self,
        kind: BuildingKind,
        position: GridPos,
        spec: &BuildingSpec,
    ) -> Result<BuildingId, RegistryError> {
        if let Some(&occupant) = self.occupied.get(&position) {
            return Err(RegistryError::Occupied { position, occupant });
        }
        let id = BuildingId(self.next_id);
        self.next_id += 1;
        self.occupied.insert(position, id);
        self.buildings
            .insert(id, Building::from_spec(id, kind, position, spec));
        Ok(id)
    }

    /// Remove a building. Absent ids are a no-op.
    pub fn remove(&mut self, id: BuildingId) -> Option<Building> {
        let building = self.buildings.remove(&id)?;
        self.occupied.remove(&building.position);
        Some(building)
    }

    pub fn get(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// The building standing on `position`, if any.
    pub fn at(&self, position: GridPos) -> Option<&Building> {
        self.occupied
            .get(&position)
            .and_then(|id| self.buildings.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Building> + '_ {
        self.buildings.values()
    }

    pub fn len(&self) -> usize {
        self.buildings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty()
    }

    /// Sum of `power_draw` over live buildings.
    pub fn total_power_consumption(&self) -> Decimal {
        self.buildings
            .values()
            .filter_map(|b| b.power_draw)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Sum of power production rates over live buildings.
    pub fn total_power_production(&self) -> Decimal {
        self.buildings
            .values()
            .map(Building::power_output)
            .fold(Decimal::ZERO, Decimal::saturating_add)
    }

    /// Apply combat damage. At zero health the building is removed
    /// immediately. Returns `None` for unknown ids.
    pub fn damage(&mut self, id: BuildingId, amount: f32) -> Option<DamageOutcome> {
        let building = self.buildings.get_mut(&id)?;
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        building.health = (building.health - amount).max(0.0);
        if building.health > 0.0 {
            return Some(DamageOutcome::Damaged {
                remaining: building.health,
            });
        }
        let destroyed = self.remove(id)?;
        info!(id = %destroyed.id, kind = %destroyed.kind, position = %destroyed.position, "building destroyed");
        Some(DamageOutcome::Destroyed(destroyed))
    }

    /// Restore health, capped at max health. Returns the new health.
    pub fn repair(&mut self, id: BuildingId, amount: f32) -> Option<f32> {
        let building = self.buildings.get_mut(&id)?;
        if amount.is_finite() && amount > 0.0 {
            building.health = (building.health + amount).min(building.max_health);
        }
        Some(building.health)
    }

    /// Drop every building. Ids keep counting up.
    pub fn clear(&mut self) {
        self.buildings.clear();
        self.occupied.clear();
    }
}

/// Why a placement request was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum PlacementError {
    /// The type is not in the building catalog.
    #[error("unknown building type: {0}")]
    UnknownType(String),
    /// Credits or fuel do not cover the cost. Nothing was debited.
    #[error("insufficient resources: need {needed}, have {available}")]
    InsufficientResources { needed: Cost, available: Cost },
    /// The target cell holds a live building. Any debit was refunded.
    #[error("position {position} is occupied by {occupant}")]
    PositionOccupied {
        position: GridPos,
        occupant: BuildingId,
    },
}

/// Charge for and place a building as a single transaction.
///
/// Checks run in order: catalog lookup, affordability, occupancy. A request
/// that is both unaffordable and blocked reports `InsufficientResources`.
pub fn try_place(
    catalog: &BuildingCatalog,
    ledger: &mut ResourceLedger,
    registry: &mut BuildingRegistry,
    kind: BuildingKind,
    position: GridPos,
) -> Result<BuildingId, PlacementError> {
    let spec = catalog
        .get(kind)
        .ok_or_else(|| PlacementError::UnknownType(kind.name().to_string()))?;
    let cost = spec.cost();
    if !ledger.try_debit(cost) {
        debug!(%kind, %position, %cost, "placement rejected: insufficient resources");
        return Err(PlacementError::InsufficientResources {
            needed: cost,
            available: Cost {
                credits: ledger.credits(),
                fuel: ledger.fuel(),
            },
        });
    }
    match registry.add(kind, position, spec) {
        Ok(id) => {
            debug!(%id, %kind, %position, %cost, "building placed");
            Ok(id)
        }
        Err(RegistryError::Occupied { position, occupant }) => {
            ledger.refund(cost);
            debug!(%kind, %position, %occupant, "placement rejected: cell occupied, refunded");
            Err(PlacementError::PositionOccupied { position, occupant })
        }
    }
}

/// [`try_place`] for a type given by name, e.g. from an input binding.
pub fn try_place_named(
    catalog: &BuildingCatalog,
    ledger: &mut ResourceLedger,
    registry: &mut BuildingRegistry,
    kind: &str,
    position: GridPos,
) -> Result<BuildingId, PlacementError> {
    let kind: BuildingKind = kind
        .parse()
        .map_err(|e: sim_core::UnknownBuildingKind| PlacementError::UnknownType(e.0))?;
    try_place(catalog, ledger, registry, kind, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn spec(credits: i64, fuel: i64) -> BuildingSpec {
        BuildingSpec {
            credits: d(credits),
            fuel: d(fuel),
            max_health: 100.0,
            produces: None,
            power_draw: None,
        }
    }

    #[test]
    fn consume_rejects_overdraw_in_full() {
        let mut ledger = ResourceLedger::new(d(100), d(10));
        assert!(!ledger.consume_credits(d(101)));
        assert_eq!(ledger.credits(), d(100));
        assert!(ledger.consume_credits(d(100)));
        assert_eq!(ledger.credits(), Decimal::ZERO);
        assert!(!ledger.consume_fuel(d(11)));
        assert!(ledger.consume_fuel(d(4)));
        assert_eq!(ledger.fuel(), d(6));
        assert!(!ledger.consume_fuel(d(-1)));
        assert_eq!(ledger.fuel(), d(6));
    }

    #[test]
    fn negative_additions_are_clamped() {
        let mut ledger = ResourceLedger::new(d(5), d(5));
        ledger.add_credits(d(-50));
        ledger.add_fuel(d(-50));
        ledger.set_power_production(d(-1));
        assert_eq!(ledger.credits(), d(5));
        assert_eq!(ledger.fuel(), d(5));
        assert_eq!(ledger.power_production(), Decimal::ZERO);
    }

    #[test]
    fn stockpiles_saturate_instead_of_overflowing() {
        let mut ledger = ResourceLedger::new(Decimal::MAX, d(1));
        ledger.add_credits(d(1));
        ledger.add_fuel(Decimal::MAX);
        assert_eq!(ledger.credits(), Decimal::MAX);
        assert_eq!(ledger.fuel(), Decimal::MAX);
    }

    #[test]
    fn try_debit_is_all_or_nothing() {
        let mut ledger = ResourceLedger::new(d(500), d(10));
        let cost = Cost {
            credits: d(100),
            fuel: d(20),
        };
        let before = ledger.clone();
        assert!(!ledger.try_debit(cost));
        assert_eq!(ledger, before);
        ledger.add_fuel(d(10));
        assert!(ledger.try_debit(cost));
        assert_eq!(ledger.credits(), d(400));
        assert_eq!(ledger.fuel(), Decimal::ZERO);
    }

    #[test]
    fn reset_restores_starting_stocks() {
        let mut ledger = ResourceLedger::new(d(1000), d(40));
        ledger.add_credits(d(55));
        assert!(ledger.consume_fuel(d(40)));
        ledger.set_power_production(d(100));
        ledger.set_power_consumption(d(30));
        assert_eq!(ledger.power_balance(), d(70));
        ledger.reset();
        assert_eq!(ledger.snapshot(), ResourceLedger::new(d(1000), d(40)).snapshot());
    }

    #[test]
    fn registry_rejects_stacking_and_remove_is_idempotent() {
        let mut reg = BuildingRegistry::new();
        let p = GridPos::new(2, -1);
        let a = reg.add(BuildingKind::Barracks, p, &spec(0, 0)).unwrap();
        assert_eq!(
            reg.add(BuildingKind::Turret, p, &spec(0, 0)),
            Err(RegistryError::Occupied {
                position: p,
                occupant: a
            })
        );
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.at(p).map(|b| b.kind), Some(BuildingKind::Barracks));
        assert!(reg.remove(a).is_some());
        assert!(reg.remove(a).is_none());
        assert!(reg.is_empty());
        let b = reg.add(BuildingKind::Turret, p, &spec(0, 0)).unwrap();
        assert_ne!(a, b, "ids are never reused");
    }

    #[test]
    fn power_totals_are_derived_from_live_buildings() {
        let mut reg = BuildingRegistry::new();
        let plant = BuildingSpec {
            produces: Some(Production {
                resource: ResourceKind::Power,
                rate: d(100),
            }),
            ..spec(0, 0)
        };
        let turret = BuildingSpec {
            power_draw: Some(d(25)),
            ..spec(0, 0)
        };
        reg.add(BuildingKind::PowerPlant, GridPos::new(0, 0), &plant).unwrap();
        let t = reg.add(BuildingKind::Turret, GridPos::new(1, 0), &turret).unwrap();
        reg.add(BuildingKind::Turret, GridPos::new(2, 0), &turret).unwrap();
        assert_eq!(reg.total_power_production(), d(100));
        assert_eq!(reg.total_power_consumption(), d(50));
        reg.remove(t);
        assert_eq!(reg.total_power_consumption(), d(25));
    }

    #[test]
    fn damage_to_zero_removes_building_and_frees_cell() {
        let mut reg = BuildingRegistry::new();
        let p = GridPos::new(4, 4);
        let id = reg.add(BuildingKind::Turret, p, &spec(0, 0)).unwrap();
        assert_eq!(
            reg.damage(id, 30.0),
            Some(DamageOutcome::Damaged { remaining: 70.0 })
        );
        assert_eq!(reg.repair(id, 500.0), Some(100.0));
        match reg.damage(id, 250.0) {
            Some(DamageOutcome::Destroyed(b)) => {
                assert_eq!(b.id, id);
                assert_eq!(b.health(), 0.0);
            }
            other => panic!("expected destruction, got {other:?}"),
        }
        assert!(reg.get(id).is_none());
        assert!(reg.at(p).is_none());
        assert_eq!(reg.damage(id, 1.0), None);
    }

    #[test]
    fn command_center_scenario() {
        let catalog = BuildingCatalog::standard();
        let mut ledger = ResourceLedger::new(d(1000), Decimal::ZERO);
        let mut reg = BuildingRegistry::new();
        let origin = GridPos::new(0, 0);

        let id = try_place(&catalog, &mut ledger, &mut reg, BuildingKind::CommandCenter, origin).unwrap();
        assert_eq!(ledger.credits(), Decimal::ZERO);
        assert_eq!(ledger.fuel(), Decimal::ZERO);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.at(origin).map(|b| b.id), Some(id));
        assert_eq!(reg.get(id).unwrap().health(), 1500.0);

        // Broke and blocked: affordability is checked first.
        let err = try_place(&catalog, &mut ledger, &mut reg, BuildingKind::CommandCenter, origin)
            .unwrap_err();
        assert!(matches!(err, PlacementError::InsufficientResources { .. }));
        assert_eq!(ledger.credits(), Decimal::ZERO);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn occupied_cell_refunds_the_full_cost() {
        let catalog = BuildingCatalog::standard();
        let mut ledger = ResourceLedger::new(d(1000), d(100));
        let mut reg = BuildingRegistry::new();
        let cell = GridPos::new(1, 1);
        let first = try_place(&catalog, &mut ledger, &mut reg, BuildingKind::Turret, cell).unwrap();
        assert_eq!(ledger.credits(), d(750));
        assert_eq!(ledger.fuel(), d(75));

        let ledger_before = ledger.clone();
        let reg_before = reg.clone();
        let err = try_place(&catalog, &mut ledger, &mut reg, BuildingKind::Turret, cell).unwrap_err();
        assert_eq!(
            err,
            PlacementError::PositionOccupied {
                position: cell,
                occupant: first
            }
        );
        assert_eq!(ledger, ledger_before);
        assert_eq!(reg, reg_before);
    }

    #[test]
    fn fuel_shortfall_debits_nothing() {
        let catalog = BuildingCatalog::standard();
        let mut ledger = ResourceLedger::new(d(1000), d(10));
        let mut reg = BuildingRegistry::new();
        let before = ledger.clone();
        let err = try_place(&catalog, &mut ledger, &mut reg, BuildingKind::Turret, GridPos::new(0, 0))
            .unwrap_err();
        assert_eq!(
            err,
            PlacementError::InsufficientResources {
                needed: Cost {
                    credits: d(250),
                    fuel: d(25)
                },
                available: Cost {
                    credits: d(1000),
                    fuel: d(10)
                },
            }
        );
        assert_eq!(ledger, before);
        assert!(reg.is_empty());
    }

    #[test]
    fn unknown_types_are_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert(BuildingKind::Barracks, spec(10, 0));
        let catalog = BuildingCatalog::new(entries);
        let mut ledger = ResourceLedger::new(d(1000), d(1000));
        let mut reg = BuildingRegistry::new();
        assert_eq!(
            try_place(&catalog, &mut ledger, &mut reg, BuildingKind::Turret, GridPos::new(0, 0)),
            Err(PlacementError::UnknownType("turret".to_string()))
        );
        assert_eq!(
            try_place_named(&catalog, &mut ledger, &mut reg, "silo", GridPos::new(0, 0)),
            Err(PlacementError::UnknownType("silo".to_string()))
        );
        assert!(try_place_named(&catalog, &mut ledger, &mut reg, "barracks", GridPos::new(0, 0)).is_ok());
        assert_eq!(ledger.credits(), d(990));
    }

    proptest! {
        #[test]
        fn stockpiles_never_go_negative(ops in proptest::collection::vec((0u8..5, -200i64..2_000, -3i32..3, -3i32..3), 1..60)) {
            let catalog = BuildingCatalog::standard();
            let mut ledger = ResourceLedger::new(d(500), d(20));
            let mut reg = BuildingRegistry::new();
            for (op, amount, x, z) in ops {
                match op {
                    0 => ledger.add_credits(d(amount)),
                    1 => ledger.add_fuel(d(amount / 10)),
                    2 => { ledger.consume_credits(d(amount)); }
                    3 => { ledger.consume_fuel(d(amount / 10)); }
                    _ => {
                        let kind = BuildingKind::ALL[(amount.unsigned_abs() % 5) as usize];
                        let ledger_before = ledger.clone();
                        let reg_before = reg.clone();
                        if try_place(&catalog, &mut ledger, &mut reg, kind, GridPos::new(x, z)).is_err() {
                            prop_assert_eq!(&ledger, &ledger_before);
                            prop_assert_eq!(&reg, &reg_before);
                        }
                    }
                }
                prop_assert!(ledger.credits() >= Decimal::ZERO);
                prop_assert!(ledger.fuel() >= Decimal::ZERO);
            }
        }
    }
}
