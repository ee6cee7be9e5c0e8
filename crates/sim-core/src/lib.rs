#![deny(warnings)]

//! Core domain models and invariants for Iron Command.
//!
//! This crate defines the serializable types shared by the economy and the
//! runtime: building kinds, grid cells, the static building catalog, and the
//! simulation configuration with validation helpers that guarantee basic
//! invariants before a session starts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Buildable structure types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildingKind {
    /// Main base building.
    CommandCenter,
    /// Extracts oil and sells it for credits.
    OilDerrick,
    /// Supplies power to the grid.
    PowerPlant,
    /// Infantry production.
    Barracks,
    /// Static defence.
    Turret,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 5] = [
        BuildingKind::CommandCenter,
        BuildingKind::OilDerrick,
        BuildingKind::PowerPlant,
        BuildingKind::Barracks,
        BuildingKind::Turret,
    ];

    /// Configuration name, e.g. "oil-derrick".
    pub fn name(&self) -> &'static str {
        match self {
            BuildingKind::CommandCenter => "command-center",
            BuildingKind::OilDerrick => "oil-derrick",
            BuildingKind::PowerPlant => "power-plant",
            BuildingKind::Barracks => "barracks",
            BuildingKind::Turret => "turret",
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a building type name is not recognised.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown building type: {0}")]
pub struct UnknownBuildingKind(pub String);

impl FromStr for BuildingKind {
    type Err = UnknownBuildingKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildingKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| UnknownBuildingKind(s.to_string()))
    }
}

/// Resources a building can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Spendable currency stockpile.
    Credits,
    /// Fuel stockpile.
    Fuel,
    /// Grid power; a flow, not a stockpile.
    Power,
}

/// Integer cell on the ground plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub z: i32,
}

impl GridPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Snap a ground-plane coordinate in world units to its nearest cell.
    ///
    /// Halves round away from zero. Returns `None` for NaN or infinite
    /// coordinates, which name no cell.
    pub fn snap(x: f32, z: f32) -> Option<Self> {
        if !(x.is_finite() && z.is_finite()) {
            return None;
        }
        Some(Self::new(x.round() as i32, z.round() as i32))
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Stable identifier of a placed building. Never reused within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub u64);

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "building#{}", self.0)
    }
}

/// Identifier of a selectable unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Credits and fuel amounts, used for building costs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cost {
    pub credits: Decimal,
    pub fuel: Decimal,
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} credits, {} fuel", self.credits, self.fuel)
    }
}

/// Production rule: `rate` units of `resource` per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub resource: ResourceKind,
    pub rate: Decimal,
}

/// Static configuration for one building type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingSpec {
    /// Credit cost (>= 0).
    #[serde(default)]
    pub credits: Decimal,
    /// Fuel cost (>= 0).
    #[serde(default)]
    pub fuel: Decimal,
    /// Health of a freshly placed building (> 0).
    pub max_health: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produces: Option<Production>,
    /// Power drawn while the building stands (>= 0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_draw: Option<Decimal>,
}

impl BuildingSpec {
    pub fn cost(&self) -> Cost {
        Cost {
            credits: self.credits,
            fuel: self.fuel,
        }
    }
}

/// Building type -> spec table. Loaded once, immutable afterwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingCatalog {
    entries: BTreeMap<BuildingKind, BuildingSpec>,
}

impl BuildingCatalog {
    pub fn new(entries: BTreeMap<BuildingKind, BuildingSpec>) -> Self {
        Self { entries }
    }

    /// The stock table shipped with the game.
    pub fn standard() -> Self {
        let spec = |credits: i64, fuel: i64, max_health: f32| BuildingSpec {
            credits: Decimal::from(credits),
            fuel: Decimal::from(fuel),
            max_health,
            produces: None,
            power_draw: None,
        };
        let mut entries = BTreeMap::new();
        entries.insert(BuildingKind::CommandCenter, spec(1000, 0, 1500.0));
        entries.insert(
            BuildingKind::OilDerrick,
            BuildingSpec {
                produces: Some(Production {
                    resource: ResourceKind::Credits,
                    rate: Decimal::from(5),
                }),
                power_draw: Some(Decimal::from(5)),
                ..spec(300, 0, 400.0)
            },
        );
        entries.insert(
            BuildingKind::PowerPlant,
            BuildingSpec {
                produces: Some(Production {
                    resource: ResourceKind::Power,
                    rate: Decimal::from(100),
                }),
                ..spec(400, 0, 600.0)
            },
        );
        entries.insert(
            BuildingKind::Barracks,
            BuildingSpec {
                power_draw: Some(Decimal::from(20)),
                ..spec(500, 0, 800.0)
            },
        );
        entries.insert(
            BuildingKind::Turret,
            BuildingSpec {
                power_draw: Some(Decimal::from(25)),
                ..spec(250, 25, 300.0)
            },
        );
        Self { entries }
    }

    pub fn get(&self, kind: BuildingKind) -> Option<&BuildingSpec> {
        self.entries.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BuildingKind, &BuildingSpec)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

/// Simulation configuration parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Credits in the ledger at session start and after a reset.
    #[serde(default)]
    pub starting_credits: Decimal,
    /// Fuel in the ledger at session start and after a reset.
    #[serde(default)]
    pub starting_fuel: Decimal,
    /// Minimum elapsed time before the economy fires (default: 1000 ms).
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Building table; the standard catalog when omitted.
    #[serde(default = "BuildingCatalog::standard")]
    pub buildings: BuildingCatalog,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            starting_credits: Decimal::ZERO,
            starting_fuel: Decimal::ZERO,
            tick_interval_ms: default_tick_interval_ms(),
            buildings: BuildingCatalog::standard(),
        }
    }
}

/// Validation errors for configuration invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A cost, rate, draw or starting stock is below zero.
    #[error("{kind}: negative {field} is invalid")]
    Negative { kind: String, field: &'static str },
    /// Max health must be finite and strictly positive.
    #[error("{0}: max health must be finite and > 0")]
    InvalidHealth(BuildingKind),
    /// Tick interval must be strictly positive.
    #[error("tick interval must be > 0 ms")]
    ZeroTickInterval,
}

fn non_negative(v: Decimal, kind: &str, field: &'static str) -> Result<(), ValidationError> {
    if v < Decimal::ZERO {
        return Err(ValidationError::Negative {
            kind: kind.to_string(),
            field,
        });
    }
    Ok(())
}

/// Validate one catalog entry.
pub fn validate_building_spec(kind: BuildingKind, s: &BuildingSpec) -> Result<(), ValidationError> {
    let name = kind.name();
    non_negative(s.credits, name, "credit cost")?;
    non_negative(s.fuel, name, "fuel cost")?;
    if !s.max_health.is_finite() || s.max_health <= 0.0 {
        return Err(ValidationError::InvalidHealth(kind));
    }
    if let Some(p) = &s.produces {
        non_negative(p.rate, name, "production rate")?;
    }
    if let Some(d) = s.power_draw {
        non_negative(d, name, "power draw")?;
    }
    Ok(())
}

/// Validate a whole catalog.
pub fn validate_catalog(catalog: &BuildingCatalog) -> Result<(), ValidationError> {
    for (kind, spec) in catalog.iter() {
        validate_building_spec(kind, spec)?;
    }
    Ok(())
}

/// Validate the configuration, including every catalog entry.
pub fn validate_config(cfg: &SimConfig) -> Result<(), ValidationError> {
    non_negative(cfg.starting_credits, "config", "starting credits")?;
    non_negative(cfg.starting_fuel, "config", "starting fuel")?;
    if cfg.tick_interval_ms == 0 {
        return Err(ValidationError::ZeroTickInterval);
    }
    validate_catalog(&cfg.buildings)
}

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Parse and validate a YAML configuration.
pub fn config_from_yaml(text: &str) -> Result<SimConfig, ConfigError> {
    let cfg: SimConfig = serde_yaml::from_str(text)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Parse and validate a JSON configuration.
pub fn config_from_json(text: &str) -> Result<SimConfig, ConfigError> {
    let cfg: SimConfig = serde_json::from_str(text)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load a configuration file; `.json` files are parsed as JSON, anything
/// else as YAML.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SimConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let cfg = if is_json {
        config_from_json(&text)?
    } else {
        config_from_yaml(&text)?
    };
    debug!(path = %path.display(), buildings = cfg.buildings.len(), "loaded config");
    Ok(cfg)
}
