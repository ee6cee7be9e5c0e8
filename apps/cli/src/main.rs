#![deny(warnings)]

//! Headless CLI: load a configuration, run a build order, simulate a number
//! of seconds frame by frame, and print the resource HUD.

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use sim_core::{load_config, BuildingKind, GridPos, SimConfig};
use sim_runtime::{EconomyRuntime, Session};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    seconds: Option<u32>,
    fps: Option<u32>,
    credits: Option<i64>,
    places: Vec<String>,
    json: bool,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--seconds" => args.seconds = it.next().and_then(|s| s.parse().ok()),
            "--fps" => args.fps = it.next().and_then(|s| s.parse().ok()),
            "--credits" => args.credits = it.next().and_then(|s| s.parse().ok()),
            "--place" => args.places.extend(it.next()),
            "--json" => args.json = true,
            _ => {}
        }
    }
    args
}

/// Parse `type@x,z`, e.g. `oil-derrick@3,3`.
fn parse_place(s: &str) -> Result<(String, GridPos)> {
    let (kind, cell) = s
        .split_once('@')
        .ok_or_else(|| anyhow!("expected type@x,z, got {s:?}"))?;
    let (x, z) = cell
        .split_once(',')
        .ok_or_else(|| anyhow!("expected x,z cell, got {cell:?}"))?;
    let x = x.trim().parse::<i32>().with_context(|| format!("bad x in {s:?}"))?;
    let z = z.trim().parse::<i32>().with_context(|| format!("bad z in {s:?}"))?;
    Ok((kind.trim().to_string(), GridPos::new(x, z)))
}

fn default_build_order() -> Vec<(String, GridPos)> {
    [
        (BuildingKind::CommandCenter, GridPos::new(0, 0)),
        (BuildingKind::PowerPlant, GridPos::new(-3, 3)),
        (BuildingKind::OilDerrick, GridPos::new(3, 3)),
        (BuildingKind::Turret, GridPos::new(0, 5)),
    ]
    .into_iter()
    .map(|(k, p)| (k.name().to_string(), p))
    .collect()
}

fn minimal_config() -> SimConfig {
    SimConfig {
        starting_credits: Decimal::from(2500),
        starting_fuel: Decimal::from(50),
        ..SimConfig::default()
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(?args, "starting CLI");

    let mut cfg = match &args.config {
        Some(path) => load_config(path).with_context(|| format!("loading {path}"))?,
        None => minimal_config(),
    };
    if let Some(credits) = args.credits {
        cfg.starting_credits = Decimal::from(credits.max(0));
    }
    let n_types = cfg.buildings.len();

    let orders = if args.places.is_empty() {
        default_build_order()
    } else {
        args.places
            .iter()
            .map(|p| parse_place(p))
            .collect::<Result<Vec<_>>>()?
    };

    let session = Session::new(cfg, Duration::ZERO)?;
    let mut runtime = EconomyRuntime::new(session, Duration::ZERO);
    let (mut placed, mut rejected) = (0usize, 0usize);
    for (kind, pos) in &orders {
        match runtime.session_mut().try_place_named(kind, *pos) {
            Ok(id) => {
                placed += 1;
                info!(%id, %kind, %pos, "placed");
            }
            Err(e) => {
                rejected += 1;
                warn!(%kind, %pos, error = %e, "placement rejected");
            }
        }
    }

    let seconds = args.seconds.unwrap_or(10);
    let hud = runtime.run_seconds(seconds, args.fps.unwrap_or(60));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hud)?);
        return Ok(());
    }
    println!(
        "Session OK | building types: {} | placed: {} | rejected: {}",
        n_types, placed, rejected
    );
    println!(
        "HUD | seconds: {} | ticks: {} | credits: {} | fuel: {} | power: {}/{} | buildings: {} | mode: {}",
        seconds,
        runtime.tick_log().fired,
        hud.credits.round_dp(2),
        hud.fuel.round_dp(2),
        hud.power_production,
        hud.power_consumption,
        hud.buildings,
        hud.mode
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_specs_parse() {
        let (kind, pos) = parse_place("oil-derrick@3, -2").unwrap();
        assert_eq!(kind, "oil-derrick");
        assert_eq!(pos, GridPos::new(3, -2));
        assert!(parse_place("turret").is_err());
        assert!(parse_place("turret@1").is_err());
        assert!(parse_place("turret@a,1").is_err());
    }

    #[test]
    fn default_order_fits_the_minimal_budget() {
        let mut session = Session::new(minimal_config(), Duration::ZERO).unwrap();
        for (kind, pos) in default_build_order() {
            session.try_place_named(&kind, pos).unwrap();
        }
        assert_eq!(session.registry().len(), 4);
        assert_eq!(session.ledger().credits(), Decimal::from(550));
        assert_eq!(session.ledger().fuel(), Decimal::from(25));
    }
}
