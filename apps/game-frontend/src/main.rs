#![deny(warnings)]

//! Headless HUD over the ECS runtime: queued input commands are applied
//! before the economy runs, and the HUD resource is refreshed after it.

use bevy_ecs::prelude::*;
use rust_decimal::Decimal;
use sim_core::{BuildingKind, GridPos, SimConfig, UnitId, ValidationError};
use sim_runtime::{economy_tick_system, EconomyRuntime, GameMode, Session, SimSession};
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Commands the input layer produces from clicks and key presses.
#[derive(Clone, Debug, PartialEq)]
enum InputCommand {
    Select(Option<UnitId>),
    Possess,
    /// Escape key.
    Eject,
    TogglePause,
    Place(BuildingKind, GridPos),
    /// Placement from a ground-plane pointer hit in world units.
    PlaceAt(BuildingKind, f32, f32),
}

#[derive(Resource, Default)]
struct PendingInput(Vec<InputCommand>);

#[derive(Resource, Default)]
struct HudState {
    mode: &'static str,
    credits: Decimal,
    fuel: Decimal,
    power: String,
    buildings: usize,
    crosshair: bool,
    paused: bool,
    last_event: String,
}

fn input_system(
    mut input: ResMut<PendingInput>,
    mut session: ResMut<SimSession>,
    mut hud: ResMut<HudState>,
) {
    let session = &mut session.0;
    for cmd in input.0.drain(..) {
        let result = match &cmd {
            InputCommand::Select(unit) => session.select_unit(unit.clone()).map_err(|e| e.to_string()),
            InputCommand::Possess => session.enter_fps().map_err(|e| e.to_string()),
            InputCommand::Eject => {
                session.exit_fps();
                Ok(())
            }
            InputCommand::TogglePause => {
                session.toggle_pause();
                Ok(())
            }
            InputCommand::Place(kind, pos) => session
                .try_place(*kind, *pos)
                .map(|_| ())
                .map_err(|e| e.to_string()),
            InputCommand::PlaceAt(kind, x, z) => match GridPos::snap(*x, *z) {
                Some(pos) => session
                    .try_place(*kind, pos)
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                None => Err(format!("pointer off the grid at ({x}, {z})")),
            },
        };
        match result {
            Ok(()) => {
                debug!(?cmd, "input applied");
                hud.last_event = format!("{cmd:?}");
            }
            Err(e) => {
                warn!(?cmd, error = %e, "input rejected");
                hud.last_event = e;
            }
        }
    }
}

fn hud_sync_system(session: Res<SimSession>, mut hud: ResMut<HudState>) {
    let snap = session.0.hud();
    hud.mode = snap.mode;
    hud.credits = snap.credits;
    hud.fuel = snap.fuel;
    hud.power = format!("{}/{}", snap.power_production, snap.power_consumption);
    hud.buildings = snap.buildings;
    hud.crosshair = session.0.mode() == GameMode::Fps;
    hud.paused = snap.paused;
}

fn build_runtime(session: Session) -> EconomyRuntime {
    let mut runtime = EconomyRuntime::new(session, Duration::ZERO);
    let world = runtime.world_mut();
    world.insert_resource(PendingInput::default());
    world.insert_resource(HudState::default());
    runtime.schedule_mut().add_systems((
        input_system.before(economy_tick_system),
        hud_sync_system.after(economy_tick_system),
    ));
    runtime
}

fn queue(runtime: &mut EconomyRuntime, cmd: InputCommand) {
    runtime
        .world_mut()
        .resource_mut::<PendingInput>()
        .0
        .push(cmd);
}

fn main() -> Result<(), ValidationError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = SimConfig {
        starting_credits: Decimal::from(2000),
        ..SimConfig::default()
    };
    let mut runtime = build_runtime(Session::new(cfg, Duration::ZERO)?);
    queue(&mut runtime, InputCommand::Place(BuildingKind::CommandCenter, GridPos::new(0, 0)));
    queue(&mut runtime, InputCommand::PlaceAt(BuildingKind::OilDerrick, 3.2, 2.8));
    queue(&mut runtime, InputCommand::Select(Some(UnitId("u1".into()))));
    queue(&mut runtime, InputCommand::Possess);
    // Headless demo at 30 fps: possess, eject, then pause for a second.
    runtime.run_seconds(3, 30);
    queue(&mut runtime, InputCommand::Eject);
    runtime.run_seconds(2, 30);
    queue(&mut runtime, InputCommand::TogglePause);
    runtime.run_seconds(1, 30);
    queue(&mut runtime, InputCommand::TogglePause);
    runtime.run_seconds(1, 30);

    let s = runtime.world().resource::<HudState>();
    println!(
        "IRON COMMAND | MODE: {}{} | credits: {} | fuel: {} | power: {} | buildings: {} | status: {}",
        s.mode,
        if s.paused { " (PAUSED)" } else { "" },
        s.credits.round_dp(2),
        s.fuel,
        s.power,
        s.buildings,
        s.last_event
    );
    if s.crosshair {
        println!("WASD to Move | Mouse to Look | Click to Fire | ESC to Eject");
    }
    Ok(())
}
