//! `bevy_ecs` adapter: the session lives in a resource and one schedule run
//! stands in for one rendered frame.

use crate::session::{HudSnapshot, Session};
use crate::tick::{TickOutcome, TickReport};
use bevy_ecs::prelude::*;
use std::time::Duration;

/// Monotonic frame clock, advanced once per frame.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameClock {
    pub now: Duration,
    pub frames: u64,
}

#[derive(Resource)]
pub struct SimSession(pub Session);

/// Firing history for the HUD and diagnostics.
#[derive(Resource, Clone, Debug, Default)]
pub struct TickLog {
    pub fired: u64,
    pub last: Option<TickReport>,
}

pub fn economy_tick_system(
    clock: Res<FrameClock>,
    mut session: ResMut<SimSession>,
    mut log: ResMut<TickLog>,
) {
    if let TickOutcome::Fired(report) = session.0.tick(clock.now) {
        log.fired += 1;
        log.last = Some(report);
    }
}

/// Minimal world initialization: clock, session and tick log resources.
pub fn init_world(session: Session, start: Duration) -> World {
    let mut world = World::new();
    world.insert_resource(FrameClock {
        now: start,
        frames: 0,
    });
    world.insert_resource(SimSession(session));
    world.insert_resource(TickLog::default());
    world
}

/// World plus the per-frame schedule.
pub struct EconomyRuntime {
    world: World,
    schedule: Schedule,
}

impl EconomyRuntime {
    pub fn new(session: Session, start: Duration) -> Self {
        let mut schedule = Schedule::default();
        schedule.add_systems(economy_tick_system);
        Self {
            world: init_world(session, start),
            schedule,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Add systems that run after the economy each frame (HUD sync etc.).
    pub fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    pub fn session(&self) -> &Session {
        &self.world.resource::<SimSession>().0
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.world.resource_mut::<SimSession>().into_inner().0
    }

    pub fn clock(&self) -> FrameClock {
        *self.world.resource::<FrameClock>()
    }

    pub fn tick_log(&self) -> &TickLog {
        self.world.resource::<TickLog>()
    }

    /// Advance the clock by `dt` and run one frame.
    pub fn advance_frame(&mut self, dt: Duration) {
        {
            let mut clock = self.world.resource_mut::<FrameClock>();
            clock.now += dt;
            clock.frames += 1;
        }
        self.schedule.run(&mut self.world);
    }

    /// Run `seconds` of frames at `fps` and return the resulting HUD.
    pub fn run_seconds(&mut self, seconds: u32, fps: u32) -> HudSnapshot {
        let fps = fps.max(1);
        let dt = Duration::from_secs(1) / fps;
        for _ in 0..u64::from(seconds) * u64::from(fps) {
            self.advance_frame(dt);
        }
        self.session().hud()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sim_core::{BuildingKind, GridPos, SimConfig};

    fn runtime(credits: i64) -> EconomyRuntime {
        let cfg = SimConfig {
            starting_credits: Decimal::from(credits),
            ..SimConfig::default()
        };
        EconomyRuntime::new(Session::new(cfg, Duration::ZERO).unwrap(), Duration::ZERO)
    }

    #[test]
    fn world_creates_with_resources() {
        let rt = runtime(0);
        assert_eq!(rt.clock(), FrameClock::default());
        assert_eq!(rt.tick_log().fired, 0);
        assert!(rt.world().get_resource::<SimSession>().is_some());
    }

    #[test]
    fn frames_drive_the_economy() {
        let mut rt = runtime(300);
        rt.session_mut()
            .try_place(BuildingKind::OilDerrick, GridPos::new(3, 3))
            .unwrap();
        // 250 ms frames: exactly one firing per four frames.
        let hud = rt.run_seconds(10, 4);
        assert_eq!(rt.clock().frames, 40);
        assert_eq!(rt.tick_log().fired, 10);
        assert_eq!(hud.credits, Decimal::from(50));
        assert_eq!(hud.power_consumption, Decimal::from(5));
        assert_eq!(hud.buildings, 1);
        assert_eq!(hud.mode, "COMMANDER");
    }

    #[test]
    fn hud_serializes_for_the_frontend() {
        let mut rt = runtime(1000);
        rt.session_mut()
            .try_place(BuildingKind::PowerPlant, GridPos::new(0, 0))
            .unwrap();
        let hud = rt.run_seconds(1, 2);
        let json = serde_json::to_value(&hud).unwrap();
        assert_eq!(json["buildings"], 1);
        assert_eq!(json["mode"], "COMMANDER");
        assert_eq!(json["paused"], false);
    }
}
