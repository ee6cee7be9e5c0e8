#![deny(warnings)]

//! Frame-driven runtime for the economy: the tick engine, the session that
//! owns all game state, and a `bevy_ecs` adapter for render loops.

pub mod ecs;
pub mod session;
pub mod tick;

pub use ecs::{economy_tick_system, init_world, EconomyRuntime, FrameClock, SimSession, TickLog};
pub use session::{GameMode, HudSnapshot, ModeError, Session, SessionEvent, SubscriptionId};
pub use tick::{TickEngine, TickOutcome, TickReport, DEFAULT_TICK_INTERVAL};
