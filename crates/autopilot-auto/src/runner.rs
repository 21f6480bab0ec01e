//! Frame loop that feeds an [`Engine`] one time delta per tick.
//!
//! Real-time runs tick on a tokio interval and pass the measured time since
//! the previous frame. Fast runs tick back to back with a fixed delta, so the
//! script sees the same timeline without waiting for it.

use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};

use autopilot_core::controls::UiControls;
use autopilot_core::engine::Engine;
use autopilot_core::scheduler::TickOutcome;
use autopilot_core::session::SessionSink;

#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    pub fps: u32,
    pub fast: bool,
    /// Run time after which the run is aborted.
    pub max_seconds: f64,
}

impl FrameClock {
    pub fn frame_time(&self) -> f32 {
        1.0 / self.fps.max(1) as f32
    }

    fn max_ticks(&self) -> u64 {
        (self.max_seconds * f64::from(self.fps.max(1))).ceil() as u64
    }

    fn overrun_reason(&self) -> String {
        format!("run exceeded {} seconds", self.max_seconds)
    }
}

/// Ticks until the run ends, Ctrl-C is pressed, or the time limit passes.
pub async fn run<C: UiControls, S: SessionSink>(
    engine: &mut Engine<C, S>,
    clock: FrameClock,
) -> TickOutcome {
    if clock.fast {
        return run_fast(engine, clock);
    }

    let mut ticker = interval(Duration::from_secs_f32(clock.frame_time()));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(ctrl_c);
    let mut last = Instant::now();

    info!(fps = clock.fps, "frame loop started");
    loop {
        tokio::select! {
            () = &mut ctrl_c => {
                warn!("interrupted");
                return engine.abort("interrupted");
            }
            now = ticker.tick() => {
                let dt = now.saturating_duration_since(last).as_secs_f32();
                last = now;
                let outcome = engine.tick(dt);
                if outcome.is_terminal() {
                    return outcome;
                }
                if engine.elapsed() >= clock.max_seconds {
                    warn!(seconds = engine.elapsed(), "time limit reached");
                    return engine.abort(&clock.overrun_reason());
                }
            }
        }
    }
}

fn run_fast<C: UiControls, S: SessionSink>(
    engine: &mut Engine<C, S>,
    clock: FrameClock,
) -> TickOutcome {
    info!(fps = clock.fps, "fast run");
    let outcome = engine.run_fixed(clock.frame_time(), clock.max_ticks());
    if outcome.is_terminal() {
        outcome
    } else {
        warn!(ticks = clock.max_ticks(), "time limit reached");
        engine.abort(&clock.overrun_reason())
    }
}
