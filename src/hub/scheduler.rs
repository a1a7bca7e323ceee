//! The five world timers. Each runs as its own task so a slow unit of work
//! on one timer never delays another.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::WorldHub;
use crate::config::ServerConfig;
use crate::util::now_millis;

/// Longest simulated step; a stalled AI task does not teleport mobs
const MAX_AI_STEP: Duration = Duration::from_millis(250);

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Spawn every timer. Handles are returned so the caller can abort them on
/// shutdown.
pub fn start(hub: Arc<WorldHub>, config: &ServerConfig) -> Vec<JoinHandle<()>> {
    info!(
        "Scheduler: game {:?}, ai {:?}, income {:?}, save {:?}, event {:?}",
        config.game_tick, config.ai_tick, config.income_tick, config.save_tick, config.event_tick
    );
    vec![
        spawn_game_tick(hub.clone(), config.game_tick),
        spawn_ai_tick(hub.clone(), config.ai_tick),
        spawn_income_tick(hub.clone(), config.income_tick),
        spawn_event_tick(hub.clone(), config.event_tick),
        spawn_save_tick(hub, config.save_tick),
    ]
}

fn spawn_game_tick(hub: Arc<WorldHub>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        loop {
            ticker.tick().await;
            hub.game_tick();
        }
    })
}

fn spawn_ai_tick(hub: Arc<WorldHub>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        let mut rng = StdRng::from_entropy();
        let mut last = Instant::now();
        loop {
            ticker.tick().await;
            let now = Instant::now();
            let dt = now.duration_since(last).min(MAX_AI_STEP).as_secs_f32();
            last = now;
            hub.ai_tick(dt, now_millis(), &mut rng);
        }
    })
}

fn spawn_income_tick(hub: Arc<WorldHub>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        // The first tick of an interval fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            hub.income_tick();
        }
    })
}

fn spawn_event_tick(hub: Arc<WorldHub>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        let mut rng = StdRng::from_entropy();
        ticker.tick().await;
        loop {
            ticker.tick().await;
            hub.event_tick(&mut rng);
        }
    })
}

fn spawn_save_tick(hub: Arc<WorldHub>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = ticker(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            hub.metrics().save_ticks.fetch_add(1, Ordering::Relaxed);

            let batch = hub.take_save_batch();
            if batch.is_empty() {
                continue;
            }
            let worker = hub.clone();
            match tokio::task::spawn_blocking(move || worker.save_batch(batch)).await {
                Ok(report) if report.failed > 0 => {
                    warn!("Saved {} players, {} failed (retrying next cycle)", report.saved, report.failed);
                }
                Ok(report) => debug!("Saved {} players", report.saved),
                Err(e) => warn!("Save task failed: {}", e),
            }
        }
    })
}
