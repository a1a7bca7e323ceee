//! Prometheus-compatible metrics endpoint
//!
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

const TICK_HISTORY: usize = 1000;

/// Counters and gauges shared by the hub, the scheduler and the transport
#[derive(Debug)]
pub struct Metrics {
    // World
    pub players_online: AtomicU64,
    pub mobs_alive: AtomicU64,
    pub world_event: AtomicU64,

    // Scheduler
    pub game_ticks: AtomicU64,
    pub ai_ticks: AtomicU64,
    pub income_ticks: AtomicU64,
    pub event_ticks: AtomicU64,
    pub save_ticks: AtomicU64,

    // AI tick timing (microseconds)
    pub ai_tick_time_us: AtomicU64,
    pub ai_tick_time_p95_us: AtomicU64,
    pub ai_tick_time_p99_us: AtomicU64,
    pub ai_tick_time_max_us: AtomicU64,

    // Network
    pub connections_active: AtomicU64,
    pub messages_sent: AtomicU64,
    pub messages_received: AtomicU64,
    pub peers_dropped: AtomicU64,

    // Persistence
    pub saves_ok: AtomicU64,
    pub saves_failed: AtomicU64,

    start_time: Instant,

    // Rolling AI tick times for percentile calculation
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            players_online: AtomicU64::new(0),
            mobs_alive: AtomicU64::new(0),
            world_event: AtomicU64::new(0),
            game_ticks: AtomicU64::new(0),
            ai_ticks: AtomicU64::new(0),
            income_ticks: AtomicU64::new(0),
            event_ticks: AtomicU64::new(0),
            save_ticks: AtomicU64::new(0),
            ai_tick_time_us: AtomicU64::new(0),
            ai_tick_time_p95_us: AtomicU64::new(0),
            ai_tick_time_p99_us: AtomicU64::new(0),
            ai_tick_time_max_us: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            peers_dropped: AtomicU64::new(0),
            saves_ok: AtomicU64::new(0),
            saves_failed: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record one AI tick's duration and update percentiles
    pub fn record_ai_tick(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.ai_tick_time_us.store(us, Ordering::Relaxed);
        self.ai_ticks.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.ai_tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.ai_tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.ai_tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("corsair_players_online", "Players held in memory", "gauge",
            self.players_online.load(Ordering::Relaxed));
        metric!("corsair_mobs_alive", "Mobs not currently dead", "gauge",
            self.mobs_alive.load(Ordering::Relaxed));
        metric!("corsair_world_event", "Active world event (0=None, 1=GoldRush, 2=DoubleLuck)", "gauge",
            self.world_event.load(Ordering::Relaxed));

        metric!("corsair_game_ticks_total", "State broadcast ticks", "counter",
            self.game_ticks.load(Ordering::Relaxed));
        metric!("corsair_ai_ticks_total", "AI ticks", "counter",
            self.ai_ticks.load(Ordering::Relaxed));
        metric!("corsair_income_ticks_total", "Passive income ticks", "counter",
            self.income_ticks.load(Ordering::Relaxed));
        metric!("corsair_event_ticks_total", "World event rotations", "counter",
            self.event_ticks.load(Ordering::Relaxed));
        metric!("corsair_save_ticks_total", "Persistence ticks", "counter",
            self.save_ticks.load(Ordering::Relaxed));

        metric!("corsair_ai_tick_time_microseconds", "Last AI tick time", "gauge",
            self.ai_tick_time_us.load(Ordering::Relaxed));
        metric!("corsair_ai_tick_time_p95_microseconds", "95th percentile AI tick time", "gauge",
            self.ai_tick_time_p95_us.load(Ordering::Relaxed));
        metric!("corsair_ai_tick_time_p99_microseconds", "99th percentile AI tick time", "gauge",
            self.ai_tick_time_p99_us.load(Ordering::Relaxed));
        metric!("corsair_ai_tick_time_max_microseconds", "Maximum AI tick time", "gauge",
            self.ai_tick_time_max_us.load(Ordering::Relaxed));

        metric!("corsair_connections_active", "Active WebTransport connections", "gauge",
            self.connections_active.load(Ordering::Relaxed));
        metric!("corsair_messages_sent_total", "Frames queued to clients", "counter",
            self.messages_sent.load(Ordering::Relaxed));
        metric!("corsair_messages_received_total", "Frames received from clients", "counter",
            self.messages_received.load(Ordering::Relaxed));
        metric!("corsair_peers_dropped_total", "Connections dropped on a full or closed outbox", "counter",
            self.peers_dropped.load(Ordering::Relaxed));

        metric!("corsair_saves_ok_total", "Player records saved", "counter",
            self.saves_ok.load(Ordering::Relaxed));
        metric!("corsair_saves_failed_total", "Player record saves that failed", "counter",
            self.saves_failed.load(Ordering::Relaxed));

        metric!("corsair_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON view of the same numbers
    pub fn to_json(&self) -> String {
        let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
        serde_json::json!({
            "world": {
                "players": load(&self.players_online),
                "mobs_alive": load(&self.mobs_alive),
                "event": load(&self.world_event),
            },
            "ticks": {
                "game": load(&self.game_ticks),
                "ai": load(&self.ai_ticks),
                "income": load(&self.income_ticks),
                "event": load(&self.event_ticks),
                "save": load(&self.save_ticks),
            },
            "performance": {
                "ai_tick_time_us": load(&self.ai_tick_time_us),
                "ai_tick_time_p95_us": load(&self.ai_tick_time_p95_us),
                "ai_tick_time_p99_us": load(&self.ai_tick_time_p99_us),
                "ai_tick_time_max_us": load(&self.ai_tick_time_max_us),
            },
            "network": {
                "connections": load(&self.connections_active),
                "messages_sent": load(&self.messages_sent),
                "messages_received": load(&self.messages_received),
                "peers_dropped": load(&self.peers_dropped),
            },
            "persistence": {
                "saves_ok": load(&self.saves_ok),
                "saves_failed": load(&self.saves_failed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

/// Route a raw request to a response
fn respond(metrics: &Metrics, request: &str) -> String {
    let path = request
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("GET "))
        .and_then(|rest| rest.split_whitespace().next());

    match path {
        Some("/metrics/json") | Some("/json") => {
            http_response("200 OK", "application/json", &metrics.to_json())
        }
        Some("/metrics") => {
            http_response("200 OK", "text/plain; version=0.0.4", &metrics.to_prometheus())
        }
        Some("/health") | Some("/") => http_response("200 OK", "text/plain", "OK"),
        _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
    }
}

/// Serve metrics over plain HTTP until the listener fails
pub async fn start_metrics_server(metrics: Arc<Metrics>, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind, port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = respond(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
