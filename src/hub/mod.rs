//! The World Hub: authoritative player registry, connection registry,
//! session tokens and the world event, plus the mob registry behind its own
//! lock.
//!
//! Lock order is world, then mobs. No path takes the mob lock and then the
//! world lock, and neither lock is held across an `.await` or store I/O.

mod admin;
mod dispatch;
pub mod scheduler;

pub use admin::AdminFollowup;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::game::constants::{account, world};
use crate::game::state::{Mob, MobId, Player, PlayerId, Role, WorldEvent};
use crate::game::systems::ai::{AiEvent, MobManager};
use crate::game::systems::combat::CombatEvent;
use crate::game::systems::economy;
use crate::metrics::Metrics;
use crate::net::connection::{Connection, ConnectionId, Outbox};
use crate::net::framing::{frame, Frame};
use crate::net::protocol::{GameEvent, MobSnapshot, PlayerSnapshot, ServerMessage};
use crate::net::session::{SessionRegistry, SessionToken};
use crate::persistence::{AdminRegistry, PlayerStore, StoreError};

/// Why a connection could not be bound to a player
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("unknown or expired session token")]
    UnknownSession,
    #[error("no account for '{0}'")]
    UnknownIdentity(PlayerId),
    #[error("could not create account: {0}")]
    Store(#[from] StoreError),
}

/// Who receives a queued message
#[derive(Debug, Clone)]
enum Recipient {
    Player(PlayerId),
    All,
}

/// Messages produced while mutating the world, delivered once the mutation
/// is complete
#[derive(Debug, Default)]
struct Outgoing(Vec<(Recipient, ServerMessage)>);

impl Outgoing {
    fn to(&mut self, player: impl Into<PlayerId>, message: ServerMessage) {
        self.0.push((Recipient::Player(player.into()), message));
    }

    fn all(&mut self, message: ServerMessage) {
        self.0.push((Recipient::All, message));
    }

    fn combat(&mut self, events: Vec<CombatEvent>) {
        for event in events {
            match event {
                CombatEvent::MobKilled { killer, kind, bounty, .. } => {
                    debug!("{} killed a {} (+{} bounty)", killer, kind.display_name(), bounty);
                    self.to(killer, ServerMessage::notification("Bounty Increased!"));
                }
                CombatEvent::QuestUpdated { player, quest, money, exp } => {
                    self.to(
                        player,
                        ServerMessage::QuestUpdate {
                            active_quest: quest,
                            money,
                            exp,
                        },
                    );
                }
                CombatEvent::QuestCompleted { player, name } => {
                    debug!("{} completed quest '{}'", player, name);
                    self.to(player, ServerMessage::notification("Quest Completed!"));
                }
                CombatEvent::PlayerKilled { killer, victim, bounty_lost } => {
                    info!("{} defeated {} ({} bounty lost)", killer, victim, bounty_lost);
                    self.all(ServerMessage::system_chat(format!("{killer} defeated {victim}!")));
                }
                CombatEvent::Refused { player, reason } => {
                    self.to(player, ServerMessage::notification(reason));
                }
            }
        }
    }
}

/// Everything behind the world lock
struct WorldState {
    players: HashMap<PlayerId, Player>,
    /// Evicted records not yet written to the store
    departed: HashMap<PlayerId, Player>,
    /// Evicted records handed to a save that has not finished yet
    saving: HashMap<PlayerId, Player>,
    connections: HashMap<ConnectionId, Connection>,
    by_player: HashMap<PlayerId, ConnectionId>,
    sessions: SessionRegistry,
    event: WorldEvent,
    metrics: Arc<Metrics>,
}

impl WorldState {
    fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            players: HashMap::new(),
            departed: HashMap::new(),
            saving: HashMap::new(),
            connections: HashMap::new(),
            by_player: HashMap::new(),
            sessions: SessionRegistry::new(),
            event: WorldEvent::None,
            metrics,
        }
    }

    fn player_of(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.connections.get(&conn).map(|c| c.player_id.clone())
    }

    /// Remove a connection and evict its player into the departed set
    fn drop_connection(&mut self, conn: ConnectionId) -> Option<PlayerId> {
        let connection = self.connections.remove(&conn)?;
        if self.by_player.get(&connection.player_id) == Some(&conn) {
            self.by_player.remove(&connection.player_id);
            if let Some(player) = self.players.remove(&connection.player_id) {
                self.departed.insert(player.id.clone(), player);
            }
        }
        self.refresh_gauges();
        Some(connection.player_id)
    }

    fn is_evicted(&self, id: &str) -> bool {
        self.departed.contains_key(id) || self.saving.contains_key(id)
    }

    /// Evicted record for `id`, queued or mid-save. A record taken back from
    /// an in-flight save is queued again so later edits get written.
    fn evicted_mut(&mut self, id: &str) -> Option<&mut Player> {
        if let Some(player) = self.saving.remove(id) {
            self.departed.entry(player.id.clone()).or_insert(player);
        }
        self.departed.get_mut(id)
    }

    fn refresh_gauges(&self) {
        self.metrics
            .connections_active
            .store(self.connections.len() as u64, Ordering::Relaxed);
        self.metrics
            .players_online
            .store(self.players.len() as u64, Ordering::Relaxed);
    }

    /// Push one frame to one connection; `Err` when the peer is lost
    fn push(&self, conn: ConnectionId, frame: &Frame) -> Result<(), ConnectionId> {
        let Some(connection) = self.connections.get(&conn) else {
            return Ok(());
        };
        match connection.outbox.push(frame.clone()) {
            Ok(()) => {
                self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(_) => Err(conn),
        }
    }

    /// Drop every peer whose outbox refused a frame. Repeats are ignored.
    fn drop_lost(&mut self, lost: Vec<ConnectionId>) {
        for conn in lost {
            if let Some(player) = self.drop_connection(conn) {
                warn!("Dropped slow or closed peer {} ({})", player, conn);
                self.metrics.peers_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn deliver(&mut self, outgoing: Outgoing) {
        let mut lost = Vec::new();
        for (recipient, message) in outgoing.0 {
            let frame = match frame(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Failed to frame outbound message: {}", e);
                    continue;
                }
            };
            match recipient {
                Recipient::Player(id) => {
                    if let Some(&conn) = self.by_player.get(&id) {
                        if let Err(conn) = self.push(conn, &frame) {
                            lost.push(conn);
                        }
                    }
                }
                Recipient::All => {
                    for &conn in self.connections.keys() {
                        if let Err(conn) = self.push(conn, &frame) {
                            lost.push(conn);
                        }
                    }
                }
            }
        }
        self.drop_lost(lost);
    }

    fn send(&mut self, player: impl Into<PlayerId>, message: ServerMessage) {
        let mut out = Outgoing::default();
        out.to(player, message);
        self.deliver(out);
    }

    fn broadcast(&mut self, message: ServerMessage) {
        let mut out = Outgoing::default();
        out.all(message);
        self.deliver(out);
    }
}

/// Outcome of one persistence pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub saved: usize,
    pub failed: usize,
}

/// The authoritative world
pub struct WorldHub {
    world: Mutex<WorldState>,
    mobs: Mutex<MobManager>,
    store: Arc<dyn PlayerStore>,
    admins: Arc<dyn AdminRegistry>,
    metrics: Arc<Metrics>,
    owner_account: Option<PlayerId>,
}

impl WorldHub {
    pub fn new(
        store: Arc<dyn PlayerStore>,
        admins: Arc<dyn AdminRegistry>,
        metrics: Arc<Metrics>,
        mobs: MobManager,
        owner_account: Option<PlayerId>,
    ) -> Self {
        metrics
            .mobs_alive
            .store(mobs.live_count() as u64, Ordering::Relaxed);
        Self {
            world: Mutex::new(WorldState::new(metrics.clone())),
            mobs: Mutex::new(mobs),
            store,
            admins,
            metrics,
            owner_account,
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Role a newly registered account starts with
    fn role_for(&self, id: &str) -> Role {
        if self.owner_account.as_deref() == Some(id) {
            Role::Owner
        } else if self.admins.is_admin(id) {
            Role::Admin
        } else {
            Role::User
        }
    }

    /// Create a persistent account with default stats
    pub fn register(&self, id: &str) -> Result<Player, StoreError> {
        let player = Player::new(id, self.role_for(id));
        self.store.create(&player)?;
        info!("Registered {} as {}", id, player.role.as_str());
        Ok(player)
    }

    /// Bind a fresh session token to a verified identity
    pub fn issue_session(&self, id: &str) -> SessionToken {
        self.world.lock().sessions.issue(id)
    }

    /// Create a throwaway guest account, issue it a token and connect it.
    /// The token is returned to the client in `init`.
    pub fn login_guest<R: Rng + ?Sized>(
        &self,
        room: Option<String>,
        outbox: Outbox,
        rng: &mut R,
    ) -> Result<ConnectionId, ConnectError> {
        let mut guest = loop {
            let id = format!("Guest_{}", rng.gen_range(10_000..100_000));
            if !self.world.lock().players.contains_key(&id) && self.store.load(&id)?.is_none() {
                break Player::new(id, Role::Guest);
            }
        };
        guest.money = account::GUEST_MONEY;
        self.store.create(&guest)?;
        info!("Guest account {} created", guest.id);

        let token = self.issue_session(&guest.id);
        self.bind(&token, room, outbox, Some(token.to_vec()))
    }

    /// Bind a connection to the identity behind `token`.
    ///
    /// An identity already in memory (or evicted but not yet saved) is
    /// rebound as is; otherwise its record is loaded from the store. A load
    /// failure falls back to a fresh default record; a missing record is an
    /// error.
    pub fn connect(
        &self,
        token: &[u8],
        room: Option<String>,
        outbox: Outbox,
    ) -> Result<ConnectionId, ConnectError> {
        let token = SessionToken::try_from_slice(token).ok_or(ConnectError::UnknownSession)?;
        self.bind(&token, room, outbox, None)
    }

    fn bind(
        &self,
        token: &SessionToken,
        room: Option<String>,
        outbox: Outbox,
        reveal_token: Option<Vec<u8>>,
    ) -> Result<ConnectionId, ConnectError> {
        let room = room
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| world::DEFAULT_ROOM.to_string());

        let (id, resident) = {
            let world = self.world.lock();
            let id = world
                .sessions
                .resolve(token)
                .cloned()
                .ok_or(ConnectError::UnknownSession)?;
            let resident = world.players.contains_key(&id) || world.is_evicted(&id);
            (id, resident)
        };

        // Store I/O happens with no lock held
        let loaded = if resident {
            None
        } else {
            match self.store.load(&id) {
                Ok(Some(player)) => Some(player),
                Ok(None) => return Err(ConnectError::UnknownIdentity(id)),
                Err(e) => {
                    warn!("Failed to load {}, starting from defaults: {}", id, e);
                    Some(Player::new(id.clone(), self.role_for(&id)))
                }
            }
        };

        let mut world = self.world.lock();
        let evicted = world
            .departed
            .remove(&id)
            .or_else(|| world.saving.remove(&id));
        let player = world
            .players
            .entry(id.clone())
            .or_insert_with(|| evicted.or(loaded).unwrap_or_else(|| Player::new(id.clone(), Role::User)));
        player.room = room;
        let init = ServerMessage::init(player, reveal_token);

        // One live connection per identity; the old one is closed by
        // dropping its outbox
        if let Some(old) = world.by_player.get(&id).copied() {
            world.connections.remove(&old);
            info!("{} reconnected, closing {}", id, old);
        }

        let conn = ConnectionId::new();
        world.connections.insert(
            conn,
            Connection {
                id: conn,
                player_id: id.clone(),
                outbox,
            },
        );
        world.by_player.insert(id.clone(), conn);
        world.refresh_gauges();
        info!("Player connected: {} ({})", id, conn);

        world.send(id, init);
        Ok(conn)
    }

    /// Remove a connection and evict its player. The evicted record is kept
    /// until the next persistence pass writes it.
    pub fn disconnect(&self, conn: ConnectionId) {
        let mut world = self.world.lock();
        if let Some(player) = world.drop_connection(conn) {
            info!("Player disconnected: {} ({})", player, conn);
        }
    }

    /// Answer one connection directly (pongs)
    pub fn reply(&self, conn: ConnectionId, message: &ServerMessage) {
        let frame = match frame(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to frame reply: {}", e);
                return;
            }
        };
        let mut world = self.world.lock();
        if let Err(conn) = world.push(conn, &frame) {
            world.drop_lost(vec![conn]);
        }
    }

    /// Broadcast each room its own player snapshot
    pub fn game_tick(&self) {
        let mut world = self.world.lock();
        self.metrics.game_ticks.fetch_add(1, Ordering::Relaxed);

        let mut rooms: HashMap<&str, Vec<PlayerSnapshot>> = HashMap::new();
        for player in world.players.values() {
            rooms
                .entry(player.room.as_str())
                .or_default()
                .push(PlayerSnapshot::from_player(player));
        }
        let mut frames: HashMap<String, Frame> = HashMap::with_capacity(rooms.len());
        for (room, players) in rooms {
            match frame(&ServerMessage::State { players }) {
                Ok(f) => {
                    frames.insert(room.to_string(), f);
                }
                Err(e) => warn!("Failed to frame state for room {}: {}", room, e),
            }
        }

        let mut lost = Vec::new();
        for (&conn, connection) in &world.connections {
            let Some(room) = world.players.get(&connection.player_id).map(|p| &p.room) else {
                continue;
            };
            if let Some(f) = frames.get(room) {
                if let Err(conn) = world.push(conn, f) {
                    lost.push(conn);
                }
            }
        }
        world.drop_lost(lost);
    }

    /// Advance every mob by `dt` seconds and broadcast the living ones
    pub fn ai_tick<R: Rng + ?Sized>(&self, dt: f32, now: u64, rng: &mut R) {
        let started = Instant::now();
        let mut world = self.world.lock();
        let (events, snapshot) = {
            let mut mobs = self.mobs.lock();
            let events = mobs.tick(&mut world.players, dt, now, rng);
            let snapshot: Vec<MobSnapshot> = mobs.live().map(MobSnapshot::from_mob).collect();
            (events, snapshot)
        };
        self.metrics
            .mobs_alive
            .store(snapshot.len() as u64, Ordering::Relaxed);

        let mut out = Outgoing::default();
        for event in events {
            match event {
                AiEvent::AbilityCast { mob_id, ability, target, damage } => {
                    debug!("Mob {} cast {} on {} for {}", mob_id, ability, target, damage);
                    out.all(ServerMessage::Event(GameEvent::AbilityCast {
                        mob_id,
                        ability: ability.to_string(),
                        target_id: target,
                        timestamp: now,
                    }));
                }
                AiEvent::PlayerDefeated { player, by } => {
                    out.to(
                        player,
                        ServerMessage::notification(format!("You were defeated by {}!", by.display_name())),
                    );
                }
                AiEvent::Respawned { mob_id } => debug!("Mob {} respawned", mob_id),
            }
        }
        out.all(ServerMessage::MobUpdate { mobs: snapshot });
        world.deliver(out);
        drop(world);

        self.metrics.record_ai_tick(started.elapsed());
    }

    /// Credit passive income to every player in memory
    pub fn income_tick(&self) {
        let mut world = self.world.lock();
        let event = world.event;
        let amount = economy::credit_income(&mut world.players, event);
        self.metrics.income_ticks.fetch_add(1, Ordering::Relaxed);
        debug!("Income tick: +{} to {} players", amount, world.players.len());
    }

    /// Re-roll the world event and announce it
    pub fn event_tick<R: Rng + ?Sized>(&self, rng: &mut R) -> WorldEvent {
        let event = WorldEvent::random(rng);
        self.set_world_event(event);
        self.metrics.event_ticks.fetch_add(1, Ordering::Relaxed);
        event
    }

    pub fn set_world_event(&self, event: WorldEvent) {
        let mut world = self.world.lock();
        world.event = event;
        let gauge = WorldEvent::ALL.iter().position(|e| *e == event).unwrap_or(0);
        self.metrics.world_event.store(gauge as u64, Ordering::Relaxed);
        info!("World event: {}", event.display_name());
        world.broadcast(ServerMessage::Event(GameEvent::WorldEventChanged {
            event,
            name: event.display_name().to_string(),
        }));
    }

    pub fn world_event(&self) -> WorldEvent {
        self.world.lock().event
    }

    /// Copy of every record that should be written: everyone in memory plus
    /// evicted records still waiting for a save. Evicted records stay
    /// reachable for reconnects until [`save_batch`](Self::save_batch)
    /// settles them.
    pub fn take_save_batch(&self) -> Vec<Player> {
        let mut world = self.world.lock();
        let mut batch: Vec<Player> = world.players.values().cloned().collect();
        let departed: Vec<Player> = world.departed.drain().map(|(_, player)| player).collect();
        for player in departed {
            batch.push(player.clone());
            world.saving.insert(player.id.clone(), player);
        }
        batch
    }

    /// Write a batch to the store. Blocking; call off the async runtime.
    ///
    /// Evicted records that fail to save are queued again for the next pass
    /// unless their player has come back online.
    pub fn save_batch(&self, batch: Vec<Player>) -> SaveReport {
        let mut report = SaveReport::default();
        let mut settled = Vec::with_capacity(batch.len());
        for player in batch {
            let ok = match self.store.save(&player) {
                Ok(()) => {
                    report.saved += 1;
                    true
                }
                Err(e) => {
                    warn!("Failed to save {}: {}", player.id, e);
                    report.failed += 1;
                    false
                }
            };
            settled.push((player.id, ok));
        }
        self.metrics
            .saves_ok
            .fetch_add(report.saved as u64, Ordering::Relaxed);
        self.metrics
            .saves_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);

        // A record still in `saving` was neither rebound nor edited meanwhile
        let mut world = self.world.lock();
        for (id, ok) in settled {
            if let Some(player) = world.saving.remove(&id) {
                if !ok {
                    world.departed.entry(id).or_insert(player);
                }
            }
        }
        report
    }

    /// Copy of an in-memory player
    pub fn player(&self, id: &str) -> Option<Player> {
        self.world.lock().players.get(id).cloned()
    }

    /// Copy of a mob, dead or alive
    pub fn mob(&self, id: MobId) -> Option<Mob> {
        self.mobs.lock().get(id).cloned()
    }

    pub fn player_count(&self) -> usize {
        self.world.lock().players.len()
    }

    pub fn connection_count(&self) -> usize {
        self.world.lock().connections.len()
    }
}
