//! End-to-end behaviour of the world hub through its public API: connections
//! are plain outbox channels, time and randomness are supplied by the test.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc::error::TryRecvError;

use corsair_server::game::catalog::Ability;
use corsair_server::game::state::{MobKind, MobState, Player, Position, Role, Team, WorldEvent};
use corsair_server::game::systems::ai::MobManager;
use corsair_server::hub::{AdminFollowup, ConnectError, WorldHub};
use corsair_server::metrics::Metrics;
use corsair_server::net::connection::{ConnectionId, Outbox, OutboxReceiver};
use corsair_server::net::protocol::{
    decode, AdminAction, ClientAction, GameEvent, ServerMessage,
};
use corsair_server::persistence::{AdminList, AdminRegistry, MemoryStore, PlayerStore};
use corsair_server::util::vec2::Vec2;

const DT: f32 = 0.05;

struct Harness {
    hub: WorldHub,
    store: Arc<MemoryStore>,
    admins: Arc<AdminList>,
    rng: StdRng,
}

struct Client {
    conn: ConnectionId,
    rx: OutboxReceiver,
}

impl Harness {
    fn new(mobs: MobManager) -> Self {
        let store = Arc::new(MemoryStore::new());
        let admins = Arc::new(AdminList::in_memory(Vec::<String>::new()));
        let hub = WorldHub::new(
            store.clone(),
            admins.clone(),
            Arc::new(Metrics::new()),
            mobs,
            Some("captain".to_string()),
        );
        Self {
            hub,
            store,
            admins,
            rng: StdRng::seed_from_u64(7),
        }
    }

    fn empty() -> Self {
        Self::new(MobManager::new())
    }

    /// Store `player` and connect it to `room`
    fn join_as(&self, player: Player, room: Option<&str>) -> Client {
        self.store.create(&player).unwrap();
        self.connect(&player.id, room)
    }

    /// Register a fresh account and connect it
    fn join(&self, id: &str) -> Client {
        self.hub.register(id).unwrap();
        self.connect(id, None)
    }

    fn connect(&self, id: &str, room: Option<&str>) -> Client {
        let token = self.hub.issue_session(id);
        let (outbox, rx) = Outbox::new();
        let conn = self
            .hub
            .connect(token.as_bytes(), room.map(str::to_string), outbox)
            .unwrap();
        Client { conn, rx }
    }

    /// Dispatch like the read loop does, running any store followup inline
    fn act(&mut self, client: &Client, action: ClientAction, now: u64) {
        if let Some(followup) = self.hub.dispatch(client.conn, action, now, &mut self.rng) {
            self.hub.run_followup(followup);
        }
    }
}

/// Everything queued for a client so far
fn drain(rx: &mut OutboxReceiver) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        messages.push(decode(&frame[4..]).unwrap());
    }
    messages
}

fn notifications(messages: &[ServerMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::Notification { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// A player parked outside the safe zone
fn fighter(id: &str, x: f32, z: f32) -> Player {
    let mut player = Player::new(id, Role::User);
    player.position = Position::new(x, 3.5, z);
    player
}

#[test]
fn test_connect_sends_init() {
    let h = Harness::empty();
    let mut alice = h.join("alice");

    let messages = drain(&mut alice.rx);
    match &messages[0] {
        ServerMessage::Init { id, role, money, session_token, .. } => {
            assert_eq!(id, "alice");
            assert_eq!(*role, Role::User);
            assert_eq!(*money, 5000);
            assert!(session_token.is_none());
        }
        other => panic!("expected init, got {other:?}"),
    }
    assert_eq!(h.hub.player_count(), 1);
    assert_eq!(h.hub.player("alice").unwrap().room, "public_1");
}

#[test]
fn test_owner_account_registers_as_owner() {
    let h = Harness::empty();
    assert_eq!(h.hub.register("captain").unwrap().role, Role::Owner);
    assert!(h.hub.register("captain").is_err());
}

#[test]
fn test_unknown_tokens_are_rejected() {
    let h = Harness::empty();
    let (outbox, _rx) = Outbox::new();
    let err = h.hub.connect(&[9u8; 32], None, outbox.clone()).unwrap_err();
    assert!(matches!(err, ConnectError::UnknownSession));
    let err = h.hub.connect(&[1, 2, 3], None, outbox).unwrap_err();
    assert!(matches!(err, ConnectError::UnknownSession));
    assert_eq!(h.hub.connection_count(), 0);
}

#[test]
fn test_token_without_account_is_rejected() {
    let h = Harness::empty();
    let token = h.hub.issue_session("ghost");
    let (outbox, _rx) = Outbox::new();
    let err = h.hub.connect(token.as_bytes(), None, outbox).unwrap_err();
    assert!(matches!(err, ConnectError::UnknownIdentity(id) if id == "ghost"));
    assert_eq!(h.hub.player_count(), 0);
}

#[test]
fn test_reconnect_replaces_old_connection() {
    let mut h = Harness::empty();
    let mut first = h.join("alice");
    h.act(&first, ClientAction::Move { x: 120.0, z: 80.0 }, 1_000);

    let second = h.connect("alice", None);
    assert_ne!(first.conn, second.conn);
    assert_eq!(h.hub.player_count(), 1);
    assert_eq!(h.hub.connection_count(), 1);

    // State carried over, old channel closed
    let alice = h.hub.player("alice").unwrap();
    assert_eq!((alice.position.x, alice.position.z), (120.0, 80.0));
    drain(&mut first.rx);
    assert_eq!(first.rx.try_recv().unwrap_err(), TryRecvError::Disconnected);

    // Actions from the stale connection are ignored
    h.act(&first, ClientAction::Move { x: 0.0, z: 0.0 }, 2_000);
    assert_eq!(h.hub.player("alice").unwrap().position.x, 120.0);
}

#[test]
fn test_reconnect_before_save_keeps_progress() {
    let mut h = Harness::empty();
    let alice = h.join("alice");
    h.act(&alice, ClientAction::BuyWeapon { item: "katana".to_string() }, 1_000);
    h.hub.disconnect(alice.conn);
    assert_eq!(h.hub.player_count(), 0);

    // The store still holds the old record; the evicted one wins
    let _again = h.connect("alice", None);
    let alice = h.hub.player("alice").unwrap();
    assert_eq!(alice.money, 4000);
    assert!(alice.inventory.contains("katana"));
}

#[test]
fn test_guest_login() {
    let mut h = Harness::empty();
    let (outbox, mut rx) = Outbox::new();
    let conn = h.hub.login_guest(Some("cove".to_string()), outbox, &mut h.rng).unwrap();

    let token = match drain(&mut rx).remove(0) {
        ServerMessage::Init { id, role, money, session_token, .. } => {
            assert!(id.starts_with("Guest_"));
            assert_eq!(id.len(), "Guest_".len() + 5);
            assert_eq!(role, Role::Guest);
            assert_eq!(money, 1000);
            assert!(h.store.load(&id).unwrap().is_some());
            assert_eq!(h.hub.player(&id).unwrap().room, "cove");
            session_token.unwrap()
        }
        other => panic!("expected init, got {other:?}"),
    };

    // The revealed token works for a reconnect
    h.hub.disconnect(conn);
    let (outbox, _rx) = Outbox::new();
    assert!(h.hub.connect(&token, None, outbox).is_ok());
    assert_eq!(h.hub.player_count(), 1);
}

#[test]
fn test_blank_room_falls_back_to_default() {
    let h = Harness::empty();
    h.hub.register("alice").unwrap();
    let _alice = h.connect("alice", Some("  "));
    assert_eq!(h.hub.player("alice").unwrap().room, "public_1");
}

#[test]
fn test_mob_dies_once_with_one_reward() {
    let mut mobs = MobManager::new();
    let gorilla = mobs.spawn(MobKind::Gorilla, Vec2::new(101.0, 100.0));
    let mut h = Harness::new(mobs);
    let mut alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    let bob = h.join_as(fighter("bob", 100.0, 101.0), None);
    drain(&mut alice.rx);

    let transform = ClientAction::AbilityHit { mob_id: gorilla, ability: Ability::Transform };
    h.act(&alice, transform.clone(), 10_000);
    assert_eq!(h.hub.mob(gorilla).unwrap().health, 100);
    h.act(&alice, transform.clone(), 15_000);

    let mob = h.hub.mob(gorilla).unwrap();
    assert_eq!(mob.state, MobState::Dead);
    assert_eq!(mob.health, 0);

    // Further hits from anyone do nothing
    h.act(&alice, transform, 20_000);
    h.act(&bob, ClientAction::MobHit { mob_id: gorilla }, 20_000);

    let a = h.hub.player("alice").unwrap();
    assert_eq!(a.exp, 100);
    assert_eq!(a.bounty, 100);
    assert_eq!(h.hub.player("bob").unwrap().bounty, 0);
    assert_eq!(notifications(&drain(&mut alice.rx)), vec!["Bounty Increased!"]);
}

#[test]
fn test_mob_respawns_after_delay() {
    let mut mobs = MobManager::new();
    let gorilla = mobs.spawn(MobKind::Gorilla, Vec2::new(101.0, 100.0));
    mobs.get_mut(gorilla).unwrap().health = 10;
    let mut h = Harness::new(mobs);
    let mut alice = h.join_as(fighter("alice", 100.0, 100.0), None);

    h.act(&alice, ClientAction::MobHit { mob_id: gorilla }, 10_000);
    assert!(h.hub.mob(gorilla).unwrap().is_dead());
    drain(&mut alice.rx);

    let mut rng = StdRng::seed_from_u64(1);
    h.hub.ai_tick(DT, 14_999, &mut rng);
    assert!(h.hub.mob(gorilla).unwrap().is_dead());
    let update = drain(&mut alice.rx);
    assert!(update.contains(&ServerMessage::MobUpdate { mobs: Vec::new() }));

    h.hub.ai_tick(DT, 15_000, &mut rng);
    let mob = h.hub.mob(gorilla).unwrap();
    assert_eq!(mob.id, gorilla);
    assert_eq!(mob.state, MobState::Idle);
    assert_eq!(mob.health, mob.max_health);
    assert_eq!((mob.position.x, mob.position.z), (101.0, 100.0));
    assert_eq!(h.hub.metrics().mobs_alive.load(Ordering::Relaxed), 1);
}

#[test]
fn test_pvp_refused_in_safe_zone() {
    let mut h = Harness::empty();
    let mut alice = h.join("alice");
    let _bob = h.join("bob");
    drain(&mut alice.rx);

    h.act(&alice, ClientAction::PlayerHit { victim_id: "bob".to_string() }, 1_000);
    assert_eq!(h.hub.player("bob").unwrap().health, 100);
    assert_eq!(notifications(&drain(&mut alice.rx)), vec!["PvP Disabled in Safe Zone!"]);
}

#[test]
fn test_pvp_refused_between_teammates() {
    let mut h = Harness::empty();
    let mut alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    let bob = h.join_as(fighter("bob", 101.0, 100.0), None);
    h.act(&alice, ClientAction::JoinTeam { team: Team::Pirate }, 0);
    h.act(&bob, ClientAction::JoinTeam { team: Team::Pirate }, 0);
    drain(&mut alice.rx);

    h.act(&alice, ClientAction::PlayerHit { victim_id: "bob".to_string() }, 1_000);
    assert_eq!(h.hub.player("bob").unwrap().health, 100);
    assert_eq!(notifications(&drain(&mut alice.rx)), vec!["Cannot attack your own team!"]);

    // Opposing teams can fight
    h.act(&bob, ClientAction::JoinTeam { team: Team::Marine }, 0);
    h.act(&alice, ClientAction::PlayerHit { victim_id: "bob".to_string() }, 2_000);
    assert_eq!(h.hub.player("bob").unwrap().health, 90);
}

#[test]
fn test_hits_within_cooldown_land_once() {
    let mut h = Harness::empty();
    let alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    let _bob = h.join_as(fighter("bob", 101.0, 100.0), None);
    let hit = ClientAction::PlayerHit { victim_id: "bob".to_string() };

    h.act(&alice, hit.clone(), 1_000);
    h.act(&alice, hit.clone(), 1_200);
    assert_eq!(h.hub.player("bob").unwrap().health, 90);

    h.act(&alice, hit, 1_500);
    assert_eq!(h.hub.player("bob").unwrap().health, 80);
}

#[test]
fn test_out_of_range_hit_does_nothing() {
    let mut h = Harness::empty();
    let alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    let bob = h.join_as(fighter("bob", 200.0, 100.0), None);
    let hit = ClientAction::PlayerHit { victim_id: "bob".to_string() };

    h.act(&alice, hit.clone(), 1_000);
    assert_eq!(h.hub.player("bob").unwrap().health, 100);

    // The miss did not start a cooldown
    h.act(&bob, ClientAction::Move { x: 105.0, z: 100.0 }, 1_000);
    h.act(&alice, hit, 1_000);
    assert_eq!(h.hub.player("bob").unwrap().health, 90);
}

#[test]
fn test_self_hit_is_ignored() {
    let mut h = Harness::empty();
    let alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    h.act(&alice, ClientAction::PlayerHit { victim_id: "alice".to_string() }, 1_000);
    assert_eq!(h.hub.player("alice").unwrap().health, 100);
    assert_eq!(h.hub.player_count(), 1);
}

#[test]
fn test_pvp_kill_respawns_victim() {
    let mut h = Harness::empty();
    let alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    let mut victim = fighter("bob", 101.0, 100.0);
    victim.health = 20;
    victim.bounty = 1_500;
    let mut bob = h.join_as(victim, None);
    drain(&mut bob.rx);

    let hit = ClientAction::PlayerHit { victim_id: "bob".to_string() };
    h.act(&alice, hit.clone(), 1_000);
    h.act(&alice, hit, 1_500);

    let b = h.hub.player("bob").unwrap();
    assert_eq!(b.health, 100);
    assert_eq!(b.bounty, 500);
    assert_eq!((b.position.x, b.position.y, b.position.z), (0.0, 3.5, 0.0));

    let a = h.hub.player("alice").unwrap();
    assert_eq!(a.bounty, 2_500);
    assert_eq!(a.money, 6_000);

    let chat = drain(&mut bob.rx);
    assert!(chat.contains(&ServerMessage::system_chat("alice defeated bob!")));
}

#[test]
fn test_pvp_bounty_loss_is_capped() {
    let mut h = Harness::empty();
    let alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    let mut victim = fighter("bob", 101.0, 100.0);
    victim.health = 5;
    victim.bounty = 300;
    let _bob = h.join_as(victim, None);

    h.act(&alice, ClientAction::PlayerHit { victim_id: "bob".to_string() }, 1_000);
    assert_eq!(h.hub.player("bob").unwrap().bounty, 0);
}

#[test]
fn test_quest_completes_exactly_once() {
    let mut mobs = MobManager::new();
    let ids: Vec<_> = (0..6)
        .map(|i| {
            let id = mobs.spawn(MobKind::Gorilla, Vec2::new(100.0 + i as f32, 101.0));
            mobs.get_mut(id).unwrap().health = 10;
            id
        })
        .collect();
    let mut h = Harness::new(mobs);
    let mut alice = h.join_as(fighter("alice", 100.0, 100.0), None);
    h.act(&alice, ClientAction::AcceptQuest { quest_key: "gorilla_quest".to_string() }, 0);
    assert!(h.hub.player("alice").unwrap().active_quest.is_some());
    drain(&mut alice.rx);

    for (i, id) in ids.iter().enumerate() {
        h.act(&alice, ClientAction::MobHit { mob_id: *id }, 1_000 + 500 * i as u64);
    }

    let a = h.hub.player("alice").unwrap();
    assert!(a.active_quest.is_none());
    assert_eq!(a.money, 5_200);
    assert_eq!(a.exp, 6 * 100 + 500);
    let completed = notifications(&drain(&mut alice.rx))
        .into_iter()
        .filter(|n| n == "Quest Completed!")
        .count();
    assert_eq!(completed, 1);
}

#[test]
fn test_unknown_quest_key_is_ignored() {
    let mut h = Harness::empty();
    let alice = h.join("alice");
    h.act(&alice, ClientAction::AcceptQuest { quest_key: "kraken".to_string() }, 0);
    assert!(h.hub.player("alice").unwrap().active_quest.is_none());
}

#[test]
fn test_fruit_rolls_charge_per_roll() {
    let mut h = Harness::empty();
    let mut alice = h.join("alice");
    let before = h.hub.player("alice").unwrap().inventory.len();
    drain(&mut alice.rx);

    for _ in 0..3 {
        h.act(&alice, ClientAction::RollFruit, 1_000);
    }
    let a = h.hub.player("alice").unwrap();
    assert_eq!(a.money, 2_000);
    assert_eq!(a.inventory.len(), before + 3);
    let stats = drain(&mut alice.rx)
        .into_iter()
        .filter(|m| matches!(m, ServerMessage::UpdateStats { new_item: Some(_), .. }))
        .count();
    assert_eq!(stats, 3);

    h.act(&alice, ClientAction::RollFruit, 1_000);
    h.act(&alice, ClientAction::RollFruit, 1_000);
    h.act(&alice, ClientAction::RollFruit, 1_000);
    assert_eq!(h.hub.player("alice").unwrap().money, 0);
    assert_eq!(notifications(&drain(&mut alice.rx)), vec!["Not enough money!"]);
}

#[test]
fn test_equip_requires_ownership() {
    let mut h = Harness::empty();
    let mut alice = h.join("alice");
    drain(&mut alice.rx);

    h.act(&alice, ClientAction::SetWeapon { weapon: "bazooka".to_string() }, 0);
    assert_eq!(h.hub.player("alice").unwrap().weapon, "melee");
    assert_eq!(notifications(&drain(&mut alice.rx)), vec!["You don't own that!"]);

    h.act(&alice, ClientAction::BuyWeapon { item: "katana".to_string() }, 0);
    h.act(&alice, ClientAction::SetWeapon { weapon: "katana".to_string() }, 0);
    assert_eq!(h.hub.player("alice").unwrap().weapon, "katana");
}

#[test]
fn test_non_finite_move_is_ignored() {
    let mut h = Harness::empty();
    let alice = h.join("alice");
    h.act(&alice, ClientAction::Move { x: f32::NAN, z: 10.0 }, 0);
    h.act(&alice, ClientAction::Move { x: 10.0, z: f32::INFINITY }, 0);
    let a = h.hub.player("alice").unwrap();
    assert_eq!((a.position.x, a.position.z), (0.0, 0.0));
}

#[test]
fn test_boss_ability_respects_cooldown() {
    let mut mobs = MobManager::new();
    let king = mobs.spawn(MobKind::GorillaKing, Vec2::new(100.0, 100.0));
    let mut h = Harness::new(mobs);
    let mut alice = h.join_as(fighter("alice", 100.0, 108.0), None);
    drain(&mut alice.rx);
    let mut rng = StdRng::seed_from_u64(3);

    h.hub.ai_tick(DT, 1_000, &mut rng);
    assert_eq!(h.hub.player("alice").unwrap().health, 80);
    let cast = drain(&mut alice.rx).into_iter().any(|m| {
        matches!(
            m,
            ServerMessage::Event(GameEvent::AbilityCast { mob_id, ref ability, ref target_id, .. })
                if mob_id == king && ability == "ChestPound" && target_id == "alice"
        )
    });
    assert!(cast);

    h.hub.ai_tick(DT, 1_050, &mut rng);
    h.hub.ai_tick(DT, 6_999, &mut rng);
    assert_eq!(h.hub.player("alice").unwrap().health, 80);

    h.hub.ai_tick(DT, 7_000, &mut rng);
    assert_eq!(h.hub.player("alice").unwrap().health, 60);
    assert_eq!(h.hub.mob(king).unwrap().state, MobState::Chase);
}

#[test]
fn test_mobs_ignore_players_in_safe_zone() {
    let mut mobs = MobManager::new();
    let gorilla = mobs.spawn(MobKind::Gorilla, Vec2::new(5.0, 0.0));
    let h = Harness::new(mobs);
    let _alice = h.join("alice");

    let mut rng = StdRng::seed_from_u64(3);
    for step in 0..40 {
        h.hub.ai_tick(DT, 1_000 + step * 50, &mut rng);
    }
    assert_eq!(h.hub.player("alice").unwrap().health, 100);
    assert_eq!(h.hub.mob(gorilla).unwrap().state, MobState::Idle);
}

#[test]
fn test_state_is_scoped_to_room() {
    let h = Harness::empty();
    let mut alice = h.join_as(Player::new("alice", Role::User), Some("cove"));
    let _bob = h.join_as(Player::new("bob", Role::User), Some("reef"));
    let _carol = h.join_as(Player::new("carol", Role::User), Some("cove"));
    drain(&mut alice.rx);

    h.hub.game_tick();
    let messages = drain(&mut alice.rx);
    assert_eq!(messages.len(), 1);
    let ServerMessage::State { players } = &messages[0] else {
        panic!("expected state, got {:?}", messages[0]);
    };
    let mut ids: Vec<_> = players.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["alice", "carol"]);
}

#[test]
fn test_full_outbox_drops_the_peer() {
    let h = Harness::empty();
    let _alice = h.join("alice");
    h.hub.register("bob").unwrap();
    let token = h.hub.issue_session("bob");
    // Init alone fills this queue
    let (outbox, _rx) = Outbox::with_capacity(1);
    h.hub.connect(token.as_bytes(), None, outbox).unwrap();
    assert_eq!(h.hub.player_count(), 2);

    h.hub.game_tick();
    assert_eq!(h.hub.player_count(), 1);
    assert!(h.hub.player("bob").is_none());
    assert_eq!(h.hub.metrics().peers_dropped.load(Ordering::Relaxed), 1);

    // The evicted record is still saved
    let batch = h.hub.take_save_batch();
    assert!(batch.iter().any(|p| p.id == "bob"));
}

#[test]
fn test_closed_outbox_drops_the_peer() {
    let h = Harness::empty();
    let alice = h.join("alice");
    drop(alice.rx);
    h.hub.set_world_event(WorldEvent::GoldRush);
    assert_eq!(h.hub.connection_count(), 0);
}

#[test]
fn test_income_follows_world_event() {
    let mut h = Harness::empty();
    let mut alice = h.join("alice");

    h.hub.income_tick();
    assert_eq!(h.hub.player("alice").unwrap().money, 5_050);

    h.hub.set_world_event(WorldEvent::GoldRush);
    h.hub.income_tick();
    assert_eq!(h.hub.player("alice").unwrap().money, 5_150);

    drain(&mut alice.rx);
    let event = h.hub.event_tick(&mut h.rng);
    assert_eq!(h.hub.world_event(), event);
    let announced = drain(&mut alice.rx);
    assert_eq!(
        announced,
        vec![ServerMessage::Event(GameEvent::WorldEventChanged {
            event,
            name: event.display_name().to_string(),
        })]
    );
}

#[test]
fn test_save_batch_writes_and_drains_departed() {
    let mut h = Harness::empty();
    let alice = h.join("alice");
    let _bob = h.join("bob");
    h.act(&alice, ClientAction::BuyWeapon { item: "katana".to_string() }, 0);
    h.hub.disconnect(alice.conn);

    let batch = h.hub.take_save_batch();
    assert_eq!(batch.len(), 2);
    let report = h.hub.save_batch(batch);
    assert_eq!(report.saved, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(h.store.load("alice").unwrap().unwrap().money, 4_000);

    // Alice has left the hub for good; only bob remains to save
    let batch = h.hub.take_save_batch();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, "bob");
}

#[test]
fn test_reconnect_during_save_keeps_saved_progress() {
    let h = Harness::empty();
    let alice = h.join("alice");
    h.hub.income_tick();
    h.hub.disconnect(alice.conn);

    // Alice comes back while her record is being written
    let batch = h.hub.take_save_batch();
    let _again = h.connect("alice", None);
    assert_eq!(h.hub.player("alice").unwrap().money, 5_050);
    assert_eq!(h.hub.save_batch(batch).saved, 1);
    assert_eq!(h.store.load("alice").unwrap().unwrap().money, 5_050);

    let batch = h.hub.take_save_batch();
    h.hub.save_batch(batch);
    assert_eq!(h.store.load("alice").unwrap().unwrap().money, 5_050);
}

#[test]
fn test_promotion_during_save_is_written_next_pass() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    let carol = h.join("carol");
    h.hub.disconnect(carol.conn);

    let batch = h.hub.take_save_batch();
    h.act(&captain, ClientAction::Admin(AdminAction::MakeAdmin { target: "carol".to_string() }), 0);
    h.hub.save_batch(batch);
    assert_eq!(h.store.load("carol").unwrap().unwrap().role, Role::User);

    let batch = h.hub.take_save_batch();
    assert!(batch.iter().any(|p| p.id == "carol" && p.role == Role::Admin));
    h.hub.save_batch(batch);
    assert_eq!(h.store.load("carol").unwrap().unwrap().role, Role::Admin);
}

#[test]
fn test_kick() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    let mut bob = h.join("bob");
    drain(&mut bob.rx);

    h.act(&captain, ClientAction::Admin(AdminAction::Kick { target: "bob".to_string() }), 0);
    assert_eq!(
        drain(&mut bob.rx),
        vec![ServerMessage::Kicked { reason: "Admin Kicked".to_string() }]
    );
    assert_eq!(bob.rx.try_recv().unwrap_err(), TryRecvError::Disconnected);
    assert!(h.hub.player("bob").is_none());
    assert_eq!(h.hub.connection_count(), 1);
}

#[test]
fn test_admin_actions_need_staff_role() {
    let mut h = Harness::empty();
    let _captain = h.join("captain");
    let bob = h.join("bob");

    h.act(&bob, ClientAction::Admin(AdminAction::Kick { target: "captain".to_string() }), 0);
    h.act(
        &bob,
        ClientAction::Admin(AdminAction::GrantItem { target: "bob".to_string(), item: "Dragon".to_string() }),
        0,
    );
    assert!(h.hub.player("captain").is_some());
    assert!(!h.hub.player("bob").unwrap().inventory.contains("Dragon"));
}

#[test]
fn test_grant_item_and_teleport() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    let bob = h.join("bob");
    h.act(&bob, ClientAction::Move { x: 300.0, z: -40.0 }, 0);

    h.act(
        &captain,
        ClientAction::Admin(AdminAction::GrantItem { target: "bob".to_string(), item: "Dragon".to_string() }),
        0,
    );
    assert!(h.hub.player("bob").unwrap().inventory.contains("Dragon"));

    h.act(&captain, ClientAction::Admin(AdminAction::Teleport { target: "bob".to_string() }), 0);
    let c = h.hub.player("captain").unwrap();
    assert_eq!((c.position.x, c.position.z), (300.0, -40.0));
}

#[test]
fn test_conqueror_haki_stuns_nearby_mobs() {
    let mut mobs = MobManager::new();
    let near = mobs.spawn(MobKind::Gorilla, Vec2::new(110.0, 100.0));
    let far = mobs.spawn(MobKind::Gorilla, Vec2::new(160.0, 100.0));
    let mut h = Harness::new(mobs);
    let captain = h.join("captain");
    h.act(&captain, ClientAction::Move { x: 100.0, z: 100.0 }, 0);

    h.act(&captain, ClientAction::Admin(AdminAction::ConquerorHaki), 1_000);
    let stunned = h.hub.mob(near).unwrap();
    assert_eq!(stunned.state, MobState::Stunned);
    assert_eq!(stunned.stun_end, 6_000);
    assert_eq!(h.hub.mob(far).unwrap().state, MobState::Idle);

    // Stunned mobs stand still
    let mut rng = StdRng::seed_from_u64(3);
    h.hub.ai_tick(DT, 1_050, &mut rng);
    assert_eq!(h.hub.mob(near).unwrap().position.x, 110.0);
}

#[test]
fn test_admin_chat_carries_role() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    let mut bob = h.join("bob");
    drain(&mut bob.rx);

    h.act(&captain, ClientAction::Admin(AdminAction::Chat { text: "ahoy".to_string() }), 0);
    assert_eq!(
        drain(&mut bob.rx),
        vec![ServerMessage::Chat {
            from: "captain".to_string(),
            text: "ahoy".to_string(),
            role: "owner".to_string(),
        }]
    );
}

#[test]
fn test_make_admin_online() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    let mut bob = h.join("bob");
    drain(&mut bob.rx);

    h.act(&captain, ClientAction::Admin(AdminAction::MakeAdmin { target: "bob".to_string() }), 0);
    assert_eq!(h.hub.player("bob").unwrap().role, Role::Admin);
    assert!(h.admins.is_admin("bob"));

    let messages = drain(&mut bob.rx);
    assert_eq!(notifications(&messages), vec!["You are now an Admin!"]);
    assert!(messages
        .iter()
        .any(|m| matches!(m, ServerMessage::Init { role: Role::Admin, .. })));
}

#[test]
fn test_make_admin_offline_updates_store() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    h.hub.register("carol").unwrap();

    h.act(&captain, ClientAction::Admin(AdminAction::MakeAdmin { target: "carol".to_string() }), 0);
    assert!(h.admins.is_admin("carol"));
    assert_eq!(h.store.load("carol").unwrap().unwrap().role, Role::Admin);
}

#[test]
fn test_promotion_store_work_is_left_to_caller() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    h.hub.register("carol").unwrap();

    let action = ClientAction::Admin(AdminAction::MakeAdmin { target: "carol".to_string() });
    let followup = h.hub.dispatch(captain.conn, action, 0, &mut h.rng);
    assert_eq!(
        followup,
        Some(AdminFollowup::PersistAdmin { id: "carol".to_string(), offline: true })
    );
    assert!(!h.admins.is_admin("carol"));
    assert_eq!(h.store.load("carol").unwrap().unwrap().role, Role::User);

    h.hub.run_followup(followup.unwrap());
    assert!(h.admins.is_admin("carol"));
    assert_eq!(h.store.load("carol").unwrap().unwrap().role, Role::Admin);
}

#[test]
fn test_only_owner_can_promote() {
    let mut h = Harness::empty();
    let captain = h.join("captain");
    let bob = h.join("bob");
    let _carol = h.join("carol");
    h.act(&captain, ClientAction::Admin(AdminAction::MakeAdmin { target: "bob".to_string() }), 0);
    assert_eq!(h.hub.player("bob").unwrap().role, Role::Admin);

    h.act(&bob, ClientAction::Admin(AdminAction::MakeAdmin { target: "carol".to_string() }), 0);
    assert_eq!(h.hub.player("carol").unwrap().role, Role::User);
    assert!(!h.admins.is_admin("carol"));
}

#[test]
fn test_admin_list_grants_role_on_registration() {
    let h = Harness::empty();
    h.admins.add("dana").unwrap();
    assert_eq!(h.hub.register("dana").unwrap().role, Role::Admin);
}

#[test]
fn test_pong_reply() {
    let h = Harness::empty();
    let mut alice = h.join("alice");
    drain(&mut alice.rx);

    h.hub.reply(
        alice.conn,
        &ServerMessage::Pong { client_timestamp: 11, server_timestamp: 22 },
    );
    assert_eq!(
        drain(&mut alice.rx),
        vec![ServerMessage::Pong { client_timestamp: 11, server_timestamp: 22 }]
    );
}
