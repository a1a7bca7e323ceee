//! World data model: players, mobs, quests and the world event.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::constants::{account, ai, world};
use crate::util::vec2::Vec2;

/// Stable, username-derived player identifier
pub type PlayerId = String;

/// Process-unique mob identifier (reused across respawns)
pub type MobId = u64;

/// Position in world space. Gameplay distances ignore `y`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn spawn_point() -> Self {
        let (x, y, z) = world::SPAWN_POINT;
        Self { x, y, z }
    }

    /// Projection onto the horizontal plane
    #[inline]
    pub fn planar(&self) -> Vec2 {
        Vec2::new(self.x, self.z)
    }

    #[inline]
    pub fn set_planar(&mut self, p: Vec2) {
        self.x = p.x;
        self.z = p.z;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Marine,
    Pirate,
    #[default]
    Neutral,
}

impl Team {
    /// Two players on the same non-neutral team cannot hurt each other.
    pub fn is_friendly_with(self, other: Team) -> bool {
        self == other && self != Team::Neutral
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    #[default]
    User,
    Admin,
    Owner,
}

impl Role {
    /// Admin panel access
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

/// Owned item identifiers.
///
/// Rolled fruits may repeat, so this is a list; ownership checks are exact
/// identifier matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Inventory(Vec<String>);

impl Inventory {
    pub fn starter() -> Self {
        Self(vec![account::DEFAULT_WEAPON.to_string()])
    }

    pub fn contains(&self, item: &str) -> bool {
        self.0.iter().any(|owned| owned == item)
    }

    pub fn push(&mut self, item: impl Into<String>) {
        self.0.push(item.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> &[String] {
        &self.0
    }
}

/// Result of crediting a kill against a quest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestProgress {
    /// Kill did not match the quest target
    Unaffected,
    Advanced,
    /// Threshold reached; the caller pays the reward and clears the quest
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quest {
    pub name: String,
    pub target: MobKind,
    pub target_count: u32,
    pub current: u32,
    pub reward_exp: u64,
    pub reward_money: u64,
}

impl Quest {
    /// Count a kill of `kind`. Progress never exceeds `target_count`.
    pub fn record_kill(&mut self, kind: MobKind) -> QuestProgress {
        if kind != self.target || self.current >= self.target_count {
            return QuestProgress::Unaffected;
        }
        self.current += 1;
        if self.current >= self.target_count {
            QuestProgress::Completed
        } else {
            QuestProgress::Advanced
        }
    }
}

/// Process-wide modifier, rotated on the event tick. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldEvent {
    #[default]
    None,
    GoldRush,
    DoubleLuck,
}

impl WorldEvent {
    pub const ALL: [WorldEvent; 3] = [WorldEvent::None, WorldEvent::GoldRush, WorldEvent::DoubleLuck];

    /// Uniform pick among all three values
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    pub fn income_multiplier(self) -> u64 {
        if self == WorldEvent::GoldRush {
            2
        } else {
            1
        }
    }

    pub fn luck_multiplier(self) -> f32 {
        if self == WorldEvent::DoubleLuck {
            2.0
        } else {
            1.0
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            WorldEvent::None => "None",
            WorldEvent::GoldRush => "Gold Rush",
            WorldEvent::DoubleLuck => "Double Luck",
        }
    }
}

/// Authoritative player record.
///
/// `room`, `last_attack` and `next_regen_at` are session-local and never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub position: Position,
    pub health: u32,
    pub max_health: u32,
    #[serde(default)]
    pub team: Team,
    pub weapon: String,
    pub level: u32,
    pub exp: u64,
    pub money: u64,
    pub bounty: u64,
    pub inventory: Inventory,
    pub luck: f32,
    #[serde(default)]
    pub active_quest: Option<Quest>,
    #[serde(default)]
    pub role: Role,

    #[serde(skip)]
    pub room: String,
    #[serde(skip)]
    pub last_attack: u64,
    #[serde(skip)]
    pub next_regen_at: u64,
}

impl Player {
    /// Fresh account defaults
    pub fn new(id: impl Into<PlayerId>, role: Role) -> Self {
        Self {
            id: id.into(),
            position: Position::spawn_point(),
            health: account::STARTING_HEALTH,
            max_health: account::STARTING_HEALTH,
            team: Team::Neutral,
            weapon: account::DEFAULT_WEAPON.to_string(),
            level: account::STARTING_LEVEL,
            exp: 0,
            money: account::STARTING_MONEY,
            bounty: 0,
            inventory: Inventory::starter(),
            luck: account::STARTING_LUCK,
            active_quest: None,
            role,
            room: world::DEFAULT_ROOM.to_string(),
            last_attack: 0,
            next_regen_at: 0,
        }
    }

    /// Apply damage, clamped at zero. Returns true when this hit was lethal.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        if self.health == 0 {
            return false;
        }
        self.health = self.health.saturating_sub(amount);
        self.health == 0
    }

    /// Heal, clamped at `max_health`
    pub fn heal(&mut self, amount: u32) {
        self.health = self.health.saturating_add(amount).min(self.max_health);
    }

    /// Back to the respawn point at full health
    pub fn respawn(&mut self) {
        self.health = self.max_health;
        self.position = Position::spawn_point();
    }

    /// Whether an action with `cooldown_ms` may fire at `now`
    pub fn cooldown_ready(&self, now: u64, cooldown_ms: u64) -> bool {
        now.saturating_sub(self.last_attack) >= cooldown_ms
    }

    /// Spend `amount` if affordable
    pub fn try_spend(&mut self, amount: u64) -> bool {
        if self.money >= amount {
            self.money -= amount;
            true
        } else {
            false
        }
    }

    /// Lose up to `amount` bounty, never below zero. Returns what was lost.
    pub fn lose_bounty(&mut self, amount: u64) -> u64 {
        let loss = amount.min(self.bounty);
        self.bounty -= loss;
        loss
    }
}

/// Mob AI states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobState {
    #[default]
    Idle,
    Chase,
    Attack,
    Dead,
    Charmed,
    Stunned,
}

impl MobState {
    pub fn is_incapacitated(self) -> bool {
        matches!(self, MobState::Charmed | MobState::Stunned)
    }
}

/// Ranged ability a boss casts at its chase target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossAbility {
    pub name: &'static str,
    pub damage: u32,
    pub range: f32,
    pub cooldown_ms: u64,
}

/// Mob type; determines base stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobKind {
    Gorilla,
    #[serde(rename = "Gorilla King")]
    GorillaKing,
    #[serde(rename = "Ice Admiral")]
    IceAdmiral,
}

/// Base stats for a mob type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobStats {
    pub health: u32,
    pub damage: u32,
    /// Units per second
    pub speed: f32,
}

impl MobKind {
    pub fn stats(self) -> MobStats {
        match self {
            MobKind::Gorilla => MobStats { health: 200, damage: 15, speed: 3.0 },
            MobKind::GorillaKing => MobStats { health: 1000, damage: 50, speed: 4.0 },
            MobKind::IceAdmiral => MobStats { health: 5000, damage: 100, speed: 5.0 },
        }
    }

    pub fn is_boss(self) -> bool {
        matches!(self, MobKind::GorillaKing | MobKind::IceAdmiral)
    }

    pub fn boss_ability(self) -> Option<BossAbility> {
        match self {
            MobKind::Gorilla => None,
            MobKind::GorillaKing => Some(BossAbility {
                name: "ChestPound",
                damage: 20,
                range: 10.0,
                cooldown_ms: 6000,
            }),
            MobKind::IceAdmiral => Some(BossAbility {
                name: "IceSpikes",
                damage: 30,
                range: 15.0,
                cooldown_ms: 5000,
            }),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            MobKind::Gorilla => "Gorilla",
            MobKind::GorillaKing => "Gorilla King",
            MobKind::IceAdmiral => "Ice Admiral",
        }
    }
}

/// AI-controlled hostile entity.
///
/// Dead mobs stay in the registry (so clients see the terminal state) until
/// `respawn_at` passes.
#[derive(Debug, Clone)]
pub struct Mob {
    pub id: MobId,
    pub kind: MobKind,
    pub position: Position,
    pub health: u32,
    pub max_health: u32,
    pub state: MobState,
    pub target: Option<PlayerId>,
    pub speed: f32,
    pub damage: u32,
    pub exp_reward: u64,
    pub is_boss: bool,
    /// Boss ability usable again at this time
    pub ability_ready_at: u64,
    /// Charm/stun lasts until this time
    pub stun_end: u64,
    /// Poison lasts until this time
    pub poison_end: u64,
    /// Leash/return point and respawn location
    pub spawn: Vec2,

    pub next_melee_at: u64,
    pub next_poison_tick_at: u64,
    pub next_aura_at: u64,
    pub respawn_at: Option<u64>,
}

impl Mob {
    pub fn new(id: MobId, kind: MobKind, spawn: Vec2) -> Self {
        let stats = kind.stats();
        Self {
            id,
            kind,
            position: Position::new(spawn.x, world::MOB_GROUND_Y, spawn.z),
            health: stats.health,
            max_health: stats.health,
            state: MobState::Idle,
            target: None,
            speed: stats.speed,
            damage: stats.damage,
            exp_reward: (stats.health / 2) as u64,
            is_boss: kind.is_boss(),
            ability_ready_at: 0,
            stun_end: 0,
            poison_end: 0,
            spawn,
            next_melee_at: 0,
            next_poison_tick_at: 0,
            next_aura_at: 0,
            respawn_at: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.state == MobState::Dead
    }

    /// Charm or stun until `until`. Dead mobs are unaffected.
    pub fn incapacitate(&mut self, state: MobState, until: u64) {
        debug_assert!(state.is_incapacitated());
        if self.is_dead() {
            return;
        }
        self.state = state;
        self.stun_end = self.stun_end.max(until);
    }

    pub fn poison(&mut self, until: u64) {
        if self.is_dead() {
            return;
        }
        self.poison_end = self.poison_end.max(until);
    }

    /// Damage that cannot kill (reflection, auras, poison)
    pub fn take_passive_damage(&mut self, amount: u32) {
        if self.is_dead() {
            return;
        }
        self.health = self
            .health
            .saturating_sub(amount)
            .max(ai::PASSIVE_DAMAGE_FLOOR.min(self.health));
    }

    /// Kill the mob and schedule its respawn
    pub fn mark_dead(&mut self, now: u64) {
        self.health = 0;
        self.state = MobState::Dead;
        self.target = None;
        self.respawn_at = Some(now + ai::RESPAWN_DELAY_MS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_player_defaults() {
        let p = Player::new("alice", Role::User);
        assert_eq!(p.health, 100);
        assert_eq!(p.money, 5000);
        assert_eq!(p.inventory.items(), &["melee".to_string()]);
        assert_eq!(p.team, Team::Neutral);
        assert!(p.active_quest.is_none());
    }

    #[test]
    fn test_player_damage_clamps() {
        let mut p = Player::new("alice", Role::User);
        assert!(!p.take_damage(30));
        assert_eq!(p.health, 70);
        assert!(p.take_damage(500));
        assert_eq!(p.health, 0);
        // Already down: not lethal a second time
        assert!(!p.take_damage(10));
    }

    #[test]
    fn test_player_heal_clamps() {
        let mut p = Player::new("alice", Role::User);
        p.health = 98;
        p.heal(5);
        assert_eq!(p.health, p.max_health);
    }

    #[test]
    fn test_lose_bounty_capped() {
        let mut p = Player::new("alice", Role::User);
        p.bounty = 300;
        assert_eq!(p.lose_bounty(1000), 300);
        assert_eq!(p.bounty, 0);
    }

    #[test]
    fn test_cooldown_ready() {
        let mut p = Player::new("alice", Role::User);
        p.last_attack = 10_000;
        assert!(!p.cooldown_ready(10_400, 500));
        assert!(p.cooldown_ready(10_500, 500));
    }

    #[test]
    fn test_inventory_exact_match() {
        let mut inv = Inventory::starter();
        inv.push("Flame Fruit");
        assert!(inv.contains("Flame Fruit"));
        assert!(!inv.contains("Flame"));
        assert!(!inv.contains("flame fruit"));
    }

    #[test]
    fn test_quest_progress_never_exceeds_target() {
        let mut quest = Quest {
            name: "Defeat Gorillas".into(),
            target: MobKind::Gorilla,
            target_count: 2,
            current: 0,
            reward_exp: 500,
            reward_money: 200,
        };
        assert_eq!(quest.record_kill(MobKind::IceAdmiral), QuestProgress::Unaffected);
        assert_eq!(quest.record_kill(MobKind::Gorilla), QuestProgress::Advanced);
        assert_eq!(quest.record_kill(MobKind::Gorilla), QuestProgress::Completed);
        assert_eq!(quest.record_kill(MobKind::Gorilla), QuestProgress::Unaffected);
        assert_eq!(quest.current, 2);
    }

    #[test]
    fn test_friendly_fire_rules() {
        assert!(Team::Marine.is_friendly_with(Team::Marine));
        assert!(!Team::Neutral.is_friendly_with(Team::Neutral));
        assert!(!Team::Marine.is_friendly_with(Team::Pirate));
    }

    #[test]
    fn test_world_event_random_covers_all() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let event = WorldEvent::random(&mut rng);
            let idx = WorldEvent::ALL.iter().position(|e| *e == event).unwrap();
            seen[idx] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_mob_passive_damage_never_kills() {
        let mut mob = Mob::new(1, MobKind::Gorilla, Vec2::ZERO);
        mob.health = 3;
        mob.take_passive_damage(20);
        assert_eq!(mob.health, 1);
        assert_ne!(mob.state, MobState::Dead);
    }

    #[test]
    fn test_mob_mark_dead_schedules_respawn() {
        let mut mob = Mob::new(1, MobKind::Gorilla, Vec2::ZERO);
        mob.mark_dead(1_000);
        assert!(mob.is_dead());
        assert_eq!(mob.respawn_at, Some(1_000 + ai::RESPAWN_DELAY_MS));
    }

    #[test]
    fn test_dead_mob_cannot_be_stunned() {
        let mut mob = Mob::new(1, MobKind::Gorilla, Vec2::ZERO);
        mob.mark_dead(0);
        mob.incapacitate(MobState::Stunned, 5_000);
        assert_eq!(mob.state, MobState::Dead);
    }

    #[test]
    fn test_boss_stats() {
        assert!(MobKind::IceAdmiral.is_boss());
        assert!(!MobKind::Gorilla.is_boss());
        let mob = Mob::new(9, MobKind::IceAdmiral, Vec2::new(60.0, 60.0));
        assert_eq!(mob.max_health, 5000);
        assert_eq!(mob.exp_reward, 2500);
    }
}
