//! Gameplay tuning constants.
//!
//! Grouped by concern the same way the systems consume them. Timestamps and
//! durations are milliseconds unless the name says otherwise.

/// Scheduler cadences (defaults; overridable through `ServerConfig`)
pub mod tick {
    /// Game tick: room-scoped player snapshot broadcast (~60 Hz)
    pub const GAME_TICK_MS: u64 = 16;
    /// AI tick: mob state machine + mob snapshot broadcast (20 Hz)
    pub const AI_TICK_MS: u64 = 50;
    /// Passive income
    pub const INCOME_TICK_SECS: u64 = 5;
    /// Persistence snapshot
    pub const SAVE_TICK_SECS: u64 = 10;
    /// World event rotation
    pub const EVENT_TICK_SECS: u64 = 60;
}

/// World geometry
pub mod world {
    /// Safe zone centre (start island) on the x/z plane
    pub const SAFE_ZONE_CENTER: (f32, f32) = (0.0, 0.0);
    /// Safe zone radius around the start island
    pub const SAFE_ZONE_RADIUS: f32 = 45.0;
    /// Respawn point (x, y, z) for defeated players and fresh accounts
    pub const SPAWN_POINT: (f32, f32, f32) = (0.0, 3.5, 0.0);
    /// Ground height mobs stand at
    pub const MOB_GROUND_Y: f32 = 2.2;
    /// Room assigned when a client does not ask for one
    pub const DEFAULT_ROOM: &str = "public_1";
}

/// New-account defaults
pub mod account {
    pub const STARTING_HEALTH: u32 = 100;
    pub const STARTING_MONEY: u64 = 5000;
    /// Guests start poorer than registered accounts
    pub const GUEST_MONEY: u64 = 1000;
    pub const STARTING_LEVEL: u32 = 1;
    pub const STARTING_LUCK: f32 = 1.0;
    /// Default weapon, always equippable without ownership
    pub const DEFAULT_WEAPON: &str = "melee";
}

/// Economy
pub mod economy {
    /// Passive income credited every income tick
    pub const PASSIVE_INCOME: u64 = 50;
    /// Cost of one fruit roll
    pub const FRUIT_ROLL_COST: u64 = 1000;
}

/// Combat rewards and ranges
pub mod combat {
    /// Max range for an ability hit
    pub const ABILITY_RANGE: f32 = 150.0;
    /// Bounty for killing a regular mob
    pub const MOB_BOUNTY: u64 = 100;
    /// Bounty for killing a boss mob
    pub const BOSS_BOUNTY: u64 = 5000;
    /// PvP kill: attacker bounty gain
    pub const PVP_KILL_BOUNTY: u64 = 2500;
    /// PvP kill: attacker money gain
    pub const PVP_KILL_MONEY: u64 = 1000;
    /// PvP kill: victim bounty loss (capped at the victim's bounty)
    pub const PVP_DEATH_BOUNTY_LOSS: u64 = 1000;
    /// LoveBeam charm duration
    pub const LOVE_BEAM_CHARM_MS: u64 = 5000;
    /// Conqueror haki radius
    pub const CONQUEROR_RANGE: f32 = 20.0;
    /// Conqueror haki stun duration
    pub const CONQUEROR_STUN_MS: u64 = 5000;
}

/// Mob AI
pub mod ai {
    /// Distance at which a mob notices a player
    pub const DETECTION_RADIUS: f32 = 15.0;
    /// Distance at which a mob stops chasing and attacks
    pub const ENGAGE_DISTANCE: f32 = 1.5;
    /// Idle mobs return to spawn only when displaced by more than this
    pub const LEASH_SLACK: f32 = 1.0;
    /// Speed multiplier while walking back to spawn
    pub const RETURN_SPEED_FACTOR: f32 = 0.5;
    /// Minimum time between two melee hits of one mob
    pub const MELEE_INTERVAL_MS: u64 = 1000;
    /// Delay between death and respawn
    pub const RESPAWN_DELAY_MS: u64 = 5000;
    /// Passive effects on mobs never take them below this
    pub const PASSIVE_DAMAGE_FLOOR: u32 = 1;
}

/// Equipped-item modifier tuning
pub mod modifiers {
    /// Shadow Fruit: detection radius against the wearer
    pub const SHADOW_DETECTION_RADIUS: f32 = 5.0;
    /// Dough Fruit: chase speed multiplier
    pub const DOUGH_SLOW_FACTOR: f32 = 0.5;
    /// Chop Fruit: hits below this are ignored
    pub const CHOP_IMMUNITY_THRESHOLD: u32 = 20;
    /// Dragon Fruit: flat damage reduction
    pub const DRAGON_FLAT_REDUCTION: u32 = 5;
    /// Dragon Fruit: burn dealt back to the attacker
    pub const DRAGON_BURN: u32 = 5;
    /// Spike Fruit: thorns
    pub const SPIKE_REFLECT: u32 = 10;
    /// Bomb Fruit: blast returned to the attacker
    pub const BOMB_REFLECT: u32 = 20;
    /// Smoke Fruit: dodge probability per hit
    pub const SMOKE_DODGE_CHANCE: f64 = 0.5;
    /// Rumble Fruit: stun proc per hit
    pub const RUMBLE_STUN_CHANCE: f64 = 0.2;
    pub const RUMBLE_STUN_MS: u64 = 2000;
    /// String Fruit: trap proc per hit
    pub const STRING_TRAP_CHANCE: f64 = 0.4;
    pub const STRING_TRAP_MS: u64 = 1500;
    /// Sand Fruit: trap proc per hit
    pub const SAND_TRAP_CHANCE: f64 = 0.5;
    pub const SAND_TRAP_MS: u64 = 1000;
    /// Venom Fruit: poison duration and tick
    pub const VENOM_POISON_MS: u64 = 5000;
    pub const POISON_TICK_MS: u64 = 500;
    pub const POISON_TICK_DAMAGE: u32 = 4;
    /// Paw Fruit: knockback when the mob is closer than this
    pub const PAW_REPEL_RADIUS: f32 = 4.0;
    pub const PAW_KNOCKBACK: f32 = 5.0;
    /// Dark Fruit: pull window and speed (units/s)
    pub const DARK_PULL_MIN: f32 = 2.0;
    pub const DARK_PULL_MAX: f32 = 10.0;
    pub const DARK_PULL_SPEED: f32 = 2.0;
    /// Magma Fruit: aura radius, damage and period
    pub const MAGMA_AURA_RADIUS: f32 = 8.0;
    pub const MAGMA_AURA_DAMAGE: u32 = 5;
    pub const MAGMA_AURA_PERIOD_MS: u64 = 1000;
    /// Phoenix Fruit: regeneration per period
    pub const PHOENIX_REGEN: u32 = 5;
    pub const PHOENIX_REGEN_PERIOD_MS: u64 = 1000;
}

/// Network limits
pub mod net {
    /// Maximum size of one framed message
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Per-connection outbound queue depth before the peer counts as stalled
    pub const OUTBOX_CAPACITY: usize = 256;
}
