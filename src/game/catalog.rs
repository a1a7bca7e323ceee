//! Fixed item catalogs: weapons, abilities, fruits and quests.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::constants::combat;
use crate::game::state::{MobKind, Quest};

/// Combat profile of an equipped weapon identifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    pub damage: u32,
    pub cooldown_ms: u64,
    pub range: f32,
    /// Shop price; `None` means not for sale
    pub price: Option<u64>,
}

const MELEE_RANGE: f32 = 15.0;
const RANGED_RANGE: f32 = 80.0;

const MELEE: WeaponStats = WeaponStats {
    damage: 10,
    cooldown_ms: 500,
    range: MELEE_RANGE,
    price: None,
};

/// Weapon stats by identifier.
///
/// Unknown identifiers (equipped fruits, granted oddities) fight with melee
/// stats.
pub fn weapon_stats(weapon: &str) -> WeaponStats {
    match weapon {
        "katana" => WeaponStats { damage: 20, cooldown_ms: 600, range: MELEE_RANGE, price: Some(1000) },
        "cutlass" => WeaponStats { damage: 30, cooldown_ms: 700, range: MELEE_RANGE, price: Some(2500) },
        "pipe" => WeaponStats { damage: 45, cooldown_ms: 1000, range: MELEE_RANGE, price: Some(5000) },
        "bazooka" => WeaponStats { damage: 80, cooldown_ms: 2000, range: RANGED_RANGE, price: Some(10000) },
        "slingshot" => WeaponStats { range: RANGED_RANGE, ..MELEE },
        _ => MELEE,
    }
}

/// Shop price for `item`, if the shop sells it
pub fn weapon_price(item: &str) -> Option<u64> {
    weapon_stats(item).price
}

/// Fruit abilities that can be aimed at a mob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    /// Basic swing with the equipped weapon
    Melee,
    Fireball,
    FlamePillar,
    IceShards,
    IceSurge,
    LoveBeam,
    MagmaRain,
    LightSpeed,
    Transform,
    DragonBreath,
    Tornado,
    Barrier,
}

/// What an ability does on hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityProfile {
    /// `None` = equipped weapon damage
    pub damage: Option<u32>,
    pub cooldown_ms: u64,
    pub range: f32,
    /// Charm applied to the struck mob
    pub charm_ms: Option<u64>,
}

impl Ability {
    pub fn profile(self) -> AbilityProfile {
        let (damage, cooldown_ms) = match self {
            Ability::Melee => (None, 500),
            Ability::Fireball => (Some(40), 1000),
            Ability::FlamePillar => (Some(60), 3000),
            Ability::IceShards => (Some(25), 800),
            Ability::IceSurge => (Some(50), 4000),
            Ability::LoveBeam => (Some(30), 3000),
            Ability::MagmaRain => (Some(70), 3500),
            Ability::LightSpeed => (Some(80), 1500),
            Ability::Transform => (Some(100), 5000),
            Ability::DragonBreath => (Some(60), 2000),
            Ability::Tornado => (Some(30), 1500),
            Ability::Barrier => (Some(0), 5000),
        };
        AbilityProfile {
            damage,
            cooldown_ms,
            range: combat::ABILITY_RANGE,
            charm_ms: (self == Ability::LoveBeam).then_some(combat::LOVE_BEAM_CHARM_MS),
        }
    }
}

/// Fruit rarity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rarity {
    Common,
    Rare,
    Legendary,
}

impl Rarity {
    /// Base roll weight; luck scales everything above common
    fn weight(self, luck: f32) -> f32 {
        match self {
            Rarity::Common => 60.0,
            Rarity::Rare => 30.0 * luck,
            Rarity::Legendary => 10.0 * luck,
        }
    }
}

pub const COMMON_FRUITS: &[&str] = &[
    "Rocket Fruit", "Spin Fruit", "Chop Fruit", "Spring Fruit", "Bomb Fruit", "Smoke Fruit",
    "Spike Fruit", "Flame Fruit", "Falcon Fruit", "Sand Fruit", "Diamond Fruit", "Love Fruit",
    "Rubber Fruit", "Barrier Fruit",
];

pub const RARE_FRUITS: &[&str] = &[
    "Ice Fruit", "Dark Fruit", "Light Fruit", "Magma Fruit", "Quake Fruit", "Buddha Fruit",
    "String Fruit", "Phoenix Fruit", "Rumble Fruit", "Paw Fruit",
];

pub const LEGENDARY_FRUITS: &[&str] = &[
    "Gravity Fruit", "Dough Fruit", "Shadow Fruit", "Venom Fruit", "Control Fruit",
    "Dragon Fruit", "Leopard Fruit",
];

fn fruits_of(rarity: Rarity) -> &'static [&'static str] {
    match rarity {
        Rarity::Common => COMMON_FRUITS,
        Rarity::Rare => RARE_FRUITS,
        Rarity::Legendary => LEGENDARY_FRUITS,
    }
}

/// Whether `item` is in the fruit catalog
pub fn is_fruit(item: &str) -> bool {
    [Rarity::Common, Rarity::Rare, Rarity::Legendary]
        .iter()
        .any(|r| fruits_of(*r).contains(&item))
}

/// Draw a fruit: pick a tier by luck-weighted odds, then a fruit uniformly
/// within the tier.
pub fn roll_fruit<R: Rng + ?Sized>(rng: &mut R, luck: f32) -> &'static str {
    let luck = if luck.is_finite() { luck.max(0.0) } else { 1.0 };
    let tiers = [Rarity::Legendary, Rarity::Rare, Rarity::Common];
    let total: f32 = tiers.iter().map(|t| t.weight(luck)).sum();

    let mut roll = rng.gen_range(0.0..total);
    let mut chosen = Rarity::Common;
    for tier in tiers {
        let w = tier.weight(luck);
        if roll < w {
            chosen = tier;
            break;
        }
        roll -= w;
    }

    let pool = fruits_of(chosen);
    pool[rng.gen_range(0..pool.len())]
}

/// Quest offered under `key`, fresh with zero progress
pub fn quest_for_key(key: &str) -> Option<Quest> {
    match key {
        "gorilla_quest" => Some(Quest {
            name: "Defeat Gorillas".to_string(),
            target: MobKind::Gorilla,
            target_count: 5,
            current: 0,
            reward_exp: 500,
            reward_money: 200,
        }),
        _ => None,
    }
}
