//! Equipped-item combat modifiers.
//!
//! Every modifier is a pure function of the mob, the defender's equipped item
//! and an injected random source. Callers decide *when* a modifier runs
//! (throttled by per-mob timestamps); this module only decides *what* it does.

use rand::Rng;

use crate::game::constants::{ai, modifiers::*};
use crate::game::state::{Mob, MobState};
use crate::util::vec2::Vec2;

/// Fruit powers that change how mobs fight the wearer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    Rubber,
    Diamond,
    Leopard,
    Dragon,
    Smoke,
    Chop,
    Spike,
    Bomb,
    Venom,
    Rumble,
    String,
    Sand,
    Paw,
    Dark,
    Shadow,
    Dough,
    Magma,
    Phoenix,
}

impl Power {
    /// Power granted by an equipped item identifier (exact match)
    pub fn of(item: &str) -> Option<Self> {
        Some(match item {
            "Rubber Fruit" => Power::Rubber,
            "Diamond Fruit" => Power::Diamond,
            "Leopard Fruit" => Power::Leopard,
            "Dragon Fruit" => Power::Dragon,
            "Smoke Fruit" => Power::Smoke,
            "Chop Fruit" => Power::Chop,
            "Spike Fruit" => Power::Spike,
            "Bomb Fruit" => Power::Bomb,
            "Venom Fruit" => Power::Venom,
            "Rumble Fruit" => Power::Rumble,
            "String Fruit" => Power::String,
            "Sand Fruit" => Power::Sand,
            "Paw Fruit" => Power::Paw,
            "Dark Fruit" => Power::Dark,
            "Shadow Fruit" => Power::Shadow,
            "Dough Fruit" => Power::Dough,
            "Magma Fruit" => Power::Magma,
            "Phoenix Fruit" => Power::Phoenix,
            _ => return None,
        })
    }
}

/// Effects of one mob melee hit after the defender's power is applied
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeleeOutcome {
    /// Damage dealt to the defender (0 when immune or dodged)
    pub damage: u32,
    /// Damage returned to the mob; never lethal
    pub reflected: u32,
    /// Incapacitate the mob for this long
    pub stun_ms: Option<u64>,
    /// Poison the mob for this long
    pub poison_ms: Option<u64>,
    pub dodged: bool,
}

impl MeleeOutcome {
    /// Apply the mob-side effects at `now`
    pub fn apply_to_mob(&self, mob: &mut Mob, now: u64) {
        if self.reflected > 0 {
            mob.take_passive_damage(self.reflected);
        }
        if let Some(ms) = self.stun_ms {
            mob.incapacitate(MobState::Charmed, now + ms);
        }
        if let Some(ms) = self.poison_ms {
            mob.poison(now + ms);
        }
    }
}

fn proc<R: Rng + ?Sized>(rng: &mut R, chance: f64, ms: u64) -> Option<u64> {
    rng.gen_bool(chance).then_some(ms)
}

/// Resolve one melee hit of `mob` against a defender wielding `item`
pub fn resolve_melee<R: Rng + ?Sized>(mob: &Mob, item: &str, rng: &mut R) -> MeleeOutcome {
    let base = mob.damage;
    let mut out = MeleeOutcome {
        damage: base,
        ..Default::default()
    };

    match Power::of(item) {
        Some(Power::Rubber) if !mob.is_boss => out.damage = 0,
        Some(Power::Diamond) | Some(Power::Leopard) => out.damage = base / 2,
        Some(Power::Dragon) => {
            out.damage = base.saturating_sub(DRAGON_FLAT_REDUCTION);
            out.reflected = DRAGON_BURN;
        }
        Some(Power::Smoke) => {
            if rng.gen_bool(SMOKE_DODGE_CHANCE) {
                out.damage = 0;
                out.dodged = true;
            }
        }
        Some(Power::Chop) if base < CHOP_IMMUNITY_THRESHOLD => out.damage = 0,
        Some(Power::Spike) => out.reflected = SPIKE_REFLECT,
        Some(Power::Bomb) => out.reflected = BOMB_REFLECT,
        Some(Power::Venom) => out.poison_ms = Some(VENOM_POISON_MS),
        Some(Power::Rumble) => out.stun_ms = proc(rng, RUMBLE_STUN_CHANCE, RUMBLE_STUN_MS),
        Some(Power::String) => out.stun_ms = proc(rng, STRING_TRAP_CHANCE, STRING_TRAP_MS),
        Some(Power::Sand) => out.stun_ms = proc(rng, SAND_TRAP_CHANCE, SAND_TRAP_MS),
        _ => {}
    }

    out
}

/// Detection radius a mob uses against a wearer of `item`. Never wider than
/// the base radius.
pub fn detection_radius(item: &str) -> f32 {
    match Power::of(item) {
        Some(Power::Shadow) => SHADOW_DETECTION_RADIUS.min(ai::DETECTION_RADIUS),
        _ => ai::DETECTION_RADIUS,
    }
}

/// Multiplier on a mob's chase speed toward a wearer of `item`
pub fn chase_speed_factor(item: &str) -> f32 {
    match Power::of(item) {
        Some(Power::Dough) => DOUGH_SLOW_FACTOR,
        _ => 1.0,
    }
}

/// New mob position after the wearer's positional power, if any applies.
///
/// Paw repels a mob standing closer than the repel radius; Dark drags a mob
/// sitting in the pull window toward the wearer.
pub fn reposition(item: &str, mob: Vec2, wearer: Vec2, dt: f32) -> Option<Vec2> {
    let (away, dist) = (mob - wearer).normalize_with_length();
    if dist <= 0.0 {
        return None;
    }
    match Power::of(item) {
        Some(Power::Paw) if dist < PAW_REPEL_RADIUS => Some(mob + away * PAW_KNOCKBACK),
        Some(Power::Dark) if dist > DARK_PULL_MIN && dist < DARK_PULL_MAX => {
            Some(mob - away * (DARK_PULL_SPEED * dt))
        }
        _ => None,
    }
}

/// Whether the wearer burns nearby mobs
pub fn has_aura(item: &str) -> bool {
    Power::of(item) == Some(Power::Magma)
}

/// Whether the wearer regenerates health
pub fn regenerates(item: &str) -> bool {
    Power::of(item) == Some(Power::Phoenix)
}
