//! Damage and reward resolution.
//!
//! Stateless: every function works on the records the caller already holds
//! under the world (and, for mobs, the mob) lock and reports what happened as
//! [`CombatEvent`]s. The hub turns those into outbound messages after the
//! mutation is complete, so rewards are applied exactly once regardless of
//! delivery.

use crate::game::constants::combat::*;
use crate::game::spatial::{in_safe_zone, within_range};
use crate::game::state::{
    Mob, MobId, MobKind, MobState, Player, PlayerId, Position, Quest, QuestProgress,
};

/// Something a client should hear about
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    /// A mob died to `killer`; rewards already credited
    MobKilled {
        mob_id: MobId,
        kind: MobKind,
        killer: PlayerId,
        bounty: u64,
    },
    /// The killer's quest advanced (or just completed, then `quest` is `None`)
    QuestUpdated {
        player: PlayerId,
        quest: Option<Quest>,
        money: u64,
        exp: u64,
    },
    QuestCompleted { player: PlayerId, name: String },
    /// PvP kill; the victim has already been respawned
    PlayerKilled {
        killer: PlayerId,
        victim: PlayerId,
        bounty_lost: u64,
    },
    /// Attack refused with a user-visible reason
    Refused { player: PlayerId, reason: &'static str },
}

pub const SAFE_ZONE_REFUSAL: &str = "PvP Disabled in Safe Zone!";
pub const FRIENDLY_FIRE_REFUSAL: &str = "Cannot attack your own team!";

/// One attack attempt: damage plus the gates it must pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strike {
    pub damage: u32,
    pub cooldown_ms: u64,
    pub range: f32,
    /// Charm the struck mob for this long (LoveBeam)
    pub charm_ms: Option<u64>,
}

/// Why an attempt did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Landed,
    /// Dead or otherwise not a valid target
    NoTarget,
    OutOfRange,
    OnCooldown,
    Refused,
}

/// Run the cooldown and range gates shared by every attack kind, stamping
/// the attacker's cooldown when both pass.
fn pass_gates(attacker: &mut Player, target: &Position, strike: &Strike, now: u64) -> HitOutcome {
    if !within_range(&attacker.position, target, strike.range) {
        return HitOutcome::OutOfRange;
    }
    if !attacker.cooldown_ready(now, strike.cooldown_ms) {
        return HitOutcome::OnCooldown;
    }
    attacker.last_attack = now;
    HitOutcome::Landed
}

/// Attempt a player strike on a mob.
pub fn strike_mob(
    attacker: &mut Player,
    mob: &mut Mob,
    strike: Strike,
    now: u64,
    events: &mut Vec<CombatEvent>,
) -> HitOutcome {
    if mob.is_dead() {
        return HitOutcome::NoTarget;
    }
    let gate = pass_gates(attacker, &mob.position, &strike, now);
    if gate != HitOutcome::Landed {
        return gate;
    }
    apply_mob_damage(attacker, mob, strike.damage, now, events);
    if let Some(ms) = strike.charm_ms {
        mob.incapacitate(MobState::Charmed, now + ms);
    }
    HitOutcome::Landed
}

/// Damage a living mob; on the lethal hit, kill it and credit `attacker`.
///
/// Returns true when this call killed the mob. A dead mob is never damaged
/// again, so the kill and its rewards happen once.
pub fn apply_mob_damage(
    attacker: &mut Player,
    mob: &mut Mob,
    amount: u32,
    now: u64,
    events: &mut Vec<CombatEvent>,
) -> bool {
    if mob.is_dead() {
        return false;
    }
    mob.health = mob.health.saturating_sub(amount);
    if mob.health > 0 {
        return false;
    }

    mob.mark_dead(now);
    let bounty = if mob.is_boss { BOSS_BOUNTY } else { MOB_BOUNTY };
    attacker.exp += mob.exp_reward;
    attacker.bounty += bounty;
    events.push(CombatEvent::MobKilled {
        mob_id: mob.id,
        kind: mob.kind,
        killer: attacker.id.clone(),
        bounty,
    });
    credit_quest(attacker, mob.kind, events);
    true
}

fn credit_quest(player: &mut Player, kind: MobKind, events: &mut Vec<CombatEvent>) {
    let Some(quest) = player.active_quest.as_mut() else {
        return;
    };
    match quest.record_kill(kind) {
        QuestProgress::Unaffected => return,
        QuestProgress::Advanced => {}
        QuestProgress::Completed => {
            // Take the quest first so the reward cannot be paid twice
            if let Some(done) = player.active_quest.take() {
                player.money += done.reward_money;
                player.exp += done.reward_exp;
                events.push(CombatEvent::QuestCompleted {
                    player: player.id.clone(),
                    name: done.name,
                });
            }
        }
    }
    events.push(CombatEvent::QuestUpdated {
        player: player.id.clone(),
        quest: player.active_quest.clone(),
        money: player.money,
        exp: player.exp,
    });
}

/// Attempt a PvP strike. The caller guarantees `attacker` and `victim` are
/// different players.
pub fn strike_player(
    attacker: &mut Player,
    victim: &mut Player,
    strike: Strike,
    now: u64,
    events: &mut Vec<CombatEvent>,
) -> HitOutcome {
    if victim.health == 0 {
        return HitOutcome::NoTarget;
    }
    if in_safe_zone(&attacker.position) || in_safe_zone(&victim.position) {
        events.push(CombatEvent::Refused {
            player: attacker.id.clone(),
            reason: SAFE_ZONE_REFUSAL,
        });
        return HitOutcome::Refused;
    }
    if attacker.team.is_friendly_with(victim.team) {
        events.push(CombatEvent::Refused {
            player: attacker.id.clone(),
            reason: FRIENDLY_FIRE_REFUSAL,
        });
        return HitOutcome::Refused;
    }
    let gate = pass_gates(attacker, &victim.position, &strike, now);
    if gate != HitOutcome::Landed {
        return gate;
    }
    apply_player_damage(attacker, victim, strike.damage, events);
    HitOutcome::Landed
}

/// Damage `victim`; on the lethal hit credit the killer, dock the victim's
/// bounty and respawn the victim.
pub fn apply_player_damage(
    attacker: &mut Player,
    victim: &mut Player,
    amount: u32,
    events: &mut Vec<CombatEvent>,
) -> bool {
    if !victim.take_damage(amount) {
        return false;
    }
    attacker.bounty += PVP_KILL_BOUNTY;
    attacker.money += PVP_KILL_MONEY;
    let bounty_lost = victim.lose_bounty(PVP_DEATH_BOUNTY_LOSS);
    victim.respawn();
    events.push(CombatEvent::PlayerKilled {
        killer: attacker.id.clone(),
        victim: victim.id.clone(),
        bounty_lost,
    });
    true
}
