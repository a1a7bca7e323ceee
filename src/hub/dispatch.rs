//! Gameplay action handling.
//!
//! Every handler runs under the world lock (plus the mob lock for mob
//! targets, always taken second). Rejections are answered with a
//! notification or ignored; nothing here fails.

use rand::Rng;
use tracing::debug;

use super::{AdminFollowup, Outgoing, WorldHub, WorldState};
use crate::game::catalog::{quest_for_key, weapon_stats, Ability};
use crate::game::constants::account::DEFAULT_WEAPON;
use crate::game::state::{MobId, PlayerId, Team};
use crate::game::systems::ai::MobManager;
use crate::game::systems::combat::{strike_mob, strike_player, HitOutcome, Strike};
use crate::game::systems::economy;
use crate::net::connection::ConnectionId;
use crate::net::protocol::{ClientAction, ServerMessage};
use crate::util::vec2::Vec2;

impl WorldHub {
    /// Apply one action from `conn`. Unknown connections are ignored.
    ///
    /// Admin actions may return store work that the caller must hand to
    /// [`run_followup`](Self::run_followup) once off the async runtime.
    pub fn dispatch<R: Rng + ?Sized>(
        &self,
        conn: ConnectionId,
        action: ClientAction,
        now: u64,
        rng: &mut R,
    ) -> Option<AdminFollowup> {
        let mut world = self.world.lock();
        let Some(actor) = world.player_of(conn) else {
            debug!("Action from unbound connection {}", conn);
            return None;
        };
        let mut out = Outgoing::default();

        match action {
            ClientAction::Move { x, z } => move_to(&mut world, &actor, x, z),
            ClientAction::JoinTeam { team } => join_team(&mut world, &actor, team),
            ClientAction::SetWeapon { weapon } => set_weapon(&mut world, &actor, weapon, &mut out),
            ClientAction::RollFruit => roll_fruit(&mut world, &actor, rng, &mut out),
            ClientAction::BuyWeapon { item } => buy_weapon(&mut world, &actor, &item, &mut out),
            ClientAction::AcceptQuest { quest_key } => accept_quest(&mut world, &actor, &quest_key, &mut out),
            ClientAction::MobHit { mob_id } => {
                if let Some(strike) = weapon_strike(&world, &actor) {
                    hit_mob(&mut world, &mut self.mobs.lock(), &actor, mob_id, strike, now, &mut out);
                }
            }
            ClientAction::AbilityHit { mob_id, ability } => {
                if let Some(strike) = ability_strike(&world, &actor, ability) {
                    hit_mob(&mut world, &mut self.mobs.lock(), &actor, mob_id, strike, now, &mut out);
                }
            }
            ClientAction::PlayerHit { victim_id } => {
                if let Some(strike) = weapon_strike(&world, &actor) {
                    hit_player(&mut world, &actor, &victim_id, strike, now, &mut out);
                }
            }
            ClientAction::Admin(admin) => {
                let followup = self.admin_action(&mut world, &actor, admin, now, &mut out);
                world.deliver(out);
                return followup;
            }
        }

        world.deliver(out);
        None
    }
}

fn move_to(world: &mut WorldState, actor: &str, x: f32, z: f32) {
    let to = Vec2::new(x, z);
    if !to.is_finite() {
        return;
    }
    if let Some(player) = world.players.get_mut(actor) {
        player.position.set_planar(to);
    }
}

fn join_team(world: &mut WorldState, actor: &str, team: Team) {
    if let Some(player) = world.players.get_mut(actor) {
        player.team = team;
    }
}

fn set_weapon(world: &mut WorldState, actor: &str, weapon: String, out: &mut Outgoing) {
    let Some(player) = world.players.get_mut(actor) else {
        return;
    };
    if weapon == DEFAULT_WEAPON || player.inventory.contains(&weapon) {
        player.weapon = weapon;
    } else {
        out.to(actor, ServerMessage::notification("You don't own that!"));
    }
}

fn roll_fruit<R: Rng + ?Sized>(world: &mut WorldState, actor: &str, rng: &mut R, out: &mut Outgoing) {
    let event = world.event;
    let Some(player) = world.players.get_mut(actor) else {
        return;
    };
    match economy::roll(player, event, rng) {
        Ok(fruit) => {
            debug!("{} rolled {}", actor, fruit);
            out.to(actor, ServerMessage::update_stats(player, Some(fruit)));
        }
        Err(e) => out.to(actor, ServerMessage::notification(e.message())),
    }
}

fn buy_weapon(world: &mut WorldState, actor: &str, item: &str, out: &mut Outgoing) {
    let Some(player) = world.players.get_mut(actor) else {
        return;
    };
    match economy::buy_weapon(player, item) {
        Ok(()) => out.to(actor, ServerMessage::update_stats(player, Some(item))),
        Err(e) => out.to(actor, ServerMessage::notification(e.message())),
    }
}

fn accept_quest(world: &mut WorldState, actor: &str, key: &str, out: &mut Outgoing) {
    let Some(quest) = quest_for_key(key) else {
        debug!("Unknown quest key '{}'", key);
        return;
    };
    if let Some(player) = world.players.get_mut(actor) {
        player.active_quest = Some(quest);
        out.to(actor, ServerMessage::quest_update(player));
    }
}

fn weapon_strike(world: &WorldState, actor: &str) -> Option<Strike> {
    let player = world.players.get(actor)?;
    let stats = weapon_stats(&player.weapon);
    Some(Strike {
        damage: stats.damage,
        cooldown_ms: stats.cooldown_ms,
        range: stats.range,
        charm_ms: None,
    })
}

fn ability_strike(world: &WorldState, actor: &str, ability: Ability) -> Option<Strike> {
    let player = world.players.get(actor)?;
    let profile = ability.profile();
    Some(Strike {
        damage: profile
            .damage
            .unwrap_or_else(|| weapon_stats(&player.weapon).damage),
        cooldown_ms: profile.cooldown_ms,
        range: profile.range,
        charm_ms: profile.charm_ms,
    })
}

fn hit_mob(
    world: &mut WorldState,
    mobs: &mut MobManager,
    actor: &str,
    mob_id: MobId,
    strike: Strike,
    now: u64,
    out: &mut Outgoing,
) {
    let (Some(player), Some(mob)) = (world.players.get_mut(actor), mobs.get_mut(mob_id)) else {
        return;
    };
    let mut events = Vec::new();
    let outcome = strike_mob(player, mob, strike, now, &mut events);
    if outcome != HitOutcome::Landed {
        debug!("{} -> mob {}: {:?}", actor, mob_id, outcome);
    }
    out.combat(events);
}

fn hit_player(
    world: &mut WorldState,
    actor: &str,
    victim_id: &PlayerId,
    strike: Strike,
    now: u64,
    out: &mut Outgoing,
) {
    if actor == victim_id.as_str() {
        return;
    }
    // Take the victim out so both records can be borrowed mutably
    let Some(mut victim) = world.players.remove(victim_id) else {
        return;
    };
    if let Some(attacker) = world.players.get_mut(actor) {
        let mut events = Vec::new();
        let outcome = strike_player(attacker, &mut victim, strike, now, &mut events);
        if outcome != HitOutcome::Landed {
            debug!("{} -> {}: {:?}", actor, victim_id, outcome);
        }
        out.combat(events);
    }
    world.players.insert(victim.id.clone(), victim);
}
