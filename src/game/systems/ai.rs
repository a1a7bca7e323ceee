use hashbrown::HashMap;
use rand::Rng;

use crate::game::constants::{ai::*, modifiers};
use crate::game::spatial::in_safe_zone;
use crate::game::state::{Mob, MobId, MobKind, MobState, Player, PlayerId};
use crate::game::systems::modifiers::{
    chase_speed_factor, detection_radius, has_aura, regenerates, reposition, resolve_melee,
};
use crate::util::vec2::Vec2;

/// What the AI tick did that clients should see
#[derive(Debug, Clone, PartialEq)]
pub enum AiEvent {
    /// Boss ability landed on `target`
    AbilityCast {
        mob_id: MobId,
        ability: &'static str,
        target: PlayerId,
        damage: u32,
    },
    /// A mob brought a player to zero; the player has been respawned
    PlayerDefeated { player: PlayerId, by: MobKind },
    Respawned { mob_id: MobId },
}

/// Player as seen by target acquisition. Taken once per tick.
#[derive(Debug, Clone)]
struct Candidate {
    id: PlayerId,
    at: Vec2,
    detection: f32,
    weapon: String,
}

/// Owner of every mob. Lives behind the mob lock.
pub struct MobManager {
    mobs: HashMap<MobId, Mob>,
    next_id: MobId,
}

impl MobManager {
    pub fn new() -> Self {
        Self {
            mobs: HashMap::new(),
            next_id: 1,
        }
    }

    /// Startup population: a gorilla pack, the Gorilla King and the Ice Admiral
    pub fn with_default_population() -> Self {
        let mut manager = Self::new();
        for i in 0..5 {
            manager.spawn(MobKind::Gorilla, Vec2::new(-50.0 + 5.0 * i as f32, -50.0));
        }
        manager.spawn(MobKind::GorillaKing, Vec2::new(-70.0, -70.0));
        manager.spawn(MobKind::IceAdmiral, Vec2::new(60.0, 60.0));
        manager
    }

    /// Spawn a fresh mob at `at` and return its id
    pub fn spawn(&mut self, kind: MobKind, at: Vec2) -> MobId {
        let id = self.next_id;
        self.next_id += 1;
        self.mobs.insert(id, Mob::new(id, kind, at));
        id
    }

    pub fn get(&self, id: MobId) -> Option<&Mob> {
        self.mobs.get(&id)
    }

    pub fn get_mut(&mut self, id: MobId) -> Option<&mut Mob> {
        self.mobs.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.mobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mobs.is_empty()
    }

    /// Mobs clients should see (everything not dead)
    pub fn live(&self) -> impl Iterator<Item = &Mob> {
        self.mobs.values().filter(|m| !m.is_dead())
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }

    /// Stun every living mob within `radius` of `center` until `until`.
    /// Returns how many were affected.
    pub fn stun_within(&mut self, center: Vec2, radius: f32, until: u64) -> usize {
        let mut affected = 0;
        for mob in self.mobs.values_mut() {
            if !mob.is_dead() && mob.position.planar().distance_to(center) <= radius {
                mob.incapacitate(MobState::Stunned, until);
                affected += 1;
            }
        }
        affected
    }

    /// Advance every mob by `dt` seconds.
    ///
    /// `players` is the world's player registry; the caller holds the world
    /// lock for the whole call. Target acquisition for all mobs uses one read
    /// of player positions taken before any mob moves.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        players: &mut HashMap<PlayerId, Player>,
        dt: f32,
        now: u64,
        rng: &mut R,
    ) -> Vec<AiEvent> {
        let mut events = Vec::new();

        regenerate(players, now);

        let candidates: Vec<Candidate> = players
            .values()
            .filter(|p| !in_safe_zone(&p.position))
            .map(|p| Candidate {
                id: p.id.clone(),
                at: p.position.planar(),
                detection: detection_radius(&p.weapon),
                weapon: p.weapon.clone(),
            })
            .collect();

        for mob in self.mobs.values_mut() {
            if mob.is_dead() {
                if mob.respawn_at.is_some_and(|at| now >= at) {
                    *mob = Mob::new(mob.id, mob.kind, mob.spawn);
                    events.push(AiEvent::Respawned { mob_id: mob.id });
                }
                continue;
            }
            step_mob(mob, &candidates, players, dt, now, rng, &mut events);
        }

        events
    }
}

impl Default for MobManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Phoenix wearers heal on a fixed period
fn regenerate(players: &mut HashMap<PlayerId, Player>, now: u64) {
    for player in players.values_mut() {
        if !regenerates(&player.weapon) || now < player.next_regen_at {
            continue;
        }
        if player.health < player.max_health {
            player.heal(modifiers::PHOENIX_REGEN);
        }
        player.next_regen_at = now + modifiers::PHOENIX_REGEN_PERIOD_MS;
    }
}

fn step_mob<R: Rng + ?Sized>(
    mob: &mut Mob,
    candidates: &[Candidate],
    players: &mut HashMap<PlayerId, Player>,
    dt: f32,
    now: u64,
    rng: &mut R,
    events: &mut Vec<AiEvent>,
) {
    // Charm/stun window
    if now < mob.stun_end {
        if !mob.state.is_incapacitated() {
            mob.state = MobState::Charmed;
        }
    } else if mob.state.is_incapacitated() {
        mob.state = MobState::Idle;
    }

    // Poison keeps ticking while incapacitated
    if now < mob.poison_end && now >= mob.next_poison_tick_at {
        mob.take_passive_damage(modifiers::POISON_TICK_DAMAGE);
        mob.next_poison_tick_at = now + modifiers::POISON_TICK_MS;
    }

    let here = mob.position.planar();

    if now >= mob.next_aura_at {
        let burned = candidates.iter().any(|c| {
            has_aura(&c.weapon) && here.distance_to(c.at) < modifiers::MAGMA_AURA_RADIUS
        });
        if burned {
            mob.take_passive_damage(modifiers::MAGMA_AURA_DAMAGE);
            mob.next_aura_at = now + modifiers::MAGMA_AURA_PERIOD_MS;
        }
    }

    if mob.state.is_incapacitated() {
        return;
    }

    let target = candidates
        .iter()
        .map(|c| (c, here.distance_to(c.at)))
        .filter(|(c, d)| *d < c.detection)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    let Some((target, dist)) = target else {
        mob.state = MobState::Idle;
        mob.target = None;
        if here.distance_to(mob.spawn) > LEASH_SLACK {
            let step = mob.speed * RETURN_SPEED_FACTOR * dt;
            mob.position.set_planar(here.move_towards(mob.spawn, step));
        }
        return;
    };

    mob.target = Some(target.id.clone());

    if dist > ENGAGE_DISTANCE {
        mob.state = MobState::Chase;
        let step = (mob.speed * chase_speed_factor(&target.weapon) * dt).min(dist - ENGAGE_DISTANCE);
        mob.position.set_planar(here.move_towards(target.at, step));

        if let Some(ability) = mob.kind.boss_ability() {
            if now >= mob.ability_ready_at && dist <= ability.range {
                mob.ability_ready_at = now + ability.cooldown_ms;
                if let Some(player) = players.get_mut(&target.id) {
                    events.push(AiEvent::AbilityCast {
                        mob_id: mob.id,
                        ability: ability.name,
                        target: target.id.clone(),
                        damage: ability.damage,
                    });
                    hurt_player(player, ability.damage, mob.kind, events);
                }
            }
        }
    } else {
        mob.state = MobState::Attack;
        if now >= mob.next_melee_at {
            mob.next_melee_at = now + MELEE_INTERVAL_MS;
            // A player respawned earlier this tick is back in the safe zone
            if let Some(player) = players.get_mut(&target.id).filter(|p| !in_safe_zone(&p.position)) {
                let outcome = resolve_melee(mob, &player.weapon, rng);
                if outcome.damage > 0 {
                    hurt_player(player, outcome.damage, mob.kind, events);
                }
                outcome.apply_to_mob(mob, now);
            }
        }
    }

    if let Some(moved) = reposition(&target.weapon, mob.position.planar(), target.at, dt) {
        mob.position.set_planar(moved);
    }
}

fn hurt_player(player: &mut Player, damage: u32, by: MobKind, events: &mut Vec<AiEvent>) {
    if player.take_damage(damage) {
        player.respawn();
        events.push(AiEvent::PlayerDefeated {
            player: player.id.clone(),
            by,
        });
    }
}
