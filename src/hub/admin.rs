//! Staff actions. Callers must be admin or owner; promotion is owner only.

use tracing::{info, warn};

use super::{Outgoing, WorldHub, WorldState};
use crate::game::constants::combat::{CONQUEROR_RANGE, CONQUEROR_STUN_MS};
use crate::game::state::{PlayerId, Role};
use crate::net::protocol::{AdminAction, GameEvent, ServerMessage};

/// Store writes left for after the world lock is released. Blocking; run
/// with [`WorldHub::run_followup`] off the async runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminFollowup {
    /// Record `id` in the admin allow-list; `offline` also rewrites its stored record
    PersistAdmin { id: PlayerId, offline: bool },
}

impl WorldHub {
    pub(super) fn admin_action(
        &self,
        world: &mut WorldState,
        actor: &str,
        action: AdminAction,
        now: u64,
        out: &mut Outgoing,
    ) -> Option<AdminFollowup> {
        let (role, position) = {
            let player = world.players.get(actor)?;
            (player.role, player.position)
        };
        if !role.is_staff() {
            warn!("{} attempted an admin action without permission", actor);
            return None;
        }

        match action {
            AdminAction::Kick { target } => {
                let conn = world.by_player.get(&target).copied()?;
                world.send(target.clone(), ServerMessage::Kicked {
                    reason: "Admin Kicked".to_string(),
                });
                // Frames already queued still reach the client before the
                // writer sees the closed channel
                world.drop_connection(conn);
                info!("{} kicked {}", actor, target);
            }
            AdminAction::GrantItem { target, item } => {
                let player = world.players.get_mut(&target)?;
                player.inventory.push(item.clone());
                out.to(target.clone(), ServerMessage::update_stats(player, Some(&item)));
                info!("{} granted '{}' to {}", actor, item, target);
            }
            AdminAction::Teleport { target } => {
                let destination = world.players.get(&target)?.position;
                if let Some(player) = world.players.get_mut(actor) {
                    player.position = destination;
                }
            }
            AdminAction::ConquerorHaki => {
                let until = now + CONQUEROR_STUN_MS;
                let stunned = self
                    .mobs
                    .lock()
                    .stun_within(position.planar(), CONQUEROR_RANGE, until);
                info!("{} used Conqueror's Haki ({} mobs stunned)", actor, stunned);
                out.all(ServerMessage::Event(GameEvent::ConquerorHaki { by: actor.to_string() }));
            }
            AdminAction::Chat { text } => {
                out.all(ServerMessage::Chat {
                    from: actor.to_string(),
                    text,
                    role: role.as_str().to_string(),
                });
            }
            AdminAction::MakeAdmin { target } => {
                if role != Role::Owner {
                    warn!("{} attempted to promote {} without owner role", actor, target);
                    return None;
                }
                let offline = match world.players.get_mut(&target) {
                    Some(player) => {
                        if player.role != Role::Owner {
                            player.role = Role::Admin;
                        }
                        out.to(target.clone(), ServerMessage::notification("You are now an Admin!"));
                        out.to(target.clone(), ServerMessage::init(player, None));
                        false
                    }
                    None => match world.evicted_mut(&target) {
                        Some(player) => {
                            if player.role != Role::Owner {
                                player.role = Role::Admin;
                            }
                            false
                        }
                        None => true,
                    },
                };
                info!("{} promoted {} to admin", actor, target);
                return Some(AdminFollowup::PersistAdmin { id: target, offline });
            }
        }
        None
    }

    /// Durable side of an admin action. Runs with no lock held.
    pub fn run_followup(&self, followup: AdminFollowup) {
        match followup {
            AdminFollowup::PersistAdmin { id, offline } => {
                if let Err(e) = self.admins.add(&id) {
                    warn!("Failed to record {} in the admin list: {}", id, e);
                }
                if !offline {
                    return;
                }
                match self.store.load(&id) {
                    Ok(Some(mut player)) if player.role != Role::Owner => {
                        player.role = Role::Admin;
                        if let Err(e) = self.store.save(&player) {
                            warn!("Failed to save promoted account {}: {}", id, e);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to load promoted account {}: {}", id, e),
                }
            }
        }
    }
}
