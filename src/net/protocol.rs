use serde::{Deserialize, Serialize};

use crate::game::catalog::Ability;
use crate::game::state::{
    Mob, MobId, MobKind, MobState, Player, PlayerId, Position, Quest, Role, Team, WorldEvent,
};

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// First frame for a registered account: token from the session issuer
    Authenticate {
        token: Vec<u8>,
        room: Option<String>,
    },
    /// First frame for a throwaway guest account
    GuestLogin { room: Option<String> },
    /// Gameplay action (only after the handshake)
    Action(ClientAction),
    /// Ping for latency measurement
    Ping { timestamp: u64 },
}

/// Gameplay actions, each with its own field set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientAction {
    Move { x: f32, z: f32 },
    JoinTeam { team: Team },
    SetWeapon { weapon: String },
    RollFruit,
    BuyWeapon { item: String },
    AcceptQuest { quest_key: String },
    MobHit { mob_id: MobId },
    PlayerHit { victim_id: PlayerId },
    AbilityHit { mob_id: MobId, ability: Ability },
    Admin(AdminAction),
}

/// Staff-only actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdminAction {
    Kick { target: PlayerId },
    GrantItem { target: PlayerId, item: String },
    /// Move the acting admin to the target's position
    Teleport { target: PlayerId },
    /// Stun every mob around the acting admin
    ConquerorHaki,
    Chat { text: String },
    /// Owner only
    MakeAdmin { target: PlayerId },
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent on connect (and again when the role changes)
    Init {
        id: PlayerId,
        role: Role,
        money: u64,
        inventory: Vec<String>,
        /// Present when the server minted a token for this client (guests)
        session_token: Option<Vec<u8>>,
    },
    /// Handshake failed; the connection is closed after this
    AuthRejected { reason: String },
    /// Players sharing the recipient's room
    State { players: Vec<PlayerSnapshot> },
    /// Every mob that is not dead
    MobUpdate { mobs: Vec<MobSnapshot> },
    UpdateStats {
        money: u64,
        inventory: Vec<String>,
        new_item: Option<String>,
    },
    QuestUpdate {
        active_quest: Option<Quest>,
        money: u64,
        exp: u64,
    },
    Event(GameEvent),
    Chat {
        from: PlayerId,
        text: String,
        role: String,
    },
    Notification { text: String },
    Kicked { reason: String },
    /// Pong response with server timestamp
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

impl ServerMessage {
    pub fn notification(text: impl Into<String>) -> Self {
        ServerMessage::Notification { text: text.into() }
    }

    pub fn init(player: &Player, session_token: Option<Vec<u8>>) -> Self {
        ServerMessage::Init {
            id: player.id.clone(),
            role: player.role,
            money: player.money,
            inventory: player.inventory.items().to_vec(),
            session_token,
        }
    }

    pub fn update_stats(player: &Player, new_item: Option<&str>) -> Self {
        ServerMessage::UpdateStats {
            money: player.money,
            inventory: player.inventory.items().to_vec(),
            new_item: new_item.map(str::to_string),
        }
    }

    pub fn quest_update(player: &Player) -> Self {
        ServerMessage::QuestUpdate {
            active_quest: player.active_quest.clone(),
            money: player.money,
            exp: player.exp,
        }
    }

    /// Server-authored chat line
    pub fn system_chat(text: impl Into<String>) -> Self {
        ServerMessage::Chat {
            from: "SERVER".to_string(),
            text: text.into(),
            role: "system".to_string(),
        }
    }
}

/// World happenings clients render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// World event rotated
    WorldEventChanged { event: WorldEvent, name: String },
    /// Boss ability visual
    AbilityCast {
        mob_id: MobId,
        ability: String,
        target_id: PlayerId,
        timestamp: u64,
    },
    /// Admin area stun visual
    ConquerorHaki { by: PlayerId },
}

/// Player state as seen by room-mates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub position: Position,
    pub health: u32,
    pub max_health: u32,
    pub team: Team,
    pub weapon: String,
    pub level: u32,
    pub bounty: u64,
}

impl PlayerSnapshot {
    pub fn from_player(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            position: player.position,
            health: player.health,
            max_health: player.max_health,
            team: player.team,
            weapon: player.weapon.clone(),
            level: player.level,
            bounty: player.bounty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobSnapshot {
    pub id: MobId,
    pub kind: MobKind,
    pub position: Position,
    pub health: u32,
    pub max_health: u32,
    pub state: MobState,
    pub target: Option<PlayerId>,
    pub is_boss: bool,
}

impl MobSnapshot {
    pub fn from_mob(mob: &Mob) -> Self {
        Self {
            id: mob.id,
            kind: mob.kind,
            position: mob.position,
            health: mob.health,
            max_health: mob.max_health,
            state: mob.state,
            target: mob.target.clone(),
            is_boss: mob.is_boss,
        }
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers (compatible with the browser client)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);
