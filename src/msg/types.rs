use serde::{Deserialize, Serialize};

// ─── Envelope ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[allow(dead_code)]
    pub timestamp: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct OutboundEnvelope<T: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub timestamp: i64,
    pub data: T,
}

// ─── Client -> server payloads ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStatePayload {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub aim_angle: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerShootPayload {
    pub aim_angle: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponPickupAttemptPayload {
    pub crate_id: String,
}

// ─── Server -> client payloads ───────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoinedPayload {
    pub room_id: String,
    pub player_id: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub health: i32,
    pub alive: bool,
    pub aim: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMovePayload {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSpawnPayload {
    pub id: u64,
    pub owner_id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub weapon_kind: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileDestroyPayload {
    pub id: u64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponStatePayload {
    pub current_ammo: i32,
    pub max_ammo: i32,
    pub is_reloading: bool,
    pub can_shoot: bool,
}

/// Fixed set of reasons a shoot attempt can be rejected for; the wire value
/// is the lowercase variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShootFailedReason {
    Cooldown,
    Reloading,
    Empty,
    Dead,
}

impl ShootFailedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cooldown => "cooldown",
            Self::Reloading => "reloading",
            Self::Empty => "empty",
            Self::Dead => "dead",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShootFailedPayload {
    pub reason: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDamagedPayload {
    pub victim_id: String,
    pub attacker_id: String,
    pub damage: i32,
    pub new_health: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectile_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HitConfirmedPayload {
    pub victim_id: String,
    pub damage: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projectile_id: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDeathPayload {
    pub victim_id: String,
    pub attacker_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerKillCreditPayload {
    pub killer_id: String,
    pub victim_id: String,
    pub killer_kills: u32,
    pub killer_xp: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRespawnPayload {
    pub player_id: String,
    pub x: f64,
    pub y: f64,
    pub health: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchTimerPayload {
    pub remaining_seconds: u64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FinalScoreEntry {
    pub player_id: String,
    pub kills: u32,
    pub deaths: u32,
    pub xp: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEndedPayload {
    pub winners: Vec<String>,
    /// Always an array — a prior implementation of this wire schema serialized
    /// this field as a map and broke every client parser.
    pub final_scores: Vec<FinalScoreEntry>,
    pub reason: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CrateSnapshot {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub weapon_kind: String,
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponSpawnedPayload {
    pub crates: Vec<CrateSnapshot>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponPickupConfirmedPayload {
    pub player_id: String,
    pub crate_id: String,
    pub weapon_kind: String,
    pub next_respawn: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponRespawnedPayload {
    pub crate_id: String,
    pub weapon_kind: String,
    pub x: f64,
    pub y: f64,
}
