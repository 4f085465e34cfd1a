pub mod types;

/// Wire message type strings. Using `&str` constants rather than an enum so
/// dispatch can match directly on the deserialized envelope's `type` field.
#[allow(dead_code)]
pub mod id {
    // Client -> server
    pub const INPUT_STATE: &str = "input:state";
    pub const PLAYER_SHOOT: &str = "player:shoot";
    pub const PLAYER_RELOAD: &str = "player:reload";
    pub const WEAPON_PICKUP_ATTEMPT: &str = "weapon:pickup_attempt";

    // Server -> client
    pub const ROOM_JOINED: &str = "room:joined";
    pub const PLAYER_MOVE: &str = "player:move";
    pub const PROJECTILE_SPAWN: &str = "projectile:spawn";
    pub const PROJECTILE_DESTROY: &str = "projectile:destroy";
    pub const WEAPON_STATE: &str = "weapon:state";
    pub const SHOOT_FAILED: &str = "shoot:failed";
    pub const PLAYER_DAMAGED: &str = "player:damaged";
    pub const HIT_CONFIRMED: &str = "hit:confirmed";
    pub const PLAYER_DEATH: &str = "player:death";
    pub const PLAYER_KILL_CREDIT: &str = "player:kill_credit";
    pub const PLAYER_RESPAWN: &str = "player:respawn";
    pub const MATCH_TIMER: &str = "match:timer";
    pub const MATCH_ENDED: &str = "match:ended";
    pub const WEAPON_SPAWNED: &str = "weapon:spawned";
    pub const WEAPON_PICKUP_CONFIRMED: &str = "weapon:pickup_confirmed";
    pub const WEAPON_RESPAWNED: &str = "weapon:respawned";
}
