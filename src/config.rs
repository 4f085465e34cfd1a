#![allow(dead_code)]
/// All server constants — the single source of truth for every tunable named in the arena design.

pub const PORT: u16 = 8765;

// Simulation
pub const TICK_RATE: u32 = 60;
pub const TICK_INTERVAL_MS: u64 = 1000 / TICK_RATE as u64;
pub const BROADCAST_EVERY_N_TICKS: u32 = 3; // 60 Hz tick, 20 Hz snapshot
pub const MAX_MISSED_TICK_CATCHUP: u32 = 3;

// Arena
pub const ARENA_WIDTH: f64 = 1920.0;
pub const ARENA_HEIGHT: f64 = 1080.0;
pub const PLAYER_HALF_WIDTH: f64 = 16.0; // AABB is 32x64
pub const PLAYER_HALF_HEIGHT: f64 = 32.0;
pub const SPAWN_MARGIN: f64 = 100.0;
pub const SPAWN_CANDIDATE_COUNT: usize = 10;

// Movement
pub const MAX_SPEED: f64 = 200.0; // px/s
pub const ACCELERATION: f64 = 50.0; // px/s^2

// Player / combat
pub const MAX_HEALTH: i32 = 100;
pub const INVULNERABILITY_DURATION_MS: u64 = 2_000;
pub const RESPAWN_DELAY_MS: u64 = 3_000;
pub const REGEN_DELAY_MS: u64 = 5_000;
pub const REGEN_RATE_PER_SEC: f64 = 10.0;
pub const MAX_INPUT_BUFFER_SIZE: usize = 10;

// Crates / pickups
pub const CRATE_RESPAWN_MS: u64 = 30_000;
pub const CRATE_PICKUP_RANGE: f64 = 32.0;

// Projectiles
pub const PROJECTILE_LIFETIME_MS: u64 = 1_000;

// Match
pub const KILL_TARGET: u32 = 20;
pub const TIME_LIMIT_SECS: u64 = 420;
pub const KILL_REWARD_XP: u32 = 100;
pub const DEFAULT_WEAPON_KIND: &str = "pistol";

// Room
pub const MIN_ROOM_CAPACITY: usize = 2;
pub const MAX_ROOM_CAPACITY: usize = 8;

// Network
pub const SEND_QUEUE_SIZE: usize = 256;
pub const SEND_QUEUE_FULL_TIMEOUT_MS: u64 = 2_000;
pub const INPUT_RATE_LIMIT_PER_SEC: u32 = 120;
pub const ABUSE_RATE_LIMIT_PER_SEC: u32 = 500;
