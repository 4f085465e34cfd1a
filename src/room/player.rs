//! Player state (C4): kinematics, health, timers, weapon slot, input
//! snapshot. Grounded on `game/player.rs`'s input-buffer/connection-state
//! shape and `systems/combat.rs`'s damage/regen idiom, collapsed from the
//! teacher's two-layer shield+HP model down to the spec's single 0-100 pool.

use std::time::{Duration, Instant};

use crate::config;
use crate::msg::types::PlayerSnapshot;

use super::weapon::{WeaponKind, WeaponState};

/// Raw input snapshot as last received from the client; booleans plus an
/// aim angle, never a velocity — the server derives velocity from this.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub aim_angle: f64,
}

pub struct Player {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub aim_angle: f64,
    pub health: i32,

    pub last_damage_at: Option<Instant>,
    pub invulnerable_until: Option<Instant>,
    pub death_at: Option<Instant>,
    pub respawn_at: Option<Instant>,

    pub weapon: WeaponState,
    pub input: InputSnapshot,

    /// Sub-HP regeneration carried between ticks; `health` only ever moves
    /// in whole points, but `REGEN_RATE_PER_SEC * dt` is well under 1 HP per
    /// tick, so the fractional part has to accumulate somewhere or it's
    /// rounded away every tick and regen never climbs at all.
    regen_remainder: f64,

    /// Count of `input:state` messages accepted this tick, for rate limiting.
    pub inputs_this_second: u32,
    pub rate_window_started_at: Instant,
}

impl Player {
    pub fn new(id: String, spawn_x: f64, spawn_y: f64, now: Instant) -> Self {
        Self {
            id,
            x: spawn_x,
            y: spawn_y,
            vx: 0.0,
            vy: 0.0,
            aim_angle: 0.0,
            health: config::MAX_HEALTH,
            last_damage_at: None,
            invulnerable_until: None,
            death_at: None,
            respawn_at: None,
            weapon: WeaponState::new(WeaponKind::Pistol),
            input: InputSnapshot::default(),
            regen_remainder: 0.0,
            inputs_this_second: 0,
            rate_window_started_at: now,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn is_invulnerable(&self, now: Instant) -> bool {
        self.invulnerable_until.map(|t| t >= now).unwrap_or(false)
    }

    /// Replaces the stored input snapshot (I1: ignored while dead).
    pub fn apply_input(&mut self, input: InputSnapshot) {
        if !self.is_alive() {
            return;
        }
        self.input = input;
        self.aim_angle = input.aim_angle;
    }

    /// (I1) dead players are frozen: velocity pinned to zero, inputs ignored.
    pub fn freeze_on_death(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
    }

    /// Outcome of `TakeDamage` (§4.4): `applied` is false when the hit was
    /// discarded by invulnerability or the victim was already dead.
    pub fn take_damage(&mut self, amount: i32, now: Instant) -> DamageOutcome {
        if self.is_invulnerable(now) || !self.is_alive() {
            return DamageOutcome {
                applied: false,
                new_health: self.health,
                died: false,
            };
        }

        self.health = (self.health - amount).max(0);
        self.last_damage_at = Some(now);
        self.regen_remainder = 0.0;

        let died = self.health == 0;
        if died {
            self.death_at = Some(now);
            self.respawn_at = Some(now + Duration::from_millis(config::RESPAWN_DELAY_MS));
            self.freeze_on_death();
        }

        DamageOutcome {
            applied: true,
            new_health: self.health,
            died,
        }
    }

    /// Regeneration: 10 HP/s once 5 s have passed without damage. Stops
    /// immediately on damage because `take_damage` resets `last_damage_at`
    /// (and the remainder with it). `REGEN_RATE_PER_SEC * dt` is a fraction
    /// of a point per tick, so it accumulates in `regen_remainder` and only
    /// moves `health` once a whole point has built up.
    pub fn regenerate(&mut self, now: Instant, dt: f64) {
        if !self.is_alive() || self.health >= config::MAX_HEALTH {
            self.regen_remainder = 0.0;
            return;
        }
        let quiet_for = match self.last_damage_at {
            Some(t) => now.duration_since(t),
            None => Duration::MAX,
        };
        if quiet_for < Duration::from_millis(config::REGEN_DELAY_MS) {
            return;
        }

        self.regen_remainder += config::REGEN_RATE_PER_SEC * dt;
        let whole = self.regen_remainder.floor();
        if whole >= 1.0 {
            self.regen_remainder -= whole;
            self.health = (self.health + whole as i32).min(config::MAX_HEALTH);
            if self.health >= config::MAX_HEALTH {
                self.regen_remainder = 0.0;
            }
        }
    }

    /// Respawn at `spawn_point`: full health, fresh pistol, 2 s invulnerability.
    pub fn respawn(&mut self, spawn_point: (f64, f64), now: Instant) {
        self.x = spawn_point.0;
        self.y = spawn_point.1;
        self.vx = 0.0;
        self.vy = 0.0;
        self.health = config::MAX_HEALTH;
        self.invulnerable_until = Some(now + Duration::from_millis(config::INVULNERABILITY_DURATION_MS));
        self.weapon = WeaponState::new(WeaponKind::Pistol);
        self.death_at = None;
        self.respawn_at = None;
        self.last_damage_at = None;
        self.regen_remainder = 0.0;
    }

    pub fn ready_to_respawn(&self, now: Instant) -> bool {
        !self.is_alive() && self.respawn_at.map(|t| t <= now).unwrap_or(false)
    }

    pub fn to_snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            x: clamp_finite(self.x),
            y: clamp_finite(self.y),
            vx: clamp_finite(self.vx),
            vy: clamp_finite(self.vy),
            health: self.health,
            alive: self.is_alive(),
            aim: clamp_finite(self.aim_angle),
        }
    }
}

pub struct DamageOutcome {
    pub applied: bool,
    pub new_health: i32,
    pub died: bool,
}

/// NaN/Inf are defensively clamped to 0 before they ever reach the wire (§7).
pub fn clamp_finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_player() -> Player {
        Player::new("p1".into(), 100.0, 100.0, Instant::now())
    }

    #[test]
    fn damage_is_discarded_during_invulnerability() {
        let mut p = new_player();
        let now = Instant::now();
        p.invulnerable_until = Some(now + Duration::from_secs(1));
        let outcome = p.take_damage(25, now);
        assert!(!outcome.applied);
        assert_eq!(p.health, 100);
    }

    #[test]
    fn lethal_damage_sets_death_and_respawn_timers() {
        let mut p = new_player();
        p.health = 10;
        let now = Instant::now();
        let outcome = p.take_damage(25, now);
        assert!(outcome.applied);
        assert!(outcome.died);
        assert_eq!(p.health, 0);
        assert!(!p.is_alive());
        assert_eq!(p.respawn_at, Some(now + Duration::from_millis(config::RESPAWN_DELAY_MS)));
    }

    #[test]
    fn regen_waits_for_quiet_period_then_heals() {
        let mut p = new_player();
        p.health = 40;
        let now = Instant::now();
        p.last_damage_at = Some(now);
        p.regenerate(now + Duration::from_millis(4_900), 1.0 / 60.0);
        assert_eq!(p.health, 40, "regen must not start before the 5s delay");
        p.regenerate(now + Duration::from_secs(5), 1.0);
        assert_eq!(p.health, 50);
    }

    /// Drives `regenerate` at the real 60Hz tick cadence rather than a single
    /// oversized `dt=1.0` call. With a per-tick `dt` of 1/60, each call only
    /// contributes a fraction of an HP (`10 * 1/60 ≈ 0.167`); a version that
    /// rounds `health` back to an integer every tick instead of accumulating
    /// the remainder never climbs off its post-damage value.
    #[test]
    fn regen_accumulates_fractional_hp_across_real_tick_cadence() {
        let mut p = new_player();
        p.health = 40;
        let now = Instant::now();
        p.last_damage_at = Some(now);
        let dt = 1.0 / 60.0;

        for i in 1..=300 {
            let t = now + Duration::from_secs_f64(dt * i as f64);
            p.regenerate(t, dt);
        }
        assert_eq!(p.health, 40, "regen must not start before the 5s delay elapses");

        for i in 301..=660 {
            let t = now + Duration::from_secs_f64(dt * i as f64);
            p.regenerate(t, dt);
        }
        assert_eq!(p.health, 100, "10 HP/s sustained over real 60Hz ticks must lift health from 40 to the cap");
    }

    #[test]
    fn respawn_grants_full_health_and_invulnerability() {
        let mut p = new_player();
        p.health = 0;
        let now = Instant::now();
        p.respawn((500.0, 500.0), now);
        assert_eq!(p.health, 100);
        assert!(p.is_invulnerable(now));
        assert_eq!(p.weapon.kind, WeaponKind::Pistol);
    }

    #[test]
    fn apply_input_is_ignored_while_dead() {
        let mut p = new_player();
        p.health = 0;
        p.apply_input(InputSnapshot {
            up: true,
            aim_angle: 1.0,
            ..Default::default()
        });
        assert_eq!(p.aim_angle, 0.0);
    }
}
