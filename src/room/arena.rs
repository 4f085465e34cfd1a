//! Arena & physics (C2). Movement integration grounded on
//! `game/simulation.rs::simulate_movement` (input-vector -> velocity idiom),
//! generalized from direct-set velocity to acceleration-based approach to a
//! target velocity. Hit testing and falloff grounded on
//! `systems/weapon.rs::process_projectiles`'s collision loop and
//! `systems/combat.rs`'s clamp idiom, reworked from circular-hitbox/splash
//! to the spec's AABB hitbox and linear distance falloff.

use std::time::Instant;

use crate::config;

use super::player::Player;
use super::projectile::Projectile;
use super::weapon::WeaponDefinition;

/// The single fixed-rect playfield. Immutable after Room creation (I2).
#[derive(Debug, Clone, Copy)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: config::ARENA_WIDTH,
            height: config::ARENA_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    Wall,
    Expired,
    Hit,
}

impl DestroyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wall => "wall",
            Self::Expired => "expired",
            Self::Hit => "hit",
        }
    }
}

impl Arena {
    /// `IntegrateMovement`: direction from input booleans, normalized
    /// diagonal, velocity approaches `MaxSpeed * direction` (or zero when
    /// idle) at `Acceleration`, position clamped into bounds with velocity
    /// zeroed on the clamped axis.
    pub fn integrate_movement(&self, player: &mut Player, dt: f64) {
        if !player.is_alive() {
            player.freeze_on_death();
            return;
        }

        let raw_x = (player.input.right as i32 - player.input.left as i32) as f64;
        let raw_y = (player.input.down as i32 - player.input.up as i32) as f64;
        let (dir_x, dir_y) = normalize(raw_x, raw_y);

        let target_vx = dir_x * config::MAX_SPEED;
        let target_vy = dir_y * config::MAX_SPEED;
        let step = config::ACCELERATION * dt;

        player.vx = approach(player.vx, target_vx, step);
        player.vy = approach(player.vy, target_vy, step);

        let half_w = config::PLAYER_HALF_WIDTH;
        let half_h = config::PLAYER_HALF_HEIGHT;

        let mut new_x = player.x + player.vx * dt;
        let mut new_y = player.y + player.vy * dt;

        if new_x < half_w {
            new_x = half_w;
            player.vx = 0.0;
        } else if new_x > self.width - half_w {
            new_x = self.width - half_w;
            player.vx = 0.0;
        }

        if new_y < half_h {
            new_y = half_h;
            player.vy = 0.0;
        } else if new_y > self.height - half_h {
            new_y = self.height - half_h;
            player.vy = 0.0;
        }

        player.x = new_x;
        player.y = new_y;
    }

    /// `AdvanceProjectile`: returns a destroy reason once the projectile
    /// leaves the arena or outlives its lifetime.
    pub fn advance_projectile(&self, p: &mut Projectile, dt: f64, now: Instant) -> Option<DestroyReason> {
        p.x += p.vx * dt;
        p.y += p.vy * dt;

        if p.x < 0.0 || p.x > self.width || p.y < 0.0 || p.y > self.height {
            return Some(DestroyReason::Wall);
        }
        if now.duration_since(p.spawned_at) >= std::time::Duration::from_millis(config::PROJECTILE_LIFETIME_MS) {
            return Some(DestroyReason::Expired);
        }
        None
    }

    /// `CheckProjectileHit`: AABB (32x64) test against living, non-owner,
    /// non-invulnerable players, ties broken by smallest player id.
    pub fn check_projectile_hit<'a>(
        &self,
        projectile: &Projectile,
        players: impl Iterator<Item = &'a Player>,
        now: Instant,
    ) -> Option<&'a Player> {
        let half_w = config::PLAYER_HALF_WIDTH;
        let half_h = config::PLAYER_HALF_HEIGHT;

        let mut candidates: Vec<&Player> = players
            .filter(|p| p.id != projectile.owner_id)
            .filter(|p| p.is_alive())
            .filter(|p| !p.is_invulnerable(now))
            .filter(|p| {
                (projectile.x - p.x).abs() <= half_w && (projectile.y - p.y).abs() <= half_h
            })
            .collect();

        candidates.sort_by(|a, b| a.id.cmp(&b.id));
        candidates.into_iter().next()
    }

    /// Cone query for melee weapons: living non-owner players within
    /// `range` and within `spread/2` radians of `aim_angle`.
    pub fn players_in_cone<'a>(
        &self,
        origin: (f64, f64),
        aim_angle: f64,
        def: &WeaponDefinition,
        owner_id: &str,
        players: impl Iterator<Item = &'a Player>,
        now: Instant,
    ) -> Vec<&'a Player> {
        let half_cone = def.spread_radians / 2.0;
        players
            .filter(|p| p.id != owner_id)
            .filter(|p| p.is_alive())
            .filter(|p| !p.is_invulnerable(now))
            .filter(|p| {
                let dx = p.x - origin.0;
                let dy = p.y - origin.1;
                let dist = (dx * dx + dy * dy).sqrt();
                if dist > def.range {
                    return false;
                }
                let angle_to = dy.atan2(dx);
                angle_diff(angle_to, aim_angle).abs() <= half_cone
            })
            .collect()
    }
}

/// `DamageWithFalloff`: melee ignores distance; ranged weapons hold full
/// damage out to `range*0.5`, then linearly interpolate to zero at `range`.
pub fn damage_with_falloff(def: &WeaponDefinition, base_damage: f64, distance: f64) -> i32 {
    if def.is_melee {
        return base_damage.round() as i32;
    }

    let falloff_start = def.falloff_start();
    if distance <= falloff_start {
        return base_damage.round() as i32;
    }
    if distance >= def.range {
        return 0;
    }

    let fraction = (distance - falloff_start) / (def.range - falloff_start);
    (base_damage * (1.0 - fraction)).floor() as i32
}

fn normalize(x: f64, y: f64) -> (f64, f64) {
    let mag = (x * x + y * y).sqrt();
    if mag > 1.0 {
        (x / mag, y / mag)
    } else {
        (x, y)
    }
}

fn approach(current: f64, target: f64, step: f64) -> f64 {
    if (target - current).abs() <= step {
        target
    } else if target > current {
        current + step
    } else {
        current - step
    }
}

/// Smallest signed angle between two angles, in (-pi, pi].
fn angle_diff(a: f64, b: f64) -> f64 {
    let mut d = a - b;
    while d > std::f64::consts::PI {
        d -= 2.0 * std::f64::consts::PI;
    }
    while d < -std::f64::consts::PI {
        d += 2.0 * std::f64::consts::PI;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::weapon::{self, WeaponKind};
    use std::time::Duration;

    #[test]
    fn position_stays_within_bounds_and_zeroes_velocity_on_clamp() {
        let arena = Arena::default();
        let mut p = Player::new("p1".into(), 5.0, 5.0, Instant::now());
        p.input.left = true;
        p.input.up = true;
        for _ in 0..1000 {
            arena.integrate_movement(&mut p, 1.0 / 60.0);
        }
        assert_eq!(p.x, config::PLAYER_HALF_WIDTH);
        assert_eq!(p.y, config::PLAYER_HALF_HEIGHT);
        assert_eq!(p.vx, 0.0);
        assert_eq!(p.vy, 0.0);
    }

    #[test]
    fn diagonal_input_does_not_exceed_max_speed() {
        let arena = Arena::default();
        let mut p = Player::new("p1".into(), 960.0, 540.0, Instant::now());
        p.input.right = true;
        p.input.down = true;
        for _ in 0..600 {
            arena.integrate_movement(&mut p, 1.0 / 60.0);
        }
        let speed = (p.vx * p.vx + p.vy * p.vy).sqrt();
        assert!(speed <= config::MAX_SPEED + 1e-6, "diagonal speed {speed} exceeded cap");
    }

    #[test]
    fn dead_player_is_frozen_and_ignores_input() {
        let arena = Arena::default();
        let mut p = Player::new("p1".into(), 100.0, 100.0, Instant::now());
        p.health = 0;
        p.vx = 50.0;
        p.input.right = true;
        arena.integrate_movement(&mut p, 1.0 / 60.0);
        assert_eq!(p.vx, 0.0);
        assert_eq!(p.vy, 0.0);
    }

    #[test]
    fn projectile_destroyed_on_wall_exit() {
        let arena = Arena::default();
        let mut proj = Projectile::new(1, "p1".into(), 0.0, 0.0, 10.0, 0.0, WeaponKind::Pistol, 25, Instant::now());
        proj.x = -1.0;
        let reason = arena.advance_projectile(&mut proj, 0.0, Instant::now());
        assert_eq!(reason, Some(DestroyReason::Wall));
    }

    #[test]
    fn projectile_destroyed_on_expiry() {
        let arena = Arena::default();
        let now = Instant::now();
        let mut proj = Projectile::new(1, "p1".into(), 100.0, 100.0, 0.0, 0.0, WeaponKind::Pistol, 25, now);
        let later = now + Duration::from_secs(2);
        let reason = arena.advance_projectile(&mut proj, 0.0, later);
        assert_eq!(reason, Some(DestroyReason::Expired));
    }

    #[test]
    fn invulnerable_victim_is_not_a_hit() {
        let arena = Arena::default();
        let now = Instant::now();
        let mut victim = Player::new("b".into(), 100.0, 100.0, now);
        victim.invulnerable_until = Some(now + Duration::from_secs(1));
        let players = vec![victim];
        let proj = Projectile::new(1, "a".into(), 100.0, 100.0, 0.0, 0.0, WeaponKind::Pistol, 25, now);
        let hit = arena.check_projectile_hit(&proj, players.iter(), now);
        assert!(hit.is_none());
    }

    #[test]
    fn falloff_matches_spec_scenario() {
        let def = weapon::get(WeaponKind::Pistol);
        assert_eq!(damage_with_falloff(def, 25.0, 100.0), 25);
        assert_eq!(damage_with_falloff(def, 25.0, 400.0), 25);
        assert_eq!(damage_with_falloff(def, 25.0, 800.0), 0);
        let mid = damage_with_falloff(def, 25.0, 600.0);
        assert!(mid > 0 && mid < 25);
    }

    #[test]
    fn falloff_is_monotonically_non_increasing() {
        let def = weapon::get(WeaponKind::Ak47);
        let mut last = i32::MAX;
        let mut d = 0.0;
        while d <= def.range {
            let dmg = damage_with_falloff(def, def.damage, d);
            assert!(dmg <= last);
            last = dmg;
            d += 10.0;
        }
    }

    #[test]
    fn melee_cone_hits_within_range_and_angle() {
        let arena = Arena::default();
        let now = Instant::now();
        let b = Player::new("b".into(), 170.0, 100.0, now);
        let c = Player::new("c".into(), 200.0, 200.0, now);
        let def = weapon::get(WeaponKind::Katana);
        let players = vec![b, c];
        let hits = arena.players_in_cone((100.0, 100.0), 0.0, def, "a", players.iter(), now);
        let ids: Vec<&str> = hits.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }
}
