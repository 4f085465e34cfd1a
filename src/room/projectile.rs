//! Projectile pool (C5). Grounded on `systems/weapon.rs`'s
//! `Projectile`/drain-rebuild-loop pattern; `hit_ids` piercing is dropped
//! since no weapon in the catalog pierces.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rand::Rng;

use super::weapon::{WeaponDefinition, WeaponKind};

static NEXT_PROJECTILE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub owner_id: String,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    pub spawned_at: Instant,
    pub weapon_kind: WeaponKind,
    pub damage_at_spawn: f64,
}

impl Projectile {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        owner_id: String,
        x: f64,
        y: f64,
        vx: f64,
        vy: f64,
        weapon_kind: WeaponKind,
        damage_at_spawn: i32,
        spawned_at: Instant,
    ) -> Self {
        Self {
            id,
            owner_id,
            x,
            y,
            vx,
            vy,
            origin_x: x,
            origin_y: y,
            spawned_at,
            weapon_kind,
            damage_at_spawn: damage_at_spawn as f64,
        }
    }

    /// Straight-line distance travelled from the muzzle, used for
    /// `DamageWithFalloff` — not the distance to whatever it eventually hits.
    pub fn travel_distance(&self) -> f64 {
        let dx = self.x - self.origin_x;
        let dy = self.y - self.origin_y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// `Spawn`: one projectile for most weapons, `pellets` for shotgun, each
/// with an independent uniform-jittered aim angle.
pub fn spawn(
    owner_id: &str,
    origin: (f64, f64),
    aim_angle: f64,
    def: &WeaponDefinition,
    now: Instant,
) -> Vec<Projectile> {
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(def.pellets as usize);

    for _ in 0..def.pellets {
        let jitter = if def.spread_radians > 0.0 {
            rng.gen_range(-def.spread_radians / 2.0..=def.spread_radians / 2.0)
        } else {
            0.0
        };
        let angle = wrap_angle(aim_angle + jitter);
        let vx = angle.cos() * def.projectile_speed;
        let vy = angle.sin() * def.projectile_speed;

        let id = NEXT_PROJECTILE_ID.fetch_add(1, Ordering::Relaxed);
        out.push(Projectile::new(
            id,
            owner_id.to_string(),
            origin.0,
            origin.1,
            vx,
            vy,
            def.kind,
            def.damage.round() as i32,
            now,
        ));
    }

    out
}

fn wrap_angle(a: f64) -> f64 {
    let mut a = a % TAU;
    if a > std::f64::consts::PI {
        a -= TAU;
    } else if a < -std::f64::consts::PI {
        a += TAU;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::weapon;

    #[test]
    fn pistol_spawns_exactly_one_projectile_at_rated_speed() {
        let def = weapon::get(WeaponKind::Pistol);
        let out = spawn("p1", (0.0, 0.0), 0.0, def, Instant::now());
        assert_eq!(out.len(), 1);
        let speed = (out[0].vx * out[0].vx + out[0].vy * out[0].vy).sqrt();
        assert!((speed - 800.0).abs() < 1e-6);
    }

    #[test]
    fn shotgun_spawns_eight_pellets() {
        let def = weapon::get(WeaponKind::Shotgun);
        let out = spawn("p1", (0.0, 0.0), 0.0, def, Instant::now());
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn projectile_ids_are_unique_across_spawns() {
        let def = weapon::get(WeaponKind::Ak47);
        let a = spawn("p1", (0.0, 0.0), 0.0, def, Instant::now());
        let b = spawn("p1", (0.0, 0.0), 0.0, def, Instant::now());
        assert_ne!(a[0].id, b[0].id);
    }
}
