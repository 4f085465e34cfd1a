//! Weapon catalog: the immutable table of weapon definitions (C3) plus the
//! per-player `WeaponState` that tracks ammo/reload/cooldown against it.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponKind {
    Pistol,
    Uzi,
    Ak47,
    Shotgun,
    Bat,
    Katana,
}

impl WeaponKind {
    pub const ALL: [WeaponKind; 6] = [
        WeaponKind::Pistol,
        WeaponKind::Uzi,
        WeaponKind::Ak47,
        WeaponKind::Shotgun,
        WeaponKind::Bat,
        WeaponKind::Katana,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pistol => "pistol",
            Self::Uzi => "uzi",
            Self::Ak47 => "ak47",
            Self::Shotgun => "shotgun",
            Self::Bat => "bat",
            Self::Katana => "katana",
        }
    }
}

/// Sentinel magazine size meaning "infinite" (melee weapons).
pub const INFINITE_MAGAZINE: i32 = 0;

#[derive(Debug, Clone, Copy)]
pub struct WeaponDefinition {
    pub kind: WeaponKind,
    pub damage: f64,
    pub fire_rate: f64, // shots/s
    pub magazine_size: i32,
    pub reload_duration_ms: u64,
    pub projectile_speed: f64, // 0 = melee
    pub range: f64,
    pub spread_radians: f64,
    pub pellets: u32,
    pub is_melee: bool,
}

impl WeaponDefinition {
    pub fn cooldown_secs(&self) -> f64 {
        1.0 / self.fire_rate
    }

    pub fn falloff_start(&self) -> f64 {
        self.range * 0.5
    }
}

static TABLE: Lazy<[WeaponDefinition; 6]> = Lazy::new(|| {
    [
        WeaponDefinition {
            kind: WeaponKind::Pistol,
            damage: 25.0,
            fire_rate: 3.0,
            magazine_size: 15,
            reload_duration_ms: 1_500,
            projectile_speed: 800.0,
            range: 800.0,
            spread_radians: 0.0,
            pellets: 1,
            is_melee: false,
        },
        WeaponDefinition {
            kind: WeaponKind::Uzi,
            damage: 8.0,
            fire_rate: 10.0,
            magazine_size: 30,
            reload_duration_ms: 1_500,
            projectile_speed: 800.0,
            range: 600.0,
            spread_radians: 0.087,
            pellets: 1,
            is_melee: false,
        },
        WeaponDefinition {
            kind: WeaponKind::Ak47,
            damage: 20.0,
            fire_rate: 6.0,
            magazine_size: 30,
            reload_duration_ms: 2_000,
            projectile_speed: 800.0,
            range: 800.0,
            spread_radians: 0.052,
            pellets: 1,
            is_melee: false,
        },
        WeaponDefinition {
            kind: WeaponKind::Shotgun,
            damage: 7.5,
            fire_rate: 1.0,
            magazine_size: 6,
            reload_duration_ms: 2_500,
            projectile_speed: 800.0,
            range: 300.0,
            spread_radians: 0.262,
            pellets: 8,
            is_melee: false,
        },
        WeaponDefinition {
            kind: WeaponKind::Bat,
            damage: 25.0,
            fire_rate: 2.0,
            magazine_size: INFINITE_MAGAZINE,
            reload_duration_ms: 0,
            projectile_speed: 0.0,
            range: 64.0,
            spread_radians: std::f64::consts::FRAC_PI_2,
            pellets: 1,
            is_melee: true,
        },
        WeaponDefinition {
            kind: WeaponKind::Katana,
            damage: 45.0,
            fire_rate: 1.25,
            magazine_size: INFINITE_MAGAZINE,
            reload_duration_ms: 0,
            projectile_speed: 0.0,
            range: 80.0,
            spread_radians: std::f64::consts::FRAC_PI_2,
            pellets: 1,
            is_melee: true,
        },
    ]
});

pub fn get(kind: WeaponKind) -> &'static WeaponDefinition {
    TABLE.iter().find(|d| d.kind == kind).expect("every WeaponKind has a table entry")
}

/// Per-player weapon state (I4: exactly one of these per living player).
#[derive(Debug, Clone)]
pub struct WeaponState {
    pub kind: WeaponKind,
    pub current_ammo: i32,
    pub is_reloading: bool,
    pub reload_started_at: Option<Instant>,
    pub last_shot_at: Option<Instant>,
}

impl WeaponState {
    pub fn new(kind: WeaponKind) -> Self {
        let def = get(kind);
        Self {
            kind,
            current_ammo: def.magazine_size,
            is_reloading: false,
            reload_started_at: None,
            last_shot_at: None,
        }
    }

    pub fn definition(&self) -> &'static WeaponDefinition {
        get(self.kind)
    }

    pub fn is_infinite(&self) -> bool {
        self.definition().magazine_size == INFINITE_MAGAZINE
    }

    pub fn start_reload(&mut self, now: Instant) {
        self.is_reloading = true;
        self.reload_started_at = Some(now);
    }

    /// Complete the reload if `reload_duration_ms` has elapsed.
    pub fn tick_reload(&mut self, now: Instant) {
        if !self.is_reloading {
            return;
        }
        let started = match self.reload_started_at {
            Some(t) => t,
            None => return,
        };
        let duration = std::time::Duration::from_millis(self.definition().reload_duration_ms);
        if now.duration_since(started) >= duration {
            self.current_ammo = self.definition().magazine_size;
            self.is_reloading = false;
            self.reload_started_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_resolves_to_a_definition() {
        for kind in WeaponKind::ALL {
            assert_eq!(get(kind).kind, kind);
        }
    }

    #[test]
    fn melee_weapons_have_infinite_magazine_and_zero_speed() {
        assert_eq!(get(WeaponKind::Bat).magazine_size, INFINITE_MAGAZINE);
        assert_eq!(get(WeaponKind::Bat).projectile_speed, 0.0);
        assert!(get(WeaponKind::Bat).is_melee);
        assert_eq!(get(WeaponKind::Katana).magazine_size, INFINITE_MAGAZINE);
    }

    #[test]
    fn new_state_starts_with_full_magazine_and_no_timers() {
        let state = WeaponState::new(WeaponKind::Ak47);
        assert_eq!(state.current_ammo, 30);
        assert!(!state.is_reloading);
        assert!(state.last_shot_at.is_none());
    }

    #[test]
    fn reload_completes_only_after_duration_elapses() {
        let mut state = WeaponState::new(WeaponKind::Pistol);
        state.current_ammo = 0;
        let t0 = Instant::now();
        state.start_reload(t0);
        state.tick_reload(t0 + std::time::Duration::from_millis(1000));
        assert!(state.is_reloading, "reload should not complete early");
        state.tick_reload(t0 + std::time::Duration::from_millis(1500));
        assert!(!state.is_reloading);
        assert_eq!(state.current_ammo, 15);
    }
}
