//! Weapon crate manager (C6). Grounded on `game/resource_node.rs`'s
//! `depleted_at: Option<Instant>` + `tick_respawn()` idiom, promoted to read
//! time from the injectable `Clock` instead of calling `Instant::now()`.

use std::time::{Duration, Instant};

use crate::config;

use super::weapon::WeaponKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrateState {
    Available,
    Cooling,
}

#[derive(Debug, Clone)]
pub struct WeaponCrate {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub weapon_kind: WeaponKind,
    pub state: CrateState,
    pub respawn_at: Option<Instant>,
}

impl WeaponCrate {
    pub fn is_available(&self) -> bool {
        self.state == CrateState::Available
    }
}

/// Default arena layout: five crates spread across the 1920x1080 field,
/// one per common weapon kind, keeping pistol off the floor since every
/// player already starts and respawns with one.
pub fn default_spawn_positions() -> Vec<(f64, f64, WeaponKind)> {
    vec![
        (960.0, 200.0, WeaponKind::Uzi),
        (300.0, 540.0, WeaponKind::Shotgun),
        (1620.0, 540.0, WeaponKind::Ak47),
        (960.0, 880.0, WeaponKind::Katana),
        (960.0, 540.0, WeaponKind::Bat),
    ]
}

pub struct CrateManager {
    crates: Vec<WeaponCrate>,
}

impl CrateManager {
    pub fn init(spawn_config: Vec<(f64, f64, WeaponKind)>) -> Self {
        let crates = spawn_config
            .into_iter()
            .enumerate()
            .map(|(i, (x, y, kind))| WeaponCrate {
                id: format!("c{}", i + 1),
                x,
                y,
                weapon_kind: kind,
                state: CrateState::Available,
                respawn_at: None,
            })
            .collect();
        Self { crates }
    }

    pub fn all(&self) -> &[WeaponCrate] {
        &self.crates
    }

    pub fn get(&self, crate_id: &str) -> Option<&WeaponCrate> {
        self.crates.iter().find(|c| c.id == crate_id)
    }

    /// `TryPickup`: succeeds iff the crate is Available and within 32px of
    /// `player_position`. The Room serializes all calls through its single
    /// actor task, so "at most one success per tick" falls out for free —
    /// no separate CAS or lock is needed once the crate flips to Cooling.
    pub fn try_pickup(
        &mut self,
        crate_id: &str,
        player_position: (f64, f64),
        now: Instant,
    ) -> Option<WeaponKind> {
        let c = self.crates.iter_mut().find(|c| c.id == crate_id)?;
        if c.state != CrateState::Available {
            return None;
        }
        let dx = player_position.0 - c.x;
        let dy = player_position.1 - c.y;
        if (dx * dx + dy * dy).sqrt() > config::CRATE_PICKUP_RANGE {
            return None;
        }

        c.state = CrateState::Cooling;
        c.respawn_at = Some(now + Duration::from_millis(config::CRATE_RESPAWN_MS));
        Some(c.weapon_kind)
    }

    /// `Tick`: returns crates that just transitioned Cooling -> Available.
    pub fn tick(&mut self, now: Instant) -> Vec<&WeaponCrate> {
        let mut just_respawned_ids = Vec::new();
        for c in self.crates.iter_mut() {
            if c.state == CrateState::Cooling && c.respawn_at.map(|t| t <= now).unwrap_or(false) {
                c.state = CrateState::Available;
                c.respawn_at = None;
                just_respawned_ids.push(c.id.clone());
            }
        }
        self.crates
            .iter()
            .filter(|c| just_respawned_ids.contains(&c.id))
            .collect::<Vec<_>>()
    }
}
