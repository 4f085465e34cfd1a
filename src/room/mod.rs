//! Room (C8): owns one match's Arena/Match/Players/Crates/Projectiles and
//! runs its tick/broadcast loops. Grounded on `game/mod.rs::GameServer`
//! (dispatch-by-type, scoped-borrow blocks, tick orchestration order, the
//! `send_to`/`broadcast`/`broadcast_except` helper trio) and
//! `systems/combat_manager.rs::process_combat_tick`/`handle_fire_weapon`/
//! `handle_respawn` (shoot/respawn flow, event-enum dispatch). Generalized
//! from one process-wide `GameServer` to one actor task per Room, realizing
//! §5's "one Room-scoped mutex" through exclusive single-task ownership
//! rather than a literal lock (see SPEC_FULL.md §5 implementation note).

pub mod arena;
pub mod crate_manager;
pub mod error;
pub mod match_state;
pub mod player;
pub mod projectile;
pub mod weapon;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config;
use crate::msg::id;
use crate::msg::types::*;
use crate::net::protocol::encode_message;

use self::arena::{damage_with_falloff, Arena, DestroyReason};
use self::crate_manager::CrateManager;
use self::error::RoomError;
use self::match_state::{Match, MatchStatus};
use self::player::{InputSnapshot, Player};
use self::projectile::Projectile;
use self::weapon::{self, WeaponKind};

pub type PlayerId = String;
pub type RoomTx = mpsc::UnboundedSender<RoomCommand>;

/// Commands the Room's actor task drains from its own queue. This is the
/// "enqueue a command consumed at the next tick" half of §9's "no cross-tick
/// state from network handlers" rule; the other half (mutate while holding
/// the mutex) is automatic here since only the Room task ever touches state.
pub enum RoomCommand {
    Join {
        player_id: PlayerId,
        sender: mpsc::Sender<Message>,
    },
    Inbound {
        player_id: PlayerId,
        envelope: InboundEnvelope,
    },
    Disconnect {
        player_id: PlayerId,
    },
}

fn now_ms(now: Instant, epoch: Instant) -> i64 {
    now.duration_since(epoch).as_millis() as i64
}

struct TickEvents {
    spawns: Vec<ProjectileSpawnPayload>,
    destroys: Vec<ProjectileDestroyPayload>,
    hit_confirms: Vec<(PlayerId, HitConfirmedPayload)>,
    damaged: Vec<PlayerDamagedPayload>,
    deaths: Vec<PlayerDeathPayload>,
    kill_credits: Vec<(PlayerId, PlayerKillCreditPayload)>,
    respawns: Vec<PlayerRespawnPayload>,
    pickups: Vec<WeaponPickupConfirmedPayload>,
    crate_respawns: Vec<WeaponRespawnedPayload>,
    timer: Option<MatchTimerPayload>,
    weapon_state: Vec<(PlayerId, WeaponStatePayload)>,
    shoot_failed: Vec<(PlayerId, ShootFailedReason)>,
    ended: Option<MatchEndedPayload>,
}

impl TickEvents {
    fn new() -> Self {
        Self {
            spawns: Vec::new(),
            destroys: Vec::new(),
            hit_confirms: Vec::new(),
            damaged: Vec::new(),
            deaths: Vec::new(),
            kill_credits: Vec::new(),
            respawns: Vec::new(),
            pickups: Vec::new(),
            crate_respawns: Vec::new(),
            timer: None,
            weapon_state: Vec::new(),
            shoot_failed: Vec::new(),
            ended: None,
        }
    }
}

pub struct Room {
    pub room_id: String,
    capacity: usize,
    clock: Arc<dyn Clock>,
    epoch: Instant,

    arena: Arena,
    players: HashMap<PlayerId, Player>,
    projectiles: Vec<Projectile>,
    crates: CrateManager,
    match_state: Match,
    tick_count: u64,

    rx: mpsc::UnboundedReceiver<RoomCommand>,
    senders: HashMap<PlayerId, mpsc::Sender<Message>>,
    queue_full_since: HashMap<PlayerId, Instant>,

    player_count: Arc<AtomicUsize>,
    registry: Arc<RoomRegistry>,
}

impl Room {
    fn new(
        room_id: String,
        clock: Arc<dyn Clock>,
        rx: mpsc::UnboundedReceiver<RoomCommand>,
        player_count: Arc<AtomicUsize>,
        registry: Arc<RoomRegistry>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            room_id,
            capacity: config::MAX_ROOM_CAPACITY,
            clock,
            epoch,
            arena: Arena::default(),
            players: HashMap::new(),
            projectiles: Vec::new(),
            crates: CrateManager::init(crate_manager::default_spawn_positions()),
            match_state: Match::new(epoch),
            tick_count: 0,
            rx,
            senders: HashMap::new(),
            queue_full_since: HashMap::new(),
            player_count,
            registry,
        }
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn now_ms(&self) -> i64 {
        now_ms(self.now(), self.epoch)
    }

    // ─── send helpers (C10) ────────────────────────────────────────

    fn send_to(&mut self, player_id: &str, msg: Message) {
        let Some(tx) = self.senders.get(player_id) else {
            return;
        };
        match tx.try_send(msg) {
            Ok(()) => {
                self.queue_full_since.remove(player_id);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                let since = *self
                    .queue_full_since
                    .entry(player_id.to_string())
                    .or_insert_with(|| self.clock.now());
                if self.clock.now().duration_since(since)
                    >= Duration::from_millis(config::SEND_QUEUE_FULL_TIMEOUT_MS)
                {
                    warn!(room_id = %self.room_id, player_id, "send queue full for >2s, dropping connection");
                    self.remove_player(player_id);
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.remove_player(player_id);
            }
        }
    }

    fn broadcast(&mut self, msg: Message) {
        let ids: Vec<String> = self.senders.keys().cloned().collect();
        for id in ids {
            self.send_to(&id, msg.clone());
        }
    }

    fn send_typed<T: serde::Serialize>(&mut self, player_id: &str, type_str: &'static str, payload: T) {
        let ts = self.now_ms();
        match encode_message(type_str, ts, payload) {
            Ok(msg) => self.send_to(player_id, msg),
            Err(e) => warn!(room_id = %self.room_id, "encode failed for {type_str}: {e}"),
        }
    }

    fn broadcast_typed<T: serde::Serialize>(&mut self, type_str: &'static str, payload: T) {
        let ts = self.now_ms();
        match encode_message(type_str, ts, payload) {
            Ok(msg) => self.broadcast(msg),
            Err(e) => warn!(room_id = %self.room_id, "encode failed for {type_str}: {e}"),
        }
    }

    // ─── player lifecycle ──────────────────────────────────────────

    fn balanced_spawn_point(&self) -> (f64, f64) {
        let mut rng = rand::thread_rng();
        let margin = config::SPAWN_MARGIN;
        let living: Vec<(f64, f64)> = self
            .players
            .values()
            .filter(|p| p.is_alive())
            .map(|p| (p.x, p.y))
            .collect();

        if living.is_empty() {
            return (
                rng.gen_range(margin..self.arena.width - margin),
                rng.gen_range(margin..self.arena.height - margin),
            );
        }

        let mut best = (self.arena.width / 2.0, self.arena.height / 2.0);
        let mut best_min_dist = -1.0f64;

        for _ in 0..config::SPAWN_CANDIDATE_COUNT {
            let cx = rng.gen_range(margin..self.arena.width - margin);
            let cy = rng.gen_range(margin..self.arena.height - margin);
            let min_dist = living
                .iter()
                .map(|(x, y)| ((cx - x).powi(2) + (cy - y).powi(2)).sqrt())
                .fold(f64::MAX, f64::min);
            if min_dist > best_min_dist {
                best_min_dist = min_dist;
                best = (cx, cy);
            }
        }
        best
    }

    fn add_player(&mut self, player_id: PlayerId, sender: mpsc::Sender<Message>) -> Result<(), RoomError> {
        if self.players.len() >= self.capacity {
            return Err(RoomError::AtCapacity);
        }
        let now = self.now();
        let spawn = self.balanced_spawn_point();
        let player = Player::new(player_id.clone(), spawn.0, spawn.1, now);

        self.senders.insert(player_id.clone(), sender);
        self.players.insert(player_id.clone(), player);
        self.match_state.ensure_player(&player_id);
        self.player_count.store(self.players.len(), Ordering::SeqCst);

        info!(room_id = %self.room_id, player_id = %player_id, "player joined");

        self.send_typed(
            &player_id,
            id::ROOM_JOINED,
            RoomJoinedPayload {
                room_id: self.room_id.clone(),
                player_id: player_id.clone(),
            },
        );

        let crates: Vec<CrateSnapshot> = self
            .crates
            .all()
            .iter()
            .map(|c| CrateSnapshot {
                id: c.id.clone(),
                x: c.x,
                y: c.y,
                weapon_kind: c.weapon_kind.as_str().to_string(),
                is_available: c.is_available(),
            })
            .collect();
        self.send_typed(&player_id, id::WEAPON_SPAWNED, WeaponSpawnedPayload { crates });

        self.broadcast_move_snapshot();
        Ok(())
    }

    fn remove_player(&mut self, player_id: &str) {
        if self.players.remove(player_id).is_none() {
            return;
        }
        self.senders.remove(player_id);
        self.queue_full_since.remove(player_id);
        self.projectiles.retain(|p| p.owner_id != player_id);
        self.player_count.store(self.players.len(), Ordering::SeqCst);
        info!(room_id = %self.room_id, player_id, "player left");
    }

    // ─── inbound message dispatch ──────────────────────────────────

    fn handle_inbound(&mut self, player_id: &str, envelope: InboundEnvelope, events: &mut TickEvents) {
        if !self.players.contains_key(player_id) {
            return;
        }
        if self.rate_limited(player_id) {
            return;
        }

        match envelope.kind.as_str() {
            id::INPUT_STATE => {
                if let Ok(payload) = serde_json::from_value::<InputStatePayload>(envelope.data) {
                    if let Some(p) = self.players.get_mut(player_id) {
                        p.apply_input(InputSnapshot {
                            up: payload.up,
                            down: payload.down,
                            left: payload.left,
                            right: payload.right,
                            aim_angle: payload.aim_angle,
                        });
                    }
                }
            }
            id::PLAYER_SHOOT => {
                if let Ok(payload) = serde_json::from_value::<PlayerShootPayload>(envelope.data) {
                    self.handle_shoot(player_id, payload.aim_angle, events);
                }
            }
            id::PLAYER_RELOAD => {
                self.handle_reload(player_id);
            }
            id::WEAPON_PICKUP_ATTEMPT => {
                if let Ok(payload) =
                    serde_json::from_value::<WeaponPickupAttemptPayload>(envelope.data)
                {
                    self.handle_pickup_attempt(player_id, &payload.crate_id, events);
                }
            }
            other => {
                warn!(room_id = %self.room_id, player_id, "dropping unknown message type: {other}");
            }
        }
    }

    fn rate_limited(&mut self, player_id: &str) -> bool {
        let now = self.now();
        let Some(p) = self.players.get_mut(player_id) else {
            return true;
        };
        if now.duration_since(p.rate_window_started_at) >= Duration::from_secs(1) {
            p.rate_window_started_at = now;
            p.inputs_this_second = 0;
        }
        p.inputs_this_second += 1;
        if p.inputs_this_second > config::ABUSE_RATE_LIMIT_PER_SEC {
            warn!(room_id = %self.room_id, player_id, "sustained abusive input rate, disconnecting");
            self.remove_player(player_id);
            return true;
        }
        p.inputs_this_second > config::INPUT_RATE_LIMIT_PER_SEC
    }

    // ─── shoot flow (§4.8) ───────────────────────────────────────────

    fn handle_shoot(&mut self, player_id: &str, aim_angle: f64, events: &mut TickEvents) {
        let now = self.now();

        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };

        if !player.is_alive() {
            events.shoot_failed.push((player_id.to_string(), ShootFailedReason::Dead));
            return;
        }
        if player.weapon.is_reloading {
            events.shoot_failed.push((player_id.to_string(), ShootFailedReason::Reloading));
            return;
        }

        let def = player.weapon.definition();
        let cooldown = Duration::from_secs_f64(def.cooldown_secs());
        if let Some(last) = player.weapon.last_shot_at {
            if now.duration_since(last) < cooldown {
                events.shoot_failed.push((player_id.to_string(), ShootFailedReason::Cooldown));
                return;
            }
        }

        if !player.weapon.is_infinite() && player.weapon.current_ammo == 0 {
            events.shoot_failed.push((player_id.to_string(), ShootFailedReason::Empty));
            player.weapon.start_reload(now);
            return;
        }

        player.aim_angle = aim_angle;
        player.weapon.last_shot_at = Some(now);

        if def.is_melee {
            let origin = (player.x, player.y);
            let def = *def;
            let owner = player_id.to_string();
            let victims: Vec<(String, f64)> = {
                let living_others: Vec<&Player> = self.players.values().collect();
                self.arena
                    .players_in_cone(origin, aim_angle, &def, &owner, living_others.into_iter(), now)
                    .into_iter()
                    .map(|p| (p.id.clone(), 0.0))
                    .collect()
            };
            for (victim_id, dist) in victims {
                let dmg = damage_with_falloff(&def, def.damage, dist);
                self.apply_damage(&owner, &victim_id, dmg, None, events);
            }
            return;
        }

        if !player.weapon.is_infinite() {
            player.weapon.current_ammo -= 1;
            let empty = player.weapon.current_ammo == 0;
            let state_payload = WeaponStatePayload {
                current_ammo: player.weapon.current_ammo,
                max_ammo: def.magazine_size,
                is_reloading: false,
                can_shoot: !empty,
            };
            events.weapon_state.push((player_id.to_string(), state_payload));
        }

        let origin = (player.x, player.y);
        let owner = player_id.to_string();
        let new_projectiles = projectile::spawn(&owner, origin, aim_angle, def, now);
        for p in &new_projectiles {
            events.spawns.push(ProjectileSpawnPayload {
                id: p.id,
                owner_id: owner.clone(),
                x: p.x,
                y: p.y,
                vx: p.vx,
                vy: p.vy,
                weapon_kind: p.weapon_kind.as_str().to_string(),
            });
        }
        self.projectiles.extend(new_projectiles);
    }

    fn handle_reload(&mut self, player_id: &str) {
        let now = self.now();
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        if !player.is_alive() || player.weapon.is_reloading {
            return;
        }
        if player.weapon.is_infinite() || player.weapon.current_ammo == player.weapon.definition().magazine_size {
            return;
        }
        player.weapon.start_reload(now);
    }

    fn handle_pickup_attempt(&mut self, player_id: &str, crate_id: &str, events: &mut TickEvents) {
        let now = self.now();
        let Some(player) = self.players.get(player_id) else {
            return;
        };
        if !player.is_alive() {
            return;
        }
        let position = (player.x, player.y);

        let Some(weapon_kind) = self.crates.try_pickup(crate_id, position, now) else {
            return; // silent on failure per §4.8
        };

        if let Some(player) = self.players.get_mut(player_id) {
            player.weapon = weapon::WeaponState::new(weapon_kind);
        }

        let next_respawn = now_ms(now + Duration::from_millis(config::CRATE_RESPAWN_MS), self.epoch);
        events.pickups.push(WeaponPickupConfirmedPayload {
            player_id: player_id.to_string(),
            crate_id: crate_id.to_string(),
            weapon_kind: weapon_kind.as_str().to_string(),
            next_respawn,
        });
    }

    /// Shared damage application used by both melee and projectile hits.
    fn apply_damage(
        &mut self,
        attacker_id: &str,
        victim_id: &str,
        damage: i32,
        projectile_id: Option<u64>,
        events: &mut TickEvents,
    ) {
        let now = self.now();
        let Some(victim) = self.players.get_mut(victim_id) else {
            return;
        };
        let outcome = victim.take_damage(damage, now);
        if !outcome.applied {
            return;
        }

        events.hit_confirms.push((
            attacker_id.to_string(),
            HitConfirmedPayload {
                victim_id: victim_id.to_string(),
                damage,
                projectile_id,
            },
        ));
        events.damaged.push(PlayerDamagedPayload {
            victim_id: victim_id.to_string(),
            attacker_id: attacker_id.to_string(),
            damage,
            new_health: outcome.new_health,
            projectile_id,
        });

        if outcome.died {
            events.deaths.push(PlayerDeathPayload {
                victim_id: victim_id.to_string(),
                attacker_id: attacker_id.to_string(),
            });

            self.match_state.record_kill(attacker_id, victim_id);
            events.kill_credits.push((
                attacker_id.to_string(),
                PlayerKillCreditPayload {
                    killer_id: attacker_id.to_string(),
                    victim_id: victim_id.to_string(),
                    killer_kills: self.match_state.kills_for(attacker_id),
                    killer_xp: self.match_state.xp_for(attacker_id),
                },
            ));

            if self.match_state.status == MatchStatus::Ended && events.ended.is_none() {
                events.ended = Some(MatchEndedPayload {
                    winners: self.match_state.winners(),
                    final_scores: self.match_state.final_scores(),
                    reason: self.match_state.end_reason.unwrap_or("unknown").to_string(),
                });
            }
        }
    }

    // ─── tick loop (§4.8, §5) ────────────────────────────────────────

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                RoomCommand::Join { player_id, sender } => {
                    let id_for_log = player_id.clone();
                    if let Err(e) = self.add_player(player_id, sender) {
                        warn!(room_id = %self.room_id, player_id = %id_for_log, "join rejected: {e}");
                    }
                }
                RoomCommand::Disconnect { player_id } => self.remove_player(&player_id),
                RoomCommand::Inbound { player_id, .. } if !self.players.contains_key(&player_id) => {}
                RoomCommand::Inbound { player_id, envelope } => {
                    let mut events = TickEvents::new();
                    self.handle_inbound(&player_id, envelope, &mut events);
                    self.flush_events(events);
                }
            }
        }
    }

    fn tick(&mut self) {
        self.tick_count += 1;
        let dt = 1.0 / config::TICK_RATE as f64;
        let now = self.now();
        let mut events = TickEvents::new();

        let frozen = self.match_state.status == MatchStatus::Ended;

        if !frozen {
            let ids: Vec<String> = self.players.keys().cloned().collect();
            for id in &ids {
                if let Some(p) = self.players.get_mut(id) {
                    p.weapon.tick_reload(now);
                    self.arena.integrate_movement(p, dt);
                }
            }

            self.advance_projectiles(now, &mut events);

            for id in &ids {
                if let Some(p) = self.players.get_mut(id) {
                    if p.ready_to_respawn(now) {
                        let spawn = self.balanced_spawn_point();
                        if let Some(p) = self.players.get_mut(id) {
                            p.respawn(spawn, now);
                            events.respawns.push(PlayerRespawnPayload {
                                player_id: id.clone(),
                                x: p.x,
                                y: p.y,
                                health: p.health,
                            });
                        }
                    }
                }
            }

            for id in &ids {
                if let Some(p) = self.players.get_mut(id) {
                    p.regenerate(now, dt);
                }
            }

            for newly_available in self.crates.tick(now) {
                events.crate_respawns.push(WeaponRespawnedPayload {
                    crate_id: newly_available.id.clone(),
                    weapon_kind: newly_available.weapon_kind.as_str().to_string(),
                    x: newly_available.x,
                    y: newly_available.y,
                });
            }

            if let Some(remaining) = self.match_state.tick(now) {
                events.timer = Some(MatchTimerPayload { remaining_seconds: remaining });
            }
            if self.match_state.status == MatchStatus::Ended && events.ended.is_none() {
                events.ended = Some(MatchEndedPayload {
                    winners: self.match_state.winners(),
                    final_scores: self.match_state.final_scores(),
                    reason: self.match_state.end_reason.unwrap_or("unknown").to_string(),
                });
            }
        }

        self.flush_events(events);

        if self.tick_count % config::BROADCAST_EVERY_N_TICKS as u64 == 0 {
            self.broadcast_move_snapshot();
        }
    }

    fn advance_projectiles(&mut self, now: Instant, events: &mut TickEvents) {
        let dt = 1.0 / config::TICK_RATE as f64;
        let mut i = 0;
        while i < self.projectiles.len() {
            let mut destroy_reason = self.arena.advance_projectile(&mut self.projectiles[i], dt, now);

            if destroy_reason.is_none() {
                let proj = &self.projectiles[i];
                let hit_id = self
                    .arena
                    .check_projectile_hit(proj, self.players.values(), now)
                    .map(|p| p.id.clone());

                if let Some(victim_id) = hit_id {
                    let proj = self.projectiles[i].clone();
                    let def = weapon::get(proj.weapon_kind);
                    let distance = proj.travel_distance();
                    let dmg = damage_with_falloff(def, proj.damage_at_spawn, distance);

                    self.apply_damage(&proj.owner_id, &victim_id, dmg, Some(proj.id), events);
                    destroy_reason = Some(DestroyReason::Hit);
                }
            }

            if let Some(reason) = destroy_reason {
                let removed = self.projectiles.remove(i);
                events.destroys.push(ProjectileDestroyPayload {
                    id: removed.id,
                    reason: reason.as_str().to_string(),
                });
            } else {
                i += 1;
            }
        }
    }

    fn broadcast_move_snapshot(&mut self) {
        let players: Vec<PlayerSnapshot> = self.players.values().map(|p| p.to_snapshot()).collect();
        self.broadcast_typed(
            id::PLAYER_MOVE,
            PlayerMovePayload {
                tick: self.tick_count,
                players,
            },
        );
    }

    fn flush_events(&mut self, events: TickEvents) {
        for s in events.shoot_failed {
            self.send_typed(&s.0, id::SHOOT_FAILED, ShootFailedPayload { reason: s.1.as_str() });
        }
        for w in events.weapon_state {
            self.send_typed(&w.0, id::WEAPON_STATE, w.1);
        }
        for s in events.spawns {
            self.broadcast_typed(id::PROJECTILE_SPAWN, s);
        }
        for d in events.destroys {
            self.broadcast_typed(id::PROJECTILE_DESTROY, d);
        }
        for (attacker, payload) in events.hit_confirms {
            self.send_typed(&attacker, id::HIT_CONFIRMED, payload);
        }
        for d in events.damaged {
            self.broadcast_typed(id::PLAYER_DAMAGED, d);
        }
        for d in events.deaths {
            self.broadcast_typed(id::PLAYER_DEATH, d);
        }
        for (killer, payload) in events.kill_credits {
            self.send_typed(&killer, id::PLAYER_KILL_CREDIT, payload);
        }
        for r in events.respawns {
            self.broadcast_typed(id::PLAYER_RESPAWN, r);
        }
        for p in events.pickups {
            self.broadcast_typed(id::WEAPON_PICKUP_CONFIRMED, p);
        }
        for c in events.crate_respawns {
            self.broadcast_typed(id::WEAPON_RESPAWNED, c);
        }
        if let Some(t) = events.timer {
            self.broadcast_typed(id::MATCH_TIMER, t);
        }
        if let Some(ended) = events.ended {
            info!(room_id = %self.room_id, "match ended: {}", ended.reason);
            self.broadcast_typed(id::MATCH_ENDED, ended);
        }
    }

    fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Runs the 60 Hz tick loop + 20 Hz broadcast cadence (every 3rd tick).
    /// Missed-tick catch-up is bounded to `MAX_MISSED_TICK_CATCHUP`; ticks
    /// beyond that are dropped with a log rather than death-spiralling to
    /// catch up (§5 suspension points).
    async fn run(mut self) {
        let interval_dur = Duration::from_millis(config::TICK_INTERVAL_MS);
        let mut next_tick_at = tokio::time::Instant::now() + interval_dur;

        loop {
            tokio::time::sleep_until(next_tick_at).await;

            let wall_now = tokio::time::Instant::now();
            let mut missed = 0u32;
            while next_tick_at <= wall_now {
                next_tick_at += interval_dur;
                missed += 1;
            }
            let ticks_to_run = missed.min(config::MAX_MISSED_TICK_CATCHUP).max(1);
            if missed > ticks_to_run {
                warn!(room_id = %self.room_id, "dropped {} stalled ticks", missed - ticks_to_run);
            }

            self.drain_commands();
            for _ in 0..ticks_to_run {
                self.tick();
            }

            if self.is_empty() {
                info!(room_id = %self.room_id, "room empty, shutting down");
                self.registry.reap(&self.room_id);
                break;
            }
        }
    }
}

// ─── Room registry (§4.11, new) ────────────────────────────────────────

struct RoomHandle {
    tx: RoomTx,
    player_count: Arc<AtomicUsize>,
}

/// Places arriving players into a room with free capacity, creating a new
/// one if none has room; reaps rooms once their last player leaves.
/// Grounded on the teacher's `GameServer` connection bookkeeping,
/// generalized from "one process-wide world" to "many independent rooms".
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, RoomHandle>>,
    clock: Arc<dyn Clock>,
    next_room_id: AtomicU64,
    next_player_id: AtomicU64,
}

impl RoomRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            rooms: Mutex::new(HashMap::new()),
            clock,
            next_room_id: AtomicU64::new(1),
            next_player_id: AtomicU64::new(1),
        })
    }

    /// Assigns the caller to a room with free capacity, creating one if
    /// needed, and returns its command sender plus a freshly-minted player id.
    pub fn assign(self: &Arc<Self>) -> (RoomTx, PlayerId) {
        let player_id = format!("player-{}", self.next_player_id.fetch_add(1, Ordering::Relaxed));

        let mut rooms = self.rooms.lock().expect("room registry mutex poisoned");
        for handle in rooms.values() {
            if handle.player_count.load(Ordering::SeqCst) < config::MAX_ROOM_CAPACITY {
                return (handle.tx.clone(), player_id);
            }
        }

        let room_id = format!("room-{}", self.next_room_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let player_count = Arc::new(AtomicUsize::new(0));

        let room = Room::new(room_id.clone(), self.clock.clone(), rx, player_count.clone(), self.clone());
        info!(room_id = %room_id, "room created");
        tokio::spawn(room.run());

        rooms.insert(
            room_id,
            RoomHandle {
                tx: tx.clone(),
                player_count,
            },
        );

        (tx, player_id)
    }

    fn reap(&self, room_id: &str) {
        let mut rooms = self.rooms.lock().expect("room registry mutex poisoned");
        rooms.remove(room_id);
    }
}

/// Integration-level tests exercising `Room`'s handlers and tick loop
/// directly (no real networking), driven by a `ManualClock` in place of the
/// wall-clock sleeps the concrete scenarios in spec.md §8 describe.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn test_room() -> (Room, Arc<ManualClock>) {
        let manual = ManualClock::new();
        let clock: Arc<dyn Clock> = manual.clone();
        let registry = RoomRegistry::new(clock.clone());
        let (_tx, rx) = mpsc::unbounded_channel();
        let player_count = Arc::new(AtomicUsize::new(0));
        let room = Room::new("test-room".to_string(), clock, rx, player_count, registry);
        (room, manual)
    }

    /// Joins a player and returns its outbound receiver, kept alive so
    /// `send_to` doesn't treat the connection as already closed.
    fn join(room: &mut Room, id: &str) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(config::SEND_QUEUE_SIZE);
        room.add_player(id.to_string(), tx).expect("test room has free capacity");
        rx
    }

    #[test]
    fn scenario_cooldown_enforcement() {
        let (mut room, clock) = test_room();
        let _rx = join(&mut room, "p1");

        let mut first = TickEvents::new();
        room.handle_shoot("p1", 0.0, &mut first);
        assert_eq!(first.spawns.len(), 1, "first shot should succeed with no prior cooldown");
        let speed = (first.spawns[0].vx.powi(2) + first.spawns[0].vy.powi(2)).sqrt();
        assert!((speed - 800.0).abs() < 1e-6, "pistol projectile speed must be 800px/s");

        clock.advance(Duration::from_millis(100));
        let mut second = TickEvents::new();
        room.handle_shoot("p1", 0.0, &mut second);
        assert_eq!(second.spawns.len(), 0);
        assert_eq!(second.shoot_failed, vec![("p1".to_string(), ShootFailedReason::Cooldown)]);

        clock.advance(Duration::from_millis(234)); // total 334ms since first shot
        let mut third = TickEvents::new();
        room.handle_shoot("p1", 0.0, &mut third);
        assert_eq!(third.spawns.len(), 1, "shot at 334ms should clear the 333ms pistol cooldown");
    }

    #[test]
    fn scenario_melee_cone() {
        let (mut room, _clock) = test_room();
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        let _c = join(&mut room, "c");

        {
            let a = room.players.get_mut("a").unwrap();
            a.x = 100.0;
            a.y = 100.0;
            a.weapon = weapon::WeaponState::new(WeaponKind::Katana);
        }
        {
            let b = room.players.get_mut("b").unwrap();
            b.x = 170.0;
            b.y = 100.0;
        }
        {
            let c = room.players.get_mut("c").unwrap();
            c.x = 200.0;
            c.y = 200.0;
        }

        let mut events = TickEvents::new();
        room.handle_shoot("a", 0.0, &mut events);

        assert_eq!(events.damaged.len(), 1, "only the player inside the cone should be hit");
        assert_eq!(events.damaged[0].victim_id, "b");
        assert_eq!(events.damaged[0].damage, 45);
        assert_eq!(events.damaged[0].new_health, 55);
        assert!(events.spawns.is_empty(), "melee never spawns a projectile");
    }

    #[test]
    fn scenario_pickup_race_exactly_one_winner() {
        let (mut room, _clock) = test_room();
        let _x = join(&mut room, "x");
        let _y = join(&mut room, "y");
        for id in ["x", "y"] {
            let p = room.players.get_mut(id).unwrap();
            p.x = 960.0;
            p.y = 215.0;
        }

        let crate_id = room.crates.all()[0].id.clone();
        let mut events = TickEvents::new();
        room.handle_pickup_attempt("x", &crate_id, &mut events);
        room.handle_pickup_attempt("y", &crate_id, &mut events);

        assert_eq!(events.pickups.len(), 1, "exactly one claimant should win the race");
        assert_eq!(events.pickups[0].player_id, "x");
        assert!(!room.crates.get(&crate_id).unwrap().is_available());
    }

    #[test]
    fn scenario_kill_credit_ordering_and_respawn() {
        let (mut room, clock) = test_room();
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        room.players.get_mut("b").unwrap().health = 10;

        let mut events = TickEvents::new();
        room.apply_damage("a", "b", 25, None, &mut events);

        assert_eq!(events.damaged[0].new_health, 0);
        assert_eq!(events.deaths.len(), 1);
        assert_eq!(events.deaths[0].attacker_id, "a");
        assert_eq!(events.kill_credits[0].1.killer_kills, 1);
        assert_eq!(events.kill_credits[0].1.killer_xp, 100);
        assert!(!room.players["b"].is_alive());

        clock.advance(Duration::from_secs(3));
        assert!(room.players["b"].ready_to_respawn(clock.now()));
    }

    #[test]
    fn scenario_match_ends_on_kill_target() {
        let (mut room, _clock) = test_room();
        room.match_state.kill_target = 1;
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        room.players.get_mut("b").unwrap().health = 1;

        let mut events = TickEvents::new();
        room.apply_damage("a", "b", 25, None, &mut events);

        let ended = events.ended.expect("match should end the instant killTarget is reached");
        assert_eq!(ended.winners, vec!["a".to_string()]);
        assert_eq!(ended.reason, "killTarget");
        assert!(ended.final_scores.iter().any(|s| s.player_id == "a" && s.kills == 1));
    }

    #[test]
    fn ranged_hit_applies_falloff_from_the_muzzle_not_the_victim() {
        let (mut room, clock) = test_room();
        let _a = join(&mut room, "a");
        let _b = join(&mut room, "b");
        {
            let b = room.players.get_mut("b").unwrap();
            b.x = 700.0;
            b.y = 100.0;
        }

        // Projectile spawned at (0,100), already travelled 700px by the time it
        // lands on the victim's AABB — well past the pistol's 400px falloffStart
        // (range*0.5). Zero velocity here so this tick's own movement step
        // doesn't change the travelled distance out from under the assertion.
        let mut proj = Projectile::new(1, "a".to_string(), 0.0, 100.0, 0.0, 0.0, WeaponKind::Pistol, 25, clock.now());
        proj.x = 700.0;
        proj.y = 100.0;
        room.projectiles.push(proj);

        let mut events = TickEvents::new();
        room.advance_projectiles(clock.now(), &mut events);

        assert_eq!(events.damaged.len(), 1, "projectile should register a hit on b");
        assert_eq!(events.damaged[0].damage, 6, "damage at 700px must reflect falloff from the 0px muzzle, not the ~0px proj-to-victim gap");
    }

    #[test]
    fn tick_loop_integrates_movement_within_arena_bounds() {
        let (mut room, clock) = test_room();
        let _a = join(&mut room, "a");
        {
            let p = room.players.get_mut("a").unwrap();
            p.x = 5.0;
            p.y = 5.0;
            p.input.left = true;
            p.input.up = true;
        }

        for _ in 0..1000 {
            clock.advance(Duration::from_millis(config::TICK_INTERVAL_MS));
            room.tick();
        }

        let p = &room.players["a"];
        assert_eq!(p.x, config::PLAYER_HALF_WIDTH);
        assert_eq!(p.y, config::PLAYER_HALF_HEIGHT);
    }

    #[test]
    fn sustained_abusive_input_rate_disconnects_player() {
        let (mut room, _clock) = test_room();
        let _rx = join(&mut room, "a");

        for _ in 0..(config::ABUSE_RATE_LIMIT_PER_SEC + 10) {
            if !room.players.contains_key("a") {
                break;
            }
            room.rate_limited("a");
        }

        assert!(!room.players.contains_key("a"), "sustained >500/s input should close the connection");
    }

    #[test]
    fn joining_a_full_room_is_rejected() {
        let (mut room, _clock) = test_room();
        let mut keepalive = Vec::new();
        for i in 0..config::MAX_ROOM_CAPACITY {
            let (tx, rx) = mpsc::channel(config::SEND_QUEUE_SIZE);
            room.add_player(format!("p{i}"), tx).expect("room has room for this player");
            keepalive.push(rx);
        }
        let (tx, _rx) = mpsc::channel(config::SEND_QUEUE_SIZE);
        let err = room.add_player("overflow".to_string(), tx).unwrap_err();
        assert!(matches!(err, RoomError::AtCapacity));
        assert_eq!(room.players.len(), config::MAX_ROOM_CAPACITY);
    }
}
