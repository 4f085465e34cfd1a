//! Match (C7): win condition, kill tally, timer, and end determination.
//! Grounded on `systems/combat_manager.rs`'s event/bookkeeping style; the
//! kill/xp/timer bookkeeping itself has no direct teacher counterpart but
//! follows the same plain-struct-with-methods shape as `CombatPlayerData`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config;
use crate::msg::types::FinalScoreEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Active,
    Ended,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    kills: u32,
    deaths: u32,
    xp: u32,
}

pub struct Match {
    pub kill_target: u32,
    pub time_limit: Duration,
    pub started_at: Instant,
    tallies: HashMap<String, Tally>,
    pub status: MatchStatus,
    pub end_reason: Option<&'static str>,
    last_timer_emit_at: Instant,
}

impl Match {
    pub fn new(now: Instant) -> Self {
        Self {
            kill_target: config::KILL_TARGET,
            time_limit: Duration::from_secs(config::TIME_LIMIT_SECS),
            started_at: now,
            tallies: HashMap::new(),
            status: MatchStatus::Active,
            end_reason: None,
            last_timer_emit_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MatchStatus::Active
    }

    fn entry(&mut self, player_id: &str) -> &mut Tally {
        self.tallies.entry(player_id.to_string()).or_default()
    }

    /// `RecordKill`: bumps killer's kills/xp and victim's deaths; ends the
    /// match immediately if the killer just hit `kill_target`.
    pub fn record_kill(&mut self, killer_id: &str, victim_id: &str) {
        if !self.is_active() {
            return;
        }
        self.entry(victim_id).deaths += 1;
        let killer = self.entry(killer_id);
        killer.kills += 1;
        killer.xp += config::KILL_REWARD_XP;

        if self.tallies[killer_id].kills >= self.kill_target {
            self.status = MatchStatus::Ended;
            self.end_reason = Some("killTarget");
        }
    }

    pub fn kills_for(&self, player_id: &str) -> u32 {
        self.tallies.get(player_id).map(|t| t.kills).unwrap_or(0)
    }

    pub fn xp_for(&self, player_id: &str) -> u32 {
        self.tallies.get(player_id).map(|t| t.xp).unwrap_or(0)
    }

    /// `Tick`: ends the match on the time limit; returns remaining seconds
    /// exactly once per second-boundary crossed, for the `match:timer` event.
    pub fn tick(&mut self, now: Instant) -> Option<u64> {
        if !self.is_active() {
            return None;
        }

        let elapsed = now.duration_since(self.started_at);
        if elapsed >= self.time_limit {
            self.status = MatchStatus::Ended;
            self.end_reason = Some("timeLimit");
            return None;
        }

        if now.duration_since(self.last_timer_emit_at) >= Duration::from_secs(1) {
            self.last_timer_emit_at = now;
            let remaining = self.time_limit.saturating_sub(elapsed);
            return Some(remaining.as_secs());
        }
        None
    }

    /// `Winners`: IDs with the max kill count (ties possible).
    pub fn winners(&self) -> Vec<String> {
        let max_kills = self.tallies.values().map(|t| t.kills).max().unwrap_or(0);
        self.tallies
            .iter()
            .filter(|(_, t)| t.kills == max_kills)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// `FinalScores`: the canonical wire shape — MUST stay an array.
    pub fn final_scores(&self) -> Vec<FinalScoreEntry> {
        self.tallies
            .iter()
            .map(|(id, t)| FinalScoreEntry {
                player_id: id.clone(),
                kills: t.kills,
                deaths: t.deaths,
                xp: t.xp,
            })
            .collect()
    }

    pub fn ensure_player(&mut self, player_id: &str) {
        self.entry(player_id);
    }
}
