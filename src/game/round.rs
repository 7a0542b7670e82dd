//! Round and match state machine

use std::time::Duration;

use crate::ws::protocol::{PlayerId, RoundOutcome, ScoreTable};

/// Where a room is in its match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    /// Not enough players yet
    Waiting,
    /// Simulation running
    Playing,
    /// Between rounds
    Paused,
    /// Someone reached the winning score
    Ended,
}

/// Result of a finished round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundResolution {
    pub round: u32,
    pub outcome: RoundOutcome,
    /// Set when this round decided the match
    pub match_winner: Option<PlayerId>,
}

/// What a paused tick should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseStep {
    Hold,
    Restart,
}

/// Round bookkeeping embedded in a room
#[derive(Debug, Clone)]
pub struct RoundState {
    status: RoundStatus,
    round: u32,
    pause: Duration,
    pause_remaining: Duration,
    min_players: usize,
    winning_score: u32,
}

impl RoundState {
    pub fn new(min_players: usize, winning_score: u32, pause: Duration) -> Self {
        Self {
            status: RoundStatus::Waiting,
            round: 0,
            pause,
            pause_remaining: Duration::ZERO,
            min_players,
            winning_score,
        }
    }

    pub fn status(&self) -> RoundStatus {
        self.status
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// First round can begin
    pub fn ready_to_start(&self, player_count: usize) -> bool {
        self.status == RoundStatus::Waiting && player_count >= self.min_players
    }

    /// Enter a new round, returns its number
    pub fn begin_round(&mut self) -> u32 {
        self.round += 1;
        self.status = RoundStatus::Playing;
        self.pause_remaining = Duration::ZERO;
        self.round
    }

    /// Back to waiting, used when everyone left during a pause
    pub fn reset_to_waiting(&mut self) {
        self.status = RoundStatus::Waiting;
        self.pause_remaining = Duration::ZERO;
    }

    /// Settle the round once at most one player is alive.
    ///
    /// Scores only change here, and only upward.
    pub fn resolve(&mut self, alive: &[PlayerId], scores: &mut ScoreTable) -> Option<RoundResolution> {
        if self.status != RoundStatus::Playing || alive.len() > 1 {
            return None;
        }

        self.status = RoundStatus::Paused;
        self.pause_remaining = self.pause;

        let Some(&winner) = alive.first() else {
            return Some(RoundResolution {
                round: self.round,
                outcome: RoundOutcome::Draw,
                match_winner: None,
            });
        };

        let score = scores.entry(winner).or_insert(0);
        *score += 1;

        let match_winner = if *score >= self.winning_score {
            self.status = RoundStatus::Ended;
            Some(winner)
        } else {
            None
        };

        Some(RoundResolution {
            round: self.round,
            outcome: RoundOutcome::Winner(winner),
            match_winner,
        })
    }

    /// Count down the between-round pause by one tick
    pub fn advance_pause(&mut self, elapsed: Duration) -> PauseStep {
        if self.status != RoundStatus::Paused {
            return PauseStep::Hold;
        }
        self.pause_remaining = self.pause_remaining.saturating_sub(elapsed);
        if self.pause_remaining.is_zero() {
            PauseStep::Restart
        } else {
            PauseStep::Hold
        }
    }
}
