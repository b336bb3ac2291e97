//! One-shot deadline timer owned by the component it wakes.
//!
//! The timer holds no callback. The owning sequence reads the deadline, waits,
//! and hands the token back; a token from an earlier `start` or from before a
//! `stop` is rejected, so at most one fire is ever outstanding.

use std::time::Duration;
use std::time::Instant;

/// Identifies one arming of a `OneShotTimer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

#[derive(Debug, Default)]
pub struct OneShotTimer {
    deadline: Option<Instant>,
    generation: u64,
}

impl OneShotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer for `now + delay`, replacing any pending deadline.
    pub fn start(&mut self, now: Instant, delay: Duration) {
        self.generation += 1;
        self.deadline = Some(now + delay);
    }

    pub fn stop(&mut self) {
        self.generation += 1;
        self.deadline = None;
    }

    pub fn is_running(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> Option<TimerToken> {
        self.deadline.map(|_| TimerToken(self.generation))
    }

    /// Consumes the pending fire if `token` still names it.
    pub fn take_if_current(&mut self, token: TimerToken) -> bool {
        if self.deadline.is_none() || token.0 != self.generation {
            return false;
        }
        self.deadline = None;
        true
    }

    /// Consumes the pending fire if its deadline has been reached.
    pub fn take_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
