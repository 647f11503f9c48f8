//! Gesture-gated trigger state machine.
//!
//! The loop is driven by two inputs: [`TriggerLoop::observe_gesture`]
//! (last-write-wins, whenever a hand reading arrives) and
//! [`TriggerLoop::tick`] (once per frame). A tick that commits to a check
//! arms the cooldown timer and the in-flight flag in the same call, before
//! any asynchronous work starts, so no later tick can fire a second request
//! while the first is pending. Results come back through
//! [`TriggerLoop::complete`], which discards results from abandoned cycles.

use crate::status::{CheckOutcome, LoopStatus};
use std::time::{Duration, Instant};

/// Default minimum spacing between check attempts.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Identifies one checking cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CycleId(u64);

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the caller must do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Nothing to start.
    Hold,
    /// Extract a descriptor from the current frame and match it.
    StartCheck(CycleId),
}

pub struct TriggerLoop {
    cooldown: Duration,
    /// Latest gesture reading.
    raised: bool,
    /// When the last check was started.
    last_attempt: Option<Instant>,
    /// The request currently outstanding, if any.
    in_flight: Option<CycleId>,
    /// The cycle whose result will be shown. Cleared when the hand drops.
    active: Option<CycleId>,
    next_cycle: u64,
    status: LoopStatus,
}

impl TriggerLoop {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            raised: false,
            last_attempt: None,
            in_flight: None,
            active: None,
            next_cycle: 1,
            status: LoopStatus::Idle,
        }
    }

    pub fn status(&self) -> &LoopStatus {
        &self.status
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn in_flight(&self) -> Option<CycleId> {
        self.in_flight
    }

    /// Record the most recent gesture reading. Only the latest value matters.
    pub fn observe_gesture(&mut self, raised: bool) {
        self.raised = raised;
    }

    /// Evaluate the loop for the frame observed at `now`.
    pub fn tick(&mut self, now: Instant) -> TickDecision {
        if !self.raised {
            if let Some(cycle) = self.active.take() {
                tracing::debug!(%cycle, "hand lowered; abandoning check");
            }
            self.set_status(LoopStatus::Idle);
            return TickDecision::Hold;
        }

        if self.active.is_some() {
            // Still checking for this raise; never re-enter.
            return TickDecision::Hold;
        }

        let cooled = self
            .last_attempt
            .map_or(true, |t| now.saturating_duration_since(t) > self.cooldown);

        if !cooled || self.in_flight.is_some() {
            self.set_status(LoopStatus::Cooldown);
            return TickDecision::Hold;
        }

        let cycle = CycleId(self.next_cycle);
        self.next_cycle += 1;
        self.last_attempt = Some(now);
        self.in_flight = Some(cycle);
        self.active = Some(cycle);
        self.set_status(LoopStatus::Checking);
        tracing::debug!(%cycle, "check started");

        TickDecision::StartCheck(cycle)
    }

    /// Deliver the result of `cycle`. Returns false if it was stale and discarded.
    pub fn complete(&mut self, cycle: CycleId, outcome: CheckOutcome) -> bool {
        if self.in_flight == Some(cycle) {
            self.in_flight = None;
        } else {
            tracing::warn!(%cycle, in_flight = ?self.in_flight, "completion for unknown cycle");
        }

        if self.active != Some(cycle) {
            tracing::debug!(%cycle, %outcome, "discarding stale check result");
            return false;
        }

        self.active = None;
        tracing::info!(%cycle, %outcome, "check finished");
        self.set_status(LoopStatus::Reported(outcome));
        true
    }

    fn set_status(&mut self, status: LoopStatus) {
        if self.status != status {
            tracing::debug!(from = %self.status, to = %status, "status changed");
            self.status = status;
        }
    }
}

impl Default for TriggerLoop {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
