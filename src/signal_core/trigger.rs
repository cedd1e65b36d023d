//! One-shot gate triggers
//!
//! Each time-driven gate runs at most once per New York wall-clock bucket:
//! the bias gate once per calendar day, the retracement gate once per 4-hour
//! block (00, 04, 08, ...), and the fine gates once per 3-minute block.

use super::state_machine::{RemainCause, StateTransition, WorkflowState};
use chrono::{DateTime, Datelike, Duration, Utc};
use chrono_tz::America::New_York;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once per New York calendar day
    Daily,
    /// Once per fixed-length New York wall-clock block
    Every(Duration),
    /// Always due
    EveryTick,
}

/// Bucket key for `now` under `cadence`, `None` when buckets are disabled
fn bucket(cadence: Cadence, now: DateTime<Utc>) -> Option<i64> {
    let local = now.with_timezone(&New_York).naive_local();
    match cadence {
        Cadence::Daily => Some(local.date().num_days_from_ce() as i64),
        Cadence::Every(len) => {
            let secs = len.num_seconds().max(1);
            Some(local.and_utc().timestamp().div_euclid(secs))
        }
        Cadence::EveryTick => None,
    }
}

#[derive(Debug, Clone)]
pub struct OneShotTrigger {
    cadence: Cadence,
    consumed: Option<i64>,
}

impl OneShotTrigger {
    pub fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            consumed: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match bucket(self.cadence, now) {
            Some(b) => self.consumed != Some(b),
            None => true,
        }
    }

    /// Mark the bucket containing `now` as used
    pub fn consume(&mut self, now: DateTime<Utc>) {
        if let Some(b) = bucket(self.cadence, now) {
            self.consumed = Some(b);
        }
    }
}

/// Triggers for every time-driven gate
#[derive(Debug, Clone)]
pub struct GateSchedule {
    bias: OneShotTrigger,
    retracement: OneShotTrigger,
    first_shift: OneShotTrigger,
    continuation: OneShotTrigger,
}

impl GateSchedule {
    /// Daily bias, 4-hour retracement, 3-minute fine gates
    pub fn live() -> Self {
        Self {
            bias: OneShotTrigger::new(Cadence::Daily),
            retracement: OneShotTrigger::new(Cadence::Every(Duration::hours(4))),
            first_shift: OneShotTrigger::new(Cadence::Every(Duration::minutes(3))),
            continuation: OneShotTrigger::new(Cadence::Every(Duration::minutes(3))),
        }
    }

    /// Every gate due on every tick
    pub fn every_tick() -> Self {
        Self {
            bias: OneShotTrigger::new(Cadence::EveryTick),
            retracement: OneShotTrigger::new(Cadence::EveryTick),
            first_shift: OneShotTrigger::new(Cadence::EveryTick),
            continuation: OneShotTrigger::new(Cadence::EveryTick),
        }
    }

    fn trigger(&self, state: WorkflowState) -> Option<&OneShotTrigger> {
        match state {
            WorkflowState::AwaitingBias => Some(&self.bias),
            WorkflowState::AwaitingRetracement => Some(&self.retracement),
            WorkflowState::AwaitingFirstShift => Some(&self.first_shift),
            WorkflowState::AwaitingContinuation => Some(&self.continuation),
            WorkflowState::AwaitingAdvisory | WorkflowState::Ready | WorkflowState::Executed => {
                None
            }
        }
    }

    pub fn is_due(&self, state: WorkflowState, now: DateTime<Utc>) -> bool {
        self.trigger(state).map_or(true, |t| t.is_due(now))
    }

    /// Consume the gate's bucket when its evaluation completed.
    ///
    /// The bias trigger is only spent once a label is produced. The other
    /// triggers are spent by an advance or a "no signal yet", never by a
    /// collaborator failure.
    pub fn record(&mut self, state: WorkflowState, transition: &StateTransition, now: DateTime<Utc>) {
        let completed = match transition {
            StateTransition::Advanced { .. } => true,
            StateTransition::Remain {
                cause: RemainCause::NoSignal(_),
                ..
            } => state != WorkflowState::AwaitingBias,
            _ => false,
        };
        if !completed {
            return;
        }

        let trigger = match state {
            WorkflowState::AwaitingBias => &mut self.bias,
            WorkflowState::AwaitingRetracement => &mut self.retracement,
            WorkflowState::AwaitingFirstShift => &mut self.first_shift,
            WorkflowState::AwaitingContinuation => &mut self.continuation,
            _ => return,
        };
        trigger.consume(now);
    }
}
