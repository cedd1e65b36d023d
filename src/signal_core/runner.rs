//! Cooperative polling loop
//!
//! One workflow instance, advanced on each tick through as many due gates as
//! pass. Interruption only happens between ticks, so nothing partial is lost:
//! every finding is recomputed from fresh bars on the next poll.

use super::collaborators::Collaborators;
use super::state_machine::{StateTransition, Workflow, WorkflowConfig, WorkflowState};
use super::trigger::GateSchedule;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::America::New_York;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the polling loop
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Delay between ticks (default: 60s)
    pub poll_interval: Duration,
    /// Upper bound on gates evaluated in one tick (default: 8)
    pub max_steps_per_tick: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_steps_per_tick: 8,
        }
    }
}

pub struct LiveRunner<'a> {
    collaborators: Collaborators<'a>,
    workflow_config: WorkflowConfig,
    config: RunnerConfig,
    schedule: GateSchedule,
    workflow: Workflow,
    signals_emitted: usize,
    last_status_hour: Option<DateTime<Utc>>,
}

impl<'a> LiveRunner<'a> {
    pub fn new(
        collaborators: Collaborators<'a>,
        workflow_config: WorkflowConfig,
        config: RunnerConfig,
        schedule: GateSchedule,
    ) -> Self {
        Self {
            collaborators,
            workflow_config,
            config,
            schedule,
            workflow: Workflow::new(),
            signals_emitted: 0,
            last_status_hour: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.workflow.state()
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Run one poll cycle. Stops at the first gate that is not due or does not advance.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Vec<StateTransition> {
        let mut transitions = Vec::new();

        for _ in 0..self.config.max_steps_per_tick {
            let state = self.workflow.state();
            if !self.schedule.is_due(state, now) {
                debug!("{} not due", state);
                break;
            }

            let workflow = std::mem::take(&mut self.workflow);
            let (next, transition) = workflow
                .step(&self.collaborators, &self.workflow_config, now)
                .await;
            self.workflow = next;
            self.schedule.record(state, &transition, now);

            if let StateTransition::Executed { .. } = transition {
                self.signals_emitted += 1;
            }

            let advanced = transition.is_advance();
            transitions.push(transition);
            if !advanced {
                break;
            }
        }

        transitions
    }

    /// Tick on a fixed interval until Ctrl-C
    pub async fn run(&mut self) {
        info!(
            "Polling {} every {}s",
            self.workflow_config.symbol,
            self.config.poll_interval.as_secs()
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Stopped by user in {}", self.workflow.state());
                    break;
                }
                _ = interval.tick() => {
                    let now = Utc::now();
                    self.log_status_hourly(now).await;
                    self.tick(now).await;
                }
            }
        }
    }

    async fn log_status_hourly(&mut self, now: DateTime<Utc>) {
        let Some(hour) = now
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
        else {
            return;
        };
        if self.last_status_hour == Some(hour) {
            return;
        }
        self.last_status_hour = Some(hour);

        let total = match self.collaborators.trade_history.count().await {
            Ok(n) => n.to_string(),
            Err(e) => {
                warn!("Trade history unavailable: {}", e);
                "?".to_string()
            }
        };
        info!(
            "Status {} | {} | state {} | signals this session {} | trade history {}",
            now.with_timezone(&New_York).format("%Y-%m-%d %H:%M %Z"),
            self.workflow_config.symbol,
            self.workflow.state(),
            self.signals_emitted,
            total
        );
    }
}
