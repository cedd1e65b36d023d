//! Workflow state machine for one trade candidate
//!
//! Gates, strictly in order:
//! 1. AWAITING_BIAS - latest daily bias label
//! 2. AWAITING_ADVISORY - oracle approves the bias, or the candidate is discarded
//! 3. AWAITING_RETRACEMENT - current price trades inside an active 4h gap
//! 4. AWAITING_FIRST_SHIFT - most recent 3m structure shift after the gap formed
//! 5. AWAITING_CONTINUATION - gap retest plus opposite shift on the 3m series
//! 6. READY - bracket the entry and build the proposal
//! 7. EXECUTED - append the proposal to trade history and reset
//!
//! The workflow is a plain value: `step` takes it by value and hands back the
//! next value together with what happened.

use super::bars::{first_index_after, Bar, Timeframe};
use super::bias::{latest_bias, BiasLabel};
use super::collaborators::{load_feedback_context, AdvisoryDecision, AdvisoryVerdict, Collaborators};
use super::continuation::{find_continuation, ContinuationConfig, ContinuationSetup};
use super::errors::{Result, SignalError};
use super::gaps::{active_gaps, detect_gaps, track_fills, Gap};
use super::proposal::{RiskParams, TradeProposal};
use super::structure::{latest_shift, StructureShift};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Configuration for the workflow
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub symbol: String,
    /// Daily bars requested for the bias gate (default: 30 days)
    pub daily_lookback_days: i64,
    /// Coarse bars requested for the retracement gate (default: 30 days)
    pub coarse_lookback_days: i64,
    pub coarse_timeframe: Timeframe,
    pub fine_timeframe: Timeframe,
    /// Feedback entries shown to the oracle (default: 5)
    pub feedback_window: usize,
    /// Gaps within this fraction of their width from price are logged as near (default: 0.1)
    pub near_gap_fraction: f64,
    pub continuation: ContinuationConfig,
    pub risk: RiskParams,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            symbol: "C:XAUUSD".to_string(),
            daily_lookback_days: 30,
            coarse_lookback_days: 30,
            coarse_timeframe: Timeframe::FOUR_HOUR,
            fine_timeframe: Timeframe::THREE_MINUTE,
            feedback_window: 5,
            near_gap_fraction: 0.1,
            continuation: ContinuationConfig::default(),
            risk: RiskParams::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowState {
    AwaitingBias,
    AwaitingAdvisory,
    AwaitingRetracement,
    AwaitingFirstShift,
    AwaitingContinuation,
    Ready,
    Executed,
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowState::AwaitingBias => write!(f, "AWAITING_BIAS"),
            WorkflowState::AwaitingAdvisory => write!(f, "AWAITING_ADVISORY"),
            WorkflowState::AwaitingRetracement => write!(f, "AWAITING_RETRACEMENT"),
            WorkflowState::AwaitingFirstShift => write!(f, "AWAITING_FIRST_SHIFT"),
            WorkflowState::AwaitingContinuation => write!(f, "AWAITING_CONTINUATION"),
            WorkflowState::Ready => write!(f, "READY"),
            WorkflowState::Executed => write!(f, "EXECUTED"),
        }
    }
}

/// Findings accumulated by the gates passed so far
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub bias: Option<BiasLabel>,
    pub advisory: Option<AdvisoryVerdict>,
    pub anchor_gap: Option<Gap>,
    pub first_shift: Option<StructureShift>,
    pub setup: Option<ContinuationSetup>,
    pub proposal: Option<TradeProposal>,
}

/// Why a gate did not advance
#[derive(Debug, Clone, PartialEq)]
pub enum RemainCause {
    /// Condition not met yet
    NoSignal(String),
    /// Collaborator or detector failure; retried next poll
    Error(SignalError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateTransition {
    Remain {
        state: WorkflowState,
        cause: RemainCause,
    },
    Advanced {
        from: WorkflowState,
        to: WorkflowState,
    },
    /// Oracle rejected or errored; candidate discarded
    AdvisoryRejected { verdict: AdvisoryVerdict },
    /// Proposal emitted; `persisted` carries the trade-history append result
    Executed {
        proposal: Box<TradeProposal>,
        persisted: Result<()>,
    },
    /// Candidate was missing a finding its state requires
    Reset { from: WorkflowState, reason: String },
}

impl StateTransition {
    pub fn is_advance(&self) -> bool {
        matches!(self, StateTransition::Advanced { .. })
    }
}

impl std::fmt::Display for StateTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateTransition::Remain { state, cause: RemainCause::NoSignal(why) } => {
                write!(f, "{}: waiting ({})", state, why)
            }
            StateTransition::Remain { state, cause: RemainCause::Error(e) } => {
                write!(f, "{}: error ({})", state, e)
            }
            StateTransition::Advanced { from, to } => write!(f, "{} -> {}", from, to),
            StateTransition::AdvisoryRejected { verdict } => {
                write!(f, "advisory {}: {}", verdict.decision, verdict.rationale)
            }
            StateTransition::Executed { proposal, persisted } => write!(
                f,
                "{} {} @ {:.2} emitted ({})",
                proposal.direction,
                proposal.symbol,
                proposal.entry_price,
                if persisted.is_ok() { "recorded" } else { "not recorded" }
            ),
            StateTransition::Reset { from, reason } => write!(f, "{} reset: {}", from, reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workflow {
    state: WorkflowState,
    candidate: Candidate,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::AwaitingBias,
            candidate: Candidate::default(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// Evaluate the current gate once
    pub async fn step(
        self,
        ctx: &Collaborators<'_>,
        config: &WorkflowConfig,
        now: DateTime<Utc>,
    ) -> (Workflow, StateTransition) {
        match self.state {
            WorkflowState::AwaitingBias => self.await_bias(ctx, config, now).await,
            WorkflowState::AwaitingAdvisory => self.await_advisory(ctx, config).await,
            WorkflowState::AwaitingRetracement => self.await_retracement(ctx, config, now).await,
            WorkflowState::AwaitingFirstShift => self.await_first_shift(ctx, config, now).await,
            WorkflowState::AwaitingContinuation => {
                self.await_continuation(ctx, config, now).await
            }
            WorkflowState::Ready => self.ready(config, now),
            WorkflowState::Executed => self.execute(ctx).await,
        }
    }

    async fn await_bias(
        mut self,
        ctx: &Collaborators<'_>,
        config: &WorkflowConfig,
        now: DateTime<Utc>,
    ) -> (Workflow, StateTransition) {
        let start = now - Duration::days(config.daily_lookback_days);
        let daily = match fetch(ctx, config, Timeframe::DAILY, start, now).await {
            Ok(bars) => bars,
            Err(e) => return self.fail(e),
        };

        match latest_bias(&daily) {
            Ok(Some(label)) => {
                info!(
                    "Daily bias {} for {}: {}",
                    label.label, label.date, label.rationale
                );
                self.candidate.bias = Some(label);
                self.advance(WorkflowState::AwaitingAdvisory)
            }
            Ok(None) => self.wait("no daily bias yet".to_string()),
            Err(e) => self.fail(e),
        }
    }

    async fn await_advisory(
        mut self,
        ctx: &Collaborators<'_>,
        config: &WorkflowConfig,
    ) -> (Workflow, StateTransition) {
        let Some(bias) = self.candidate.bias.as_ref() else {
            return self.inconsistent("bias");
        };

        let context = load_feedback_context(ctx.feedback, config.feedback_window).await;
        let verdict = ctx.oracle.evaluate(bias, &context).await;

        match verdict.decision {
            AdvisoryDecision::Approve => {
                info!("Advisory approved {} bias: {}", bias.label, verdict.rationale);
                self.candidate.advisory = Some(verdict);
                self.advance(WorkflowState::AwaitingRetracement)
            }
            AdvisoryDecision::Reject => {
                info!("Advisory rejected {} bias: {}", bias.label, verdict.rationale);
                (Workflow::new(), StateTransition::AdvisoryRejected { verdict })
            }
            AdvisoryDecision::Error => {
                warn!(
                    "{}; discarding {} bias",
                    SignalError::Advisory(verdict.rationale.clone()),
                    bias.label
                );
                (Workflow::new(), StateTransition::AdvisoryRejected { verdict })
            }
        }
    }

    async fn await_retracement(
        mut self,
        ctx: &Collaborators<'_>,
        config: &WorkflowConfig,
        now: DateTime<Utc>,
    ) -> (Workflow, StateTransition) {
        let start = now - Duration::days(config.coarse_lookback_days);
        let coarse = match fetch(ctx, config, config.coarse_timeframe, start, now).await {
            Ok(bars) => bars,
            Err(e) => return self.fail(e),
        };

        // Closed history plus one live bar
        let Some((live, history)) = coarse.split_last() else {
            return self.wait(format!("no {} bars", config.coarse_timeframe));
        };
        let price = live.close;

        let mut gaps = detect_gaps(history);
        track_fills(history, &mut gaps);
        let active = active_gaps(&gaps);

        if let Some(anchor) = active.iter().find(|g| g.contains(price)) {
            info!(
                "{} retracement: price {:.2} inside {}",
                config.coarse_timeframe, price, anchor
            );
            self.candidate.anchor_gap = Some(anchor.clone());
            return self.advance(WorkflowState::AwaitingFirstShift);
        }

        for gap in &active {
            let distance = gap.distance_to(price);
            if distance <= config.near_gap_fraction * gap.width() {
                info!(
                    "Price {:.2} near {} (distance {:.2})",
                    price, gap, distance
                );
            }
        }

        self.wait(format!(
            "price {:.2} outside all {} active {} gaps",
            price,
            active.len(),
            config.coarse_timeframe
        ))
    }

    async fn await_first_shift(
        mut self,
        ctx: &Collaborators<'_>,
        config: &WorkflowConfig,
        now: DateTime<Utc>,
    ) -> (Workflow, StateTransition) {
        let Some(anchor) = self.candidate.anchor_gap.as_ref() else {
            return self.inconsistent("anchor gap");
        };
        let fine = match fetch_fine(ctx, config, anchor, now).await {
            Ok(bars) => bars,
            Err(e) => return self.fail(e),
        };

        match latest_shift(&fine) {
            Ok(Some(shift)) => {
                info!("{} first shift: {}", config.fine_timeframe, shift);
                self.candidate.first_shift = Some(shift);
                self.advance(WorkflowState::AwaitingContinuation)
            }
            Ok(None) => {
                let reason = format!(
                    "no {} shift since {}",
                    config.fine_timeframe,
                    anchor.formation_time.format("%Y-%m-%d %H:%M")
                );
                self.wait(reason)
            }
            Err(e) => self.fail(e),
        }
    }

    async fn await_continuation(
        mut self,
        ctx: &Collaborators<'_>,
        config: &WorkflowConfig,
        now: DateTime<Utc>,
    ) -> (Workflow, StateTransition) {
        let (Some(anchor), Some(first)) = (
            self.candidate.anchor_gap.as_ref(),
            self.candidate.first_shift.as_ref(),
        ) else {
            return self.inconsistent("anchor gap or first shift");
        };
        let fine = match fetch_fine(ctx, config, anchor, now).await {
            Ok(bars) => bars,
            Err(e) => return self.fail(e),
        };

        match find_continuation(&fine, first, &config.continuation) {
            Ok(Some(setup)) => {
                info!(
                    "Continuation {} at {:.2} via {}",
                    setup.direction, setup.entry_price, setup.gap
                );
                self.candidate.setup = Some(setup);
                self.advance(WorkflowState::Ready)
            }
            Ok(None) => {
                let reason = format!("no continuation after {}", first);
                self.wait(reason)
            }
            Err(e) => self.fail(e),
        }
    }

    fn ready(mut self, config: &WorkflowConfig, now: DateTime<Utc>) -> (Workflow, StateTransition) {
        let c = &self.candidate;
        let (Some(bias), Some(advisory), Some(anchor), Some(setup)) = (
            c.bias.clone(),
            c.advisory.clone(),
            c.anchor_gap.clone(),
            c.setup.clone(),
        ) else {
            return self.inconsistent("bias, advisory, anchor gap or setup");
        };

        let proposal = TradeProposal::build(
            now,
            &config.symbol,
            bias,
            advisory,
            anchor,
            setup,
            &config.risk,
        );
        info!(
            "Proposal {}: {} @ {:.2} SL {:.2} TP {:.2}",
            proposal.id,
            proposal.direction,
            proposal.entry_price,
            proposal.stop_loss,
            proposal.take_profit
        );
        self.candidate.proposal = Some(proposal);
        self.advance(WorkflowState::Executed)
    }

    async fn execute(self, ctx: &Collaborators<'_>) -> (Workflow, StateTransition) {
        let Some(proposal) = self.candidate.proposal.clone() else {
            return self.inconsistent("proposal");
        };

        info!("\n{}", proposal.alert_block());

        let persisted = ctx.trade_history.append(&proposal).await;
        if let Err(e) = &persisted {
            error!("Proposal {} not saved: {}", proposal.id, e);
        }

        (
            Workflow::new(),
            StateTransition::Executed {
                proposal: Box::new(proposal),
                persisted,
            },
        )
    }

    fn advance(mut self, to: WorkflowState) -> (Workflow, StateTransition) {
        let from = self.state;
        self.state = to;
        debug!("{} -> {}", from, to);
        (self, StateTransition::Advanced { from, to })
    }

    fn wait(self, reason: String) -> (Workflow, StateTransition) {
        info!("{}: {}", self.state, reason);
        let state = self.state;
        (
            self,
            StateTransition::Remain {
                state,
                cause: RemainCause::NoSignal(reason),
            },
        )
    }

    fn fail(self, e: SignalError) -> (Workflow, StateTransition) {
        warn!("{}: {}", self.state, e);
        let state = self.state;
        (
            self,
            StateTransition::Remain {
                state,
                cause: RemainCause::Error(e),
            },
        )
    }

    fn inconsistent(self, missing: &str) -> (Workflow, StateTransition) {
        let reason = format!("candidate has no {}", missing);
        error!("{}: {}; resetting", self.state, reason);
        (
            Workflow::new(),
            StateTransition::Reset {
                from: self.state,
                reason,
            },
        )
    }
}

async fn fetch(
    ctx: &Collaborators<'_>,
    config: &WorkflowConfig,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Bar>> {
    ctx.provider
        .get_bars(&config.symbol, timeframe, start, end)
        .await
}

/// Fine bars strictly after the anchor gap formed
async fn fetch_fine(
    ctx: &Collaborators<'_>,
    config: &WorkflowConfig,
    anchor: &Gap,
    now: DateTime<Utc>,
) -> Result<Vec<Bar>> {
    let mut bars = fetch(ctx, config, config.fine_timeframe, anchor.formation_time, now).await?;
    let skip = first_index_after(&bars, anchor.formation_time);
    bars.drain(..skip);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::super::bars::test_support::{bars_from_ranges, ts};
    use super::super::collaborators::test_support::*;
    use super::super::polarity::Polarity;
    use super::super::proposal::TradeDirection;
    use super::*;

    fn daily_buy() -> Vec<Bar> {
        vec![
            Bar::new(ts(0), 99.0, 101.0, 98.0, 100.0, 1.0),
            Bar::new(ts(24), 100.0, 106.0, 104.0, 105.0, 1.0),
            Bar::new(ts(48), 106.0, 110.5, 103.0, 110.0, 1.0),
        ]
    }

    /// Active bullish gap 10-11 formed at ts(1); live bar closes at 11
    fn coarse_retraced() -> Vec<Bar> {
        bars_from_ranges(&[
            (10.0, 8.0),
            (12.0, 9.5),
            (13.0, 11.0),
            (13.5, 11.5),
            (13.2, 11.2),
            (12.0, 10.0),
        ])
    }

    /// Same history, live bar far above the gap
    fn coarse_away() -> Vec<Bar> {
        let mut bars = coarse_retraced();
        if let Some(last) = bars.last_mut() {
            *last = Bar::new(last.timestamp, 20.0, 21.0, 19.0, 20.0, 1.0);
        }
        bars
    }

    /// Fine bars offset past the coarse gap's formation
    fn fine(ranges: &[(f64, f64)]) -> Vec<Bar> {
        bars_from_ranges(ranges)
            .into_iter()
            .map(|mut b| {
                b.timestamp += Duration::hours(10);
                b
            })
            .collect()
    }

    /// Bullish shift at 2, gap 9.0-10.5 retested at 6 (close 10.5), bearish shift at 8
    fn fine_full() -> Vec<Bar> {
        fine(&[
            (10.0, 6.0),
            (9.0, 5.5),
            (8.0, 5.0),
            (9.0, 6.0),
            (11.0, 8.5),
            (13.0, 10.5),
            (12.0, 9.0),
            (12.5, 9.5),
            (13.0, 10.0),
            (12.0, 9.2),
            (11.0, 8.6),
        ])
    }

    struct Fixture {
        provider: ScriptedProvider,
        oracle: FixedOracle,
        history: MemoryTradeHistory,
        feedback: MemoryFeedback,
    }

    impl Fixture {
        fn new(verdict: AdvisoryVerdict) -> Self {
            let provider = ScriptedProvider::default();
            provider.set(Timeframe::DAILY, daily_buy());
            provider.set(Timeframe::FOUR_HOUR, coarse_retraced());
            provider.set(Timeframe::THREE_MINUTE, fine_full()[..6].to_vec());
            Self {
                provider,
                oracle: FixedOracle::new(verdict),
                history: MemoryTradeHistory::default(),
                feedback: MemoryFeedback::default(),
            }
        }

        fn ctx(&self) -> Collaborators<'_> {
            Collaborators {
                provider: &self.provider,
                oracle: &self.oracle,
                trade_history: &self.history,
                feedback: &self.feedback,
            }
        }
    }

    async fn step(f: &Fixture, wf: Workflow) -> (Workflow, StateTransition) {
        wf.step(&f.ctx(), &WorkflowConfig::default(), ts(200)).await
    }

    #[tokio::test]
    async fn test_full_pass_emits_proposal_and_resets() {
        let f = Fixture::new(AdvisoryVerdict::approve("aligned"));
        let mut wf = Workflow::new();

        let expected = [
            (WorkflowState::AwaitingBias, WorkflowState::AwaitingAdvisory),
            (WorkflowState::AwaitingAdvisory, WorkflowState::AwaitingRetracement),
            (WorkflowState::AwaitingRetracement, WorkflowState::AwaitingFirstShift),
            (WorkflowState::AwaitingFirstShift, WorkflowState::AwaitingContinuation),
        ];
        for (from, to) in expected {
            let (next, t) = step(&f, wf).await;
            assert_eq!(t, StateTransition::Advanced { from, to });
            wf = next;
        }

        let first = wf.candidate().first_shift.clone().unwrap();
        assert_eq!(first.polarity, Polarity::Bullish);

        // more fine bars arrive
        f.provider.set(Timeframe::THREE_MINUTE, fine_full());
        let (wf, t) = step(&f, wf).await;
        assert_eq!(
            t,
            StateTransition::Advanced {
                from: WorkflowState::AwaitingContinuation,
                to: WorkflowState::Ready
            }
        );
        let (wf, t) = step(&f, wf).await;
        assert!(t.is_advance());
        assert_eq!(wf.state(), WorkflowState::Executed);

        let (wf, t) = step(&f, wf).await;
        assert_eq!(wf.state(), WorkflowState::AwaitingBias);
        assert!(wf.candidate().bias.is_none());

        let StateTransition::Executed { proposal, persisted } = t else {
            panic!("expected execution, got {:?}", t);
        };
        assert!(persisted.is_ok());
        assert_eq!(proposal.direction, TradeDirection::Short);
        assert_eq!(proposal.entry_price, 10.5);
        // anchor 10-11, entry mid-gap: distance 0.5, risk 0.25, reward 0.5
        assert_eq!(proposal.stop_loss, 10.75);
        assert_eq!(proposal.take_profit, 10.0);
        assert_eq!(proposal.anchor_gap.lower_bound, 10.0);
        assert_eq!(proposal.symbol, "C:XAUUSD");
        assert_eq!(f.history.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advisory_reject_discards_bias() {
        let f = Fixture::new(AdvisoryVerdict::reject("counter-trend"));
        let (wf, _) = step(&f, Workflow::new()).await;
        assert!(wf.candidate().bias.is_some());

        let (wf, t) = step(&f, wf).await;
        assert_eq!(wf.state(), WorkflowState::AwaitingBias);
        assert!(wf.candidate().bias.is_none());
        assert!(matches!(
            t,
            StateTransition::AdvisoryRejected { ref verdict } if verdict.decision == AdvisoryDecision::Reject
        ));
    }

    #[tokio::test]
    async fn test_advisory_error_is_gated_as_reject() {
        let f = Fixture::new(AdvisoryVerdict::error("could not parse"));
        let (wf, _) = step(&f, Workflow::new()).await;
        let (wf, t) = step(&f, wf).await;

        assert_eq!(wf.state(), WorkflowState::AwaitingBias);
        let StateTransition::AdvisoryRejected { verdict } = t else {
            panic!("expected rejection, got {:?}", t);
        };
        assert_eq!(verdict.decision, AdvisoryDecision::Error);
    }

    #[tokio::test]
    async fn test_advisory_receives_feedback_context() {
        let f = Fixture::new(AdvisoryVerdict::approve("ok"));
        f.feedback
            .entries
            .lock()
            .unwrap()
            .push(super::super::collaborators::FeedbackEntry {
                date: ts(0).date_naive(),
                bias: super::super::bias::Bias::Buy,
                advisory_decision: AdvisoryDecision::Approve,
                outcome: super::super::collaborators::Outcome::Loss,
                note: "faded at the open".to_string(),
                recorded_at: ts(1),
            });

        let (wf, _) = step(&f, Workflow::new()).await;
        let _ = step(&f, wf).await;

        let contexts = f.oracle.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 1);
        assert!(contexts[0].contains("faded at the open"));
    }

    #[tokio::test]
    async fn test_gate_outcomes_table() {
        // (name, parked state, provider tweak, remain cause is an error)
        let cases: [(&str, WorkflowState, fn(&ScriptedProvider), bool); 7] = [
            ("bias provider down", WorkflowState::AwaitingBias, |p: &ScriptedProvider| {
                p.fail(Timeframe::DAILY)
            }, true),
            ("bias too few bars", WorkflowState::AwaitingBias, |p: &ScriptedProvider| {
                p.set(Timeframe::DAILY, daily_buy()[..2].to_vec())
            }, true),
            ("price away from gaps", WorkflowState::AwaitingRetracement, |p: &ScriptedProvider| {
                p.set(Timeframe::FOUR_HOUR, coarse_away())
            }, false),
            ("coarse provider down", WorkflowState::AwaitingRetracement, |p: &ScriptedProvider| {
                p.fail(Timeframe::FOUR_HOUR)
            }, true),
            ("no fine shift yet", WorkflowState::AwaitingFirstShift, |p: &ScriptedProvider| {
                p.set(Timeframe::THREE_MINUTE, fine(&[(10.0, 6.0); 6]))
            }, false),
            ("fine too short", WorkflowState::AwaitingFirstShift, |p: &ScriptedProvider| {
                p.set(Timeframe::THREE_MINUTE, fine_full()[..3].to_vec())
            }, true),
            ("continuation not formed", WorkflowState::AwaitingContinuation, |_: &ScriptedProvider| {}, false),
        ];

        for (name, state, tweak, expect_error) in cases {
            let f = Fixture::new(AdvisoryVerdict::approve("ok"));
            tweak(&f.provider);
            let wf = seeded(state);

            let (first_wf, first) = step(&f, wf.clone()).await;
            let (_, second) = step(&f, wf).await;

            assert_eq!(first_wf.state(), state, "{}", name);
            assert_eq!(first, second, "{} not idempotent", name);
            match first {
                StateTransition::Remain { state: s, cause } => {
                    assert_eq!(s, state, "{}", name);
                    assert_eq!(matches!(cause, RemainCause::Error(_)), expect_error, "{}", name);
                }
                other => panic!("{}: expected remain, got {:?}", name, other),
            }
        }
    }

    #[tokio::test]
    async fn test_fine_bars_before_gap_formation_are_dropped() {
        let f = Fixture::new(AdvisoryVerdict::approve("ok"));
        // the pivot's leading bars sit at or before the anchor formed at ts(1)
        let mut bars = bars_from_ranges(&[(10.0, 6.0), (9.0, 5.5), (8.0, 5.0)]);
        bars.extend(fine(&[(9.0, 6.0), (10.0, 7.0), (10.0, 7.0), (10.0, 7.0), (10.0, 7.0)]));
        f.provider.set(Timeframe::THREE_MINUTE, bars);

        let (wf, t) = step(&f, seeded(WorkflowState::AwaitingFirstShift)).await;
        assert_eq!(wf.state(), WorkflowState::AwaitingFirstShift);
        assert!(matches!(
            t,
            StateTransition::Remain { cause: RemainCause::NoSignal(_), .. }
        ));
    }

    #[tokio::test]
    async fn test_persistence_failure_still_resets() {
        let mut f = Fixture::new(AdvisoryVerdict::approve("ok"));
        f.history = MemoryTradeHistory {
            fail: true,
            ..Default::default()
        };
        f.provider.set(Timeframe::THREE_MINUTE, fine_full());

        let mut wf = seeded(WorkflowState::AwaitingContinuation);
        let mut last = None;
        for _ in 0..3 {
            let (next, t) = step(&f, wf).await;
            wf = next;
            last = Some(t);
        }

        assert_eq!(wf.state(), WorkflowState::AwaitingBias);
        let Some(StateTransition::Executed { persisted, .. }) = last else {
            panic!("expected execution");
        };
        assert!(matches!(persisted, Err(SignalError::Persistence { .. })));
    }

    #[tokio::test]
    async fn test_missing_finding_resets() {
        let f = Fixture::new(AdvisoryVerdict::approve("ok"));
        let wf = Workflow {
            state: WorkflowState::Ready,
            candidate: Candidate::default(),
        };
        let (wf, t) = step(&f, wf).await;
        assert_eq!(wf.state(), WorkflowState::AwaitingBias);
        assert!(matches!(t, StateTransition::Reset { from: WorkflowState::Ready, .. }));
    }

    /// Workflow parked at `state` with every earlier finding filled in
    fn seeded(state: WorkflowState) -> Workflow {
        let bias = latest_bias(&daily_buy()).unwrap();
        let coarse = coarse_retraced();
        let history = &coarse[..coarse.len() - 1];
        let anchor = detect_gaps(history).into_iter().next();
        let first = latest_shift(&fine_full()[..6]).unwrap();

        let mut candidate = Candidate {
            bias,
            advisory: Some(AdvisoryVerdict::approve("ok")),
            ..Default::default()
        };
        if !matches!(
            state,
            WorkflowState::AwaitingBias
                | WorkflowState::AwaitingAdvisory
                | WorkflowState::AwaitingRetracement
        ) {
            candidate.anchor_gap = anchor;
        }
        if matches!(
            state,
            WorkflowState::AwaitingContinuation | WorkflowState::Ready | WorkflowState::Executed
        ) {
            candidate.first_shift = first;
        }

        Workflow { state, candidate }
    }
}
