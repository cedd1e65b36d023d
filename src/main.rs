use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use tracing::{info, warn};

use continuation_signals::advisory::AdvisoryClient;
use continuation_signals::config::{AnalyzeTarget, Cli, Command, FeedbackAction, Settings};
use continuation_signals::polygon::PolygonClient;
use continuation_signals::signal_core::{
    active_gaps, classify_bias, detect_gaps, detect_shifts, find_continuation, latest_shift,
    track_fills, Collaborators, DataProvider, FeedbackEntry, FeedbackStore, GateSchedule,
    LiveRunner, Timeframe, TradeHistoryStore,
};
use continuation_signals::storage::{JsonlFeedback, JsonlTradeHistory};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("continuation_signals=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    match cli.command {
        Command::Run => run_live(&settings).await,
        Command::Once => run_once(&settings).await,
        Command::Analyze { target } => analyze(&settings, target).await,
        Command::Feedback { action } => feedback(&settings, action).await,
        Command::Status => status(&settings).await,
    }
}

fn polygon_client(settings: &Settings) -> Result<PolygonClient> {
    PolygonClient::new(
        settings.polygon_key()?.to_string(),
        settings.polygon_base_url.clone(),
    )
}

fn advisory_client(settings: &Settings) -> Result<AdvisoryClient> {
    AdvisoryClient::new(
        settings.openai_key()?.to_string(),
        settings.llm_base_url.clone(),
        settings.advisory_settings(),
    )
}

fn ensure_data_dir(settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(&settings.data_dir)
        .with_context(|| format!("Failed to create data dir {}", settings.data_dir.display()))
}

async fn run_live(settings: &Settings) -> Result<()> {
    ensure_data_dir(settings)?;
    let provider = polygon_client(settings)?;
    let oracle = advisory_client(settings)?;
    let trade_history = JsonlTradeHistory::new(settings.trade_history_path());
    let feedback = JsonlFeedback::new(settings.feedback_path());

    info!("Starting continuation signals for {}", settings.symbol);
    match trade_history.count().await {
        Ok(n) => info!("Loaded trade history: {} records", n),
        Err(e) => warn!("Trade history unavailable: {}", e),
    }

    let collaborators = Collaborators {
        provider: &provider,
        oracle: &oracle,
        trade_history: &trade_history,
        feedback: &feedback,
    };
    let mut runner = LiveRunner::new(
        collaborators,
        settings.workflow_config(),
        settings.runner_config(),
        GateSchedule::live(),
    );
    runner.run().await;

    Ok(())
}

async fn run_once(settings: &Settings) -> Result<()> {
    ensure_data_dir(settings)?;
    let provider = polygon_client(settings)?;
    let oracle = advisory_client(settings)?;
    let trade_history = JsonlTradeHistory::new(settings.trade_history_path());
    let feedback = JsonlFeedback::new(settings.feedback_path());

    let collaborators = Collaborators {
        provider: &provider,
        oracle: &oracle,
        trade_history: &trade_history,
        feedback: &feedback,
    };
    let mut runner = LiveRunner::new(
        collaborators,
        settings.workflow_config(),
        settings.runner_config(),
        GateSchedule::every_tick(),
    );

    for transition in runner.tick(Utc::now()).await {
        println!("{}", transition);
    }
    println!("Final state: {}", runner.state());

    Ok(())
}

async fn analyze(settings: &Settings, target: AnalyzeTarget) -> Result<()> {
    let provider = polygon_client(settings)?;
    let config = settings.workflow_config();
    let symbol = config.symbol.as_str();
    let now = Utc::now();

    match target {
        AnalyzeTarget::Bias { last } => {
            let start = now - Duration::days(config.daily_lookback_days);
            let daily = provider.get_bars(symbol, Timeframe::DAILY, start, now).await?;
            let labels = classify_bias(&daily)?;

            println!("{} daily bias ({} labels)", symbol, labels.len());
            for l in labels.iter().rev().take(last).rev() {
                println!(
                    "{}  {:<7}  trend {:?}  closure {:?}  divergence {:?}  pd {:?}\n    {}",
                    l.date,
                    l.label,
                    l.higher_timeframe_trend,
                    l.closure_strength,
                    l.divergence_signal,
                    l.pd_array,
                    l.rationale
                );
            }
        }
        AnalyzeTarget::Gaps { active } => {
            let start = now - Duration::days(config.coarse_lookback_days);
            let coarse = provider
                .get_bars(symbol, config.coarse_timeframe, start, now)
                .await?;
            let Some((live, history)) = coarse.split_last() else {
                println!("No {} bars", config.coarse_timeframe);
                return Ok(());
            };

            let mut gaps = detect_gaps(history);
            track_fills(history, &mut gaps);
            let shown = if active { active_gaps(&gaps) } else { gaps };

            println!(
                "{} {} gaps ({} shown), current price {:.2}",
                symbol,
                config.coarse_timeframe,
                shown.len(),
                live.close
            );
            for g in &shown {
                let state = match g.fill_time {
                    Some(t) => format!("filled {}", t.format("%Y-%m-%d %H:%M")),
                    None if g.contains(live.close) => "retracing".to_string(),
                    None => format!("open, {:.2} away", g.distance_to(live.close)),
                };
                println!("  {}  [{}]", g, state);
            }
        }
        AnalyzeTarget::Shifts { hours } => {
            let fine = provider
                .get_bars(symbol, config.fine_timeframe, now - Duration::hours(hours), now)
                .await?;
            let shifts = detect_shifts(&fine, 0)?;

            println!("{} {} shifts over {}h: {}", symbol, config.fine_timeframe, hours, shifts.len());
            for s in &shifts {
                println!("  {}", s);
            }
        }
        AnalyzeTarget::Continuation { hours } => {
            let fine = provider
                .get_bars(symbol, config.fine_timeframe, now - Duration::hours(hours), now)
                .await?;
            let Some(first) = latest_shift(&fine)? else {
                println!("No {} structure shift in the last {}h", config.fine_timeframe, hours);
                return Ok(());
            };

            println!("First shift: {}", first);
            match find_continuation(&fine, &first, &config.continuation)? {
                Some(setup) => println!(
                    "{}: gap {}, second shift {}, entry {:.2}",
                    setup.direction, setup.gap, setup.second_shift, setup.entry_price
                ),
                None => println!("No continuation yet"),
            }
        }
    }

    Ok(())
}

async fn feedback(settings: &Settings, action: FeedbackAction) -> Result<()> {
    let store = JsonlFeedback::new(settings.feedback_path());

    match action {
        FeedbackAction::Summary => {
            println!("{}", store.summary().await?);
            for e in store.recent(settings.workflow_config().feedback_window).await? {
                println!(
                    "  {}  {:<7}  {:<8}  {:<10}  {}",
                    e.date, e.bias, e.advisory_decision, e.outcome, e.note
                );
            }
        }
        FeedbackAction::Add {
            date,
            bias,
            decision,
            outcome,
            note,
        } => {
            let recorded_at = Utc::now();
            let entry = FeedbackEntry {
                date: date.unwrap_or_else(|| recorded_at.date_naive()),
                bias,
                advisory_decision: decision,
                outcome,
                note,
                recorded_at,
            };
            store.append(&entry).await?;
            info!("Recorded {} feedback for {}", entry.outcome, entry.date);
        }
        FeedbackAction::Export { output } => {
            let rows = store.export_csv(&output).await?;
            println!("Exported {} feedback entries to {}", rows, output.display());
        }
    }

    Ok(())
}

async fn status(settings: &Settings) -> Result<()> {
    let trade_history = JsonlTradeHistory::new(settings.trade_history_path());
    let feedback = JsonlFeedback::new(settings.feedback_path());

    println!("Symbol:        {}", settings.symbol);
    println!("Data dir:      {}", settings.data_dir.display());
    println!("Trade history: {} records", trade_history.count().await?);
    println!("Feedback:      {}", feedback.summary().await?);

    if let Some(last) = trade_history.load_all().await?.pop() {
        println!("\nLast proposal:\n{}", last.alert_block());
    }

    Ok(())
}
