//! `cognis` command line: inspect rosters and replay routing, budget and
//! survival decisions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use cognis_core::{
    budget_strategy, runway_days, BudgetEvaluator, Criticality, ProviderRecord, Roster,
    SelectionEngine, SelectionRequest, SurvivalConfig, SurvivalContext, SurvivalMachine,
    TaskBudget, TaskComplexity,
};
use cognis_runtime::{
    BackendResponse, BackendRouter, CallOptions, CycleOutcome, CycleRequest, DecisionCoordinator,
    FixedBalance, ManualClock, ProviderError, ReasoningBackend, RuntimeConfig, TokenUsage,
};

#[derive(Parser, Debug)]
#[command(name = "cognis", version, about = "Provider routing and survival decisions for economic agents")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a provider roster and list its providers
    Roster {
        /// Roster file (YAML or JSON)
        path: PathBuf,
    },

    /// Select a provider from a roster
    Select {
        #[arg(long)]
        roster: PathBuf,

        #[arg(long)]
        balance: f64,

        #[arg(long, value_enum, default_value_t = CriticalityArg::Medium)]
        criticality: CriticalityArg,

        #[arg(long, default_value_t = 1000)]
        tokens: u32,

        /// Only consider free providers
        #[arg(long)]
        free_only: bool,
    },

    /// Decide whether a task justifies paid reasoning
    Budget {
        #[arg(long)]
        metabolic_cost: f64,

        #[arg(long, default_value_t = 0.1)]
        fraction: f64,

        #[arg(long, value_enum, default_value_t = ComplexityArg::Complex)]
        complexity: ComplexityArg,

        #[arg(long, default_value_t = 0)]
        prompt_length: usize,

        #[arg(long)]
        balance: f64,

        #[arg(long, value_enum, default_value_t = CriticalityArg::Medium)]
        criticality: CriticalityArg,

        /// Daily burn; caps complexity by runway tier
        #[arg(long)]
        daily_cost: Option<f64>,
    },

    /// Run survival cycles for a fixed economic snapshot
    Survival {
        #[arg(long, default_value_t = 0.0)]
        balance: f64,

        #[arg(long, default_value_t = 1.0)]
        gas: f64,

        #[arg(long, default_value_t = 30.0)]
        days: f64,

        #[arg(long, default_value_t = 1)]
        cycles: u32,

        /// Time since activation, e.g. "71h"
        #[arg(long, value_parser = humantime_duration, default_value = "0s")]
        elapsed: Duration,
    },

    /// Drive the coordinator against a simulated backend
    Simulate {
        #[arg(long)]
        roster: PathBuf,

        /// Runtime configuration file (YAML or JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = 10.0)]
        balance: f64,

        #[arg(long, default_value_t = 10)]
        cycles: u32,

        /// Providers whose calls fail with a network error
        #[arg(long = "fail")]
        failing: Vec<String>,

        /// Time between completed cycles
        #[arg(long, value_parser = humantime_duration, default_value = "1h")]
        interval: Duration,

        #[arg(long, value_enum, default_value_t = CriticalityArg::Medium)]
        criticality: CriticalityArg,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CriticalityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<CriticalityArg> for Criticality {
    fn from(arg: CriticalityArg) -> Self {
        match arg {
            CriticalityArg::Low => Criticality::Low,
            CriticalityArg::Medium => Criticality::Medium,
            CriticalityArg::High => Criticality::High,
            CriticalityArg::Critical => Criticality::Critical,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ComplexityArg {
    Standard,
    Complex,
    Critical,
}

impl From<ComplexityArg> for TaskComplexity {
    fn from(arg: ComplexityArg) -> Self {
        match arg {
            ComplexityArg::Standard => TaskComplexity::Standard,
            ComplexityArg::Complex => TaskComplexity::Complex,
            ComplexityArg::Critical => TaskComplexity::Critical,
        }
    }
}

fn humantime_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Roster { path } => roster(path),
        Command::Select {
            roster,
            balance,
            criticality,
            tokens,
            free_only,
        } => select(roster, balance, criticality.into(), tokens, free_only),
        Command::Budget {
            metabolic_cost,
            fraction,
            complexity,
            prompt_length,
            balance,
            criticality,
            daily_cost,
        } => budget(
            TaskBudget::new(metabolic_cost, fraction),
            complexity.into(),
            prompt_length,
            balance,
            criticality.into(),
            daily_cost,
        ),
        Command::Survival {
            balance,
            gas,
            days,
            cycles,
            elapsed,
        } => survival(
            SurvivalContext {
                balance,
                gas_balance: gas,
                estimated_days: days,
                consecutive_failures: 0,
            },
            cycles,
            elapsed,
        ),
        Command::Simulate {
            roster,
            config,
            balance,
            cycles,
            failing,
            interval,
            criticality,
        } => simulate(roster, config, balance, cycles, failing, interval, criticality.into()).await,
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_roster(path: &PathBuf) -> Result<Roster> {
    Roster::from_file(path).with_context(|| format!("Failed to load roster {}", path.display()))
}

fn roster(path: PathBuf) -> Result<()> {
    let roster = load_roster(&path)?;
    let providers: Vec<_> = roster
        .providers
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "protocol": p.protocol,
                "cost_per_1k_tokens": p.cost_per_1k_tokens,
                "min_balance_required": p.min_balance_required,
                "quality_score": p.quality_score,
                "success_rate": p.success_rate,
                "selectable": p.is_selectable(),
            })
        })
        .collect();
    print_json(&json!({ "traits": roster.traits, "providers": providers }))
}

fn select(path: PathBuf, balance: f64, criticality: Criticality, tokens: u32, free_only: bool) -> Result<()> {
    let roster = load_roster(&path)?;
    let registry = roster.registry();

    let mut request = SelectionRequest::new(criticality, tokens);
    if free_only {
        request = request.free_only();
    }

    let selection = SelectionEngine::default().select(&request, &roster.traits, balance, &registry.list_available());
    match selection {
        Some(selection) => print_json(&selection),
        None => {
            tracing::warn!(balance, "No provider available");
            print_json(&json!({ "provider": null }))
        }
    }
}

fn budget(
    task_budget: TaskBudget,
    complexity: TaskComplexity,
    prompt_length: usize,
    balance: f64,
    criticality: Criticality,
    daily_cost: Option<f64>,
) -> Result<()> {
    let (complexity, tier) = match daily_cost {
        Some(daily_cost) => {
            let tier = budget_strategy(balance, daily_cost);
            (tier.cap(complexity), Some(tier))
        }
        None => (complexity, None),
    };

    let evaluation =
        BudgetEvaluator::default().evaluate(&task_budget, complexity, prompt_length, balance, criticality);

    print_json(&json!({
        "tier": tier,
        "runway_days": daily_cost.map(|d| runway_days(balance, d)).filter(|d| d.is_finite()),
        "complexity": complexity,
        "evaluation": evaluation,
        "reason": evaluation.reason.to_string(),
    }))
}

fn survival(context: SurvivalContext, cycles: u32, elapsed: Duration) -> Result<()> {
    let mut machine = SurvivalMachine::new(SurvivalConfig::default());
    let activated_at = Utc::now();
    machine.activate("manual survival run", activated_at)?;

    let now = activated_at + chrono::Duration::from_std(elapsed)?;
    let mut never = || -> Option<String> { None };
    let mut decisions = Vec::new();
    for _ in 0..cycles.max(1) {
        let decision = machine.cycle(&context, now, &mut never)?;
        let terminal = decision.is_terminal();
        decisions.push(decision);
        if terminal {
            break;
        }
    }

    print_json(&json!({
        "decisions": decisions,
        "status": machine.status(now),
    }))
}

/// Backend that answers every call except for providers marked failing.
struct SimulatedBackend {
    failing: HashSet<String>,
}

#[async_trait]
impl ReasoningBackend for SimulatedBackend {
    async fn call(
        &self,
        provider: &ProviderRecord,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<BackendResponse, ProviderError> {
        if self.failing.contains(&provider.id) {
            return Err(ProviderError::Network(format!("{} unreachable", provider.endpoint)));
        }
        let prompt_tokens = u32::try_from(prompt.len().div_ceil(4)).unwrap_or(u32::MAX);
        Ok(BackendResponse {
            content: format!("[{}] considered: {prompt}", provider.id),
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens: options.estimated_tokens.saturating_sub(prompt_tokens),
            },
            actual_cost: None,
        })
    }

    async fn health_check(&self, provider: &ProviderRecord) -> bool {
        !self.failing.contains(&provider.id)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

async fn simulate(
    roster_path: PathBuf,
    config_path: Option<PathBuf>,
    balance: f64,
    cycles: u32,
    failing: Vec<String>,
    interval: Duration,
    criticality: Criticality,
) -> Result<()> {
    let roster = load_roster(&roster_path)?;
    let config = match config_path {
        Some(path) => RuntimeConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let backend = Arc::new(SimulatedBackend {
        failing: failing.into_iter().collect(),
    });
    let coordinator = DecisionCoordinator::builder()
        .registry(roster.registry())
        .traits(roster.traits.clone())
        .config(config)
        .router(BackendRouter::with_fallback(backend))
        .balance_source(Arc::new(FixedBalance(balance)))
        .clock(clock.clone())
        .build()?;

    let request = CycleRequest::new("Plan the next unit of work", criticality).with_survival(SurvivalContext {
        balance,
        gas_balance: 1.0,
        estimated_days: 30.0,
        consecutive_failures: 0,
    });

    for cycle in 1..=cycles {
        let outcome = coordinator.run_cycle(request.clone()).await?;
        println!("{}", serde_json::to_string(&json!({ "cycle": cycle, "result": outcome }))?);

        match &outcome {
            CycleOutcome::Retry { delay, .. } => clock.advance(*delay),
            CycleOutcome::Survival(decision) if decision.is_terminal() => break,
            CycleOutcome::Survival(decision) => {
                clock.advance(decision.heartbeat_interval.unwrap_or(interval));
            }
            CycleOutcome::Completed { .. } => clock.advance(interval),
        }
    }

    print_json(&json!({
        "status": coordinator.status(),
        "history": coordinator.history(),
    }))
}
