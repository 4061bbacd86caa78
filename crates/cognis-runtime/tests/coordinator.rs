//! Coordinator cycles against scripted backends.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cognis_core::{
    CallOutcome, CognitiveTraits, Criticality, FixedScorer, PowerMode, ProviderProtocol,
    ProviderRecord, ProviderRegistry, SurvivalAction, SurvivalContext, SurvivalReason, TaskBudget,
    TaskComplexity,
};
use cognis_runtime::{
    BackendResponse, BackendRouter, BudgetGate, CallOptions, ChannelPowerSignal, CoordinatorError,
    CycleOutcome, CycleRequest, DecisionCoordinator, FixedBalance, ManualClock, ProviderError,
    ReasoningBackend,
};

enum Step {
    Reply(&'static str),
    Reject,
    OverBudget,
    Network,
    Defect,
    Hang(Duration),
}

struct ScriptedBackend {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<String>>,
    options: Mutex<Vec<CallOptions>>,
    healthy: AtomicBool,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        })
    }

    fn script(&self, provider: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .entry(provider.to_string())
            .or_default()
            .extend(steps);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn options(&self) -> Vec<CallOptions> {
        self.options.lock().clone()
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn call(
        &self,
        provider: &ProviderRecord,
        _prompt: &str,
        options: &CallOptions,
    ) -> Result<BackendResponse, ProviderError> {
        self.calls.lock().push(provider.id.clone());
        self.options.lock().push(options.clone());
        let step = self
            .scripts
            .lock()
            .get_mut(&provider.id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Reply("ok"));

        match step {
            Step::Reply(text) => Ok(BackendResponse::text(text)),
            Step::Reject => Err(ProviderError::Rejected {
                provider: provider.id.clone(),
                reason: "busy".to_string(),
            }),
            Step::OverBudget => Err(ProviderError::BudgetExceeded {
                quoted: 2.0,
                ceiling: 1.0,
            }),
            Step::Network => Err(ProviderError::Network("connection reset".to_string())),
            Step::Defect => Err(ProviderError::Other(anyhow::anyhow!("malformed response"))),
            Step::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(BackendResponse::text("slow"))
            }
        }
    }

    async fn health_check(&self, _provider: &ProviderRecord) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn free(id: &str, quality: f64) -> ProviderRecord {
    ProviderRecord::new(id, id, "http://localhost", ProviderProtocol::Free).with_reputation(quality, 1.0)
}

fn paid(id: &str, cost: f64, quality: f64) -> ProviderRecord {
    ProviderRecord::new(id, id, "http://paid", ProviderProtocol::MeteredPayment)
        .with_pricing(cost, 0.0)
        .with_reputation(quality, 1.0)
}

fn healthy_context() -> SurvivalContext {
    SurvivalContext {
        balance: 10.0,
        gas_balance: 1.0,
        estimated_days: 30.0,
        consecutive_failures: 0,
    }
}

fn request() -> CycleRequest {
    CycleRequest::new("What next?", Criticality::Medium).with_survival(healthy_context())
}

struct Harness {
    coordinator: DecisionCoordinator,
    backend: Arc<ScriptedBackend>,
    clock: Arc<ManualClock>,
    power: tokio::sync::mpsc::UnboundedReceiver<PowerMode>,
}

fn harness(providers: Vec<ProviderRecord>) -> Harness {
    let backend = ScriptedBackend::new();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap()));
    let (signal, power) = ChannelPowerSignal::channel();

    let coordinator = DecisionCoordinator::builder()
        .registry(providers.into_iter().collect::<ProviderRegistry>())
        .traits(CognitiveTraits::default())
        .router(BackendRouter::with_fallback(backend.clone()))
        .balance_source(Arc::new(FixedBalance(10.0)))
        .scorer(Arc::new(FixedScorer(1.0)))
        .signal(Arc::new(signal))
        .clock(clock.clone())
        .build()
        .unwrap();

    Harness {
        coordinator,
        backend,
        clock,
        power,
    }
}

async fn trip_into_survival(coordinator: &DecisionCoordinator) -> CycleOutcome {
    for _ in 0..4 {
        let outcome = coordinator.run_cycle(request()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Retry { .. }));
    }
    coordinator.run_cycle(request()).await.unwrap()
}

#[tokio::test]
async fn test_successful_cycle_updates_everything() {
    let h = harness(vec![free("local", 0.5)]);

    let outcome = h.coordinator.run_cycle(request()).await.unwrap();
    match outcome {
        CycleOutcome::Completed {
            provider, content, ..
        } => {
            assert_eq!(provider, "local");
            assert_eq!(content, "ok");
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let history = h.coordinator.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].actual_cost, Some(0.0));
    assert_eq!(h.coordinator.spend().calls, 1);
    assert_eq!(h.coordinator.provider_spend("local").unwrap().calls, 1);
    assert_eq!(h.coordinator.status().failed_calls, 0);

    // Quality EMA: 0.5 * 0.9 + 1.0 * 0.1
    let record = h.coordinator.provider("local").unwrap();
    assert!((record.quality_score - 0.55).abs() < 1e-9);
    assert_eq!(h.coordinator.consecutive_failures(), 0);
}

#[tokio::test]
async fn test_no_provider_retries_then_enters_survival() {
    let mut h = harness(vec![]);

    let mut delays = Vec::new();
    for expected in 1..=4 {
        match h.coordinator.run_cycle(request()).await.unwrap() {
            CycleOutcome::Retry { attempt, delay, cause } => {
                assert_eq!(attempt, expected);
                assert!(cause.contains("No provider"));
                delays.push(delay);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8)
        ]
    );

    match h.coordinator.run_cycle(request()).await.unwrap() {
        CycleOutcome::Survival(decision) => {
            assert_eq!(decision.action, SurvivalAction::Rest);
            assert_eq!(decision.priority, Some(4));
            assert_eq!(decision.cycle, 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(h.coordinator.survival_status().active);
    assert_eq!(h.power.try_recv().unwrap(), PowerMode::PowerSave);
}

#[tokio::test]
async fn test_network_failures_trip_provider_then_survival() {
    let h = harness(vec![free("flaky", 0.5)]);
    h.backend
        .script("flaky", vec![Step::Network, Step::Network, Step::Network]);

    for _ in 0..3 {
        let outcome = h.coordinator.run_cycle(request()).await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Retry { .. }));
    }
    let flaky = h.coordinator.provider("flaky").unwrap();
    assert!(!flaky.available);
    assert_eq!(flaky.consecutive_failures, 3);
    assert_eq!(h.coordinator.status().failed_calls, 3);
    assert!(h.coordinator.provider_spend("flaky").is_none());

    let fourth = h.coordinator.run_cycle(request()).await.unwrap();
    assert!(matches!(fourth, CycleOutcome::Retry { attempt: 4, .. }));
    assert_eq!(h.backend.calls().len(), 3);

    let fifth = h.coordinator.run_cycle(request()).await.unwrap();
    assert!(matches!(fifth, CycleOutcome::Survival(_)));
}

#[tokio::test]
async fn test_defect_propagates_without_counting() {
    let h = harness(vec![free("local", 0.5)]);
    h.backend.script("local", vec![Step::Defect]);

    let result = h.coordinator.run_cycle(request()).await;
    match result {
        Err(CoordinatorError::Defect(ProviderError::Other(err))) => {
            assert!(err.to_string().contains("malformed"));
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(h.coordinator.consecutive_failures(), 0);
    assert!(!h.coordinator.survival_status().active);
}

#[tokio::test]
async fn test_rejection_reselects_in_same_cycle() {
    let h = harness(vec![free("alpha", 0.9), free("beta", 0.5)]);
    h.backend.script("alpha", vec![Step::Reject]);

    let outcome = h.coordinator.run_cycle(request()).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed { ref provider, .. } if provider == "beta"));
    assert_eq!(h.backend.calls(), vec!["alpha", "beta"]);
    assert_eq!(h.coordinator.provider("alpha").unwrap().consecutive_failures, 1);
    assert_eq!(h.coordinator.history().len(), 2);
    assert_eq!(h.coordinator.consecutive_failures(), 0);
}

#[tokio::test]
async fn test_over_budget_quote_falls_back_to_free() {
    let h = harness(vec![paid("premium", 0.001, 0.95), free("local", 0.5)]);
    h.backend.script("premium", vec![Step::OverBudget]);

    let outcome = h.coordinator.run_cycle(request()).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed { ref provider, .. } if provider == "local"));
    assert_eq!(h.backend.calls(), vec!["premium", "local"]);
}

#[tokio::test]
async fn test_budget_gate_keeps_standard_work_free() {
    let h = harness(vec![paid("premium", 0.001, 0.95), free("local", 0.5)]);
    let gated = request().with_budget(BudgetGate {
        task_budget: TaskBudget::new(1.0, 0.5),
        complexity: TaskComplexity::Standard,
        daily_cost: None,
    });

    let outcome = h.coordinator.run_cycle(gated).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed { ref provider, .. } if provider == "local"));
    assert_eq!(h.backend.calls(), vec!["local"]);
}

#[tokio::test]
async fn test_budget_gate_approval_carries_model_and_ceiling() {
    let h = harness(vec![paid("premium", 0.001, 0.95), free("local", 0.5)]);
    let task_budget = TaskBudget::new(0.1, 0.1);
    let gated = request().with_budget(BudgetGate {
        task_budget,
        complexity: TaskComplexity::Complex,
        daily_cost: None,
    });

    let outcome = h.coordinator.run_cycle(gated).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed { .. }));

    let options = h.backend.options();
    assert_eq!(h.backend.calls(), vec!["premium"]);
    assert_eq!(options[0].max_cost, Some(task_budget.allotted()));
    assert_eq!(options[0].model.as_deref(), Some("balanced"));
}

#[tokio::test]
async fn test_budget_gate_decline_requests_free_model() {
    let h = harness(vec![paid("premium", 0.001, 0.95), free("local", 0.5)]);
    let gated = request().with_budget(BudgetGate {
        task_budget: TaskBudget::new(1.0, 0.5),
        complexity: TaskComplexity::Complex,
        daily_cost: None,
    });

    h.coordinator.run_cycle(gated).await.unwrap();

    let options = h.backend.options();
    assert_eq!(h.backend.calls(), vec!["local"]);
    assert_eq!(options[0].max_cost, Some(0.0));
    assert_eq!(options[0].model.as_deref(), Some("local-large"));
}

#[tokio::test]
async fn test_runway_tier_caps_gated_complexity() {
    let h = harness(vec![paid("premium", 0.001, 0.95), free("local", 0.5)]);
    let gate = BudgetGate {
        task_budget: TaskBudget::new(0.1, 0.1),
        complexity: TaskComplexity::Complex,
        daily_cost: Some(2.0),
    };

    // 10.0 / 2.0 = 5 days of runway: economy tier caps the task at standard
    h.coordinator
        .run_cycle(request().with_budget(gate))
        .await
        .unwrap();
    let economy = h.backend.options();
    assert_eq!(h.backend.calls(), vec!["local"]);
    assert_eq!(economy[0].max_cost, Some(0.0));
    assert_eq!(economy[0].model.as_deref(), Some("local-small"));

    // 20 days of runway: standard tier lets complex work pay
    let roomy = BudgetGate {
        daily_cost: Some(0.5),
        ..gate
    };
    h.coordinator
        .run_cycle(request().with_budget(roomy))
        .await
        .unwrap();
    let options = h.backend.options();
    assert_eq!(options[1].model.as_deref(), Some("balanced"));
    assert_eq!(options[1].max_cost, Some(gate.task_budget.allotted()));
}

#[tokio::test]
async fn test_over_budget_quote_switches_gated_model_to_free() {
    let h = harness(vec![paid("premium", 0.001, 0.95), free("local", 0.5)]);
    h.backend.script("premium", vec![Step::OverBudget]);
    let gated = request().with_budget(BudgetGate {
        task_budget: TaskBudget::new(0.1, 0.1),
        complexity: TaskComplexity::Complex,
        daily_cost: None,
    });

    h.coordinator.run_cycle(gated).await.unwrap();

    let options = h.backend.options();
    assert_eq!(h.backend.calls(), vec!["premium", "local"]);
    assert_eq!(options[0].model.as_deref(), Some("balanced"));
    assert_eq!(options[1].max_cost, Some(0.0));
    assert_eq!(options[1].model.as_deref(), Some("local-large"));
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout_is_cognitive() {
    let h = harness(vec![free("slow", 0.5)]);
    h.backend
        .script("slow", vec![Step::Hang(Duration::from_secs(120))]);

    match h.coordinator.run_cycle(request()).await.unwrap() {
        CycleOutcome::Retry { attempt, cause, .. } => {
            assert_eq!(attempt, 1);
            assert!(cause.contains("Timeout"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_cycles_fail_fast() {
    let h = harness(vec![free("slow", 0.5)]);
    h.backend
        .script("slow", vec![Step::Hang(Duration::from_secs(5))]);

    let first = h.coordinator.run_cycle(request());
    let second = async {
        tokio::task::yield_now().await;
        h.coordinator.run_cycle(request()).await
    };
    let (first, second) = tokio::join!(first, second);

    assert!(matches!(first, Ok(CycleOutcome::Completed { .. })));
    assert!(matches!(second, Err(CoordinatorError::CycleInProgress)));
}

#[tokio::test]
async fn test_survival_probe_resumes_cognition() {
    let mut h = harness(vec![]);
    trip_into_survival(&h.coordinator).await;

    h.coordinator.register_provider(free("local", 0.5));

    // Cycle 2 never probes.
    let second = h.coordinator.run_cycle(request()).await.unwrap();
    assert!(matches!(second, CycleOutcome::Survival(ref d) if d.action == SurvivalAction::Rest));
    assert!(h.backend.calls().is_empty());

    let third = h.coordinator.run_cycle(request()).await.unwrap();
    match third {
        CycleOutcome::Survival(decision) => {
            assert_eq!(decision.action, SurvivalAction::ResumeCognition);
            assert_eq!(decision.provider.as_deref(), Some("local"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.coordinator.consecutive_failures(), 0);

    let resumed = h.coordinator.run_cycle(request()).await.unwrap();
    assert!(matches!(resumed, CycleOutcome::Completed { .. }));

    assert_eq!(h.power.try_recv().unwrap(), PowerMode::PowerSave);
    assert_eq!(h.power.try_recv().unwrap(), PowerMode::Normal);
}

#[tokio::test]
async fn test_starvation_is_terminal() {
    let h = harness(vec![]);
    trip_into_survival(&h.coordinator).await;

    h.clock.advance(Duration::from_secs(72 * 3600 + 1));
    let death = match h.coordinator.run_cycle(request()).await.unwrap() {
        CycleOutcome::Survival(decision) => decision,
        other => panic!("unexpected outcome {other:?}"),
    };
    assert_eq!(death.action, SurvivalAction::Die);
    assert_eq!(death.reason, SurvivalReason::CognitiveStarvation);

    h.coordinator.register_provider(free("late", 0.5));
    let again = h.coordinator.run_cycle(request()).await.unwrap();
    assert_eq!(again, CycleOutcome::Survival(death));
    assert!(h.coordinator.survival_status().terminated);
}

#[tokio::test]
async fn test_eth_critical_wins_in_survival() {
    let h = harness(vec![]);
    h.coordinator.force_survival("drill").unwrap();

    let starving = request().with_survival(SurvivalContext {
        balance: 0.2,
        gas_balance: 0.0001,
        estimated_days: 0.5,
        consecutive_failures: 5,
    });
    match h.coordinator.run_cycle(starving).await.unwrap() {
        CycleOutcome::Survival(decision) => {
            assert_eq!(decision.priority, Some(1));
            assert_eq!(decision.reason, SurvivalReason::EthCritical);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_health_probe_restores_tripped_provider() {
    let h = harness(vec![free("local", 0.5)]);
    for _ in 0..3 {
        h.coordinator
            .record_outcome("local", CallOutcome::failure())
            .unwrap();
    }
    assert!(!h.coordinator.provider("local").unwrap().available);

    // A success elsewhere does not bring it back.
    h.coordinator
        .record_outcome("local", CallOutcome::success())
        .unwrap();
    assert!(!h.coordinator.provider("local").unwrap().available);

    let restored = h.coordinator.probe_health().await.unwrap();
    assert_eq!(restored, vec!["local".to_string()]);

    let record = h.coordinator.provider("local").unwrap();
    assert!(record.available);
    assert_eq!(record.last_checked_at, Some(h.coordinator.now()));
}

#[tokio::test]
async fn test_unhealthy_provider_stays_out() {
    let h = harness(vec![free("local", 0.5)]);
    h.backend.healthy.store(false, Ordering::SeqCst);
    for _ in 0..3 {
        h.coordinator
            .record_outcome("local", CallOutcome::failure())
            .unwrap();
    }

    assert!(h.coordinator.probe_health().await.unwrap().is_empty());
    assert!(!h.coordinator.provider("local").unwrap().available);
}

#[tokio::test]
async fn test_attempt_recovery_outside_cadence() {
    let h = harness(vec![]);
    h.coordinator.force_survival("drill").unwrap();
    assert_eq!(h.coordinator.attempt_recovery().await.unwrap(), None);

    h.coordinator.register_provider(free("local", 0.5));
    let decision = h.coordinator.attempt_recovery().await.unwrap().unwrap();
    assert_eq!(decision.action, SurvivalAction::ResumeCognition);
    assert!(!h.coordinator.survival_status().active);
}
