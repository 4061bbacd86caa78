//! Decision coordinator: one reasoning cycle at a time.
//!
//! Each cycle either delegates entirely to the survival machine (while it
//! is active) or takes the normal path:
//! 1. Budget gate (optional): may restrict the cycle to free providers
//! 2. Selection against the cached balance
//! 3. Backend call under a timeout, routed by protocol
//! 4. Classification of the result:
//!    - success: reputation, spend and history updated, failure gate reset
//!    - rejection / over-budget quote: reselect within the same cycle
//!    - cognitive failure: counted; retry below threshold, survival at it
//!    - anything else: propagated unchanged as a defect

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cognis_core::durations::humane;
use cognis_core::{
    budget_strategy, BudgetEvaluator, CallOutcome, CognitiveTraits, Criticality, NoopSignal,
    PowerSaveSignal, ProviderRecord, ProviderRegistry, QualityScorer, MarkupHeuristicScorer,
    ReputationTracker, ReputationUpdate, Selection, SelectionEngine, SelectionRequest,
    SurvivalAction, SurvivalContext, SurvivalDecision, SurvivalMachine, SurvivalStatus,
    TaskBudget, TaskComplexity, TraitsPatch,
};

use crate::balance::{BalanceCache, BalanceSource};
use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::history::{DecisionHistory, DecisionRecord};
use crate::providers::{BackendRouter, CallOptions, ProviderError};
use crate::resilience::{CognitiveFailureGate, GateVerdict, SpendLedger, SpendSummary};
use crate::CoordinatorError;

/// Budget inputs for a cycle that may pay for reasoning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetGate {
    pub task_budget: TaskBudget,
    pub complexity: TaskComplexity,

    /// Daily burn; when present the runway tier caps the complexity
    pub daily_cost: Option<f64>,
}

/// One unit of work for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRequest {
    pub prompt: String,
    pub criticality: Criticality,
    pub estimated_tokens: Option<u32>,
    pub survival: SurvivalContext,
    pub budget: Option<BudgetGate>,
}

impl CycleRequest {
    pub fn new(prompt: impl Into<String>, criticality: Criticality) -> Self {
        Self {
            prompt: prompt.into(),
            criticality,
            estimated_tokens: None,
            survival: SurvivalContext::default(),
            budget: None,
        }
    }

    pub fn with_tokens(mut self, estimated_tokens: u32) -> Self {
        self.estimated_tokens = Some(estimated_tokens);
        self
    }

    pub fn with_survival(mut self, survival: SurvivalContext) -> Self {
        self.survival = survival;
        self
    }

    pub fn with_budget(mut self, budget: BudgetGate) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// What a cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A provider answered
    Completed {
        provider: String,
        content: String,
        #[serde(with = "humane")]
        latency: Duration,
        actual_cost: f64,
    },

    /// Reasoning was unreachable; try again after `delay`
    Retry {
        attempt: u32,
        #[serde(with = "humane")]
        delay: Duration,
        cause: String,
    },

    /// Degraded-mode decision
    Survival(SurvivalDecision),
}

/// Dashboard view of the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorStatus {
    pub survival: SurvivalStatus,
    pub consecutive_failures: u32,
    pub history_len: usize,
    pub spend: SpendSummary,

    /// Dispatched calls that failed with a cognitive error
    pub failed_calls: u32,
    pub providers: usize,
    pub available_providers: usize,
}

/// Owns one agent's registry, reputation, survival machine and history.
pub struct DecisionCoordinator {
    registry: RwLock<ProviderRegistry>,
    traits: RwLock<CognitiveTraits>,
    engine: SelectionEngine,
    tracker: ReputationTracker,
    evaluator: BudgetEvaluator,
    survival: Mutex<SurvivalMachine>,
    balance: BalanceCache,
    router: BackendRouter,
    scorer: Arc<dyn QualityScorer>,
    history: DecisionHistory,
    spend: SpendLedger,
    gate: CognitiveFailureGate,
    cycle_guard: tokio::sync::Mutex<()>,
    clock: Arc<dyn Clock>,
    config: RuntimeConfig,
}

impl std::fmt::Debug for DecisionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCoordinator")
            .field("providers", &self.registry.read().len())
            .field("router", &self.router)
            .field("failures", &self.gate.failures())
            .field("config", &self.config)
            .finish()
    }
}

impl DecisionCoordinator {
    /// Start building a coordinator.
    pub fn builder() -> DecisionCoordinatorBuilder {
        DecisionCoordinatorBuilder::new()
    }

    /// Run one cycle.
    ///
    /// Overlapping calls fail fast with [`CoordinatorError::CycleInProgress`].
    pub async fn run_cycle(&self, request: CycleRequest) -> Result<CycleOutcome, CoordinatorError> {
        let _guard = self
            .cycle_guard
            .try_lock()
            .map_err(|_| CoordinatorError::CycleInProgress)?;

        let balance = self.balance.get().await?;

        let degraded = {
            let survival = self.survival.lock();
            survival.is_active() || survival.is_terminated()
        };
        if degraded {
            let decision = self.survival_cycle(&request.survival, balance)?;
            return Ok(CycleOutcome::Survival(decision));
        }

        match self.normal_path(&request, balance).await {
            Ok(outcome) => {
                self.gate.reset();
                Ok(outcome)
            }
            Err(err) if err.is_cognitive() => self.on_cognitive_failure(err, &request.survival, balance),
            Err(err) => {
                tracing::error!(error = %err, "Non-cognitive provider failure, propagating");
                Err(CoordinatorError::Defect(err))
            }
        }
    }

    async fn normal_path(&self, request: &CycleRequest, balance: f64) -> Result<CycleOutcome, ProviderError> {
        let tokens = request
            .estimated_tokens
            .unwrap_or(self.config.default_estimated_tokens);

        let mut free_only = false;
        let mut max_cost = None;
        let mut model = None;
        let mut gated_complexity = None;
        if let Some(gate) = &request.budget {
            let complexity = match gate.daily_cost {
                Some(daily_cost) => budget_strategy(balance, daily_cost).cap(gate.complexity),
                None => gate.complexity,
            };
            let evaluation = self.evaluator.evaluate(
                &gate.task_budget,
                complexity,
                request.prompt.len(),
                balance,
                request.criticality,
            );
            tracing::debug!(
                should_pay = evaluation.should_pay,
                model = ?evaluation.model,
                reason = %evaluation.reason,
                "Budget gate evaluated"
            );
            if evaluation.should_pay {
                max_cost = Some(gate.task_budget.allotted());
            } else {
                free_only = true;
                max_cost = Some(0.0);
            }
            model = evaluation.model;
            gated_complexity = Some(complexity);
        }

        let mut excluded: BTreeSet<String> = BTreeSet::new();
        loop {
            let selection = self
                .select(request.criticality, tokens, free_only, balance, &excluded)
                .ok_or(ProviderError::NoProviderAvailable)?;
            let provider = selection.provider.clone();
            let backend = self.router.route(&provider)?;

            let options = CallOptions {
                estimated_tokens: tokens,
                max_cost,
                model: model.clone(),
                timeout: self.config.call_timeout,
            };

            let started = tokio::time::Instant::now();
            let result = match tokio::time::timeout(
                options.timeout,
                backend.call(&provider, &request.prompt, &options),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(options.timeout)),
            };
            let latency = started.elapsed();

            match result {
                Ok(response) => {
                    let quality = self.scorer.score(&request.prompt, &response.content);
                    self.apply_outcome(
                        &provider.id,
                        CallOutcome::success()
                            .with_latency(latency.as_secs_f64() * 1000.0)
                            .with_quality(quality),
                    );

                    let billed_tokens = match response.usage.total() {
                        0 => tokens,
                        total => total,
                    };
                    let actual_cost = response
                        .actual_cost
                        .unwrap_or_else(|| provider.estimate_cost(billed_tokens));
                    self.spend
                        .record(&provider.id, &response.usage, selection.estimated_cost, actual_cost);
                    self.push_history(&selection, balance, Some(actual_cost));

                    tracing::info!(
                        provider = %provider.id,
                        strategy = %selection.strategy,
                        latency_ms = latency.as_millis() as u64,
                        actual_cost,
                        quality,
                        "Reasoning call completed"
                    );
                    return Ok(CycleOutcome::Completed {
                        provider: provider.id,
                        content: response.content,
                        latency,
                        actual_cost,
                    });
                }
                Err(ProviderError::Rejected { reason, .. }) => {
                    tracing::warn!(provider = %provider.id, reason = %reason, "Provider rejected request, reselecting");
                    self.apply_outcome(&provider.id, CallOutcome::failure());
                    self.push_history(&selection, balance, None);
                    excluded.insert(provider.id);
                }
                Err(ProviderError::BudgetExceeded { quoted, ceiling }) => {
                    tracing::warn!(
                        provider = %provider.id,
                        quoted,
                        ceiling,
                        "Quote over ceiling, reselecting among free providers"
                    );
                    self.push_history(&selection, balance, None);
                    free_only = true;
                    max_cost = Some(0.0);
                    if let Some(complexity) = gated_complexity {
                        model = self
                            .evaluator
                            .catalog()
                            .free_model_for(complexity)
                            .map(|spec| spec.id.clone());
                    }
                    excluded.insert(provider.id);
                }
                Err(err) => {
                    if err.is_cognitive() {
                        self.apply_outcome(&provider.id, CallOutcome::failure());
                        self.spend.record_failure();
                    }
                    self.push_history(&selection, balance, None);
                    return Err(err);
                }
            }
        }
    }

    fn select(
        &self,
        criticality: Criticality,
        tokens: u32,
        free_only: bool,
        balance: f64,
        excluded: &BTreeSet<String>,
    ) -> Option<Selection> {
        let providers: Vec<ProviderRecord> = self
            .registry
            .read()
            .list_available()
            .into_iter()
            .filter(|p| !excluded.contains(&p.id))
            .collect();
        let traits = self.traits();

        let mut request = SelectionRequest::new(criticality, tokens);
        if free_only {
            request = request.free_only();
        }
        self.engine.select(&request, &traits, balance, &providers)
    }

    fn on_cognitive_failure(
        &self,
        err: ProviderError,
        context: &SurvivalContext,
        balance: f64,
    ) -> Result<CycleOutcome, CoordinatorError> {
        match self.gate.record_failure() {
            GateVerdict::Retry { attempt, delay } => Ok(CycleOutcome::Retry {
                attempt,
                delay,
                cause: err.to_string(),
            }),
            GateVerdict::Tripped { failures } => {
                tracing::warn!(failures, error = %err, "Handing off to survival mode");
                let now = self.clock.now();
                self.survival.lock().activate(err.to_string(), now)?;
                let decision = self.survival_cycle(context, balance)?;
                Ok(CycleOutcome::Survival(decision))
            }
        }
    }

    /// The caller's snapshot with the failure count this coordinator owns.
    fn survival_snapshot(&self, context: &SurvivalContext) -> SurvivalContext {
        SurvivalContext {
            consecutive_failures: self.gate.failures(),
            ..*context
        }
    }

    fn survival_cycle(&self, context: &SurvivalContext, balance: f64) -> Result<SurvivalDecision, CoordinatorError> {
        let context = self.survival_snapshot(context);
        let now = self.clock.now();
        let providers = self.registry.read().list_available();
        let traits = self.traits();
        let request = SelectionRequest::new(Criticality::Low, self.config.default_estimated_tokens);
        let engine = &self.engine;
        let mut probe = || {
            engine
                .select(&request, &traits, balance, &providers)
                .map(|selection| selection.provider.id)
        };

        let decision = self.survival.lock().cycle(&context, now, &mut probe)?;
        tracing::debug!(
            consecutive_failures = context.consecutive_failures,
            action = %decision.action,
            "Survival cycle ran"
        );
        if decision.action == SurvivalAction::ResumeCognition {
            self.gate.reset();
        }
        Ok(decision)
    }

    fn apply_outcome(&self, provider_id: &str, outcome: CallOutcome) {
        if let Err(e) = self.record_outcome(provider_id, outcome) {
            tracing::warn!(provider = %provider_id, error = %e, "Provider removed during call");
        }
    }

    fn push_history(&self, selection: &Selection, balance: f64, actual_cost: Option<f64>) {
        self.history.push(DecisionRecord {
            timestamp: self.clock.now(),
            provider_id: selection.provider.id.clone(),
            strategy: selection.strategy,
            source: selection.source,
            estimated_cost: selection.estimated_cost,
            actual_cost,
            traits: self.traits(),
            balance,
        });
    }

    /// Apply an externally observed call outcome.
    pub fn record_outcome(
        &self,
        provider_id: &str,
        outcome: CallOutcome,
    ) -> Result<ReputationUpdate, CoordinatorError> {
        let mut registry = self.registry.write();
        Ok(self.tracker.record_outcome(&mut registry, provider_id, outcome)?)
    }

    /// Health-check every provider out of rotation and re-enable the
    /// healthy ones. Returns the ids brought back.
    pub async fn probe_health(&self) -> Result<Vec<String>, CoordinatorError> {
        let targets: Vec<ProviderRecord> = self
            .registry
            .read()
            .all()
            .filter(|p| !p.is_selectable())
            .cloned()
            .collect();

        let mut restored = Vec::new();
        for provider in targets {
            let backend = match self.router.route(&provider) {
                Ok(backend) => backend,
                Err(e) => {
                    tracing::warn!(provider = %provider.id, error = %e, "Skipping health check");
                    continue;
                }
            };

            let healthy = tokio::time::timeout(self.config.call_timeout, backend.health_check(&provider))
                .await
                .unwrap_or(false);

            let now = self.clock.now();
            self.registry
                .write()
                .record_health_check(&provider.id, healthy, now)?;
            if healthy {
                restored.push(provider.id);
            }
        }
        Ok(restored)
    }

    /// Operator escape hatch: enter survival mode now.
    pub fn force_survival(&self, reason: &str) -> Result<bool, CoordinatorError> {
        let now = self.clock.now();
        Ok(self.survival.lock().force_activate(reason, now)?)
    }

    /// Operator escape hatch: probe for recovery outside the cadence.
    pub async fn attempt_recovery(&self) -> Result<Option<SurvivalDecision>, CoordinatorError> {
        let balance = self.balance.get().await?;
        let providers = self.registry.read().list_available();
        let traits = self.traits();
        let request = SelectionRequest::new(Criticality::Low, self.config.default_estimated_tokens);
        let engine = &self.engine;
        let mut probe = || {
            engine
                .select(&request, &traits, balance, &providers)
                .map(|selection| selection.provider.id)
        };

        let decision = self.survival.lock().attempt_recovery(&mut probe)?;
        if decision.is_some() {
            self.gate.reset();
        }
        Ok(decision)
    }

    /// Owned copy of the current traits.
    pub fn traits(&self) -> CognitiveTraits {
        self.traits.read().clone()
    }

    /// Merge a partial trait update; returns the new traits.
    pub fn update_traits(&self, patch: &TraitsPatch) -> CognitiveTraits {
        let mut traits = self.traits.write();
        traits.apply(patch);
        tracing::info!(traits = ?*traits, "Traits updated");
        traits.clone()
    }

    /// Add or replace a provider.
    pub fn register_provider(&self, provider: ProviderRecord) -> Option<ProviderRecord> {
        self.registry.write().register(provider)
    }

    /// Remove a provider.
    pub fn unregister_provider(&self, id: &str) -> bool {
        self.registry.write().unregister(id)
    }

    /// Snapshot of one provider.
    pub fn provider(&self, id: &str) -> Option<ProviderRecord> {
        self.registry.read().get(id).cloned()
    }

    /// Snapshot of every provider.
    pub fn providers(&self) -> Vec<ProviderRecord> {
        self.registry.read().all().cloned().collect()
    }

    /// Recent routing decisions, oldest first.
    pub fn history(&self) -> Vec<DecisionRecord> {
        self.history.entries()
    }

    /// Cumulative spend.
    pub fn spend(&self) -> SpendSummary {
        self.spend.summary()
    }

    /// Cumulative spend with one provider.
    pub fn provider_spend(&self, provider_id: &str) -> Option<SpendSummary> {
        self.spend.provider_summary(provider_id)
    }

    /// Survival dashboard view at the current time.
    pub fn survival_status(&self) -> SurvivalStatus {
        self.survival.lock().status(self.clock.now())
    }

    /// Combined dashboard view.
    pub fn status(&self) -> CoordinatorStatus {
        let (providers, available_providers) = {
            let registry = self.registry.read();
            (registry.len(), registry.list_available().len())
        };
        CoordinatorStatus {
            survival: self.survival_status(),
            consecutive_failures: self.gate.failures(),
            history_len: self.history.len(),
            spend: self.spend.summary(),
            failed_calls: self.spend.failed_calls(),
            providers,
            available_providers,
        }
    }

    /// Consecutive cognitive failures since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.gate.failures()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

/// Builder for DecisionCoordinator.
pub struct DecisionCoordinatorBuilder {
    registry: ProviderRegistry,
    traits: CognitiveTraits,
    config: RuntimeConfig,
    router: BackendRouter,
    balance_source: Option<Arc<dyn BalanceSource>>,
    scorer: Arc<dyn QualityScorer>,
    signal: Arc<dyn PowerSaveSignal>,
    clock: Arc<dyn Clock>,
    engine: SelectionEngine,
    evaluator: BudgetEvaluator,
}

impl DecisionCoordinatorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::new(),
            traits: CognitiveTraits::default(),
            config: RuntimeConfig::default(),
            router: BackendRouter::new(),
            balance_source: None,
            scorer: Arc::new(MarkupHeuristicScorer::default()),
            signal: Arc::new(NoopSignal),
            clock: Arc::new(SystemClock),
            engine: SelectionEngine::default(),
            evaluator: BudgetEvaluator::default(),
        }
    }

    /// Set the starting providers.
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the starting traits.
    pub fn traits(mut self, traits: CognitiveTraits) -> Self {
        self.traits = traits.clamped();
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the backend router.
    pub fn router(mut self, router: BackendRouter) -> Self {
        self.router = router;
        self
    }

    /// Set the balance source.
    pub fn balance_source(mut self, source: Arc<dyn BalanceSource>) -> Self {
        self.balance_source = Some(source);
        self
    }

    /// Set the response quality scorer.
    pub fn scorer(mut self, scorer: Arc<dyn QualityScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Set the power-save signal.
    pub fn signal(mut self, signal: Arc<dyn PowerSaveSignal>) -> Self {
        self.signal = signal;
        self
    }

    /// Set the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the selection engine.
    pub fn engine(mut self, engine: SelectionEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Set the budget evaluator.
    pub fn evaluator(mut self, evaluator: BudgetEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Build the coordinator.
    pub fn build(self) -> Result<DecisionCoordinator, CoordinatorError> {
        let source = self
            .balance_source
            .ok_or_else(|| CoordinatorError::NotConfigured("No balance source set".to_string()))?;

        let survival = SurvivalMachine::new(self.config.survival.clone()).with_signal(self.signal);

        Ok(DecisionCoordinator {
            registry: RwLock::new(self.registry),
            traits: RwLock::new(self.traits),
            engine: self.engine,
            tracker: ReputationTracker::default(),
            evaluator: self.evaluator,
            survival: Mutex::new(survival),
            balance: BalanceCache::new(source, self.config.balance_ttl),
            router: self.router,
            scorer: self.scorer,
            history: DecisionHistory::new(self.config.history_capacity),
            spend: SpendLedger::new(),
            gate: CognitiveFailureGate::new(self.config.failure_gate.clone()),
            cycle_guard: tokio::sync::Mutex::new(()),
            clock: self.clock,
            config: self.config,
        })
    }
}

impl Default for DecisionCoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
