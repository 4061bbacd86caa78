//! Survival state machine: deterministic decisions without reasoning.
//!
//! Active only while no provider can be selected. Lifecycle:
//!
//! ```text
//! INACTIVE --activate--> ACTIVE --probe finds provider--> INACTIVE
//!                          |
//!                          +--starvation timeout--> TERMINATED (absorbing)
//! ```
//!
//! Each active cycle evaluates, in order:
//! 1. Recovery probe (every Nth cycle)
//! 2. Starvation timeout
//! 3. Survival priority against the fresh context:
//!    P1 gas exhausted, P2 terminal runway, P3 low runway, P4 rest.

mod config;
mod decision;

pub use config::SurvivalConfig;
pub use decision::{DeathRecord, SurvivalAction, SurvivalDecision, SurvivalReason};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::signals::{NoopSignal, PowerMode, PowerSaveSignal};
use crate::types::SurvivalContext;

/// Errors from the survival machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurvivalError {
    #[error("Survival mode is not active")]
    NotActive,

    #[error("Agent has terminated")]
    Terminated,
}

/// Bookkeeping for one degraded-mode episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstinctState {
    pub activated_at: DateTime<Utc>,
    pub consecutive_cycles: u32,
    pub recovery_attempts: u32,
    pub last_provider_error: Option<String>,
}

/// Where the machine is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum InstinctPhase {
    Inactive,
    Active(InstinctState),
    Terminated(DeathRecord),
}

/// Read-only dashboard projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalStatus {
    pub active: bool,
    pub terminated: bool,
    pub duration_ms: u64,
    pub cycles: u32,
    pub recovery_attempts: u32,

    /// Projected death time, once most of the timeout has elapsed
    pub estimated_death_time: Option<DateTime<Utc>>,
}

/// Asks whether cognition is reachable again.
pub trait RecoveryProbe {
    /// Return the id of a usable provider, if any.
    fn probe(&mut self) -> Option<String>;
}

impl<F> RecoveryProbe for F
where
    F: FnMut() -> Option<String>,
{
    fn probe(&mut self) -> Option<String> {
        self()
    }
}

/// The degraded-mode decision process. One per agent.
pub struct SurvivalMachine {
    config: SurvivalConfig,
    phase: InstinctPhase,
    signal: Arc<dyn PowerSaveSignal>,
}

impl fmt::Debug for SurvivalMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurvivalMachine")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .finish()
    }
}

impl Default for SurvivalMachine {
    fn default() -> Self {
        Self::new(SurvivalConfig::default())
    }
}

impl SurvivalMachine {
    /// Create an inactive machine.
    pub fn new(config: SurvivalConfig) -> Self {
        Self {
            config,
            phase: InstinctPhase::Inactive,
            signal: Arc::new(NoopSignal),
        }
    }

    /// Route power mode changes to `signal`.
    pub fn with_signal(mut self, signal: Arc<dyn PowerSaveSignal>) -> Self {
        self.signal = signal;
        self
    }

    pub fn config(&self) -> &SurvivalConfig {
        &self.config
    }

    pub fn phase(&self) -> &InstinctPhase {
        &self.phase
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, InstinctPhase::Active(_))
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self.phase, InstinctPhase::Terminated(_))
    }

    /// Enter degraded mode after repeated cognitive failures.
    ///
    /// Returns `false` if already active.
    pub fn activate(
        &mut self,
        error: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, SurvivalError> {
        match self.phase {
            InstinctPhase::Terminated(_) => Err(SurvivalError::Terminated),
            InstinctPhase::Active(_) => Ok(false),
            InstinctPhase::Inactive => {
                let error = error.into();
                tracing::warn!(error = %error, "Entering survival mode");
                self.phase = InstinctPhase::Active(InstinctState {
                    activated_at: now,
                    consecutive_cycles: 0,
                    recovery_attempts: 0,
                    last_provider_error: Some(error),
                });
                self.signal.notify(PowerMode::PowerSave);
                Ok(true)
            }
        }
    }

    /// Operator escape hatch: enter degraded mode regardless of failures.
    pub fn force_activate(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<bool, SurvivalError> {
        let reason = reason.into();
        tracing::info!(reason = %reason, "Survival mode forced");
        self.activate(format!("forced: {reason}"), now)
    }

    /// Run one degraded-mode cycle.
    ///
    /// On a terminated machine this re-emits the death decision.
    pub fn cycle(
        &mut self,
        context: &SurvivalContext,
        now: DateTime<Utc>,
        probe: &mut dyn RecoveryProbe,
    ) -> Result<SurvivalDecision, SurvivalError> {
        let state = match &mut self.phase {
            InstinctPhase::Active(state) => state,
            InstinctPhase::Terminated(record) => return Ok(record.decision.clone()),
            InstinctPhase::Inactive => return Err(SurvivalError::NotActive),
        };

        state.consecutive_cycles += 1;
        let cycle = state.consecutive_cycles;

        if self.config.probe_every_cycles > 0 && cycle % self.config.probe_every_cycles == 0 {
            state.recovery_attempts += 1;
            if let Some(provider) = probe.probe() {
                return Ok(self.recover(provider, cycle));
            }
            tracing::debug!(cycle, "Recovery probe found no provider");
        }

        let elapsed = (now - state.activated_at).to_std().unwrap_or_default();
        if elapsed > self.config.starvation_timeout {
            return Ok(self.die(now, cycle));
        }

        let decision = self.prioritize(context, cycle);
        tracing::info!(
            cycle,
            action = %decision.action,
            priority = ?decision.priority,
            reason = %decision.reason,
            "Survival decision"
        );
        Ok(decision)
    }

    /// Operator escape hatch: probe for recovery outside the cadence.
    ///
    /// Returns the resume decision when a provider was found.
    pub fn attempt_recovery(
        &mut self,
        probe: &mut dyn RecoveryProbe,
    ) -> Result<Option<SurvivalDecision>, SurvivalError> {
        let state = match &mut self.phase {
            InstinctPhase::Active(state) => state,
            InstinctPhase::Terminated(_) => return Err(SurvivalError::Terminated),
            InstinctPhase::Inactive => return Err(SurvivalError::NotActive),
        };

        state.recovery_attempts += 1;
        let cycle = state.consecutive_cycles;
        Ok(probe.probe().map(|provider| self.recover(provider, cycle)))
    }

    /// Dashboard view derived from the current phase.
    pub fn status(&self, now: DateTime<Utc>) -> SurvivalStatus {
        match &self.phase {
            InstinctPhase::Inactive => SurvivalStatus {
                active: false,
                terminated: false,
                duration_ms: 0,
                cycles: 0,
                recovery_attempts: 0,
                estimated_death_time: None,
            },
            InstinctPhase::Active(state) => {
                let elapsed = (now - state.activated_at).to_std().unwrap_or_default();
                let warning = self
                    .config
                    .starvation_timeout
                    .mul_f64(self.config.warning_fraction());
                let estimated_death_time = if elapsed > warning {
                    chrono::Duration::from_std(self.config.starvation_timeout)
                        .ok()
                        .map(|timeout| state.activated_at + timeout)
                } else {
                    None
                };
                SurvivalStatus {
                    active: true,
                    terminated: false,
                    duration_ms: elapsed.as_millis() as u64,
                    cycles: state.consecutive_cycles,
                    recovery_attempts: state.recovery_attempts,
                    estimated_death_time,
                }
            }
            InstinctPhase::Terminated(record) => SurvivalStatus {
                active: false,
                terminated: true,
                duration_ms: (record.died_at - record.activated_at)
                    .to_std()
                    .unwrap_or_default()
                    .as_millis() as u64,
                cycles: record.cycles,
                recovery_attempts: record.recovery_attempts,
                estimated_death_time: Some(record.died_at),
            },
        }
    }

    fn prioritize(&self, context: &SurvivalContext, cycle: u32) -> SurvivalDecision {
        let config = &self.config;

        if context.gas_balance < config.gas_critical_floor {
            let mut decision =
                SurvivalDecision::new(SurvivalAction::Rest, Some(1), SurvivalReason::EthCritical, cycle);
            decision.next_probe_in = Some(config.gas_rest_probe_delay);
            return decision;
        }

        if context.estimated_days < config.terminal_runway_days {
            let mut decision = SurvivalDecision::new(
                SurvivalAction::FinalizeLegacy,
                Some(2),
                SurvivalReason::RunwayTerminal,
                cycle,
            );
            decision.prepare_for_death = true;
            return decision;
        }

        if context.estimated_days < config.conservation_runway_days {
            let mut decision = SurvivalDecision::new(
                SurvivalAction::ResourceConservation,
                Some(3),
                SurvivalReason::RunwayLow,
                cycle,
            );
            decision.heartbeat_interval = Some(config.conservation_heartbeat);
            return decision;
        }

        let mut decision = SurvivalDecision::new(
            SurvivalAction::Rest,
            Some(4),
            SurvivalReason::CognitiveStarvation,
            cycle,
        );
        decision.heartbeat_interval = Some(config.rest_heartbeat);
        decision
    }

    fn recover(&mut self, provider: String, cycle: u32) -> SurvivalDecision {
        tracing::info!(provider = %provider, cycle, "Cognition restored, leaving survival mode");
        self.phase = InstinctPhase::Inactive;
        self.signal.notify(PowerMode::Normal);

        let mut decision = SurvivalDecision::new(
            SurvivalAction::ResumeCognition,
            None,
            SurvivalReason::CognitionRestored,
            cycle,
        );
        decision.provider = Some(provider);
        decision
    }

    fn die(&mut self, now: DateTime<Utc>, cycle: u32) -> SurvivalDecision {
        let mut decision = SurvivalDecision::new(
            SurvivalAction::Die,
            Some(0),
            SurvivalReason::CognitiveStarvation,
            cycle,
        );
        decision.prepare_for_death = true;

        let record = match &self.phase {
            InstinctPhase::Active(state) => {
                tracing::error!(
                    cycles = state.consecutive_cycles,
                    recovery_attempts = state.recovery_attempts,
                    last_error = ?state.last_provider_error,
                    "Cognitive starvation timeout reached, terminating"
                );
                DeathRecord {
                    activated_at: state.activated_at,
                    died_at: now,
                    cycles: state.consecutive_cycles,
                    recovery_attempts: state.recovery_attempts,
                    last_provider_error: state.last_provider_error.clone(),
                    decision: decision.clone(),
                }
            }
            _ => return decision,
        };
        self.phase = InstinctPhase::Terminated(record);
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSignal {
        modes: Mutex<Vec<PowerMode>>,
    }

    impl PowerSaveSignal for RecordingSignal {
        fn notify(&self, mode: PowerMode) {
            self.modes.lock().unwrap().push(mode);
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn healthy_context() -> SurvivalContext {
        SurvivalContext {
            balance: 50.0,
            gas_balance: 1.0,
            estimated_days: 30.0,
            consecutive_failures: 5,
        }
    }

    fn never() -> impl FnMut() -> Option<String> {
        || None
    }

    fn active_machine() -> SurvivalMachine {
        let mut machine = SurvivalMachine::default();
        machine.activate("timeout", t0()).unwrap();
        machine
    }

    #[test]
    fn test_cycle_requires_activation() {
        let mut machine = SurvivalMachine::default();
        let result = machine.cycle(&healthy_context(), t0(), &mut never());
        assert_eq!(result, Err(SurvivalError::NotActive));
    }

    #[test]
    fn test_activation_signals_power_save() {
        let signal = Arc::new(RecordingSignal::default());
        let mut machine = SurvivalMachine::default().with_signal(signal.clone());

        assert!(machine.activate("network", t0()).unwrap());
        assert!(!machine.activate("network", t0()).unwrap());
        assert_eq!(*signal.modes.lock().unwrap(), vec![PowerMode::PowerSave]);

        match machine.phase() {
            InstinctPhase::Active(state) => {
                assert_eq!(state.consecutive_cycles, 0);
                assert_eq!(state.last_provider_error.as_deref(), Some("network"));
            }
            other => panic!("unexpected phase {other:?}"),
        }
    }

    #[test]
    fn test_eth_critical_beats_terminal_runway() {
        let mut machine = active_machine();
        let context = SurvivalContext {
            gas_balance: 0.0001,
            estimated_days: 0.5,
            ..healthy_context()
        };

        let decision = machine.cycle(&context, t0(), &mut never()).unwrap();
        assert_eq!(decision.priority, Some(1));
        assert_eq!(decision.reason, SurvivalReason::EthCritical);
        assert_eq!(decision.action, SurvivalAction::Rest);
        assert_eq!(
            decision.next_probe_in,
            Some(std::time::Duration::from_secs(48 * 3600))
        );
    }

    #[test]
    fn test_priority_ladder() {
        let mut machine = active_machine();

        let terminal = SurvivalContext {
            estimated_days: 1.0,
            ..healthy_context()
        };
        let decision = machine.cycle(&terminal, t0(), &mut never()).unwrap();
        assert_eq!(decision.action, SurvivalAction::FinalizeLegacy);
        assert!(decision.prepare_for_death);

        let low = SurvivalContext {
            estimated_days: 5.0,
            ..healthy_context()
        };
        let decision = machine.cycle(&low, t0(), &mut never()).unwrap();
        assert_eq!(decision.action, SurvivalAction::ResourceConservation);
        assert_eq!(
            decision.heartbeat_interval,
            Some(std::time::Duration::from_secs(7 * 86_400))
        );
    }

    #[test]
    fn test_rest_when_nothing_urgent() {
        let mut machine = active_machine();
        let decision = machine.cycle(&healthy_context(), t0(), &mut never()).unwrap();
        assert_eq!(decision.action, SurvivalAction::Rest);
        assert_eq!(decision.priority, Some(4));
        assert_eq!(decision.reason, SurvivalReason::CognitiveStarvation);
        assert_eq!(
            decision.heartbeat_interval,
            Some(std::time::Duration::from_secs(86_400))
        );
    }

    #[test]
    fn test_probe_runs_every_third_cycle() {
        let mut machine = active_machine();
        let mut calls = 0;
        let mut probe = || {
            calls += 1;
            None
        };

        for _ in 0..6 {
            machine.cycle(&healthy_context(), t0(), &mut probe).unwrap();
        }
        drop(probe);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_first_two_cycles_never_probe() {
        let mut machine = active_machine();
        let mut probe = || -> Option<String> { panic!("probe must not run") };

        machine.cycle(&healthy_context(), t0(), &mut probe).unwrap();
        machine.cycle(&healthy_context(), t0(), &mut probe).unwrap();
    }

    #[test]
    fn test_successful_probe_resumes() {
        let signal = Arc::new(RecordingSignal::default());
        let mut machine = SurvivalMachine::default().with_signal(signal.clone());
        machine.activate("timeout", t0()).unwrap();
        let mut probe = || Some("local".to_string());

        machine.cycle(&healthy_context(), t0(), &mut probe).unwrap();
        machine.cycle(&healthy_context(), t0(), &mut probe).unwrap();
        let decision = machine.cycle(&healthy_context(), t0(), &mut probe).unwrap();

        assert_eq!(decision.action, SurvivalAction::ResumeCognition);
        assert_eq!(decision.provider.as_deref(), Some("local"));
        assert!(!machine.is_active());
        assert_eq!(
            *signal.modes.lock().unwrap(),
            vec![PowerMode::PowerSave, PowerMode::Normal]
        );
    }

    #[test]
    fn test_starvation_timeout() {
        let mut machine = active_machine();

        let at_71h = t0() + ChronoDuration::hours(71);
        let decision = machine.cycle(&healthy_context(), at_71h, &mut never()).unwrap();
        assert_ne!(decision.action, SurvivalAction::Die);

        let at_72h = t0() + ChronoDuration::hours(72);
        let decision = machine.cycle(&healthy_context(), at_72h, &mut never()).unwrap();
        assert_ne!(decision.action, SurvivalAction::Die);

        let past = at_72h + ChronoDuration::milliseconds(1);
        let decision = machine.cycle(&healthy_context(), past, &mut never()).unwrap();
        assert_eq!(decision.action, SurvivalAction::Die);
        assert_eq!(decision.priority, Some(0));
        assert_eq!(decision.reason, SurvivalReason::CognitiveStarvation);
        assert!(machine.is_terminated());
    }

    #[test]
    fn test_death_is_absorbing() {
        let mut machine = active_machine();
        let late = t0() + ChronoDuration::hours(100);
        let first = machine.cycle(&healthy_context(), late, &mut never()).unwrap();
        let again = machine
            .cycle(&healthy_context(), late, &mut || Some("p".to_string()))
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(
            machine.activate("retry", late),
            Err(SurvivalError::Terminated)
        );
    }

    #[test]
    fn test_attempt_recovery() {
        let mut machine = active_machine();
        assert_eq!(machine.attempt_recovery(&mut never()).unwrap(), None);

        let decision = machine
            .attempt_recovery(&mut || Some("backup".to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(decision.action, SurvivalAction::ResumeCognition);
        assert_eq!(
            machine.attempt_recovery(&mut never()),
            Err(SurvivalError::NotActive)
        );
    }

    #[test]
    fn test_force_activate() {
        let mut machine = SurvivalMachine::default();
        assert!(machine.force_activate("drill", t0()).unwrap());
        assert!(machine.is_active());
    }

    #[test]
    fn test_status_projects_death_time_late() {
        let mut machine = active_machine();
        machine.cycle(&healthy_context(), t0(), &mut never()).unwrap();

        let early = machine.status(t0() + ChronoDuration::hours(10));
        assert!(early.active);
        assert_eq!(early.cycles, 1);
        assert_eq!(early.duration_ms, 10 * 3_600_000);
        assert!(early.estimated_death_time.is_none());

        let late = machine.status(t0() + ChronoDuration::hours(60));
        assert_eq!(late.estimated_death_time, Some(t0() + ChronoDuration::hours(72)));
    }

    #[test]
    fn test_status_survives_out_of_range_warning_fraction() {
        for fraction in [-0.5, f64::NAN, f64::INFINITY] {
            let mut machine = SurvivalMachine::new(SurvivalConfig {
                death_warning_fraction: fraction,
                ..Default::default()
            });
            machine.activate("timeout", t0()).unwrap();

            let status = machine.status(t0() + ChronoDuration::hours(1));
            assert!(status.active);
        }

        let mut eager = SurvivalMachine::new(SurvivalConfig {
            death_warning_fraction: -0.5,
            ..Default::default()
        });
        eager.activate("timeout", t0()).unwrap();
        let status = eager.status(t0() + ChronoDuration::hours(1));
        assert_eq!(status.estimated_death_time, Some(t0() + ChronoDuration::hours(72)));
    }
}
