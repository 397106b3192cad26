//! Attack orchestration.
//!
//! An [`Attack`] walks REQUESTED → PLANNED → EXECUTING → VERIFYING and ends in
//! SUCCEEDED or EXHAUSTED:
//!
//! 1. obtain a [`Challenge`] and compute the iteration grid,
//! 2. for each trial and each round count `k` (ascending), run the assembled
//!    circuit with seeds derived from `(base_seed, trial, k)`,
//! 3. rank the measured outcomes and submit the best one (or the top `k`
//!    with [`CandidatePolicy::TopK`]) to the oracle,
//! 4. stop at the first accepted proof.
//!
//! Oracle transport failures abort the run immediately. A rejected candidate
//! is just a miss. Candidate strings and the marking target never appear in
//! logs or in the [`AttackOutcome`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::assembler::assemble_with;
use crate::circuit::{Circuit, CircuitError};
use crate::executor::{Candidate, ExecutorError, QuantumExecutor};
use crate::oracle::{Challenge, DigestOracle, OracleError};
use crate::planner::{iteration_grid, IterationGrid};
use crate::seeds::TrialSeeds;
use crate::templates::{build_amplification_operator, build_marking_operator};
use crate::verifier::{MAX_NBITS, MIN_NBITS};

pub const DEFAULT_NBITS: u32 = 6;
pub const DEFAULT_SHOTS: u64 = 4096;
pub const DEFAULT_TRIALS: u32 = 2;
pub const DEFAULT_TOPK: usize = 8;
pub const DEFAULT_ALPHAS: [f64; 3] = [0.35, 0.45, 0.55];
pub const DEFAULT_BASE_SEED: u64 = 12345;

#[derive(Debug, Error, PartialEq)]
pub enum AttackError {
    #[error("invalid attack configuration: {0}")]
    InvalidConfig(String),

    #[error("circuit construction failed: {0}")]
    Circuit(#[from] CircuitError),

    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("executor failed on trial {trial} with k={iterations}: {source}")]
    Executor {
        trial: u32,
        iterations: usize,
        source: ExecutorError,
    },
}

impl AttackError {
    /// True when the oracle could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, AttackError::Oracle(OracleError::Transport(_)))
    }
}

/// Which ranked candidates are submitted per circuit run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidatePolicy {
    /// Only the most frequent outcome.
    #[default]
    BestOnly,
    /// Every candidate in the top-k list, in rank order.
    TopK,
}

/// What to do when the executor fails on one (trial, k) pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutorFailurePolicy {
    #[default]
    Abort,
    /// Log, count, and move on to the next pair.
    Skip,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttackConfig {
    pub nbits: u32,
    pub shots: u64,
    pub trials: u32,
    pub topk: usize,
    pub alphas: Vec<f64>,
    pub candidate_policy: CandidatePolicy,
    pub executor_failure_policy: ExecutorFailurePolicy,
    /// Build the marking operator from the disclosed target. Local validation only.
    pub debug: bool,
    pub base_seed: u64,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            nbits: DEFAULT_NBITS,
            shots: DEFAULT_SHOTS,
            trials: DEFAULT_TRIALS,
            topk: DEFAULT_TOPK,
            alphas: DEFAULT_ALPHAS.to_vec(),
            candidate_policy: CandidatePolicy::default(),
            executor_failure_policy: ExecutorFailurePolicy::default(),
            debug: false,
            base_seed: DEFAULT_BASE_SEED,
        }
    }
}

impl AttackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nbits(mut self, nbits: u32) -> Self {
        self.nbits = nbits;
        self
    }

    pub fn with_shots(mut self, shots: u64) -> Self {
        self.shots = shots;
        self
    }

    pub fn with_trials(mut self, trials: u32) -> Self {
        self.trials = trials;
        self
    }

    pub fn with_topk(mut self, topk: usize) -> Self {
        self.topk = topk;
        self
    }

    pub fn with_alphas(mut self, alphas: Vec<f64>) -> Self {
        self.alphas = alphas;
        self
    }

    pub fn with_candidate_policy(mut self, policy: CandidatePolicy) -> Self {
        self.candidate_policy = policy;
        self
    }

    pub fn with_executor_failure_policy(mut self, policy: ExecutorFailurePolicy) -> Self {
        self.executor_failure_policy = policy;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), AttackError> {
        let invalid = |msg: String| Err(AttackError::InvalidConfig(msg));
        if !(MIN_NBITS..=MAX_NBITS).contains(&(self.nbits as i64)) {
            return invalid(format!("nbits must be in 1..=64, got {}", self.nbits));
        }
        if self.shots == 0 {
            return invalid("shots must be at least 1".into());
        }
        if self.trials == 0 {
            return invalid("trials must be at least 1".into());
        }
        if self.topk == 0 {
            return invalid("topk must be at least 1".into());
        }
        if self.alphas.is_empty() {
            return invalid("alpha list is empty".into());
        }
        if let Some(a) = self.alphas.iter().find(|a| !a.is_finite()) {
            return invalid(format!("alpha {a} is not finite"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackPhase {
    Requested,
    Planned,
    Executing,
    Verifying,
    Succeeded,
    Exhausted,
}

impl AttackPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, AttackPhase::Succeeded | AttackPhase::Exhausted)
    }
}

impl fmt::Display for AttackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttackPhase::Requested => "REQUESTED",
            AttackPhase::Planned => "PLANNED",
            AttackPhase::Executing => "EXECUTING",
            AttackPhase::Verifying => "VERIFYING",
            AttackPhase::Succeeded => "SUCCEEDED",
            AttackPhase::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// A planned attack: the challenge, its iteration grid, and the pattern the
/// marking operator is built for.
#[derive(Clone, PartialEq)]
pub struct Deployment {
    pub challenge: Challenge,
    pub grid: IterationGrid,
    marking_target: String,
    disclosed: bool,
}

impl Deployment {
    pub fn nbits(&self) -> u32 {
        self.challenge.nbits
    }

    /// Whether the marking pattern came from debug disclosure.
    pub fn uses_disclosed_target(&self) -> bool {
        self.disclosed
    }
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("challenge", &self.challenge)
            .field("grid", &self.grid)
            .field("marking_target", &"<redacted>")
            .field("disclosed", &self.disclosed)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AttackStats {
    pub trials_consumed: u32,
    pub circuits_executed: usize,
    pub verifications: usize,
    pub executor_failures: usize,
}

/// Terminal result of one attack run. Never carries a candidate string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttackOutcome {
    pub success: bool,
    pub msg: String,
    pub nbits: u32,
    pub shots: u64,
    pub trial: Option<u32>,
    pub iterations: Option<usize>,
    pub hits: Option<u64>,
    pub stats: AttackStats,
}

impl fmt::Display for AttackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.success, self.trial, self.iterations, self.hits) {
            (true, Some(trial), Some(k), Some(hits)) => write!(
                f,
                "[+] attack succeeded (nbits={}) trial={} k={} hits={}/{}",
                self.nbits, trial, k, hits, self.shots
            ),
            _ => write!(
                f,
                "[-] attempts exhausted (nbits={}) after {} trial(s), {} circuit(s), {} verification(s); \
                 raise shots/topk/trials or lower nbits",
                self.nbits,
                self.stats.trials_consumed,
                self.stats.circuits_executed,
                self.stats.verifications
            ),
        }
    }
}

pub struct Attack<O, E> {
    config: AttackConfig,
    oracle: O,
    executor: E,
    phase: AttackPhase,
}

impl<O: DigestOracle, E: QuantumExecutor> Attack<O, E> {
    pub fn new(config: AttackConfig, oracle: O, executor: E) -> Result<Self, AttackError> {
        config.validate()?;
        Ok(Self {
            config,
            oracle,
            executor,
            phase: AttackPhase::Requested,
        })
    }

    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    fn enter(&mut self, phase: AttackPhase) {
        if self.phase != phase {
            tracing::trace!(from = %self.phase, to = %phase, "phase transition");
            self.phase = phase;
        }
    }

    /// Requests a challenge from the oracle and plans it.
    pub fn deploy(&mut self) -> Result<Deployment, AttackError> {
        let challenge = self.oracle.challenge(self.config.nbits)?;
        self.plan(challenge)
    }

    /// REQUESTED → PLANNED for a known challenge.
    pub fn plan(&mut self, challenge: Challenge) -> Result<Deployment, AttackError> {
        let n = challenge.nbits as usize;
        if n < 1 {
            return Err(CircuitError::InvalidQubitCount(n).into());
        }
        let grid = iteration_grid(challenge.nbits, &self.config.alphas);

        let marking_target = if self.config.debug {
            tracing::warn!("debug mode: marking operator built from the disclosed target");
            self.oracle.disclose_target(&challenge)?
        } else {
            "0".repeat(n)
        };

        tracing::info!(
            nbits = challenge.nbits,
            grid = ?grid.as_slice(),
            debug = self.config.debug,
            "attack planned"
        );
        self.enter(AttackPhase::Planned);
        Ok(Deployment {
            challenge,
            grid,
            marking_target,
            disclosed: self.config.debug,
        })
    }

    fn build_circuits(&self, deployment: &Deployment) -> Result<Vec<(usize, Circuit)>, AttackError> {
        let n = deployment.nbits() as usize;
        let marking = build_marking_operator(n, &deployment.marking_target)?;
        let amplification = build_amplification_operator(n)?;
        deployment
            .grid
            .iter()
            .map(|k| {
                assemble_with(n, &marking, &amplification, k)
                    .map(|circuit| (k, circuit))
                    .map_err(AttackError::from)
            })
            .collect()
    }

    fn candidates_to_submit<'c>(&self, ranked: &'c [Candidate]) -> &'c [Candidate] {
        match self.config.candidate_policy {
            CandidatePolicy::BestOnly => &ranked[..ranked.len().min(1)],
            CandidatePolicy::TopK => ranked,
        }
    }

    /// PLANNED → EXECUTING ⇄ VERIFYING → SUCCEEDED | EXHAUSTED.
    pub fn execute(&mut self, deployment: &Deployment) -> Result<AttackOutcome, AttackError> {
        let circuits = self.build_circuits(deployment)?;
        let challenge = &deployment.challenge;
        let mut stats = AttackStats::default();

        for trial in 1..=self.config.trials {
            stats.trials_consumed = trial;

            for (k, circuit) in &circuits {
                let k = *k;
                self.enter(AttackPhase::Executing);
                let seeds = TrialSeeds::derive(self.config.base_seed, trial, k);
                stats.circuits_executed += 1;

                let counts = match self.executor.run(circuit, self.config.shots, seeds) {
                    Ok(counts) => counts,
                    Err(source) => match self.config.executor_failure_policy {
                        ExecutorFailurePolicy::Abort => {
                            return Err(AttackError::Executor {
                                trial,
                                iterations: k,
                                source,
                            })
                        }
                        ExecutorFailurePolicy::Skip => {
                            stats.executor_failures += 1;
                            tracing::warn!(trial, iterations = k, error = %source, "executor failed, skipping");
                            continue;
                        }
                    },
                };

                let ranked = counts.top_k(self.config.topk);
                for candidate in self.candidates_to_submit(&ranked) {
                    self.enter(AttackPhase::Verifying);
                    stats.verifications += 1;
                    if self.oracle.verify(challenge, &candidate.bits)? {
                        self.enter(AttackPhase::Succeeded);
                        tracing::info!(trial, iterations = k, hits = candidate.hits, "proof accepted");
                        return Ok(AttackOutcome {
                            success: true,
                            msg: challenge.msg.clone(),
                            nbits: challenge.nbits,
                            shots: self.config.shots,
                            trial: Some(trial),
                            iterations: Some(k),
                            hits: Some(candidate.hits),
                            stats,
                        });
                    }
                }
                tracing::debug!(
                    trial,
                    iterations = k,
                    top_hits = ranked.first().map(|c| c.hits).unwrap_or(0),
                    "no candidate accepted"
                );
            }
        }

        self.enter(AttackPhase::Exhausted);
        tracing::info!(
            trials = stats.trials_consumed,
            circuits = stats.circuits_executed,
            "attempts exhausted"
        );
        Ok(AttackOutcome {
            success: false,
            msg: challenge.msg.clone(),
            nbits: challenge.nbits,
            shots: self.config.shots,
            trial: None,
            iterations: None,
            hits: None,
            stats,
        })
    }

    /// Full run: deploy then execute.
    pub fn run(&mut self) -> Result<AttackOutcome, AttackError> {
        let deployment = self.deploy()?;
        self.execute(&deployment)
    }
}
