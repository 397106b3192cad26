use std::time::Duration;

use clap::{Parser, ValueEnum};
use grover_attack::oracle::DEFAULT_TIMEOUT;
use grover_attack::planner::parse_alpha_list;
use grover_attack::{
    Attack, AttackConfig, AttackError, AttackOutcome, CandidatePolicy, DigestOracle,
    ExecutorFailurePolicy, HttpOracle, LocalOracle, StateVectorSimulator, Verifier,
    VerifierConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    /// Submit only the most frequent outcome per run
    Best,
    /// Submit every top-k outcome per run
    TopK,
}

#[derive(Parser, Debug)]
#[command(name = "grover_attack")]
#[command(about = "Run an amplitude-amplification attack against a digest verifier")]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8008", help = "Verifier base URL")]
    api: String,

    #[arg(long, help = "Use an in-process verifier configured from LAB_* variables")]
    local: bool,

    #[arg(long, default_value_t = 6)]
    nbits: u32,

    #[arg(long, default_value_t = 4096)]
    shots: u64,

    #[arg(long, default_value_t = 2)]
    trials: u32,

    #[arg(long, default_value_t = 8)]
    topk: usize,

    #[arg(long, default_value = "0.35,0.45,0.55", help = "Comma-separated scaling factors")]
    alpha_range: String,

    #[arg(long, help = "Build the oracle from the disclosed target (verifier needs LAB_DEBUG=1)")]
    demo: bool,

    #[arg(long, value_enum, default_value = "best")]
    candidate_policy: PolicyArg,

    #[arg(long, help = "Continue past executor failures instead of aborting")]
    skip_executor_failures: bool,

    #[arg(long, default_value_t = grover_attack::attack::DEFAULT_BASE_SEED)]
    seed: u64,

    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    #[arg(long, default_value_t = 2)]
    optimization_level: u8,

    #[arg(long, default_value_t = grover_attack::executor::DEFAULT_MAX_QUBITS)]
    max_qubits: usize,

    #[arg(long, help = "Print the outcome as JSON")]
    json: bool,
}

fn run<O: DigestOracle>(
    config: AttackConfig,
    oracle: O,
    simulator: StateVectorSimulator,
) -> Result<AttackOutcome, AttackError> {
    Attack::new(config, oracle, simulator)?.run()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let alphas = match parse_alpha_list(&args.alpha_range) {
        Ok(alphas) => alphas,
        Err(e) => {
            eprintln!("Error: invalid --alpha-range {:?}: {}", args.alpha_range, e);
            std::process::exit(2);
        }
    };

    let config = AttackConfig::new()
        .with_nbits(args.nbits)
        .with_shots(args.shots)
        .with_trials(args.trials)
        .with_topk(args.topk)
        .with_alphas(alphas)
        .with_candidate_policy(match args.candidate_policy {
            PolicyArg::Best => CandidatePolicy::BestOnly,
            PolicyArg::TopK => CandidatePolicy::TopK,
        })
        .with_executor_failure_policy(if args.skip_executor_failures {
            ExecutorFailurePolicy::Skip
        } else {
            ExecutorFailurePolicy::Abort
        })
        .with_debug(args.demo)
        .with_base_seed(args.seed);

    let simulator = StateVectorSimulator::new()
        .with_max_qubits(args.max_qubits)
        .with_optimization_level(args.optimization_level);
    tracing::info!(
        max_qubits = simulator.max_qubits(),
        optimization_level = args.optimization_level,
        "state-vector executor ready"
    );

    let result = if args.local {
        tracing::info!("using in-process verifier");
        run(
            config,
            LocalOracle::new(Verifier::new(VerifierConfig::from_env())),
            simulator,
        )
    } else {
        match HttpOracle::new(&args.api, Duration::from_secs(args.timeout_secs)) {
            Ok(oracle) => {
                tracing::info!(api = %oracle.base_url(), "using remote verifier");
                run(config, oracle, simulator)
            }
            Err(e) => Err(e.into()),
        }
    };

    match result {
        Ok(outcome) => {
            if args.json {
                match serde_json::to_string_pretty(&outcome) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("Error: {e}");
                        std::process::exit(2);
                    }
                }
            } else {
                println!("{outcome}");
            }
            if !outcome.success {
                std::process::exit(1);
            }
        }
        Err(e) => {
            if e.is_transport() {
                tracing::error!(error = %e, "verifier unreachable");
            } else {
                tracing::error!(error = %e, "attack aborted");
            }
            std::process::exit(2);
        }
    }
}
