use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Args;
use groundline_agent::llm::{CommandGenerator, ConclusionGenerator};
use groundline_agent::mock::MockGenerator;
use groundline_agent::runtime::DecisionRuntime;
use groundline_core::config::{AppConfig, GeneratorMode, LoadOptions};
use groundline_core::domain::snapshot::Snapshot;
use groundline_core::errors::InferenceError;

use crate::commands::snapshot::build_from_records;
use crate::commands::{
    load_config, parse_input, read_input, CommandResult, EXIT_CONFIG, EXIT_INPUT,
    EXIT_MISSING_CREDENTIAL,
};

#[derive(Debug, Clone, Default, Args)]
pub struct InferArgs {
    #[arg(
        long,
        conflicts_with = "records",
        required_unless_present = "records",
        help = "Prebuilt Snapshot JSON"
    )]
    pub snapshot: Option<PathBuf>,
    #[arg(long, help = "Record bundle to build the Snapshot from")]
    pub records: Option<PathBuf>,
    #[arg(long, help = "Report date (YYYY-MM-DD) when building from records")]
    pub report_date: Option<NaiveDate>,
    #[arg(long, help = "Lookback window in days when building from records")]
    pub lookback_days: Option<u32>,
    #[arg(long, help = "Generator mode: mock|command")]
    pub generator: Option<GeneratorMode>,
    #[arg(long, help = "Seed for the mock generator")]
    pub seed: Option<u64>,
}

pub fn run(args: &InferArgs, mut options: LoadOptions) -> CommandResult {
    if args.report_date.is_some() {
        options.overrides.report_date = args.report_date;
    }
    if args.lookback_days.is_some() {
        options.overrides.lookback_days = args.lookback_days;
    }
    if args.generator.is_some() {
        options.overrides.generator_mode = args.generator;
    }
    if args.seed.is_some() {
        options.overrides.mock_seed = args.seed;
    }

    let config = match load_config("infer", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let snapshot = match load_snapshot(args, &config) {
        Ok(snapshot) => snapshot,
        Err(result) => return result,
    };

    let generator = match build_generator(&config) {
        Ok(generator) => generator,
        Err(result) => return result,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "infer",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_INPUT,
            );
        }
    };

    let decision_runtime = DecisionRuntime::new(generator);
    match runtime.block_on(decision_runtime.infer_decision(&snapshot)) {
        Ok(result) => CommandResult::document("infer", &result),
        Err(error @ InferenceError::MissingCredential { .. }) => CommandResult::failure(
            "infer",
            "missing_credential",
            error.to_string(),
            EXIT_MISSING_CREDENTIAL,
        ),
        Err(error) => CommandResult::failure("infer", "serialization", error.to_string(), EXIT_INPUT),
    }
}

fn load_snapshot(args: &InferArgs, config: &AppConfig) -> Result<Snapshot, CommandResult> {
    match (&args.snapshot, &args.records) {
        (Some(path), _) => {
            let raw = read_input("infer", path)?;
            parse_input::<Snapshot>("infer", path, &raw)
        }
        (None, Some(path)) => build_from_records("infer", path, config),
        (None, None) => Err(CommandResult::failure(
            "infer",
            "input",
            "either --snapshot or --records is required",
            EXIT_INPUT,
        )),
    }
}

fn build_generator(config: &AppConfig) -> Result<Arc<dyn ConclusionGenerator>, CommandResult> {
    match config.generator.mode {
        GeneratorMode::Mock => Ok(Arc::new(MockGenerator::new(config.generator.mock_seed))),
        GeneratorMode::Command => CommandGenerator::from_config(&config.generator)
            .map(|generator| Arc::new(generator) as Arc<dyn ConclusionGenerator>)
            .map_err(|error| {
                CommandResult::failure("infer", "config_validation", error.to_string(), EXIT_CONFIG)
            }),
    }
}
