use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;
use groundline_core::config::{AppConfig, LoadOptions};
use groundline_core::domain::snapshot::Snapshot;
use groundline_core::snapshot::SnapshotBuilder;

use crate::commands::{load_config, load_records, CommandResult, EXIT_INPUT};

#[derive(Debug, Clone, Default, Args)]
pub struct SnapshotArgs {
    #[arg(long, help = "JSON record bundle ({quotes, invoices, input_costs}) or array of records")]
    pub records: PathBuf,
    #[arg(long, help = "Report date (YYYY-MM-DD); defaults to today")]
    pub report_date: Option<NaiveDate>,
    #[arg(long, help = "Lookback window in days (1..=3650)")]
    pub lookback_days: Option<u32>,
}

impl SnapshotArgs {
    pub(crate) fn apply_to(&self, options: &mut LoadOptions) {
        if self.report_date.is_some() {
            options.overrides.report_date = self.report_date;
        }
        if self.lookback_days.is_some() {
            options.overrides.lookback_days = self.lookback_days;
        }
    }
}

pub fn run(args: &SnapshotArgs, mut options: LoadOptions) -> CommandResult {
    args.apply_to(&mut options);
    let config = match load_config("snapshot", options) {
        Ok(config) => config,
        Err(result) => return result,
    };

    match build_from_records("snapshot", &args.records, &config) {
        Ok(snapshot) => CommandResult::document("snapshot", &snapshot),
        Err(result) => result,
    }
}

pub(crate) fn build_from_records(
    command: &str,
    path: &std::path::Path,
    config: &AppConfig,
) -> Result<Snapshot, CommandResult> {
    let (records, input_costs) = load_records(command, path)?;
    let mut builder = SnapshotBuilder::new(config.snapshot.lookback_days);
    if let Some(report_date) = config.snapshot.report_date {
        builder = builder.with_report_date(report_date);
    }
    builder.build(&records, &input_costs).map_err(|error| {
        CommandResult::failure(command, "input", error.to_string(), EXIT_INPUT)
    })
}
