//! Subcommands of the `tenq` binary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::Args;
use tracing::info;

use tenq::batch::ErrorPolicy;
use tenq::config::Config;
use tenq::tenq::TransactionWriter;

pub mod dates;
pub mod read;
pub mod send;
pub mod write;

/// Options shared by the commands that produce a batch.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// RON configuration file. Defaults apply when omitted.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    /// Date the due date is derived from. Defaults to today in the
    /// configured timezone.
    #[arg(long = "reference-date")]
    reference_date: Option<NaiveDate>,
    /// The year the claims belong to. Defaults to the reference date's year.
    #[arg(long = "year")]
    year: Option<i32>,
    /// What to do with payments that cannot be written or a failed
    /// transfer: "continue-on-error" or "abort-on-error". Overrides the
    /// configuration.
    #[arg(long = "policy")]
    policy: Option<ErrorPolicy>,
}

/// A loaded configuration and the writer for a batch created now.
pub struct Batch {
    pub config: Config,
    pub now: DateTime<Tz>,
    pub writer: TransactionWriter,
}

impl BatchArgs {
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::from_path(path),
            None => Ok(Config::default()),
        }
    }

    pub fn prepare(&self) -> Result<Batch> {
        let mut config = self.load_config()?;
        if let Some(policy) = self.policy {
            config.policy = policy;
        }
        let now = Utc::now().with_timezone(&config.timezone);
        let reference = self.reference_date.unwrap_or_else(|| now.date_naive());
        let due_date = tenq::dates::get_due_date(&reference)
            .with_context(|| format!("computing due date for {}", reference))?;
        let year = self.year.unwrap_or_else(|| reference.year());
        let writer = config
            .writer(due_date, year, &now)
            .with_context(|| format!("computing payment dates for due date {}", due_date))?;
        info!(
            %reference,
            %due_date,
            last_payment_date = %writer.last_payment_date(),
            year,
            "prepared batch"
        );
        Ok(Batch {
            config,
            now,
            writer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(flatten)]
        batch: BatchArgs,
    }

    #[test]
    fn policy_flag_overrides_config() {
        let cli = Cli::try_parse_from([
            "tenq",
            "--policy",
            "abort-on-error",
            "--reference-date",
            "2022-02-10",
        ])
        .unwrap();
        let batch = cli.batch.prepare().unwrap();

        assert_eq!(ErrorPolicy::AbortOnError, batch.config.policy);
        assert_eq!(
            NaiveDate::from_ymd_opt(2022, 6, 1).unwrap(),
            batch.writer.due_date()
        );
        assert_eq!(2022, batch.writer.year());
    }

    #[test]
    fn policy_defaults_to_config() {
        let cli = Cli::try_parse_from(["tenq"]).unwrap();
        let batch = cli.batch.prepare().unwrap();
        assert_eq!(ErrorPolicy::ContinueOnError, batch.config.policy);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Cli::try_parse_from(["tenq", "--policy", "sometimes"]).is_err());
    }
}
