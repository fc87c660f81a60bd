use anyhow::{bail, Result};
use chrono::Utc;
use clap::Args;
use tracing::{info, warn};

use tenq::batch::{self, BatchJob};
use tenq::filespec::{self, FileSpec};
use tenq::transport::LocalDropFolder;

use super::BatchArgs;

#[derive(Debug, Args)]
pub struct Cmd {
    #[command(flatten)]
    batch: BatchArgs,
    /// Payments CSV file to send.
    #[arg(short = 'i', long = "input")]
    input: FileSpec,
    /// Where to write the payments with their `sent` column updated. Defaults
    /// to overwriting the input.
    #[arg(short = 'o', long = "output")]
    output: Option<FileSpec>,
}

impl Cmd {
    pub fn run(&self) -> Result<()> {
        let prepared = self.batch.prepare()?;
        let config = &prepared.config;
        let transport_config = match &config.transport {
            Some(transport_config) => transport_config.clone(),
            None => bail!("the configuration has no transport section"),
        };
        let mut payments = filespec::read_payments_file(&self.input)?;

        let transport = LocalDropFolder::new(transport_config);
        let filename = batch::batch_filename(&config.filename_prefix, prepared.now.naive_local());
        let job = BatchJob::new(
            &prepared.writer,
            &transport,
            config.policy,
            &config.destination_folder,
            &filename,
        );
        let report = job.run(&mut payments, prepared.now.with_timezone(&Utc))?;

        for skipped in &report.skipped {
            warn!(
                index = skipped.index,
                afstem_noegle = %skipped.afstem_noegle,
                error = %skipped.error,
                "payment not sent"
            );
        }
        match &report.transfer_error {
            Some(err) => warn!(filename = %report.filename, error = %err, "batch not delivered"),
            None => info!(
                filename = %report.filename,
                sent = report.sent.len(),
                "batch delivered"
            ),
        }

        let output = self.output.as_ref().unwrap_or(&self.input);
        filespec::write_payments_file(output, &payments)
    }
}
