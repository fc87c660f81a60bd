use anyhow::Result;
use clap::Args;
use tracing::info;

use tenq::batch;
use tenq::filespec::{self, FileSpec};

use super::BatchArgs;

#[derive(Debug, Args)]
pub struct Cmd {
    #[command(flatten)]
    batch: BatchArgs,
    /// Payments CSV file to read. "-" reads from stdin.
    #[arg(short = 'i', long = "input")]
    input: FileSpec,
    /// The 10Q file to write (overwrites any existing file). "-" writes to
    /// stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: FileSpec,
}

impl Cmd {
    pub fn run(&self) -> Result<()> {
        let prepared = self.batch.prepare()?;
        let payments = filespec::read_payments_file(&self.input)?;
        let assembled = batch::assemble(&prepared.writer, prepared.config.policy, &payments)?;
        info!(
            written = assembled.included.len(),
            skipped = assembled.skipped.len(),
            "assembled 10Q file"
        );
        filespec::write_file(&self.output, &assembled.content)
    }
}
