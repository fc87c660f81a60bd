use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;

use tenq::dates;

#[derive(Debug, Args)]
pub struct Cmd {
    /// The reference date, as YYYY-MM-DD.
    reference: NaiveDate,
}

impl Cmd {
    pub fn run(&self) -> Result<()> {
        let due_date = dates::get_due_date(&self.reference)
            .with_context(|| format!("computing due date for {}", self.reference))?;
        let last_payment_date = dates::get_last_payment_date_from_due_date(&due_date)
            .with_context(|| format!("computing last payment date for {}", due_date))?;
        println!("due date: {}", due_date);
        println!("last payment date: {}", last_payment_date);
        Ok(())
    }
}
