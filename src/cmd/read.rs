use anyhow::{Context, Result};
use clap::Args;
use itertools::Itertools;

use tenq::filespec::FileSpec;
use tenq::tenq::reader::{self, ParsedTransaction};
use tenq::tenq::Slot;

const COLUMNS: &[Slot] = &[
    Slot::LeverandoerIdent,
    Slot::DebitorNummer,
    Slot::RateBeloeb,
    Slot::ForfaldDato,
    Slot::BetalDato,
    Slot::StiftelseDato,
    Slot::AfstemNoegle,
];

#[derive(Debug, Args)]
pub struct Cmd {
    /// The 10Q file to read. "-" reads from stdin.
    input: FileSpec,
    /// The CSV file to write (overwrites any existing file). "-" writes to
    /// stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: FileSpec,
}

impl Cmd {
    pub fn run(&self) -> Result<()> {
        let trns = reader::read_from(self.input.reader()?)
            .with_context(|| format!("reading 10Q file {}", self.input))?;

        let mut wtr = csv::Writer::from_writer(self.output.writer()?);
        let mut header = vec!["line_numbers"];
        header.extend(COLUMNS.iter().map(|slot| slot.name()));
        header.push("rate_text");
        wtr.write_record(&header)?;
        for trn in &trns {
            wtr.write_record(&row(trn))
                .with_context(|| format!("writing to {}", self.output))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn row(trn: &ParsedTransaction) -> Vec<String> {
    let mut row = vec![trn.line_numbers().iter().join(";")];
    row.extend(
        COLUMNS
            .iter()
            .map(|&slot| trn.get(slot).unwrap_or_default().trim().to_string()),
    );
    row.push(trn.rate_text());
    row
}
