//! Functions to read and write the files handled by the command line. Allows
//! use of "-" as a way to specify stdin or stdout.

use std::fmt;
use std::fs::File;
use std::io::{stdin, stdout, Read, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Error, Result};

use crate::batch::PendingPayment;

/// Specifies a file to read from to write to (depending on context).
#[derive(Clone, Debug)]
pub enum FileSpec {
    /// Read from stdin or write to stdout.
    Stdio,
    /// Read from or write to the file at the given path.
    Path(PathBuf),
}

impl fmt::Display for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        use FileSpec::*;
        match self {
            Stdio => f.write_str("<stdio>"),
            Path(path) => write!(f, "{:?}", path),
        }
    }
}

impl FileSpec {
    pub fn reader(&self) -> Result<Box<dyn Read>> {
        use FileSpec::*;
        Ok(match self {
            Stdio => Box::new(stdin()),
            Path(path) => Box::new(
                File::open(path).with_context(|| format!("opening {:?} for reading", path))?,
            ),
        })
    }

    pub fn writer(&self) -> Result<Box<dyn Write>> {
        use FileSpec::*;
        Ok(match self {
            Stdio => Box::new(stdout()),
            Path(path) => Box::new(
                File::create(path).with_context(|| format!("opening {:?} for writing", path))?,
            ),
        })
    }
}

impl FromStr for FileSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use FileSpec::*;
        if s == "-" {
            Ok(Stdio)
        } else {
            Ok(Path(s.into()))
        }
    }
}

pub fn write_file(file_spec: &FileSpec, content: &[u8]) -> Result<()> {
    let mut f = file_spec.writer()?;
    f.write_all(content)
        .with_context(|| format!("writing to {}", file_spec))?;
    f.flush()?;
    Ok(())
}

/// Reads pending payments from a CSV file with a header row.
pub fn read_payments_file(file_spec: &FileSpec) -> Result<Vec<PendingPayment>> {
    read_payments(file_spec.reader()?).with_context(|| format!("reading payments from {}", file_spec))
}

pub fn read_payments<R: Read>(r: R) -> Result<Vec<PendingPayment>> {
    let mut rdr = csv::Reader::from_reader(r);
    let mut payments = Vec::new();
    for result in rdr.deserialize() {
        payments.push(result?);
    }
    Ok(payments)
}

pub fn write_payments_file(file_spec: &FileSpec, payments: &[PendingPayment]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(file_spec.writer()?);
    for payment in payments {
        wtr.serialize(payment)
            .with_context(|| format!("writing payments to {}", file_spec))?;
    }
    wtr.flush()?;
    Ok(())
}
