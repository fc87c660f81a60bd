use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde_derive::Deserialize;

use crate::batch::ErrorPolicy;
use crate::dates::DateError;
use crate::tenq::TransactionWriter;
use crate::transport::LocalDropConfig;

/// Settings for writing and delivering 10Q batches, read from a RON file.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub writer: WriterConfig,
    /// Required for sending; writing files locally works without it.
    pub transport: Option<LocalDropConfig>,
    pub destination_folder: String,
    pub policy: ErrorPolicy,
    /// Timezone whose wall clock dates the batch.
    pub timezone: Tz,
    pub filename_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            writer: WriterConfig::default(),
            transport: None,
            destination_folder: ".".to_string(),
            policy: ErrorPolicy::default(),
            timezone: chrono_tz::America::Nuuk,
            filename_prefix: "10Q".to_string(),
        }
    }
}

/// Overrides of the writer's per-file fields. Unset fields keep the writer's
/// defaults.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct WriterConfig {
    pub bruger_nummer: Option<String>,
    pub betal_art: Option<u32>,
    pub faktura_no: Option<String>,
    pub omraade_nummer: Option<u32>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self> {
        ron::de::from_reader(
            File::open(path).with_context(|| format!("opening {:?} for reading", path))?,
        )
        .with_context(|| format!("parsing {:?}", path))
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        ron::de::from_str(s).map_err(Into::into)
    }

    /// Creates the writer for a batch with the given due date, year and
    /// timestamp.
    pub fn writer<T: TimeZone>(
        &self,
        due_date: NaiveDate,
        year: i32,
        timestamp: &DateTime<T>,
    ) -> Result<TransactionWriter, DateError> {
        let mut builder = TransactionWriter::builder(due_date, year).timestamp(timestamp);
        let w = &self.writer;
        if let Some(bruger_nummer) = &w.bruger_nummer {
            builder = builder.bruger_nummer(bruger_nummer);
        }
        if let Some(betal_art) = w.betal_art {
            builder = builder.betal_art(betal_art);
        }
        if let Some(faktura_no) = &w.faktura_no {
            builder = builder.faktura_no(faktura_no);
        }
        if let Some(omraade_nummer) = w.omraade_nummer {
            builder = builder.omraade_nummer(omraade_nummer);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use chrono::Utc;

    use crate::tenq::LINE_SEPARATOR;

    #[test]
    fn empty_config() {
        let config = Config::from_str("()").unwrap();
        assert_eq!(Config::default(), config);
        assert_eq!(chrono_tz::America::Nuuk, config.timezone);
        assert_eq!(ErrorPolicy::ContinueOnError, config.policy);
    }

    #[test]
    fn full_config() {
        let config = Config::from_str(&textwrap::dedent(
            r#"
            (
                writer: (
                    bruger_nummer: Some("0901"),
                    betal_art: Some(210),
                ),
                transport: Some((root: "/srv/prisme")),
                destination_folder: "10q",
                policy: AbortOnError,
                timezone: "Europe/Copenhagen",
                filename_prefix: "TOLD",
            )
            "#,
        ))
        .unwrap();

        assert_eq!(Some("0901".to_string()), config.writer.bruger_nummer);
        assert_eq!(Some(210), config.writer.betal_art);
        assert_eq!(None, config.writer.faktura_no);
        assert_eq!(
            Some(LocalDropConfig::new(PathBuf::from("/srv/prisme"))),
            config.transport
        );
        assert_eq!("10q", config.destination_folder);
        assert_eq!(ErrorPolicy::AbortOnError, config.policy);
        assert_eq!(chrono_tz::Europe::Copenhagen, config.timezone);
        assert_eq!("TOLD", config.filename_prefix);
    }

    #[test]
    fn bad_timezone() {
        assert!(Config::from_str(r#"(timezone: "Mars/Olympus")"#).is_err());
    }

    #[test]
    fn writer_uses_overrides() {
        let config = Config::from_str(r#"(writer: (bruger_nummer: Some("0901"), betal_art: Some(7)))"#).unwrap();
        let ts = Utc.with_ymd_and_hms(2022, 2, 18, 12, 35, 57).unwrap();
        let writer = config
            .writer(NaiveDate::from_ymd_opt(2022, 2, 18).unwrap(), 2022, &ts)
            .unwrap();
        let got = writer
            .serialize_transaction("1234567890", 1, "k", "", "10Q")
            .unwrap();
        let header = got.split(LINE_SEPARATOR).next().unwrap();
        assert!(header.starts_with(" 10Q1002022021812350901022  72022"), "{}", header);
    }
}
