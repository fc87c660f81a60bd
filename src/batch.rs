//! Collects pending payments into one 10Q file and hands it to a transport.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::encoding::{self, EncodingError};
use crate::tenq::{FieldError, TransactionWriter, LINE_SEPARATOR};
use crate::transport::{FileTransport, TransportError};

/// A payment waiting to be sent to the receiving system.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PendingPayment {
    pub cpr_nummer: String,
    pub amount_in_dkk: i64,
    pub afstem_noegle: String,
    pub rate_text: String,
    pub leverandoer_ident: String,
    /// When the payment was included in a delivered file.
    pub sent: Option<DateTime<Utc>>,
}

/// What to do when part of a batch fails.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum ErrorPolicy {
    /// Skip payments that cannot be written and report a failed transfer
    /// without failing the job.
    #[default]
    ContinueOnError,
    /// Fail the job on the first payment that cannot be written, or when the
    /// transfer fails.
    AbortOnError,
}

impl FromStr for ErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        use ErrorPolicy::*;
        match s {
            "continue-on-error" => Ok(ContinueOnError),
            "abort-on-error" => Ok(AbortOnError),
            _ => bail!(
                "unknown error policy {:?}, want continue-on-error or abort-on-error",
                s
            ),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorPolicy::*;
        f.write_str(match self {
            ContinueOnError => "continue-on-error",
            AbortOnError => "abort-on-error",
        })
    }
}

/// Why a single payment could not be written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("payment {index} ({afstem_noegle}) cannot be written")]
    Payment {
        index: usize,
        afstem_noegle: String,
        #[source]
        source: PaymentError,
    },
    #[error("transferring {filename}")]
    Transport {
        filename: String,
        #[source]
        source: TransportError,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkippedPayment {
    pub index: usize,
    pub afstem_noegle: String,
    pub error: PaymentError,
}

/// The encoded content of a batch and the payments it contains.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Assembled {
    pub content: Vec<u8>,
    /// Indices of the payments included in `content`.
    pub included: Vec<usize>,
    pub skipped: Vec<SkippedPayment>,
}

/// Serializes and encodes every unsent payment.
///
/// Nothing is transferred here, so a failure under `AbortOnError` leaves no
/// trace on the receiving side.
pub fn assemble(
    writer: &TransactionWriter,
    policy: ErrorPolicy,
    payments: &[PendingPayment],
) -> Result<Assembled, BatchError> {
    let mut assembled = Assembled::default();

    for (index, payment) in payments.iter().enumerate() {
        if payment.sent.is_some() {
            continue;
        }
        match encode_payment(writer, payment) {
            Ok(bytes) => {
                if !assembled.content.is_empty() {
                    assembled
                        .content
                        .extend_from_slice(LINE_SEPARATOR.as_bytes());
                }
                assembled.content.extend(bytes);
                assembled.included.push(index);
            }
            Err(source) => match policy {
                ErrorPolicy::ContinueOnError => {
                    warn!(
                        index,
                        afstem_noegle = %payment.afstem_noegle,
                        error = %source,
                        "skipping payment"
                    );
                    assembled.skipped.push(SkippedPayment {
                        index,
                        afstem_noegle: payment.afstem_noegle.clone(),
                        error: source,
                    });
                }
                ErrorPolicy::AbortOnError => {
                    return Err(BatchError::Payment {
                        index,
                        afstem_noegle: payment.afstem_noegle.clone(),
                        source,
                    })
                }
            },
        }
    }

    Ok(assembled)
}

fn encode_payment(
    writer: &TransactionWriter,
    payment: &PendingPayment,
) -> Result<Vec<u8>, PaymentError> {
    let text = writer.serialize_transaction(
        &payment.cpr_nummer,
        payment.amount_in_dkk,
        &payment.afstem_noegle,
        &payment.rate_text,
        &payment.leverandoer_ident,
    )?;
    Ok(encoding::encode(&text)?)
}

/// Name of the file a batch is delivered as.
pub fn batch_filename(prefix: &str, timestamp: NaiveDateTime) -> String {
    format!("{}_{}.txt", prefix, timestamp.format("%Y%m%d%H%M%S"))
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchReport {
    pub filename: String,
    /// Indices of the payments that were delivered.
    pub sent: Vec<usize>,
    pub skipped: Vec<SkippedPayment>,
    /// Set when the transfer failed under `ContinueOnError`.
    pub transfer_error: Option<String>,
}

/// Sends all unsent payments as one file over one transfer.
pub struct BatchJob<'a, T: FileTransport + ?Sized> {
    writer: &'a TransactionWriter,
    transport: &'a T,
    policy: ErrorPolicy,
    destination_folder: String,
    filename: String,
}

impl<'a, T: FileTransport + ?Sized> BatchJob<'a, T> {
    pub fn new(
        writer: &'a TransactionWriter,
        transport: &'a T,
        policy: ErrorPolicy,
        destination_folder: &str,
        filename: &str,
    ) -> Self {
        Self {
            writer,
            transport,
            policy,
            destination_folder: destination_folder.to_string(),
            filename: filename.to_string(),
        }
    }

    /// Runs the batch. Payments in the delivered file get `sent` set to
    /// `now`; no payment is marked when the transfer fails.
    pub fn run(
        &self,
        payments: &mut [PendingPayment],
        now: DateTime<Utc>,
    ) -> Result<BatchReport, BatchError> {
        let assembled = assemble(self.writer, self.policy, payments)?;
        let mut report = BatchReport {
            filename: self.filename.clone(),
            skipped: assembled.skipped,
            ..Default::default()
        };

        if assembled.included.is_empty() {
            info!("no payments to send");
            return Ok(report);
        }

        info!(
            payments = assembled.included.len(),
            bytes = assembled.content.len(),
            folder = %self.destination_folder,
            filename = %self.filename,
            "sending batch"
        );
        let mut progress = |sent: u64, total: u64| debug!(sent, total, "transfer progress");
        let result = self.transport.put_file(
            &assembled.content,
            &self.destination_folder,
            &self.filename,
            Some(&mut progress),
        );

        match result {
            Ok(()) => {
                for &index in &assembled.included {
                    payments[index].sent = Some(now);
                }
                report.sent = assembled.included;
            }
            Err(source) => match self.policy {
                ErrorPolicy::ContinueOnError => {
                    error!(filename = %self.filename, error = %source, "transfer failed");
                    report.transfer_error = Some(source.to_string());
                }
                ErrorPolicy::AbortOnError => {
                    return Err(BatchError::Transport {
                        filename: self.filename.clone(),
                        source,
                    })
                }
            },
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use chrono::{NaiveDate, TimeZone};

    use crate::transport::Progress;

    const KEY: &str = "e688d6a6fc65424483819520bbbe7745";

    /// Records transfers in memory, optionally failing them.
    #[derive(Default)]
    struct RecordingTransport {
        fail: bool,
        files: RefCell<Vec<(String, String, Vec<u8>)>>,
    }

    impl FileTransport for RecordingTransport {
        fn put_file(
            &self,
            content: &[u8],
            destination_folder: &str,
            destination_filename: &str,
            progress: Option<Progress>,
        ) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Connection {
                    root: "sftp.example".into(),
                });
            }
            if let Some(progress) = progress {
                progress(content.len() as u64, content.len() as u64);
            }
            self.files.borrow_mut().push((
                destination_folder.to_string(),
                destination_filename.to_string(),
                content.to_vec(),
            ));
            Ok(())
        }
    }

    fn writer() -> TransactionWriter {
        TransactionWriter::builder(NaiveDate::from_ymd_opt(2022, 2, 18).unwrap(), 2022)
            .timestamp(&Utc.with_ymd_and_hms(2022, 2, 18, 12, 35, 57).unwrap())
            .build()
            .unwrap()
    }

    fn payment(cpr: &str, rate_text: &str) -> PendingPayment {
        PendingPayment {
            cpr_nummer: cpr.to_string(),
            amount_in_dkk: 1000,
            afstem_noegle: KEY.to_string(),
            rate_text: rate_text.to_string(),
            leverandoer_ident: "10Q".to_string(),
            sent: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 2, 18, 13, 0, 0).unwrap()
    }

    #[test]
    fn sends_one_file() {
        let transport = RecordingTransport::default();
        let w = writer();
        let job = BatchJob::new(&w, &transport, ErrorPolicy::AbortOnError, "10q", "10Q_x.txt");
        let earlier = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let mut payments = vec![
            payment("1234567890", "one"),
            PendingPayment {
                sent: Some(earlier),
                ..payment("1111111111", "already sent")
            },
            payment("0987654321", "two\nlines"),
        ];

        let report = job.run(&mut payments, now()).unwrap();

        assert_eq!(vec![0, 2], report.sent);
        assert!(report.skipped.is_empty());
        assert_eq!(Some(now()), payments[0].sent);
        assert_eq!(Some(earlier), payments[1].sent);
        assert_eq!(Some(now()), payments[2].sent);

        let files = transport.files.borrow();
        assert_eq!(1, files.len());
        let (folder, name, content) = &files[0];
        assert_eq!("10q", folder);
        assert_eq!("10Q_x.txt", name);
        let text = String::from_utf8(content.clone()).unwrap();
        let want = [
            w.serialize_transaction("1234567890", 1000, KEY, "one", "10Q").unwrap(),
            w.serialize_transaction("0987654321", 1000, KEY, "two\nlines", "10Q").unwrap(),
        ]
        .join(LINE_SEPARATOR);
        crate::assert_text_eq!(want, text);
        assert!(!text.ends_with(LINE_SEPARATOR));
    }

    #[test]
    fn continue_skips_bad_payments() {
        let transport = RecordingTransport::default();
        let w = writer();
        let job = BatchJob::new(&w, &transport, ErrorPolicy::ContinueOnError, "10q", "f.txt");
        let mut payments = vec![
            payment("123", "bad cpr"),
            payment("1234567890", "good"),
            payment("1234567890", "unencodable ĸ"),
        ];

        let report = job.run(&mut payments, now()).unwrap();

        assert_eq!(vec![1], report.sent);
        assert_eq!(
            vec![0, 2],
            report.skipped.iter().map(|s| s.index).collect::<Vec<_>>()
        );
        assert!(matches!(report.skipped[0].error, PaymentError::Field(_)));
        assert!(matches!(report.skipped[1].error, PaymentError::Encoding(_)));
        assert_eq!(None, payments[0].sent);
        assert_eq!(Some(now()), payments[1].sent);
        assert_eq!(None, payments[2].sent);
    }

    #[test]
    fn abort_transfers_nothing() {
        let transport = RecordingTransport::default();
        let w = writer();
        let job = BatchJob::new(&w, &transport, ErrorPolicy::AbortOnError, "10q", "f.txt");
        let mut payments = vec![payment("1234567890", "good"), payment("123", "bad")];

        match job.run(&mut payments, now()) {
            Err(BatchError::Payment { index, .. }) => assert_eq!(1, index),
            other => panic!("expected payment error, got {:?}", other),
        }
        assert!(transport.files.borrow().is_empty());
        assert!(payments.iter().all(|p| p.sent.is_none()));
    }

    #[test]
    fn failed_transfer_marks_nothing() {
        let transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let w = writer();
        let mut payments = vec![payment("1234567890", "good")];

        let job = BatchJob::new(&w, &transport, ErrorPolicy::ContinueOnError, "10q", "f.txt");
        let report = job.run(&mut payments, now()).unwrap();
        assert!(report.sent.is_empty());
        assert!(report.transfer_error.is_some());
        assert_eq!(None, payments[0].sent);

        let job = BatchJob::new(&w, &transport, ErrorPolicy::AbortOnError, "10q", "f.txt");
        match job.run(&mut payments, now()) {
            Err(BatchError::Transport { filename, .. }) => assert_eq!("f.txt", filename),
            other => panic!("expected transport error, got {:?}", other),
        }
        assert_eq!(None, payments[0].sent);
    }

    #[test]
    fn empty_batch_is_not_transferred() {
        let transport = RecordingTransport::default();
        let w = writer();
        let job = BatchJob::new(&w, &transport, ErrorPolicy::AbortOnError, "10q", "f.txt");
        let mut payments = vec![PendingPayment {
            sent: Some(now()),
            ..payment("1234567890", "done")
        }];

        let report = job.run(&mut payments, now()).unwrap();

        assert!(report.sent.is_empty());
        assert!(transport.files.borrow().is_empty());
    }

    #[test]
    fn works_with_dyn_transport() {
        let transport = RecordingTransport::default();
        let dyn_transport: &dyn FileTransport = &transport;
        let w = writer();
        let job = BatchJob::new(&w, dyn_transport, ErrorPolicy::AbortOnError, "10q", "f.txt");
        let mut payments = vec![payment("1234567890", "good")];
        assert_eq!(vec![0], job.run(&mut payments, now()).unwrap().sent);
    }

    #[test]
    fn filename() {
        let ts = NaiveDate::from_ymd_opt(2022, 2, 18)
            .unwrap()
            .and_hms_opt(12, 35, 57)
            .unwrap();
        assert_eq!("10Q_20220218123557.txt", batch_filename("10Q", ts));
    }

    #[test]
    fn policy_from_str() {
        assert_eq!(
            ErrorPolicy::ContinueOnError,
            "continue-on-error".parse::<ErrorPolicy>().unwrap()
        );
        assert_eq!(
            ErrorPolicy::AbortOnError,
            "abort-on-error".parse::<ErrorPolicy>().unwrap()
        );
        assert!("sometimes".parse::<ErrorPolicy>().is_err());
        assert_eq!("abort-on-error", ErrorPolicy::AbortOnError.to_string());
    }

    #[test]
    fn payments_csv_roundtrip() {
        let input = textwrap::dedent(
            r#"
            cpr_nummer,amount_in_dkk,afstem_noegle,rate_text,leverandoer_ident,sent
            1234567890,1000,e688d6a6fc65424483819520bbbe7745,"Testing
            with",10Q,
            0987654321,5,k2,x,10Q,2022-02-18T13:00:00Z
            "#,
        );
        let mut rdr = csv::Reader::from_reader(input.trim_start().as_bytes());
        let payments: Vec<PendingPayment> = rdr.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(2, payments.len());
        assert_eq!("Testing\nwith", payments[0].rate_text);
        assert_eq!(None, payments[0].sent);
        assert_eq!(Some(now()), payments[1].sent);
    }
}
