use std::borrow::Cow;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::dates::{self, DateError};
use crate::tenq::error::FieldError;
use crate::tenq::layout::{RecordKind, Slot};

/// Separates the lines of a 10Q file.
pub const LINE_SEPARATOR: &str = "\r\n";

/// Digits available for an amount, excluding its sign.
const AMOUNT_DIGITS: usize = 10;

const CPR_LEN: usize = 10;

/// One collection transaction to be written as 10Q records.
///
/// Construct with `Transaction::new`; the remaining fields carry the values
/// the format prescribes for collections and rarely need changing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction<'a> {
    pub cpr_nummer: &'a str,
    /// Amount in whole kroner. Written to the file in øre.
    pub amount_in_dkk: i64,
    /// Reconciliation key, unique per supplier.
    pub afstem_noegle: &'a str,
    /// Free text, one type 26 record per line.
    pub rate_text: &'a str,
    pub leverandoer_ident: &'a str,
    pub sag_nummer: u32,
    pub individ_type: u32,
    pub rate_nummer: u32,
    pub belob_type: u32,
    /// Interest free amount in øre.
    pub rentefri_beloeb: i64,
    pub opkraev_kode: u32,
}

impl<'a> Transaction<'a> {
    pub fn new(
        cpr_nummer: &'a str,
        amount_in_dkk: i64,
        afstem_noegle: &'a str,
        rate_text: &'a str,
        leverandoer_ident: &'a str,
    ) -> Self {
        Self {
            cpr_nummer,
            amount_in_dkk,
            afstem_noegle,
            rate_text,
            leverandoer_ident,
            sag_nummer: 0,
            individ_type: 20,
            rate_nummer: 999,
            belob_type: 1,
            rentefri_beloeb: 0,
            // Net collection.
            opkraev_kode: 1,
        }
    }
}

/// Writes collection transactions in the 10Q format.
///
/// All transactions written by one writer share its due date, year and
/// timestamp. The writer is never mutated after construction, so it can be
/// shared between threads.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionWriter {
    due_date: NaiveDate,
    year: i32,
    timestamp: NaiveDateTime,
    last_payment_date: NaiveDate,
    opkraev_date: NaiveDate,
    interest_date: NaiveDate,
    creation_date: NaiveDate,
    period_from: NaiveDate,
    period_to: NaiveDate,
    faktura_no: String,
    bruger_nummer: String,
    betal_art: u32,
    omraade_nummer: u32,
}

impl TransactionWriter {
    /// Creates a writer with the default values for everything but the due
    /// date, year and timestamp. The timestamp is written using its own wall
    /// clock time.
    pub fn new<A: TimeZone, B: TimeZone>(
        due_date: &DateTime<A>,
        year: i32,
        timestamp: &DateTime<B>,
    ) -> Result<Self, DateError> {
        Self::builder(due_date.date_naive(), year)
            .timestamp(timestamp)
            .build()
    }

    /// Starts declarative creation of a `TransactionWriter`.
    pub fn builder(due_date: NaiveDate, year: i32) -> TransactionWriterBuilder {
        TransactionWriterBuilder::new(due_date, year)
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn last_payment_date(&self) -> NaiveDate {
        self.last_payment_date
    }

    /// Serializes one transaction into CRLF separated 10Q lines.
    ///
    /// Every field is validated before anything is returned; a value that
    /// does not fit its column fails the whole transaction.
    pub fn serialize_transaction(
        &self,
        cpr_nummer: &str,
        amount_in_dkk: i64,
        afstem_noegle: &str,
        rate_text: &str,
        leverandoer_ident: &str,
    ) -> Result<String, FieldError> {
        self.serialize(&Transaction::new(
            cpr_nummer,
            amount_in_dkk,
            afstem_noegle,
            rate_text,
            leverandoer_ident,
        ))
    }

    pub fn serialize(&self, trn: &Transaction) -> Result<String, FieldError> {
        let values = LineValues::new(self, trn)?;

        let mut lines = vec![
            values.render(RecordKind::Debtor, None)?,
            values.render(RecordKind::Amount, None)?,
        ];
        for (index, text) in split_lines(trn.rate_text).into_iter().enumerate() {
            check_text_line(text)?;
            lines.push(values.render(RecordKind::Text, Some((index + 1, text)))?);
        }

        Ok(lines.join(LINE_SEPARATOR))
    }
}

pub struct TransactionWriterBuilder {
    due_date: NaiveDate,
    year: i32,
    timestamp: Option<NaiveDateTime>,
    last_payment_date: Option<NaiveDate>,
    opkraev_date: Option<NaiveDate>,
    interest_date: Option<NaiveDate>,
    creation_date: Option<NaiveDate>,
    period_from: Option<NaiveDate>,
    period_to: Option<NaiveDate>,
    faktura_no: String,
    bruger_nummer: String,
    betal_art: u32,
    omraade_nummer: Option<u32>,
}

impl TransactionWriterBuilder {
    fn new(due_date: NaiveDate, year: i32) -> Self {
        Self {
            due_date,
            year,
            timestamp: None,
            last_payment_date: None,
            opkraev_date: None,
            interest_date: None,
            creation_date: None,
            period_from: None,
            period_to: None,
            faktura_no: String::new(),
            bruger_nummer: "0900".to_string(),
            betal_art: 209,
            omraade_nummer: None,
        }
    }

    /// Sets the file timestamp. Defaults to the current time in UTC.
    pub fn timestamp<Tz: TimeZone>(mut self, timestamp: &DateTime<Tz>) -> Self {
        self.timestamp = Some(timestamp.naive_local());
        self
    }

    /// Defaults to the last payment date derived from the due date.
    pub fn last_payment_date(mut self, date: NaiveDate) -> Self {
        self.last_payment_date = Some(date);
        self
    }

    /// Defaults to the last payment date.
    pub fn opkraev_date(mut self, date: NaiveDate) -> Self {
        self.opkraev_date = Some(date);
        self
    }

    /// Defaults to the last payment date.
    pub fn interest_date(mut self, date: NaiveDate) -> Self {
        self.interest_date = Some(date);
        self
    }

    /// Defaults to the due date.
    pub fn creation_date(mut self, date: NaiveDate) -> Self {
        self.creation_date = Some(date);
        self
    }

    /// Defaults to the 1st of January and 31st of December of the year.
    pub fn period(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.period_from = Some(from);
        self.period_to = Some(to);
        self
    }

    pub fn faktura_no(mut self, faktura_no: &str) -> Self {
        self.faktura_no = faktura_no.to_string();
        self
    }

    pub fn bruger_nummer(mut self, bruger_nummer: &str) -> Self {
        self.bruger_nummer = bruger_nummer.to_string();
        self
    }

    pub fn betal_art(mut self, betal_art: u32) -> Self {
        self.betal_art = betal_art;
        self
    }

    /// Defaults to the year, as agreed with the receiving system.
    pub fn omraade_nummer(mut self, omraade_nummer: u32) -> Self {
        self.omraade_nummer = Some(omraade_nummer);
        self
    }

    pub fn build(self) -> Result<TransactionWriter, DateError> {
        let year_bound = |month, day| {
            NaiveDate::from_ymd_opt(self.year, month, day).ok_or_else(|| DateError::OutOfRange {
                rule: "accounting period",
                reference: self.year.to_string(),
            })
        };

        let last_payment_date = match self.last_payment_date {
            Some(date) => date,
            None => dates::get_last_payment_date_from_due_date(&self.due_date)?,
        };
        let period_from = match self.period_from {
            Some(date) => date,
            None => year_bound(1, 1)?,
        };
        let period_to = match self.period_to {
            Some(date) => date,
            None => year_bound(12, 31)?,
        };

        Ok(TransactionWriter {
            due_date: self.due_date,
            year: self.year,
            timestamp: self.timestamp.unwrap_or_else(|| Utc::now().naive_utc()),
            last_payment_date,
            opkraev_date: self.opkraev_date.unwrap_or(last_payment_date),
            interest_date: self.interest_date.unwrap_or(last_payment_date),
            creation_date: self.creation_date.unwrap_or(self.due_date),
            period_from,
            period_to,
            faktura_no: self.faktura_no,
            bruger_nummer: self.bruger_nummer,
            betal_art: self.betal_art,
            omraade_nummer: self
                .omraade_nummer
                .unwrap_or_else(|| self.year.unsigned_abs()),
        })
    }
}

/// Formatted values of a single transaction, ready to be laid out.
struct LineValues<'a> {
    writer: &'a TransactionWriter,
    trn: &'a Transaction<'a>,
    rate_beloeb: String,
    rentefri_beloeb: String,
}

impl<'a> LineValues<'a> {
    fn new(writer: &'a TransactionWriter, trn: &'a Transaction<'a>) -> Result<Self, FieldError> {
        check_cpr(trn.cpr_nummer)?;
        let oere = trn
            .amount_in_dkk
            .checked_mul(100)
            .ok_or_else(|| FieldError::Overflow {
                field: Slot::RateBeloeb.name(),
                value: trn.amount_in_dkk.to_string(),
                width: AMOUNT_DIGITS,
            })?;

        Ok(Self {
            writer,
            trn,
            rate_beloeb: format_amount(Slot::RateBeloeb, oere)?,
            rentefri_beloeb: format_amount(Slot::RentefriBeloeb, trn.rentefri_beloeb)?,
        })
    }

    fn render(
        &self,
        kind: RecordKind,
        text_line: Option<(usize, &str)>,
    ) -> Result<String, FieldError> {
        let mut out = String::new();
        for field in kind.layout() {
            let value = self.value(field.slot, kind, text_line);
            field.render(&value, &mut out)?;
        }
        Ok(out)
    }

    fn value<'b>(
        &'b self,
        slot: Slot,
        kind: RecordKind,
        text_line: Option<(usize, &'b str)>,
    ) -> Cow<'b, str> {
        use Slot::*;
        let w = self.writer;
        let trn = self.trn;
        match slot {
            LeverandoerIdent => trn.leverandoer_ident.into(),
            TransType => kind.code().into(),
            TimeStamp => w.timestamp.format("0%Y%m%d%H%M").to_string().into(),
            BrugerNummer => w.bruger_nummer.as_str().into(),
            OmraadeNummer => format!("{:03}", w.omraade_nummer % 1000).into(),
            BetalArt => w.betal_art.to_string().into(),
            PaalignAar => w.year.to_string().into(),
            DebitorNummer | PersonNummer => trn.cpr_nummer.into(),
            SagNummer => trn.sag_nummer.to_string().into(),
            IndividType => trn.individ_type.to_string().into(),
            RateNummer => trn.rate_nummer.to_string().into(),
            RateBeloeb => self.rate_beloeb.clone().into(),
            BelobType => trn.belob_type.to_string().into(),
            RentefriBeloeb => self.rentefri_beloeb.clone().into(),
            OpkraevKode => trn.opkraev_kode.to_string().into(),
            // The receiving system reads the collection and due date fields
            // with swapped meanings; this assignment yields the right dates.
            OpkraevDato => format_date(w.opkraev_date).into(),
            ForfaldDato => format_date(w.due_date).into(),
            BetalDato => format_date(w.last_payment_date).into(),
            RentefriDato => format_date(w.interest_date).into(),
            TekstNummer => "000".into(),
            FakturaNo => w.faktura_no.as_str().into(),
            StiftelseDato => format_date(w.creation_date).into(),
            FraPeriode => format_date(w.period_from).into(),
            TilPeriode => format_date(w.period_to).into(),
            RateSpec | SletMark | AedringAarsagKode | AedringAarsagTekst => "".into(),
            AfstemNoegle => trn.afstem_noegle.into(),
            LineNumber => text_line
                .map(|(n, _)| n.to_string())
                .unwrap_or_default()
                .into(),
            RateText => text_line.map(|(_, text)| text).unwrap_or_default().into(),
        }
    }
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Splits free text into lines at any line break, including a bare `\r`. A
/// trailing line break does not start another line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.find(is_line_break) {
            Some(i) => {
                lines.push(&rest[..i]);
                let tail = &rest[i..];
                let len = if tail.starts_with("\r\n") {
                    2
                } else {
                    tail.chars().next().map_or(1, char::len_utf8)
                };
                rest = &tail[len..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

/// Text lines are written verbatim, so they must not carry anything that
/// disturbs the record framing.
fn check_text_line(text: &str) -> Result<(), FieldError> {
    if text.chars().any(|c| c.is_control() && c != '\t') {
        return Err(FieldError::Malformed {
            field: Slot::RateText.name(),
            value: text.to_string(),
            reason: "contains control characters",
        });
    }
    Ok(())
}

fn check_cpr(cpr_nummer: &str) -> Result<(), FieldError> {
    if cpr_nummer.chars().count() > CPR_LEN {
        return Err(FieldError::Overflow {
            field: Slot::DebitorNummer.name(),
            value: cpr_nummer.to_string(),
            width: CPR_LEN,
        });
    }
    if cpr_nummer.len() != CPR_LEN || !cpr_nummer.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::Malformed {
            field: Slot::DebitorNummer.name(),
            value: cpr_nummer.to_string(),
            reason: "expected exactly 10 decimal digits",
        });
    }
    Ok(())
}

/// Formats an amount in øre as ten zero filled digits followed by its sign.
fn format_amount(slot: Slot, oere: i64) -> Result<String, FieldError> {
    let digits = oere.unsigned_abs().to_string();
    if digits.len() > AMOUNT_DIGITS {
        return Err(FieldError::Overflow {
            field: slot.name(),
            value: oere.to_string(),
            width: AMOUNT_DIGITS,
        });
    }
    let sign = if oere < 0 { '-' } else { '+' };
    Ok(format!("{:0>width$}{}", digits, sign, width = AMOUNT_DIGITS))
}

fn format_date(date: NaiveDate) -> String {
    format!("{:04}{:02}{:02}", date.year(), date.month(), date.day())
}
