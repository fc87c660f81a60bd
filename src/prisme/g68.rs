//! G68 payout transactions.
//!
//! A line starts with the fixed fields (registration place, interface type,
//! line number, transaction type and the floating marker) followed by
//! floating fields `&NN<value>` in ascending id order.

use chrono::NaiveDate;
use textwrap::core::{break_words, Word};
use textwrap::wrap_algorithms::wrap_first_fit;
use textwrap::WordSeparator;

use crate::prisme::{check_text, format_date, zero_filled, FIELD_SEPARATOR};
use crate::tenq::FieldError;

/// Characters a G68 text field may not contain.
const ILLEGAL_TEXT: &[char] = &[FIELD_SEPARATOR, '!', '\\'];

const TEXT_LINE_WIDTH: usize = 81;
const FIRST_TEXT_ID: u32 = 40;
const LAST_TEXT_ID: u32 = 75;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionType {
    AndenDestinationTilladt = 1,
    TvungenDestination = 10,
}

/// What kind of number identifies the recipient.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecipientType {
    KreditorKontonummer = 1,
    Cpr = 2,
    Se = 3,
    Cvr = 11,
}

/// One payout to be written as a G68 line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct G68Payout<'a> {
    pub transaction_type: TransactionType,
    pub recipient_type: RecipientType,
    /// CPR, CVR, SE or creditor account number, digits only.
    pub recipient: &'a str,
    /// Amount in whole kroner.
    pub amount_in_dkk: i64,
    pub payment_date: NaiveDate,
    pub posting_date: NaiveDate,
    /// Free text, wrapped over up to 36 lines.
    pub text: &'a str,
}

/// Writes G68 lines for one file. Every written payout takes the next line
/// number.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct G68TransactionWriter {
    registreringssted: u32,
    organisationsenhed: u32,
    maskinnummer: u32,
    line_no: u32,
}

impl G68TransactionWriter {
    pub fn new(registreringssted: u32, organisationsenhed: u32, maskinnummer: Option<u32>) -> Self {
        Self {
            registreringssted,
            organisationsenhed,
            maskinnummer: maskinnummer.unwrap_or(0),
            line_no: 1,
        }
    }

    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn serialize_transaction(&mut self, payout: &G68Payout) -> Result<String, FieldError> {
        let line_no = zero_filled("linjeloebenummer", self.line_no, 5)?;

        let mut out = String::new();
        out.push_str(&zero_filled("registreringssted", self.registreringssted, 3)?);
        out.push_str("G68");
        out.push_str(&line_no);
        out.push_str(&zero_filled(
            "transaktionstype",
            payout.transaction_type as u32,
            2,
        )?);
        // Floating fields follow.
        out.push('1');

        let oere = payout
            .amount_in_dkk
            .checked_mul(100)
            .ok_or_else(|| FieldError::Overflow {
                field: "udbetalingsbeloeb",
                value: payout.amount_in_dkk.to_string(),
                width: 11,
            })?;
        let posting_reference = format!(
            "{}{}{}",
            format_date(payout.posting_date),
            zero_filled("maskinnummer", self.maskinnummer, 5)?,
            line_no
        );

        let fields = [
            (2, zero_filled("organisationsenhed", self.organisationsenhed, 4)?),
            (3, "00".to_string()),
            (7, "0".repeat(18)),
            (8, zero_filled("udbetalingsbeloeb", oere.unsigned_abs(), 11)?),
            (9, if oere < 0 { "-" } else { "+" }.to_string()),
            (10, zero_filled("udbetalingsberettiget_ident_kode", payout.recipient_type as u32, 2)?),
            (11, recipient(payout.recipient)?),
            (12, format_date(payout.payment_date)),
            (16, posting_reference),
        ];
        for (id, value) in fields {
            floating(&mut out, id, &value);
        }
        for (id, line) in (FIRST_TEXT_ID..).zip(text_lines(payout.text)?) {
            floating(&mut out, id, &line);
        }

        self.line_no += 1;
        Ok(out)
    }
}

fn floating(out: &mut String, id: u32, value: &str) {
    out.push(FIELD_SEPARATOR);
    out.push_str(&format!("{:02}", id));
    out.push_str(value);
}

fn recipient(recipient: &str) -> Result<String, FieldError> {
    if recipient.is_empty() || !recipient.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::Malformed {
            field: "udbetalingsberettiget",
            value: recipient.to_string(),
            reason: "expected decimal digits",
        });
    }
    let digits = match recipient.trim_start_matches('0') {
        "" => "0",
        digits => digits,
    };
    zero_filled("udbetalingsberettiget", digits, 14)
}

/// Wraps the payout text into lines of at most 81 characters. Whitespace is
/// kept, so the lines join back into the original text.
fn text_lines(text: &str) -> Result<Vec<String>, FieldError> {
    check_text("betalingstekst", text, ILLEGAL_TEXT)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let words: Vec<Word> = break_words(WordSeparator::AsciiSpace.find_words(text), TEXT_LINE_WIDTH);
    let lines: Vec<String> = wrap_first_fit(&words, &[TEXT_LINE_WIDTH as f64])
        .into_iter()
        .map(|line| {
            let mut s: String = line
                .iter()
                .flat_map(|w| [w.word, w.whitespace])
                .collect();
            while s.chars().count() > TEXT_LINE_WIDTH && s.ends_with(' ') {
                s.pop();
            }
            s
        })
        .collect();

    let max_lines = (LAST_TEXT_ID - FIRST_TEXT_ID + 1) as usize;
    if lines.len() > max_lines {
        return Err(FieldError::Malformed {
            field: "betalingstekst",
            value: text.to_string(),
            reason: "needs more than 36 lines of 81 characters",
        });
    }
    Ok(lines)
}
