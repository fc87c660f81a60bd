//! Reads 10Q files back into their fields, for inspecting files that have
//! been produced or received.

use std::io::Read;

use tracing::warn;

use crate::encoding;
use crate::tenq::layout::{Fill, RecordKind, Slot};

/// One line of a 10Q file, sliced into its fields.
///
/// Values are kept exactly as they appear in the file, padding included.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedRecord {
    pub kind: RecordKind,
    /// 1-based line number within the file.
    pub line_no: usize,
    pub fields: Vec<(Slot, String)>,
}

impl ParsedRecord {
    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.fields
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, v)| v.as_str())
    }
}

/// The records of one transaction: a type 10 record and the records that
/// follow it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParsedTransaction {
    pub records: Vec<ParsedRecord>,
}

impl ParsedTransaction {
    /// Returns the value of the first record that has the field.
    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.records.iter().find_map(|r| r.get(slot))
    }

    pub fn line_numbers(&self) -> Vec<usize> {
        self.records.iter().map(|r| r.line_no).collect()
    }

    /// The free text of the type 26 records, joined by newlines.
    pub fn rate_text(&self) -> String {
        self.records
            .iter()
            .filter(|r| r.kind == RecordKind::Text)
            .filter_map(|r| r.get(Slot::RateText))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Slices a single line according to the layout of its record type. Returns
/// `None` for lines of unknown type.
pub fn parse_line(line: &str, line_no: usize) -> Option<ParsedRecord> {
    let chars: Vec<char> = line.chars().collect();
    let code_columns = RecordKind::code_columns();
    let code: String = chars.get(code_columns)?.iter().collect();
    let kind = RecordKind::from_code(&code)?;

    let mut pos = 0;
    let mut fields = Vec::with_capacity(kind.layout().len());
    for field in kind.layout() {
        let start = pos.min(chars.len());
        let end = match field.fill {
            Fill::Trailing => chars.len(),
            _ => (pos + field.width).min(chars.len()),
        };
        fields.push((field.slot, chars[start..end].iter().collect()));
        pos += field.width;
    }

    Some(ParsedRecord {
        kind,
        line_no,
        fields,
    })
}

/// Parses the text of a 10Q file. A new transaction starts at every type 10
/// record; lines of unknown type are skipped.
pub fn read_transactions(text: &str) -> Vec<ParsedTransaction> {
    let mut transactions = Vec::new();
    let mut current = ParsedTransaction::default();

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.is_empty() {
            continue;
        }
        let record = match parse_line(line, line_no) {
            Some(record) => record,
            None => {
                warn!(line_no, "unrecognized 10Q transaction type");
                continue;
            }
        };
        if record.kind == RecordKind::Debtor && !current.records.is_empty() {
            transactions.push(std::mem::take(&mut current));
        }
        current.records.push(record);
    }

    if !current.records.is_empty() {
        transactions.push(current);
    }
    transactions
}

/// Reads a Windows-1252 encoded 10Q file.
pub fn read_from<R: Read>(r: R) -> std::io::Result<Vec<ParsedTransaction>> {
    let mut text = String::new();
    encoding::decoding_reader(r).read_to_string(&mut text)?;
    Ok(read_transactions(&text))
}
