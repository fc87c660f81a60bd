//! Column layout of the 10Q record types.
//!
//! Every record starts with the same common fields, followed by the fields of
//! its record type. Fields are right justified in their columns, except the
//! free text of type 26 records, which is appended as is at the end of the
//! line. The same tables drive both writing and reading.

use std::fmt;

use crate::tenq::error::FieldError;

/// Names a field of a 10Q record.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Slot {
    LeverandoerIdent,
    TransType,
    TimeStamp,
    BrugerNummer,
    OmraadeNummer,
    BetalArt,
    PaalignAar,
    DebitorNummer,
    SagNummer,
    PersonNummer,
    IndividType,
    RateNummer,
    RateBeloeb,
    BelobType,
    RentefriBeloeb,
    OpkraevKode,
    OpkraevDato,
    ForfaldDato,
    BetalDato,
    RentefriDato,
    TekstNummer,
    RateSpec,
    SletMark,
    FakturaNo,
    StiftelseDato,
    FraPeriode,
    TilPeriode,
    AedringAarsagKode,
    AedringAarsagTekst,
    AfstemNoegle,
    LineNumber,
    RateText,
}

impl Slot {
    /// The field name used by the 10Q format documentation.
    pub fn name(self) -> &'static str {
        use Slot::*;
        match self {
            LeverandoerIdent => "leverandoer_ident",
            TransType => "trans_type",
            TimeStamp => "time_stamp",
            BrugerNummer => "bruger_nummer",
            OmraadeNummer => "omraade_nummer",
            BetalArt => "betal_art",
            PaalignAar => "paalign_aar",
            DebitorNummer => "debitor_nummer",
            SagNummer => "sag_nummer",
            PersonNummer => "person_nummer",
            IndividType => "individ_type",
            RateNummer => "rate_nummer",
            RateBeloeb => "rate_beloeb",
            BelobType => "belob_type",
            RentefriBeloeb => "rentefri_beloeb",
            OpkraevKode => "opkraev_kode",
            OpkraevDato => "opkraev_dato",
            ForfaldDato => "forfald_dato",
            BetalDato => "betal_dato",
            RentefriDato => "rentefri_dato",
            TekstNummer => "tekst_nummer",
            RateSpec => "rate_spec",
            SletMark => "slet_mark",
            FakturaNo => "faktura_no",
            StiftelseDato => "stiftelse_dato",
            FraPeriode => "fra_periode",
            TilPeriode => "til_periode",
            AedringAarsagKode => "aedring_aarsag_kode",
            AedringAarsagTekst => "aedring_aarsag_tekst",
            AfstemNoegle => "afstem_noegle",
            LineNumber => "line_number",
            RateText => "rate_text",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a value is placed in its column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fill {
    /// Right justified, padded with spaces.
    Space,
    /// Right justified, padded with zeros. The value must be decimal digits.
    Zero,
    /// Appended without padding. Only valid as the last field of a line.
    Trailing,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Field {
    pub slot: Slot,
    /// Number of columns the field occupies.
    pub width: usize,
    /// Longest value accepted, which may be narrower than the column.
    pub max_len: usize,
    pub fill: Fill,
}

const fn field(slot: Slot, width: usize, fill: Fill) -> Field {
    Field {
        slot,
        width,
        max_len: width,
        fill,
    }
}

/// A space filled field whose values are limited to fewer characters than its
/// column is wide.
const fn capped(slot: Slot, width: usize, max_len: usize) -> Field {
    Field {
        slot,
        width,
        max_len,
        fill: Fill::Space,
    }
}

impl Field {
    /// Appends `value` to `out`, justified and padded to the field width.
    pub fn render(&self, value: &str, out: &mut String) -> Result<(), FieldError> {
        let len = value.chars().count();
        if len > self.max_len {
            return Err(FieldError::Overflow {
                field: self.slot.name(),
                value: value.to_string(),
                width: self.max_len,
            });
        }

        let pad = match self.fill {
            Fill::Space => ' ',
            Fill::Zero => {
                if !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(FieldError::Malformed {
                        field: self.slot.name(),
                        value: value.to_string(),
                        reason: "expected decimal digits",
                    });
                }
                '0'
            }
            Fill::Trailing => {
                out.push_str(value);
                return Ok(());
            }
        };
        out.extend(std::iter::repeat(pad).take(self.width - len));
        out.push_str(value);
        Ok(())
    }
}

/// Expands to a layout: the fields common to every record type followed by
/// the given fields.
macro_rules! layout {
    ($($extra:expr),* $(,)?) => {
        &[
            capped(Slot::LeverandoerIdent, 4, 3),
            field(Slot::TransType, 2, Fill::Zero),
            // Normally 12 characters, the format prefixes the timestamp with a zero.
            field(Slot::TimeStamp, 13, Fill::Space),
            field(Slot::BrugerNummer, 4, Fill::Space),
            field(Slot::OmraadeNummer, 3, Fill::Space),
            field(Slot::BetalArt, 3, Fill::Space),
            field(Slot::PaalignAar, 4, Fill::Space),
            field(Slot::DebitorNummer, 10, Fill::Space),
            field(Slot::SagNummer, 2, Fill::Zero),
            $($extra),*
        ]
    };
}

const DEBTOR_LAYOUT: &[Field] = layout![field(Slot::PersonNummer, 10, Fill::Space)];

const AMOUNT_LAYOUT: &[Field] = layout![
    field(Slot::IndividType, 2, Fill::Zero),
    field(Slot::RateNummer, 3, Fill::Zero),
    field(Slot::RateBeloeb, 11, Fill::Space),
    field(Slot::BelobType, 1, Fill::Space),
    field(Slot::RentefriBeloeb, 11, Fill::Space),
    field(Slot::OpkraevKode, 1, Fill::Space),
    field(Slot::OpkraevDato, 8, Fill::Space),
    field(Slot::ForfaldDato, 8, Fill::Space),
    field(Slot::BetalDato, 8, Fill::Space),
    field(Slot::RentefriDato, 8, Fill::Space),
    field(Slot::TekstNummer, 3, Fill::Zero),
    field(Slot::RateSpec, 3, Fill::Space),
    field(Slot::SletMark, 1, Fill::Space),
    field(Slot::FakturaNo, 35, Fill::Space),
    field(Slot::StiftelseDato, 8, Fill::Space),
    field(Slot::FraPeriode, 8, Fill::Space),
    field(Slot::TilPeriode, 8, Fill::Space),
    field(Slot::AedringAarsagKode, 4, Fill::Space),
    field(Slot::AedringAarsagTekst, 100, Fill::Space),
    capped(Slot::AfstemNoegle, 35, 32),
];

const TEXT_LAYOUT: &[Field] = layout![
    field(Slot::IndividType, 2, Fill::Zero),
    field(Slot::RateNummer, 3, Fill::Zero),
    field(Slot::LineNumber, 3, Fill::Zero),
    field(Slot::RateText, 60, Fill::Trailing),
];

/// The 10Q record types written for a collection transaction.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RecordKind {
    /// Type 10: identifies the debtor.
    Debtor,
    /// Type 24: the amount and its dates.
    Amount,
    /// Type 26: one line of free text.
    Text,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [RecordKind::Debtor, RecordKind::Amount, RecordKind::Text];

    /// The two digit transaction type code.
    pub fn code(self) -> &'static str {
        use RecordKind::*;
        match self {
            Debtor => "10",
            Amount => "24",
            Text => "26",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    pub fn layout(self) -> &'static [Field] {
        use RecordKind::*;
        match self {
            Debtor => DEBTOR_LAYOUT,
            Amount => AMOUNT_LAYOUT,
            Text => TEXT_LAYOUT,
        }
    }

    /// Column range of the transaction type code, shared by all record types.
    pub fn code_columns() -> std::ops::Range<usize> {
        let start = DEBTOR_LAYOUT[0].width;
        start..start + DEBTOR_LAYOUT[1].width
    }
}
