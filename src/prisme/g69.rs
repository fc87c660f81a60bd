//! G69 posting transactions.
//!
//! A G69 line is a fixed header followed by `&`-separated fields, each
//! introduced by its three digit code. Which fields a transaction carries is
//! up to the caller, within the presence rules the format sets.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::prisme::{check_text, format_date, zero_filled, FIELD_SEPARATOR};
use crate::tenq::{FieldError, LINE_SEPARATOR};

const ORGANISATIONSTYPE: u32 = 1;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PostType {
    #[default]
    Normal,
    Primo,
    Supplement,
}

impl PostType {
    pub fn code(self) -> &'static str {
        use PostType::*;
        match self {
            Normal => "NOR",
            Primo => "PRI",
            Supplement => "SUP",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Kind {
    Text,
    Number,
    Date,
    Amount,
}

/// The value of one G69 field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum G69Value {
    Text(String),
    Number(u64),
    Date(NaiveDate),
    /// An amount in øre.
    Amount(i64),
}

impl From<&str> for G69Value {
    fn from(v: &str) -> Self {
        G69Value::Text(v.to_string())
    }
}

impl From<String> for G69Value {
    fn from(v: String) -> Self {
        G69Value::Text(v)
    }
}

impl From<u64> for G69Value {
    fn from(v: u64) -> Self {
        G69Value::Number(v)
    }
}

impl From<NaiveDate> for G69Value {
    fn from(v: NaiveDate) -> Self {
        G69Value::Date(v)
    }
}

struct Spec {
    code: u16,
    width: usize,
    kind: Kind,
    required: bool,
    /// Zero fill to the full width.
    pad: bool,
}

const fn spec(code: u16, width: usize, kind: Kind, required: bool, pad: bool) -> Spec {
    Spec {
        code,
        width,
        kind,
        required,
        pad,
    }
}

/// Names a field of a G69 transaction. Fields are written in declaration
/// order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum G69Field {
    Kaldenavn,
    Afstemningsenhed,
    Maskinnr,
    EksLoebenr,
    PostDato,
    Kontonr,
    Beloeb,
    DebKred,
    Regnskabsaar,
    BilagArkivNr,
    UdbetHenvNr,
    ValoerDato,
    BetalingModtagerNrkode,
    BetalingModtager,
    YdelseModtagerNrkode,
    YdelseModtager,
    OplysningspligtigNrkode,
    Oplysningspligtig,
    OplysningspligtKode,
    PosteringUdtraekstekst1,
    PosteringUdtraekstekst2,
    PosteringUdtraekskode,
    Posteringstekst,
    Rekvisitionsnr,
    Delleverance,
    Baerer,
    Afdeling,
    Formaal,
    OmvendtBetalingspligt,
    KonteringFakturapulje,
    KonteretAf,
    NotatShort,
    AttesteretAf,
    Emne,
    NotatLong,
    EksternReference,
    IrisNr,
    ProjektNr,
    ProjektArt,
    PrismeMedarbejder,
    Salgspris,
    Antal,
    LinjeEgenskab,
    AktivitetNr,
}

impl G69Field {
    pub const ALL: [G69Field; 44] = {
        use G69Field::*;
        [
            Kaldenavn,
            Afstemningsenhed,
            Maskinnr,
            EksLoebenr,
            PostDato,
            Kontonr,
            Beloeb,
            DebKred,
            Regnskabsaar,
            BilagArkivNr,
            UdbetHenvNr,
            ValoerDato,
            BetalingModtagerNrkode,
            BetalingModtager,
            YdelseModtagerNrkode,
            YdelseModtager,
            OplysningspligtigNrkode,
            Oplysningspligtig,
            OplysningspligtKode,
            PosteringUdtraekstekst1,
            PosteringUdtraekstekst2,
            PosteringUdtraekskode,
            Posteringstekst,
            Rekvisitionsnr,
            Delleverance,
            Baerer,
            Afdeling,
            Formaal,
            OmvendtBetalingspligt,
            KonteringFakturapulje,
            KonteretAf,
            NotatShort,
            AttesteretAf,
            Emne,
            NotatLong,
            EksternReference,
            IrisNr,
            ProjektNr,
            ProjektArt,
            PrismeMedarbejder,
            Salgspris,
            Antal,
            LinjeEgenskab,
            AktivitetNr,
        ]
    };

    pub fn name(self) -> &'static str {
        use G69Field::*;
        match self {
            Kaldenavn => "kaldenavn",
            Afstemningsenhed => "afstemningsenhed",
            Maskinnr => "maskinnr",
            EksLoebenr => "eks_loebenr",
            PostDato => "post_dato",
            Kontonr => "kontonr",
            Beloeb => "beloeb",
            DebKred => "deb_kred",
            Regnskabsaar => "regnskabsaar",
            BilagArkivNr => "bilag_arkiv_nr",
            UdbetHenvNr => "udbet_henv_nr",
            ValoerDato => "valoer_dato",
            BetalingModtagerNrkode => "betaling_modtager_nrkode",
            BetalingModtager => "betaling_modtager",
            YdelseModtagerNrkode => "ydelse_modtager_nrkode",
            YdelseModtager => "ydelse_modtager",
            OplysningspligtigNrkode => "oplysningspligtig_nrkode",
            Oplysningspligtig => "oplysningspligtig",
            OplysningspligtKode => "oplysningspligt_kode",
            PosteringUdtraekstekst1 => "postering_udtraekstekst_1",
            PosteringUdtraekstekst2 => "postering_udtraekstekst_2",
            PosteringUdtraekskode => "postering_udtraekskode",
            Posteringstekst => "posteringstekst",
            Rekvisitionsnr => "rekvisitionsnr",
            Delleverance => "delleverance",
            Baerer => "baerer",
            Afdeling => "afdeling",
            Formaal => "formaal",
            OmvendtBetalingspligt => "omvendt_betalingspligt",
            KonteringFakturapulje => "kontering_fakturapulje",
            KonteretAf => "konteret_af",
            NotatShort => "notat_short",
            AttesteretAf => "attesteret_af",
            Emne => "emne",
            NotatLong => "notat_long",
            EksternReference => "ekstern_reference",
            IrisNr => "iris_nr",
            ProjektNr => "projekt_nr",
            ProjektArt => "projekt_art",
            PrismeMedarbejder => "prisme_medarbejder",
            Salgspris => "salgspris",
            Antal => "antal",
            LinjeEgenskab => "linje_egenskab",
            AktivitetNr => "aktivitet_nr",
        }
    }

    fn spec(self) -> Spec {
        use G69Field::*;
        use Kind::*;
        match self {
            Kaldenavn => spec(101, 10, Text, false, false),
            Afstemningsenhed => spec(102, 5, Text, false, false),
            Maskinnr => spec(103, 5, Number, true, true),
            EksLoebenr => spec(104, 7, Number, true, true),
            PostDato => spec(110, 8, Date, true, true),
            Kontonr => spec(111, 15, Number, true, true),
            Beloeb => spec(112, 13, Amount, true, true),
            DebKred => spec(113, 1, Text, true, false),
            Regnskabsaar => spec(114, 4, Number, false, true),
            BilagArkivNr => spec(116, 255, Text, false, false),
            UdbetHenvNr => spec(117, 20, Number, false, false),
            ValoerDato => spec(118, 8, Date, false, false),
            BetalingModtagerNrkode => spec(130, 2, Number, false, true),
            BetalingModtager => spec(131, 10, Number, false, true),
            YdelseModtagerNrkode => spec(132, 2, Number, false, true),
            // CPR and CVR numbers are written with their leading zeros.
            YdelseModtager => spec(133, 10, Text, false, true),
            OplysningspligtigNrkode => spec(134, 2, Number, false, true),
            Oplysningspligtig => spec(135, 10, Number, false, true),
            OplysningspligtKode => spec(136, 1, Text, false, false),
            PosteringUdtraekstekst1 => spec(150, 5, Text, false, false),
            PosteringUdtraekstekst2 => spec(151, 5, Text, false, false),
            PosteringUdtraekskode => spec(152, 5, Text, false, false),
            Posteringstekst => spec(153, 35, Text, false, false),
            Rekvisitionsnr => spec(170, 10, Number, false, true),
            Delleverance => spec(171, 1, Text, false, false),
            Baerer => spec(180, 10, Text, false, false),
            Afdeling => spec(181, 10, Text, false, false),
            Formaal => spec(182, 10, Text, false, false),
            OmvendtBetalingspligt => spec(185, 2, Number, false, true),
            KonteringFakturapulje => spec(200, 1, Text, false, false),
            KonteretAf => spec(201, 5, Text, false, false),
            NotatShort => spec(202, 200, Text, false, false),
            AttesteretAf => spec(203, 5, Text, false, false),
            Emne => spec(210, 60, Text, false, false),
            NotatLong => spec(211, 1024, Text, false, false),
            EksternReference => spec(250, 20, Text, false, false),
            IrisNr => spec(251, 20, Text, false, false),
            ProjektNr => spec(300, 20, Text, false, false),
            ProjektArt => spec(301, 10, Text, false, false),
            PrismeMedarbejder => spec(302, 10, Text, false, false),
            Salgspris => spec(303, 13, Amount, false, false),
            Antal => spec(304, 10, Amount, false, false),
            LinjeEgenskab => spec(305, 10, Text, false, false),
            AktivitetNr => spec(306, 10, Text, false, false),
        }
    }

    /// Fields that must be present whenever this one is.
    fn requires(self) -> &'static [G69Field] {
        use G69Field::*;
        match self {
            YdelseModtagerNrkode => &[YdelseModtager],
            YdelseModtager => &[YdelseModtagerNrkode],
            Rekvisitionsnr => &[Delleverance],
            Delleverance => &[Rekvisitionsnr],
            Emne => &[NotatLong],
            NotatLong => &[Emne],
            ProjektNr => &[ProjektArt, Antal],
            ProjektArt => &[ProjektNr, Antal],
            PrismeMedarbejder | Salgspris | LinjeEgenskab | AktivitetNr => {
                &[ProjektNr, ProjektArt, Antal]
            }
            Antal => &[ProjektNr, ProjektArt],
            _ => &[],
        }
    }

    /// Fields that may not be present together with this one.
    fn excludes(self) -> &'static [G69Field] {
        use G69Field::*;
        match self {
            Emne | NotatLong => &[BilagArkivNr, KonteringFakturapulje],
            _ => &[],
        }
    }
}

impl fmt::Display for G69Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The fields of one G69 posting.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct G69Transaction {
    values: BTreeMap<G69Field, G69Value>,
}

impl G69Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Into<G69Value>>(mut self, field: G69Field, value: V) -> Self {
        self.values.insert(field, value.into());
        self
    }

    /// Sets an amount field, in øre.
    pub fn amount(self, field: G69Field, oere: i64) -> Self {
        self.set(field, G69Value::Amount(oere))
    }

    pub fn get(&self, field: G69Field) -> Option<&G69Value> {
        self.values.get(&field)
    }

    /// Sets `deb_kred` to `D` for a debit, `K` for a credit.
    pub fn debet(self, is_debet: bool) -> Self {
        self.set(G69Field::DebKred, if is_debet { "D" } else { "K" })
    }

    /// Marks `ydelse_modtager` as a CVR (code 3) or CPR (code 2) number.
    pub fn cvr(self, is_cvr: bool) -> Self {
        self.set(
            G69Field::YdelseModtagerNrkode,
            if is_cvr { 3u64 } else { 2u64 },
        )
    }

    pub fn kontering_fakturapulje(self, yes: bool) -> Self {
        self.set(G69Field::KonteringFakturapulje, if yes { "J" } else { "N" })
    }

    fn check_presence(&self) -> Result<(), FieldError> {
        for field in G69Field::ALL {
            if field.spec().required && !self.values.contains_key(&field) {
                return Err(FieldError::Missing {
                    field: field.name(),
                });
            }
        }
        for field in self.values.keys() {
            if let Some(other) = field
                .requires()
                .iter()
                .find(|&other| !self.values.contains_key(other))
            {
                return Err(FieldError::Requires {
                    field: field.name(),
                    other: other.name(),
                });
            }
            if let Some(other) = field
                .excludes()
                .iter()
                .find(|&other| self.values.contains_key(other))
            {
                return Err(FieldError::Excludes {
                    field: field.name(),
                    other: other.name(),
                });
            }
        }
        Ok(())
    }
}

fn render_value(field: G69Field, value: &G69Value) -> Result<String, FieldError> {
    let spec = field.spec();
    let wrong_kind = || FieldError::Malformed {
        field: field.name(),
        value: format!("{:?}", value),
        reason: "wrong kind of value for this field",
    };

    let text = match (spec.kind, value) {
        (Kind::Text, G69Value::Text(s)) => s.clone(),
        (Kind::Text | Kind::Number, G69Value::Number(n)) => n.to_string(),
        (Kind::Date, G69Value::Date(d)) => format_date(*d),
        (Kind::Amount, G69Value::Amount(oere)) => format_amount(*oere),
        (Kind::Amount, G69Value::Number(kr)) => {
            let oere = i64::try_from(*kr)
                .ok()
                .and_then(|kr| kr.checked_mul(100))
                .ok_or_else(|| FieldError::Overflow {
                    field: field.name(),
                    value: kr.to_string(),
                    width: spec.width,
                })?;
            format_amount(oere)
        }
        _ => return Err(wrong_kind()),
    };

    check_text(field.name(), &text, &[FIELD_SEPARATOR])?;
    if spec.pad {
        zero_filled(field.name(), &text, spec.width)
    } else if text.chars().count() > spec.width {
        Err(FieldError::Overflow {
            field: field.name(),
            value: text,
            width: spec.width,
        })
    } else {
        Ok(text)
    }
}

/// Amounts carry their sign after the digits, a blank for positive amounts.
fn format_amount(oere: i64) -> String {
    let sign = if oere < 0 { '-' } else { ' ' };
    format!("{}{}", oere.unsigned_abs(), sign)
}

/// Writes G69 lines for one file.
///
/// Every written transaction takes the next line number, so use a new
/// writer (or `reset_line_number`) for each file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct G69TransactionWriter {
    registreringssted: u32,
    organisationsenhed: u32,
    line_number: u32,
}

impl G69TransactionWriter {
    pub fn new(registreringssted: u32, organisationsenhed: u32) -> Self {
        Self {
            registreringssted,
            organisationsenhed,
            line_number: 1,
        }
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn reset_line_number(&mut self) {
        self.line_number = 1;
    }

    /// Serializes one posting. The line number only advances when the
    /// posting is written.
    pub fn serialize_transaction(
        &mut self,
        post_type: PostType,
        trn: &G69Transaction,
    ) -> Result<String, FieldError> {
        trn.check_presence()?;

        let mut header = String::new();
        header.push_str(&zero_filled("registreringssted", self.registreringssted, 3)?);
        header.push_str("G69");
        header.push_str(&zero_filled("linjeloebenummer", self.line_number, 5)?);
        header.push_str(&zero_filled("organisationsenhed", self.organisationsenhed, 4)?);
        header.push_str(&zero_filled("organisationstype", ORGANISATIONSTYPE, 2)?);
        header.push_str(post_type.code());
        header.push_str("FLYD");

        let mut fields = vec![header];
        for (&field, value) in &trn.values {
            fields.push(format!("{:03}{}", field.spec().code, render_value(field, value)?));
        }

        self.line_number += 1;
        Ok(fields.join(&FIELD_SEPARATOR.to_string()))
    }

    /// Serializes a posting twice, as a debit and as a credit, on two lines.
    pub fn serialize_transaction_pair(
        &mut self,
        post_type: PostType,
        trn: &G69Transaction,
    ) -> Result<String, FieldError> {
        let start = self.line_number;
        let mut lines = Vec::with_capacity(2);
        for is_debet in [true, false] {
            match self.serialize_transaction(post_type, &trn.clone().debet(is_debet)) {
                Ok(line) => lines.push(line),
                Err(err) => {
                    self.line_number = start;
                    return Err(err);
                }
            }
        }
        Ok(lines.join(LINE_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_case::test_case;

    use G69Field::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn minimal() -> G69Transaction {
        G69Transaction::new()
            .set(Kaldenavn, "test")
            .set(Maskinnr, 123u64)
            .set(EksLoebenr, 1u64)
            .set(PostDato, date(2022, 3, 11))
            .set(Kontonr, 1234005678u64)
            .amount(Beloeb, 12345)
            .set(DebKred, "D")
    }

    fn posting(is_debet: bool) -> G69Transaction {
        minimal()
            .set(Kontonr, 123456789012345u64)
            .debet(is_debet)
            .cvr(true)
            .set(YdelseModtager, 12345678u64)
    }

    #[test]
    fn writes_successive_lines() {
        let mut writer = G69TransactionWriter::new(12, 34);

        let first = writer
            .serialize_transaction(PostType::Normal, &posting(true))
            .unwrap();
        let second = writer
            .serialize_transaction(PostType::Normal, &posting(false))
            .unwrap();

        assert_eq!(
            concat!(
                "012G6900001003401NORFLYD",
                "&101test",
                "&10300123",
                "&1040000001",
                "&11020220311",
                "&111123456789012345",
                "&112000000012345 ",
                "&113D",
                "&13203",
                "&1330012345678",
            ),
            first
        );
        assert_eq!(
            concat!(
                "012G6900002003401NORFLYD",
                "&101test",
                "&10300123",
                "&1040000001",
                "&11020220311",
                "&111123456789012345",
                "&112000000012345 ",
                "&113K",
                "&13203",
                "&1330012345678",
            ),
            second
        );
        assert_eq!(3, writer.line_number());
        writer.reset_line_number();
        assert_eq!(1, writer.line_number());
    }

    #[test]
    fn pair() {
        let mut writer = G69TransactionWriter::new(12, 34);
        let got = writer
            .serialize_transaction_pair(PostType::Supplement, &minimal())
            .unwrap();
        let lines: Vec<&str> = got.split(LINE_SEPARATOR).collect();
        assert_eq!(2, lines.len());
        assert!(lines[0].starts_with("012G6900001003401SUPFLYD"), "{}", lines[0]);
        assert!(lines[0].contains("&113D"), "{}", lines[0]);
        assert!(lines[1].starts_with("012G6900002003401SUPFLYD"), "{}", lines[1]);
        assert!(lines[1].contains("&113K"), "{}", lines[1]);
    }

    #[test]
    fn negative_and_kroner_amounts() {
        let mut writer = G69TransactionWriter::new(12, 34);
        let got = writer
            .serialize_transaction(PostType::Normal, &minimal().amount(Beloeb, -500))
            .unwrap();
        assert!(got.contains("&112000000000500-"), "{}", got);

        let got = writer
            .serialize_transaction(PostType::Normal, &minimal().set(Beloeb, 7u64))
            .unwrap();
        assert!(got.contains("&112000000000700 "), "{}", got);
    }

    #[test]
    fn missing_required_field() {
        let mut writer = G69TransactionWriter::new(12, 34);
        let trn = G69Transaction::new().set(Kaldenavn, "test");
        assert_eq!(
            Err(FieldError::Missing { field: "maskinnr" }),
            writer.serialize_transaction(PostType::Normal, &trn)
        );
        assert_eq!(1, writer.line_number());
    }

    #[test_case(&[YdelseModtagerNrkode, YdelseModtager] ; "ydelse_modtager")]
    #[test_case(&[Rekvisitionsnr, Delleverance] ; "rekvisition")]
    #[test_case(&[ProjektNr, ProjektArt, Antal] ; "projekt")]
    fn required_together(group: &[G69Field]) {
        let value = |field: G69Field| -> G69Value {
            match field {
                Delleverance => "N".into(),
                ProjektNr => "3".into(),
                ProjektArt => "test".into(),
                _ => 3u64.into(),
            }
        };
        let mut writer = G69TransactionWriter::new(12, 34);
        for &field in group {
            let err = writer
                .serialize_transaction(PostType::Normal, &minimal().set(field, value(field)))
                .unwrap_err();
            assert!(matches!(err, FieldError::Requires { .. }), "{}: {:?}", field, err);
        }

        let trn = group
            .iter()
            .fold(minimal(), |trn, &field| trn.set(field, value(field)));
        writer
            .serialize_transaction(PostType::Normal, &trn)
            .unwrap();
    }

    #[test]
    fn mutually_exclusive() {
        let mut writer = G69TransactionWriter::new(12, 34);
        let subject = minimal().set(Emne, "test").set(NotatLong, "test");

        for trn in [
            subject.clone().set(BilagArkivNr, "test"),
            subject.clone().kontering_fakturapulje(true),
        ] {
            let err = writer
                .serialize_transaction(PostType::Normal, &trn)
                .unwrap_err();
            assert!(matches!(err, FieldError::Excludes { .. }), "{:?}", err);
        }
        writer
            .serialize_transaction(PostType::Normal, &subject)
            .unwrap();
    }

    #[test_case(Kaldenavn, G69Value::Date(date(2022, 3, 11)) ; "date_as_text")]
    #[test_case(Maskinnr, G69Value::Text("123".to_string()) ; "text_as_number")]
    #[test_case(PostDato, G69Value::Number(20220311) ; "number_as_date")]
    #[test_case(Beloeb, G69Value::Text("1.00".to_string()) ; "text_as_amount")]
    fn wrong_kind(field: G69Field, value: G69Value) {
        let mut writer = G69TransactionWriter::new(12, 34);
        let err = writer
            .serialize_transaction(PostType::Normal, &minimal().set(field, value))
            .unwrap_err();
        assert!(matches!(err, FieldError::Malformed { .. }), "{:?}", err);
    }

    #[test_case(minimal().set(Kaldenavn, "elleven chr") => "kaldenavn" ; "text_too_long")]
    #[test_case(minimal().set(Maskinnr, 123456u64) => "maskinnr" ; "number_too_long")]
    #[test_case(minimal().amount(Beloeb, 1_000_000_000_000) => "beloeb" ; "amount_too_long")]
    #[test_case(minimal().set(Kaldenavn, "a&b") => "kaldenavn" ; "separator")]
    #[test_case(minimal().set(Posteringstekst, "two\r\nlines") => "posteringstekst" ; "line_break")]
    fn bad_value(trn: G69Transaction) -> &'static str {
        let mut writer = G69TransactionWriter::new(12, 34);
        writer
            .serialize_transaction(PostType::Normal, &trn)
            .unwrap_err()
            .field()
    }

    #[test]
    fn header_overflow() {
        let mut writer = G69TransactionWriter::new(1000, 34);
        let err = writer
            .serialize_transaction(PostType::Normal, &minimal())
            .unwrap_err();
        assert_eq!("registreringssted", err.field());
    }

    #[test]
    fn failed_pair_keeps_line_number() {
        let mut writer = G69TransactionWriter::new(12, 34);
        let trn = G69Transaction::new().set(Kaldenavn, "test");
        assert!(writer
            .serialize_transaction_pair(PostType::Normal, &trn)
            .is_err());
        assert_eq!(1, writer.line_number());
    }

    #[test]
    fn table_codes_are_unique_and_ordered() {
        let codes: Vec<u16> = G69Field::ALL.iter().map(|f| f.spec().code).collect();
        assert!(codes.windows(2).all(|w| w[0] < w[1]), "{:?}", codes);
        let mut sorted = G69Field::ALL;
        sorted.sort();
        assert_eq!(G69Field::ALL, sorted);
    }
}
