//! Due date and last payment date rules for 10Q collection transactions.
//!
//! Both dates are defined by law relative to a reference date. The rules work
//! on anything implementing `chrono::Datelike`, so plain dates, naive
//! date-times and timezone aware date-times all keep their time of day and
//! timezone.

use std::fmt;

use chrono::{Datelike, Weekday};
use thiserror::Error;

/// Months between the first of the reference month and the due date ("first
/// of next month plus three months").
const DUE_DATE_MONTHS: u32 = 4;

/// Day of month of the last payment date, before weekend adjustment.
const LAST_PAYMENT_DAY: u32 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("date out of range when calculating {rule} from {reference}")]
    OutOfRange {
        rule: &'static str,
        reference: String,
    },
}

impl DateError {
    fn out_of_range<D: fmt::Debug>(rule: &'static str, reference: &D) -> Self {
        DateError::OutOfRange {
            rule,
            reference: format!("{:?}", reference),
        }
    }
}

/// Returns the due date for the given reference date: the first day of the
/// reference month, four months later.
pub fn get_due_date<D>(reference: &D) -> Result<D, DateError>
where
    D: Datelike + fmt::Debug,
{
    let err = || DateError::out_of_range("due date", reference);

    let first = reference.with_day(1).ok_or_else(err)?;
    let month = first.month() + DUE_DATE_MONTHS;
    if month <= 12 {
        first.with_month(month).ok_or_else(err)
    } else {
        first
            .with_year(first.year() + 1)
            .and_then(|d| d.with_month(month - 12))
            .ok_or_else(err)
    }
}

/// Returns the last payment date for a due date: the 20th of the due date's
/// month, moved forward to Monday when it falls in a weekend.
pub fn get_last_payment_date_from_due_date<D>(due_date: &D) -> Result<D, DateError>
where
    D: Datelike + fmt::Debug,
{
    let err = || DateError::out_of_range("last payment date", due_date);

    let result = due_date.with_day(LAST_PAYMENT_DAY).ok_or_else(err)?;
    match result.weekday() {
        Weekday::Sat | Weekday::Sun => {
            let missing_days = 7 - result.weekday().num_days_from_monday();
            result
                .with_day(LAST_PAYMENT_DAY + missing_days)
                .ok_or_else(err)
        }
        _ => Ok(result),
    }
}

/// Returns the last payment date for the given reference date.
pub fn get_last_payment_date<D>(reference: &D) -> Result<D, DateError>
where
    D: Datelike + fmt::Debug,
{
    get_last_payment_date_from_due_date(&get_due_date(reference)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
    use chrono_tz::America::Nuuk;
    use test_case::test_case;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
    }

    // First of a month, non-dst => dst.
    #[test_case("2020-01-01", "2020-05-01", "2020-05-20" ; "first_of_month")]
    #[test_case("2020-01-02", "2020-05-01", "2020-05-20" ; "not_first_of_month")]
    // Leap day, the 20th is a saturday.
    #[test_case("2020-02-29", "2020-06-01", "2020-06-22" ; "leap_day_skip_saturday")]
    // Non leap year, the 20th is a sunday.
    #[test_case("2021-02-28", "2021-06-01", "2021-06-21" ; "skip_sunday")]
    #[test_case("2020-12-30", "2021-04-01", "2021-04-20" ; "wrap_end_of_year")]
    #[test_case("2020-10-15", "2021-02-01", "2021-02-22" ; "october_to_february")]
    #[test_case("2020-08-31", "2020-12-01", "2020-12-21" ; "august_to_december")]
    #[test_case("2020-09-01", "2021-01-01", "2021-01-20" ; "september_to_january")]
    // dst => non-dst.
    #[test_case("2020-07-05", "2020-11-01", "2020-11-20" ; "summer_to_autumn")]
    fn date_table(reference: &str, want_due: &str, want_last_payment: &str) {
        let reference = date(reference);

        let due = get_due_date(&reference).expect("due date");
        let last_payment = get_last_payment_date(&reference).expect("last payment date");

        assert_eq!(date(want_due), due);
        assert_eq!(date(want_last_payment), last_payment);
        assert_eq!(
            last_payment,
            get_last_payment_date_from_due_date(&due).expect("last payment from due"),
        );
    }

    #[test]
    fn due_date_keeps_time_and_timezone() {
        let offset = FixedOffset::east_opt(-2 * 3600).unwrap();
        let reference = offset.with_ymd_and_hms(2021, 11, 17, 13, 45, 12).unwrap();

        let due = get_due_date(&reference).unwrap();

        assert_eq!(offset.with_ymd_and_hms(2022, 3, 1, 13, 45, 12).unwrap(), due);
        assert_eq!(&offset, due.offset());
    }

    #[test]
    fn due_date_in_named_timezone() {
        let reference = Nuuk.with_ymd_and_hms(2022, 2, 18, 12, 4, 14).unwrap();

        let due = get_due_date(&reference).unwrap();
        let last_payment = get_last_payment_date(&reference).unwrap();

        assert_eq!(Nuuk.with_ymd_and_hms(2022, 6, 1, 12, 4, 14).unwrap(), due);
        assert_eq!(
            Nuuk.with_ymd_and_hms(2022, 6, 20, 12, 4, 14).unwrap(),
            last_payment
        );
    }

    #[test]
    fn weekend_skip_adds_exact_days() {
        // 2022-02-20 is a sunday.
        let due: DateTime<Utc> = Utc.with_ymd_and_hms(2022, 2, 18, 12, 4, 14).unwrap();
        let last_payment = get_last_payment_date_from_due_date(&due).unwrap();
        assert_eq!(Utc.with_ymd_and_hms(2022, 2, 21, 12, 4, 14).unwrap(), last_payment);
        assert_eq!(Weekday::Mon, last_payment.weekday());
    }

    #[test]
    fn every_day_of_two_years() {
        let mut reference = date("2023-01-01");
        while reference < date("2025-01-01") {
            let due = get_due_date(&reference).unwrap();
            assert_eq!(1, due.day());
            let months = (due.year() - reference.year()) * 12 + due.month() as i32
                - reference.month() as i32;
            assert_eq!(4, months, "reference {}", reference);

            let last_payment = get_last_payment_date(&reference).unwrap();
            assert!((20..=22).contains(&last_payment.day()));
            assert!(!matches!(last_payment.weekday(), Weekday::Sat | Weekday::Sun));
            assert_eq!(due.month(), last_payment.month());

            reference = reference.succ_opt().unwrap();
        }
    }

    #[test]
    fn out_of_range() {
        let reference = NaiveDate::MAX;
        match get_due_date(&reference) {
            Err(DateError::OutOfRange { rule, .. }) => assert_eq!("due date", rule),
            other => panic!("expected out of range error, got {:?}", other),
        }
    }
}
