//! Recurrence intervals and catch-up rescheduling.
//!
//! A frequency is stored as free text. The grammar is a sequence of
//! `<number><unit>` terms (`90m`, `1h30m`, `1.5h`) with units `ns`, `us`,
//! `µs`, `ms`, `s`, `m` and `h`, plus a day-count extension: `<n>d` is
//! rewritten to `<n*24>h` before standard parsing.

use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrequencyError {
  #[error("frequency is empty")]
  Empty,

  #[error("{0:?} is negative")]
  Negative(String),

  #[error("{0:?} is a zero interval")]
  Zero(String),

  #[error("{0:?} does not start with a number")]
  InvalidNumber(String),

  #[error("{0:?} is missing a unit")]
  MissingUnit(String),

  #[error("unknown unit {unit:?} in {input:?}")]
  UnknownUnit { unit: String, input: String },

  #[error("{0:?} is too large")]
  Overflow(String),
}

const NANOS_PER_SECOND: u128 = 1_000_000_000;

const UNITS: &[(&str, u128)] = &[
  ("ns", 1),
  ("us", 1_000),
  ("µs", 1_000),
  ("ms", 1_000_000),
  ("s", NANOS_PER_SECOND),
  ("m", 60 * NANOS_PER_SECOND),
  ("h", 3_600 * NANOS_PER_SECOND),
];

/// Fraction digits beyond this carry no meaning at nanosecond resolution.
const MAX_FRACTION_DIGITS: usize = 18;

/// A positive recurrence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency(TimeDelta);

impl Frequency {
  pub fn parse(input: &str) -> Result<Self, FrequencyError> {
    let text = input.trim();
    if text.is_empty() {
      return Err(FrequencyError::Empty);
    }
    if text.starts_with('-') {
      return Err(FrequencyError::Negative(input.to_owned()));
    }
    let text = text.strip_prefix('+').unwrap_or(text);

    let nanos = match text.strip_suffix('d') {
      Some(days) => {
        if days.is_empty() || !days.bytes().all(|b| b.is_ascii_digit()) {
          return Err(FrequencyError::InvalidNumber(input.to_owned()));
        }
        let hours = days
          .parse::<u64>()
          .ok()
          .and_then(|d| d.checked_mul(24))
          .ok_or_else(|| FrequencyError::Overflow(input.to_owned()))?;
        parse_standard(&format!("{hours}h"), input)?
      }
      None => parse_standard(text, input)?,
    };

    if nanos == 0 {
      return Err(FrequencyError::Zero(input.to_owned()));
    }
    let nanos = i64::try_from(nanos)
      .map_err(|_| FrequencyError::Overflow(input.to_owned()))?;
    Ok(Self(TimeDelta::nanoseconds(nanos)))
  }

  pub fn interval(&self) -> TimeDelta { self.0 }

  /// Next trigger time after a firing that was due at `due`.
  ///
  /// A subscription that fell behind is not replayed interval by interval:
  /// if `due + interval` is already in the past relative to `now`, the next
  /// fire is placed one interval after `now`.
  pub fn next_trigger(&self, due: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let candidate = add_saturating(due, self.0);
    if candidate < now { add_saturating(now, self.0) } else { candidate }
  }
}

impl FromStr for Frequency {
  type Err = FrequencyError;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

fn add_saturating(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
  at.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Parse the standard `<number><unit>...` grammar into nanoseconds.
fn parse_standard(text: &str, input: &str) -> Result<u128, FrequencyError> {
  let overflow = || FrequencyError::Overflow(input.to_owned());
  let mut rest = text;
  let mut total: u128 = 0;

  while !rest.is_empty() {
    let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    let (int_part, after) = rest.split_at(int_len);
    let (frac_part, after) = match after.strip_prefix('.') {
      Some(tail) => {
        let frac_len = tail.bytes().take_while(u8::is_ascii_digit).count();
        tail.split_at(frac_len)
      }
      None => ("", after),
    };
    if int_part.is_empty() && frac_part.is_empty() {
      return Err(FrequencyError::InvalidNumber(input.to_owned()));
    }

    let unit_len = after
      .find(|c: char| c.is_ascii_digit() || c == '.')
      .unwrap_or(after.len());
    let (unit, tail) = after.split_at(unit_len);
    if unit.is_empty() {
      return Err(FrequencyError::MissingUnit(input.to_owned()));
    }
    let scale = UNITS
      .iter()
      .find(|(name, _)| *name == unit)
      .map(|(_, scale)| *scale)
      .ok_or_else(|| FrequencyError::UnknownUnit {
        unit:  unit.to_owned(),
        input: input.to_owned(),
      })?;

    let whole: u128 = if int_part.is_empty() {
      0
    } else {
      int_part.parse().map_err(|_| overflow())?
    };
    let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;

    if !frac_part.is_empty() {
      let digits = &frac_part[..frac_part.len().min(MAX_FRACTION_DIGITS)];
      let numerator: u128 = digits.parse().map_err(|_| overflow())?;
      let denominator = 10u128.pow(digits.len() as u32);
      nanos = nanos
        .checked_add(numerator * scale / denominator)
        .ok_or_else(overflow)?;
    }

    total = total.checked_add(nanos).ok_or_else(overflow)?;
    rest = tail;
  }

  Ok(total)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn hours(n: i64) -> TimeDelta { TimeDelta::hours(n) }

  #[test]
  fn parses_standard_units() {
    assert_eq!(Frequency::parse("2h").unwrap().interval(), hours(2));
    assert_eq!(Frequency::parse("90m").unwrap().interval(), TimeDelta::minutes(90));
    assert_eq!(Frequency::parse("45s").unwrap().interval(), TimeDelta::seconds(45));
    assert_eq!(
      Frequency::parse("250ms").unwrap().interval(),
      TimeDelta::milliseconds(250)
    );
  }

  #[test]
  fn parses_compound_and_fractional() {
    assert_eq!(
      Frequency::parse("1h30m").unwrap().interval(),
      TimeDelta::minutes(90)
    );
    assert_eq!(
      Frequency::parse("1.5h").unwrap().interval(),
      TimeDelta::minutes(90)
    );
  }

  #[test]
  fn day_suffix_equals_hour_equivalent() {
    for n in [1_u64, 2, 7, 30, 365] {
      assert_eq!(
        Frequency::parse(&format!("{n}d")).unwrap(),
        Frequency::parse(&format!("{}h", n * 24)).unwrap(),
        "{n}d"
      );
    }
  }

  #[test]
  fn rejects_malformed_input() {
    assert!(matches!(
      Frequency::parse("abc"),
      Err(FrequencyError::InvalidNumber(_))
    ));
    assert!(matches!(
      Frequency::parse("-1h"),
      Err(FrequencyError::Negative(_))
    ));
    assert!(matches!(
      Frequency::parse("5"),
      Err(FrequencyError::MissingUnit(_))
    ));
    assert!(matches!(
      Frequency::parse("3w"),
      Err(FrequencyError::UnknownUnit { .. })
    ));
    assert!(matches!(Frequency::parse(""), Err(FrequencyError::Empty)));
    assert!(matches!(Frequency::parse("0h"), Err(FrequencyError::Zero(_))));
    assert!(Frequency::parse("d").is_err());
    assert!(Frequency::parse("1d12h").is_err());
    assert!(Frequency::parse("-2d").is_err());
  }

  #[test]
  fn next_trigger_advances_from_due_when_on_time() {
    let now = Utc::now();
    let due = now - TimeDelta::minutes(5);
    let freq = Frequency::parse("1h").unwrap();
    assert_eq!(freq.next_trigger(due, now), due + hours(1));
  }

  #[test]
  fn next_trigger_catches_up_after_backlog() {
    let now = Utc::now();
    let due = now - hours(10);
    let freq = Frequency::parse("1h").unwrap();
    assert_eq!(freq.next_trigger(due, now), now + hours(1));
  }

  #[test]
  fn next_trigger_is_never_before_due() {
    let now = Utc::now();
    let freq = Frequency::parse("7d").unwrap();
    for offset in [-1_000, -1, 0, 1, 1_000] {
      let due = now + hours(offset);
      assert!(freq.next_trigger(due, now) >= due);
    }
  }
}
