//! Canonical recipient identifiers.
//!
//! Every phone number stored or compared by Chime is in canonical form: the
//! national number with the fixed country-code prefix removed, e.g.
//! `+15551234567` becomes `5551234567`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Country-code prefix stripped on the way in and prepended on the way out.
pub const COUNTRY_PREFIX: &str = "+1";

/// Number of digits in a valid national number.
const NATIONAL_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
  /// Canonicalise without validating. Used for inbound senders, which may be
  /// short codes or otherwise unusual and simply fail to match a subscriber.
  pub fn canonical(raw: &str) -> Self {
    let trimmed = raw.trim();
    let national = trimmed.strip_prefix(COUNTRY_PREFIX).unwrap_or(trimmed);
    Self(national.to_owned())
  }

  /// Canonicalise and require exactly ten ASCII digits.
  pub fn parse(raw: &str) -> Result<Self> {
    let phone = Self::canonical(raw);
    if phone.0.len() != NATIONAL_DIGITS
      || !phone.0.bytes().all(|b| b.is_ascii_digit())
    {
      return Err(Error::validation(
        "phone_number",
        format!("phone_number {raw:?} is not a {NATIONAL_DIGITS}-digit number"),
      ));
    }
    Ok(phone)
  }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// The number in international form, as handed to the gateway.
  pub fn international(&self) -> String {
    if self.0.starts_with('+') {
      self.0.clone()
    } else {
      format!("{COUNTRY_PREFIX}{}", self.0)
    }
  }
}

impl fmt::Display for PhoneNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
