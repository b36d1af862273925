//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::StorefrontError;

/// Currency prefix used when rendering prices.
pub const CURRENCY_PREFIX: &str = "R$";

/// Render minor units as `R$ 1.234,56`.
pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let digits = (abs / 100).to_string();
    let mut major = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 { major.push('.'); }
        major.push(ch);
    }
    format!("{CURRENCY_PREFIX} {sign}{major},{:02}", abs % 100)
}

/// Like [`format_money`], with a missing amount rendered as zero.
pub fn format_optional_money(cents: Option<i64>) -> String { format_money(cents.unwrap_or(0)) }

/// Parse user-entered price text into minor units.
///
/// A bare digit string is whole major units (`"15"` is 1500). With a comma the
/// comma is the decimal mark and dots are thousands separators; without one a
/// dot is the decimal mark (`"15.5"` is 1550).
pub fn parse_money(raw: &str) -> Result<i64, StorefrontError> {
    let invalid = || StorefrontError::InvalidPriceFormat(raw.to_string());
    let mut s = raw.trim();
    if s.len() >= CURRENCY_PREFIX.len() && s.is_char_boundary(CURRENCY_PREFIX.len())
        && s[..CURRENCY_PREFIX.len()].eq_ignore_ascii_case(CURRENCY_PREFIX) {
        s = s[CURRENCY_PREFIX.len()..].trim();
    }
    if s.is_empty() { return Err(invalid()); }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().ok().and_then(|v| v.checked_mul(100)).ok_or_else(invalid);
    }

    let normalized = if s.contains(',') { s.replace('.', "").replace(',', ".") } else { s.to_string() };
    let value = Decimal::from_str(&normalized).map_err(|_| invalid())?;
    if value.is_sign_negative() && !value.is_zero() { return Err(invalid()); }
    value
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|v| v.to_i64())
        .ok_or_else(invalid)
}

/// Store contact number, digits only, with country code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WhatsappNumber(String);

impl WhatsappNumber {
    /// Brazilian country code prepended to bare 11-digit mobile numbers.
    pub const COUNTRY_CODE: &'static str = "55";

    pub fn parse(raw: &str) -> Result<Self, StorefrontError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() { return Err(StorefrontError::InvalidWhatsappNumber); }
        if digits.len() == 11 { return Ok(Self(format!("{}{digits}", Self::COUNTRY_CODE))); }
        Ok(Self(digits))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for WhatsappNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}
