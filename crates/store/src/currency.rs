use serde::{Deserialize, Serialize};

use crate::{MoneyCents, RepositoryError};

/// ISO currency code carried by accounts and transactions.
///
/// ## Minor units
///
/// Amounts are stored as an `i64` number of **minor units** (see
/// [`MoneyCents`]). `minor_units()` returns how many decimal digits separate
/// major units (`10.50 USD`) from the stored integer (`1050`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Cad,
    Aud,
    Jpy,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
            Currency::Jpy => "JPY",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Cad => "CA$",
            Currency::Aud => "A$",
            Currency::Jpy => "¥",
        }
    }

    /// Number of fraction digits used when formatting/parsing amounts.
    #[must_use]
    pub const fn minor_units(self) -> u8 {
        match self {
            Currency::Jpy => 0,
            _ => 2,
        }
    }

    /// Formats a signed minor-unit amount as `-$1,234.56`.
    pub fn format(self, amount: MoneyCents) -> String {
        let sign = if amount.is_negative() { "-" } else { "" };
        let abs = amount.cents().unsigned_abs();
        let scale = 10u64.pow(u32::from(self.minor_units()));
        let major = group_thousands(abs / scale);
        if self.minor_units() == 0 {
            return format!("{sign}{}{major}", self.symbol());
        }
        let minor = abs % scale;
        let width = usize::from(self.minor_units());
        format!("{sign}{}{major}.{minor:0width$}", self.symbol())
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = RepositoryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "CAD" => Ok(Currency::Cad),
            "AUD" => Ok(Currency::Aud),
            "JPY" => Ok(Currency::Jpy),
            other => Err(RepositoryError::Validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_symbol_and_grouping() {
        assert_eq!(Currency::Usd.format(MoneyCents::new(0)), "$0.00");
        assert_eq!(Currency::Usd.format(MoneyCents::new(-550)), "-$5.50");
        assert_eq!(Currency::Usd.format(MoneyCents::new(123_456_78)), "$123,456.78");
        assert_eq!(Currency::Eur.format(MoneyCents::new(1_000_00)), "€1,000.00");
        assert_eq!(Currency::Jpy.format(MoneyCents::new(1500)), "¥1,500");
    }

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!(Currency::try_from(" usd ").unwrap(), Currency::Usd);
        assert_eq!(Currency::try_from("GBP").unwrap(), Currency::Gbp);
        assert!(Currency::try_from("XYZ").is_err());
    }
}
