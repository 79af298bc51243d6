use std::fmt;

/// Money is represented as integer cents to avoid floating-point precision
/// issues. 1 gold piece = 100 cents, so a 50.00 payment = 5000 cents.
/// Transaction amounts are never negative; balances can be.
pub type Cents = i64;

/// Format cents as a human-readable amount.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal string into a non-negative amount in cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_amount(input: &str) -> Result<Cents, ParseAmountError> {
    let input = input.trim();
    if input.starts_with('-') {
        return Err(ParseAmountError::Negative);
    }

    let parts: Vec<&str> = input.split('.').collect();
    match parts.len() {
        1 => {
            let units: i64 = parts[0]
                .parse()
                .map_err(|_| ParseAmountError::InvalidFormat)?;
            Ok(units * 100)
        }
        2 => {
            let units: i64 = if parts[0].is_empty() {
                0
            } else {
                parts[0]
                    .parse()
                    .map_err(|_| ParseAmountError::InvalidFormat)?
            };

            // Pad or truncate the decimal part to 2 digits
            let decimal_str = parts[1];
            let decimal_cents: i64 = match decimal_str.len() {
                0 => 0,
                1 => {
                    decimal_str
                        .parse::<i64>()
                        .map_err(|_| ParseAmountError::InvalidFormat)?
                        * 10
                }
                _ => decimal_str[..2]
                    .parse()
                    .map_err(|_| ParseAmountError::InvalidFormat)?,
            };

            Ok(units * 100 + decimal_cents)
        }
        _ => Err(ParseAmountError::InvalidFormat),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    InvalidFormat,
    Negative,
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::InvalidFormat => write!(f, "invalid amount format"),
            ParseAmountError::Negative => write!(f, "amount cannot be negative"),
        }
    }
}

impl std::error::Error for ParseAmountError {}
