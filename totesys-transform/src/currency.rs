//! Currency code to display name lookup. The warehouse only needs a pure
//! code-to-name function, so the default implementation is a bundled ISO
//! 4217 table; a caller with fresher data can supply its own lookup.

/// Maps an ISO 4217 currency code to a display name.
pub trait CurrencyNames: Send + Sync {
    /// Returns the display name, or `None` for unknown codes.
    fn name_for(&self, code: &str) -> Option<String>;
}

/// Bundled code-to-name table covering the currencies Totesys trades in
/// plus the common reserve currencies.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticCurrencyNames;

const CURRENCY_NAMES: &[(&str, &str)] = &[
    ("AED", "Emirati Dirham"),
    ("AUD", "Australian Dollar"),
    ("BRL", "Brazilian Real"),
    ("CAD", "Canadian Dollar"),
    ("CHF", "Swiss Franc"),
    ("CNY", "Chinese Yuan Renminbi"),
    ("CZK", "Czech Koruna"),
    ("DKK", "Danish Krone"),
    ("EUR", "Euro"),
    ("GBP", "British Pound"),
    ("HKD", "Hong Kong Dollar"),
    ("HUF", "Hungarian Forint"),
    ("IDR", "Indonesian Rupiah"),
    ("ILS", "Israeli Shekel"),
    ("INR", "Indian Rupee"),
    ("JPY", "Japanese Yen"),
    ("KRW", "South Korean Won"),
    ("MXN", "Mexican Peso"),
    ("MYR", "Malaysian Ringgit"),
    ("NOK", "Norwegian Krone"),
    ("NZD", "New Zealand Dollar"),
    ("PHP", "Philippine Peso"),
    ("PLN", "Polish Zloty"),
    ("RON", "Romanian Leu"),
    ("SEK", "Swedish Krona"),
    ("SGD", "Singapore Dollar"),
    ("THB", "Thai Baht"),
    ("TRY", "Turkish Lira"),
    ("TWD", "Taiwan New Dollar"),
    ("USD", "US Dollar"),
    ("ZAR", "South African Rand"),
];

impl CurrencyNames for StaticCurrencyNames {
    fn name_for(&self, code: &str) -> Option<String> {
        CURRENCY_NAMES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_resolve() {
        let names = StaticCurrencyNames;
        assert_eq!(names.name_for("GBP").as_deref(), Some("British Pound"));
        assert_eq!(names.name_for("USD").as_deref(), Some("US Dollar"));
        assert_eq!(names.name_for("EUR").as_deref(), Some("Euro"));
    }

    #[test]
    fn unknown_codes_are_none() {
        assert_eq!(StaticCurrencyNames.name_for("XXX"), None);
    }
}
