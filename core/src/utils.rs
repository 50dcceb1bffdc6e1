//! Utility functions and types.

use std::fmt::Debug;

/// Redacts a secret for logging.
///
/// - Empty input prints `EMPTY`.
/// - Input shorter than 12 characters is fully redacted.
/// - Longer input keeps the first and last three characters so different
///   access keys or signatures can still be told apart in logs.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a str> for Redact<'a> {
    fn from(value: &'a str) -> Self {
        Redact(value)
    }
}

impl<'a> From<&'a String> for Redact<'a> {
    fn from(value: &'a String) -> Self {
        Redact(value.as_str())
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        Redact(value.as_deref().unwrap_or_default())
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let length = self.0.len();
        if length == 0 {
            return f.write_str("EMPTY");
        }
        if length < 12 || !self.0.is_char_boundary(3) || !self.0.is_char_boundary(length - 3) {
            return f.write_str("***");
        }

        write!(f, "{}***{}", &self.0[..3], &self.0[length - 3..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact() {
        let cases = vec![
            ("Short", "***"),
            ("AKIDEXAMPLE", "***"),
            ("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY", "wJa***KEY"),
            ("", "EMPTY"),
        ];

        for (input, expected) in cases {
            assert_eq!(
                format!("{:?}", Redact::from(input)),
                expected,
                "Failed on input: {input}"
            );
        }
    }

    #[test]
    fn test_redact_option() {
        let none: Option<String> = None;
        assert_eq!(format!("{:?}", Redact::from(&none)), "EMPTY");

        let token = Some("session-token-value".to_string());
        assert_eq!(format!("{:?}", Redact::from(&token)), "ses***lue");
    }

    #[test]
    fn test_redact_multibyte_boundary() {
        // 'é' is two bytes, slicing at 3 would split it.
        assert_eq!(format!("{:?}", Redact::from("ééééééé")), "***");
    }
}
