//! Validated primitive types shared across the clinic crates.
//!
//! Each type checks its invariant once at construction, so code holding one
//! never has to re-validate it.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,

    /// The input exceeded the permitted number of characters
    #[error("Text cannot be longer than {max} characters")]
    TooLong { max: usize },

    /// The input is not a plausible e-mail address
    #[error("Invalid e-mail address")]
    InvalidEmail,

    /// The input is not a plausible phone number
    #[error("Invalid phone number")]
    InvalidPhone,
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Creates a `NonEmptyText` that is at most `max` characters long.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` for blank input and `TextError::TooLong` when the trimmed
    /// input has more than `max` characters.
    pub fn bounded(input: impl AsRef<str>, max: usize) -> Result<Self, TextError> {
        let text = Self::new(input)?;
        if text.0.chars().count() > max {
            return Err(TextError::TooLong { max });
        }
        Ok(text)
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A lower-cased e-mail address with a local part, an `@` and a dotted domain.
///
/// This is a shape check only. Deliverability is never verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Maximum accepted length, matching the common `varchar(255)` column size.
    pub const MAX_LEN: usize = 255;

    /// Parses and normalises an e-mail address.
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` for blank input, `TextError::TooLong` above
    /// [`Self::MAX_LEN`], and `TextError::InvalidEmail` when the shape is wrong.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(TextError::TooLong { max: Self::MAX_LEN });
        }

        let (local, domain) = trimmed.split_once('@').ok_or(TextError::InvalidEmail)?;
        let domain_ok = !domain.starts_with('.')
            && !domain.ends_with('.')
            && domain.contains('.')
            && !domain.contains("..")
            && !domain.contains('@');
        let no_spaces = !trimmed.chars().any(char::is_whitespace);

        if local.is_empty() || !domain_ok || !no_spaces {
            return Err(TextError::InvalidEmail);
        }

        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A phone number made of digits, spaces and the characters `+ - ( )`.
///
/// Between 7 and 20 characters overall, with at least 7 digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_LEN: usize = 7;
    const MAX_LEN: usize = 20;

    /// Parses a phone number, keeping its original formatting (trimmed).
    ///
    /// # Errors
    ///
    /// Returns `TextError::Empty` for blank input and `TextError::InvalidPhone` when the
    /// input contains other characters or too few digits.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }

        let len = trimmed.chars().count();
        let charset_ok = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' '));
        let digits = trimmed.chars().filter(char::is_ascii_digit).count();

        if !charset_ok || len < Self::MIN_LEN || len > Self::MAX_LEN || digits < Self::MIN_LEN {
            return Err(TextError::InvalidPhone);
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_rejects_blank() {
        assert_eq!(NonEmptyText::new("  hello ").unwrap().as_str(), "hello");
        assert_eq!(NonEmptyText::new("   "), Err(TextError::Empty));
    }

    #[test]
    fn bounded_text_counts_characters_not_bytes() {
        assert!(NonEmptyText::bounded("ééé", 3).is_ok());
        assert_eq!(
            NonEmptyText::bounded("abcd", 3),
            Err(TextError::TooLong { max: 3 })
        );
    }

    #[test]
    fn non_empty_text_deserialize_rejects_empty() {
        let err = serde_json::from_str::<NonEmptyText>("\"  \"");
        assert!(err.is_err());
        let ok: NonEmptyText = serde_json::from_str("\" x \"").unwrap();
        assert_eq!(ok.as_str(), "x");
    }

    #[test]
    fn email_is_lowercased() {
        let email = EmailAddress::parse(" Jane.Doe@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "jane.doe@example.com");
    }

    #[test]
    fn email_rejects_bad_shapes() {
        for bad in ["plain", "@example.com", "a@b", "a@.com", "a@b..com", "a b@c.com"] {
            assert_eq!(
                EmailAddress::parse(bad),
                Err(TextError::InvalidEmail),
                "{bad}"
            );
        }
    }

    #[test]
    fn phone_accepts_common_formats() {
        assert!(PhoneNumber::parse("+44 (0) 20-7946-0958").is_ok());
        assert!(PhoneNumber::parse("5551234567").is_ok());
    }

    #[test]
    fn phone_rejects_letters_and_short_numbers() {
        assert_eq!(PhoneNumber::parse("555-CALL"), Err(TextError::InvalidPhone));
        assert_eq!(PhoneNumber::parse("12-34"), Err(TextError::InvalidPhone));
        assert_eq!(PhoneNumber::parse("(((((())))))"), Err(TextError::InvalidPhone));
    }
}
