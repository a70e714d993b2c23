use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A country code (`alpha3Code` upstream), normalized to upper case.
///
/// Codes are compared case-insensitively by construction: `"deu"`, `" DEU "`
/// and `"Deu"` all produce the same value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    /// Creates a new `CountryCode` after trimming and validating the input.
    ///
    /// Only blank input is rejected. Unknown codes are left for the upstream
    /// API to refuse.
    pub fn new(code: impl AsRef<str>) -> Result<Self, CoreError> {
        let code = code.as_ref().trim();
        Self::validate(code)?;
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Returns the upper-case code.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the code in the lower-case form used in URLs and fetch keys.
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    fn validate(code: &str) -> Result<(), CoreError> {
        if code.is_empty() {
            return Err(CoreError::InvalidCountryCode(
                "code cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl TryFrom<String> for CountryCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CountryCode> for String {
    fn from(value: CountryCode) -> Self {
        value.0
    }
}

impl Display for CountryCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
