use crate::code::CountryCode;
use crate::error::FetchError;
use crate::region::Region;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A deterministic identifier for one logical request.
///
/// Keys are derived from the request shape, never stored by callers, so two
/// independent requests with equivalent inputs always collapse onto the same
/// cache entry and the same in-flight fetch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FetchKey(String);

impl FetchKey {
    /// Creates a key from an arbitrary string.
    ///
    /// An empty or whitespace-only key is a programming error and is rejected
    /// before any cache or network work happens.
    pub fn new(key: impl Into<String>) -> Result<Self, FetchError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(FetchError::InvalidKey(
                "key must be a non-empty string".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// `countries-<region>` or `countries-all`.
    pub fn countries(region: Option<Region>) -> Self {
        match region {
            Some(region) => Self(format!("countries-{}", region.as_str())),
            None => Self("countries-all".to_string()),
        }
    }

    /// `country-<code>`, lower-case.
    pub fn country(code: &CountryCode) -> Self {
        Self(format!("country-{}", code.to_lowercase()))
    }

    /// `border-countries-<codes>` with the codes sorted, de-duplicated and
    /// joined by `-`. Returns `None` when there is nothing to fetch.
    pub fn border_countries<'a>(codes: impl IntoIterator<Item = &'a CountryCode>) -> Option<Self> {
        let mut codes: Vec<String> = codes.into_iter().map(CountryCode::to_lowercase).collect();
        codes.sort();
        codes.dedup();
        if codes.is_empty() {
            return None;
        }
        Some(Self(format!("border-countries-{}", codes.join("-"))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FetchKey {
    type Error = FetchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FetchKey> for String {
    fn from(value: FetchKey) -> Self {
        value.0
    }
}

impl AsRef<str> for FetchKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for FetchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
