use crate::code::CountryCode;
use crate::error::FetchError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Population of a country, or the `"N/A"` sentinel when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Population {
    Count(u64),
    #[default]
    Unknown,
}

impl Population {
    pub const SENTINEL: &'static str = "N/A";

    pub fn count(&self) -> Option<u64> {
        match self {
            Population::Count(count) => Some(*count),
            Population::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Population::Unknown)
    }
}

impl Serialize for Population {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Population::Count(count) => serializer.serialize_u64(*count),
            Population::Unknown => serializer.serialize_str(Self::SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Population {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = Option::<PopulationInput>::deserialize(deserializer)?;
        Ok(normalize_population(input.as_ref()))
    }
}

/// Population exactly as the upstream sent it: a number or arbitrary text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PopulationInput {
    Number(f64),
    Text(String),
}

impl From<u64> for PopulationInput {
    fn from(value: u64) -> Self {
        PopulationInput::Number(value as f64)
    }
}

impl From<&str> for PopulationInput {
    fn from(value: &str) -> Self {
        PopulationInput::Text(value.to_string())
    }
}

/// Coerces a raw population into [`Population`].
///
/// Missing, non-finite, negative and non-numeric values all map to
/// [`Population::Unknown`]. Numeric text such as `"1200"` is accepted.
pub fn normalize_population(input: Option<&PopulationInput>) -> Population {
    let value = match input {
        None => return Population::Unknown,
        Some(PopulationInput::Number(value)) => *value,
        Some(PopulationInput::Text(text)) => {
            let text = text.trim();
            if text.is_empty() || text == Population::SENTINEL {
                return Population::Unknown;
            }
            match text.parse::<f64>() {
                Ok(value) => value,
                Err(_) => return Population::Unknown,
            }
        }
    };

    if value.is_finite() && value >= 0.0 {
        Population::Count(value as u64)
    } else {
        Population::Unknown
    }
}

/// Formats a population for display with en-US digit grouping.
///
/// Zero is treated as unknown, matching how the upstream reports
/// uninhabited territories.
pub fn format_population(population: Population) -> String {
    match population {
        Population::Count(0) | Population::Unknown => Population::SENTINEL.to_string(),
        Population::Count(count) => {
            let digits = count.to_string();
            let mut out = String::with_capacity(digits.len() + digits.len() / 3);
            for (i, ch) in digits.chars().enumerate() {
                if i > 0 && (digits.len() - i) % 3 == 0 {
                    out.push(',');
                }
                out.push(ch);
            }
            out
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    pub svg: Option<String>,
    pub png: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Currency {
    pub code: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Language {
    #[serde(rename = "iso639_1")]
    pub iso639_1: Option<String>,
    #[serde(rename = "iso639_2")]
    pub iso639_2: Option<String>,
    pub name: Option<String>,
    pub native_name: Option<String>,
}

/// A country as returned by one fetch, with every field optional.
///
/// List endpoints return a minimal projection and the detail endpoint a full
/// one; absent fields are `None` and never overwrite stored values on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialCountry {
    #[serde(rename = "alpha3Code")]
    pub code: Option<String>,
    pub name: Option<String>,
    pub native_name: Option<String>,
    pub population: Option<PopulationInput>,
    pub region: Option<String>,
    pub subregion: Option<String>,
    pub capital: Option<String>,
    pub flags: Option<Flags>,
    #[serde(rename = "topLevelDomain")]
    pub top_level_domains: Option<Vec<String>>,
    pub currencies: Option<Vec<Currency>>,
    pub languages: Option<Vec<Language>>,
    pub borders: Option<Vec<String>>,
}

impl PartialCountry {
    /// Returns the validated code, if the partial carries one.
    pub fn country_code(&self) -> Option<CountryCode> {
        self.code
            .as_deref()
            .and_then(|code| CountryCode::new(code).ok())
    }

    /// Checks that the partial identifies a country (name and code present).
    pub fn ensure_identity(&self) -> Result<CountryCode, FetchError> {
        let has_name = self.name.as_deref().is_some_and(|n| !n.trim().is_empty());
        match self.country_code() {
            Some(code) if has_name => Ok(code),
            _ => Err(FetchError::MalformedResponse("No country found".to_string())),
        }
    }

    /// Border or currency data only comes from the detail endpoint.
    pub fn carries_detail_data(&self) -> bool {
        self.borders.as_ref().is_some_and(|b| !b.is_empty())
            || self.currencies.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// A merged country record as held by the repository.
///
/// Detail-only fields are `None` until a fetch has delivered them; an empty
/// list means the upstream reported nothing for that field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    #[serde(rename = "alpha3Code")]
    pub code: CountryCode,
    pub name: String,
    pub native_name: Option<String>,
    pub population: Population,
    pub region: String,
    pub subregion: Option<String>,
    pub capital: String,
    pub flags: Flags,
    #[serde(rename = "topLevelDomain")]
    pub top_level_domains: Option<Vec<String>>,
    pub currencies: Option<Vec<Currency>>,
    pub languages: Option<Vec<Language>>,
    pub borders: Option<Vec<String>>,
    pub needs_full_details: bool,
}

impl Country {
    /// Whether every detail field has been materialized.
    ///
    /// This inspects the fields themselves rather than `needs_full_details`,
    /// which can go stale when minimal border records are marked complete.
    pub fn has_full_details(&self) -> bool {
        self.currencies.is_some()
            && self.languages.is_some()
            && self.top_level_domains.is_some()
            && self.subregion.is_some()
            && self.borders.is_some()
    }

    pub fn carries_detail_data(&self) -> bool {
        self.borders.as_ref().is_some_and(|b| !b.is_empty())
            || self.currencies.as_ref().is_some_and(|c| !c.is_empty())
    }
}
