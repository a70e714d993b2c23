use crate::search::fold_key;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt::Display;
use std::str::FromStr;
use terra_core::{Country, Population};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Population,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "population" => Ok(SortKey::Population),
            other => Err(format!("unknown sort key '{other}'")),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortKey::Name => write!(f, "name"),
            SortKey::Population => write!(f, "population"),
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "asc"),
            SortOrder::Desc => write!(f, "desc"),
        }
    }
}

/// The sort selection of a list view. Defaults to name, ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortState {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortState {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Switches between name and population, keeping the order.
    pub fn toggle_key(&mut self) {
        self.key = match self.key {
            SortKey::Name => SortKey::Population,
            SortKey::Population => SortKey::Name,
        };
    }

    pub fn toggle_order(&mut self) {
        self.order = self.order.reversed();
    }

    pub fn compare(&self, a: &Country, b: &Country) -> Ordering {
        match self.key {
            SortKey::Name => self.order.apply(compare_names(&a.name, &b.name)),
            SortKey::Population => compare_populations(a.population, b.population, self.order),
        }
    }
}

/// Orders names ignoring case and diacritics, then by their raw form so
/// distinct names never compare equal.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    fold_key(a).cmp(&fold_key(b)).then_with(|| a.cmp(b))
}

/// Orders populations numerically in `order`, with unknown values last in
/// either direction.
pub fn compare_populations(a: Population, b: Population, order: SortOrder) -> Ordering {
    match (a, b) {
        (Population::Unknown, Population::Unknown) => Ordering::Equal,
        (Population::Unknown, Population::Count(_)) => Ordering::Greater,
        (Population::Count(_), Population::Unknown) => Ordering::Less,
        (Population::Count(a), Population::Count(b)) => order.apply(a.cmp(&b)),
    }
}

/// Stable sort of `countries` by `state`.
pub fn sort_countries(countries: &mut [Country], state: SortState) {
    let name_key = |c: &Country| (fold_key(&c.name), c.name.clone());
    // names are folded once per element, not once per comparison
    match (state.key, state.order) {
        (SortKey::Name, SortOrder::Asc) => countries.sort_by_cached_key(name_key),
        (SortKey::Name, SortOrder::Desc) => {
            countries.sort_by_cached_key(|c| Reverse(name_key(c)))
        }
        (SortKey::Population, _) => countries.sort_by(|a, b| state.compare(a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_core::{CountryCode, Flags};

    fn country(code: &str, name: &str, population: Population) -> Country {
        Country {
            code: CountryCode::new(code).unwrap(),
            name: name.to_string(),
            native_name: None,
            population,
            region: "europe".to_string(),
            subregion: None,
            capital: "N/A".to_string(),
            flags: Flags::default(),
            top_level_domains: None,
            currencies: None,
            languages: None,
            borders: None,
            needs_full_details: true,
        }
    }

    fn codes(countries: &[Country]) -> Vec<&str> {
        countries.iter().map(|c| c.code.as_str()).collect()
    }

    #[test]
    fn unknown_population_sorts_last_both_ways() {
        let mut list = vec![
            country("AAA", "A", Population::Count(5)),
            country("BBB", "B", Population::Unknown),
            country("CCC", "C", Population::Count(1)),
        ];

        sort_countries(&mut list, SortState::new(SortKey::Population, SortOrder::Asc));
        assert_eq!(codes(&list), vec!["CCC", "AAA", "BBB"]);

        sort_countries(&mut list, SortState::new(SortKey::Population, SortOrder::Desc));
        assert_eq!(codes(&list), vec!["AAA", "CCC", "BBB"]);
    }

    #[test]
    fn population_sort_is_stable() {
        let mut list = vec![
            country("AAA", "A", Population::Unknown),
            country("BBB", "B", Population::Count(7)),
            country("CCC", "C", Population::Unknown),
            country("DDD", "D", Population::Count(7)),
        ];

        sort_countries(&mut list, SortState::new(SortKey::Population, SortOrder::Desc));
        assert_eq!(codes(&list), vec!["BBB", "DDD", "AAA", "CCC"]);
    }

    #[test]
    fn names_sort_ignoring_case_and_diacritics() {
        let mut list = vec![
            country("ZMB", "Zambia", Population::Unknown),
            country("ALA", "Åland Islands", Population::Unknown),
            country("AFG", "afghanistan", Population::Unknown),
            country("ALB", "Albania", Population::Unknown),
        ];

        sort_countries(&mut list, SortState::default());
        assert_eq!(codes(&list), vec!["AFG", "ALA", "ALB", "ZMB"]);

        sort_countries(&mut list, SortState::new(SortKey::Name, SortOrder::Desc));
        assert_eq!(codes(&list), vec!["ZMB", "ALB", "ALA", "AFG"]);
    }

    #[test]
    fn toggles() {
        let mut state = SortState::default();
        assert_eq!(state, SortState::new(SortKey::Name, SortOrder::Asc));

        state.toggle_key();
        assert_eq!(state.key, SortKey::Population);
        state.toggle_order();
        assert_eq!(state.order, SortOrder::Desc);
        state.toggle_key();
        assert_eq!(state, SortState::new(SortKey::Name, SortOrder::Desc));
    }

    #[test]
    fn parses_keys_and_orders() {
        assert_eq!("Population".parse::<SortKey>().unwrap(), SortKey::Population);
        assert_eq!(" desc".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("size".parse::<SortKey>().is_err());
    }
}
