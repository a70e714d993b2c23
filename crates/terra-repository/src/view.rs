use crate::search::fuzzy_match;
use crate::sort::{sort_countries, SortState};
use terra_core::{Country, Region};
use typed_builder::TypedBuilder;

/// What a list view shows: region filter, search text and sort selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, TypedBuilder)]
pub struct ViewQuery {
    #[builder(default, setter(strip_option))]
    pub region: Option<Region>,
    #[builder(default, setter(into))]
    pub search: String,
    /// Search across every region, ignoring the region filter.
    #[builder(default)]
    pub search_all: bool,
    #[builder(default)]
    pub sort: SortState,
}

impl ViewQuery {
    pub fn is_searching(&self) -> bool {
        !self.search.trim().is_empty()
    }

    fn keeps(&self, country: &Country) -> bool {
        if let (Some(region), false) = (self.region, self.search_all) {
            if !country.region.eq_ignore_ascii_case(region.as_str()) {
                return false;
            }
        }
        !self.is_searching() || fuzzy_match(&self.search, &country.name)
    }

    /// Filters and sorts `countries` into the rows of this view.
    pub fn apply(&self, countries: impl IntoIterator<Item = Country>) -> Vec<Country> {
        let mut rows: Vec<Country> = countries
            .into_iter()
            .filter(|country| self.keeps(country))
            .collect();
        sort_countries(&mut rows, self.sort);
        rows
    }
}
