//! The normalized country store and its derived, filtered and sorted views.

pub mod merge;
pub mod repository;
pub mod search;
pub mod sort;
pub mod view;

pub use merge::merge_country;
pub use repository::CountryRepository;
pub use search::{fold_key, fuzzy_match};
pub use sort::{sort_countries, SortKey, SortOrder, SortState};
pub use view::ViewQuery;
