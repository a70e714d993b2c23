//! Core types and traits for the Terra country data layer.
//!
//! This crate provides the shared model, fetch keys, errors and seams used by
//! the keyed cache, the country repository and the fetch orchestrator.

pub mod clock;
pub mod code;
pub mod country;
pub mod environment;
pub mod error;
pub mod key;
pub mod region;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use code::CountryCode;
pub use country::{
    format_population, normalize_population, Country, Currency, Flags, Language, PartialCountry,
    Population, PopulationInput,
};
pub use environment::{Environment, ExecutionSide};
pub use error::{CoreError, FetchError, NetworkError};
pub use key::FetchKey;
pub use region::Region;
pub use source::CountrySource;
