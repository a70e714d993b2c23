//! HTTP client for the REST Countries v2 API.

pub mod client;
pub mod fields;

pub use client::{ClientConfig, RestCountriesClient, DEFAULT_BASE_URL};
pub use fields::{FULL_FIELDS, MINIMAL_FIELDS};
