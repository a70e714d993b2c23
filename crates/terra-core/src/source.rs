use crate::code::CountryCode;
use crate::country::PartialCountry;
use crate::error::Result;
use crate::region::Region;
use async_trait::async_trait;

/// The upstream country data source.
///
/// Single-record fetches resolve to a record carrying a name and a code, or
/// fail with [`FetchError::MalformedResponse`](crate::FetchError).
#[async_trait]
pub trait CountrySource: Send + Sync + 'static {
    /// Fetches the minimal projection of every country, or of one region.
    async fn fetch_list(&self, region: Option<Region>) -> Result<Vec<PartialCountry>>;

    /// Fetches the full record of a single country.
    async fn fetch_country(&self, code: &CountryCode) -> Result<PartialCountry>;

    /// Fetches the minimal projection of a single neighbouring country.
    async fn fetch_border_country(&self, code: &CountryCode) -> Result<PartialCountry>;
}
