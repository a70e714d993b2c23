use crate::fields::{query, FULL_FIELDS, MINIMAL_FIELDS};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use terra_core::error::Result;
use terra_core::{CountryCode, CountrySource, FetchError, NetworkError, PartialCountry, Region};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "https://restcountries.com/v2";

#[derive(Debug, Clone, TypedBuilder)]
pub struct ClientConfig {
    /// API root, without the trailing endpoint path.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    #[builder(default = Duration::from_secs(10))]
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// [`CountrySource`] backed by the REST Countries HTTP API.
#[derive(Debug, Clone)]
pub struct RestCountriesClient {
    http: reqwest::Client,
    base_url: String,
}

// the alpha endpoint answers with an object, or with a one-element array
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<PartialCountry>),
    One(Box<PartialCountry>),
}

impl RestCountriesClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // segments are percent-encoded, so a code can never escape its path slot
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| NetworkError::Transport(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| NetworkError::Transport(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        fields: &[&str],
    ) -> Result<T> {
        let url = self.url(segments)?;
        trace!(url = %url, "requesting");

        let response = self
            .http
            .get(url.clone())
            .query(&[("fields", query(fields))])
            .send()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %url, status = status.as_u16(), "upstream returned an error status");
            return Err(NetworkError::Status {
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| NetworkError::Transport(e.to_string()))?;
        serde_json::from_str(&body)
            .map_err(|e| FetchError::MalformedResponse(format!("invalid response body: {e}")))
    }

    async fn get_country(&self, code: &CountryCode, fields: &[&str]) -> Result<PartialCountry> {
        let code = code.to_lowercase();
        let country = match self.get_json::<OneOrMany>(&["alpha", code.as_str()], fields).await? {
            OneOrMany::One(country) => *country,
            OneOrMany::Many(countries) => countries.into_iter().next().unwrap_or_default(),
        };
        country.ensure_identity()?;
        Ok(country)
    }
}

#[async_trait]
impl CountrySource for RestCountriesClient {
    async fn fetch_list(&self, region: Option<Region>) -> Result<Vec<PartialCountry>> {
        let segments = match region {
            Some(region) => vec!["region", region.as_str()],
            None => vec!["all"],
        };
        let countries: Vec<PartialCountry> = self.get_json(&segments, MINIMAL_FIELDS).await?;
        debug!(region = ?region, count = countries.len(), "fetched country list");
        Ok(countries)
    }

    async fn fetch_country(&self, code: &CountryCode) -> Result<PartialCountry> {
        self.get_country(code, FULL_FIELDS).await
    }

    async fn fetch_border_country(&self, code: &CountryCode) -> Result<PartialCountry> {
        self.get_country(code, MINIMAL_FIELDS).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let client = RestCountriesClient::new(
            ClientConfig::builder()
                .base_url("http://localhost:8080/v2//")
                .build(),
        )
        .unwrap();

        assert_eq!(client.base_url(), "http://localhost:8080/v2");
        assert_eq!(
            client.url(&["all"]).unwrap().as_str(),
            "http://localhost:8080/v2/all"
        );
    }

    #[test]
    fn path_segments_are_encoded() {
        let client = RestCountriesClient::new(ClientConfig::default()).unwrap();
        assert_eq!(
            client.url(&["alpha", "d/u"]).unwrap().as_str(),
            "https://restcountries.com/v2/alpha/d%2Fu"
        );
    }

    #[test]
    fn default_config_points_at_public_api() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn alpha_payload_shapes() {
        let one: OneOrMany =
            serde_json::from_str(r#"{"name":"Germany","alpha3Code":"DEU"}"#).unwrap();
        assert!(matches!(one, OneOrMany::One(_)));

        let many: OneOrMany =
            serde_json::from_str(r#"[{"name":"Germany","alpha3Code":"DEU"}]"#).unwrap();
        assert!(matches!(many, OneOrMany::Many(ref list) if list.len() == 1));
    }
}
