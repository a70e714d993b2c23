use crate::status::{FetchPhase, FetchStatus, RequestShape};
use dashmap::DashMap;
use std::sync::Arc;
use terra_cache::{KeyedAsyncCache, ResolveOptions};
use terra_core::error::Result;
use terra_core::{
    Country, CountryCode, CountrySource, FetchError, FetchKey, NetworkError, PartialCountry,
    Region,
};
use terra_repository::{CountryRepository, ViewQuery};
use tokio::task::JoinSet;
use tracing::{debug, error, trace, warn};

/// Coordinates list, detail and border fetches.
///
/// Every fetch goes through the keyed cache, so equivalent requests share one
/// upstream call, and every result is merged into the repository, which is the
/// single source of truth for readers.
pub struct FetchOrchestrator<S> {
    source: Arc<S>,
    cache: KeyedAsyncCache,
    repository: Arc<CountryRepository>,
    options: ResolveOptions,
    statuses: Arc<DashMap<RequestShape, FetchStatus>>,
}

impl<S> Clone for FetchOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: self.cache.clone(),
            repository: Arc::clone(&self.repository),
            options: self.options.clone(),
            statuses: Arc::clone(&self.statuses),
        }
    }
}

impl<S: CountrySource> FetchOrchestrator<S> {
    pub fn new(source: S, cache: KeyedAsyncCache, repository: Arc<CountryRepository>) -> Self {
        Self {
            source: Arc::new(source),
            cache,
            repository,
            options: ResolveOptions::default(),
            statuses: Arc::new(DashMap::new()),
        }
    }

    /// Overrides the cache options used for every fetch.
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn repository(&self) -> &Arc<CountryRepository> {
        &self.repository
    }

    pub fn cache(&self) -> &KeyedAsyncCache {
        &self.cache
    }

    pub fn view(&self, query: &ViewQuery) -> Arc<[Country]> {
        self.repository.view(query)
    }

    pub fn lookup(&self, code: &str) -> Option<Country> {
        self.repository.lookup(code)
    }

    /// State of the latest request of `shape`.
    pub fn status(&self, shape: RequestShape) -> FetchStatus {
        self.statuses
            .get(&shape)
            .map(|status| status.value().clone())
            .unwrap_or_default()
    }

    /// The `(key, serialized value)` pairs recorded for transfer so far.
    ///
    /// Empty unless running in a server environment.
    pub fn transfer_entries(&self) -> Vec<(FetchKey, String)> {
        self.cache.environment().recorded_transfers()
    }

    /// Loads the country list of `region`, or of every region.
    ///
    /// Returns how many records were merged.
    pub async fn fetch_list(&self, region: Option<Region>) -> Result<usize> {
        let key = FetchKey::countries(region);
        self.begin(RequestShape::List, FetchPhase::FetchingList);

        let result = self
            .cache
            .resolve(&key, || self.source.fetch_list(region), &self.options)
            .await;

        match result {
            Ok(countries) => {
                let merged = self.repository.upsert_many(&countries);
                debug!(key = %key, merged, "country list merged");
                self.finish(RequestShape::List, None);
                Ok(merged)
            }
            Err(err) => {
                self.finish(RequestShape::List, Some(err.clone()));
                Err(err)
            }
        }
    }

    /// Ensures the full record of `code` is present and returns it.
    ///
    /// A record whose detail fields are all present is returned without a
    /// fetch. Otherwise the detail is fetched and merged as complete, then its
    /// neighbours are loaded. A border failure is logged and does not fail the
    /// detail request.
    pub async fn fetch_detail(&self, code: &str) -> Result<Country> {
        let code = CountryCode::new(code).map_err(|e| {
            error!(code, error = %e, "rejected country code");
            FetchError::from(e)
        })?;

        if let Some(existing) = self.repository.lookup(code.as_str()) {
            if existing.has_full_details() {
                debug!(code = %code, "detail already loaded");
                self.finish(RequestShape::Detail, None);
                return Ok(existing);
            }
        }

        self.begin(RequestShape::Detail, FetchPhase::FetchingDetail);
        let key = FetchKey::country(&code);
        let result = self
            .cache
            .resolve(
                &key,
                || async {
                    let country = self.source.fetch_country(&code).await?;
                    country.ensure_identity()?;
                    Ok::<_, FetchError>(country)
                },
                &self.options,
            )
            .await;

        let country = match result.and_then(|partial| self.merge_detail(&partial)) {
            Ok(country) => country,
            Err(err) => {
                self.finish(RequestShape::Detail, Some(err.clone()));
                return Err(err);
            }
        };

        let borders = country.borders.clone().unwrap_or_default();
        if !borders.is_empty() {
            self.set_phase(RequestShape::Detail, FetchPhase::FetchingBorders);
            if let Err(err) = self.fetch_borders(borders.iter().map(String::as_str)).await {
                warn!(code = %code, error = %err, "failed to load border countries");
            }
        }

        self.finish(RequestShape::Detail, None);
        Ok(country)
    }

    /// Loads the minimal records of the given neighbour codes.
    ///
    /// Codes are trimmed, case-folded and de-duplicated; blank ones are
    /// dropped. All codes are fetched concurrently and the batch succeeds only
    /// if every fetch does. Border countries never load their own borders.
    pub async fn fetch_borders<'a>(
        &self,
        codes: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<Country>> {
        let mut codes: Vec<CountryCode> = codes
            .into_iter()
            .filter_map(|raw| match CountryCode::new(raw) {
                Ok(code) => Some(code),
                Err(e) => {
                    trace!(code = raw, error = %e, "skipping border code");
                    None
                }
            })
            .collect();
        codes.sort();
        codes.dedup();

        let Some(key) = FetchKey::border_countries(&codes) else {
            return Ok(Vec::new());
        };

        self.begin(RequestShape::Borders, FetchPhase::FetchingBorders);
        let result = self
            .cache
            .resolve(&key, || self.fetch_border_batch(&codes), &self.options)
            .await;

        match result {
            Ok(partials) => {
                let merged: Vec<Country> = partials
                    .iter()
                    .filter_map(|partial| self.repository.upsert(partial, Some(false)))
                    .collect();
                debug!(key = %key, merged = merged.len(), "border countries merged");
                self.finish(RequestShape::Borders, None);
                Ok(merged)
            }
            Err(err) => {
                self.finish(RequestShape::Borders, Some(err.clone()));
                Err(err)
            }
        }
    }

    async fn fetch_border_batch(&self, codes: &[CountryCode]) -> Result<Vec<PartialCountry>> {
        let mut tasks = JoinSet::new();
        for (index, code) in codes.iter().cloned().enumerate() {
            let source = Arc::clone(&self.source);
            tasks.spawn(async move {
                let result = source.fetch_border_country(&code).await.and_then(|country| {
                    country.ensure_identity()?;
                    Ok(country)
                });
                (index, result)
            });
        }

        // every task runs to completion; the first failure fails the batch
        let mut slots: Vec<Option<PartialCountry>> = vec![None; codes.len()];
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(country))) => slots[index] = Some(country),
                Ok((index, Err(err))) => {
                    debug!(code = %codes[index], error = %err, "border fetch failed");
                    failure.get_or_insert(err);
                }
                Err(join_error) => {
                    failure.get_or_insert(NetworkError::Transport(join_error.to_string()).into());
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(slots.into_iter().flatten().collect()),
        }
    }

    fn merge_detail(&self, partial: &PartialCountry) -> Result<Country> {
        self.repository
            .upsert(partial, Some(false))
            .ok_or_else(|| FetchError::MalformedResponse("No country found".to_string()))
    }

    fn begin(&self, shape: RequestShape, phase: FetchPhase) {
        self.statuses.insert(shape, FetchStatus::started(phase));
    }

    fn set_phase(&self, shape: RequestShape, phase: FetchPhase) {
        self.statuses.entry(shape).or_default().phase = phase;
    }

    fn finish(&self, shape: RequestShape, error: Option<FetchError>) {
        self.statuses.insert(
            shape,
            FetchStatus {
                phase: FetchPhase::Done,
                error,
            },
        );
    }
}
