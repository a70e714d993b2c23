use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use terra_core::error::Result;
use terra_core::{CountryCode, CountrySource, PartialCountry, Region};

/// Wraps a source and counts the upstream requests made through it.
pub struct CountingSource<S> {
    inner: S,
    requests: Arc<AtomicUsize>,
}

impl<S> CountingSource<S> {
    pub fn new(inner: S) -> (Self, Arc<AtomicUsize>) {
        let requests = Arc::new(AtomicUsize::new(0));
        let source = Self {
            inner,
            requests: Arc::clone(&requests),
        };
        (source, requests)
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl<S: CountrySource> CountrySource for CountingSource<S> {
    async fn fetch_list(&self, region: Option<Region>) -> Result<Vec<PartialCountry>> {
        self.count();
        self.inner.fetch_list(region).await
    }

    async fn fetch_country(&self, code: &CountryCode) -> Result<PartialCountry> {
        self.count();
        self.inner.fetch_country(code).await
    }

    async fn fetch_border_country(&self, code: &CountryCode) -> Result<PartialCountry> {
        self.count();
        self.inner.fetch_border_country(code).await
    }
}
