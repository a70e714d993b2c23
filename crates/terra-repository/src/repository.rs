use crate::merge::merge_country;
use crate::view::ViewQuery;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use terra_core::{Country, CountryCode, PartialCountry};
use tracing::{debug, trace};

#[derive(Debug)]
struct StoredCountry {
    // position of the first insert; ties in a view keep this order
    sequence: u64,
    country: Country,
}

#[derive(Debug)]
struct ViewMemo {
    query: ViewQuery,
    version: u64,
    rows: Arc<[Country]>,
}

/// Normalized store of every country seen so far, keyed by upper-case code.
///
/// Records are replaced whole on every merge and never removed. Each write
/// bumps a version counter, which keys the memoized list view. Views start
/// from first-insertion order, so equal sort keys come out the same way in
/// every repository fed the same writes.
#[derive(Debug, Default)]
pub struct CountryRepository {
    records: DashMap<CountryCode, StoredCountry>,
    inserted: AtomicU64,
    version: AtomicU64,
    memo: Mutex<Option<ViewMemo>>,
}

impl CountryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `partial` into the stored record for its code.
    ///
    /// Returns the merged record, or `None` when the partial carries no
    /// usable code, in which case nothing changes.
    pub fn upsert(
        &self,
        partial: &PartialCountry,
        needs_full_details: Option<bool>,
    ) -> Option<Country> {
        let Some(code) = partial.country_code() else {
            trace!(code = ?partial.code, "ignoring record without a usable code");
            return None;
        };

        // the merge runs under the entry guard, so writers to one code serialize
        let merged = match self.records.entry(code.clone()) {
            Entry::Occupied(mut entry) => {
                let stored = entry.get_mut();
                let merged =
                    merge_country(code, Some(&stored.country), partial, needs_full_details);
                stored.country = merged.clone();
                merged
            }
            Entry::Vacant(entry) => {
                let merged = merge_country(code, None, partial, needs_full_details);
                entry.insert(StoredCountry {
                    sequence: self.inserted.fetch_add(1, Ordering::AcqRel),
                    country: merged.clone(),
                });
                merged
            }
        };
        self.version.fetch_add(1, Ordering::AcqRel);

        debug!(
            code = %merged.code,
            needs_full_details = merged.needs_full_details,
            "merged country record"
        );
        Some(merged)
    }

    /// Merges every partial with inferred completeness.
    pub fn upsert_many<'a>(&self, partials: impl IntoIterator<Item = &'a PartialCountry>) -> usize {
        partials
            .into_iter()
            .filter_map(|partial| self.upsert(partial, None))
            .count()
    }

    /// Case-insensitive lookup. Blank or malformed codes find nothing.
    pub fn lookup(&self, code: &str) -> Option<Country> {
        let code = CountryCode::new(code).ok()?;
        self.records
            .get(&code)
            .map(|record| record.value().country.clone())
    }

    /// Returns the rows for `query`, reusing the previous result when neither
    /// the query nor the data has changed.
    pub fn view(&self, query: &ViewQuery) -> Arc<[Country]> {
        let version = self.version();
        let mut memo = self.memo.lock();
        if let Some(cached) = memo.as_ref() {
            if cached.version == version && &cached.query == query {
                trace!(version, "view memo hit");
                return Arc::clone(&cached.rows);
            }
        }

        let mut records: Vec<(u64, Country)> = self
            .records
            .iter()
            .map(|record| (record.sequence, record.country.clone()))
            .collect();
        records.sort_unstable_by_key(|(sequence, _)| *sequence);

        let rows: Arc<[Country]> = query
            .apply(records.into_iter().map(|(_, country)| country))
            .into();
        debug!(version, rows = rows.len(), "recomputed country view");
        *memo = Some(ViewMemo {
            query: query.clone(),
            version,
            rows: Arc::clone(&rows),
        });
        rows
    }

    /// All records ordered by code.
    pub fn snapshot(&self) -> Vec<Country> {
        let mut records: Vec<Country> = self
            .records
            .iter()
            .map(|record| record.value().country.clone())
            .collect();
        records.sort_by(|a, b| a.code.cmp(&b.code));
        records
    }

    /// Number of completed writes so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
