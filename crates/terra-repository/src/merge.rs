use terra_core::{normalize_population, Country, CountryCode, PartialCountry, Population};

const CAPITAL_FALLBACK: &str = "N/A";

/// Merges a fetched partial record over the stored one.
///
/// Every field resolves as `partial ?? existing ?? default`. The completeness
/// flag is `needs_full_details` when given; otherwise a record that is already
/// complete stays complete, and a new or minimal one is complete only when the
/// merged result carries border or currency data.
pub fn merge_country(
    code: CountryCode,
    existing: Option<&Country>,
    partial: &PartialCountry,
    needs_full_details: Option<bool>,
) -> Country {
    let population = match &partial.population {
        Some(input) => normalize_population(Some(input)),
        None => existing.map_or(Population::Unknown, |c| c.population),
    };

    let mut merged = Country {
        code,
        name: pick(&partial.name, existing.map(|c| &c.name)).unwrap_or_default(),
        native_name: pick(
            &partial.native_name,
            existing.and_then(|c| c.native_name.as_ref()),
        ),
        population,
        region: pick(&partial.region, existing.map(|c| &c.region))
            .unwrap_or_default()
            .to_lowercase(),
        subregion: pick(
            &partial.subregion,
            existing.and_then(|c| c.subregion.as_ref()),
        ),
        capital: pick(&partial.capital, existing.map(|c| &c.capital))
            .unwrap_or_else(|| CAPITAL_FALLBACK.to_string()),
        flags: pick(&partial.flags, existing.map(|c| &c.flags)).unwrap_or_default(),
        top_level_domains: pick(
            &partial.top_level_domains,
            existing.and_then(|c| c.top_level_domains.as_ref()),
        ),
        currencies: pick(
            &partial.currencies,
            existing.and_then(|c| c.currencies.as_ref()),
        ),
        languages: pick(
            &partial.languages,
            existing.and_then(|c| c.languages.as_ref()),
        ),
        borders: pick(&partial.borders, existing.and_then(|c| c.borders.as_ref())),
        needs_full_details: true,
    };

    merged.needs_full_details = match needs_full_details {
        Some(explicit) => explicit,
        None if existing.is_some_and(|c| !c.needs_full_details) => false,
        None => !merged.carries_detail_data(),
    };

    merged
}

fn pick<T: Clone>(newer: &Option<T>, older: Option<&T>) -> Option<T> {
    newer.as_ref().or(older).cloned()
}
