/// Fields requested for list rows and border countries.
pub const MINIMAL_FIELDS: &[&str] = &[
    "name",
    "nativeName",
    "population",
    "region",
    "flags",
    "capital",
    "alpha3Code",
];

/// Fields requested for a detail page.
pub const FULL_FIELDS: &[&str] = &[
    "name",
    "nativeName",
    "population",
    "region",
    "flags",
    "capital",
    "alpha3Code",
    "subregion",
    "topLevelDomain",
    "currencies",
    "languages",
    "borders",
];

pub(crate) fn query(fields: &[&str]) -> String {
    fields.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_is_a_superset_of_minimal() {
        assert!(MINIMAL_FIELDS.iter().all(|f| FULL_FIELDS.contains(f)));
        assert_eq!(FULL_FIELDS.len(), MINIMAL_FIELDS.len() + 5);
    }

    #[test]
    fn query_joins_with_commas() {
        assert_eq!(query(&["name", "region"]), "name,region");
    }
}
