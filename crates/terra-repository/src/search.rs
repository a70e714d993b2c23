/// Folds a string for comparison: transliterates to ASCII and lower-cases it.
///
/// `"Åland"` and `"aland"` fold to the same key.
pub fn fold_key(s: &str) -> String {
    deunicode::deunicode(s).to_lowercase()
}

/// Loose name matching used by the search box.
///
/// Both sides are folded first. A blank query or text never matches. The
/// query matches when it is a substring of the text, or failing that, when
/// all of its characters appear in the text in order.
///
/// ```
/// use terra_repository::fuzzy_match;
///
/// assert!(fuzzy_match("ger", "Germany"));
/// assert!(fuzzy_match("gmy", "Germany"));
/// assert!(fuzzy_match("cote", "Côte d'Ivoire"));
/// assert!(!fuzzy_match("xyz", "Germany"));
/// ```
pub fn fuzzy_match(query: &str, text: &str) -> bool {
    let query = fold_key(query.trim());
    let text = fold_key(text);
    if query.is_empty() || text.trim().is_empty() {
        return false;
    }

    if text.contains(&query) {
        return true;
    }

    let mut remaining = text.chars();
    query
        .chars()
        .all(|wanted| remaining.by_ref().any(|ch| ch == wanted))
}
