//! Catalog lookups: exact match on name, slug or alias, then fuzzy match.

/// Outcome of matching free text against catalog entries.
#[derive(Debug, PartialEq)]
pub enum Match<'a, T> {
    Exact(&'a T),
    Fuzzy { entry: &'a T, similarity: f64 },
    /// Two or more entries matched equally well.
    Ambiguous(Vec<&'a T>),
    None,
}

impl<'a, T> Match<'a, T> {
    pub fn entry(&self) -> Option<&'a T> {
        match self {
            Match::Exact(entry) => Some(entry),
            Match::Fuzzy { entry, .. } => Some(entry),
            _ => None,
        }
    }
}

/// Lowercase, drop apostrophes and punctuation, collapse whitespace, drop a leading "the".
pub fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '’' | '‘' | '.'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let words = match words.split_first() {
        Some((&"the", rest)) if !rest.is_empty() => rest,
        _ => &words[..],
    };
    words.join(" ")
}

/// URL slug in the setlist source's format: "Mike's Song" -> "mikes-song".
pub fn slugify(name: &str) -> String {
    let lowered: String = name
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '’' | '‘'))
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    lowered
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

const TIE_EPSILON: f64 = 1e-9;

/// Find the entry whose keys best match `query`.
///
/// Exact matches on the normalized text win outright. Otherwise every
/// entry is scored by its best key's normalized Levenshtein similarity;
/// the top scorer wins if it clears `floor` and no other entry ties it.
pub fn best_match<'a, T, F>(query: &str, entries: &'a [T], keys: F, floor: f64) -> Match<'a, T>
where
    F: Fn(&T) -> Vec<&str>,
{
    let needle = normalize(query);
    if needle.is_empty() {
        return Match::None;
    }

    let exact: Vec<&T> = entries
        .iter()
        .filter(|entry| keys(*entry).iter().any(|k| normalize(k) == needle))
        .collect();
    match exact.len() {
        0 => {}
        1 => return Match::Exact(exact[0]),
        _ => return Match::Ambiguous(exact),
    }

    let mut best: Vec<&T> = Vec::new();
    let mut best_score = 0.0_f64;
    for entry in entries {
        let score = keys(entry)
            .iter()
            .map(|k| strsim::normalized_levenshtein(&needle, &normalize(k)))
            .fold(0.0_f64, f64::max);
        if score > best_score + TIE_EPSILON {
            best_score = score;
            best.clear();
            best.push(entry);
        } else if (score - best_score).abs() <= TIE_EPSILON && score > 0.0 {
            best.push(entry);
        }
    }

    if best_score < floor || best.is_empty() {
        return Match::None;
    }
    if best.len() > 1 {
        return Match::Ambiguous(best);
    }
    Match::Fuzzy {
        entry: best[0],
        similarity: best_score,
    }
}
