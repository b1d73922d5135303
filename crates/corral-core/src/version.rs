//! Template version ordering
//!
//! Versions are compared segment by segment as plain strings, not as numbers:
//! `"9"` sorts above `"10"`. Existing template repositories rely on this
//! ordering, so it is kept as is.

/// Whether `version` should replace `previous` as the latest version.
///
/// Leading `v`s are ignored and comparison is case-insensitive. When every
/// compared segment is equal, the version with at least as many segments wins.
pub fn is_newer_than(version: &str, previous: &str) -> bool {
    let version = version.to_lowercase();
    let previous = previous.to_lowercase();
    let version_parts: Vec<&str> = version.trim_start_matches('v').split('.').collect();
    let previous_parts: Vec<&str> = previous.trim_start_matches('v').split('.').collect();

    for (current, prior) in version_parts.iter().zip(previous_parts.iter()) {
        if current > prior {
            return true;
        }
        if current < prior {
            return false;
        }
    }

    version_parts.len() >= previous_parts.len()
}

/// Pick the latest version from an iterator.
///
/// The first item seeds the result; every later item replaces it when
/// [`is_newer_than`] says so.
pub fn latest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions.into_iter().fold(None, |latest, candidate| match latest {
        Some(current) if !is_newer_than(candidate, current) => Some(current),
        _ => Some(candidate),
    })
}
