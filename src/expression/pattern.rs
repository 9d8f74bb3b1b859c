use crate::core::{EnsembleError, Result};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> = Arc::new(Mutex::new(
        LruCache::new(NonZeroUsize::new(200).unwrap_or(NonZeroUsize::MIN))
    ));
}

/// Converts a shell-style wildcard (`*` any run, `?` one character) into
/// an anchored regex.
#[inline]
fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                regex.push_str(&regex::escape(&chars[i].to_string()));
            }
            c if ".+^${}()|[]\\".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
        i += 1;
    }

    regex.push('$');
    regex
}

/// Fast path for patterns that need no regex
#[inline]
fn fast_path(text: &str, pattern: &str) -> Option<bool> {
    if !pattern.contains(['*', '?', '\\']) {
        return Some(text == pattern);
    }

    // "prefix*"
    if let Some(prefix) = pattern.strip_suffix('*')
        && !prefix.contains(['*', '?', '\\'])
    {
        return Some(text.starts_with(prefix));
    }

    // "*suffix"
    if let Some(suffix) = pattern.strip_prefix('*')
        && !suffix.contains(['*', '?', '\\'])
    {
        return Some(text.ends_with(suffix));
    }

    None
}

fn get_or_compile_regex(pattern: &str) -> Result<Arc<Regex>> {
    {
        let mut cache = REGEX_LRU_CACHE.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(regex) = cache.get(pattern) {
            return Ok(Arc::clone(regex));
        }
    }

    let compiled = Regex::new(&wildcard_to_regex(pattern))
        .map_err(|e| EnsembleError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    let compiled = Arc::new(compiled);

    {
        let mut cache = REGEX_LRU_CACHE.lock().unwrap_or_else(|p| p.into_inner());
        cache.put(pattern.to_string(), Arc::clone(&compiled));
    }

    Ok(compiled)
}

/// Matches `text` against a wildcard pattern such as `F*` or `WOPR:OP_?`.
#[inline]
pub fn matches_wildcard(text: &str, pattern: &str) -> Result<bool> {
    if let Some(result) = fast_path(text, pattern) {
        return Ok(result);
    }
    let regex = get_or_compile_regex(pattern)?;
    Ok(regex.is_match(text))
}

/// Keeps the names matching any of `patterns`; no patterns keeps all.
/// The result is sorted and free of duplicates.
pub fn filter_names<'a, S: AsRef<str>>(
    names: impl IntoIterator<Item = &'a str>,
    patterns: &[S],
) -> Result<Vec<String>> {
    let mut kept = Vec::new();
    for name in names {
        let keep = if patterns.is_empty() {
            true
        } else {
            let mut any = false;
            for pattern in patterns {
                if matches_wildcard(name, pattern.as_ref())? {
                    any = true;
                    break;
                }
            }
            any
        };
        if keep {
            kept.push(name.to_string());
        }
    }
    kept.sort();
    kept.dedup();
    Ok(kept)
}
