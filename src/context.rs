//! Context manager: token estimation and history truncation
//!
//! Keeps the model prompt inside the configured window. Token counts come
//! from a cheap deterministic estimator; truncation walks the history from
//! newest to oldest and retains the longest suffix that fits. An oversized
//! single entry has its inner strings cut at shrinking caps before the
//! history is given up on entirely.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Marker inserted wherever a string was cut
pub const TRUNCATION_NOTICE: &str = "[content truncated]";

/// Tokens reserved for prompt scaffolding and model output
pub const DEFAULT_RESERVED_TOKENS: usize = 1000;

/// Shrinking per-string caps tried when a single entry is oversized
const SHRINK_CAPS: [usize; 7] = [2000, 1000, 500, 200, 100, 50, 20];

/// Estimate the token count of a string.
///
/// A byte-length proxy: roughly four bytes per token, never zero for
/// non-empty input. Deterministic and monotone in the input length.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimated tokens for any serializable value
pub fn estimate_value_tokens<T: Serialize>(value: &T) -> usize {
    match serde_json::to_string(value) {
        Ok(s) => estimate_tokens(&s),
        Err(_) => 0,
    }
}

/// Truncate a history list to fit `max_tokens - reserved_tokens`.
///
/// Returns the retained newest-suffix and whether anything was dropped or
/// cut. If even the newest entry alone is too large, its long strings are
/// shortened at shrinking caps; if the smallest cap still does not fit, the
/// history comes back empty with the truncated flag set.
pub fn truncate_history<T>(
    history: &[T],
    max_tokens: usize,
    reserved_tokens: usize,
) -> (Vec<T>, bool)
where
    T: Serialize + DeserializeOwned + Clone,
{
    if history.is_empty() {
        return (Vec::new(), false);
    }

    let available = max_tokens.saturating_sub(reserved_tokens);

    // Walk newest to oldest, keeping the longest suffix that fits.
    let mut total = 0usize;
    let mut keep_from = history.len();
    for (index, entry) in history.iter().enumerate().rev() {
        let entry_tokens = estimate_value_tokens(entry);
        if total + entry_tokens <= available {
            total += entry_tokens;
            keep_from = index;
        } else {
            break;
        }
    }

    if keep_from == history.len() {
        // Even the newest entry alone is over budget; cut its strings.
        warn!("newest history entry exceeds the token budget, truncating its contents");
        let Some(latest) = history.last() else {
            return (Vec::new(), false);
        };
        let Ok(value) = serde_json::to_value(latest) else {
            return (Vec::new(), true);
        };

        for cap in SHRINK_CAPS {
            let shrunk = truncate_long_strings(value.clone(), cap);
            if estimate_value_tokens(&shrunk) <= available {
                match serde_json::from_value::<T>(shrunk) {
                    Ok(entry) => return (vec![entry], true),
                    Err(e) => {
                        warn!("truncated entry no longer deserializes: {}", e);
                        return (Vec::new(), true);
                    }
                }
            }
        }

        warn!("history entry still oversized at the smallest cap, dropping history");
        return (Vec::new(), true);
    }

    if keep_from > 0 {
        warn!(
            "history over budget, keeping the newest {} of {} entries",
            history.len() - keep_from,
            history.len()
        );
        return (history[keep_from..].to_vec(), true);
    }

    (history.to_vec(), false)
}

/// Recursively shorten every string longer than `max_len` characters,
/// appending the truncation marker at each cut site.
pub fn truncate_long_strings(value: Value, max_len: usize) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, truncate_long_strings(v, max_len)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| truncate_long_strings(v, max_len))
                .collect(),
        ),
        Value::String(s) => {
            if s.chars().count() > max_len {
                let cut: String = s.chars().take(max_len).collect();
                Value::String(format!("{}{}", cut, TRUNCATION_NOTICE))
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(size: usize) -> Value {
        json!({"result": "x".repeat(size)})
    }

    #[test]
    fn estimator_is_deterministic_and_monotone() {
        let a = estimate_tokens("hello world");
        assert_eq!(a, estimate_tokens("hello world"));
        assert!(estimate_tokens("hello world, longer") >= a);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn short_history_is_untouched() {
        let history = vec![entry(10), entry(10)];
        let (kept, truncated) = truncate_history(&history, 4096, 1000);
        assert_eq!(kept.len(), 2);
        assert!(!truncated);
    }

    #[test]
    fn retains_newest_suffix_that_fits() {
        // ~500 tokens per entry, budget 4096 - 1000 = 3096.
        let history: Vec<Value> = (0..50).map(|_| entry(2000)).collect();
        let (kept, truncated) = truncate_history(&history, 4096, 1000);
        assert!(truncated);
        assert!(!kept.is_empty());
        assert!(kept.len() < 50);

        let total: usize = kept.iter().map(estimate_value_tokens).sum();
        assert!(total <= 3096);
        // Adding one more entry would exceed the budget.
        let one_more = total + estimate_value_tokens(&entry(2000));
        assert!(one_more > 3096);
    }

    #[test]
    fn truncation_is_monotone_in_the_budget() {
        let history: Vec<Value> = (0..20).map(|i| entry(100 + i * 40)).collect();
        let (small, _) = truncate_history(&history, 2000, 1000);
        let (large, _) = truncate_history(&history, 4000, 1000);
        // The smaller budget's suffix is a suffix of the larger budget's.
        assert!(small.len() <= large.len());
        assert_eq!(&large[large.len() - small.len()..], &small[..]);
    }

    #[test]
    fn oversized_single_entry_gets_inner_truncation() {
        let history = vec![entry(100_000)];
        let (kept, truncated) = truncate_history(&history, 2000, 1000);
        assert!(truncated);
        assert_eq!(kept.len(), 1);
        let text = kept[0]["result"].as_str().unwrap();
        assert!(text.ends_with(TRUNCATION_NOTICE));
        assert!(estimate_value_tokens(&kept[0]) <= 1000);
    }

    #[test]
    fn hopeless_entry_empties_the_history() {
        // A huge object of many short strings cannot be saved by string caps.
        let map: serde_json::Map<String, Value> = (0..4000)
            .map(|i| (format!("key_{i}"), json!("v")))
            .collect();
        let history = vec![Value::Object(map)];
        let (kept, truncated) = truncate_history(&history, 1100, 1000);
        assert!(truncated);
        assert!(kept.is_empty());
    }

    #[test]
    fn nested_strings_are_cut_with_marker() {
        let value = json!({"outer": {"inner": "y".repeat(50)}, "list": ["z".repeat(50)]});
        let cut = truncate_long_strings(value, 10);
        let inner = cut["outer"]["inner"].as_str().unwrap();
        assert!(inner.starts_with("yyyyyyyyyy"));
        assert!(inner.contains(TRUNCATION_NOTICE));
        assert!(cut["list"][0].as_str().unwrap().contains(TRUNCATION_NOTICE));
    }
}
