//! Channel reducers for the StateGraph executor (C7).
//!
//! A graph's state is a serde-serializable struct or map; each of its top-level
//! fields is a channel, addressed by name. When two nodes in the same
//! level write the same channel, a `Reducer` combines the values; a channel with
//! no registered reducer is last-writer-wins, and concurrent writes to it are a
//! `ChannelConflict` rather than an arbitrary pick.
//!
//! Rather than one typed channel object per field, every channel is a named
//! entry in one registry operating over `serde_json::Value`, so a single
//! registry can cover an entire state struct without a channel type per field.

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

/// Combines two writes to the same channel within one super-step, or folds a new
/// write into the channel's existing value across super-steps. Must be associative:
/// the order writes are folded in in the same super-step is unspecified.
pub trait Reducer: Send + Sync {
    fn combine(&self, existing: Value, incoming: Value) -> Value;
}

impl<F> Reducer for F
where
    F: Fn(Value, Value) -> Value + Send + Sync,
{
    fn combine(&self, existing: Value, incoming: Value) -> Value {
        self(existing, incoming)
    }
}

/// Concatenates two JSON arrays; non-array operands are treated as singleton lists.
pub fn list_append_reducer() -> Arc<dyn Reducer> {
    Arc::new(|existing: Value, incoming: Value| {
        let mut list = match existing {
            Value::Array(a) => a,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        match incoming {
            Value::Array(a) => list.extend(a),
            other => list.push(other),
        }
        Value::Array(list)
    })
}

/// Sums two numeric values (as f64); non-numeric operands are treated as zero.
pub fn sum_reducer() -> Arc<dyn Reducer> {
    Arc::new(|existing: Value, incoming: Value| {
        let a = existing.as_f64().unwrap_or(0.0);
        let b = incoming.as_f64().unwrap_or(0.0);
        serde_json::json!(a + b)
    })
}

/// Registry mapping channel name -> reducer. Channels absent from the registry
/// are last-writer-wins: a second concurrent writer in the same super-step is a
/// `ChannelConflict`, not a silent overwrite.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    reducers: std::collections::HashMap<String, Arc<dyn Reducer>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: impl Into<String>, reducer: Arc<dyn Reducer>) {
        self.reducers.insert(channel.into(), reducer);
    }

    pub fn get(&self, channel: &str) -> Option<&Arc<dyn Reducer>> {
        self.reducers.get(channel)
    }

    pub fn has_reducer(&self, channel: &str) -> bool {
        self.reducers.contains_key(channel)
    }

    /// Merges one super-step's channel writes into `base`.
    ///
    /// `writes` maps channel name to the list of values written by nodes in
    /// this level (callers omit channels no node touched). A channel with no
    /// registered reducer written by more than one node is a conflict,
    /// returned as `Err(channel_name)`; a channel with a reducer folds all
    /// writers' values (and the prior base value) through it.
    pub fn merge(
        &self,
        base: &Value,
        writes: &std::collections::HashMap<String, Vec<Value>>,
    ) -> Result<Value, String> {
        let mut merged = base.clone();
        let obj = merged
            .as_object_mut()
            .ok_or_else(|| "state is not a JSON object".to_string())?;
        for (channel, values) in writes {
            if values.is_empty() {
                continue;
            }
            match self.get(channel) {
                Some(reducer) => {
                    let existing = obj.get(channel).cloned().unwrap_or(Value::Null);
                    let combined = values
                        .iter()
                        .cloned()
                        .fold(existing, |acc, v| reducer.combine(acc, v));
                    obj.insert(channel.clone(), combined);
                }
                None => {
                    if values.len() > 1 {
                        return Err(channel.clone());
                    }
                    obj.insert(channel.clone(), values[0].clone());
                }
            }
        }
        Ok(merged)
    }
}

impl Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.reducers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_append_reducer_concatenates_arrays() {
        let reducer = list_append_reducer();
        let combined = reducer.combine(serde_json::json!([1, 2]), serde_json::json!([3]));
        assert_eq!(combined, serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn list_append_reducer_wraps_scalars_into_lists() {
        let reducer = list_append_reducer();
        let combined = reducer.combine(Value::Null, serde_json::json!("a"));
        assert_eq!(combined, serde_json::json!(["a"]));
    }

    #[test]
    fn sum_reducer_adds_numbers() {
        let reducer = sum_reducer();
        let combined = reducer.combine(serde_json::json!(2), serde_json::json!(3));
        assert_eq!(combined, serde_json::json!(5.0));
    }

    #[test]
    fn merge_folds_reducer_channels_and_replaces_unreduced_single_writes() {
        let mut registry = ChannelRegistry::new();
        registry.register("log", list_append_reducer());
        let base = serde_json::json!({"log": ["a"], "status": "idle"});
        let mut writes = std::collections::HashMap::new();
        writes.insert("log".to_string(), vec![serde_json::json!("b"), serde_json::json!("c")]);
        writes.insert("status".to_string(), vec![serde_json::json!("running")]);
        let merged = registry.merge(&base, &writes).unwrap();
        assert_eq!(merged["status"], serde_json::json!("running"));
        let log = merged["log"].as_array().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], serde_json::json!("a"));
    }

    #[test]
    fn merge_rejects_concurrent_writes_to_an_unreduced_channel() {
        let registry = ChannelRegistry::new();
        let base = serde_json::json!({"status": "idle"});
        let mut writes = std::collections::HashMap::new();
        writes.insert(
            "status".to_string(),
            vec![serde_json::json!("a"), serde_json::json!("b")],
        );
        assert!(registry.merge(&base, &writes).is_err());
    }

    #[test]
    fn registry_reports_whether_a_channel_has_a_reducer() {
        let mut registry = ChannelRegistry::new();
        assert!(!registry.has_reducer("messages"));
        registry.register("messages", list_append_reducer());
        assert!(registry.has_reducer("messages"));
        assert!(!registry.has_reducer("other"));
    }
}
