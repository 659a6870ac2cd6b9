//! Canonical JSON and artifact hashing
//!
//! Artifacts are hashed over a compact JSON form with object keys sorted at
//! every depth, so the digest does not depend on how the exporting tool
//! ordered or indented its output.

use serde::Serialize;
use serde_json::{Map, Value};

/// Domain separator mixed into every bundle digest
const FINGERPRINT_DOMAIN: &[u8] = b"animal-health/artifact-bundle/v1";

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (key, val) in entries {
                sorted.insert(key, sort_keys(val));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Compact canonical JSON for any serializable value
pub fn canonical_json_string<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = sort_keys(serde_json::to_value(value)?);
    serde_json::to_string(&canonical)
}

/// Incremental BLAKE3 digest over named, canonicalized parts
pub struct Fingerprint {
    hasher: blake3::Hasher,
}

impl Fingerprint {
    pub fn new() -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(FINGERPRINT_DOMAIN);
        Self { hasher }
    }

    /// Add one part; the name and length are framed so parts cannot run together
    pub fn add<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), serde_json::Error> {
        let json = canonical_json_string(value)?;
        self.hasher.update(&(name.len() as u64).to_be_bytes());
        self.hasher.update(name.as_bytes());
        self.hasher.update(&(json.len() as u64).to_be_bytes());
        self.hasher.update(json.as_bytes());
        Ok(())
    }

    /// Hex encoded digest
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize().as_bytes())
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_at_every_depth() {
        let value = json!({"b": 1, "a": {"d": [ {"z": 1, "y": 2} ], "c": null}});
        let out = canonical_json_string(&value).unwrap();
        assert_eq!(out, r#"{"a":{"c":null,"d":[{"y":2,"z":1}]},"b":1}"#);
    }

    #[test]
    fn fingerprint_is_stable_and_order_sensitive() {
        let mut a = Fingerprint::new();
        a.add("scaler", &json!({"mean": [1.0], "kind": "standard"})).unwrap();
        a.add("target", &json!(["Critical", "Normal"])).unwrap();
        let a = a.finish();

        let mut b = Fingerprint::new();
        b.add("scaler", &json!({"kind": "standard", "mean": [1.0]})).unwrap();
        b.add("target", &json!(["Critical", "Normal"])).unwrap();
        assert_eq!(a, b.finish());
        assert_eq!(a.len(), 64);

        let mut c = Fingerprint::new();
        c.add("target", &json!(["Critical", "Normal"])).unwrap();
        c.add("scaler", &json!({"kind": "standard", "mean": [1.0]})).unwrap();
        assert_ne!(a, c.finish());
    }
}
