//! Opaque codec options.
//!
//! Options are a JSON object: the core never interprets them beyond
//! merging defaults with rule overrides. Encoders read the keys they know
//! through the typed accessors below.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use super::CodecError;

/// Codec option map (`quality`, `speed`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodecOptions(Map<String, Value>);

impl CodecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Layer `self` over `defaults`; keys in `self` win.
    pub fn merged_over(&self, defaults: &CodecOptions) -> CodecOptions {
        let mut merged = defaults.0.clone();
        for (key, value) in &self.0 {
            merged.insert(key.clone(), value.clone());
        }
        CodecOptions(merged)
    }

    /// Read an integer option constrained to `range`.
    pub fn u8_in(&self, key: &str, range: RangeInclusive<u8>) -> Result<Option<u8>, CodecError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let invalid = |reason: String| CodecError::InvalidOption {
            key: key.to_string(),
            reason,
        };
        let number = value
            .as_f64()
            .ok_or_else(|| invalid(format!("expected a number, got {value}")))?;
        if number.fract() != 0.0 || number < f64::from(*range.start()) || number > f64::from(*range.end()) {
            return Err(invalid(format!(
                "expected {}..={}, got {number}",
                range.start(),
                range.end()
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(Some(number as u8))
    }

    /// `quality` option (1..=100).
    pub fn quality(&self) -> Result<Option<u8>, CodecError> {
        self.u8_in("quality", 1..=100)
    }

    /// Stable digest of the options, independent of key order.
    ///
    /// Used to namespace cached outputs so option changes never reuse them.
    pub fn fingerprint(&self) -> String {
        let sorted: BTreeMap<&String, &Value> = self.0.iter().collect();
        let bytes = serde_json::to_vec(&sorted).unwrap_or_default();
        blake3::hash(&bytes).to_hex()[..12].to_string()
    }
}

impl From<Map<String, Value>> for CodecOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_rule_wins() {
        let defaults = CodecOptions::new().with("quality", 60).with("speed", 6);
        let rule = CodecOptions::new().with("quality", 80);
        let merged = rule.merged_over(&defaults);
        assert_eq!(merged.quality().unwrap(), Some(80));
        assert_eq!(merged.u8_in("speed", 1..=10).unwrap(), Some(6));
    }

    #[test]
    fn test_u8_in_rejects_out_of_range() {
        let options = CodecOptions::new().with("quality", 0);
        assert!(options.quality().is_err());
        let options = CodecOptions::new().with("quality", 80.5);
        assert!(options.quality().is_err());
        let options = CodecOptions::new().with("quality", "high");
        assert!(options.quality().is_err());
        assert_eq!(CodecOptions::new().quality().unwrap(), None);
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a = CodecOptions::new().with("quality", 80).with("speed", 4);
        let b = CodecOptions::new().with("speed", 4).with("quality", 80);
        assert_eq!(a.fingerprint(), b.fingerprint());
        let c = CodecOptions::new().with("quality", 81).with("speed", 4);
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
