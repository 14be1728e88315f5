use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::core::errors::{FlowError, Result};

/// Options recognized by a flow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Keep collecting outcomes after a failure instead of stopping at the
    /// first one
    pub settle: bool,
    /// Maximum number of tasks running at once in parallel runs (None = all)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Options not used by the runner, carried through merges untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            settle: true,
            concurrency: None,
            extra: Map::new(),
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle(mut self, settle: bool) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(limit);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == Some(0) {
            return Err(FlowError::configuration_field(
                "concurrency must be greater than 0",
                "concurrency",
            ));
        }
        Ok(())
    }

    /// Number of tasks a parallel run over `total` items keeps in flight
    pub fn effective_concurrency(&self, total: usize) -> usize {
        match self.concurrency {
            Some(limit) => limit.min(total),
            None => total,
        }
    }

    /// Apply per-call overrides on top of these options
    pub fn merge(&mut self, patch: &OptionsPatch) {
        if let Some(settle) = patch.settle {
            self.settle = settle;
        }
        if let Some(concurrency) = patch.concurrency {
            self.concurrency = concurrency;
        }
        for (key, value) in &patch.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    pub fn merged(&self, patch: &OptionsPatch) -> Self {
        let mut merged = self.clone();
        merged.merge(patch);
        merged
    }

    /// Load options from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self =
            serde_yaml::from_str(yaml).map_err(|e| FlowError::serialization("yaml", e))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| FlowError::serialization("json", e))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a file; `.json` files are read as JSON, anything
    /// else as YAML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| FlowError::io(format!("read {}", path.display()), e))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }
}

/// Per-call overrides merged over the persisted options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionsPatch {
    settle: Option<bool>,
    concurrency: Option<Option<usize>>,
    extra: Map<String, Value>,
}

impl OptionsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settle(mut self, settle: bool) -> Self {
        self.settle = Some(settle);
        self
    }

    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = Some(Some(limit));
        self
    }

    /// Lift any persisted concurrency limit
    pub fn unbounded(mut self) -> Self {
        self.concurrency = Some(None);
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.settle.is_none() && self.concurrency.is_none() && self.extra.is_empty()
    }

    /// Read overrides from a JSON object, or `null` for no overrides.
    /// `settle` must be a boolean and `concurrency` a non-negative integer or
    /// null; other keys are kept as extra options.
    pub fn from_json(document: Value) -> Result<Self> {
        let map = match document {
            Value::Null => return Ok(Self::new()),
            Value::Object(map) => map,
            _ => return Err(FlowError::configuration("options must be a JSON object")),
        };

        let mut patch = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "settle" => {
                    let settle = value.as_bool().ok_or_else(|| {
                        FlowError::configuration_field("settle must be a boolean", "settle")
                    })?;
                    patch.settle = Some(settle);
                }
                "concurrency" => {
                    patch.concurrency = match value {
                        Value::Null => Some(None),
                        other => {
                            let limit = other.as_u64().ok_or_else(|| {
                                FlowError::configuration_field(
                                    "concurrency must be a non-negative integer or null",
                                    "concurrency",
                                )
                            })?;
                            let limit = usize::try_from(limit).map_err(|_| {
                                FlowError::configuration_field(
                                    format!("concurrency {} is out of range", limit),
                                    "concurrency",
                                )
                            })?;
                            Some(Some(limit))
                        }
                    };
                }
                _ => {
                    patch.extra.insert(key, value);
                }
            }
        }
        Ok(patch)
    }
}

impl From<RunOptions> for OptionsPatch {
    fn from(options: RunOptions) -> Self {
        Self {
            settle: Some(options.settle),
            concurrency: Some(options.concurrency),
            extra: options.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = RunOptions::default();
        assert!(options.settle);
        assert_eq!(options.concurrency, None);
        assert_eq!(options.effective_concurrency(5), 5);
        assert_eq!(options.with_concurrency(2).effective_concurrency(5), 2);
    }

    #[test]
    fn test_yaml_keeps_unknown_options() {
        let options = RunOptions::from_yaml_str("settle: false\nconcurrency: 3\nlabel: nightly\n")
            .unwrap();
        assert_eq!(
            options,
            RunOptions::new()
                .with_settle(false)
                .with_concurrency(3)
                .with_extra("label", json!("nightly"))
        );

        let round_trip = serde_json::to_value(&options).unwrap();
        assert_eq!(
            round_trip,
            json!({"settle": false, "concurrency": 3, "label": "nightly"})
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = RunOptions::from_json_str(r#"{"concurrency": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            FlowError::Configuration { field: Some(ref f), .. } if f == "concurrency"
        ));
        assert!(RunOptions::from_yaml_str("settle: [").is_err());
    }

    #[test]
    fn test_merge_overrides_without_dropping() {
        let mut options = RunOptions::new()
            .with_concurrency(4)
            .with_extra("label", json!("a"));
        options.merge(&OptionsPatch::new().settle(false).extra("owner", json!("ops")));

        assert!(!options.settle);
        assert_eq!(options.concurrency, Some(4));
        assert_eq!(options.extra.get("label"), Some(&json!("a")));
        assert_eq!(options.extra.get("owner"), Some(&json!("ops")));

        options.merge(&OptionsPatch::new().unbounded());
        assert_eq!(options.concurrency, None);
    }

    #[test]
    fn test_patch_from_json() {
        let patch = OptionsPatch::from_json(json!({"settle": false, "concurrency": null, "x": 1}))
            .unwrap();
        assert_eq!(
            patch,
            OptionsPatch::new().settle(false).unbounded().extra("x", json!(1))
        );

        assert!(OptionsPatch::from_json(json!({"settle": "yes"})).is_err());
        assert!(OptionsPatch::from_json(json!([1, 2])).is_err());
        assert!(OptionsPatch::from_json(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_patch_concurrency_range() {
        let patch = OptionsPatch::from_json(json!({"concurrency": u32::MAX})).unwrap();
        assert_eq!(patch.concurrency, Some(Some(u32::MAX as usize)));

        for bad in [json!(-1), json!(2.5), json!("4")] {
            let err = OptionsPatch::from_json(json!({ "concurrency": bad })).unwrap_err();
            assert!(matches!(
                err,
                FlowError::Configuration { field: Some(ref field), .. } if field == "concurrency"
            ));
        }
    }
}
