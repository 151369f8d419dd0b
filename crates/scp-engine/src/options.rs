//! # Engine Options
//!
//! `EngineOptions` is the typed view of the merged option map handed to an
//! engine: the baseline every validator gets, overlaid by the caller's
//! `customOptions`. The merge is shallow and the caller wins on every key.
//!
//! Keys the engines do not interpret are kept in [`EngineOptions::extra`] so
//! they survive a round trip through a standalone bundle.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;

/// Schema dialect an engine compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EngineMode {
    /// JSON Schema draft-07.
    #[default]
    Standard,
    /// JSON Type Definition (RFC 8927).
    Jtd,
    /// JSON Schema 2019-09.
    Draft2019_09,
    /// JSON Schema 2020-12.
    Draft2020_12,
}

impl EngineMode {
    /// Wire name of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Jtd => "jtd",
            Self::Draft2019_09 => "2019",
            Self::Draft2020_12 => "2020",
        }
    }

    /// Whether the mode is one of the JSON Schema drafts.
    pub fn is_draft(&self) -> bool {
        !matches!(self, Self::Jtd)
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "standard" | "draft-07" | "draft7" => Ok(Self::Standard),
            "jtd" => Ok(Self::Jtd),
            "2019" | "2019-09" => Ok(Self::Draft2019_09),
            "2020" | "2020-12" => Ok(Self::Draft2020_12),
            other => Err(EngineError::Configuration(format!("unknown mode '{other}'"))),
        }
    }
}

impl TryFrom<String> for EngineMode {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EngineMode> for String {
    fn from(mode: EngineMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Wire shape shared by the options that accept either a boolean or a word.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum FlagOrWord {
    Flag(bool),
    Word(String),
}

/// Type coercion applied to payloads before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlagOrWord", into = "FlagOrWord")]
pub enum CoerceTypes {
    /// No coercion.
    Off,
    /// Scalar coercion (`"1"` to `1`, `1` to `"1"`, ...).
    On,
    /// Scalar coercion plus wrapping into, and unwrapping out of, arrays.
    Array,
}

impl TryFrom<FlagOrWord> for CoerceTypes {
    type Error = String;

    fn try_from(value: FlagOrWord) -> Result<Self, Self::Error> {
        match value {
            FlagOrWord::Flag(false) => Ok(Self::Off),
            FlagOrWord::Flag(true) => Ok(Self::On),
            FlagOrWord::Word(w) if w == "array" => Ok(Self::Array),
            FlagOrWord::Word(w) => Err(format!("coerceTypes: expected boolean or \"array\", got \"{w}\"")),
        }
    }
}

impl From<CoerceTypes> for FlagOrWord {
    fn from(value: CoerceTypes) -> Self {
        match value {
            CoerceTypes::Off => Self::Flag(false),
            CoerceTypes::On => Self::Flag(true),
            CoerceTypes::Array => Self::Word("array".into()),
        }
    }
}

/// Default filling for missing properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlagOrWord", into = "FlagOrWord")]
pub enum UseDefaults {
    /// Leave missing properties alone.
    Off,
    /// Insert `default` for missing properties.
    On,
    /// Also replace `null` and `""` with the `default`.
    Empty,
}

impl TryFrom<FlagOrWord> for UseDefaults {
    type Error = String;

    fn try_from(value: FlagOrWord) -> Result<Self, Self::Error> {
        match value {
            FlagOrWord::Flag(false) => Ok(Self::Off),
            FlagOrWord::Flag(true) => Ok(Self::On),
            FlagOrWord::Word(w) if w == "empty" => Ok(Self::Empty),
            FlagOrWord::Word(w) => Err(format!("useDefaults: expected boolean or \"empty\", got \"{w}\"")),
        }
    }
}

impl From<UseDefaults> for FlagOrWord {
    fn from(value: UseDefaults) -> Self {
        match value {
            UseDefaults::Off => Self::Flag(false),
            UseDefaults::On => Self::Flag(true),
            UseDefaults::Empty => Self::Word("empty".into()),
        }
    }
}

/// Removal of properties a schema does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FlagOrWord", into = "FlagOrWord")]
pub enum RemoveAdditional {
    /// Keep every property.
    Off,
    /// Remove undeclared properties where `additionalProperties: false`.
    Declared,
    /// Remove undeclared properties wherever an object schema declares any.
    All,
    /// Remove undeclared properties that fail `additionalProperties`.
    Failing,
}

impl TryFrom<FlagOrWord> for RemoveAdditional {
    type Error = String;

    fn try_from(value: FlagOrWord) -> Result<Self, Self::Error> {
        match value {
            FlagOrWord::Flag(false) => Ok(Self::Off),
            FlagOrWord::Flag(true) => Ok(Self::Declared),
            FlagOrWord::Word(w) if w == "all" => Ok(Self::All),
            FlagOrWord::Word(w) if w == "failing" => Ok(Self::Failing),
            FlagOrWord::Word(w) => Err(format!(
                "removeAdditional: expected boolean, \"all\" or \"failing\", got \"{w}\""
            )),
        }
    }
}

impl From<RemoveAdditional> for FlagOrWord {
    fn from(value: RemoveAdditional) -> Self {
        match value {
            RemoveAdditional::Off => Self::Flag(false),
            RemoveAdditional::Declared => Self::Flag(true),
            RemoveAdditional::All => Self::Word("all".into()),
            RemoveAdditional::Failing => Self::Word("failing".into()),
        }
    }
}

/// Source emission settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeOptions {
    /// Keep enough material on each artifact to emit standalone source.
    pub source: bool,
}

/// Resolved engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineOptions {
    pub coerce_types: CoerceTypes,
    pub use_defaults: UseDefaults,
    pub remove_additional: RemoveAdditional,
    /// Report every violation instead of stopping at the first.
    pub all_errors: bool,
    /// Honour `nullable: true` next to `type`.
    pub nullable: bool,
    /// Assert `format` once a format plugin has enabled it.
    pub validate_formats: bool,
    pub code: CodeOptions,
    /// Keys the engines do not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            coerce_types: CoerceTypes::Array,
            use_defaults: UseDefaults::On,
            remove_additional: RemoveAdditional::Declared,
            all_errors: false,
            nullable: true,
            validate_formats: true,
            code: CodeOptions::default(),
            extra: Map::new(),
        }
    }
}

impl EngineOptions {
    /// The baseline options as a JSON map.
    pub fn baseline_map() -> Map<String, Value> {
        match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Baseline overlaid by `custom`, caller wins.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Configuration` when a known key has the wrong
    /// shape (for example `coerceTypes: "sometimes"`).
    pub fn resolve(custom: &Map<String, Value>) -> Result<Self, EngineError> {
        let mut merged = Self::baseline_map();
        for (key, value) in custom {
            merged.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(merged))
            .map_err(|e| EngineError::Configuration(format!("invalid customOptions: {e}")))
    }

    /// Options for output shaping: no coercion, defaults, or stripping.
    pub fn for_serializer(&self) -> Self {
        Self {
            coerce_types: CoerceTypes::Off,
            use_defaults: UseDefaults::Off,
            remove_additional: RemoveAdditional::Off,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_only_jtd_is_not_a_draft() {
        assert!(EngineMode::Standard.is_draft());
        assert!(EngineMode::Draft2020_12.is_draft());
        assert!(!EngineMode::Jtd.is_draft());
    }

    #[test]
    fn test_baseline_values() {
        let opts = EngineOptions::default();
        assert_eq!(opts.coerce_types, CoerceTypes::Array);
        assert_eq!(opts.use_defaults, UseDefaults::On);
        assert_eq!(opts.remove_additional, RemoveAdditional::Declared);
        assert!(!opts.all_errors);
        assert!(opts.nullable);
        assert!(!opts.code.source);
    }

    #[test]
    fn test_baseline_map_wire_shape() {
        let m = EngineOptions::baseline_map();
        assert_eq!(m["coerceTypes"], json!("array"));
        assert_eq!(m["useDefaults"], json!(true));
        assert_eq!(m["removeAdditional"], json!(true));
        assert_eq!(m["code"], json!({"source": false}));
    }

    #[test]
    fn test_custom_wins_over_baseline() {
        let opts = EngineOptions::resolve(&map(json!({
            "coerceTypes": false,
            "allErrors": true,
            "removeAdditional": "all"
        })))
        .unwrap();
        assert_eq!(opts.coerce_types, CoerceTypes::Off);
        assert!(opts.all_errors);
        assert_eq!(opts.remove_additional, RemoveAdditional::All);
        assert_eq!(opts.use_defaults, UseDefaults::On);
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let opts = EngineOptions::resolve(&map(json!({"allowUnionTypes": true}))).unwrap();
        assert_eq!(opts.extra.get("allowUnionTypes"), Some(&json!(true)));
        let back = serde_json::to_value(&opts).unwrap();
        assert_eq!(back["allowUnionTypes"], json!(true));
    }

    #[test]
    fn test_bad_word_is_configuration_error() {
        let err = EngineOptions::resolve(&map(json!({"coerceTypes": "sometimes"}))).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_for_serializer_disables_shaping() {
        let opts = EngineOptions::default().for_serializer();
        assert_eq!(opts.coerce_types, CoerceTypes::Off);
        assert_eq!(opts.use_defaults, UseDefaults::Off);
        assert_eq!(opts.remove_additional, RemoveAdditional::Off);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("JTD".parse::<EngineMode>().unwrap(), EngineMode::Jtd);
        assert_eq!("2019".parse::<EngineMode>().unwrap(), EngineMode::Draft2019_09);
        assert_eq!("2020".parse::<EngineMode>().unwrap(), EngineMode::Draft2020_12);
        assert_eq!("Standard".parse::<EngineMode>().unwrap(), EngineMode::Standard);
        assert!(matches!(
            "draft-03".parse::<EngineMode>(),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_mode_serde_uses_wire_names() {
        assert_eq!(serde_json::to_value(EngineMode::Jtd).unwrap(), json!("jtd"));
        let m: EngineMode = serde_json::from_value(json!("2020")).unwrap();
        assert_eq!(m, EngineMode::Draft2020_12);
        assert!(serde_json::from_value::<EngineMode>(json!("nope")).is_err());
    }
}
