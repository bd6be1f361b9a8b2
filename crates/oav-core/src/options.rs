//! # Validator Options
//!
//! [`ValidatorOptions`] is the single configuration value for building,
//! compiling, and loading validators. Plain settings are serde-loadable from
//! a YAML or JSON file; function-valued settings (custom formats and
//! deserializers) can only be supplied in code.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestValidationError;

/// Predicate backing a custom format.
pub type FormatPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Deserializer backing a custom format.
pub type Deserializer = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// Handling of properties not declared by an object schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RemoveAdditionalRepr", into = "RemoveAdditionalRepr")]
pub enum RemoveAdditional {
    /// Undeclared properties are reported, never removed.
    #[default]
    Off,
    /// Remove undeclared properties where `additionalProperties` is `false`.
    Declared,
    /// Remove every undeclared property, whatever `additionalProperties` says.
    All,
    /// Remove undeclared properties that would fail `additionalProperties`.
    Failing,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RemoveAdditionalRepr {
    Flag(bool),
    Mode(String),
}

impl TryFrom<RemoveAdditionalRepr> for RemoveAdditional {
    type Error = String;

    fn try_from(repr: RemoveAdditionalRepr) -> Result<Self, Self::Error> {
        match repr {
            RemoveAdditionalRepr::Flag(false) => Ok(Self::Off),
            RemoveAdditionalRepr::Flag(true) => Ok(Self::Declared),
            RemoveAdditionalRepr::Mode(mode) => match mode.as_str() {
                "all" => Ok(Self::All),
                "failing" => Ok(Self::Failing),
                other => Err(format!(
                    "removeAdditional must be a boolean, 'all' or 'failing', got '{other}'"
                )),
            },
        }
    }
}

impl From<RemoveAdditional> for RemoveAdditionalRepr {
    fn from(mode: RemoveAdditional) -> Self {
        match mode {
            RemoveAdditional::Off => Self::Flag(false),
            RemoveAdditional::Declared => Self::Flag(true),
            RemoveAdditional::All => Self::Mode("all".into()),
            RemoveAdditional::Failing => Self::Mode("failing".into()),
        }
    }
}

/// JSON type a custom format is declared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    String,
    Number,
}

/// A user-supplied `format` validator.
#[derive(Clone)]
pub struct CustomFormat {
    /// Format name as written in schemas.
    pub name: String,
    /// JSON type the format targets. The engine evaluates formats on strings.
    pub format_type: FormatType,
    /// Returns `true` when the value satisfies the format.
    pub predicate: FormatPredicate,
}

impl CustomFormat {
    /// Declare a string format.
    pub fn string(
        name: impl Into<String>,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            format_type: FormatType::String,
            predicate: Arc::new(predicate),
        }
    }

    /// Declare a format for any [`FormatType`].
    pub fn new(
        name: impl Into<String>,
        format_type: FormatType,
        predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            format_type,
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for CustomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomFormat")
            .field("name", &self.name)
            .field("format_type", &self.format_type)
            .finish_non_exhaustive()
    }
}

/// A custom deserializer keyed by format name.
///
/// A string accepted by `deserialize` satisfies the format; after a request
/// passes validation the string is replaced with the deserialized value.
#[derive(Clone)]
pub struct SerDes {
    /// Format name as written in schemas.
    pub format: String,
    /// Converts the wire string into its typed value.
    pub deserialize: Deserializer,
}

impl SerDes {
    /// Register a deserializer for `format`.
    pub fn new(
        format: impl Into<String>,
        deserialize: impl Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            format: format.into(),
            deserialize: Arc::new(deserialize),
        }
    }
}

impl fmt::Debug for SerDes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerDes")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Configuration for request validation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorOptions {
    /// Accept query parameters that the operation does not declare.
    pub allow_unknown_query_parameters: bool,
    /// Strip undeclared properties instead of reporting them.
    pub remove_additional: RemoveAdditional,
    /// Assert `format` keywords.
    pub validate_formats: bool,
    /// Custom format validators.
    #[serde(skip)]
    pub formats: Vec<CustomFormat>,
    /// Custom deserializers. Later entries override earlier ones.
    #[serde(skip)]
    pub ser_des: Vec<SerDes>,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            allow_unknown_query_parameters: false,
            remove_additional: RemoveAdditional::Off,
            validate_formats: true,
            formats: Vec::new(),
            ser_des: Vec::new(),
        }
    }
}

impl fmt::Debug for ValidatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorOptions")
            .field("allow_unknown_query_parameters", &self.allow_unknown_query_parameters)
            .field("remove_additional", &self.remove_additional)
            .field("validate_formats", &self.validate_formats)
            .field("formats", &self.formats)
            .field("ser_des", &self.ser_des)
            .finish()
    }
}

/// The subset of options that shapes compiled schemas, recorded in artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsStamp {
    /// See [`ValidatorOptions::allow_unknown_query_parameters`].
    pub allow_unknown_query_parameters: bool,
    /// See [`ValidatorOptions::remove_additional`].
    pub remove_additional: RemoveAdditional,
    /// See [`ValidatorOptions::validate_formats`].
    pub validate_formats: bool,
    /// Names of all custom formats and deserializers.
    pub formats: BTreeSet<String>,
}

impl ValidatorOptions {
    /// Load plain settings from a YAML (`.yaml`/`.yml`) or JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::Configuration`] if the file cannot be
    /// read or does not describe valid options.
    pub fn from_file(path: &Path) -> Result<Self, RequestValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RequestValidationError::Configuration(format!(
                "cannot read options file {}: {e}",
                path.display()
            ))
        })?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let parsed = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
            _ => serde_json::from_str(&content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| {
            RequestValidationError::Configuration(format!(
                "invalid options file {}: {e}",
                path.display()
            ))
        })
    }

    /// Add a custom format validator.
    pub fn with_format(mut self, format: CustomFormat) -> Self {
        self.formats.push(format);
        self
    }

    /// Add a custom deserializer.
    pub fn with_ser_des(mut self, ser_des: SerDes) -> Self {
        self.ser_des.push(ser_des);
        self
    }

    /// Names of every format contributed by options.
    pub fn format_names(&self) -> BTreeSet<String> {
        self.formats
            .iter()
            .map(|f| f.name.clone())
            .chain(self.ser_des.iter().map(|s| s.format.clone()))
            .collect()
    }

    /// Deserializers keyed by format, later registrations winning.
    pub fn deserializer(&self, format: &str) -> Option<&Deserializer> {
        self.ser_des
            .iter()
            .rev()
            .find(|s| s.format == format)
            .map(|s| &s.deserialize)
    }

    /// The schema-shaping subset of these options.
    pub fn stamp(&self) -> OptionsStamp {
        OptionsStamp {
            allow_unknown_query_parameters: self.allow_unknown_query_parameters,
            remove_additional: self.remove_additional,
            validate_formats: self.validate_formats,
            formats: self.format_names(),
        }
    }
}
