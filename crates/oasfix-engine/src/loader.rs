//! Reading raw text into a [`Document`].

use alloc::borrow::Cow;
use std::path::Path;
use std::sync::LazyLock;

use miette::NamedSource;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::diagnostics::{FixError, line_col_to_offset};
use crate::model::Document;

/// Text syntax of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    /// Pick a format from a file extension, falling back to sniffing the
    /// content: JSON documents start with `{` or `[`.
    pub fn detect(path: Option<&Path>, content: &str) -> Self {
        let by_extension = path
            .and_then(Path::extension)
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension);
        by_extension.unwrap_or_else(|| {
            if content
                .trim_start_matches('\u{FEFF}')
                .trim_start()
                .starts_with(['{', '['])
            {
                Self::Json
            } else {
                Self::Yaml
            }
        })
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    /// Parse `content` into a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`FixError::Parse`] with a span pointing at the syntax error.
    pub fn parse(self, content: &str, file_name: &str) -> Result<Value, FixError> {
        let clean: Cow<'_, str> = if content.contains('\u{FEFF}') {
            content.replace('\u{FEFF}', "").into()
        } else {
            content.into()
        };
        match self {
            Self::Json => serde_json::from_str(&clean).map_err(|e| FixError::Parse {
                src: NamedSource::new(file_name, clean.to_string()),
                span: line_col_to_offset(&clean, e.line(), e.column()).into(),
                message: e.to_string(),
            }),
            Self::Yaml => serde_yaml::from_str::<serde_yaml::Value>(&clean)
                .map(yaml_to_json)
                .map_err(|e| FixError::Parse {
                    src: NamedSource::new(file_name, clean.to_string()),
                    span: e.location().map_or(0, |loc| loc.index()).into(),
                    message: e.to_string(),
                }),
        }
    }
}

impl core::fmt::Display for Format {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a YAML value into JSON. Non-string mapping keys (status codes are
/// commonly written as bare integers) are stringified, tags are dropped.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => yaml_number(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(Value::Null, Value::Number)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

static REF_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<key>["']?\$ref["']?\s*:\s*)(?P<value>"[^"\n]*"|'[^'\n]*'|[^\s"'][^\n,}]*)"#)
        .expect("reference value pattern is valid")
});

static ANGLE_ESCAPES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[<>]|\\u003c|\\u003e").expect("angle pattern is valid"));

/// Remove `<`, `>` and their `\u003c`/`\u003e` escape text.
pub(crate) fn strip_angle_brackets(text: &str) -> Cow<'_, str> {
    ANGLE_ESCAPES.replace_all(text, "")
}

/// Strip angle brackets and their `\u003c`/`\u003e` escapes from `$ref`
/// values before parsing. Generic-looking references such as
/// `#/components/schemas/Page<User>` otherwise survive into the model and
/// never resolve. Returns the number of values changed.
pub fn repair_references(content: &str) -> (Cow<'_, str>, usize) {
    let mut changed = 0;
    let repaired = REF_VALUE.replace_all(content, |caps: &Captures<'_>| {
        let value = &caps["value"];
        let clean = strip_angle_brackets(value);
        if clean != value {
            changed += 1;
        }
        format!("{}{clean}", &caps["key"])
    });
    (repaired, changed)
}

/// Result of loading: the typed document plus what the loader learned.
#[derive(Debug)]
pub struct Loaded {
    pub document: Document,
    pub format: Format,
    pub references_repaired: usize,
}

/// Lexically repair, parse and type `content`.
///
/// # Errors
///
/// Returns [`FixError::Parse`] for syntax errors and [`FixError::Structure`]
/// when the root is not an object.
#[tracing::instrument(skip_all, fields(file = file_name, %format))]
pub fn load(content: &str, file_name: &str, format: Format) -> Result<Loaded, FixError> {
    let (repaired, references_repaired) = repair_references(content);
    if references_repaired > 0 {
        tracing::warn!(count = references_repaired, "stripped angle brackets from references");
    }
    let value = format.parse(&repaired, file_name)?;
    if !value.is_object() {
        return Err(FixError::Structure {
            name: file_name.to_string(),
            pointer: "#".to_string(),
            message: format!(
                "expected an object at the document root, found {}",
                kind_of(&value)
            ),
        });
    }
    let document: Document =
        serde_path_to_error::deserialize(value).map_err(|e| FixError::Structure {
            name: file_name.to_string(),
            pointer: e.path().to_string(),
            message: e.inner().to_string(),
        })?;
    Ok(Loaded {
        document,
        format,
        references_repaired,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
