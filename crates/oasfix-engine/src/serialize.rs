//! Rendering a [`Document`] back to text.

use crate::diagnostics::FixError;
use crate::loader::Format;
use crate::model::Document;

/// Render `doc` in `format`: pretty JSON with two-space indentation, or
/// block-style YAML. Map order is insertion order. The text always ends with
/// a newline.
///
/// # Errors
///
/// Returns [`FixError::Serialize`] if a value cannot be represented, for
/// example a non-finite number.
pub fn to_string(doc: &Document, format: Format) -> Result<String, FixError> {
    let mut text = match format {
        Format::Json => serde_json::to_string_pretty(doc).map_err(|e| FixError::Serialize {
            message: e.to_string(),
        })?,
        Format::Yaml => serde_yaml::to_string(doc).map_err(|e| FixError::Serialize {
            message: e.to_string(),
        })?,
    };
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}
