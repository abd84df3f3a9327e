#![doc = include_str!("../README.md")]

use std::path::{Path, PathBuf};

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

pub const CONFIG_FILENAME: &str = "oasfix.toml";

fn example_disabled_patches() -> Vec<String> {
    vec!["siprec-parameter".into(), "tool-parameter-placeholder".into()]
}

/// Text syntax of the repaired document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Yaml,
}

/// Configuration file for the oasfix OpenAPI normalizer.
///
/// oasfix walks up the directory tree from the document being repaired
/// looking for `oasfix.toml` files and merges them together. Settings in
/// child directories take priority over parent directories. Set `root = true`
/// to stop the upward search.
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
#[schemars(title = "oasfix.toml")]
pub struct Config {
    /// Mark this configuration file as the project root.
    ///
    /// When `true`, oasfix stops walking up the directory tree and does not
    /// merge any `oasfix.toml` files from parent directories.
    #[serde(default)]
    pub root: bool,

    /// Replace references to component schemas that are a bare primitive
    /// (`{type: string}` and the like) with inline copies, and delete the
    /// components. Defaults to `true`.
    #[schemars(title = "Inline Primitives")]
    #[serde(default)]
    pub inline_primitives: Option<bool>,

    /// Hoist inline request and response body schemas into named components
    /// (`{operationId}_Request`, `{operationId}_{status}`). Defaults to
    /// `true`.
    #[schemars(title = "Extract Inline Schemas")]
    #[serde(default)]
    pub extract_inline_schemas: Option<bool>,

    /// String examples longer than this many characters are dropped.
    /// Defaults to 5000.
    #[schemars(title = "Maximum Example Length", range(min = 1))]
    #[serde(default)]
    pub max_example_length: Option<usize>,

    /// Property added to `oneOf`/`anyOf` unions of references when a
    /// discriminator is synthesized. Defaults to `type`.
    #[schemars(title = "Discriminator Property")]
    #[serde(default)]
    pub discriminator_property: Option<String>,

    /// Names of vendor patches to skip.
    ///
    /// Entries from child configs come first, followed by parent entries
    /// (duplicates are removed).
    #[schemars(title = "Disabled Patches", example = example_disabled_patches())]
    #[serde(default)]
    pub disabled_patches: Vec<String>,

    /// Format of the written document. Defaults to the input's format.
    #[schemars(title = "Output Format")]
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
}

impl Config {
    /// Merge a parent config into this one. Child values take priority:
    /// - scalar settings: the parent value is used only if the child has none
    /// - `disabled-patches`: parent entries are appended (deduped)
    /// - `root` is not inherited
    fn merge_parent(&mut self, parent: Config) {
        self.inline_primitives = self.inline_primitives.or(parent.inline_primitives);
        self.extract_inline_schemas = self
            .extract_inline_schemas
            .or(parent.extract_inline_schemas);
        self.max_example_length = self.max_example_length.or(parent.max_example_length);
        if self.discriminator_property.is_none() {
            self.discriminator_property = parent.discriminator_property;
        }
        for name in parent.disabled_patches {
            if !self.disabled_patches.contains(&name) {
                self.disabled_patches.push(name);
            }
        }
        self.output_format = self.output_format.or(parent.output_format);
    }
}

/// Generate the JSON Schema for `oasfix.toml` as a `serde_json::Value`.
///
/// # Panics
///
/// Panics if the schema cannot be serialized to JSON (should never happen).
pub fn schema() -> Value {
    serde_json::to_value(schema_for!(Config)).expect("schema serialization cannot fail")
}

/// Find the nearest `oasfix.toml` starting from `start_dir`, walking upward.
pub fn find_config_path(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
}

/// Search for `oasfix.toml` files starting from `start_dir`, walking up.
/// Merges all configs found until one with `root = true` is hit (inclusive).
/// Returns the merged config, or `None` if no config file was found.
///
/// # Errors
///
/// Returns an error if a config file exists but cannot be read or parsed.
pub fn find_and_load(start_dir: &Path) -> Result<Option<Config>, anyhow::Error> {
    let mut configs: Vec<Config> = Vec::new();
    for dir in start_dir.ancestors() {
        let candidate = dir.join(CONFIG_FILENAME);
        if !candidate.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&candidate)?;
        let cfg: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", candidate.display()))?;
        let is_root = cfg.root;
        configs.push(cfg);
        if is_root {
            break;
        }
    }

    if configs.is_empty() {
        return Ok(None);
    }

    // configs[0] is the closest (child), last is the farthest (root-most parent)
    let mut merged = configs.remove(0);
    for parent in configs {
        merged.merge_parent(parent);
    }
    Ok(Some(merged))
}
