pub mod check;
pub mod config_schema;
pub mod fix;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use miette::Report;
use oasfix_config::Config;
use oasfix_engine::{CancelToken, FixError, FixOptions, FixReport, Format};

use crate::{OutputFormat, RepairArgs};

/// How a command ended, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    /// `check` only: the document is valid but would be rewritten.
    WouldChange,
    Residuals,
    Canceled,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Clean => ExitCode::SUCCESS,
            Outcome::WouldChange | Outcome::Residuals => ExitCode::from(1),
            Outcome::Canceled => ExitCode::from(130),
        }
    }
}

/// Input text plus the effective options for one run.
#[derive(Debug)]
pub struct Prepared {
    pub content: String,
    pub file_name: String,
    pub options: FixOptions,
    pub output_format: Option<Format>,
}

/// Directory to start the `oasfix.toml` search from.
fn config_dir(input: &Path) -> PathBuf {
    let dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    dir.canonicalize().unwrap_or(dir)
}

/// Engine options from the merged config file, then the command line.
pub fn fix_options(config: Option<&Config>, args: &RepairArgs) -> FixOptions {
    let mut options = FixOptions::default();
    if let Some(config) = config {
        if let Some(inline) = config.inline_primitives {
            options.inline_primitives = inline;
        }
        if let Some(extract) = config.extract_inline_schemas {
            options.extract_inline_schemas = extract;
        }
        if let Some(max) = config.max_example_length {
            options.max_example_length = max;
        }
        if let Some(property) = &config.discriminator_property {
            options.discriminator_property.clone_from(property);
        }
        options
            .disabled_patches
            .extend(config.disabled_patches.iter().cloned());
    }

    if args.no_inline {
        options.inline_primitives = false;
    }
    if args.no_extract {
        options.extract_inline_schemas = false;
    }
    if let Some(max) = args.max_example_length {
        options.max_example_length = max;
    }
    if let Some(property) = &args.discriminator_property {
        options.discriminator_property.clone_from(property);
    }
    for name in &args.disable_patch {
        if !options.disabled_patches.contains(name) {
            options.disabled_patches.push(name.clone());
        }
    }
    options
}

/// Read the input and resolve configuration.
///
/// # Errors
///
/// Returns an error if the input cannot be read or an `oasfix.toml` on the
/// way up is malformed.
pub fn prepare(args: &RepairArgs) -> Result<Prepared> {
    let path = Path::new(&args.input);
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", args.input))?;

    let config = if args.no_config {
        None
    } else {
        oasfix_config::find_and_load(&config_dir(path))
            .with_context(|| format!("failed to load {}", oasfix_config::CONFIG_FILENAME))?
    };

    let output_format = args
        .output_format
        .or_else(|| {
            config
                .as_ref()
                .and_then(|c| c.output_format)
                .map(OutputFormat::from)
        })
        .map(Format::from);

    Ok(Prepared {
        content,
        file_name: args.input.clone(),
        options: fix_options(config.as_ref(), args),
        output_format,
    })
}

/// Run the pipeline on a blocking thread. Ctrl-C trips the cancel token and
/// the run stops at its next checkpoint.
///
/// Returns `None` when the run was canceled.
///
/// # Errors
///
/// Returns the engine's [`FixError`] for unusable input, or an error if the
/// pipeline thread panicked.
pub async fn repair(prepared: Prepared) -> Result<Option<FixReport>> {
    let Prepared {
        content,
        file_name,
        options,
        output_format,
    } = prepared;
    let cancel = CancelToken::new();
    let handle = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || {
        oasfix_engine::fix(&content, &file_name, None, &options, &cancel)
    });

    let joined = tokio::select! {
        joined = &mut task => joined,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, canceling");
            handle.cancel();
            task.await
        }
    };

    match joined.context("normalization task failed")? {
        Ok(report) => convert(report, output_format).map(Some),
        Err(FixError::Canceled) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Re-emit `report.output` in `target` if it differs from the input format.
fn convert(mut report: FixReport, target: Option<Format>) -> Result<FixReport> {
    let Some(target) = target.filter(|t| *t != report.format) else {
        return Ok(report);
    };
    let loaded = oasfix_engine::load(&report.output, "repaired", report.format)?;
    report.output = oasfix_engine::serialize::to_string(&loaded.document, target)?;
    report.format = target;
    Ok(report)
}

/// Print residual diagnostics and a one-line summary to stderr.
pub fn print_summary(file: &str, report: &FixReport, verbose: bool) {
    for residual in &report.residuals {
        eprintln!("{:?}", Report::new(residual.clone()));
    }
    if verbose {
        for (label, count) in report.stats.rows() {
            if count > 0 {
                eprintln!("  {label}: {count}");
            }
        }
    }

    let repairs = report.stats.total();
    let residuals = report.residuals.len();
    if std::io::stderr().is_terminal() {
        eprintln!(
            "\x1b[1m{file}\x1b[0m: {repairs} repairs, \
             \x1b[2m{residuals} residual diagnostics.\x1b[0m"
        );
    } else {
        eprintln!("{file}: {repairs} repairs, {residuals} residual diagnostics.");
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const PETS: &str = r#"{
  "openapi": "3.0.3",
  "info": {"title": "Pets", "version": "1"},
  "paths": {"/pets": {"get": {
    "operationId": "listPets",
    "responses": {"200": {"description": "ok"}}
  }}},
  "components": {"schemas": {"Name": {"type": "string"}}}
}
"#;

    fn args(input: &str) -> RepairArgs {
        RepairArgs {
            no_inline: false,
            no_extract: false,
            max_example_length: None,
            discriminator_property: None,
            disable_patch: Vec::new(),
            output_format: None,
            no_config: false,
            input: input.to_string(),
        }
    }

    #[test]
    fn flags_override_config() -> anyhow::Result<()> {
        let config: Config = toml_config(
            r#"
inline-primitives = false
max-example-length = 10
discriminator-property = "kind"
disabled-patches = ["siprec-parameter"]
"#,
        )?;
        let mut cli = args("api.json");
        cli.max_example_length = Some(99);
        cli.disable_patch = vec![
            "siprec-parameter".to_string(),
            "tool-parameter-placeholder".to_string(),
        ];

        let options = fix_options(Some(&config), &cli);
        assert!(!options.inline_primitives);
        assert!(options.extract_inline_schemas);
        assert_eq!(options.max_example_length, 99);
        assert_eq!(options.discriminator_property, "kind");
        assert_eq!(
            options.disabled_patches,
            vec!["siprec-parameter", "tool-parameter-placeholder"]
        );
        Ok(())
    }

    #[test]
    fn defaults_without_config() {
        let mut cli = args("api.json");
        cli.no_extract = true;
        let options = fix_options(None, &cli);
        assert!(options.inline_primitives);
        assert!(!options.extract_inline_schemas);
        assert_eq!(
            options,
            FixOptions {
                extract_inline_schemas: false,
                ..FixOptions::default()
            }
        );
    }

    fn toml_config(text: &str) -> anyhow::Result<Config> {
        let tmp = tempfile::tempdir()?;
        fs::write(tmp.path().join(oasfix_config::CONFIG_FILENAME), text)?;
        oasfix_config::find_and_load(tmp.path())?.context("config should exist")
    }

    #[test]
    fn prepare_reads_config_next_to_input() -> anyhow::Result<()> {
        let tmp = tempfile::tempdir()?;
        fs::write(
            tmp.path().join(oasfix_config::CONFIG_FILENAME),
            "output-format = \"yaml\"\nextract-inline-schemas = false",
        )?;
        let input = tmp.path().join("api.json");
        fs::write(&input, PETS)?;

        let input = input.to_string_lossy().into_owned();
        let prepared = prepare(&args(&input))?;
        assert_eq!(prepared.output_format, Some(Format::Yaml));
        assert!(!prepared.options.extract_inline_schemas);

        let mut ignoring = args(&input);
        ignoring.no_config = true;
        let prepared = prepare(&ignoring)?;
        assert_eq!(prepared.output_format, None);
        assert!(prepared.options.extract_inline_schemas);
        Ok(())
    }

    #[test]
    fn prepare_fails_on_missing_input() {
        let err = prepare(&args("/definitely/not/here.json")).expect_err("missing file");
        assert!(format!("{err:#}").contains("failed to read"));
    }

    #[tokio::test]
    async fn repair_converts_to_requested_format() -> anyhow::Result<()> {
        let prepared = Prepared {
            content: PETS.to_string(),
            file_name: "pets.json".to_string(),
            options: FixOptions::default(),
            output_format: Some(Format::Yaml),
        };
        let report = repair(prepared).await?.context("not canceled")?;
        assert_eq!(report.format, Format::Yaml);
        assert!(report.output.starts_with("openapi: 3.0.3\n"));
        assert!(report.is_clean());
        Ok(())
    }

    #[tokio::test]
    async fn unusable_input_is_an_engine_error() {
        let prepared = Prepared {
            content: "[1, 2, 3]".to_string(),
            file_name: "list.json".to_string(),
            options: FixOptions::default(),
            output_format: None,
        };
        let err = repair(prepared).await.expect_err("not a document");
        assert!(err.downcast_ref::<FixError>().is_some());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Outcome::Clean.exit_code(), ExitCode::SUCCESS);
        assert_eq!(Outcome::Residuals.exit_code(), ExitCode::from(1));
        assert_eq!(Outcome::WouldChange.exit_code(), ExitCode::from(1));
        assert_eq!(Outcome::Canceled.exit_code(), ExitCode::from(130));
    }
}
