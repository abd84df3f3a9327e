#![doc = include_str!("../README.md")]

use std::io::IsTerminal;
use std::process::ExitCode;

use bpaf::Bpaf;
use oasfix_cli_common::{CLIGlobalOptions, LogLevel, cli_global_options};
use oasfix_engine::{FixError, Format};
use tracing_subscriber::prelude::*;

mod commands;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl core::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(format!("unknown output format '{s}', expected: json, yaml")),
        }
    }
}

impl From<OutputFormat> for Format {
    fn from(f: OutputFormat) -> Self {
        match f {
            OutputFormat::Json => Format::Json,
            OutputFormat::Yaml => Format::Yaml,
        }
    }
}

impl From<oasfix_config::OutputFormat> for OutputFormat {
    fn from(f: oasfix_config::OutputFormat) -> Self {
        match f {
            oasfix_config::OutputFormat::Json => OutputFormat::Json,
            oasfix_config::OutputFormat::Yaml => OutputFormat::Yaml,
        }
    }
}

/// Options shared by `fix` and `check`. Flags override `oasfix.toml`.
#[derive(Debug, Clone, Bpaf)]
#[allow(clippy::struct_excessive_bools)]
pub struct RepairArgs {
    /// Keep component schemas that are a bare primitive instead of inlining them
    #[bpaf(long("no-inline"), switch)]
    pub no_inline: bool,

    /// Leave inline request and response schemas where they are
    #[bpaf(long("no-extract"), switch)]
    pub no_extract: bool,

    /// Drop string examples longer than this many characters
    #[bpaf(long("max-example-length"), argument("CHARS"))]
    pub max_example_length: Option<usize>,

    /// Property added to tagged unions when a discriminator is synthesized
    #[bpaf(long("discriminator-property"), argument("NAME"))]
    pub discriminator_property: Option<String>,

    /// Skip a vendor patch by name (repeatable)
    #[bpaf(long("disable-patch"), argument("PATCH"))]
    pub disable_patch: Vec<String>,

    /// Format of the repaired document; defaults to the input's format
    #[bpaf(long("output-format"), argument("json|yaml"))]
    pub output_format: Option<OutputFormat>,

    /// Ignore oasfix.toml files
    #[bpaf(long("no-config"), switch)]
    pub no_config: bool,

    /// OpenAPI document to repair
    #[bpaf(positional("FILE"))]
    pub input: String,
}

#[derive(Debug, Clone, Bpaf)]
pub struct FixArgs {
    /// Write the repaired document to PATH instead of stdout
    #[bpaf(short('o'), long("output"), argument("PATH"))]
    pub output: Option<String>,

    /// Overwrite the input file with the repaired document
    #[bpaf(long("in-place"), switch)]
    pub in_place: bool,

    #[bpaf(external(repair_args))]
    pub repair: RepairArgs,
}

#[derive(Debug, Clone, Bpaf)]
#[bpaf(options, version, fallback_to_usage)]
/// Repair malformed OpenAPI documents
struct Cli {
    #[bpaf(external(commands))]
    command: Commands,
}

#[derive(Debug, Clone, Bpaf)]
enum Commands {
    #[bpaf(command("fix"))]
    /// Repair a document and write the result
    Fix(
        #[bpaf(external(cli_global_options), hide_usage)] CLIGlobalOptions,
        #[bpaf(external(fix_args))] FixArgs,
    ),

    #[bpaf(command("check"))]
    /// Report whether a document needs repairs, without writing anything
    Check(
        #[bpaf(external(cli_global_options), hide_usage)] CLIGlobalOptions,
        #[bpaf(external(repair_args))] RepairArgs,
    ),

    #[bpaf(command("config-schema"))]
    /// Print the JSON Schema for oasfix.toml
    ConfigSchema,

    #[bpaf(command("version"))]
    /// Print version information
    Version,
}

fn install_reporting(global: &CLIGlobalOptions) {
    let color = global.use_color(std::io::stderr().is_terminal());
    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .context_lines(2)
                .color(color)
                .build(),
        )
    }))
    .ok();
    init_tracing(global.log_level, color);
}

/// `OASFIX_LOG` wins over `--log-level`. Span entry/exit is only shown when
/// the filter comes from the environment.
fn init_tracing(level: LogLevel, ansi: bool) {
    let (filter, explicit) = match tracing_subscriber::EnvFilter::try_from_env("OASFIX_LOG") {
        Ok(f) => (f, true),
        Err(_) => (tracing_subscriber::EnvFilter::new(level.directive()), false),
    };
    tracing_subscriber::registry()
        .with(
            tracing_tree::HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true)
                .with_indent_lines(true)
                .with_ansi(ansi)
                .with_verbose_exit(explicit)
                .with_verbose_entry(explicit)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

fn report_fatal(e: anyhow::Error) {
    match e.downcast::<FixError>() {
        Ok(fix_error) => eprintln!("{:?}", miette::Report::new(fix_error)),
        Err(e) => eprintln!("Error: {e:#}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli().run();

    let result = match cli.command {
        Commands::Fix(global, args) => {
            install_reporting(&global);
            commands::fix::run(&args, global.verbose).await
        }
        Commands::Check(global, args) => {
            install_reporting(&global);
            commands::check::run(&args, global.verbose).await
        }
        Commands::ConfigSchema => match commands::config_schema::run() {
            Ok(()) => return ExitCode::SUCCESS,
            Err(e) => Err(e),
        },
        Commands::Version => {
            println!("oasfix {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
    };

    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            report_fatal(e);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_fix_basic_args() -> anyhow::Result<()> {
        let cli = cli()
            .run_inner(&["fix", "openapi.json"])
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        match cli.command {
            Commands::Fix(global, args) => {
                assert_eq!(args.repair.input, "openapi.json");
                assert!(args.output.is_none());
                assert!(!args.in_place);
                assert!(!args.repair.no_inline);
                assert!(!args.repair.no_extract);
                assert!(args.repair.disable_patch.is_empty());
                assert!(args.repair.output_format.is_none());
                assert_eq!(global.log_level, LogLevel::Warn);
            }
            _ => panic!("expected Fix"),
        }
        Ok(())
    }

    #[test]
    fn cli_parses_fix_all_options() -> anyhow::Result<()> {
        let cli = cli()
            .run_inner(&[
                "fix",
                "-o",
                "out.yaml",
                "--no-inline",
                "--no-extract",
                "--max-example-length",
                "80",
                "--discriminator-property",
                "kind",
                "--disable-patch",
                "siprec-parameter",
                "--disable-patch",
                "tool-parameter-placeholder",
                "--output-format",
                "yaml",
                "--no-config",
                "api.json",
            ])
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        match cli.command {
            Commands::Fix(_, args) => {
                assert_eq!(args.output.as_deref(), Some("out.yaml"));
                let repair = args.repair;
                assert!(repair.no_inline);
                assert!(repair.no_extract);
                assert!(repair.no_config);
                assert_eq!(repair.max_example_length, Some(80));
                assert_eq!(repair.discriminator_property.as_deref(), Some("kind"));
                assert_eq!(
                    repair.disable_patch,
                    vec!["siprec-parameter", "tool-parameter-placeholder"]
                );
                assert_eq!(repair.output_format, Some(OutputFormat::Yaml));
                assert_eq!(repair.input, "api.json");
            }
            _ => panic!("expected Fix"),
        }
        Ok(())
    }

    #[test]
    fn cli_parses_check_with_global_options() -> anyhow::Result<()> {
        let cli = cli()
            .run_inner(&["check", "-v", "--log-level", "debug", "api.yaml"])
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        match cli.command {
            Commands::Check(global, args) => {
                assert!(global.verbose);
                assert_eq!(global.log_level, LogLevel::Debug);
                assert_eq!(args.input, "api.yaml");
            }
            _ => panic!("expected Check"),
        }
        Ok(())
    }

    #[test]
    fn cli_requires_an_input() {
        assert!(cli().run_inner(&["fix"]).is_err());
        assert!(cli().run_inner(&["check", "--no-inline"]).is_err());
    }

    #[test]
    fn cli_rejects_unknown_output_format() {
        assert!(
            cli()
                .run_inner(&["fix", "--output-format", "toml", "api.json"])
                .is_err()
        );
    }

    #[test]
    fn cli_parses_config_schema() -> anyhow::Result<()> {
        let cli = cli()
            .run_inner(&["config-schema"])
            .map_err(|e| anyhow::anyhow!("{e:?}"))?;
        assert!(matches!(cli.command, Commands::ConfigSchema));
        Ok(())
    }
}
