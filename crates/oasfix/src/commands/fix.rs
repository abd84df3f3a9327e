use anyhow::{Context, Result, bail};

use crate::FixArgs;

use super::{Outcome, prepare, print_summary, repair};

/// Run the `fix` command: repair the input and write it to `--output`, back
/// to the input with `--in-place`, or to stdout.
pub async fn run(args: &FixArgs, verbose: bool) -> Result<Outcome> {
    if args.in_place && args.output.is_some() {
        bail!("--in-place and --output cannot be used together");
    }

    let prepared = prepare(&args.repair)?;
    let Some(report) = repair(prepared).await? else {
        return Ok(Outcome::Canceled);
    };

    let destination = if args.in_place {
        Some(args.repair.input.as_str())
    } else {
        args.output.as_deref()
    };
    match destination {
        Some(path) => {
            std::fs::write(path, &report.output)
                .with_context(|| format!("failed to write {path}"))?;
            tracing::info!(path, "wrote repaired document");
        }
        None => print!("{}", report.output),
    }

    print_summary(&args.repair.input, &report, verbose);
    Ok(if report.is_clean() {
        Outcome::Clean
    } else {
        Outcome::Residuals
    })
}
