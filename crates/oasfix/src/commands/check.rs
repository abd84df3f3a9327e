use anyhow::Result;

use crate::RepairArgs;

use super::{Outcome, prepare, print_summary, repair};

/// Run the `check` command: repair in memory and report whether the input
/// is already in normalized form.
pub async fn run(args: &RepairArgs, verbose: bool) -> Result<Outcome> {
    let prepared = prepare(args)?;
    let original = prepared.content.clone();
    let Some(report) = repair(prepared).await? else {
        return Ok(Outcome::Canceled);
    };

    print_summary(&args.input, &report, verbose);
    if !report.is_clean() {
        return Ok(Outcome::Residuals);
    }
    if report.output == original {
        Ok(Outcome::Clean)
    } else {
        eprintln!("{} would be rewritten; run `oasfix fix` to apply.", args.input);
        Ok(Outcome::WouldChange)
    }
}
