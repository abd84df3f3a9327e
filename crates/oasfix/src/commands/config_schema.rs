use anyhow::{Context, Result};

/// Print the JSON Schema for `oasfix.toml` to stdout.
pub fn run() -> Result<()> {
    let schema = serde_json::to_string_pretty(&oasfix_config::schema())
        .context("failed to serialize config schema")?;
    println!("{schema}");
    Ok(())
}
