//! `minnow init` command implementation.
//!
//! Non-destructive: refuses to overwrite an existing package.json.

use miette::{IntoDiagnostic, Result};
use std::path::Path;

pub fn run(cwd: &Path) -> Result<()> {
    let manifest_path = cwd.join("package.json");

    if manifest_path.exists() {
        println!("package.json already exists");
        return Ok(());
    }

    let name = cwd
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("my-project");

    let manifest = serde_json::json!({
        "name": name,
        "version": "1.0.0",
        "dependencies": {},
        "devDependencies": {}
    });

    let mut out = serde_json::to_string_pretty(&manifest).into_diagnostic()?;
    out.push('\n');

    std::fs::write(&manifest_path, out).into_diagnostic()?;

    println!("Created package.json for \"{name}\"");
    Ok(())
}
