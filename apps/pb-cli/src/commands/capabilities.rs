// capabilities.rs — `pbuild capabilities`: list releases or dump a set.

use pb_capabilities::{current_version, default_capabilities, for_version, known_versions};

pub fn execute(version: Option<&str>, list: bool) -> anyhow::Result<()> {
    if list {
        for line in release_lines() {
            println!("{}", line);
        }
        return Ok(());
    }

    let caps = match version {
        Some(v) => for_version(v)?,
        None => default_capabilities().as_ref().clone(),
    };
    println!("{}", serde_json::to_string_pretty(&caps)?);
    Ok(())
}

fn release_lines() -> Vec<String> {
    let current = current_version();
    known_versions()
        .into_iter()
        .map(|v| {
            if v == current {
                format!("{} (default)", v)
            } else {
                v.to_string()
            }
        })
        .collect()
}
