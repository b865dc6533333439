// version.rs — `pbuild version`.

use pb_build::VersionInfo;

pub fn execute(json: bool) -> anyhow::Result<()> {
    let info = VersionInfo::current();
    if json {
        println!("{}", serde_json::to_string_pretty(info)?);
        return Ok(());
    }

    println!("Version:   {}", info.lib_version);
    println!("Toolchain: {}", or_unknown(&info.toolchain_version));
    println!("Commit:    {}", or_unknown(&info.commit));
    println!("Platform:  {}", or_unknown(&info.platform));
    println!("Capabilities: {}", pb_capabilities::current_version());
    Ok(())
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
