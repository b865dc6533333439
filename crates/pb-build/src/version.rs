// version.rs — Library version metadata.

use once_cell::sync::Lazy;
use serde::Serialize;

static VERSION: Lazy<VersionInfo> = Lazy::new(|| VersionInfo {
    lib_version: env!("CARGO_PKG_VERSION").to_string(),
    toolchain_version: option_env!("PB_RUSTC_VERSION").unwrap_or("").to_string(),
    commit: option_env!("PB_GIT_HASH").unwrap_or("").to_string(),
    platform: option_env!("PB_TARGET").unwrap_or("").to_string(),
});

/// Build-time metadata of this library. Values that could not be determined
/// when the crate was compiled are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub lib_version: String,
    pub toolchain_version: String,
    pub commit: String,
    pub platform: String,
}

impl VersionInfo {
    /// The process-wide record, computed on first use.
    pub fn current() -> &'static VersionInfo {
        &VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lib_version_matches_package() {
        assert_eq!(VersionInfo::current().lib_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn current_is_a_single_record() {
        assert!(std::ptr::eq(VersionInfo::current(), VersionInfo::current()));
    }

    #[test]
    fn serializes_all_fields() {
        let json = serde_json::to_value(VersionInfo::current()).unwrap();
        for key in ["lib_version", "toolchain_version", "commit", "platform"] {
            assert!(json[key].is_string(), "missing {}", key);
        }
    }
}
