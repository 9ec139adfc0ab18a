use std::fmt;

use serde::Serialize;

/// Build metadata of the binary embedding this library
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub build_timestamp: &'static str,
    pub rust_version: &'static str,
    pub build_target: Option<&'static str>,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} build, features: {}, built {} with {}",
            self.version,
            self.build_profile,
            self.build_features,
            self.build_timestamp,
            self.rust_version
        )?;
        if let Some(target) = self.build_target {
            write!(f, " for {target}")?;
        }
        write!(f, ")")
    }
}

/// Collect the build metadata set by the calling crate's build script.
///  Expands in the caller so its compile-time environment is the one read.
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo {
            version: match option_env!("REPO_VERSION") {
                Some(version) => version,
                None => env!("CARGO_PKG_VERSION"),
            },
            build_profile: match option_env!("BUILD_PROFILE") {
                Some(profile) => profile,
                None => "unknown",
            },
            build_features: match option_env!("BUILD_FEATURES") {
                Some(features) => features,
                None => "none",
            },
            build_timestamp: match option_env!("BUILD_TIMESTAMP") {
                Some(timestamp) => timestamp,
                None => "unknown",
            },
            rust_version: match option_env!("RUST_VERSION") {
                Some(version) => version,
                None => "unknown",
            },
            build_target: option_env!("BUILD_TARGET"),
        }
    };
}
