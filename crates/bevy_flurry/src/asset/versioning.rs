/// The template format version written by this release.
pub const FORMAT_VERSION: &str = "0.1";

/// How a template's `flurry_version` relates to [`FORMAT_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionStatus {
    /// Written in the current format.
    Current,
    /// Written by a later release of Flurry.
    Newer { found: String },
    /// Not a `major.minor` version this release knows about.
    Unknown { found: String },
}

fn parse(version: &str) -> Option<(u32, u32)> {
    let (major, minor) = version.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Compares `version` with [`FORMAT_VERSION`].
pub fn validate_version(version: &str) -> VersionStatus {
    let found = || version.to_string();
    match (parse(version), parse(FORMAT_VERSION)) {
        (Some(v), Some(current)) if v == current => VersionStatus::Current,
        (Some(v), Some(current)) if v > current => VersionStatus::Newer { found: found() },
        _ => VersionStatus::Unknown { found: found() },
    }
}
