use git_version::git_version;
use target_info::Target;

lazy_static::lazy_static! {
    pub static ref SHORT_VERSION: String = VERSION.replace("SafeTx/", "");
    pub static ref LONG_VERSION: String = format!(
        "{}\ncommit: {}\nplatform: {}-{}",
        SHORT_VERSION.as_str(),
        COMMIT_PREFIX,
        Target::arch(),
        Target::os()
    );
}

/// Returns the current version of this build of safe-tx.
///
/// A plus-sign (`+`) is appended to the git commit if the tree is dirty.
/// Commit hash is omitted if the sources don't include git information.
///
/// ## Example
///
/// `SafeTx/v0.1.0-67da032+`
pub const VERSION: &str = git_version!(
    args = [
        "--always",
        "--dirty=+",
        "--abbrev=7",
        // NOTE: using --match instead of --exclude for compatibility with old Git
        "--match=thiswillnevermatchlol"
    ],
    prefix = "SafeTx/v0.1.0-",
    fallback = "SafeTx/v0.1.0"
);

/// Returns the first eight characters of the latest commit hash for this build.
///
/// No indication is given if the tree is dirty.
pub const COMMIT_PREFIX: &str = git_version!(
    args = [
        "--always",
        "--abbrev=8",
        // NOTE: using --match instead of --exclude for compatibility with old Git
        "--match=thiswillnevermatchlol"
    ],
    prefix = "",
    suffix = "",
    cargo_prefix = "",
    cargo_suffix = "",
    fallback = "00000000"
);

/// Returns `VERSION`, but with platform information appended to the end.
///
/// ## Example
///
/// `SafeTx/v0.1.0-67da032+/x86_64-linux`
pub fn version_with_platform() -> String {
    format!("{}/{}-{}", VERSION, Target::arch(), Target::os())
}

#[cfg(test)]
mod test {
    use super::*;
    use regex::Regex;

    #[test]
    fn short_version_drops_the_prefix() {
        assert!(SHORT_VERSION.starts_with("v0.1.0"));
        assert!(version_with_platform().starts_with(VERSION));
        assert!(LONG_VERSION.contains(COMMIT_PREFIX));
    }

    #[test]
    fn version_formatting() {
        let re = Regex::new(r"^SafeTx/v[0-9]+\.[0-9]+\.[0-9]+(-rc.[0-9])?(-[[:xdigit:]]{7})?\+?$")
            .unwrap();
        assert!(re.is_match(VERSION), "version doesn't match regex: {}", VERSION);
    }
}
