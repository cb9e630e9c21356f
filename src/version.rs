#![allow(clippy::doc_markdown)] // Generated file contains OPT_LEVEL without backticks

use std::sync::LazyLock;

include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// Tool version reported in logs and `--version` output: the package version
/// plus the git commit hash, with a `-dirty` marker when built from a
/// checkout with uncommitted changes.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    let prefix = match GIT_COMMIT_HASH {
        Some(hash) => format!("{PKG_VERSION}-{hash}"),
        None => PKG_VERSION.to_string(),
    };
    let suffix = match GIT_DIRTY {
        Some(true) => "-dirty",
        _ => "",
    };
    format!("{prefix}{suffix}")
});
