//! Platform triple detection for core-agent binary selection.
//!
//! The core agent ships as prebuilt binaries named by an
//! `{arch}-{platform}` triple. Detection is compile-time: `target_env =
//! "musl"` is how a Rust build knows it links a non-GNU libc.

/// Architectures with published core-agent builds.
const KNOWN_ARCHES: &[&str] = &["x86_64", "i686"];

/// Platforms with published core-agent builds.
const KNOWN_PLATFORMS: &[&str] = &["darwin", "linux-gnu", "linux-musl"];

/// Detect the `{arch}-{platform}` triple for this process.
///
/// Deterministic on a given build: the result is always a member of the
/// known triple set, or begins with `unknown-` / ends with `-unknown` when
/// the host has no published agent build.
#[must_use]
pub fn detect_triple() -> String {
    format!("{}-{}", detect_arch(), detect_platform())
}

/// Detect the architecture half of the triple.
#[must_use]
pub fn detect_arch() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x86_64"
    } else if cfg!(target_arch = "x86") {
        "i686"
    } else {
        "unknown"
    }
}

/// Detect the platform half of the triple.
#[must_use]
pub fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        if cfg!(target_env = "musl") {
            "linux-musl"
        } else {
            "linux-gnu"
        }
    } else {
        "unknown"
    }
}

/// Validate a triple string against the known arch/platform sets.
///
/// The triple splits on the first `-`; the remainder is the platform
/// (which itself may contain dashes, e.g. `linux-gnu`).
#[must_use]
pub fn is_valid_triple(triple: &str) -> bool {
    let Some((arch, platform)) = triple.split_once('-') else {
        return false;
    };
    KNOWN_ARCHES.contains(&arch) && KNOWN_PLATFORMS.contains(&platform)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
