//! CPU architecture and operating system detection.
//!
//! A recipe is evaluated against a target `(Os, Arch)` pair. Most values
//! come straight from `std::env::consts`; the newtypes exist so the rest
//! of the crate can't confuse a Rust-convention name (`aarch64`) with a
//! vendor-convention one (`arm64`) when building URLs or wrapper scripts.
//!
//! # Example
//!
//! ```
//! use tsuku_schema::Platform;
//!
//! let current = Platform::current();
//! println!("Running on: {}", current);
//! ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit ARM (Apple Silicon, `aarch64` Linux).
    #[default]
    Arm64,
    /// `x86_64` architecture (Intel/AMD).
    X86_64,
}

impl Arch {
    /// Get the architecture this binary was compiled for.
    pub fn current() -> Self {
        #[cfg(target_arch = "aarch64")]
        {
            Self::Arm64
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            Self::X86_64
        }
    }

    /// Convert to vendor-convention string (`arm64`, `x86_64`), as seen in
    /// release asset names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }

    /// Rust-convention architecture name (`aarch64` / `x86_64`).
    ///
    /// Distinct from [`as_str()`](Self::as_str), which uses vendor names.
    /// The value matches `std::env::consts::ARCH` and is exposed to
    /// ecosystem builders as the `$ARCH` environment variable.
    pub fn rust_name(&self) -> &'static str {
        match self {
            Self::Arm64 => "aarch64",
            Self::X86_64 => "x86_64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "x86_64" | "amd64" => Ok(Self::X86_64),
            _ => Err(format!("unknown architecture: {s}")),
        }
    }
}

/// Target operating system family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    #[default]
    Linux,
    MacOs,
}

impl Os {
    /// Get the OS this binary was compiled for.
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        {
            Self::MacOs
        }
        #[cfg(not(target_os = "macos"))]
        {
            Self::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "darwin",
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "darwin" | "macos" => Ok(Self::MacOs),
            _ => Err(format!("unknown operating system: {s}")),
        }
    }
}

/// A resolved `(Os, Arch)` target pair: the unit a composite action
/// decomposes against and a primitive executes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: Os::current(),
            arch: Arch::current(),
        }
    }

    /// Rust target-triple-flavored string, e.g. `aarch64-apple-darwin`.
    pub fn triple(&self) -> String {
        match self.os {
            Os::Linux => format!("{}-unknown-linux-gnu", self.arch.rust_name()),
            Os::MacOs => format!("{}-apple-darwin", self.arch.rust_name()),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_round_trips_through_display_and_parse() {
        for a in [Arch::Arm64, Arch::X86_64] {
            let parsed: Arch = a.to_string().parse().unwrap();
            assert_eq!(a, parsed);
        }
    }

    #[test]
    fn arch_accepts_aliases() {
        assert_eq!("aarch64".parse::<Arch>().unwrap(), Arch::Arm64);
        assert_eq!("amd64".parse::<Arch>().unwrap(), Arch::X86_64);
    }

    #[test]
    fn os_accepts_aliases() {
        assert_eq!("macos".parse::<Os>().unwrap(), Os::MacOs);
        assert_eq!("darwin".parse::<Os>().unwrap(), Os::MacOs);
    }

    #[test]
    fn platform_triple_matches_rust_convention() {
        let p = Platform {
            os: Os::Linux,
            arch: Arch::X86_64,
        };
        assert_eq!(p.triple(), "x86_64-unknown-linux-gnu");
    }

    #[test]
    fn platform_display_is_os_dash_arch() {
        let p = Platform {
            os: Os::MacOs,
            arch: Arch::Arm64,
        };
        assert_eq!(p.to_string(), "darwin-arm64");
    }
}
