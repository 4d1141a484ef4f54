//! Package types.

use std::fmt;
use std::str::FromStr;

/// The closed set of package types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PackageType {
    /// Application.
    App,
    /// Board-support package.
    Bsp,
    /// Library; the default.
    #[default]
    Lib,
    /// Vendor SDK wrapper.
    Sdk,
    /// Cross-compiler definition.
    Compiler,
    /// Unit-test package.
    Unittest,
    /// Build target.
    Target,
    /// Manufacturing image description.
    Mfg,
    /// Boot loader.
    Loader,
}

impl PackageType {
    /// Manifest spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Bsp => "bsp",
            Self::Lib => "lib",
            Self::Sdk => "sdk",
            Self::Compiler => "compiler",
            Self::Unittest => "unittest",
            Self::Target => "target",
            Self::Mfg => "mfg",
            Self::Loader => "loader",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "app" => Ok(Self::App),
            "bsp" => Ok(Self::Bsp),
            "lib" | "library" => Ok(Self::Lib),
            "sdk" => Ok(Self::Sdk),
            "compiler" => Ok(Self::Compiler),
            "unittest" | "unit_test" => Ok(Self::Unittest),
            "target" => Ok(Self::Target),
            "mfg" => Ok(Self::Mfg),
            "loader" => Ok(Self::Loader),
            _ => Err(format!("unknown package type: {s}")),
        }
    }
}
