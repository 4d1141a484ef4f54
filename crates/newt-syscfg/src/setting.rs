//! Setting definitions and override history.

use newt_core::Expr;
use std::fmt;

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SettingType {
    /// Anything goes; the default.
    #[default]
    Raw,
    /// Signed integer literal (decimal or `0x` hex).
    Int,
    /// `0`, `1`, `true`, or `false`.
    Bool,
    /// Any literal.
    String,
    /// Name of the flash area owner; identifier-shaped.
    FlashOwner,
    /// Task priority: `0`..`255` or `any`.
    TaskPriority,
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Raw => "raw",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::String => "string",
            Self::FlashOwner => "flash-owner",
            Self::TaskPriority => "task-priority",
        };
        write!(f, "{s}")
    }
}

impl SettingType {
    /// Parse a manifest type name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "raw" => Some(Self::Raw),
            "int" => Some(Self::Int),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::String),
            "flash_owner" => Some(Self::FlashOwner),
            "task_priority" => Some(Self::TaskPriority),
            _ => None,
        }
    }

    /// Whether a value is acceptable for this type.
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        let v = value.trim();
        match self {
            Self::Raw | Self::String => true,
            Self::Bool => matches!(v, "0" | "1" | "true" | "false"),
            Self::Int => parse_int(v).is_some(),
            Self::FlashOwner => {
                !v.is_empty()
                    && v.chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            Self::TaskPriority => {
                v.eq_ignore_ascii_case("any")
                    || parse_int(v).is_some_and(|n| (0..=255).contains(&n))
            }
        }
    }
}

/// Accept decimal and `0x` hex integer literals.
fn parse_int(v: &str) -> Option<i64> {
    let v = v.trim();
    if let Some(hex) = v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        v.parse::<i64>().ok()
    }
}

/// A validity predicate attached to a setting definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// The setting must end up non-empty.
    NotNull,
    /// The predicate must hold under the final value map whenever the
    /// setting itself is in effect.
    Expr(Expr),
}

/// One setting definition, as a package declares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingDef {
    /// Setting name.
    pub name: String,
    /// Declared type.
    pub typ: SettingType,
    /// Default value.
    pub value: String,
    /// Free-form description.
    pub description: String,
    /// Validity predicates; violations are reported as warnings.
    pub restrictions: Vec<Restriction>,
    /// Deprecated settings warn when overridden.
    pub deprecated: bool,
}

impl SettingDef {
    /// Minimal definition: name, type, default.
    #[must_use]
    pub fn new(name: impl Into<String>, typ: SettingType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            typ,
            value: value.into(),
            description: String::new(),
            restrictions: Vec::new(),
            deprecated: false,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach restrictions.
    #[must_use]
    pub fn with_restrictions(mut self, restrictions: Vec<Restriction>) -> Self {
        self.restrictions = restrictions;
        self
    }

    /// Mark deprecated.
    #[must_use]
    pub const fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }
}

/// Precedence levels, lowest first. Later levels win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OverrideLevel {
    /// The declaring package's default.
    Definition,
    /// Overrides from non-target library packages.
    Library,
    /// The target's board-support package.
    Bsp,
    /// The target's application package.
    App,
    /// The target package itself.
    Target,
    /// Programmatic injections by the engine.
    Injected,
}

impl fmt::Display for OverrideLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Definition => "definition",
            Self::Library => "library",
            Self::Bsp => "bsp",
            Self::App => "app",
            Self::Target => "target",
            Self::Injected => "injected",
        };
        write!(f, "{s}")
    }
}

/// One entry in a setting's history: the definition first, then
/// overrides in precedence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Package (or `newt` for injections) the entry came from.
    pub source: String,
    /// The value it assigns.
    pub value: String,
    /// Gating predicate, for conditional overrides.
    pub expr: Option<Expr>,
    /// Precedence level.
    pub level: OverrideLevel,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}: {}]", self.value, self.level, self.source)?;
        if let Some(expr) = &self.expr {
            write!(f, " if {expr}")?;
        }
        Ok(())
    }
}
