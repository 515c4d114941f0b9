use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageSourceKind {
    Registry,
    Git,
    Local,
    Embedded,
    #[serde(rename = "builtin")]
    BuiltIn,
    LocalTarball,
    Unknown,
}

impl PackageSourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Git => "git",
            Self::Local => "local",
            Self::Embedded => "embedded",
            Self::BuiltIn => "builtin",
            Self::LocalTarball => "local-tarball",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a `source` token as written by the package lock file.
    pub fn parse(value: &str) -> Self {
        match value {
            "registry" => Self::Registry,
            "git" => Self::Git,
            "local" => Self::Local,
            "embedded" => Self::Embedded,
            "builtin" => Self::BuiltIn,
            "local-tarball" => Self::LocalTarball,
            _ => Self::Unknown,
        }
    }

    /// Sources a project declares itself, as opposed to editor built-ins.
    pub fn is_project_source(&self) -> bool {
        matches!(
            self,
            Self::Registry | Self::Git | Self::Local | Self::Embedded
        )
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Local | Self::Embedded | Self::Git)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub id: String,
    pub display_name: String,
    pub version: String,
    pub source: PackageSourceKind,
    /// Empty when neither the package nor the catalog describes it.
    pub description: String,
    pub dependencies: Vec<String>,
}

impl InstalledPackage {
    pub fn matches_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}
