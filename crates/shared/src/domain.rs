use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Roast label produced by the remote model. Only `0..=3` are valid codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ClassificationCode(u8);

impl ClassificationCode {
    pub const DARK_ROAST: Self = Self(0);
    pub const GREEN_BEAN: Self = Self(1);
    pub const LIGHT_ROAST: Self = Self(2);
    pub const MEDIUM_ROAST: Self = Self(3);

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ClassificationCode {
    type Error = CatalogError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0..=3 => Ok(Self(value as u8)),
            other => Err(CatalogError::UnknownClassification(other)),
        }
    }
}

impl From<ClassificationCode> for i64 {
    fn from(value: ClassificationCode) -> Self {
        i64::from(value.0)
    }
}

impl std::fmt::Display for ClassificationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoastProfile {
    pub code: ClassificationCode,
    pub name: &'static str,
    pub description: &'static str,
    /// CSS-style hex color used by views for borders and highlights.
    pub accent_color: &'static str,
}

static PROFILES: [RoastProfile; 4] = [
    RoastProfile {
        code: ClassificationCode::DARK_ROAST,
        name: "Dark Roast",
        description: "Bold, smoky flavor with low acidity. Oils are visible on the surface.",
        accent_color: "#212121",
    },
    RoastProfile {
        code: ClassificationCode::GREEN_BEAN,
        name: "Green Bean",
        description: "Raw, unroasted coffee beans. Grassy and distinct aroma.",
        accent_color: "#558B2F",
    },
    RoastProfile {
        code: ClassificationCode::LIGHT_ROAST,
        name: "Light Roast",
        description:
            "Mild flavor, higher acidity, and no oil on the surface. Retains original bean character.",
        accent_color: "#A1887F",
    },
    RoastProfile {
        code: ClassificationCode::MEDIUM_ROAST,
        name: "Medium Roast",
        description: "Balanced flavor, aroma, and acidity. The most popular roast level.",
        accent_color: "#5D4037",
    },
];

pub struct RoastCatalog;

impl RoastCatalog {
    /// Anything outside `0..=3` yields [`CatalogError::UnknownClassification`].
    pub fn lookup(code: i64) -> Result<&'static RoastProfile, CatalogError> {
        let code = ClassificationCode::try_from(code)?;
        Ok(Self::profile(code))
    }

    pub fn profile(code: ClassificationCode) -> &'static RoastProfile {
        &PROFILES[usize::from(code.get())]
    }

    pub fn all() -> &'static [RoastProfile] {
        &PROFILES
    }
}
