//! Catalog of style transforms applied to every source image.
//!
//! The catalog is ordered and immutable once built. Style names double as
//! output folder names, so they are validated as single path segments.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDefinition {
    pub name: String,
    pub instruction: String,
}

impl StyleDefinition {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("style catalog is empty")]
    Empty,

    #[error("duplicate style name '{0}'")]
    DuplicateName(String),

    #[error("invalid style name '{0}': must be a single path segment")]
    InvalidName(String),

    #[error("style '{0}' has an empty instruction")]
    EmptyInstruction(String),

    #[error("failed to read style catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse style catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleCatalog {
    styles: Vec<StyleDefinition>,
}

impl StyleCatalog {
    pub fn new(styles: Vec<StyleDefinition>) -> Result<Self, CatalogError> {
        if styles.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for style in &styles {
            let name = style.name.as_str();
            if name.trim().is_empty() || name.contains('/') || name == "." || name == ".." {
                return Err(CatalogError::InvalidName(style.name.clone()));
            }
            if !seen.insert(name) {
                return Err(CatalogError::DuplicateName(style.name.clone()));
            }
            if style.instruction.trim().is_empty() {
                return Err(CatalogError::EmptyInstruction(style.name.clone()));
            }
        }

        Ok(Self { styles })
    }

    /// The four styles shipped with the service
    pub fn builtin() -> Self {
        Self {
            styles: vec![
                StyleDefinition::new(
                    "geometric_3d",
                    "Turn this into geometric 3D abstract art, low poly, vibrant colors",
                ),
                StyleDefinition::new(
                    "watercolor",
                    "Repaint this image as a soft watercolor painting with visible paper texture and gentle color bleeds",
                ),
                StyleDefinition::new(
                    "cyberpunk",
                    "Transform this into a cyberpunk scene with neon lighting, rain-soaked reflections and a futuristic city mood",
                ),
                StyleDefinition::new(
                    "anime",
                    "Redraw this image in a classic anime style with clean line art, cel shading and expressive colors",
                ),
            ],
        }
    }

    /// Load a replacement catalog from a JSON array of `{name, instruction}` objects
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let styles: Vec<StyleDefinition> = serde_json::from_str(raw)?;
        Self::new(styles)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleDefinition> {
        self.styles.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.styles.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

impl Default for StyleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> IntoIterator for &'a StyleCatalog {
    type Item = &'a StyleDefinition;
    type IntoIter = std::slice::Iter<'a, StyleDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.styles.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order_is_stable() {
        let catalog = StyleCatalog::builtin();
        assert_eq!(
            catalog.names(),
            vec!["geometric_3d", "watercolor", "cyberpunk", "anime"]
        );
        assert_eq!(catalog.names(), StyleCatalog::builtin().names());
        assert!(StyleCatalog::new(catalog.iter().cloned().collect()).is_ok());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_names() {
        let dup = vec![
            StyleDefinition::new("anime", "a"),
            StyleDefinition::new("anime", "b"),
        ];
        assert!(matches!(StyleCatalog::new(dup), Err(CatalogError::DuplicateName(_))));

        let nested = vec![StyleDefinition::new("a/b", "x")];
        assert!(matches!(StyleCatalog::new(nested), Err(CatalogError::InvalidName(_))));

        let parent = vec![StyleDefinition::new("..", "x")];
        assert!(matches!(StyleCatalog::new(parent), Err(CatalogError::InvalidName(_))));

        let blank = vec![StyleDefinition::new("sketch", "  ")];
        assert!(matches!(StyleCatalog::new(blank), Err(CatalogError::EmptyInstruction(_))));

        assert!(matches!(StyleCatalog::new(vec![]), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_from_json() {
        let catalog = StyleCatalog::from_json_str(
            r#"[{"name": "sketch", "instruction": "Pencil sketch"},
                {"name": "oil", "instruction": "Oil painting"}]"#,
        )
        .unwrap();
        assert_eq!(catalog.names(), vec!["sketch", "oil"]);
        assert!(matches!(
            StyleCatalog::from_json_str("{}"),
            Err(CatalogError::Parse(_))
        ));
    }
}
