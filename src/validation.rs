use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use validator::{Validate, ValidationError};

use crate::error::StylizerError;

pub const DEFAULT_CONTAINER: &str = "file-container";
pub const DEFAULT_SOURCE_FOLDER: &str = "source";
pub const DEFAULT_OUTPUT_FOLDER: &str = "output";

static CONTAINER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[a-z0-9]|-[a-z0-9])*$").expect("valid regex"));

fn default_container() -> String {
    DEFAULT_CONTAINER.to_string()
}

fn default_source_folder() -> String {
    DEFAULT_SOURCE_FOLDER.to_string()
}

fn default_output_folder() -> String {
    DEFAULT_OUTPUT_FOLDER.to_string()
}

/// Body of a style request. Every field is optional.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StyleRequest {
    #[serde(default = "default_source_folder")]
    #[validate(length(max = 1024), custom(function = "validate_folder"))]
    pub source_folder: String,

    #[serde(default = "default_output_folder")]
    #[validate(length(max = 1024), custom(function = "validate_folder"))]
    pub output_folder: String,

    #[serde(default = "default_container")]
    #[validate(length(min = 3, max = 63), custom(function = "validate_container_name"))]
    pub container: String,
}

impl Default for StyleRequest {
    fn default() -> Self {
        Self {
            source_folder: default_source_folder(),
            output_folder: default_output_folder(),
            container: default_container(),
        }
    }
}

/// Container selection for the listing endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub container: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct ListRequest {
    #[validate(length(min = 3, max = 63), custom(function = "validate_container_name"))]
    pub container: String,
}

impl ListRequest {
    /// Query string wins over the body; both absent means the default container
    pub fn resolve(query: ListQuery, body: Option<ListQuery>) -> Self {
        let container = non_blank(query.container)
            .or_else(|| body.and_then(|b| non_blank(b.container)))
            .unwrap_or_else(default_container);
        Self { container }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn validate_container_name(name: &str) -> Result<(), ValidationError> {
    if CONTAINER_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::new("container_name").with_message(
            "container names use lowercase letters, digits and single hyphens".into(),
        ))
    }
}

fn validate_folder(folder: &str) -> Result<(), ValidationError> {
    if folder.split('/').any(|segment| segment == "..") {
        return Err(ValidationError::new("folder")
            .with_message("folders must not contain '..' segments".into()));
    }
    Ok(())
}

/// Validate once at the boundary so handlers work with clean values
pub fn validated<T: Validate>(request: T) -> Result<T, StylizerError> {
    request.validate()?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_request_defaults() {
        let request: StyleRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.source_folder, "source");
        assert_eq!(request.output_folder, "output");
        assert_eq!(request.container, "file-container");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_container_name_rules() {
        assert!(validate_container_name("file-container").is_ok());
        assert!(validate_container_name("abc123").is_ok());
        assert!(validate_container_name("Uppercase").is_err());
        assert!(validate_container_name("double--hyphen").is_err());
        assert!(validate_container_name("-leading").is_err());
        assert!(validate_container_name("trailing-").is_err());

        let short = ListRequest {
            container: "ab".to_string(),
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_folder_rules() {
        let request = StyleRequest {
            output_folder: "../escape".to_string(),
            ..Default::default()
        };
        assert!(matches!(validated(request), Err(StylizerError::Validation(_))));

        let request = StyleRequest {
            output_folder: String::new(),
            ..Default::default()
        };
        assert!(validated(request).is_ok());
    }

    #[test]
    fn test_list_request_resolution() {
        let from_query = ListRequest::resolve(
            ListQuery {
                container: Some("photos".into()),
            },
            Some(ListQuery {
                container: Some("ignored".into()),
            }),
        );
        assert_eq!(from_query.container, "photos");

        let from_body = ListRequest::resolve(
            ListQuery::default(),
            Some(ListQuery {
                container: Some("archive".into()),
            }),
        );
        assert_eq!(from_body.container, "archive");

        let fallback = ListRequest::resolve(ListQuery { container: Some("  ".into()) }, None);
        assert_eq!(fallback.container, "file-container");
    }
}
