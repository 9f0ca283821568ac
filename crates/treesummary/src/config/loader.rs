use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Semantic checks the schema cannot express. Runs before any file is touched.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.model_id.trim().is_empty() {
        return Err(ConfigError::MissingSetting("model_id"));
    }

    if config.file_extensions.is_empty() {
        return Err(ConfigError::MissingSetting("file_extensions"));
    }
    if config.file_extensions.iter().any(|ext| ext.is_empty()) {
        return Err(ConfigError::Validation {
            message: "file_extensions must not contain empty entries".to_string(),
        });
    }

    // An empty substring would match every path and silently skip the whole tree.
    if config.ignore_paths.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Validation {
            message: "ignore_paths must not contain empty entries".to_string(),
        });
    }

    if config.parallel == 0 {
        return Err(ConfigError::Validation {
            message: "parallel must be at least 1".to_string(),
        });
    }

    if config.endpoint.trim().is_empty() {
        return Err(ConfigError::MissingSetting("endpoint"));
    }

    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "retry.max_attempts must be at least 1".to_string(),
        });
    }

    Ok(())
}
