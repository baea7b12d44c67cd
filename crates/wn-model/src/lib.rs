//! wn-model: model file format and validation.

pub mod schema;
pub mod validate;

pub use schema::*;
pub use validate::{ValidationError, validate_model};

use std::path::Path;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unsupported model file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> ModelResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        _ => Err(ModelError::UnsupportedFormat {
            path: path.display().to_string(),
        }),
    }
}

pub fn from_json_str(content: &str) -> ModelResult<ModelDef> {
    let model: ModelDef = serde_json::from_str(content)?;
    validate_model(&model)?;
    Ok(model)
}

pub fn from_yaml_str(content: &str) -> ModelResult<ModelDef> {
    let model: ModelDef = serde_yaml::from_str(content)?;
    validate_model(&model)?;
    Ok(model)
}

/// Load and validate a model file; the format follows the file extension.
pub fn load(path: &Path) -> ModelResult<ModelDef> {
    let format = format_of(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Json => from_json_str(&content),
        Format::Yaml => from_yaml_str(&content),
    }
}

pub fn save(path: &Path, model: &ModelDef) -> ModelResult<()> {
    validate_model(model)?;
    let content = match format_of(path)? {
        Format::Json => serde_json::to_string_pretty(model)?,
        Format::Yaml => serde_yaml::to_string(model)?,
    };
    std::fs::write(path, content)?;
    Ok(())
}
