//! WebAssembly bindings for the sequence diagram generation engine

use seqgen_core::{Config, Diagram, GenerationFailure, Layout};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;

fn parse_config(config_json: &str) -> Result<Config, String> {
    if config_json.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_json::from_str(config_json).map_err(|e| format!("Invalid config: {}", e))
}

fn model(diagram: &Diagram, layout: Option<&Layout>) -> Value {
    let lifelines: Vec<Value> = diagram
        .lifelines()
        .roots()
        .map(|l| {
            json!({
                "name": l.name,
                "type": l.type_name,
                "label": l.label,
                "alwaysActive": l.always_active,
                "birth": l.birth,
                "death": l.death,
                "destroyed": l.destroy_mark,
            })
        })
        .collect();
    json!({
        "lifelines": lifelines,
        "messages": diagram.messages(),
        "layout": layout,
    })
}

/// Generate a diagram from record notation
///
/// # Arguments
/// * `input` - The record notation source
/// * `config_json` - Generation config as JSON (missing fields use defaults)
///
/// # Returns
/// The generated model and its layout as JSON, or an error message
#[wasm_bindgen]
pub fn generate(input: &str, config_json: &str) -> Result<String, String> {
    let config = parse_config(config_json)?;
    let records = seqgen_core::read(input).map_err(|e| e.to_string())?;
    let diagram = seqgen_core::generate(&records, &config).map_err(|e| e.to_string())?;
    let layout = diagram.layout().map_err(|e| e.to_string())?;
    serde_json::to_string(&model(&diagram, Some(&layout))).map_err(|e| e.to_string())
}

/// Generate as far as possible: on failure the partial model is returned
/// together with the error and its source position
#[wasm_bindgen]
pub fn generate_partial(input: &str, config_json: &str) -> Result<String, String> {
    let config = parse_config(config_json)?;
    let records = seqgen_core::read(input).map_err(|e| e.to_string())?;
    let value = match seqgen_core::generate(&records, &config) {
        Ok(diagram) => {
            let layout = diagram.layout().map_err(|e| e.to_string())?;
            model(&diagram, Some(&layout))
        }
        Err(GenerationFailure { error, partial }) => {
            let mut value = model(&partial, None);
            value["error"] = json!({
                "message": error.to_string(),
                "position": error.position(),
            });
            value
        }
    };
    serde_json::to_string(&value).map_err(|e| e.to_string())
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
