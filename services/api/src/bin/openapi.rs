//! services/api/src/bin/openapi.rs
//!
//! Writes the study API's OpenAPI document.
//! Usage: `openapi [OUTPUT]`, where OUTPUT defaults to `openapi.json`.

use std::error::Error;
use std::path::{Path, PathBuf};

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn write_document(doc: &utoipa::openapi::OpenApi, output: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, doc.to_pretty_json()?)?;
    println!(
        "Wrote {} API paths to {}",
        doc.paths.paths.len(),
        output.display()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let output = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));
    write_document(&ApiDoc::openapi(), &output)
}
