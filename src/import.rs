//! JSON catalog import
//!
//! Reads a materials file (the same shape the game's web calculator
//! ships as `materials.json`) and replaces the stored catalog with it.
//! The file is validated as a whole before anything is written, so a
//! bad import never leaves a partially replaced catalog behind.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::catalog::Catalog;
use crate::db;
use crate::models::Material;

/// Parse a materials JSON file into a material list.
///
/// Expected shape: a top-level array of objects like
///
/// ```json
/// {
///   "id": 6,
///   "name": "Wood Plank",
///   "slug": "wood_plank",
///   "producer": "workshop",
///   "base_rate": 15.0,
///   "is_raw": false,
///   "recipe": [{ "input": 0, "quantity": 1.0 }]
/// }
/// ```
pub fn parse_materials_file(path: &Path) -> Result<Vec<Material>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let materials: Vec<Material> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(materials)
}

/// Import a materials file into the database, replacing the stored catalog
pub fn import_to_database(conn: &Connection, path: &Path) -> Result<ImportStats> {
    let materials = parse_materials_file(path)?;

    // Reject invalid catalogs before touching the database.
    Catalog::new(materials.clone())
        .with_context(|| format!("{} failed catalog validation", path.display()))?;

    db::store_materials(conn, &materials)?;

    let raw = materials.iter().filter(|m| m.is_raw).count();
    let recipe_inputs = materials.iter().map(|m| m.recipe.len()).sum();

    Ok(ImportStats {
        materials: materials.len(),
        raw,
        recipe_inputs,
    })
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub materials: usize,
    pub raw: usize,
    pub recipe_inputs: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} materials ({} raw, {} recipe inputs)",
            self.materials, self.raw, self.recipe_inputs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProducerKind;

    #[test]
    fn materials_json_parses() {
        let json = r#"[
            {
                "id": 0,
                "name": "Wood Log",
                "slug": "wood_log",
                "producer": "extractor",
                "base_rate": 7.5,
                "is_raw": true
            },
            {
                "id": 1,
                "name": "Wood Plank",
                "slug": "wood_plank",
                "producer": "workshop",
                "base_rate": 15.0,
                "is_raw": false,
                "recipe": [{ "input": 0, "quantity": 1.0 }]
            }
        ]"#;

        let materials: Vec<Material> = serde_json::from_str(json).unwrap();
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].producer, ProducerKind::Extractor);
        assert!(materials[0].recipe.is_empty());
        assert_eq!(materials[1].recipe[0].quantity, 1.0);
        assert!(Catalog::new(materials).is_ok());
    }

    #[test]
    fn unknown_producer_kind_fails_to_parse() {
        let json = r#"[
            {
                "id": 0,
                "name": "Wood Log",
                "slug": "wood_log",
                "producer": "treadmill",
                "base_rate": 7.5,
                "is_raw": true
            }
        ]"#;
        assert!(serde_json::from_str::<Vec<Material>>(json).is_err());
    }
}
