//! Database schema and operations
//!
//! The catalog lives in SQLite between runs. It is read fully into a
//! validated [`Catalog`](crate::catalog::Catalog) at startup; the
//! calculator never touches the database.

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use rusqlite::Connection;

use crate::models::{Material, MaterialId, ProducerKind, RecipeInput};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Material definitions
        CREATE TABLE IF NOT EXISTS materials (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL,
            producer TEXT NOT NULL,
            base_rate REAL NOT NULL,
            is_raw INTEGER NOT NULL
        );

        -- Recipe edges (what a material consumes per unit of output);
        -- position preserves the catalog-declared input order
        CREATE TABLE IF NOT EXISTS recipe_inputs (
            material_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            input_id INTEGER NOT NULL,
            quantity REAL NOT NULL,
            PRIMARY KEY (material_id, position)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_material ON recipe_inputs(material_id);
        CREATE INDEX IF NOT EXISTS idx_recipe_inputs_input ON recipe_inputs(input_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a material row (recipe rows are managed separately)
pub fn upsert_material(conn: &Connection, material: &Material) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO materials (id, name, slug, producer, base_rate, is_raw)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            material.id,
            &material.name,
            &material.slug,
            material.producer.name(),
            material.base_rate,
            material.is_raw,
        ),
    )?;
    Ok(())
}

/// Insert one recipe edge for a material
pub fn insert_recipe_input(
    conn: &Connection,
    material_id: MaterialId,
    position: usize,
    input: &RecipeInput,
) -> Result<()> {
    conn.execute(
        "INSERT INTO recipe_inputs (material_id, position, input_id, quantity)
         VALUES (?1, ?2, ?3, ?4)",
        (material_id, position as i64, input.input, input.quantity),
    )?;
    Ok(())
}

/// Clear the stored catalog (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_inputs;
        DELETE FROM materials;
        "#,
    )?;
    Ok(())
}

/// Replace the stored catalog wholesale with the given materials
pub fn store_materials(conn: &Connection, materials: &[Material]) -> Result<()> {
    clear_catalog(conn)?;
    for material in materials {
        upsert_material(conn, material)?;
        for (position, input) in material.recipe.iter().enumerate() {
            insert_recipe_input(conn, material.id, position, input)?;
        }
    }
    Ok(())
}

/// Load every stored material with its recipe edges in declared order
pub fn load_materials(conn: &Connection) -> Result<Vec<Material>> {
    let mut recipes: BTreeMap<MaterialId, Vec<RecipeInput>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT material_id, input_id, quantity
             FROM recipe_inputs
             ORDER BY material_id, position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, MaterialId>(0)?,
                RecipeInput {
                    input: row.get(1)?,
                    quantity: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (material_id, input) = row?;
            recipes.entry(material_id).or_default().push(input);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, slug, producer, base_rate, is_raw FROM materials ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, MaterialId>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, f64>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut materials = Vec::new();
    for row in rows {
        let (id, name, slug, producer, base_rate, is_raw) = row?;
        let producer = ProducerKind::from_str(&producer)
            .map_err(|e| anyhow!("material {id} ({name}): {e}"))?;
        materials.push(Material {
            id,
            name,
            slug,
            producer,
            base_rate,
            is_raw,
            recipe: recipes.remove(&id).unwrap_or_default(),
        });
    }

    if let Some((&orphan, _)) = recipes.iter().next() {
        return Err(anyhow!(
            "recipe rows reference material {orphan} which has no materials row"
        ));
    }

    Ok(materials)
}

/// Number of stored materials
pub fn count_materials(conn: &Connection) -> Result<u64> {
    let count = conn.query_row("SELECT COUNT(*) FROM materials", [], |row| {
        row.get::<_, u64>(0)
    })?;
    Ok(count)
}
