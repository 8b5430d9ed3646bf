//! Builderment Production Calculator
//!
//! A production chain calculator for Builderment. Forward mode answers
//! "what does it take to make N per minute of X"; reverse mode answers
//! "with these extractors, how much X can I make and what runs out first".

mod calculator;
mod catalog;
mod db;
mod import;
mod models;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use catalog::Catalog;
use models::{Material, MaterialId, ProducerKind, RecipeInput, TierModifiers, LEVEL_MODIFIERS};

#[derive(Parser)]
#[command(name = "builderment-calculator")]
#[command(about = "Production chain calculator for Builderment")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "builderment.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate the production chain for a target material and rate
    Calc {
        /// Target material (name, slug or id), e.g. "Iron Gear"
        material: String,

        /// Target production rate in units/min
        #[arg(short, long, default_value = "60.0")]
        rate: f64,

        /// Producer upgrade level as KIND=LEVEL (1-5), e.g. -l furnace=3
        #[arg(short, long)]
        level: Vec<String>,

        /// Show the full production tree
        #[arg(short, long)]
        verbose: bool,
    },

    /// Find the best sustainable rate for a fixed extractor supply
    Reverse {
        /// Target material (name, slug or id)
        material: String,

        /// Extractor counts, one per raw material in catalog order,
        /// e.g. --extractors 20,10,30,15,5,5
        #[arg(short, long, value_delimiter = ',', required = true)]
        extractors: Vec<f64>,

        /// Producer upgrade level as KIND=LEVEL (1-5)
        #[arg(short, long)]
        level: Vec<String>,

        /// Show the full production tree
        #[arg(short, long)]
        verbose: bool,
    },

    /// Import a materials JSON file, replacing the stored catalog
    Import {
        /// Path to the materials file
        file: PathBuf,
    },

    /// List all materials in the catalog
    ListMaterials,

    /// Show details for a specific material
    Material {
        /// Material name, slug or id
        material: String,
    },

    /// Initialize an empty database with schema
    Init,

    /// Load the built-in Builderment catalog
    LoadDefault,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Calc {
            material,
            rate,
            level,
            verbose,
        } => {
            let Some(catalog) = open_catalog(&conn)? else {
                return Ok(());
            };
            let target = find_material(&catalog, &material)?;
            let modifiers = parse_levels(&level)?;

            let resolution = calculator::resolve(&catalog, target, rate, &modifiers)?;

            if verbose {
                println!("Production chain:\n");
                println!("{}", calculator::format_tree(&catalog, &resolution.tree, 0));
            }

            println!("{}", calculator::summarize_chain(&catalog, &resolution));
        }

        Commands::Reverse {
            material,
            extractors,
            level,
            verbose,
        } => {
            let Some(catalog) = open_catalog(&conn)? else {
                return Ok(());
            };
            let target = find_material(&catalog, &material)?;
            let modifiers = parse_levels(&level)?;

            let outcome =
                calculator::solve_achievable_rate(&catalog, target, &extractors, &modifiers)?;

            let limiting = catalog.get(outcome.limiting)?;
            println!(
                "You are limited by the amount of {} extractors",
                limiting.name
            );
            println!("Best sustainable rate: {:.2}/min\n", outcome.rate);

            if verbose {
                println!("Production chain:\n");
                println!(
                    "{}",
                    calculator::format_tree(&catalog, &outcome.resolution.tree, 0)
                );
            }

            println!("{}", calculator::summarize_chain(&catalog, &outcome.resolution));
        }

        Commands::Import { file } => {
            let stats = import::import_to_database(&conn, &file)?;
            println!("{stats}");
        }

        Commands::ListMaterials => {
            let Some(catalog) = open_catalog(&conn)? else {
                return Ok(());
            };
            println!(
                "{:>4} {:<20} {:<20} {:>10} {:>8}",
                "ID", "Material", "Producer", "Rate/min", "Inputs"
            );
            println!("{}", "-".repeat(66));
            for material in catalog.materials() {
                println!(
                    "{:>4} {:<20} {:<20} {:>10.2} {:>8}",
                    material.id,
                    material.name,
                    material.producer.display_name(),
                    material.base_rate,
                    if material.is_raw {
                        "raw".to_string()
                    } else {
                        material.recipe.len().to_string()
                    }
                );
            }
        }

        Commands::Material { material } => {
            let Some(catalog) = open_catalog(&conn)? else {
                return Ok(());
            };
            let id = find_material(&catalog, &material)?;
            let material = catalog.get(id)?;

            println!("Material: {}", material.name);
            println!("  ID: {}", material.id);
            println!("  Slug: {}", material.slug);
            println!("  Producer: {}", material.producer.display_name());
            println!("  Base rate: {}/min", material.base_rate);

            if material.is_raw {
                println!("  Raw material (no recipe)");
            } else {
                println!("  Recipe (per unit of output):");
                for input in &material.recipe {
                    let name = catalog
                        .get(input.input)
                        .map(|m| m.name.clone())
                        .unwrap_or_else(|_| format!("material {}", input.input));
                    println!("    {} x{}", name, input.quantity);
                }
            }

            let consumers = catalog.consumers(material.id);
            if !consumers.is_empty() {
                println!("  Used by:");
                for consumer in consumers {
                    println!("    {}", consumer.name);
                }
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadDefault => {
            let materials = default_catalog();
            // The built-in data must satisfy the same invariants as any
            // imported catalog.
            Catalog::new(materials.clone())?;
            db::store_materials(&conn, &materials)?;
            println!("Loaded {} default materials", materials.len());
        }
    }

    Ok(())
}

/// Load and validate the stored catalog, or print a hint when empty.
fn open_catalog(conn: &Connection) -> Result<Option<Catalog>> {
    let materials = db::load_materials(conn)?;
    if materials.is_empty() {
        println!("No materials in database. Run 'import' or 'load-default' first.");
        return Ok(None);
    }
    Ok(Some(Catalog::new(materials)?))
}

fn find_material(catalog: &Catalog, key: &str) -> Result<MaterialId> {
    catalog
        .lookup(key)
        .map(|m| m.id)
        .ok_or_else(|| anyhow!("material '{key}' not found (try 'list-materials')"))
}

/// Parse repeated KIND=LEVEL arguments into tier modifiers. Unlisted
/// kinds stay at level 1 (modifier 1.0).
fn parse_levels(specs: &[String]) -> Result<TierModifiers> {
    let mut modifiers = TierModifiers::default();
    for spec in specs {
        let Some((kind, level)) = spec.split_once('=') else {
            bail!("expected KIND=LEVEL, got '{spec}'");
        };
        let kind: ProducerKind = kind
            .trim()
            .parse()
            .map_err(|e: String| anyhow!("{e} (in '{spec}')"))?;
        let level: usize = level
            .trim()
            .parse()
            .map_err(|_| anyhow!("level in '{spec}' is not a number"))?;
        let modifier = level
            .checked_sub(1)
            .and_then(|i| LEVEL_MODIFIERS.get(i))
            .ok_or_else(|| {
                anyhow!(
                    "level in '{spec}' out of range (1-{})",
                    LEVEL_MODIFIERS.len()
                )
            })?;
        modifiers.set(kind, *modifier);
    }
    Ok(modifiers)
}

fn raw(id: MaterialId, name: &str, slug: &str) -> Material {
    Material {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        producer: ProducerKind::Extractor,
        base_rate: 7.5,
        is_raw: true,
        recipe: Vec::new(),
    }
}

fn mat(
    id: MaterialId,
    name: &str,
    slug: &str,
    producer: ProducerKind,
    base_rate: f64,
    recipe: &[(MaterialId, f64)],
) -> Material {
    Material {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        producer,
        base_rate,
        is_raw: false,
        recipe: recipe
            .iter()
            .map(|&(input, quantity)| RecipeInput { input, quantity })
            .collect(),
    }
}

/// Built-in Builderment catalog: the six raw resources and the crafted
/// materials up through the late-game factories.
fn default_catalog() -> Vec<Material> {
    use ProducerKind::*;

    vec![
        raw(0, "Wood Log", "wood_log"),
        raw(1, "Stone", "stone"),
        raw(2, "Iron Ore", "iron_ore"),
        raw(3, "Copper Ore", "copper_ore"),
        raw(4, "Coal", "coal"),
        raw(5, "Wolframite", "wolframite"),
        mat(6, "Wood Plank", "wood_plank", Workshop, 15.0, &[(0, 1.0)]),
        mat(7, "Wood Frame", "wood_frame", Workshop, 5.0, &[(6, 4.0)]),
        mat(8, "Sand", "sand", Workshop, 20.0, &[(1, 1.0)]),
        mat(9, "Stone Brick", "stone_brick", Furnace, 10.0, &[(1, 2.0)]),
        mat(10, "Glass", "glass", Furnace, 7.5, &[(8, 4.0)]),
        mat(11, "Silicon", "silicon", Furnace, 10.0, &[(8, 2.0)]),
        mat(12, "Iron Ingot", "iron_ingot", Furnace, 15.0, &[(2, 1.0)]),
        mat(13, "Copper Ingot", "copper_ingot", Furnace, 15.0, &[(3, 1.0)]),
        mat(14, "Steel", "steel", Furnace, 5.0, &[(2, 6.0), (4, 1.0)]),
        mat(15, "Graphite", "graphite", Furnace, 7.5, &[(0, 3.0), (4, 1.0)]),
        mat(
            16,
            "Tungsten Carbide",
            "tungsten_carbide",
            Furnace,
            5.0,
            &[(5, 2.0), (15, 1.0)],
        ),
        mat(17, "Iron Gear", "iron_gear", Workshop, 10.0, &[(12, 2.0)]),
        mat(18, "Iron Plating", "iron_plating", Workshop, 7.5, &[(12, 4.0)]),
        mat(19, "Copper Wire", "copper_wire", Workshop, 15.0, &[(13, 1.5)]),
        mat(20, "Heat Sink", "heat_sink", Workshop, 10.0, &[(13, 5.0)]),
        mat(21, "Steel Rod", "steel_rod", MachineShop, 7.5, &[(14, 3.0)]),
        mat(
            22,
            "Logic Circuit",
            "logic_circuit",
            MachineShop,
            5.0,
            &[(19, 3.0), (11, 2.0)],
        ),
        mat(
            23,
            "Condenser Lens",
            "condenser_lens",
            MachineShop,
            5.0,
            &[(10, 3.0)],
        ),
        mat(
            24,
            "Electromagnet",
            "electromagnet",
            MachineShop,
            5.0,
            &[(19, 6.0), (12, 2.0)],
        ),
        mat(
            25,
            "Battery",
            "battery",
            MachineShop,
            2.5,
            &[(15, 2.0), (13, 4.0)],
        ),
        mat(
            26,
            "Rotor",
            "rotor",
            MachineShop,
            5.0,
            &[(21, 2.0), (18, 2.0)],
        ),
        mat(
            27,
            "Metal Frame",
            "metal_frame",
            Forge,
            2.5,
            &[(18, 4.0), (7, 1.0)],
        ),
        mat(
            28,
            "Electric Motor",
            "electric_motor",
            Forge,
            2.5,
            &[(25, 1.0), (26, 2.0), (24, 4.0)],
        ),
        mat(
            29,
            "Gyroscope",
            "gyroscope",
            Forge,
            2.0,
            &[(26, 2.0), (24, 4.0)],
        ),
        mat(
            30,
            "Computer",
            "computer",
            Forge,
            1.5,
            &[(27, 1.0), (20, 4.0), (22, 8.0)],
        ),
        mat(
            31,
            "Industrial Frame",
            "industrial_frame",
            IndustrialFactory,
            1.0,
            &[(27, 2.0), (16, 8.0), (21, 10.0)],
        ),
        mat(
            32,
            "Stabilizer",
            "stabilizer",
            IndustrialFactory,
            1.0,
            &[(30, 1.0), (29, 2.0), (21, 4.0)],
        ),
        mat(
            33,
            "Super Computer",
            "super_computer",
            IndustrialFactory,
            0.75,
            &[(30, 2.0), (20, 8.0), (22, 16.0), (31, 1.0)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        let catalog = Catalog::new(default_catalog()).unwrap();
        assert_eq!(catalog.raw_materials(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(catalog.len(), 34);
    }

    #[test]
    fn default_catalog_resolves_deep_targets() {
        let catalog = Catalog::new(default_catalog()).unwrap();
        let target = catalog.lookup("super_computer").map(|m| m.id).unwrap();
        let resolution =
            calculator::resolve(&catalog, target, 1.0, &TierModifiers::default()).unwrap();
        // A super computer chain touches every raw resource.
        for &id in catalog.raw_materials() {
            assert!(resolution.totals.get(&id).copied().unwrap_or(0.0) > 0.0);
        }
    }

    #[test]
    fn parse_levels_defaults_and_overrides() {
        let modifiers = parse_levels(&[]).unwrap();
        assert_eq!(modifiers.get(ProducerKind::Furnace), 1.0);

        let modifiers =
            parse_levels(&["furnace=3".to_string(), "extractor=5".to_string()]).unwrap();
        assert_eq!(modifiers.get(ProducerKind::Furnace), 2.0);
        assert_eq!(modifiers.get(ProducerKind::Extractor), 4.0);
        assert_eq!(modifiers.get(ProducerKind::Workshop), 1.0);
    }

    #[test]
    fn parse_levels_rejects_bad_specs() {
        assert!(parse_levels(&["furnace".to_string()]).is_err());
        assert!(parse_levels(&["smelter=2".to_string()]).is_err());
        assert!(parse_levels(&["furnace=0".to_string()]).is_err());
        assert!(parse_levels(&["furnace=6".to_string()]).is_err());
        assert!(parse_levels(&["furnace=two".to_string()]).is_err());
    }
}
