//! Validated in-memory recipe catalog
//!
//! The catalog is loaded once, validated once, and read-only afterwards.
//! Resolution relies on the invariants enforced here (acyclic recipe
//! graph, every recipe input known, raw/recipe consistency) and never
//! re-checks them mid-traversal.

use std::collections::BTreeMap;

use crate::models::{CalcError, Material, MaterialId, ProducerKind};

/// Immutable, validated material catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    materials: BTreeMap<MaterialId, Material>,
    /// Raw materials in catalog-declared (ascending id) order. This is
    /// the fixed ordering extractor-supply vectors align with.
    raw_order: Vec<MaterialId>,
}

impl Catalog {
    /// Build a catalog from a flat material list, rejecting any list that
    /// violates the recipe-graph invariants.
    pub fn new(materials: Vec<Material>) -> Result<Catalog, CalcError> {
        let mut map = BTreeMap::new();
        for material in materials {
            if let Some(previous) = map.insert(material.id, material) {
                return Err(CalcError::MalformedCatalog(format!(
                    "duplicate material id {} ({})",
                    previous.id, previous.name
                )));
            }
        }

        validate(&map)?;

        let raw_order = map
            .values()
            .filter(|m| m.is_raw)
            .map(|m| m.id)
            .collect();

        Ok(Catalog {
            materials: map,
            raw_order,
        })
    }

    pub fn get(&self, id: MaterialId) -> Result<&Material, CalcError> {
        self.materials
            .get(&id)
            .ok_or(CalcError::UnknownMaterial(id))
    }

    /// Resolve a user-supplied key: numeric id, exact slug, or
    /// case-insensitive name.
    pub fn lookup(&self, key: &str) -> Option<&Material> {
        if let Ok(id) = key.parse::<MaterialId>() {
            return self.materials.get(&id);
        }
        self.materials
            .values()
            .find(|m| m.slug == key || m.name.eq_ignore_ascii_case(key))
    }

    /// All materials in ascending id order.
    pub fn materials(&self) -> impl Iterator<Item = &Material> {
        self.materials.values()
    }

    /// Raw material ids in the fixed supply-alignment order.
    pub fn raw_materials(&self) -> &[MaterialId] {
        &self.raw_order
    }

    /// Materials whose recipe consumes `id`, in ascending id order.
    pub fn consumers(&self, id: MaterialId) -> Vec<&Material> {
        self.materials
            .values()
            .filter(|m| m.recipe.iter().any(|input| input.input == id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

fn validate(materials: &BTreeMap<MaterialId, Material>) -> Result<(), CalcError> {
    for material in materials.values() {
        if !(material.base_rate.is_finite() && material.base_rate > 0.0) {
            return Err(CalcError::MalformedCatalog(format!(
                "material {} ({}) has non-positive base rate {}",
                material.id, material.name, material.base_rate
            )));
        }

        if material.is_raw {
            if !material.recipe.is_empty() {
                return Err(CalcError::MalformedCatalog(format!(
                    "raw material {} ({}) declares a recipe",
                    material.id, material.name
                )));
            }
            if material.producer != ProducerKind::Extractor {
                return Err(CalcError::MalformedCatalog(format!(
                    "raw material {} ({}) is not extractor-produced",
                    material.id, material.name
                )));
            }
        } else if material.recipe.is_empty() {
            return Err(CalcError::MalformedCatalog(format!(
                "material {} ({}) is not raw but has no recipe",
                material.id, material.name
            )));
        }

        for input in &material.recipe {
            if !materials.contains_key(&input.input) {
                return Err(CalcError::MalformedCatalog(format!(
                    "material {} ({}) requires unknown material {}",
                    material.id, material.name, input.input
                )));
            }
            if !(input.quantity.is_finite() && input.quantity > 0.0) {
                return Err(CalcError::MalformedCatalog(format!(
                    "material {} ({}) requires {} of material {}",
                    material.id, material.name, input.quantity, input.input
                )));
            }
        }
    }

    check_acyclic(materials)
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Depth-first cycle check over the recipe graph. A material that
/// (transitively) requires itself would make resolution recurse forever.
fn check_acyclic(materials: &BTreeMap<MaterialId, Material>) -> Result<(), CalcError> {
    let mut marks: BTreeMap<MaterialId, Mark> = materials
        .keys()
        .map(|&id| (id, Mark::Unvisited))
        .collect();

    for &id in materials.keys() {
        if marks[&id] == Mark::Unvisited {
            visit(materials, &mut marks, id)?;
        }
    }
    Ok(())
}

fn visit(
    materials: &BTreeMap<MaterialId, Material>,
    marks: &mut BTreeMap<MaterialId, Mark>,
    id: MaterialId,
) -> Result<(), CalcError> {
    marks.insert(id, Mark::InProgress);

    // Inputs are known to exist by the reference check above.
    if let Some(material) = materials.get(&id) {
        for input in &material.recipe {
            match marks[&input.input] {
                Mark::InProgress => {
                    return Err(CalcError::MalformedCatalog(format!(
                        "recipe cycle through material {} ({})",
                        material.id, material.name
                    )));
                }
                Mark::Unvisited => visit(materials, marks, input.input)?,
                Mark::Done => {}
            }
        }
    }

    marks.insert(id, Mark::Done);
    Ok(())
}
