//! Production chain calculator logic
//!
//! Forward mode expands a target material and rate into a tree of
//! upstream production requirements. Reverse mode takes a committed
//! extractor supply instead of a rate, finds which raw material limits
//! the chain, and re-runs the forward expansion at the rate that supply
//! can sustain.

use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::models::{
    CalcError, MaterialId, ProducerKind, Resolution, ReverseOutcome, TierModifiers, TreeNode,
};

/// Calculate the production chain for a target material at a given rate.
///
/// Returns the full requirement tree plus per-material totals summed
/// over every node in it. A rate of zero is legal and yields a tree of
/// zero-count producers; a negative rate is rejected.
pub fn resolve(
    catalog: &Catalog,
    material_id: MaterialId,
    rate: f64,
    modifiers: &TierModifiers,
) -> Result<Resolution, CalcError> {
    modifiers.validate()?;
    if !rate.is_finite() || rate < 0.0 {
        return Err(CalcError::InvalidRate(rate));
    }
    // Reject an unknown target before any traversal; every id reachable
    // from a known one is guaranteed valid by catalog validation.
    catalog.get(material_id)?;

    let mut totals = BTreeMap::new();
    let tree = expand(catalog, material_id, rate, modifiers, &mut totals)?;

    Ok(Resolution { tree, totals })
}

/// Depth-first expansion. Builds the tree and accumulates totals in the
/// same traversal; each node adds its rate exactly once.
fn expand(
    catalog: &Catalog,
    material_id: MaterialId,
    rate: f64,
    modifiers: &TierModifiers,
    totals: &mut BTreeMap<MaterialId, f64>,
) -> Result<TreeNode, CalcError> {
    let material = catalog.get(material_id)?;

    let throughput = material.base_rate * modifiers.get(material.producer);
    let producer_count = (rate / throughput).ceil() as u64;

    *totals.entry(material_id).or_insert(0.0) += rate;

    // Raw materials terminate the recursion; recipe order is preserved
    // in the children so renderers see the catalog-declared sequence.
    let mut children = Vec::with_capacity(material.recipe.len());
    for input in &material.recipe {
        children.push(expand(
            catalog,
            input.input,
            rate * input.quantity,
            modifiers,
            totals,
        )?);
    }

    Ok(TreeNode {
        material_id,
        rate,
        producer_count,
        children,
    })
}

/// Find the output rate a fixed extractor supply can sustain.
///
/// `extractor_supply` is aligned with [`Catalog::raw_materials`] order,
/// one entry per raw material. The probe resolution at unit rate gives
/// per-unit raw demand; the smallest supply/demand ratio is the
/// achievable rate and the raw material attaining it is the bottleneck.
/// Raw materials the target does not depend on can never limit the
/// chain (their ratio is infinite). Ties go to the first raw material
/// in catalog order.
pub fn solve_achievable_rate(
    catalog: &Catalog,
    material_id: MaterialId,
    extractor_supply: &[f64],
    modifiers: &TierModifiers,
) -> Result<ReverseOutcome, CalcError> {
    let raws = catalog.raw_materials();
    if extractor_supply.len() != raws.len() {
        return Err(CalcError::InvalidSupply(format!(
            "expected {} entries (one per raw material), got {}",
            raws.len(),
            extractor_supply.len()
        )));
    }
    for (i, &count) in extractor_supply.iter().enumerate() {
        if !count.is_finite() || count < 0.0 {
            return Err(CalcError::InvalidSupply(format!(
                "entry {i} is {count}, must be a non-negative number"
            )));
        }
    }

    let probe = resolve(catalog, material_id, 1.0, modifiers)?;
    let extractor_modifier = modifiers.get(ProducerKind::Extractor);

    let mut limiting = None;
    for (i, &raw_id) in raws.iter().enumerate() {
        let demand_per_unit = probe.totals.get(&raw_id).copied().unwrap_or(0.0);
        let ratio = if demand_per_unit == 0.0 {
            // Not on the path to the target; can never be the bottleneck.
            f64::INFINITY
        } else {
            let sustained = extractor_supply[i] * extractor_modifier * catalog.get(raw_id)?.base_rate;
            sustained / demand_per_unit
        };

        // Strict < keeps the first raw material on ties.
        match limiting {
            Some((_, best)) if ratio >= best => {}
            _ => limiting = Some((raw_id, ratio)),
        }
    }

    let (limiting, ratio) = limiting.ok_or_else(|| {
        CalcError::MalformedCatalog("catalog contains no raw materials".to_string())
    })?;

    // Floor to two decimals so the reported chain never overstates what
    // the committed extractors can sustain.
    let rate = (ratio * 100.0).floor() / 100.0;
    let resolution = resolve(catalog, material_id, rate, modifiers)?;

    Ok(ReverseOutcome {
        rate,
        limiting,
        resolution,
    })
}

/// Format a production tree as an indented text listing.
pub fn format_tree(catalog: &Catalog, node: &TreeNode, indent: usize) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    let (name, producer) = match catalog.get(node.material_id) {
        Ok(material) => (material.name.clone(), material.producer.display_name()),
        Err(_) => (format!("material {}", node.material_id), "?"),
    };

    output.push_str(&format!(
        "{}{} @ {:.2}/min ({} {}{})\n",
        prefix,
        name,
        node.rate,
        node.producer_count,
        producer,
        if node.producer_count == 1 { "" } else { "s" }
    ));

    for child in &node.children {
        output.push_str(&format_tree(catalog, child, indent + 1));
    }

    output
}

/// Summary of a production chain calculation
#[derive(Debug)]
pub struct ChainSummary {
    pub target: String,
    pub rate: f64,
    /// Total machines per producer kind, in kind order.
    pub producer_counts: Vec<(&'static str, u64)>,
    /// Cumulative demand per material, in ascending id order.
    pub material_totals: Vec<(String, f64)>,
}

/// Generate a summary of a resolved chain.
pub fn summarize_chain(catalog: &Catalog, resolution: &Resolution) -> ChainSummary {
    let target = match catalog.get(resolution.tree.material_id) {
        Ok(material) => material.name.clone(),
        Err(_) => format!("material {}", resolution.tree.material_id),
    };

    let mut counts: BTreeMap<usize, (&'static str, u64)> = BTreeMap::new();
    collect_producer_counts(catalog, &resolution.tree, &mut counts);

    let material_totals = resolution
        .totals
        .iter()
        .map(|(&id, &total)| {
            let name = match catalog.get(id) {
                Ok(material) => material.name.clone(),
                Err(_) => format!("material {id}"),
            };
            (name, total)
        })
        .collect();

    ChainSummary {
        target,
        rate: resolution.tree.rate,
        producer_counts: counts.into_values().collect(),
        material_totals,
    }
}

fn collect_producer_counts(
    catalog: &Catalog,
    node: &TreeNode,
    counts: &mut BTreeMap<usize, (&'static str, u64)>,
) {
    if let Ok(material) = catalog.get(node.material_id) {
        let order = ProducerKind::ALL
            .iter()
            .position(|&k| k == material.producer)
            .unwrap_or(ProducerKind::ALL.len());
        counts
            .entry(order)
            .or_insert((material.producer.display_name(), 0))
            .1 += node.producer_count;
    }
    for child in &node.children {
        collect_producer_counts(catalog, child, counts);
    }
}

impl std::fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Production Summary ===")?;
        writeln!(f, "Target: {} @ {:.2}/min", self.target, self.rate)?;
        writeln!(f)?;

        writeln!(f, "Producers required:")?;
        for (kind, count) in &self.producer_counts {
            writeln!(f, "  {count}x {kind}")?;
        }
        writeln!(f)?;

        writeln!(f, "Material totals:")?;
        for (name, total) in &self.material_totals {
            writeln!(f, "  {name} @ {total:.2}/min")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Material, RecipeInput};

    fn material(
        id: MaterialId,
        name: &str,
        producer: ProducerKind,
        base_rate: f64,
        recipe: &[(MaterialId, f64)],
    ) -> Material {
        Material {
            id,
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "_"),
            producer,
            base_rate,
            is_raw: recipe.is_empty(),
            recipe: recipe
                .iter()
                .map(|&(input, quantity)| RecipeInput { input, quantity })
                .collect(),
        }
    }

    /// Diamond over one raw material:
    ///
    ///   Gadget (3) -> Plate (0) x2 -> Ore
    ///              -> Gear  (2) x3 -> Ore
    fn diamond_catalog() -> Catalog {
        Catalog::new(vec![
            material(0, "Ore", ProducerKind::Extractor, 7.5, &[]),
            material(1, "Plate", ProducerKind::Furnace, 10.0, &[(0, 2.0)]),
            material(2, "Gear", ProducerKind::Workshop, 5.0, &[(0, 3.0)]),
            material(3, "Gadget", ProducerKind::MachineShop, 2.5, &[(1, 2.0), (2, 1.0)]),
        ])
        .unwrap()
    }

    /// The worked reverse-mode catalog: per unit of Widget, 3 Bauxite
    /// and 5 Quartz. Gravel is never required by Widget.
    fn reverse_catalog() -> Catalog {
        Catalog::new(vec![
            material(0, "Bauxite", ProducerKind::Extractor, 1.0, &[]),
            material(1, "Quartz", ProducerKind::Extractor, 1.0, &[]),
            material(2, "Widget", ProducerKind::Workshop, 1.0, &[(0, 3.0), (1, 5.0)]),
            material(3, "Gravel", ProducerKind::Extractor, 1.0, &[]),
        ])
        .unwrap()
    }

    fn leaf_ids(node: &TreeNode, out: &mut Vec<MaterialId>) {
        if node.children.is_empty() {
            out.push(node.material_id);
        }
        for child in &node.children {
            leaf_ids(child, out);
        }
    }

    #[test]
    fn leaves_are_exactly_the_reachable_raw_materials() {
        let catalog = diamond_catalog();
        let resolution = resolve(&catalog, 3, 5.0, &TierModifiers::default()).unwrap();

        let mut leaves = Vec::new();
        leaf_ids(&resolution.tree, &mut leaves);
        leaves.sort_unstable();
        leaves.dedup();
        assert_eq!(leaves, vec![0]);
    }

    #[test]
    fn producer_counts_round_up() {
        let catalog = diamond_catalog();
        // Plate directly: 25/min over 10/min per furnace -> 3 furnaces.
        let resolution = resolve(&catalog, 1, 25.0, &TierModifiers::default()).unwrap();
        assert_eq!(resolution.tree.producer_count, 3);
        // Its ore child: 50/min over 7.5/min per extractor -> 7.
        assert_eq!(resolution.tree.children[0].rate, 50.0);
        assert_eq!(resolution.tree.children[0].producer_count, 7);
    }

    #[test]
    fn tier_modifier_scales_producer_count() {
        let catalog = diamond_catalog();
        let mut tiers = TierModifiers::default();
        tiers.set(ProducerKind::Furnace, 2.0);
        // 25/min over 20/min per upgraded furnace -> 2 instead of 3.
        let resolution = resolve(&catalog, 1, 25.0, &tiers).unwrap();
        assert_eq!(resolution.tree.producer_count, 2);
        // Extractor children are unaffected by the furnace tier.
        assert_eq!(resolution.tree.children[0].producer_count, 7);
    }

    #[test]
    fn diamond_totals_are_additive() {
        let catalog = diamond_catalog();
        let resolution = resolve(&catalog, 3, 1.0, &TierModifiers::default()).unwrap();

        // Plate path: 2 plate x 2 ore = 4; gear path: 1 gear x 3 ore = 3.
        // Both paths contribute; the total is the sum, not the max.
        assert_eq!(resolution.totals.get(&0), Some(&7.0));
        assert_eq!(resolution.totals.get(&1), Some(&2.0));
        assert_eq!(resolution.totals.get(&2), Some(&1.0));
        assert_eq!(resolution.totals.get(&3), Some(&1.0));
    }

    #[test]
    fn totals_match_tree_node_sums() {
        fn sum_rates(node: &TreeNode, id: MaterialId) -> f64 {
            let own = if node.material_id == id { node.rate } else { 0.0 };
            own + node.children.iter().map(|c| sum_rates(c, id)).sum::<f64>()
        }

        let catalog = diamond_catalog();
        let resolution = resolve(&catalog, 3, 4.0, &TierModifiers::default()).unwrap();

        for (&id, &total) in &resolution.totals {
            assert_eq!(total, sum_rates(&resolution.tree, id));
        }
    }

    #[test]
    fn totals_scale_linearly_with_rate() {
        let catalog = diamond_catalog();
        let tiers = TierModifiers::default();
        let single = resolve(&catalog, 3, 2.0, &tiers).unwrap();
        let double = resolve(&catalog, 3, 4.0, &tiers).unwrap();

        assert_eq!(single.totals.len(), double.totals.len());
        for (&id, &total) in &single.totals {
            assert_eq!(double.totals.get(&id), Some(&(2.0 * total)));
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        let catalog = diamond_catalog();
        let tiers = TierModifiers::default();
        let first = resolve(&catalog, 3, 9.0, &tiers).unwrap();
        let second = resolve(&catalog, 3, 9.0, &tiers).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_rate_yields_degenerate_tree() {
        let catalog = diamond_catalog();
        let resolution = resolve(&catalog, 3, 0.0, &TierModifiers::default()).unwrap();

        assert_eq!(resolution.tree.rate, 0.0);
        assert_eq!(resolution.tree.producer_count, 0);
        // Structure is still the full chain, just at zero throughput.
        assert_eq!(resolution.tree.children.len(), 2);
        assert_eq!(resolution.totals.get(&0), Some(&0.0));
    }

    #[test]
    fn children_preserve_recipe_order() {
        let catalog = diamond_catalog();
        let resolution = resolve(&catalog, 3, 1.0, &TierModifiers::default()).unwrap();
        let order: Vec<MaterialId> = resolution
            .tree
            .children
            .iter()
            .map(|c| c.material_id)
            .collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn unknown_material_rejected() {
        let catalog = diamond_catalog();
        let result = resolve(&catalog, 99, 1.0, &TierModifiers::default());
        assert!(matches!(result, Err(CalcError::UnknownMaterial(99))));
    }

    #[test]
    fn negative_rate_rejected() {
        let catalog = diamond_catalog();
        let result = resolve(&catalog, 3, -1.0, &TierModifiers::default());
        assert!(matches!(result, Err(CalcError::InvalidRate(_))));
    }

    #[test]
    fn zero_modifier_fails_before_traversal() {
        let catalog = diamond_catalog();
        let mut tiers = TierModifiers::default();
        tiers.set(ProducerKind::Extractor, 0.0);
        let result = resolve(&catalog, 3, 1.0, &tiers);
        assert!(matches!(result, Err(CalcError::InvalidModifier { .. })));
    }

    #[test]
    fn reverse_mode_finds_the_bottleneck() {
        // Probe totals per Widget: Bauxite 3, Quartz 5. With supplies
        // 30 and 40 the ratios are 10 and 8; Quartz limits at rate 8.
        let catalog = reverse_catalog();
        let outcome =
            solve_achievable_rate(&catalog, 2, &[30.0, 40.0, 0.0], &TierModifiers::default())
                .unwrap();

        assert_eq!(outcome.rate, 8.0);
        assert_eq!(outcome.limiting, 1);
        // The final chain never overstates the limiting supply.
        assert_eq!(outcome.resolution.totals.get(&1), Some(&40.0));
        assert_eq!(outcome.resolution.tree.rate, 8.0);
    }

    #[test]
    fn achievable_rate_floors_never_rounds_up() {
        // Quartz ratio 39.995 / 5 = 7.999: reported as 7.99, not 8.
        let catalog = reverse_catalog();
        let outcome =
            solve_achievable_rate(&catalog, 2, &[1000.0, 39.995, 0.0], &TierModifiers::default())
                .unwrap();
        assert_eq!(outcome.rate, 7.99);
        assert_eq!(outcome.limiting, 1);
    }

    #[test]
    fn unrequired_raw_material_is_never_limiting() {
        // Gravel has zero supply but the Widget chain never touches it.
        let catalog = reverse_catalog();
        let outcome =
            solve_achievable_rate(&catalog, 2, &[30.0, 40.0, 0.0], &TierModifiers::default())
                .unwrap();
        assert_ne!(outcome.limiting, 3);
    }

    #[test]
    fn tie_goes_to_first_raw_material() {
        // Supplies 24 and 40 make both ratios 8; Bauxite wins by order.
        let catalog = reverse_catalog();
        let outcome =
            solve_achievable_rate(&catalog, 2, &[24.0, 40.0, 0.0], &TierModifiers::default())
                .unwrap();
        assert_eq!(outcome.rate, 8.0);
        assert_eq!(outcome.limiting, 0);
    }

    #[test]
    fn extractor_tier_raises_achievable_rate() {
        let catalog = reverse_catalog();
        let mut tiers = TierModifiers::default();
        tiers.set(ProducerKind::Extractor, 2.0);
        let outcome = solve_achievable_rate(&catalog, 2, &[30.0, 40.0, 0.0], &tiers).unwrap();
        assert_eq!(outcome.rate, 16.0);
        assert_eq!(outcome.limiting, 1);
    }

    #[test]
    fn raw_target_limits_on_itself() {
        let catalog = reverse_catalog();
        let outcome =
            solve_achievable_rate(&catalog, 0, &[4.0, 0.0, 0.0], &TierModifiers::default())
                .unwrap();
        assert_eq!(outcome.limiting, 0);
        assert_eq!(outcome.rate, 4.0);
    }

    #[test]
    fn negative_supply_rejected() {
        let catalog = reverse_catalog();
        let result =
            solve_achievable_rate(&catalog, 2, &[30.0, -1.0, 0.0], &TierModifiers::default());
        assert!(matches!(result, Err(CalcError::InvalidSupply(_))));
    }

    #[test]
    fn wrong_length_supply_rejected() {
        let catalog = reverse_catalog();
        let result = solve_achievable_rate(&catalog, 2, &[30.0, 40.0], &TierModifiers::default());
        assert!(matches!(result, Err(CalcError::InvalidSupply(_))));
    }

    #[test]
    fn summary_aggregates_producers_and_totals() {
        let catalog = diamond_catalog();
        let resolution = resolve(&catalog, 3, 5.0, &TierModifiers::default()).unwrap();
        let summary = summarize_chain(&catalog, &resolution);

        assert_eq!(summary.target, "Gadget");
        assert_eq!(summary.rate, 5.0);
        // Ore appears on both diamond paths; one extractor entry sums both.
        let extractors = summary
            .producer_counts
            .iter()
            .find(|(kind, _)| *kind == "Extractor")
            .map(|&(_, count)| count);
        // Plate path: 20 ore -> 3 extractors; gear path: 15 ore -> 2.
        assert_eq!(extractors, Some(5));
        assert_eq!(summary.material_totals.len(), 4);
    }

    #[test]
    fn format_tree_indents_children() {
        let catalog = diamond_catalog();
        let resolution = resolve(&catalog, 1, 10.0, &TierModifiers::default()).unwrap();
        let text = format_tree(&catalog, &resolution.tree, 0);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Plate @ 10.00/min"));
        assert!(lines[1].starts_with("  Ore @ 20.00/min"));
    }
}
