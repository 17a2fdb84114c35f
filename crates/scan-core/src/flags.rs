//! Pure flag accumulation for the per-candidate policy chain.
//!
//! Each step takes the facts and the flags accumulated so far and returns
//! updated flags or a terminal verdict. Steps are threaded functionally;
//! once a step is terminal, later steps do not run. Nothing here touches
//! the governor or the host, which keeps every policy combination
//! directly testable.

use crate::config::ScanConfig;
use crate::ports::{
    CategoryPolicy, Classification, CollectionAction, CollectionMembership, Legality, LootingMode,
};
use crate::verdict::{HighlightReason, Verdict};

/// Everything the chain needs to know about one evaluated object.
#[derive(Debug, Clone, Copy)]
pub struct ItemFacts {
    pub classification: Classification,
    pub policy: CategoryPolicy,
    pub quest_target: bool,
    pub membership: Option<CollectionMembership>,
    pub legality: Legality,
    /// Population of the cell the object sits in
    pub cell_population: u32,
    /// How many of this category the player already carries
    pub carried: u32,
}

/// Independent flags accumulated over the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LootFlags {
    pub quest: bool,
    pub collectible: Option<CollectionAction>,
    pub valuable: bool,
    pub enchanted: bool,
    /// Value per weight fell short of the category floor
    pub below_value_floor: bool,
    /// Taking it is a crime, but an override authorizes attempting it
    pub illegal_if_detected: bool,
    /// Strongest highlight reason observed so far
    pub reason: Option<HighlightReason>,
}

/// Result of one step: updated flags, or a terminal verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagStep {
    pub flags: LootFlags,
    pub terminal: Option<Verdict>,
}

impl FlagStep {
    /// Runs the next step unless a terminal verdict is already set.
    fn then(
        self,
        facts: &ItemFacts,
        config: &ScanConfig,
        step: fn(&ItemFacts, &ScanConfig, LootFlags) -> FlagStep,
    ) -> FlagStep {
        if self.terminal.is_some() {
            self
        } else {
            step(facts, config, self.flags)
        }
    }

    fn flags(flags: LootFlags) -> Self {
        Self {
            flags,
            terminal: None,
        }
    }

    fn terminal(flags: LootFlags, verdict: Verdict) -> Self {
        Self {
            flags,
            terminal: Some(verdict),
        }
    }
}

/// Runs the whole chain for one object.
pub fn evaluate_flags(facts: &ItemFacts, config: &ScanConfig) -> FlagStep {
    FlagStep::default()
        .then(facts, config, note_type_exclusion)
        .then(facts, config, note_quest)
        .then(facts, config, note_collectible)
        .then(facts, config, note_value)
        .then(facts, config, note_enchantment)
        .then(facts, config, check_legality)
        .then(facts, config, check_density)
        .then(facts, config, check_excess)
}

fn note_type_exclusion(facts: &ItemFacts, _config: &ScanConfig, flags: LootFlags) -> FlagStep {
    if facts.policy.mode == LootingMode::Disabled {
        FlagStep::terminal(flags, Verdict::TypeExcluded)
    } else {
        FlagStep::flags(flags)
    }
}

fn note_quest(facts: &ItemFacts, _config: &ScanConfig, mut flags: LootFlags) -> FlagStep {
    if facts.quest_target {
        flags.quest = true;
        flags.reason = HighlightReason::merge(flags.reason, HighlightReason::Quest);
    }
    FlagStep::flags(flags)
}

fn note_collectible(facts: &ItemFacts, _config: &ScanConfig, mut flags: LootFlags) -> FlagStep {
    if let Some(membership) = facts.membership {
        flags.collectible = Some(membership.action);
        flags.reason = HighlightReason::merge(flags.reason, HighlightReason::Collectible);
    }
    FlagStep::flags(flags)
}

fn note_value(facts: &ItemFacts, _config: &ScanConfig, mut flags: LootFlags) -> FlagStep {
    let threshold = facts.policy.value_weight_threshold;
    if threshold <= 0.0 {
        return FlagStep::flags(flags);
    }
    if facts.classification.value_per_weight() >= threshold {
        flags.valuable = true;
        flags.reason = HighlightReason::merge(flags.reason, HighlightReason::Valuable);
    } else {
        // Not terminal here; later steps still note their highlights
        flags.below_value_floor = true;
    }
    FlagStep::flags(flags)
}

fn note_enchantment(facts: &ItemFacts, _config: &ScanConfig, mut flags: LootFlags) -> FlagStep {
    if facts.classification.enchanted {
        flags.enchanted = true;
        flags.reason = HighlightReason::merge(flags.reason, HighlightReason::Enchanted);
    }
    FlagStep::flags(flags)
}

fn check_legality(facts: &ItemFacts, config: &ScanConfig, mut flags: LootFlags) -> FlagStep {
    if !config.policy.crime_check {
        return FlagStep::flags(flags);
    }
    if facts.legality.player_owned {
        flags.reason = HighlightReason::merge(flags.reason, HighlightReason::PlayerOwned);
    }
    if !facts.legality.crime_to_take {
        return FlagStep::flags(flags);
    }
    let collection_override = facts
        .membership
        .map(|m| m.permit_owned && m.action == CollectionAction::Collect)
        .unwrap_or(false);
    if config.policy.steal_if_undetected || collection_override {
        flags.illegal_if_detected = true;
        FlagStep::flags(flags)
    } else {
        FlagStep::terminal(flags, Verdict::CrimeToTake)
    }
}

fn check_density(facts: &ItemFacts, config: &ScanConfig, flags: LootFlags) -> FlagStep {
    if !config.density.enabled || facts.cell_population < config.density.population_threshold {
        return FlagStep::flags(flags);
    }
    let category = facts.classification.category;
    if category.is_density_exempt() || category.is_harvestable_resource() {
        return FlagStep::flags(flags);
    }
    FlagStep::terminal(flags, Verdict::DensityRestricted)
}

fn check_excess(facts: &ItemFacts, _config: &ScanConfig, flags: LootFlags) -> FlagStep {
    match facts.policy.excess_limit {
        Some(limit) if facts.carried >= limit => {
            FlagStep::terminal(flags, Verdict::ExcessInventory)
        }
        _ => FlagStep::flags(flags),
    }
}

/// Collapses a non-terminal chain result into the final verdict.
///
/// Quest targets and collection actions take priority over the plain
/// per-category mode; collectible takes are always silent.
pub fn combine(flags: &LootFlags, facts: &ItemFacts, config: &ScanConfig) -> Verdict {
    if flags.quest && !config.policy.loot_quest_targets {
        return Verdict::QuestTarget;
    }
    match flags.collectible {
        Some(CollectionAction::Highlight) => return Verdict::GlowPolicy,
        Some(CollectionAction::Collect) => return Verdict::CollectibleForced,
        None => {}
    }
    // Collection membership above already overrode the value floor
    if flags.below_value_floor {
        return Verdict::ValueBelowThreshold;
    }
    match facts.policy.mode {
        LootingMode::Disabled => Verdict::TypeExcluded,
        LootingMode::Glow => Verdict::GlowPolicy,
        LootingMode::LootSilent => Verdict::HarvestSilent,
        LootingMode::LootNotify => Verdict::HarvestWithNotice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_model::{ObjectCategory, TargetClass};

    fn classification(value: u32, weight: f32) -> Classification {
        Classification {
            class: TargetClass::LooseItem,
            category: ObjectCategory::Clutter,
            value,
            weight,
            enchanted: false,
            quest_item: false,
        }
    }

    fn facts() -> ItemFacts {
        ItemFacts {
            classification: classification(10, 1.0),
            policy: CategoryPolicy::default(),
            quest_target: false,
            membership: None,
            legality: Legality::default(),
            cell_population: 0,
            carried: 0,
        }
    }

    fn config() -> ScanConfig {
        ScanConfig::default()
    }

    #[test]
    fn test_plain_item_loots_silently() {
        let facts = facts();
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
        assert_eq!(combine(&step.flags, &facts, &config()), Verdict::HarvestSilent);
        assert_eq!(step.flags.reason, None);
    }

    #[test]
    fn test_disabled_type_is_terminal() {
        let mut facts = facts();
        facts.policy.mode = LootingMode::Disabled;
        let step = evaluate_flags(&facts, &config());
        assert_eq!(step.terminal, Some(Verdict::TypeExcluded));
    }

    #[test]
    fn test_quest_flag_wins_over_valuable() {
        let mut facts = facts();
        facts.quest_target = true;
        facts.policy.value_weight_threshold = 5.0;
        facts.classification = classification(100, 1.0);
        let step = evaluate_flags(&facts, &config());
        assert!(step.flags.quest);
        assert!(step.flags.valuable);
        assert_eq!(step.flags.reason, Some(HighlightReason::Quest));
        assert_eq!(combine(&step.flags, &facts, &config()), Verdict::QuestTarget);
    }

    #[test]
    fn test_value_below_threshold_blocks() {
        let mut facts = facts();
        facts.policy.value_weight_threshold = 50.0;
        facts.classification = classification(10, 2.0);
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
        assert!(step.flags.below_value_floor);
        assert_eq!(
            combine(&step.flags, &facts, &config()),
            Verdict::ValueBelowThreshold
        );
    }

    #[test]
    fn test_below_floor_item_still_notes_later_highlights() {
        let mut facts = facts();
        facts.policy.value_weight_threshold = 50.0;
        facts.classification = classification(10, 2.0);
        facts.classification.enchanted = true;
        facts.legality.player_owned = true;
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
        assert!(step.flags.enchanted);
        assert_eq!(step.flags.reason, Some(HighlightReason::Enchanted));
        assert_eq!(
            combine(&step.flags, &facts, &config()),
            Verdict::ValueBelowThreshold
        );
    }

    #[test]
    fn test_weightless_item_always_clears_threshold() {
        let mut facts = facts();
        facts.policy.value_weight_threshold = 50.0;
        facts.classification = classification(1, 0.0);
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
        assert!(step.flags.valuable);
    }

    #[test]
    fn test_collectible_overrides_value_cutoff_and_forces_silence() {
        let mut facts = facts();
        facts.policy.mode = LootingMode::LootNotify;
        facts.policy.value_weight_threshold = 50.0;
        facts.membership = Some(CollectionMembership {
            action: CollectionAction::Collect,
            permit_owned: false,
        });
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
        assert_eq!(
            combine(&step.flags, &facts, &config()),
            Verdict::CollectibleForced
        );
    }

    #[test]
    fn test_crime_blocks_without_override() {
        let mut facts = facts();
        facts.legality.crime_to_take = true;
        let step = evaluate_flags(&facts, &config());
        assert_eq!(step.terminal, Some(Verdict::CrimeToTake));
    }

    #[test]
    fn test_owned_collectible_override_goes_to_theft() {
        let mut facts = facts();
        facts.legality.crime_to_take = true;
        facts.membership = Some(CollectionMembership {
            action: CollectionAction::Collect,
            permit_owned: true,
        });
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
        assert!(step.flags.illegal_if_detected);
    }

    #[test]
    fn test_steal_if_undetected_toggle() {
        let mut facts = facts();
        facts.legality.crime_to_take = true;
        let mut config = config();
        config.policy.steal_if_undetected = true;
        let step = evaluate_flags(&facts, &config);
        assert!(step.terminal.is_none());
        assert!(step.flags.illegal_if_detected);
    }

    #[test]
    fn test_density_suppression_and_exemptions() {
        let mut facts = facts();
        facts.cell_population = 20;
        let step = evaluate_flags(&facts, &config());
        assert_eq!(step.terminal, Some(Verdict::DensityRestricted));

        facts.classification.category = ObjectCategory::Ammo;
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none(), "ammo is density-exempt");

        facts.classification.category = ObjectCategory::Flora;
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none(), "harvestables bypass density");
    }

    #[test]
    fn test_excess_limit() {
        let mut facts = facts();
        facts.policy.excess_limit = Some(5);
        facts.carried = 5;
        let step = evaluate_flags(&facts, &config());
        assert_eq!(step.terminal, Some(Verdict::ExcessInventory));

        facts.carried = 4;
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
    }

    #[test]
    fn test_player_owned_sets_reason_without_blocking() {
        let mut facts = facts();
        facts.legality.player_owned = true;
        let step = evaluate_flags(&facts, &config());
        assert!(step.terminal.is_none());
        assert_eq!(step.flags.reason, Some(HighlightReason::PlayerOwned));
    }
}
