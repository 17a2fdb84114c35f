//! Eligibility Decision Engine.
//!
//! Synchronous per-candidate policy chain with no internal suspension:
//! resolve the effective target, accumulate flags, check legality and
//! density, collapse to one verdict, and finalize. The two escapes from
//! the synchronous path are producer resolution (requested out-of-band,
//! retried next cycle) and theft, which hands the claim to the
//! coordinator and returns a pending verdict.

use std::sync::Arc;
use std::time::Instant;

use world_model::{FormKind, InventoryEntry, RefHandle, TargetClass, TemplateId, WorldRef};

use crate::config::ScanConfig;
use crate::filter::Candidate;
use crate::flags::{combine, evaluate_flags, ItemFacts, LootFlags};
use crate::governor::ScanGovernor;
use crate::ports::{Classification, Classifier, Collections, HostOps, Legality, LegalityOracle, PolicyLookup};
use crate::theft::{ClaimKind, TheftClaim, TheftCoordinator};
use crate::verdict::{Action, HighlightReason, Verdict};

/// Per-item outcome inside a container or corpse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemOutcome {
    pub template: TemplateId,
    pub verdict: Verdict,
}

/// The outcome of evaluating one candidate.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub handle: RefHandle,
    pub verdict: Verdict,
    /// Strongest highlight reason issued for this candidate, if any
    pub reason: Option<HighlightReason>,
    /// Contained-item verdicts for containers and corpses
    pub items: Vec<ItemOutcome>,
}

impl Evaluation {
    fn plain(handle: RefHandle, verdict: Verdict) -> Self {
        Self {
            handle,
            verdict,
            reason: None,
            items: Vec::new(),
        }
    }

    fn glowing(handle: RefHandle, verdict: Verdict, reason: HighlightReason) -> Self {
        Self {
            handle,
            verdict,
            reason: Some(reason),
            items: Vec::new(),
        }
    }
}

/// Evaluates candidates against the layered policy chain.
pub struct DecisionEngine {
    classifier: Arc<dyn Classifier>,
    policies: Arc<dyn PolicyLookup>,
    collections: Arc<dyn Collections>,
    legality: Arc<dyn LegalityOracle>,
    host: Arc<dyn HostOps>,
}

impl DecisionEngine {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        policies: Arc<dyn PolicyLookup>,
        collections: Arc<dyn Collections>,
        legality: Arc<dyn LegalityOracle>,
        host: Arc<dyn HostOps>,
    ) -> Self {
        Self {
            classifier,
            policies,
            collections,
            legality,
            host,
        }
    }

    /// Runs the full chain for one candidate.
    pub fn evaluate(
        &self,
        candidate: &Candidate<'_>,
        config: &ScanConfig,
        governor: &ScanGovernor,
        theft: &mut TheftCoordinator,
        now: Instant,
    ) -> Evaluation {
        let reference = candidate.reference;
        let handle = reference.handle;

        if governor.is_looted(handle) {
            return Evaluation::plain(handle, Verdict::AlreadyLooted);
        }
        if !governor.try_lock_harvest(handle) {
            return Evaluation::plain(handle, Verdict::HarvestLockHeld);
        }

        let Some(own_template) = reference.template else {
            // The filter already screens these; classified defensively here
            governor.exclude(handle);
            governor.unlock_harvest(handle);
            return Evaluation::plain(handle, Verdict::Malformed);
        };

        // A producer's harvestable is its secondary product; until the
        // host resolves it there is nothing to classify.
        let effective_template = if reference.kind == FormKind::Producer {
            match reference.extra.product {
                Some(product) => product,
                None => {
                    self.host.request_product_resolution(handle);
                    governor.unlock_harvest(handle);
                    return Evaluation::plain(handle, Verdict::ProducerPending);
                }
            }
        } else {
            own_template
        };

        let Some(classification) = self.classifier.classify(effective_template) else {
            tracing::debug!("no classification for {}, excluding {}", effective_template, handle);
            governor.exclude(handle);
            governor.unlock_harvest(handle);
            return Evaluation::plain(handle, Verdict::Unclassified);
        };

        let evaluation = match classification.class {
            TargetClass::LooseItem => self.evaluate_item(
                candidate,
                effective_template,
                classification,
                config,
                governor,
                theft,
                now,
            ),
            TargetClass::Container | TargetClass::Corpse => self.evaluate_container(
                candidate,
                classification,
                config,
                governor,
                theft,
                now,
            ),
        };

        self.finish(reference, &evaluation, config, governor);
        evaluation
    }

    /// Post-verdict bookkeeping shared by every path: blocks become
    /// permanent exclusions, and the policy-enabled subset surfaces one
    /// notice before going quiet for good.
    fn finish(
        &self,
        reference: &WorldRef,
        evaluation: &Evaluation,
        _config: &ScanConfig,
        governor: &ScanGovernor,
    ) {
        if evaluation.verdict.action() != Action::Block {
            return;
        }
        governor.exclude(evaluation.handle);
        if let Some(template) = reference.template {
            if let Some(classification) = self.classifier.classify(template) {
                let policy = self.policies.policy(classification.category);
                if policy.notice_on_block && evaluation.verdict != Verdict::AlreadyLooted {
                    self.host
                        .notify(&format!("left {} behind ({:?})", template, evaluation.verdict));
                }
            }
        }
        tracing::debug!("{} blocked: {:?}", evaluation.handle, evaluation.verdict);
    }

    fn facts_for(
        &self,
        template: TemplateId,
        classification: Classification,
        quest_flag: bool,
        legality: Legality,
        cell_population: u32,
        config: &ScanConfig,
    ) -> ItemFacts {
        ItemFacts {
            classification,
            policy: self.policies.policy(classification.category),
            quest_target: quest_flag || classification.quest_item,
            membership: self
                .collections
                .membership(template, config.policy.collection_scope),
            legality,
            cell_population,
            carried: self.policies.carried(classification.category),
        }
    }

    fn issue_glow(
        &self,
        handle: RefHandle,
        reason: Option<HighlightReason>,
        config: &ScanConfig,
        governor: &ScanGovernor,
        now: Instant,
    ) {
        if let Some(reason) = reason {
            governor.request_glow(self.host.as_ref(), handle, config.glow.duration(), reason, now);
        }
    }

    // --- Loose items ---

    fn evaluate_item(
        &self,
        candidate: &Candidate<'_>,
        template: TemplateId,
        classification: Classification,
        config: &ScanConfig,
        governor: &ScanGovernor,
        theft: &mut TheftCoordinator,
        now: Instant,
    ) -> Evaluation {
        let reference = candidate.reference;
        let handle = reference.handle;
        let legality = self.legality.appraise(reference);
        let facts = self.facts_for(
            template,
            classification,
            reference.extra.quest_target,
            legality,
            candidate.cell_population,
            config,
        );

        let step = evaluate_flags(&facts, config);
        let verdict = step
            .terminal
            .unwrap_or_else(|| combine(&step.flags, &facts, config));

        // Highlighting happens even when the verdict blocks looting
        self.issue_glow(handle, step.flags.reason, config, governor, now);

        let verdict = if verdict.is_loot() {
            self.finalize_loot(reference, classification, verdict, &step.flags, config, governor, theft)
        } else {
            governor.unlock_harvest(handle);
            verdict
        };

        Evaluation {
            handle,
            verdict,
            reason: step.flags.reason,
            items: Vec::new(),
        }
    }

    fn finalize_loot(
        &self,
        reference: &WorldRef,
        classification: Classification,
        verdict: Verdict,
        flags: &LootFlags,
        config: &ScanConfig,
        governor: &ScanGovernor,
        theft: &mut TheftCoordinator,
    ) -> Verdict {
        let handle = reference.handle;
        let count = reference.extra.count.max(1);

        if flags.illegal_if_detected {
            if !config.theft.enabled {
                governor.unlock_harvest(handle);
                return Verdict::CrimeToTake;
            }
            let accepted = theft.propose(TheftClaim {
                handle,
                kind: ClaimKind::Item {
                    category: classification.category,
                    count,
                },
            });
            if accepted {
                // The lock stays held until the batch resolves
                return Verdict::TheftPending;
            }
            governor.unlock_harvest(handle);
            return Verdict::TheftBatchBusy;
        }

        let silent = verdict.action() == Action::LootSilent;
        match self
            .host
            .request_harvest(handle, classification.category, count, silent)
        {
            Ok(()) => {
                governor.mark_looted(handle);
                if !silent {
                    self.host
                        .notify(&format!("took {} x{}", classification.category_label(), count));
                }
                // The lock is released when the host reports completion
                verdict
            }
            Err(e) => {
                tracing::warn!("harvest request for {} failed: {}", handle, e);
                governor.unlock_harvest(handle);
                verdict
            }
        }
    }

    /// A container-level gate tripped: every contained item inherits the
    /// veto in its outcome.
    fn vetoed(reference: &WorldRef, verdict: Verdict) -> Evaluation {
        Evaluation {
            handle: reference.handle,
            verdict,
            reason: None,
            items: reference
                .extra
                .inventory
                .iter()
                .map(|entry| ItemOutcome {
                    template: entry.template,
                    verdict: Verdict::ContainerVetoed,
                })
                .collect(),
        }
    }

    // --- Containers and corpses ---

    fn evaluate_container(
        &self,
        candidate: &Candidate<'_>,
        classification: Classification,
        config: &ScanConfig,
        governor: &ScanGovernor,
        theft: &mut TheftCoordinator,
        now: Instant,
    ) -> Evaluation {
        let reference = candidate.reference;
        let handle = reference.handle;

        // Container-level gates, most specific first
        if reference.is_locked() {
            governor.remember_locked(handle);
            governor.unlock_harvest(handle);
            self.issue_glow(handle, Some(HighlightReason::LockedContainer), config, governor, now);
            return Evaluation::glowing(handle, Verdict::LockedContainer, HighlightReason::LockedContainer);
        }
        if governor.was_locked(handle) && !config.policy.loot_previously_locked {
            governor.unlock_harvest(handle);
            self.issue_glow(handle, Some(HighlightReason::LockedContainer), config, governor, now);
            return Evaluation::glowing(handle, Verdict::PreviouslyLocked, HighlightReason::LockedContainer);
        }
        if reference.extra.boss && !config.policy.loot_boss_containers {
            governor.unlock_harvest(handle);
            self.issue_glow(handle, Some(HighlightReason::BossContainer), config, governor, now);
            return Evaluation::glowing(handle, Verdict::BossContainer, HighlightReason::BossContainer);
        }
        if reference.extra.quest_target && !config.policy.loot_quest_targets {
            governor.unlock_harvest(handle);
            self.issue_glow(handle, Some(HighlightReason::Quest), config, governor, now);
            return Evaluation::glowing(handle, Verdict::QuestTarget, HighlightReason::Quest);
        }

        let legality = self.legality.appraise(reference);
        let mut steal_contents = false;
        if config.policy.crime_check && legality.crime_to_take {
            if config.policy.steal_if_undetected && config.theft.enabled {
                steal_contents = true;
            } else {
                governor.unlock_harvest(handle);
                return Self::vetoed(reference, Verdict::CrimeToTake);
            }
        }

        if config.density.enabled
            && candidate.cell_population >= config.density.population_threshold
            && !classification.category.is_density_exempt()
        {
            governor.unlock_harvest(handle);
            return Self::vetoed(reference, Verdict::DensityRestricted);
        }

        // Per-item pass: the container's legality and density results veto
        // every contained item; flags otherwise accumulate as for loose items.
        let mut items = Vec::new();
        let mut transfer = Vec::new();
        let mut notices = Vec::new();
        let mut container_reason: Option<HighlightReason> = None;
        let mut deferral: Option<Verdict> = None;

        for entry in &reference.extra.inventory {
            let Some(item_class) = self.classifier.classify(entry.template) else {
                items.push(ItemOutcome {
                    template: entry.template,
                    verdict: Verdict::Unclassified,
                });
                continue;
            };
            let facts = self.facts_for(
                entry.template,
                item_class,
                false,
                legality,
                candidate.cell_population,
                config,
            );
            let step = evaluate_flags(&facts, config);
            if let Some(reason) = step.flags.reason {
                container_reason = HighlightReason::merge(container_reason, reason);
            }
            let verdict = step
                .terminal
                .unwrap_or_else(|| combine(&step.flags, &facts, config));
            items.push(ItemOutcome {
                template: entry.template,
                verdict,
            });
            match verdict.action() {
                Action::LootSilent => transfer.push(*entry),
                Action::LootNotify => {
                    transfer.push(*entry);
                    notices.push(format!("took {} x{}", item_class.category_label(), entry.count));
                }
                Action::Defer => {
                    deferral.get_or_insert(verdict);
                }
                Action::GlowOnly | Action::Block => {}
            }
        }

        self.issue_glow(handle, container_reason, config, governor, now);

        if transfer.is_empty() {
            if let Some(verdict) = deferral {
                governor.unlock_harvest(handle);
                return Evaluation {
                    handle,
                    verdict,
                    reason: container_reason,
                    items,
                };
            }
            // Nothing worth taking and nothing pending: processed for good
            governor.mark_looted(handle);
            governor.unlock_harvest(handle);
            return Evaluation {
                handle,
                verdict: Verdict::HarvestSilent,
                reason: container_reason,
                items,
            };
        }

        if steal_contents {
            let accepted = theft.propose(TheftClaim {
                handle,
                kind: ClaimKind::Container { items: transfer },
            });
            let verdict = if accepted {
                Verdict::TheftPending
            } else {
                governor.unlock_harvest(handle);
                Verdict::TheftBatchBusy
            };
            return Evaluation {
                handle,
                verdict,
                reason: container_reason,
                items,
            };
        }

        let verdict = self.transfer_contents(handle, &transfer, &notices, governor);
        Evaluation {
            handle,
            verdict,
            reason: container_reason,
            items,
        }
    }

    fn transfer_contents(
        &self,
        handle: RefHandle,
        transfer: &[InventoryEntry],
        notices: &[String],
        governor: &ScanGovernor,
    ) -> Verdict {
        if let Err(e) = self.host.request_container_transfer(handle, transfer) {
            // Copy-fallback path: the container still counts as handled so
            // a flaky transfer can never cause a re-loot.
            tracing::warn!("transfer from {} failed, falling back to copy: {}", handle, e);
        }
        governor.mark_looted(handle);
        governor.unlock_harvest(handle);
        for notice in notices {
            self.host.notify(notice);
        }
        if notices.is_empty() {
            Verdict::HarvestSilent
        } else {
            Verdict::HarvestWithNotice
        }
    }
}

impl Classification {
    /// Short label for user-facing notices.
    pub fn category_label(&self) -> String {
        format!("{:?}", self.category).to_lowercase()
    }
}
