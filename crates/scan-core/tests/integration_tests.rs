//! Integration tests for the scan engine.
//!
//! These drive the full pipeline over fixture worlds: filtering, the
//! policy chain, governor state, mortality timing, and theft batching,
//! with a recording host standing in for the game.

use std::sync::Arc;
use std::time::{Duration, Instant};

use scan_core::stubs::{
    OwnerTagLegality, RecordingHost, TableClassifier, TableCollections, TablePolicies,
};
use scan_core::{
    CategoryPolicy, Classification, CollectionAction, CollectionMembership, DecisionEngine,
    HighlightReason, HostEvent, LootingMode, ScanConfig, ScanEngine, TheftResolution,
};
use world_model::{fixtures, LockLevel, ObjectCategory, RefHandle, TargetClass};

fn item_class(category: ObjectCategory, value: u32, weight: f32) -> Classification {
    Classification {
        class: TargetClass::LooseItem,
        category,
        value,
        weight,
        enchanted: false,
        quest_item: false,
    }
}

fn container_class() -> Classification {
    Classification {
        class: TargetClass::Container,
        category: ObjectCategory::Container,
        value: 0,
        weight: 0.0,
        enchanted: false,
        quest_item: false,
    }
}

fn build_engine(
    classifier: TableClassifier,
    policies: TablePolicies,
    collections: TableCollections,
    config: ScanConfig,
) -> (ScanEngine, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::new());
    let decision = DecisionEngine::new(
        Arc::new(classifier),
        Arc::new(policies),
        Arc::new(collections),
        Arc::new(OwnerTagLegality::default()),
        host.clone(),
    );
    (ScanEngine::new(config, host.clone(), decision), host)
}

/// An object is never taken twice, no matter how many cycles observe it.
#[test]
fn test_no_double_loot_across_cycles() {
    let classifier = TableClassifier::new().with(100, item_class(ObjectCategory::Clutter, 5, 1.0));
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 20.0));

    let start = Instant::now();
    for cycle in 0..5 {
        engine.run_cycle(&world, start + Duration::from_secs(cycle));
        engine.on_event(
            HostEvent::HarvestCompleted(RefHandle::stable(1)),
            start + Duration::from_secs(cycle),
        );
    }
    assert_eq!(host.harvest_count(), 1);
}

/// A blocked object in a notice-enabled category tells the player once,
/// then stays excluded and silent for the rest of the session.
#[test]
fn test_block_notice_fires_once_then_excluded() {
    let classifier = TableClassifier::new().with(100, item_class(ObjectCategory::Clutter, 5, 1.0));
    let policies = TablePolicies::new().with_policy(
        ObjectCategory::Clutter,
        CategoryPolicy {
            mode: LootingMode::Disabled,
            notice_on_block: true,
            ..CategoryPolicy::default()
        },
    );
    let (mut engine, host) = build_engine(
        classifier,
        policies,
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 20.0));

    let start = Instant::now();
    let first = engine.run_cycle(&world, start);
    assert_eq!(first.blocked, 1);
    assert_eq!(host.notices().len(), 1);

    for cycle in 1..5u64 {
        let report = engine.run_cycle(&world, start + Duration::from_secs(cycle));
        assert_eq!(report.blocked, 0);
    }
    assert_eq!(host.notices().len(), 1);
    assert_eq!(host.harvest_count(), 0);
}

/// The candidate list is bounded and nearest-first; overflow drops the
/// farthest items.
#[test]
fn test_candidate_list_bounded_and_ordered() {
    let mut classifier = TableClassifier::new();
    for template in 0..40u32 {
        classifier = classifier.with(1000 + template, item_class(ObjectCategory::Clutter, 5, 1.0));
    }
    let mut config = ScanConfig::default();
    config.scan.max_candidates = 8;
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        config,
    );

    let mut world = fixtures::single_room();
    for i in 0..40u32 {
        // Farther with each id, all inside the radius
        fixtures::place(
            &mut world,
            fixtures::loose_item(i + 1, 1000 + i, 10.0 + i as f32 * 4.0),
        );
    }

    let report = engine.run_cycle(&world, Instant::now());
    assert_eq!(report.candidates, 8);
    assert_eq!(host.harvest_count(), 8);

    // The eight nearest ids were the ones taken
    let harvested: Vec<u32> = host
        .calls()
        .iter()
        .filter_map(|call| match call {
            scan_core::stubs::HostCall::Harvest { handle, .. } => Some(handle.id.0),
            _ => None,
        })
        .collect();
    assert_eq!(harvested, (1..=8).collect::<Vec<u32>>());
}

/// A locked door inside the radius shrinks the effective scan range.
#[test]
fn test_locked_door_shrinks_reach() {
    let classifier = TableClassifier::new()
        .with(100, item_class(ObjectCategory::Clutter, 5, 1.0))
        .with(500, container_class());
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    // Door at 100 with tolerance 40 caps reach at 60
    fixtures::place(&mut world, fixtures::door(9, 900, 100.0, LockLevel::Adept));
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 50.0));
    fixtures::place(&mut world, fixtures::loose_item(2, 100, 80.0));

    engine.run_cycle(&world, Instant::now());
    assert_eq!(host.harvest_count(), 1, "only the item inside the shrunk radius");
}

/// An unlocked door just past the radius relaxes it so loot behind the
/// door is still reachable.
#[test]
fn test_unlocked_door_relaxes_reach() {
    let classifier = TableClassifier::new().with(100, item_class(ObjectCategory::Clutter, 5, 1.0));
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    // Radius 180, door at 190: reach extends to 230
    fixtures::place(&mut world, fixtures::door(9, 900, 190.0, LockLevel::Unlocked));
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 210.0));

    engine.run_cycle(&world, Instant::now());
    assert_eq!(host.harvest_count(), 1);
}

/// Highlight precedence: a quest flag outranks a value-based reason on
/// the same object.
#[test]
fn test_highlight_precedence_quest_over_valuable() {
    let mut quest_class = item_class(ObjectCategory::Jewelry, 500, 0.1);
    quest_class.quest_item = true;
    let classifier = TableClassifier::new().with(100, quest_class);
    let policies = TablePolicies::new().with_default(CategoryPolicy {
        value_weight_threshold: 10.0,
        ..CategoryPolicy::default()
    });
    let (mut engine, host) = build_engine(
        classifier,
        policies,
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 20.0));

    engine.run_cycle(&world, Instant::now());
    assert_eq!(host.harvest_count(), 0, "quest targets are never auto-taken");
    assert_eq!(host.highlight_reasons(), vec![HighlightReason::Quest]);
}

/// Corpses stay invisible for the wait window and are looted exactly
/// once after it elapses.
#[test]
fn test_corpse_released_after_wait() {
    let classifier = TableClassifier::new()
        .with(
            100,
            Classification {
                class: TargetClass::Corpse,
                category: ObjectCategory::Corpse,
                value: 0,
                weight: 0.0,
                enchanted: false,
                quest_item: false,
            },
        )
        .with(102, item_class(ObjectCategory::Clutter, 3, 1.0));
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    let body = fixtures::corpse(&mut world, 5, 100, 30.0)
        .with_inventory(vec![world_model::InventoryEntry::new(
            world_model::TemplateId(102),
            1,
        )]);
    fixtures::place(&mut world, body);

    // The kill has to be witnessed: one scan with the actor alive first
    let death = Instant::now();
    world.actor_mut(world_model::RefId(5)).unwrap().dead = false;
    engine.run_cycle(&world, death - Duration::from_secs(1));
    world.actor_mut(world_model::RefId(5)).unwrap().dead = true;
    engine.on_event(HostEvent::ActorDied(RefHandle::stable(5)), death);

    // Exactly at the boundary: not yet due
    let report = engine.run_cycle(&world, death + Duration::from_millis(2000));
    assert_eq!(report.candidates, 0);

    let report = engine.run_cycle(&world, death + Duration::from_millis(2001));
    assert_eq!(report.corpses_released, 1);
    assert_eq!(report.looted, 1);
    assert_eq!(host.transfer_count(), 1, "corpse emptied via transfer");
}

/// At most one theft batch is ever in flight; everything proposed while
/// it waits is retried later.
#[test]
fn test_theft_single_batch_in_flight() {
    let classifier = TableClassifier::new()
        .with(100, item_class(ObjectCategory::Jewelry, 100, 0.2))
        .with(101, item_class(ObjectCategory::Weapon, 60, 5.0));
    let mut config = ScanConfig::default();
    config.policy.steal_if_undetected = true;
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        config,
    );

    let mut world = fixtures::single_room();
    fixtures::place(
        &mut world,
        fixtures::loose_item(1, 100, 20.0).with_owner("merchant"),
    );
    fixtures::place(
        &mut world,
        fixtures::loose_item(2, 101, 30.0).with_owner("merchant"),
    );

    let start = Instant::now();
    let report = engine.run_cycle(&world, start);
    assert!(report.theft_dispatched);
    assert_eq!(host.detection_count(), 1, "both claims ride one check");

    // Batch still unresolved: no new checks, no harvests
    engine.run_cycle(&world, start + Duration::from_secs(1));
    assert_eq!(host.detection_count(), 1);
    assert_eq!(host.harvest_count(), 0);

    // Undetected: the whole batch commits
    host.resolve_detection(false);
    let report = engine.run_cycle(&world, start + Duration::from_secs(2));
    assert_eq!(report.theft_resolution, Some(TheftResolution::Committed(2)));
    assert_eq!(host.harvest_count(), 2);
}

/// A detected batch is discarded and its objects are excluded for the
/// rest of the session.
#[test]
fn test_detected_theft_never_retried() {
    let classifier = TableClassifier::new().with(100, item_class(ObjectCategory::Jewelry, 100, 0.2));
    let mut config = ScanConfig::default();
    config.policy.steal_if_undetected = true;
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        config,
    );

    let mut world = fixtures::single_room();
    fixtures::place(
        &mut world,
        fixtures::loose_item(1, 100, 20.0).with_owner("merchant"),
    );

    let start = Instant::now();
    engine.run_cycle(&world, start);
    host.resolve_detection(true);

    let report = engine.run_cycle(&world, start + Duration::from_secs(1));
    assert_eq!(report.theft_resolution, Some(TheftResolution::Discarded(1)));

    for cycle in 2..6 {
        let report = engine.run_cycle(&world, start + Duration::from_secs(cycle));
        assert!(!report.theft_dispatched);
    }
    assert_eq!(host.harvest_count(), 0);
    assert_eq!(host.detection_count(), 1);
}

/// A collection-flagged template is taken silently even when its value
/// falls below the category threshold.
#[test]
fn test_collection_membership_overrides_value_floor() {
    let classifier = TableClassifier::new().with(100, item_class(ObjectCategory::Clutter, 1, 5.0));
    let policies = TablePolicies::new().with_default(CategoryPolicy {
        mode: LootingMode::LootNotify,
        value_weight_threshold: 10.0,
        ..CategoryPolicy::default()
    });
    let collections = TableCollections::new().with_member(
        100,
        CollectionMembership {
            action: CollectionAction::Collect,
            permit_owned: false,
        },
    );
    let (mut engine, host) = build_engine(classifier, policies, collections, ScanConfig::default());

    let mut world = fixtures::single_room();
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 20.0));

    engine.run_cycle(&world, Instant::now());
    assert_eq!(host.silent_harvest_count(), 1, "collection takes are silent");
    assert!(host.notices().is_empty());
}

/// Containers are emptied end to end: valuable stacks produce a notice,
/// ordinary stacks do not, and a failed transfer still marks the
/// container handled.
#[test]
fn test_container_end_to_end() {
    let classifier = TableClassifier::new()
        .with(300, container_class())
        .with(101, item_class(ObjectCategory::Jewelry, 200, 0.2))
        .with(102, item_class(ObjectCategory::Clutter, 2, 1.0));
    let policies = TablePolicies::new().with_policy(
        ObjectCategory::Jewelry,
        CategoryPolicy {
            mode: LootingMode::LootNotify,
            ..CategoryPolicy::default()
        },
    );
    let (mut engine, host) = build_engine(
        classifier,
        policies,
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    fixtures::place(
        &mut world,
        fixtures::container(1, 300, 25.0, vec![(101, 1), (102, 5)]),
    );

    let start = Instant::now();
    engine.run_cycle(&world, start);
    assert_eq!(host.transfer_count(), 1);
    assert_eq!(host.notices().len(), 1);

    // Second look at the same chest does nothing
    engine.on_event(HostEvent::HarvestCompleted(RefHandle::stable(1)), start);
    engine.run_cycle(&world, start + Duration::from_secs(1));
    assert_eq!(host.transfer_count(), 1);
}

#[test]
fn test_failed_transfer_still_marks_container_handled() {
    let classifier = TableClassifier::new()
        .with(300, container_class())
        .with(102, item_class(ObjectCategory::Clutter, 2, 1.0));
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        ScanConfig::default(),
    );
    host.fail_transfers();

    let mut world = fixtures::single_room();
    fixtures::place(&mut world, fixtures::container(1, 300, 25.0, vec![(102, 2)]));

    let start = Instant::now();
    engine.run_cycle(&world, start);
    engine.on_event(HostEvent::HarvestCompleted(RefHandle::stable(1)), start);
    engine.run_cycle(&world, start + Duration::from_secs(1));
    assert_eq!(host.transfer_count(), 1, "never re-attempted after fallback");
}

/// A world reload wipes looted memory; a cell change does not.
#[test]
fn test_reset_scopes() {
    let classifier = TableClassifier::new().with(100, item_class(ObjectCategory::Clutter, 5, 1.0));
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 20.0));

    let start = Instant::now();
    engine.run_cycle(&world, start);
    engine.on_event(HostEvent::HarvestCompleted(RefHandle::stable(1)), start);
    assert_eq!(host.harvest_count(), 1);

    engine.on_event(HostEvent::CellChanged, start);
    engine.run_cycle(&world, start + Duration::from_secs(1));
    assert_eq!(host.harvest_count(), 1, "stable looted memory survives a cell change");

    engine.on_event(HostEvent::WorldReloaded, start);
    engine.run_cycle(&world, start + Duration::from_secs(2));
    assert_eq!(host.harvest_count(), 2, "reload starts the session over");
}

/// Density suppression defers ordinary loot in crowded cells but leaves
/// exempt categories alone.
#[test]
fn test_density_suppression_in_crowded_cell() {
    let classifier = TableClassifier::new()
        .with(100, item_class(ObjectCategory::Clutter, 5, 1.0))
        .with(101, item_class(ObjectCategory::Ammo, 1, 0.0));
    let (mut engine, host) = build_engine(
        classifier,
        TablePolicies::new(),
        TableCollections::new(),
        ScanConfig::default(),
    );

    let mut world = fixtures::single_room();
    world
        .cell_mut(fixtures::ROOM)
        .unwrap()
        .population = 15;
    fixtures::place(&mut world, fixtures::loose_item(1, 100, 20.0));
    fixtures::place(&mut world, fixtures::loose_item(2, 101, 25.0));

    let report = engine.run_cycle(&world, Instant::now());
    assert_eq!(host.harvest_count(), 1, "only the ammo is taken");
    assert_eq!(report.deferred, 1, "the clutter waits for the crowd to thin");
}
