//! Auto-Scavenger Scan Demo
//!
//! Drives the scan engine against a generated world so the whole
//! pipeline can be watched from a terminal: candidate filtering, policy
//! verdicts, theft batches, and corpse timing, without a game host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::oneshot;

use scan_core::config::ScanConfig;
use scan_core::decide::DecisionEngine;
use scan_core::engine::{HostEvent, ScanEngine};
use scan_core::ports::{
    CategoryPolicy, Classification, Classifier, CollectionMembership, CollectionScope,
    Collections, HostError, HostOps, Legality, LegalityOracle, LootingMode, PolicyLookup,
};
use scan_core::verdict::HighlightReason;
use world_model::{
    Actor, Cell, CellId, FormKind, InventoryEntry, LockLevel, ObjectCategory, RefHandle,
    TargetClass, TemplateId, Vec3, WorldModel, WorldRef,
};

/// Command line arguments for the scan demo
#[derive(Parser, Debug)]
#[command(name = "scavenger_scan")]
#[command(about = "An always-on auto-loot scan engine demo")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of scan cycles to run
    #[arg(long, default_value_t = 20)]
    cycles: u64,

    /// Simulated time between cycles (milliseconds)
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Optional TOML config path
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Print the default configuration and exit
    #[arg(long)]
    print_default_config: bool,

    /// Emit each cycle report as a JSON line instead of the summary text
    #[arg(long)]
    json: bool,
}

/// Host that prints every requested operation and always reports theft
/// as undetected.
struct ConsoleHost {
    detections: Mutex<Vec<oneshot::Sender<bool>>>,
    quiet: bool,
}

impl ConsoleHost {
    fn new(quiet: bool) -> Self {
        Self {
            detections: Mutex::new(Vec::new()),
            quiet,
        }
    }

    /// Answers any queued detection checks. The demo has no guards, so
    /// every theft goes unseen.
    fn answer_detections(&self) {
        for sender in self.detections.lock().unwrap().drain(..) {
            let _ = sender.send(false);
        }
    }
}

impl HostOps for ConsoleHost {
    fn request_highlight(&self, handle: RefHandle, _duration: Duration, reason: HighlightReason) {
        if !self.quiet {
            println!("  glow    {} ({:?})", handle, reason);
        }
    }

    fn request_harvest(
        &self,
        handle: RefHandle,
        category: ObjectCategory,
        count: u32,
        silent: bool,
    ) -> Result<(), HostError> {
        if !self.quiet {
            let tag = if silent { "" } else { " [notice]" };
            println!("  harvest {} {:?} x{}{}", handle, category, count, tag);
        }
        Ok(())
    }

    fn request_container_transfer(
        &self,
        handle: RefHandle,
        items: &[InventoryEntry],
    ) -> Result<(), HostError> {
        if !self.quiet {
            println!("  empty   {} ({} stacks)", handle, items.len());
        }
        Ok(())
    }

    fn request_detection_check(&self, watchers: usize) -> oneshot::Receiver<bool> {
        if !self.quiet {
            println!("  theft?  checking against {} watchers", watchers);
        }
        let (sender, receiver) = oneshot::channel();
        self.detections.lock().unwrap().push(sender);
        receiver
    }

    fn request_product_resolution(&self, handle: RefHandle) {
        if !self.quiet {
            println!("  resolve {} (producer)", handle);
        }
    }

    fn notify(&self, message: &str) {
        if !self.quiet {
            println!("  notice  {}", message);
        }
    }
}

/// Classifier over the demo world's template tables.
struct DemoClassifier {
    table: HashMap<u32, Classification>,
}

impl Classifier for DemoClassifier {
    fn classify(&self, template: TemplateId) -> Option<Classification> {
        self.table.get(&template.0).copied()
    }
}

struct DemoPolicies;

impl PolicyLookup for DemoPolicies {
    fn policy(&self, category: ObjectCategory) -> CategoryPolicy {
        let mode = match category {
            ObjectCategory::Jewelry | ObjectCategory::Weapon => LootingMode::LootNotify,
            _ => LootingMode::LootSilent,
        };
        CategoryPolicy {
            mode,
            ..CategoryPolicy::default()
        }
    }

    fn carried(&self, _category: ObjectCategory) -> u32 {
        0
    }
}

struct DemoCollections;

impl Collections for DemoCollections {
    fn membership(
        &self,
        _template: TemplateId,
        _scope: CollectionScope,
    ) -> Option<CollectionMembership> {
        None
    }
}

struct DemoLegality;

impl LegalityOracle for DemoLegality {
    fn appraise(&self, reference: &WorldRef) -> Legality {
        Legality {
            crime_to_take: reference.extra.owner.is_some(),
            player_owned: false,
        }
    }
}

/// Builds a small exterior world with loot scattered around the player.
fn generate_world(rng: &mut SmallRng, classifier: &mut HashMap<u32, Classification>) -> WorldModel {
    let mut world = WorldModel::new();
    let center = CellId(1);
    world.insert_cell(Cell::exterior(center, world_model::WorldSpaceId(1), (0, 0)));
    world.player_cell = Some(center);
    world.player_position = Vec3::ZERO;

    let categories = [
        (ObjectCategory::Clutter, 2, 1.0),
        (ObjectCategory::Weapon, 40, 8.0),
        (ObjectCategory::Jewelry, 120, 0.2),
        (ObjectCategory::Ingredient, 5, 0.1),
        (ObjectCategory::Ammo, 1, 0.0),
    ];

    let mut next_id = 10u32;
    let scatter = |rng: &mut SmallRng| -> Vec3 {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = rng.gen_range(20.0..250.0);
        Vec3::new(angle.cos() * dist, angle.sin() * dist, rng.gen_range(-10.0..10.0))
    };

    for i in 0..24 {
        let (category, value, weight) = categories[rng.gen_range(0..categories.len())];
        let template = 1000 + next_id;
        classifier.insert(
            template,
            Classification {
                class: TargetClass::LooseItem,
                category,
                value,
                weight,
                enchanted: rng.gen_bool(0.1),
                quest_item: false,
            },
        );
        let position = scatter(rng);
        let mut reference = WorldRef::new(
            RefHandle::stable(next_id),
            TemplateId(template),
            FormKind::LooseItem,
            position,
        )
        .with_count(rng.gen_range(1..4));
        // Every sixth item belongs to someone
        if i % 6 == 5 {
            reference = reference.with_owner("villager");
        }
        world
            .cell_mut(center)
            .expect("center cell exists")
            .refs
            .push(reference);
        next_id += 1;
    }

    // A couple of containers, one locked
    for locked in [false, true] {
        let template = 1000 + next_id;
        classifier.insert(
            template,
            Classification {
                class: TargetClass::Container,
                category: ObjectCategory::Container,
                value: 0,
                weight: 0.0,
                enchanted: false,
                quest_item: false,
            },
        );
        let loot_template = 1000 + next_id + 1;
        classifier.insert(
            loot_template,
            Classification {
                class: TargetClass::LooseItem,
                category: ObjectCategory::Ingredient,
                value: 8,
                weight: 0.1,
                enchanted: false,
                quest_item: false,
            },
        );
        let position = scatter(rng);
        let mut chest = WorldRef::new(
            RefHandle::stable(next_id),
            TemplateId(template),
            FormKind::Container,
            position,
        )
        .with_inventory(vec![InventoryEntry::new(TemplateId(loot_template), 3)]);
        chest = chest.with_lock(if locked {
            LockLevel::Adept
        } else {
            LockLevel::Unlocked
        });
        world
            .cell_mut(center)
            .expect("center cell exists")
            .refs
            .push(chest);
        next_id += 2;
    }

    // One wandering villager to act as a theft watcher
    let watcher = RefHandle::stable(next_id);
    let position = Vec3::new(60.0, 0.0, 0.0);
    world.insert_actor(Actor::new(watcher, position));
    world
        .cell_mut(center)
        .expect("center cell exists")
        .refs
        .push(WorldRef::new(
            watcher,
            TemplateId(9000),
            FormKind::Actor,
            position,
        ));

    world
}

fn main() {
    let args = Args::parse();

    if args.print_default_config {
        print!("{}", scan_core::default_config_toml());
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scan_core=info".into()),
        )
        .init();

    let config = match &args.config {
        Some(path) => match ScanConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            // The generated world has owned loot; let the demo walk the
            // theft path instead of blocking on it
            let mut config = ScanConfig::default();
            config.policy.steal_if_undetected = true;
            config
        }
    };

    if !args.json {
        println!("Auto-Scavenger Scan Demo");
        println!("========================");
        println!("Seed: {}", args.seed);
        println!("Cycles: {}", args.cycles);
        println!("Interval: {} ms (simulated)", args.interval_ms);
        println!("Scan radius: {}", config.scan.radius);
        println!();
    }

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut templates = HashMap::new();
    let world = generate_world(&mut rng, &mut templates);
    if !args.json {
        println!(
            "Generated world: {} references, {} actors",
            world.cells_in_reach().iter().map(|c| c.refs.len()).sum::<usize>(),
            1
        );
        println!();
    }

    let host = Arc::new(ConsoleHost::new(args.json));
    let decision = DecisionEngine::new(
        Arc::new(DemoClassifier { table: templates }),
        Arc::new(DemoPolicies),
        Arc::new(DemoCollections),
        Arc::new(DemoLegality),
        host.clone(),
    );
    let mut engine = ScanEngine::new(config, host.clone(), decision);

    let start = Instant::now();
    let interval = Duration::from_millis(args.interval_ms);
    for cycle in 0..args.cycles {
        let now = start + interval * cycle as u32;
        if !args.json {
            println!("--- cycle {} ---", cycle + 1);
        }
        let report = engine.run_cycle(&world, now);
        if args.json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{}", line),
                Err(e) => eprintln!("failed to serialize cycle report: {}", e),
            }
        } else {
            println!(
                "    {} candidates, {} looted, {} highlighted, {} deferred, {} blocked",
                report.candidates, report.looted, report.highlighted, report.deferred, report.blocked
            );
            if let Some(resolution) = report.theft_resolution {
                println!("    theft batch resolved: {:?}", resolution);
            }
        }
        // The demo host answers detection checks between cycles, and
        // harvests complete instantly
        host.answer_detections();
        for cell in world.cells_in_reach() {
            for reference in &cell.refs {
                engine.on_event(HostEvent::HarvestCompleted(reference.handle), now);
            }
        }
        if !args.json {
            println!();
        }
    }

    if !args.json {
        println!("Done.");
    }
}
