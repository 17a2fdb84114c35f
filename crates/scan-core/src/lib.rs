//! Auto-scavenger scan engine.
//!
//! An always-on looting companion embedded in a game host. Each cycle it
//! filters the loaded world down to a bounded, distance-ordered candidate
//! list, runs every candidate through a layered policy chain, and asks
//! the host to take, highlight, or skip each one. Cross-cycle state
//! (looted memory, harvest locks, exclusions) lives in the governor;
//! detectable crimes are batched through the theft coordinator and only
//! committed once the host confirms nobody saw.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  world snapshot   ┌───────────┐  harvest / glow   ┌──────┐
//! │   host   │ ────────────────▶ │ scan loop │ ────────────────▶ │ host │
//! └──────────┘   host events     └───────────┘   theft batches   └──────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with per-section defaults
//! - [`filter`]: Candidate Filter, bounded N-nearest selection
//! - [`flags`]: Pure flag accumulation for the policy chain
//! - [`decide`]: Eligibility Decision Engine
//! - [`governor`]: Scan Governor, cross-cycle mutable state
//! - [`mortality`]: Corpse release timing
//! - [`theft`]: Theft Coordinator, two-phase detectable loots
//! - [`engine`]: Cycle orchestration and host events
//! - [`scan_loop`]: Tokio task driving the engine on an interval
//! - [`ports`]: Host-facing traits the embedder implements
//! - [`stubs`]: Table-backed port implementations for tests

pub mod config;
pub mod decide;
pub mod engine;
pub mod filter;
pub mod flags;
pub mod governor;
pub mod mortality;
pub mod ports;
pub mod scan_loop;
pub mod stubs;
pub mod theft;
pub mod verdict;

// Re-export config types
pub use config::{
    default_config_toml, CalibrationSection, ConfigError, DensitySection, DoorSection,
    GlowSection, MortalitySection, PolicySection, ScanConfig, ScanSection, TheftSection,
};

// Re-export verdicts and decisions
pub use decide::{DecisionEngine, Evaluation, ItemOutcome};
pub use verdict::{Action, HighlightReason, Verdict};

// Re-export engine and loop types
pub use engine::{CycleReport, HostEvent, ScanEngine};
pub use scan_loop::ScanLoop;

// Re-export filter types
pub use filter::{Candidate, CandidateFilter, FilterOutput, FilterParams};

// Re-export governor and side-state types
pub use governor::ScanGovernor;
pub use mortality::MortalityTracker;
pub use theft::{ClaimKind, TheftClaim, TheftCoordinator, TheftResolution};

// Re-export port traits
pub use ports::{
    CategoryPolicy, Classification, Classifier, CollectionAction, CollectionMembership,
    CollectionScope, Collections, HostError, HostOps, Legality, LegalityOracle, LootingMode,
    PolicyLookup,
};
