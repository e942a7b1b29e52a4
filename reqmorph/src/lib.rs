//! A weighted, composable HTTP request mutation engine.
//!
//! `reqmorph` turns one HTTP request into a stream of syntactically different variants
//! for probing whether a web application firewall lets equivalent requests through. It
//! does not send requests or judge responses; an external harness does that and reports
//! back which strategy chains got through.
//!
//! ## Getting Started
//!
//! ```no_run
//! use reqmorph::catalogue::{ProfileKind, builtin_profile};
//! use reqmorph::compose::{CompositionEngine, EngineConfig};
//! use reqmorph::memory::OutcomeStore;
//! use reqmorph::request::Request;
//! use reqmorph::scheduler::Scheduler;
//! use reqmorph::target::TargetKey;
//!
//! fn main() -> anyhow::Result<()> {
//!     // 1. Pick a profile and load what worked before.
//!     let profile = builtin_profile(ProfileKind::General)?;
//!     let store = OutcomeStore::new("./outcomes.jsonl");
//!     let memory = store.load();
//!
//!     // 2. Order the profile's strategies by past success.
//!     let base = Request::get("http://example.com/get?cmd=cat%20/etc/passwd");
//!     let schedule = Scheduler::default().schedule_for(&profile, &memory, &base);
//!
//!     // 3. Pull variants lazily.
//!     let engine = CompositionEngine::new(EngineConfig {
//!         limit: Some(100),
//!         ..EngineConfig::default()
//!     });
//!     let mut rng = engine.rng();
//!     for variant in engine.variants(&base, &schedule, &mut rng) {
//!         let got_through = false; // send `variant.request` here
//!         if got_through {
//!             // 4. Report the chain so that it is tried first next time.
//!             store.record_success(&TargetKey::from_request(&base)?, &variant.chain)?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Strategies live in [`strategies`] and are looked up by name through a
//! [`catalogue::Catalogue`]. Custom strategies implement [`strategy::Strategy`] or wrap a
//! closure with [`strategy::from_fn`].

pub mod catalogue;
pub mod compose;
pub mod config;
mod constants;
pub mod error;
pub mod memory;
pub mod profile;
pub mod request;
pub mod scheduler;
pub mod strategies;
pub mod strategy;
pub mod target;
mod util;

pub use catalogue::{Catalogue, ProfileKind, builtin_profile};
pub use compose::{CompositionEngine, CompositionLevel, EngineConfig, Variant, Variants};
pub use config::ProfileConfig;
pub use error::{ConfigurationError, PersistenceWarning, StrategyError};
pub use memory::{OutcomeMemory, OutcomeStore};
pub use profile::{Profile, Weighting};
pub use request::{Body, FilePart, Headers, Method, Request};
pub use scheduler::{Schedule, Scheduler};
pub use strategy::{SharedStrategy, Strategy};
pub use target::TargetKey;
