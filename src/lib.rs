//! Morpheme-driven flashcard recalculation.
//!
//! Maintains a derived index of the morphemes appearing on a host
//! collection's cards, merges external priority rankings over them, and
//! uses the result to order new cards, assign learning-status tags, and
//! suppress duplicate cards that would teach an already-covered morph.
//!
//! The single entry point is [`recalc::RecalcJob`]; everything it needs
//! (config, morphemizer registry, cache store, host collection) is
//! constructed by the caller and passed in.

pub mod cache;
pub mod collection;
pub mod core;
pub mod morphemizers;
pub mod persistence;
pub mod priority;
pub mod reading;
pub mod recalc;
pub mod tags;

pub use cache::SieveDb;
pub use collection::{
    HostCollection,
    MemCollection,
};
pub use crate::core::{
    CancelToken,
    RecalcConfig,
    SieveError,
};
pub use morphemizers::MorphemizerRegistry;
pub use recalc::{
    RecalcJob,
    RecalcSummary,
};
