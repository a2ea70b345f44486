pub mod cancel;
pub mod config;
pub mod errors;
pub mod models;
pub mod names;
pub mod text;

pub use cancel::CancelToken;
pub use config::{
    FilterConfig,
    KnownCardAction,
    PrioritySource,
    ReadingPriority,
    RecalcConfig,
    TagConfig,
};
pub use errors::SieveError;
pub use models::{
    CardId,
    CardRecord,
    CardType,
    DeckId,
    LearningStatus,
    MorphKey,
    Morpheme,
    NoteId,
    NoteTypeId,
};
