pub mod store;

pub use store::{
    CardMorphRow,
    MorphRow,
    SieveDb,
};
