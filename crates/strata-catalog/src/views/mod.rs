//! View derivation: effective schema and updatability classification.

mod derive;
mod updatability;

pub use derive::{derive_view, ViewSpec};
pub use updatability::{
    classify_predicate, collect_equality_pins, PinnedColumn, Updatability,
};
