//! The block DAG seen as votes, and the summit-based finality detector running on it.

pub(crate) mod finality_detector;
pub(crate) mod state;
pub(crate) mod validators;

pub(crate) use state::Weight;
