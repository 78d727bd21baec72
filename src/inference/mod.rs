//! Prediction from persisted artifacts

mod context;

pub use context::{InferenceContext, Prediction};
