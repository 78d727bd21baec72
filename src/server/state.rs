//! Application state shared across handlers

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::inference::InferenceContext;

/// Read-only state: the loaded model and when the server started
#[derive(Debug)]
pub struct AppState {
    pub context: Arc<InferenceContext>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(context: Arc<InferenceContext>) -> Self {
        Self {
            context,
            started_at: Utc::now(),
        }
    }
}
