//! # Web API Application State

use std::sync::Arc;

use crate::library::Librarian;
use crate::orchestration::{CompletionCallback, Overlord};

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub overlord: Arc<Overlord>,
    pub librarian: Arc<Librarian>,
    /// Invoked with `(title, path)` when media acquired over the API is ready
    pub on_ready: CompletionCallback,
}

impl AppState {
    pub fn new(overlord: Arc<Overlord>, librarian: Arc<Librarian>, on_ready: CompletionCallback) -> Self {
        Self {
            overlord,
            librarian,
            on_ready,
        }
    }
}
