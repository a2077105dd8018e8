use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

#[derive(Clone, Default)]
pub struct AppState {
    active_generations: Arc<Mutex<HashSet<String>>>,
}

/// Held while a generation is in flight; dropping it frees the session.
#[derive(Debug)]
pub struct GenerationGuard {
    session_id: String,
    active_generations: Arc<Mutex<HashSet<String>>>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.active_generations.lock().remove(&self.session_id);
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` when the session already has a generation running.
    pub fn begin_generation(&self, session_id: &str) -> Option<GenerationGuard> {
        let mut active = self.active_generations.lock();
        if !active.insert(session_id.to_string()) {
            warn!("Rejected overlapping generation for session {}", session_id);
            return None;
        }
        Some(GenerationGuard {
            session_id: session_id.to_string(),
            active_generations: Arc::clone(&self.active_generations),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_generation_for_same_session_is_rejected() {
        let state = AppState::new();
        let guard = state.begin_generation("s1");
        assert!(guard.is_some());
        assert!(state.begin_generation("s1").is_none());
        assert!(state.begin_generation("s2").is_some());
        drop(guard);
        assert!(state.begin_generation("s1").is_some());
    }
}
