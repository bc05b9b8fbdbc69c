//! Per-request phases: Resolving → IdentityShortCircuit / CacheHit / Generating → Responded → CachePersisting
//! Each request owns its tracker; nothing here is shared between requests.

use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestPhase {
    Resolving,
    IdentityShortCircuit,
    CacheHit,
    Generating,
    Responded,
    /// Handed off to the background writer; the response is already out.
    CachePersisting,
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RequestPhase::Resolving => "Resolving",
            RequestPhase::IdentityShortCircuit => "IdentityShortCircuit",
            RequestPhase::CacheHit => "CacheHit",
            RequestPhase::Generating => "Generating",
            RequestPhase::Responded => "Responded",
            RequestPhase::CachePersisting => "CachePersisting",
        };
        f.write_str(name)
    }
}

impl RequestPhase {
    pub fn can_transition_to(self, next: RequestPhase) -> bool {
        matches!(
            (self, next),
            (RequestPhase::Resolving, RequestPhase::IdentityShortCircuit)
                | (RequestPhase::Resolving, RequestPhase::CacheHit)
                | (RequestPhase::Resolving, RequestPhase::Generating)
                | (RequestPhase::IdentityShortCircuit, RequestPhase::Responded)
                | (RequestPhase::CacheHit, RequestPhase::Responded)
                | (RequestPhase::Generating, RequestPhase::Responded)
                | (RequestPhase::Responded, RequestPhase::CachePersisting)
        )
    }
}

/// Tracks one request's phase.
#[derive(Debug)]
pub struct PhaseTracker {
    request_id: String,
    current: RequestPhase,
}

impl PhaseTracker {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            current: RequestPhase::Resolving,
        }
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> RequestPhase {
        self.current
    }

    /// Move to `next`. An invalid transition is logged and ignored; the
    /// tracker keeps its current phase.
    pub fn advance(&mut self, next: RequestPhase) -> bool {
        let current = self.current;
        if !current.can_transition_to(next) {
            warn!(
                request_id = %self.request_id,
                from = %current,
                to = %next,
                "invalid phase transition"
            );
            return false;
        }
        self.current = next;
        debug!(request_id = %self.request_id, from = %current, to = %next, "phase_transition");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_branches_three_ways() {
        for branch in [
            RequestPhase::IdentityShortCircuit,
            RequestPhase::CacheHit,
            RequestPhase::Generating,
        ] {
            assert!(RequestPhase::Resolving.can_transition_to(branch));
            assert!(branch.can_transition_to(RequestPhase::Responded));
            assert!(!branch.can_transition_to(RequestPhase::CachePersisting));
        }
    }

    #[test]
    fn persisting_only_follows_a_response() {
        assert!(RequestPhase::Responded.can_transition_to(RequestPhase::CachePersisting));
        assert!(!RequestPhase::Generating.can_transition_to(RequestPhase::CachePersisting));
        assert!(!RequestPhase::CachePersisting.can_transition_to(RequestPhase::Resolving));
    }

    #[test]
    fn tracker_follows_valid_path_and_rejects_skips() {
        let mut tracker = PhaseTracker::new("req-1");
        assert!(!tracker.advance(RequestPhase::Responded));
        assert_eq!(tracker.current(), RequestPhase::Resolving);

        assert!(tracker.advance(RequestPhase::Generating));
        assert!(!tracker.advance(RequestPhase::CacheHit));
        assert!(tracker.advance(RequestPhase::Responded));
        assert!(tracker.advance(RequestPhase::CachePersisting));
        assert_eq!(tracker.current(), RequestPhase::CachePersisting);
    }
}
