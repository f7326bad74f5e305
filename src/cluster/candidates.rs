//! Static candidate list with its runtime membership flags.

use crate::config::CandidateConfig;
use crate::types::Node;
use parking_lot::RwLock;

/// Runtime state of one configured candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateState {
    pub config: CandidateConfig,
    /// Part of the active candidate pool.
    pub registered: bool,
    /// Consecutive heartbeat failures.
    pub failures: u32,
}

/// Candidate table shared by the heartbeat sender, the registration loop and
/// the HTTP handlers.
#[derive(Debug)]
pub struct CandidateTable {
    candidates: RwLock<Vec<CandidateState>>,
}

impl CandidateTable {
    pub fn new(configs: Vec<CandidateConfig>) -> Self {
        let candidates = configs
            .into_iter()
            .map(|config| CandidateState {
                config,
                registered: false,
                failures: 0,
            })
            .collect();
        Self {
            candidates: RwLock::new(candidates),
        }
    }

    pub fn snapshot(&self) -> Vec<CandidateState> {
        self.candidates.read().clone()
    }

    pub fn contains(&self, hostname: &str) -> bool {
        self.candidates.read().iter().any(|c| c.config.hostname == hostname)
    }

    pub fn is_registered(&self, hostname: &str) -> bool {
        self.candidates
            .read()
            .iter()
            .any(|c| c.registered && c.config.hostname == hostname)
    }

    pub fn registered_count(&self) -> usize {
        self.candidates.read().iter().filter(|c| c.registered).count()
    }

    /// Peers currently in the active pool.
    pub fn registered_peers(&self) -> Vec<Node> {
        self.peers_where(|c| c.registered)
    }

    /// Peers that still have to be registered with.
    pub fn unregistered_peers(&self) -> Vec<Node> {
        self.peers_where(|c| !c.registered)
    }

    fn peers_where(&self, pred: impl Fn(&CandidateState) -> bool) -> Vec<Node> {
        self.candidates
            .read()
            .iter()
            .filter(|c| pred(c))
            .map(|c| c.config.to_node())
            .collect()
    }

    /// Mark a candidate registered and clear its failure counter.
    /// Returns `true` when the flag flipped.
    pub fn mark_registered(&self, hostname: &str) -> bool {
        let mut candidates = self.candidates.write();
        match candidates.iter_mut().find(|c| c.config.hostname == hostname) {
            Some(c) => {
                let flipped = !c.registered;
                c.registered = true;
                c.failures = 0;
                flipped
            }
            None => false,
        }
    }

    /// Count a failed heartbeat. Returns `true` when the candidate crossed the
    /// threshold and was dropped from the active pool by this call.
    pub fn record_failure(&self, hostname: &str, threshold: u32) -> bool {
        let mut candidates = self.candidates.write();
        let Some(c) = candidates.iter_mut().find(|c| c.config.hostname == hostname) else {
            return false;
        };

        c.failures = c.failures.saturating_add(1);
        if c.failures >= threshold && c.registered {
            c.registered = false;
            return true;
        }
        false
    }

    pub fn failures(&self, hostname: &str) -> Option<u32> {
        self.candidates
            .read()
            .iter()
            .find(|c| c.config.hostname == hostname)
            .map(|c| c.failures)
    }
}
