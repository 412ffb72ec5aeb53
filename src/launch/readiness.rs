use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Predicate over a single container log line.
pub type ReadinessCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Tracks which named services of a session have reported ready.
/// Readiness is monotonic: once a service is ready it stays ready.
#[derive(Clone, Default)]
pub struct ReadinessMonitor {
    checks: BTreeMap<String, ReadinessCheck>,
    ready: BTreeMap<String, bool>,
}

impl ReadinessMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: impl Into<String>, check: ReadinessCheck) {
        let service = service.into();
        self.ready.insert(service.clone(), false);
        self.checks.insert(service, check);
    }

    /// Run every pending check against `line`; returns the services that
    /// became ready because of it.
    pub fn observe(&mut self, line: &str) -> Vec<String> {
        let mut newly_ready = Vec::new();
        for (service, check) in &self.checks {
            let ready = self.ready.entry(service.clone()).or_insert(false);
            if !*ready && check(line) {
                *ready = true;
                newly_ready.push(service.clone());
            }
        }
        newly_ready
    }

    pub fn is_ready(&self, service: &str) -> bool {
        self.ready.get(service).copied().unwrap_or(false)
    }

    /// True once every registered service is ready. A monitor without
    /// checks is trivially ready.
    pub fn all_ready(&self) -> bool {
        self.ready.values().all(|ready| *ready)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.checks.keys().map(String::as_str)
    }
}

impl fmt::Debug for ReadinessMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.ready.iter()).finish()
    }
}

/// Check that passes once a log line contains `marker`.
pub fn contains_marker(marker: &'static str) -> ReadinessCheck {
    Arc::new(move |line: &str| line.contains(marker))
}
