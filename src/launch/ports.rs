//! Ephemeral port selection for task services.
//!
//! Agent ports 2600 - 3500 are split between TensorBoards, Notebooks and
//! Shells. Each category draws from its own sub-range.

use rand::Rng;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        usize::from(self.max - self.min) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.max < self.min
    }

    pub fn overlaps(&self, other: &PortRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }
}

pub const AGENT_PORT_BAND: PortRange = PortRange::new(2600, 3500);
pub const TENSORBOARD_PORTS: PortRange = PortRange::new(2600, 2600 + 299);
pub const NOTEBOOK_PORTS: PortRange = PortRange::new(2900, 2900 + 299);
pub const SHELL_PORTS: PortRange = PortRange::new(3200, 3200 + 299);

pub trait PortAllocator: Send + Sync {
    /// Pick a port in `range`, or `None` if no port can be handed out.
    fn allocate(&self, range: PortRange) -> Option<u16>;

    /// Return a port obtained from `allocate`.
    fn release(&self, _port: u16) {}
}

/// Memoryless uniform draw. With isolated task networking every session
/// has its own port namespace, so repeated values are harmless.
#[derive(Debug, Default)]
pub struct RandomPortAllocator;

impl PortAllocator for RandomPortAllocator {
    fn allocate(&self, range: PortRange) -> Option<u16> {
        if range.is_empty() {
            return None;
        }
        Some(rand::rng().random_range(range.min..=range.max))
    }
}

/// Tracks handed-out ports so that sessions sharing the host network never
/// receive the same port.
#[derive(Debug, Default)]
pub struct ReservingPortAllocator {
    reserved: Mutex<HashSet<u16>>,
}

impl ReservingPortAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl PortAllocator for ReservingPortAllocator {
    fn allocate(&self, range: PortRange) -> Option<u16> {
        if range.is_empty() {
            return None;
        }
        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());

        // Random starting point, then probe forward with wrap-around.
        let offset = rand::rng().random_range(0..range.len());
        let port = (0..range.len())
            .map(|i| range.min + ((offset + i) % range.len()) as u16)
            .find(|port| !reserved.contains(port))?;
        reserved.insert(port);
        Some(port)
    }

    fn release(&self, port: u16) {
        self.reserved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&port);
    }
}
