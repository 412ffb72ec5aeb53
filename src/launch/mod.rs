pub mod archive;
pub mod assets;
pub mod bootstrap;
pub mod category;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod readiness;

pub use archive::{Archive, ArchiveEntry, EntryKind};
pub use assets::Assets;
pub use category::{ShellCategory, TaskCategory};
pub use credentials::{CredentialProvisioner, KeyPair, SshKeyProvisioner};
pub use error::LaunchError;
pub use pipeline::{LaunchPipeline, LaunchRequest, SessionSpec};
pub use ports::{PortAllocator, PortRange, RandomPortAllocator, ReservingPortAllocator};
pub use readiness::{ReadinessCheck, ReadinessMonitor};
