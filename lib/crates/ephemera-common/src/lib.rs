pub mod events;
pub mod job;
pub mod ports;

pub use events::ProvisioningEvent;
pub use job::{JobSnapshot, JobStatus};
pub use ports::{ExposedPort, ExposedPortRange, ParseProtocolError, Protocol, collapse_ranges};
