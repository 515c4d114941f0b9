mod backend;
mod driver;
mod events;
mod queue;

pub use backend::{AddResult, InstallBackend, InstallOperation, OperationStatus};
pub use driver::{drive_until_idle, drive_until_idle_with, DriveOptions};
pub use events::{EventBus, InstallEvent, Subscription};
pub use queue::{InstallQueue, QueueError, QueueStatus};

#[cfg(test)]
mod tests;
