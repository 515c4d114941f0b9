use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Success,
    Failure,
}

/// What the backend reports about a package it finished adding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddResult {
    pub display_name: String,
    pub package_id: String,
    pub version: String,
}

/// Handle to one add-package call that completes on the backend's own schedule.
///
/// The queue only ever polls it; there is no way to cancel an operation once started.
pub trait InstallOperation {
    /// Current status. Called once per scheduler tick until it leaves `InProgress`.
    fn status(&mut self) -> OperationStatus;

    fn is_completed(&mut self) -> bool {
        self.status() != OperationStatus::InProgress
    }

    /// Result payload, valid only after `Success`.
    fn result(&self) -> Result<AddResult>;

    /// Failure message, valid only after `Failure`.
    fn error(&self) -> Option<String>;
}

/// Package manager client that accepts one add request at a time.
pub trait InstallBackend {
    type Operation: InstallOperation;

    /// Starts adding the package at `locator`. Errors here are synchronous start faults.
    fn start_add(&mut self, locator: &str) -> Result<Self::Operation>;
}
