use std::collections::VecDeque;

use thiserror::Error;
use tracing::{error, info, warn};
use unipack_core::{InstallRequest, RequestError};

use crate::{
    EventBus, InstallBackend, InstallEvent, InstallOperation, OperationStatus, Subscription,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("invalid install request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("cannot clear queue while '{installing}' is installing ({pending} pending)")]
    Busy { installing: String, pending: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    pub pending: usize,
    pub is_processing: bool,
    pub current_label: String,
}

struct InFlight<O> {
    request: InstallRequest,
    operation: O,
}

/// Serializes package installs so the backend never sees two add calls at once.
///
/// The queue is driven by [`InstallQueue::tick`], called once per turn of the host's
/// scheduler loop. A started install is polled on each tick until it resolves; the next
/// request then starts on a later tick, never from inside the completion handling.
pub struct InstallQueue<B: InstallBackend> {
    backend: B,
    pending: VecDeque<InstallRequest>,
    in_flight: Option<InFlight<B::Operation>>,
    continuation: bool,
    events: EventBus,
}

impl<B: InstallBackend> InstallQueue<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pending: VecDeque::new(),
            in_flight: None,
            continuation: false,
            events: EventBus::new(),
        }
    }

    pub fn subscribe(&mut self) -> Subscription {
        self.events.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn enqueue(
        &mut self,
        name: impl Into<String>,
        locator: impl Into<String>,
    ) -> Result<(), QueueError> {
        match InstallRequest::new(name, locator) {
            Ok(request) => {
                self.enqueue_request(request);
                Ok(())
            }
            Err(err) => {
                error!("rejected install request: {err}");
                Err(err.into())
            }
        }
    }

    pub fn enqueue_request(&mut self, request: InstallRequest) {
        let name = request.name().to_string();
        self.pending.push_back(request);
        info!("queued package: {name}");
        self.events.emit(InstallEvent::Queued { name });

        if !self.is_processing() {
            // Starting now supersedes a continuation posted by the previous completion.
            self.continuation = false;
            self.process_next();
        }
    }

    /// Enqueues each pair in order and returns how many were accepted.
    pub fn enqueue_many<I, N, L>(&mut self, requests: I) -> usize
    where
        I: IntoIterator<Item = (N, L)>,
        N: Into<String>,
        L: Into<String>,
    {
        let mut accepted = 0;
        for (name, locator) in requests {
            if self.enqueue(name, locator).is_ok() {
                accepted += 1;
            }
        }
        accepted
    }

    /// Drops every request that has not started yet. Refused while an install is in flight.
    pub fn clear_queue(&mut self) -> Result<usize, QueueError> {
        if let Some(current) = &self.in_flight {
            let err = QueueError::Busy {
                installing: current.request.name().to_string(),
                pending: self.pending.len(),
            };
            warn!("{err}; wait for the current installation to complete");
            return Err(err);
        }

        let cleared = self.pending.len();
        self.pending.clear();
        info!("package queue cleared ({cleared} removed)");
        Ok(cleared)
    }

    pub fn status(&self) -> QueueStatus {
        let current_label = match &self.in_flight {
            Some(current) => format!("Installing {}", current.request.name()),
            None => "Idle".to_string(),
        };
        QueueStatus {
            pending: self.pending.len(),
            is_processing: self.is_processing(),
            current_label,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Menu-style gate: new installs are only offered while nothing is running.
    pub fn can_accept_install(&self) -> bool {
        !self.is_processing()
    }

    /// True once nothing is pending, in flight, or scheduled for the next tick.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_none() && !self.continuation
    }

    pub fn pending_names(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(InstallRequest::name)
    }

    /// One scheduler turn: run a posted continuation, otherwise poll the in-flight install.
    pub fn tick(&mut self) {
        if std::mem::take(&mut self.continuation) {
            self.process_next();
            return;
        }
        self.poll_in_flight();
    }

    fn process_next(&mut self) {
        if let Some(current) = &self.in_flight {
            warn!(
                "package installation already in progress: {}",
                current.request.name()
            );
            return;
        }

        let Some(request) = self.pending.pop_front() else {
            info!("all packages processed");
            self.events.emit(InstallEvent::QueueCompleted);
            return;
        };

        info!("installing package: {}", request.name());
        match self.backend.start_add(request.locator()) {
            Ok(operation) => {
                self.in_flight = Some(InFlight { request, operation });
            }
            Err(err) => {
                let reason = format!("{err:#}");
                error!(
                    "failed to start installation for {}: {reason}",
                    request.name()
                );
                self.events.emit(InstallEvent::InstallFailed {
                    name: request.name().to_string(),
                    reason,
                });
                self.complete_current_installation();
            }
        }
    }

    fn poll_in_flight(&mut self) {
        let Some(current) = self.in_flight.as_mut() else {
            return;
        };

        let status = current.operation.status();
        let event = match status {
            OperationStatus::InProgress => return,
            OperationStatus::Success => match current.operation.result() {
                Ok(result) if !result.display_name.trim().is_empty() => {
                    info!(
                        "successfully installed: {} ({}@{})",
                        result.display_name, result.package_id, result.version
                    );
                    InstallEvent::PackageInstalled {
                        name: result.display_name,
                    }
                }
                Ok(result) => {
                    let reason = format!(
                        "installation result for '{}' has no display name",
                        result.package_id
                    );
                    error!("error processing installation result: {reason}");
                    InstallEvent::InstallFailed {
                        name: current.request.name().to_string(),
                        reason,
                    }
                }
                Err(err) => {
                    let reason = format!("{err:#}");
                    error!("error processing installation result: {reason}");
                    InstallEvent::InstallFailed {
                        name: current.request.name().to_string(),
                        reason,
                    }
                }
            },
            OperationStatus::Failure => {
                let reason = current
                    .operation
                    .error()
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string());
                error!(
                    "failed to install package {}: {reason}",
                    current.request.name()
                );
                InstallEvent::InstallFailed {
                    name: current.request.name().to_string(),
                    reason,
                }
            }
        };

        self.events.emit(event);
        self.complete_current_installation();
    }

    fn complete_current_installation(&mut self) {
        self.in_flight = None;
        self.continuation = true;
    }
}
