use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Result};

use super::*;

#[derive(Debug, Clone)]
enum Outcome {
    Succeed { display_name: String, polls: u32 },
    Fail { message: String },
    StartFault { message: String },
    MalformedResult,
    Hang,
}

#[derive(Debug, Default)]
struct StubLog {
    started: Vec<String>,
    outstanding: usize,
    max_outstanding: usize,
}

#[derive(Debug, Default)]
struct StubBackend {
    outcomes: BTreeMap<String, Outcome>,
    log: Rc<RefCell<StubLog>>,
}

impl StubBackend {
    fn with(mut self, locator: &str, outcome: Outcome) -> Self {
        self.outcomes.insert(locator.to_string(), outcome);
        self
    }

    fn started(&self) -> Vec<String> {
        self.log.borrow().started.clone()
    }

    fn max_outstanding(&self) -> usize {
        self.log.borrow().max_outstanding
    }
}

struct StubOperation {
    outcome: Outcome,
    remaining_polls: u32,
    finished: bool,
    log: Rc<RefCell<StubLog>>,
}

impl InstallBackend for StubBackend {
    type Operation = StubOperation;

    fn start_add(&mut self, locator: &str) -> Result<StubOperation> {
        let outcome = self.outcomes.get(locator).cloned().unwrap_or(Outcome::Succeed {
            display_name: locator.to_string(),
            polls: 1,
        });
        if let Outcome::StartFault { message } = &outcome {
            return Err(anyhow!("{message}"));
        }

        let mut log = self.log.borrow_mut();
        log.started.push(locator.to_string());
        log.outstanding += 1;
        log.max_outstanding = log.max_outstanding.max(log.outstanding);

        let remaining_polls = match &outcome {
            Outcome::Succeed { polls, .. } => *polls,
            _ => 1,
        };
        Ok(StubOperation {
            outcome,
            remaining_polls,
            finished: false,
            log: Rc::clone(&self.log),
        })
    }
}

impl InstallOperation for StubOperation {
    fn status(&mut self) -> OperationStatus {
        if matches!(self.outcome, Outcome::Hang) {
            return OperationStatus::InProgress;
        }
        if self.remaining_polls > 1 {
            self.remaining_polls -= 1;
            return OperationStatus::InProgress;
        }
        if !self.finished {
            self.finished = true;
            self.log.borrow_mut().outstanding -= 1;
        }
        match self.outcome {
            Outcome::Fail { .. } => OperationStatus::Failure,
            _ => OperationStatus::Success,
        }
    }

    fn result(&self) -> Result<AddResult> {
        match &self.outcome {
            Outcome::Succeed { display_name, .. } => Ok(AddResult {
                display_name: display_name.clone(),
                package_id: format!("com.test.{}", display_name.to_lowercase()),
                version: "1.0.0".to_string(),
            }),
            Outcome::MalformedResult => Err(anyhow!("result payload is missing packageId")),
            _ => Err(anyhow!("no result for unfinished or failed operation")),
        }
    }

    fn error(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Fail { message } => Some(message.clone()),
            _ => None,
        }
    }
}

fn succeed(display_name: &str) -> Outcome {
    Outcome::Succeed {
        display_name: display_name.to_string(),
        polls: 1,
    }
}

fn fail(message: &str) -> Outcome {
    Outcome::Fail {
        message: message.to_string(),
    }
}

fn queued(name: &str) -> InstallEvent {
    InstallEvent::Queued {
        name: name.to_string(),
    }
}

fn installed(name: &str) -> InstallEvent {
    InstallEvent::PackageInstalled {
        name: name.to_string(),
    }
}

fn failed(name: &str, reason: &str) -> InstallEvent {
    InstallEvent::InstallFailed {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn run_to_idle<B: InstallBackend>(queue: &mut InstallQueue<B>) -> u64 {
    let options = DriveOptions {
        tick_interval: Duration::ZERO,
        max_ticks: Some(1_000),
    };
    drive_until_idle(queue, &options).expect("queue must drain")
}

#[test]
fn installs_then_failure_emit_events_in_order() {
    let backend = StubBackend::default()
        .with("url1", succeed("Pkg1"))
        .with("url2", fail("version not found"));
    let mut queue = InstallQueue::new(backend);
    let events = queue.subscribe();

    queue.enqueue("Pkg1", "url1").expect("Pkg1 must queue");
    queue.enqueue("Pkg2", "url2").expect("Pkg2 must queue");
    run_to_idle(&mut queue);

    assert_eq!(
        events.drain(),
        vec![
            queued("Pkg1"),
            queued("Pkg2"),
            installed("Pkg1"),
            failed("Pkg2", "version not found"),
            InstallEvent::QueueCompleted,
        ]
    );
}

#[test]
fn starts_requests_in_fifo_order_one_at_a_time() {
    let backend = StubBackend::default()
        .with(
            "a",
            Outcome::Succeed {
                display_name: "A".to_string(),
                polls: 3,
            },
        )
        .with(
            "b",
            Outcome::Succeed {
                display_name: "B".to_string(),
                polls: 2,
            },
        );
    let mut queue = InstallQueue::new(backend);

    let accepted = queue.enqueue_many([("A", "a"), ("B", "b"), ("C", "c")]);
    assert_eq!(accepted, 3);
    assert_eq!(queue.backend().started(), vec!["a"]);
    assert_eq!(queue.pending_names().collect::<Vec<_>>(), vec!["B", "C"]);

    run_to_idle(&mut queue);

    assert_eq!(queue.backend().started(), vec!["a", "b", "c"]);
    assert_eq!(queue.backend().max_outstanding(), 1);
}

#[test]
fn rejects_empty_name_without_touching_queue() {
    let mut queue = InstallQueue::new(StubBackend::default());
    queue.enqueue("Busy", "busy").expect("first request must queue");
    queue.enqueue("Waiting", "waiting").expect("second request must queue");
    let events = queue.subscribe();

    let err = queue.enqueue("", "url").expect_err("empty name must be rejected");

    assert!(matches!(err, QueueError::InvalidRequest(_)));
    assert!(events.drain().is_empty());
    assert_eq!(queue.pending_names().collect::<Vec<_>>(), vec!["Waiting"]);
    assert_eq!(queue.backend().started(), vec!["busy"]);
}

#[test]
fn rejects_empty_locator_and_never_starts_it() {
    let mut queue = InstallQueue::new(StubBackend::default());
    let events = queue.subscribe();

    queue
        .enqueue("Pkg", "")
        .expect_err("empty locator must be rejected");

    assert!(queue.is_idle());
    assert!(queue.backend().started().is_empty());
    assert!(events.drain().is_empty());
}

#[test]
fn enqueue_many_skips_invalid_requests_and_keeps_order() {
    let mut queue = InstallQueue::new(StubBackend::default());
    let accepted = queue.enqueue_many(vec![("A", "a"), ("", "b"), ("C", "c")]);
    assert_eq!(accepted, 2);

    run_to_idle(&mut queue);
    assert_eq!(queue.backend().started(), vec!["a", "c"]);
}

#[test]
fn clear_queue_is_refused_while_processing() {
    let mut queue = InstallQueue::new(StubBackend::default());
    queue.enqueue("A", "a").expect("A must queue");
    queue.enqueue("B", "b").expect("B must queue");

    let err = queue.clear_queue().expect_err("clear must be refused");
    assert_eq!(
        err,
        QueueError::Busy {
            installing: "A".to_string(),
            pending: 1,
        }
    );

    let status = queue.status();
    assert_eq!(status.pending, 1);
    assert!(status.is_processing);
    assert_eq!(status.current_label, "Installing A");
}

#[test]
fn clear_queue_between_installs_discards_pending_requests() {
    let mut queue = InstallQueue::new(StubBackend::default());
    let events = queue.subscribe();
    queue.enqueue_many([("A", "a"), ("B", "b"), ("C", "c")]);

    queue.tick();
    assert!(!queue.is_processing(), "A completed, B not started yet");

    assert_eq!(queue.clear_queue().expect("clear must succeed"), 2);
    run_to_idle(&mut queue);

    assert_eq!(queue.backend().started(), vec!["a"]);
    assert_eq!(
        events.drain(),
        vec![
            queued("A"),
            queued("B"),
            queued("C"),
            installed("a"),
            InstallEvent::QueueCompleted,
        ]
    );
}

#[test]
fn next_request_starts_on_a_later_tick() {
    let mut queue = InstallQueue::new(StubBackend::default());
    queue.enqueue_many([("A", "a"), ("B", "b")]);

    queue.tick();
    let status = queue.status();
    assert!(!status.is_processing);
    assert_eq!(status.current_label, "Idle");
    assert_eq!(status.pending, 1);
    assert_eq!(queue.backend().started(), vec!["a"]);
    assert!(!queue.is_idle());

    queue.tick();
    assert!(queue.is_processing());
    assert_eq!(queue.backend().started(), vec!["a", "b"]);
}

#[test]
fn start_fault_reports_failure_and_queue_advances() {
    let backend = StubBackend::default().with(
        "bad",
        Outcome::StartFault {
            message: "malformed locator".to_string(),
        },
    );
    let mut queue = InstallQueue::new(backend);
    let events = queue.subscribe();

    queue.enqueue("Bad", "bad").expect("request itself is valid");
    queue.enqueue("Good", "good").expect("Good must queue");
    run_to_idle(&mut queue);

    assert_eq!(queue.backend().started(), vec!["good"]);
    assert_eq!(
        events.drain(),
        vec![
            queued("Bad"),
            failed("Bad", "malformed locator"),
            queued("Good"),
            installed("good"),
            InstallEvent::QueueCompleted,
        ]
    );
}

#[test]
fn malformed_result_is_reported_as_failure_not_success() {
    let backend = StubBackend::default().with("odd", Outcome::MalformedResult);
    let mut queue = InstallQueue::new(backend);
    let events = queue.subscribe();

    queue.enqueue("Odd", "odd").expect("Odd must queue");
    queue.enqueue("Next", "next").expect("Next must queue");
    run_to_idle(&mut queue);

    let events = events.drain();
    assert!(!events.contains(&installed("Odd")));
    assert!(events.contains(&failed("Odd", "result payload is missing packageId")));
    assert!(events.contains(&installed("next")));
    assert_eq!(events.last(), Some(&InstallEvent::QueueCompleted));
}

#[test]
fn blank_display_name_is_reported_as_failure() {
    let backend = StubBackend::default().with("blank", succeed(" "));
    let mut queue = InstallQueue::new(backend);
    let events = queue.subscribe();

    queue.enqueue("Blank", "blank").expect("Blank must queue");
    run_to_idle(&mut queue);

    let events = events.drain();
    assert!(matches!(
        &events[1],
        InstallEvent::InstallFailed { name, reason }
            if name == "Blank" && reason.contains("no display name")
    ));
}

#[test]
fn failure_without_message_uses_unknown_error() {
    let backend = StubBackend::default().with("x", fail(""));
    let mut queue = InstallQueue::new(backend);
    let events = queue.subscribe();

    queue.enqueue("X", "x").expect("X must queue");
    run_to_idle(&mut queue);

    assert!(events.drain().contains(&failed("X", "Unknown error")));
}

#[test]
fn queue_completed_fires_once_after_pending_drains() {
    let mut queue = InstallQueue::new(StubBackend::default());
    let events = queue.subscribe();
    queue.enqueue_many([("A", "a"), ("B", "b"), ("C", "c")]);

    let mut completed_seen_with_pending = false;
    let options = DriveOptions {
        tick_interval: Duration::ZERO,
        max_ticks: Some(100),
    };
    let mut seen = Vec::new();
    drive_until_idle_with(&mut queue, &options, |queue| {
        for event in events.drain() {
            if event == InstallEvent::QueueCompleted && queue.status().pending > 0 {
                completed_seen_with_pending = true;
            }
            seen.push(event);
        }
    })
    .expect("queue must drain");

    assert!(!completed_seen_with_pending);
    let completions = seen
        .iter()
        .filter(|event| **event == InstallEvent::QueueCompleted)
        .count();
    assert_eq!(completions, 1);
}

#[test]
fn enqueue_between_installs_starts_immediately_without_early_completion() {
    let mut queue = InstallQueue::new(StubBackend::default());
    let events = queue.subscribe();

    queue.enqueue("A", "a").expect("A must queue");
    queue.tick();
    assert!(!queue.is_processing());

    queue.enqueue("B", "b").expect("B must queue");
    assert!(queue.is_processing());
    assert_eq!(queue.backend().started(), vec!["a", "b"]);

    run_to_idle(&mut queue);
    assert_eq!(
        events.drain(),
        vec![
            queued("A"),
            installed("a"),
            queued("B"),
            installed("b"),
            InstallEvent::QueueCompleted,
        ]
    );
}

#[test]
fn enqueue_while_processing_does_not_preempt_current_install() {
    let backend = StubBackend::default().with(
        "slow",
        Outcome::Succeed {
            display_name: "Slow".to_string(),
            polls: 5,
        },
    );
    let mut queue = InstallQueue::new(backend);
    queue.enqueue("Slow", "slow").expect("Slow must queue");
    queue.tick();
    queue.enqueue("Fast", "fast").expect("Fast must queue");

    assert_eq!(queue.backend().started(), vec!["slow"]);
    assert_eq!(queue.status().current_label, "Installing Slow");
    assert!(!queue.can_accept_install());
}

#[test]
fn drive_gives_up_on_hung_operation() {
    let backend = StubBackend::default().with("hang", Outcome::Hang);
    let mut queue = InstallQueue::new(backend);
    queue.enqueue("Hang", "hang").expect("Hang must queue");

    let options = DriveOptions {
        tick_interval: Duration::ZERO,
        max_ticks: Some(10),
    };
    let err = drive_until_idle(&mut queue, &options).expect_err("hung install must time out");
    assert!(err.to_string().contains("still busy after 10 ticks"));
    assert!(queue.is_processing());
}

#[test]
fn idle_queue_drives_in_zero_ticks() {
    let mut queue = InstallQueue::new(StubBackend::default());
    assert_eq!(run_to_idle(&mut queue), 0);
    assert_eq!(
        queue.status(),
        QueueStatus {
            pending: 0,
            is_processing: false,
            current_label: "Idle".to_string(),
        }
    );
}

#[test]
fn late_subscriber_sees_no_replay() {
    let mut bus = EventBus::new();
    let early = bus.subscribe();
    bus.emit(queued("A"));
    let late = bus.subscribe();
    bus.emit(InstallEvent::QueueCompleted);

    assert_eq!(early.drain(), vec![queued("A"), InstallEvent::QueueCompleted]);
    assert_eq!(late.try_next(), Some(InstallEvent::QueueCompleted));
    assert_eq!(late.try_next(), None);
}

#[test]
fn dropped_subscription_is_detached_on_next_emit() {
    let mut bus = EventBus::new();
    let kept = bus.subscribe();
    let dropped = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 2);

    drop(dropped);
    bus.emit(queued("A"));

    assert_eq!(bus.subscriber_count(), 1);
    assert_eq!(kept.drain(), vec![queued("A")]);
}

#[test]
fn events_render_as_status_text() {
    assert_eq!(queued("UniRx").to_string(), "queued UniRx");
    assert_eq!(
        failed("UniRx", "not found").to_string(),
        "failed UniRx: not found"
    );
    assert_eq!(
        InstallEvent::QueueCompleted.to_string(),
        "all packages processed"
    );
}
