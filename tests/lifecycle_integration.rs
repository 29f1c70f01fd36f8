//! Integration tests for the lifecycle manager.
//!
//! Tests:
//! - Fail-fast start: a failing component stops startup and is named in the error
//! - No unwind: components started before the failure stay started
//! - Exhaustive close: every component is closed even when some fail

use std::sync::Arc;

use async_trait::async_trait;
use hourglass::error::{Error, LifecycleError, Result};
use hourglass::lifecycle::{Component, LifecycleManager};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

type Journal = Arc<Mutex<Vec<String>>>;

struct Probe {
    name: &'static str,
    fail_start: bool,
    fail_close: bool,
    journal: Journal,
}

impl Probe {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            fail_start: false,
            fail_close: false,
            journal: journal.clone(),
        }
    }

    fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

#[async_trait]
impl Component for Probe {
    async fn start(&self, _ctx: CancellationToken) -> Result<()> {
        if self.fail_start {
            return Err(Error::Other(format!("{} cannot start", self.name)));
        }
        self.journal.lock().push(format!("start {}", self.name));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.journal.lock().push(format!("close {}", self.name));
        if self.fail_close {
            return Err(Error::Other(format!("{} cannot close", self.name)));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.name
    }
}

#[tokio::test]
async fn start_is_sequential_and_fail_fast() {
    let journal = Journal::default();
    let mut manager = LifecycleManager::new();
    manager
        .register("core", Arc::new(Probe::new("A", &journal)))
        .register("core", Arc::new(Probe::new("B", &journal).failing_start()))
        .register("edge", Arc::new(Probe::new("C", &journal)));

    let err = manager.start().await.unwrap_err();
    match &err {
        LifecycleError::Start {
            group, component, ..
        } => {
            assert_eq!(group, "core");
            assert_eq!(component, "B");
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("B cannot start"), "{err}");
    assert_eq!(*journal.lock(), vec!["start A".to_string()]);
}

#[rstest]
#[case::first_fails(0)]
#[case::middle_fails(1)]
#[case::last_fails(2)]
#[tokio::test]
async fn close_attempts_every_component(#[case] failing: usize) {
    let journal = Journal::default();
    let names = ["A", "B", "C"];
    let mut manager = LifecycleManager::new();
    for (index, name) in names.iter().enumerate() {
        let probe = Probe::new(*name, &journal);
        let probe = if index == failing {
            probe.failing_close()
        } else {
            probe
        };
        manager.register("core", Arc::new(probe));
    }

    manager.start().await.unwrap();
    let err = manager.close().await.unwrap_err();

    let LifecycleError::Close { failures } = err else {
        panic!("expected close failures");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].component, names[failing]);
    assert_eq!(failures[0].group, "core");

    let closes: Vec<String> = journal
        .lock()
        .iter()
        .filter(|entry| entry.starts_with("close"))
        .cloned()
        .collect();
    assert_eq!(closes, vec!["close A", "close B", "close C"]);
    assert!(manager.context().is_cancelled());
}

#[tokio::test]
async fn components_observe_the_shared_context() {
    struct Watcher {
        seen: Mutex<Option<CancellationToken>>,
    }

    #[async_trait]
    impl Component for Watcher {
        async fn start(&self, ctx: CancellationToken) -> Result<()> {
            *self.seen.lock() = Some(ctx);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    let watcher = Arc::new(Watcher {
        seen: Mutex::new(None),
    });
    let root = CancellationToken::new();
    let mut manager = LifecycleManager::with_context(root.clone());
    manager.register("core", watcher.clone());
    assert_eq!(manager.len(), 1);

    manager.start().await.unwrap();
    let seen = watcher.seen.lock().clone().unwrap();
    assert!(!seen.is_cancelled());

    root.cancel();
    assert!(seen.is_cancelled());
    manager.close().await.unwrap();
}
