//! Worker pool, re-entrancy and deadline behaviour

use crate::common::{entries_in, namespace, row, CapturingPublisher, GatedContext, MemoryHarness};
use ctxrecon::{
    Category, ContextRegistry, Dispatcher, InMemoryContext, JobConfig, RunConfig, StaticJobSource,
    Status,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn mixed_harness() -> (MemoryHarness, Vec<JobConfig>) {
    let mut harness = MemoryHarness::new();
    let mut jobs = Vec::new();
    for i in 0..24 {
        let ns = format!("ns_{:02}", i);
        let left = namespace(vec![
            ("1", row(&[("qty", "100"), ("status", "ok")])),
            ("2", row(&[("qty", "200"), ("status", "ok")])),
        ]);
        let right = match i % 4 {
            0 => left.clone(),
            1 => namespace(vec![
                ("1", row(&[("qty", "150"), ("status", "ok")])),
                ("2", row(&[("qty", "200"), ("status", "late")])),
            ]),
            2 => namespace(vec![("1", row(&[("qty", "100"), ("status", "ok")]))]),
            _ => namespace(vec![
                ("1", row(&[("qty", "n/a"), ("status", "ok")])),
                ("3", row(&[("qty", "300")])),
            ]),
        };
        harness.left(&ns, left).right(&ns, right);
        jobs.push(
            JobConfig::new(ns)
                .with_count_columns(["qty"])
                .with_reference_columns(["status"]),
        );
    }
    jobs.push(JobConfig::new("absent_everywhere"));
    (harness, jobs)
}

#[test]
fn test_results_independent_of_pool_size() {
    let (mut harness, jobs) = mixed_harness();

    let mut baseline = None;
    for workers in [1, 2, 8] {
        harness.config.workers = Some(workers);
        let outcome = harness.run(jobs.clone());

        let mut entries: Vec<_> = outcome.report.entries().cloned().collect();
        entries.sort();
        match &baseline {
            None => baseline = Some((entries, outcome.report.digest.clone())),
            Some((expected, digest)) => {
                assert_eq!(&entries, expected, "entries differ with {} workers", workers);
                assert_eq!(&outcome.report.digest, digest);
            }
        }
        assert_eq!(outcome.jobs_run, 25);
    }
}

#[test]
fn test_every_job_reports_before_publish() {
    let (mut harness, jobs) = mixed_harness();
    harness.config.workers = Some(8);
    let outcome = harness.run(jobs.clone());

    for job in &jobs {
        let sanity = entries_in(&outcome, &job.namespace, Category::Sanity);
        assert!(!sanity.is_empty(), "no sanity entry for {}", job.namespace);
    }
    assert_eq!(harness.publisher.count(), 1);
}

fn gated_dispatcher(
    data: ctxrecon::NamespaceData,
) -> (
    Dispatcher,
    std::sync::mpsc::Receiver<()>,
    std::sync::mpsc::Sender<()>,
    Arc<CapturingPublisher>,
) {
    let (gated, entered, release) = GatedContext::new("left", data.clone());
    let registry = ContextRegistry::new();
    registry.register(Arc::new(gated));
    registry.register(Arc::new(InMemoryContext::new("right").with_namespace("orders", data)));
    let publisher = Arc::new(CapturingPublisher::default());
    let dispatcher = Dispatcher::new(Arc::new(registry)).with_publisher(publisher.clone());
    (dispatcher, entered, release, publisher)
}

fn gated_config() -> RunConfig {
    let mut config = RunConfig::new("left", "right");
    config.workers = Some(2);
    config.report.file = Some(PathBuf::from("gated-report.html"));
    config
}

#[test]
fn test_second_run_rejected_while_active() {
    let data = namespace(vec![("1", row(&[("qty", "1")]))]);
    let (dispatcher, entered, release, publisher) = gated_dispatcher(data);
    let config = gated_config();

    thread::scope(|s| {
        let first = s.spawn(|| {
            let mut source = StaticJobSource::new(vec![JobConfig::new("orders")]);
            dispatcher.run(&config, &mut source)
        });

        entered
            .recv_timeout(Duration::from_secs(10))
            .expect("first run should start fetching");
        assert!(dispatcher.is_running());

        let mut source = StaticJobSource::new(vec![JobConfig::new("orders")]);
        let second = dispatcher.run(&config, &mut source).unwrap();
        assert!(second.is_none());

        release.send(()).unwrap();
        let outcome = first.join().unwrap().unwrap().expect("first run completes");
        assert!(!outcome.has_failures());
    });

    assert!(!dispatcher.is_running());
    assert_eq!(publisher.count(), 1);

    // The slot is free again once the first run finished
    let data = namespace(vec![("1", row(&[("qty", "1")]))]);
    let (dispatcher, _entered, release, _publisher) = gated_dispatcher(data);
    drop(release);
    let mut source = StaticJobSource::new(vec![JobConfig::new("orders")]);
    assert!(dispatcher.run(&config, &mut source).unwrap().is_some());
    assert!(dispatcher.run(&config, &mut source).unwrap().is_some());
}

#[test]
fn test_hung_fetch_times_out() {
    let data = namespace(vec![("1", row(&[("qty", "1")]))]);
    let (dispatcher, _entered, release, _publisher) = gated_dispatcher(data);
    let mut config = gated_config();
    config.job_timeout_secs = Some(1);

    let mut source = StaticJobSource::new(vec![JobConfig::new("orders")]);
    let outcome = dispatcher.run(&config, &mut source).unwrap().unwrap();

    let timeouts = entries_in(&outcome, "orders", Category::Timeout);
    assert_eq!(timeouts.len(), 1);
    assert_eq!(timeouts[0].status, Status::Failed);
    assert!(timeouts[0]
        .detail
        .as_deref()
        .unwrap()
        .contains("while fetching from left"));
    assert!(entries_in(&outcome, "orders", Category::Sanity).is_empty());
    assert!(outcome.has_failures());

    // Unblock the abandoned fetch thread
    drop(release);
}

#[test]
fn test_generous_deadline_does_not_interfere() {
    let mut harness = MemoryHarness::new();
    harness.config.job_timeout_secs = Some(60);
    harness.both("orders", namespace(vec![("1", row(&[("qty", "1")]))]));

    let outcome = harness.run(vec![JobConfig::new("orders").with_count_columns(["qty"])]);
    assert!(entries_in(&outcome, "orders", Category::Timeout).is_empty());
    assert!(!outcome.has_failures());
}

struct PanickingContext;

impl ctxrecon::ContextDataSource for PanickingContext {
    fn name(&self) -> &str {
        "left"
    }

    fn namespace_data(
        &self,
        namespace: &str,
        _cancel: &ctxrecon::CancelToken,
    ) -> ctxrecon::Result<Option<ctxrecon::NamespaceData>> {
        if namespace == "broken" {
            panic!("driver crashed on {}", namespace);
        }
        Ok(Some(single_row_namespace()))
    }
}

fn single_row_namespace() -> ctxrecon::NamespaceData {
    namespace(vec![("1", row(&[("qty", "1")]))])
}

#[test]
fn test_panicking_source_fails_only_its_job() {
    let registry = ContextRegistry::new();
    registry.register(Arc::new(PanickingContext));
    registry.register(Arc::new(
        InMemoryContext::new("right")
            .with_namespace("broken", single_row_namespace())
            .with_namespace("healthy", single_row_namespace()),
    ));
    let publisher = Arc::new(CapturingPublisher::default());
    let dispatcher = Dispatcher::new(Arc::new(registry)).with_publisher(publisher.clone());

    let mut source = StaticJobSource::new(vec![
        JobConfig::new("broken"),
        JobConfig::new("healthy").with_count_columns(["qty"]),
    ]);
    let outcome = dispatcher
        .run(&gated_config(), &mut source)
        .unwrap()
        .unwrap();

    let broken = entries_in(&outcome, "broken", Category::Sanity);
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].status, Status::Failed);
    assert!(broken[0]
        .detail
        .as_deref()
        .unwrap()
        .contains("driver crashed on broken"));

    assert_eq!(
        entries_in(&outcome, "healthy", Category::DataQuality)[0].status,
        Status::Passed
    );
    assert_eq!(publisher.count(), 1);
    assert!(!dispatcher.is_running());
}
