// tests/follower_propagation.rs

//! Owner/follower scenarios on programmatic graphs, run deterministically on
//! an inline scheduler.

mod common;

use std::sync::{Arc, Mutex};

use anyhow::bail;
use equinox_automation::exec::{SilentProgress, TaskRunner};
use equinox_automation::graph::{CancelRequest, FollowerSpec, GraphBuilder, RunReport, TaskRunState};
use equinox_automation::task::task_fn;
use equinox_automation::types::ExecutionMode;
use equinox_automation_test_utils::fake_executor::InlineScheduler;

use common::init_tracing;

fn runner(builder: GraphBuilder<i64>, scheduler: &InlineScheduler) -> TaskRunner<i64> {
    TaskRunner::new(
        Arc::new(builder.build()),
        Arc::new(scheduler.clone()),
        Arc::new(SilentProgress),
    )
}

#[test]
fn chain_passes_values_down() {
    init_tracing();

    let mut b = GraphBuilder::new();
    let a = b.add_task("A", task_fn("A", |_| Ok(2)), FollowerSpec::Root).unwrap();
    let f = b
        .add_task("F", task_fn("F", |inputs: Vec<i64>| Ok(inputs[0] * 10)), FollowerSpec::Single)
        .unwrap();
    let g = b
        .add_task("G", task_fn("G", |inputs: Vec<i64>| Ok(inputs[0] + 1)), FollowerSpec::Single)
        .unwrap();
    b.add_follower(a, f).unwrap();
    b.add_follower(f, g).unwrap();
    b.set_execution_mode(a, ExecutionMode::Parallel).unwrap();
    b.set_execution_mode(f, ExecutionMode::Sequential).unwrap();

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    runner.submit(a, ExecutionMode::Parallel).unwrap();

    assert_eq!(runner.graph().output(g).unwrap(), Some(21));
    assert_eq!(scheduler.pools(), vec!["parallel", "parallel", "sequential"]);
}

#[test]
fn runner_debug_reports_node_count() {
    init_tracing();

    let mut b = GraphBuilder::new();
    b.add_task("A", task_fn("A", |_| Ok(1)), FollowerSpec::Root).unwrap();
    b.add_task("B", task_fn("B", |_| Ok(2)), FollowerSpec::Root).unwrap();

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);

    assert_eq!(runner.graph().len(), 2);
    assert!(format!("{runner:?}").contains("nodes: 2"), "{runner:?}");
}

#[test]
fn multiple_input_follower_fires_once_with_all_values() {
    init_tracing();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);

    let mut b = GraphBuilder::new();
    let owners: Vec<_> = (1..=3)
        .map(|i| {
            b.add_task(format!("O{i}"), task_fn("owner", move |_| Ok(i)), FollowerSpec::Root)
                .unwrap()
        })
        .collect();
    let m = b
        .add_task(
            "M",
            task_fn("M", move |inputs: Vec<i64>| {
                seen_in.lock().unwrap().push(inputs.clone());
                Ok(inputs.iter().sum())
            }),
            FollowerSpec::Multiple { threshold: 3 },
        )
        .unwrap();
    for o in &owners {
        b.add_follower(*o, m).unwrap();
    }

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    for o in owners.iter().rev() {
        runner.submit(*o, ExecutionMode::Parallel).unwrap();
    }

    assert_eq!(*seen.lock().unwrap(), vec![vec![3, 2, 1]]);
    assert_eq!(runner.graph().output(m).unwrap(), Some(6));
}

#[test]
fn failed_owner_lowers_threshold_of_multiple_input_follower() {
    init_tracing();

    let mut b = GraphBuilder::new();
    let ok1 = b.add_task("ok1", task_fn("ok1", |_| Ok(1)), FollowerSpec::Root).unwrap();
    let ok2 = b.add_task("ok2", task_fn("ok2", |_| Ok(2)), FollowerSpec::Root).unwrap();
    let bad = b
        .add_task("bad", task_fn("bad", |_: Vec<i64>| bail!("boom")), FollowerSpec::Root)
        .unwrap();
    let m = b
        .add_task(
            "M",
            task_fn("M", |inputs: Vec<i64>| Ok(inputs.len() as i64)),
            FollowerSpec::Multiple { threshold: 3 },
        )
        .unwrap();
    for o in [ok1, bad, ok2] {
        b.add_follower(o, m).unwrap();
    }

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    for o in [ok1, bad, ok2] {
        runner.submit(o, ExecutionMode::Parallel).unwrap();
    }

    let report = RunReport::from_graph(runner.graph());
    assert_eq!(report.failed(), vec!["bad"]);
    assert_eq!(runner.graph().output(m).unwrap(), Some(2));
}

#[test]
fn follower_below_floor_is_abandoned_and_starves() {
    init_tracing();

    let mut b = GraphBuilder::new();
    let ok = b.add_task("ok", task_fn("ok", |_| Ok(1)), FollowerSpec::Root).unwrap();
    let bad = b
        .add_task("bad", task_fn("bad", |_: Vec<i64>| bail!("boom")), FollowerSpec::Root)
        .unwrap();
    let m = b
        .add_task("M", task_fn("M", |_| Ok(0)), FollowerSpec::Multiple { threshold: 2 })
        .unwrap();
    b.add_follower(bad, m).unwrap();
    b.add_follower(ok, m).unwrap();

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    runner.submit(bad, ExecutionMode::Parallel).unwrap();
    runner.submit(ok, ExecutionMode::Parallel).unwrap();

    let report = RunReport::from_graph(runner.graph());
    assert_eq!(report.starved(), vec!["M"]);
    assert_eq!(runner.graph().state(m).unwrap(), TaskRunState::Pending);
}

#[test]
fn single_input_follower_of_failed_owner_never_runs() {
    init_tracing();

    let mut b = GraphBuilder::new();
    let a = b
        .add_task("A", task_fn("A", |_: Vec<i64>| bail!("no data")), FollowerSpec::Root)
        .unwrap();
    let f = b.add_task("F", task_fn("F", |_| Ok(1)), FollowerSpec::Single).unwrap();
    b.add_follower(a, f).unwrap();

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    runner.submit(a, ExecutionMode::Parallel).unwrap();

    assert!(matches!(runner.graph().state(a).unwrap(), TaskRunState::Failed(reason) if reason.contains("no data")));
    assert_eq!(runner.graph().state(f).unwrap(), TaskRunState::Pending);
    assert_eq!(scheduler.pools().len(), 1);
}

#[test]
fn short_running_followers_use_the_short_pool_only_in_parallel_mode() {
    init_tracing();

    let mut b = GraphBuilder::new();
    let a = b.add_task("A", task_fn("A", |_| Ok(1)), FollowerSpec::Root).unwrap();
    let s = b
        .add_task("S", task_fn("S", |_| Ok(2)).short_running(), FollowerSpec::Single)
        .unwrap();
    let c = b.add_task("C", task_fn("C", |_| Ok(3)), FollowerSpec::Root).unwrap();
    let t = b
        .add_task("T", task_fn("T", |_| Ok(4)).short_running(), FollowerSpec::Single)
        .unwrap();
    b.add_follower(a, s).unwrap();
    b.add_follower(c, t).unwrap();
    b.set_execution_mode(c, ExecutionMode::Sequential).unwrap();

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    runner.submit(a, ExecutionMode::Parallel).unwrap();
    runner.submit(c, ExecutionMode::Parallel).unwrap();

    assert_eq!(scheduler.pools(), vec!["parallel", "short", "parallel", "sequential"]);
}

#[test]
fn cancelling_a_pending_owner_tells_its_followers() {
    init_tracing();

    let mut b = GraphBuilder::new();
    let a = b.add_task("A", task_fn("A", |_| Ok(1)), FollowerSpec::Root).unwrap();
    let c = b.add_task("C", task_fn("C", |_| Ok(2)), FollowerSpec::Root).unwrap();
    let d = b.add_task("D", task_fn("D", |_| Ok(3)), FollowerSpec::Root).unwrap();
    let m = b
        .add_task(
            "M",
            task_fn("M", |inputs: Vec<i64>| Ok(inputs.iter().sum())),
            FollowerSpec::Multiple { threshold: 3 },
        )
        .unwrap();
    for o in [a, c, d] {
        b.add_follower(o, m).unwrap();
    }

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    assert_eq!(runner.cancel(d).unwrap(), CancelRequest::CancelledPending);
    runner.submit(a, ExecutionMode::Parallel).unwrap();
    runner.submit(c, ExecutionMode::Parallel).unwrap();

    assert_eq!(runner.graph().state(d).unwrap(), TaskRunState::Cancelled);
    assert_eq!(runner.graph().output(m).unwrap(), Some(3));
}

#[test]
fn panicking_task_is_reported_as_failed() {
    init_tracing();

    let mut b = GraphBuilder::new();
    let a = b
        .add_task(
            "A",
            task_fn("A", |_: Vec<i64>| -> anyhow::Result<i64> { panic!("kaboom") }),
            FollowerSpec::Root,
        )
        .unwrap();

    let scheduler = InlineScheduler::new();
    let runner = runner(b, &scheduler);
    runner.submit(a, ExecutionMode::Sequential).unwrap();

    assert_eq!(
        runner.graph().state(a).unwrap(),
        TaskRunState::Failed("task panicked".to_string())
    );
}

/// Owner A feeds a single-input follower F1 and, together with B, a
/// two-input follower F2.
fn shared_follower_graph(b_fails: bool) -> (TaskRunner<String>, InlineScheduler, Arc<Mutex<Vec<Vec<String>>>>) {
    let f2_calls = Arc::new(Mutex::new(Vec::new()));
    let f2_in = Arc::clone(&f2_calls);

    let mut g = GraphBuilder::new();
    let a = g
        .add_task("A", task_fn("A", |_: Vec<String>| Ok("X".to_string())), FollowerSpec::Root)
        .unwrap();
    let b = g
        .add_task(
            "B",
            task_fn("B", move |_: Vec<String>| {
                if b_fails {
                    bail!("B failed")
                }
                Ok("Y".to_string())
            }),
            FollowerSpec::Root,
        )
        .unwrap();
    let f1 = g
        .add_task("F1", task_fn("F1", |inputs: Vec<String>| Ok(inputs.concat())), FollowerSpec::Single)
        .unwrap();
    let f2 = g
        .add_task(
            "F2",
            task_fn("F2", move |inputs: Vec<String>| {
                f2_in.lock().unwrap().push(inputs.clone());
                Ok(inputs.concat())
            }),
            FollowerSpec::Multiple { threshold: 2 },
        )
        .unwrap();
    g.add_follower(a, f1).unwrap();
    g.add_follower(a, f2).unwrap();
    g.add_follower(b, f2).unwrap();

    let scheduler = InlineScheduler::new();
    let runner = TaskRunner::new(
        Arc::new(g.build()),
        Arc::new(scheduler.clone()),
        Arc::new(SilentProgress),
    );
    (runner, scheduler, f2_calls)
}

#[test]
fn two_input_follower_does_not_run_below_the_floor() {
    init_tracing();

    let (runner, _scheduler, f2_calls) = shared_follower_graph(true);
    let graph = Arc::clone(runner.graph());
    let node = |id: &str| graph.node_id(id).unwrap();

    runner.submit(node("A"), ExecutionMode::Parallel).unwrap();
    assert_eq!(graph.output(node("F1")).unwrap(), Some("X".to_string()));
    assert_eq!(graph.state(node("F2")).unwrap(), TaskRunState::Pending);

    runner.submit(node("B"), ExecutionMode::Parallel).unwrap();
    assert!(f2_calls.lock().unwrap().is_empty());
    assert_eq!(graph.state(node("F2")).unwrap(), TaskRunState::Pending);
}

#[test]
fn two_input_follower_runs_once_with_inputs_in_arrival_order() {
    init_tracing();

    let (runner, _scheduler, f2_calls) = shared_follower_graph(false);
    let graph = Arc::clone(runner.graph());
    let node = |id: &str| graph.node_id(id).unwrap();

    runner.submit(node("A"), ExecutionMode::Parallel).unwrap();
    runner.submit(node("B"), ExecutionMode::Parallel).unwrap();
    runner.submit(node("B"), ExecutionMode::Parallel).unwrap();

    assert_eq!(
        *f2_calls.lock().unwrap(),
        vec![vec!["X".to_string(), "Y".to_string()]]
    );
    assert_eq!(graph.output(node("F2")).unwrap(), Some("XY".to_string()));
}
