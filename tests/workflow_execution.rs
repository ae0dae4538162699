use std::sync::Arc;

use serde_json::json;

use astroflow_engine::condition::{evaluate, Comparator, Condition};
use astroflow_engine::graph::{Node, HANDLE_FALSE, HANDLE_TRUE};
use astroflow_engine::{
    ExecutionController, ExecutionEngine, Graph, SimulatedActions, VariableEnvironment,
    CURRENT_ITEM,
};
use astroflow_test_utils::{branch_on_x, count_loop, for_each_loop, linear_chain, vars, GraphBuilder};

const IMAGING_SESSION: &str = include_str!("../demos/imaging_session.json");

fn seeded_engine(graph: Graph) -> ExecutionEngine {
    ExecutionEngine::with_actions(Arc::new(graph), Arc::new(SimulatedActions::seeded(11)))
}

fn instant(graph: Graph) -> ExecutionController {
    let ctl = ExecutionController::builder(graph)
        .with_actions(Arc::new(SimulatedActions::seeded(11)))
        .build();
    ctl.set_step_delay(0);
    ctl
}

#[tokio::test]
async fn test_linear_run_to_completion() {
    let ctl = instant(linear_chain(&["t1"]));

    let state = ctl.run_to_completion().await.unwrap();
    assert_eq!(state.execution_path, vec!["s", "t1", "e"]);
    assert!(!state.is_running);
    assert_eq!(state.error, None);
}

#[test]
fn test_branch_follows_true_port() {
    let mut engine = seeded_engine(branch_on_x());
    engine.variables_mut().set("x", json!(1));
    assert_eq!(engine.get_next_node(Some("b")).unwrap().as_deref(), Some("n1"));
}

#[test]
fn test_count_loop_sequence() {
    let mut engine = seeded_engine(count_loop(2));

    assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("body"));
    assert_eq!(engine.loop_counter("l"), 1);
    assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("body"));
    assert_eq!(engine.loop_counter("l"), 2);
    assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("after"));
    assert_eq!(engine.loop_counter("l"), 2);
}

#[test]
fn test_next_node_is_deterministic_for_fixed_counters() {
    let mut engine = seeded_engine(branch_on_x());
    engine.variables_mut().set("x", json!(2));
    let first = engine.get_next_node(Some("b")).unwrap();
    for _ in 0..10 {
        assert_eq!(engine.get_next_node(Some("b")).unwrap(), first);
    }

    let mut engine = seeded_engine(linear_chain(&["a", "b"]));
    assert_eq!(engine.get_next_node(Some("a")).unwrap(), engine.get_next_node(Some("a")).unwrap());
}

#[test]
fn test_any_satisfied_condition_takes_true_port() {
    let graph = GraphBuilder::new()
        .start("s")
        .node(Node::branch(
            "b",
            vec![
                Condition::new("temp", Comparator::Lt, -5),
                Condition::new("filter", Comparator::Eq, "Ha"),
            ],
        ))
        .task("t")
        .task("f")
        .edge("s", "b")
        .port("b", HANDLE_TRUE, "t")
        .port("b", HANDLE_FALSE, "f")
        .build();

    // Only the second condition holds.
    let mut engine = ExecutionEngine::new(Arc::new(graph))
        .with_variables(vars(&[("temp", json!(3)), ("filter", json!("Ha"))]));
    assert_eq!(engine.get_next_node(Some("b")).unwrap().as_deref(), Some("t"));

    engine.variables_mut().set_str("filter", "OIII");
    assert_eq!(engine.get_next_node(Some("b")).unwrap().as_deref(), Some("f"));
}

#[test]
fn test_count_loop_runs_body_exactly_count_times() {
    let ctl = instant(count_loop(3));
    let visited: Vec<String> = std::iter::from_fn(|| ctl.step().unwrap()).collect();

    assert_eq!(visited.iter().filter(|id| *id == "body").count(), 3);
    assert_eq!(visited.last().map(String::as_str), Some("after"));

    let mut engine = seeded_engine(count_loop(3));
    let bodies = std::iter::repeat_with(|| engine.get_next_node(Some("l")).unwrap())
        .take_while(|next| next.as_deref() == Some("body"))
        .count();
    assert_eq!(bodies, 3);
    assert_eq!(engine.loop_counter("l"), 3);
    assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("after"));
    assert_eq!(engine.loop_counter("l"), 3);
}

#[test]
fn test_for_each_binds_each_item_then_exits() {
    let mut engine = seeded_engine(for_each_loop("items"))
        .with_variables(vars(&[("items", json!([1, 2, 3]))]));

    for expected in 1..=3 {
        assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("body"));
        assert_eq!(engine.variables().get(CURRENT_ITEM), Some(&json!(expected)));
    }
    assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("after"));
    assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("after"));
    assert_eq!(engine.variables().get(CURRENT_ITEM), Some(&json!(3)));
}

#[test]
fn test_for_each_over_missing_collection_skips_body() {
    let mut engine = seeded_engine(for_each_loop("items"));
    assert_eq!(engine.get_next_node(Some("l")).unwrap().as_deref(), Some("after"));
}

#[test]
fn test_comparators_on_missing_field_are_false() {
    let envs = [
        VariableEnvironment::new(),
        vars(&[("present", json!(10)), ("other", json!("x"))]),
    ];
    for env in &envs {
        assert!(!evaluate(env, &Condition::new("missing", Comparator::Gt, 5)));
    }
}

#[test]
fn test_execution_path_grows_one_per_step() {
    let ctl = instant(count_loop(2));
    for n in 1..=6 {
        assert!(ctl.step().unwrap().is_some());
        assert_eq!(ctl.snapshot().execution_path.len(), n);
    }
}

#[tokio::test]
async fn test_start_truncates_path() {
    let ctl = instant(linear_chain(&["a"]));
    ctl.step().unwrap();
    ctl.step().unwrap();
    assert_eq!(ctl.snapshot().steps(), 2);

    let state = ctl.run_to_completion().await.unwrap();
    assert_eq!(state.execution_path, vec!["s", "a", "e"]);
}

#[tokio::test]
async fn test_missing_start_reported_before_any_step() {
    let graph = GraphBuilder::new().task("a").end("e").edge("a", "e").build();
    let ctl = instant(graph);

    assert!(ctl.start().is_err());
    let state = ctl.snapshot();
    assert!(!state.is_running);
    assert!(state.execution_path.is_empty());
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_imaging_session_demo() {
    let graph = Graph::from_json(IMAGING_SESSION).unwrap();
    graph.validate().unwrap();

    let ctl = ExecutionController::builder(graph)
        .with_actions(Arc::new(SimulatedActions::seeded(2024)))
        .with_initial_variables(vars(&[("targets", json!(["M31", "M42"]))]))
        .build();
    ctl.set_step_delay(0);

    let state = ctl.run_to_completion().await.unwrap();
    assert_eq!(state.error, None);
    assert_eq!(state.execution_path.first().map(String::as_str), Some("start"));
    assert_eq!(state.execution_path.last().map(String::as_str), Some("end"));
    assert_eq!(
        state.execution_path.iter().filter(|id| *id == "focus").count(),
        2
    );
    assert!(state.variables.get_f64("hfdValue").is_some());
    assert_eq!(state.variables.get_str(CURRENT_ITEM), Some("M42"));
}
