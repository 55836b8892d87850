// tests/pipeline_execution_tests.rs
mod common;

use common::*;
use flowline::{ContextData, FlowError, Pipeline, PipelineControl, PipelineResult};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn test_pipeline_runs_steps_in_order() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new(&[("step1", false, None), ("step2", false, None), ("step3", false, None)]);

  pipeline.on_root("step1", create_simple_handler("step1", " S1"));
  pipeline.on_root("step2", create_simple_handler("step2", " S2"));
  pipeline.on_root("step3", create_simple_handler("step3", " S3"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.message, " S1 S2 S3");
  assert_eq!(guard.steps_executed, vec!["step1", "step2", "step3"]);
}

#[tokio::test]
#[serial]
async fn test_pipeline_stops_on_pipeline_control_stop() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("stepA", false, None),
    ("stopStep", false, None),
    ("stepC", false, None),
  ]);

  pipeline.on_root("stepA", create_simple_handler("stepA", "A"));
  pipeline.on_root("stopStep", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push("stopStep".to_string());
      Ok::<PipelineControl, FlowError>(PipelineControl::Stop)
    })
  });
  pipeline.on_root("stepC", create_simple_handler("stepC", "C"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Stopped);
  let guard = ctx.read();
  assert_eq!(guard.counter, 1);
  assert_eq!(guard.steps_executed, vec!["stepA", "stopStep"]);
}

#[tokio::test]
#[serial]
async fn test_stop_in_before_phase_skips_on_and_after() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("guarded", false, None), ("next", false, None)]);

  pipeline.before_root("guarded", create_simple_handler("guard", "G;"));
  pipeline.on_root("guarded", create_simple_handler("on", "On;"));
  pipeline.after_root("guarded", create_simple_handler("after", "After;"));
  pipeline.on_root("next", create_simple_handler("next", "Next;"));

  let ctx = ContextData::new(TestContext {
    should_stop_at: Some("guard".to_string()),
    ..Default::default()
  });
  let result = pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(result, PipelineResult::Stopped);
  assert_eq!(ctx.read().steps_executed, vec!["guard"]);
}

#[tokio::test]
#[serial]
async fn test_pipeline_propagates_handler_error() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("good_step", false, None),
    ("bad_step", false, None),
    ("another_step", false, None),
  ]);

  pipeline.on_root("good_step", create_simple_handler("good_step", "Good"));
  pipeline.on_root("bad_step", create_failing_handler("bad_step", "I am a bad step!"));
  pipeline.after_root("bad_step", create_simple_handler("bad_step_after", "NeverRun"));
  pipeline.on_root("another_step", create_simple_handler("another_step", "NeverRun"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("I am a bad step!".to_string()));
  let guard = ctx.read();
  assert_eq!(guard.message, "Good");
  assert_eq!(guard.steps_executed, vec!["good_step", "bad_step"]);
}

#[tokio::test]
#[serial]
async fn test_pipeline_skips_step_if_condition_met() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[
    ("step1", false, None),
    (
      "step_to_skip",
      false,
      Some(Arc::new(|ctx: ContextData<TestContext>| ctx.read().counter > 0)),
    ),
    ("step3", false, None),
  ]);

  pipeline.on_root("step1", create_simple_handler("step1", " S1"));
  pipeline.on_root("step_to_skip", create_simple_handler("step_to_skip", " SKIPPED"));
  pipeline.on_root("step3", create_simple_handler("step3", " S3"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  let guard = ctx.read();
  assert_eq!(guard.message, " S1 S3");
  assert_eq!(guard.steps_executed, vec!["step1", "step3"]);
}

#[tokio::test]
#[serial]
async fn test_skip_condition_can_be_set_after_construction() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("persist", false, None), ("notify", false, None)]);
  pipeline.on_root("persist", create_simple_handler("persist", "P;"));
  pipeline.on_root("notify", create_simple_handler("notify", "N;"));
  pipeline.set_skip_condition(
    "persist",
    Some(Arc::new(|ctx: ContextData<TestContext>| ctx.read().message.is_empty())),
  );

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().steps_executed, vec!["notify"]);
}

#[tokio::test]
#[serial]
async fn test_non_optional_step_missing_handler_fails() {
  setup_tracing();
  let pipeline = Pipeline::<TestContext, TestError>::new(&[("step_with_no_handler", false, None)]);

  let result = pipeline.run(ContextData::new(TestContext::default())).await;

  match result {
    Err(TestError::Flow(s)) => {
      assert!(s.contains("HandlerMissing"));
      assert!(s.contains("step_with_no_handler"));
    }
    other => panic!("Expected FlowError::HandlerMissing, got {:?}", other),
  }
}

#[tokio::test]
#[serial]
async fn test_optional_step_missing_handler_succeeds() {
  setup_tracing();
  let mut pipeline =
    Pipeline::<TestContext, TestError>::new(&[("optional_step_no_handler", true, None), ("last", false, None)]);
  pipeline.on_root("last", create_simple_handler("last", "L"));

  let ctx = ContextData::new(TestContext::default());
  let result = pipeline.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), PipelineResult::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["last"]);
}

#[tokio::test]
#[serial]
async fn test_before_on_after_execution_order() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("main_step", false, None)]);

  pipeline.after_root("main_step", create_simple_handler("after_main", "After;"));
  pipeline.on_root("main_step", create_simple_handler("on_main", "On;"));
  pipeline.before_root("main_step", create_simple_handler("before_main", "Before;"));
  pipeline.on_root("main_step", create_simple_handler("on_main_2", "On2;"));

  let ctx = ContextData::new(TestContext::default());
  pipeline.run(ctx.clone()).await.unwrap();

  let guard = ctx.read();
  assert_eq!(guard.message, "Before;On;On2;After;");
  assert_eq!(
    guard.steps_executed,
    vec!["before_main", "on_main", "on_main_2", "after_main"]
  );
}

#[tokio::test]
#[serial]
async fn test_step_names_reflect_declaration_order() {
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("a", false, None), ("b", true, None)]);
  pipeline.set_optional("a", true);
  pipeline.conditional_scopes_for_step("c").finalize_conditional_step(false);

  assert_eq!(pipeline.step_names(), vec!["a", "b", "c"]);
  assert!(pipeline.has_step("c"));
  assert!(!pipeline.has_step("d"));
}

#[tokio::test]
#[serial]
#[should_panic(expected = "step 'nope' is not defined")]
async fn test_registering_handler_for_unknown_step_panics() {
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("a", false, None)]);
  pipeline.on_root("nope", create_simple_handler("nope", ""));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_pipeline_is_shareable_across_tasks() {
  setup_tracing();
  let mut pipeline = Pipeline::<TestContext, TestError>::new(&[("work", false, None)]);
  pipeline.on_root("work", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      tokio::task::yield_now().await;
      ctx.write().counter += 1;
      Ok::<_, TestError>(PipelineControl::Continue)
    })
  });
  let pipeline = Arc::new(pipeline);

  let mut tasks = Vec::new();
  for _ in 0..16 {
    let pipeline = pipeline.clone();
    tasks.push(tokio::spawn(async move {
      let ctx = ContextData::new(TestContext::default());
      pipeline.run(ctx.clone()).await.map(|_| ctx.read().counter)
    }));
  }
  for task in tasks {
    assert_eq!(task.await.unwrap().unwrap(), 1);
  }
}
