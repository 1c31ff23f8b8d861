use action_flow::{ActionExecutor, DefaultActionExecutor, RecordingSleeper, RetryPolicy};
use action_primitives::{Action, ActionResult, ActionStatus, DefaultActionPrimitives};
use agent_core::{
    AgentLoopConfig, AgentLoopController, ChannelObserver, PlanRequest, PlanSource, Planner,
    PlannerError, ScriptedPlanner, StepStatus, Task, TaskEvent, TaskStatus,
};
use async_trait::async_trait;
use cdp_adapter::mock::{MockDriver, MockElement, MockOp, MAIN_FRAME};
use cdp_adapter::{AdapterErrorKind, PageDriver};
use perceiver_structural::{ElementIndexer, ScrapedPage};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wayfinder_core_types::{ElementId, ErrorKind, ExecCtx, TaskId};
use wayfinder_plan_cache::{ActionPlanCache, InMemoryPlanCache, PlanSignature};

const GOAL: &str = "click the button labeled Submit";

async fn scrape(driver: &MockDriver) -> ScrapedPage {
    let ctx = ExecCtx::new(TaskId::new(), CancellationToken::new());
    ElementIndexer::default().scrape(&ctx, driver).await.unwrap()
}

fn id_by_text(page: &ScrapedPage, text: &str) -> ElementId {
    page.elements()
        .iter()
        .find(|e| e.text == text)
        .map(|e| e.id.clone())
        .unwrap()
}

fn submit_page() -> MockDriver {
    let driver = MockDriver::new("https://shop.test/checkout");
    driver.add(MAIN_FRAME, MockElement::new("h1").text("Checkout"));
    driver.add(
        MAIN_FRAME,
        MockElement::new("button").attr("type", "submit").text("Submit"),
    );
    driver
}

fn controller(
    config: AgentLoopConfig,
    planner: Arc<dyn Planner>,
    sleeper: &RecordingSleeper,
) -> AgentLoopController {
    let executor = DefaultActionExecutor::new(Arc::new(DefaultActionPrimitives::default()))
        .with_sleeper(Arc::new(sleeper.clone()));
    AgentLoopController::new(config, planner, Arc::new(executor))
        .with_sleeper(Arc::new(sleeper.clone()))
}

fn click(id: &ElementId) -> Value {
    json!({"action_type": "click", "element_id": id.as_str()})
}

/// Clicks the element labeled Submit, then completes once a click is on record.
struct LabelPlanner;

#[async_trait]
impl Planner for LabelPlanner {
    async fn plan(&self, request: &PlanRequest<'_>) -> Result<Value, PlannerError> {
        let clicked = request
            .history
            .iter()
            .flat_map(|step| step.results.iter())
            .any(|result| result.success);
        if clicked {
            return Ok(json!({"actions": [{"action": "done", "verification": {"clicked": "Submit"}}]}));
        }
        let target = request
            .page
            .elements()
            .iter()
            .find(|e| e.text == "Submit" && e.is_interactable())
            .ok_or_else(|| PlannerError::Unavailable("no Submit button".into()))?;
        assert!(request.element_tree.contains("Submit"));
        Ok(json!([{"action_type": "click", "element_id": target.id.as_str(), "reasoning": "labeled Submit"}]))
    }
}

#[tokio::test]
async fn test_click_then_complete() {
    let driver = submit_page();
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), Arc::new(LabelPlanner), &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.steps_taken, 2);
    assert_eq!(task.output, Some(json!({"clicked": "Submit"})));
    assert!(task.failure.is_none());
    assert!(task.finished_at.is_some());
    let first = &task.steps[0];
    assert_eq!(first.actions.len(), 1);
    assert!(first.results[0].success);
    assert_eq!(first.actions[0].status, ActionStatus::Completed);
    assert_eq!(first.status, StepStatus::Succeeded);
    assert_eq!(task.steps[1].status, StepStatus::Terminal);
    assert_eq!(driver.calls(MockOp::Click), 1);
}

#[tokio::test]
async fn test_budget_exhaustion_after_exact_step_count() {
    let driver = submit_page();
    let page = scrape(&driver).await;
    let button = id_by_text(&page, "Submit");
    let scrapes_before = driver.calls(MockOp::Enumerate);
    let planner = Arc::new(ScriptedPlanner::new().repeat(json!([click(&button)])));
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default().max_steps(3), planner.clone(), &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::TimedOut);
    assert_eq!(task.failure.as_ref().map(|f| f.kind), Some(ErrorKind::BudgetExhausted));
    assert_eq!(task.steps.len(), 3);
    assert_eq!(task.steps_taken, 3);
    assert_eq!(driver.calls(MockOp::Enumerate) - scrapes_before, 3);
    assert_eq!(planner.calls(), 3);
}

#[tokio::test]
async fn test_halted_batch_skips_the_rest() {
    let driver = submit_page();
    let page = scrape(&driver).await;
    let button = id_by_text(&page, "Submit");
    let planner = Arc::new(
        ScriptedPlanner::new()
            .respond(json!([
                {"action_type": "click", "element_id": "gone"},
                click(&button),
            ]))
            .respond(json!([{"action_type": "complete"}])),
    );
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), planner, &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    let first = &task.steps[0];
    assert_eq!(first.status, StepStatus::Failed);
    assert_eq!(first.results.len(), 1);
    assert_eq!(first.results[0].error_kind, Some(ErrorKind::ElementMissing));
    assert_eq!(first.actions[0].status, ActionStatus::Failed);
    assert_eq!(first.actions[1].status, ActionStatus::Skipped);
    assert_eq!(driver.calls(MockOp::Click), 0);
}

#[tokio::test]
async fn test_consecutive_failed_steps_fail_the_task() {
    let driver = submit_page();
    let planner = Arc::new(
        ScriptedPlanner::new().repeat(json!([{"action_type": "click", "element_id": "gone"}])),
    );
    let sleeper = RecordingSleeper::new();
    let agent = controller(
        AgentLoopConfig::default().consecutive_failures(2),
        planner,
        &sleeper,
    );

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.steps.len(), 2);
    let failure = task.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::ElementMissing);
    assert!(failure.message.contains("2 consecutive steps"));
}

#[tokio::test]
async fn test_actions_beyond_step_limit_are_dropped() {
    let driver = submit_page();
    let page = scrape(&driver).await;
    let button = id_by_text(&page, "Submit");
    let planner = Arc::new(
        ScriptedPlanner::new()
            .respond(json!([click(&button), {"action_type": "complete"}]))
            .respond(json!([{"action_type": "complete"}])),
    );
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default().actions_per_step(1), planner, &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.steps[0].actions.len(), 1);
    assert_eq!(task.steps[0].status, StepStatus::Succeeded);
    assert_eq!(task.steps_taken, 2);
}

#[tokio::test]
async fn test_terminate_carries_planner_errors() {
    let driver = submit_page();
    let planner = Arc::new(ScriptedPlanner::new().respond(json!([{
        "action_type": "terminate",
        "errors": [{"error_code": "login_required", "reasoning": "checkout needs an account"}]
    }])));
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), planner, &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Terminated);
    assert_eq!(task.errors.len(), 1);
    assert_eq!(task.errors[0].error_code, "login_required");
    assert_eq!(task.steps_taken, 1);
}

#[tokio::test]
async fn test_planner_failures_retry_with_their_own_backoff() {
    let driver = submit_page();
    let planner = Arc::new(
        ScriptedPlanner::new()
            .fail(PlannerError::Unavailable("503".into()))
            .respond(json!("not a plan"))
            .respond(json!([{"action_type": "complete"}])),
    );
    let sleeper = RecordingSleeper::new();
    let config = AgentLoopConfig::default().planner_retry(RetryPolicy::new(2, 100, 1_000));
    let agent = controller(config, planner.clone(), &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(planner.calls(), 3);
    assert_eq!(task.steps[0].plan_source, PlanSource::Planner { attempts: 3 });
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test]
async fn test_planner_exhaustion_fails_the_task() {
    let driver = submit_page();
    let planner = Arc::new(ScriptedPlanner::new().repeat(json!({"thoughts": "hmm"})));
    let sleeper = RecordingSleeper::new();
    let config = AgentLoopConfig::default().planner_retry(RetryPolicy::new(2, 100, 1_000));
    let agent = controller(config, planner.clone(), &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(
        task.failure.as_ref().map(|f| f.kind),
        Some(ErrorKind::PlannerUnavailable)
    );
    assert_eq!(planner.calls(), 3);
    assert!(task.steps.is_empty());
}

struct SlowPlanner;

#[async_trait]
impl Planner for SlowPlanner {
    async fn plan(&self, _request: &PlanRequest<'_>) -> Result<Value, PlannerError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(json!([{"action_type": "complete"}]))
    }
}

#[tokio::test]
async fn test_planner_call_is_bounded() {
    let driver = submit_page();
    let sleeper = RecordingSleeper::new();
    let config = AgentLoopConfig::default()
        .planner_timeout(20)
        .planner_retry(RetryPolicy::none());
    let agent = controller(config, Arc::new(SlowPlanner), &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Failed);
    let failure = task.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::PlannerUnavailable);
    assert!(failure.message.contains("20ms"));
}

#[tokio::test]
async fn test_cached_plan_replaces_the_planner_for_a_repeat_task() {
    let cache: Arc<dyn ActionPlanCache> = Arc::new(InMemoryPlanCache::default());
    let sleeper = RecordingSleeper::new();

    let first_driver = submit_page();
    let page = scrape(&first_driver).await;
    let button = id_by_text(&page, "Submit");
    let online = Arc::new(
        ScriptedPlanner::new().respond(json!([click(&button), {"action_type": "complete"}])),
    );
    let first = controller(AgentLoopConfig::default(), online, &sleeper).with_cache(cache.clone());
    let done = first
        .run(first.new_task(GOAL), &first_driver, CancellationToken::new())
        .await;
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(cache.len(), 1);

    let second_driver = submit_page();
    let offline = Arc::new(ScriptedPlanner::new());
    let second = controller(AgentLoopConfig::default(), offline.clone(), &sleeper)
        .with_cache(cache.clone());
    let replayed = second
        .run(second.new_task(GOAL), &second_driver, CancellationToken::new())
        .await;

    assert_eq!(replayed.status, TaskStatus::Completed);
    assert_eq!(offline.calls(), 0);
    assert!(matches!(
        replayed.steps[0].plan_source,
        PlanSource::Cache { exact: true, .. }
    ));
    assert_ne!(replayed.steps[0].actions[0].id, done.steps[0].actions[0].id);
    assert_eq!(second_driver.calls(MockOp::Click), 1);
    assert_eq!(cache.stats().hits, 1);
}

#[tokio::test]
async fn test_repeat_hit_on_unchanged_page_goes_to_planner() {
    let driver = submit_page();
    let page = scrape(&driver).await;
    let button = id_by_text(&page, "Submit");
    let cache: Arc<dyn ActionPlanCache> = Arc::new(InMemoryPlanCache::default());
    cache
        .admit(
            &PlanSignature::from_page(&page, GOAL),
            &[Action::click(button.clone())],
            1.0,
        )
        .unwrap();
    let planner = Arc::new(ScriptedPlanner::new().respond(json!([{"action_type": "complete"}])));
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), planner.clone(), &sleeper).with_cache(cache);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert!(matches!(task.steps[0].plan_source, PlanSource::Cache { .. }));
    assert_eq!(task.steps[1].plan_source, PlanSource::Planner { attempts: 1 });
    assert_eq!(planner.calls(), 1);
    assert_eq!(driver.calls(MockOp::Click), 1);
}

#[tokio::test]
async fn test_failed_replay_demotes_the_plan() {
    let driver = submit_page();
    let page = scrape(&driver).await;
    let cache: Arc<dyn ActionPlanCache> = Arc::new(InMemoryPlanCache::default());
    let signature = PlanSignature::from_page(&page, GOAL);
    cache
        .admit(&signature, &[Action::click("gone")], 0.9)
        .unwrap();
    let planner = Arc::new(ScriptedPlanner::new().respond(json!([{"action_type": "complete"}])));
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), planner, &sleeper).with_cache(cache.clone());

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.steps[0].status, StepStatus::Failed);
    assert_eq!(task.steps[1].plan_source, PlanSource::Planner { attempts: 1 });
    assert_eq!(cache.stats().demotions, 1);
    let stored = cache.get(&signature.key()).unwrap();
    assert_eq!(stored.actions[0].name(), "complete");
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let driver = submit_page();
    let planner = Arc::new(ScriptedPlanner::new());
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), planner.clone(), &sleeper);
    let token = CancellationToken::new();
    token.cancel();

    let task = agent.run(agent.new_task(GOAL), &driver, token).await;

    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.steps_taken, 0);
    assert_eq!(driver.calls(MockOp::Enumerate), 0);
    assert_eq!(planner.calls(), 0);
}

/// Cancels the task from inside the planner call, then fails it.
struct CancellingPlanner(CancellationToken);

#[async_trait]
impl Planner for CancellingPlanner {
    async fn plan(&self, _request: &PlanRequest<'_>) -> Result<Value, PlannerError> {
        self.0.cancel();
        Err(PlannerError::Unavailable("shutting down".into()))
    }
}

#[tokio::test]
async fn test_cancellation_interrupts_planner_backoff() {
    let driver = submit_page();
    let token = CancellationToken::new();
    let sleeper = RecordingSleeper::new();
    let agent = controller(
        AgentLoopConfig::default(),
        Arc::new(CancellingPlanner(token.clone())),
        &sleeper,
    );

    let task = agent.run(agent.new_task(GOAL), &driver, token).await;

    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.failure.map(|f| f.kind), Some(ErrorKind::Cancelled));
    assert!(task.steps.is_empty());
    assert!(sleeper.delays().is_empty());
}

/// Cancels the task while an action is in flight, then lets it run.
struct CancellingExecutor {
    token: CancellationToken,
    inner: DefaultActionExecutor,
}

#[async_trait]
impl ActionExecutor for CancellingExecutor {
    async fn execute(
        &self,
        ctx: &ExecCtx,
        page: &ScrapedPage,
        action: &Action,
        driver: &dyn PageDriver,
    ) -> ActionResult {
        self.token.cancel();
        self.inner.execute(ctx, page, action, driver).await
    }
}

#[tokio::test]
async fn test_cancelled_step_is_not_counted_as_a_failure() {
    let driver = submit_page();
    let submit = id_by_text(&scrape(&driver).await, "Submit");
    let token = CancellationToken::new();
    let executor = CancellingExecutor {
        token: token.clone(),
        inner: DefaultActionExecutor::new(Arc::new(DefaultActionPrimitives::default())),
    };
    let planner = Arc::new(ScriptedPlanner::new().repeat(json!([click(&submit)])));
    let agent = AgentLoopController::new(
        AgentLoopConfig::default().consecutive_failures(1),
        planner,
        Arc::new(executor),
    );

    let task = agent.run(agent.new_task(GOAL), &driver, token).await;

    assert_eq!(task.status, TaskStatus::Cancelled);
    assert_eq!(task.failure.map(|f| f.kind), Some(ErrorKind::Cancelled));
    assert_eq!(task.steps.len(), 1);
    assert_eq!(task.steps[0].status, StepStatus::Failed);
    assert_eq!(task.steps[0].results[0].error_kind, Some(ErrorKind::Cancelled));
    assert_eq!(driver.calls(MockOp::Click), 0);
}

#[tokio::test]
async fn test_start_url_is_opened_first() {
    let driver = submit_page();
    let planner = Arc::new(ScriptedPlanner::new().respond(json!([{"action_type": "complete"}])));
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), planner, &sleeper);

    let task = agent
        .run(
            agent.new_task(GOAL).with_start_url("https://shop.test/checkout"),
            &driver,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(driver.calls(MockOp::Navigate), 1);
}

#[tokio::test]
async fn test_failed_start_navigation_fails_the_task() {
    let driver = submit_page();
    driver.fail_always(MockOp::Navigate, AdapterErrorKind::Navigation);
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), Arc::new(ScriptedPlanner::new()), &sleeper);

    let task = agent
        .run(
            agent.new_task(GOAL).with_start_url("https://shop.test/checkout"),
            &driver,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(
        task.failure.map(|f| f.kind),
        Some(ErrorKind::NavigationFailed)
    );
    assert_eq!(driver.calls(MockOp::Enumerate), 0);
}

#[tokio::test]
async fn test_lost_root_frame_fails_the_task() {
    let driver = submit_page();
    driver.fail_always(MockOp::Enumerate, AdapterErrorKind::Detached);
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), Arc::new(ScriptedPlanner::new()), &sleeper);

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.failure.map(|f| f.kind), Some(ErrorKind::ScrapeFailed));
    assert_eq!(task.steps_taken, 0);
}

#[tokio::test]
async fn test_observer_sees_lifecycle_in_order() {
    let driver = submit_page();
    let (observer, mut events) = ChannelObserver::channel();
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), Arc::new(LabelPlanner), &sleeper)
        .with_observer(Arc::new(observer));

    let task = agent
        .run(agent.new_task(GOAL), &driver, CancellationToken::new())
        .await;

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.task_id(), &task.id);
        seen.push(match event {
            TaskEvent::StatusChanged { to, .. } => format!("status:{to}"),
            TaskEvent::StepRecorded { step, .. } => format!("step:{}", step.index),
        });
    }
    assert_eq!(
        seen,
        vec!["status:running", "step:0", "step:1", "status:completed"]
    );
}

#[tokio::test]
async fn test_tasks_run_concurrently_on_separate_sessions() {
    let cache: Arc<dyn ActionPlanCache> = Arc::new(InMemoryPlanCache::default());
    let sleeper = RecordingSleeper::new();
    let agent = controller(AgentLoopConfig::default(), Arc::new(LabelPlanner), &sleeper)
        .with_cache(cache);
    let (left, right) = (submit_page(), submit_page());

    let (a, b) = tokio::join!(
        agent.run(agent.new_task(GOAL), &left, CancellationToken::new()),
        agent.run(Task::new(GOAL), &right, CancellationToken::new()),
    );

    assert_eq!(a.status, TaskStatus::Completed);
    assert_eq!(b.status, TaskStatus::Completed);
    assert_ne!(a.id, b.id);
    assert_eq!(left.calls(MockOp::Click), 1);
    assert_eq!(right.calls(MockOp::Click), 1);
}
