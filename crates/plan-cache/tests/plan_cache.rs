use action_primitives::{Action, OptionSelection, UserDefinedError};
use cdp_adapter::mock::{MockDriver, MockElement, MAIN_FRAME};
use perceiver_structural::{ElementIndexer, ScrapedPage};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wayfinder_core_types::{ExecCtx, TaskId};
use wayfinder_plan_cache::{
    ActionPlanCache, Admission, AdmissionError, CacheConfig, InMemoryPlanCache, PlanSignature,
};

async fn checkout_page(url: &str) -> ScrapedPage {
    let driver = MockDriver::new(url);
    driver.add(MAIN_FRAME, MockElement::new("h1").text("Checkout"));
    driver.add(MAIN_FRAME, MockElement::new("input").attr("type", "email").attr("name", "email"));
    driver.add(MAIN_FRAME, MockElement::new("select").attr("name", "country"));
    driver.add(MAIN_FRAME, MockElement::new("button").text("Submit"));
    let ctx = ExecCtx::new(TaskId::new(), CancellationToken::new());
    ElementIndexer::default().scrape(&ctx, &driver).await.unwrap()
}

fn plan() -> Vec<Action> {
    vec![
        Action::input_text("a1b2c3d4", "ada@example.com"),
        Action::select_option("e5f6a7b8", OptionSelection::by_value("US")),
        Action::click("c9d0e1f2"),
    ]
}

#[tokio::test]
async fn test_round_trip_preserves_order() {
    let cache = InMemoryPlanCache::default();
    let page = checkout_page("https://shop.test/checkout").await;
    let signature = PlanSignature::from_page(&page, "Place the order");

    let actions = plan();
    assert_eq!(cache.admit(&signature, &actions, 1.0), Ok(Admission::Inserted));
    let hit = cache.lookup(&signature).unwrap();

    assert!(hit.exact);
    assert_eq!(hit.actions, actions);
    let kinds: Vec<&str> = hit.actions.iter().map(Action::name).collect();
    assert_eq!(kinds, vec!["input_text", "select_option", "click"]);
    assert_eq!(hit.key, signature.key());
}

#[tokio::test]
async fn test_readmission_updates_running_rate() {
    let cache = InMemoryPlanCache::default();
    let page = checkout_page("https://shop.test/checkout").await;
    let signature = PlanSignature::from_page(&page, "Place the order");

    cache.admit(&signature, &plan(), 1.0).unwrap();
    assert_eq!(cache.admit(&signature, &plan(), 0.9), Ok(Admission::Updated));

    assert_eq!(cache.len(), 1);
    let entry = cache.get(&signature.key()).unwrap();
    assert_eq!(entry.observations, 2);
    assert!((entry.success_rate - 0.95).abs() < 1e-9);
    assert_eq!(entry.actions.len(), 3);
}

#[tokio::test]
async fn test_id_segments_share_an_entry() {
    let cache = InMemoryPlanCache::default();
    let first = checkout_page("https://shop.test/orders/1001/pay?retry=1").await;
    let second = checkout_page("https://shop.test/orders/2002/pay").await;

    cache
        .admit(&PlanSignature::from_page(&first, "pay now"), &plan(), 1.0)
        .unwrap();
    let hit = cache.lookup(&PlanSignature::from_page(&second, "Pay   NOW")).unwrap();
    assert!(hit.exact);
}

#[tokio::test]
async fn test_similar_goal_is_a_near_hit() {
    let cache = InMemoryPlanCache::default();
    let page = checkout_page("https://shop.test/checkout").await;
    cache
        .admit(&PlanSignature::from_page(&page, "click submit button"), &plan(), 1.0)
        .unwrap();

    let hit = cache
        .lookup(&PlanSignature::from_page(&page, "click submit button please"))
        .unwrap();
    assert!(!hit.exact);
    assert!(hit.similarity >= 0.85);
    assert_eq!(cache.stats().similarity_hits, 1);
}

#[tokio::test]
async fn test_different_goal_on_same_form_misses() {
    let driver = MockDriver::new("https://shop.test/account/settings");
    for name in ["first", "last", "email", "phone", "street", "city", "zip", "country"] {
        driver.add(MAIN_FRAME, MockElement::new("input").attr("type", "text").attr("name", name));
    }
    driver.add(MAIN_FRAME, MockElement::new("button").text("Save"));
    driver.add(MAIN_FRAME, MockElement::new("button").text("Delete account"));
    let ctx = ExecCtx::new(TaskId::new(), CancellationToken::new());
    let page = ElementIndexer::default().scrape(&ctx, &driver).await.unwrap();

    let cache = InMemoryPlanCache::default();
    cache
        .admit(
            &PlanSignature::from_page(&page, "delete my account"),
            &[Action::click("del")],
            1.0,
        )
        .unwrap();

    assert!(cache
        .lookup(&PlanSignature::from_page(&page, "save my profile"))
        .is_none());
    assert_eq!(cache.stats().similarity_hits, 0);
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn test_unrelated_context_misses() {
    let cache = InMemoryPlanCache::default();
    let page = checkout_page("https://shop.test/checkout").await;
    cache
        .admit(&PlanSignature::from_page(&page, "place the order"), &plan(), 1.0)
        .unwrap();

    let driver = MockDriver::new("https://mail.example/inbox");
    driver.add(MAIN_FRAME, MockElement::new("textarea").attr("name", "body"));
    let ctx = ExecCtx::new(TaskId::new(), CancellationToken::new());
    let other = ElementIndexer::default().scrape(&ctx, &driver).await.unwrap();

    assert!(cache
        .lookup(&PlanSignature::from_page(&other, "archive every newsletter"))
        .is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn test_admission_rules() {
    let cache = InMemoryPlanCache::default();
    let page = checkout_page("https://shop.test/checkout").await;
    let signature = PlanSignature::from_page(&page, "place the order");

    assert_eq!(
        cache.admit(&signature, &plan(), 0.5),
        Err(AdmissionError::LowSuccessRate {
            rate: 0.5,
            threshold: 0.8
        })
    );
    assert_eq!(
        cache.admit(&signature, &plan(), 0.8),
        Err(AdmissionError::LowSuccessRate {
            rate: 0.8,
            threshold: 0.8
        })
    );
    assert_eq!(cache.admit(&signature, &[], 1.0), Err(AdmissionError::Empty));
    let giving_up = vec![Action::terminate(vec![UserDefinedError {
        error_code: "captcha".into(),
        reasoning: "blocked".into(),
        confidence: None,
    }])];
    assert_eq!(cache.admit(&signature, &giving_up, 1.0), Err(AdmissionError::Terminates));
    assert!(cache.is_empty());
    assert_eq!(cache.stats().rejections, 4);
}

#[tokio::test]
async fn test_failed_replays_demote_the_entry() {
    let cache = InMemoryPlanCache::default();
    let page = checkout_page("https://shop.test/checkout").await;
    let signature = PlanSignature::from_page(&page, "place the order");
    let key = signature.key();
    cache.admit(&signature, &plan(), 0.9).unwrap();

    let after_success = cache.record_outcome(&key, true).unwrap();
    assert!((after_success - 0.95).abs() < 1e-9);
    let after_one_failure = cache.record_outcome(&key, false).unwrap();
    assert!((after_one_failure - 0.95 * 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(cache.record_outcome(&key, false), None);

    assert!(cache.get(&key).is_none());
    assert!(cache.lookup(&signature).is_none());
    assert_eq!(cache.stats().demotions, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admissions_keep_every_observation() {
    let cache = Arc::new(InMemoryPlanCache::new(CacheConfig::default()));
    let page = checkout_page("https://shop.test/checkout").await;
    let signature = PlanSignature::from_page(&page, "place the order");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let signature = signature.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                cache.admit(&signature, &plan(), 1.0).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&signature.key()).unwrap().observations, 200);
    assert_eq!(cache.stats().admissions, 200);
}
