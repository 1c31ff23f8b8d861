use action_locator::{ElementResolver, FrameResolver, HopFailure, LocatorError};
use cdp_adapter::mock::{MockDriver, MockElement, MockOp, NodeId, MAIN_FRAME};
use perceiver_structural::{ElementIndexer, ScrapedPage, MARKER_ATTRIBUTE};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wayfinder_core_types::{ElementId, ErrorKind, ExecCtx, FrameId, TaskId};

struct Fixture {
    driver: MockDriver,
    page: ScrapedPage,
    outer_host: NodeId,
    inner_host: NodeId,
    card_input: NodeId,
}

impl Fixture {
    /// `main` > `iframe-1` > `iframe-1-2` > card number input.
    async fn nested() -> Self {
        let driver = MockDriver::new("https://shop.test/checkout");
        driver.add(MAIN_FRAME, MockElement::new("h1").text("Checkout"));
        let outer_host = driver.add_frame(MAIN_FRAME, "pay", MockElement::new("iframe").attr("id", "pay"));
        driver.add_frame("pay", "promo", MockElement::new("iframe").attr("name", "promo"));
        let inner_host = driver.add_frame("pay", "card", MockElement::new("iframe").attr("name", "card"));
        let card_input = driver.add("card", MockElement::new("input").attr("name", "cc-number"));
        let page = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap();
        Self {
            driver,
            page,
            outer_host,
            inner_host,
            card_input,
        }
    }

    fn id_of(&self, name: &str) -> ElementId {
        self.page
            .elements()
            .iter()
            .find(|e| e.attribute("name") == Some(name))
            .map(|e| e.id.clone())
            .unwrap()
    }
}

fn ctx() -> ExecCtx {
    ExecCtx::new(TaskId::new(), CancellationToken::new())
}

#[tokio::test]
async fn test_nested_element_resolves_after_each_hop() {
    let fx = Fixture::nested().await;
    let id = fx.id_of("cc-number");
    let content_before = fx.driver.calls(MockOp::ContentFrame);
    let query_before = fx.driver.calls(MockOp::QueryAll);

    let target = FrameResolver::new()
        .resolve(&ctx(), &fx.page, &id, &fx.driver)
        .await
        .unwrap();

    let path: Vec<&str> = target.frame_path.iter().map(FrameId::as_str).collect();
    assert_eq!(path, vec!["main", "iframe-1", "iframe-1-2"]);
    assert_eq!(target.hops(), 2);
    assert_eq!(target.frame.depth(), 2);
    assert_eq!(fx.driver.calls(MockOp::ContentFrame) - content_before, 2);
    assert_eq!(fx.driver.calls(MockOp::QueryAll) - query_before, 3);

    let value = fx
        .driver
        .attribute_of(fx.card_input, MARKER_ATTRIBUTE);
    assert_eq!(value, Some(id.0.clone()));
}

#[tokio::test]
async fn test_null_content_frame_names_second_hop() {
    let fx = Fixture::nested().await;
    let id = fx.id_of("cc-number");
    fx.driver.null_content_frame(fx.inner_host);

    let err = FrameResolver::new()
        .resolve(&ctx(), &fx.page, &id, &fx.driver)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        LocatorError::FrameHop {
            hop: 2,
            frame: FrameId::from("iframe-1-2"),
            reason: HopFailure::ContentFrameNull,
        }
    );
    assert_eq!(err.kind(), ErrorKind::FrameResolutionFailed);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_missing_first_frame_stops_descent() {
    let fx = Fixture::nested().await;
    let id = fx.id_of("cc-number");
    fx.driver.remove(fx.outer_host);
    let content_before = fx.driver.calls(MockOp::ContentFrame);

    let err = FrameResolver::new()
        .resolve(&ctx(), &fx.page, &id, &fx.driver)
        .await
        .unwrap_err();

    assert_eq!(err.hop(), Some(1));
    assert!(matches!(
        err,
        LocatorError::FrameHop {
            reason: HopFailure::FrameElementMissing,
            ..
        }
    ));
    assert_eq!(fx.driver.calls(MockOp::ContentFrame), content_before);
}

#[tokio::test]
async fn test_detached_parent_names_hop() {
    let fx = Fixture::nested().await;
    let id = fx.id_of("cc-number");
    fx.driver.detach_frame("pay");

    let err = FrameResolver::new()
        .resolve(&ctx(), &fx.page, &id, &fx.driver)
        .await
        .unwrap_err();
    assert_eq!(err.hop(), Some(2));
    assert!(matches!(
        err,
        LocatorError::FrameHop {
            reason: HopFailure::Detached(_),
            ..
        }
    ));
}

#[tokio::test]
async fn test_zero_matches_is_not_retryable() {
    let fx = Fixture::nested().await;
    let id = fx.id_of("cc-number");
    fx.driver.remove(fx.card_input);

    let err = FrameResolver::new()
        .resolve(&ctx(), &fx.page, &id, &fx.driver)
        .await
        .unwrap_err();
    assert_eq!(err, LocatorError::NoMatch { id });
    assert_eq!(err.kind(), ErrorKind::ElementMissing);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_multiple_matches_never_pick_one() {
    let fx = Fixture::nested().await;
    let id = fx.id_of("cc-number");
    fx.driver
        .add("card", MockElement::new("input").attr(MARKER_ATTRIBUTE, id.0.clone()));

    let err = FrameResolver::new()
        .resolve(&ctx(), &fx.page, &id, &fx.driver)
        .await
        .unwrap_err();
    assert_eq!(err, LocatorError::AmbiguousMatch { id, count: 2 });
    assert_eq!(err.kind(), ErrorKind::AmbiguousElement);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unknown_element_id() {
    let fx = Fixture::nested().await;
    let err = FrameResolver::new()
        .resolve(&ctx(), &fx.page, &ElementId::from("ffffffff"), &fx.driver)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ElementMissing);
}

#[tokio::test]
async fn test_cancelled_before_resolution() {
    let fx = Fixture::nested().await;
    let id = fx.id_of("cc-number");
    let token = CancellationToken::new();
    token.cancel();
    let ctx = ExecCtx::new(TaskId::new(), token);

    let err = FrameResolver::new()
        .resolve(&ctx, &fx.page, &id, &fx.driver)
        .await
        .unwrap_err();
    assert_eq!(err, LocatorError::Cancelled);
}
