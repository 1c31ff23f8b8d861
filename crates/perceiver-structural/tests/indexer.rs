use std::sync::Arc;

use cdp_adapter::mock::{MockDriver, MockElement, MockOp, MAIN_FRAME};
use cdp_adapter::AdapterErrorKind;
use perceiver_structural::{
    ElementIndexer, FrameCandidate, IndexOptions, ScrapeError, ScrapedPage, MARKER_ATTRIBUTE,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;
use wayfinder_core_types::{ErrorKind, ExecCtx, FrameId, TaskId};

fn ctx() -> ExecCtx {
    ExecCtx::new(TaskId::new(), CancellationToken::new())
}

fn checkout_page() -> MockDriver {
    let driver = MockDriver::new("https://shop.test/checkout");
    driver.add(MAIN_FRAME, MockElement::new("h1").text("Checkout"));
    driver.add(MAIN_FRAME, MockElement::new("input").attr("name", "email").attr("type", "email"));
    driver.add_frame(MAIN_FRAME, "pay", MockElement::new("iframe").attr("id", "pay"));
    driver.add(MAIN_FRAME, MockElement::new("button").attr("type", "submit").text("Submit"));
    driver.add_frame("pay", "promo", MockElement::new("iframe").attr("name", "promo"));
    driver.add_frame("pay", "card", MockElement::new("iframe").attr("name", "card"));
    driver.add("pay", MockElement::new("span").text("Secure payment"));
    driver.add("card", MockElement::new("input").attr("name", "cc-number"));
    driver
}

fn ids(page: &ScrapedPage) -> Vec<String> {
    page.elements().iter().map(|e| e.id.0.clone()).collect()
}

#[tokio::test]
async fn test_ids_are_stable_across_scrapes() {
    let driver = checkout_page();
    let indexer = ElementIndexer::new(IndexOptions::default());

    let first = indexer.scrape(&ctx(), &driver).await.unwrap();
    let second = indexer.scrape(&ctx(), &driver).await.unwrap();

    assert_eq!(first.len(), 8);
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn test_text_change_only_moves_that_element() {
    let driver = MockDriver::new("https://shop.test/");
    driver.add(MAIN_FRAME, MockElement::new("button").text("Save"));
    let banner = driver.add(MAIN_FRAME, MockElement::new("p").text("3 items"));
    let indexer = ElementIndexer::new(IndexOptions::default());

    let before = indexer.scrape(&ctx(), &driver).await.unwrap();
    driver.set_text(banner, "4 items");
    let after = indexer.scrape(&ctx(), &driver).await.unwrap();

    assert_eq!(before.elements()[0].id, after.elements()[0].id);
    assert_ne!(before.elements()[1].id, after.elements()[1].id);
}

#[tokio::test]
async fn test_nested_frames_are_numbered_by_position() {
    let driver = checkout_page();
    let page = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap();

    let card_input = page
        .elements()
        .iter()
        .find(|e| e.attribute("name") == Some("cc-number"))
        .unwrap();
    assert_eq!(card_input.frame_id.as_str(), "iframe-1-2");

    let path: Vec<String> = page
        .frame_path(&card_input.frame_id)
        .unwrap()
        .into_iter()
        .map(|f| f.0)
        .collect();
    assert_eq!(path, vec!["main", "iframe-1", "iframe-1-2"]);

    let outer_host = page
        .elements()
        .iter()
        .find(|e| e.attribute("id") == Some("pay"))
        .unwrap();
    assert_eq!(outer_host.hosts_frame, Some(FrameId::from("iframe-1")));
    let node = page.frame(&"iframe-1".into()).unwrap();
    assert_eq!(node.host.as_ref(), Some(&outer_host.id));
    assert_eq!(node.locator.as_deref(), page.locator(&outer_host.id));
}

#[tokio::test]
async fn test_markers_are_written_and_used_as_locators() {
    let driver = MockDriver::new("https://shop.test/");
    let button = driver.add(MAIN_FRAME, MockElement::new("button").text("Go"));
    let page = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap();

    let id = page.elements()[0].id.clone();
    assert_eq!(driver.attribute_of(button, MARKER_ATTRIBUTE), Some(id.0.clone()));
    assert_eq!(
        page.locator(&id),
        Some(format!("[{}=\"{}\"]", MARKER_ATTRIBUTE, id).as_str())
    );
    assert!(page.elements()[0].attribute(MARKER_ATTRIBUTE).is_none());
}

#[tokio::test]
async fn test_unmarked_scrape_falls_back_to_dom_paths() {
    let driver = MockDriver::new("https://shop.test/");
    let button = driver.add(MAIN_FRAME, MockElement::new("button").text("Go"));
    let indexer = ElementIndexer::new(IndexOptions::default().with_marking(false));
    let page = indexer.scrape(&ctx(), &driver).await.unwrap();

    let id = &page.elements()[0].id;
    assert_eq!(page.locator(id), Some(driver.dom_path_of(button).as_str()));
    assert_eq!(driver.calls(MockOp::SetMarkers), 0);
}

#[tokio::test]
async fn test_detached_child_frame_is_skipped() {
    let driver = checkout_page();
    driver.detach_frame("pay");
    let page = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap();

    assert_eq!(page.len(), 4);
    assert!(page.frame(&"iframe-1".into()).is_none());
    assert!(page.elements().iter().all(|e| e.hosts_frame.is_none()));
}

#[tokio::test]
async fn test_null_content_frame_is_skipped() {
    let driver = MockDriver::new("https://shop.test/");
    let host = driver.add_frame(MAIN_FRAME, "ad", MockElement::new("iframe"));
    driver.add("ad", MockElement::new("a").text("Buy"));
    driver.null_content_frame(host);

    let page = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page.frames().count(), 1);
}

#[tokio::test]
async fn test_root_failure_is_fatal() {
    let driver = checkout_page();
    driver.fail_always(MockOp::Enumerate, AdapterErrorKind::Detached);
    let err = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap_err();
    assert!(matches!(err, ScrapeError::RootFrameGone(_)));
    assert_eq!(err.kind(), ErrorKind::ScrapeFailed);
}

#[tokio::test]
async fn test_hidden_elements_are_optional() {
    let driver = MockDriver::new("https://shop.test/");
    driver.add(MAIN_FRAME, MockElement::new("button").text("Shown"));
    driver.add(MAIN_FRAME, MockElement::new("button").text("Hidden").hidden());

    let visible_only = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap();
    assert_eq!(visible_only.len(), 1);

    let everything = ElementIndexer::new(IndexOptions::default().with_hidden(true))
        .scrape(&ctx(), &driver)
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);
    assert!(!everything.elements()[1].visible);
}

#[tokio::test]
async fn test_frame_filter_and_depth_limit() {
    let driver = checkout_page();
    let no_card = ElementIndexer::default()
        .with_frame_filter(Arc::new(|c: &FrameCandidate<'_>| c.host.attribute("name") == Some("card")));
    let page = no_card.scrape(&ctx(), &driver).await.unwrap();
    assert!(page.frame(&"iframe-1-1".into()).is_some());
    assert!(page.frame(&"iframe-1-2".into()).is_none());

    let shallow = ElementIndexer::new(IndexOptions {
        max_frame_depth: 0,
        ..IndexOptions::default()
    });
    let page = shallow.scrape(&ctx(), &driver).await.unwrap();
    assert_eq!(page.frames().count(), 1);
}

#[tokio::test]
async fn test_scrolling_screenshots_restore_position() {
    let driver = MockDriver::new("https://shop.test/");
    driver.add(MAIN_FRAME, MockElement::new("button").text("Go"));
    driver.set_document_height(2000.0);

    let indexer = ElementIndexer::new(IndexOptions::default().with_screenshots(5));
    let page = indexer.scrape(&ctx(), &driver).await.unwrap();

    let offsets: Vec<f64> = page.screenshots().iter().map(|s| s.scroll_y).collect();
    assert_eq!(offsets, vec![0.0, 800.0, 1200.0]);
    assert_eq!(page.screenshots()[2].png, b"png@1200".to_vec());
    assert_eq!(
        driver.events().last(),
        Some(&cdp_adapter::mock::MockEvent::Scrolled(0.0))
    );
}

#[tokio::test]
async fn test_screenshot_failure_is_not_fatal() {
    let driver = MockDriver::new("https://shop.test/");
    driver.add(MAIN_FRAME, MockElement::new("button").text("Go"));
    driver.fail_always(MockOp::Screenshot, AdapterErrorKind::Timeout);

    let page = ElementIndexer::default().scrape(&ctx(), &driver).await.unwrap();
    assert_eq!(page.len(), 1);
    assert!(page.screenshots().is_empty());
}

#[tokio::test]
async fn test_cancelled_context_stops_scrape() {
    let driver = checkout_page();
    let token = CancellationToken::new();
    token.cancel();
    let ctx = ExecCtx::new(TaskId::new(), token);
    let err = ElementIndexer::default().scrape(&ctx, &driver).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}
