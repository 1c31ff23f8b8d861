//! Contract tests for the Chromium driver. They need Chrome/Chromium on the
//! host and are ignored by default.

use std::env;
use std::time::Duration;

use cdp_adapter::{CdpConfig, ChromiumDriver, FrameHandle, PageDriver, SelectBy};

fn contract_enabled() -> bool {
    env::var("WAYFINDER_CHROME_CONTRACT")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

const FORM_PAGE: &str = "data:text/html,<html><body>\
<input id='phone' type='tel'>\
<select id='size'><option value='s'>Small</option><option value='l'>Large</option></select>\
<button id='go'>Submit</button></body></html>";

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set WAYFINDER_CHROME_CONTRACT=1"]
async fn contract_enumerate_fill_and_select() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (WAYFINDER_CHROME_CONTRACT not enabled)");
        return;
    }

    let driver = ChromiumDriver::launch(&CdpConfig::default())
        .await
        .expect("launch chromium");
    driver
        .navigate(FORM_PAGE, Duration::from_secs(15))
        .await
        .expect("navigate succeeds");

    let top = FrameHandle::top();
    let elements = driver.enumerate_elements(&top).await.expect("enumerate");
    assert!(elements.iter().any(|el| el.tag == "button" && el.text == "Submit"));

    let phone = driver.query_all(&top, "#phone").await.expect("query")[0].clone();
    driver
        .fill(&phone, "5551234567", Duration::from_secs(5))
        .await
        .expect("fill");
    assert_eq!(driver.input_value(&phone).await.expect("value"), "5551234567");

    let size = driver.query_all(&top, "#size").await.expect("query")[0].clone();
    let selected = driver
        .select_native(&size, &SelectBy::Label("large".into()), Duration::from_secs(5))
        .await
        .expect("select");
    assert_eq!(selected.value, "l");

    driver.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set WAYFINDER_CHROME_CONTRACT=1"]
async fn contract_markers_round_trip() {
    if !contract_enabled() {
        eprintln!("skipping CDP contract test (WAYFINDER_CHROME_CONTRACT not enabled)");
        return;
    }

    let driver = ChromiumDriver::launch(&CdpConfig::default())
        .await
        .expect("launch chromium");
    driver
        .navigate(FORM_PAGE, Duration::from_secs(15))
        .await
        .expect("navigate succeeds");

    let top = FrameHandle::top();
    let elements = driver.enumerate_elements(&top).await.expect("enumerate");
    let marks: Vec<(String, String)> = elements
        .iter()
        .enumerate()
        .map(|(idx, el)| (el.dom_path.clone(), format!("e{idx}")))
        .collect();
    let marked = driver
        .set_markers(&top, "data-wayfinder-id", &marks)
        .await
        .expect("markers");
    assert_eq!(marked, elements.len());
    let hits = driver
        .query_all(&top, "[data-wayfinder-id=\"e0\"]")
        .await
        .expect("query marker");
    assert_eq!(hits.len(), 1);

    driver.shutdown().await;
}
