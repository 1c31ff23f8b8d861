//! Click primitive - direct navigation for plain anchors, dispatched click otherwise

use action_locator::ResolvedTarget;
use cdp_adapter::{ClickOptions, PageDriver};
use tracing::{debug, warn};
use url::Url;

use crate::{errors::ActionError, interaction::Dispatch, primitives::DefaultActionPrimitives};

pub(super) async fn execute_navigate(
    primitives: &DefaultActionPrimitives,
    driver: &dyn PageDriver,
    url: &Url,
) -> Result<Dispatch, ActionError> {
    let url_before = driver.current_url().await?;
    debug!(from = %url_before, to = %url, "navigating directly instead of clicking");
    driver
        .navigate(url.as_str(), primitives.timeouts().navigation())
        .await?;
    let url_after = match driver.current_url().await {
        Ok(url) => url,
        Err(err) => {
            warn!(%err, "url unavailable after navigation");
            url.to_string()
        }
    };
    Ok(Dispatch::Navigated {
        url_before,
        url_after,
        target: url.to_string(),
    })
}

pub(super) async fn execute_click(
    primitives: &DefaultActionPrimitives,
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
    options: &ClickOptions,
    download: bool,
) -> Result<Dispatch, ActionError> {
    let url_before = driver.current_url().await?;
    driver
        .click(&target.handle, options, primitives.timeouts().action())
        .await?;
    let url_after = match driver.current_url().await {
        Ok(url) => url,
        Err(err) => {
            warn!(%err, "url unavailable after click");
            url_before.clone()
        }
    };
    Ok(Dispatch::Clicked {
        url_before,
        url_after,
        download,
    })
}

/// The page left its old URL or sits on the destination.
pub(super) async fn verify_navigation(
    driver: &dyn PageDriver,
    url_before: &str,
    destination: &str,
) -> Result<(), ActionError> {
    let current = driver.current_url().await?;
    if current != url_before || current == destination {
        Ok(())
    } else {
        Err(ActionError::Verification(format!(
            "still on {current} after navigating to {destination}"
        )))
    }
}
