//! Webhook URL validation.

use reqwest::Url;
use tracing::warn;

const WEBHOOK_PATH_SUFFIX: &str = "/webhook";

/// Returns `true` when `url` is usable as a bank webhook target. Checks run in
/// order and stop at the first failure, which is logged with its reason.
pub fn validate_webhook_url(url: &str) -> bool {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        warn!("webhook url is empty");
        return false;
    }

    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(url = trimmed, %err, "webhook url is not an absolute url");
            return false;
        }
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        warn!(url = trimmed, scheme = parsed.scheme(), "webhook url must use http or https");
        return false;
    }

    if !parsed.host_str().is_some_and(|host| host.contains('.')) {
        warn!(url = trimmed, "webhook url host does not look like a domain");
        return false;
    }

    if !parsed.path().ends_with(WEBHOOK_PATH_SUFFIX) {
        warn!(url = trimmed, "webhook url path must end with `/webhook`");
        return false;
    }

    true
}
