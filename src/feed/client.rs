use reqwest::redirect::Policy;
use std::time::Duration;

/// User agent sent with feed requests unless the config overrides it.
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Maximum redirect hops followed for a single feed request.
const MAX_REDIRECTS: usize = 3;

/// Builds the HTTP client shared by every feed fetch in a run.
///
/// `timeout` is also applied per request by the fetcher; setting it here
/// covers connection setup and redirects as well.
pub fn build_client(
    timeout: Duration,
    user_agent: Option<&str>,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .redirect(create_redirect_policy())
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .build()
}

/// Limits redirects to [`MAX_REDIRECTS`] hops and rejects loops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev.as_str() == url.as_str()) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}
