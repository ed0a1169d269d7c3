//! §4.4.3 — `RobotsCache`: a `PoolMap` of parsed robots.txt policies keyed
//! by origin, translating the fetched `/robots.txt` response into a policy
//! via the status→policy table below.

use crate::error::CrawlError;
use crate::pooling::PoolMap;
use crate::worker::fetch_client::FetchClient;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use texting_robots::Robot;

const MAX_PER_POOL: usize = 1;
const IDLE_TTL: Duration = Duration::from_secs(600);

/// A resolved robots.txt policy for one origin.
pub enum RobotsPolicy {
    Parsed(Robot),
    AllowAll,
    DenyAll,
}

impl RobotsPolicy {
    #[must_use]
    pub fn can_fetch(&self, _user_agent: &str, path: &str) -> bool {
        match self {
            Self::Parsed(robot) => robot.allowed(path),
            Self::AllowAll => true,
            Self::DenyAll => false,
        }
    }
}

type Factory = Arc<
    dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<Arc<RobotsPolicy>, CrawlError>> + Send>>
        + Send
        + Sync,
>;

pub struct RobotsCache {
    inner: PoolMap<String, Arc<RobotsPolicy>, Factory>,
}

impl RobotsCache {
    #[must_use]
    pub fn new(fetch_client: Arc<FetchClient>, user_agent: String) -> Self {
        let factory: Factory = Arc::new(move |origin: String| {
            let fetch_client = Arc::clone(&fetch_client);
            let user_agent = user_agent.clone();
            Box::pin(async move { fetch_robots_policy(&fetch_client, &origin, &user_agent).await })
        });
        Self {
            inner: PoolMap::new(factory, MAX_PER_POOL, Some(IDLE_TTL)),
        }
    }

    /// Consults the cached policy for `origin` (`scheme://authority`),
    /// constructing it on first use. Concurrent lookups for the same
    /// origin share one policy because `maxPerPool = 1` serializes access.
    pub async fn ask_robots(&self, origin: String, user_agent: &str, path: &str) -> Result<bool, CrawlError> {
        let guard = self.inner.scoped(origin).await?;
        Ok(guard.can_fetch(user_agent, path))
    }
}

async fn fetch_robots_policy(
    fetch_client: &FetchClient,
    origin: &str,
    user_agent: &str,
) -> Result<Arc<RobotsPolicy>, CrawlError> {
    use crate::worker::fetch_client::FetchOutcomeOrCancel;

    let robots_url = format!("{origin}/robots.txt");
    let outcome = match fetch_client.fetch(&robots_url).await {
        Ok(FetchOutcomeOrCancel::Outcome(outcome)) => outcome,
        Ok(FetchOutcomeOrCancel::Cancelled) => {
            return Err(CrawlError::Robots("worker closed during robots fetch".into()))
        }
        Err(_dead) => return Err(CrawlError::Robots("io-worker subprocess is dead".into())),
    };

    let status = outcome.status_code.unwrap_or(0);
    status_to_policy(status, &outcome.content, user_agent).map(Arc::new)
}

/// Status -> policy: 2xx parses the body, 401/403 deny all, 404 allows
/// all, any other >=400 optimistically allows all, and 1xx/3xx deny all.
fn status_to_policy(status: u16, body: &[u8], user_agent: &str) -> Result<RobotsPolicy, CrawlError> {
    match status {
        200..=299 => match Robot::new(user_agent, body) {
            Ok(robot) => Ok(RobotsPolicy::Parsed(robot)),
            Err(error) => Err(CrawlError::Robots(error.to_string())),
        },
        401 | 403 => Ok(RobotsPolicy::DenyAll),
        404 => Ok(RobotsPolicy::AllowAll),
        400..=599 => Ok(RobotsPolicy::AllowAll),
        _ => Ok(RobotsPolicy::DenyAll),
    }
}
