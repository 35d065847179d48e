use crate::clock::{ClockHandle, RateLimiter, SystemClock};
use crate::credentials::Credentials;
use crate::error::{ErrorKind, Result};
use crate::payload::{CatalogHash, GameDetail, parse_game_detail, parse_game_list};
use crate::transport::{HttpTransport, Response, TransportHandle};
use rasort_rom::System;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::instrument;

/// Bulk listing of every game (and its hashes) for one console.
pub const GAME_LIST_ENDPOINT: &str = "API_GetGameList.php";
/// Details, including the achievement count, of a single game.
pub const GAME_INFO_ENDPOINT: &str = "API_GetGameInfoAndUserProgress.php";
/// Attempts per request, including the first one.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Client for the RetroAchievements catalog.
///
/// Every request, including retries, passes through a shared [`RateLimiter`],
/// so no two requests ever start less than a second apart. Rate limiting and
/// transient failures are retried up to the configured number of attempts;
/// everything else is returned straight away.
pub struct CatalogClient {
    transport: TransportHandle,
    credentials: Credentials,
    limiter: RateLimiter,
    attempts: u32,
    requests: AtomicU64,
}

impl CatalogClient {
    pub fn new(transport: TransportHandle, credentials: Credentials, clock: ClockHandle) -> Self {
        Self {
            transport,
            credentials,
            limiter: RateLimiter::new(clock),
            attempts: DEFAULT_ATTEMPTS,
            requests: AtomicU64::new(0),
        }
    }

    /// A client talking to `base_url` over HTTP in real time.
    pub fn http(base_url: &str, timeout: Duration, credentials: Credentials) -> Result<Self> {
        let transport = HttpTransport::new(base_url, timeout)?;
        Ok(Self::new(Arc::new(transport), credentials, Arc::new(SystemClock)))
    }

    /// At least one attempt is always made.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Number of requests sent so far, retries included.
    pub fn calls(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Every known content hash for `system`, with the game it belongs to.
    ///
    /// With `only_with_achievements`, the catalog leaves out games that have
    /// no achievement set.
    #[instrument(skip_all, fields(system = %system, only_with_achievements))]
    pub fn fetch_game_list(&self, system: System, only_with_achievements: bool) -> Result<Vec<CatalogHash>> {
        let mut params = vec![("i", system.id().to_string()), ("h", "1".to_string())];
        if only_with_achievements {
            params.push(("f", "1".to_string()));
        }
        let body = self.request(GAME_LIST_ENDPOINT, &params)?;
        let hashes = parse_game_list(&body)?;
        tracing::info!(hashes = hashes.len(), "Fetched game list");
        Ok(hashes)
    }

    #[instrument(skip(self))]
    pub fn fetch_game(&self, game_id: u32) -> Result<GameDetail> {
        let body = self.request(GAME_INFO_ENDPOINT, &[("g", game_id.to_string())])?;
        let detail = parse_game_detail(game_id, &body)?;
        tracing::debug!(title = %detail.title, achievements = detail.achievements, "Fetched game");
        Ok(detail)
    }

    /// Fails with [`ErrorKind::NotFound`] if the game does not exist.
    pub fn fetch_achievement_count(&self, game_id: u32) -> Result<u32> {
        Ok(self.fetch_game(game_id)?.achievements)
    }

    fn request(&self, endpoint: &str, params: &[(&'static str, String)]) -> Result<String> {
        let mut query: Vec<(&str, String)> = self.credentials.query().into_iter().collect();
        query.extend(params.iter().cloned());
        let mut attempt = 1;
        loop {
            self.limiter.wait();
            self.requests.fetch_add(1, Ordering::Relaxed);
            let result = self.transport.get(endpoint, &query).and_then(|response| classify(endpoint, response));
            match result {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    let kind: &ErrorKind = &err;
                    tracing::warn!(endpoint, attempt, error = %kind, "Catalog request failed, retrying");
                    attempt += 1;
                },
                Err(err) => return Err(err),
            }
        }
    }
}

/// Maps an HTTP status onto the error taxonomy, passing successful bodies through.
fn classify(endpoint: &str, response: Response) -> Result<String> {
    let Response { status, body } = response;
    match status {
        200..=299 => Ok(body),
        401 | 403 => exn::bail!(ErrorKind::Auth),
        404 => exn::bail!(ErrorKind::NotFound(endpoint.to_string())),
        429 => exn::bail!(ErrorKind::RateLimited),
        500..=599 => exn::bail!(ErrorKind::Transient(format!("{endpoint} returned HTTP {status}"))),
        _ => exn::bail!(ErrorKind::InvalidResponse(format!("{endpoint} returned HTTP {status}"))),
    }
}
