//! Scripted transport and virtual clock for testing.

use crate::clock::Clock;
use crate::error::{ErrorKind, Result};
use crate::transport::{Response, Transport};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Clock whose time only moves when someone sleeps or calls [`MockClock::advance`].
///
/// Every sleep is recorded, so tests can assert on exactly how long the rate
/// limiter would have blocked.
pub struct MockClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Move time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock().unwrap_or_else(|p| p.into_inner()) += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.sleeps.lock().unwrap_or_else(|p| p.into_inner()).push(duration);
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Respond(Response),
    Disconnect,
}

/// A request as seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub endpoint: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// In-memory [`Transport`] that replays scripted responses per endpoint.
///
/// Replies for an endpoint are consumed in the order they were added. A
/// request for which nothing is scripted panics: if the test didn't expect a
/// call, then the test should not pass.
pub struct MockTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn push(self, endpoint: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .entry(endpoint.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a `200 OK` response.
    pub fn with_body(self, endpoint: &str, body: impl Into<String>) -> Self {
        self.with_status(endpoint, 200, body)
    }

    pub fn with_status(self, endpoint: &str, status: u16, body: impl Into<String>) -> Self {
        self.push(endpoint, Reply::Respond(Response::new(status, body)))
    }

    /// Queue a connection failure.
    pub fn with_disconnect(self, endpoint: &str) -> Self {
        self.push(endpoint, Reply::Disconnect)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Requests made to one endpoint.
    pub fn requests_to(&self, endpoint: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|request| request.endpoint == endpoint).collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Response> {
        self.requests.lock().unwrap_or_else(|p| p.into_inner()).push(RecordedRequest {
            endpoint: endpoint.to_string(),
            query: query.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        });
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Disconnect) => exn::bail!(ErrorKind::Transient(format!("connection to {endpoint} reset"))),
            // The panic here is DELIBERATE. MockTransport is intended to be
            // used in tests; an unexpected request is a failed test.
            None => panic!("MockTransport: no scripted reply for {endpoint}"),
        }
    }
}
