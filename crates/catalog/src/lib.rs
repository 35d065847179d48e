//! Client for the RetroAchievements catalog.
//!
//! Two endpoints are used: the bulk game list (every content hash of a
//! console, grouped by game) and per-game details (which carry the
//! achievement count). All traffic goes through one [`CatalogClient`], which
//! owns the credentials, the rate limiter and the retry policy.
//!
//! The network and the passage of time are both injected ([`Transport`] and
//! [`Clock`]) so the client can be exercised without either; enable the
//! `mock` feature for [`mock::MockTransport`] and [`mock::MockClock`].

mod client;
mod clock;
mod credentials;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod payload;
mod transport;

pub use crate::client::{CatalogClient, DEFAULT_ATTEMPTS, GAME_INFO_ENDPOINT, GAME_LIST_ENDPOINT};
pub use crate::clock::{Clock, ClockHandle, MIN_INTERVAL, RateLimiter, SystemClock};
pub use crate::credentials::Credentials;
pub use crate::payload::{CatalogHash, GameDetail, parse_game_detail, parse_game_list};
pub use crate::transport::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpTransport, Response, Transport, TransportHandle};
