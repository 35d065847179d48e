use std::fmt::{Debug, Formatter, Result as FmtResult};

/// Username and web API key for the catalog.
///
/// Supplied once at startup and immutable afterwards. The API key is only
/// ever written into outgoing query strings; [`Debug`] redacts it so that the
/// value can't leak through logs or error reports.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    api_key: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { username: username.into(), api_key: api_key.into() }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Query parameters that authenticate a request.
    pub(crate) fn query(&self) -> [(&'static str, String); 2] {
        [("u", self.username.clone()), ("y", self.api_key.clone())]
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
