//! Request/cookie contract.
//!
//! The session layer does not depend on an HTTP framework; it sees one
//! request through this narrow surface: the cookies that arrived, the
//! client address, and the cookies to send back. Server integration code
//! maps its framework's request/response types onto a [`RequestContext`].

use std::collections::HashMap;
use std::net::IpAddr;

use cookie::{Cookie, SameSite};

/// The per-request state the session layer reads and writes.
#[derive(Debug, Default)]
pub struct RequestContext {
    remote_addr: Option<IpAddr>,
    cookies: HashMap<String, String>,
    response_cookies: Vec<Cookie<'static>>,
}

impl RequestContext {
    /// Creates an empty context with no address and no cookies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context for a client at `addr`.
    #[must_use]
    pub fn with_remote_addr(addr: IpAddr) -> Self {
        Self {
            remote_addr: Some(addr),
            ..Self::default()
        }
    }

    /// Returns the client address, if known.
    #[must_use]
    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    /// Records an incoming cookie.
    pub fn insert_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Returns the value of an incoming cookie.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Queues a session cookie on the response.
    pub fn set_session_cookie(&mut self, name: &str, value: &str) {
        let cookie = Cookie::build((name.to_string(), value.to_string()))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .build();
        self.response_cookies.push(cookie);
    }

    /// Queues a removal for the session cookie on the response.
    pub fn clear_session_cookie(&mut self, name: &str) {
        let mut cookie = Cookie::build((name.to_string(), String::new()))
            .path("/")
            .http_only(true)
            .secure(true)
            .build();
        cookie.make_removal();
        self.response_cookies.push(cookie);
    }

    /// Returns the cookies queued for the response.
    #[must_use]
    pub fn response_cookies(&self) -> &[Cookie<'static>] {
        &self.response_cookies
    }
}
