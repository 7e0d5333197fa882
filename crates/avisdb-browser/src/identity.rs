//! Fetch identities: the user agent and proxy a browser session presents.
//!
//! Proxies rotate round-robin across attempts. User agents start from the
//! desktop pool and switch to the mobile pool once an attempt has failed;
//! the mobile storefront renders a simpler page that trips detection less
//! often, and the switch is one-way for the rest of the crawl.

use rand::prelude::IndexedRandom;

pub const DESKTOP_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
];

pub const MOBILE_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 13; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Mobile Safari/537.36",
];

/// Everything a browser session needs to present one coherent identity.
#[derive(Debug, Clone)]
pub struct FetchIdentity {
    pub user_agent: String,
    pub proxy: Option<String>,
    pub mobile: bool,
}

/// Hands out identities for successive fetch attempts.
#[derive(Debug)]
pub struct IdentityRotation {
    proxies: Vec<String>,
    cursor: usize,
    mobile: bool,
}

impl IdentityRotation {
    #[must_use]
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies,
            cursor: 0,
            mobile: false,
        }
    }

    /// Switches the user-agent pool to mobile. One-way.
    pub fn escalate(&mut self) {
        if !self.mobile {
            tracing::debug!("switching to mobile user agents");
            self.mobile = true;
        }
    }

    #[must_use]
    pub fn is_mobile(&self) -> bool {
        self.mobile
    }

    /// The identity for the next attempt: the next proxy in round-robin
    /// order (or none when the pool is empty) and a random user agent from
    /// the active pool.
    pub fn next_identity(&mut self) -> FetchIdentity {
        let proxy = if self.proxies.is_empty() {
            None
        } else {
            let picked = self.proxies[self.cursor % self.proxies.len()].clone();
            self.cursor += 1;
            Some(picked)
        };
        let pool = if self.mobile {
            MOBILE_USER_AGENTS
        } else {
            DESKTOP_USER_AGENTS
        };
        let user_agent = pool
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(DESKTOP_USER_AGENTS[0])
            .to_string();
        FetchIdentity {
            user_agent,
            proxy,
            mobile: self.mobile,
        }
    }
}
