//! Authentication: provider adapters, token lifecycle, and the access gate.

pub mod directory;
pub mod flow;
pub mod github;
pub mod google;
pub mod middleware;
pub mod provider;
pub mod revocation;
pub mod routes;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

use flow::LoginFlow;
use middleware::AccessGate;

/// Shared state handed to every route.
pub struct AppState {
    pub flow: LoginFlow,
    pub gate: AccessGate,
    pub secure_cookies: bool,
}

impl AppState {
    #[must_use]
    pub fn new(flow: LoginFlow, gate: AccessGate, secure_cookies: bool) -> Self {
        Self {
            flow,
            gate,
            secure_cookies,
        }
    }
}
