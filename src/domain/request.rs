use std::net::IpAddr;

/// Per-request metadata threaded explicitly through every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub client_ip: Option<IpAddr>,
    pub request_id: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub const fn new(client_ip: Option<IpAddr>, request_id: Option<String>) -> Self {
        Self { client_ip, request_id }
    }
}
