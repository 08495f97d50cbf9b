use std::fmt;
use std::net::IpAddr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Ip,
    User,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::User => "user",
        }
    }
}

/// Counter key: `<purpose>:<scope>:<identity>`, e.g. `login:ip:10.0.0.7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub purpose: &'static str,
    pub scope: Scope,
    pub identity: String,
}

impl RateLimitKey {
    #[must_use]
    pub fn login_ip(ip: IpAddr) -> Self {
        Self { purpose: "login", scope: Scope::Ip, identity: ip.to_string() }
    }

    #[must_use]
    pub fn login_user(user_id: Uuid) -> Self {
        Self { purpose: "login", scope: Scope::User, identity: user_id.to_string() }
    }

    /// Key of the block record that shadows this counter.
    #[must_use]
    pub fn block_key(&self) -> String {
        format!("blocked:{self}")
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.purpose, self.scope.as_str(), self.identity)
    }
}
