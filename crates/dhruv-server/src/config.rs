//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use dhruv_types::{UserKind, config_defaults as defaults};

/// Daily user-message allowance per account kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlements {
    pub guest_messages_per_day: u32,
    pub regular_messages_per_day: u32,
}

impl Default for Entitlements {
    fn default() -> Self {
        Self {
            guest_messages_per_day: defaults::GUEST_MESSAGES_PER_DAY,
            regular_messages_per_day: defaults::REGULAR_MESSAGES_PER_DAY,
        }
    }
}

impl Entitlements {
    pub fn max_messages_per_day(&self, kind: UserKind) -> u32 {
        match kind {
            UserKind::Guest => self.guest_messages_per_day,
            UserKind::Regular => self.regular_messages_per_day,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// CORS allowed origins (empty = no CORS layer).
    pub cors_origins: Vec<String>,

    /// Enable per-request logging.
    pub request_logging: bool,

    /// Buffer generations so clients can reattach with `GET /api/chat`.
    pub resumable_streams: bool,

    /// Model calls allowed per chat turn.
    pub max_steps: u32,

    /// Completion token cap per model call.
    pub max_tokens: u32,

    pub entitlements: Entitlements,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), defaults::DEFAULT_PORT),
            cors_origins: Vec::new(),
            request_logging: true,
            resumable_streams: true,
            max_steps: defaults::MAX_STEPS,
            max_tokens: defaults::MAX_TOKENS,
            entitlements: Entitlements::default(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_resumable_streams(mut self, enabled: bool) -> Self {
        self.resumable_streams = enabled;
        self
    }

    /// Clamped to at least one step.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_entitlements(mut self, entitlements: Entitlements) -> Self {
        self.entitlements = entitlements;
        self
    }
}
