//! Interactive shell sessions and the session pool.
//!
//! A [`Session`] owns one SSH connection, the shell channel on top of it and
//! two background tasks that copy the channel into a write queue and a read
//! queue. Sessions have no internal locking; [`SessionManager`] hands out one
//! [`SessionLease`] per identity at a time.
//!
//! # Main Components
//!
//! - [`SessionManager`] - Session pool (process-wide default via `MANAGER`)
//! - [`Session`] - One interactive shell with timed reads
//! - [`Identity`] - The (user, password, address) triple a session belongs to
//! - [`SessionState`] - Health of a session as observed by its I/O tasks

use async_ssh2_tokio::ServerCheckMethod;
use async_ssh2_tokio::client::Client;
use log::{debug, error, trace};
use moka::future::Cache;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};

use russh::Preferred;
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};
use tokio::time::Instant;

use crate::config::{self, LogConfig, PROMPT_MARKERS, SessionConfig};
use crate::device::{BRAND_PROBE_COMMANDS, Brand, SanitizerRegistry};
use crate::error::SessionError;
use crate::filter::filter_output;

use mux::Mux;

pub use manager::{ConnectFuture, Connector, SessionLease, SessionManager, ssh_connector};
pub use security::{ConnectionSecurityOptions, SecurityLevel};

/// Process-wide session pool using SSH with the default configuration.
pub static MANAGER: Lazy<SessionManager> = Lazy::new(SessionManager::new);

/// Credentials and address of a device. Sessions are pooled per identity.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub user: String,
    pub password: String,
    /// `host:port`, e.g. `10.0.0.1:22` or `[fe80::1]:22`.
    pub address: String,
}

impl Identity {
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            address: address.into(),
        }
    }

    /// `user@address`, used in log lines.
    pub fn label(&self) -> String {
        format!("{}@{}", self.user, self.address)
    }

    /// Pool key. The password only enters as a SHA-256 digest so keys can be
    /// logged.
    pub fn cache_key(&self) -> String {
        let digest = Sha256::digest(self.password.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("{}@{}#{}", self.user, self.address, hex)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("address", &self.address)
            .finish()
    }
}

/// Health of a session.
///
/// The I/O tasks move an `Open` session to `Degraded` when the transport
/// fails or reaches EOF. `Closed` is set only by [`Session::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Degraded,
    Closed,
}

/// State shared between a session and its I/O tasks.
#[derive(Debug, Clone)]
pub(crate) struct Health(Arc<AtomicU8>);

impl Health {
    const OPEN: u8 = 0;
    const DEGRADED: u8 = 1;
    const CLOSED: u8 = 2;

    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(Self::OPEN)))
    }

    pub(crate) fn get(&self) -> SessionState {
        match self.0.load(Ordering::Acquire) {
            Self::OPEN => SessionState::Open,
            Self::DEGRADED => SessionState::Degraded,
            _ => SessionState::Closed,
        }
    }

    /// Returns true if this call moved the session out of `Open`.
    pub(crate) fn degrade(&self) -> bool {
        self.0
            .compare_exchange(
                Self::OPEN,
                Self::DEGRADED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns the previous state.
    pub(crate) fn close(&self) -> SessionState {
        match self.0.swap(Self::CLOSED, Ordering::AcqRel) {
            Self::OPEN => SessionState::Open,
            Self::DEGRADED => SessionState::Degraded,
            _ => SessionState::Closed,
        }
    }
}

/// One interactive shell on a network device.
///
/// Not internally synchronized: every operation takes `&mut self`, and the
/// pool guarantees a single user per identity.
pub struct Session {
    label: String,
    client: Option<Client>,
    mux: Mux,
    health: Health,
    brand: Option<Brand>,
    brand_probed: bool,
    last_used: Instant,
    config: SessionConfig,
}

mod client;
mod manager;
mod mux;
mod reader;
mod security;
mod transport;
