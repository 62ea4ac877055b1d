//! # netmux - interactive command runner for network device CLIs
//!
//! `netmux` drives the interactive SSH shell of switches and routers from
//! several vendors (Huawei, H3C, Cisco). Vendor CLIs have no framed response
//! protocol: output is a byte stream that simply stops when the device prints
//! its prompt again. `netmux` turns that stream into discrete command results
//! without knowing the prompt in advance.
//!
//! ## How output is captured
//!
//! Each [`session::Session`] copies the shell's output into a queue of chunks
//! from a background task. Reads drain that queue and treat "no new chunk for
//! `max_idle`" as "the command has finished". This is a heuristic: a slow link
//! or a pager that stalls longer than the idle window ends the capture early.
//! Use the `*_within` read variants when an overall deadline is required.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netmux::session::{Identity, MANAGER};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = Identity::new("admin", "secret", "192.168.1.1:22");
//!
//!     let output = MANAGER
//!         .run_commands(&identity, &["display version", "display clock"])
//!         .await?;
//!     println!("{output}");
//!
//!     let brand = MANAGER.brand(&identity).await?;
//!     println!("brand: {brand:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`session::SessionManager`] - identity keyed session pool with per-identity locking
//! - [`session::Session`] - one interactive shell with timed reads and brand detection
//! - [`filter`] - strips echoed commands and pager artifacts from captured output
//! - [`device`] - vendor detection and per-vendor output sanitizers
//! - [`config`] - timing, terminal and SSH algorithm configuration

/// `log::debug!` gated by a [`config::LogConfig`].
macro_rules! debug_if {
    ($log:expr, $($arg:tt)+) => {
        if $log.debug {
            log::debug!($($arg)+);
        }
    };
}

pub mod config;
pub mod device;
pub mod error;
pub mod filter;
pub mod session;
