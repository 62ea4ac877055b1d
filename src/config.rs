//! Session configuration and SSH algorithm profiles.
//!
//! The algorithm lists are grouped into three profiles used by
//! [`ConnectionSecurityOptions`](crate::session::ConnectionSecurityOptions).
//! Switches in the field frequently run SSH stacks that only speak CBC ciphers
//! and SHA-1 key exchange, so the legacy profile is the default for sessions.

use std::time::Duration;

use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{cipher, compression, kex, mac};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Key exchange algorithms accepted by the secure profile.
pub const SECURE_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_G16_SHA512,
    kex::DH_G14_SHA256,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
];

/// Key exchange algorithms accepted by the balanced profile.
pub const BALANCED_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_G16_SHA512,
    kex::DH_G14_SHA256,
    kex::DH_GEX_SHA256,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
    kex::DH_G14_SHA1,
];

/// Key exchange algorithms accepted by the legacy profile.
pub const LEGACY_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_GEX_SHA1,
    kex::DH_GEX_SHA256,
    kex::DH_G1_SHA1,
    kex::DH_G14_SHA1,
    kex::DH_G14_SHA256,
    kex::DH_G16_SHA512,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
];

pub const SECURE_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
];

pub const BALANCED_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::AES_256_CBC,
];

/// CTR first, then GCM, then the CBC and 3DES family old Huawei/H3C
/// firmware needs.
pub const LEGACY_CIPHERS: &[cipher::Name] = &[
    cipher::AES_128_CTR,
    cipher::AES_192_CTR,
    cipher::AES_256_CTR,
    cipher::AES_128_GCM,
    cipher::AES_256_GCM,
    cipher::CHACHA20_POLY1305,
    cipher::AES_128_CBC,
    cipher::AES_192_CBC,
    cipher::AES_256_CBC,
    cipher::TRIPLE_DES_CBC,
];

pub const SECURE_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
];

pub const BALANCED_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512,
    mac::HMAC_SHA256,
    mac::HMAC_SHA1_ETM,
    mac::HMAC_SHA1,
];

pub const LEGACY_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA256,
    mac::HMAC_SHA512,
    mac::HMAC_SHA1,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA1_ETM,
];

pub const DEFAULT_COMPRESSION_ALGORITHMS: &[compression::Name] = &[
    compression::NONE,
    compression::ZLIB,
    compression::ZLIB_LEGACY,
];

pub const SECURE_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
];

pub const BALANCED_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa { hash: None },
];

pub const LEGACY_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa { hash: None },
    Algorithm::Dsa,
];

/// Characters that end a prompt on every supported vendor CLI.
pub const PROMPT_MARKERS: &[&str] = &["#", ">", "]"];

/// Upper bound for a single read from the shell output stream.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Logging switches handed to every session.
///
/// Errors are always logged. `debug` enables the per-read and per-write traces,
/// which are noisy on busy pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LogConfig {
    pub debug: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { debug: true }
    }
}

impl LogConfig {
    pub fn quiet() -> Self {
        Self { debug: false }
    }
}

/// Pseudo-terminal requested for the interactive shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PtyConfig {
    /// Terminal type sent in the pty-req.
    pub term: String,
    pub columns: u32,
    pub rows: u32,
    /// Input and output baud rate.
    pub speed: u32,
    /// Whether the remote line discipline should echo input back.
    pub echo: bool,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            term: "vt100".to_string(),
            columns: 80,
            rows: 40,
            speed: 14400,
            echo: false,
        }
    }
}

/// Timing and terminal parameters for a session.
///
/// All waits are expressed in seconds as floats so fractional idle windows
/// (e.g. `0.5`) can be configured from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard limit for TCP connect plus SSH handshake and authentication.
    pub connect_timeout_secs: f64,
    /// Idle window used by `run_commands` to decide a command has finished.
    pub command_idle_secs: f64,
    /// Idle window for the version probe behind brand detection.
    pub brand_idle_secs: f64,
    /// Idle window used by the liveness probe.
    pub alive_idle_secs: f64,
    /// Idle window used to drain the login banner after the shell starts.
    pub banner_idle_secs: f64,
    pub pty: PtyConfig,
    pub log: LogConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 20.0,
            command_idle_secs: 2.0,
            brand_idle_secs: 1.0,
            alive_idle_secs: 2.0,
            banner_idle_secs: 1.0,
            pty: PtyConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout_secs)
    }

    pub fn command_idle(&self) -> Duration {
        secs(self.command_idle_secs)
    }

    pub fn brand_idle(&self) -> Duration {
        secs(self.brand_idle_secs)
    }

    pub fn alive_idle(&self) -> Duration {
        secs(self.alive_idle_secs)
    }

    pub fn banner_idle(&self) -> Duration {
        secs(self.banner_idle_secs)
    }
}

/// Negative or NaN values collapse to zero instead of panicking.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_timings() {
        let config = SessionConfig::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(20));
        assert_eq!(config.command_idle(), Duration::from_secs(2));
        assert_eq!(config.brand_idle(), Duration::from_secs(1));
        assert_eq!(config.alive_idle(), Duration::from_secs(2));
        assert_eq!(config.pty.term, "vt100");
        assert!(!config.pty.echo);
    }

    #[test]
    fn invalid_durations_collapse_to_zero() {
        let config = SessionConfig {
            command_idle_secs: -1.0,
            brand_idle_secs: f64::NAN,
            ..Default::default()
        };
        assert_eq!(config.command_idle(), Duration::ZERO);
        assert_eq!(config.brand_idle(), Duration::ZERO);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"command_idle_secs":0.5,"log":{"debug":false}}"#)
                .expect("parse config");
        assert_eq!(config.command_idle(), Duration::from_millis(500));
        assert_eq!(config.log, LogConfig::quiet());
        assert_eq!(config.connect_timeout_secs, 20.0);
    }
}
