//! Vendor classification and per-vendor output sanitizing.
//!
//! Brand detection is a free-text heuristic over a version banner. A banner
//! that merely mentions a competitor (e.g. "interoperable with Cisco") can be
//! misclassified; callers that know the vendor should pass it as a hint.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Commands written to probe the vendor.
///
/// Each vendor understands one of the two version commands and rejects the
/// other. The trailing run of spaces answers a `---- More ----` pager so the
/// next command is not swallowed as a pager keystroke.
pub const BRAND_PROBE_COMMANDS: &[&str] = &["dis version", "show version", "     "];

/// Device vendors that can be recognized from a version banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Huawei,
    H3c,
    Cisco,
}

impl Brand {
    /// Match order. Huawei banners frequently mention H3C, so Huawei wins.
    pub const PRIORITY: [Brand; 3] = [Brand::Huawei, Brand::H3c, Brand::Cisco];

    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Huawei => "huawei",
            Brand::H3c => "h3c",
            Brand::Cisco => "cisco",
        }
    }

    /// Classifies raw probe output. Case-insensitive.
    pub fn detect(output: &str) -> Option<Brand> {
        let lowered = output.to_lowercase();
        Self::PRIORITY
            .into_iter()
            .find(|brand| lowered.contains(brand.as_str()))
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "huawei" => Ok(Brand::Huawei),
            "h3c" => Ok(Brand::H3c),
            "cisco" => Ok(Brand::Cisco),
            other => Err(format!("unknown brand '{other}'")),
        }
    }
}

/// Removes vendor-specific terminal artifacts from one line of output.
pub trait OutputSanitizer: Send + Sync {
    fn sanitize_line(&self, line: &str) -> String;
}

/// Strips the `space ESC [1D` pair.
///
/// Huawei USG firewalls emit it while paging `display current-configuration |
/// include` output: a space followed by cursor-left, which renders as nothing.
/// This is not general ANSI handling.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorLeftSanitizer;

const CURSOR_LEFT: &str = " \u{1b}[1D";

impl OutputSanitizer for CursorLeftSanitizer {
    fn sanitize_line(&self, line: &str) -> String {
        if line.contains(CURSOR_LEFT) {
            line.replace(CURSOR_LEFT, "")
        } else {
            line.to_string()
        }
    }
}

/// Sanitizers keyed by brand, with a fallback for unknown or unregistered
/// vendors.
#[derive(Clone)]
pub struct SanitizerRegistry {
    fallback: Arc<dyn OutputSanitizer>,
    by_brand: HashMap<Brand, Arc<dyn OutputSanitizer>>,
}

impl Default for SanitizerRegistry {
    fn default() -> Self {
        Self {
            fallback: Arc::new(CursorLeftSanitizer),
            by_brand: HashMap::new(),
        }
    }
}

impl fmt::Debug for SanitizerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizerRegistry")
            .field("brands", &self.by_brand.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SanitizerRegistry {
    pub fn register(&mut self, brand: Brand, sanitizer: Arc<dyn OutputSanitizer>) {
        self.by_brand.insert(brand, sanitizer);
    }

    pub fn with_fallback(mut self, sanitizer: Arc<dyn OutputSanitizer>) -> Self {
        self.fallback = sanitizer;
        self
    }

    pub fn for_brand(&self, brand: Option<Brand>) -> &dyn OutputSanitizer {
        brand
            .and_then(|brand| self.by_brand.get(&brand))
            .unwrap_or(&self.fallback)
            .as_ref()
    }
}
