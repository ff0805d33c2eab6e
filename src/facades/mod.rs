//! Domain Facades
//!
//! Thin wrappers that give the generic engine category-specific key names and
//! TTLs. Each facade owns an `Arc<CacheEngine>` whose namespace already ends
//! with the category prefix.

mod analytics;
mod content;
mod users;

use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

pub use analytics::{AnalyticsCache, REALTIME_TTL};
pub use content::ContentCache;
pub use users::{UserCache, SESSION_TTL};

// == Cache Policy ==
/// Key prefix and default TTL of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub prefix: &'static str,
    pub default_ttl: u64,
}

// == Category ==
/// The data categories the registry knows how to build engines for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Users,
    Content,
    Analytics,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Users, Category::Content, Category::Analytics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Users => "users",
            Category::Content => "content",
            Category::Analytics => "analytics",
        }
    }

    pub fn policy(&self) -> CachePolicy {
        match self {
            Category::Users => CachePolicy {
                prefix: "user:",
                default_ttl: 1800,
            },
            Category::Content => CachePolicy {
                prefix: "content:",
                default_ttl: 600,
            },
            Category::Analytics => CachePolicy {
                prefix: "analytics:",
                default_ttl: 300,
            },
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "users" | "user" => Ok(Category::Users),
            "content" => Ok(Category::Content),
            "analytics" => Ok(Category::Analytics),
            _ => Err(CacheError::Config(format!("Unknown cache category: {}", s))),
        }
    }
}
