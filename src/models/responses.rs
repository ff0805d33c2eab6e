//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, Invalidation};

/// Stats of one engine instance
#[derive(Debug, Clone, Serialize)]
pub struct InstanceStats {
    /// Registry name of the instance
    pub instance: String,
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Hits in either tier over all lookups
    pub hit_rate: f64,
}

impl InstanceStats {
    pub fn new(instance: impl Into<String>, stats: CacheStats) -> Self {
        Self {
            instance: instance.into(),
            hit_rate: stats.hit_rate(),
            stats,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub instances: Vec<InstanceStats>,
}

/// L2 reachability of one instance
#[derive(Debug, Clone, Serialize)]
pub struct InstanceHealth {
    pub instance: String,
    /// "up" or "down"
    pub l2: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstanceHealth {
    pub fn up(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            l2: "up",
            error: None,
        }
    }

    pub fn down(instance: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            l2: "down",
            error: Some(error.into()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.error.is_none()
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" when every instance reaches L2, otherwise "degraded"
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub instances: Vec<InstanceHealth>,
}

impl HealthResponse {
    /// Creates a HealthResponse with current timestamp
    pub fn from_checks(instances: Vec<InstanceHealth>) -> Self {
        let status = if instances.iter().all(InstanceHealth::is_up) {
            "healthy"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            instances,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Response body for DELETE /invalidate/:category
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub instance: String,
    pub pattern: String,
    #[serde(flatten)]
    pub removed: Invalidation,
}
