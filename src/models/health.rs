//! Health report types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Healthy,
    Unhealthy,
    Disabled,
}

/// Health of a single dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentState::Healthy,
            detail: None,
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: ComponentState::Unhealthy,
            detail: Some(detail.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            status: ComponentState::Disabled,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthReport {
    /// Aggregate component health. Disabled components are ignored.
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let considered: Vec<_> = components
            .values()
            .filter(|c| c.status != ComponentState::Disabled)
            .collect();
        let unhealthy = considered
            .iter()
            .filter(|c| c.status == ComponentState::Unhealthy)
            .count();

        let status = if unhealthy == 0 {
            HealthStatus::Healthy
        } else if unhealthy == considered.len() {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host: hostname::get().ok().and_then(|h| h.into_string().ok()),
            timestamp: Utc::now(),
            components,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(entries: &[(&str, ComponentHealth)]) -> HealthReport {
        HealthReport::from_components(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_all_healthy() {
        let r = report(&[
            ("analysis", ComponentHealth::healthy()),
            ("storage", ComponentHealth::healthy()),
        ]);
        assert_eq!(r.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_disabled_components_ignored() {
        let r = report(&[
            ("analysis", ComponentHealth::healthy()),
            ("storage", ComponentHealth::disabled()),
        ]);
        assert!(r.is_healthy());
    }

    #[test]
    fn test_one_unhealthy_degrades() {
        let r = report(&[
            ("analysis", ComponentHealth::healthy()),
            ("storage", ComponentHealth::unhealthy("disk full")),
        ]);
        assert_eq!(r.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_all_unhealthy() {
        let r = report(&[
            ("analysis", ComponentHealth::unhealthy("down")),
            ("storage", ComponentHealth::disabled()),
        ]);
        assert_eq!(r.status, HealthStatus::Unhealthy);
    }
}
