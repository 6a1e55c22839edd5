//! Health check module
//! Reports the database and the payment job queue.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info};

use crate::workers::payment_jobs::JobTracker;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Health checker for the application. Without a pool the database is
/// reported as a warning and the service as degraded.
#[derive(Clone)]
pub struct HealthChecker {
    db_pool: Option<sqlx::PgPool>,
    jobs: Arc<JobTracker>,
}

impl HealthChecker {
    pub fn new(db_pool: Option<sqlx::PgPool>, jobs: Arc<JobTracker>) -> Self {
        Self { db_pool, jobs }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();
        let mut overall_healthy = true;
        let mut degraded = false;

        match &self.db_pool {
            Some(pool) => match timeout(Duration::from_secs(5), check_database_health(pool)).await
            {
                Ok(Ok(response_time)) => {
                    health_status.checks.insert(
                        "database".to_string(),
                        ComponentHealth::up(Some(response_time)),
                    );
                    info!("Database health check: OK ({}ms)", response_time);
                }
                Ok(Err(e)) => {
                    overall_healthy = false;
                    health_status.checks.insert(
                        "database".to_string(),
                        ComponentHealth::down(Some(e.to_string())),
                    );
                    error!("Database health check failed: {}", e);
                }
                Err(_) => {
                    overall_healthy = false;
                    health_status.checks.insert(
                        "database".to_string(),
                        ComponentHealth::down(Some("Timeout".to_string())),
                    );
                    error!("Database health check timed out");
                }
            },
            None => {
                degraded = true;
                health_status.checks.insert(
                    "database".to_string(),
                    ComponentHealth::warning(None, Some("not configured".to_string())),
                );
            }
        }

        let tracked = self.jobs.len().await;
        health_status.checks.insert(
            "job_queue".to_string(),
            ComponentHealth {
                status: ComponentState::Up,
                response_time_ms: None,
                details: Some(format!("{} tracked jobs", tracked)),
            },
        );

        health_status.status = if !overall_healthy {
            HealthState::Unhealthy
        } else if degraded {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };

        health_status
    }
}

pub async fn check_database_health(
    pool: &sqlx::PgPool,
) -> Result<u128, Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    crate::database::health_check(pool).await?;
    Ok(start.elapsed().as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_database_is_degraded() {
        let checker = HealthChecker::new(None, Arc::new(JobTracker::new()));
        let status = checker.check_health().await;

        assert_eq!(status.status, HealthState::Degraded);
        assert_eq!(status.checks["database"].status, ComponentState::Warning);
        assert_eq!(status.checks["job_queue"].status, ComponentState::Up);
    }
}
