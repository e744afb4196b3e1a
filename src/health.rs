use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::ports::TemplateSource;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: HashMap<String, DependencyStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyStatus {
    Healthy { status: String, latency_ms: u64 },
    Unhealthy { status: String, error: String },
}

#[async_trait]
pub trait DependencyChecker: Send + Sync {
    /// Name the dependency is reported under.
    fn name(&self) -> &'static str;

    /// Whether a failure makes the whole service unhealthy.
    fn critical(&self) -> bool {
        true
    }

    async fn check(&self) -> DependencyStatus;
}

pub struct PostgresChecker {
    pool: sqlx::PgPool,
}

impl PostgresChecker {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyChecker for PostgresChecker {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => DependencyStatus::Healthy {
                status: "healthy".to_string(),
                latency_ms: start.elapsed().as_millis() as u64,
            },
            Err(e) => DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: e.to_string(),
            },
        }
    }
}

/// Looks up the template documents are rendered with. Rendering falls back
/// to built-in bodies without it, so a failure only degrades the service.
pub struct TemplateChecker {
    templates: Arc<dyn TemplateSource>,
    template_key: String,
}

impl TemplateChecker {
    pub fn new(templates: Arc<dyn TemplateSource>, template_key: impl Into<String>) -> Self {
        Self {
            templates,
            template_key: template_key.into(),
        }
    }
}

#[async_trait]
impl DependencyChecker for TemplateChecker {
    fn name(&self) -> &'static str {
        "templates"
    }

    fn critical(&self) -> bool {
        false
    }

    async fn check(&self) -> DependencyStatus {
        let start = Instant::now();
        let error = match self.templates.template(&self.template_key).await {
            Ok(Some(_)) => {
                return DependencyStatus::Healthy {
                    status: "healthy".to_string(),
                    latency_ms: start.elapsed().as_millis() as u64,
                }
            }
            Ok(None) => format!("no active template for {}", self.template_key),
            Err(e) => e.to_string(),
        };

        DependencyStatus::Unhealthy {
            status: "unhealthy".to_string(),
            error,
        }
    }
}

pub async fn check_health(
    checkers: &[Arc<dyn DependencyChecker>],
    start_time: Instant,
) -> HealthResponse {
    let timeout_duration = Duration::from_secs(5);

    let mut dependencies = HashMap::new();
    let mut critical = Vec::new();

    for checker in checkers {
        let status = timeout(timeout_duration, checker.check())
            .await
            .unwrap_or_else(|_| DependencyStatus::Unhealthy {
                status: "unhealthy".to_string(),
                error: "timeout".to_string(),
            });
        if checker.critical() {
            critical.push(checker.name());
        }
        dependencies.insert(checker.name().to_string(), status);
    }

    HealthResponse {
        status: determine_overall_status(&dependencies, &critical),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: start_time.elapsed().as_secs(),
        dependencies,
    }
}

fn determine_overall_status(
    dependencies: &HashMap<String, DependencyStatus>,
    critical_deps: &[&str],
) -> String {
    let mut has_critical_failure = false;
    let mut has_non_critical_failure = false;

    for (name, status) in dependencies {
        if matches!(status, DependencyStatus::Unhealthy { .. }) {
            if critical_deps.contains(&name.as_str()) {
                has_critical_failure = true;
            } else {
                has_non_critical_failure = true;
            }
        }
    }

    if has_critical_failure {
        "unhealthy".to_string()
    } else if has_non_critical_failure {
        "degraded".to_string()
    } else {
        "healthy".to_string()
    }
}
