use chrono::{DateTime, Local};
use forgetube_core::api::{AppConfig, Orchestrator};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub session_id: String,
    pub orchestrator: Orchestrator,
    pub config: Arc<AppConfig>,
    pub stats: Arc<RwLock<ServerStats>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(
        session_id: String,
        orchestrator: Orchestrator,
        config: AppConfig,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            session_id,
            orchestrator,
            config: Arc::new(config),
            stats: Arc::new(RwLock::new(ServerStats::new())),
            shutdown_tx,
        }
    }

    pub fn record_request(&self, endpoint: &str) {
        if let Ok(mut stats) = self.stats.write() {
            stats.increment_request(endpoint);
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut stats) = self.stats.write() {
            stats.increment_error();
        }
    }
}

/// Request counters for `/health`.
#[derive(Debug)]
pub struct ServerStats {
    pub requests_total: u64,
    pub errors_total: u64,
    pub requests_by_endpoint: BTreeMap<String, u64>,
    pub started_at: DateTime<Local>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests_total: 0,
            errors_total: 0,
            requests_by_endpoint: BTreeMap::new(),
            started_at: Local::now(),
        }
    }

    /// Endpoints are counted by route pattern, not by concrete task id.
    pub fn increment_request(&mut self, endpoint: &str) {
        self.requests_total += 1;
        match self.requests_by_endpoint.get_mut(endpoint) {
            Some(count) => *count += 1,
            None => {
                self.requests_by_endpoint.insert(endpoint.to_owned(), 1);
            }
        }
    }

    pub fn increment_error(&mut self) {
        self.errors_total += 1;
    }

    pub fn uptime_seconds(&self) -> f64 {
        Local::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as f64
            / 1000.0
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_are_counted_separately() {
        let mut stats = ServerStats::default();
        stats.increment_request("/api/v1/tasks/:id");
        stats.increment_error();
        assert_eq!(stats.requests_total, 1);
        assert_eq!(stats.errors_total, 1);
    }

    #[test]
    fn test_server_stats_new() {
        let stats = ServerStats::new();
        assert_eq!(stats.requests_total, 0);
        assert_eq!(stats.errors_total, 0);
        assert!(stats.uptime_seconds() < 1.0);
    }

    #[test]
    fn test_increment_request() {
        let mut stats = ServerStats::new();
        stats.increment_request("/api/v1/tasks");
        stats.increment_request("/api/v1/tasks");
        stats.increment_request("/health");

        assert_eq!(stats.requests_total, 3);
        let counted: Vec<_> = stats
            .requests_by_endpoint
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(counted, vec![("/api/v1/tasks", 2), ("/health", 1)]);
    }
}
