//! Integration test entry point
//!
//! The fleet tests run against an in-process fake proxy and always run.
//! Live tests need a running mysql-proxy and are gated:
//!
//! Run with: ATHENA_MONITOR_RUN_INTEGRATION_TESTS=1 cargo test --test integration
//!
//! Environment variables:
//! - ATHENA_MONITOR_RUN_INTEGRATION_TESTS: Set to "1" to enable live tests
//! - ATHENA_MONITOR_TEST_HOST: Proxy host (default: 127.0.0.1)
//! - ATHENA_MONITOR_TEST_INSTANCE: Instance name (default: sql_s3)
//! - ATHENA_MONITOR_TEST_PROXY_PORT: Proxy port (default: 4040)
//! - ATHENA_MONITOR_TEST_ADMIN_PORT: Admin port (default: 4041)
//! - ATHENA_MONITOR_TEST_ADMIN_USER: Admin user (default: admin)
//! - ATHENA_MONITOR_TEST_ADMIN_PASS: Admin password (default: empty)

mod fake_proxy;
mod fleet;
mod live;

use std::env;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use athena_monitor::inspect::{InspectError, LogReader, ProcessInspector, ProcessRow};

/// Check if live integration tests should run
pub fn should_run_integration_tests() -> bool {
    env::var("ATHENA_MONITOR_RUN_INTEGRATION_TESTS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Skip test if live integration tests are not enabled
#[macro_export]
macro_rules! skip_if_not_enabled {
    () => {
        if !crate::should_run_integration_tests() {
            eprintln!("Skipping integration test (set ATHENA_MONITOR_RUN_INTEGRATION_TESTS=1 to run)");
            return;
        }
    };
}

/// Live proxy connection settings from the environment
#[derive(Debug, Clone)]
pub struct LiveTestConfig {
    pub host: String,
    pub instance: String,
    pub proxy_port: u16,
    pub admin_port: u16,
    pub admin_user: String,
    pub admin_password: String,
}

pub fn get_live_config() -> LiveTestConfig {
    LiveTestConfig {
        host: env::var("ATHENA_MONITOR_TEST_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        instance: env::var("ATHENA_MONITOR_TEST_INSTANCE").unwrap_or_else(|_| "sql_s3".to_string()),
        proxy_port: env::var("ATHENA_MONITOR_TEST_PROXY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4040),
        admin_port: env::var("ATHENA_MONITOR_TEST_ADMIN_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4041),
        admin_user: env::var("ATHENA_MONITOR_TEST_ADMIN_USER").unwrap_or_else(|_| "admin".to_string()),
        admin_password: env::var("ATHENA_MONITOR_TEST_ADMIN_PASS").unwrap_or_default(),
    }
}

/// Process table with a fixed answer for every signature
pub struct StaticProcesses(pub Vec<ProcessRow>);

#[async_trait]
impl ProcessInspector for StaticProcesses {
    async fn find(&self, signature: &str) -> Result<Vec<ProcessRow>, InspectError> {
        Ok(self
            .0
            .iter()
            .filter(|row| row.command.contains(signature))
            .cloned()
            .collect())
    }
}

/// Log reader with no logs anywhere
pub struct NoLogs;

#[async_trait]
impl LogReader for NoLogs {
    async fn tail(&self, path: &Path, _lines: usize) -> Result<Vec<String>, InspectError> {
        Err(InspectError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

/// A running proxy process for `instance` under the default launch signature
pub fn proxy_process(pid: u32, instance: &str, cpu_percent: f32, rss_kib: u64) -> ProcessRow {
    ProcessRow {
        pid,
        cpu_percent,
        vsz_kib: 400 * 1024,
        rss_kib,
        command: format!(
            "/usr/local/mysql-proxy/bin/mysql-proxy --defaults-file=/usr/local/mysql-proxy/conf/{}.cnf",
            instance
        ),
    }
}

pub fn processes(rows: Vec<ProcessRow>) -> Arc<StaticProcesses> {
    Arc::new(StaticProcesses(rows))
}
