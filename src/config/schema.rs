use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Placeholder replaced by the instance name in path and signature templates
pub const INSTANCE_PLACEHOLDER: &str = "{instance}";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Process lookup (liveness and resource probes)
    #[serde(default)]
    pub process: ProcessConfig,
    /// Credentials for the proxy-port handshake
    #[serde(default)]
    pub reachability: ReachabilityConfig,
    /// Admin interface access for the backend probe
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub resources: ResourceThresholds,
    #[serde(default)]
    pub error_log: ErrorLogConfig,
}

// ============================================================================
// Pass Configuration
// ============================================================================

/// Settings for one check pass over the fleet
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Report title
    #[serde(default = "default_title")]
    pub title: String,
    /// Instance list file (`name=proxy_port,admin_port` per line)
    #[serde(default = "default_instances_file")]
    pub instances_file: PathBuf,
    /// Host the proxy and admin ports are reached on
    #[serde(default = "default_host")]
    pub host: String,
    /// Maximum instances checked at the same time
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Timeout for each probe (milliseconds)
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Timeout for each TCP connect (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_title() -> String {
    "monitor of mysql-proxy".to_string()
}

fn default_instances_file() -> PathBuf {
    PathBuf::from("instances")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_probe_timeout_ms() -> u64 {
    3000
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            instances_file: default_instances_file(),
            host: default_host(),
            concurrency: default_concurrency(),
            probe_timeout_ms: default_probe_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// ============================================================================
// Probe Configuration
// ============================================================================

/// How the proxy process is located in the process table
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    /// Command-line fragment identifying one instance; `{instance}` is substituted
    #[serde(default = "default_signature")]
    pub signature: String,
}

fn default_signature() -> String {
    "/usr/local/mysql-proxy/bin/mysql-proxy --defaults-file=/usr/local/mysql-proxy/conf/{instance}.cnf"
        .to_string()
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            signature: default_signature(),
        }
    }
}

impl ProcessConfig {
    /// Launch signature for the named instance
    pub fn signature_for(&self, instance: &str) -> String {
        self.signature.replace(INSTANCE_PLACEHOLDER, instance)
    }
}

/// Credentials used for the proxy-port handshake
///
/// Any answer other than "can't connect" counts as reachable, so these
/// only need to be valid enough to get a greeting.
#[derive(Debug, Clone, Deserialize)]
pub struct ReachabilityConfig {
    #[serde(default = "default_reachability_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_reachability_user() -> String {
    "monitor".to_string()
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            user: default_reachability_user(),
            password: String::new(),
        }
    }
}

impl ReachabilityConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password)
    }
}

/// Admin interface access
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Backend listing query
    #[serde(default = "default_backends_query")]
    pub query: String,
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_backends_query() -> String {
    "SELECT * FROM backends".to_string()
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            user: default_admin_user(),
            password: String::new(),
            query: default_backends_query(),
        }
    }
}

impl AdminConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password)
    }
}

/// Resource usage limits, in the units `ps` reports
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceThresholds {
    /// CPU percentage above which the process is busy
    #[serde(default = "default_max_cpu_percent")]
    pub max_cpu_percent: f32,
    /// Virtual size limit (KiB)
    #[serde(default = "default_max_vsz_kib")]
    pub max_vsz_kib: u64,
    /// Resident size limit (KiB)
    #[serde(default = "default_max_rss_kib")]
    pub max_rss_kib: u64,
}

fn default_max_cpu_percent() -> f32 {
    90.0
}

fn default_max_vsz_kib() -> u64 {
    2 * 1024 * 1024
}

fn default_max_rss_kib() -> u64 {
    512 * 1024
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            max_cpu_percent: default_max_cpu_percent(),
            max_vsz_kib: default_max_vsz_kib(),
            max_rss_kib: default_max_rss_kib(),
        }
    }
}

/// Error log scanning
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorLogConfig {
    /// Log path; `{instance}` is substituted
    #[serde(default = "default_log_path")]
    pub path: String,
    /// Number of trailing lines inspected
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
    /// Entries younger than this (seconds) raise a warning
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
}

fn default_log_path() -> String {
    "/usr/local/mysql-proxy/log/lua_{instance}.log".to_string()
}

fn default_tail_lines() -> usize {
    100
}

fn default_freshness_secs() -> u64 {
    300
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            tail_lines: default_tail_lines(),
            freshness_secs: default_freshness_secs(),
        }
    }
}

impl ErrorLogConfig {
    /// Log file of the named instance
    pub fn path_for(&self, instance: &str) -> PathBuf {
        PathBuf::from(self.path.replace(INSTANCE_PLACEHOLDER, instance))
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// User and password for a MySQL-protocol login
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}
