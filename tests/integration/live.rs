//! Checks against a running mysql-proxy
//!
//! Requires a proxy started with the default launch signature for the
//! configured instance name.

use athena_monitor::client::{AdminClient, MySqlClient, ProtocolClient};
use athena_monitor::config::{Config, Credentials, Instance};
use athena_monitor::health::probe::backend::parse_backends;
use athena_monitor::health::{Collaborators, InstanceChecker, ProbeKind, Severity};

use crate::{get_live_config, skip_if_not_enabled};

#[tokio::test]
async fn test_live_proxy_port_answers() {
    skip_if_not_enabled!();

    let live = get_live_config();
    let config = Config::default();
    let client = MySqlClient::new(config.monitor.connect_timeout());
    let addr = format!("{}:{}", live.host, live.proxy_port);

    // Any answer but a refusal counts
    if let Err(e) = client
        .handshake(&addr, &config.reachability.credentials())
        .await
    {
        assert_ne!(e.code(), 2003, "proxy port refused: {}", e);
    }
}

#[tokio::test]
async fn test_live_backend_listing() {
    skip_if_not_enabled!();

    let live = get_live_config();
    let config = Config::default();
    let client = MySqlClient::new(config.monitor.connect_timeout());
    let addr = format!("{}:{}", live.host, live.admin_port);
    let credentials = Credentials::new(live.admin_user.clone(), live.admin_password.clone());

    let listing = client
        .query(&addr, &credentials, &config.admin.query)
        .await
        .expect("admin query failed");
    let backends = parse_backends(&listing).expect("malformed backend listing");
    assert!(!backends.is_empty(), "proxy reports no backends");
}

#[tokio::test]
async fn test_live_instance_report() {
    skip_if_not_enabled!();

    let live = get_live_config();
    let mut config = Config::default();
    config.monitor.host = live.host.clone();
    config.admin.user = live.admin_user.clone();
    config.admin.password = live.admin_password.clone();

    let checker = InstanceChecker::new(&config, Collaborators::local(&config));
    let instance = Instance::new(live.instance.clone(), live.proxy_port, live.admin_port);
    let report = checker.check(&instance).await;

    assert_eq!(report.verdicts().len(), 5);
    assert_eq!(
        report.verdict(ProbeKind::Reachability).map(|v| v.severity),
        Some(Severity::Ok),
        "{:?}",
        report
    );
    assert_eq!(
        report.verdict(ProbeKind::Process).map(|v| v.severity),
        Some(Severity::Ok),
        "{:?}",
        report
    );
}
