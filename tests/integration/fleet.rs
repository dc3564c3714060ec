//! Fleet checks over the real MySQL client against fake proxies

use std::sync::Arc;

use athena_monitor::client::MySqlClient;
use athena_monitor::config::{Config, Instance};
use athena_monitor::health::{
    Collaborators, InstanceChecker, ProbeDetail, ProbeKind, ReportAggregator, Severity,
};
use athena_monitor::inspect::ProcessRow;

use crate::fake_proxy::{backend, closed_port, Behavior, FakeProxy};
use crate::{processes, proxy_process, NoLogs};

fn checker(rows: Vec<ProcessRow>) -> Arc<InstanceChecker> {
    let mut config = Config::default();
    config.monitor.connect_timeout_ms = 500;
    config.monitor.probe_timeout_ms = 2000;

    let client = Arc::new(MySqlClient::new(config.monitor.connect_timeout()));
    let collaborators = Collaborators {
        processes: processes(rows),
        protocol: client.clone(),
        admin: client,
        logs: Arc::new(NoLogs),
    };
    Arc::new(InstanceChecker::new(&config, collaborators))
}

fn healthy_backends() -> Behavior {
    Behavior::Serve(vec![
        backend("1", "10.0.0.1:3306", "up", "rw"),
        backend("2", "10.0.0.2:3306", "up", "ro"),
    ])
}

#[tokio::test]
async fn test_healthy_instance() {
    let proxy = FakeProxy::start(healthy_backends()).await;
    let admin = FakeProxy::start(healthy_backends()).await;
    let instance = Instance::new("sql_s3", proxy.port, admin.port);

    let report = checker(vec![proxy_process(100, "sql_s3", 5.0, 64 * 1024)])
        .check(&instance)
        .await;

    assert_eq!(report.severity(), Severity::Ok, "{:?}", report);
    assert_eq!(report.verdicts().len(), 5);

    let backends = report.verdict(ProbeKind::Backends).unwrap();
    match &backends.detail {
        Some(ProbeDetail::Backends { backends }) => {
            assert_eq!(backends.len(), 2);
            assert_eq!(backends[0].address, "10.0.0.1:3306");
        }
        other => panic!("unexpected detail {:?}", other),
    }
}

#[tokio::test]
async fn test_read_write_backend_down_fails() {
    let proxy = FakeProxy::start(healthy_backends()).await;
    let admin = FakeProxy::start(Behavior::Serve(vec![
        backend("1", "10.0.0.1:3306", "down", "rw"),
        backend("2", "10.0.0.2:3306", "up", "ro"),
    ]))
    .await;
    let instance = Instance::new("sql_s3", proxy.port, admin.port);

    let report = checker(vec![proxy_process(100, "sql_s3", 5.0, 64 * 1024)])
        .check(&instance)
        .await;

    assert_eq!(report.severity(), Severity::Failed);
    let verdict = report.verdict(ProbeKind::Backends).unwrap();
    assert_eq!(verdict.message, "READ-WRITE BACKEND IS DOWN");
}

#[tokio::test]
async fn test_read_only_backends_down_warns() {
    let proxy = FakeProxy::start(healthy_backends()).await;
    let admin = FakeProxy::start(Behavior::Serve(vec![
        backend("1", "10.0.0.1:3306", "up", "rw"),
        backend("2", "10.0.0.2:3306", "down", "ro"),
        backend("3", "10.0.0.3:3306", "down", "ro"),
        backend("4", "10.0.0.4:3306", "down", "ro"),
    ]))
    .await;
    let instance = Instance::new("sql_s3", proxy.port, admin.port);

    let report = checker(vec![proxy_process(100, "sql_s3", 5.0, 64 * 1024)])
        .check(&instance)
        .await;

    assert_eq!(report.severity(), Severity::Warning);
    assert_eq!(
        report.verdict(ProbeKind::Backends).unwrap().message,
        "SOME SLAVES ARE DOWN"
    );
}

#[tokio::test]
async fn test_dead_instance_reports_every_probe() {
    let instance = Instance::new("sql_s3", closed_port().await, closed_port().await);

    let report = checker(vec![]).check(&instance).await;

    assert_eq!(report.severity(), Severity::Failed);
    for kind in [
        ProbeKind::Process,
        ProbeKind::Reachability,
        ProbeKind::Backends,
        ProbeKind::Resources,
    ] {
        assert_eq!(
            report.verdict(kind).map(|v| v.severity),
            Some(Severity::Failed),
            "{}",
            kind
        );
    }
    assert!(report
        .verdict(ProbeKind::Reachability)
        .unwrap()
        .message
        .starts_with("ERROR 2003"));
    // Missing log is not a problem
    assert_eq!(
        report.verdict(ProbeKind::ErrorLog).map(|v| v.severity),
        Some(Severity::Ok)
    );
}

#[tokio::test]
async fn test_rejected_login_is_reachable() {
    let proxy = FakeProxy::start(Behavior::RejectLogin).await;
    let admin = FakeProxy::start(Behavior::RejectLogin).await;
    let instance = Instance::new("sql_s3", proxy.port, admin.port);

    let report = checker(vec![proxy_process(100, "sql_s3", 5.0, 64 * 1024)])
        .check(&instance)
        .await;

    assert_eq!(
        report.verdict(ProbeKind::Reachability).map(|v| v.severity),
        Some(Severity::Ok)
    );
    // The admin listing itself is unavailable
    assert_eq!(
        report.verdict(ProbeKind::Backends).map(|v| v.severity),
        Some(Severity::Failed)
    );
}

#[tokio::test]
async fn test_fleet_pass() {
    let proxy = FakeProxy::start(healthy_backends()).await;
    let admin = FakeProxy::start(healthy_backends()).await;

    let instances = vec![
        Instance::new("sql_s3", proxy.port, admin.port),
        Instance::new("sql_s1", proxy.port, admin.port),
        Instance::new("sql_s2", proxy.port, admin.port),
    ];
    let checker = checker(vec![
        proxy_process(100, "sql_s3", 5.0, 64 * 1024),
        proxy_process(101, "sql_s1", 95.0, 64 * 1024),
    ]);
    let aggregator = ReportAggregator::new(checker, "monitor of mysql-proxy", 2);

    let report = aggregator.run(&instances).await;

    let names: Vec<_> = report.instances().iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["sql_s3", "sql_s1", "sql_s2"]);
    assert_eq!(report.instance("sql_s3").unwrap().severity(), Severity::Ok);
    assert_eq!(report.instance("sql_s1").unwrap().severity(), Severity::Warning);
    // No process for sql_s2
    assert_eq!(report.instance("sql_s2").unwrap().severity(), Severity::Failed);
    assert_eq!(report.severity(), Severity::Failed);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["instances"]["sql_s1"]["severity"], "WARNING");

    let again = aggregator.run(&instances).await;
    assert_eq!(
        again.instances().iter().map(|r| r.severity()).collect::<Vec<_>>(),
        report.instances().iter().map(|r| r.severity()).collect::<Vec<_>>()
    );
}
