use repguard::config::DaemonConfig;
use repguard::RepguardError;
use std::time::Duration;

#[test]
fn defaults_apply_when_fields_are_absent() {
    let toml_str = r#"
        node_id = 1
        node_name = "node1"
        conninfo = "host=node1 dbname=repmgr"
        promote_command = "/usr/bin/repguard promote"
        follow_command = "/usr/bin/repguard follow -p %p"
    "#;
    let config: DaemonConfig = toml::from_str(toml_str).unwrap();
    assert_eq!(config.priority, 100);
    assert_eq!(config.reconnect_attempts, 6);
    assert_eq!(config.log_status_interval, Duration::from_secs(10));
}

#[test]
fn validate_rejects_automatic_mode_without_promote_command() {
    let toml_str = r#"
        node_id = 1
        node_name = "node1"
        conninfo = "host=node1 dbname=repmgr"
        follow_command = "/usr/bin/repguard follow -p %p"
    "#;
    let config: DaemonConfig = toml::from_str(toml_str).unwrap();
    assert!(matches!(
        config.validate(),
        Err(RepguardError::MissingPromoteCommand)
    ));
}

#[tokio::test]
async fn from_file_loads_and_validates_a_real_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(
        &mut file,
        br#"
            node_id = 2
            node_name = "node2"
            conninfo = "host=node2 dbname=repmgr"
            upstream_node_id = 1
            promote_command = "/usr/bin/repguard promote"
            follow_command = "/usr/bin/repguard follow -p %p"
            promote_delay = "5s"
        "#,
    )
    .unwrap();

    let config = DaemonConfig::from_file(file.path().to_str().unwrap())
        .await
        .unwrap();
    assert_eq!(config.node_id, 2);
    assert_eq!(config.promote_delay, Duration::from_secs(5));
}

#[tokio::test]
async fn from_file_reports_a_config_error_for_a_missing_path() {
    let err = DaemonConfig::from_file("/nonexistent/repguard.conf")
        .await
        .unwrap_err();
    assert!(matches!(err, RepguardError::Config(_)));
}
