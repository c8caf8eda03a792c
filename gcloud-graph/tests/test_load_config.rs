use serial_test::serial;
use std::env;
use std::fs::write;
use tempfile::NamedTempFile;

use gcloud_graph::load_config::{load_collector_config, load_config, ACCESS_TOKEN_ENV};

fn yaml_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), content).unwrap();
    file
}

#[test]
#[serial]
fn loads_yaml_and_token_from_env() {
    let file = yaml_file(
        r#"
project_id: my-project-1
app_id: legacy-app
endpoint_override: http://127.0.0.1:9000
disabled_steps:
  - fetch-iam-bindings
"#,
    );
    env::set_var(ACCESS_TOKEN_ENV, "ya29.token");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.access_token, "ya29.token");
    assert_eq!(config.collector.project_id, "my-project-1");
    assert_eq!(config.collector.app_id(), "legacy-app");
    assert_eq!(config.collector.request_timeout_secs, 60);
    assert_eq!(config.collector.disabled_steps, vec!["fetch-iam-bindings"]);
    assert!(config.collector.is_disabled("fetch-iam-bindings"));
}

#[test]
#[serial]
fn empty_token_is_rejected() {
    let file = yaml_file("project_id: my-project-1\n");
    env::set_var(ACCESS_TOKEN_ENV, "  ");

    let err = load_config(file.path()).unwrap_err();

    assert!(err.to_string().contains(ACCESS_TOKEN_ENV));
}

#[test]
#[serial]
fn missing_project_id_is_a_parse_error() {
    let file = yaml_file("app_id: something\n");

    let err = load_collector_config(file.path()).unwrap_err();

    assert!(err.to_string().contains("Failed to parse config YAML"));
}

#[test]
fn missing_file_is_reported_with_path() {
    let err = load_collector_config("/no/such/config.yaml").unwrap_err();

    assert!(err.to_string().contains("/no/such/config.yaml"));
}
