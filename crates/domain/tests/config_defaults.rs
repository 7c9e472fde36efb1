use as_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn explicit_zero_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8010
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn run_section_overrides_grace() {
    let toml_str = r#"
[run]
cancel_grace_ms = 50
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.run.cancel_grace_ms, 50);
    assert!(config.observability.otlp_endpoint.is_none());
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
port = 9000
mock_step_delay_ms = 0

[server.cors]
allowed_origins = ["https://myapp.com"]

[run]
cancel_grace_ms = 100

[observability]
otlp_endpoint = "http://localhost:4317"
sample_rate = 0.5
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.mock_step_delay_ms, 0);
    assert_eq!(config.server.cors.allowed_origins, vec!["https://myapp.com".to_string()]);
    assert_eq!(config.observability.service_name, "assistant-stream");
    assert!(config.validate().is_empty());
}
