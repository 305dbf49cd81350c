use chat_relay::config::{AppConfig, DEFAULT_ALLOWED_ORIGINS};
use serial_test::serial;
use std::env;
use std::fs;

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        for key in [
            "CHAT_SERVER__PORT",
            "CHAT_CORS__ALLOWED_ORIGINS",
            "CHAT_LLM__MODEL",
            "CHAT_CLIENT__ENDPOINT",
            "LLM_BASE_URL",
            "LLM_MODEL",
            "LLM_API_KEY",
            "OPENAI_API_KEY",
            "AZURE_DEPLOYMENT_NAME",
            "AZURE_API_VERSION",
            "CONFIG_FILE",
            "PORT",
            "RELAY_URL",
            "LOG_JSON",
        ] {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(["chat-relay"]).expect("defaults should load");

    assert_eq!(config.server.port, 8787);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.request_timeout_secs, 30);
    assert_eq!(config.cors.allowed_origins, DEFAULT_ALLOWED_ORIGINS);
    assert!(config.llm.base_url.is_none());
    assert_eq!(config.llm.model, "gpt-5-nano");
    assert!((config.llm.temperature - 1.0).abs() < f32::EPSILON);
    assert_eq!(config.client.endpoint, "http://localhost:8787");
    assert_eq!(config.client.storage_key, "conversations");
    assert!(!config.log_json);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("CHAT_SERVER__PORT", "9090");
        env::set_var("CHAT_LLM__MODEL", "gpt-4o-mini");
    }

    let config = AppConfig::load_from_args(["chat-relay"]).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.llm.model, "gpt-4o-mini");

    clear_env_vars();
}

#[test]
#[serial]
fn test_env_origin_list() {
    clear_env_vars();
    unsafe {
        env::set_var(
            "CHAT_CORS__ALLOWED_ORIGINS",
            "http://a.test,https://b.test",
        );
    }

    let config = AppConfig::load_from_args(["chat-relay"]).expect("Failed to load config");
    assert_eq!(
        config.cors.allowed_origins,
        vec!["http://a.test".to_string(), "https://b.test".to_string()]
    );

    clear_env_vars();
}

#[test]
#[serial]
fn test_llm_env_vars() {
    clear_env_vars();
    unsafe {
        env::set_var("LLM_BASE_URL", "https://api.openai.com");
        env::set_var("OPENAI_API_KEY", "sk-test");
        env::set_var("LLM_MODEL", "  ");
    }

    let config = AppConfig::load_from_args(["chat-relay"]).expect("Failed to load config");
    assert_eq!(
        config.llm.base_url.as_deref(),
        Some("https://api.openai.com")
    );
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    // Blank values are ignored
    assert_eq!(config.llm.model, "gpt-5-nano");

    unsafe {
        env::set_var("LLM_API_KEY", "sk-preferred");
    }
    let config = AppConfig::load_from_args(["chat-relay"]).expect("Failed to load config");
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-preferred"));

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env_vars();
    unsafe {
        env::set_var("CHAT_SERVER__PORT", "9090");
        env::set_var("CHAT_CLIENT__ENDPOINT", "http://from-env:1");
    }

    let config = AppConfig::load_from_args([
        "chat-relay",
        "--port",
        "7171",
        "chat",
        "--endpoint",
        "http://from-cli:2",
    ])
    .expect("Failed to load config");

    assert_eq!(config.server.port, 7171);
    assert_eq!(config.client.endpoint, "http://from-cli:2");

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("relay.yaml");
    fs::write(
        &file_path,
        r"
server:
  port: 7070
llm:
  fallback_reply: from file
cors:
  allowed_origins:
    - https://only.test
",
    )
    .expect("Failed to write temp config");

    let config = AppConfig::load_from_args(["chat-relay", "--config", file_path.to_str().unwrap()])
        .expect("Failed to load config from file");

    assert_eq!(config.server.port, 7070);
    assert_eq!(config.llm.fallback_reply, "from file");
    assert_eq!(config.cors.allowed_origins, vec!["https://only.test"]);
    // Untouched sections keep their defaults
    assert_eq!(config.client.request_timeout_secs, 60);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["chat-relay", "--config", "/nonexistent/relay.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let config_content = r"
server:
  port: 6060
    ";
    let cwd_path = "config.yaml";
    fs::write(cwd_path, config_content).expect("Failed to write ./config.yaml");

    // No Env var, No CLI
    // Should pick up ./config.yaml
    let config = AppConfig::load_from_args(["chat-relay"]);

    fs::remove_file(cwd_path).unwrap();

    assert_eq!(config.expect("Failed to load config").server.port, 6060);
}
