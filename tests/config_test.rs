//! Loading the shipped sample configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use servicebus_consumer::config::{ConfigError, ConfigLoader, IntervalUnit};
use servicebus_consumer::messaging::Credential;

fn sample_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/consumer.yaml")
}

#[test]
fn test_sample_config_loads() {
    let config = ConfigLoader::new()
        .with_file(sample_config())
        .with_env_source(HashMap::new())
        .load()
        .unwrap();

    assert_eq!(config.queue_name, "orders");
    assert_eq!(config.namespace.as_deref(), Some("contoso.servicebus.windows.net"));
    assert_eq!(config.schedule.unit, IntervalUnit::Seconds);
    assert_eq!(config.schedule.period(), Duration::from_secs(30));
    assert!(config.credential.is_none());
}

#[test]
fn test_credential_from_environment() {
    let env = HashMap::from([(
        "SBQ__CREDENTIAL__CONNECTION_STRING".to_string(),
        "Endpoint=sb://contoso.servicebus.windows.net/;SharedAccessKeyName=listen;SharedAccessKey=a2V5"
            .to_string(),
    )]);

    let config = ConfigLoader::new()
        .with_file(sample_config())
        .with_env_source(env)
        .load()
        .unwrap();

    assert!(matches!(
        config.credential,
        Some(Credential::ConnectionString { .. })
    ));
}

#[test]
fn test_invalid_override_is_rejected() {
    let env = HashMap::from([(
        "SBQ__RECEIVE_TIMEOUT_SECONDS".to_string(),
        "0".to_string(),
    )]);

    let err = ConfigLoader::new()
        .with_file(sample_config())
        .with_env_source(env)
        .load()
        .unwrap_err();

    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "receive_timeout_seconds"));
}
