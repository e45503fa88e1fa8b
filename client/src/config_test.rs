use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_when_nothing_set() {
    let cfg = ClientConfig::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg, ClientConfig::default());
    assert_eq!(cfg.url, DEFAULT_URL);
    assert_eq!(cfg.reconnect.max_attempts, 10);
    assert_eq!(cfg.cursor_interval_ms, 16);
    assert!(cfg.renormalize);
    assert!(!cfg.broadcast_undo);
}

#[test]
fn parses_overrides() {
    let cfg = ClientConfig::from_lookup(lookup(&[
        ("SKETCHROOM_URL", "wss://relay.test/ws/"),
        ("SKETCHROOM_USER", "ada"),
        ("SKETCHROOM_RECONNECT_ATTEMPTS", "3"),
        ("SKETCHROOM_BACKOFF_MS", "250"),
        ("SKETCHROOM_BACKOFF_MAX_MS", "2000"),
        ("SKETCHROOM_CURSOR_INTERVAL_MS", "33"),
        ("SKETCHROOM_RENORMALIZE", "off"),
        ("SKETCHROOM_BROADCAST_UNDO", "1"),
    ]))
    .unwrap();
    assert_eq!(cfg.url, "wss://relay.test/ws");
    assert_eq!(cfg.user_name.as_deref(), Some("ada"));
    assert_eq!(cfg.reconnect, ReconnectPolicy { max_attempts: 3, initial_backoff_ms: 250, max_backoff_ms: 2000 });
    assert_eq!(cfg.cursor_interval_ms, 33);
    assert!(!cfg.renormalize);
    assert!(cfg.broadcast_undo);
}

#[test]
fn blank_user_is_none() {
    let cfg = ClientConfig::from_lookup(lookup(&[("SKETCHROOM_USER", "  ")])).unwrap();
    assert!(cfg.user_name.is_none());
}

#[test]
fn invalid_number_is_an_error() {
    let err = ClientConfig::from_lookup(lookup(&[("SKETCHROOM_BACKOFF_MS", "soon")])).unwrap_err();
    assert_eq!(err, ConfigError::Invalid { var: "SKETCHROOM_BACKOFF_MS", value: "soon".into() });
}

#[test]
fn invalid_flag_is_an_error() {
    let err = ClientConfig::from_lookup(lookup(&[("SKETCHROOM_RENORMALIZE", "maybe")])).unwrap_err();
    assert!(err.to_string().contains("SKETCHROOM_RENORMALIZE"));
}

#[test]
fn backoff_doubles_and_caps() {
    let policy = ReconnectPolicy::default();
    let delays: Vec<u64> = (0..6).map(|n| u64::try_from(policy.backoff(n).as_millis()).unwrap()).collect();
    assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10_000, 10_000]);
}

#[test]
fn backoff_survives_huge_attempt_counts() {
    let policy = ReconnectPolicy::default();
    assert_eq!(policy.backoff(200), Duration::from_millis(DEFAULT_BACKOFF_MAX_MS));
}

#[test]
fn connect_url_encodes_user() {
    let cfg = ClientConfig { user_name: Some("Ada L".into()), ..ClientConfig::default() };
    assert_eq!(cfg.connect_url(), "ws://127.0.0.1:3000/ws?user=Ada%20L");
}

#[test]
fn connect_url_appends_to_existing_query() {
    let cfg = ClientConfig {
        url: "ws://host/ws?role=viewer".into(),
        user_name: Some("bo".into()),
        ..ClientConfig::default()
    };
    assert_eq!(cfg.connect_url(), "ws://host/ws?role=viewer&user=bo");
}

#[test]
fn connect_url_without_user_is_plain() {
    assert_eq!(ClientConfig::default().connect_url(), DEFAULT_URL);
}

#[test]
fn connect_url_percent_encodes_reserved_and_unicode() {
    let cfg = ClientConfig { user_name: Some("Zoë & co/?".into()), ..ClientConfig::default() };
    assert_eq!(cfg.connect_url(), "ws://127.0.0.1:3000/ws?user=Zo%C3%AB%20%26%20co%2F%3F");
}

#[test]
fn connect_timeout_is_configurable() {
    assert_eq!(ClientConfig::default().connect_timeout(), Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS));
    let cfg = ClientConfig::from_lookup(lookup(&[("SKETCHROOM_CONNECT_TIMEOUT_MS", "250")])).unwrap();
    assert_eq!(cfg.connect_timeout(), Duration::from_millis(250));
}
