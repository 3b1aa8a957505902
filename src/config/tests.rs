use super::settings::Settings;
use super::load_config_from;
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.store.path, "docqueue_db");
    assert_eq!(settings.queue.name, "default");
    assert_eq!(settings.queue.visibility_secs, 30.0);
    assert_eq!(settings.queue.expiry_secs, None);
    assert_eq!(settings.queue.sweep_interval_secs, 60.0);
    assert_eq!(settings.logging.level, "info");
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let base = tmp.path().join("absent");
    let cfg = load_config_from(base.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg, Settings::default());
}

#[test]
#[serial]
fn test_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let toml = r#"
        [store]
        path = "/var/lib/docqueue"

        [queue]
        name = "jobs"
        visibility_secs = 1.5
        expiry_secs = 120
    "#;
    fs::write(tmp.path().join("docqueue.toml"), toml).expect("write config file");
    let base = tmp.path().join("docqueue");

    let cfg = load_config_from(base.to_str().unwrap()).expect("load_config failed");
    assert_eq!(cfg.store.path, "/var/lib/docqueue");
    assert_eq!(cfg.queue.name, "jobs");
    assert_eq!(cfg.queue.visibility_secs, 1.5);
    assert_eq!(cfg.queue.expiry_secs, Some(120.0));
    // untouched values keep their defaults
    assert_eq!(cfg.queue.sweep_interval_secs, 60.0);
    assert_eq!(cfg.logging.level, "info");
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    fs::write(
        tmp.path().join("docqueue.toml"),
        "[queue]\nname = \"from-file\"\nvisibility_secs = 5\n",
    )
    .expect("write config file");
    let base = tmp.path().join("docqueue");

    temp_env::with_vars(
        [
            ("DOCQUEUE_QUEUE__NAME", Some("from-env")),
            ("DOCQUEUE_LOGGING__LEVEL", Some("debug")),
        ],
        || {
            let cfg = load_config_from(base.to_str().unwrap()).expect("load_config failed");
            assert_eq!(cfg.queue.name, "from-env");
            assert_eq!(cfg.queue.visibility_secs, 5.0);
            assert_eq!(cfg.logging.level, "debug");
        },
    );
}
