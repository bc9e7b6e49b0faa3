// tests/config_load.rs
use std::{env, fs};

use housing_signals::config::{
    resolve_api_key, PipelineConfig, ENV_CONFIG_PATH, ENV_FULL_REFRESH,
};

#[serial_test::serial]
#[test]
fn env_path_then_default_file_then_builtins() {
    // isolate CWD so a real config/ in the repo does not interfere
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_FULL_REFRESH);

    // nothing on disk -> built-in defaults
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg, PipelineConfig::default());

    // config/pipeline.toml is picked up
    fs::create_dir_all("config").unwrap();
    fs::write("config/pipeline.toml", "[trends]\ngeo = \"US-TX\"\n").unwrap();
    let cfg = PipelineConfig::load_default().unwrap();
    assert_eq!(cfg.trends.geo, "US-TX");

    // env var wins over the default file
    let explicit = tmp.path().join("other.toml");
    fs::write(&explicit, "[trends]\ngeo = \"US-CA\"\n").unwrap();
    env::set_var(ENV_CONFIG_PATH, explicit.display().to_string());
    assert_eq!(PipelineConfig::load_default().unwrap().trends.geo, "US-CA");

    // ... and must exist
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(PipelineConfig::load_default().is_err());
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn full_refresh_env_disables_incremental() {
    let mut cfg = PipelineConfig::default();
    env::set_var(ENV_FULL_REFRESH, "1");
    cfg.apply_env_overrides();
    env::remove_var(ENV_FULL_REFRESH);
    assert!(!cfg.incremental);
}

#[serial_test::serial]
#[test]
fn env_placeholder_reads_the_environment() {
    env::set_var("HS_TEST_API_KEY", "from-env");
    assert_eq!(resolve_api_key("ENV", "HS_TEST_API_KEY").as_deref(), Some("from-env"));
    env::remove_var("HS_TEST_API_KEY");
    assert_eq!(resolve_api_key("ENV", "HS_TEST_API_KEY"), None);
}
