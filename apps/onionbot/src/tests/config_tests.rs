use super::*;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn defaults_point_at_local_control_service() {
    let settings = settings_from(None, no_env);

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.control_url, "http://127.0.0.1:5000/");
    assert_eq!(settings.engine_config().tick, Duration::from_millis(100));
    assert_eq!(settings.engine_config().settle_factor, 5.0);
}

#[test]
fn file_values_override_defaults() {
    let settings = settings_from(
        Some(
            r#"
            control_url = "http://onionbot.local:5000/"
            recipe_path = "recipes/pasta.toml"
            tick_ms = 250
            settle_factor = 3
            "#,
        ),
        no_env,
    );

    assert_eq!(settings.control_url, "http://onionbot.local:5000/");
    assert_eq!(settings.recipe_path, PathBuf::from("recipes/pasta.toml"));
    assert_eq!(settings.tick_ms, 250);
    assert_eq!(settings.settle_factor, 3.0);
    assert_eq!(settings.request_timeout_ms, 2000);
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let env = |key: &str| match key {
        "ONIONBOT_CONTROL_URL" => Some("http://from-plain-env:5000/".to_string()),
        "APP__CONTROL_URL" => Some("http://from-app-env:5000/".to_string()),
        "ONIONBOT_RECIPE" => Some("soup.json".to_string()),
        "APP__TICK_MS" => Some("50".to_string()),
        "APP__SETTLE_FACTOR" => Some("not a number".to_string()),
        _ => None,
    };

    let settings = settings_from(Some("tick_ms = 250\nsettle_factor = 2.5"), env);

    assert_eq!(settings.control_url, "http://from-app-env:5000/");
    assert_eq!(settings.recipe_path, PathBuf::from("soup.json"));
    assert_eq!(settings.tick_ms, 50);
    assert_eq!(settings.settle_factor, 2.5);
}

#[test]
fn malformed_file_is_ignored() {
    let settings = settings_from(Some("control_url = ["), no_env);

    assert_eq!(settings, Settings::default());
}

#[test]
fn control_url_gains_scheme_and_trailing_slash() {
    assert_eq!(
        prepare_control_url("192.168.1.20:5000").expect("url"),
        "http://192.168.1.20:5000/"
    );
    assert_eq!(
        prepare_control_url(" https://kitchen.example ").expect("url"),
        "https://kitchen.example/"
    );
    assert_eq!(
        prepare_control_url("").expect("url"),
        Settings::default().control_url
    );
}

#[test]
fn control_url_rejects_other_schemes() {
    assert!(prepare_control_url("ftp://kitchen.example").is_err());
    assert!(prepare_control_url("http://").is_err());
}

#[test]
fn validate_rejects_zero_tick_and_bad_factor() {
    let mut settings = Settings::default();
    assert!(validate(&settings).is_ok());

    settings.tick_ms = 0;
    assert!(validate(&settings).is_err());

    settings.tick_ms = 100;
    settings.settle_factor = f64::NAN;
    assert!(validate(&settings).is_err());
}
