use playback_core::config::{ConfigBackend, ConfigKey, ConfigStore, JsonFileBackend, Preferences};
use std::fs;

#[tokio::test]
async fn test_settings_roundtrip_through_json_file() {
    let dir = tempfile::tempdir().expect("tempdir");

    let store = ConfigStore::json(dir.path());
    store
        .update(|p| {
            p.crossfade_enabled = true;
            p.crossfade_duration_secs = 6;
            p.player_volume = 0.42;
            p.presence_token = Some("secret".to_owned());
        })
        .await
        .expect("update");

    let reopened = ConfigStore::json(dir.path()).get();
    assert!(reopened.crossfade_enabled);
    assert_eq!(reopened.crossfade_duration_secs, 6);
    assert!((reopened.player_volume - 0.42).abs() < f32::EPSILON);
    assert_eq!(reopened.presence_token.as_deref(), Some("secret"));
}

#[test]
fn test_settings_corrupt_file_falls_back_to_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("settings.json"), b"{not-json").expect("write");

    let loaded = JsonFileBackend::new(dir.path()).load();
    assert_eq!(loaded, Preferences::default());
}

#[test]
fn test_settings_ill_typed_key_only_affects_itself() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("settings.json"),
        br#"{"crossfade_enabled": "yes please", "crossfade_duration": 8, "player_volume": 7}"#,
    )
    .expect("write");

    let loaded = JsonFileBackend::new(dir.path()).load();
    assert!(!loaded.crossfade_enabled);
    assert_eq!(loaded.crossfade_duration_secs, 8);
    assert!((loaded.player_volume - 1.0).abs() < f32::EPSILON);
}

#[test]
fn test_settings_keys_parse_back_from_their_names() {
    let mut prefs = Preferences::default();
    for key in ConfigKey::ALL {
        assert_eq!(ConfigKey::parse(key.as_str()), Some(key));
        let rendered = prefs.get_str(key);
        prefs.set_str(key, &rendered).expect("rendered value is accepted");
    }
    assert_eq!(prefs, Preferences::default());
}
