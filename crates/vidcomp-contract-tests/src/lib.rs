#![deny(unsafe_code)]

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use vidcomp_core::EngineError;
    use vidcomp_host_winit::PlayerConfig;
    use vidcomp_runtime::runtime_contract::{is_optional_effect_uniform, sampler_name_for};
    use vidcomp_runtime::EffectKind;

    // ---- Golden fixtures (JSON contracts) ----
    const PLAYER_VALID_JSON: &str = include_str!("../fixtures/player_valid.json");
    const PLAYER_BAD_EFFECT_JSON: &str = include_str!("../fixtures/player_bad_effect.json");
    const PLAYER_MISSING_VIDEOS_JSON: &str = include_str!("../fixtures/player_missing_videos.json");
    const PLAYER_TOO_MANY_VIDEOS_JSON: &str =
        include_str!("../fixtures/player_too_many_videos.json");
    const PLAYER_NEGATIVE_TRANSITION_JSON: &str =
        include_str!("../fixtures/player_negative_transition.json");

    fn write_temp_fixture(name: &str, contents: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("vidcomp_contract_tests_{name}_{ts}.json"));
        fs::write(&p, contents).expect("write fixture");
        p
    }

    #[test]
    fn golden_player_valid_json_deserializes() {
        let path = write_temp_fixture("player_valid", PLAYER_VALID_JSON);

        let cfg = PlayerConfig::load(&path).expect("player_valid.json should parse");
        assert_eq!(cfg.compositor.effect, "glitch");
        assert!(!cfg.compositor.apply_effect);
        assert_eq!((cfg.compositor.width, cfg.compositor.height), (1280, 720));
        assert_eq!(cfg.videos.len(), 1);

        let video = &cfg.videos[0];
        assert_eq!(video.fps, 25);
        assert!(!video.r#loop);
        assert_eq!(video.sample_transform[5], -1.0);
        // Relative media paths are resolved next to the config file.
        assert!(video.file.ends_with("clips/intro.mp4"));
        assert!(PathBuf::from(&video.file).is_absolute());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn golden_player_unknown_effect_is_rejected() {
        let path = write_temp_fixture("player_bad_effect", PLAYER_BAD_EFFECT_JSON);

        let err = PlayerConfig::load(&path).expect_err("player_bad_effect.json must fail");
        assert!(matches!(err, EngineError::InvalidConfig { .. }), "{err}");
        assert!(
            err.to_string().to_lowercase().contains("unknown effect"),
            "expected error to mention the unknown effect, got: {err}"
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn golden_player_missing_videos_is_rejected() {
        let path = write_temp_fixture("player_missing_videos", PLAYER_MISSING_VIDEOS_JSON);

        let err = PlayerConfig::load(&path).expect_err("player_missing_videos.json must fail");
        assert!(matches!(err, EngineError::Json { .. }), "{err}");
        assert!(
            err.to_string().contains("missing field"),
            "expected error to mention the missing field, got: {err}"
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn golden_player_too_many_videos_is_rejected() {
        let path = write_temp_fixture("player_too_many_videos", PLAYER_TOO_MANY_VIDEOS_JSON);

        let err = PlayerConfig::load(&path).expect_err("three videos must fail");
        assert!(matches!(err, EngineError::InvalidConfig { .. }), "{err}");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn golden_player_negative_transition_is_rejected() {
        let path = write_temp_fixture(
            "player_negative_transition",
            PLAYER_NEGATIVE_TRANSITION_JSON,
        );

        let err = PlayerConfig::load(&path).expect_err("negative transition must fail");
        assert!(err.to_string().contains("transition_secs"), "{err}");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = PlayerConfig::load("/definitely/not/a/player.json").unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }), "{err}");
    }

    // ---- Effect vocabulary (backend-agnostic) ----

    #[test]
    fn effect_kinds_serialize_lowercase() {
        for kind in EffectKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
            let back: EffectKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn sampler_names_are_not_optional_uniforms() {
        for i in 0..vidcomp_runtime::MAX_SOURCES {
            assert!(!is_optional_effect_uniform(&sampler_name_for(i)));
        }
    }
}

#[cfg(test)]
mod rendering;
