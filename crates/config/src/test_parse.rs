#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use keycode::{KeyIdentity, Transition};

    use crate::*;

    #[test]
    fn command_entry_uses_defaults() {
        let json = r#"{
            "registrations": [
                { "type": "command", "key": 3, "description": "say hi",
                  "command": { "executable": "/bin/echo" } }
            ]
        }"#;
        let cfg = parse(json, None).unwrap();
        assert_eq!(cfg.len(), 1);
        let e = &cfg.entries[0];
        assert_eq!(e.key, KeyIdentity::released(3));
        assert_eq!(e.description, "say hi");
        match &e.action {
            ActionSpec::Command(c) => {
                assert_eq!(c.executable, "/bin/echo");
                assert!(c.arguments.is_empty());
                assert!(c.working_dir.is_none());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn app_entry_with_explicit_transition() {
        let json = r#"{
            "registrations": [
                { "type": "app", "key": 9, "description": "Terminal",
                  "transition": "pressed", "appBundleId": "com.apple.Terminal" }
            ]
        }"#;
        let cfg = parse(json, None).unwrap();
        assert_eq!(cfg.entries[0].key, KeyIdentity::new(9, Transition::Pressed));
        assert_eq!(
            cfg.entries[0].action,
            ActionSpec::FocusApp {
                bundle_id: "com.apple.Terminal".into()
            }
        );
    }

    #[test]
    fn command_fields_use_original_names() {
        let json = r#"{
            "registrations": [
                { "type": "command", "key": 1, "description": "list",
                  "command": { "executable": "/bin/ls", "arguments": ["-l", "-a"],
                               "workingDir": "/tmp" } }
            ]
        }"#;
        let cfg = parse(json, None).unwrap();
        let ActionSpec::Command(c) = &cfg.entries[0].action else {
            panic!("expected command");
        };
        assert_eq!(c.arguments, vec!["-l".to_string(), "-a".to_string()]);
        assert_eq!(c.working_dir.as_deref(), Some(Path::new("/tmp")));
    }

    #[test]
    fn unknown_type_is_skipped() {
        let json = r#"{
            "registrations": [
                { "type": "macro", "key": 1, "description": "future" },
                { "type": "command", "key": 2, "description": "ok",
                  "command": { "executable": "true" } }
            ]
        }"#;
        let cfg = parse(json, None).unwrap();
        assert_eq!(cfg.len(), 1);
        assert_eq!(cfg.entries[0].key.code, 2);
    }

    #[test]
    fn malformed_json_reports_location() {
        let json = "{\n  \"registrations\": [\n    { \"type\": \"command\", }\n  ]\n}";
        let err = parse(json, Some(Path::new("/home/u/.hotvay"))).unwrap_err();
        match &err {
            Error::Parse { line, excerpt, .. } => {
                assert_eq!(*line, 3);
                assert!(excerpt.contains('^'));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(err.pretty().starts_with("Config parse error at /home/u/.hotvay:3:"));
    }

    #[test]
    fn missing_field_fails_whole_parse() {
        let json = r#"{ "registrations": [
            { "type": "command", "key": 1, "description": "no command" }
        ] }"#;
        assert!(matches!(parse(json, None), Err(Error::Parse { .. })));
    }

    #[test]
    fn key_out_of_range_fails() {
        let json = r#"{ "registrations": [
            { "type": "app", "key": 300, "description": "x", "appBundleId": "a.b" }
        ] }"#;
        assert!(parse(json, None).is_err());
    }

    #[test]
    fn empty_executable_is_validation_error() {
        let json = r#"{ "registrations": [
            { "type": "app", "key": 1, "description": "a", "appBundleId": "a.b" },
            { "type": "command", "key": 2, "description": "b",
              "command": { "executable": "  " } }
        ] }"#;
        match parse(json, None) {
            Err(Error::Validation { entry, .. }) => assert_eq!(entry, Some(1)),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let json = r#"{ "registrations": [
            { "type": "app", "key": 5, "description": "first", "appBundleId": "a.one" },
            { "type": "app", "key": 5, "description": "second", "appBundleId": "a.two" }
        ] }"#;
        let cfg = parse(json, None).unwrap();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.entries[1].description, "second");
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = parse_bytes(&[0xff, 0xfe, 0x00], None).unwrap_err();
        assert!(matches!(err, Error::Validation { entry: None, .. }));
    }

    #[test]
    fn load_from_missing_path_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_from_path(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn load_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path_in(dir.path());
        fs::write(
            &path,
            r#"{ "registrations": [
                { "type": "app", "key": 1, "description": "a", "appBundleId": "a.b" }
            ] }"#,
        )
        .unwrap();
        assert_eq!(load_from_path(&path).unwrap().len(), 1);
        assert_eq!(resolve_config_path(Some(&path)).unwrap(), path);
    }

    #[test]
    fn resolve_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_config_path(Some(&dir.path().join("nope"))).unwrap_err();
        assert!(err.is_missing());
    }

    #[test]
    fn config_file_lives_in_home() {
        assert_eq!(
            config_path_in(Path::new("/home/u")),
            Path::new("/home/u/.hotvay")
        );
    }
}
