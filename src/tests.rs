#[cfg(test)]
mod tests {
    use crate::builders::storage::ModeCache;
    use crate::core::config::Config;
    use crate::core::error::ModeError;
    use std::fs;
    use std::io::{Cursor, Seek, SeekFrom};
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn write_mode(dir: &Path, name: &str, body: &str) {
        fs::write(
            dir.join(format!("{name}.amf")),
            format!("mode {name}\naspell >=0.60.1\n{body}"),
        )
        .unwrap();
    }

    fn setup_config(dirs: &[&TempDir]) -> Config {
        let mut config = Config::new();
        config.attach_mode_cache(Arc::new(ModeCache::new()));
        config
            .set_filter_path(
                dirs.iter()
                    .map(|dir| dir.path().to_string_lossy().into_owned())
                    .collect(),
            )
            .unwrap();
        config
    }

    #[test]
    fn test_csharp_file_activates_csharp_mode() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(
            dir.path(),
            "csharp",
            "magic //csharp/cs\ndescription C# sources\nfilter csharp\n",
        );
        let mut config = setup_config(&[&dir]);
        config.replace("add-filter", "url").unwrap();

        let selected = config.set_mode_from_file("Foo.csharp", None).unwrap();

        assert_eq!(selected.as_deref(), Some("csharp"));
        assert_eq!(config.mode(), Some("csharp"));
        assert_eq!(config.filters(), ["csharp"]);
    }

    #[test]
    fn test_png_magic_decides_over_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "png", "magic /^\\x89PNG/png\ndesc PNG images\n");
        write_mode(dir.path(), "text", "magic //txt\ndesc plain\n");
        let files = tempfile::tempdir().unwrap();
        let real = files.path().join("picture.png");
        let fake = files.path().join("fake.png");
        fs::write(&real, PNG_HEADER).unwrap();
        fs::write(&fake, "not an image at all").unwrap();

        let mut config = setup_config(&[&dir]);
        let registry = config.filter_modes().unwrap();

        let selected = registry.select(&real.to_string_lossy(), None);
        assert_eq!(selected.map(|mode| mode.name()), Some("png"));
        assert!(registry.select(&fake.to_string_lossy(), None).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_latin1_mode_file_still_registers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("text.amf"),
            b"# Copyright Hinterm\xfcller\nmode text\naspell 0.60\nmagic //txt\ndesc plain\n",
        )
        .unwrap();
        write_mode(dir.path(), "tex", "magic //tex\ndesc TeX\n");
        let mut config = setup_config(&[&dir]);

        let registry = config.filter_modes().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("text").unwrap().description(), "plain");
    }

    #[test]
    fn test_first_directory_on_search_path_wins() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_mode(a.path(), "text", "magic //txt\ndesc from a\nfilter url\n");
        write_mode(b.path(), "text", "magic //txt\ndesc from b\nfilter email\n");

        let mut config = setup_config(&[&a, &b]);
        let registry = config.filter_modes().unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("text").unwrap().description(), "from a");
        assert!(registry.get("text").unwrap().file().starts_with(a.path()));
    }

    #[test]
    fn test_empty_extension_token_fails_registry_build() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "broken", "magic /0:4:abc/+/txt\ndesc broken\n");
        let mut config = setup_config(&[&dir]);

        let err = config.filter_modes().unwrap_err();
        assert!(matches!(err.kind(), ModeError::EmptyExtension { offset: 10 }));
        assert_eq!(err.line(), Some(3));
        assert!(err.to_string().contains("broken.amf"));
    }

    #[test]
    fn test_search_path_change_rebuilds_registry() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "text", "magic //txt\ndesc plain\n");
        let mut config = setup_config(&[&dir]);
        let before = config.filter_modes().unwrap();
        assert!(before.get("markdown").is_none());

        write_mode(dir.path(), "markdown", "magic //md\ndesc markdown\n");
        // Still the cached registry until the search path is touched.
        assert!(config.filter_modes().unwrap().get("markdown").is_none());

        let same = config.search_path().unwrap();
        config.replace("filter-path", &same).unwrap();
        let after = config.filter_modes().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.get("markdown").is_some());
    }

    #[test]
    fn test_activation_applies_expansions_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(
            dir.path(),
            "tex",
            "magic //tex\ndesc TeX\nfilter TeX\noption tex-check-comments true\nfilter url\n",
        );
        let mut config = setup_config(&[&dir]);
        config.replace("add-filter", "html").unwrap();

        config.replace("mode", "tex").unwrap();

        assert_eq!(config.filters(), ["tex", "url"]);
        assert_eq!(config.retrieve("tex-check-comments").as_deref(), Some("true"));
    }

    #[test]
    fn test_unknown_mode_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "text", "magic //txt\ndesc plain\n");
        let mut config = setup_config(&[&dir]);

        let err = config.replace("mode", "nroff").unwrap_err();
        assert!(matches!(err, ModeError::UnknownMode(name) if name == "nroff"));
    }

    #[test]
    fn test_self_activating_mode_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "loop", "magic //loop\ndesc loops\noption mode loop\n");
        let mut config = setup_config(&[&dir]);

        let err = config.replace("mode", "loop").unwrap_err();
        assert!(matches!(err.kind(), ModeError::ActivationTooDeep { .. }));
    }

    #[test]
    fn test_supplied_handle_is_left_where_it_was() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "png", "magic /0:8:^\\x89PNG/png\ndesc PNG images\n");
        write_mode(dir.path(), "zip", "magic /0:2:^PK/png/zip\ndesc archives\n");
        let mut config = setup_config(&[&dir]);
        let registry = config.filter_modes().unwrap();

        let mut input = Cursor::new(PNG_HEADER.to_vec());
        input.seek(SeekFrom::Start(3)).unwrap();
        let selected = registry.select("image.png", Some(&mut input)).unwrap();
        assert_eq!(selected.name(), "png");
        assert_eq!(input.position(), 3);

        let mut zip = Cursor::new(b"PK\x03\x04".to_vec());
        let selected = registry.select("image.png", Some(&mut zip)).unwrap();
        assert_eq!(selected.name(), "zip");
        assert_eq!(zip.position(), 0);
    }

    #[test]
    fn test_longer_suffix_is_tried_after_shorter() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "archive", "magic //tar.gz\ndesc archives\n");
        write_mode(dir.path(), "gzip", "magic //gz\ndesc gzip\n");
        let mut config = setup_config(&[&dir]);
        let registry = config.filter_modes().unwrap();

        // `gz` is tried before `tar.gz` within each mode.
        let selected = registry.select("report.tar.gz", None).unwrap();
        assert_eq!(selected.name(), "archive");
        assert_eq!(registry.select("notes.gz", None).unwrap().name(), "gzip");
    }

    #[test]
    fn test_cloned_config_keeps_its_registry() {
        let dir = tempfile::tempdir().unwrap();
        write_mode(dir.path(), "text", "magic //txt\ndesc plain\n");
        let mut config = setup_config(&[&dir]);
        let original = config.filter_modes().unwrap();

        let mut copy = config.clone();
        assert!(Arc::ptr_eq(&original, &copy.filter_modes().unwrap()));

        let same = config.search_path().unwrap();
        config.replace("filter-path", &same).unwrap();
        assert!(Arc::ptr_eq(&original, &copy.filter_modes().unwrap()));
        assert!(!Arc::ptr_eq(&original, &config.filter_modes().unwrap()));
    }
}
