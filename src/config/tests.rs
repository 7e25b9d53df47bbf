use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_cover_every_section() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.content.path, PathBuf::from(DEFAULT_CONTENT_PATH));
    assert_eq!(settings.facade.incremental_max_changes, 16);
    assert_eq!(settings.facade.refresh_interval_ms, 0);
    assert_eq!(settings.routing.finders, DEFAULT_FINDERS.to_vec());
    assert_eq!(settings.routing.url_providers, DEFAULT_URL_PROVIDERS.to_vec());
    assert_eq!(settings.routing.url_mode, UrlMode::Auto);
    assert!(settings.views.is_empty());
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_retained_versions_is_rejected() {
    let mut raw = RawSettings::default();
    raw.facade.retained_versions = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero history");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "facade.retained_versions",
            ..
        }
    ));
}

#[test]
fn duplicate_finders_are_rejected() {
    let mut raw = RawSettings::default();
    raw.routing.finders = Some(vec![FinderKind::Route, FinderKind::IdPath, FinderKind::Route]);

    let err = Settings::from_raw(raw).expect_err("duplicate finder");
    assert!(matches!(err, LoadError::Invalid { key: "routing.finders", .. }));
}

#[test]
fn configured_finder_order_is_kept() {
    let mut raw = RawSettings::default();
    raw.routing.finders = Some(vec![FinderKind::UrlAlias, FinderKind::Route]);

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.routing.finders,
        vec![FinderKind::UrlAlias, FinderKind::Route]
    );
}

#[test]
fn unknown_url_mode_is_rejected() {
    let mut raw = RawSettings::default();
    raw.routing.url_mode = Some("sideways".to_string());

    let err = Settings::from_raw(raw).expect_err("bad mode");
    assert!(matches!(err, LoadError::Invalid { key: "routing.url_mode", .. }));
}

#[test]
fn views_parse_declared_models() {
    let mut raw = RawSettings::default();
    raw.views.insert("Article".to_string(), "RenderModel<article>".to_string());
    raw.views.insert("home".to_string(), "page".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.views.get("article"),
        Some(&DeclaredModel::RenderModelOf("article".into()))
    );
    assert_eq!(
        settings.views.get("home"),
        Some(&DeclaredModel::Content("page".into()))
    );
}

#[test]
fn malformed_view_model_is_rejected() {
    let mut raw = RawSettings::default();
    raw.views.insert("article".to_string(), "RenderModel<>".to_string());

    let err = Settings::from_raw(raw).expect_err("bad model");
    assert!(matches!(err, LoadError::Invalid { key: "views", .. }));
}

#[test]
fn redirect_sources_must_be_paths() {
    let mut raw = RawSettings::default();
    raw.routing.redirects.push(RedirectRule {
        from: "old".to_string(),
        to: "/new".to_string(),
        permanent: true,
    });

    let err = Settings::from_raw(raw).expect_err("relative source");
    assert!(matches!(err, LoadError::Invalid { key: "routing.redirects", .. }));
}

#[test]
fn routing_section_deserializes_from_toml() {
    let raw: RawSettings = toml::from_str(
        r#"
        [routing]
        finders = ["id_path", "route"]
        url_mode = "absolute"
        not_found_content_id = 9

        [[routing.domains]]
        host = "example.fr"
        path_prefix = "/fr"
        culture = "fr-FR"
        root_id = 1

        [views]
        article = "RenderModel<article>"
        "#,
    )
    .expect("toml");

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.routing.finders,
        vec![FinderKind::IdPath, FinderKind::Route]
    );
    assert_eq!(settings.routing.url_mode, UrlMode::Absolute);
    assert_eq!(settings.routing.not_found_content_id, Some(ContentId(9)));
    assert_eq!(settings.routing.domains.len(), 1);
    assert_eq!(settings.routing.domains[0].root_id, ContentId(1));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["folio"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_resolve_arguments() {
    let args = CliArgs::parse_from([
        "folio",
        "resolve",
        "--host",
        "example.fr",
        "--content-path",
        "/tmp/site.toml",
        "/fr/about?altTemplate=print",
    ]);

    match args.command.expect("resolve command") {
        Command::Resolve(resolve) => {
            assert_eq!(resolve.host, "example.fr");
            assert_eq!(resolve.path, "/fr/about?altTemplate=print");
            assert_eq!(
                resolve.content.content_path.as_deref(),
                Some(std::path::Path::new("/tmp/site.toml"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_url_arguments() {
    let args = CliArgs::parse_from(["folio", "url", "--mode", "absolute", "42"]);

    match args.command.expect("url command") {
        Command::Url(url) => {
            assert_eq!(url.id, 42);
            assert_eq!(url.mode, Some(UrlMode::Absolute));
            assert_eq!(url.host, "localhost");
        }
        _ => panic!("wrong command parsed"),
    }
}
