extern crate uptane;

use uptane::datatype::{Config, RunningMode};

#[test]
fn empty_toml_uses_every_section_default() {
    let config = Config::parse("").expect("empty config should parse with defaults");
    assert_eq!(config.uptane.running_mode, RunningMode::Full);
    assert_eq!(config.pacman.kind, "fake");
}

#[test]
fn uptane_section_overrides_are_applied() {
    let toml = r#"
        [uptane]
        director_server = "https://director.example.net"
        repo_server = "https://image.example.net"
        running_mode = "once"
        polling_sec = 42
    "#;
    let config = Config::parse(toml).unwrap();
    assert_eq!(config.uptane.director_server, "https://director.example.net");
    assert_eq!(config.uptane.repo_server, "https://image.example.net");
    assert_eq!(config.uptane.running_mode, RunningMode::Once);
    assert_eq!(config.uptane.polling_sec, 42);
}

#[test]
fn unknown_running_mode_is_rejected() {
    let toml = r#"
        [uptane]
        running_mode = "never"
    "#;
    assert!(Config::parse(toml).is_err());
}

#[test]
fn pacman_kind_is_parsed_against_the_factory() {
    let toml = r#"
        [pacman]
        kind = "docker-compose"
    "#;
    let config = Config::parse(toml).unwrap();
    let tag: uptane::pacman::PackageManager = config.pacman.kind.parse().unwrap();
    assert_eq!(tag, uptane::pacman::PackageManager::DockerCompose);
}
