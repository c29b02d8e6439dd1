use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("container-bookmarks").expect("binary builds");
    cmd.env("CONTAINER_BOOKMARKS_PREFERENCES__REDIRECT_KEY", "container");
    cmd
}

#[test]
fn prints_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Container Bookmarks"))
        .stdout(predicate::str::contains("--version"));
}

#[test]
fn encodes_and_decodes() {
    cli()
        .args(["encode", "https://example.com/page", "Work"])
        .assert()
        .success()
        .stdout("https://example.com/page#container-work\n");

    cli()
        .args(["decode", "https://example.com/page#container-work"])
        .assert()
        .success()
        .stdout("work\n");

    cli()
        .args(["decode", "https://example.com/page"])
        .assert()
        .success()
        .stdout("none\n");
}

#[test]
fn rewrites_both_directions() {
    cli()
        .args(["rewrite", "https://example.com/page#container-work"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#""redirectUrl":"http://www.work.container/https://example.com/page""#,
        ));

    cli()
        .args(["rewrite", "http://www.work.container/https://example.com/page"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#""redirectUrl":"https://example.com/page""#,
        ));

    cli()
        .args(["rewrite", "https://example.com/page"])
        .assert()
        .success()
        .stdout("{}\n");
}

#[test]
fn redirect_key_follows_environment() {
    cli()
        .env("CONTAINER_BOOKMARKS_PREFERENCES__REDIRECT_KEY", "ctx")
        .args(["encode", "https://example.com/", "Work"])
        .assert()
        .success()
        .stdout("https://example.com/#ctx-work\n");
}

#[test]
fn rejects_unknown_command() {
    cli()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown or incomplete command"));
}

#[test]
fn infers_from_scenario_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scenario.json");
    std::fs::write(
        &path,
        r#"{
  "bookmarks": [
    {"title": "A", "url": "https://a.test/"},
    {"title": "B", "url": "https://b.test/"},
    {"title": "C", "url": "https://c.test/"}
  ],
  "tabs": [
    {"url": "https://b.test/", "windowId": 1, "cookieStoreId": "firefox-container-1"},
    {"url": "https://a.test/", "windowId": 1, "cookieStoreId": "firefox-container-2"},
    {"url": "https://c.test/", "windowId": 1, "cookieStoreId": "firefox-default"}
  ],
  "containers": [
    {"name": "x", "cookieStoreId": "firefox-container-1"},
    {"name": "y", "cookieStoreId": "firefox-container-2"}
  ]
}"#,
    )
    .unwrap();

    cli()
        .arg("infer")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://a.test/#container-y"))
        .stdout(predicate::str::contains("https://b.test/#container-x"))
        .stdout(predicate::str::contains("https://c.test/").not());
}
