use assert_cmd::Command;

fn shelf() -> Command {
    let mut cmd = Command::cargo_bin("shelf").unwrap();
    cmd.env("SHELF_ENV", "local")
        .env("SHELF_CONFIG_DIR", env!("CARGO_MANIFEST_DIR"));
    cmd
}

#[test]
fn hash_password_prints_an_argon2_phc_string() {
    let output = shelf().args(["hash-password", "rootpass"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.trim().starts_with("$argon2id$"));
    assert!(!stdout.contains("rootpass"));
}

#[test]
fn config_prints_effective_settings_as_json() {
    let output = shelf()
        .arg("config")
        .env("SHELF_SERVER__PORT", "8123")
        .output()
        .unwrap();

    assert!(output.status.success());
    let settings: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(settings["server"]["port"], 8123);
    assert_eq!(settings["environment"], "local");
}

#[test]
fn unknown_environment_is_an_error() {
    shelf().arg("config").env("SHELF_ENV", "moon").assert().failure();
}

#[test]
fn subcommand_is_required() {
    shelf().assert().failure();
}
