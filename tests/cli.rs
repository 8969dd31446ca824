//! CLI integration tests.
//!
//! Tests the command-line interface by running the binary as a subprocess
//! against a mock ADS server.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use mockito::Matcher;

use common::{ads_body, bibcode_query, write_file, BLINOV, KIEHLMANN, KIEHLMANN_NO_AMP, SCHLEGEL};

/// Path to the compiled binary
fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tex2bib"))
}

/// Command running in `dir` with no ambient token or config.
fn command_in(dir: &Path) -> Command {
    let mut cmd = Command::new(binary_path());
    cmd.current_dir(dir)
        .env_remove("ADS_API_TOKEN")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("HOME", dir);
    cmd
}

/// Writes a config file pointing at `endpoint`, optionally with a token.
fn write_config(dir: &Path, endpoint: &str, token: Option<&str>) -> PathBuf {
    let mut content = format!("endpoint = \"{}\"\n", endpoint);
    if let Some(token) = token {
        content.push_str(&format!("token = \"{}\"\n", token));
    }
    write_file(dir, "tex2bib.toml", &content)
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// ============================================
// Tests for CLI argument parsing
// ============================================

#[test]
fn test_cli_help() {
    // Given: The CLI binary
    let output = Command::new(binary_path())
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    // Then: Help lists the options
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "Help should exit with success");
    for option in ["--token", "--bibfile", "--ampersand", "--verbose", "TEXFILE"] {
        assert!(stdout.contains(option), "Help should mention {}: {}", option, stdout);
    }
}

#[test]
fn test_cli_missing_input_argument() {
    let dir = tempfile::tempdir().unwrap();

    let output = command_in(dir.path())
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Running without inputs should fail");
    let stderr = stderr(&output);
    assert!(
        stderr.contains("required") || stderr.contains("Usage"),
        "Should indicate missing TEXFILE: {}",
        stderr
    );
}

// ============================================
// Tests for fatal errors
// ============================================

#[test]
fn test_cli_missing_token_fails_before_network() {
    // Given: a config without a token, pointing at a server that must not be called
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create();
    let config = write_config(dir.path(), &server.url(), None);
    let tex = write_file(dir.path(), "paper.tex", &format!(r"\cite{{{}}}", SCHLEGEL));
    let bibfile = write_file(dir.path(), "references.bib", "% previous run\n");

    // When: we run without --token
    let output = command_in(dir.path())
        .arg(&tex)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    // Then: exit code 11, no request and the existing bib file is untouched
    assert_eq!(output.status.code(), Some(11), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("no ADS token"));
    mock.assert();
    assert_eq!(fs::read_to_string(&bibfile).unwrap(), "% previous run\n");
    // Only the config, the document and the old bib file
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
}

#[test]
fn test_cli_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:1", Some("t"));

    let output = command_in(dir.path())
        .arg("does-not-exist.tex")
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(10), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("does-not-exist.tex"));
    assert!(!dir.path().join("references.bib").exists());
}

#[test]
fn test_cli_rejected_token() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/search/query")
        .match_query(Matcher::Any)
        .with_status(401)
        .with_body(r#"{"error": "Unauthorized"}"#)
        .create();
    let config = write_config(dir.path(), &server.url(), Some("wrong"));
    let tex = write_file(dir.path(), "paper.tex", &format!(r"\cite{{{}}}", SCHLEGEL));

    let output = command_in(dir.path())
        .arg(&tex)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(12), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("token"));
    assert!(!dir.path().join("references.bib").exists());
}

#[test]
fn test_cli_unreachable_service() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:1", Some("t"));
    let tex = write_file(dir.path(), "paper.tex", &format!(r"\cite{{{}}}", SCHLEGEL));

    let output = command_in(dir.path())
        .arg(&tex)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(12), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("references.bib").exists());
}

#[test]
fn test_cli_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "tex2bib.toml", "batch_size = \"many\"\n");
    let tex = write_file(dir.path(), "paper.tex", "");

    let output = command_in(dir.path())
        .arg(&tex)
        .arg("--config")
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(14), "stderr: {}", stderr(&output));
}

#[test]
fn test_cli_unwritable_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/search/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(ads_body(&[SCHLEGEL]))
        .create();
    let config = write_config(dir.path(), &server.url(), Some("t"));
    let tex = write_file(dir.path(), "paper.tex", &format!(r"\cite{{{}}}", SCHLEGEL));

    let output = command_in(dir.path())
        .arg(&tex)
        .args(["--config", config.to_str().unwrap()])
        .args(["-b", "missing-dir/out.bib"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(13), "stderr: {}", stderr(&output));
    assert!(!dir.path().join("missing-dir").exists());
}

// ============================================
// Tests for successful runs
// ============================================

#[test]
fn test_cli_writes_default_bibfile() {
    // Given: a document citing two bibcodes, both known to the server
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/search/query")
        .match_header("authorization", "Bearer flag-token")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            bibcode_query(&[SCHLEGEL, BLINOV]),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ads_body(&[SCHLEGEL, BLINOV]))
        .expect(1)
        .create();
    // The config token is overridden by --token
    let config = write_config(dir.path(), &server.url(), Some("config-token"));
    let tex = write_file(
        dir.path(),
        "paper.tex",
        &format!(r"\citep{{{}, {}}}", SCHLEGEL, BLINOV),
    );

    // When: we run with -t
    let output = command_in(dir.path())
        .arg(&tex)
        .args(["-t", "flag-token"])
        .args(["--config", config.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    // Then: references.bib is written in the working directory
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    mock.assert();
    let content = fs::read_to_string(dir.path().join("references.bib")).unwrap();
    assert!(content.contains(&format!("@article{{{},", SCHLEGEL)));
    assert!(content.contains(&format!("@article{{{},", BLINOV)));
    assert!(stderr(&output).contains("2 reference(s) written"));
}

#[test]
fn test_cli_token_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/search/query")
        .match_header("authorization", "Bearer env-token")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(ads_body(&[SCHLEGEL]))
        .expect(1)
        .create();
    let config = write_config(dir.path(), &server.url(), None);
    let tex = write_file(dir.path(), "paper.tex", &format!(r"\cite{{{}}}", SCHLEGEL));

    let output = command_in(dir.path())
        .env("ADS_API_TOKEN", "env-token")
        .arg(&tex)
        .args(["--config", config.to_str().unwrap()])
        .args(["--bibfile", "paper.bib"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    mock.assert();
    assert!(dir.path().join("paper.bib").exists());
}

#[test]
fn test_cli_reports_missing_keys_and_succeeds() {
    // Given: the ampersand flag and a server that knows nothing
    let dir = tempfile::tempdir().unwrap();
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/search/query")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            bibcode_query(&[KIEHLMANN_NO_AMP]),
        ))
        .with_status(200)
        .with_body(ads_body(&[]))
        .expect(1)
        .create();
    let config = write_config(dir.path(), &server.url(), Some("t"));
    let tex = write_file(dir.path(), "paper.tex", &format!(r"\citet{{{}}}", KIEHLMANN));

    // When: we run with -a
    let output = command_in(dir.path())
        .arg(&tex)
        .arg("-a")
        .args(["--config", config.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    // Then: success, with the stripped key listed as not found
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    mock.assert();
    let stderr = stderr(&output);
    assert!(stderr.contains("could not be found on ADS"), "{}", stderr);
    assert!(stderr.contains(KIEHLMANN_NO_AMP), "{}", stderr);
    let content = fs::read_to_string(dir.path().join("references.bib")).unwrap();
    assert!(content.is_empty());
}
