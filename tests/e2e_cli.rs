//! End-to-end CLI tests for springbok.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn springbok() -> Command {
    Command::cargo_bin("springbok").expect("binary")
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, content).expect("write");
}

// ============================================
// Basic CLI Tests
// ============================================

mod cli_basics {
    use super::*;

    #[test]
    fn shows_help() {
        springbok()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("springbok"))
            .stdout(predicate::str::contains("--mode"));
    }

    #[test]
    fn shows_version() {
        springbok()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn rejects_unknown_flags() {
        springbok()
            .arg("--frobnicate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown flag"));
    }

    #[test]
    fn short_alias_binary_works() {
        Command::cargo_bin("sbok")
            .expect("binary")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("springbok"));
    }
}

// ============================================
// Generation Tests
// ============================================

mod generation {
    use super::*;

    #[test]
    fn creates_build_file() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok().current_dir(tmp.path()).assert().success();
        let build = fs::read_to_string(tmp.path().join("a/BUILD.bazel")).expect("build");
        assert!(build.contains("go_library("));
    }

    #[test]
    fn respects_repo_root_flag() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok()
            .arg("--repo-root")
            .arg(tmp.path())
            .assert()
            .success();
        assert!(tmp.path().join("a/BUILD.bazel").exists());
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok()
            .current_dir(tmp.path())
            .arg("-n")
            .assert()
            .success()
            .stderr(predicate::str::contains("would write"));
        assert!(!tmp.path().join("a/BUILD.bazel").exists());
    }

    #[test]
    fn print_mode_writes_to_stdout() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok()
            .current_dir(tmp.path())
            .arg("--mode")
            .arg("print")
            .assert()
            .success()
            .stdout(predicate::str::contains("go_library("));
        assert!(!tmp.path().join("a/BUILD.bazel").exists());
    }

    #[test]
    fn json_report_is_emitted() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok()
            .current_dir(tmp.path())
            .arg("--json")
            .assert()
            .success()
            .stdout(predicate::str::contains("\"schema\": \"springbok-run\""))
            .stdout(predicate::str::contains("\"files_written\""));
    }

    #[test]
    fn build_name_flag_changes_output_file() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok()
            .current_dir(tmp.path())
            .arg("--build-name")
            .arg("BUILD")
            .assert()
            .success();
        assert!(tmp.path().join("a/BUILD").exists());
        assert!(!tmp.path().join("a/BUILD.bazel").exists());
    }

    #[test]
    fn prefix_flag_sets_import_paths() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok()
            .current_dir(tmp.path())
            .arg("--prefix")
            .arg("example.com/repo")
            .assert()
            .success();
        let build = fs::read_to_string(tmp.path().join("a/BUILD.bazel")).expect("build");
        assert!(build.contains("importpath = \"example.com/repo/a\""));
    }

    #[test]
    fn limits_update_to_given_directory() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");
        write(tmp.path(), "b/b.go", "package b\n");

        springbok().current_dir(tmp.path()).arg("a").assert().success();
        assert!(tmp.path().join("a/BUILD.bazel").exists());
        assert!(!tmp.path().join("b/BUILD.bazel").exists());
    }
}

// ============================================
// Strict Mode Tests
// ============================================

mod strict_mode {
    use super::*;

    #[test]
    fn unknown_directive_warns_by_default() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "BUILD.bazel", "# springbok:excldue foo\n");
        write(tmp.path(), "a/a.go", "package a\n");

        springbok()
            .current_dir(tmp.path())
            .assert()
            .success()
            .stderr(predicate::str::contains("unknown directive"))
            .stderr(predicate::str::contains("exclude"));
    }

    #[test]
    fn unknown_directive_fatal_in_strict_mode() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "BUILD.bazel", "# springbok:excldue foo\n");

        springbok()
            .current_dir(tmp.path())
            .arg("--strict")
            .assert()
            .failure();
    }

    #[test]
    fn parse_error_fatal_in_strict_mode() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a/a.go", "package a\n");
        write(tmp.path(), "a/BUILD.bazel", "go_library(name = )\n");

        springbok()
            .current_dir(tmp.path())
            .arg("--strict")
            .assert()
            .failure();
        springbok().current_dir(tmp.path()).assert().success();
    }
}
