//! Integration tests for Skiff

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Binary with settings isolated from the user's own
    fn skiff(workspace: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("skiff");
        cmd.env("SKIFF_CONFIG", workspace.join("settings.toml"))
            .env_remove("SKIFF_PROJECT")
            .env_remove("SKIFF_PROFILE")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Project whose single image is "built" by running `command`
    fn project(workspace: &Path, name: &str, command: &str, extra: &str) -> PathBuf {
        let root = workspace.join(name);
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("main.txt"), name).unwrap();
        fs::write(
            root.join("skiff.toml"),
            format!(
                "name = \"{0}\"\n\n[images.{0}]\nimage = \"registry.local/{0}\"\n\
                 backend = \"custom\"\ncommand = \"{1}\"\n{2}",
                name, command, extra
            ),
        )
        .unwrap();
        root
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        skiff(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("incremental builds and deploys"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        skiff(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("skiff"));
    }

    #[test]
    fn completions_print_script() {
        let temp = TempDir::new().unwrap();
        skiff(temp.path())
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("skiff"));
    }

    #[test]
    fn build_then_nothing_to_do() {
        let temp = TempDir::new().unwrap();
        let web = project(temp.path(), "web", "true", "");

        skiff(temp.path())
            .arg("build")
            .arg("--project")
            .arg(&web)
            .assert()
            .success()
            .stdout(predicate::str::contains("built image web"));

        skiff(temp.path())
            .arg("build")
            .arg("--project")
            .arg(&web)
            .assert()
            .success()
            .stdout(predicate::str::contains("Everything is up to date"));
    }

    #[test]
    fn project_found_from_working_directory() {
        let temp = TempDir::new().unwrap();
        let web = project(temp.path(), "web", "true", "");
        let nested = web.join("src");
        fs::create_dir_all(&nested).unwrap();

        skiff(temp.path())
            .current_dir(&nested)
            .arg("build")
            .assert()
            .success()
            .stdout(predicate::str::contains("built image web"));
    }

    #[test]
    fn dependencies_build_first() {
        let temp = TempDir::new().unwrap();
        project(temp.path(), "api", "true", "");
        let web = project(
            temp.path(),
            "web",
            "true",
            "\n[[dependencies]]\nname = \"api\"\npath = \"../api\"\n",
        );

        skiff(temp.path())
            .arg("build")
            .arg("--project")
            .arg(&web)
            .assert()
            .success()
            .stdout(predicate::str::is_match(r"(?s)\[api\].*\[web\]").unwrap());
    }

    #[test]
    fn cycle_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        project(
            temp.path(),
            "b",
            "true",
            "\n[[dependencies]]\nname = \"a\"\npath = \"../a\"\n",
        );
        let a = project(
            temp.path(),
            "a",
            "true",
            "\n[[dependencies]]\nname = \"b\"\npath = \"../b\"\n",
        );

        skiff(temp.path())
            .arg("build")
            .arg("--project")
            .arg(&a)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Cyclic dependency"))
            .stderr(predicate::str::contains("--allow-cyclic"));
    }

    #[test]
    fn failing_build_exits_non_zero() {
        let temp = TempDir::new().unwrap();
        let web = project(temp.path(), "web", "exit 3", "");

        skiff(temp.path())
            .arg("build")
            .arg("--project")
            .arg(&web)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to build image 'web'"));
    }

    #[test]
    fn unknown_pipeline_fails() {
        let temp = TempDir::new().unwrap();
        let web = project(temp.path(), "web", "true", "");

        skiff(temp.path())
            .args(["run-pipeline", "nightly", "--project"])
            .arg(&web)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Pipeline 'nightly' is not defined"));
    }

    #[test]
    fn project_pipeline_runs() {
        let temp = TempDir::new().unwrap();
        let web = project(
            temp.path(),
            "web",
            "true",
            "\n[pipelines.images]\ndeploy = false\n",
        );

        skiff(temp.path())
            .args(["run-pipeline", "images", "--project"])
            .arg(&web)
            .assert()
            .success()
            .stdout(predicate::str::contains("built image web"));
    }

    #[test]
    fn cache_show_and_clear() {
        let temp = TempDir::new().unwrap();
        let web = project(temp.path(), "web", "true", "");

        skiff(temp.path())
            .arg("build")
            .arg("--project")
            .arg(&web)
            .assert()
            .success();

        skiff(temp.path())
            .args(["cache", "show", "--project"])
            .arg(&web)
            .assert()
            .success()
            .stdout(predicate::str::contains("registry.local/web:"));

        skiff(temp.path())
            .args(["cache", "show", "--format", "json", "--project"])
            .arg(&web)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"default\""));

        skiff(temp.path())
            .args(["cache", "clear", "--project"])
            .arg(&web)
            .assert()
            .success()
            .stdout(predicate::str::contains("Cleared cache"));
        assert!(!web.join(".skiff/cache.json").exists());
    }

    #[test]
    fn corrupt_cache_is_reported() {
        let temp = TempDir::new().unwrap();
        let web = project(temp.path(), "web", "true", "");
        fs::create_dir_all(web.join(".skiff")).unwrap();
        fs::write(web.join(".skiff/cache.json"), "{ truncated").unwrap();

        skiff(temp.path())
            .arg("build")
            .arg("--project")
            .arg(&web)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Corrupt cache file"))
            .stderr(predicate::str::contains("skiff cache clear"));
    }
}
