//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod passing {
    use assert_cmd::Command;

    #[test]
    fn lists_languages() {
        let output = Command::cargo_bin("office-translator")
            .unwrap()
            .arg("languages")
            .output()
            .unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.lines().any(|line| line.starts_with("de ")));
        assert!(stdout.contains("zh-CN"));
    }

    #[test]
    fn prints_env_docs() {
        let output = Command::cargo_bin("office-translator")
            .unwrap()
            .arg("env-docs")
            .output()
            .unwrap();

        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("OFFICE_TRANSLATOR_API_KEY"));
    }

    #[test]
    fn writes_example_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("office-translator.toml");

        Command::cargo_bin("office-translator")
            .unwrap()
            .current_dir(dir.path())
            .args(["init-config", path.to_str().unwrap()])
            .assert()
            .success();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("batch_size = 10"));
    }

    /// 接口不可达时批次失败，任务仍然完成并写出原样的问卷
    #[test]
    fn translates_csv_column_mapping_with_unreachable_api() {
        let dir = tempfile::tempdir().unwrap();
        let input = "ID,English,German\n1,Hello,\n2,Bye,Tschüss\n";
        std::fs::write(dir.path().join("survey.csv"), input).unwrap();

        Command::cargo_bin("office-translator")
            .unwrap()
            .current_dir(dir.path())
            .env("OFFICE_TRANSLATOR_API_KEY", "sk-test")
            .env("OFFICE_TRANSLATOR_API_URL", "http://127.0.0.1:9")
            .env("OFFICE_TRANSLATOR_VERIFY_CREDENTIALS", "false")
            .env("OFFICE_TRANSLATOR_BATCH_TIMEOUT", "5")
            .env_remove("HTTP_PROXY")
            .env_remove("HTTPS_PROXY")
            .env_remove("ALL_PROXY")
            .args([
                "translate",
                "survey.csv",
                "--lang",
                "de",
                "--source-column",
                "English",
                "--target-column",
                "German",
                "--max-retries",
                "1",
                "--report",
                "report.json",
            ])
            .assert()
            .success();

        let output = std::fs::read_to_string(dir.path().join("survey_de.csv")).unwrap();
        assert_eq!(output, input);
        let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
        assert!(report.contains("\"state\": \"DONE\""));
        assert!(report.contains("\"units\": 1"));
        assert!(report.contains("\"failed_batches\": 1"));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use assert_cmd::Command;

    fn command(dir: &std::path::Path) -> Command {
        let mut cmd = Command::cargo_bin("office-translator").unwrap();
        cmd.current_dir(dir)
            .env_remove("OFFICE_TRANSLATOR_API_KEY")
            .env_remove("OPENAI_API_KEY")
            .env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn refuses_to_overwrite_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "# mine").unwrap();

        command(dir.path())
            .args(["init-config", path.to_str().unwrap()])
            .assert()
            .failure();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# mine");
    }

    #[test]
    fn rejects_unsupported_file_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Hello").unwrap();

        command(dir.path())
            .args(["translate", "notes.txt"])
            .assert()
            .failure();
    }

    #[test]
    fn missing_api_key_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("survey.csv"), "q\nHello\n").unwrap();

        command(dir.path())
            .args(["translate", "survey.csv", "--lang", "fr", "--report", "report.json"])
            .assert()
            .failure();

        assert!(!dir.path().join("survey_fr.csv").exists());
        let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
        assert!(report.contains("\"state\": \"FAILED\""));
    }

    #[test]
    fn source_column_requires_target_column() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("survey.csv"), "English\nHello\n").unwrap();

        command(dir.path())
            .args(["translate", "survey.csv", "--source-column", "English"])
            .assert()
            .failure();

        assert!(!dir.path().join("survey_de.csv").exists());
    }

    #[test]
    fn unknown_mapping_column_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("survey.csv"), "English,German\nHello,\n").unwrap();

        command(dir.path())
            .env("OFFICE_TRANSLATOR_API_KEY", "sk-test")
            .env("OFFICE_TRANSLATOR_VERIFY_CREDENTIALS", "false")
            .args([
                "translate",
                "survey.csv",
                "--source-column",
                "English",
                "--target-column",
                "Français",
                "--report",
                "report.json",
            ])
            .assert()
            .failure();

        assert!(!dir.path().join("survey_de.csv").exists());
        let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
        assert!(report.contains("\"state\": \"FAILED\""));
    }

    #[test]
    fn rejects_unknown_mode() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("survey.csv"), "q\nHello\n").unwrap();

        command(dir.path())
            .args(["translate", "survey.csv", "--mode", "summarize"])
            .assert()
            .failure();
    }

    #[test]
    fn rejects_unknown_language() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("survey.csv"), "q\nHello\n").unwrap();

        command(dir.path())
            .args(["translate", "survey.csv", "--lang", "tlh"])
            .assert()
            .failure();
    }
}
