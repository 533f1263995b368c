use std::{fs, sync::Arc};

use dyshell::{
    Engine, Status, Store,
    persist::{FileStore, Persistence},
};

fn engine() -> Engine {
    Engine::new(Arc::new(Store::new()))
}

fn run(engine: &mut Engine, line: &str) -> String {
    let mut out = Vec::new();
    engine.submit(line, &mut out);
    String::from_utf8(out).unwrap()
}

#[test]
fn echo_joins_arguments() {
    let mut sh = engine();
    assert_eq!(run(&mut sh, "echo   hello   world"), "hello world\n");
}

#[test]
fn alias_rewrites_leading_word_once() {
    let mut sh = engine();
    run(&mut sh, "alias zz_say=echo");
    run(&mut sh, "alias zz_shout=zz_say");
    assert_eq!(run(&mut sh, "zz_say x y"), "x y\n");
    // `zz_shout` becomes `zz_say`, which is not expanded again
    assert!(run(&mut sh, "zz_shout x").contains("zz_say: command not found"));
}

#[test]
fn alias_listing_and_removal() {
    let mut sh = engine();
    run(&mut sh, "alias ll='ls -l' g=grep");
    assert_eq!(
        run(&mut sh, "alias"),
        "alias g='grep'\nalias ll='ls -l'\n"
    );
    run(&mut sh, "unalias g");
    assert_eq!(run(&mut sh, "alias"), "alias ll='ls -l'\n");
}

#[test]
fn assignment_values_keep_redirection_characters() {
    let dir = tempfile::tempdir().unwrap();
    let mut sh = engine();

    assert_eq!(run(&mut sh, "alias srt='sort < in.txt'"), "");
    assert_eq!(sh.store().alias("srt").as_deref(), Some("sort < in.txt"));

    let listing = dir.path().join("listing");
    let line = format!("alias gt='ls > {}'", listing.display());
    assert_eq!(run(&mut sh, &line), "");
    assert_eq!(
        sh.store().alias("gt"),
        Some(format!("ls > {}", listing.display()))
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    run(&mut sh, "export DYSHELL_IT_CMP='a>b'");
    assert_eq!(
        sh.store().vars(),
        vec![("DYSHELL_IT_CMP".to_string(), "a>b".to_string())]
    );
    run(&mut sh, "unset DYSHELL_IT_CMP");
}

#[test]
fn alias_listing_can_be_redirected() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("aliases.txt");
    let mut sh = engine();
    run(&mut sh, "alias g=grep");
    assert_eq!(run(&mut sh, &format!("alias > {}", file.display())), "");
    assert_eq!(fs::read_to_string(&file).unwrap(), "alias g='grep'\n");
}

#[test]
fn history_is_one_indexed_in_order() {
    let mut sh = engine();
    run(&mut sh, "echo a");
    run(&mut sh, "doesnotexist123");
    run(&mut sh, "echo a");
    assert_eq!(
        run(&mut sh, "history"),
        "1 echo a\n2 doesnotexist123\n3 echo a\n4 history\n"
    );
}

#[test]
fn blank_lines_are_not_recorded() {
    let mut sh = engine();
    assert_eq!(run(&mut sh, "   "), "");
    assert!(sh.store().history().is_empty());
}

#[test]
fn unknown_command_is_reported_and_recorded() {
    let mut sh = engine();
    let out = run(&mut sh, "doesnotexist123 --flag");
    assert!(out.contains("command not found"), "{out}");
    assert_eq!(sh.store().history(), vec!["doesnotexist123 --flag"]);
}

#[test]
fn export_and_unset_reach_expansion() {
    let mut sh = engine();
    run(&mut sh, "export DYSHELL_IT_GREETING=hello");
    assert_eq!(run(&mut sh, "echo $DYSHELL_IT_GREETING"), "hello\n");
    run(&mut sh, "unset DYSHELL_IT_GREETING");
    assert_eq!(run(&mut sh, "echo [$DYSHELL_IT_GREETING]"), "[]\n");
}

#[test]
fn malformed_export_is_ignored() {
    let mut sh = engine();
    assert_eq!(run(&mut sh, "export 1BAD=x novalue"), "");
    assert!(sh.store().vars().is_empty());
}

#[test]
fn cd_to_missing_directory() {
    let mut sh = engine();
    let out = run(&mut sh, "cd /definitely/not/a/dir");
    assert!(out.contains("No such file or directory"), "{out}");
}

#[test]
fn file_builtins_keep_going_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    let missing = dir.path().join("missing");
    let mut sh = engine();

    assert_eq!(run(&mut sh, &format!("touch {} {}", a.display(), b.display())), "");
    assert!(a.exists() && b.exists());

    let out = run(
        &mut sh,
        &format!("rm {} {} {}", a.display(), missing.display(), b.display()),
    );
    assert_eq!(out.lines().count(), 1);
    assert!(out.starts_with("rm: cannot remove"), "{out}");
    assert!(!a.exists() && !b.exists());

    let sub = dir.path().join("sub");
    run(&mut sh, &format!("mkdir {}", sub.display()));
    assert!(sub.is_dir());
    run(&mut sh, &format!("rmdir {}", sub.display()));
    assert!(!sub.exists());

    assert_eq!(run(&mut sh, "touch"), "touch: missing file operand\n");
    assert_eq!(run(&mut sh, "mkdir"), "mkdir: missing directory operand\n");
}

#[test]
fn ls_lists_entries_by_name() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.txt"), "12345").unwrap();
    fs::write(dir.path().join("a.txt"), "").unwrap();
    let mut sh = engine();
    let out = run(&mut sh, &format!("ls {}", dir.path().display()));
    let names: Vec<_> = out
        .lines()
        .map(|l| l.split_whitespace().next().unwrap())
        .collect();
    assert_eq!(names, vec!["a.txt", "b.txt"]);
    assert!(out.lines().nth(1).unwrap().contains(" 5 "));
}

#[test]
fn builtin_output_redirection_then_cat() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f.txt");
    let mut sh = engine();

    assert_eq!(run(&mut sh, &format!("echo hi > {}", file.display())), "");
    assert_eq!(fs::read_to_string(&file).unwrap(), "hi\n");
    assert_eq!(run(&mut sh, &format!("cat {}", file.display())), "hi\n");

    run(&mut sh, &format!("echo again >> {}", file.display()));
    assert_eq!(fs::read_to_string(&file).unwrap(), "hi\nagain\n");
    assert_eq!(run(&mut sh, &format!("cat < {}", file.display())), "hi\nagain\n");
}

#[test]
fn redirect_without_target() {
    let mut sh = engine();
    assert_eq!(
        run(&mut sh, "echo hi >"),
        "syntax error: missing redirection target\n"
    );
}

#[test]
fn shell_settings_validate() {
    let mut sh = engine();
    assert_eq!(
        run(&mut sh, "shell bg-opacity 150"),
        "Invalid opacity value. Please enter a value between 0 and 100.\n"
    );
    assert_eq!(sh.store().settings().bg_opacity, 100);
    assert_eq!(run(&mut sh, "shell text-color light blue"), "Text color set to light blue\n");
    assert_eq!(sh.store().settings().text_color, "light blue");
    assert_eq!(run(&mut sh, "shell text-size"), "Usage: shell [option] [value]\n");
    assert!(run(&mut sh, "shell").starts_with("Shell Customization Options:\n"));
}

#[test]
fn job_errors() {
    let mut sh = engine();
    assert_eq!(run(&mut sh, "fg 3"), "fg: 3: no such job\n");
    assert_eq!(run(&mut sh, "bg x"), "bg: x: no such job\n");
    assert_eq!(run(&mut sh, "kill abc"), "Invalid PID: abc\n");
    assert_eq!(run(&mut sh, "kill"), "kill: missing PID operand\n");
}

#[test]
fn type_reports_builtins() {
    let mut sh = engine();
    assert_eq!(run(&mut sh, "type cd"), "cd is a shell builtin\n");
    assert_eq!(run(&mut sh, "type doesnotexist123"), "doesnotexist123 not found\n");
}

#[test]
fn exit_saves_session() {
    let dir = tempfile::tempdir().unwrap();
    let files = FileStore::new(
        dir.path().join("aliases"),
        dir.path().join("env"),
        dir.path().join("settings.json"),
    );
    let mut sh = engine().with_persistence(Box::new(files.clone()));
    run(&mut sh, "alias ll='ls -l'");
    run(&mut sh, "shell prompt-style minimal");

    let mut out = Vec::new();
    assert_eq!(sh.submit("exit", &mut out), Status::Exit);
    assert_eq!(
        fs::read_to_string(&files.aliases).unwrap(),
        "alias ll='ls -l'\n"
    );

    let restored = Store::new();
    files.load(&restored);
    assert_eq!(restored.alias("ll").as_deref(), Some("ls -l"));
    assert_eq!(restored.settings().prompt_style, "minimal");
}

#[cfg(unix)]
mod unix {
    use std::time::Duration;

    use super::*;

    #[test]
    fn command_substitution() {
        let mut sh = engine();
        assert_eq!(run(&mut sh, "echo $(echo hi)"), "hi\n");
    }

    #[test]
    fn nested_substitution_is_not_supported() {
        let mut sh = engine();
        assert_ne!(run(&mut sh, "echo $(echo $(echo hi))"), "hi\n");
    }

    #[test]
    fn pipeline_output_reaches_sink() {
        let mut sh = engine();
        assert_eq!(run(&mut sh, "echo hello | cat"), "hello\n");
    }

    #[test]
    fn pipeline_ignores_redirection_operators() {
        let mut sh = engine();
        assert_eq!(run(&mut sh, "echo a > b | cat"), "a > b\n");
    }

    #[test]
    fn three_stage_pipeline() {
        let mut sh = engine();
        assert_eq!(run(&mut sh, "printf b\\na\\nb\\n | sort | uniq"), "a\nb\n");
    }

    #[test]
    fn empty_stage_is_a_syntax_error() {
        let mut sh = engine();
        assert_eq!(
            run(&mut sh, "echo a | | cat"),
            "syntax error: empty pipeline stage\n"
        );
    }

    #[test]
    fn external_redirection_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "b\na\n").unwrap();
        let mut sh = engine();

        assert_eq!(run(&mut sh, &format!("sort < {}", input.display())), "a\nb\n");
        assert_eq!(
            run(&mut sh, &format!("sort {} > {}", input.display(), output.display())),
            ""
        );
        assert_eq!(fs::read_to_string(&output).unwrap(), "a\nb\n");
    }

    #[test]
    fn plain_external_command_output() {
        let mut sh = engine();
        assert_eq!(run(&mut sh, "printf ok"), "ok");
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let mut sh = engine();
        let out = run(&mut sh, "false");
        assert!(out.contains("exited with status 1"), "{out}");
    }

    #[test]
    fn type_resolves_and_caches() {
        let mut sh = engine();
        let out = run(&mut sh, "type sh");
        assert!(out.starts_with("sh is /"), "{out}");
        assert!(
            sh.store()
                .cached_path("sh", Duration::from_secs(60))
                .is_some()
        );
    }

    #[test]
    fn background_job_is_tracked() {
        let mut sh = engine();
        let out = run(&mut sh, "sleep 1 &");
        assert!(out.starts_with("[1] "), "{out}");

        let jobs = sh.store().jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].index, 1);
        assert_eq!(jobs[0].argv, vec!["sleep", "1"]);
        assert_eq!(out, format!("[1] {}\n", jobs[0].pid));

        let listing = run(&mut sh, "jobs");
        assert_eq!(listing.lines().count(), 1);
        assert!(listing.starts_with("[1]+  "), "{listing}");
        assert!(listing.trim_end().ends_with("sleep 1"), "{listing}");

        assert_eq!(run(&mut sh, "fg 1"), "");
        assert!(run(&mut sh, "jobs").contains("Done"));
        // finished jobs keep their slot
        assert_eq!(sh.store().jobs().len(), 1);
    }

    #[test]
    fn bg_and_kill_reach_a_job() {
        let mut sh = engine();
        run(&mut sh, "sleep 5 &");
        let pid = sh.store().jobs()[0].pid;

        assert_eq!(run(&mut sh, "bg 1"), "");
        assert_eq!(run(&mut sh, &format!("kill {pid}")), format!("Process {pid} killed\n"));
        assert_eq!(run(&mut sh, "fg 1"), "");
    }

    #[test]
    fn missing_background_program() {
        let mut sh = engine();
        assert_eq!(
            run(&mut sh, "doesnotexist123 &"),
            "doesnotexist123: command not found\n"
        );
        assert!(sh.store().jobs().is_empty());
    }
}
