use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use log::{debug, error};
use nu_ansi_term::{Color, Style};
use reedline::{
    ColumnarMenu, DefaultHinter, EditCommand, Emacs, FileBackedHistory, KeyCode, KeyModifiers,
    MenuBuilder, Reedline, ReedlineEvent, ReedlineMenu, Signal, default_emacs_keybindings,
};

use dyshell::{
    completions::ShellCompleter,
    config,
    prompt::ShellPrompt,
    shell::{Engine, Status},
    store::Store,
};

/// Home directory of the invoking user. Failing to identify the user is the
/// one condition that stops the shell from starting.
#[cfg(unix)]
fn current_user_home() -> Result<PathBuf> {
    use nix::unistd::{Uid, User};

    let user = User::from_uid(Uid::current())
        .context("looking up the current user")?
        .context("the current user has no passwd entry")?;
    Ok(user.dir)
}

#[cfg(not(unix))]
fn current_user_home() -> Result<PathBuf> {
    dirs::home_dir().context("cannot determine the current user's home directory")
}

fn submit(engine: &mut Engine, line: &str) -> Status {
    let mut stdout = io::stdout();
    let status = engine.submit(line, &mut stdout);
    let _ = stdout.flush();
    if status == Status::Exit {
        std::process::exit(0);
    }
    status
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("DYSHELL_LOG", "warn"))
        .init();

    // user, configuration and saved session
    let home = current_user_home()?;
    let cfg = config::init();
    let store = Arc::new(Store::new());
    let mut engine = Engine::new(store.clone())
        .with_cache_ttl(cfg.cache_ttl)
        .with_tokenizer(cfg.tokenizer)
        .with_persistence(Box::new(config::session_files(&home)));
    engine.load_session();

    for line in &cfg.startup {
        debug!("startup: {line}");
        submit(&mut engine, line);
    }

    let mut prompt = ShellPrompt::new(store, cfg.prompt.clone());

    let history_path = config::history_file_path();
    if let Some(parent) = history_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let history = Box::new(
        FileBackedHistory::with_file(6000, history_path)
            .unwrap_or_else(|_| FileBackedHistory::default()),
    );

    let menu = ReedlineMenu::EngineCompleter(Box::new(
        ColumnarMenu::default()
            .with_name("completion_menu")
            .with_column_width(Some(20)),
    ));

    // Tab cycles the completion menu, Ctrl-C clears the buffer
    let mut keybindings = default_emacs_keybindings();
    keybindings.add_binding(
        KeyModifiers::CONTROL,
        KeyCode::Char('c'),
        ReedlineEvent::Edit(vec![EditCommand::Clear]),
    );
    keybindings.add_binding(
        KeyModifiers::NONE,
        KeyCode::Tab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".into()),
            ReedlineEvent::MenuNext,
        ]),
    );
    keybindings.add_binding(
        KeyModifiers::SHIFT,
        KeyCode::BackTab,
        ReedlineEvent::UntilFound(vec![
            ReedlineEvent::Menu("completion_menu".into()),
            ReedlineEvent::MenuPrevious,
        ]),
    );

    let mut editor = Reedline::create()
        .with_history(history)
        .with_completer(Box::new(ShellCompleter::new()))
        .with_menu(menu)
        .with_hinter(Box::new(
            DefaultHinter::default()
                .with_style(Style::new().italic().fg(Color::Rgb(120, 120, 120)))
                .with_min_chars(1),
        ))
        .with_edit_mode(Box::new(Emacs::new(keybindings)));

    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
        libc::signal(libc::SIGQUIT, libc::SIG_IGN);
    }

    loop {
        match editor.read_line(&prompt) {
            Ok(Signal::Success(buf)) => {
                let status = submit(&mut engine, &buf);
                prompt.set_continuing(status == Status::Incomplete);
            }
            // end of input goes through `exit` so the session is saved
            Ok(Signal::CtrlD) => {
                submit(&mut engine, "exit");
            }
            Ok(_) => continue,
            Err(e) => {
                error!("line editor failed: {e}");
                return Err(e).context("reading input");
            }
        }
    }
}
