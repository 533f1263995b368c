//! Commands the interpreter runs itself instead of spawning a program.

use std::{
    collections::HashSet,
    env,
    fmt::Display,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    time::SystemTime,
};

use chrono::{DateTime, Local};
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use crate::{
    error::{Result, ShellError},
    persist::unquote,
    shell::{Engine, Status},
};

lazy_static! {
    static ref BUILTINS: HashSet<&'static str> = [
        "alias", "bg", "cat", "cd", "clear", "echo", "exit", "export", "fg", "help", "history",
        "jobs", "kill", "ls", "mkdir", "pwd", "rm", "rmdir", "shell", "touch", "type", "unalias",
        "unset", "whoami",
    ]
    .into_iter()
    .collect();
    static ref VAR_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(name)
}

/// Builtin names in alphabetical order.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = BUILTINS.iter().copied().collect();
    names.sort_unstable();
    names
}

/// Whether `<`/`>` in a builtin line are redirections. Words given to the
/// assignment-style builtins are taken literally, so `alias x='a > b'` keeps
/// its value; those builtins only redirect when they are listing.
pub fn honours_redirection(argv: &[String]) -> bool {
    let Some((name, args)) = argv.split_first() else {
        return true;
    };
    match name.as_str() {
        "alias" | "export" | "shell" => args
            .first()
            .is_none_or(|arg| arg.starts_with(['<', '>'])),
        "unalias" | "unset" => false,
        _ => true,
    }
}

/// Where a builtin writes, plus an optional redirected input.
pub struct Context<'a> {
    engine: &'a Engine,
    out: &'a mut dyn Write,
    err: Option<&'a mut dyn Write>,
    input: Option<File>,
}

impl<'a> Context<'a> {
    pub fn new(engine: &'a Engine, out: &'a mut dyn Write) -> Self {
        Self {
            engine,
            out,
            err: None,
            input: None,
        }
    }

    /// Sends diagnostics somewhere other than `out` (used when `out` is a file).
    pub fn with_errors(mut self, err: &'a mut dyn Write) -> Self {
        self.err = Some(err);
        self
    }

    pub fn with_input(mut self, input: File) -> Self {
        self.input = Some(input);
        self
    }

    fn complain(&mut self, msg: impl Display) -> Result<()> {
        let sink: &mut dyn Write = match self.err.as_mut() {
            Some(err) => &mut **err,
            None => &mut *self.out,
        };
        writeln!(sink, "{msg}")?;
        Ok(())
    }
}

/// Runs `argv[0]` as a builtin. Problems with individual operands are written
/// as they happen; anything returned as `Err` is for the caller to print.
pub fn run(argv: &[String], ctx: &mut Context<'_>) -> Result<Status> {
    let Some((name, args)) = argv.split_first() else {
        return Ok(Status::Continue);
    };
    match name.as_str() {
        "echo" => writeln!(ctx.out, "{}", args.join(" "))?,
        "exit" => return Ok(exit(ctx)),
        "type" => type_of(ctx, args)?,
        "pwd" => writeln!(ctx.out, "{}", env::current_dir()?.display())?,
        "cd" => cd(args)?,
        "whoami" => writeln!(ctx.out, "{}", whoami()?)?,
        "ls" => ls(ctx, args)?,
        "cat" => cat(ctx, args)?,
        "touch" => each_operand(ctx, "touch", args, "missing file operand", |f| {
            touch(f).map_err(|e| format!("cannot create '{f}': {e}"))
        })?,
        "rm" => each_operand(ctx, "rm", args, "missing file operand", |f| {
            fs::remove_file(f).map_err(|e| format!("cannot remove '{f}': {e}"))
        })?,
        "mkdir" => each_operand(ctx, "mkdir", args, "missing directory operand", |d| {
            fs::create_dir(d).map_err(|e| format!("cannot create directory '{d}': {e}"))
        })?,
        "rmdir" => each_operand(ctx, "rmdir", args, "missing directory operand", |d| {
            fs::remove_dir(d).map_err(|e| format!("cannot remove directory '{d}': {e}"))
        })?,
        "history" => {
            for (i, line) in ctx.engine.store.history().iter().enumerate() {
                writeln!(ctx.out, "{} {line}", i + 1)?;
            }
        }
        "clear" => {
            write!(ctx.out, "\x1b[2J\x1b[H")?;
            ctx.out.flush()?;
        }
        "alias" => alias(ctx, args)?,
        "unalias" => {
            for name in args {
                ctx.engine.store.remove_alias(name);
            }
        }
        "export" => export(ctx, args)?,
        "unset" => {
            for name in args.iter().filter(|n| VAR_NAME.is_match(n)) {
                ctx.engine.store.unset_var(name);
            }
        }
        "jobs" => jobs(ctx)?,
        "fg" => fg(ctx, args)?,
        "bg" => bg(ctx, args)?,
        "kill" => kill(ctx, args)?,
        "shell" => shell(ctx, args)?,
        "help" => help(ctx)?,
        other => return Err(ShellError::CommandNotFound(other.to_string())),
    }
    Ok(Status::Continue)
}

fn exit(ctx: &mut Context<'_>) -> Status {
    if let Err(e) = ctx.engine.persistence.save(&ctx.engine.store) {
        warn!("saving session failed: {e}");
        let _ = ctx.complain(format_args!("Error saving session: {e}"));
    }
    Status::Exit
}

fn type_of(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    for arg in args {
        if is_builtin(arg) {
            writeln!(ctx.out, "{arg} is a shell builtin")?;
        } else if let Some(found) = ctx.engine.resolver.resolve(arg) {
            writeln!(ctx.out, "{arg} is {}", found.path().display())?;
        } else {
            writeln!(ctx.out, "{arg} not found")?;
        }
    }
    Ok(())
}

fn cd(args: &[String]) -> Result<()> {
    let target = match args.first().map(String::as_str) {
        None | Some("~") => dirs::home_dir().ok_or_else(|| {
            ShellError::Io(io::Error::new(io::ErrorKind::NotFound, "cd: HOME not set"))
        })?,
        Some(dir) => shellexpand::tilde(dir).into_owned().into(),
    };
    env::set_current_dir(&target).map_err(|e| {
        let reason = match e.kind() {
            io::ErrorKind::NotFound => "No such file or directory".to_string(),
            _ => e.to_string(),
        };
        ShellError::Io(io::Error::new(
            e.kind(),
            format!("cd: {}: {reason}", target.display()),
        ))
    })
}

fn whoami() -> Result<String> {
    #[cfg(unix)]
    {
        use nix::unistd::{Uid, User};
        if let Ok(Some(user)) = User::from_uid(Uid::current()) {
            return Ok(user.name);
        }
    }
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .map_err(|_| ShellError::Io(io::Error::other("cannot determine current user")))
}

fn modified(time: SystemTime) -> String {
    DateTime::<Local>::from(time).format("%b %d %H:%M").to_string()
}

fn ls_row(out: &mut dyn Write, name: &str, meta: &fs::Metadata) -> io::Result<()> {
    let when = meta.modified().map(modified).unwrap_or_default();
    writeln!(out, "{name:<20} {:>10} {when}", meta.len())
}

fn ls(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    let dot = [".".to_string()];
    let targets = if args.is_empty() { &dot[..] } else { args };
    let headers = targets.len() > 1;

    for target in targets {
        let meta = match fs::metadata(target) {
            Ok(meta) => meta,
            Err(e) => {
                ctx.complain(format_args!("ls: cannot access '{target}': {e}"))?;
                continue;
            }
        };
        if !meta.is_dir() {
            ls_row(ctx.out, target, &meta)?;
            continue;
        }
        let entries = match fs::read_dir(target) {
            Ok(entries) => entries,
            Err(e) => {
                ctx.complain(format_args!("ls: cannot access '{target}': {e}"))?;
                continue;
            }
        };
        if headers {
            writeln!(ctx.out, "{target}:")?;
        }
        let mut rows: Vec<_> = entries
            .flatten()
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                Some((entry.file_name().to_string_lossy().into_owned(), meta))
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, meta) in rows {
            ls_row(ctx.out, &name, &meta)?;
        }
    }
    Ok(())
}

fn cat(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if args.is_empty() {
        match ctx.input.take() {
            Some(mut input) => {
                io::copy(&mut input, &mut *ctx.out)?;
            }
            None => ctx.complain("cat: missing file operand")?,
        }
        return Ok(());
    }
    for file in args {
        match fs::read(file) {
            Ok(data) => ctx.out.write_all(&data)?,
            Err(e) => ctx.complain(format_args!("cat: cannot read '{file}': {e}"))?,
        }
    }
    Ok(())
}

fn touch(path: &str) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.set_modified(SystemTime::now())
}

/// Applies `op` to every operand, reporting each failure and moving on.
fn each_operand(
    ctx: &mut Context<'_>,
    verb: &str,
    args: &[String],
    missing: &str,
    op: impl Fn(&str) -> std::result::Result<(), String>,
) -> Result<()> {
    if args.is_empty() {
        return ctx.complain(format_args!("{verb}: {missing}"));
    }
    for arg in args {
        if let Err(msg) = op(arg) {
            ctx.complain(format_args!("{verb}: {msg}"))?;
        }
    }
    Ok(())
}

/// Groups `name=value` words, letting a quoted value run across the
/// whitespace that tokenizing split it on. Words without `=` or with an
/// empty name are dropped.
pub fn assignments(args: &[String]) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut words = args.iter();
    while let Some(word) = words.next() {
        let Some((name, value)) = word.split_once('=') else {
            continue;
        };
        let mut value = value.to_string();
        if let Some(quote) = value.chars().next().filter(|c| *c == '\'' || *c == '"') {
            while value.len() < 2 || !value.ends_with(quote) {
                match words.next() {
                    Some(more) => {
                        value.push(' ');
                        value.push_str(more);
                    }
                    None => break,
                }
            }
        }
        if !name.is_empty() {
            found.push((name.to_string(), unquote(&value).to_string()));
        }
    }
    found
}

fn alias(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if args.is_empty() {
        for (name, value) in ctx.engine.store.aliases() {
            writeln!(ctx.out, "alias {name}='{value}'")?;
        }
        return Ok(());
    }
    for (name, value) in assignments(args) {
        ctx.engine.store.set_alias(&name, &value);
    }
    Ok(())
}

fn export(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    if args.is_empty() {
        for (name, value) in ctx.engine.store.vars() {
            writeln!(ctx.out, "{name}={value}")?;
        }
        return Ok(());
    }
    for (name, value) in assignments(args) {
        if VAR_NAME.is_match(&name) && !value.contains('\0') {
            ctx.engine.store.set_var(&name, &value);
        }
    }
    Ok(())
}

fn jobs(ctx: &mut Context<'_>) -> Result<()> {
    for job in ctx.engine.store.jobs() {
        let state = if job.is_running() { "Running" } else { "Done" };
        writeln!(
            ctx.out,
            "[{}]+  {} {state:<10} {}",
            job.index,
            job.pid,
            job.argv.join(" ")
        )?;
    }
    Ok(())
}

fn job_arg(ctx: &Context<'_>, verb: &'static str, args: &[String]) -> Result<crate::store::Job> {
    let arg = args.first().map(String::as_str).unwrap_or("");
    arg.trim_start_matches('%')
        .parse::<usize>()
        .ok()
        .and_then(|n| ctx.engine.store.job(n))
        .ok_or_else(|| ShellError::NoSuchJob {
            verb,
            job: arg.to_string(),
        })
}

fn fg(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    let job = job_arg(ctx, "fg", args)?;
    let mut child = job
        .child
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    child.wait()?;
    Ok(())
}

fn bg(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    let job = job_arg(ctx, "bg", args)?;
    if let Err(e) = ctx.engine.controller.resume(&job) {
        ctx.complain(format_args!("Failed to send continue signal: {e}"))?;
    }
    Ok(())
}

fn kill(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    let Some(arg) = args.first() else {
        return ctx.complain("kill: missing PID operand");
    };
    let pid: i32 = arg
        .parse()
        .map_err(|_| ShellError::InvalidPid(arg.to_string()))?;
    match ctx.engine.controller.kill(pid) {
        Ok(()) => writeln!(ctx.out, "Process {pid} killed")?,
        Err(e) => ctx.complain(format_args!("Failed to kill process {pid}: {e}"))?,
    }
    Ok(())
}

fn shell(ctx: &mut Context<'_>, args: &[String]) -> Result<()> {
    match args {
        [] => {
            let settings = ctx.engine.store.settings();
            write!(ctx.out, "{}", settings.describe())?;
        }
        [_] => ctx.complain("Usage: shell [option] [value]")?,
        [option, value @ ..] => {
            let value = value.join(" ");
            match ctx.engine.store.with_settings(|s| s.apply(option, &value)) {
                Ok(msg) => writeln!(ctx.out, "{msg}")?,
                Err(msg) => ctx.complain(msg)?,
            }
        }
    }
    Ok(())
}

fn help(ctx: &mut Context<'_>) -> Result<()> {
    writeln!(ctx.out, "Available commands:")?;
    for name in names() {
        writeln!(ctx.out, "  {name}")?;
    }
    writeln!(ctx.out, "Use `man <command>` for more information on a command.")?;
    Ok(())
}
