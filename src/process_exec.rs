//! Launchers for external programs: plain, piped, redirected and background.
//!
//! Anything a child writes to stdout or stderr that belongs to the session is
//! funnelled through one OS pipe and copied into the caller's sink, so the
//! front end decides where output ends up.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
};

use log::debug;

use crate::{
    error::{Result, ShellError},
    path::PathResolver,
};

/// Looks `name` up through the resolver, turning a miss into "command not found".
pub fn locate(resolver: &PathResolver, name: &str) -> Result<PathBuf> {
    resolver
        .resolve(name)
        .map(|r| r.into_path())
        .ok_or_else(|| ShellError::CommandNotFound(name.to_string()))
}

/// The shell ignores SIGINT/SIGQUIT for itself; children get the defaults back.
#[cfg(unix)]
fn restore_signals(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: only async-signal-safe calls between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_DFL);
            libc::signal(libc::SIGQUIT, libc::SIG_DFL);
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn restore_signals(_cmd: &mut Command) {}

fn command(program: &Path, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args);
    restore_signals(&mut cmd);
    cmd
}

fn check(name: &str, status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(ShellError::ExitStatus {
            program: name.to_string(),
            code,
        }),
        None => Err(ShellError::Killed {
            program: name.to_string(),
        }),
    }
}

/// Spawns `cmd` with stderr (and stdout when `stdout_to_sink`) attached to a
/// fresh pipe, copies the pipe into `out` until every writer is gone, then
/// waits for the child.
fn run_into_sink(
    mut cmd: Command,
    name: &str,
    stdout_to_sink: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let (mut reader, writer) = io::pipe()?;
    if stdout_to_sink {
        cmd.stdout(writer.try_clone()?);
    }
    cmd.stderr(writer);

    let spawned = cmd.spawn();
    // drops our copies of the write end (and any redirected file) so the
    // copy below sees EOF once the child is done
    drop(cmd);
    let mut child = spawned.map_err(|e| ShellError::spawn(name, e))?;
    debug!("spawned {name} as pid {}", child.id());

    let copied = io::copy(&mut reader, out);
    let status = child.wait()?;
    copied?;
    check(name, status)
}

/// Runs a program in the foreground with stdout and stderr on the sink.
pub fn run_plain(program: &Path, name: &str, args: &[String], out: &mut dyn Write) -> Result<()> {
    run_into_sink(command(program, args), name, true, out)
}

/// Splits a line on `|` into tokenized stages. Quotes are not special, so a
/// `|` can never be escaped.
pub fn split_stages(line: &str, split: impl Fn(&str) -> Vec<String>) -> Result<Vec<Vec<String>>> {
    line.split('|')
        .map(|stage| {
            let argv = split(stage.trim());
            if argv.is_empty() {
                Err(ShellError::EmptyStage)
            } else {
                Ok(argv)
            }
        })
        .collect()
}

fn abort(children: &mut Vec<(String, Child)>) {
    for (name, child) in children.iter_mut() {
        debug!("aborting pipeline stage {name} ({})", child.id());
        let _ = child.kill();
        let _ = child.wait();
    }
    children.clear();
}

/// Runs every stage concurrently, stage `i`'s stdin fed from stage `i-1`'s
/// stdout. The last stage's stdout and every stage's stderr go to the sink.
/// Blocks until all stages have exited; the pipeline's status is that of its
/// last stage.
pub fn run_pipeline(resolver: &PathResolver, stages: &[Vec<String>], out: &mut dyn Write) -> Result<()> {
    if stages.iter().any(Vec::is_empty) {
        return Err(ShellError::EmptyStage);
    }
    let programs = stages
        .iter()
        .map(|argv| locate(resolver, &argv[0]))
        .collect::<Result<Vec<_>>>()?;

    let (mut reader, writer) = io::pipe()?;
    let mut children: Vec<(String, Child)> = Vec::with_capacity(stages.len());
    let mut upstream: Option<Stdio> = None;
    let last = stages.len() - 1;

    for (i, (argv, program)) in stages.iter().zip(&programs).enumerate() {
        let spawned = (|| -> Result<Child> {
            let mut cmd = command(program, &argv[1..]);
            cmd.stderr(writer.try_clone()?);
            if let Some(stdin) = upstream.take() {
                cmd.stdin(stdin);
            }
            if i == last {
                cmd.stdout(writer.try_clone()?);
            } else {
                cmd.stdout(Stdio::piped());
            }
            cmd.spawn().map_err(|e| ShellError::spawn(&argv[0], e))
        })();

        match spawned {
            Ok(mut child) => {
                debug!("pipeline stage {i}: {} as pid {}", argv[0], child.id());
                upstream = child.stdout.take().map(Stdio::from);
                children.push((argv[0].clone(), child));
            }
            Err(e) => {
                drop(upstream.take());
                abort(&mut children);
                return Err(e);
            }
        }
    }
    drop(writer);

    let copied = io::copy(&mut reader, out);
    let mut last_status = None;
    for (name, mut child) in children {
        last_status = Some((name, child.wait()?));
    }
    copied?;
    match last_status {
        Some((name, status)) => check(&name, status),
        None => Ok(()),
    }
}

/// A single `>`, `>>` or `<` on a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    Output { path: PathBuf, append: bool },
    Input { path: PathBuf },
}

impl Redirect {
    /// Splits `line` into its command part and redirection.
    ///
    /// The first `>` wins even when a `<` appears earlier; only when there is
    /// no `>` at all is `<` considered. Returns `Ok(None)` when the line has
    /// neither.
    pub fn parse(line: &str) -> Result<Option<(&str, Redirect)>> {
        let (at, append, input) = if let Some(at) = line.find('>') {
            (at, line[at + 1..].starts_with('>'), false)
        } else if let Some(at) = line.find('<') {
            (at, false, true)
        } else {
            return Ok(None);
        };

        let width = if append { 2 } else { 1 };
        let command = line[..at].trim();
        let target = line[at + width..].trim();
        if target.is_empty() {
            return Err(ShellError::MissingTarget);
        }
        if command.is_empty() {
            return Err(ShellError::MissingCommand);
        }

        let path = PathBuf::from(target);
        let redirect = if input {
            Redirect::Input { path }
        } else {
            Redirect::Output { path, append }
        };
        Ok(Some((command, redirect)))
    }

    pub fn path(&self) -> &Path {
        match self {
            Redirect::Output { path, .. } | Redirect::Input { path } => path,
        }
    }

    /// Opens the target: created or truncated (or appended) for output,
    /// read-only for input.
    pub fn open(&self) -> Result<File> {
        let opened = match self {
            Redirect::Output { path, append: true } => {
                OpenOptions::new().create(true).append(true).open(path)
            }
            Redirect::Output { path, append: false } => File::create(path),
            Redirect::Input { path } => File::open(path),
        };
        opened.map_err(|e| ShellError::path(self.path(), e))
    }
}

/// Runs one program with its stdin or stdout bound to a file. The file is
/// owned by the command for this invocation only and is closed on every
/// return path.
pub fn run_redirected(
    resolver: &PathResolver,
    argv: &[String],
    redirect: &Redirect,
    out: &mut dyn Write,
) -> Result<()> {
    let name = argv.first().ok_or(ShellError::MissingCommand)?;
    let program = locate(resolver, name)?;
    let file = redirect.open()?;
    let mut cmd = command(&program, &argv[1..]);
    match redirect {
        Redirect::Output { .. } => {
            cmd.stdout(file);
            run_into_sink(cmd, name, false, out)
        }
        Redirect::Input { .. } => {
            cmd.stdin(file);
            run_into_sink(cmd, name, true, out)
        }
    }
}

/// Starts a detached program. Its standard streams go nowhere and, on Unix,
/// it gets its own process group so terminal signals aimed at the shell
/// leave it alone.
pub fn spawn_background(program: &Path, argv: &[String]) -> Result<Child> {
    let name = argv.first().ok_or(ShellError::MissingCommand)?;
    let mut cmd = command(program, &argv[1..]);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.spawn().map_err(|e| ShellError::spawn(name, e))
}
