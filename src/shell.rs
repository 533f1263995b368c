//! The interpreter: takes submitted lines, preprocesses them and routes each
//! to exactly one execution mode.

use std::{io::Write, mem, sync::Arc, time::Duration};

use log::debug;

use crate::{
    builtins::{self, Context},
    error::{Result, ShellError},
    expand,
    path::{DEFAULT_CACHE_TTL, PathResolver},
    persist::{NullPersistence, Persistence},
    process_exec::{self, Redirect},
    signals::{self, ProcessController},
    store::Store,
    tokens::Tokenizer,
};

/// What the front end should do after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Line handled; show a fresh prompt.
    Continue,
    /// Line ended in `\`; show a continuation prompt and submit the rest.
    Incomplete,
    /// `exit` ran; state has been saved and the process should end with 0.
    Exit,
}

/// How a preprocessed line will be executed. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Empty,
    /// Any `|` makes the line a pipeline; `<`/`>` inside it are plain words.
    Piped,
    Builtin,
    /// Trailing `&`.
    Background,
    Redirected,
    Plain,
}

pub fn classify(line: &str, tokenizer: Tokenizer) -> Mode {
    let line = line.trim();
    if line.is_empty() {
        return Mode::Empty;
    }
    if line.contains('|') {
        return Mode::Piped;
    }
    let head = tokenizer.split(line).into_iter().next().unwrap_or_default();
    if builtins::is_builtin(&head) {
        Mode::Builtin
    } else if line.ends_with('&') {
        Mode::Background
    } else if line.contains('>') || line.contains('<') {
        Mode::Redirected
    } else {
        Mode::Plain
    }
}

pub struct Engine {
    pub(crate) store: Arc<Store>,
    pub(crate) resolver: PathResolver,
    pub(crate) controller: Box<dyn ProcessController>,
    pub(crate) persistence: Box<dyn Persistence>,
    pub(crate) tokenizer: Tokenizer,
    pending: String,
}

impl Engine {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            resolver: PathResolver::new(store.clone(), DEFAULT_CACHE_TTL),
            store,
            controller: signals::platform(),
            persistence: Box::new(NullPersistence),
            tokenizer: Tokenizer::default(),
            pending: String::new(),
        }
    }

    pub fn with_persistence(mut self, persistence: Box<dyn Persistence>) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn with_controller(mut self, controller: Box<dyn ProcessController>) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.resolver = PathResolver::new(self.store.clone(), ttl);
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Pulls saved aliases, variables and settings into the store.
    pub fn load_session(&self) {
        self.persistence.load(&self.store);
    }

    /// Whether a previous submission is waiting for its continuation.
    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Entry point for the front end: one submitted line at a time.
    ///
    /// A line ending in `\` is buffered and nothing runs until a later
    /// submission completes it.
    pub fn submit(&mut self, line: &str, out: &mut dyn Write) -> Status {
        if let Some(head) = expand::continuation(line) {
            self.pending.push_str(head);
            self.pending.push('\n');
            return Status::Incomplete;
        }
        let line = if self.pending.is_empty() {
            line.to_string()
        } else {
            mem::take(&mut self.pending) + line
        };
        self.dispatch(&line, out)
    }

    /// Runs one complete line. The raw line goes into history whatever the
    /// outcome; errors are printed to `out` and never end the session.
    pub fn dispatch(&self, line: &str, out: &mut dyn Write) -> Status {
        let raw = line.trim();
        if raw.is_empty() {
            return Status::Continue;
        }
        self.store.record(raw);
        self.resolver.sweep();

        let expanded = expand::preprocess(raw);
        let line = self.substitute_alias(expanded.trim());
        let mode = classify(&line, self.tokenizer);
        debug!("dispatch {mode:?}: {line}");

        let result = match mode {
            Mode::Empty => Ok(Status::Continue),
            Mode::Piped => self.run_piped(&line, out).map(|_| Status::Continue),
            Mode::Builtin => self.run_builtin(&line, out),
            Mode::Background => self.run_background(&line, out).map(|_| Status::Continue),
            Mode::Redirected => self.run_redirected(&line, out).map(|_| Status::Continue),
            Mode::Plain => self.run_plain(&line, out).map(|_| Status::Continue),
        };
        result.unwrap_or_else(|e| {
            let _ = writeln!(out, "{e}");
            Status::Continue
        })
    }

    /// Replaces the first word with its alias, once. The replacement is not
    /// looked up again, so aliases never chain.
    pub fn substitute_alias(&self, line: &str) -> String {
        let (head, rest) = match line.find(char::is_whitespace) {
            Some(at) => line.split_at(at),
            None => (line, ""),
        };
        match self.store.alias(head) {
            Some(value) => format!("{value}{rest}"),
            None => line.to_string(),
        }
    }

    pub(crate) fn split(&self, line: &str) -> Vec<String> {
        self.tokenizer.split(line)
    }

    fn run_piped(&self, line: &str, out: &mut dyn Write) -> Result<()> {
        let stages = process_exec::split_stages(line, |stage| self.split(stage))?;
        process_exec::run_pipeline(&self.resolver, &stages, out)
    }

    fn run_builtin(&self, line: &str, out: &mut dyn Write) -> Result<Status> {
        let argv = self.split(line);
        let parsed = if builtins::honours_redirection(&argv) {
            Redirect::parse(line)?
        } else {
            None
        };
        let Some((command, redirect)) = parsed else {
            let mut ctx = Context::new(self, out);
            return builtins::run(&argv, &mut ctx);
        };

        let argv = self.split(command);
        let file = redirect.open()?;
        match redirect {
            Redirect::Output { .. } => {
                let mut file = file;
                let mut ctx = Context::new(self, &mut file).with_errors(out);
                builtins::run(&argv, &mut ctx)
            }
            Redirect::Input { .. } => {
                let mut ctx = Context::new(self, out).with_input(file);
                builtins::run(&argv, &mut ctx)
            }
        }
    }

    fn run_background(&self, line: &str, out: &mut dyn Write) -> Result<()> {
        let command = line.strip_suffix('&').unwrap_or(line);
        let argv = self.split(command);
        let name = argv.first().ok_or(ShellError::MissingBackgroundCommand)?;
        let program = process_exec::locate(&self.resolver, name)?;
        let child = process_exec::spawn_background(&program, &argv)?;
        let job = self.store.add_job(child, argv);
        debug!("job {} started as pid {}", job.index, job.pid);
        writeln!(out, "[{}] {}", job.index, job.pid)?;
        Ok(())
    }

    fn run_redirected(&self, line: &str, out: &mut dyn Write) -> Result<()> {
        let (command, redirect) = Redirect::parse(line)?.ok_or(ShellError::MissingTarget)?;
        process_exec::run_redirected(&self.resolver, &self.split(command), &redirect, out)
    }

    fn run_plain(&self, line: &str, out: &mut dyn Write) -> Result<()> {
        let argv = self.split(line);
        let Some((name, args)) = argv.split_first() else {
            return Ok(());
        };
        let program = process_exec::locate(&self.resolver, name)?;
        process_exec::run_plain(&program, name, args, out)
    }
}
