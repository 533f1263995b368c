//! Line preprocessing: command substitution, then variable expansion.

use std::{borrow::Cow, env, process::Command};

use log::warn;

const MARKER: &str = "$(";

/// Runs `$(...)` spans through `/bin/sh -c` and splices their output back in.
///
/// A span runs from a `$(` to the first `)` after it; parentheses are not
/// balanced, so `$(a $(b))` ends at the inner `)`. A span whose command
/// fails to start or exits non-zero is left as written and scanning resumes
/// after it. Substituted output is not rescanned.
pub fn substitute_commands(line: &str) -> String {
    let mut out = line.to_string();
    let mut cursor = 0;

    while let Some(offset) = out[cursor..].find(MARKER) {
        let start = cursor + offset;
        let Some(close) = out[start..].find(')') else {
            break;
        };
        let end = start + close;
        let command = &out[start + MARKER.len()..end];

        match capture(command) {
            Some(output) => {
                out.replace_range(start..=end, &output);
                cursor = start + output.len();
            }
            None => cursor = end + 1,
        }
    }
    out
}

fn capture(command: &str) -> Option<String> {
    match Command::new("/bin/sh").arg("-c").arg(command).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        }
        Ok(output) => {
            warn!("substitution `{command}` exited with {}", output.status);
            None
        }
        Err(e) => {
            warn!("substitution `{command}` failed to start: {e}");
            None
        }
    }
}

/// Expands `$NAME` and `${NAME}` from the process environment. Unset
/// variables expand to nothing.
pub fn expand_vars(line: &str) -> Cow<'_, str> {
    shellexpand::env_with_context_no_errors(line, |name| {
        Some(env::var(name).unwrap_or_default())
    })
}

/// Full preprocessing pass applied to every complete line.
pub fn preprocess(line: &str) -> String {
    let substituted = substitute_commands(line);
    expand_vars(&substituted).into_owned()
}

/// A line ending in `\` continues on the next submission. Returns the text
/// before the marker when that is the case.
pub fn continuation(line: &str) -> Option<&str> {
    line.trim_end().strip_suffix('\\')
}
