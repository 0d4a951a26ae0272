//! External tool execution.
//!
//! Two shapes of delegation:
//! - [`exec`] runs a tool to completion and fails with its filtered stderr.
//! - [`spawn_with_stdin`] starts a long-lived tool whose lifetime is tied to
//!   its stdin; closing stdin asks it to exit.

use crate::log;
use anyhow::{Context, Result, bail};
use regex::Regex;
use std::{
    borrow::Cow,
    ffi::{OsStr, OsString},
    path::Path,
    process::{Child, ChildStdin, Command, ExitStatus, Output, Stdio},
    sync::LazyLock,
};

// ============================================================================
// Macros
// ============================================================================

/// Run an external command with arguments. Empty arguments are dropped,
/// so `if flag { "--minify" } else { "" }` works inline.
///
/// ```ignore
/// exec!(root; ["sh"]; "-c", script)?;
/// exec!(filter=&UTILITY_FILTER; root; utility; "-i", input, "-o", output)?;
/// ```
#[macro_export]
macro_rules! exec {
    (filter=$filter:expr; $root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::utils::exec::exec(
            Some($root.as_ref()),
            &$crate::utils::exec::internal::to_cmd_vec($cmd),
            &$crate::utils::exec::internal::non_empty([$($crate::utils::exec::internal::to_os($arg)),*]),
            $filter,
        )
    };
    ($root:expr; $cmd:expr; $($arg:expr),* $(,)?) => {
        $crate::exec!(filter=&$crate::utils::exec::EMPTY_FILTER; $root; $cmd; $($arg),*)
    };
}

#[doc(hidden)]
pub mod internal {
    use std::ffi::{OsStr, OsString};

    #[inline]
    pub fn to_os<S: Into<OsString>>(s: S) -> OsString {
        s.into()
    }

    /// Command words from an array literal or a configured `Vec<String>`.
    pub fn to_cmd_vec<I, S>(cmd: I) -> Vec<OsString>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        cmd.into_iter().map(|s| s.as_ref().to_owned()).collect()
    }

    pub fn non_empty<const N: usize>(args: [OsString; N]) -> Vec<OsString> {
        args.into_iter().filter(|a| !a.is_empty()).collect()
    }
}

// ============================================================================
// Command Execution
// ============================================================================

/// Execute a command to completion and capture its output.
///
/// Warnings on stderr of a successful run are logged under the tool's name.
///
/// # Errors
/// Returns error if the command cannot start or exits non-zero.
pub fn exec(
    root: Option<&Path>,
    cmd: &[OsString],
    args: &[OsString],
    filter: &'static OutputFilter,
) -> Result<Output> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let output = command
        .output()
        .with_context(|| format!("Failed to execute `{name}`"))?;

    if !output.status.success() {
        bail!(failure_message(&name, &output, filter));
    }
    filter.log(&name, &String::from_utf8_lossy(&output.stderr));
    Ok(output)
}

/// Spawn a long-lived command with stdin piped and stderr inherited.
///
/// The tool reports its own progress and errors on the terminal; the
/// returned handle only controls its lifetime.
pub fn spawn_with_stdin(
    root: Option<&Path>,
    cmd: &[OsString],
    args: &[OsString],
) -> Result<RunningProcess> {
    let (name, mut command) = prepare(root, cmd, args)?;

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("Failed to spawn `{name}`"))?;

    let stdin = child.stdin.take();
    Ok(RunningProcess { child, stdin, name })
}

/// A running child process kept alive by its open stdin.
#[derive(Debug)]
pub struct RunningProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    name: String,
}

impl RunningProcess {
    /// Close stdin and wait for the process to exit.
    ///
    /// A process stopped by SIGINT or SIGTERM counts as a clean stop: on
    /// Ctrl+C the terminal signals the child before it is closed.
    ///
    /// # Errors
    /// Returns error if waiting fails or the process exits non-zero.
    pub fn close(mut self) -> Result<ExitStatus> {
        // stdin must be closed first or the child never sees EOF
        drop(self.stdin.take());

        let status = self
            .child
            .wait()
            .with_context(|| format!("Failed to wait for `{}`", self.name))?;
        if !status.success() && !stopped_by_shutdown_signal(status) {
            bail!("Command `{}` failed with {status}", self.name);
        }
        Ok(status)
    }
}

#[cfg(unix)]
fn stopped_by_shutdown_signal(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;

    const SIGINT: i32 = 2;
    const SIGTERM: i32 = 15;
    matches!(status.signal(), Some(SIGINT | SIGTERM))
}

#[cfg(not(unix))]
const fn stopped_by_shutdown_signal(_: ExitStatus) -> bool {
    false
}

/// Split `cmd` into program and leading args, then append `args`.
fn prepare(root: Option<&Path>, cmd: &[OsString], args: &[OsString]) -> Result<(String, Command)> {
    let (program, leading) = cmd.split_first().context("Empty command")?;
    let name = Path::new(program)
        .file_name()
        .map_or_else(|| program.to_string_lossy(), OsStr::to_string_lossy)
        .into_owned();

    let mut command = Command::new(program);
    command.args(leading).args(args);
    if let Some(dir) = root {
        command.current_dir(dir);
    }
    Ok((name, command))
}

// ============================================================================
// Output Filtering
// ============================================================================

fn strip_ansi(s: &str) -> Cow<'_, str> {
    static ANSI: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\x1b\[[0-9;]*m").expect("ANSI pattern is valid")
    });
    ANSI.replace_all(s, "")
}

/// Line prefixes to drop from tool output before showing it.
pub struct OutputFilter {
    skip: &'static [&'static str],
}

impl OutputFilter {
    pub const fn new(skip: &'static [&'static str]) -> Self {
        Self { skip }
    }

    /// Whether a line carries information. Blank and banner lines do not.
    fn keeps(&self, line: &str) -> bool {
        let plain = strip_ansi(line);
        let plain = plain.trim();
        !plain.is_empty() && !self.skip.iter().any(|p| plain.starts_with(p))
    }

    /// Lines that survive the filter, ANSI codes kept.
    fn lines<'a>(&self, output: &'a str) -> Vec<&'a str> {
        output.lines().filter(|line| self.keeps(line)).collect()
    }

    fn log(&self, name: &str, output: &str) {
        let lines = self.lines(output);
        if !lines.is_empty() {
            log!(name; "{}", lines.join("\n"));
        }
    }
}

/// No skipping beyond blank lines.
pub const EMPTY_FILTER: OutputFilter = OutputFilter::new(&[]);

/// `Command `x` failed with <status>`, then filtered stderr and any stdout.
fn failure_message(name: &str, output: &Output, filter: &OutputFilter) -> String {
    let mut msg = format!("Command `{name}` failed with {}", output.status);

    let stderr = String::from_utf8_lossy(&output.stderr);
    for line in filter.lines(&stderr) {
        msg.push('\n');
        msg.push_str(line);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.trim().is_empty() {
        msg.push_str("\nStdout:\n");
        msg.push_str(stdout.trim());
    }
    msg
}
