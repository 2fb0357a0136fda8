//! Diagnostics.
//!
//! Errors go to stderr with a bold red `error:` prefix; informational and
//! verbose lines go to stdout. Both paths write the whole line through one
//! locked stream handle, so reports from concurrent workers never
//! interleave mid-line. The process exit code, not this output, is the
//! machine-readable success signal.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Report an error on stderr
pub fn error(message: impl AsRef<str>) {
    let stream = StandardStream::stderr(ColorChoice::Auto);
    let mut out = stream.lock();
    let _ = out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(out, "error: ");
    let _ = out.reset();
    let _ = writeln!(out, "{}", message.as_ref());
}

/// Print an informational line on stdout
pub fn note(message: impl AsRef<str>) {
    let stream = StandardStream::stdout(ColorChoice::Auto);
    let mut out = stream.lock();
    let _ = writeln!(out, "{}", message.as_ref());
}
