use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

/// Spinner style used during ongoing operations.
/// - Yellow spinner with animated braille-style frames.
/// - Displays the current message (`{wide_msg}`) next to the spinner.
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {wide_msg}")
        .expect("valid spinner template")
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

/// Green check mark followed by the final message.
pub fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}").expect("valid ok template")
}

/// Yellow exclamation mark: finished, but degraded.
pub fn warn_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m!\x1b[0m {wide_msg}").expect("valid warn template")
}

/// Red cross followed by the error message.
pub fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}").expect("valid err template")
}

/// Line-buffered writer that prints above a running spinner.
///
/// Writing to stdout directly while a spinner ticks garbles both; this
/// routes each complete line through [`ProgressBar::println`].
pub struct SpinnerWriter<'a> {
    pb: &'a ProgressBar,
    buf: Vec<u8>,
}

impl<'a> SpinnerWriter<'a> {
    pub fn new(pb: &'a ProgressBar) -> Self {
        Self {
            pb,
            buf: Vec::new(),
        }
    }

    fn emit_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            self.pb.println(text.trim_end_matches('\r'));
        }
    }
}

impl Write for SpinnerWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        self.emit_lines();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let text = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            self.pb.println(text);
        }
        Ok(())
    }
}

impl Drop for SpinnerWriter<'_> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_build() {
        let _ = spinner_style();
        let _ = ok_style();
        let _ = warn_style();
        let _ = err_style();
    }

    #[test]
    fn writer_consumes_complete_lines_only() {
        let pb = ProgressBar::hidden();
        let mut w = SpinnerWriter::new(&pb);
        write!(w, "first line\nsecond").unwrap();
        assert_eq!(w.buf, b"second");
        writeln!(w, " half").unwrap();
        assert!(w.buf.is_empty());
        write!(w, "tail").unwrap();
        w.flush().unwrap();
        assert!(w.buf.is_empty());
    }
}
