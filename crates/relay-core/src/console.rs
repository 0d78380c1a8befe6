//! Scrolling message console.
//!
//! The console keeps a fixed-depth rolling history of text lines and redraws
//! it in place with cursor-positioning escape sequences:
//!
//! ```text
//! row 0   === Enter commands (type 'exit()' to quit) ===
//! row 1   <oldest message>
//! ...
//! row 10  <newest message>
//! row 11  > _
//! ```
//!
//! The relay server and the direct client only talk to it through the
//! [`ConsoleSink`] trait, so the plain (non-interactive) server can swap in
//! a [`TracingSink`] that turns the same notices into log lines.

use std::collections::VecDeque;
use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Print, ResetColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{execute, queue};
use tracing::info;

// ============================================================================
// Layout
// ============================================================================

/// Number of history rows kept and drawn.
pub const MAX_MESSAGES: usize = 10;

/// Longest entry (in characters) kept in the history.
pub const MAX_ENTRY_CHARS: usize = 100;

/// Header drawn on the first row.
pub const HEADER: &str = "=== Enter commands (type 'exit()' to quit) ===";

/// Zero-based row of the input prompt (header + history).
pub const PROMPT_ROW: u16 = MAX_MESSAGES as u16 + 1;

/// Zero-based row where the cursor is parked when the console is restored.
pub const EXIT_ROW: u16 = PROMPT_ROW + 1;

const LINE_ENDINGS: &[char] = &['\r', '\n'];

// ============================================================================
// Sink Trait
// ============================================================================

/// Destination for human-readable notices produced by the event loops.
pub trait ConsoleSink {
    /// Pushes a line into the history.
    fn add_message(&mut self, message: &str);

    /// Redraws the sink, if it has anything to draw.
    fn render(&mut self) -> io::Result<()>;

    /// Convenience for the common "add then redraw" pair.
    fn show(&mut self, message: &str) -> io::Result<()> {
        self.add_message(message);
        self.render()
    }
}

// ============================================================================
// Terminal Console
// ============================================================================

/// Terminal console writing escape sequences to `W`.
///
/// `W` is stdout in the binaries and a `Vec<u8>` in tests.
pub struct Console<W: Write> {
    out: W,
    history: VecDeque<String>,
}

impl Console<io::Stdout> {
    /// Creates a console drawing on the process's stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    /// Creates a console with an empty history.
    pub fn new(out: W) -> Self {
        Self {
            out,
            history: VecDeque::with_capacity(MAX_MESSAGES),
        }
    }

    /// Clears the screen, hides the cursor and draws the empty frame.
    pub fn init(&mut self) -> io::Result<()> {
        execute!(self.out, Clear(ClearType::All), Hide)?;
        self.render()
    }

    /// Parks the cursor below the prompt and restores terminal attributes.
    pub fn restore(&mut self) -> io::Result<()> {
        execute!(self.out, MoveTo(0, EXIT_ROW), ResetColor, Show)
    }

    /// History entries, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ConsoleSink for Console<W> {
    fn add_message(&mut self, message: &str) {
        if self.history.len() == MAX_MESSAGES {
            self.history.pop_front();
        }
        self.history.push_back(clip_entry(message));
    }

    fn render(&mut self) -> io::Result<()> {
        queue!(self.out, MoveTo(0, 0), Clear(ClearType::CurrentLine), Print(HEADER))?;

        for row in 0..MAX_MESSAGES {
            let line = self.history.get(row).map(String::as_str).unwrap_or("");
            queue!(
                self.out,
                MoveTo(0, row as u16 + 1),
                Clear(ClearType::CurrentLine),
                Print(line)
            )?;
        }

        queue!(
            self.out,
            MoveTo(0, PROMPT_ROW),
            Clear(ClearType::CurrentLine),
            Print("> ")
        )?;
        self.out.flush()
    }
}

/// Strips line endings and clips to [`MAX_ENTRY_CHARS`] characters.
fn clip_entry(message: &str) -> String {
    message
        .trim_end_matches(LINE_ENDINGS)
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(MAX_ENTRY_CHARS)
        .collect()
}

// ============================================================================
// Log Sink
// ============================================================================

/// Sink used when no terminal is attached: every notice becomes a log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ConsoleSink for TracingSink {
    fn add_message(&mut self, message: &str) {
        info!(message = %message.trim_end_matches(LINE_ENDINGS), "relay");
    }

    fn render(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(console: Console<Vec<u8>>) -> String {
        String::from_utf8_lossy(&console.into_inner()).into_owned()
    }

    #[test]
    fn test_history_evicts_oldest_first() {
        let mut console = Console::new(Vec::new());
        for i in 0..(MAX_MESSAGES + 3) {
            console.add_message(&format!("message {i}"));
        }

        assert_eq!(console.len(), MAX_MESSAGES);
        let first = console.messages().next().unwrap();
        assert_eq!(first, "message 3");
        let last = console.messages().last().unwrap();
        assert_eq!(last, format!("message {}", MAX_MESSAGES + 2));
    }

    #[test]
    fn test_entries_are_clipped_and_trimmed() {
        let mut console = Console::new(Vec::new());
        console.add_message(&"x".repeat(MAX_ENTRY_CHARS * 2));
        console.add_message("hello\r\n");
        console.add_message("two\nlines\n");

        let entries: Vec<&str> = console.messages().collect();
        assert_eq!(entries[0].chars().count(), MAX_ENTRY_CHARS);
        assert_eq!(entries[1], "hello");
        assert_eq!(entries[2], "two lines");
    }

    #[test]
    fn test_render_draws_header_history_and_prompt() {
        let mut console = Console::new(Vec::new());
        console.add_message("Client connected: 127.0.0.1:4000");
        console.render().unwrap();

        let out = rendered(console);
        assert!(out.contains(HEADER));
        assert!(out.contains("Client connected: 127.0.0.1:4000"));
        assert!(out.ends_with("> "));
        // Prompt row is 1-based row 12 in the escape sequence.
        assert!(out.contains(&format!("\x1b[{};1H", PROMPT_ROW + 1)));
    }

    #[test]
    fn test_restore_shows_cursor() {
        let mut console = Console::new(Vec::new());
        console.init().unwrap();
        console.restore().unwrap();

        let out = rendered(console);
        assert!(out.contains("\x1b[?25l"));
        assert!(out.ends_with("\x1b[?25h"));
    }

    #[test]
    fn test_show_adds_and_renders() {
        let mut console = Console::new(Vec::new());
        console.show("ping").unwrap();
        assert_eq!(console.len(), 1);
        assert!(rendered(console).contains("ping"));
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        let mut sink = TracingSink;
        assert!(sink.show("anything").is_ok());
    }
}
