//! Terminal display and input.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

use crate::transport::LineReader;

/// The capabilities a display surface offers the session loop.
///
/// The session loop never prints by itself. Everything the user sees goes through one of
/// these methods, so a richer surface can replace the plain terminal wholesale.
pub trait DisplaySink {
    /// Shows the channel name and topic, or a blank title when `name` is empty.
    fn show_title(&mut self, name: &str, topic: &str);

    /// Shows the channel roster, sigil-qualified nicks in display order.
    fn show_roster(&mut self, users: &[String]);

    /// Appends one rendered line to the history area.
    fn append_history(&mut self, line: &str);

    /// Wipes the history area.
    fn clear_history(&mut self);

    /// Shows the text currently sitting in the input area.
    fn show_input(&mut self, text: &str);
}

/// Renders the session onto a plain line-mode terminal.
#[derive(Debug, Default)]
pub struct Terminal;

impl Terminal {
    #[must_use]
    pub fn new() -> Terminal {
        Terminal
    }
}

impl DisplaySink for Terminal {
    fn show_title(&mut self, name: &str, topic: &str) {
        if name.is_empty() {
            println!("==");
        } else {
            println!("== {name} - {topic}");
        }
    }

    fn show_roster(&mut self, users: &[String]) {
        println!("== users: {}", users.join(" "));
    }

    fn append_history(&mut self, line: &str) {
        println!("{line}");
    }

    fn clear_history(&mut self) {
        // ANSI erase-display followed by cursor home
        print!("\x1b[2J\x1b[1;1H");
    }

    fn show_input(&mut self, _text: &str) {
        // A line-mode terminal echoes typed input by itself
    }
}

/// Local input read line by line from standard input.
#[derive(Debug)]
pub struct Stdin {
    lines: Lines<BufReader<tokio::io::Stdin>>,
}

impl Stdin {
    #[must_use]
    pub fn new() -> Stdin {
        Stdin {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for Stdin {
    fn default() -> Stdin {
        Stdin::new()
    }
}

#[async_trait]
impl LineReader for Stdin {
    async fn read_line(&mut self) -> Option<String> {
        self.lines.next_line().await.ok().flatten()
    }
}
