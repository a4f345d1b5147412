//! Tokenizing of raw server lines.

use thiserror::Error;

/// Errors that can occur while tokenizing a single server line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The line was empty, or whitespace only.
    #[error("Line is empty")]
    Empty,
    /// A source-prefixed line ended before the command token.
    #[error("Line has no command")]
    MissingCommand,
    /// An unprefixed line carried no `:`-delimited payload.
    #[error("Line has no payload")]
    MissingPayload,
}

/// A single tokenized server line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A line with a `:`-prefixed source.
    Server(ServerEvent),
    /// A line without a source prefix, such as `PING`.
    Bare(CommandLine),
}

/// A source-prefixed line split into source, command, parameters and trailing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEvent {
    /// The sender, either `nick!user@host` or a bare server name.
    pub source: String,
    /// The command or numeric, e.g. `PRIVMSG` or `353`.
    pub command: String,
    /// The middle parameters.
    pub params: Vec<String>,
    /// The trailing text after the second `:` of the line, if present.
    pub trailing: Option<String>,
}

impl ServerEvent {
    /// Returns the nickname part of the source, or the whole source when it carries no `!`.
    #[must_use]
    pub fn nick(&self) -> &str {
        match self.source.find('!') {
            Some(index) => &self.source[..index],
            None => &self.source,
        }
    }

    /// Returns the first middle parameter, the target of most commands.
    #[must_use]
    pub fn target(&self) -> &str {
        self.params.first().map_or("", String::as_str)
    }

    /// Returns the trailing text, or an empty string when there is none.
    #[must_use]
    pub fn text(&self) -> &str {
        self.trailing.as_deref().unwrap_or("")
    }
}

/// An unprefixed line such as `PING`, or the `NOTICE AUTH` lines some servers send during
/// registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// The trimmed text before the `:`. May contain spaces, e.g. `NOTICE AUTH`.
    pub command: String,
    /// The payload after the `:`.
    pub rest: String,
}

/// Tokenizes one server line, stripped of its CR/LF terminator.
///
/// # Errors
///
/// Returns a [`ParseError`] when the line is empty or too malformed to classify. Such lines
/// carry nothing actionable and are meant to be dropped by the caller.
pub fn parse(line: &str) -> Result<Line, ParseError> {
    let line = line.trim();

    if line.is_empty() {
        return Err(ParseError::Empty);
    }

    match line.strip_prefix(':') {
        Some(rest) => parse_server(rest),
        None => parse_bare(line),
    }
}

fn parse_server(line: &str) -> Result<Line, ParseError> {
    // Everything after the second `:` of the full line is trailing text, kept verbatim
    let (head, trailing) = match line.split_once(':') {
        Some((head, trailing)) => (head, Some(trailing.to_string())),
        None => (line, None),
    };

    let mut tokens = head.split_whitespace();
    let source = tokens.next().ok_or(ParseError::MissingCommand)?.to_string();
    let command = tokens.next().ok_or(ParseError::MissingCommand)?.to_string();
    let params = tokens.map(str::to_string).collect();

    Ok(Line::Server(ServerEvent {
        source,
        command,
        params,
        trailing,
    }))
}

fn parse_bare(line: &str) -> Result<Line, ParseError> {
    let (command, rest) = line.split_once(':').ok_or(ParseError::MissingPayload)?;

    Ok(Line::Bare(CommandLine {
        command: command.trim().to_string(),
        rest: rest.to_string(),
    }))
}
