//! User command parsing.

use crate::handler::Outcome;
use crate::state::{Message, MessageKind, Session};

/// What a line of local input asks the client to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Request a new nickname.
    Nick(String),
    /// Join the given channel.
    Join(String),
    /// Leave the given channel, or the active one when `None`.
    Part(Option<String>),
    /// Replace the active channel's topic.
    Topic(String),
    /// Disconnect with the given parting reason.
    Quit(String),
    /// Wipe the message history.
    Clear,
    /// Send a raw protocol line verbatim.
    Raw(String),
    /// Toggle visibility of raw protocol lines.
    ToggleDebug,
    /// Send chat text to the active channel.
    Say(String),
    /// Nothing recognizable, dropped silently.
    Ignore,
}

/// Splits a line of local input into an [`Intent`].
///
/// Anything starting with `/` is a command, everything else is chat text.
///
/// # Examples
///
/// ```
/// # use natter::command::{parse, Intent};
/// assert_eq!(parse("/join #rust"), Intent::Join("#rust".to_string()));
/// assert_eq!(parse("/part"), Intent::Part(None));
/// assert_eq!(parse("hello"), Intent::Say("hello".to_string()));
/// ```
#[must_use]
pub fn parse(input: &str) -> Intent {
    let Some(rest) = input.strip_prefix('/') else {
        return if input.is_empty() {
            Intent::Ignore
        } else {
            Intent::Say(input.to_string())
        };
    };

    let (word, arg) = match rest.split_once(' ') {
        Some((word, arg)) => (word, arg),
        None => (rest, ""),
    };

    match word {
        "nick" => Intent::Nick(arg.to_string()),
        "join" => Intent::Join(arg.to_string()),
        "part" => Intent::Part((!arg.is_empty()).then(|| arg.to_string())),
        "topic" => Intent::Topic(arg.to_string()),
        "quit" => Intent::Quit(arg.to_string()),
        "clear" => Intent::Clear,
        "raw" => Intent::Raw(arg.to_string()),
        "debug" => Intent::ToggleDebug,
        _ => Intent::Ignore,
    }
}

/// Applies one line of local input to the session and reports what changed.
///
/// Chat text is echoed into the history right away. The server does not repeat messages
/// back to their sender.
pub fn handle_input(session: &mut Session, input: &str) -> Outcome {
    let mut outcome = Outcome::default();

    match parse(input) {
        Intent::Nick(nick) => outcome.outgoing.push(format!("NICK {nick}")),
        Intent::Join(channel) => outcome.outgoing.push(format!("JOIN {channel}")),
        Intent::Part(Some(channel)) => outcome.outgoing.push(format!("PART {channel}")),
        Intent::Part(None) => {
            match session.channel().map(|channel| channel.name().to_string()) {
                Some(name) => outcome.outgoing.push(format!("PART {name}")),
                None => no_channel(session),
            }
        }
        Intent::Topic(topic) => {
            match session.channel().map(|channel| channel.name().to_string()) {
                Some(name) => outcome.outgoing.push(format!("TOPIC {name} :{topic}")),
                None => no_channel(session),
            }
        }
        Intent::Quit(reason) => outcome.outgoing.push(format!("QUIT :{reason}")),
        Intent::Clear => {
            session.clear_history();
            outcome.cleared = true;
        }
        Intent::Raw(line) => outcome.outgoing.push(line),
        Intent::ToggleDebug => {
            session.toggle_debug();
        }
        Intent::Say(text) => match session.channel().map(|channel| channel.name().to_string()) {
            Some(name) => {
                let message =
                    Message::from_user(MessageKind::Plain, session.local(), text.as_str());

                session.push_message(message);
                outcome.outgoing.push(format!("PRIVMSG {name} :{text}"));
            }
            None => no_channel(session),
        },
        Intent::Ignore => {}
    }

    outcome
}

fn no_channel(session: &mut Session) {
    session.push_message(Message::new(
        MessageKind::System,
        "Can't send message - join a channel first!",
    ));
}
