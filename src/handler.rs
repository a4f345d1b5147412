//! Translation of server lines into session state changes.

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::proto::{CommandLine, Line, ServerEvent};
use crate::state::{Channel, Message, MessageKind, Session, User};

/// Numerics whose trailing text is shown verbatim as informational banner lines.
const BANNER_NUMERICS: [&str; 12] = [
    "001", "002", "003", "004", "005", "251", "252", "254", "255", "372", "375", "376",
];

/// Errors a server line can produce during dispatch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// A topic line arrived while no channel is active.
    #[error("No active channel")]
    NoActiveChannel,
}

/// What the display has to catch up on after a line is dispatched.
///
/// History appends are not listed here. Callers watch the session's history length
/// instead.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The channel name or topic changed.
    pub title: bool,
    /// The channel roster changed.
    pub roster: bool,
    /// The history was wiped and must be redrawn from scratch.
    pub cleared: bool,
    /// Raw lines to send to the server, in order.
    pub outgoing: Vec<String>,
}

/// Applies a tokenized server line to the session and reports what changed.
///
/// # Errors
///
/// Returns [`DispatchError::NoActiveChannel`] when a topic line arrives while no channel
/// is active.
pub fn handle_line(session: &mut Session, line: &Line) -> Result<Outcome, DispatchError> {
    match line {
        Line::Server(event) => handle_server_event(session, event),
        Line::Bare(command) => Ok(handle_bare_command(session, command)),
    }
}

fn handle_server_event(
    session: &mut Session,
    event: &ServerEvent,
) -> Result<Outcome, DispatchError> {
    let mut outcome = Outcome::default();
    let nick = event.nick().to_string();
    let from_local = nick == session.nick();

    match event.command.as_str() {
        "JOIN" if from_local => {
            let target = event.target().to_string();

            session.set_channel(Some(Channel::new(target.as_str())));
            session.push_message(Message::new(
                MessageKind::System,
                format!("Now talking on {target}"),
            ));

            outcome.title = true;
            outcome.roster = true;
        }
        "JOIN" => {
            if session.channel().is_some() {
                let user = Arc::new(User::new(nick.as_str()));

                if session
                    .channel_mut()
                    .is_some_and(|channel| channel.add_user(Arc::clone(&user)))
                {
                    outcome.roster = true;
                }

                session.push_message(Message::from_user(
                    MessageKind::Action,
                    &user,
                    format!("has joined {}", event.target()),
                ));
            }
        }
        "PART" if from_local => {
            let target = event.target().to_string();

            session.set_channel(None);
            session.push_message(Message::new(
                MessageKind::System,
                format!("You have left {target}"),
            ));

            outcome.title = true;
            outcome.roster = true;
        }
        "PART" => {
            let reason = event.text().to_string();
            let removed = session
                .channel_mut()
                .and_then(|channel| channel.remove_user(&nick));

            if let Some(user) = removed {
                let mut text = format!("has left {}", event.target());

                if !reason.is_empty() {
                    text.push_str(&format!(" ({reason})"));
                }

                session.push_message(Message::from_user(MessageKind::Action, &user, text));
                outcome.roster = true;
            }
        }
        "QUIT" => {
            let reason = event.text().to_string();
            let removed = session
                .channel_mut()
                .and_then(|channel| channel.remove_user(&nick));

            if let Some(user) = removed {
                let mut text = String::from("has quit");

                if !reason.is_empty() {
                    text.push_str(&format!(" ({reason})"));
                }

                session.push_message(Message::from_user(MessageKind::Action, &user, text));
                outcome.roster = true;
            }
        }
        "NICK" => {
            let new_nick = if event.text().is_empty() {
                event.target().to_string()
            } else {
                event.text().to_string()
            };

            if new_nick.is_empty() {
                return Ok(outcome);
            }

            if from_local {
                session.set_nick(&new_nick);
            }

            let renamed = session
                .channel_mut()
                .and_then(|channel| channel.rename_user(&nick, &new_nick));

            if let Some(user) = renamed {
                outcome.roster = true;

                if !from_local {
                    session.push_message(Message::from_user(
                        MessageKind::Action,
                        &user,
                        format!("is now known as {new_nick}"),
                    ));
                }
            }
        }
        "PRIVMSG" | "NOTICE" => {
            let in_channel = session
                .channel()
                .is_some_and(|channel| channel.name() == event.target());

            if in_channel {
                let author = session.user_for(&nick);

                session.push_message(Message::from_user(
                    MessageKind::Plain,
                    &author,
                    event.text(),
                ));
            } else if event.target() == session.nick() {
                let author = session.user_for(&nick);

                session.push_message(Message::from_user(
                    MessageKind::Private,
                    &author,
                    event.text(),
                ));
            }
        }
        "TOPIC" | "332" => {
            let topic = event.text().to_string();
            let channel = session
                .channel_mut()
                .ok_or(DispatchError::NoActiveChannel)?;

            channel.set_topic(topic.as_str());
            outcome.title = true;

            let author = session.user_for(&nick);

            session.push_message(Message::from_user(
                MessageKind::Action,
                &author,
                format!("has changed the topic to: {topic}"),
            ));
        }
        "353" => {
            session.open_names();
            session.push_names(event.text().split_whitespace().map(str::to_string));
        }
        "366" => {
            let tokens = session.take_names().unwrap_or_default();

            if !tokens.is_empty() {
                if let Some(channel) = session.channel_mut() {
                    channel.set_users(sorted_users(&tokens));
                    outcome.roster = true;
                }
            }
        }
        command if BANNER_NUMERICS.contains(&command) => {
            session.push_message(Message::new(MessageKind::System, event.text()));
        }
        command => trace!(%command, "ignoring server command"),
    }

    Ok(outcome)
}

fn handle_bare_command(session: &mut Session, command: &CommandLine) -> Outcome {
    let mut outcome = Outcome::default();

    match command.command.as_str() {
        "PING" => outcome.outgoing.push(format!("PONG :{}", command.rest)),
        "NOTICE AUTH" => {
            session.push_message(Message::new(MessageKind::System, command.rest.as_str()));
        }
        other => trace!(command = %other, "ignoring bare command"),
    }

    outcome
}

/// Builds roster entries from raw nickname tokens: plain nicks first, then voiced, then
/// operators, alphabetically within each mode.
fn sorted_users(tokens: &[String]) -> Vec<Arc<User>> {
    let mut users: Vec<_> = tokens
        .iter()
        .map(|token| Arc::new(User::new(token.as_str())))
        .collect();

    users.sort_by(|a, b| a.mode().cmp(&b.mode()).then_with(|| a.nick().cmp(b.nick())));

    users
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(session: &mut Session, line: &str) -> Outcome {
        let parsed = crate::proto::parse(line).expect("line should tokenize");

        handle_line(session, &parsed).expect("line should dispatch")
    }

    fn session_in(channel: &str) -> Session {
        let mut session = Session::new("bob");
        dispatch(&mut session, &format!(":bob!b@localhost JOIN {channel}"));
        session
    }

    #[test]
    fn it_should_create_the_channel_on_own_join() {
        let mut session = Session::new("bob");

        let outcome = dispatch(&mut session, ":bob!b@localhost JOIN #test");

        assert!(outcome.title);
        assert!(outcome.roster);
        assert_eq!(session.channel().map(Channel::name), Some("#test"));

        let last = session.history().last().expect("join should be logged");
        assert_eq!(last.kind(), MessageKind::System);
        assert_eq!(last.text(), "Now talking on #test");
    }

    #[test]
    fn it_should_track_other_joins() {
        let mut session = session_in("#test");

        let outcome = dispatch(&mut session, ":alice!a@example.org JOIN #test");
        assert!(outcome.roster);

        let repeat = dispatch(&mut session, ":alice!a@example.org JOIN #test");
        assert!(!repeat.roster);

        let channel = session.channel().expect("channel should be active");
        assert_eq!(channel.users().len(), 1);

        let last = session.history().last().expect("join should be logged");
        assert_eq!(last.kind(), MessageKind::Action);
        assert_eq!(last.nick(), "alice");
        assert_eq!(last.text(), "has joined #test");
    }

    #[test]
    fn joins_without_a_channel_are_ignored() {
        let mut session = Session::new("bob");

        let outcome = dispatch(&mut session, ":alice!a@example.org JOIN #test");

        assert_eq!(outcome, Outcome::default());
        assert!(session.history().is_empty());
    }

    #[test]
    fn it_should_clear_the_channel_on_own_part() {
        let mut session = session_in("#test");

        let outcome = dispatch(&mut session, ":bob!b@localhost PART #test");

        assert!(outcome.title);
        assert!(outcome.roster);
        assert!(session.channel().is_none());

        let last = session.history().last().expect("part should be logged");
        assert_eq!(last.kind(), MessageKind::System);
        assert_eq!(last.text(), "You have left #test");
    }

    #[test]
    fn part_reasons_are_appended() {
        let mut session = session_in("#test");
        dispatch(&mut session, ":alice!a@example.org JOIN #test");

        let outcome = dispatch(&mut session, ":alice!a@example.org PART #test :gone fishing");

        assert!(outcome.roster);
        assert!(session
            .channel()
            .expect("channel should be active")
            .users()
            .is_empty());

        let last = session.history().last().expect("part should be logged");
        assert_eq!(last.kind(), MessageKind::Action);
        assert_eq!(last.text(), "has left #test (gone fishing)");
    }

    #[test]
    fn part_of_an_unknown_nick_is_ignored() {
        let mut session = session_in("#test");
        let before = session.history().len();

        let outcome = dispatch(&mut session, ":alice!a@example.org PART #test");

        assert!(!outcome.roster);
        assert_eq!(session.history().len(), before);
    }

    #[test]
    fn it_should_drop_quitters_from_the_roster() {
        let mut session = session_in("#test");
        dispatch(&mut session, ":alice!a@example.org JOIN #test");

        let outcome = dispatch(&mut session, ":alice!a@example.org QUIT :brb");

        assert!(outcome.roster);
        assert!(session
            .channel()
            .expect("channel should be active")
            .users()
            .is_empty());

        let last = session.history().last().expect("quit should be logged");
        assert_eq!(last.text(), "has quit (brb)");

        dispatch(&mut session, ":carol!c@example.org JOIN #test");
        dispatch(&mut session, ":carol!c@example.org QUIT");

        let last = session.history().last().expect("quit should be logged");
        assert_eq!(last.text(), "has quit");
    }

    #[test]
    fn it_should_rename_roster_entries() {
        let mut session = session_in("#test");
        dispatch(&mut session, ":alice!a@example.org JOIN #test");

        let outcome = dispatch(&mut session, ":alice!a@example.org NICK carol");

        assert!(outcome.roster);

        let channel = session.channel().expect("channel should be active");
        assert!(channel.user("alice").is_none());
        assert!(channel.user("carol").is_some());

        let last = session.history().last().expect("rename should be logged");
        assert_eq!(last.kind(), MessageKind::Action);
        assert_eq!(last.nick(), "carol");
        assert_eq!(last.text(), "is now known as carol");
    }

    #[test]
    fn it_should_follow_own_nick_changes() {
        let mut session = Session::new("bob");

        let outcome = dispatch(&mut session, ":bob!b@localhost NICK :rob");

        assert_eq!(session.nick(), "rob");
        assert_eq!(outcome, Outcome::default());
        assert!(session.history().is_empty());
    }

    #[test]
    fn history_keeps_the_nick_at_capture_time() {
        let mut session = session_in("#test");
        dispatch(&mut session, ":alice!a@example.org JOIN #test");
        dispatch(&mut session, ":alice!a@example.org PRIVMSG #test :first");
        dispatch(&mut session, ":alice!a@example.org NICK carol");
        dispatch(&mut session, ":carol!a@example.org PRIVMSG #test :second");

        let nicks: Vec<_> = session
            .history()
            .iter()
            .filter(|message| message.kind() == MessageKind::Plain)
            .map(Message::nick)
            .collect();

        assert_eq!(nicks, ["alice", "carol"]);
    }

    #[test]
    fn it_should_append_channel_messages() {
        let mut session = session_in("#test");
        dispatch(&mut session, ":alice!a@example.org JOIN #test");

        let outcome = dispatch(&mut session, ":alice!a@example.org PRIVMSG #test :hello");

        assert_eq!(outcome, Outcome::default());

        let last = session.history().last().expect("chat should be logged");
        assert_eq!(last.kind(), MessageKind::Plain);
        assert_eq!(last.nick(), "alice");
        assert_eq!(last.text(), "hello");
    }

    #[test]
    fn it_should_mark_direct_messages_private() {
        let mut session = Session::new("bob");

        dispatch(&mut session, ":alice!a@example.org PRIVMSG bob :psst");

        let last = session.history().last().expect("message should be logged");
        assert_eq!(last.kind(), MessageKind::Private);
        assert_eq!(last.nick(), "alice");
        assert_eq!(last.text(), "psst");
    }

    #[test]
    fn messages_for_other_targets_are_ignored() {
        let mut session = session_in("#test");

        dispatch(&mut session, ":alice!a@example.org PRIVMSG #other :hello");
        dispatch(&mut session, ":alice!a@example.org PRIVMSG carol :hello");

        // Only the join notice is in the history
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn it_should_update_the_topic() {
        let mut session = session_in("#test");

        let outcome = dispatch(&mut session, ":alice!a@example.org TOPIC #test :be kind");

        assert!(outcome.title);
        assert_eq!(
            session.channel().expect("channel should be active").topic(),
            "be kind"
        );

        let last = session.history().last().expect("topic change should be logged");
        assert_eq!(last.kind(), MessageKind::Action);
        assert_eq!(last.text(), "has changed the topic to: be kind");
    }

    #[test]
    fn numeric_topic_replies_set_the_topic_too() {
        let mut session = session_in("#test");

        dispatch(&mut session, ":irc.example.org 332 bob #test :welcome in");

        assert_eq!(
            session.channel().expect("channel should be active").topic(),
            "welcome in"
        );
    }

    #[test]
    fn topic_without_a_channel_is_a_caller_error() {
        let mut session = Session::new("bob");
        let parsed = crate::proto::parse(":irc.example.org 332 bob #test :hi")
            .expect("line should tokenize");

        assert_eq!(
            handle_line(&mut session, &parsed),
            Err(DispatchError::NoActiveChannel)
        );
    }

    #[test]
    fn it_should_flush_names_sorted_by_mode_then_nick() {
        let mut session = session_in("#test");
        dispatch(&mut session, ":irc.example.org 353 bob = #test :@bob alice");
        dispatch(&mut session, ":irc.example.org 353 bob = #test :+carol");

        let outcome = dispatch(&mut session, ":irc.example.org 366 bob #test :End of /NAMES list.");

        assert!(outcome.roster);

        let nicks: Vec<_> = session
            .channel()
            .expect("channel should be active")
            .users()
            .iter()
            .map(|user| user.full_nick())
            .collect();

        assert_eq!(nicks, ["alice", "+carol", "@bob"]);
    }

    #[test]
    fn the_roster_stays_untouched_mid_stream() {
        let mut session = session_in("#test");

        let outcome = dispatch(&mut session, ":irc.example.org 353 bob = #test :@bob alice");

        assert!(!outcome.roster);
        assert!(session
            .channel()
            .expect("channel should be active")
            .users()
            .is_empty());
        assert!(session.names_open());
    }

    #[test]
    fn it_should_ignore_replayed_names_endings() {
        let mut session = session_in("#test");
        dispatch(&mut session, ":irc.example.org 353 bob = #test :@bob alice");
        dispatch(&mut session, ":irc.example.org 366 bob #test :End of /NAMES list.");

        let replay = dispatch(&mut session, ":irc.example.org 366 bob #test :End of /NAMES list.");

        assert!(!replay.roster);
        assert_eq!(
            session
                .channel()
                .expect("channel should be active")
                .users()
                .len(),
            2
        );
    }

    #[test]
    fn names_without_a_channel_are_dropped_on_close() {
        let mut session = Session::new("bob");
        dispatch(&mut session, ":irc.example.org 353 bob = #test :@bob alice");

        let outcome = dispatch(&mut session, ":irc.example.org 366 bob #test :End of /NAMES list.");

        assert!(!outcome.roster);
        assert!(!session.names_open());

        // The dropped tokens must not leak into the next stream
        dispatch(&mut session, ":bob!b@localhost JOIN #test");
        dispatch(&mut session, ":irc.example.org 353 bob = #test :carol");
        dispatch(&mut session, ":irc.example.org 366 bob #test :End of /NAMES list.");

        let nicks: Vec<_> = session
            .channel()
            .expect("channel should be active")
            .users()
            .iter()
            .map(|user| user.full_nick())
            .collect();

        assert_eq!(nicks, ["carol"]);
    }

    #[test]
    fn banner_numerics_pass_through_verbatim() {
        let mut session = Session::new("bob");

        dispatch(&mut session, ":irc.example.org 001 bob :Welcome to ExampleNet, bob");
        dispatch(&mut session, ":irc.example.org 375 bob :- Message of the day -");

        let texts: Vec<_> = session.history().iter().map(Message::text).collect();
        assert_eq!(texts, ["Welcome to ExampleNet, bob", "- Message of the day -"]);
        assert!(session
            .history()
            .iter()
            .all(|message| message.kind() == MessageKind::System));
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let mut session = Session::new("bob");

        let outcome = dispatch(&mut session, ":irc.example.org 421 bob FOO :Unknown command");

        assert_eq!(outcome, Outcome::default());
        assert!(session.history().is_empty());
    }

    #[test]
    fn it_should_answer_ping_with_pong() {
        let mut session = Session::new("bob");

        let outcome = dispatch(&mut session, "PING :irc.example.org");

        assert_eq!(outcome.outgoing, ["PONG :irc.example.org"]);
        assert!(session.history().is_empty());
    }

    #[test]
    fn notice_auth_shows_as_system_text() {
        let mut session = Session::new("bob");

        dispatch(&mut session, "NOTICE AUTH :*** Looking up your hostname");

        let last = session.history().last().expect("notice should be logged");
        assert_eq!(last.kind(), MessageKind::System);
        assert_eq!(last.text(), "*** Looking up your hostname");
    }
}
