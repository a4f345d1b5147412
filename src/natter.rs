//! The main process for keeping the session in step with the server and the keyboard.
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::command;
use crate::config::Config;
use crate::handler::{self, DispatchError, Outcome};
use crate::proto::{self, Line, ParseError};
use crate::state::{Message, MessageKind, Session};
use crate::term::DisplaySink;
use crate::transport::{LineReader, LineWriter};
use crate::Error;

/// One unit of work for the session loop. Both producer tasks funnel into a single queue
/// of these, which is what keeps the session state free of locks.
#[derive(Debug)]
pub enum Event {
    /// A line arrived from the server.
    Line {
        /// The raw line as received.
        raw: String,
        /// Its tokenized form.
        parsed: Line,
    },
    /// A line arrived from the server but did not tokenize.
    Garbled(String),
    /// A line of local input was typed.
    Input(String),
    /// The server closed the connection.
    Hangup,
}

/// The client itself: one session, one display, one connection.
pub struct Natter {
    /// The complete configuration loaded from file or environment
    config: Config,
    /// The session state, owned exclusively by the loop
    session: Session,
    /// The display surface everything visible goes through
    display: Box<dyn DisplaySink + Send>,
    /// How many history entries have been flushed to the display
    rendered: usize,
}

impl Natter {
    /// Creates a new client instance from the provided configuration.
    ///
    /// This does not touch the network. Call [`Natter::run`] with a connected transport
    /// to start the session.
    #[must_use]
    pub fn new(config: Config, display: Box<dyn DisplaySink + Send>) -> Natter {
        let mut session = Session::new(config.server.nick.as_str());
        session.set_debug(config.debug);

        Natter {
            config,
            session,
            display,
            rendered: 0,
        }
    }

    /// Returns the session state.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Registers with the server, then processes server lines and local input until the
    /// server goes away or the user quits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionLost`] if the connection drops during registration.
    /// Losses later on are surfaced in the history instead and end the loop normally.
    pub async fn run<R, W, I>(&mut self, reader: R, mut writer: W, input: I) -> Result<(), Error>
    where
        R: LineReader + 'static,
        W: LineWriter,
        I: LineReader + 'static,
    {
        self.identify(&mut writer).await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader_task = spawn_reader(reader, tx.clone());
        let input_task = spawn_input(input, tx);

        while let Some(event) = rx.recv().await {
            match event {
                Event::Line { raw, parsed } => {
                    debug!(line = %raw, "processing server line");

                    if self.session.debug() {
                        self.session
                            .push_message(Message::new(MessageKind::Debug, raw.as_str()));
                    }

                    match handler::handle_line(&mut self.session, &parsed) {
                        Ok(outcome) => {
                            if !self.send_all(&mut writer, &outcome.outgoing).await {
                                break;
                            }

                            self.refresh(&outcome);
                        }
                        Err(DispatchError::NoActiveChannel) => {
                            warn!(line = %raw, "dropping channel-scoped line without an active channel");
                            self.refresh(&Outcome::default());
                        }
                    }
                }
                Event::Garbled(raw) => {
                    if self.session.debug() {
                        self.session
                            .push_message(Message::new(MessageKind::Debug, raw.as_str()));
                        self.refresh(&Outcome::default());
                    }
                }
                Event::Input(line) => {
                    let outcome = command::handle_input(&mut self.session, &line);

                    if !self.send_all(&mut writer, &outcome.outgoing).await {
                        break;
                    }

                    self.refresh(&outcome);
                    self.display.show_input("");
                }
                Event::Hangup => {
                    self.session.push_message(Message::new(
                        MessageKind::System,
                        "Disconnected from server",
                    ));
                    self.refresh(&Outcome::default());

                    break;
                }
            }
        }

        reader_task.abort();
        input_task.abort();

        Ok(())
    }

    /// Sends the registration lines for the configured identity.
    async fn identify<W: LineWriter>(&mut self, writer: &mut W) -> Result<(), Error> {
        let nick = self.config.server.nick.clone();
        let username = self.config.server.username().to_string();
        let realname = self.config.server.realname().to_string();

        debug!(%nick, "registering with the server");

        if !writer.send(&format!("NICK {nick}")).await
            || !writer
                .send(&format!("USER {username} 0 * :{realname}"))
                .await
        {
            return Err(Error::ConnectionLost);
        }

        Ok(())
    }

    /// Sends the given lines in order. A send failure is surfaced in the history and
    /// reported as `false` so the caller can stop the loop.
    async fn send_all<W: LineWriter>(&mut self, writer: &mut W, lines: &[String]) -> bool {
        for line in lines {
            debug!(%line, "sending line");

            if !writer.send(line).await {
                self.session.push_message(Message::new(
                    MessageKind::System,
                    "Connection to server lost",
                ));
                self.refresh(&Outcome::default());

                return false;
            }
        }

        true
    }

    /// Brings the display up to date with the session: new history entries always, title
    /// and roster only when the outcome asks for them.
    fn refresh(&mut self, outcome: &Outcome) {
        // A wipe takes the title and roster with it on plain terminals, redraw both
        let show_title = outcome.title || outcome.cleared;
        let show_roster = outcome.roster || outcome.cleared;

        if outcome.cleared {
            self.display.clear_history();
            self.rendered = 0;
        }

        if show_title {
            let (name, topic) = match self.session.channel() {
                Some(channel) => (channel.name().to_string(), channel.topic().to_string()),
                None => (String::new(), String::new()),
            };

            self.display.show_title(&name, &topic);
        }

        if show_roster {
            let users: Vec<String> = self
                .session
                .channel()
                .map(|channel| {
                    channel
                        .users()
                        .iter()
                        .map(|user| user.full_nick())
                        .collect()
                })
                .unwrap_or_default();

            self.display.show_roster(&users);
        }

        let history = self.session.history();
        let start = self.rendered.min(history.len());

        for message in &history[start..] {
            self.display.append_history(&message.to_string());
        }

        self.rendered = history.len();
    }
}

fn spawn_reader<R>(mut reader: R, tx: mpsc::UnboundedSender<Event>) -> JoinHandle<()>
where
    R: LineReader + 'static,
{
    tokio::spawn(async move {
        loop {
            match reader.read_line().await {
                Some(line) => {
                    let event = match proto::parse(&line) {
                        Ok(parsed) => Event::Line { raw: line, parsed },
                        Err(ParseError::Empty) => continue,
                        Err(err) => {
                            trace!(%line, %err, "tokenizer rejected line");

                            Event::Garbled(line)
                        }
                    };

                    if tx.send(event).is_err() {
                        break;
                    }
                }
                None => {
                    let _ = tx.send(Event::Hangup);

                    break;
                }
            }
        }
    })
}

fn spawn_input<I>(mut input: I, tx: mpsc::UnboundedSender<Event>) -> JoinHandle<()>
where
    I: LineReader + 'static,
{
    tokio::spawn(async move {
        while let Some(line) = input.read_line().await {
            if tx.send(Event::Input(line)).is_err() {
                break;
            }
        }
    })
}
