//! Session state: users, the active channel and the message history.

use std::fmt;
use std::sync::Arc;

use time::OffsetDateTime;

/// A user's channel-membership mode. Ordering corresponds to roster display precedence,
/// plain nicks first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChanMode {
    /// No special mode.
    #[default]
    None,
    /// Voiced (`+`).
    Voice,
    /// Channel operator (`@`).
    Operator,
}

impl ChanMode {
    /// Returns the sigil shown in front of a nickname carrying this mode.
    #[must_use]
    pub const fn sigil(self) -> &'static str {
        match self {
            ChanMode::None => "",
            ChanMode::Voice => "+",
            ChanMode::Operator => "@",
        }
    }
}

/// Details about a user, shared by reference between the roster and the message history.
///
/// Users are immutable; a rename replaces the whole entry via [`User::with_nick`], so
/// messages that captured the old entry keep displaying the nick current at the time.
#[derive(Debug, Clone)]
pub struct User {
    // The user's nickname
    nick: String,
    // The user's display name
    name: String,
    // The user's channel mode
    mode: ChanMode,
}

impl User {
    /// Creates a new user from a raw nickname token, stripping a leading `@` or `+` sigil
    /// into the channel mode.
    #[must_use]
    pub fn new<S: Into<String>>(nick: S) -> User {
        let raw = nick.into();
        let (mode, nick) = if let Some(rest) = raw.strip_prefix('@') {
            (ChanMode::Operator, rest.to_string())
        } else if let Some(rest) = raw.strip_prefix('+') {
            (ChanMode::Voice, rest.to_string())
        } else {
            (ChanMode::None, raw)
        };

        User {
            name: nick.clone(),
            nick,
            mode,
        }
    }

    /// Returns a copy of this user carrying a new nickname, keeping name and mode.
    #[must_use]
    pub fn with_nick<S: Into<String>>(&self, nick: S) -> User {
        User {
            nick: nick.into(),
            name: self.name.clone(),
            mode: self.mode,
        }
    }

    /// Returns the user's nickname.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Returns the user's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the user's channel mode.
    #[must_use]
    pub fn mode(&self) -> ChanMode {
        self.mode
    }

    /// Returns the nickname qualified with its mode sigil, e.g. `@carol`.
    #[must_use]
    pub fn full_nick(&self) -> String {
        format!("{}{}", self.mode.sigil(), self.nick)
    }
}

/// Details about the channel the client is currently in.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    // The channel name
    name: String,
    // The channel's current topic
    topic: String,
    // A list of atomically reference-counted users present in this channel
    users: Vec<Arc<User>>,
}

impl Channel {
    #[must_use]
    pub fn new<S: Into<String>>(name: S) -> Channel {
        Channel {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Returns the name of the channel.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the topic of the channel.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Replaces the topic of the channel.
    pub fn set_topic<S: Into<String>>(&mut self, topic: S) {
        self.topic = topic.into();
    }

    /// Returns the list of users currently known to be present in this channel.
    pub fn users(&self) -> &[Arc<User>] {
        &self.users
    }

    /// Returns the first user matching the given nickname, if present.
    #[must_use]
    pub fn user(&self, nick: &str) -> Option<&Arc<User>> {
        self.users.iter().find(|user| user.nick() == nick)
    }

    /// Adds a user unless one with the same nickname is already present. Returns whether
    /// the roster changed.
    pub fn add_user(&mut self, user: Arc<User>) -> bool {
        if self.user(user.nick()).is_some() {
            return false;
        }

        self.users.push(user);

        true
    }

    /// Removes and returns the user matching the given nickname, if present.
    pub fn remove_user(&mut self, nick: &str) -> Option<Arc<User>> {
        let index = self.users.iter().position(|user| user.nick() == nick)?;

        Some(self.users.remove(index))
    }

    /// Renames the user matching `nick` by replacing its entry, and returns the new entry.
    pub fn rename_user(&mut self, nick: &str, new_nick: &str) -> Option<Arc<User>> {
        let index = self.users.iter().position(|user| user.nick() == nick)?;
        let renamed = Arc::new(self.users[index].with_nick(new_nick));

        self.users[index] = Arc::clone(&renamed);

        Some(renamed)
    }

    /// Replaces the whole roster at once.
    pub fn set_users(&mut self, users: Vec<Arc<User>>) {
        self.users = users;
    }
}

/// What a history entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A chat message sent to the channel.
    Plain,
    /// A message addressed directly to the local user.
    Private,
    /// A presence or status change by a user.
    Action,
    /// Client status text.
    System,
    /// A raw protocol line, visible only while debugging.
    Debug,
}

/// An immutable entry in the message history.
#[derive(Debug, Clone)]
pub struct Message {
    // The message body
    text: String,
    // The originating user, if any
    author: Option<Arc<User>>,
    // The author's sigil-qualified nickname, captured when the message was created
    nick: String,
    // Local time of capture
    timestamp: OffsetDateTime,
    // How the entry renders
    kind: MessageKind,
}

impl Message {
    /// Creates a message without an author.
    #[must_use]
    pub fn new<S: Into<String>>(kind: MessageKind, text: S) -> Message {
        Message {
            text: text.into(),
            author: None,
            nick: String::new(),
            timestamp: now(),
            kind,
        }
    }

    /// Creates a message authored by the given user, capturing the user's current
    /// sigil-qualified nickname.
    #[must_use]
    pub fn from_user<S: Into<String>>(kind: MessageKind, author: &Arc<User>, text: S) -> Message {
        Message {
            text: text.into(),
            nick: author.full_nick(),
            author: Some(Arc::clone(author)),
            timestamp: now(),
            kind,
        }
    }

    /// Returns the message body.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the user this message originated from, if any.
    pub fn author(&self) -> Option<&Arc<User>> {
        self.author.as_ref()
    }

    /// Returns the author's nickname as captured when the message was created.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Returns what kind of history entry this is.
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the local time the message was captured at.
    #[must_use]
    pub fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02} ",
            self.timestamp.hour(),
            self.timestamp.minute()
        )?;

        match self.kind {
            MessageKind::Plain => write!(f, "<{}> {}", self.nick, self.text),
            MessageKind::Private => write!(f, "<= {}: {}", self.nick, self.text),
            MessageKind::Action => write!(f, "* {} {}", self.nick, self.text),
            MessageKind::System => write!(f, "*** {}", self.text),
            MessageKind::Debug => write!(f, "==debug==  {}", self.text),
        }
    }
}

/// Returns the current wall-clock time, in local time when the offset is obtainable.
fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// The whole session state. Owned and mutated by the session loop only, which is what
/// lets the entities above go without locks.
#[derive(Debug)]
pub struct Session {
    // The local user as currently registered with the server
    local: Arc<User>,
    // The channel the client is in, if any
    channel: Option<Channel>,
    // The message history, oldest first
    history: Vec<Message>,
    // Buffered nickname tokens of an in-progress names reply, None while closed
    names: Option<Vec<String>>,
    // Whether raw protocol lines are surfaced in the history
    debug: bool,
}

impl Session {
    /// Creates a new session for the given local nickname.
    #[must_use]
    pub fn new<S: Into<String>>(nick: S) -> Session {
        Session {
            local: Arc::new(User::new(nick)),
            channel: None,
            history: Vec::new(),
            names: None,
            debug: false,
        }
    }

    /// Returns the local user.
    pub fn local(&self) -> &Arc<User> {
        &self.local
    }

    /// Returns the local user's nickname.
    pub fn nick(&self) -> &str {
        self.local.nick()
    }

    /// Replaces the local user with a renamed copy.
    pub fn set_nick(&mut self, nick: &str) {
        self.local = Arc::new(self.local.with_nick(nick));
    }

    /// Returns the active channel, if any.
    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    /// Returns the active channel mutably, if any.
    pub fn channel_mut(&mut self) -> Option<&mut Channel> {
        self.channel.as_mut()
    }

    /// Replaces the active channel.
    pub fn set_channel(&mut self, channel: Option<Channel>) {
        self.channel = channel;
    }

    /// Returns the message history, oldest first.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Appends a message to the history.
    pub fn push_message(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Clears the message history.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Whether raw protocol lines are surfaced in the history.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Sets debug visibility.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Toggles debug visibility, returning the new value.
    pub fn toggle_debug(&mut self) -> bool {
        self.debug = !self.debug;
        self.debug
    }

    /// Returns the roster entry for `nick` when present, or a transient user otherwise.
    ///
    /// Server notices and the like carry an author this way without ever touching the
    /// roster.
    #[must_use]
    pub fn user_for(&self, nick: &str) -> Arc<User> {
        self.channel
            .as_ref()
            .and_then(|channel| channel.user(nick))
            .cloned()
            .unwrap_or_else(|| Arc::new(User::new(nick)))
    }

    /// Opens the names stream unless it is already open.
    pub fn open_names(&mut self) {
        if self.names.is_none() {
            self.names = Some(Vec::new());
        }
    }

    /// Appends nickname tokens to an open names stream. A closed stream swallows nothing,
    /// the tokens are dropped.
    pub fn push_names<I>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Some(names) = self.names.as_mut() {
            names.extend(tokens);
        }
    }

    /// Closes the names stream and returns the buffered tokens if the stream was open.
    pub fn take_names(&mut self) -> Option<Vec<String>> {
        self.names.take()
    }

    /// Whether a names stream is currently open.
    #[must_use]
    pub fn names_open(&self) -> bool {
        self.names.is_some()
    }
}
