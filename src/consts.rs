/// The default server to connect to when none is configured.
pub const DEFAULT_HOST: &str = "irc.libera.chat";

/// The default port to connect to when none is configured.
pub const DEFAULT_PORT: u16 = 6667;

/// The default nickname to register with.
pub const DEFAULT_NICK: &str = "natter";
