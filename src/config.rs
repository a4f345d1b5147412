use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::consts;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Show raw protocol lines in the message history.
    #[serde(default)]
    pub debug: bool,
    /// Server connection configuration.
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// The hostname of the server to connect to.
    #[serde(default = "default_host")]
    pub host: String,
    /// The port number of the server to connect to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// The client's nickname.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// The client's username.
    pub username: Option<String>,
    /// The client's real name.
    pub realname: Option<String>,
}

impl Config {
    /// Loads the configuration from the given TOML file, letting `NATTER_`-prefixed
    /// environment variables override it. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] when the file or the environment carry values that do
    /// not fit the configuration shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Config, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("NATTER_").split("__"))
            .extract()
    }
}

impl ServerConfig {
    /// Returns the username to register with, the nickname when none is configured.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nick)
    }

    /// Returns the real name to register with, the username when none is configured.
    #[must_use]
    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or_else(|| self.username())
    }
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig {
            host: default_host(),
            port: default_port(),
            nick: default_nick(),
            username: None,
            realname: None,
        }
    }
}

#[must_use]
pub fn default_host() -> String {
    consts::DEFAULT_HOST.to_string()
}

#[must_use]
pub const fn default_port() -> u16 {
    consts::DEFAULT_PORT
}

#[must_use]
pub fn default_nick() -> String {
    consts::DEFAULT_NICK.to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn it_should_read_the_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "natter.toml",
                r#"
                debug = true

                [server]
                host = "irc.example.org"
                port = 6697
                nick = "crab"
                "#,
            )?;

            let config = Config::load("natter.toml")?;

            assert!(config.debug);
            assert_eq!(config.server.host, "irc.example.org");
            assert_eq!(config.server.port, 6697);
            assert_eq!(config.server.nick, "crab");

            Ok(())
        });
    }

    #[test]
    fn environment_variables_override_the_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "natter.toml",
                r#"
                [server]
                nick = "crab"
                "#,
            )?;
            jail.set_env("NATTER_SERVER__NICK", "ferris");

            let config = Config::load("natter.toml")?;

            assert_eq!(config.server.nick, "ferris");

            Ok(())
        });
    }

    #[test]
    fn a_missing_file_falls_back_to_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load("natter.toml")?;

            assert!(!config.debug);
            assert_eq!(config.server.host, consts::DEFAULT_HOST);
            assert_eq!(config.server.port, consts::DEFAULT_PORT);
            assert_eq!(config.server.nick, consts::DEFAULT_NICK);

            Ok(())
        });
    }

    #[test]
    fn username_and_realname_fall_back_in_order() {
        let mut server = ServerConfig::default();

        assert_eq!(server.username(), server.nick);
        assert_eq!(server.realname(), server.nick);

        server.username = Some("u".to_string());

        assert_eq!(server.username(), "u");
        assert_eq!(server.realname(), "u");

        server.realname = Some("Bob".to_string());

        assert_eq!(server.realname(), "Bob");
    }
}
