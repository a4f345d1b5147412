use argh::FromArgs;
use miette::{IntoDiagnostic, WrapErr};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use natter::config::Config;
use natter::term::{Stdin, Terminal};
use natter::{transport, Error, Natter};

/// Single-channel terminal IRC client.
#[derive(Debug, FromArgs)]
struct Opts {
    /// path to the configuration file
    #[argh(option, default = "String::from(\"natter.toml\")")]
    config: String,
    /// hostname of the server to connect to
    #[argh(option)]
    host: Option<String>,
    /// port number of the server to connect to
    #[argh(option)]
    port: Option<u16>,
    /// nickname to register with
    #[argh(option)]
    nick: Option<String>,
    /// show raw protocol lines in the history
    #[argh(switch)]
    debug: bool,
}

fn try_init_tracing() -> miette::Result<()> {
    // Log to stderr, the display owns stdout
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "natter=info".into()),
        )
        .with(stderr_layer)
        .try_init()
        .into_diagnostic()
        .wrap_err("could not init registry")?;

    Ok(())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize logging
    try_init_tracing()?;

    // Parse command-line arguments
    let opts: Opts = argh::from_env();

    println!(
        "{} v{} running",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    // Load the config file and apply the command-line overrides
    let mut config = Config::load(&opts.config).map_err(Error::Config)?;

    if let Some(host) = opts.host {
        config.server.host = host;
    }

    if let Some(port) = opts.port {
        config.server.port = port;
    }

    if let Some(nick) = opts.nick {
        config.server.nick = nick;
    }

    if opts.debug {
        config.debug = true;
    }

    let (reader, writer) = transport::connect(&config.server.host, config.server.port).await?;

    let mut natter = Natter::new(config, Box::new(Terminal::new()));

    natter.run(reader, writer, Stdin::new()).await?;

    Ok(())
}
