//! Error types

use std::io;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Indicates that the configuration file or environment could not be loaded
    #[error("Could not load the configuration")]
    Config(#[from] figment::Error),
    #[error("Could not resolve the hostname")]
    HostnameResolutionFailed(#[source] io::Error),
    #[error("Could not find a host to connect to")]
    ConnectionFailed,
    #[error("Connection to the server was lost")]
    ConnectionLost,
}
