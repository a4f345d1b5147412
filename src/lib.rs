pub mod command;
pub mod config;
pub mod consts;
mod error;
pub mod handler;
mod natter;
pub mod proto;
pub mod state;
pub mod term;
pub mod transport;

pub use config::Config;
pub use error::Error;
pub use natter::{Event, Natter};
pub use state::Session;
