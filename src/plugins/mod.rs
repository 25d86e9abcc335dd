//! Built-in plugins registered by the `run` command.

pub mod echo;
pub mod ping;

pub use echo::EchoPlugin;
pub use ping::PingPlugin;
