pub mod app;
pub mod cli;
pub mod credentials;
pub mod load_config;
pub mod scaffold;
pub mod upload;

pub use app::App;
pub use cli::{run, Cli, Commands};
