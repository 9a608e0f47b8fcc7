mod root;
mod run;
mod sessions;
mod health;
pub mod render;
pub mod shell;

pub use root::Cli;
