//! Small helpers shared by the CLI and the session layer

pub mod text;
