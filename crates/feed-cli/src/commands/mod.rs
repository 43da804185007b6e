//! CLI subcommand implementations.

pub mod publish;
pub mod subscribe;
pub mod util;
