//! Logger installation. The rest of the crate logs through the `log` facade.

mod init;

pub use init::{LoggingConfig, init_logging};
