use prism_engine::core::ViewerConfig;
use prism_engine::logging::{LoggingConfig, init_logging};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let stats = prism_engine::core::run(ViewerConfig::square())?;
    log::debug!("{} frames presented", stats.presented);
    Ok(())
}
