use prism_engine::core::ViewerConfig;
use prism_engine::logging::{LoggingConfig, init_logging};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let stats = prism_engine::core::run(ViewerConfig::cube())?;
    if let Some(mean) = stats.mean_frame_seconds() {
        log::debug!("mean frame time {:.2}ms", mean * 1000.0);
    }
    Ok(())
}
