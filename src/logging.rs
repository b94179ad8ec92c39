use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for a verbosity level (`-v` count).
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "mcreep=warn",
        1 => "mcreep=info",
        _ => "mcreep=debug",
    }
}

/// Install the CLI subscriber: compact lines on stderr so stdout stays
/// reserved for per-file results and tables.
///
/// `RUST_LOG` overrides the verbosity flag. Calling this twice is harmless.
pub fn init_cli_logger(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(default_directive(0), "mcreep=warn");
        assert_eq!(default_directive(1), "mcreep=info");
        assert_eq!(default_directive(5), "mcreep=debug");
    }
}
