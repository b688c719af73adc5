use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Maps a level name to an `EnvFilter` directive. Accepts the usual
/// uppercase spellings (`WARNING`, `CRITICAL`) as well as full directives
/// such as `scholarsense=debug`.
pub fn filter_directive(log_level: &str) -> String {
    match log_level.trim().to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARN" | "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        "TRACE" => "trace".to_string(),
        "OFF" => "off".to_string(),
        _ => log_level.trim().to_string(),
    }
}

/// Installs the global subscriber. Logs go to stderr so report output on
/// stdout can be piped.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(filter_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_are_normalised() {
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("Info"), "info");
        assert_eq!(filter_directive("critical"), "error");
        assert_eq!(filter_directive(" debug "), "debug");
    }

    #[test]
    fn directives_pass_through() {
        assert_eq!(filter_directive("scholarsense=trace"), "scholarsense=trace");
    }
}
