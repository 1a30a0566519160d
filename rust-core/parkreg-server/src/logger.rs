use parkreg_core::config::{LogFormat, LogSection};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
fn default_filter(section: &LogSection, verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("parkreg_core=debug,parkreg_server=debug,info")
    } else {
        EnvFilter::try_new(&section.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber; `RUST_LOG` wins over the config file
pub fn init(section: &LogSection, verbose: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(section, verbose));

    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let registry = tracing_subscriber::registry().with(filter);
    let result = match section.format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
    };
    if let Err(e) = result {
        eprintln!("logger already initialised: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        let filter = default_filter(&LogSection::default(), true);
        assert!(filter.to_string().contains("parkreg_core=debug"));
    }

    #[test]
    fn test_bad_level_falls_back() {
        let section = LogSection {
            level: "parkreg_core=loud".to_string(),
            ..LogSection::default()
        };
        assert_eq!(default_filter(&section, false).to_string(), "info");
    }
}
