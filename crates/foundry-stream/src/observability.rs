use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

fn parse_bool_env(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn observability_enabled() -> bool {
    std::env::var("FOUNDRY_OBSERVABILITY_ENABLED")
        .ok()
        .map(|value| parse_bool_env(&value).unwrap_or(true))
        .unwrap_or(true)
}

fn resolve_env_filter() -> tracing_subscriber::EnvFilter {
    if let Ok(level) = std::env::var("FOUNDRY_LOG_LEVEL")
        && let Ok(filter) = tracing_subscriber::EnvFilter::try_new(level)
    {
        return filter;
    }
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Span wrapping one stream's read loop; every event inside it carries `stream_id`.
pub fn stream_span(stream_id: uuid::Uuid) -> tracing::Span {
    tracing::info_span!("payload_stream", stream_id = %stream_id)
}

/// Installs the global tracing subscriber once per process.
///
/// Environment variables:
/// - `FOUNDRY_OBSERVABILITY_ENABLED`: optional enable/disable flag (default enabled).
/// - `FOUNDRY_LOG_LEVEL`: optional level/filter override (`info`, `foundry_stream=debug`, ...).
/// - `FOUNDRY_JSON_LOG_PATH`: optional log file path. If set, logs are JSONL in that file;
///   otherwise a compact console format goes to stderr.
/// - `RUST_LOG`: fallback filter.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !observability_enabled() {
            return;
        }

        let env_filter = resolve_env_filter();
        if let Ok(path_raw) = std::env::var("FOUNDRY_JSON_LOG_PATH") {
            let path = std::path::PathBuf::from(path_raw);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                let _ = std::fs::create_dir_all(parent);
            }
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("foundry-stream.logs.jsonl");
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("log buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn bool_env_values_parse() {
        assert_eq!(parse_bool_env(" Off "), Some(false));
        assert_eq!(parse_bool_env("enabled"), Some(true));
        assert_eq!(parse_bool_env("maybe"), None);
    }

    #[test]
    fn init_is_idempotent() {
        init_observability();
        init_observability();
        tracing::debug!("observability initialized twice without panicking");
    }

    #[test]
    fn events_inside_stream_span_carry_stream_id() {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_current_span(true)
            .with_writer(move || writer.clone())
            .finish();
        let stream_id = uuid::Uuid::new_v4();

        tracing::subscriber::with_default(subscriber, || {
            let _entered = stream_span(stream_id).entered();
            tracing::info!("frame decoded");
        });

        let logged = String::from_utf8(buf.0.lock().expect("log buffer").clone()).expect("utf8");
        assert!(logged.contains("payload_stream"));
        assert!(logged.contains(&stream_id.to_string()));
    }
}
