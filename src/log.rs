use std::fmt::{self, Write as _};

use tracing::Level;

/// Receives leveled, structured events from the retry loop.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, message: &str, fields: &[(&str, &dyn fmt::Display)]);
}

/// Forwards events to the `tracing` dispatcher under the `failover_http` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: Level, message: &str, fields: &[(&str, &dyn fmt::Display)]) {
        let fields = render_fields(fields);
        match level {
            Level::ERROR => tracing::error!(target: "failover_http", %fields, "{message}"),
            Level::WARN => tracing::warn!(target: "failover_http", %fields, "{message}"),
            Level::INFO => tracing::info!(target: "failover_http", %fields, "{message}"),
            Level::DEBUG => tracing::debug!(target: "failover_http", %fields, "{message}"),
            _ => tracing::trace!(target: "failover_http", %fields, "{message}"),
        }
    }
}

fn render_fields(fields: &[(&str, &dyn fmt::Display)]) -> String {
    let mut out = String::new();
    for (index, (key, value)) in fields.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{key}={value}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::render_fields;

    #[test]
    fn fields_render_as_key_value_pairs() {
        let attempt = 2u32;
        let rendered = render_fields(&[("method", &"GET"), ("attempt", &attempt)]);
        assert_eq!(rendered, "method=GET attempt=2");
    }
}
