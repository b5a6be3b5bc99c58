// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Subscriber installation.

use crate::config::{LogConfig, LogError, LogFormat, LogOutput};
use tracing::Subscriber;
use tracing_subscriber::fmt::{self, format::FmtSpan, writer::BoxMakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Initialize tracing with a format and an optional level.
///
/// `level` takes any `EnvFilter` directive; `None` defers to `RUST_LOG`.
///
/// ```ignore
/// lfsync_observability::init_tracing(LogFormat::Pretty, Some("debug"))?;
/// ```
pub fn init_tracing(format: LogFormat, level: Option<&str>) -> Result<(), LogError> {
    let mut config = LogConfig::new().with_format(format);
    if let Some(level) = level {
        config = config.with_level(level);
    }
    init_tracing_with_config(config)
}

/// Initialize tracing from a full [`LogConfig`].
///
/// Fails with [`LogError::AlreadyInitialized`] when a global subscriber is
/// already installed (common in tests).
pub fn init_tracing_with_config(config: LogConfig) -> Result<(), LogError> {
    let filter = build_env_filter(&config)?;
    let layer = format_layer::<Registry>(&config).with_filter(filter);

    Registry::default()
        .with(layer)
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)
}

fn make_writer(output: LogOutput) -> BoxMakeWriter {
    match output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
    }
}

fn format_layer<S>(config: &LogConfig) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let base = fmt::layer()
        .with_writer(make_writer(config.output))
        .with_target(config.include_targets);
    let color = config.use_color;

    match (config.format, config.use_timestamps) {
        (LogFormat::Pretty, true) => base.pretty().with_ansi(color).boxed(),
        (LogFormat::Pretty, false) => base.pretty().without_time().with_ansi(color).boxed(),
        (LogFormat::Compact, true) => base
            .compact()
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(color)
            .boxed(),
        (LogFormat::Compact, false) => base
            .compact()
            .without_time()
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(color)
            .boxed(),
        (LogFormat::Json, true) => base.json().with_ansi(false).boxed(),
        (LogFormat::Json, false) => base.json().without_time().with_ansi(false).boxed(),
    }
}

fn build_env_filter(config: &LogConfig) -> Result<EnvFilter, LogError> {
    let filter = config.get_effective_level();

    EnvFilter::try_new(&filter).map_err(|e| LogError::InvalidFilter {
        filter,
        reason: e.to_string(),
    })
}
