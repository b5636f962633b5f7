//! Logging for workflow runs.
//!
//! Informational events are printed as plain lines. Warnings and errors are
//! printed as `::warning::` and `::error::` workflow commands instead, so the
//! runner turns them into annotations on the run.

use std::fmt::{self, Write as _};
use std::io::{self, Write as _};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt as _};
use tracing_subscriber::util::{SubscriberInitExt as _, TryInitError};
use tracing_subscriber::Layer;

/// Install the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(io::stdout)
                .with_filter(filter_fn(|metadata| *metadata.level() > Level::WARN)),
        )
        .with(WorkflowCommands::stdout())
        .try_init()
}

/// A layer which prints warnings and errors as workflow commands.
#[derive(Debug)]
pub struct WorkflowCommands<W = fn() -> io::Stdout> {
    make_writer: W,
}

impl WorkflowCommands {
    /// Print commands to standard output, where the runner looks for them.
    pub fn stdout() -> Self {
        Self {
            make_writer: io::stdout,
        }
    }
}

impl<W> WorkflowCommands<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    /// Print commands to a different writer.
    pub fn with_writer(make_writer: W) -> Self {
        Self { make_writer }
    }
}

impl<S, W> Layer<S> for WorkflowCommands<W>
where
    S: Subscriber,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        let command = if level == Level::ERROR {
            "error"
        } else if level == Level::WARN {
            "warning"
        } else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let line = format!("::{command}::{}\n", escape_data(&visitor.finish()));
        let mut writer = self.make_writer.make_writer();

        // Nowhere left to report a failed log write.
        let _ = writer.write_all(line.as_bytes());
    }
}

#[derive(Debug, Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn field(&mut self, field: &Field, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", field.name(), value);
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.field(field, format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.field(field, format_args!("{value:?}"));
        }
    }
}

/// Escape a workflow command message so it stays on one line.
fn escape_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
