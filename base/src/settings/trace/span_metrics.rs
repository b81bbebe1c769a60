use tokio::time::Instant;
use tracing::{span, Event, Level, Subscriber};
use tracing_subscriber::{layer::Context, registry::LookupSpan, Layer};

use crate::CoreMetrics;

/// A `tracing_subscriber` layer recording span lifetime and event counts into the process's
/// `CoreMetrics` registry, so `/metrics` reflects logging/tracing activity without every
/// instrumented function touching a metrics handle itself.
pub struct TimeSpanLifetime {
    duration: prometheus::CounterVec,
    counts: prometheus::IntCounterVec,
    events: prometheus::IntCounterVec,
}

impl TimeSpanLifetime {
    /// Build the layer from the process's metrics registry.
    pub fn new(metrics: &CoreMetrics) -> Self {
        Self {
            duration: metrics.span_duration_seconds(),
            counts: metrics.span_count(),
            events: metrics.span_events(),
        }
    }
}

struct SpanTiming {
    start: Instant,
}

impl<S> Layer<S> for TimeSpanLifetime
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        span.extensions_mut().insert(SpanTiming {
            start: Instant::now(),
        });
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = match *event.metadata().level() {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        self.events.with_label_values(&[level]).inc();
    }

    fn on_close(&self, id: span::Id, ctx: Context<'_, S>) {
        let now = Instant::now();
        let Some(span) = ctx.span(&id) else {
            return;
        };

        let name = span.name();
        let target = span.metadata().target();
        self.counts.with_label_values(&[name, target]).inc();

        let exts = span.extensions();
        if let Some(timing) = exts.get::<SpanTiming>() {
            self.duration
                .with_label_values(&[name, target])
                .inc_by((now - timing.start).as_secs_f64());
        }
    }
}
