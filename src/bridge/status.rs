// ABOUTME: Injected status surface for operator feedback
// ABOUTME: An optional capability passed into the bridge, never process-global state

/// Sink for periodic operator feedback.
///
/// The bridge calls [`tick`](Self::tick) on a fixed cadence and
/// [`message`](Self::message) with the body of each forwarded message. The
/// sink is injected as `Option<Arc<dyn StatusSink>>`: absence of a display is
/// modelled by the presence flag, not by a sink that swallows setup failures.
pub trait StatusSink: Send + Sync {
    fn tick(&self, count: u64);
    fn message(&self, text: &str);
}

/// Sink that discards everything; useful in tests and headless deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn tick(&self, _count: u64) {}
    fn message(&self, _text: &str) {}
}
