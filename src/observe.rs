use std::time::Duration;

/// Timing sample for one executed read or aggregation.
///
/// Advisory only: observers see timings after the result set is already
/// fixed, so nothing here can change returned data.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub collection: String,
    pub operation: &'static str,
    pub elapsed: Duration,
    pub returned: usize,
}

/// Receives one event per executed operation.
pub trait QueryObserver: Send + Sync {
    fn query_executed(&self, event: &QueryEvent);
}

/// Default observer: forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl QueryObserver for LogObserver {
    fn query_executed(&self, event: &QueryEvent) {
        log::debug!(
            "{} {} returned {} document(s) in {} ms",
            event.collection,
            event.operation,
            event.returned,
            event.elapsed.as_millis()
        );
    }
}
