//! Error reporting sink.

use std::sync::Arc;

use tracing::{error, warn};

use crate::error::GatewayError;

/// Receives every non-fatal failure of the gateway.
///
/// Reporting never fails and never blocks the listener for long;
/// implementations that forward errors elsewhere should queue them.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &GatewayError);
}

/// A shared reporter trait object.
pub type SharedReporter = Arc<dyn ErrorReporter>;

/// Logs reported errors through `tracing`.
///
/// Handler and delivery failures are logged at `error`, enrichment
/// sub-failures and protocol violations at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &GatewayError) {
        match err {
            GatewayError::HandlerExecutionFailed { .. } | GatewayError::DeliveryFailed { .. } => {
                error!(kind = err.kind(), error = %err, "Gateway error");
            }
            _ => {
                warn!(kind = err.kind(), error = %err, "Gateway error");
            }
        }
    }
}

impl<F> ErrorReporter for F
where
    F: Fn(&GatewayError) + Send + Sync,
{
    fn report(&self, error: &GatewayError) {
        self(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_reporter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter: SharedReporter = Arc::new(move |e: &GatewayError| {
            sink.lock().unwrap().push(e.kind());
        });

        reporter.report(&GatewayError::RedirectLoopDetected { update_id: 4 });
        TracingReporter.report(&GatewayError::TransportStreamClosed);

        assert_eq!(*seen.lock().unwrap(), vec!["redirect_loop_detected"]);
    }
}
