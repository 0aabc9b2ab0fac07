//! Error surfacing.

use modspec_core::{ErrorReport, ModuleError};
use tracing::error;

/// Log a fatal error with full detail and build what the user is shown.
///
/// The returned report carries the short classification message; the
/// technical detail only goes to the diagnostic log.
pub fn surface_error(operation: &str, err: &ModuleError) -> ErrorReport {
    let report = err.report();
    error!(
        kind = ?report.kind,
        retryable = report.retryable,
        "{} failed: {}",
        operation,
        report.detail
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use modspec_core::ErrorKind;

    #[test]
    fn test_surface_error_builds_report() {
        let err = ModuleError::Configuration("feature base path is not set".into());
        let report = surface_error("generate modules", &err);
        assert_eq!(report.kind, ErrorKind::Configuration);
        assert_eq!(report.message, ErrorKind::Configuration.user_message());
        assert!(!report.retryable);
    }
}
