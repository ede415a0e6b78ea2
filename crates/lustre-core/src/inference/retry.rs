//! Retry classification and backoff for transient inference failures.

use crate::error::PipelineError;
use std::time::Duration;

/// Whether a failed inference call is worth repeating.
///
/// Retryable: timeouts, rate limits (429), server errors (5xx), and
/// transport failures without a status. Client errors and malformed
/// responses are not.
pub fn is_retryable(error: &PipelineError) -> bool {
    match error {
        PipelineError::Timeout { .. } => true,
        PipelineError::Inference {
            status_code,
            message,
            ..
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            message.contains("timed out") || message.contains("connect")
        }
        _ => false,
    }
}

/// `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}
