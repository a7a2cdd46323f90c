use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use pgvault_store::StoreError;

/// Classify an S3 SDK error into a [`StoreError`].
///
/// The HTTP status of the raw response wins when present (403 and 404 get
/// their own variants); otherwise the message is inspected.
pub(crate) fn classify_sdk_error<E>(target: &str, err: &SdkError<E>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(err).to_string();
    if matches!(err, SdkError::TimeoutError(_)) {
        return StoreError::Timeout(message);
    }
    if let Some(response) = err.raw_response() {
        return StoreError::from_status(response.status().as_u16(), target, message);
    }
    classify_message(&message)
}

fn classify_message(message: &str) -> StoreError {
    let lower = message.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        StoreError::Timeout(message.to_owned())
    } else if lower.contains("accessdenied") || lower.contains("access denied") {
        StoreError::AccessDenied(message.to_owned())
    } else {
        StoreError::backend(message)
    }
}
