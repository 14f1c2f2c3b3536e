//! Mapping between engine errors and gRPC status codes.
//!
//! Internal failures leave the process with a generic message; the detail
//! only goes to the log.

use escrow_engine::EscrowError;
use tonic::{Code, Status};
use tracing::error;

/// Convert an engine error into the status returned to a caller.
pub fn to_status(err: &EscrowError) -> Status {
    match err {
        EscrowError::Validation(_) => Status::invalid_argument(err.to_string()),
        EscrowError::Unauthorized(_) => Status::unauthenticated(err.to_string()),
        EscrowError::Forbidden(_) => Status::permission_denied(err.to_string()),
        EscrowError::NotFound(_) => Status::not_found(err.to_string()),
        EscrowError::Unavailable(_) => Status::unavailable(err.to_string()),
        EscrowError::InsufficientShares { .. } | EscrowError::DistributionFailed { .. } => {
            Status::failed_precondition(err.to_string())
        }
        EscrowError::Persistence(_) | EscrowError::Ledger(_) | EscrowError::Decryption(_) | EscrowError::Unseal(_) => {
            error!(category = err.category(), error = %err, "request failed internally");
            Status::internal(format!("internal {} failure", err.category()))
        }
    }
}

/// Convert a status received from a remote peer back into an engine error.
///
/// Transport failures and deadlines become `Unavailable`, the only category
/// the distribution layer retries.
pub fn from_status(status: &Status) -> EscrowError {
    let message = status.message().to_string();
    match status.code() {
        Code::InvalidArgument => EscrowError::Validation(message),
        Code::Unauthenticated => EscrowError::Unauthorized(message),
        Code::PermissionDenied => EscrowError::Forbidden(message),
        Code::NotFound => EscrowError::NotFound(message),
        Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled => EscrowError::Unavailable(message),
        code => EscrowError::Persistence(format!("remote {code:?}: {message}")),
    }
}

/// Status mapping for ledger calls: anything not caller-caused is a ledger failure.
pub fn ledger_error(status: &Status) -> EscrowError {
    match status.code() {
        Code::InvalidArgument => EscrowError::Validation(status.message().to_string()),
        Code::Unauthenticated => EscrowError::Unauthorized(status.message().to_string()),
        code => EscrowError::Ledger(format!("{code:?}: {}", status.message())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_to_status() {
        let status = to_status(&EscrowError::Forbidden("proposal not executed".into()));
        assert_eq!(status.code(), Code::PermissionDenied);

        let status = to_status(&EscrowError::InsufficientShares { have: 2, need: 3 });
        assert_eq!(status.code(), Code::FailedPrecondition);
        assert!(status.message().contains("have 2, need 3"));
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let status = to_status(&EscrowError::Persistence("/var/lib/holder/shares.json: disk full".into()));
        assert_eq!(status.code(), Code::Internal);
        assert!(!status.message().contains("/var/lib"));
    }

    #[test]
    fn test_status_round_trip_keeps_category() {
        for err in [
            EscrowError::Validation("missing fields".into()),
            EscrowError::Unauthorized("bad signature".into()),
            EscrowError::Forbidden("not a member".into()),
            EscrowError::NotFound("no share".into()),
            EscrowError::Unavailable("connection refused".into()),
        ] {
            assert_eq!(from_status(&to_status(&err)).category(), err.category());
        }
    }

    #[test]
    fn test_deadline_is_retryable() {
        assert!(from_status(&Status::deadline_exceeded("slow")).is_retryable());
        assert!(!from_status(&Status::internal("boom")).is_retryable());
    }

    #[test]
    fn test_ledger_error_mapping() {
        assert_eq!(ledger_error(&Status::unavailable("down")).category(), "ledger");
        assert_eq!(ledger_error(&Status::unauthenticated("sig")).category(), "unauthorized");
    }
}
