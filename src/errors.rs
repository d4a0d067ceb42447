use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::{ActorRole, BookingStatus};

/// Validation failures of the booking domain. Surfaced to callers verbatim
/// and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("invalid booking duration: {0}")]
    InvalidDuration(String),

    #[error("guest count must be at least 1, got {0}")]
    InvalidGuestCount(i64),

    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    #[error("price overflow while computing {0}")]
    PriceOverflow(&'static str),

    #[error("add-on {addon} is not offered at location {location}")]
    UnknownAddon { addon: String, location: String },

    #[error("cannot move booking from {from} to {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("{role} is not allowed to {action}")]
    UnauthorizedActor { role: ActorRole, action: String },

    #[error("booking is {status} and accepts no further status changes")]
    TerminalState { status: BookingStatus },

    #[error("refund amount must be positive, got {0}")]
    InvalidRefundAmount(i64),

    #[error("refund of {requested} exceeds the remaining refundable balance of {remaining}")]
    RefundExceedsBalance { requested: i64, remaining: i64 },

    #[error("refund reason must not be empty")]
    EmptyReason,

    #[error("cannot {operation} a booking that is {status}")]
    InvalidBookingState {
        status: BookingStatus,
        operation: &'static str,
    },

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("location not found: {0}")]
    LocationNotFound(String),
}

impl BookingError {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::InvalidDuration(_) => "invalid_duration",
            BookingError::InvalidGuestCount(_) => "invalid_guest_count",
            BookingError::NegativeAmount { .. } => "negative_amount",
            BookingError::PriceOverflow(_) => "price_overflow",
            BookingError::UnknownAddon { .. } => "unknown_addon",
            BookingError::IllegalTransition { .. } => "illegal_transition",
            BookingError::UnauthorizedActor { .. } => "unauthorized_actor",
            BookingError::TerminalState { .. } => "terminal_state",
            BookingError::InvalidRefundAmount(_) => "invalid_refund_amount",
            BookingError::RefundExceedsBalance { .. } => "refund_exceeds_balance",
            BookingError::EmptyReason => "empty_reason",
            BookingError::InvalidBookingState { .. } => "invalid_booking_state",
            BookingError::BookingNotFound(_) => "booking_not_found",
            BookingError::LocationNotFound(_) => "location_not_found",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::InvalidDuration(_)
            | BookingError::InvalidGuestCount(_)
            | BookingError::NegativeAmount { .. }
            | BookingError::PriceOverflow(_)
            | BookingError::InvalidRefundAmount(_)
            | BookingError::EmptyReason => StatusCode::BAD_REQUEST,
            BookingError::UnknownAddon { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::UnauthorizedActor { .. } => StatusCode::FORBIDDEN,
            BookingError::IllegalTransition { .. }
            | BookingError::TerminalState { .. }
            | BookingError::InvalidBookingState { .. } => StatusCode::CONFLICT,
            BookingError::RefundExceedsBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::BookingNotFound(_) | BookingError::LocationNotFound(_) => {
                StatusCode::NOT_FOUND
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("booking {0} was modified concurrently; reload and retry")]
    Conflict(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Booking(e) => e.kind(),
            AppError::Database(_) => "database",
            AppError::Conflict(_) => "conflict",
            AppError::Unauthorized => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Booking(e) => e.status_code(),
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.kind(), "message": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
