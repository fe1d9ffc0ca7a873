use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for the kestrel-dispatch service
#[derive(Debug)]
pub enum KestrelError {
    // HTTP and API errors
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    InternalServer(String),

    // Business logic errors
    RideNotFound(String),
    DriverNotFound(String),
    UserNotFound(String),
    RideNotAvailable,
    DriverNotAvailable,
    InvalidRideStatus { current: String, action: String },
    AlreadyRated,
    NotRideParticipant,

    // Collaborator failures
    RoutingFailure(String),
    PaymentFailure(String),

    // Network and HTTP client errors
    NetworkTimeout,
    NetworkConnection(String),
    HttpClient(String),

    // Serialization and parsing errors
    JsonParsing(String),
    JsonSerialization(String),
    InvalidFormat(String),

    // Validation errors
    ValidationFailed(Vec<ValidationError>),
    MissingRequiredField(String),
    InvalidFieldValue { field: String, reason: String },

    // Configuration errors
    ConfigurationError(String),
    MissingEnvironmentVariable(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl fmt::Display for KestrelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KestrelError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            KestrelError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            KestrelError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            KestrelError::NotFound(msg) => write!(f, "Not found: {}", msg),
            KestrelError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            KestrelError::InternalServer(msg) => write!(f, "Internal server error: {}", msg),

            KestrelError::RideNotFound(id) => write!(f, "Ride not found: {}", id),
            KestrelError::DriverNotFound(id) => write!(f, "Driver not found: {}", id),
            KestrelError::UserNotFound(id) => write!(f, "User not found: {}", id),
            KestrelError::RideNotAvailable => write!(f, "Ride no longer available"),
            KestrelError::DriverNotAvailable => write!(f, "Driver is not available"),
            KestrelError::InvalidRideStatus { current, action } => {
                write!(f, "Cannot {} a ride in status '{}'", action, current)
            }
            KestrelError::AlreadyRated => write!(f, "Ride already rated by this party"),
            KestrelError::NotRideParticipant => {
                write!(f, "Caller is not a participant of this ride")
            }

            KestrelError::RoutingFailure(msg) => write!(f, "Routing failure: {}", msg),
            KestrelError::PaymentFailure(msg) => write!(f, "Payment failure: {}", msg),

            KestrelError::NetworkTimeout => write!(f, "Network request timed out"),
            KestrelError::NetworkConnection(msg) => write!(f, "Network connection error: {}", msg),
            KestrelError::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),

            KestrelError::JsonParsing(msg) => write!(f, "JSON parsing error: {}", msg),
            KestrelError::JsonSerialization(msg) => write!(f, "JSON serialization error: {}", msg),
            KestrelError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),

            KestrelError::ValidationFailed(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            KestrelError::MissingRequiredField(field) => {
                write!(f, "Missing required field: {}", field)
            }
            KestrelError::InvalidFieldValue { field, reason } => {
                write!(f, "Invalid value for field '{}': {}", field, reason)
            }

            KestrelError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            KestrelError::MissingEnvironmentVariable(var) => {
                write!(f, "Missing environment variable: {}", var)
            }
        }
    }
}

impl std::error::Error for KestrelError {}

impl IntoResponse for KestrelError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            KestrelError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            KestrelError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg, None)
            }
            KestrelError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            KestrelError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            KestrelError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),

            KestrelError::ValidationFailed(errors) => {
                let details = serde_json::to_value(&errors).ok();
                (
                    StatusCode::BAD_REQUEST,
                    "validation_failed",
                    "Validation errors occurred".to_string(),
                    details,
                )
            }
            KestrelError::MissingRequiredField(field) => (
                StatusCode::BAD_REQUEST,
                "missing_field",
                format!("Missing required field: {}", field),
                None,
            ),
            KestrelError::InvalidFieldValue { field, reason } => (
                StatusCode::BAD_REQUEST,
                "invalid_field",
                format!("Invalid value for {}: {}", field, reason),
                None,
            ),

            KestrelError::RideNotFound(id) => (
                StatusCode::NOT_FOUND,
                "ride_not_found",
                format!("Ride not found: {}", id),
                None,
            ),
            KestrelError::DriverNotFound(id) => (
                StatusCode::NOT_FOUND,
                "driver_not_found",
                format!("Driver not found: {}", id),
                None,
            ),
            KestrelError::UserNotFound(id) => (
                StatusCode::NOT_FOUND,
                "user_not_found",
                format!("User not found: {}", id),
                None,
            ),

            KestrelError::RideNotAvailable => (
                StatusCode::CONFLICT,
                "ride_not_available",
                "Ride no longer available".to_string(),
                None,
            ),
            KestrelError::DriverNotAvailable => (
                StatusCode::CONFLICT,
                "driver_not_available",
                "Driver is not available".to_string(),
                None,
            ),
            KestrelError::InvalidRideStatus { current, action } => (
                StatusCode::CONFLICT,
                "invalid_ride_status",
                format!("Cannot {} a ride in status '{}'", action, current),
                None,
            ),
            KestrelError::AlreadyRated => (
                StatusCode::CONFLICT,
                "already_rated",
                "Ride already rated by this party".to_string(),
                None,
            ),
            KestrelError::NotRideParticipant => (
                StatusCode::FORBIDDEN,
                "not_ride_participant",
                "Caller is not a participant of this ride".to_string(),
                None,
            ),

            KestrelError::RoutingFailure(msg) => (
                StatusCode::BAD_GATEWAY,
                "routing_failure",
                format!("Routing failure: {}", msg),
                None,
            ),

            // All other errors are treated as internal server errors
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                self.to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            success: false,
            error: error_type.to_string(),
            message,
            details,
        };

        (status, axum::Json(error_response)).into_response()
    }
}

// Convenience type alias for Results
pub type KestrelResult<T> = Result<T, KestrelError>;

// Conversion implementations for common error types
impl From<reqwest::Error> for KestrelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KestrelError::NetworkTimeout
        } else if err.is_connect() {
            KestrelError::NetworkConnection(err.to_string())
        } else {
            KestrelError::HttpClient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for KestrelError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() {
            KestrelError::JsonParsing(err.to_string())
        } else {
            KestrelError::JsonSerialization(err.to_string())
        }
    }
}

impl From<chrono::ParseError> for KestrelError {
    fn from(err: chrono::ParseError) -> Self {
        KestrelError::InvalidFormat(format!("Invalid date/time format: {}", err))
    }
}

// Helper functions for creating common errors
impl KestrelError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        KestrelError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        KestrelError::Forbidden(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        KestrelError::NotFound(resource.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        KestrelError::InternalServer(msg.into())
    }

    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        KestrelError::ValidationFailed(vec![ValidationError {
            field: field.into(),
            message: message.into(),
        }])
    }

    pub fn invalid_status(current: impl fmt::Debug, action: impl Into<String>) -> Self {
        KestrelError::InvalidRideStatus {
            current: format!("{:?}", current),
            action: action.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = KestrelError::RideNotFound("rid-123".to_string());
        assert_eq!(error.to_string(), "Ride not found: rid-123");

        let error = KestrelError::RideNotAvailable;
        assert_eq!(error.to_string(), "Ride no longer available");
    }

    #[test]
    fn test_validation_error() {
        let error = KestrelError::validation_error("passengers", "must be at least 1");
        match error {
            KestrelError::ValidationFailed(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "passengers");
                assert_eq!(errors[0].message, "must be at least 1");
            }
            _ => panic!("Expected ValidationFailed error"),
        }
    }

    #[test]
    fn test_helper_functions() {
        assert!(matches!(
            KestrelError::bad_request("test"),
            KestrelError::BadRequest(_)
        ));
        assert!(matches!(
            KestrelError::forbidden("test"),
            KestrelError::Forbidden(_)
        ));
        assert!(matches!(
            KestrelError::not_found("test"),
            KestrelError::NotFound(_)
        ));
        assert!(matches!(
            KestrelError::internal_error("test"),
            KestrelError::InternalServer(_)
        ));
    }
}
