use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use booking_engine::{traits::GatewayClientError, BookingError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Authentication required. {0}")]
    Unauthenticated(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<BookingError> for ServerError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::InvalidOrder(_) | BookingError::Rewards(_) | BookingError::OrderNotOpen(_, _) => {
                Self::InvalidRequest(e.to_string())
            },
            BookingError::OrderNotFound(id) => Self::NoRecordFound(format!("Order {id} does not exist")),
            BookingError::Gateway(GatewayClientError::NotConfigured) => {
                error!("💻️ A payment link was requested, but the payment gateway is not configured");
                Self::GatewayError(GatewayClientError::NotConfigured.to_string())
            },
            BookingError::Gateway(e) => Self::GatewayError(e.to_string()),
            BookingError::DatabaseError(s) => {
                error!("💻️ Database error: {s}");
                Self::BackendError("A database error occurred. Please try again later.".to_string())
            },
        }
    }
}
