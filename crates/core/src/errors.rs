use thiserror::Error;

use crate::inventory::InventoryError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid field path `{0}`")]
    InvalidFieldPath(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("reasoning capability unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("comparison output could not be parsed: {0}")]
    MalformedComparison(String),
    #[error("inventory data unavailable: {0}")]
    DataUnavailable(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Domain(DomainError::Validation(message.into()))
    }
}

impl From<InventoryError> for ApplicationError {
    fn from(value: InventoryError) -> Self {
        Self::DataUnavailable(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn not_found(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::NotFound { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// Validation messages are safe to show; everything else gets a generic line.
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } | Self::NotFound { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly.".to_owned()
            }
            Self::Internal { .. } => "An unexpected internal error occurred.".to_owned(),
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            ApplicationError::Domain(DomainError::Validation(message)) => {
                Self::BadRequest { message, correlation_id: unassigned() }
            }
            ApplicationError::Domain(DomainError::InvalidFieldPath(path)) => Self::BadRequest {
                message: format!("invalid field path `{path}`"),
                correlation_id: unassigned(),
            },
            ApplicationError::CapabilityUnavailable(message)
            | ApplicationError::DataUnavailable(message)
            | ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned() }
            }
            ApplicationError::MalformedComparison(message)
            | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
