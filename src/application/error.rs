use std::{error::Error as StdError, iter};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{domain::error::DomainError, infra::error::InfraError};

/// Why a response failed, carried in its extensions to the access log.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Module that produced the failure.
    pub source: &'static str,
    /// Outermost error first, root cause last.
    pub chain: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let chain = iter::successors(Some(error), |&current| current.source())
            .map(ToString::to_string)
            .collect();
        Self { source, chain }
    }

    pub fn from_message(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            chain: vec![message.into()],
        }
    }

    /// The outermost message, if any.
    pub fn headline(&self) -> Option<&str> {
        self.chain.first().map(String::as_str)
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failure of the edge proxy. The visitor sees a short text body; the chain goes to the log.
#[derive(Debug)]
pub struct ProxyError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl ProxyError {
    pub fn bad_gateway(
        source: &'static str,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            public_message,
            report: ErrorReport::from_error(source, error),
        }
    }

    pub fn body_too_large(source: &'static str, error: &dyn StdError) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            public_message: "Request body too large",
            report: ErrorReport::from_error(source, error),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let Self {
            status,
            public_message,
            report,
        } = self;
        let mut response = (status, public_message).into_response();
        report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
