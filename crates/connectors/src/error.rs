use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
  #[error("Missing configuration: set {variable}")]
  MissingConfig { variable: String },

  #[error("Request to {service} failed: {message}")]
  Http { service: &'static str, message: String },

  #[error("{service} returned {status}: {body}")]
  Status { service: &'static str, status: u16, body: String },

  #[error("Unexpected {service} response: {message}")]
  UnexpectedResponse { service: &'static str, message: String },

  #[error("Slack API error: {error}")]
  Slack { error: String },
}

impl ConnectorError {
  pub fn missing_config(variable: impl Into<String>) -> Self {
    Self::MissingConfig { variable: variable.into() }
  }

  pub fn http(service: &'static str, message: impl Into<String>) -> Self {
    Self::Http { service, message: message.into() }
  }

  pub fn status(service: &'static str, status: u16, body: impl Into<String>) -> Self {
    Self::Status { service, status, body: body.into() }
  }

  pub fn unexpected_response(service: &'static str, message: impl Into<String>) -> Self {
    Self::UnexpectedResponse { service, message: message.into() }
  }

  pub fn slack(error: impl Into<String>) -> Self {
    Self::Slack { error: error.into() }
  }
}

pub type Result<T, E = ConnectorError> = std::result::Result<T, E>;
