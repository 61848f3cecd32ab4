use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Stored user data is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}
