//! Error taxonomy for the stream session controller (C6).
//!
//! Every variant here is a *fatal* condition — one the
//! controller cannot paper over locally and must surface as
//! `error:internal_error` before closing. Everything recoverable (a failed
//! validation, a timed-out tool, a missing result) is handled inline and
//! never reaches this type.

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("provider request failed: {0}")]
    Provider(#[from] sentinel_provider::ProviderError),

    #[error("artifacts sink error: {0}")]
    Artifacts(#[from] sentinel_artifacts::ArtifactsError),
}
