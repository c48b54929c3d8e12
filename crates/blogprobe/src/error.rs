#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Generic {0}")]
    Generic(String),

    /// The probe evidence never appeared and no probe treated the silence as
    /// meaningful.
    #[error("evidence did not appear on the homepage before the timeout")]
    Timeout,

    /// The post published but its content markers are gone entirely; an
    /// infrastructure failure, not a feature-negative.
    #[error("expected content markers never appeared in the published page")]
    MissingEvidence,

    #[error("blog API fault {code}: {message}")]
    Fault { code: i32, message: String },

    #[error("Network error: {0}")]
    Network(String),
}
