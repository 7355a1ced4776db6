/// Infrastructure failures surfaced by the record store.
///
/// These are distinct from domain errors: the core never retries them and
/// callers decide their own retry policy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store connection failed: {0}")]
    Connection(String),

    #[error("record store constraint violated: {0}")]
    Constraint(String),

    #[error("record store query failed: {0}")]
    Query(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
