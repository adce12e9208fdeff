use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by an external client adapter.
#[derive(Error, Debug)]
pub enum ExternalError {
    #[error("unexpected object")]
    UnexpectedObject,

    /// A cloud call failed. `reason` is the stable wrapper such as
    /// `cannot describe DB instance`.
    #[error("{reason}: {source}")]
    Api {
        reason: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot create patch: {0}")]
    Patch(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ExternalError {
    pub fn api(
        reason: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        ExternalError::Api {
            reason: reason.into(),
            source: source.into(),
        }
    }

    /// Programming or configuration errors that retrying will not fix.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExternalError::UnexpectedObject
                | ExternalError::Patch(_)
                | ExternalError::Invalid(_)
        )
    }

    /// The stable reason string without the underlying cause.
    pub fn reason(&self) -> &str {
        match self {
            ExternalError::UnexpectedObject => "unexpected object",
            ExternalError::Api { reason, .. } => reason,
            ExternalError::Patch(_) => "cannot create patch",
            ExternalError::Invalid(_) => "invalid configuration",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("conflict writing object: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Why a reference could not produce a value.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("referenced object {name} not found for field {field}")]
    NotFound { field: String, name: String },

    #[error("referenced object {name} is not ready for field {field}")]
    NotReady { field: String, name: String },

    #[error("no object matched the selector for field {field}")]
    NoMatch { field: String },

    #[error("cannot extract a value from {name} for field {field}")]
    Extract { field: String, name: String },

    #[error("cannot read referenced objects: {0}")]
    Store(#[from] StoreError),
}

/// Errors surfaced by one reconcile tick, tagged with the step that failed.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("connect: {0}")]
    Connect(#[source] ExternalError),

    #[error("observe: {0}")]
    Observe(#[source] ExternalError),

    #[error("create: {0}")]
    Create(#[source] ExternalError),

    #[error("update: {0}")]
    Update(#[source] ExternalError),

    #[error("delete: {0}")]
    Delete(#[source] ExternalError),

    #[error("late-init: {0}")]
    LateInit(#[source] StoreError),

    #[error("cannot resolve references: {0}")]
    Resolve(#[from] ResolveError),

    #[error("cannot publish connection details: {0}")]
    Publish(#[source] StoreError),

    #[error("cannot update managed resource: {0}")]
    Store(#[from] StoreError),

    #[error("{0} cancelled")]
    Cancelled(&'static str),

    #[error("{0} timed out")]
    TimedOut(&'static str),
}

impl ReconcileError {
    /// Terminal errors are surfaced once and not requeued with backoff.
    pub fn is_terminal(&self) -> bool {
        match self {
            ReconcileError::Connect(e)
            | ReconcileError::Observe(e)
            | ReconcileError::Create(e)
            | ReconcileError::Update(e)
            | ReconcileError::Delete(e) => e.is_terminal(),
            _ => false,
        }
    }
}
