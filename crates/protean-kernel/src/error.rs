//! Error types for Protean record operations.
//!
//! Errors are `Clone` + `PartialEq`: the naming chain memoizes failures the
//! same way it memoizes values, and hands out the cached error on re-query.

/// Errors arising from attribute resolution, view projection, or the
/// naming chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProteanError {
    /// An attribute is neither stored nor computed, and the owning type
    /// has its silence policy disabled.
    #[error("no such attribute: {attribute}")]
    MissingAttribute { attribute: String },

    /// A computed attribute's own logic failed. Never silenced.
    #[error("computed attribute {attribute} failed: {message}")]
    ComputedAttribute { attribute: String, message: String },

    /// An unknown view name was passed to `view`.
    #[error("no such view: {view}")]
    NoSuchView { view: String },

    /// The naming chain exhausted every location resolution step.
    #[error("undefined location")]
    UndefinedLocation,

    /// The naming chain exhausted every unit resolution step.
    #[error("undefined unit")]
    UndefinedUnit,
}
