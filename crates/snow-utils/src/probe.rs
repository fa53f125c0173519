//! Existence probe results
//!
//! Probing a resource distinguishes three outcomes. `Denied` means the
//! name is taken by something we cannot see into; callers must treat it
//! as fatal rather than as "already done".

/// Result of checking whether a named resource exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    /// The resource exists and is visible to us
    Found(T),
    /// No resource with this name exists
    NotFound,
    /// The resource may exist but access was refused
    Denied(String),
}

impl<T> Probe<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Probe::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Probe::NotFound)
    }

    /// Return the found value, if any
    pub fn found(self) -> Option<T> {
        match self {
            Probe::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probe<U> {
        match self {
            Probe::Found(v) => Probe::Found(f(v)),
            Probe::NotFound => Probe::NotFound,
            Probe::Denied(reason) => Probe::Denied(reason),
        }
    }
}

/// Outcome of an idempotent create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ensured {
    /// Identifier of the resource (ARN or name)
    pub id: String,
    /// Whether this call created it
    pub created: bool,
}

impl Ensured {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created: true,
        }
    }

    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created: false,
        }
    }
}
