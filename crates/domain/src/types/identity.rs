//! Identity types
//!
//! A reporting participant is known to the outside world by a stable string
//! identifier and to durable storage by an opaque surrogate key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MAX_IDENTIFIER_LENGTH;
use crate::{MtrError, Result};

/// Kind of reporting participant. Each kind has its own key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Application,
    Instance,
    Source,
    Device,
    Site,
}

crate::impl_domain_enum_conversions!(EntityKind {
    Application => "application",
    Instance => "instance",
    Source => "source",
    Device => "device",
    Site => "site",
});

impl EntityKind {
    /// Every entity kind, in a stable order.
    pub const ALL: [Self; 5] =
        [Self::Application, Self::Instance, Self::Source, Self::Device, Self::Site];

    /// Dense index into [`Self::ALL`].
    pub const fn index(self) -> usize {
        match self {
            Self::Application => 0,
            Self::Instance => 1,
            Self::Source => 2,
            Self::Device => 3,
            Self::Site => 4,
        }
    }
}

/// Opaque surrogate key assigned by durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pk(pub i64);

impl Pk {
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Pk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a read-or-create identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "pk", rename_all = "snake_case")]
pub enum Resolved {
    /// The identity already existed.
    Found(Pk),
    /// This call created the identity.
    Created(Pk),
}

impl Resolved {
    pub const fn pk(self) -> Pk {
        match self {
            Self::Found(pk) | Self::Created(pk) => pk,
        }
    }

    pub const fn was_created(self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// A human-readable reference to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Durable key of one time series: an entity and a metric type, optionally
/// narrowed to one instance or source of that entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub entity_pk: Pk,
    pub type_pk: Pk,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Pk>,
}

impl SeriesKey {
    pub const fn new(entity_pk: Pk, type_pk: Pk) -> Self {
        Self { entity_pk, type_pk, scope: None }
    }

    /// The same series narrowed to `scope`.
    #[must_use]
    pub const fn scoped(self, scope: Option<Pk>) -> Self {
        Self { scope, ..self }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity={} type={}", self.entity_pk, self.type_pk)?;
        if let Some(scope) = self.scope {
            write!(f, " scope={scope}")?;
        }
        Ok(())
    }
}

/// Validate an external identifier.
///
/// # Errors
/// `MtrError::Validation` when the identifier is empty, padded with
/// whitespace, or longer than [`MAX_IDENTIFIER_LENGTH`].
pub fn validate_identifier(kind: EntityKind, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(MtrError::Validation(format!("{kind} id must not be empty")));
    }
    if id.trim() != id {
        return Err(MtrError::Validation(format!(
            "{kind} id {id:?} must not have leading or trailing whitespace"
        )));
    }
    if id.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MtrError::Validation(format!(
            "{kind} id exceeds {MAX_IDENTIFIER_LENGTH} bytes"
        )));
    }
    Ok(())
}
