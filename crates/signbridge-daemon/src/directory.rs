//! Program directory: name -> identifier resolution against a live sign.
//!
//! The directory is rebuilt for every session rather than cached.
//! Administrators rename and renumber programs in the vendor tool, and a
//! stale mapping would switch a sign to the wrong program.

use thiserror::Error;
use tracing::debug;

use signbridge_proto::payload::{ProgramId, ProgramInfo};

use crate::session::{SessionError, SignSession};

/// Directory resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No program with the requested name exists on the sign.
    #[error("Program not found on sign: {name:?}")]
    NotFound { name: String },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Resolve a program name to its identifier on a live session.
///
/// Matching is exact and case-sensitive.
pub async fn resolve(session: &mut SignSession, name: &str) -> Result<ProgramId, ResolveError> {
    let programs = session.list_programs().await?;
    lookup(&programs, name)
}

/// Resolve the override target and the restore program from a single
/// program listing (one wire round-trip for both lookups).
pub async fn resolve_pair(
    session: &mut SignSession,
    target: &str,
    restore: &str,
) -> Result<(ProgramId, ProgramId), ResolveError> {
    let programs = session.list_programs().await?;
    let target_id = lookup(&programs, target)?;
    let restore_id = lookup(&programs, restore)?;
    Ok((target_id, restore_id))
}

fn lookup(programs: &[ProgramInfo], name: &str) -> Result<ProgramId, ResolveError> {
    let found = programs
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ResolveError::NotFound {
            name: name.to_string(),
        })?;
    debug!(name, identifier = %found.identifier, "Resolved program");
    Ok(found.identifier.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn directory() -> Vec<ProgramInfo> {
        vec![
            ProgramInfo {
                name: "Normal".into(),
                identifier: ProgramId::Number(7),
            },
            ProgramInfo {
                name: "Lockdown".into(),
                identifier: ProgramId::Number(3),
            },
            ProgramInfo {
                name: "Evacuate".into(),
                identifier: ProgramId::Text("prog-9".into()),
            },
        ]
    }

    #[test]
    fn exact_match_resolves() {
        assert_eq!(
            lookup(&directory(), "Lockdown").unwrap(),
            ProgramId::Number(3)
        );
        assert_eq!(
            lookup(&directory(), "Evacuate").unwrap(),
            ProgramId::Text("prog-9".into())
        );
    }

    #[test]
    fn missing_name_is_not_found() {
        let err = lookup(&directory(), "Fire Drill").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { name } if name == "Fire Drill"));
    }

    #[test]
    fn match_is_case_sensitive() {
        let err = lookup(&directory(), "lockdown").unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }
}
