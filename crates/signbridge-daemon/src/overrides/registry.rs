//! Active override registry: per-sign claim/release and outcome reports.
//!
//! The mutex guards only map operations and is never held across an
//! await, so overrides for different signs proceed fully in parallel
//! while claim and release stay atomic per sign.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;

use signbridge_proto::payload::ProgramId;

/// Phase of an in-flight override, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePhase {
    Switching,
    Holding,
    Restoring,
}

impl std::fmt::Display for OverridePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Switching => f.write_str("switching"),
            Self::Holding => f.write_str("holding"),
            Self::Restoring => f.write_str("restoring"),
        }
    }
}

/// State held for a sign while its override is in flight.
///
/// Created when the override claims the sign, enriched once the programs
/// are resolved, and destroyed on release. Failures and retry exhaustion
/// release just like success does.
#[derive(Debug, Clone)]
pub struct ActiveOverride {
    /// Correlation id carried through all of this override's log lines.
    pub request_id: String,
    /// Alert type that triggered the override.
    pub message_type: String,
    pub phase: OverridePhase,
    /// Program to restore when the hold expires.
    pub original: Option<ProgramId>,
    pub target: Option<ProgramId>,
    pub started_at: Instant,
    pub expires_at: Option<Instant>,
}

impl ActiveOverride {
    pub fn new(request_id: String, message_type: String) -> Self {
        Self {
            request_id,
            message_type,
            phase: OverridePhase::Switching,
            original: None,
            target: None,
            started_at: Instant::now(),
            expires_at: None,
        }
    }
}

/// Claim conflict: the sign already has an override in flight.
#[derive(Debug, thiserror::Error)]
#[error("Sign {sign_id} is busy with override {request_id}")]
pub struct Busy {
    pub sign_id: String,
    /// Request id of the override currently holding the sign.
    pub request_id: String,
}

/// Terminal outcome of one override, kept for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OverrideReport {
    pub sign_id: String,
    pub request_id: String,
    pub message_type: String,
    pub outcome: String,
}

/// Serializable snapshot of one active override.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveView {
    pub sign_id: String,
    pub request_id: String,
    pub message_type: String,
    pub phase: String,
    pub held_for_secs: u64,
    /// Seconds until the hold expires; absent before the switch confirms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<ProgramId>,
    /// Program that will be restored when the hold expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<ProgramId>,
}

/// Keyed registry of in-flight overrides and their most recent outcomes.
#[derive(Default)]
pub struct OverrideRegistry {
    active: Mutex<HashMap<String, ActiveOverride>>,
    reports: Mutex<HashMap<String, OverrideReport>>,
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the sign for a new override. Fails if one is already in
    /// flight; the check and the insert are a single atomic step.
    pub async fn claim(&self, sign_id: &str, entry: ActiveOverride) -> Result<(), Busy> {
        let mut active = self.active.lock().await;
        match active.entry(sign_id.to_string()) {
            Entry::Occupied(current) => Err(Busy {
                sign_id: sign_id.to_string(),
                request_id: current.get().request_id.clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
        }
    }

    /// Record the resolved programs and the hold deadline, entering the
    /// holding phase.
    pub async fn begin_hold(
        &self,
        sign_id: &str,
        original: ProgramId,
        target: ProgramId,
        expires_at: Instant,
    ) {
        let mut active = self.active.lock().await;
        if let Some(entry) = active.get_mut(sign_id) {
            entry.phase = OverridePhase::Holding;
            entry.original = Some(original);
            entry.target = Some(target);
            entry.expires_at = Some(expires_at);
        }
    }

    /// Record a phase transition for an active override.
    pub async fn set_phase(&self, sign_id: &str, phase: OverridePhase) {
        let mut active = self.active.lock().await;
        if let Some(entry) = active.get_mut(sign_id) {
            entry.phase = phase;
        }
    }

    /// Release the sign and record the final report.
    pub async fn release(&self, sign_id: &str, report: OverrideReport) {
        self.active.lock().await.remove(sign_id);
        self.reports
            .lock()
            .await
            .insert(sign_id.to_string(), report);
    }

    /// Whether the sign currently has an override in flight.
    pub async fn is_active(&self, sign_id: &str) -> bool {
        self.active.lock().await.contains_key(sign_id)
    }

    /// Snapshot of all active overrides for the status endpoint.
    pub async fn active_snapshot(&self) -> Vec<ActiveView> {
        let now = Instant::now();
        let active = self.active.lock().await;
        let mut views: Vec<ActiveView> = active
            .iter()
            .map(|(sign_id, entry)| ActiveView {
                sign_id: sign_id.clone(),
                request_id: entry.request_id.clone(),
                message_type: entry.message_type.clone(),
                phase: entry.phase.to_string(),
                held_for_secs: now.duration_since(entry.started_at).as_secs(),
                remaining_secs: entry
                    .expires_at
                    .map(|at| at.saturating_duration_since(now).as_secs()),
                target: entry.target.clone(),
                original: entry.original.clone(),
            })
            .collect();
        views.sort_by(|a, b| a.sign_id.cmp(&b.sign_id));
        views
    }

    /// Snapshot of the most recent outcome per sign.
    pub async fn report_snapshot(&self) -> Vec<OverrideReport> {
        let reports = self.reports.lock().await;
        let mut list: Vec<OverrideReport> = reports.values().cloned().collect();
        list.sort_by(|a, b| a.sign_id.cmp(&b.sign_id));
        list
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_then_busy_then_release() {
        let registry = OverrideRegistry::new();
        registry
            .claim("A1", ActiveOverride::new("req-1".into(), "lockdown".into()))
            .await
            .unwrap();

        let err = registry
            .claim("A1", ActiveOverride::new("req-2".into(), "lockdown".into()))
            .await
            .unwrap_err();
        assert_eq!(err.request_id, "req-1");

        registry
            .release(
                "A1",
                OverrideReport {
                    sign_id: "A1".into(),
                    request_id: "req-1".into(),
                    message_type: "lockdown".into(),
                    outcome: "success".into(),
                },
            )
            .await;

        assert!(!registry.is_active("A1").await);
        // Released sign can be claimed again.
        registry
            .claim("A1", ActiveOverride::new("req-3".into(), "lockdown".into()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn claims_for_distinct_signs_are_independent() {
        let registry = OverrideRegistry::new();
        registry
            .claim("A1", ActiveOverride::new("req-1".into(), "lockdown".into()))
            .await
            .unwrap();
        registry
            .claim("B2", ActiveOverride::new("req-2".into(), "evacuate".into()))
            .await
            .unwrap();

        let views = registry.active_snapshot().await;
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].sign_id, "A1");
        assert_eq!(views[1].sign_id, "B2");
    }

    #[tokio::test]
    async fn begin_hold_records_programs_and_deadline() {
        let registry = OverrideRegistry::new();
        registry
            .claim("A1", ActiveOverride::new("req-1".into(), "lockdown".into()))
            .await
            .unwrap();
        registry
            .begin_hold(
                "A1",
                ProgramId::Number(7),
                ProgramId::Number(3),
                Instant::now() + std::time::Duration::from_secs(60),
            )
            .await;

        let views = registry.active_snapshot().await;
        assert_eq!(views[0].phase, "holding");
        let remaining = views[0].remaining_secs.unwrap();
        assert!(remaining > 50, "remaining_secs: {remaining}");
    }
}
