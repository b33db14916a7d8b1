//! The override state machine.
//!
//! One override runs `Idle -> Switching -> Holding -> Restoring -> Idle`:
//! claim the sign, open a fresh session to switch it to the emergency
//! program, hold for the requested duration measured from the confirmed
//! switch, then reconnect and restore the original program with bounded
//! retries. Every exit path releases the sign, including retry
//! exhaustion, so later overrides are never starved.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use signbridge_core::Config;
use signbridge_core::config::SignConfig;
use signbridge_proto::payload::ProgramId;

use crate::directory::{self, ResolveError};
use crate::session::{SessionError, SignSession};

use super::registry::{ActiveOverride, Busy, OverridePhase, OverrideRegistry, OverrideReport};
use super::retry::RetryPolicy;

/// One inbound override request, as received by the webhook gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRequest {
    /// Sign to override.
    #[serde(rename = "sign")]
    pub sign_id: String,
    /// Alert type; mapped to a vendor program name via configuration.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Hold duration in seconds.
    #[serde(rename = "duration")]
    pub duration_secs: u64,
}

/// Failure modes of one override operation.
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error(transparent)]
    Busy(#[from] Busy),

    /// The sign id has no configuration entry.
    #[error("No configuration for sign {0:?}")]
    UnknownSign(String),

    /// The alert type has no program mapping in configuration.
    #[error("No program mapping for message type {0:?}")]
    UnknownMessageType(String),

    /// Connect or authenticate failed before any switch was issued.
    #[error("Session failed during {phase}: {source}")]
    Session {
        phase: &'static str,
        #[source]
        source: SessionError,
    },

    /// Target or restore program could not be resolved on the sign; no
    /// switch was issued.
    #[error("Resolution failed: {0}")]
    Resolution(#[source] ResolveError),

    /// The sign rejected the switch to the emergency program.
    #[error("Switch failed: {0}")]
    SwitchFailed(#[source] SessionError),

    /// All restore attempts failed; the sign may still be showing the
    /// override program.
    #[error("Restore failed after {attempts} attempts: {source}")]
    RestoreFailed {
        attempts: u32,
        #[source]
        source: SessionError,
    },
}

/// Runs override lifecycles; one instance shared by all gateway workers.
pub struct Orchestrator {
    config: Arc<Config>,
    registry: Arc<OverrideRegistry>,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(config: Arc<Config>, registry: Arc<OverrideRegistry>) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            config,
            registry,
            retry,
        }
    }

    /// Run one override to completion: claim, switch, hold, restore,
    /// release.
    pub async fn run(&self, request: OverrideRequest) -> Result<(), OverrideError> {
        let sign = self
            .config
            .sign(&request.sign_id)
            .ok_or_else(|| OverrideError::UnknownSign(request.sign_id.clone()))?;
        let target_name = self
            .config
            .program_for_type(&request.message_type)
            .ok_or_else(|| OverrideError::UnknownMessageType(request.message_type.clone()))?
            .to_string();

        let request_id = Uuid::new_v4().to_string();
        self.registry
            .claim(
                &request.sign_id,
                ActiveOverride::new(request_id.clone(), request.message_type.clone()),
            )
            .await?;
        info!(
            request_id = %request_id,
            sign_id = %request.sign_id,
            message_type = %request.message_type,
            duration_secs = request.duration_secs,
            "Override state: idle -> switching"
        );

        let result = self.execute(&request_id, &request, sign, &target_name).await;

        let outcome = match &result {
            Ok(()) => "success".to_string(),
            Err(e) => e.to_string(),
        };
        self.registry
            .release(
                &request.sign_id,
                OverrideReport {
                    sign_id: request.sign_id.clone(),
                    request_id: request_id.clone(),
                    message_type: request.message_type.clone(),
                    outcome,
                },
            )
            .await;
        info!(request_id = %request_id, sign_id = %request.sign_id, "Override state: -> idle");
        result
    }

    async fn execute(
        &self,
        request_id: &str,
        request: &OverrideRequest,
        sign: &SignConfig,
        target_name: &str,
    ) -> Result<(), OverrideError> {
        // Switch phase: fresh session, both programs resolved from one
        // live listing, then the switch itself.
        let mut session = self.open_session(sign, "switch").await?;
        let (target, original) =
            match directory::resolve_pair(&mut session, target_name, &sign.default_program).await {
                Ok(pair) => pair,
                Err(e) => {
                    session.close();
                    return Err(OverrideError::Resolution(e));
                }
            };
        if let Err(e) = session.switch_program(&target).await {
            session.close();
            return Err(OverrideError::SwitchFailed(e));
        }
        session.close();

        // Hold phase: the clock starts at the confirmed switch ack, not
        // at request receipt.
        let hold = Duration::from_secs(request.duration_secs);
        self.registry
            .begin_hold(
                &request.sign_id,
                original.clone(),
                target.clone(),
                Instant::now() + hold,
            )
            .await;
        info!(
            request_id,
            sign_id = %request.sign_id,
            target = %target,
            original = %original,
            hold_secs = request.duration_secs,
            "Override state: switching -> holding"
        );
        sleep(hold).await;

        // Restore phase: fresh session per attempt, bounded retries.
        self.registry
            .set_phase(&request.sign_id, OverridePhase::Restoring)
            .await;
        info!(request_id, sign_id = %request.sign_id, "Override state: holding -> restoring");

        let mut attempts = 0u32;
        loop {
            match self.restore_once(sign, &original).await {
                Ok(()) => {
                    info!(
                        request_id,
                        sign_id = %request.sign_id,
                        original = %original,
                        "Original program restored"
                    );
                    return Ok(());
                }
                Err(e) => {
                    attempts += 1;
                    if self.retry.should_retry(attempts) {
                        let delay = self.retry.delay_for_attempt(attempts - 1);
                        warn!(
                            request_id,
                            sign_id = %request.sign_id,
                            attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Restore attempt failed, retrying"
                        );
                        sleep(delay).await;
                    } else {
                        error!(
                            request_id,
                            sign_id = %request.sign_id,
                            attempts,
                            error = %e,
                            "Restore failed; sign left on override program, operator intervention required"
                        );
                        return Err(OverrideError::RestoreFailed {
                            attempts,
                            source: e,
                        });
                    }
                }
            }
        }
    }

    /// Open and authenticate a fresh session for one override phase.
    async fn open_session(
        &self,
        sign: &SignConfig,
        phase: &'static str,
    ) -> Result<SignSession, OverrideError> {
        let mut session = SignSession::connect(&sign.address, &self.config.session)
            .await
            .map_err(|source| OverrideError::Session { phase, source })?;
        if let Err(source) = session.authenticate(&sign.credentials).await {
            session.close();
            return Err(OverrideError::Session { phase, source });
        }
        Ok(session)
    }

    /// One restore attempt: reconnect, re-authenticate, switch back.
    async fn restore_once(
        &self,
        sign: &SignConfig,
        original: &ProgramId,
    ) -> Result<(), SessionError> {
        let mut session = SignSession::connect(&sign.address, &self.config.session).await?;
        if let Err(e) = session.authenticate(&sign.credentials).await {
            session.close();
            return Err(e);
        }
        let result = session.switch_program(original).await;
        session.close();
        result
    }
}
