//! Handle availability resolution

use crate::errors::*;
use crate::format::{HandleFormatValidator, UsernameFormatValidator};
use crate::query::{AvailabilityQuery, AvailabilityResponse};
use crate::store::ProfileStore;
use crate::types::*;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Counter incremented once per answered availability check.
pub const AVAILABILITY_CHECKS_METRIC: &str = "handle_availability_checks_total";

/// Apply the reservation precedence to a snapshot.
///
/// Cases are evaluated in order: no holder, own profile, premium holder,
/// non-premium holder. The own-profile check runs before the premium check so
/// a premium user is never refused their own handle.
pub fn resolve_availability(
    candidate_handle: &str,
    requesting_account_id: Option<&AccountId>,
    existing_records: &[ProfileHandleRecord],
) -> AvailabilityVerdict {
    let candidate = candidate_handle.trim();
    let Some(existing) = existing_records.iter().find(|r| r.holds(candidate)) else {
        return AvailabilityVerdict::available(ReasonCode::NoHolder);
    };

    if requesting_account_id.is_some_and(|id| *id == existing.owner_account_id) {
        return AvailabilityVerdict::available(ReasonCode::OwnProfile);
    }

    if existing.is_premium_holder {
        return AvailabilityVerdict::unavailable(ReasonCode::HeldByPremium);
    }

    AvailabilityVerdict::available(ReasonCode::CanTakeFromNonPremium)
}

/// Availability checks against an injected profile store
#[derive(Clone)]
pub struct HandleReservationResolver {
    store: Arc<dyn ProfileStore>,
    validator: Arc<dyn HandleFormatValidator>,
    store_timeout: Duration,
}

impl HandleReservationResolver {
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

    /// Create a resolver with the default username format and store timeout
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            validator: Arc::new(UsernameFormatValidator::new()),
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn HandleFormatValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Validate the candidate, fetch a snapshot and decide.
    pub async fn check(&self, query: &AvailabilityQuery) -> Result<AvailabilityVerdict> {
        let result = self.evaluate(query).await;
        let reason = match &result {
            Ok(verdict) => verdict.reason,
            Err(err) => err.reason(),
        };
        metrics::counter!(
            AVAILABILITY_CHECKS_METRIC,
            "kind" => query.handle_kind.as_str(),
            "reason" => reason.as_str()
        )
        .increment(1);
        result
    }

    /// Same as [`check`](Self::check), shaped for the caller-facing boundary.
    pub async fn query(&self, query: &AvailabilityQuery) -> AvailabilityResponse {
        AvailabilityResponse::from_result(self.check(query).await)
    }

    async fn evaluate(&self, query: &AvailabilityQuery) -> Result<AvailabilityVerdict> {
        let candidate = query.candidate_handle.trim();
        if candidate.is_empty() {
            return Err(HandleReservationError::missing_handle());
        }

        if query.handle_kind.requires_format_check() {
            let validation = self.validator.validate_handle_format(candidate);
            if !validation.valid {
                return Err(HandleReservationError::invalid_format(
                    validation
                        .error
                        .unwrap_or_else(|| "invalid username format".to_string()),
                ));
            }
        }

        let records = self.fetch_snapshot(query.handle_kind).await?;
        let verdict =
            resolve_availability(candidate, query.requesting_account_id.as_ref(), &records);

        debug!(
            kind = %query.handle_kind,
            candidate,
            available = verdict.available,
            reason = %verdict.reason,
            "resolved handle availability"
        );
        Ok(verdict)
    }

    async fn fetch_snapshot(&self, kind: HandleKind) -> Result<Vec<ProfileHandleRecord>> {
        match timeout(self.store_timeout, self.store.fetch_profile_handle_records(kind)).await {
            Ok(Ok(records)) => Ok(records),
            Ok(Err(err)) => {
                warn!(%kind, "profile store fetch failed: {}", err);
                Err(err.into())
            }
            Err(_) => {
                let err = ProfileStoreError::Timeout {
                    timeout_ms: self.store_timeout.as_millis() as u64,
                };
                warn!(%kind, "profile store fetch failed: {}", err);
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for HandleReservationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleReservationResolver")
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}
