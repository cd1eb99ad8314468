use std::net::IpAddr;
use std::sync::Arc;
use crate::db::audit::{self, AuditEntry};
use crate::db::DbPool;
use crate::error::GateError;
use crate::metrics::GateMetrics;
use crate::whitelist::{WhitelistCache, WhitelistStore};
use super::api_key::{self, CredentialStore};

/// Client address used when neither a forwarded header nor a peer is known.
/// It never parses, so it always fails the whitelist check.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// One request asking to run a privileged operation.
#[derive(Debug, Clone)]
pub struct AccessAttempt<'a> {
    pub client_ip: &'a str,
    pub credential: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub user_agent: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    IpNotAllowed,
    CredentialInvalid,
    CredentialLookupFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), GateError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(DenyReason::IpNotAllowed) => Err(GateError::AccessDenied),
            Decision::Deny(_) => Err(GateError::CredentialInvalid),
        }
    }
}

/// First hop of `X-Forwarded-For` when trusted, else the transport peer.
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    peer: Option<IpAddr>,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded {
        if let Some(first) = forwarded_for
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
        {
            return first.to_string();
        }
    }
    peer.map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Decision point in front of every privileged operation: whitelist first,
/// credential second, audit always.
pub struct AuthorizationGate {
    cache: Arc<WhitelistCache>,
    store: WhitelistStore,
    credentials: CredentialStore,
    metrics: Arc<GateMetrics>,
    audit_db: DbPool,
}

impl AuthorizationGate {
    pub fn new(
        cache: Arc<WhitelistCache>,
        store: WhitelistStore,
        credentials: CredentialStore,
        metrics: Arc<GateMetrics>,
    ) -> Self {
        let audit_db = store.pool().clone();
        Self { cache, store, credentials, metrics, audit_db }
    }

    pub async fn authorize(&self, attempt: &AccessAttempt<'_>) -> Decision {
        let decision = self.decide(attempt).await;

        match decision {
            Decision::Allow => self.metrics.inc_allowed(),
            Decision::Deny(DenyReason::IpNotAllowed) => {
                tracing::warn!("Unauthorized IP access attempt: {} {} {}", attempt.client_ip, attempt.method, attempt.path);
                self.metrics.inc_denied_ip();
            }
            Decision::Deny(reason) => {
                tracing::warn!("Credential rejected for {} ({:?})", attempt.client_ip, reason);
                self.metrics.inc_denied_credential();
            }
        }

        self.audit(attempt, decision.is_allowed()).await;
        decision
    }

    async fn decide(&self, attempt: &AccessAttempt<'_>) -> Decision {
        // Credentials are not looked up for callers outside the whitelist.
        if !self.cache.is_allowed(attempt.client_ip, &self.store).await {
            return Decision::Deny(DenyReason::IpNotAllowed);
        }

        match self.credentials.validate(attempt.credential).await {
            Ok(true) => Decision::Allow,
            Ok(false) => Decision::Deny(DenyReason::CredentialInvalid),
            Err(e) => {
                tracing::error!("API key lookup failed: {}", e);
                Decision::Deny(DenyReason::CredentialLookupFailed)
            }
        }
    }

    async fn audit(&self, attempt: &AccessAttempt<'_>, success: bool) {
        let entry = AuditEntry {
            client_ip: attempt.client_ip.to_string(),
            method: attempt.method.to_string(),
            path: attempt.path.to_string(),
            key_hash_prefix: api_key::hash_prefix(attempt.credential),
            success,
            user_agent: attempt.user_agent.map(str::to_string),
        };

        tracing::info!(
            client_ip = %entry.client_ip,
            method = %entry.method,
            path = %entry.path,
            api_key_hash = %entry.key_hash_prefix,
            success = entry.success,
            "API request"
        );

        if let Err(e) = audit::record(&self.audit_db, &entry).await {
            tracing::warn!("Failed to write audit entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const PEER: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    #[test]
    fn test_forwarded_first_hop_wins() {
        let ip = resolve_client_ip(Some("203.0.113.5, 10.0.0.1"), Some(PEER), true);
        assert_eq!(ip, "203.0.113.5");
    }

    #[test]
    fn test_forwarded_ignored_when_untrusted() {
        let ip = resolve_client_ip(Some("203.0.113.5"), Some(PEER), false);
        assert_eq!(ip, "192.0.2.1");
    }

    #[test]
    fn test_blank_forwarded_falls_back_to_peer() {
        assert_eq!(resolve_client_ip(Some("  "), Some(PEER), true), "192.0.2.1");
        assert_eq!(resolve_client_ip(Some(",10.0.0.1"), Some(PEER), true), "192.0.2.1");
    }

    #[test]
    fn test_no_source_is_unknown() {
        assert_eq!(resolve_client_ip(None, None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_decision_maps_to_errors() {
        assert!(Decision::Allow.into_result().is_ok());
        assert!(matches!(
            Decision::Deny(DenyReason::IpNotAllowed).into_result(),
            Err(GateError::AccessDenied)
        ));
        assert!(matches!(
            Decision::Deny(DenyReason::CredentialLookupFailed).into_result(),
            Err(GateError::CredentialInvalid)
        ));
    }
}
