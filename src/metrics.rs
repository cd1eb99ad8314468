use std::sync::atomic::{AtomicU64, Ordering};
use crate::whitelist::CacheInfo;

/// Gate decision counters shared between the gate and the API.
#[derive(Default)]
pub struct GateMetrics {
    pub requests_total: AtomicU64,
    pub requests_allowed: AtomicU64,
    pub denied_ip: AtomicU64,
    pub denied_credential: AtomicU64,
}

impl GateMetrics {
    pub fn inc_allowed(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_denied_ip(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.denied_ip.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_denied_credential(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.denied_credential.fetch_add(1, Ordering::Relaxed);
    }

    /// Serialize to Prometheus text exposition format.
    pub fn to_prometheus_text(&self, cache: &CacheInfo) -> String {
        let total = self.requests_total.load(Ordering::Relaxed);
        let allowed = self.requests_allowed.load(Ordering::Relaxed);
        let denied_ip = self.denied_ip.load(Ordering::Relaxed);
        let denied_credential = self.denied_credential.load(Ordering::Relaxed);
        let valid = u8::from(cache.is_valid);

        format!(
            "# HELP ip_gate_requests_total Gated requests by outcome\n\
             # TYPE ip_gate_requests_total counter\n\
             ip_gate_requests_total{{status=\"allowed\"}} {allowed}\n\
             ip_gate_requests_total{{status=\"denied_ip\"}} {denied_ip}\n\
             ip_gate_requests_total{{status=\"denied_credential\"}} {denied_credential}\n\
             ip_gate_requests_total{{status=\"total\"}} {total}\n\
             # HELP ip_gate_whitelist_cache_entries Active entries in the whitelist cache\n\
             # TYPE ip_gate_whitelist_cache_entries gauge\n\
             ip_gate_whitelist_cache_entries {}\n\
             # HELP ip_gate_whitelist_cache_valid Whether the whitelist cache is within its TTL\n\
             # TYPE ip_gate_whitelist_cache_valid gauge\n\
             ip_gate_whitelist_cache_valid {valid}\n\
             # HELP ip_gate_whitelist_cache_refreshes_total Whitelist cache refreshes by outcome\n\
             # TYPE ip_gate_whitelist_cache_refreshes_total counter\n\
             ip_gate_whitelist_cache_refreshes_total{{status=\"ok\"}} {}\n\
             ip_gate_whitelist_cache_refreshes_total{{status=\"failed\"}} {}\n",
            cache.cache_size,
            cache.refresh_count,
            cache.failed_refreshes,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_text() {
        let m = GateMetrics::default();
        m.inc_allowed();
        m.inc_denied_ip();
        m.inc_denied_ip();
        m.inc_denied_credential();

        let info = CacheInfo {
            cache_size: 3,
            last_refresh: None,
            is_valid: true,
            ttl_seconds: 300,
            refresh_count: 2,
            failed_refreshes: 1,
            last_refresh_failed: false,
        };
        let text = m.to_prometheus_text(&info);
        assert!(text.contains("ip_gate_requests_total{status=\"denied_ip\"} 2"));
        assert!(text.contains("ip_gate_requests_total{status=\"total\"} 4"));
        assert!(text.contains("ip_gate_whitelist_cache_entries 3"));
        assert!(text.contains("ip_gate_whitelist_cache_valid 1"));
        assert!(text.contains("ip_gate_whitelist_cache_refreshes_total{status=\"failed\"} 1"));
    }
}
