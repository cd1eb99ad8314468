//! Pure membership test of a client address against whitelist specs.
//!
//! A spec is either a single address or a CIDR network. Specs are parsed
//! into a canonical form before they are stored or compared:
//!
//! - exact addresses compare by value, so `::1` and `0:0:0:0:0:0:0:1` are
//!   the same entry;
//! - IPv4-mapped IPv6 (`::ffff:10.0.0.1`) is folded to IPv4, for candidates
//!   and for specs, so a dual-stack listener reporting mapped peers still
//!   matches plain IPv4 entries;
//! - mapped networks inside `::ffff:0:0/96` are folded the same way
//!   (`::ffff:10.0.0.0/120` becomes `10.0.0.0/24`); wider IPv6 networks stay
//!   IPv6 and only match IPv6 candidates;
//! - host bits are masked (`10.0.0.5/24` becomes `10.0.0.0/24`).

use ipnet::{IpNet, Ipv4Net};
use std::fmt;
use std::net::IpAddr;
use crate::error::GateError;

/// Length of the `::ffff:0:0/96` prefix that carries mapped IPv4.
const MAPPED_PREFIX_LEN: u8 = 96;

/// A parsed whitelist spec in canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpec {
    Addr(IpAddr),
    Net(IpNet),
}

impl AddressSpec {
    pub fn contains(&self, candidate: IpAddr) -> bool {
        match self {
            AddressSpec::Addr(addr) => *addr == candidate,
            AddressSpec::Net(net) => net.contains(&candidate),
        }
    }
}

/// Canonical text, used as the stored `address_spec`.
impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Addr(addr) => fmt::Display::fmt(addr, f),
            AddressSpec::Net(net) => fmt::Display::fmt(net, f),
        }
    }
}

fn fold_mapped_net(net: IpNet) -> IpNet {
    let IpNet::V6(v6) = net else {
        return net;
    };
    if v6.prefix_len() < MAPPED_PREFIX_LEN {
        return net;
    }
    match v6.network().to_ipv4_mapped() {
        Some(v4) => Ipv4Net::new(v4, v6.prefix_len() - MAPPED_PREFIX_LEN)
            .map(IpNet::V4)
            .unwrap_or(net),
        None => net,
    }
}

/// Parse a spec: an exact address first, a CIDR network second.
pub fn parse_spec(spec: &str) -> Option<AddressSpec> {
    let spec = spec.trim();
    if let Ok(addr) = spec.parse::<IpAddr>() {
        return Some(AddressSpec::Addr(addr.to_canonical()));
    }
    spec.parse::<IpNet>()
        .ok()
        .map(|net| AddressSpec::Net(fold_mapped_net(net).trunc()))
}

/// Canonical text of `spec`, or `None` when it is neither an address nor a network.
pub fn canonicalize(spec: &str) -> Option<String> {
    parse_spec(spec).map(|parsed| parsed.to_string())
}

/// Parse a caller address, folding IPv4-mapped IPv6 into IPv4.
pub fn parse_candidate(candidate: &str) -> Result<IpAddr, GateError> {
    candidate
        .trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_canonical())
        .map_err(|_| GateError::Unparsable(candidate.to_string()))
}

/// True when `candidate` equals an exact spec or falls inside a network spec.
/// Unparsable candidates are never members; malformed specs are skipped.
pub fn is_member<'a, I>(candidate: &str, pool: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let ip = match parse_candidate(candidate) {
        Ok(ip) => ip,
        Err(_) => {
            tracing::warn!("Invalid client IP address: {}", candidate);
            return false;
        }
    };

    pool.into_iter().any(|spec| match parse_spec(spec) {
        Some(parsed) => parsed.contains(ip),
        None => {
            tracing::warn!("Skipping malformed whitelist entry: {}", spec);
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_ipv4_match() {
        assert!(is_member("203.0.113.5", ["203.0.113.5"]));
        assert!(!is_member("203.0.113.6", ["203.0.113.5"]));
    }

    #[test]
    fn test_ipv6_shorthand_equals_full_form() {
        assert!(is_member("::1", ["0:0:0:0:0:0:0:1"]));
        assert!(is_member("0:0:0:0:0:0:0:1", ["::1"]));
        assert!(is_member("2001:DB8::1", ["2001:db8:0::1"]));
    }

    #[test]
    fn test_ipv4_mapped_candidate_matches_ipv4_entry() {
        assert!(is_member("::ffff:192.0.2.10", ["192.0.2.10"]));
        assert!(is_member("::ffff:10.0.0.17", ["10.0.0.0/24"]));
    }

    #[test]
    fn test_ipv4_mapped_entry_matches_ipv4_candidate() {
        assert!(is_member("192.0.2.10", ["::ffff:192.0.2.10"]));
    }

    #[test]
    fn test_cidr_containment() {
        assert!(is_member("10.0.0.17", ["10.0.0.0/24"]));
        assert!(!is_member("10.0.1.1", ["10.0.0.0/24"]));
    }

    #[test]
    fn test_cidr_boundaries_included() {
        assert!(is_member("10.0.0.0", ["10.0.0.0/24"]));
        assert!(is_member("10.0.0.255", ["10.0.0.0/24"]));
        assert!(!is_member("9.255.255.255", ["10.0.0.0/24"]));
        assert!(!is_member("10.0.1.0", ["10.0.0.0/24"]));
    }

    #[test]
    fn test_ipv6_cidr() {
        assert!(is_member("2001:db8::abcd", ["2001:db8::/32"]));
        assert!(!is_member("2001:db9::1", ["2001:db8::/32"]));
    }

    #[test]
    fn test_cidr_with_host_bits_is_masked() {
        assert!(is_member("10.0.0.200", ["10.0.0.5/24"]));
    }

    #[test]
    fn test_families_do_not_cross() {
        assert!(!is_member("10.0.0.1", ["::/0"]));
        assert!(!is_member("::1", ["0.0.0.0/0"]));
    }

    #[test]
    fn test_unparsable_candidate_fails_closed() {
        assert!(!is_member("unknown", ["0.0.0.0/0"]));
        assert!(!is_member("", ["127.0.0.1"]));
        assert!(!is_member("10.0.0.1/32", ["10.0.0.1"]));
    }

    #[test]
    fn test_malformed_spec_is_skipped() {
        assert!(is_member("10.0.0.1", ["not-an-ip", "10.0.0.0/8"]));
        assert!(!is_member("10.0.0.1", ["not-an-ip", "10.0.0.0/33"]));
    }

    #[test]
    fn test_empty_pool_denies() {
        assert!(!is_member("127.0.0.1", std::iter::empty::<&str>()));
    }

    #[test]
    fn test_order_does_not_matter() {
        let specs = ["192.168.0.0/16", "bogus", "10.1.2.3"];
        let mut reversed = specs;
        reversed.reverse();
        for ip in ["10.1.2.3", "192.168.7.7", "172.16.0.1"] {
            assert_eq!(is_member(ip, specs), is_member(ip, reversed));
        }
    }

    #[test]
    fn test_ipv4_mapped_network_matches_ipv4_candidates() {
        assert!(is_member("10.0.0.9", ["::ffff:10.0.0.0/120"]));
        assert!(is_member("::ffff:10.0.0.9", ["::ffff:10.0.0.0/120"]));
        assert!(!is_member("10.0.1.9", ["::ffff:10.0.0.0/120"]));
    }

    #[test]
    fn test_canonical_forms() {
        assert_eq!(canonicalize(" 2001:DB8:0::1 ").as_deref(), Some("2001:db8::1"));
        assert_eq!(canonicalize("::ffff:192.0.2.10").as_deref(), Some("192.0.2.10"));
        assert_eq!(canonicalize("10.0.0.5/24").as_deref(), Some("10.0.0.0/24"));
        assert_eq!(canonicalize("::ffff:10.0.0.0/120").as_deref(), Some("10.0.0.0/24"));
        assert_eq!(canonicalize("::ffff:0:0/96").as_deref(), Some("0.0.0.0/0"));
        assert_eq!(canonicalize("2001:db8::/32").as_deref(), Some("2001:db8::/32"));
        assert_eq!(canonicalize("::/0").as_deref(), Some("::/0"));
        assert_eq!(canonicalize("not-an-ip"), None);
    }

    #[test]
    fn test_parse_spec_variants() {
        assert!(matches!(parse_spec("127.0.0.1"), Some(AddressSpec::Addr(_))));
        assert!(matches!(parse_spec(" 10.0.0.0/24 "), Some(AddressSpec::Net(_))));
        assert!(parse_spec("not-an-ip").is_none());
        assert!(parse_spec("192.168.1.256").is_none());
    }
}
