//! Desired-state generation
//!
//! Turns a configured label and the addresses detected this cycle into the
//! records the zone should contain for that name.

use crate::detector::Detection;
use crate::record::{AddressFamily, DesiredRecordSet, DnsRecord, RecordType, marker_content};

/// Fully-qualified name for a label; the empty label is the apex
///
/// Names are lowercase, matching how the zone authority lists them.
pub fn fqdn(base_domain: &str, label: &str) -> String {
    let name = if label.is_empty() {
        base_domain.to_string()
    } else {
        format!("{}.{}", label, base_domain)
    };
    name.to_ascii_lowercase()
}

/// Build the desired records for one label
///
/// One address record per detected family, plus the ownership marker when
/// at least one address record exists.
pub fn build(
    base_domain: &str,
    label: &str,
    detection: &Detection,
    proxied: bool,
    owner: &str,
) -> DesiredRecordSet {
    let name = fqdn(base_domain, label);

    let address_record = |family: AddressFamily| {
        detection.address(family).map(|address| {
            DnsRecord::new(family.record_type(), &name, &address.value, proxied)
        })
    };

    let a = address_record(AddressFamily::Ipv4);
    let aaaa = address_record(AddressFamily::Ipv6);

    let marker = (a.is_some() || aaaa.is_some())
        .then(|| DnsRecord::new(RecordType::Txt, &name, marker_content(owner), false));

    DesiredRecordSet {
        name,
        a,
        aaaa,
        marker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AUTO_TTL, Address, is_owned_marker};

    fn detection(addresses: &[(AddressFamily, &str)]) -> Detection {
        Detection {
            addresses: addresses
                .iter()
                .map(|(family, value)| Address::new(*family, *value))
                .collect(),
            ..Detection::default()
        }
    }

    #[test]
    fn label_is_prefixed_to_base_domain() {
        assert_eq!(fqdn("example.com", "home"), "home.example.com");
        assert_eq!(fqdn("example.com", ""), "example.com");
    }

    #[test]
    fn names_are_lowercase() {
        assert_eq!(fqdn("Example.COM", "Home"), "home.example.com");
        assert_eq!(fqdn("Example.COM", ""), "example.com");
    }

    #[test]
    fn builds_address_and_marker_records() {
        let set = build(
            "example.com",
            "home",
            &detection(&[(AddressFamily::Ipv4, "203.0.113.5")]),
            true,
            "ddns-0",
        );

        assert_eq!(set.name, "home.example.com");

        let a = set.a.as_ref().expect("A record desired");
        assert_eq!(a.record_type, RecordType::A);
        assert_eq!(a.content, "203.0.113.5");
        assert!(a.proxied);
        assert_eq!(a.ttl, AUTO_TTL);
        assert!(a.id.is_empty());

        assert!(set.aaaa.is_none());

        let marker = set.marker.as_ref().expect("marker desired");
        assert_eq!(marker.name, "home.example.com");
        assert!(!marker.proxied);
        assert_eq!(marker.ttl, AUTO_TTL);
        assert!(is_owned_marker(&marker.content));
        assert!(marker.content.contains("owner=ddns-0"));
    }

    #[test]
    fn dual_stack_yields_both_address_records() {
        let set = build(
            "example.com",
            "",
            &detection(&[
                (AddressFamily::Ipv4, "203.0.113.5"),
                (AddressFamily::Ipv6, "2001:db8::1"),
            ]),
            false,
            "ddns-0",
        );

        let types: Vec<_> = set.address_records().map(|r| r.record_type).collect();
        assert_eq!(types, vec![RecordType::A, RecordType::Aaaa]);
        assert_eq!(set.address(AddressFamily::Ipv6).unwrap().name, "example.com");
    }

    #[test]
    fn nothing_detected_means_no_marker() {
        let set = build("example.com", "home", &Detection::default(), false, "ddns-0");
        assert!(set.a.is_none());
        assert!(set.aaaa.is_none());
        assert!(set.marker.is_none());
    }
}
