//! Public IP detection
//!
//! [`IpDetector::refresh`] asks the [`AddressSource`] for every enabled
//! family, extracts the `ip` value from the echo response and compares it with
//! the value stored in [`AddressState`].
//!
//! A family whose detection fails is reported as *not detected* for the
//! cycle. Downstream this means "leave this family's records alone", never
//! "the address was removed".

use crate::error::{Error, Result};
use crate::record::{Address, AddressFamily};
use crate::state::AddressState;
use crate::traits::AddressSource;
use tracing::{debug, info, warn};

/// Result of one detection round
#[derive(Debug, Default)]
pub struct Detection {
    /// Addresses detected this round, in family order
    pub addresses: Vec<Address>,
    /// Whether any detected address differs from the stored one
    pub changed: bool,
    /// Families whose detection failed
    pub failures: Vec<(AddressFamily, Error)>,
}

impl Detection {
    /// Detected address for a family
    pub fn address(&self, family: AddressFamily) -> Option<&Address> {
        self.addresses.iter().find(|a| a.family == family)
    }

    /// Whether no family was detected
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Queries the echo endpoints and tracks address changes
pub struct IpDetector {
    source: Box<dyn AddressSource>,
}

impl IpDetector {
    /// Create a detector on top of an address source
    pub fn new(source: Box<dyn AddressSource>) -> Self {
        Self { source }
    }

    /// Detect the current address of every enabled family
    ///
    /// Successful detections are written to `state`. Failed families keep
    /// their stored value and are listed in [`Detection::failures`].
    pub async fn refresh(
        &self,
        families: &[AddressFamily],
        state: &mut AddressState,
    ) -> Detection {
        info!("Refreshing IP addresses");
        let mut detection = Detection::default();

        for &family in families {
            let address = match self.detect(family).await {
                Ok(address) => address,
                Err(e) => {
                    warn!(
                        "Failed to detect {} address via {}: {}",
                        family,
                        self.source.source_name(),
                        e
                    );
                    detection.failures.push((family, e));
                    continue;
                }
            };

            let previous = state.get(family).map(str::to_owned);
            if state.record(&address) {
                info!(
                    "Updating recorded {} address from {} to {}",
                    family,
                    previous.as_deref().unwrap_or("None"),
                    address.value
                );
                detection.changed = true;
            } else {
                debug!("{} address unchanged: {}", family, address.value);
            }

            detection.addresses.push(address);
        }

        if !detection.changed {
            info!("Public IP addresses haven't been changed since last update");
        }

        detection
    }

    async fn detect(&self, family: AddressFamily) -> Result<Address> {
        let body = self.source.fetch(family).await?;
        let value = parse_trace(&body)?;
        Ok(Address::new(family, value))
    }
}

/// Extract the `ip` value from an echo response
///
/// The body is made of newline-separated `key=value` lines. Lines without
/// `=` (including the trailing empty line) are ignored; only the first `=`
/// of a line separates key and value. The value is returned verbatim.
pub fn parse_trace(body: &str) -> Result<String> {
    body.lines()
        .filter_map(|line| line.split_once('='))
        .find(|(key, _)| *key == "ip")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::detection("echo response has no `ip` entry"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    const TRACE: &str = "fl=29f1\nh=1.1.1.1\nip=203.0.113.5\nts=1700000000.123\nvisit_scheme=https\nuag=cfddns\nwarp=off\n";

    struct FixedSource(HashMap<AddressFamily, String>);

    #[async_trait]
    impl AddressSource for FixedSource {
        async fn fetch(&self, family: AddressFamily) -> Result<String> {
            self.0
                .get(&family)
                .cloned()
                .ok_or_else(|| Error::detection(format!("{} endpoint unreachable", family)))
        }

        fn source_name(&self) -> &'static str {
            "fixed"
        }
    }

    fn detector(entries: &[(AddressFamily, &str)]) -> IpDetector {
        let map = entries
            .iter()
            .map(|(family, body)| (*family, body.to_string()))
            .collect();
        IpDetector::new(Box::new(FixedSource(map)))
    }

    #[test]
    fn parses_ip_from_trace_body() {
        assert_eq!(parse_trace(TRACE).unwrap(), "203.0.113.5");
    }

    #[test]
    fn missing_ip_key_is_a_detection_error() {
        let err = parse_trace("fl=29f1\nh=1.1.1.1\n\n").unwrap_err();
        assert!(matches!(err, Error::Detection(_)));
    }

    #[test]
    fn value_is_not_normalized() {
        assert_eq!(parse_trace("h=x\r\nip=2001:DB8:0::1\r\n").unwrap(), "2001:DB8:0::1");
    }

    #[test]
    fn value_may_contain_equals_sign() {
        assert_eq!(parse_trace("uag=a=b\nip=2001:db8::1\n").unwrap(), "2001:db8::1");
    }

    #[tokio::test]
    async fn first_refresh_reports_change() {
        let detector = detector(&[(AddressFamily::Ipv4, TRACE)]);
        let mut state = AddressState::new();

        let detection = detector.refresh(&[AddressFamily::Ipv4], &mut state).await;

        assert!(detection.changed);
        assert_eq!(
            detection.address(AddressFamily::Ipv4).map(|a| a.value.as_str()),
            Some("203.0.113.5")
        );
        assert_eq!(state.get(AddressFamily::Ipv4), Some("203.0.113.5"));
    }

    #[tokio::test]
    async fn second_refresh_with_same_address_is_unchanged() {
        let detector = detector(&[(AddressFamily::Ipv4, TRACE)]);
        let mut state = AddressState::new();

        detector.refresh(&[AddressFamily::Ipv4], &mut state).await;
        let detection = detector.refresh(&[AddressFamily::Ipv4], &mut state).await;

        assert!(!detection.changed);
        assert_eq!(detection.addresses.len(), 1);
    }

    #[tokio::test]
    async fn failed_family_is_skipped_and_keeps_stored_value() {
        let mut state = AddressState::new();
        state.record(&Address::new(AddressFamily::Ipv6, "2001:db8::1"));

        // IPv6 endpoint unreachable
        let detector = detector(&[(AddressFamily::Ipv4, TRACE)]);
        let detection = detector
            .refresh(&[AddressFamily::Ipv4, AddressFamily::Ipv6], &mut state)
            .await;

        assert!(detection.address(AddressFamily::Ipv6).is_none());
        assert_eq!(detection.failures.len(), 1);
        assert_eq!(detection.failures[0].0, AddressFamily::Ipv6);
        assert_eq!(state.get(AddressFamily::Ipv6), Some("2001:db8::1"));
    }

    #[tokio::test]
    async fn disabled_family_is_not_queried() {
        let detector = detector(&[
            (AddressFamily::Ipv4, TRACE),
            (AddressFamily::Ipv6, "ip=2001:db8::1\n"),
        ]);
        let mut state = AddressState::new();

        let detection = detector.refresh(&[AddressFamily::Ipv6], &mut state).await;

        assert!(detection.address(AddressFamily::Ipv4).is_none());
        assert!(state.get(AddressFamily::Ipv4).is_none());
    }
}
