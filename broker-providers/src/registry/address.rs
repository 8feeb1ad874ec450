//! Provider address parsing and resolution (spec.md §4.4, §6, §8).

use broker_core::error::{BrokerError, BrokerResult};

/// The parsed halves of a `provider:app` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub provider: Option<String>,
    pub app: String,
}

/// Split on the first colon: `provider:app` or bare `app`.
pub fn parse(addr: &str) -> Address {
    match addr.split_once(':') {
        Some((provider, app)) => Address {
            provider: Some(provider.to_string()),
            app: app.to_string(),
        },
        None => Address {
            provider: None,
            app: addr.to_string(),
        },
    }
}

/// Resolve a parsed address to a concrete provider name, given a
/// predicate for "is this provider registered" and the default provider
/// name. If the named provider is absent, fall back to the default and
/// pass the original app through unchanged. If the default is also
/// absent, fail with `provider-unavailable`.
pub fn resolve(
    address: &Address,
    is_registered: impl Fn(&str) -> bool,
    default_provider: Option<&str>,
) -> BrokerResult<String> {
    if let Some(provider) = &address.provider {
        if is_registered(provider) {
            return Ok(provider.clone());
        }
    }

    match default_provider {
        Some(default) if is_registered(default) => Ok(default.to_string()),
        _ => Err(BrokerError::ProviderUnavailable(
            "no provider matches the request and no default is set".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_and_app() {
        let addr = parse("aggA:gmail");
        assert_eq!(addr.provider, Some("aggA".to_string()));
        assert_eq!(addr.app, "gmail");
    }

    #[test]
    fn bare_app_has_no_provider() {
        let addr = parse("gmail");
        assert_eq!(addr.provider, None);
        assert_eq!(addr.app, "gmail");
    }

    #[test]
    fn resolves_bare_app_to_default_provider() {
        let addr = parse("gmail");
        let resolved = resolve(&addr, |p| p == "aggA", Some("aggA")).unwrap();
        assert_eq!(resolved, "aggA");
    }

    #[test]
    fn falls_back_to_default_when_named_provider_is_unregistered() {
        let addr = parse("unknown:gmail");
        let resolved = resolve(&addr, |p| p == "aggA", Some("aggA")).unwrap();
        assert_eq!(resolved, "aggA");
    }

    #[test]
    fn fails_when_no_default_and_no_match() {
        let addr = parse("unknown:gmail");
        let err = resolve(&addr, |p| p == "aggA", None).unwrap_err();
        assert_eq!(err.kind(), "provider-unavailable");
    }

    #[test]
    fn named_provider_wins_when_registered() {
        let addr = parse("aggB:gmail");
        let resolved = resolve(&addr, |p| p == "aggA" || p == "aggB", Some("aggA")).unwrap();
        assert_eq!(resolved, "aggB");
    }
}
