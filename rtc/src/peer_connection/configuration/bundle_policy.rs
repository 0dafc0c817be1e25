use std::fmt;

use serde::{Deserialize, Serialize};

/// Affects which media tracks are negotiated if the remote endpoint is not
/// bundle-aware, and what ICE candidates are gathered.
///
/// With `Balanced` and `MaxBundle` generated offers carry one `a=group:BUNDLE`
/// line and a single session-level fingerprint. `MaxCompat` repeats the
/// transport attributes on every media line.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcbundlepolicy-enum)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCBundlePolicy {
    #[default]
    Unspecified = 0,

    /// Gather ICE candidates for each media type in use (audio, video, and data).
    #[serde(rename = "balanced")]
    Balanced = 1,

    /// Gather ICE candidates for each track.
    #[serde(rename = "max-compat")]
    MaxCompat = 2,

    /// Gather ICE candidates for only one track.
    #[serde(rename = "max-bundle")]
    MaxBundle = 3,
}

const BUNDLE_POLICY_BALANCED_STR: &str = "balanced";
const BUNDLE_POLICY_MAX_COMPAT_STR: &str = "max-compat";
const BUNDLE_POLICY_MAX_BUNDLE_STR: &str = "max-bundle";

impl From<&str> for RTCBundlePolicy {
    fn from(raw: &str) -> Self {
        match raw {
            BUNDLE_POLICY_BALANCED_STR => RTCBundlePolicy::Balanced,
            BUNDLE_POLICY_MAX_COMPAT_STR => RTCBundlePolicy::MaxCompat,
            BUNDLE_POLICY_MAX_BUNDLE_STR => RTCBundlePolicy::MaxBundle,
            _ => RTCBundlePolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCBundlePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCBundlePolicy::Balanced => BUNDLE_POLICY_BALANCED_STR,
            RTCBundlePolicy::MaxCompat => BUNDLE_POLICY_MAX_COMPAT_STR,
            RTCBundlePolicy::MaxBundle => BUNDLE_POLICY_MAX_BUNDLE_STR,
            RTCBundlePolicy::Unspecified => super::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCBundlePolicy {
    /// Maps `Unspecified` to the W3C default, `Balanced`.
    pub fn resolve(self) -> Self {
        match self {
            RTCBundlePolicy::Unspecified => RTCBundlePolicy::Balanced,
            policy => policy,
        }
    }

    /// Whether generated offers group every media line into one BUNDLE transport.
    pub(crate) fn bundles(self) -> bool {
        matches!(
            self.resolve(),
            RTCBundlePolicy::Balanced | RTCBundlePolicy::MaxBundle
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_bundle_policy() {
        let tests = vec![
            ("Unspecified", RTCBundlePolicy::Unspecified),
            ("balanced", RTCBundlePolicy::Balanced),
            ("max-compat", RTCBundlePolicy::MaxCompat),
            ("max-bundle", RTCBundlePolicy::MaxBundle),
        ];

        for (policy_string, expected_policy) in tests {
            assert_eq!(RTCBundlePolicy::from(policy_string), expected_policy);
            assert_eq!(expected_policy.to_string(), policy_string);
        }
    }

    #[test]
    fn test_bundle_policy_resolve() {
        let tests = vec![
            (RTCBundlePolicy::Unspecified, RTCBundlePolicy::Balanced, true),
            (RTCBundlePolicy::Balanced, RTCBundlePolicy::Balanced, true),
            (RTCBundlePolicy::MaxCompat, RTCBundlePolicy::MaxCompat, false),
            (RTCBundlePolicy::MaxBundle, RTCBundlePolicy::MaxBundle, true),
        ];

        for (policy, resolved, bundles) in tests {
            assert_eq!(policy.resolve(), resolved);
            assert_eq!(policy.bundles(), bundles, "{policy}");
        }
    }

    #[test]
    fn test_bundle_policy_json() {
        let data = serde_json::to_string(&RTCBundlePolicy::MaxBundle).unwrap();
        assert_eq!(data, r#""max-bundle""#);
        let policy: RTCBundlePolicy = serde_json::from_str(r#""balanced""#).unwrap();
        assert_eq!(policy, RTCBundlePolicy::Balanced);
    }
}
