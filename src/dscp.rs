use serde::{Deserialize, Serialize};

/// Traffic class a pledge's DSCP marking policy names (spec.md §6,
/// "DSCP table"). A small fixed mapping from class to DSCP value; the
/// `global_` prefix on the user-facing class name requests the rewrite be
/// skipped on egress (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficClass {
    Voice,
    Control,
    Data,
}

impl TrafficClass {
    /// In-network DSCP value this class is rewritten to on ingress.
    pub fn dscp_value(self) -> u8 {
        match self {
            TrafficClass::Voice => 46,
            TrafficClass::Control => 48,
            TrafficClass::Data => 10,
        }
    }
}

/// A pledge's DSCP marking policy: the traffic class to rewrite to, and
/// whether the user's original DSCP should be preserved on egress instead
/// (the `global_*` class request, spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DscpPolicy {
    pub class: TrafficClass,
    pub preserve_on_egress: bool,
}

impl DscpPolicy {
    pub fn parse(user_class: &str) -> Option<Self> {
        let (preserve_on_egress, bare) = match user_class.strip_prefix("global_") {
            Some(rest) => (true, rest),
            None => (false, user_class),
        };
        let class = match bare {
            "voice" => TrafficClass::Voice,
            "control" => TrafficClass::Control,
            "data" => TrafficClass::Data,
            _ => return None,
        };
        Some(Self { class, preserve_on_egress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_class() {
        let policy = DscpPolicy::parse("voice").unwrap();
        assert_eq!(policy.class, TrafficClass::Voice);
        assert!(!policy.preserve_on_egress);
    }

    #[test]
    fn global_prefix_requests_preservation() {
        let policy = DscpPolicy::parse("global_data").unwrap();
        assert_eq!(policy.class, TrafficClass::Data);
        assert!(policy.preserve_on_egress);
    }

    #[test]
    fn unknown_class_rejected() {
        assert!(DscpPolicy::parse("nonsense").is_none());
        assert!(DscpPolicy::parse("global_nonsense").is_none());
    }
}
