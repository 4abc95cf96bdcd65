use serde::{Deserialize, Serialize};

use crate::dscp::DscpPolicy;
use crate::ids::{EndpointId, PledgeId, TenantId};
use crate::reservation::path::Path;

/// Which contract a pledge represents (spec.md §3, "Pledge").
/// `Steering` is carried only for interface completeness — its
/// middlebox-traversal execution lives in the (out-of-scope) steering
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PledgeKind {
    Bandwidth { bandwidth_in_bps: i64, bandwidth_out_bps: i64 },
    OneWayBandwidth { bandwidth_out_bps: i64 },
    Steering { middleboxes: Vec<String> },
}

/// A committed reservation. Lifecycle: created → validated → admitted
/// (paths set) → activated by the Activator (`pushed = true`) → expired
/// → extinct, purged `purge_grace_secs` after expiry, and only if it was
/// ever pushed (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pledge {
    pub id: PledgeId,
    pub cookie: Option<String>,
    pub project: TenantId,
    pub src_endpoint: EndpointId,
    pub dst_endpoint: EndpointId,
    pub kind: PledgeKind,
    pub commence: i64,
    pub expiry: i64,
    pub dscp: Option<DscpPolicy>,
    pub paths: Vec<Path>,
    pub pushed: bool,
    pub paused: bool,
}

impl Pledge {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expiry
    }

    pub fn is_active(&self, now: i64) -> bool {
        now >= self.commence && now < self.expiry
    }

    pub fn is_pending(&self, now: i64) -> bool {
        now < self.commence
    }

    /// True once a pledge is far enough past expiry (and was ever pushed)
    /// that it should be purged from the cache entirely (spec.md §3,
    /// §4.4, §8 invariant).
    pub fn is_extinct(&self, now: i64, purge_grace_secs: i64) -> bool {
        self.pushed && self.is_expired(now) && (now - self.expiry) > purge_grace_secs
    }

    /// Whether `commence` falls inside the activator's push lookahead
    /// window (spec.md §4.5, "Flow-mod push": "within the next 15s or in
    /// the past").
    pub fn due_for_push(&self, now: i64, lookahead_secs: i64) -> bool {
        !self.pushed && self.commence <= now + lookahead_secs
    }

    pub fn bandwidth_bps(&self) -> (i64, i64) {
        match &self.kind {
            PledgeKind::Bandwidth { bandwidth_in_bps, bandwidth_out_bps } => (*bandwidth_in_bps, *bandwidth_out_bps),
            PledgeKind::OneWayBandwidth { bandwidth_out_bps } => (0, *bandwidth_out_bps),
            PledgeKind::Steering { .. } => (0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pledge(kind: PledgeKind) -> Pledge {
        Pledge {
            id: PledgeId::new("p1"),
            cookie: None,
            project: TenantId::new("t1"),
            src_endpoint: EndpointId::new("a"),
            dst_endpoint: EndpointId::new("b"),
            kind,
            commence: 100,
            expiry: 200,
            dscp: None,
            paths: vec![],
            pushed: false,
            paused: false,
        }
    }

    #[test]
    fn lifecycle_states_are_mutually_exclusive() {
        let p = pledge(PledgeKind::Bandwidth { bandwidth_in_bps: 0, bandwidth_out_bps: 0 });
        assert!(p.is_pending(50));
        assert!(!p.is_active(50));
        assert!(p.is_active(150));
        assert!(!p.is_pending(150));
        assert!(p.is_expired(200));
        assert!(!p.is_active(200));
    }

    #[test]
    fn extinct_requires_having_been_pushed_and_past_the_grace_period() {
        let mut p = pledge(PledgeKind::Bandwidth { bandwidth_in_bps: 0, bandwidth_out_bps: 0 });
        assert!(!p.is_extinct(250, 30), "never pushed, so it's not purged even long after expiry");

        p.pushed = true;
        assert!(!p.is_extinct(210, 30), "still inside the grace window");
        assert!(p.is_extinct(300, 30));
    }

    #[test]
    fn due_for_push_honors_the_lookahead_window_and_skips_already_pushed() {
        let mut p = pledge(PledgeKind::Bandwidth { bandwidth_in_bps: 0, bandwidth_out_bps: 0 });
        assert!(!p.due_for_push(50, 15), "commence is 50s out, beyond a 15s lookahead");
        assert!(p.due_for_push(90, 15), "commence is 10s out, inside a 15s lookahead");
        assert!(p.due_for_push(150, 15), "commence is already in the past");

        p.pushed = true;
        assert!(!p.due_for_push(150, 15));
    }

    #[test]
    fn bandwidth_bps_reads_the_right_field_per_kind() {
        assert_eq!(pledge(PledgeKind::Bandwidth { bandwidth_in_bps: 10, bandwidth_out_bps: 20 }).bandwidth_bps(), (10, 20));
        assert_eq!(pledge(PledgeKind::OneWayBandwidth { bandwidth_out_bps: 30 }).bandwidth_bps(), (0, 30));
        assert_eq!(pledge(PledgeKind::Steering { middleboxes: vec![] }).bandwidth_bps(), (0, 0));
    }
}
