pub mod actor;

use crate::agent_transport::FlowModEntry;
use crate::dscp::{DscpPolicy, TrafficClass};
use crate::ids::SwitchId;
use crate::ledger::Direction;
use crate::reservation::{Path, Pledge};

/// Table a flow-mod resubmits to before returning to table 0, so
/// generated rules compose with pre-existing rules instead of looping
/// (spec.md §4.5, "Resubmission discipline" — "a hard correctness
/// constraint on flow-mod generation, not an optimization").
const METADATA_TABLE: u8 = 20;

/// Builds the flow-mod CLI-equivalent strings a single pledge needs,
/// one per direction it has a `Path` for (spec.md §4.5, "Flow-mod
/// push"). `switch_of` resolves the switch that should host a given
/// path's first rule — the path's own source switch for a normal path,
/// or the endpoint's attaching switch for a zero-link one-way/virtual
/// leg.
///
/// DSCP handling (spec.md §4.5, "DSCP mapping"): each traffic class maps
/// to exactly one DSCP codepoint (spec.md §6, "DSCP table"). The
/// outbound leg's rule matches that codepoint and re-stamps it — a
/// normalizing rewrite, since the tenant is expected to have already
/// tagged the class's codepoint — and the inbound leg's rule mirrors it
/// back on the return path. `preserve_on_egress` (the `global_*` class)
/// suppresses only the *inbound* leg's rewrite, so whatever marking
/// exists downstream of the network is left alone on the way out.
pub fn flow_mods_for_pledge(pledge: &Pledge, switch_of: impl Fn(&Path) -> Option<SwitchId>) -> Vec<FlowModEntry> {
    let mut out = Vec::new();
    for path in &pledge.paths {
        let Some(switch) = switch_of(path) else { continue };
        let cli = build_cli_args(pledge, path, &switch);
        out.push(FlowModEntry { host: switch.to_string(), cli_args: cli });
    }
    out
}

fn build_cli_args(pledge: &Pledge, path: &Path, switch: &SwitchId) -> String {
    let priority = 100;
    let mut clauses = vec![
        format!("switch={}", switch),
        format!("cookie={}", pledge.id),
        format!("priority={}", priority),
        format!("nw_src={}", path.src_endpoint),
        format!("nw_dst={}", path.dst_endpoint),
        format!("actions=meter:{}", path.bandwidth_bps.max(1)),
    ];

    if let Some(dscp) = pledge.dscp {
        clauses.push(dscp_clause(dscp, path.direction));
    }

    clauses.push(format!("resubmit(,{})", METADATA_TABLE));
    clauses.push("resubmit(,0)".to_string());
    clauses.join(",")
}

fn dscp_clause(policy: DscpPolicy, direction: Direction) -> String {
    let value = policy.class.dscp_value();
    match direction {
        Direction::Outbound => format!("dscp_match={},dscp_set={}", value, value),
        Direction::Inbound => {
            if policy.preserve_on_egress {
                format!("dscp_match={}", value)
            } else {
                format!("dscp_match={},dscp_set={}", value, value)
            }
        }
        Direction::Both => format!("dscp_match={},dscp_set={}", value, value),
    }
}

/// Whether this traffic class's table entry should appear at all when
/// only endpoint queues are wanted (spec.md §4.5, "Queue-map
/// regeneration": "intermediate priority-queue entries are silently
/// dropped in that mode").
pub fn is_endpoint_class(class: TrafficClass) -> bool {
    matches!(class, TrafficClass::Voice | TrafficClass::Control | TrafficClass::Data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EndpointId, PledgeId, TenantId};
    use crate::reservation::PledgeKind;

    fn pledge_with_one_path(dscp: Option<DscpPolicy>) -> Pledge {
        Pledge {
            id: PledgeId::new("p1"),
            cookie: None,
            project: TenantId::new("t1"),
            src_endpoint: EndpointId::new("a"),
            dst_endpoint: EndpointId::new("b"),
            kind: PledgeKind::Bandwidth { bandwidth_in_bps: 500_000_000, bandwidth_out_bps: 500_000_000 },
            commence: 0,
            expiry: 100,
            dscp,
            paths: vec![Path::new(Direction::Outbound, vec![], 500_000_000, EndpointId::new("a"), EndpointId::new("b"), TenantId::new("t1"))],
            pushed: false,
            paused: false,
        }
    }

    #[test]
    fn generates_one_flow_mod_per_path_and_resolved_switch() {
        let pledge = pledge_with_one_path(None);
        let mods = flow_mods_for_pledge(&pledge, |_| Some(SwitchId::new("s1")));
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].host, "s1");
        assert!(mods[0].cli_args.contains("resubmit(,20)"), "resubmits to the metadata table before table 0");
        assert!(mods[0].cli_args.ends_with("resubmit(,0)"), "always falls through to table 0 last");
    }

    #[test]
    fn unresolvable_switch_drops_the_path_silently() {
        let pledge = pledge_with_one_path(None);
        let mods = flow_mods_for_pledge(&pledge, |_| None);
        assert!(mods.is_empty());
    }

    #[test]
    fn outbound_leg_always_rewrites_dscp() {
        let policy = DscpPolicy { class: TrafficClass::Voice, preserve_on_egress: true };
        let clause = dscp_clause(policy, Direction::Outbound);
        assert_eq!(clause, "dscp_match=46,dscp_set=46");
    }

    #[test]
    fn preserve_on_egress_suppresses_only_the_inbound_rewrite() {
        let policy = DscpPolicy { class: TrafficClass::Data, preserve_on_egress: true };
        let clause = dscp_clause(policy, Direction::Inbound);
        assert_eq!(clause, "dscp_match=10", "global_* class matches but doesn't restamp on the inbound leg");

        let normal = DscpPolicy { class: TrafficClass::Data, preserve_on_egress: false };
        let clause = dscp_clause(normal, Direction::Inbound);
        assert_eq!(clause, "dscp_match=10,dscp_set=10");
    }
}
