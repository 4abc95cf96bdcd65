pub mod all_paths;
pub mod shortest;

pub use crate::ledger::Direction;

use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::graph::{EndpointRef, GraphModel};
use crate::ids::{EndpointId, LinkId, SwitchId, TenantId};
use crate::reservation::path::Path;

/// What a search is trying to reach: a specific endpoint (the normal
/// case) or a bare switch (supports reservations to a gateway, spec.md
/// §4.2, "Termination").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    Endpoint(EndpointId),
    Switch(SwitchId),
}

pub(crate) fn target_matches(graph: &GraphModel, switch: &SwitchId, target: &PathTarget) -> bool {
    match target {
        PathTarget::Switch(id) => switch == id,
        PathTarget::Endpoint(id) => graph.switch(switch).map(|s| s.hosts_endpoint(id)).unwrap_or(false),
    }
}

fn resolve_switch(graph: &GraphModel, endpoint: &EndpointId) -> Result<SwitchId> {
    graph
        .endpoint(endpoint)
        .and_then(|e| e.switch.clone())
        .ok_or_else(|| CoreError::EndpointUnknown(endpoint.to_string()))
}

/// Resolves an [`EndpointRef`] to a concrete [`EndpointId`] already known
/// to the graph. The core never parses the grammar further than this —
/// project-scoped and external refs both resolve by their inner uuid/ip
/// because the OpenStack-adapter collaborator is the one that would have
/// minted the corresponding `Endpoint` record (spec.md §6).
pub fn resolve_endpoint_ref(raw: &str) -> EndpointId {
    match EndpointRef::parse(raw) {
        EndpointRef::Uuid(id) => id,
        EndpointRef::ProjectScoped { uuid, .. } => uuid,
        EndpointRef::External { ip } => EndpointId::new(format!("!/{}", ip)),
    }
}

/// Runs the forward (outbound) and reverse (inbound) searches a
/// bandwidth reservation needs and concatenates the resulting `Path`s
/// (spec.md §4.2, "Bidirectional admission"). Both directions must
/// succeed; the specific failed direction (or `Both`) is reported
/// otherwise. `mlag_aware` selects the MLAG-debit variant of the search.
pub fn build_paths(
    graph: &mut GraphModel,
    src: &EndpointId,
    dst: &EndpointId,
    t0: i64,
    t1: i64,
    bandwidth_out_bps: i64,
    bandwidth_in_bps: i64,
    tenant: &TenantId,
    mlag_aware: bool,
) -> Result<Vec<Path>> {
    let src_switch = resolve_switch(graph, src)?;
    let dst_switch = resolve_switch(graph, dst)?;

    let outbound = find_direction(graph, &src_switch, &dst_switch, src, dst, t0, t1, bandwidth_out_bps, Direction::Outbound, tenant, mlag_aware);
    let inbound = find_direction(graph, &dst_switch, &src_switch, dst, src, t0, t1, bandwidth_in_bps, Direction::Inbound, tenant, mlag_aware);

    match (outbound, inbound) {
        (Ok(out), Ok(inb)) => Ok(vec![out, inb]),
        (Err(out_err), Err(in_err)) => {
            let out_is_capacity = matches!(out_err, CoreError::NoCapacity(_));
            let in_is_capacity = matches!(in_err, CoreError::NoCapacity(_));
            if out_is_capacity || in_is_capacity {
                Err(CoreError::NoCapacity(Direction::Both))
            } else {
                Err(CoreError::NoPath)
            }
        }
        (Err(CoreError::NoCapacity(_)), _) => Err(CoreError::NoCapacity(Direction::Outbound)),
        (_, Err(CoreError::NoCapacity(_))) => Err(CoreError::NoCapacity(Direction::Inbound)),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

#[allow(clippy::too_many_arguments)]
fn find_direction(
    graph: &mut GraphModel,
    from_switch: &SwitchId,
    to_switch: &SwitchId,
    from_endpoint: &EndpointId,
    to_endpoint: &EndpointId,
    t0: i64,
    t1: i64,
    bandwidth_bps: i64,
    direction: Direction,
    tenant: &TenantId,
    mlag_aware: bool,
) -> Result<Path> {
    if bandwidth_bps == 0 {
        // One-way reservations carry zero in the direction they don't
        // rate-limit (spec.md §3, "OneWayBandwidth"); no link traversal
        // needed in that direction.
        return Ok(Path::new(direction, Vec::new(), 0, from_endpoint.clone(), to_endpoint.clone(), tenant.clone()));
    }

    if from_switch == to_switch {
        let virtual_link = graph.find_or_make_link(from_switch.clone(), to_switch.clone(), i64::MAX / 2, true);
        let fence = graph.get_fence(&virtual_link, tenant);
        let link = graph.link(&virtual_link).expect("just created");
        let check = link.ledger.has_capacity(t0, t1, bandwidth_bps, tenant, &fence);
        if !check.fits {
            return Err(CoreError::NoCapacity(direction));
        }
        return Ok(Path::new(direction, vec![virtual_link], bandwidth_bps, from_endpoint.clone(), to_endpoint.clone(), tenant.clone()));
    }

    if !graph.same_component(from_switch, to_switch) {
        if !graph.relaxed_mode() {
            return Err(CoreError::NoPath);
        }
        log::warn!("source and destination are in disjoint partitions; bridging with a synthetic relaxed-mode link between {} and {}", from_switch, to_switch);
        let synthetic = graph.find_or_make_link(from_switch.clone(), to_switch.clone(), i64::MAX / 2, true);
        let fence = graph.get_fence(&synthetic, tenant);
        let link = graph.link(&synthetic).expect("just created");
        let check = link.ledger.has_capacity(t0, t1, bandwidth_bps, tenant, &fence);
        if !check.fits {
            return Err(CoreError::NoCapacity(direction));
        }
        return Ok(Path::new(direction, vec![synthetic], bandwidth_bps, from_endpoint.clone(), to_endpoint.clone(), tenant.clone()));
    }

    let target = PathTarget::Endpoint(to_endpoint.clone());
    let links = shortest::shortest_path(graph, from_switch, &target, t0, t1, bandwidth_bps, direction, tenant)?;

    if mlag_aware {
        for link_id in &links {
            mlag_debit_preview(graph, link_id);
        }
    }

    Ok(Path::new(direction, links, bandwidth_bps, from_endpoint.clone(), to_endpoint.clone(), tenant.clone()))
}

/// Logs which sibling links an MLAG-aware admission will also debit once
/// `commit_path` runs; the actual mirrored `change_allocation` calls
/// happen at commit time (spec.md §4.3, "MLAG debit"), not during the
/// read-only search.
fn mlag_debit_preview(graph: &GraphModel, link_id: &LinkId) {
    let Some(link) = graph.link(link_id) else { return };
    let Some(group_name) = &link.mlag_group else { return };
    let Some(group) = graph.mlag_group(group_name) else { return };
    let siblings: Vec<&LinkId> = group.siblings_of(link_id).collect();
    if !siblings.is_empty() {
        log::debug!("link {} is part of MLAG group {}; {} sibling(s) will mirror this allocation", link_id, group_name, siblings.len());
    }
}

/// Commits a previously-found `Path` to every traversed link's ledger
/// (and, for MLAG members, their siblings'), crediting `queue` and
/// `tenant` in each window (spec.md §4.3, "MLAG debit").
pub fn commit_path(graph: &mut GraphModel, path: &Path, queue: crate::ids::PledgeId, t0: i64, t1: i64) {
    let mut touched: HashSet<LinkId> = HashSet::new();
    for link_id in &path.links {
        apply_allocation(graph, link_id, path, queue.clone(), t0, t1, &mut touched);

        let siblings: Vec<LinkId> = graph.link(link_id).and_then(|l| l.mlag_group.clone()).and_then(|g| graph.mlag_group(&g).map(|grp| grp.siblings_of(link_id).cloned().collect())).unwrap_or_default();
        for sibling in siblings {
            apply_allocation(graph, &sibling, path, queue.clone(), t0, t1, &mut touched);
        }
    }
}

fn apply_allocation(graph: &mut GraphModel, link_id: &LinkId, path: &Path, queue: crate::ids::PledgeId, t0: i64, t1: i64, touched: &mut HashSet<LinkId>) {
    if !touched.insert(link_id.clone()) {
        return;
    }
    let Some(link) = graph.link_mut(link_id) else { return };
    link.ledger.change_allocation(t0, t1, path.bandwidth_bps, path.direction, queue, path.tenant_fence.clone());
}

/// Reverses a previously committed `Path`'s allocation (used by
/// `delete`/`yank`, spec.md §4.4).
pub fn release_path(graph: &mut GraphModel, path: &Path, queue: crate::ids::PledgeId, t0: i64, t1: i64) {
    let mut touched: HashSet<LinkId> = HashSet::new();
    for link_id in &path.links {
        release_allocation(graph, link_id, path, queue.clone(), t0, t1, &mut touched);
        let siblings: Vec<LinkId> = graph.link(link_id).and_then(|l| l.mlag_group.clone()).and_then(|g| graph.mlag_group(&g).map(|grp| grp.siblings_of(link_id).cloned().collect())).unwrap_or_default();
        for sibling in siblings {
            release_allocation(graph, &sibling, path, queue.clone(), t0, t1, &mut touched);
        }
    }
}

fn release_allocation(graph: &mut GraphModel, link_id: &LinkId, path: &Path, queue: crate::ids::PledgeId, t0: i64, t1: i64, touched: &mut HashSet<LinkId>) {
    if !touched.insert(link_id.clone()) {
        return;
    }
    let Some(link) = graph.link_mut(link_id) else { return };
    link.ledger.change_allocation(t0, t1, -path.bandwidth_bps, path.direction, queue, path.tenant_fence.clone());
}
