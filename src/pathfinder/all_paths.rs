use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::graph::GraphModel;
use crate::ids::{LinkId, SwitchId, TenantId};
use crate::ledger::Direction;
use crate::pathfinder::{PathTarget, target_matches};

/// Depth-first enumeration of every simple path from `source` to
/// `target`. On each recursive advance the current switch is marked
/// visited; on reaching the target the current edge list is copied into
/// the trail list; on return, visited is cleared so alternate paths
/// through the same switch can still be found (spec.md §4.2,
/// "All paths").
///
/// Capacity is **not** checked during enumeration. After all trails are
/// found, the union of links appearing in *any* trail is re-checked for
/// capacity one by one; if any union member lacks capacity the whole
/// attempt fails with `NoCapacity` — even if some individual trail was
/// fully admittable on its own. This preserves the source behavior
/// verbatim (spec.md §9, "Open question"): all-paths mode guarantees
/// every possible path is admittable, not merely that some path is.
pub fn all_paths(graph: &mut GraphModel, source: &SwitchId, target: &PathTarget, t0: i64, t1: i64, bandwidth_bps: i64, direction: Direction, tenant: &TenantId, max_trails: usize) -> Result<Vec<Vec<LinkId>>> {
    let mut trails: Vec<Vec<LinkId>> = Vec::new();
    let mut visited: HashSet<SwitchId> = HashSet::new();
    let mut current: Vec<LinkId> = Vec::new();

    enumerate(graph, source, target, &mut visited, &mut current, &mut trails, max_trails);

    if trails.is_empty() {
        return Err(CoreError::NoPath);
    }

    let mut union: HashSet<LinkId> = HashSet::new();
    for trail in &trails {
        union.extend(trail.iter().cloned());
    }

    for link_id in &union {
        if graph.link(link_id).is_none() {
            continue;
        }
        let fence = graph.get_fence(link_id, tenant);
        let link = graph.link(link_id).expect("checked above");
        let check = link.ledger.has_capacity(t0, t1, bandwidth_bps, tenant, &fence);
        if !check.fits {
            return Err(CoreError::NoCapacity(direction));
        }
    }

    Ok(trails)
}

fn enumerate(graph: &GraphModel, switch: &SwitchId, target: &PathTarget, visited: &mut HashSet<SwitchId>, current: &mut Vec<LinkId>, trails: &mut Vec<Vec<LinkId>>, max_trails: usize) {
    if trails.len() >= max_trails {
        return;
    }

    if target_matches(graph, switch, target) && !current.is_empty() {
        trails.push(current.clone());
        return;
    }

    visited.insert(switch.clone());

    if let Some(sw) = graph.switch(switch) {
        for link_id in &sw.links_out {
            if trails.len() >= max_trails {
                break;
            }
            let Some(link) = graph.link(link_id) else { continue };
            if visited.contains(&link.dst) {
                continue;
            }
            current.push(link_id.clone());
            enumerate(graph, &link.dst.clone(), target, visited, current, trails, max_trails);
            current.pop();
        }
    }

    visited.remove(switch);
}
