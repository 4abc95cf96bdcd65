use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{CoreError, Result};
use crate::graph::GraphModel;
use crate::ids::{LinkId, SwitchId, TenantId};
use crate::ledger::Direction;
use crate::pathfinder::{PathTarget, target_matches};

/// Classical Dijkstra from `source`, admission-gated: before following a
/// link to a neighbor, its ledger is queried via `has_capacity`
/// (spec.md §4.2, "Shortest path"). A link failing capacity is treated
/// as not traversable, but the failure is remembered in
/// `capacity_tripped` so the caller can tell `NoPath` from `NoCapacity`.
/// All costs are currently equal, so this degenerates to a BFS with
/// first-found tie-breaking, same as the spec's "Tie-breaking" note.
pub fn shortest_path(graph: &mut GraphModel, source: &SwitchId, target: &PathTarget, t0: i64, t1: i64, bandwidth_bps: i64, direction: Direction, tenant: &TenantId) -> Result<Vec<LinkId>> {
    if target_matches(graph, source, target) {
        return Ok(Vec::new());
    }

    let mut dist: HashMap<SwitchId, u64> = HashMap::new();
    let mut prev: HashMap<SwitchId, (SwitchId, LinkId)> = HashMap::new();
    let mut visited: HashSet<SwitchId> = HashSet::new();
    let mut heap: BinaryHeap<Reverse<(u64, SwitchId)>> = BinaryHeap::new();
    let mut capacity_tripped = false;

    dist.insert(source.clone(), 0);
    heap.push(Reverse((0, source.clone())));

    let mut found: Option<SwitchId> = None;

    while let Some(Reverse((cost, switch))) = heap.pop() {
        if !visited.insert(switch.clone()) {
            continue;
        }

        let Some(sw) = graph.switch(&switch) else { continue };
        let outgoing: Vec<LinkId> = sw.links_out.clone();

        for link_id in outgoing {
            let Some(link) = graph.link(&link_id) else { continue };
            let neighbor = link.dst.clone();
            if visited.contains(&neighbor) {
                continue;
            }
            let link_cost = link.cost as u64;

            let fence = graph.get_fence(&link_id, tenant);
            let Some(link) = graph.link(&link_id) else { continue };
            let check = link.ledger.has_capacity(t0, t1, bandwidth_bps, tenant, &fence);
            if !check.fits {
                capacity_tripped = true;
                continue;
            }
            if check.alarm {
                log::warn!("link {} would cross its alarm threshold if admitted", link_id);
            }

            let next_cost = cost + link_cost;
            if next_cost < *dist.get(&neighbor).unwrap_or(&u64::MAX) {
                dist.insert(neighbor.clone(), next_cost);
                prev.insert(neighbor.clone(), (switch.clone(), link_id.clone()));
                heap.push(Reverse((next_cost, neighbor.clone())));
            }

            // Termination: a neighbor hosting the destination endpoint,
            // or equal to the destination switch (gateway reservations),
            // ends the search (spec.md §4.2, "Termination").
            if target_matches(graph, &neighbor, target) {
                found = Some(neighbor);
                break;
            }
        }
        if found.is_some() {
            break;
        }
    }

    match found {
        Some(mut cur) => {
            let mut links = Vec::new();
            while let Some((parent, link_id)) = prev.get(&cur).cloned() {
                links.push(link_id);
                cur = parent;
            }
            links.reverse();
            Ok(links)
        }
        None if capacity_tripped => Err(CoreError::NoCapacity(direction)),
        None => Err(CoreError::NoPath),
    }
}
