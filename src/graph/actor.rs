use actix::prelude::*;

use crate::error::Result;
use crate::graph::messages::{AdmitBandwidth, GetEndpoint, GetFence, Rebuild, ReleasePaths, SetDiscount, SetTenantCap, SnapshotQueueMap};
use crate::graph::{Endpoint, GraphModel};
use crate::ledger::Fence;
use crate::pathfinder;

/// Owns the single `GraphModel` and is the sole writer of every link's
/// ledger (spec.md §5, "All mutations to a Link's ledger are serialized
/// through the Graph task that owns it"). Path-finding runs as a plain
/// function call from inside this actor's handlers, never across a
/// message boundary, so the spec's "path-finding never takes the lock"
/// note holds without any lock at all.
pub struct GraphActor {
    model: GraphModel,
}

impl GraphActor {
    pub fn new(model: GraphModel) -> Self {
        Self { model }
    }
}

impl Actor for GraphActor {
    type Context = Context<Self>;
}

impl Handler<Rebuild> for GraphActor {
    type Result = ();

    fn handle(&mut self, msg: Rebuild, _ctx: &mut Self::Context) {
        self.model.rebuild(&msg.topology, msg.endpoints.as_ref());
    }
}

impl Handler<AdmitBandwidth> for GraphActor {
    type Result = Result<Vec<crate::reservation::Path>>;

    /// Runs the forward+reverse search and, unless `probe_only`, commits
    /// both directions' ledger allocations before returning — admission
    /// and commit happen in the same actor turn so no other request can
    /// interleave between them (spec.md §5, "For a single pledge, admit
    /// → add → push → expire is strictly ordered").
    fn handle(&mut self, msg: AdmitBandwidth, _ctx: &mut Self::Context) -> Self::Result {
        let paths = pathfinder::build_paths(&mut self.model, &msg.src, &msg.dst, msg.t0, msg.t1, msg.bandwidth_out_bps, msg.bandwidth_in_bps, &msg.tenant, msg.mlag_aware)?;

        if !msg.probe_only {
            for path in &paths {
                pathfinder::commit_path(&mut self.model, path, msg.queue.clone(), msg.t0, msg.t1);
            }
        }

        Ok(paths)
    }
}

impl Handler<ReleasePaths> for GraphActor {
    type Result = ();

    fn handle(&mut self, msg: ReleasePaths, _ctx: &mut Self::Context) {
        for path in &msg.paths {
            pathfinder::release_path(&mut self.model, path, msg.queue.clone(), msg.t0, msg.t1);
        }
    }
}

impl Handler<SetTenantCap> for GraphActor {
    type Result = ();

    fn handle(&mut self, msg: SetTenantCap, _ctx: &mut Self::Context) {
        self.model.set_tenant_cap(&msg.tenant, msg.percent);
    }
}

impl Handler<SetDiscount> for GraphActor {
    type Result = ();

    fn handle(&mut self, msg: SetDiscount, _ctx: &mut Self::Context) {
        self.model.set_discount(msg.value);
    }
}

impl Handler<GetEndpoint> for GraphActor {
    type Result = Option<Endpoint>;

    fn handle(&mut self, msg: GetEndpoint, _ctx: &mut Self::Context) -> Self::Result {
        self.model.endpoint(&msg.0).cloned()
    }
}

impl Handler<GetFence> for GraphActor {
    type Result = Fence;

    fn handle(&mut self, msg: GetFence, _ctx: &mut Self::Context) -> Self::Result {
        self.model.get_fence(&msg.link, &msg.tenant)
    }
}

impl Handler<SnapshotQueueMap> for GraphActor {
    type Result = Vec<crate::agent_transport::QueueEntry>;

    /// Aggregates a `(switch, port, queue, bw_min, bw_max, priority)`
    /// entry per queue contribution across every link (spec.md §4.5,
    /// "Queue-map regeneration"). Intermediate (non-endpoint) switch
    /// ports are dropped when `endpoint_only` is requested, per the
    /// Activator's configured mode.
    fn handle(&mut self, msg: SnapshotQueueMap, _ctx: &mut Self::Context) -> Self::Result {
        let mut entries = Vec::new();
        for link in self.model.links() {
            let Some(src_switch) = self.model.switch(&link.src) else { continue };
            let is_endpoint_port = !src_switch.is_transit_only();
            if msg.endpoint_only && !is_endpoint_port {
                continue;
            }
            for window in link.ledger.windows() {
                for (queue, (out_bps, in_bps)) in &window.per_queue {
                    let bw = (*out_bps).max(*in_bps);
                    if bw <= 0 {
                        continue;
                    }
                    entries.push(crate::agent_transport::QueueEntry {
                        switch: link.src.to_string(),
                        port: link.src_port,
                        queue_id: queue.to_string(),
                        bandwidth_min_bps: 0,
                        bandwidth_max_bps: bw,
                        priority: if is_endpoint_port { 1 } else { 0 },
                    });
                }
            }
        }
        entries
    }
}

/// Convenience wrapper for callers outside the actor system (tests, the
/// demo binary) that want a synchronous admission path without spinning
/// up an actix runtime. Mirrors exactly what `Handler<AdmitBandwidth>`
/// does above.
pub fn admit_bandwidth_sync(model: &mut GraphModel, msg: AdmitBandwidth) -> Result<Vec<crate::reservation::Path>> {
    let paths = pathfinder::build_paths(model, &msg.src, &msg.dst, msg.t0, msg.t1, msg.bandwidth_out_bps, msg.bandwidth_in_bps, &msg.tenant, msg.mlag_aware)?;
    if !msg.probe_only {
        for path in &paths {
            pathfinder::commit_path(model, path, msg.queue.clone(), msg.t0, msg.t1);
        }
    }
    Ok(paths)
}

pub fn release_paths_sync(model: &mut GraphModel, paths: &[crate::reservation::Path], queue: crate::ids::PledgeId, t0: i64, t1: i64) {
    for path in paths {
        pathfinder::release_path(model, path, queue.clone(), t0, t1);
    }
}
