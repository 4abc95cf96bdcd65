use actix::prelude::*;

use crate::agent_transport::QueueEntry;
use crate::error::Result;
use crate::graph::{Endpoint, EndpointUpdate, Topology};
use crate::ids::{EndpointId, LinkId, PledgeId, TenantId};
use crate::ledger::Fence;
use crate::reservation::Path;

/// Replace the graph's switches/links from a fresh topology snapshot
/// (spec.md §4.1, `rebuild`).
#[derive(Message)]
#[rtype(result = "()")]
pub struct Rebuild {
    pub topology: Topology,
    pub endpoints: Option<EndpointUpdate>,
}

/// Runs the forward+reverse path search and, on success, commits the
/// resulting paths' ledger allocations in the same Graph-task turn so no
/// other request can interleave between admission and commit (spec.md
/// §5, "Ordering guarantees").
#[derive(Message)]
#[rtype(result = "Result<Vec<Path>>")]
pub struct AdmitBandwidth {
    pub src: EndpointId,
    pub dst: EndpointId,
    pub t0: i64,
    pub t1: i64,
    pub bandwidth_out_bps: i64,
    pub bandwidth_in_bps: i64,
    pub tenant: TenantId,
    pub mlag_aware: bool,
    pub queue: PledgeId,
    /// When true, only probes capacity — no ledger mutation (spec.md
    /// §6, `CAPACITY_CHECK`).
    pub probe_only: bool,
}

/// Releases a previously committed set of paths' ledger allocations
/// (spec.md §4.4, `delete`/`yank`).
#[derive(Message)]
#[rtype(result = "()")]
pub struct ReleasePaths {
    pub paths: Vec<Path>,
    pub queue: PledgeId,
    pub t0: i64,
    pub t1: i64,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetTenantCap {
    pub tenant: TenantId,
    pub percent: f64,
}

/// `SET_DISCOUNT` (spec.md §6): `value >= 101` is an absolute bits/sec
/// deduction applied to every link's declared capacity; `0..=100` is a
/// percentage deduction. Applied on top of the already-headroom-reduced
/// capacity the next time a link is created or its raw capacity changes.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SetDiscount {
    pub value: f64,
}

#[derive(Message)]
#[rtype(result = "Option<Endpoint>")]
pub struct GetEndpoint(pub EndpointId);

#[derive(Message)]
#[rtype(result = "Fence")]
pub struct GetFence {
    pub link: LinkId,
    pub tenant: TenantId,
}

/// Aggregated `(switch, port, queue, bw_min, bw_max, priority)` map
/// across every link in the graph, for the Activator's queue-map push
/// (spec.md §4.5).
#[derive(Message)]
#[rtype(result = "Vec<QueueEntry>")]
pub struct SnapshotQueueMap {
    pub endpoint_only: bool,
}
