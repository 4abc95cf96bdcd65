use actix::prelude::*;

use crate::error::Result;
use crate::ids::PledgeId;

/// `RESERVE_BW` (spec.md §6). No project field travels on the wire — the
/// owning tenant is derived from the endpoint identifier grammar
/// (`project/uuid`) or, for a bare uuid/external ref, from the endpoint
/// record the Graph already holds (spec.md §6, "Endpoint identifiers").
#[derive(Message)]
#[rtype(result = "Result<PledgeId>")]
pub struct ReserveBandwidth {
    pub src: String,
    pub dst: String,
    pub commence: i64,
    pub expiry: i64,
    pub bandwidth_in_bps: i64,
    pub bandwidth_out_bps: i64,
    pub cookie: Option<String>,
    pub dscp_class: Option<String>,
}

/// `RESERVE_BW_ONEWAY` (spec.md §6): egress-only rate limit at the
/// source's switch; no reverse search is run.
#[derive(Message)]
#[rtype(result = "Result<PledgeId>")]
pub struct ReserveBandwidthOneWay {
    pub src: String,
    pub dst: String,
    pub commence: i64,
    pub expiry: i64,
    pub bandwidth_out_bps: i64,
    pub cookie: Option<String>,
    pub dscp_class: Option<String>,
}

/// `CAPACITY_CHECK` (spec.md §6): runs the same search as a reservation
/// but never commits ledger allocations or caches a pledge.
#[derive(Message)]
#[rtype(result = "Result<Vec<crate::reservation::Path>>")]
pub struct CapacityCheck {
    pub src: String,
    pub dst: String,
    pub commence: i64,
    pub expiry: i64,
    pub bandwidth_in_bps: i64,
    pub bandwidth_out_bps: i64,
}

#[derive(Message)]
#[rtype(result = "Result<()>")]
pub struct DeletePledge {
    pub id: PledgeId,
    pub cookie: Option<String>,
}

/// `LIST` (spec.md §6): a JSON array of non-expired pledges.
#[derive(Message)]
#[rtype(result = "String")]
pub struct ListPledges;

/// Used internally by `refresh`/topology-change handling (spec.md §4.4,
/// "yank"): clones the pledge under a derived id, releases the real
/// pledge's paths, and re-admits a replacement path so there is never a
/// window with no coverage.
#[derive(Message)]
#[rtype(result = "Result<()>")]
pub struct RefreshPledge {
    pub id: PledgeId,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetTenantCap {
    pub tenant: String,
    pub percent: f64,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetDiscount {
    pub value: f64,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Pause;

#[derive(Message)]
#[rtype(result = "()")]
pub struct Resume;

#[derive(Message)]
#[rtype(result = "Result<()>")]
pub struct Checkpoint;

#[derive(Message)]
#[rtype(result = "Result<()>")]
pub struct Load {
    pub path: String,
}

/// Internal messages the `ActivatorActor` sends once per tick (spec.md
/// §4.5). Kept separate from the externally-reachable request kinds
/// above since nothing outside the core ever issues them.
/// True iff any pledge commenced or concluded since the last tick,
/// meaning the queue-map needs to be regenerated.
#[derive(Message)]
#[rtype(result = "bool")]
pub struct QueueMapDue {
    pub now: i64,
}

/// Clones of every pledge whose commence time is within the push
/// lookahead (or already past) and that is not yet `pushed`.
#[derive(Message)]
#[rtype(result = "Vec<crate::reservation::Pledge>")]
pub struct PushDue {
    pub now: i64,
}

/// Sets `pushed` on success, clears it on failure so the next tick
/// retries the push (spec.md §4.5, §7 "Propagation policy").
#[derive(Message)]
#[rtype(result = "()")]
pub struct MarkPushResult {
    pub ids: Vec<PledgeId>,
    pub success: bool,
}

/// Writes the full checkpoint and purges extinct pledges (spec.md §4.5,
/// "Checkpoint cadence"). Returns the purged ids for the Activator to
/// log.
#[derive(Message)]
#[rtype(result = "Result<Vec<PledgeId>>")]
pub struct RunCheckpointCadence {
    pub now: i64,
}
