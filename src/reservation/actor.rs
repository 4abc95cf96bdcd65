use actix::fut::{self, ActorFutureExt, WrapFuture};
use actix::prelude::*;
use uuid::Uuid;

use crate::context::CoreContext;
use crate::dscp::DscpPolicy;
use crate::error::{CoreError, Result};
use crate::graph::actor::GraphActor;
use crate::graph::messages::{AdmitBandwidth, GetEndpoint, ReleasePaths, SetDiscount as GraphSetDiscount, SetTenantCap as GraphSetTenantCap};
use crate::graph::EndpointRef;
use crate::ids::{EndpointId, PledgeId, TenantId};
use crate::pathfinder::resolve_endpoint_ref;
use crate::reservation::inventory::Inventory;
use crate::reservation::messages::*;
use crate::reservation::path::Path;
use crate::reservation::pledge::{Pledge, PledgeKind};

/// Owns the live pledge cache and mediates every lifecycle transition
/// (spec.md §4.4, "Reservations (Inventory)"). The actual cache rules
/// (identity, checkpoint formatting) live in [`Inventory`], which stays
/// free of actor machinery so it is unit-testable on its own; this actor
/// is the thin shell that adds the `GraphActor` round trips `add`/
/// `delete`/`yank` require.
pub struct ReservationsActor {
    inventory: Inventory,
    graph: Addr<GraphActor>,
    context: CoreContext,
    /// Wall-clock of the previous tick, used to detect pledges that
    /// commenced or concluded since then (spec.md §4.5, "Queue-map
    /// regeneration").
    last_tick: i64,
}

impl ReservationsActor {
    pub fn new(graph: Addr<GraphActor>, context: CoreContext) -> Self {
        let now = context.now();
        Self { inventory: Inventory::new(), graph, context, last_tick: now }
    }

    fn now(&self) -> i64 {
        self.context.now()
    }

    /// Resolves the owning tenant for a `project/uuid` ref directly; for
    /// a bare uuid or an external ref, asks the Graph for the endpoint
    /// record it already holds (spec.md §6, "Endpoint identifiers").
    fn resolve_tenant(graph: Addr<GraphActor>, raw: &str) -> impl std::future::Future<Output = Result<TenantId>> {
        let raw = raw.to_string();
        async move {
            match EndpointRef::parse(&raw) {
                EndpointRef::ProjectScoped { project, .. } => Ok(project),
                EndpointRef::Uuid(id) => {
                    let endpoint = graph.send(GetEndpoint(id.clone())).await.map_err(|e| CoreError::Transient(e.to_string()))?;
                    endpoint.map(|e| e.project).ok_or_else(|| CoreError::EndpointUnknown(id.to_string()))
                }
                EndpointRef::External { ip } => {
                    let id = EndpointId::new(format!("!/{}", ip));
                    let endpoint = graph.send(GetEndpoint(id)).await.map_err(|e| CoreError::Transient(e.to_string()))?;
                    Ok(endpoint.map(|e| e.project).unwrap_or_else(|| TenantId::new("external")))
                }
            }
        }
    }
}

impl Actor for ReservationsActor {
    type Context = Context<Self>;
}

impl Handler<ReserveBandwidth> for ReservationsActor {
    type Result = ResponseActFuture<Self, Result<PledgeId>>;

    /// `validated → admitted → add` (spec.md §2, control flow): dup-check
    /// first, then the bidirectional search-and-commit happens as one
    /// `AdmitBandwidth` round trip to `GraphActor` so the ledger mutation
    /// for both directions is atomic with respect to any other admission
    /// (spec.md §5).
    fn handle(&mut self, msg: ReserveBandwidth, _ctx: &mut Self::Context) -> Self::Result {
        let ReserveBandwidth { src: src_raw, dst: dst_raw, commence: commence_raw, expiry, bandwidth_in_bps, bandwidth_out_bps, cookie, dscp_class } = msg;

        let now = self.now();
        if expiry <= now {
            return Box::pin(fut::ready(Err(CoreError::InvalidInput("expiry must be in the future".into()))));
        }
        let commence = commence_raw.max(now);
        let src = resolve_endpoint_ref(&src_raw);
        let dst = resolve_endpoint_ref(&dst_raw);

        if let Some(existing) = self.inventory.dup_check(&src, &dst, commence, expiry, now) {
            return Box::pin(fut::ready(Err(CoreError::DuplicateReservation(existing.to_string()))));
        }

        let dscp = dscp_class.as_deref().and_then(DscpPolicy::parse);
        if dscp_class.is_some() && dscp.is_none() {
            return Box::pin(fut::ready(Err(CoreError::InvalidInput(format!("unknown dscp class: {:?}", dscp_class)))));
        }

        let graph = self.graph.clone();
        let mlag_aware = self.context.config.mlag_aware_admission;
        let paused = self.inventory.is_paused();
        let pledge_id = PledgeId::new(Uuid::new_v4().to_string());

        let admit_src = src.clone();
        let admit_dst = dst.clone();
        let tenant_src_raw = src_raw;
        let admit_queue = pledge_id.clone();

        let fut = async move {
            let tenant = Self::resolve_tenant(graph.clone(), &tenant_src_raw).await?;

            let paths = graph
                .send(AdmitBandwidth {
                    src: admit_src,
                    dst: admit_dst,
                    t0: commence,
                    t1: expiry,
                    bandwidth_out_bps,
                    bandwidth_in_bps,
                    tenant: tenant.clone(),
                    mlag_aware,
                    queue: admit_queue,
                    probe_only: false,
                })
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))??;

            Ok((tenant, paths))
        };

        Box::pin(fut.into_actor(self).map(move |res: Result<(TenantId, Vec<Path>)>, act, _ctx| {
            let (tenant, paths) = res?;
            let pledge = Pledge {
                id: pledge_id.clone(),
                cookie,
                project: tenant,
                src_endpoint: src,
                dst_endpoint: dst,
                kind: PledgeKind::Bandwidth { bandwidth_in_bps, bandwidth_out_bps },
                commence,
                expiry,
                dscp,
                paths,
                // While paused, newly accepted pledges are marked pushed
                // immediately so they never activate until resumed
                // (spec.md §4.4, "pause/resume").
                pushed: paused,
                paused: false,
            };
            act.inventory.add(pledge)?;
            Ok(pledge_id)
        }))
    }
}

impl Handler<ReserveBandwidthOneWay> for ReservationsActor {
    type Result = ResponseActFuture<Self, Result<PledgeId>>;

    fn handle(&mut self, msg: ReserveBandwidthOneWay, _ctx: &mut Self::Context) -> Self::Result {
        let ReserveBandwidthOneWay { src: src_raw, dst: dst_raw, commence: commence_raw, expiry, bandwidth_out_bps, cookie, dscp_class } = msg;

        let now = self.now();
        if expiry <= now {
            return Box::pin(fut::ready(Err(CoreError::InvalidInput("expiry must be in the future".into()))));
        }
        let commence = commence_raw.max(now);
        let src = resolve_endpoint_ref(&src_raw);
        let dst = resolve_endpoint_ref(&dst_raw);

        if let Some(existing) = self.inventory.dup_check(&src, &dst, commence, expiry, now) {
            return Box::pin(fut::ready(Err(CoreError::DuplicateReservation(existing.to_string()))));
        }

        let dscp = dscp_class.as_deref().and_then(DscpPolicy::parse);
        let graph = self.graph.clone();
        let paused = self.inventory.is_paused();
        let pledge_id = PledgeId::new(Uuid::new_v4().to_string());

        let admit_src = src.clone();
        let admit_dst = dst.clone();
        let tenant_src_raw = src_raw;
        let admit_queue = pledge_id.clone();

        let fut = async move {
            let tenant = Self::resolve_tenant(graph.clone(), &tenant_src_raw).await?;
            // One-way admission only ever runs the outbound search; the
            // reverse leg is requested with zero bandwidth, which
            // `pathfinder::build_paths` treats as "no traversal needed"
            // (spec.md §4.2).
            let paths = graph
                .send(AdmitBandwidth {
                    src: admit_src,
                    dst: admit_dst,
                    t0: commence,
                    t1: expiry,
                    bandwidth_out_bps,
                    bandwidth_in_bps: 0,
                    tenant: tenant.clone(),
                    mlag_aware: false,
                    queue: admit_queue,
                    probe_only: false,
                })
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))??;
            Ok((tenant, paths))
        };

        Box::pin(fut.into_actor(self).map(move |res: Result<(TenantId, Vec<Path>)>, act, _ctx| {
            let (tenant, paths) = res?;
            let pledge = Pledge {
                id: pledge_id.clone(),
                cookie,
                project: tenant,
                src_endpoint: src,
                dst_endpoint: dst,
                kind: PledgeKind::OneWayBandwidth { bandwidth_out_bps },
                commence,
                expiry,
                dscp,
                paths,
                pushed: paused,
                paused: false,
            };
            act.inventory.add(pledge)?;
            Ok(pledge_id)
        }))
    }
}

impl Handler<CapacityCheck> for ReservationsActor {
    type Result = ResponseActFuture<Self, Result<Vec<Path>>>;

    /// Runs the same admission search as a reservation but with
    /// `probe_only: true`, so `GraphActor` reports whether capacity
    /// exists without mutating any ledger (spec.md §6, `CAPACITY_CHECK`).
    fn handle(&mut self, msg: CapacityCheck, _ctx: &mut Self::Context) -> Self::Result {
        let CapacityCheck { src: src_raw, dst: dst_raw, commence, expiry, bandwidth_in_bps, bandwidth_out_bps } = msg;
        let now = self.now();
        let commence = commence.max(now);
        let src = resolve_endpoint_ref(&src_raw);
        let dst = resolve_endpoint_ref(&dst_raw);
        let graph = self.graph.clone();
        let mlag_aware = self.context.config.mlag_aware_admission;

        let fut = async move {
            let tenant = Self::resolve_tenant(graph.clone(), &src_raw).await?;
            graph
                .send(AdmitBandwidth {
                    src,
                    dst,
                    t0: commence,
                    t1: expiry,
                    bandwidth_out_bps,
                    bandwidth_in_bps,
                    tenant,
                    mlag_aware,
                    queue: PledgeId::new("probe"),
                    probe_only: true,
                })
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))?
        };

        Box::pin(fut.into_actor(self).map(|res, _act, _ctx| res))
    }
}

impl Handler<DeletePledge> for ReservationsActor {
    type Result = ResponseActFuture<Self, Result<()>>;

    /// Link allocations must be released *before* expiry is reset to
    /// "now + grace" (spec.md §4.4, "Deletion ordering rule"); otherwise
    /// the ledger's window-split logic leaves dangling windows whose
    /// queues never get cleaned up.
    fn handle(&mut self, msg: DeletePledge, _ctx: &mut Self::Context) -> Self::Result {
        let super_cookie = self.context.config.super_cookie.clone();
        let prepared = self.inventory.prepare_delete(&msg.id, msg.cookie.as_deref(), &super_cookie);
        let (paths, commence, expiry) = match prepared {
            Ok(v) => v,
            Err(e) => return Box::pin(fut::ready(Err(e))),
        };

        let graph = self.graph.clone();
        let id = msg.id.clone();
        let fut = async move {
            graph.send(ReleasePaths { paths, queue: id, t0: commence, t1: expiry }).await.map_err(|e| CoreError::Transient(e.to_string()))?;
            Ok(())
        };

        let now = self.now();
        let grace = self.context.config.delete_grace_secs;
        Box::pin(fut.into_actor(self).map(move |res: Result<()>, act, _ctx| {
            res?;
            act.inventory.finalize_delete(&msg.id, now, grace)
        }))
    }
}

impl Handler<RefreshPledge> for ReservationsActor {
    type Result = ResponseActFuture<Self, Result<()>>;

    /// Clones the pledge under a derived `.yank` id (expiring soon, so
    /// the Activator tears down its old flow rules), releases the real
    /// pledge's paths, re-admits a replacement, and re-attaches it — all
    /// without ever leaving a window where the pledge has no coverage
    /// (spec.md §4.4, `yank`; GLOSSARY "Yank"; scenario 4).
    fn handle(&mut self, msg: RefreshPledge, _ctx: &mut Self::Context) -> Self::Result {
        let now = self.now();
        let grace = self.context.config.delete_grace_secs;

        let prepared = self.inventory.prepare_yank(&msg.id);
        let (pledge, old_paths) = match prepared {
            Ok(v) => v,
            Err(e) => return Box::pin(fut::ready(Err(e))),
        };
        if let Err(e) = self.inventory.complete_yank(&msg.id, now, grace) {
            return Box::pin(fut::ready(Err(e)));
        }

        let graph = self.graph.clone();
        let mlag_aware = self.context.config.mlag_aware_admission;
        let (bandwidth_in_bps, bandwidth_out_bps) = pledge.bandwidth_bps();
        let src = pledge.src_endpoint.clone();
        let dst = pledge.dst_endpoint.clone();
        let tenant = pledge.project.clone();
        let commence = pledge.commence.max(now);
        let expiry = pledge.expiry;
        let id = msg.id.clone();

        let fut = async move {
            graph.send(ReleasePaths { paths: old_paths, queue: id.clone(), t0: commence, t1: expiry }).await.map_err(|e| CoreError::Transient(e.to_string()))?;

            graph
                .send(AdmitBandwidth {
                    src,
                    dst,
                    t0: commence,
                    t1: expiry,
                    bandwidth_out_bps,
                    bandwidth_in_bps,
                    tenant,
                    mlag_aware,
                    queue: id,
                    probe_only: false,
                })
                .await
                .map_err(|e| CoreError::Transient(e.to_string()))?
        };

        Box::pin(fut.into_actor(self).map(move |res: Result<Vec<Path>>, act, _ctx| {
            let paths = res?;
            act.inventory.reattach_paths(&msg.id, paths)
        }))
    }
}

impl Handler<ListPledges> for ReservationsActor {
    type Result = String;

    fn handle(&mut self, _msg: ListPledges, _ctx: &mut Self::Context) -> Self::Result {
        let now = self.now();
        let pledges = self.inventory.list(now);
        serde_json::to_string(&pledges).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Handler<SetTenantCap> for ReservationsActor {
    type Result = ();

    fn handle(&mut self, msg: SetTenantCap, _ctx: &mut Self::Context) {
        let tenant = TenantId::new(msg.tenant);
        self.inventory.set_tenant_cap(tenant.clone(), msg.percent);
        self.graph.do_send(GraphSetTenantCap { tenant, percent: msg.percent });
    }
}

impl Handler<SetDiscount> for ReservationsActor {
    type Result = ();

    fn handle(&mut self, msg: SetDiscount, _ctx: &mut Self::Context) {
        self.graph.do_send(GraphSetDiscount { value: msg.value });
    }
}

impl Handler<Pause> for ReservationsActor {
    type Result = ();

    fn handle(&mut self, _msg: Pause, _ctx: &mut Self::Context) {
        self.inventory.pause();
    }
}

impl Handler<Resume> for ReservationsActor {
    type Result = ();

    fn handle(&mut self, _msg: Resume, _ctx: &mut Self::Context) {
        self.inventory.resume();
    }
}

impl Handler<Checkpoint> for ReservationsActor {
    type Result = Result<()>;

    fn handle(&mut self, _msg: Checkpoint, _ctx: &mut Self::Context) -> Self::Result {
        let now = self.now();
        self.inventory.checkpoint_write(&self.context.config.checkpoint_path, now)
    }
}

impl Handler<Load> for ReservationsActor {
    type Result = ResponseActFuture<Self, Result<()>>;

    /// The checkpoint file is the source of truth on restart; the
    /// network topology may differ from when it was written, so every
    /// record is re-admitted through `PathFinder` rather than trusted
    /// blindly (spec.md §4.4, `checkpoint_load`; scenario 6).
    fn handle(&mut self, msg: Load, _ctx: &mut Self::Context) -> Self::Result {
        let parsed = match Inventory::parse_checkpoint(&msg.path) {
            Ok(p) => p,
            Err(e) => return Box::pin(fut::ready(Err(e))),
        };
        let graph = self.graph.clone();
        let mlag_aware = self.context.config.mlag_aware_admission;

        let fut = async move {
            let mut restored = Vec::new();
            for record in parsed.pledges {
                if record.expiry <= record.commence {
                    log::warn!("checkpoint record {} has a non-positive window; skipping", record.id);
                    continue;
                }
                let (bandwidth_in_bps, bandwidth_out_bps) = match &record.kind {
                    PledgeKind::Bandwidth { bandwidth_in_bps, bandwidth_out_bps } => (*bandwidth_in_bps, *bandwidth_out_bps),
                    PledgeKind::OneWayBandwidth { bandwidth_out_bps } => (0, *bandwidth_out_bps),
                    PledgeKind::Steering { .. } => continue,
                };
                let admission = graph
                    .send(AdmitBandwidth {
                        src: record.src.clone(),
                        dst: record.dst.clone(),
                        t0: record.commence,
                        t1: record.expiry,
                        bandwidth_out_bps,
                        bandwidth_in_bps,
                        tenant: record.project.clone(),
                        mlag_aware,
                        queue: record.id.clone(),
                        probe_only: false,
                    })
                    .await;

                match admission {
                    Ok(Ok(paths)) => restored.push((record, paths)),
                    Ok(Err(e)) => log::warn!("checkpoint record {} failed re-admission: {}", record.id, e),
                    Err(e) => log::warn!("checkpoint record {} failed re-admission: mailbox error {}", record.id, e),
                }
            }
            (restored, parsed.tenant_caps)
        };

        Box::pin(fut.into_actor(self).map(|(restored, tenant_caps), act, _ctx| {
            for (record, paths) in restored {
                let pledge = Pledge {
                    id: record.id,
                    cookie: record.cookie,
                    project: record.project,
                    src_endpoint: record.src,
                    dst_endpoint: record.dst,
                    kind: record.kind,
                    commence: record.commence,
                    expiry: record.expiry,
                    dscp: record.dscp,
                    paths,
                    pushed: record.pushed,
                    paused: record.paused,
                };
                act.inventory.restore_pledge(pledge);
            }
            act.inventory.restore_tenant_caps(tenant_caps);
            Ok(())
        }))
    }
}

impl Handler<QueueMapDue> for ReservationsActor {
    type Result = bool;

    fn handle(&mut self, msg: QueueMapDue, _ctx: &mut Self::Context) -> Self::Result {
        let since = self.last_tick;
        let due = self.inventory.iter().any(|p| (p.commence > since && p.commence <= msg.now) || (p.expiry > since && p.expiry <= msg.now));
        self.last_tick = msg.now;
        due
    }
}

impl Handler<PushDue> for ReservationsActor {
    type Result = Vec<Pledge>;

    /// While globally paused, nothing activates — newly accepted pledges
    /// are already marked `pushed` at admission time so they are never
    /// returned here in the first place (spec.md §4.4, "pause/resume").
    fn handle(&mut self, msg: PushDue, _ctx: &mut Self::Context) -> Self::Result {
        if self.inventory.is_paused() {
            return Vec::new();
        }
        let lookahead = self.context.config.activation_lookahead_secs;
        self.inventory.iter().filter(|p| p.due_for_push(msg.now, lookahead)).cloned().collect()
    }
}

impl Handler<MarkPushResult> for ReservationsActor {
    type Result = ();

    fn handle(&mut self, msg: MarkPushResult, _ctx: &mut Self::Context) {
        for id in &msg.ids {
            if let Some(p) = self.inventory.get_mut(id) {
                p.pushed = msg.success;
            }
        }
    }
}

impl Handler<RunCheckpointCadence> for ReservationsActor {
    type Result = Result<Vec<PledgeId>>;

    fn handle(&mut self, msg: RunCheckpointCadence, _ctx: &mut Self::Context) -> Self::Result {
        self.inventory.checkpoint_write(&self.context.config.checkpoint_path, msg.now)?;
        Ok(self.inventory.purge_extinct(msg.now, self.context.config.purge_grace_secs))
    }
}
