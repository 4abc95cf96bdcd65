use std::collections::HashMap;
use std::time::Duration;

use actix::fut::{ActorFutureExt, WrapFuture};
use actix::prelude::*;

use crate::activator::flow_mods_for_pledge;
use crate::agent_transport::ActionList;
use crate::context::CoreContext;
use crate::graph::actor::GraphActor;
use crate::graph::messages::{GetEndpoint, SnapshotQueueMap};
use crate::ids::EndpointId;
use crate::reservation::actor::ReservationsActor;
use crate::reservation::messages::{MarkPushResult, PushDue, QueueMapDue, RunCheckpointCadence};
use crate::reservation::Pledge;

/// Drives the three periodic duties spec.md §4.5 assigns the Activator:
/// queue-map regeneration, flow-mod push, and checkpoint cadence. None of
/// the teacher's actors run on a timer, so this is the one component with
/// no direct teacher analogue to imitate structurally — it follows
/// actix's own `run_interval` idiom instead (the crate the teacher already
/// depends on for everything else), documented in DESIGN.md.
pub struct ActivatorActor {
    graph: Addr<GraphActor>,
    reservations: Addr<ReservationsActor>,
    context: CoreContext,
    /// Seconds since the last checkpoint/purge pass, counted in tick
    /// units so the cadence doesn't need its own timer.
    secs_since_checkpoint: u64,
}

impl ActivatorActor {
    pub fn new(graph: Addr<GraphActor>, reservations: Addr<ReservationsActor>, context: CoreContext) -> Self {
        Self { graph, reservations, context, secs_since_checkpoint: 0 }
    }

    fn tick_secs(&self) -> u64 {
        self.context.config.activator_tick_secs.max(1)
    }
}

impl Actor for ActivatorActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let interval = Duration::from_secs(self.tick_secs());
        ctx.run_interval(interval, |act, ctx| act.tick(ctx));
    }
}

impl ActivatorActor {
    fn tick(&mut self, ctx: &mut Context<Self>) {
        let now = self.context.now();
        let graph = self.graph.clone();
        let reservations = self.reservations.clone();
        let config = self.context.config.clone();
        let agent_transport = self.context.agent_transport.clone();

        self.secs_since_checkpoint += self.tick_secs();
        let run_checkpoint = self.secs_since_checkpoint >= config.checkpoint_cadence_secs;
        if run_checkpoint {
            self.secs_since_checkpoint = 0;
        }

        let endpoint_only = config.endpoint_only_queues;

        let fut = async move {
            // Queue-map regeneration (spec.md §4.5): only pushed when some
            // pledge's commence or expiry crossed the clock since the last
            // tick, so a quiet network doesn't re-push an unchanged map.
            let queue_map_due = reservations.send(QueueMapDue { now }).await.unwrap_or(false);
            if queue_map_due {
                if let Ok(entries) = graph.send(SnapshotQueueMap { endpoint_only }).await {
                    let hosts: Vec<String> = entries.iter().map(|e| e.switch.clone()).collect();
                    let action = ActionList::setqueues(entries, hosts);
                    if let Err(e) = agent_transport.send(action).await {
                        log::warn!("queue-map push failed: {}", e);
                    }
                }
            }

            // Flow-mod push (spec.md §4.5): every pledge commencing within
            // the lookahead (or already past) that hasn't been pushed yet.
            let due = reservations.send(PushDue { now }).await.unwrap_or_default();
            let mut pushed_ids = Vec::new();
            let mut failed_ids = Vec::new();
            if !due.is_empty() {
                let mut switch_cache: HashMap<EndpointId, Option<crate::ids::SwitchId>> = HashMap::new();
                let mut all_cli = Vec::new();
                for pledge in &due {
                    resolve_switch(&graph, &pledge.src_endpoint, &mut switch_cache).await;
                    resolve_switch(&graph, &pledge.dst_endpoint, &mut switch_cache).await;
                }
                for pledge in &due {
                    let mods = flow_mods_for_pledge(pledge, |path| {
                        switch_cache.get(&path.src_endpoint).cloned().flatten()
                    });
                    all_cli.extend(mods.into_iter().map(|m| m.cli_args));
                }
                let action = ActionList::flowmod(all_cli);
                match agent_transport.send(action).await {
                    Ok(()) => pushed_ids.extend(due.iter().map(|p: &Pledge| p.id.clone())),
                    Err(e) => {
                        log::warn!("flow-mod push failed, will retry next tick: {}", e);
                        failed_ids.extend(due.iter().map(|p: &Pledge| p.id.clone()));
                    }
                }
            }

            // Checkpoint cadence (spec.md §4.5): writes the full checkpoint
            // and purges pledges that have been extinct long enough.
            let purged = if run_checkpoint {
                match reservations.send(RunCheckpointCadence { now }).await {
                    Ok(Ok(ids)) => ids,
                    Ok(Err(e)) => {
                        log::error!("checkpoint write failed: {}", e);
                        Vec::new()
                    }
                    Err(e) => {
                        log::error!("checkpoint cadence mailbox error: {}", e);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };

            (pushed_ids, failed_ids, purged)
        };

        ctx.spawn(fut.into_actor(self).map(|(pushed_ids, failed_ids, purged), act, _ctx| {
            if !pushed_ids.is_empty() {
                act.reservations.do_send(MarkPushResult { ids: pushed_ids, success: true });
            }
            if !failed_ids.is_empty() {
                act.reservations.do_send(MarkPushResult { ids: failed_ids, success: false });
            }
            if !purged.is_empty() {
                log::info!("purged {} extinct pledge(s)", purged.len());
            }
        }));
    }
}

async fn resolve_switch(graph: &Addr<GraphActor>, endpoint: &EndpointId, cache: &mut HashMap<EndpointId, Option<crate::ids::SwitchId>>) {
    if cache.contains_key(endpoint) {
        return;
    }
    let switch = graph.send(GetEndpoint(endpoint.clone())).await.ok().flatten().and_then(|e| e.switch);
    cache.insert(endpoint.clone(), switch);
}
