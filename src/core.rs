use std::sync::Arc;

use actix::prelude::*;

use crate::activator::actor::ActivatorActor;
use crate::agent_transport::AgentTransport;
use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::context::CoreContext;
use crate::error::Result;
use crate::graph::actor::GraphActor;
use crate::graph::messages::Rebuild;
use crate::graph::{EndpointUpdate, GraphModel, Topology};
use crate::ids::PledgeId;
use crate::reservation::actor::ReservationsActor;
use crate::reservation::messages::{
    CapacityCheck, Checkpoint, DeletePledge, Load, ListPledges, Pause, ReserveBandwidth, ReserveBandwidthOneWay, Resume, SetDiscount, SetTenantCap,
};
use crate::reservation::{CoreRequest, Path};

/// The top-level handle a caller (the demo binary, or an embedding
/// application) holds: three actor addresses plus the shared context,
/// wired together once at startup (spec.md §2, "five long-running
/// components" minus PathFinder, which is a plain function the Graph
/// actor calls — see SPEC_FULL.md's architecture notes).
#[derive(Clone)]
pub struct Core {
    pub graph: Addr<GraphActor>,
    pub reservations: Addr<ReservationsActor>,
    pub activator: Addr<ActivatorActor>,
    pub context: CoreContext,
}

/// Result shape for [`Core::dispatch`], one variant per [`CoreRequest`]
/// that returns data back to the caller.
#[derive(Debug)]
pub enum CoreResponse {
    PledgeId(PledgeId),
    Paths(Vec<Path>),
    List(String),
    Unit,
}

impl Core {
    pub fn start(config: CoreConfig, clock: Arc<dyn Clock>, agent_transport: Arc<dyn AgentTransport>) -> Self {
        let context = CoreContext::new(config, clock, agent_transport);
        let model = GraphModel::new(context.config.clone());
        let graph = GraphActor::new(model).start();
        let reservations = ReservationsActor::new(graph.clone(), context.clone()).start();
        let activator = ActivatorActor::new(graph.clone(), reservations.clone(), context.clone()).start();
        Self { graph, reservations, activator, context }
    }

    /// Replaces the live topology/endpoint set (spec.md §4.1, `rebuild`).
    pub async fn rebuild(&self, topology: Topology, endpoints: Option<EndpointUpdate>) -> Result<()> {
        self.graph.send(Rebuild { topology, endpoints }).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))
    }

    /// Dispatches one externally-facing request kind (spec.md §6) to the
    /// `ReservationsActor`, translating its sealed-enum shape into the
    /// corresponding actix message.
    pub async fn dispatch(&self, request: CoreRequest) -> Result<CoreResponse> {
        match request {
            CoreRequest::ReserveBandwidth { src, dst, commence, expiry, bandwidth_in_bps, bandwidth_out_bps, cookie, dscp_class } => {
                let id = self
                    .reservations
                    .send(ReserveBandwidth { src, dst, commence, expiry, bandwidth_in_bps, bandwidth_out_bps, cookie, dscp_class })
                    .await
                    .map_err(|e| crate::error::CoreError::Transient(e.to_string()))??;
                Ok(CoreResponse::PledgeId(id))
            }
            CoreRequest::ReserveBandwidthOneWay { src, dst, commence, expiry, bandwidth_out_bps, cookie, dscp_class } => {
                let id = self
                    .reservations
                    .send(ReserveBandwidthOneWay { src, dst, commence, expiry, bandwidth_out_bps, cookie, dscp_class })
                    .await
                    .map_err(|e| crate::error::CoreError::Transient(e.to_string()))??;
                Ok(CoreResponse::PledgeId(id))
            }
            CoreRequest::CapacityCheck { src, dst, commence, expiry, bandwidth_in_bps, bandwidth_out_bps } => {
                let paths = self
                    .reservations
                    .send(CapacityCheck { src, dst, commence, expiry, bandwidth_in_bps, bandwidth_out_bps })
                    .await
                    .map_err(|e| crate::error::CoreError::Transient(e.to_string()))??;
                Ok(CoreResponse::Paths(paths))
            }
            CoreRequest::Delete { id, cookie } => {
                self.reservations.send(DeletePledge { id, cookie }).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))??;
                Ok(CoreResponse::Unit)
            }
            CoreRequest::List => {
                let json = self.reservations.send(ListPledges).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))?;
                Ok(CoreResponse::List(json))
            }
            CoreRequest::SetTenantCap { tenant, percent } => {
                self.reservations.send(SetTenantCap { tenant, percent }).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))?;
                Ok(CoreResponse::Unit)
            }
            CoreRequest::SetDiscount { value } => {
                self.reservations.send(SetDiscount { value }).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))?;
                Ok(CoreResponse::Unit)
            }
            CoreRequest::Pause => {
                self.reservations.send(Pause).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))?;
                Ok(CoreResponse::Unit)
            }
            CoreRequest::Resume => {
                self.reservations.send(Resume).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))?;
                Ok(CoreResponse::Unit)
            }
            CoreRequest::Checkpoint => {
                self.reservations.send(Checkpoint).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))??;
                Ok(CoreResponse::Unit)
            }
            CoreRequest::Load { path } => {
                self.reservations.send(Load { path }).await.map_err(|e| crate::error::CoreError::Transient(e.to_string()))??;
                Ok(CoreResponse::Unit)
            }
        }
    }
}
