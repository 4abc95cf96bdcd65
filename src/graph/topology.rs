use serde::{Deserialize, Serialize};

use crate::graph::endpoint::Endpoint;
use crate::ids::{MlagGroupId, SwitchId};

/// One directed physical link as reported by the topology-source
/// collaborator (spec.md §1, "the core... consumes a link list from its
/// collaborator"). A bidirectional physical edge is reported as two
/// `TopologyLink`s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyLink {
    pub src: SwitchId,
    pub dst: SwitchId,
    pub capacity_bps: i64,
    pub src_port: i32,
    pub dst_port: i32,
    pub mlag_group: Option<MlagGroupId>,
    #[serde(default)]
    pub alarm_threshold_pct: Option<f64>,
}

/// A full topology snapshot handed to `Graph::rebuild`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub links: Vec<TopologyLink>,
    /// Every physical host name known, even ones with no link (used to
    /// synthesize a star topology when `links` is empty, spec.md §4.1).
    pub physical_hosts: Vec<String>,
}

/// Endpoint updates the OpenStack-adapter collaborator reports
/// (spec.md §3, "Created from collaborator updates; deleted when
/// collaborator reports removal").
#[derive(Debug, Clone, Default)]
pub struct EndpointUpdate {
    pub upserts: Vec<Endpoint>,
    pub deletes: Vec<crate::ids::EndpointId>,
}
