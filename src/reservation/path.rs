use serde::{Deserialize, Serialize};

use crate::ids::{EndpointId, LinkId, TenantId};
use crate::ledger::Direction;

/// One admitted traversal: an ordered list of links carrying a single
/// direction's bandwidth between two endpoints (spec.md §3, "Path"). A
/// single reservation can produce more than one `Path` when the network
/// is disjoint — one per traversed partition — or simply one per
/// direction for an ordinary bandwidth reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    pub direction: Direction,
    pub links: Vec<LinkId>,
    pub bandwidth_bps: i64,
    pub src_endpoint: EndpointId,
    pub dst_endpoint: EndpointId,
    pub tenant_fence: TenantId,
}

impl Path {
    pub fn new(direction: Direction, links: Vec<LinkId>, bandwidth_bps: i64, src_endpoint: EndpointId, dst_endpoint: EndpointId, tenant_fence: TenantId) -> Self {
        Self { direction, links, bandwidth_bps, src_endpoint, dst_endpoint, tenant_fence }
    }

    pub fn hop_count(&self) -> usize {
        self.links.len()
    }
}
