pub mod endpoint;
pub mod link;
pub mod mlag;
pub mod switch;
pub mod topology;

pub mod actor;
pub mod messages;

pub use endpoint::{Endpoint, EndpointRef};
pub use link::{Discount, Link};
pub use mlag::MlagGroup;
pub use switch::Switch;
pub use topology::{EndpointUpdate, Topology, TopologyLink};

use std::collections::HashMap;
use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};
use union_find::{QuickUnionUf, UnionBySize, UnionFind};

use crate::config::CoreConfig;
use crate::ids::{EndpointId, LinkId, MlagGroupId, SwitchId, TenantId};
use crate::ledger::Fence;

new_key_type! {
    pub struct LinkKey;
}

/// Owns the switch/link/endpoint arena and regenerates it from an
/// external topology source (spec.md §4.1). Links are the only thing
/// that survive a rebuild by identity — switches are always new objects,
/// scratch path-search state never lives here at all (spec.md §9,
/// "Cyclic references"/"Control-flow style").
#[derive(Debug)]
pub struct GraphModel {
    config: Arc<CoreConfig>,

    switches: HashMap<SwitchId, Switch>,
    links: SlotMap<LinkKey, Link>,
    link_index: HashMap<LinkId, LinkKey>,

    endpoints: HashMap<EndpointId, Endpoint>,
    mlag_groups: HashMap<MlagGroupId, MlagGroup>,
    fences: HashMap<(LinkId, TenantId), Fence>,
    default_fence_pct: HashMap<TenantId, f64>,

    /// Connected-component id per switch, recomputed each rebuild via a
    /// union-find over the current link set (spec.md §4.2, "Disjoint-
    /// network tolerance").
    component_of: HashMap<SwitchId, usize>,

    /// Endpoints cached from the last update when a rebuild arrives with
    /// an empty topology (spec.md §4.1, "Failure semantics").
    cached_endpoint_update: Option<EndpointUpdate>,

    /// `SET_DISCOUNT` policy, applied on top of headroom to every link's
    /// declared capacity (spec.md §6).
    discount: Option<Discount>,
}

impl GraphModel {
    pub fn new(config: Arc<CoreConfig>) -> Self {
        Self {
            config,
            switches: HashMap::new(),
            links: SlotMap::with_key(),
            link_index: HashMap::new(),
            endpoints: HashMap::new(),
            mlag_groups: HashMap::new(),
            fences: HashMap::new(),
            default_fence_pct: HashMap::new(),
            component_of: HashMap::new(),
            cached_endpoint_update: None,
            discount: None,
        }
    }

    /// `percent = -1` (or any negative value) removes a previously set
    /// discount (spec.md §6 shares this "-1 clears" idiom with
    /// `SET_TENANT_CAP`).
    pub fn set_discount(&mut self, value: f64) {
        self.discount = if value < 0.0 { None } else { Some(Discount::from_value(value)) };
    }

    pub fn switch(&self, id: &SwitchId) -> Option<&Switch> {
        self.switches.get(id)
    }

    pub fn switches(&self) -> impl Iterator<Item = &Switch> {
        self.switches.values()
    }

    pub fn link(&self, id: &LinkId) -> Option<&Link> {
        self.link_index.get(id).and_then(|k| self.links.get(*k))
    }

    pub fn link_mut(&mut self, id: &LinkId) -> Option<&mut Link> {
        let key = *self.link_index.get(id)?;
        self.links.get_mut(key)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn endpoint(&self, id: &EndpointId) -> Option<&Endpoint> {
        self.endpoints.get(id)
    }

    pub fn mlag_group(&self, id: &MlagGroupId) -> Option<&MlagGroup> {
        self.mlag_groups.get(id)
    }

    pub fn relaxed_mode(&self) -> bool {
        self.config.relaxed_mode
    }

    pub fn same_component(&self, a: &SwitchId, b: &SwitchId) -> bool {
        match (self.component_of.get(a), self.component_of.get(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Lazily copies the "default" fence for `tenant` on `link` the first
    /// time it's referenced (spec.md §3, "Fence").
    pub fn get_fence(&mut self, link: &LinkId, tenant: &TenantId) -> Fence {
        if let Some(f) = self.fences.get(&(link.clone(), tenant.clone())) {
            return f.clone();
        }
        let pct = *self.default_fence_pct.get(tenant).unwrap_or(&self.config.default_fence_pct);
        let fence = Fence::new(tenant.clone(), pct);
        self.fences.insert((link.clone(), tenant.clone()), fence.clone());
        fence
    }

    /// `percent = -1` removes the cap entirely (spec.md §6,
    /// `SET_TENANT_CAP`); otherwise sets the default percentage applied
    /// to every link the tenant is lazily faced on from now on, and
    /// updates any fence already materialized for that tenant.
    pub fn set_tenant_cap(&mut self, tenant: &TenantId, percent: f64) {
        if percent < 0.0 {
            self.default_fence_pct.remove(tenant);
            self.fences.retain(|(_, t), _| t != tenant);
            return;
        }
        self.default_fence_pct.insert(tenant.clone(), percent);
        for ((_, t), fence) in self.fences.iter_mut() {
            if t == tenant {
                fence.max_pct = percent;
            }
        }
    }

    /// Used both by `rebuild` (to materialize reported edges) and by the
    /// relaxed-mode fallback (to bridge disjoint partitions) (spec.md
    /// §4.1).
    pub fn find_or_make_link(&mut self, src: SwitchId, dst: SwitchId, capacity_bps: i64, is_virtual: bool) -> LinkId {
        let key = Link::key(&src, &dst);
        if let Some(existing) = self.link_index.get(&key) {
            return self.links[*existing].id.clone();
        }

        let link = if is_virtual {
            Link::new_virtual(src.clone(), dst.clone(), capacity_bps)
        } else {
            Link::new_with_discount(src.clone(), dst.clone(), capacity_bps, self.config.link_headroom_pct, 1, self.config.default_alarm_threshold_pct, self.discount)
        };
        let id = link.id.clone();
        let slot_key = self.links.insert(link);
        self.link_index.insert(id.clone(), slot_key);

        self.switches.entry(src).or_insert_with_key(|k| Switch::new(k.clone())).links_out.push(id.clone());

        id
    }

    /// Replaces switches with new objects, reuses links by `"src-dst"`
    /// key so their ledgers survive, re-attaches endpoints, merges MLAG
    /// members, and recomputes connected components (spec.md §4.1).
    pub fn rebuild(&mut self, topology: &Topology, endpoint_update: Option<&EndpointUpdate>) {
        let endpoint_update = match (endpoint_update, topology.links.is_empty() && topology.physical_hosts.is_empty()) {
            (Some(u), _) => {
                self.cached_endpoint_update = Some(u.clone());
                u.clone()
            }
            (None, _) => self.cached_endpoint_update.clone().unwrap_or_default(),
        };

        if topology.links.is_empty() && topology.physical_hosts.is_empty() {
            // Nothing new to rebuild from; keep the previous generation
            // (spec.md §4.1, "Failure semantics").
            log::warn!("rebuild() called with an empty topology; keeping previous graph generation");
            return;
        }

        let mut new_switches: HashMap<SwitchId, Switch> = HashMap::new();
        let ensure_switch = |map: &mut HashMap<SwitchId, Switch>, id: &SwitchId| {
            map.entry(id.clone()).or_insert_with(|| Switch::new(id.clone()));
        };

        let effective_links: Vec<TopologyLink> = if topology.links.is_empty() {
            // Star topology fallback so single-switch clusters can still
            // run path-finding (spec.md §4.1).
            let hub = SwitchId::new("star-hub");
            topology
                .physical_hosts
                .iter()
                .map(|host| TopologyLink {
                    src: hub.clone(),
                    dst: SwitchId::new(format!("host-{}", host)),
                    capacity_bps: self.config.virtual_link_capacity_bps,
                    src_port: -1,
                    dst_port: -1,
                    mlag_group: None,
                    alarm_threshold_pct: None,
                })
                .collect()
        } else {
            topology.links.clone()
        };

        let mut still_present: std::collections::HashSet<LinkId> = std::collections::HashSet::new();
        let mut mlag_groups: HashMap<MlagGroupId, MlagGroup> = HashMap::new();

        for tl in &effective_links {
            ensure_switch(&mut new_switches, &tl.src);
            ensure_switch(&mut new_switches, &tl.dst);

            let key = Link::key(&tl.src, &tl.dst);
            let link_id = if let Some(existing_key) = self.link_index.get(&key).copied() {
                let link = &mut self.links[existing_key];
                link.update_capacity(tl.capacity_bps, self.config.link_headroom_pct, self.discount);
                link.src_port = tl.src_port;
                link.dst_port = tl.dst_port;
                link.mlag_group = tl.mlag_group.clone();
                link.alarm_threshold_pct = tl.alarm_threshold_pct.unwrap_or(self.config.default_alarm_threshold_pct);
                link.id.clone()
            } else {
                let mut link = Link::new_with_discount(
                    tl.src.clone(),
                    tl.dst.clone(),
                    tl.capacity_bps,
                    self.config.link_headroom_pct,
                    1,
                    tl.alarm_threshold_pct.unwrap_or(self.config.default_alarm_threshold_pct),
                    self.discount,
                );
                link.src_port = tl.src_port;
                link.dst_port = tl.dst_port;
                link.mlag_group = tl.mlag_group.clone();
                let id = link.id.clone();
                let slot_key = self.links.insert(link);
                self.link_index.insert(id.clone(), slot_key);
                id
            };

            still_present.insert(link_id.clone());
            new_switches.get_mut(&tl.src).unwrap().links_out.push(link_id.clone());

            if let Some(group_name) = &tl.mlag_group {
                mlag_groups.entry(group_name.clone()).or_insert_with(|| MlagGroup::new(group_name.clone())).add_member(link_id);
            }
        }

        // Drop links no longer reported by this generation's topology so
        // their stale ledgers don't leak into admission decisions.
        let stale: Vec<LinkId> = self.link_index.keys().filter(|id| !still_present.contains(*id)).cloned().collect();
        for id in stale {
            if let Some(key) = self.link_index.remove(&id) {
                self.links.remove(key);
            }
        }

        self.switches = new_switches;
        self.mlag_groups = mlag_groups;

        // Re-attach endpoints by physical-host name.
        for deleted in &endpoint_update.deletes {
            self.endpoints.remove(deleted);
        }
        for endpoint in &endpoint_update.upserts {
            self.endpoints.insert(endpoint.uuid.clone(), endpoint.clone());
        }
        for endpoint in self.endpoints.values_mut() {
            let switch_id = SwitchId::new(format!("host-{}", endpoint.physical_host)).clone();
            let resolved = self.switches.contains_key(&switch_id).then_some(switch_id.clone()).or_else(|| {
                self.switches.keys().find(|s| s.as_str() == endpoint.physical_host.as_str()).cloned()
            });
            match resolved {
                Some(sw) => {
                    endpoint.switch = Some(sw.clone());
                    if let Some(switch) = self.switches.get_mut(&sw) {
                        switch.attach_endpoint(endpoint.uuid.clone(), endpoint.mac.clone());
                    }
                }
                None => {
                    log::warn!("endpoint {} has unresolved physical host '{}'; dropping from this generation", endpoint.uuid, endpoint.physical_host);
                    endpoint.switch = None;
                }
            }
        }
        self.endpoints.retain(|_, e| e.switch.is_some());

        self.recompute_components();
    }

    fn recompute_components(&mut self) {
        self.component_of.clear();
        let ids: Vec<SwitchId> = self.switches.keys().cloned().collect();
        if ids.is_empty() {
            return;
        }
        let index_of: HashMap<SwitchId, usize> = ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
        let mut dsu = QuickUnionUf::<UnionBySize>::new(ids.len());

        for link in self.links.values() {
            if let (Some(&si), Some(&di)) = (index_of.get(&link.src), index_of.get(&link.dst)) {
                dsu.union(si, di);
            }
        }

        for id in &ids {
            let idx = index_of[id];
            self.component_of.insert(id.clone(), dsu.find(idx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Arc<CoreConfig> {
        Arc::new(CoreConfig { link_headroom_pct: 10.0, ..Default::default() })
    }

    fn two_switch_topology() -> Topology {
        Topology {
            links: vec![TopologyLink { src: SwitchId::new("s1"), dst: SwitchId::new("s2"), capacity_bps: 1_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None }],
            physical_hosts: vec![],
        }
    }

    #[test]
    fn headroom_is_applied_to_new_link_capacity() {
        let mut graph = GraphModel::new(config());
        graph.rebuild(&two_switch_topology(), None);
        let link = graph.link(&LinkId::new("s1-s2")).unwrap();
        assert_eq!(link.capacity_bps, 900_000_000, "10% headroom withheld from the raw 1Gbps link");
    }

    #[test]
    fn rebuild_reuses_link_by_key_so_its_ledger_survives() {
        let mut graph = GraphModel::new(config());
        graph.rebuild(&two_switch_topology(), None);

        let tenant = TenantId::new("t1");
        let link_id = LinkId::new("s1-s2");
        let fence = graph.get_fence(&link_id, &tenant);
        graph.link_mut(&link_id).unwrap().ledger.change_allocation(0, 100, 500_000_000, crate::ledger::Direction::Outbound, crate::ids::PledgeId::new("p1"), tenant.clone());
        let _ = fence;

        // A second rebuild with the same topology must not reset the ledger.
        graph.rebuild(&two_switch_topology(), None);
        let link = graph.link(&link_id).unwrap();
        assert!(!link.ledger.is_empty(), "reused link keeps its prior allocation across a rebuild");
    }

    #[test]
    fn rebuild_drops_links_no_longer_reported() {
        let mut graph = GraphModel::new(config());
        graph.rebuild(&two_switch_topology(), None);
        assert!(graph.link(&LinkId::new("s1-s2")).is_some());

        graph.rebuild(&Topology { links: vec![], physical_hosts: vec!["only-host".to_string()] }, None);
        assert!(graph.link(&LinkId::new("s1-s2")).is_none(), "stale link from the previous generation is dropped");
    }

    #[test]
    fn empty_topology_with_known_physical_hosts_synthesizes_a_star() {
        let mut graph = GraphModel::new(config());
        graph.rebuild(&Topology { links: vec![], physical_hosts: vec!["a".to_string(), "b".to_string()] }, None);

        assert!(graph.switch(&SwitchId::new("star-hub")).is_some());
        assert!(graph.switch(&SwitchId::new("host-a")).is_some());
        assert!(graph.switch(&SwitchId::new("host-b")).is_some());
        assert!(graph.same_component(&SwitchId::new("host-a"), &SwitchId::new("host-b")));
    }

    #[test]
    fn completely_empty_topology_keeps_the_previous_generation() {
        let mut graph = GraphModel::new(config());
        graph.rebuild(&two_switch_topology(), None);
        graph.rebuild(&Topology::default(), None);
        assert!(graph.switch(&SwitchId::new("s1")).is_some(), "an empty topology with no endpoints cached keeps the prior graph");
    }

    #[test]
    fn disjoint_switches_are_not_reported_same_component() {
        let mut graph = GraphModel::new(config());
        let topo = Topology {
            links: vec![
                TopologyLink { src: SwitchId::new("s1"), dst: SwitchId::new("s2"), capacity_bps: 1_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None },
                TopologyLink { src: SwitchId::new("s3"), dst: SwitchId::new("s4"), capacity_bps: 1_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None },
            ],
            physical_hosts: vec![],
        };
        graph.rebuild(&topo, None);
        assert!(graph.same_component(&SwitchId::new("s1"), &SwitchId::new("s2")));
        assert!(!graph.same_component(&SwitchId::new("s1"), &SwitchId::new("s3")));
    }

    #[test]
    fn get_fence_lazily_copies_the_configured_default() {
        let mut graph = GraphModel::new(Arc::new(CoreConfig { default_fence_pct: 30.0, ..Default::default() }));
        graph.rebuild(&two_switch_topology(), None);
        let fence = graph.get_fence(&LinkId::new("s1-s2"), &TenantId::new("tenantX"));
        assert_eq!(fence.max_pct, 30.0);
    }

    #[test]
    fn set_tenant_cap_updates_already_materialized_fences_and_negative_clears() {
        let mut graph = GraphModel::new(config());
        graph.rebuild(&two_switch_topology(), None);
        let link_id = LinkId::new("s1-s2");
        let tenant = TenantId::new("t1");

        let _ = graph.get_fence(&link_id, &tenant);
        graph.set_tenant_cap(&tenant, 20.0);
        assert_eq!(graph.get_fence(&link_id, &tenant).max_pct, 20.0);

        graph.set_tenant_cap(&tenant, -1.0);
        assert_eq!(graph.get_fence(&link_id, &tenant).max_pct, 100.0, "removing the cap falls back to the global default");
    }
}
