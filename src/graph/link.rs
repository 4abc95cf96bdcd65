use crate::ids::{LinkId, MlagGroupId, SwitchId};
use crate::ledger::LinkLedger;

/// `SET_DISCOUNT` policy (spec.md §6): a flat deduction applied to every
/// link's declared capacity on top of headroom, either as a percentage
/// of the headroom-adjusted capacity or an absolute bits/sec amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Discount {
    Percent(f64),
    Absolute(i64),
}

impl Discount {
    /// `value >= 101` is interpreted as an absolute bits/sec deduction,
    /// `0..=100` as a percentage (spec.md §6, `SET_DISCOUNT`).
    pub fn from_value(value: f64) -> Self {
        if value >= 101.0 {
            Discount::Absolute(value as i64)
        } else {
            Discount::Percent(value.clamp(0.0, 100.0))
        }
    }

    fn apply(capacity_bps: i64, discount: Option<Discount>) -> i64 {
        match discount {
            None => capacity_bps,
            Some(Discount::Percent(pct)) => ((capacity_bps as f64) * (100.0 - pct) / 100.0) as i64,
            Some(Discount::Absolute(bps)) => (capacity_bps - bps).max(0),
        }
    }
}

/// Directed edge between two switches, or a virtual link (intra-switch
/// hop, or a synthetic relaxed-mode bridge) carrying effectively
/// unrestricted capacity (spec.md §3, "Link"/"Virtual link").
#[derive(Debug, Clone)]
pub struct Link {
    pub id: LinkId,
    pub src: SwitchId,
    pub dst: SwitchId,

    /// Effective capacity: raw capacity already reduced by the
    /// configured link-headroom percentage (spec.md §4.1, "Headroom").
    /// The ledger's capacity ceiling is this value, not the raw one.
    pub capacity_bps: i64,
    pub raw_capacity_bps: i64,

    /// Unit cost by default; all link costs equal under current policy
    /// (spec.md §4.2, "Tie-breaking").
    pub cost: u32,

    /// Percent utilization at which `has_capacity` attaches a
    /// (non-fatal) alarm warning.
    pub alarm_threshold_pct: f64,

    pub mlag_group: Option<MlagGroupId>,
    pub src_port: i32,
    pub dst_port: i32,
    pub is_virtual: bool,

    pub ledger: LinkLedger,
}

impl Link {
    pub fn new(src: SwitchId, dst: SwitchId, raw_capacity_bps: i64, headroom_pct: f64, cost: u32, alarm_threshold_pct: f64) -> Self {
        Self::new_with_discount(src, dst, raw_capacity_bps, headroom_pct, cost, alarm_threshold_pct, None)
    }

    pub fn new_with_discount(src: SwitchId, dst: SwitchId, raw_capacity_bps: i64, headroom_pct: f64, cost: u32, alarm_threshold_pct: f64, discount: Option<Discount>) -> Self {
        let capacity_bps = Discount::apply(Self::apply_headroom(raw_capacity_bps, headroom_pct), discount);
        let id = Self::key(&src, &dst);
        Self {
            id,
            src,
            dst,
            capacity_bps,
            raw_capacity_bps,
            cost,
            alarm_threshold_pct,
            mlag_group: None,
            src_port: -1,
            dst_port: -1,
            is_virtual: false,
            ledger: LinkLedger::new(capacity_bps, alarm_threshold_pct),
        }
    }

    pub fn new_virtual(src: SwitchId, dst: SwitchId, capacity_bps: i64) -> Self {
        let id = Self::key(&src, &dst);
        Self {
            id,
            src,
            dst,
            capacity_bps,
            raw_capacity_bps: capacity_bps,
            cost: 1,
            alarm_threshold_pct: 100.0,
            mlag_group: None,
            src_port: -1,
            dst_port: -1,
            is_virtual: true,
            ledger: LinkLedger::new(capacity_bps, 100.0),
        }
    }

    /// Reuse key for a directed edge: `"src-dst"` (spec.md §4.1,
    /// `find_or_make_link`). A bidirectional physical edge produces two
    /// distinct `Link`s under two distinct keys, sharing neither scratch
    /// nor ledger (spec.md §3).
    pub fn key(src: &SwitchId, dst: &SwitchId) -> LinkId {
        LinkId::new(format!("{}-{}", src, dst))
    }

    fn apply_headroom(raw: i64, headroom_pct: f64) -> i64 {
        ((raw as f64) * (100.0 - headroom_pct) / 100.0) as i64
    }

    /// Re-applies the current headroom and discount policy to a new raw
    /// capacity reported by a topology refresh, keeping the ledger's
    /// declared ceiling in sync (spec.md §4.1, §6).
    pub fn update_capacity(&mut self, raw_capacity_bps: i64, headroom_pct: f64, discount: Option<Discount>) {
        self.raw_capacity_bps = raw_capacity_bps;
        self.capacity_bps = Discount::apply(Self::apply_headroom(raw_capacity_bps, headroom_pct), discount);
        self.ledger.set_capacity(self.capacity_bps);
    }
}
