pub mod fence;

pub use fence::Fence;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{PledgeId, TenantId};

/// Which side of a bidirectional reservation a given allocation belongs
/// to. `Both` only ever appears as a *failure* tag (spec.md §7,
/// `NoCapacity(direction)`) — a single `change_allocation`/`has_capacity`
/// call always names one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outbound,
    Inbound,
    Both,
}

/// One contiguous, non-overlapping slice of a link's timeline carrying a
/// flat allocation profile (spec.md §3, "LinkLedger").
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub start: i64,
    pub end: i64,
    pub allocated_out: i64,
    pub allocated_in: i64,
    /// Per-reservation contribution, queue id == pledge id (spec.md §4.3).
    pub per_queue: HashMap<PledgeId, (i64, i64)>,
    pub per_tenant: HashMap<TenantId, i64>,
}

impl Window {
    fn new(start: i64, end: i64) -> Self {
        Self { start, end, allocated_out: 0, allocated_in: 0, per_queue: HashMap::new(), per_tenant: HashMap::new() }
    }

    pub fn total(&self) -> i64 {
        self.allocated_out + self.allocated_in
    }

    fn allocation_profile_eq(&self, other: &Window) -> bool {
        self.allocated_out == other.allocated_out && self.allocated_in == other.allocated_in && self.per_queue == other.per_queue && self.per_tenant == other.per_tenant
    }
}

/// Outcome of a capacity probe: whether the allocation fits, plus a
/// non-fatal warning if it would cross the link's alarm threshold
/// (spec.md §4.3, "Thresholds").
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityCheck {
    pub fits: bool,
    pub alarm: bool,
}

/// Time-windowed record of bandwidth commitments on a single link. Owned
/// exclusively by that link; mutation happens only from within the
/// `GraphActor` task that owns the link (spec.md §5).
#[derive(Debug, Clone)]
pub struct LinkLedger {
    capacity_bps: i64,
    alarm_threshold_pct: f64,
    windows: Vec<Window>,
}

impl LinkLedger {
    pub fn new(capacity_bps: i64, alarm_threshold_pct: f64) -> Self {
        Self { capacity_bps, alarm_threshold_pct, windows: Vec::new() }
    }

    pub fn capacity_bps(&self) -> i64 {
        self.capacity_bps
    }

    /// Applied on topology rebuild when a link is reused and its
    /// declared capacity has changed.
    pub fn set_capacity(&mut self, capacity_bps: i64) {
        self.capacity_bps = capacity_bps;
    }

    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Aggregate allocation a tenant currently holds across every window
    /// overlapping `[t0, t1)` (used by `has_capacity`'s fence check).
    fn tenant_allocation(&self, t0: i64, t1: i64, tenant: &TenantId) -> i64 {
        self.windows
            .iter()
            .filter(|w| w.start < t1 && w.end > t0)
            .map(|w| *w.per_tenant.get(tenant).unwrap_or(&0))
            .max()
            .unwrap_or(0)
    }

    /// True iff every window overlapping `[t0, t1)` can absorb `delta`
    /// bits/sec without exceeding link capacity or the tenant's fence
    /// ceiling (spec.md §4.3).
    pub fn has_capacity(&self, t0: i64, t1: i64, delta: i64, tenant: &TenantId, fence: &Fence) -> CapacityCheck {
        let fence_ceiling = fence.ceiling_bps(self.capacity_bps);
        let existing_tenant = self.tenant_allocation(t0, t1, tenant);
        if !fence.is_unbounded() && existing_tenant + delta > fence_ceiling {
            return CapacityCheck { fits: false, alarm: false };
        }

        let mut worst_utilization_pct = 0.0_f64;
        for w in self.windows.iter().filter(|w| w.start < t1 && w.end > t0) {
            let projected = w.total() + delta;
            if projected > self.capacity_bps {
                return CapacityCheck { fits: false, alarm: false };
            }
            let utilization = if self.capacity_bps > 0 { projected as f64 * 100.0 / self.capacity_bps as f64 } else { 0.0 };
            worst_utilization_pct = worst_utilization_pct.max(utilization);
        }

        CapacityCheck { fits: true, alarm: worst_utilization_pct >= self.alarm_threshold_pct }
    }

    /// Splits/merges windows so `[t0, t1)` is covered by one or more
    /// windows, then applies `delta` to each (spec.md §4.3,
    /// "change_allocation"). Negative `delta` removes allocation.
    pub fn change_allocation(&mut self, t0: i64, t1: i64, delta: i64, direction: Direction, queue: PledgeId, tenant: TenantId) {
        self.split_boundary(t0);
        self.split_boundary(t1);
        self.fill_gaps(t0, t1);

        for w in self.windows.iter_mut().filter(|w| w.start >= t0 && w.end <= t1) {
            match direction {
                Direction::Outbound => w.allocated_out += delta,
                Direction::Inbound => w.allocated_in += delta,
                Direction::Both => {
                    w.allocated_out += delta;
                    w.allocated_in += delta;
                }
            }

            let entry = w.per_queue.entry(queue.clone()).or_insert((0, 0));
            match direction {
                Direction::Outbound => entry.0 += delta,
                Direction::Inbound => entry.1 += delta,
                Direction::Both => {
                    entry.0 += delta;
                    entry.1 += delta;
                }
            }
            if entry.0 == 0 && entry.1 == 0 {
                w.per_queue.remove(&queue);
            }

            let tenant_entry = w.per_tenant.entry(tenant.clone()).or_insert(0);
            *tenant_entry += delta;
            if *tenant_entry <= 0 {
                w.per_tenant.remove(&tenant);
            }
        }

        self.remove_empty_gaps();
        self.merge_adjacent();
    }

    /// Ensures a window boundary exists at `t` by splitting the window
    /// that currently straddles it. No-op if `t` already is a boundary or
    /// falls outside every window (handled by `fill_gaps` instead).
    fn split_boundary(&mut self, t: i64) {
        if let Some(idx) = self.windows.iter().position(|w| w.start < t && t < w.end) {
            let w = self.windows.remove(idx);
            let mut left = w.clone();
            left.end = t;
            let mut right = w;
            right.start = t;
            self.windows.insert(idx, right);
            self.windows.insert(idx, left);
        }
    }

    /// Inserts fresh zero-allocation windows so that every point in
    /// `[t0, t1)` is covered by some window in the timeline.
    fn fill_gaps(&mut self, t0: i64, t1: i64) {
        self.windows.sort_by_key(|w| w.start);
        let mut cursor = t0;
        let mut gaps = Vec::new();
        for w in self.windows.iter() {
            if w.end <= t0 || w.start >= t1 {
                continue;
            }
            if w.start > cursor {
                gaps.push(Window::new(cursor, w.start));
            }
            cursor = cursor.max(w.end);
        }
        if cursor < t1 {
            gaps.push(Window::new(cursor, t1));
        }
        self.windows.extend(gaps);
        self.windows.sort_by_key(|w| w.start);
    }

    /// Drops windows that carry no allocation at all. A window with zero
    /// total, no queue contributions, and no tenant contributions is
    /// indistinguishable from "no window here" (the timeline only needs
    /// to be contiguous-or-disjoint, spec.md §3) — keeping it around
    /// would break the round-trip property that admitting then fully
    /// releasing a reservation restores a byte-identical, empty ledger
    /// (spec.md §8).
    fn remove_empty_gaps(&mut self) {
        self.windows.retain(|w| w.total() != 0 || !w.per_queue.is_empty() || !w.per_tenant.is_empty());
        self.windows.sort_by_key(|w| w.start);
    }

    /// Coalesces adjacent windows with an identical allocation profile so
    /// the ledger's length stays bounded by the number of distinct
    /// reservation boundaries currently active (spec.md §4.3, "Window
    /// merging").
    fn merge_adjacent(&mut self) {
        if self.windows.is_empty() {
            return;
        }
        let mut merged: Vec<Window> = Vec::with_capacity(self.windows.len());
        for w in self.windows.drain(..) {
            if let Some(last) = merged.last_mut() {
                if last.end == w.start && last.allocation_profile_eq(&w) {
                    last.end = w.end;
                    continue;
                }
            }
            merged.push(w);
        }
        self.windows = merged;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence() -> Fence {
        Fence::new(TenantId::new("tenantA"), 100.0)
    }

    #[test]
    fn has_capacity_on_empty_ledger() {
        let ledger = LinkLedger::new(1_000_000_000, 90.0);
        let check = ledger.has_capacity(0, 100, 500_000_000, &TenantId::new("tenantA"), &fence());
        assert!(check.fits);
    }

    #[test]
    fn change_allocation_then_reverse_restores_empty_ledger() {
        let mut ledger = LinkLedger::new(1_000_000_000, 90.0);
        let tenant = TenantId::new("tenantA");
        let queue = PledgeId::new("p1");
        ledger.change_allocation(10, 70, 500_000_000, Direction::Outbound, queue.clone(), tenant.clone());
        assert!(!ledger.is_empty());
        ledger.change_allocation(10, 70, -500_000_000, Direction::Outbound, queue, tenant);
        assert!(ledger.windows().iter().all(|w| w.total() == 0 && w.per_queue.is_empty() && w.per_tenant.is_empty()));
    }

    #[test]
    fn contention_rejects_overlapping_overcommit() {
        let mut ledger = LinkLedger::new(1_000_000_000, 90.0);
        let tenant = TenantId::new("tenantA");
        ledger.change_allocation(0, 100, 500_000_000, Direction::Outbound, PledgeId::new("p1"), tenant.clone());
        let check = ledger.has_capacity(0, 100, 600_000_000, &tenant, &fence());
        assert!(!check.fits, "500Mbps already allocated plus a 600Mbps probe exceeds the 1Gbps capacity");
        let smaller = ledger.has_capacity(0, 100, 400_000_000, &tenant, &fence());
        assert!(smaller.fits);
    }
}
