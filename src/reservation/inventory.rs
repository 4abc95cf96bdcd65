use std::collections::HashMap;

use crate::dscp::DscpPolicy;
use crate::error::{CoreError, Result};
use crate::ids::{EndpointId, PledgeId, TenantId};
use crate::reservation::path::Path;
use crate::reservation::pledge::{Pledge, PledgeKind};

/// A pledge record as read back from the checkpoint file, plus whatever
/// is needed to re-admit it through `PathFinder` (spec.md §4.4,
/// `checkpoint_load`: "the network topology may differ from when the
/// checkpoint was written, so a re-admission is required"). Paths
/// themselves are never persisted.
#[derive(Debug, Clone)]
pub struct CheckpointPledgeRecord {
    pub id: PledgeId,
    pub cookie: Option<String>,
    pub project: TenantId,
    pub src: EndpointId,
    pub dst: EndpointId,
    pub commence: i64,
    pub expiry: i64,
    pub kind: PledgeKind,
    pub dscp: Option<DscpPolicy>,
    pub pushed: bool,
    pub paused: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedCheckpoint {
    pub pledges: Vec<CheckpointPledgeRecord>,
    pub tenant_caps: Vec<(TenantId, f64)>,
}

/// Owns the live pledge cache: identity rules (`add`/`dup_check`/`get`),
/// lifecycle transitions (`delete`/`yank`/pause-resume), and checkpoint
/// serialization (spec.md §4.4). Deliberately free of any actor/async
/// machinery so its lifecycle rules are unit-testable in isolation; the
/// actix `ReservationsActor` (src/reservation/actor.rs) is a thin shell
/// around this that adds the `GraphActor` round trips `add`/`delete`/
/// `yank` need.
#[derive(Debug, Default)]
pub struct Inventory {
    cache: HashMap<PledgeId, Pledge>,
    /// Mirrors `SET_TENANT_CAP` so `checkpoint_write` can emit `ucap:`
    /// lines without round-tripping through `GraphActor` (spec.md §4.4,
    /// "Checkpoint file format").
    tenant_caps: HashMap<TenantId, f64>,
    paused: bool,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// `DuplicateId` iff a pledge with this id is already cached (spec.md
    /// §4.4, `add`). Paths must already be attached by the caller.
    pub fn add(&mut self, pledge: Pledge) -> Result<()> {
        if self.cache.contains_key(&pledge.id) {
            return Err(CoreError::DuplicateReservation(pledge.id.to_string()));
        }
        self.cache.insert(pledge.id.clone(), pledge);
        Ok(())
    }

    /// Inserts without the duplicate check, for checkpoint replay where
    /// the id is trusted to be unique within the file.
    fn insert_unchecked(&mut self, pledge: Pledge) {
        self.cache.insert(pledge.id.clone(), pledge);
    }

    /// Returns the id of a live (non-expired) pledge already covering the
    /// same endpoint pair and an overlapping window, in either
    /// direction (spec.md §4.4, `dup_check`).
    pub fn dup_check(&self, src: &EndpointId, dst: &EndpointId, t0: i64, t1: i64, now: i64) -> Option<PledgeId> {
        self.cache
            .values()
            .find(|p| {
                !p.is_expired(now)
                    && ((&p.src_endpoint == src && &p.dst_endpoint == dst) || (&p.src_endpoint == dst && &p.dst_endpoint == src))
                    && p.commence < t1
                    && p.expiry > t0
            })
            .map(|p| p.id.clone())
    }

    /// `cookie` must match the pledge's own cookie or the configured
    /// super-cookie (spec.md §4.4, `get`).
    pub fn get(&self, id: &PledgeId, cookie: Option<&str>, super_cookie: &str) -> Option<&Pledge> {
        let pledge = self.cache.get(id)?;
        if cookie == Some(super_cookie) {
            return Some(pledge);
        }
        match (&pledge.cookie, cookie) {
            (Some(owned), Some(given)) if owned == given => Some(pledge),
            (None, _) => Some(pledge),
            _ => None,
        }
    }

    /// Step 1 of `delete`: returns the paths to release so the caller can
    /// run `ReleasePaths` against `GraphActor` *before* calling
    /// [`Inventory::finalize_delete`] — link allocations must be reduced
    /// before expiry is reset, or the ledger's window-split logic leaves
    /// dangling windows whose queues never get cleaned up (spec.md §4.4,
    /// "Deletion ordering rule").
    pub fn prepare_delete(&self, id: &PledgeId, cookie: Option<&str>, super_cookie: &str) -> Result<(Vec<Path>, i64, i64)> {
        let pledge = self.get(id, cookie, super_cookie).ok_or_else(|| CoreError::InvalidInput(format!("no such pledge: {}", id)))?;
        Ok((pledge.paths.clone(), pledge.commence, pledge.expiry))
    }

    /// Step 2 of `delete`: resets expiry to `now + delete_grace_secs` so
    /// the Activator pushes one final, short-lived, pre-empting flow-mod
    /// set (spec.md §4.4).
    pub fn finalize_delete(&mut self, id: &PledgeId, now: i64, delete_grace_secs: i64) -> Result<()> {
        let pledge = self.cache.get_mut(id).ok_or_else(|| CoreError::InvalidInput(format!("no such pledge: {}", id)))?;
        pledge.expiry = now + delete_grace_secs;
        pledge.pushed = false;
        Ok(())
    }

    /// Step 1 of `yank`: clones the pledge under a derived id with the
    /// clone set to expire soon (carrying the vacated paths so the
    /// Activator can tear down the old flow rules), and returns the
    /// original's paths for the caller to release against `GraphActor`.
    /// The real pledge's path list is nulled by
    /// [`Inventory::complete_yank`] only after that release completes
    /// (spec.md §4.4, `yank`; GLOSSARY "Yank").
    pub fn prepare_yank(&self, id: &PledgeId) -> Result<(Pledge, Vec<Path>)> {
        let pledge = self.cache.get(id).ok_or_else(|| CoreError::InvalidInput(format!("no such pledge: {}", id)))?;
        Ok((pledge.clone(), pledge.paths.clone()))
    }

    pub fn complete_yank(&mut self, id: &PledgeId, now: i64, grace_secs: i64) -> Result<()> {
        let pledge = self.cache.get(id).ok_or_else(|| CoreError::InvalidInput(format!("no such pledge: {}", id)))?.clone();

        let mut clone = pledge.clone();
        clone.id = PledgeId::new(format!("{}.yank", id));
        clone.expiry = now + grace_secs;
        clone.pushed = true;

        let real = self.cache.get_mut(id).expect("checked above");
        real.paths.clear();

        self.cache.insert(clone.id.clone(), clone);
        Ok(())
    }

    /// Re-attaches newly admitted paths to a pledge that was previously
    /// yanked, marking it due for push again (spec.md §4.4, "used by
    /// refresh so a new path can be chosen without a window-of-no-
    /// coverage").
    pub fn reattach_paths(&mut self, id: &PledgeId, paths: Vec<Path>) -> Result<()> {
        let pledge = self.cache.get_mut(id).ok_or_else(|| CoreError::InvalidInput(format!("no such pledge: {}", id)))?;
        pledge.paths = paths;
        pledge.pushed = false;
        Ok(())
    }

    pub fn set_tenant_cap(&mut self, tenant: TenantId, percent: f64) {
        if percent < 0.0 {
            self.tenant_caps.remove(&tenant);
        } else {
            self.tenant_caps.insert(tenant, percent);
        }
    }

    pub fn list(&self, now: i64) -> Vec<&Pledge> {
        self.cache.values().filter(|p| !p.is_expired(now)).collect()
    }

    pub fn get_mut(&mut self, id: &PledgeId) -> Option<&mut Pledge> {
        self.cache.get_mut(id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Pledge> {
        self.cache.values_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pledge> {
        self.cache.values()
    }

    /// Purges pledges 120s (by default) past expiry, but only if they
    /// were ever pushed (spec.md §3, §8 invariant). Returns the purged
    /// ids so the caller can log them.
    pub fn purge_extinct(&mut self, now: i64, purge_grace_secs: i64) -> Vec<PledgeId> {
        let extinct: Vec<PledgeId> = self.cache.values().filter(|p| p.is_extinct(now, purge_grace_secs)).map(|p| p.id.clone()).collect();
        for id in &extinct {
            self.cache.remove(id);
        }
        extinct
    }

    /// Writes one line per non-expired pledge plus one `ucap:` line per
    /// tenant cap (spec.md §4.4, §6). Bandwidth pledges and one-way
    /// pledges are both checkpointed; `Steering` pledges are not — they
    /// are carried only for interface completeness (spec.md §3).
    pub fn checkpoint_write(&self, path: &str, now: i64) -> Result<()> {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut w = csv::WriterBuilder::new().delimiter(b' ').has_headers(false).from_writer(&mut buf);
            for (tenant, pct) in &self.tenant_caps {
                w.write_record(["ucap:".to_string(), tenant.to_string(), format!("{}", *pct as i64)])?;
            }
            for pledge in self.cache.values() {
                if pledge.is_expired(now) {
                    continue;
                }
                let Some(record) = pledge_to_record(pledge) else { continue };
                w.write_record(&record)?;
            }
            w.flush()?;
        }
        let tmp_path = format!("{}.tmp", path);
        std::fs::write(&tmp_path, &buf)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Parses a checkpoint file into pledge records and tenant caps
    /// without touching any live state; the caller (`ReservationsActor`)
    /// re-admits each pledge record through `PathFinder` before trusting
    /// it (spec.md §4.4, `checkpoint_load`).
    pub fn parse_checkpoint(path: &str) -> Result<ParsedCheckpoint> {
        let data = std::fs::read_to_string(path)?;
        let mut out = ParsedCheckpoint::default();
        let mut reader = csv::ReaderBuilder::new().delimiter(b' ').has_headers(false).flexible(true).from_reader(data.as_bytes());
        for result in reader.records() {
            let record = result?;
            if record.is_empty() {
                continue;
            }
            if &record[0] == "ucap:" {
                if record.len() < 3 {
                    continue;
                }
                let tenant = TenantId::new(&record[1]);
                let pct: f64 = record[2].parse().unwrap_or(100.0);
                out.tenant_caps.push((tenant, pct));
                continue;
            }
            if let Some(p) = record_to_checkpoint_pledge(&record) {
                out.pledges.push(p);
            }
        }
        Ok(out)
    }

    /// Replays already-parsed, already-re-admitted checkpoint pledges
    /// (paths attached by the caller) straight into the cache, and
    /// restores the tenant-cap mirror used by future `checkpoint_write`
    /// calls.
    pub fn restore_pledge(&mut self, pledge: Pledge) {
        self.insert_unchecked(pledge);
    }

    pub fn restore_tenant_caps(&mut self, caps: Vec<(TenantId, f64)>) {
        for (tenant, pct) in caps {
            self.set_tenant_cap(tenant, pct);
        }
    }
}

fn pledge_to_record(pledge: &Pledge) -> Option<[String; 12]> {
    let (kind_tag, bandwidth_in_bps, bandwidth_out_bps) = match &pledge.kind {
        PledgeKind::Bandwidth { bandwidth_in_bps, bandwidth_out_bps } => ("bw", *bandwidth_in_bps, *bandwidth_out_bps),
        PledgeKind::OneWayBandwidth { bandwidth_out_bps } => ("ow", 0, *bandwidth_out_bps),
        PledgeKind::Steering { .. } => return None,
    };
    Some([
        kind_tag.to_string(),
        pledge.id.to_string(),
        pledge.cookie.clone().unwrap_or_else(|| "-".to_string()),
        pledge.project.to_string(),
        pledge.src_endpoint.to_string(),
        pledge.dst_endpoint.to_string(),
        pledge.commence.to_string(),
        pledge.expiry.to_string(),
        bandwidth_in_bps.to_string(),
        bandwidth_out_bps.to_string(),
        pledge.dscp.map(|d| format!("{:?}_{}", d.class, d.preserve_on_egress)).unwrap_or_else(|| "-".to_string()),
        format!("{}{}", pledge.pushed as u8, pledge.paused as u8),
    ])
}

fn record_to_checkpoint_pledge(record: &csv::StringRecord) -> Option<CheckpointPledgeRecord> {
    if record.len() < 12 {
        return None;
    }
    let kind_tag = &record[0];
    let id = PledgeId::new(&record[1]);
    let cookie = (&record[2] != "-").then(|| record[2].to_string());
    let project = TenantId::new(&record[3]);
    let src = EndpointId::new(&record[4]);
    let dst = EndpointId::new(&record[5]);
    let commence: i64 = record[6].parse().ok()?;
    let expiry: i64 = record[7].parse().ok()?;
    let bandwidth_in_bps: i64 = record[8].parse().ok()?;
    let bandwidth_out_bps: i64 = record[9].parse().ok()?;
    let dscp = parse_dscp_field(&record[10]);
    let flags = &record[11];
    let pushed = flags.as_bytes().first().copied() == Some(b'1');
    let paused = flags.as_bytes().get(1).copied() == Some(b'1');

    let kind = match kind_tag {
        "bw" => PledgeKind::Bandwidth { bandwidth_in_bps, bandwidth_out_bps },
        "ow" => PledgeKind::OneWayBandwidth { bandwidth_out_bps },
        _ => return None,
    };

    Some(CheckpointPledgeRecord { id, cookie, project, src, dst, commence, expiry, kind, dscp, pushed, paused })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Direction;
    use crate::reservation::path::Path;

    fn bandwidth_pledge(id: &str, src: &str, dst: &str, commence: i64, expiry: i64) -> Pledge {
        Pledge {
            id: PledgeId::new(id),
            cookie: Some("cookie-a".to_string()),
            project: TenantId::new("t1"),
            src_endpoint: EndpointId::new(src),
            dst_endpoint: EndpointId::new(dst),
            kind: PledgeKind::Bandwidth { bandwidth_in_bps: 500_000_000, bandwidth_out_bps: 500_000_000 },
            commence,
            expiry,
            dscp: None,
            paths: vec![Path::new(Direction::Outbound, vec![crate::ids::LinkId::new("s1-s2")], 500_000_000, EndpointId::new(src), EndpointId::new(dst), TenantId::new("t1"))],
            pushed: false,
            paused: false,
        }
    }

    #[test]
    fn add_rejects_duplicate_id() {
        let mut inv = Inventory::new();
        inv.add(bandwidth_pledge("p1", "a", "b", 0, 100)).unwrap();
        let err = inv.add(bandwidth_pledge("p1", "c", "d", 0, 100)).unwrap_err();
        assert_eq!(err, CoreError::DuplicateReservation("p1".to_string()));
    }

    #[test]
    fn dup_check_matches_either_direction_of_an_overlapping_window() {
        let mut inv = Inventory::new();
        inv.add(bandwidth_pledge("p1", "a", "b", 10, 70)).unwrap();

        assert_eq!(inv.dup_check(&EndpointId::new("a"), &EndpointId::new("b"), 20, 90, 0), Some(PledgeId::new("p1")));
        assert_eq!(inv.dup_check(&EndpointId::new("b"), &EndpointId::new("a"), 20, 90, 0), Some(PledgeId::new("p1")), "endpoint pair order shouldn't matter");
        assert_eq!(inv.dup_check(&EndpointId::new("a"), &EndpointId::new("b"), 70, 90, 0), None, "non-overlapping window shouldn't match");
        assert_eq!(inv.dup_check(&EndpointId::new("a"), &EndpointId::new("c"), 20, 90, 0), None, "different endpoint pair shouldn't match");
    }

    #[test]
    fn get_honors_cookie_and_super_cookie() {
        let mut inv = Inventory::new();
        inv.add(bandwidth_pledge("p1", "a", "b", 0, 100)).unwrap();

        assert!(inv.get(&PledgeId::new("p1"), Some("cookie-a"), "super").is_some());
        assert!(inv.get(&PledgeId::new("p1"), Some("wrong-cookie"), "super").is_none());
        assert!(inv.get(&PledgeId::new("p1"), Some("super"), "super").is_some(), "super-cookie bypasses per-pledge matching");
    }

    #[test]
    fn prepare_delete_returns_paths_before_expiry_is_touched() {
        let mut inv = Inventory::new();
        inv.add(bandwidth_pledge("p1", "a", "b", 0, 1000)).unwrap();

        let (paths, commence, expiry) = inv.prepare_delete(&PledgeId::new("p1"), Some("cookie-a"), "super").unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!((commence, expiry), (0, 1000));

        // Deletion ordering rule (spec.md §4.4): finalize_delete only runs
        // after the caller has released the returned paths against the
        // graph; here we just check the expiry rewrite itself.
        inv.finalize_delete(&PledgeId::new("p1"), 500, 2).unwrap();
        let pledge = inv.get(&PledgeId::new("p1"), Some("cookie-a"), "super").unwrap();
        assert_eq!(pledge.expiry, 502);
        assert!(!pledge.pushed);
    }

    #[test]
    fn yank_clones_under_derived_id_and_nulls_real_pledge_paths() {
        let mut inv = Inventory::new();
        inv.add(bandwidth_pledge("p1", "a", "b", 0, 1000)).unwrap();

        let (_, old_paths) = inv.prepare_yank(&PledgeId::new("p1")).unwrap();
        assert_eq!(old_paths.len(), 1);

        inv.complete_yank(&PledgeId::new("p1"), 100, 2).unwrap();

        let real = inv.get(&PledgeId::new("p1"), Some("cookie-a"), "super").unwrap();
        assert!(real.paths.is_empty(), "real pledge's paths are nulled until reattach_paths runs");

        let clone_id = PledgeId::new("p1.yank");
        let clone = inv.get(&clone_id, Some("cookie-a"), "super").unwrap();
        assert_eq!(clone.expiry, 102);
        assert!(clone.pushed, "the clone is marked pushed so the Activator tears down its old rules without re-pushing them");

        inv.reattach_paths(&PledgeId::new("p1"), old_paths).unwrap();
        let real = inv.get(&PledgeId::new("p1"), Some("cookie-a"), "super").unwrap();
        assert_eq!(real.paths.len(), 1);
        assert!(!real.pushed, "reattaching marks the pledge due for push again");
    }

    #[test]
    fn purge_extinct_only_removes_pushed_and_aged_out_pledges() {
        let mut inv = Inventory::new();
        let mut never_pushed = bandwidth_pledge("p1", "a", "b", 0, 100);
        never_pushed.pushed = false;
        inv.add(never_pushed).unwrap();

        let mut pushed = bandwidth_pledge("p2", "c", "d", 0, 100);
        pushed.pushed = true;
        inv.add(pushed).unwrap();

        let purged_too_soon = inv.purge_extinct(150, 120);
        assert!(purged_too_soon.is_empty(), "pushed pledge hasn't aged past the 120s grace window yet");

        let purged = inv.purge_extinct(221, 120);
        assert_eq!(purged, vec![PledgeId::new("p2")]);
        assert!(inv.get(&PledgeId::new("p1"), Some("cookie-a"), "super").is_some(), "never-pushed pledges are never purged, per spec.md §3/§8");
    }

    #[test]
    fn checkpoint_write_then_load_round_trips_pledges_and_tenant_caps() {
        let dir = std::env::temp_dir().join(format!("bw-reservation-core-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("checkpoint.dat");
        let path_str = path.to_str().unwrap();

        let mut inv = Inventory::new();
        inv.add(bandwidth_pledge("p1", "a", "b", 0, 1000)).unwrap();
        inv.set_tenant_cap(TenantId::new("t1"), 40.0);

        inv.checkpoint_write(path_str, 10).unwrap();
        let parsed = Inventory::parse_checkpoint(path_str).unwrap();

        assert_eq!(parsed.pledges.len(), 1);
        let record = &parsed.pledges[0];
        assert_eq!(record.id, PledgeId::new("p1"));
        assert_eq!(record.src, EndpointId::new("a"));
        assert_eq!(record.dst, EndpointId::new("b"));
        assert_eq!(record.commence, 0);
        assert_eq!(record.expiry, 1000);
        assert_eq!(parsed.tenant_caps, vec![(TenantId::new("t1"), 40.0)]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn checkpoint_write_omits_expired_pledges() {
        let dir = std::env::temp_dir().join(format!("bw-reservation-core-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("checkpoint.dat");
        let path_str = path.to_str().unwrap();

        let mut inv = Inventory::new();
        inv.add(bandwidth_pledge("p1", "a", "b", 0, 100)).unwrap();

        inv.checkpoint_write(path_str, 500).unwrap();
        let parsed = Inventory::parse_checkpoint(path_str).unwrap();
        assert!(parsed.pledges.is_empty(), "a pledge already expired by `now` is never written");

        std::fs::remove_dir_all(&dir).ok();
    }
}

fn parse_dscp_field(field: &str) -> Option<DscpPolicy> {
    if field == "-" {
        return None;
    }
    let (class, preserve) = field.rsplit_once('_')?;
    let class = match class {
        "Voice" => crate::dscp::TrafficClass::Voice,
        "Control" => crate::dscp::TrafficClass::Control,
        "Data" => crate::dscp::TrafficClass::Data,
        _ => return None,
    };
    Some(DscpPolicy { class, preserve_on_egress: preserve == "true" })
}
