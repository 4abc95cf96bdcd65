use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loader::parser::parse_json_file;

/// Process-wide policy knobs, loaded once at startup and threaded through
/// [`crate::context::CoreContext`] rather than read from module-level
/// globals (spec.md §9, "Global mutable state").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Percentage of raw link capacity withheld from every newly created
    /// link (spec.md §4.1, "Headroom").
    pub link_headroom_pct: f64,

    /// Default alarm threshold (percent) attached to a link when the
    /// topology source does not supply one.
    pub default_alarm_threshold_pct: f64,

    /// Default tenant fence ceiling, as a percentage of link capacity.
    pub default_fence_pct: f64,

    /// Whether disjoint-network tolerance is enabled (spec.md §4.2).
    pub relaxed_mode: bool,

    /// Synthetic capacity assigned to virtual links (intra-switch ports and
    /// relaxed-mode gateway links).
    pub virtual_link_capacity_bps: i64,

    /// Activator tick interval, seconds.
    pub activator_tick_secs: u64,

    /// Window (seconds) before commence time in which a pledge becomes
    /// eligible for flow-mod push.
    pub activation_lookahead_secs: i64,

    /// Checkpoint write/purge cadence, seconds.
    pub checkpoint_cadence_secs: u64,

    /// Grace period after expiry+push before a pledge is purged from the
    /// cache (spec.md §3, §4.4).
    pub purge_grace_secs: i64,

    /// Grace window added to a deleted pledge's expiry so a final
    /// pre-empting flow-mod set gets pushed (spec.md §4.4, `delete`).
    pub delete_grace_secs: i64,

    /// Emit only endpoint-attached queues in the queue map, dropping
    /// transit priority-queue entries (spec.md §4.5).
    pub endpoint_only_queues: bool,

    /// Path to the checkpoint file.
    pub checkpoint_path: String,

    /// Cookie value that bypasses per-pledge cookie matching in `get`.
    pub super_cookie: String,

    /// Run the MLAG-debit-aware search variant for bandwidth admission
    /// (spec.md §4.2, "MLAG-aware").
    pub mlag_aware_admission: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            link_headroom_pct: 10.0,
            default_alarm_threshold_pct: 90.0,
            default_fence_pct: 100.0,
            relaxed_mode: false,
            virtual_link_capacity_bps: 100_000_000_000,
            activator_tick_secs: 1,
            activation_lookahead_secs: 15,
            checkpoint_cadence_secs: 180,
            purge_grace_secs: 120,
            delete_grace_secs: 2,
            endpoint_only_queues: false,
            checkpoint_path: "checkpoint.dat".to_string(),
            super_cookie: "superset".to_string(),
            mlag_aware_admission: false,
        }
    }
}

impl CoreConfig {
    /// Loads configuration from a JSON file, falling back to defaults for
    /// any field the file omits (`#[serde(default)]` above).
    pub fn load(file_path: &str) -> Result<Self> {
        parse_json_file::<CoreConfig>(file_path)
    }
}
