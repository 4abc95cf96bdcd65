use serde::{Deserialize, Serialize};

use crate::ids::PledgeId;

/// Sealed set of inbound request kinds the core consumes (spec.md §6,
/// §9 "Dynamic parameter passing" — named fields per variant, never a
/// string-keyed option map).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CoreRequest {
    ReserveBandwidth {
        src: String,
        dst: String,
        commence: i64,
        expiry: i64,
        bandwidth_in_bps: i64,
        bandwidth_out_bps: i64,
        cookie: Option<String>,
        dscp_class: Option<String>,
    },
    ReserveBandwidthOneWay {
        src: String,
        dst: String,
        commence: i64,
        expiry: i64,
        bandwidth_out_bps: i64,
        cookie: Option<String>,
        dscp_class: Option<String>,
    },
    CapacityCheck {
        src: String,
        dst: String,
        commence: i64,
        expiry: i64,
        bandwidth_in_bps: i64,
        bandwidth_out_bps: i64,
    },
    Delete {
        id: PledgeId,
        cookie: Option<String>,
    },
    List,
    SetTenantCap {
        tenant: String,
        percent: f64,
    },
    SetDiscount {
        value: f64,
    },
    Pause,
    Resume,
    Checkpoint,
    Load {
        path: String,
    },
}
