use serde::{Deserialize, Serialize};

use crate::ids::{EndpointId, SwitchId, TenantId};

/// A virtual machine or external address the core can reserve bandwidth
/// between (spec.md §3, "Endpoint").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub uuid: EndpointId,
    pub mac: String,
    pub ips: Vec<String>,
    pub project: TenantId,
    pub physical_host: String,

    /// Resolved by `Graph::rebuild` from `physical_host`; `None` until
    /// the first successful topology build attaches it.
    pub switch: Option<SwitchId>,

    /// Negative signals "port unknown; bind late via MAC" (spec.md §3).
    pub port: i32,
}

impl Endpoint {
    pub fn port_known(&self) -> bool {
        self.port >= 0
    }
}

/// Endpoint identifier grammar the core accepts (spec.md §6): a bare
/// uuid, `project/uuid`, or `!/ip-address` for externally managed
/// addresses. The core never parses tokens itself — identifiers arriving
/// here have already been validated by the OpenStack-adapter collaborator
/// — but this type keeps the three shapes distinct in the admission path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointRef {
    Uuid(EndpointId),
    ProjectScoped { project: TenantId, uuid: EndpointId },
    External { ip: String },
}

impl EndpointRef {
    pub fn parse(raw: &str) -> Self {
        if let Some(ip) = raw.strip_prefix("!/") {
            return EndpointRef::External { ip: ip.to_string() };
        }
        if let Some((project, uuid)) = raw.split_once('/') {
            return EndpointRef::ProjectScoped { project: TenantId::new(project), uuid: EndpointId::new(uuid) };
        }
        EndpointRef::Uuid(EndpointId::new(raw))
    }
}
