use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One `(switch, port, queue, bandwidth_min, bandwidth_max, priority)`
/// instruction in a queue-map push (spec.md §4.5, "Queue-map
/// regeneration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub switch: String,
    pub port: i32,
    pub queue_id: String,
    pub bandwidth_min_bps: i64,
    pub bandwidth_max_bps: i64,
    pub priority: u8,
}

/// One flow-mod the Activator generates for a single path/DSCP
/// combination, carried to the agent as an opaque CLI-equivalent string
/// (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowModEntry {
    pub host: String,
    pub cli_args: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "atype", rename_all = "lowercase")]
pub enum Action {
    Setqueues { qdata: Vec<QueueEntry>, hosts: Vec<String> },
    Flowmod { fdata: Vec<String> },
}

/// The exact outbound wire shape the core emits to the agent transport
/// (spec.md §6, "Outbound to agent transport"). The core only ever reads
/// "ok"/"failed" back; it never parses anything past that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionList {
    pub ctype: String,
    pub actions: Vec<Action>,
}

impl ActionList {
    pub fn setqueues(qdata: Vec<QueueEntry>, hosts: Vec<String>) -> Self {
        Self { ctype: "action_list".to_string(), actions: vec![Action::Setqueues { qdata, hosts }] }
    }

    pub fn flowmod(fdata: Vec<String>) -> Self {
        Self { ctype: "action_list".to_string(), actions: vec![Action::Flowmod { fdata }] }
    }
}

/// The agent-manager connection, specified only by the interface the
/// core consumes (spec.md §1, §4.6). A real implementation forwards
/// `ActionList`s to remote executors over whatever wire protocol the
/// collaborator speaks; the core neither knows nor cares.
#[async_trait]
pub trait AgentTransport: Send + Sync + std::fmt::Debug {
    async fn send(&self, action: ActionList) -> Result<()>;
}

/// No-op transport for tests and the demo binary: logs what would have
/// been sent and always reports success.
#[derive(Debug, Default)]
pub struct NullAgentTransport;

#[async_trait]
impl AgentTransport for NullAgentTransport {
    async fn send(&self, action: ActionList) -> Result<()> {
        log::info!("agent transport (null): {} action(s)", action.actions.len());
        Ok(())
    }
}
