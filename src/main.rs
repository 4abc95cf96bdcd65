use std::sync::Arc;

use clap::Parser;

use bw_reservation_core::agent_transport::NullAgentTransport;
use bw_reservation_core::clock::SystemClock;
use bw_reservation_core::config::CoreConfig;
use bw_reservation_core::graph::{Endpoint, EndpointUpdate, Topology, TopologyLink};
use bw_reservation_core::ids::{EndpointId, SwitchId, TenantId};
use bw_reservation_core::reservation::CoreRequest;
use bw_reservation_core::{Core, CoreResponse};

/// Demo entry point: wires a `Core` with a null agent transport, loads a
/// two-switch topology and a pair of demo endpoints, reserves bandwidth
/// between them, and prints the result. Scaffolding only — the reusable
/// behavior lives in the library (spec.md's "no HTTP surface" Non-goal,
/// SPEC_FULL.md §11).
#[derive(Parser, Debug)]
#[command(name = "bw-reservation-demo", about = "Demo driver for the bandwidth reservation core")]
struct Cli {
    /// Path to a CoreConfig JSON file; defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,
}

#[actix::main]
async fn main() -> anyhow::Result<()> {
    bw_reservation_core::logger::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    log::info!("starting demo with config: {:?}", config);

    let core = Core::start(config, Arc::new(SystemClock), Arc::new(NullAgentTransport));

    // Switch names follow the `host-<physical_host>` convention
    // `GraphModel::rebuild` uses to attach endpoints by physical host.
    let switch_a = SwitchId::new("host-a");
    let switch_b = SwitchId::new("host-b");
    let topology = Topology {
        links: vec![
            TopologyLink { src: switch_a.clone(), dst: switch_b.clone(), capacity_bps: 10_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None },
            TopologyLink { src: switch_b.clone(), dst: switch_a.clone(), capacity_bps: 10_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None },
        ],
        physical_hosts: vec!["a".to_string(), "b".to_string()],
    };

    let tenant = TenantId::new("demo-tenant");
    let vm_a = EndpointId::new("11111111-1111-1111-1111-111111111111");
    let vm_b = EndpointId::new("22222222-2222-2222-2222-222222222222");
    let endpoints = EndpointUpdate {
        upserts: vec![
            Endpoint { uuid: vm_a.clone(), mac: "aa:aa:aa:aa:aa:aa".into(), ips: vec!["10.0.0.1".into()], project: tenant.clone(), physical_host: "a".into(), switch: None, port: -1 },
            Endpoint { uuid: vm_b.clone(), mac: "bb:bb:bb:bb:bb:bb".into(), ips: vec!["10.0.0.2".into()], project: tenant, physical_host: "b".into(), switch: None, port: -1 },
        ],
        deletes: Vec::new(),
    };

    core.rebuild(topology, Some(endpoints)).await?;

    let now = core.context.now();
    let request = CoreRequest::ReserveBandwidth {
        src: format!("demo-tenant/{}", vm_a),
        dst: format!("demo-tenant/{}", vm_b),
        commence: now,
        expiry: now + 3600,
        bandwidth_in_bps: 500_000_000,
        bandwidth_out_bps: 500_000_000,
        cookie: Some("demo".to_string()),
        dscp_class: None,
    };

    match core.dispatch(request).await {
        Ok(CoreResponse::PledgeId(id)) => log::info!("reserved pledge {}", id),
        Ok(other) => log::info!("unexpected response: {:?}", other),
        Err(e) => log::error!("reservation failed: {}", e),
    }

    let listing = core.dispatch(CoreRequest::List).await?;
    if let CoreResponse::List(json) = listing {
        log::info!("current pledges: {}", json);
    }

    Ok(())
}
