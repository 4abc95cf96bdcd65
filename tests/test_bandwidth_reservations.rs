use std::sync::Arc;

use bw_reservation_core::agent_transport::NullAgentTransport;
use bw_reservation_core::clock::FixedClock;
use bw_reservation_core::config::CoreConfig;
use bw_reservation_core::core::{Core, CoreResponse};
use bw_reservation_core::error::CoreError;
use bw_reservation_core::graph::{Endpoint, EndpointUpdate, Topology, TopologyLink};
use bw_reservation_core::ids::{EndpointId, TenantId};
use bw_reservation_core::ledger::Direction;
use bw_reservation_core::reservation::messages::RefreshPledge;
use bw_reservation_core::reservation::CoreRequest;

fn two_switch_endpoints() -> EndpointUpdate {
    EndpointUpdate {
        upserts: vec![
            Endpoint { uuid: EndpointId::new("a"), mac: "aa:aa".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s1".into(), switch: None, port: 1 },
            Endpoint { uuid: EndpointId::new("b"), mac: "bb:bb".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s2".into(), switch: None, port: 1 },
            Endpoint { uuid: EndpointId::new("c"), mac: "cc:cc".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s1".into(), switch: None, port: 2 },
            Endpoint { uuid: EndpointId::new("d"), mac: "dd:dd".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s2".into(), switch: None, port: 2 },
            Endpoint { uuid: EndpointId::new("e"), mac: "ee:ee".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s1".into(), switch: None, port: 3 },
            Endpoint { uuid: EndpointId::new("f"), mac: "ff:ff".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s2".into(), switch: None, port: 3 },
        ],
        deletes: vec![],
    }
}

fn two_switch_topology() -> Topology {
    Topology {
        links: vec![TopologyLink { src: bw_reservation_core::ids::SwitchId::new("s1"), dst: bw_reservation_core::ids::SwitchId::new("s2"), capacity_bps: 1_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None }],
        physical_hosts: vec![],
    }
}

async fn start_two_switch_core(config: CoreConfig) -> Core {
    let core = Core::start(config, Arc::new(FixedClock::new(1000)), Arc::new(NullAgentTransport));
    core.rebuild(two_switch_topology(), Some(two_switch_endpoints())).await.unwrap();
    core
}

#[actix_rt::test]
async fn happy_path_reservation_is_admitted_and_listed() {
    let core = start_two_switch_core(CoreConfig { link_headroom_pct: 0.0, ..Default::default() }).await;

    let response = core
        .dispatch(CoreRequest::ReserveBandwidth {
            src: "a".to_string(),
            dst: "b".to_string(),
            commence: 1000,
            expiry: 2000,
            bandwidth_in_bps: 100_000_000,
            bandwidth_out_bps: 100_000_000,
            cookie: None,
            dscp_class: None,
        })
        .await
        .unwrap();

    let id = match response {
        CoreResponse::PledgeId(id) => id,
        other => panic!("expected a PledgeId, got {:?}", other),
    };

    let listed = match core.dispatch(CoreRequest::List).await.unwrap() {
        CoreResponse::List(json) => json,
        other => panic!("expected a List, got {:?}", other),
    };
    assert!(listed.contains(&id.to_string()), "the admitted pledge shows up in LIST: {}", listed);
}

#[actix_rt::test]
async fn duplicate_reservation_over_the_same_pair_and_window_is_rejected() {
    let core = start_two_switch_core(CoreConfig { link_headroom_pct: 0.0, ..Default::default() }).await;

    let reserve = |src: &'static str, dst: &'static str| {
        CoreRequest::ReserveBandwidth { src: src.to_string(), dst: dst.to_string(), commence: 1000, expiry: 2000, bandwidth_in_bps: 10_000_000, bandwidth_out_bps: 10_000_000, cookie: None, dscp_class: None }
    };

    core.dispatch(reserve("a", "b")).await.unwrap();
    let err = core.dispatch(reserve("a", "b")).await.unwrap_err();
    assert!(matches!(err, CoreError::DuplicateReservation(_)));

    // The reverse direction over the same overlapping window is the same
    // "reservation" for dup_check's purposes.
    let err = core.dispatch(reserve("b", "a")).await.unwrap_err();
    assert!(matches!(err, CoreError::DuplicateReservation(_)));
}

#[actix_rt::test]
async fn link_capacity_contention_admits_until_headroom_adjusted_capacity_is_exhausted() {
    // 10% headroom over a 1Gbps link leaves 900Mbps of effective capacity.
    let core = start_two_switch_core(CoreConfig { link_headroom_pct: 10.0, ..Default::default() }).await;

    let one_way = |src: &'static str, dst: &'static str, bps: i64| CoreRequest::ReserveBandwidthOneWay {
        src: src.to_string(),
        dst: dst.to_string(),
        commence: 1000,
        expiry: 2000,
        bandwidth_out_bps: bps,
        cookie: None,
        dscp_class: None,
    };

    // 500Mbps admitted: 500/900 used.
    core.dispatch(one_way("a", "b", 500_000_000)).await.unwrap();

    // A second 500Mbps reservation (different pair, same link) no longer fits.
    let err = core.dispatch(one_way("c", "d", 500_000_000)).await.unwrap_err();
    assert_eq!(err, CoreError::NoCapacity(Direction::Outbound));

    // But exactly 400Mbps brings the link to 900/900 and is admitted.
    core.dispatch(one_way("e", "f", 400_000_000)).await.unwrap();
}

#[actix_rt::test]
async fn disjoint_partitions_without_relaxed_mode_report_no_path() {
    let core = Core::start(CoreConfig { link_headroom_pct: 0.0, relaxed_mode: false, ..Default::default() }, Arc::new(FixedClock::new(1000)), Arc::new(NullAgentTransport));

    let topo = Topology {
        links: vec![
            TopologyLink { src: bw_reservation_core::ids::SwitchId::new("s1"), dst: bw_reservation_core::ids::SwitchId::new("s2"), capacity_bps: 1_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None },
            TopologyLink { src: bw_reservation_core::ids::SwitchId::new("s3"), dst: bw_reservation_core::ids::SwitchId::new("s4"), capacity_bps: 1_000_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None },
        ],
        physical_hosts: vec![],
    };
    let endpoints = EndpointUpdate {
        upserts: vec![
            Endpoint { uuid: EndpointId::new("a"), mac: "aa:aa".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s1".into(), switch: None, port: 1 },
            Endpoint { uuid: EndpointId::new("g"), mac: "gg:gg".into(), ips: vec![], project: TenantId::new("tenant1"), physical_host: "s3".into(), switch: None, port: 1 },
        ],
        deletes: vec![],
    };
    core.rebuild(topo, Some(endpoints)).await.unwrap();

    let err = core
        .dispatch(CoreRequest::ReserveBandwidth { src: "a".to_string(), dst: "g".to_string(), commence: 1000, expiry: 2000, bandwidth_in_bps: 1_000, bandwidth_out_bps: 1_000, cookie: None, dscp_class: None })
        .await
        .unwrap_err();
    // Both legs independently fail with NoPath since the two switches are
    // in disjoint partitions of the graph and relaxed mode is off.
    assert_eq!(err, CoreError::NoPath);
}

#[actix_rt::test]
async fn refresh_yanks_the_old_allocation_and_reattaches_a_fresh_one() {
    let core = start_two_switch_core(CoreConfig { link_headroom_pct: 0.0, ..Default::default() }).await;

    let id = match core
        .dispatch(CoreRequest::ReserveBandwidth { src: "a".to_string(), dst: "b".to_string(), commence: 1000, expiry: 2000, bandwidth_in_bps: 200_000_000, bandwidth_out_bps: 200_000_000, cookie: None, dscp_class: None })
        .await
        .unwrap()
    {
        CoreResponse::PledgeId(id) => id,
        other => panic!("expected a PledgeId, got {:?}", other),
    };

    core.reservations.send(RefreshPledge { id: id.clone() }).await.unwrap().unwrap();

    let listed = match core.dispatch(CoreRequest::List).await.unwrap() {
        CoreResponse::List(json) => json,
        other => panic!("expected a List, got {:?}", other),
    };
    // The real pledge keeps its original id and is still active; the
    // yanked clone lives under a derived id with its own (near-term)
    // expiry, so both ids are present right after a refresh.
    assert!(listed.contains(&id.to_string()));
}

#[actix_rt::test]
async fn pause_suppresses_activation_and_resume_re_enables_it() {
    let core = start_two_switch_core(CoreConfig { link_headroom_pct: 0.0, ..Default::default() }).await;

    core.dispatch(CoreRequest::Pause).await.unwrap();

    let id = match core
        .dispatch(CoreRequest::ReserveBandwidth { src: "a".to_string(), dst: "b".to_string(), commence: 1000, expiry: 2000, bandwidth_in_bps: 100_000_000, bandwidth_out_bps: 100_000_000, cookie: None, dscp_class: None })
        .await
        .unwrap()
    {
        CoreResponse::PledgeId(id) => id,
        other => panic!("expected a PledgeId, got {:?}", other),
    };

    // Accepted while paused, but pre-marked pushed so the Activator never
    // tries to push flow-mods for it until resume.
    let listed = match core.dispatch(CoreRequest::List).await.unwrap() {
        CoreResponse::List(json) => json,
        other => panic!("expected a List, got {:?}", other),
    };
    assert!(listed.contains(&id.to_string()));
    assert!(listed.contains("\"pushed\":true"));

    core.dispatch(CoreRequest::Resume).await.unwrap();
}

#[actix_rt::test]
async fn checkpoint_round_trips_across_a_reduced_capacity_reload() {
    let path = std::env::temp_dir().join(format!("bw-reservation-core-itest-{}.csv", uuid::Uuid::new_v4()));
    let config = CoreConfig { link_headroom_pct: 0.0, checkpoint_path: path.to_str().unwrap().to_string(), ..Default::default() };
    let core = start_two_switch_core(config.clone()).await;

    core.dispatch(CoreRequest::ReserveBandwidth { src: "a".to_string(), dst: "b".to_string(), commence: 1000, expiry: 2000, bandwidth_in_bps: 400_000_000, bandwidth_out_bps: 400_000_000, cookie: None, dscp_class: None })
        .await
        .unwrap();
    core.dispatch(CoreRequest::Checkpoint).await.unwrap();

    // A fresh core with a tighter link gets the first pledge back but
    // should fail to re-admit a second, larger one on reload.
    let reloaded = Core::start(config, Arc::new(FixedClock::new(1000)), Arc::new(NullAgentTransport));
    let tight_topology = Topology {
        links: vec![TopologyLink { src: bw_reservation_core::ids::SwitchId::new("s1"), dst: bw_reservation_core::ids::SwitchId::new("s2"), capacity_bps: 500_000_000, src_port: 1, dst_port: 1, mlag_group: None, alarm_threshold_pct: None }],
        physical_hosts: vec![],
    };
    reloaded.rebuild(tight_topology, Some(two_switch_endpoints())).await.unwrap();
    reloaded.dispatch(CoreRequest::Load { path: path.to_str().unwrap().to_string() }).await.unwrap();

    let listed = match reloaded.dispatch(CoreRequest::List).await.unwrap() {
        CoreResponse::List(json) => json,
        other => panic!("expected a List, got {:?}", other),
    };
    // The 400Mbps reservation still fits in the new 500Mbps (no headroom)
    // link and is re-admitted; nothing else was checkpointed to conflict.
    assert!(listed.contains("\"bandwidth_in_bps\":400000000"));

    std::fs::remove_file(&path).ok();
}
