//
// Copyright (c) The ripd-core Contributors
//
// SPDX-License-Identifier: MIT
//
// End-to-end RouteDB/UpdateEngine scenarios, exercised directly against the
// module API rather than through the Dispatcher's socket plumbing.

use std::cell::RefCell;
use std::net::Ipv4Addr;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use tokio::sync::mpsc;

use ripd_core::distance::DistanceTable;
use ripd_core::events::{self, IncomingRte, IngestOutcome, IngressPolicy, Timers};
use ripd_core::instance::InstanceState;
use ripd_core::interface::{Interfaces, SplitHorizon};
use ripd_core::metric::Metric;
use ripd_core::packet::{Pdu, Rte, RteZero};
use ripd_core::policy::{AccessList, Direction, OffsetList, PrefixList, RouteInfo, RouteMap, RouteMapVerdict, Verdict};
use ripd_core::route::{RouteEntry, RouteTable};
use ripd_core::southbound::FibSink;
use ripd_core::tasks::DispatcherMsg;
use ripd_core::update::{self, EgressPolicy, RedistributeDefaults, ResponseType};

struct PermitAll;

impl AccessList for PermitAll {
    fn apply(&self, _name: &str, _prefix: &Ipv4Network) -> Option<Verdict> {
        Some(Verdict::Permit)
    }
}

impl PrefixList for PermitAll {
    fn apply(&self, _name: &str, _prefix: &Ipv4Network) -> Option<Verdict> {
        Some(Verdict::Permit)
    }
}

impl RouteMap for PermitAll {
    fn apply(&self, _name: &str, _info: &mut RouteInfo) -> RouteMapVerdict {
        RouteMapVerdict::Match
    }
}

impl OffsetList for PermitAll {
    fn apply(&self, _name: &str, _dir: Direction, _prefix: &Ipv4Network, _ifname: &str, _metric: &mut Metric) -> bool {
        false
    }
}

#[derive(Default)]
struct FibRecorder {
    adds: RefCell<Vec<(Ipv4Network, Ipv4Addr, Metric, u8)>>,
    deletes: RefCell<Vec<(Ipv4Network, Ipv4Addr, Metric)>>,
}

impl FibSink for FibRecorder {
    fn fib_add(&self, prefix: Ipv4Network, nexthop: Ipv4Addr, metric: Metric, distance: u8) {
        self.adds.borrow_mut().push((prefix, nexthop, metric, distance));
    }

    fn fib_delete(&self, prefix: Ipv4Network, nexthop: Ipv4Addr, metric: Metric) {
        self.deletes.borrow_mut().push((prefix, nexthop, metric));
    }
}

fn ingress_policy() -> IngressPolicy<'static> {
    IngressPolicy {
        access_list: &PermitAll,
        prefix_list: &PermitAll,
        route_map: &PermitAll,
        offset_list: &PermitAll,
    }
}

/// Scenario 1: a v2 Response over a no-auth interface is accepted, the
/// interface's own cost is added to the advertised metric, and the result is
/// installed in the FIB with the default administrative distance.
#[tokio::test]
async fn v2_response_is_accepted_and_installed() {
    let mut interfaces = Interfaces::default();
    let (idx, iface) = interfaces.add("eth0");
    iface.system.addr_list.insert("10.0.0.1/24".parse().unwrap());
    iface.config.cost = Metric::from(1);

    let mut routes = RouteTable::default();
    let distance_table = DistanceTable::default();
    let fib = FibRecorder::default();
    let (msgp, _msgc) = mpsc::unbounded_channel::<DispatcherMsg>();
    let timers = Timers {
        timeout: Duration::from_secs(180),
        garbage: Duration::from_secs(120),
    };

    let incoming = IncomingRte {
        prefix_addr: "10.1.0.0".parse().unwrap(),
        prefix_mask: Some("255.255.0.0".parse().unwrap()),
        nexthop: Ipv4Addr::UNSPECIFIED,
        metric: 5,
        tag: 7,
    };

    let outcome = events::process_rte(
        &mut routes,
        &incoming,
        "10.0.0.2".parse().unwrap(),
        0,
        &interfaces[idx],
        &ingress_policy(),
        &distance_table,
        &timers,
        &fib,
        &msgp,
    );
    assert!(matches!(outcome, IngestOutcome::Accepted { triggers_update: true }));

    let prefix: Ipv4Network = "10.1.0.0/16".parse().unwrap();
    let entry = routes.get(&prefix).expect("route installed");
    assert_eq!(entry.metric.get(), 6);
    assert_eq!(entry.tag, 7);
    assert_eq!(entry.nexthop, "10.0.0.2".parse::<Ipv4Addr>().unwrap());
    assert_eq!(entry.from, "10.0.0.2".parse::<Ipv4Addr>().unwrap());
    assert!(entry.is_in_fib());

    let adds = fib.adds.borrow();
    assert_eq!(adds.len(), 1);
    assert_eq!(
        adds[0],
        (prefix, "10.0.0.2".parse().unwrap(), Metric::from(6), 120)
    );
}

/// Scenario 2: a route learned via an interface configured for poisoned
/// reverse is still included in that interface's dump, advertised unreachable.
#[tokio::test]
async fn poisoned_reverse_advertises_infinite_metric() {
    let mut interfaces = Interfaces::default();
    let (idx, iface) = interfaces.add("eth0");
    iface.system.addr_list.insert("10.0.0.1/24".parse().unwrap());
    iface.config.split_horizon = SplitHorizon::PoisonReverse;
    let ifindex = 7;
    iface.system.ifindex = Some(ifindex);

    let mut routes = RouteTable::default();
    let prefix: Ipv4Network = "10.1.0.0/16".parse().unwrap();
    let mut entry = RouteEntry::new_learned(
        Metric::from(6),
        7,
        "10.0.0.2".parse().unwrap(),
        "10.0.0.2".parse().unwrap(),
        ifindex,
        120,
    );
    entry.set_changed();
    routes.insert(prefix, entry);

    let policy = EgressPolicy {
        route_map: &PermitAll,
        offset_list: &PermitAll,
    };
    let defaults = RedistributeDefaults {
        default_metric: Metric::from(1),
    };

    let pdus = update::build_dump(
        &routes,
        &interfaces[idx],
        ifindex,
        2,
        ResponseType::Periodic,
        &policy,
        &defaults,
        Pdu::max_entries(None),
    );
    assert_eq!(pdus.len(), 1);
    let Rte::Ipv4(rte) = &pdus[0].rtes[0] else {
        panic!("expected an IPv4 RTE");
    };
    assert!(rte.metric.is_infinite());
}

/// The split-horizon law's plain-split-horizon half: the same route, same
/// interface, but without poisoned reverse is omitted entirely rather than
/// advertised with any metric.
#[test]
fn simple_split_horizon_omits_the_route() {
    let mut interfaces = Interfaces::default();
    let (idx, iface) = interfaces.add("eth0");
    iface.system.addr_list.insert("10.0.0.1/24".parse().unwrap());
    let ifindex = 7;
    iface.system.ifindex = Some(ifindex);
    assert_eq!(iface.config.split_horizon, SplitHorizon::Simple);

    let mut routes = RouteTable::default();
    let prefix: Ipv4Network = "10.1.0.0/16".parse().unwrap();
    let mut entry = RouteEntry::new_learned(
        Metric::from(6),
        0,
        "10.0.0.2".parse().unwrap(),
        "10.0.0.2".parse().unwrap(),
        ifindex,
        120,
    );
    entry.set_changed();
    routes.insert(prefix, entry);

    let policy = EgressPolicy {
        route_map: &PermitAll,
        offset_list: &PermitAll,
    };
    let defaults = RedistributeDefaults {
        default_metric: Metric::from(1),
    };

    let pdus = update::build_dump(
        &routes,
        &interfaces[idx],
        ifindex,
        2,
        ResponseType::Periodic,
        &policy,
        &defaults,
        Pdu::max_entries(None),
    );
    assert!(pdus.is_empty());
}

/// Scenario 3: after the timeout fires the route is advertised unreachable
/// and pulled from the FIB but kept in the table; after garbage collection it
/// is removed outright.
#[tokio::test]
async fn timeout_then_garbage_collection_removes_the_entry() {
    let mut routes = RouteTable::default();
    let prefix: Ipv4Network = "10.1.0.0/16".parse().unwrap();
    let mut entry = RouteEntry::new_learned(
        Metric::from(6),
        0,
        Ipv4Addr::UNSPECIFIED,
        "10.0.0.2".parse().unwrap(),
        0,
        120,
    );
    entry.set_in_fib(true);
    routes.insert(prefix, entry);

    let fib = FibRecorder::default();
    let (msgp, _msgc) = mpsc::unbounded_channel::<DispatcherMsg>();

    events::on_timeout(&mut routes, &fib, &prefix, Duration::from_secs(120), &msgp);
    {
        let entry = routes.get(&prefix).expect("entry kept pending garbage collection");
        assert!(entry.metric.is_infinite());
        assert!(!entry.is_in_fib());
    }
    assert_eq!(fib.deletes.borrow().len(), 1);

    events::on_garbage_expiry(&mut routes, &prefix);
    assert!(routes.get(&prefix).is_none());
}

/// Scenario 4: a Request carrying the lone family-0 sentinel RTE with an
/// infinite metric is answered with a full dump for the requesting interface.
#[test]
fn request_sentinel_triggers_a_full_dump() {
    let mut interfaces = Interfaces::default();
    let (idx, iface) = interfaces.add("eth0");
    iface.system.addr_list.insert("10.0.0.1/24".parse().unwrap());
    let ifindex = 3;
    iface.system.ifindex = Some(ifindex);

    let mut routes = RouteTable::default();
    let prefix: Ipv4Network = "10.1.0.0/16".parse().unwrap();
    let entry = RouteEntry::new_learned(
        Metric::from(4),
        0,
        "10.0.0.9".parse().unwrap(),
        "10.0.0.9".parse().unwrap(),
        99,
        120,
    );
    routes.insert(prefix, entry);

    let policy = EgressPolicy {
        route_map: &PermitAll,
        offset_list: &PermitAll,
    };
    let defaults = RedistributeDefaults {
        default_metric: Metric::from(1),
    };
    let request = vec![Rte::Zero(RteZero {
        metric: Metric::infinite(),
    })];

    let pdus = update::handle_request(
        &routes,
        &interfaces[idx],
        ifindex,
        2,
        &request,
        &policy,
        &defaults,
        Pdu::max_entries(None),
    );
    assert_eq!(pdus.len(), 1);
    assert_eq!(pdus[0].rtes.len(), 1);
}

/// Scenario 5: RIPv1 mask inference on a subnetted class-B interface.
#[tokio::test]
async fn v1_classful_inference_on_a_subnetted_interface() {
    let mut interfaces = Interfaces::default();
    let (idx, iface) = interfaces.add("eth0");
    iface.system.addr_list.insert("172.16.5.1/24".parse().unwrap());

    let distance_table = DistanceTable::default();
    let fib = FibRecorder::default();
    let (msgp, _msgc) = mpsc::unbounded_channel::<DispatcherMsg>();
    let timers = Timers::default();

    // Within the interface's own classful network: inherits its /24 mask.
    let mut routes = RouteTable::default();
    let incoming = IncomingRte {
        prefix_addr: "172.16.9.0".parse().unwrap(),
        prefix_mask: None,
        nexthop: Ipv4Addr::UNSPECIFIED,
        metric: 3,
        tag: 0,
    };
    events::process_rte(
        &mut routes,
        &incoming,
        "172.16.5.2".parse().unwrap(),
        0,
        &interfaces[idx],
        &ingress_policy(),
        &distance_table,
        &timers,
        &fib,
        &msgp,
    );
    assert!(routes.keys().any(|p| *p == "172.16.9.0/24".parse::<Ipv4Network>().unwrap()));

    // A different class-A network entirely: falls back to its classful /8.
    let mut routes = RouteTable::default();
    let incoming = IncomingRte {
        prefix_addr: "10.0.0.0".parse().unwrap(),
        prefix_mask: None,
        nexthop: Ipv4Addr::UNSPECIFIED,
        metric: 3,
        tag: 0,
    };
    events::process_rte(
        &mut routes,
        &incoming,
        "172.16.5.2".parse().unwrap(),
        0,
        &interfaces[idx],
        &ingress_policy(),
        &distance_table,
        &timers,
        &fib,
        &msgp,
    );
    assert!(routes.keys().any(|p| *p == "10.0.0.0/8".parse::<Ipv4Network>().unwrap()));

    // A different class-B network on the same interface: outside its own
    // subnetted network, so the plain classful /16 is used instead.
    let mut routes = RouteTable::default();
    let incoming = IncomingRte {
        prefix_addr: "172.17.0.0".parse().unwrap(),
        prefix_mask: None,
        nexthop: Ipv4Addr::UNSPECIFIED,
        metric: 3,
        tag: 0,
    };
    events::process_rte(
        &mut routes,
        &incoming,
        "172.16.5.2".parse().unwrap(),
        0,
        &interfaces[idx],
        &ingress_policy(),
        &distance_table,
        &timers,
        &fib,
        &msgp,
    );
    assert!(routes.keys().any(|p| *p == "172.17.0.0/16".parse::<Ipv4Network>().unwrap()));
}

/// Triggered-update coalescing: any number of route changes within the
/// cooldown window only leave the single pending flag set, never a count.
#[test]
fn triggered_update_flag_coalesces_repeated_raises() {
    let mut state = InstanceState::default();
    assert!(!state.pending_trigger_update);

    state.raise_triggered_update();
    state.raise_triggered_update();
    state.raise_triggered_update();

    assert!(state.pending_trigger_update);
    state.pending_trigger_update = false;
    assert!(!state.pending_trigger_update);
}
