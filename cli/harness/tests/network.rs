//! Network phase against a mock PCC server.

use std::time::Duration;

use pcc_client::{GatewayConfig, PccClient};
use pcc_converge::{ConvergeError, PollSchedule};
use pcc_harness::network::{configure_interfaces, verify_interfaces, verify_network_up};
use pcc_harness::{Harness, HarnessConfig, HarnessError, Inventory, Phase};
use pcc_id::{InterfaceId, NodeId};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NODE_HOST: &str = "10.0.0.4";

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": 200, "data": data}))
}

fn interface(id: i64, state: &str, managed: bool, admin: &str, carrier: &str) -> Value {
    json!({
        "interface": {
            "id": id,
            "name": format!("eth{id}"),
            "macAddress": format!("aa:bb:cc:00:00:{id}"),
            "intfState": state,
            "managedByPcc": managed,
            "adminStatus": admin,
            "carrierStatus": carrier
        }
    })
}

fn client(server: &MockServer) -> PccClient {
    PccClient::connect(&GatewayConfig::new(server.uri())).unwrap()
}

fn config(mac: &str) -> HarnessConfig {
    HarnessConfig::from_json(
        &json!({
            "pccIp": "127.0.0.1",
            "servers": [{
                "hostIp": NODE_HOST,
                "netInterfaces": [{"macAddr": mac, "cidrs": ["10.0.10.4/24"], "managedByPcc": true}]
            }]
        })
        .to_string(),
    )
    .unwrap()
}

fn inventory() -> Inventory {
    [(NODE_HOST.to_string(), NodeId::new(4))].into_iter().collect()
}

fn fast(timeout_ms: u64) -> PollSchedule {
    PollSchedule::new(Duration::from_millis(timeout_ms), Duration::from_millis(20))
}

async fn mount_node_interfaces(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/node/4"))
        .respond_with(ok(json!([
            interface(30, "ready", false, "UP", "UP"),
            interface(31, "ready", true, "DOWN", "DOWN")
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_configure_and_wait_for_ready() {
    let server = MockServer::start().await;
    mount_node_interfaces(&server).await;

    Mock::given(method("POST"))
        .and(path("/pccserver/interface/apply"))
        .and(body_partial_json(json!({
            "interfaceId": 31,
            "nodeId": 4,
            "adminStatus": "UP",
            "ipv4Addresses": ["10.0.10.4/24"]
        })))
        .respond_with(ok(Value::Null))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/30"))
        .respond_with(ok(interface(30, "ready", false, "UP", "UP")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/31"))
        .respond_with(ok(interface(31, "queued", true, "UP", "DOWN")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/31"))
        .respond_with(ok(interface(31, "ready", true, "UP", "UP")))
        .mount(&server)
        .await;

    let client = client(&server);
    let index = configure_interfaces(&client, &config("AA:BB:CC:00:00:31"), &inventory())
        .await
        .unwrap();

    assert_eq!(
        index.items(&NodeId::new(4)).unwrap(),
        &[InterfaceId::new(30), InterfaceId::new(31)]
    );

    let report = verify_interfaces(&client, &index, fast(5_000)).await.unwrap();
    assert_eq!(report.converged, vec![NodeId::new(4)]);
    assert_eq!(report.passes, 3);

    let report = verify_network_up(&client, &index, fast(5_000)).await.unwrap();
    assert_eq!(report.passes, 1);
}

#[tokio::test]
async fn test_unknown_mac_is_fatal() {
    let server = MockServer::start().await;
    mount_node_interfaces(&server).await;
    Mock::given(method("POST"))
        .respond_with(ok(Value::Null))
        .expect(0)
        .mount(&server)
        .await;

    let err = configure_interfaces(&client(&server), &config("de:ad:be:ef:00:00"), &inventory())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::UnknownMac { ref host, ref mac } if host == NODE_HOST && mac == "de:ad:be:ef:00:00"
    ));
}

#[tokio::test]
async fn test_readiness_timeout_reports_stalled_interfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/30"))
        .respond_with(ok(interface(30, "ready", true, "UP", "UP")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/31"))
        .respond_with(ok(interface(31, "updating", true, "UP", "UP")))
        .mount(&server)
        .await;

    let index = [(NodeId::new(4), vec![InterfaceId::new(30), InterfaceId::new(31)])]
        .into_iter()
        .collect();

    let err = verify_interfaces(&client(&server), &index, fast(150))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    match err {
        HarnessError::Converge(ConvergeError::Timeout {
            pending, stalled, ..
        }) => {
            assert_eq!(pending, 1);
            assert_eq!(stalled.len(), 1);
            assert_eq!(stalled[0].entity, "4");
            assert_eq!(stalled[0].items.len(), 1);
            assert_eq!(stalled[0].items[0].item, "31");
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unexpected_state_aborts_without_waiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/31"))
        .respond_with(ok(interface(31, "rebooting", true, "UP", "UP")))
        .expect(1)
        .mount(&server)
        .await;

    let index = [(NodeId::new(4), vec![InterfaceId::new(31)])]
        .into_iter()
        .collect();

    let err = verify_interfaces(&client(&server), &index, fast(5_000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Converge(ConvergeError::UnexpectedState { field: "intfState", .. })
    ));
}

#[tokio::test]
async fn test_network_up_waits_for_carrier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/31"))
        .respond_with(ok(interface(31, "ready", true, "UP", "DOWN")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/31"))
        .respond_with(ok(interface(31, "ready", true, "UP", "UP")))
        .mount(&server)
        .await;

    let index = [(NodeId::new(4), vec![InterfaceId::new(31)])]
        .into_iter()
        .collect();

    let report = verify_network_up(&client(&server), &index, fast(5_000))
        .await
        .unwrap();
    assert_eq!(report.passes, 2);
}

#[tokio::test]
async fn test_observation_error_is_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pccserver/interface/4/31"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let index = [(NodeId::new(4), vec![InterfaceId::new(31)])]
        .into_iter()
        .collect();

    let err = verify_network_up(&client(&server), &index, fast(5_000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Converge(ConvergeError::Observation { .. })
    ));
}

#[tokio::test]
async fn test_dry_run_only_discovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pccserver/node"))
        .respond_with(ok(json!([{"id": 4, "host": NODE_HOST}])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config("aa:bb:cc:00:00:31");
    config.dry_run = true;

    Harness::new(client(&server), config, "ci")
        .run(&[Phase::Network, Phase::Ceph])
        .await
        .unwrap();
}
