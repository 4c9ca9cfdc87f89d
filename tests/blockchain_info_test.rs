//! BlockchainInfoClient tests against a fake explorer
//!
//! An axum server stands in for blockchain.info, serving the `/unspent`,
//! `/rawaddr/:address` and `/pushtx` endpoints with canned bodies.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Form, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bitcoin::hashes::Hash;
use bitcoin::{Address, Network, PubkeyHash};
use btc_swap::{BlockchainInfoClient, BtcSwapError, ChainClient, NetworkParams};
use common::init_logger;
use serde_json::json;

const TX_HASH: &str = "0102030405060708091011121314151617181920212223242526272829303132";

#[derive(Default)]
struct Explorer {
    funded: String,
    empty: String,
    queries: Mutex<Vec<HashMap<String, String>>>,
    pushed: Mutex<Vec<String>>,
}

type ExplorerState = Arc<Explorer>;

async fn unspent(
    State(explorer): State<ExplorerState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    explorer.queries.lock().unwrap().push(params.clone());
    let active = params.get("active").cloned().unwrap_or_default();

    if active == explorer.empty {
        return (StatusCode::INTERNAL_SERVER_ERROR, "No free outputs to spend").into_response();
    }
    if active != explorer.funded {
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }

    Json(json!({
        "notice": "",
        "unspent_outputs": [
            {
                "tx_hash": TX_HASH,
                "tx_hash_big_endian": "",
                "tx_output_n": 0,
                "script": "76a914010101010101010101010101010101010101010188ac",
                "value": 60000,
                "confirmations": 3
            },
            {
                "tx_hash": TX_HASH,
                "tx_output_n": 2,
                "script": "76a914010101010101010101010101010101010101010188ac",
                "value": 15000,
                "confirmations": 0
            }
        ]
    }))
    .into_response()
}

async fn rawaddr(State(explorer): State<ExplorerState>, Path(address): Path<String>) -> Response {
    if address != explorer.funded {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    }

    Json(json!({
        "hash160": "0101010101010101010101010101010101010101",
        "address": address,
        "n_tx": 2,
        "total_received": 75000,
        "total_sent": 60000,
        "final_balance": 15000,
        "txs": [
            {
                "hash": "ff00",
                "inputs": [
                    { "prev_out": { "addr": "mzBc4XEFSdzCDcTxAgf6EZXgsZWpztRhef", "value": 1 }, "script": "aa" },
                    { "prev_out": { "addr": address, "value": 60000 }, "script": "0102" }
                ]
            },
            { "hash": "ee00", "inputs": [ { "script": "" } ] }
        ]
    }))
    .into_response()
}

async fn pushtx(
    State(explorer): State<ExplorerState>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let tx = form.get("tx").cloned().unwrap_or_default();
    explorer.pushed.lock().unwrap().push(tx.clone());

    if tx == "00" {
        return (StatusCode::OK, "Unable to decode transaction").into_response();
    }
    (StatusCode::OK, "Transaction Submitted").into_response()
}

async fn spawn_explorer(explorer: ExplorerState) -> anyhow::Result<String> {
    let app = Router::new()
        .route("/unspent", get(unspent))
        .route("/rawaddr/:address", get(rawaddr))
        .route("/pushtx", post(pushtx))
        .with_state(explorer);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(url)
}

fn address(fill: u8) -> Address {
    Address::p2pkh(PubkeyHash::from_byte_array([fill; 20]), Network::Testnet)
}

async fn setup() -> anyhow::Result<(BlockchainInfoClient, ExplorerState)> {
    init_logger();
    let explorer = Arc::new(Explorer {
        funded: address(1).to_string(),
        empty: address(2).to_string(),
        ..Default::default()
    });
    let url = spawn_explorer(explorer.clone()).await?;
    Ok((
        BlockchainInfoClient::with_url(format!("{}/", url), NetworkParams::testnet()),
        explorer,
    ))
}

#[tokio::test]
async fn test_list_unspent() -> anyhow::Result<()> {
    let (client, explorer) = setup().await?;

    let utxos = client.list_unspent(&address(1), 1000, 0).await?;

    assert_eq!(utxos.len(), 2);
    assert_eq!(utxos[0].txid.to_byte_array()[0], 0x01);
    assert_eq!(utxos[1].vout, 2);
    assert_eq!(utxos[0].script_pubkey, address(1).script_pubkey());
    assert_eq!(utxos.iter().map(|u| u.amount_sats).sum::<u64>(), 75_000);

    let queries = explorer.queries.lock().unwrap();
    assert_eq!(queries[0].get("limit").map(String::as_str), Some("1000"));
    assert_eq!(queries[0].get("confirmations").map(String::as_str), Some("0"));
    Ok(())
}

#[tokio::test]
async fn test_zero_limit_uses_default_page() -> anyhow::Result<()> {
    let (client, explorer) = setup().await?;

    client.list_unspent(&address(1), 0, 1).await?;

    let queries = explorer.queries.lock().unwrap();
    assert_eq!(queries[0].get("limit").map(String::as_str), Some("250"));
    Ok(())
}

#[tokio::test]
async fn test_no_free_outputs_is_empty() -> anyhow::Result<()> {
    let (client, _) = setup().await?;

    assert!(client.list_unspent(&address(2), 1000, 0).await?.is_empty());
    assert_eq!(client.balance(&address(2), 0).await?, 0);
    assert_eq!(client.balance(&address(1), 0).await?, 75_000);
    Ok(())
}

#[tokio::test]
async fn test_server_error_is_transient() -> anyhow::Result<()> {
    let (client, _) = setup().await?;

    let err = client.list_unspent(&address(3), 1000, 0).await.unwrap_err();

    assert!(matches!(err, BtcSwapError::Network(_)));
    assert!(err.is_transient());
    Ok(())
}

#[tokio::test]
async fn test_address_summary() -> anyhow::Result<()> {
    let (client, _) = setup().await?;

    let summary = client.address_summary(&address(1)).await?;

    assert!(summary.funded(75_000));
    assert!(summary.spent());
    assert_eq!(summary.transactions.len(), 2);
    assert_eq!(summary.spending_script_sig(), Some("0102"));
    Ok(())
}

#[tokio::test]
async fn test_broadcast_posts_hex_form() -> anyhow::Result<()> {
    let (client, explorer) = setup().await?;

    client.broadcast(&[0x02, 0x00, 0xff]).await?;
    let err = client.broadcast(&[0x00]).await.unwrap_err();

    assert_eq!(
        err,
        BtcSwapError::SubmissionRejected("Unable to decode transaction".to_string())
    );
    assert_eq!(*explorer.pushed.lock().unwrap(), vec!["0200ff", "00"]);
    Ok(())
}
