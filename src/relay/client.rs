//! Batch Relay Client
//!
//! Appends a tip transaction to a set of signed transactions, submits them as
//! one bundle and polls until the relay reports them landed. Every failure
//! path ends in `false`; nothing is thrown back at the engine.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use solana_sdk::hash::Hash;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use std::time::Duration;
use tokio::time::sleep;

use super::tip::{tip_router_for, AuthKeyRotation, TipRouter};
use super::types::{
    BundleEncoding, BundleState, BundleStatusesResult, JsonRpcRequest, JsonRpcResponse,
    SendBundleOptions, SubmitOutcome,
};
use crate::config::{with_config, RelayConfig};
use crate::constants::BUNDLE_API_PATH;
use crate::errors::{VolumeBotError, VolumeBotResult};
use crate::logger::{self, LogTag};

/// Signed transactions sharing one recent blockhash
pub struct AtomicBatch {
    pub transactions: Vec<VersionedTransaction>,
    pub recent_blockhash: Hash,
}

impl AtomicBatch {
    pub fn new(transactions: Vec<VersionedTransaction>, recent_blockhash: Hash) -> Self {
        Self {
            transactions,
            recent_blockhash,
        }
    }
}

#[async_trait]
pub trait BatchRelay: Send + Sync {
    /// True only when the whole batch, tip included, landed
    async fn submit_atomic(&self, payer: &Keypair, batch: AtomicBatch) -> bool;
}

/// Tip transfer from `payer`, compiled against the batch blockhash
pub fn build_tip_transaction(
    payer: &Keypair,
    tip_account: &Pubkey,
    tip_lamports: u64,
    recent_blockhash: Hash,
) -> VolumeBotResult<VersionedTransaction> {
    let ix = system_instruction::transfer(&payer.pubkey(), tip_account, tip_lamports);
    let message = v0::Message::try_compile(&payer.pubkey(), &[ix], &[], recent_blockhash)
        .map_err(|e| VolumeBotError::Build(format!("Tip message compile failed: {}", e)))?;
    VersionedTransaction::try_new(VersionedMessage::V0(message), &[payer])
        .map_err(|e| VolumeBotError::Build(format!("Tip signing failed: {}", e)))
}

/// Serialize transactions for `sendBundle`
pub fn encode_transactions(
    transactions: &[VersionedTransaction],
    encoding: BundleEncoding,
) -> VolumeBotResult<Vec<String>> {
    transactions
        .iter()
        .map(|tx| {
            let bytes = bincode::serialize(tx)
                .map_err(|e| VolumeBotError::Build(format!("Transaction serialize failed: {}", e)))?;
            Ok(match encoding {
                BundleEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
                BundleEncoding::Base58 => bs58::encode(bytes).into_string(),
            })
        })
        .collect()
}

// =============================================================================
// JITO RELAY
// =============================================================================

pub struct JitoRelay {
    client: Client,
    config: RelayConfig,
    encoding: BundleEncoding,
    tip_router: Box<dyn TipRouter>,
    auth_keys: AuthKeyRotation,
}

impl JitoRelay {
    pub fn new(config: RelayConfig, tip_router: Box<dyn TipRouter>) -> VolumeBotResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| VolumeBotError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            encoding: BundleEncoding::from_str(&config.encoding),
            auth_keys: AuthKeyRotation::new(config.auth_keys.clone()),
            config,
            tip_router,
        })
    }

    /// Relay for the configured block engine and route strategy
    pub fn from_config() -> VolumeBotResult<Self> {
        let config = with_config(|cfg| cfg.relay.clone());
        let router = tip_router_for(&config.route_strategy);
        Self::new(config, router)
    }

    async fn rpc_call<P, R>(&self, method: &str, params: P) -> VolumeBotResult<R>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.block_engine_url, BUNDLE_API_PATH);
        let mut request = self
            .client
            .post(&url)
            .json(&JsonRpcRequest::new(method, params));
        if let Some(key) = self.auth_keys.next() {
            request = request.header("x-jito-auth", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VolumeBotError::Relay(format!("{} transport error: {}", method, e)))?;

        let status = response.status();
        let body: JsonRpcResponse<R> = response
            .json()
            .await
            .map_err(|e| VolumeBotError::Relay(format!("{} bad response ({}): {}", method, status, e)))?;

        if let Some(err) = body.error {
            return Err(VolumeBotError::Relay(format!(
                "{} rejected ({}): {}",
                method, err.code, err.message
            )));
        }

        body.result
            .ok_or_else(|| VolumeBotError::Relay(format!("{} returned no result", method)))
    }

    async fn send_bundle(&self, encoded: &[String]) -> VolumeBotResult<String> {
        self.rpc_call(
            "sendBundle",
            (
                encoded,
                SendBundleOptions {
                    encoding: self.encoding.as_str(),
                },
            ),
        )
        .await
    }

    /// Poll until the bundle lands, fails, or the attempt budget runs out
    async fn poll_bundle(&self, bundle_id: &str) -> BundleState {
        let ids = vec![bundle_id.to_string()];

        for attempt in 1..=self.config.poll_max_attempts {
            sleep(Duration::from_millis(self.config.poll_interval_ms)).await;

            match self
                .rpc_call::<_, BundleStatusesResult>("getBundleStatuses", (&ids,))
                .await
            {
                Ok(result) => {
                    let state = result
                        .value
                        .into_iter()
                        .flatten()
                        .next()
                        .map(|entry| entry.state())
                        .unwrap_or(BundleState::Pending);

                    match state {
                        BundleState::Pending => {
                            logger::debug(
                                LogTag::Relay,
                                &format!(
                                    "Bundle {} pending ({}/{})",
                                    bundle_id, attempt, self.config.poll_max_attempts
                                ),
                            );
                        }
                        done => return done,
                    }
                }
                Err(e) => {
                    logger::debug(
                        LogTag::Relay,
                        &format!("Bundle {} status check failed: {}", bundle_id, e),
                    );
                }
            }
        }

        BundleState::Pending
    }

    /// Submit with a bounded number of attempts, then poll for inclusion
    ///
    /// Only submission errors are retried. Once the relay accepts the bundle
    /// the outcome is decided by polling.
    pub async fn submit_with_retry(&self, encoded: &[String]) -> SubmitOutcome {
        let max_attempts = self.config.submit_max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.send_bundle(encoded).await {
                Ok(bundle_id) => {
                    logger::info(
                        LogTag::Relay,
                        &format!(
                            "Bundle {} accepted ({} txs, attempt {})",
                            bundle_id,
                            encoded.len(),
                            attempt
                        ),
                    );

                    return match self.poll_bundle(&bundle_id).await {
                        BundleState::Landed { slot } => {
                            logger::info(
                                LogTag::Relay,
                                &format!(
                                    "Bundle {} landed in slot {}",
                                    bundle_id,
                                    slot.map(|s| s.to_string()).unwrap_or_else(|| "?".to_string())
                                ),
                            );
                            SubmitOutcome::Landed { bundle_id }
                        }
                        BundleState::Failed(reason) => SubmitOutcome::Rejected { reason },
                        BundleState::Pending => SubmitOutcome::Exhausted {
                            attempts: self.config.poll_max_attempts,
                            last_error: format!("bundle {} not confirmed in time", bundle_id),
                        },
                    };
                }
                Err(e) => {
                    last_error = e.to_string();
                    logger::warning(
                        LogTag::Relay,
                        &format!("Bundle submit attempt {}/{} failed: {}", attempt, max_attempts, e),
                    );
                    if !e.is_recoverable() {
                        break;
                    }
                    if attempt < max_attempts {
                        sleep(Duration::from_millis(self.config.submit_retry_delay_ms)).await;
                    }
                }
            }
        }

        SubmitOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        }
    }

    async fn submit(&self, payer: &Keypair, batch: AtomicBatch) -> SubmitOutcome {
        let Some(tip_account) = self.tip_router.next() else {
            return SubmitOutcome::Rejected {
                reason: "no tip route available".to_string(),
            };
        };

        if batch.transactions.is_empty() {
            return SubmitOutcome::Rejected {
                reason: "empty batch".to_string(),
            };
        }

        if batch.transactions.len() + 1 > self.config.bundle_limit() {
            return SubmitOutcome::Rejected {
                reason: format!(
                    "{} transactions plus tip exceed the bundle limit of {}",
                    batch.transactions.len(),
                    self.config.bundle_limit()
                ),
            };
        }

        let tip_tx = match build_tip_transaction(
            payer,
            &tip_account,
            self.config.tip_lamports,
            batch.recent_blockhash,
        ) {
            Ok(tx) => tx,
            Err(e) => {
                return SubmitOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        };

        let mut transactions = batch.transactions;
        transactions.push(tip_tx);

        let encoded = match encode_transactions(&transactions, self.encoding) {
            Ok(encoded) => encoded,
            Err(e) => {
                return SubmitOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        };

        logger::debug(
            LogTag::Relay,
            &format!(
                "Submitting bundle: {} txs, tip {} lamports to {}",
                encoded.len(),
                self.config.tip_lamports,
                tip_account
            ),
        );

        self.submit_with_retry(&encoded).await
    }
}

#[async_trait]
impl BatchRelay for JitoRelay {
    async fn submit_atomic(&self, payer: &Keypair, batch: AtomicBatch) -> bool {
        let outcome = self.submit(payer, batch).await;
        match &outcome {
            SubmitOutcome::Landed { .. } => {}
            SubmitOutcome::Rejected { reason } => {
                logger::warning(LogTag::Relay, &format!("Bundle rejected: {}", reason));
            }
            SubmitOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                logger::warning(
                    LogTag::Relay,
                    &format!("Bundle gave up after {} attempts: {}", attempts, last_error),
                );
            }
        }
        outcome.is_landed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::tip::FixedTipRouter;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use solana_sdk::message::VersionedMessage;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    // =========================================================================
    // LOCAL BLOCK ENGINE
    // =========================================================================

    /// Methods received by the local block engine, in arrival order
    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Serves JSON-RPC over plain HTTP on a free port
    ///
    /// `respond` gets the method name and how many times that method was
    /// called before, and returns the full response envelope.
    async fn local_block_engine<F>(respond: F) -> (String, CallLog)
    where
        F: Fn(&str, usize) -> Value + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let respond = Arc::new(respond);
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));

        let log = calls.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let respond = respond.clone();
                let log = log.clone();
                tokio::spawn(async move {
                    let body = read_body(&mut socket).await;
                    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                    let method = request["method"].as_str().unwrap_or_default().to_string();

                    let previous = {
                        let mut log = log.lock();
                        let previous = log.iter().filter(|m| **m == method).count();
                        log.push(method.clone());
                        previous
                    };

                    let payload = respond(&method, previous).to_string();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        payload.len(),
                        payload
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (url, calls)
    }

    async fn read_body(socket: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return Vec::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < header_end + length {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        buf[header_end..].to_vec()
    }

    fn result(value: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": 1, "result": value })
    }

    fn statuses(entry: Value) -> Value {
        result(json!({ "context": { "slot": 1 }, "value": [entry] }))
    }

    fn relay_at(url: &str, poll_max_attempts: u32) -> JitoRelay {
        JitoRelay::new(
            RelayConfig {
                block_engine_url: url.to_string(),
                poll_max_attempts,
                ..offline_config()
            },
            Box::new(FixedTipRouter(Some(Pubkey::new_unique()))),
        )
        .unwrap()
    }

    fn one_tx_batch(payer: &Keypair) -> AtomicBatch {
        let blockhash = Hash::new_unique();
        AtomicBatch::new(vec![dummy_tx(payer, blockhash)], blockhash)
    }

    fn offline_config() -> RelayConfig {
        RelayConfig {
            // Nothing listens on the discard port
            block_engine_url: "http://127.0.0.1:9".to_string(),
            submit_max_attempts: 2,
            submit_retry_delay_ms: 1,
            poll_interval_ms: 1,
            request_timeout_secs: 2,
            ..RelayConfig::default()
        }
    }

    fn dummy_tx(payer: &Keypair, blockhash: Hash) -> VersionedTransaction {
        build_tip_transaction(payer, &Pubkey::new_unique(), 1, blockhash).unwrap()
    }

    #[test]
    fn test_tip_transaction_shape() {
        let payer = Keypair::new();
        let tip_account = Pubkey::new_unique();
        let blockhash = Hash::new_unique();
        let tx = build_tip_transaction(&payer, &tip_account, 10_000, blockhash).unwrap();

        assert_eq!(tx.signatures.len(), 1);
        match &tx.message {
            VersionedMessage::V0(msg) => {
                assert_eq!(msg.recent_blockhash, blockhash);
                assert_eq!(msg.account_keys[0], payer.pubkey());
                assert!(msg.account_keys.contains(&tip_account));
            }
            _ => panic!("expected v0 message"),
        }
    }

    #[test]
    fn test_encodings_decode_back() {
        let payer = Keypair::new();
        let tx = dummy_tx(&payer, Hash::new_unique());
        let raw = bincode::serialize(&tx).unwrap();

        let b64 = encode_transactions(&[tx.clone()], BundleEncoding::Base64).unwrap();
        assert_eq!(
            base64::engine::general_purpose::STANDARD.decode(&b64[0]).unwrap(),
            raw
        );
        let b58 = encode_transactions(&[tx], BundleEncoding::Base58).unwrap();
        assert_eq!(bs58::decode(&b58[0]).into_vec().unwrap(), raw);
    }

    #[tokio::test]
    async fn test_missing_route_returns_false() {
        let relay = JitoRelay::new(offline_config(), Box::new(FixedTipRouter(None))).unwrap();
        let payer = Keypair::new();
        let blockhash = Hash::new_unique();
        let batch = AtomicBatch::new(vec![dummy_tx(&payer, blockhash)], blockhash);
        assert!(!relay.submit_atomic(&payer, batch).await);
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected_before_network() {
        let relay = JitoRelay::new(
            offline_config(),
            Box::new(FixedTipRouter(Some(Pubkey::new_unique()))),
        )
        .unwrap();
        let payer = Keypair::new();
        let blockhash = Hash::new_unique();
        let txs = (0..5).map(|_| dummy_tx(&payer, blockhash)).collect();

        let outcome = relay.submit(&payer, AtomicBatch::new(txs, blockhash)).await;
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_exhausts_attempts() {
        let relay = JitoRelay::new(
            offline_config(),
            Box::new(FixedTipRouter(Some(Pubkey::new_unique()))),
        )
        .unwrap();
        let payer = Keypair::new();
        let blockhash = Hash::new_unique();
        let batch = AtomicBatch::new(vec![dummy_tx(&payer, blockhash)], blockhash);

        let outcome = relay.submit(&payer, batch).await;
        match outcome {
            SubmitOutcome::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("sendBundle"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bundle_lands_after_pending_polls() {
        let (url, calls) = local_block_engine(|method, previous| match method {
            "sendBundle" => result(json!("bundle-1")),
            _ if previous < 2 => result(json!({ "context": { "slot": 1 }, "value": [null] })),
            _ => statuses(json!({
                "bundle_id": "bundle-1",
                "slot": 77,
                "confirmation_status": "confirmed",
                "err": { "Ok": null }
            })),
        })
        .await;
        let relay = relay_at(&url, 10);
        let payer = Keypair::new();

        assert!(relay.submit_atomic(&payer, one_tx_batch(&payer)).await);
        assert_eq!(
            *calls.lock(),
            vec![
                "sendBundle",
                "getBundleStatuses",
                "getBundleStatuses",
                "getBundleStatuses"
            ]
        );
    }

    #[tokio::test]
    async fn test_pending_until_poll_budget_runs_out() {
        let (url, calls) = local_block_engine(|method, _| match method {
            "sendBundle" => result(json!("bundle-2")),
            _ => statuses(json!({ "bundle_id": "bundle-2", "confirmation_status": "processed" })),
        })
        .await;
        let relay = relay_at(&url, 4);
        let payer = Keypair::new();

        match relay.submit(&payer, one_tx_batch(&payer)).await {
            SubmitOutcome::Exhausted { attempts, last_error } => {
                assert_eq!(attempts, 4);
                assert!(last_error.contains("bundle-2"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let polls = calls.lock().iter().filter(|m| *m == "getBundleStatuses").count();
        assert_eq!(polls, 4);

        assert!(!relay.submit_atomic(&payer, one_tx_batch(&payer)).await);
    }

    #[tokio::test]
    async fn test_failed_bundle_is_rejected() {
        let (url, _calls) = local_block_engine(|method, _| match method {
            "sendBundle" => result(json!("bundle-3")),
            _ => statuses(json!({
                "bundle_id": "bundle-3",
                "slot": 12,
                "confirmation_status": "confirmed",
                "err": { "Err": { "InstructionError": [0, "Custom"] } }
            })),
        })
        .await;
        let relay = relay_at(&url, 10);
        let payer = Keypair::new();

        let outcome = relay.submit(&payer, one_tx_batch(&payer)).await;
        match outcome {
            SubmitOutcome::Rejected { reason } => assert!(reason.contains("InstructionError")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refused_submission_is_retried() {
        let (url, calls) = local_block_engine(|method, previous| match method {
            "sendBundle" if previous == 0 => json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32000, "message": "rate limited" }
            }),
            "sendBundle" => result(json!("bundle-4")),
            _ => statuses(json!({
                "bundle_id": "bundle-4",
                "confirmation_status": "finalized",
                "err": { "Ok": null }
            })),
        })
        .await;
        let relay = relay_at(&url, 10);

        let outcome = relay.submit_with_retry(&["dHg=".to_string()]).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Landed {
                bundle_id: "bundle-4".to_string()
            }
        );
        let sends = calls.lock().iter().filter(|m| *m == "sendBundle").count();
        assert_eq!(sends, 2);
    }
}
