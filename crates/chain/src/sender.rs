//! Transaction signing and submission for liquidations.
//!
//! The operator account's nonce is the one piece of mutable shared state in
//! the whole bot; it is cached locally and only ever consumed from the
//! sequential batch loop, which preserves submission ordering.

use crate::error::ChainError;
use crate::gas;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cached nonce manager. Tracks the next nonce locally so submission does
/// not need an RPC round-trip per transaction.
pub struct NonceManager {
    current: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
        }
    }

    /// Take the next nonce.
    #[inline]
    pub fn next(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst)
    }

    /// Peek without incrementing.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Force the nonce back to the chain's view (after a revert or timeout).
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
    }
}

/// Confirmed transaction details.
#[derive(Debug, Clone)]
pub struct TxConfirmation {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
}

/// Default time to wait for a submitted transaction to confirm.
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Signs and submits transactions, waiting for confirmation.
pub struct TransactionSender {
    rpc_url: String,
    wallet: EthereumWallet,
    /// Operator address derived from the signing key.
    pub address: Address,
    chain_id: u64,
    nonce_manager: NonceManager,
    gas_limit: u64,
    confirmation_timeout: Duration,
    cached_gas_price: parking_lot::RwLock<Option<u128>>,
}

impl TransactionSender {
    /// Create a sender from a private key, fetching the starting nonce.
    pub async fn new(private_key: &str, rpc_url: &str, chain_id: u64) -> Result<Self, ChainError> {
        let key_str = private_key.trim_start_matches("0x");
        let signer: PrivateKeySigner = key_str
            .parse()
            .map_err(|e| ChainError::InvalidKey(format!("{e}")))?;
        let address = signer.address();
        let wallet = EthereumWallet::from(signer);

        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .map_err(|_| ChainError::InvalidUrl(rpc_url.to_string()))?,
        );
        let initial_nonce = provider
            .get_transaction_count(address)
            .await
            .map_err(|e| ChainError::Rpc(format!("getTransactionCount: {e}")))?;

        info!(
            address = %address,
            chain_id,
            initial_nonce,
            "Transaction sender initialized"
        );

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            wallet,
            address,
            chain_id,
            nonce_manager: NonceManager::new(initial_nonce),
            gas_limit: gas::LIQUIDATION_GAS_LIMIT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            cached_gas_price: parking_lot::RwLock::new(None),
        })
    }

    /// Override the per-transaction gas limit.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Override the confirmation wait.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Current locally tracked nonce.
    pub fn current_nonce(&self) -> u64 {
        self.nonce_manager.current()
    }

    /// Effective gas price in wei, from cache or a fresh fetch.
    pub async fn gas_price(&self) -> Result<u128, ChainError> {
        if let Some(cached) = *self.cached_gas_price.read() {
            return Ok(cached);
        }
        let price = gas::fetch_gas_price(&self.rpc_url).await?;
        *self.cached_gas_price.write() = Some(price);
        Ok(price)
    }

    /// Refresh the cached gas price (call between batches).
    pub async fn update_gas_price(&self) {
        match gas::fetch_gas_price(&self.rpc_url).await {
            Ok(price) => {
                debug!(gas_price_gwei = price / 1_000_000_000, "Gas price updated");
                *self.cached_gas_price.write() = Some(price);
            }
            Err(e) => warn!(error = %e, "Failed to update gas price"),
        }
    }

    /// Submit a transaction and wait for its receipt.
    ///
    /// Outcome classification:
    /// - confirmed with status true → `Ok(TxConfirmation)`
    /// - confirmed with status false → `TransactionReverted` (nonce resynced)
    /// - no receipt within the confirmation timeout → `TransactionTimeout`
    pub async fn send(
        &self,
        to: Address,
        calldata: Bytes,
        value: U256,
    ) -> Result<TxConfirmation, ChainError> {
        let nonce = self.nonce_manager.next();
        let gas_price = self.gas_price().await?;

        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_value(value)
            .with_nonce(nonce)
            .with_gas_limit(self.gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(self.chain_id);

        debug!(
            to = %to,
            nonce,
            gas_limit = self.gas_limit,
            gas_price_gwei = gas_price / 1_000_000_000,
            "Sending transaction"
        );

        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(
                self.rpc_url
                    .parse()
                    .map_err(|_| ChainError::InvalidUrl(self.rpc_url.clone()))?,
            );

        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Rpc(format!("sendTransaction: {e}")))?;
        let tx_hash = *pending.tx_hash();

        info!(tx_hash = %tx_hash, "Transaction submitted, awaiting confirmation");

        let receipt =
            match tokio::time::timeout(self.confirmation_timeout, pending.get_receipt()).await {
                Ok(Ok(receipt)) => receipt,
                Ok(Err(e)) => {
                    self.sync_nonce().await;
                    return Err(ChainError::Rpc(format!("receipt for {tx_hash}: {e}")));
                }
                Err(_) => {
                    warn!(tx_hash = %tx_hash, "Confirmation wait timed out");
                    self.sync_nonce().await;
                    return Err(ChainError::TransactionTimeout(self.confirmation_timeout));
                }
            };

        if receipt.status() {
            let confirmation = TxConfirmation {
                tx_hash,
                block_number: receipt.block_number.unwrap_or(0),
                gas_used: receipt.gas_used as u64,
            };
            info!(
                tx_hash = %tx_hash,
                block = confirmation.block_number,
                gas_used = confirmation.gas_used,
                "Transaction confirmed"
            );
            Ok(confirmation)
        } else {
            warn!(tx_hash = %tx_hash, "Transaction reverted, resyncing nonce");
            self.sync_nonce().await;
            Err(ChainError::TransactionReverted {
                tx_hash: format!("{tx_hash}"),
                reason: None,
            })
        }
    }

    /// Resync the local nonce from the chain after a failure.
    pub async fn sync_nonce(&self) {
        let provider = match self.rpc_url.parse() {
            Ok(url) => ProviderBuilder::new().on_http(url),
            Err(_) => return,
        };
        match provider.get_transaction_count(self.address).await {
            Ok(chain_nonce) => {
                self.nonce_manager.reset(chain_nonce);
                debug!(nonce = chain_nonce, "Nonce synced from chain");
            }
            Err(e) => warn!(error = %e, "Failed to sync nonce from chain"),
        }
    }
}

impl std::fmt::Debug for TransactionSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSender")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.rpc_url)
            .field("gas_limit", &self.gas_limit)
            .finish_non_exhaustive()
    }
}
