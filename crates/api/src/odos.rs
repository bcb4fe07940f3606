//! Odos smart-order-router client.
//!
//! Provides swap quoting and calldata assembly against the Odos aggregator
//! HTTP API. Responses are validated once at this boundary; everything
//! downstream works with typed, already-checked data.

use crate::amounts::{self, parse_units};
use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Placeholder caller for quote-only requests. No funds move at quote time;
/// the aggregator only needs a syntactically valid address.
pub const QUOTE_USER_ADDR: &str = "0x47E2D28169738039755586743E2dfCF3bd643f86";

/// Default request timeout for aggregator calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the aggregator client.
///
/// `is_transient` drives the caller's retry policy: only timeouts, connect
/// failures, and 5xx/429 statuses are worth retrying. A malformed body or a
/// 4xx is permanent, and a chain-id mismatch is a local misconfiguration
/// detected before any network I/O.
#[derive(Debug, thiserror::Error)]
pub enum OdosError {
    #[error("chain id mismatch: client configured for {expected}, request targets {requested}")]
    ChainIdMismatch { expected: u64, requested: u64 },

    #[error("invalid amount: {0}")]
    Amount(#[from] amounts::AmountError),

    #[error("aggregator request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("aggregator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed aggregator response: {0}")]
    Malformed(String),
}

impl OdosError {
    /// Whether a bounded retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Input-side token entry of a quote request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputToken {
    pub token_address: Address,
    /// Base-unit amount as a decimal string.
    pub amount: String,
}

/// Output-side token entry of a quote request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputToken {
    pub token_address: Address,
    pub proportion: f64,
}

/// Quote request body for `POST /sor/quote/v2`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub chain_id: u64,
    pub input_tokens: Vec<InputToken>,
    pub output_tokens: Vec<OutputToken>,
    pub user_addr: String,
    pub slippage_limit_percent: f64,
}

impl QuoteRequest {
    /// Build a single-input, single-output quote request where 100% of the
    /// output is routed to one token.
    pub fn single(
        chain_id: u64,
        input_token: Address,
        amount_base_units: U256,
        output_token: Address,
        slippage_limit_percent: f64,
    ) -> Self {
        Self {
            chain_id,
            input_tokens: vec![InputToken {
                token_address: input_token,
                amount: amount_base_units.to_string(),
            }],
            output_tokens: vec![OutputToken {
                token_address: output_token,
                proportion: 1.0,
            }],
            user_addr: QUOTE_USER_ADDR.to_string(),
            slippage_limit_percent,
        }
    }
}

/// Raw quote response as returned by the API. Everything is optional here;
/// `validate` converts it into the checked [`QuoteResponse`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuoteResponse {
    path_id: Option<String>,
    #[serde(default)]
    out_tokens: Option<Vec<String>>,
    #[serde(default)]
    out_amounts: Option<Vec<String>>,
    #[serde(default)]
    out_values: Option<Vec<f64>>,
    gas_estimate: Option<f64>,
    gas_estimate_value: Option<f64>,
    net_out_value: Option<f64>,
    price_impact: Option<f64>,
    block_number: Option<u64>,
}

impl RawQuoteResponse {
    fn validate(self) -> Result<QuoteResponse, OdosError> {
        let path_id = match self.path_id {
            Some(id) if !id.is_empty() => id,
            _ => return Err(OdosError::Malformed("missing pathId".to_string())),
        };

        let out_tokens = self
            .out_tokens
            .ok_or_else(|| OdosError::Malformed("missing outTokens".to_string()))?;
        let out_amounts = self
            .out_amounts
            .ok_or_else(|| OdosError::Malformed("missing outAmounts".to_string()))?;

        if out_tokens.is_empty() || out_tokens.len() != out_amounts.len() {
            return Err(OdosError::Malformed(format!(
                "outTokens/outAmounts length mismatch: {} vs {}",
                out_tokens.len(),
                out_amounts.len()
            )));
        }

        let out_tokens = out_tokens
            .iter()
            .map(|t| {
                t.parse::<Address>()
                    .map_err(|_| OdosError::Malformed(format!("invalid outTokens entry '{}'", t)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let out_amounts = out_amounts
            .iter()
            .map(|a| {
                U256::from_str_radix(a, 10)
                    .map_err(|_| OdosError::Malformed(format!("invalid outAmounts entry '{}'", a)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(QuoteResponse {
            path_id,
            out_tokens,
            out_amounts,
            out_values: self.out_values.unwrap_or_default(),
            gas_estimate: self.gas_estimate,
            gas_estimate_value: self.gas_estimate_value,
            net_out_value: self.net_out_value,
            price_impact: self.price_impact,
            block_number: self.block_number,
        })
    }
}

/// Validated quote response.
#[derive(Debug, Clone)]
pub struct QuoteResponse {
    /// Route identifier, consumed by [`OdosClient::assemble`].
    pub path_id: String,
    /// Output tokens of the route.
    pub out_tokens: Vec<Address>,
    /// Expected output amounts in base units, parallel to `out_tokens`.
    pub out_amounts: Vec<U256>,
    /// Aggregator's USD estimates per output token (may be empty).
    pub out_values: Vec<f64>,
    /// Estimated swap gas units.
    pub gas_estimate: Option<f64>,
    /// Estimated swap gas cost in USD.
    pub gas_estimate_value: Option<f64>,
    /// Net output value in USD after gas.
    pub net_out_value: Option<f64>,
    /// Implied price impact percentage (negative = loss vs spot).
    pub price_impact: Option<f64>,
    /// Block the quote was computed against.
    pub block_number: Option<u64>,
}

impl QuoteResponse {
    /// Expected base-unit output of the primary (first) output token.
    pub fn primary_out_amount(&self) -> U256 {
        self.out_amounts[0]
    }

    /// Aggregator's USD estimate of the primary output, if reported.
    pub fn primary_out_value_usd(&self) -> Option<f64> {
        self.out_values.first().copied()
    }
}

/// Assemble request body for `POST /sor/assemble`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssembleRequest {
    user_addr: String,
    path_id: String,
    simulate: bool,
}

#[derive(Debug, Deserialize)]
struct RawAssembleResponse {
    transaction: Option<RawTransaction>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    to: Option<String>,
    data: Option<String>,
    value: Option<String>,
}

/// Executable swap produced from a quoted route: the router target and the
/// calldata the liquidator contract forwards on-chain.
#[derive(Debug, Clone)]
pub struct AssembledSwap {
    pub router: Address,
    pub calldata: Bytes,
    pub value: U256,
}

/// Odos aggregator HTTP client.
///
/// Stateless apart from the underlying connection pool; quoting never moves
/// funds. Retry policy belongs to the caller: a stale quote usually needs
/// re-evaluation rather than a blind resend.
#[derive(Clone)]
pub struct OdosClient {
    http: reqwest::Client,
    base_url: String,
    /// When set, requests targeting any other chain fail fast before I/O.
    expected_chain_id: Option<u64>,
    timeout: Duration,
}

impl std::fmt::Debug for OdosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdosClient")
            .field("base_url", &self.base_url)
            .field("expected_chain_id", &self.expected_chain_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OdosClient {
    /// Create a client against the public Odos API.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.odos.xyz".to_string(),
            expected_chain_id: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Pin the client to one chain; requests for any other chain are
    /// rejected before the network call.
    pub fn with_expected_chain_id(mut self, chain_id: u64) -> Self {
        self.expected_chain_id = Some(chain_id);
        self
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request a swap quote.
    #[instrument(skip(self, request), fields(chain_id = request.chain_id))]
    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, OdosError> {
        if let Some(expected) = self.expected_chain_id {
            if request.chain_id != expected {
                return Err(OdosError::ChainIdMismatch {
                    expected,
                    requested: request.chain_id,
                });
            }
        }

        let url = format!("{}/sor/quote/v2", self.base_url);
        debug!(
            url = %url,
            inputs = request.input_tokens.len(),
            outputs = request.output_tokens.len(),
            "Requesting swap quote"
        );

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OdosError::Status { status, body });
        }

        let raw: RawQuoteResponse = response.json().await?;
        let quote = raw.validate()?;

        debug!(
            path_id = %quote.path_id,
            out_amount = %quote.primary_out_amount(),
            price_impact = ?quote.price_impact,
            "Quote received"
        );

        Ok(quote)
    }

    /// Quote a single-pair swap from a human-readable input amount.
    ///
    /// Converts the amount to base units at the caller-supplied decimals
    /// (truncating toward zero) and routes 100% of the output to one token.
    pub async fn swap_quote(
        &self,
        input_token: Address,
        output_token: Address,
        input_amount_human: &str,
        input_decimals: u8,
        slippage_limit_percent: f64,
        chain_id: u64,
    ) -> Result<QuoteResponse, OdosError> {
        let amount = parse_units(input_amount_human, input_decimals)?;
        let request = QuoteRequest::single(
            chain_id,
            input_token,
            amount,
            output_token,
            slippage_limit_percent,
        );
        self.quote(&request).await
    }

    /// Assemble a quoted route into executable calldata.
    ///
    /// `user_addr` is the account the calldata will be executed from; for
    /// flash liquidations, the liquidator contract itself.
    #[instrument(skip(self), fields(path_id = %path_id))]
    pub async fn assemble(
        &self,
        path_id: &str,
        user_addr: Address,
    ) -> Result<AssembledSwap, OdosError> {
        let url = format!("{}/sor/assemble", self.base_url);
        let request = AssembleRequest {
            user_addr: format!("{:?}", user_addr),
            path_id: path_id.to_string(),
            simulate: false,
        };

        let response = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OdosError::Status { status, body });
        }

        let raw: RawAssembleResponse = response.json().await?;
        let tx = raw
            .transaction
            .ok_or_else(|| OdosError::Malformed("missing transaction".to_string()))?;

        let router = tx
            .to
            .as_deref()
            .and_then(|t| t.parse::<Address>().ok())
            .ok_or_else(|| OdosError::Malformed("missing transaction.to".to_string()))?;

        let data = tx
            .data
            .as_deref()
            .ok_or_else(|| OdosError::Malformed("missing transaction.data".to_string()))?;
        let data = data.strip_prefix("0x").unwrap_or(data);
        let calldata = hex::decode(data)
            .map(Bytes::from)
            .map_err(|_| OdosError::Malformed("invalid transaction.data hex".to_string()))?;

        let value = match tx.value.as_deref() {
            Some(v) if v.starts_with("0x") => {
                U256::from_str_radix(v.trim_start_matches("0x"), 16).unwrap_or(U256::ZERO)
            }
            Some(v) => U256::from_str_radix(v, 10).unwrap_or(U256::ZERO),
            None => U256::ZERO,
        };

        debug!(router = %router, calldata_len = calldata.len(), "Swap assembled");

        Ok(AssembledSwap {
            router,
            calldata,
            value,
        })
    }
}

impl Default for OdosClient {
    fn default() -> Self {
        Self::new()
    }
}
