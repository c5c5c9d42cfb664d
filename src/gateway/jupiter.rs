/// Jupiter-backed gateway
///
/// Quotes through `/swap/v1/quote` restricted to the DEX family of the
/// session's pool kind, then fetches raw instructions from
/// `/swap/v1/swap-instructions` so several legs can share one transaction.
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::time::Duration;

use super::{SwapGateway, SwapLeg, SwapRequest};
use crate::config::{with_config, GatewayConfig};
use crate::errors::{VolumeBotError, VolumeBotResult};
use crate::logger::{self, LogTag};
use crate::sessions::PoolKind;

// ============================================================================
// API TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct JupiterQuoteRequest {
    #[serde(rename = "inputMint")]
    input_mint: String,
    #[serde(rename = "outputMint")]
    output_mint: String,
    amount: String,
    #[serde(rename = "slippageBps")]
    slippage_bps: u16,
    dexes: String,
    #[serde(rename = "onlyDirectRoutes")]
    only_direct_routes: bool,
}

#[derive(Debug, Deserialize)]
struct JupiterQuoteResponse {
    #[serde(rename = "outAmount")]
    out_amount: String,
    #[serde(rename = "otherAmountThreshold")]
    other_amount_threshold: String,
}

#[derive(Debug, Serialize)]
struct JupiterSwapInstructionsRequest {
    #[serde(rename = "userPublicKey")]
    user_public_key: String,
    payer: String,
    #[serde(rename = "quoteResponse")]
    quote_response: serde_json::Value,
    #[serde(rename = "wrapAndUnwrapSol")]
    wrap_and_unwrap_sol: bool,
    #[serde(rename = "dynamicComputeUnitLimit")]
    dynamic_compute_unit_limit: bool,
}

#[derive(Debug, Deserialize)]
struct JupiterSwapInstructionsResponse {
    #[serde(rename = "setupInstructions", default)]
    setup_instructions: Vec<JupiterInstruction>,
    #[serde(rename = "swapInstruction")]
    swap_instruction: JupiterInstruction,
    #[serde(rename = "cleanupInstruction", default)]
    cleanup_instruction: Option<JupiterInstruction>,
    #[serde(rename = "addressLookupTableAddresses", default)]
    address_lookup_table_addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JupiterInstruction {
    #[serde(rename = "programId")]
    program_id: String,
    accounts: Vec<JupiterAccountMeta>,
    data: String,
}

#[derive(Debug, Deserialize)]
struct JupiterAccountMeta {
    pubkey: String,
    #[serde(rename = "isSigner")]
    is_signer: bool,
    #[serde(rename = "isWritable")]
    is_writable: bool,
}

// ============================================================================
// HELPERS
// ============================================================================

/// DEX labels accepted for each pool kind
fn dexes_for(kind: PoolKind) -> &'static str {
    match kind {
        PoolKind::Amm => "Raydium",
        PoolKind::Cpmm => "Raydium CP",
        PoolKind::Clmm => "Raydium CLMM",
    }
}

fn parse_pubkey(value: &str) -> VolumeBotResult<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|e| VolumeBotError::Gateway(format!("Invalid pubkey '{}': {}", value, e)))
}

fn parse_amount(value: &str, field: &str) -> VolumeBotResult<u64> {
    value
        .parse::<u64>()
        .map_err(|e| VolumeBotError::Gateway(format!("Invalid {} '{}': {}", field, value, e)))
}

impl JupiterInstruction {
    fn into_instruction(self) -> VolumeBotResult<Instruction> {
        let program_id = parse_pubkey(&self.program_id)?;
        let data = base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| VolumeBotError::Gateway(format!("Invalid instruction data: {}", e)))?;

        let accounts = self
            .accounts
            .into_iter()
            .map(|meta| {
                let pubkey = parse_pubkey(&meta.pubkey)?;
                Ok(if meta.is_writable {
                    AccountMeta::new(pubkey, meta.is_signer)
                } else {
                    AccountMeta::new_readonly(pubkey, meta.is_signer)
                })
            })
            .collect::<VolumeBotResult<Vec<_>>>()?;

        Ok(Instruction {
            program_id,
            accounts,
            data,
        })
    }
}

// ============================================================================
// GATEWAY
// ============================================================================

pub struct JupiterGateway {
    client: Client,
    config: GatewayConfig,
}

impl JupiterGateway {
    pub fn new(config: GatewayConfig) -> VolumeBotResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VolumeBotError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn from_config() -> VolumeBotResult<Self> {
        Self::new(with_config(|cfg| cfg.gateway.clone()))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.header("x-api-key", &self.config.api_key)
        }
    }

    async fn fetch_quote(&self, request: &SwapRequest) -> VolumeBotResult<(serde_json::Value, JupiterQuoteResponse)> {
        let (input_mint, output_mint) = request.pool.mints_for(request.direction);
        let quote_req = JupiterQuoteRequest {
            input_mint: input_mint.to_string(),
            output_mint: output_mint.to_string(),
            amount: request.amount.to_string(),
            slippage_bps: self.config.slippage_bps,
            dexes: dexes_for(request.pool.kind).to_string(),
            only_direct_routes: true,
        };

        let url = format!("{}/swap/v1/quote", self.config.api_base);
        let response = self
            .request(self.client.get(&url).query(&quote_req))
            .send()
            .await
            .map_err(|e| VolumeBotError::Gateway(format!("Quote request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(VolumeBotError::Gateway(format!(
                "Quote failed ({}): {}",
                status, body
            )));
        }

        // Keep the raw body; the swap endpoint wants every field back
        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VolumeBotError::Gateway(format!("Quote parse failed: {}", e)))?;
        let parsed: JupiterQuoteResponse = serde_json::from_value(raw.clone())?;
        Ok((raw, parsed))
    }

    async fn fetch_instructions(
        &self,
        request: &SwapRequest,
        quote: serde_json::Value,
    ) -> VolumeBotResult<JupiterSwapInstructionsResponse> {
        let body = JupiterSwapInstructionsRequest {
            user_public_key: request.owner.to_string(),
            payer: request.payer.to_string(),
            quote_response: quote,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: false,
        };

        let url = format!("{}/swap/v1/swap-instructions", self.config.api_base);
        let response = self
            .request(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| VolumeBotError::Gateway(format!("Swap-instructions request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(VolumeBotError::Gateway(format!(
                "Swap-instructions failed ({}): {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VolumeBotError::Gateway(format!("Swap-instructions parse failed: {}", e)))
    }

    async fn build_leg(&self, request: &SwapRequest) -> VolumeBotResult<SwapLeg> {
        if request.amount == 0 {
            return Err(VolumeBotError::InvalidInput("Swap amount is zero".to_string()));
        }

        let (raw_quote, quote) = self.fetch_quote(request).await?;
        let out_amount = parse_amount(&quote.out_amount, "outAmount")?;
        let min_out = parse_amount(&quote.other_amount_threshold, "otherAmountThreshold")?;

        let built = self.fetch_instructions(request, raw_quote).await?;

        let mut instructions = Vec::with_capacity(built.setup_instructions.len() + 2);
        for ix in built.setup_instructions {
            instructions.push(ix.into_instruction()?);
        }
        instructions.push(built.swap_instruction.into_instruction()?);
        if let Some(cleanup) = built.cleanup_instruction {
            instructions.push(cleanup.into_instruction()?);
        }

        let lookup_tables = built
            .address_lookup_table_addresses
            .iter()
            .map(|a| parse_pubkey(a))
            .collect::<VolumeBotResult<Vec<_>>>()?;

        Ok(SwapLeg {
            instructions,
            min_out,
            out_amount,
            lookup_tables,
        })
    }
}

#[async_trait]
impl SwapGateway for JupiterGateway {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn quote_and_build(&self, request: &SwapRequest) -> Option<SwapLeg> {
        match self.build_leg(request).await {
            Ok(leg) => {
                logger::debug(
                    LogTag::Gateway,
                    &format!(
                        "{} {} via {} -> out {} (min {}), {} instructions",
                        request.direction.as_str(),
                        request.amount,
                        dexes_for(request.pool.kind),
                        leg.out_amount,
                        leg.min_out,
                        leg.instructions.len()
                    ),
                );
                Some(leg)
            }
            Err(e) => {
                let message = format!(
                    "No {} leg for {} ({}): {}",
                    request.direction.as_str(),
                    request.owner,
                    request.pool.kind,
                    e
                );
                if e.is_recoverable() {
                    logger::warning(LogTag::Gateway, &message);
                } else {
                    logger::error(LogTag::Gateway, &message);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_conversion() {
        let program = Pubkey::new_unique();
        let writable = Pubkey::new_unique();
        let readonly = Pubkey::new_unique();
        let raw: JupiterInstruction = serde_json::from_value(serde_json::json!({
            "programId": program.to_string(),
            "accounts": [
                { "pubkey": writable.to_string(), "isSigner": true, "isWritable": true },
                { "pubkey": readonly.to_string(), "isSigner": false, "isWritable": false }
            ],
            "data": base64::engine::general_purpose::STANDARD.encode([7u8, 8, 9]),
        }))
        .unwrap();

        let ix = raw.into_instruction().unwrap();
        assert_eq!(ix.program_id, program);
        assert_eq!(ix.data, vec![7, 8, 9]);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer && !ix.accounts[1].is_writable);
    }

    #[test]
    fn test_swap_instructions_response_defaults() {
        let program = Pubkey::new_unique().to_string();
        let parsed: JupiterSwapInstructionsResponse = serde_json::from_value(serde_json::json!({
            "computeBudgetInstructions": [],
            "swapInstruction": { "programId": program, "accounts": [], "data": "" }
        }))
        .unwrap();
        assert!(parsed.setup_instructions.is_empty());
        assert!(parsed.cleanup_instruction.is_none());
        assert!(parsed.address_lookup_table_addresses.is_empty());
    }

    #[test]
    fn test_dex_filter_per_pool_kind() {
        assert_eq!(dexes_for(PoolKind::Amm), "Raydium");
        assert_eq!(dexes_for(PoolKind::Clmm), "Raydium CLMM");
    }

    #[tokio::test]
    async fn test_zero_amount_yields_none() {
        let gateway = JupiterGateway::new(GatewayConfig::default()).unwrap();
        let request = SwapRequest {
            direction: super::super::SwapDirection::Buy,
            amount: 0,
            pool: super::super::PoolRef {
                kind: PoolKind::Amm,
                target_mint: Pubkey::new_unique(),
                quote_mint: Pubkey::new_unique(),
            },
            owner: Pubkey::new_unique(),
            payer: Pubkey::new_unique(),
        };
        assert!(gateway.quote_and_build(&request).await.is_none());
    }
}
