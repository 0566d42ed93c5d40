//! Swap quoting types exchanged with [`Swapper`](crate::traits::Swapper) implementations.

use serde::{Deserialize, Serialize};

use crate::models::{asset::FungibleAsset, money::Money, BPS_BASE};

/// Specifies whether a quote is for a given input amount or desired output amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteDirection {
    /// Quote is for a specific input amount, calculate output amount.
    ExactIn,
    /// Quote is for a specific output amount, calculate required input amount.
    ExactOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SwapRequest {
    ExactIn { input: Money, token_out: FungibleAsset },
    ExactOut { output: Money, token_in: FungibleAsset },
}

/// Parameters for a swap quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapQuoteParams {
    request: SwapRequest,
    slippage_bps: u32,
}

impl SwapQuoteParams {
    pub fn exact_in(input: Money, token_out: &FungibleAsset, slippage_bps: u32) -> Self {
        Self { request: SwapRequest::ExactIn { input, token_out: token_out.clone() }, slippage_bps }
    }

    pub fn exact_out(token_in: &FungibleAsset, output: Money, slippage_bps: u32) -> Self {
        Self { request: SwapRequest::ExactOut { output, token_in: token_in.clone() }, slippage_bps }
    }

    pub fn request(&self) -> &SwapRequest {
        &self.request
    }

    pub fn direction(&self) -> QuoteDirection {
        match self.request {
            SwapRequest::ExactIn { .. } => QuoteDirection::ExactIn,
            SwapRequest::ExactOut { .. } => QuoteDirection::ExactOut,
        }
    }

    pub fn slippage_bps(&self) -> u32 {
        self.slippage_bps
    }

    pub fn token_in(&self) -> &FungibleAsset {
        match &self.request {
            SwapRequest::ExactIn { input, .. } => input.asset(),
            SwapRequest::ExactOut { token_in, .. } => token_in,
        }
    }

    pub fn token_out(&self) -> &FungibleAsset {
        match &self.request {
            SwapRequest::ExactIn { token_out, .. } => token_out,
            SwapRequest::ExactOut { output, .. } => output.asset(),
        }
    }
}

/// Result of a swap quote.
///
/// For exact-in quotes `input` is the requested amount and `output` the expected amount; for
/// exact-out quotes it is the other way around. `route` is swapper specific and passed back
/// untouched when building the swap operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapQuotation {
    pub input: Money,
    pub output: Money,
    pub direction: QuoteDirection,
    pub slippage_bps: u32,
    #[serde(default)]
    pub route: serde_json::Value,
}

impl SwapQuotation {
    /// Output the swap is guaranteed to deliver, after slippage.
    pub fn min_output(&self) -> Money {
        match self.direction {
            QuoteDirection::ExactIn => self
                .output
                .mul_bps(BPS_BASE.saturating_sub(self.slippage_bps)),
            QuoteDirection::ExactOut => self.output.clone(),
        }
    }

    /// Input the swap may spend, after slippage.
    pub fn max_input(&self) -> Money {
        match self.direction {
            QuoteDirection::ExactIn => self.input.clone(),
            QuoteDirection::ExactOut => self.input.mul_bps(BPS_BASE + self.slippage_bps),
        }
    }
}
