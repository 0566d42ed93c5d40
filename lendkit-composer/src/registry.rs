use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use lendkit_common::{
    models::{asset::FungibleAsset, Chain, ProtocolId},
    traits::{FlashLoanSource, ProtocolAdapter, Swapper},
};

/// Collaborators available to a [`Composer`](crate::Composer).
///
/// Built once and moved into the composer. Swappers and flash-loan sources are consulted in
/// registration order.
#[derive(Default, Clone)]
pub struct Registry {
    protocols: IndexMap<(Chain, ProtocolId), Arc<dyn ProtocolAdapter>>,
    swappers: Vec<Arc<dyn Swapper>>,
    flash_loan_sources: Vec<Arc<dyn FlashLoanSource>>,
    wrapped_native: HashMap<Chain, FungibleAsset>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any previous adapter for the same protocol and chain.
    pub fn with_protocol(mut self, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.protocols
            .insert((adapter.chain(), adapter.protocol_id()), adapter);
        self
    }

    pub fn with_swapper(mut self, swapper: Arc<dyn Swapper>) -> Self {
        self.swappers.push(swapper);
        self
    }

    pub fn with_flash_loan_source(mut self, source: Arc<dyn FlashLoanSource>) -> Self {
        self.flash_loan_sources.push(source);
        self
    }

    pub fn with_wrapped_native(mut self, asset: FungibleAsset) -> Self {
        self.wrapped_native.insert(asset.chain, asset);
        self
    }

    pub fn protocol(&self, chain: Chain, protocol_id: &str) -> Option<&Arc<dyn ProtocolAdapter>> {
        self.protocols
            .get(&(chain, protocol_id.to_string()))
    }

    pub fn protocols_on(&self, chain: Chain) -> impl Iterator<Item = &Arc<dyn ProtocolAdapter>> {
        self.protocols
            .iter()
            .filter(move |((protocol_chain, _), _)| *protocol_chain == chain)
            .map(|(_, adapter)| adapter)
    }

    pub fn swappers(&self) -> &[Arc<dyn Swapper>] {
        &self.swappers
    }

    pub fn flash_loan_sources(&self) -> &[Arc<dyn FlashLoanSource>] {
        &self.flash_loan_sources
    }

    pub fn wrapped_native(&self, chain: Chain) -> Option<&FungibleAsset> {
        self.wrapped_native.get(&chain)
    }

    /// Whether moving between `a` and `b` needs no swap: equal assets, or the chain's native
    /// asset and its wrapped form.
    pub fn is_same_asset(&self, a: &FungibleAsset, b: &FungibleAsset) -> bool {
        if a == b {
            return true;
        }
        if a.chain != b.chain {
            return false;
        }
        match self.wrapped_native(a.chain) {
            Some(wrapped) => {
                (a.is_native() && b == wrapped) || (b.is_native() && a == wrapped)
            }
            None => false,
        }
    }
}
