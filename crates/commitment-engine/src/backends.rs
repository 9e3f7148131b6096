//! One ownership backend per network, dispatched by tag.

use std::future::Future;
use std::sync::Arc;

use commitment_backend::{BackendError, OwnershipBackend};
use commitment_core::Network;
use tracing::{error, warn};

use crate::error::{EngineError, RequestError, Result};

/// The backends an engine dispatches to.
#[derive(Clone, Default)]
pub struct Backends {
    bsv: Option<Arc<dyn OwnershipBackend>>,
    eth: Option<Arc<dyn OwnershipBackend>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `backend` for the network it reports.
    pub fn with(mut self, backend: Arc<dyn OwnershipBackend>) -> Self {
        let network = backend.network();
        *self.slot(network) = Some(backend);
        self
    }

    /// Drop every backend whose network is not in `enabled`.
    pub fn only(mut self, enabled: &[Network]) -> Self {
        for network in Network::ALL {
            if !enabled.contains(&network) {
                *self.slot(network) = None;
            }
        }
        self
    }

    fn slot(&mut self, network: Network) -> &mut Option<Arc<dyn OwnershipBackend>> {
        match network {
            Network::Bsv => &mut self.bsv,
            Network::Eth => &mut self.eth,
        }
    }

    pub fn get(&self, network: Network) -> Option<&Arc<dyn OwnershipBackend>> {
        match network {
            Network::Bsv => self.bsv.as_ref(),
            Network::Eth => self.eth.as_ref(),
        }
    }

    /// Look up a backend, failing with `UnknownNetwork`.
    pub fn require(&self, network: Network) -> Result<&Arc<dyn OwnershipBackend>> {
        self.get(network)
            .ok_or_else(|| RequestError::UnknownNetwork(network).into())
    }

    /// Networks with an installed backend.
    pub fn networks(&self) -> Vec<Network> {
        Network::ALL
            .into_iter()
            .filter(|n| self.get(*n).is_some())
            .collect()
    }

    /// Connectivity of every installed backend.
    pub async fn connectivity(&self) -> Vec<(Network, bool)> {
        let mut out = Vec::new();
        for network in self.networks() {
            if let Some(backend) = self.get(network) {
                out.push((network, backend.is_connected().await));
            }
        }
        out
    }

    /// Run `op` against the backend for `network`.
    ///
    /// A disconnected backend gets one reconnect and the call one retry. If
    /// either fails with a disconnect the result is `BackendUnavailable`.
    pub async fn call<T, F, Fut>(&self, network: Network, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn OwnershipBackend>) -> Fut,
        Fut: Future<Output = std::result::Result<T, BackendError>>,
    {
        let backend = self.require(network)?.clone();

        let first = match op(backend.clone()).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_disconnected() => e,
            Err(e) => {
                error!(%network, error = %e, "backend call failed");
                return Err(EngineError::Backend(e));
            }
        };

        warn!(%network, error = %first, "backend disconnected, reconnecting");
        if let Err(e) = backend.reconnect().await {
            error!(%network, error = %e, "reconnect failed");
            return Err(EngineError::BackendUnavailable { network, source: e });
        }

        op(backend).await.map_err(|e| {
            error!(%network, error = %e, "backend call failed after reconnect");
            if e.is_disconnected() {
                EngineError::BackendUnavailable { network, source: e }
            } else {
                EngineError::Backend(e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commitment_backend::{
        AccountBackend, ChainKey, MemoryOwnershipContract, MemoryUtxoChain, UtxoBackend,
    };

    fn backends() -> (Backends, Arc<MemoryUtxoChain>, Arc<MemoryOwnershipContract>) {
        let chain = MemoryUtxoChain::new();
        let contract = MemoryOwnershipContract::new();
        let backends = Backends::new()
            .with(Arc::new(UtxoBackend::new(chain.clone(), chain.clone())))
            .with(Arc::new(AccountBackend::new(contract.clone())));
        (backends, chain, contract)
    }

    #[test]
    fn test_dispatch_by_tag() {
        let (backends, _, _) = backends();
        assert_eq!(backends.networks(), vec![Network::Bsv, Network::Eth]);
        assert_eq!(backends.require(Network::Eth).unwrap().network(), Network::Eth);

        let only_bsv = backends.only(&[Network::Bsv]);
        assert!(matches!(
            only_bsv.require(Network::Eth),
            Err(EngineError::Validation(RequestError::UnknownNetwork(Network::Eth)))
        ));
    }

    #[tokio::test]
    async fn test_reconnects_once() {
        let (backends, chain, _) = backends();
        let key = ChainKey::from_secret(&[0x51; 32]).unwrap();
        let key = &key;

        chain.disconnect();
        let minted = backends
            .call(Network::Bsv, |b| async move { b.create_ownership(key).await })
            .await
            .unwrap();
        assert!(minted.anchor.ends_with(":0"));
    }

    #[tokio::test]
    async fn test_unavailable_after_refused_reconnect() {
        let (backends, _, contract) = backends();
        let key = ChainKey::from_secret(&[0x52; 32]).unwrap();
        let key = &key;

        contract.disconnect();
        contract.refuse_reconnect(true);
        let err = backends
            .call(Network::Eth, |b| async move { b.create_ownership(key).await })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::BackendUnavailable {
                network: Network::Eth,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let (backends, chain, _) = backends();
        chain.set_funding_available(false);
        let key = ChainKey::from_secret(&[0x53; 32]).unwrap();
        let key = &key;

        let err = backends
            .call(Network::Bsv, |b| async move { b.create_ownership(key).await })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Backend(BackendError::MintFailed(_))));
        assert_eq!(chain.funding_requests(), 1);
    }
}
