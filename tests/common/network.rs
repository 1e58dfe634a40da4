//! A "mock" (totally local) RPC transport for wiring chains together in tests.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use sqlchain_rs::messages::{
    AdviseNewBlockReq, AdviseNewBlockResp, FetchAckedQueryReq, FetchAckedQueryResp, FetchBlockReq,
    FetchBlockResp,
};
use sqlchain_rs::networking::{ChainRpc, ChainService, RpcError};
use sqlchain_rs::types::basic::NodeId;

/// An RPC stub that routes calls to a shared registry of [`ChainService`] handles.
///
/// Calls execute the target chain's service handler on the caller's thread, which is a faithful
/// stand-in for a synchronous RPC transport. Unregistered peers are unreachable
/// ([`RpcError::PeerNotFound`]), so tests can run a subset of a peer set.
#[derive(Clone)]
pub(crate) struct RpcStub {
    services: Arc<Mutex<HashMap<NodeId, Arc<dyn ChainService>>>>,
}

impl RpcStub {
    pub(crate) fn new() -> RpcStub {
        RpcStub {
            services: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Make `peer` reachable, replacing any previous registration.
    pub(crate) fn register(&self, peer: NodeId, service: Arc<dyn ChainService>) {
        self.services.lock().unwrap().insert(peer, service);
    }

    fn service(&self, peer: &NodeId) -> Result<Arc<dyn ChainService>, RpcError> {
        // Clone the handle out before calling into it, so the registry lock is never held
        // across a service call.
        self.services
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .ok_or(RpcError::PeerNotFound)
    }
}

impl ChainRpc for RpcStub {
    fn advise_new_block(
        &self,
        peer: &NodeId,
        req: AdviseNewBlockReq,
    ) -> Result<AdviseNewBlockResp, RpcError> {
        self.service(peer)?
            .advise_new_block(req)
            .map_err(|err| RpcError::Remote(err.to_string()))
    }

    fn fetch_block(&self, peer: &NodeId, req: FetchBlockReq) -> Result<FetchBlockResp, RpcError> {
        self.service(peer)?
            .fetch_block(req)
            .map_err(|err| RpcError::Remote(err.to_string()))
    }

    fn fetch_acked_query(
        &self,
        peer: &NodeId,
        req: FetchAckedQueryReq,
    ) -> Result<FetchAckedQueryResp, RpcError> {
        self.service(peer)?
            .fetch_acked_query(req)
            .map_err(|err| RpcError::Remote(err.to_string()))
    }
}
