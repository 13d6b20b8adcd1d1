// Permission is hereby granted, free of charge, to any person obtaining a
// copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
// FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

//! Shared test fixtures: mock collaborators and build request
//! construction.

use crate::{
    crypto::elgamal::{KeyPairGenerator, PublicKey},
    i2np::{
        tunnel::build::{HopRole, TunnelBuildRecord, TUNNEL_BUILD_RECORD_LEN},
        Message, MessageBuilder, MessageType,
    },
    primitives::{MessageId, RouterId, TunnelId, TRUNCATED_HASH_LEN},
    runtime::{mock::MockRuntime, Runtime},
    subsystem::{
        GarlicHandler, NetDbHandle, OutboundTunnel, PendingTunnel, RouterContext,
        TransitTunnelSender, TransportService, TunnelRegistry,
    },
    tunnel::transit::TransitTunnel,
};

use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::Mutex;
use rand_core::RngCore;
use thingbuf::mpsc::{channel, Receiver, Sender};

use std::sync::Arc;

/// Create a router: identity hash, ElGamal public key and context.
pub fn make_router() -> (RouterId, PublicKey, Arc<RouterContext>) {
    let mut rng = MockRuntime::rng();

    let mut hash = [0u8; 32];
    rng.fill_bytes(&mut hash);
    let router_id = RouterId::from(hash);

    let (private_key, public_key) = KeyPairGenerator::generate(&mut rng);
    let context = Arc::new(RouterContext::new(
        router_id,
        private_key,
        b"mock-router-info".to_vec(),
    ));

    (router_id, public_key, context)
}

/// Build a `VariableTunnelBuild` message with `num_records` records
/// where the record at `record_idx` is addressed to `local` and
/// encrypted under `public_key`; the rest are filler.
///
/// Returns the message and the wire records before any re-encryption.
pub fn make_build_request(
    public_key: &PublicKey,
    local: &RouterId,
    record_idx: usize,
    num_records: usize,
    role: HopRole,
    receive_tunnel: TunnelId,
    next_tunnel: TunnelId,
    next_router: RouterId,
    next_message_id: MessageId,
    reply_key: [u8; 32],
    reply_iv: [u8; 16],
) -> (Message, Vec<Vec<u8>>) {
    let mut rng = MockRuntime::rng();

    let records = (0..num_records)
        .map(|idx| match idx == record_idx {
            true => TunnelBuildRecord::new::<MockRuntime>(
                receive_tunnel,
                *local,
                next_tunnel,
                next_router,
                [0x11; 32],
                [0x22; 32],
                reply_key,
                reply_iv,
                role,
                next_message_id,
            )
            .encrypt(public_key, local, &mut rng)
            .to_vec(),
            false => {
                // filler addressed to nobody
                let mut record = vec![0u8; TUNNEL_BUILD_RECORD_LEN];
                rng.fill_bytes(&mut record);
                record[..TRUNCATED_HASH_LEN].copy_from_slice(&[0u8; TRUNCATED_HASH_LEN]);

                record
            }
        })
        .collect::<Vec<_>>();

    let mut payload = vec![num_records as u8];
    for record in &records {
        payload.extend_from_slice(record);
    }

    let message = MessageBuilder::new(MessageType::VariableTunnelBuild)
        .with_message_id(MessageId::from(rng.next_u32()))
        .with_payload(&payload)
        .build::<MockRuntime>();

    (message, records)
}

/// Mock network database capturing posted messages.
pub struct MockNetDb {
    tx: Sender<Message>,
}

impl MockNetDb {
    pub fn new() -> (Arc<Self>, Receiver<Message>) {
        let (tx, rx) = channel(64);

        (Arc::new(Self { tx }), rx)
    }
}

impl NetDbHandle for MockNetDb {
    fn post_message(&self, message: Message) {
        self.tx.try_send(message).unwrap();
    }

    fn find_router(&self, _: &RouterId) -> Option<Bytes> {
        None
    }

    fn random_router(&self) -> Option<RouterId> {
        None
    }

    fn closest_floodfill(&self, _: &[u8], _: &[RouterId]) -> Option<RouterId> {
        None
    }
}

/// Mock transport layer capturing sent messages.
pub struct MockTransports {
    tx: Sender<(RouterId, Message)>,
}

impl MockTransports {
    pub fn new() -> (Arc<Self>, Receiver<(RouterId, Message)>) {
        let (tx, rx) = channel(64);

        (Arc::new(Self { tx }), rx)
    }
}

impl TransportService for MockTransports {
    fn send(&self, router_id: &RouterId, message: Message) {
        self.tx.try_send((*router_id, message)).unwrap();
    }
}

/// Mock garlic router capturing session keys, garlic messages and
/// delivery statuses.
#[derive(Default)]
pub struct MockGarlic {
    session_keys: Mutex<Vec<([u8; 32], [u8; 32])>>,
    messages: Mutex<Vec<Message>>,
    delivery_statuses: Mutex<Vec<Vec<u8>>>,
}

impl MockGarlic {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    pub fn session_keys(&self) -> Vec<([u8; 32], [u8; 32])> {
        self.session_keys.lock().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    pub fn delivery_statuses(&self) -> Vec<Vec<u8>> {
        self.delivery_statuses.lock().clone()
    }
}

impl GarlicHandler for MockGarlic {
    fn add_session_key(&self, key: [u8; 32], tag: [u8; 32]) {
        self.session_keys.lock().push((key, tag));
    }

    fn handle_garlic_message(&self, message: Message) {
        self.messages.lock().push(message);
    }

    fn handle_delivery_status(&self, payload: &[u8]) {
        self.delivery_statuses.lock().push(payload.to_vec());
    }
}

/// Mock pending tunnel with a scripted verdict.
pub struct MockPendingTunnel {
    tunnel_id: TunnelId,
    accept: bool,
    responses: Mutex<Vec<Vec<u8>>>,
}

impl MockPendingTunnel {
    pub fn new(tunnel_id: TunnelId, accept: bool) -> Arc<Self> {
        Arc::new(Self {
            tunnel_id,
            accept,
            responses: Default::default(),
        })
    }

    pub fn responses(&self) -> Vec<Vec<u8>> {
        self.responses.lock().clone()
    }
}

impl PendingTunnel for MockPendingTunnel {
    fn tunnel_id(&self) -> TunnelId {
        self.tunnel_id
    }

    fn handle_build_response(&self, payload: &[u8]) -> bool {
        self.responses.lock().push(payload.to_vec());
        self.accept
    }
}

/// Mock transit tunnel capturing relayed messages.
pub struct MockTransitSender {
    tx: Sender<Message>,
}

impl TransitTunnelSender for MockTransitSender {
    fn send_tunnel_data(&self, message: Message) {
        self.tx.try_send(message).unwrap();
    }
}

/// Mock outbound tunnel capturing sent messages.
pub struct MockOutboundTunnel {
    tx: Sender<(RouterId, TunnelId, Message)>,
}

impl OutboundTunnel for MockOutboundTunnel {
    fn send_tunnel_data(
        &self,
        gateway_router: &RouterId,
        gateway_tunnel: TunnelId,
        message: Message,
    ) {
        self.tx.try_send((*gateway_router, gateway_tunnel, message)).unwrap();
    }
}

/// Mock tunnel registry.
pub struct MockTunnelRegistry {
    transit_tunnels: Mutex<Vec<TransitTunnel>>,
    transit_senders: Mutex<HashMap<TunnelId, Arc<MockTransitSender>>>,
    pending: Mutex<HashMap<MessageId, Arc<MockPendingTunnel>>>,
    outbound: Mutex<Option<Arc<MockOutboundTunnel>>>,
    inbound_added: Mutex<Vec<TunnelId>>,
    outbound_added: Mutex<Vec<TunnelId>>,
    pending_removed: Mutex<Vec<MessageId>>,
    pools: Mutex<HashMap<TunnelId, Sender<Message>>>,
    tunnel_data_tx: Sender<Message>,
}

impl MockTunnelRegistry {
    pub fn new() -> (Arc<Self>, Receiver<Message>) {
        let (tunnel_data_tx, tunnel_data_rx) = channel(64);

        (
            Arc::new(Self {
                transit_tunnels: Default::default(),
                transit_senders: Default::default(),
                pending: Default::default(),
                outbound: Default::default(),
                inbound_added: Default::default(),
                outbound_added: Default::default(),
                pending_removed: Default::default(),
                pools: Default::default(),
                tunnel_data_tx,
            }),
            tunnel_data_rx,
        )
    }

    /// Register a transit tunnel sender and return its message stream.
    pub fn add_transit_sender(&self, tunnel_id: TunnelId) -> Receiver<Message> {
        let (tx, rx) = channel(64);
        self.transit_senders.lock().insert(tunnel_id, Arc::new(MockTransitSender { tx }));

        rx
    }

    /// Register a pending tunnel with a scripted verdict.
    pub fn add_pending(&self, message_id: MessageId, accept: bool) -> Arc<MockPendingTunnel> {
        let pending = MockPendingTunnel::new(TunnelId::from(*message_id), accept);
        self.pending.lock().insert(message_id, pending.clone());

        pending
    }

    /// Register the next outbound tunnel and return its message stream.
    pub fn set_outbound(&self) -> Receiver<(RouterId, TunnelId, Message)> {
        let (tx, rx) = channel(64);
        *self.outbound.lock() = Some(Arc::new(MockOutboundTunnel { tx }));

        rx
    }

    /// Register a tunnel pool for `tunnel_id` and return its stream.
    pub fn add_pool(&self, tunnel_id: TunnelId) -> Receiver<Message> {
        let (tx, rx) = channel(64);
        self.pools.lock().insert(tunnel_id, tx);

        rx
    }

    pub fn transit_tunnels(&self) -> Vec<TransitTunnel> {
        self.transit_tunnels.lock().clone()
    }

    pub fn inbound_added(&self) -> Vec<TunnelId> {
        self.inbound_added.lock().clone()
    }

    pub fn outbound_added(&self) -> Vec<TunnelId> {
        self.outbound_added.lock().clone()
    }

    pub fn pending_removed(&self) -> Vec<MessageId> {
        self.pending_removed.lock().clone()
    }
}

impl TunnelRegistry for MockTunnelRegistry {
    fn pending_tunnel(&self, message_id: MessageId) -> Option<Arc<dyn PendingTunnel>> {
        self.pending
            .lock()
            .get(&message_id)
            .cloned()
            .map(|pending| pending as Arc<dyn PendingTunnel>)
    }

    fn add_inbound_tunnel(&self, tunnel: Arc<dyn PendingTunnel>) {
        self.inbound_added.lock().push(tunnel.tunnel_id());
    }

    fn add_outbound_tunnel(&self, tunnel: Arc<dyn PendingTunnel>) {
        self.outbound_added.lock().push(tunnel.tunnel_id());
    }

    fn remove_pending_tunnel(&self, message_id: MessageId) {
        self.pending.lock().remove(&message_id);
        self.pending_removed.lock().push(message_id);
    }

    fn add_transit_tunnel(&self, tunnel: TransitTunnel) {
        self.transit_tunnels.lock().push(tunnel);
    }

    fn transit_tunnel(&self, tunnel_id: TunnelId) -> Option<Arc<dyn TransitTunnelSender>> {
        self.transit_senders
            .lock()
            .get(&tunnel_id)
            .cloned()
            .map(|sender| sender as Arc<dyn TransitTunnelSender>)
    }

    fn next_outbound_tunnel(&self) -> Option<Arc<dyn OutboundTunnel>> {
        self.outbound.lock().clone().map(|tunnel| tunnel as Arc<dyn OutboundTunnel>)
    }

    fn post_tunnel_data(&self, message: Message) {
        self.tunnel_data_tx.try_send(message).unwrap();
    }

    fn post_pool_delivery_status(
        &self,
        tunnel_id: TunnelId,
        message: Message,
    ) -> Result<(), Message> {
        match self.pools.lock().get(&tunnel_id) {
            Some(pool) => {
                pool.try_send(message).unwrap();
                Ok(())
            }
            None => Err(message),
        }
    }
}

/// Drain a receiver into a vector.
pub fn drain<T: Clone + Default>(rx: &Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();

    while let Ok(value) = rx.try_recv() {
        out.push(value);
    }

    out
}
