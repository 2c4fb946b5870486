//! The driver-side multiplexer (C3): a writer task owning the outbound pipe, a reader task
//! owning the inbound pipe, and an in-flight table correlating replies to callers by sequence
//! number.
//!
//! Grounded in `AmConnCore`'s discipline of giving a connection exactly one serialization point
//! per direction rather than letting callers race on the socket directly — here realised as two
//! `tokio::spawn`ed loops instead of a single mutex, since unlike the teacher's request/reply
//! HANA protocol, this protocol allows many requests in flight at once (§5).

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use wire::codec_async::{read_data_default, read_string, write_data, write_string};
use wire::{tags, Data, ObjectId, WireError, DEFAULT_MAX_STRING_LEN};

use crate::config::BridgeConfiguration;
use crate::error::{BridgeError, BridgeResult};

/// One command destined for the engine, plus where to deliver its reply (`None` for
/// fire-and-forget commands such as a buffer-triggered `Remove`).
struct OutboundRequest {
    body: OutboundBody,
    reply: Option<oneshot::Sender<BridgeResult<Data>>>,
}

enum OutboundBody {
    EvalCode(String),
    StoreExpr(String),
    Apply { function_id: ObjectId, argument: Data },
    Remove(Vec<ObjectId>),
}

type Slot = Option<oneshot::Sender<BridgeResult<Data>>>;
type InFlight = Arc<StdMutex<HashMap<u64, Slot>>>;
type Fatal = Arc<StdMutex<Option<BridgeError>>>;

/// Owns both pipes of a single engine connection and presents the async request surface used by
/// [`crate::handle::Handle`] and the compile/apply functions in [`crate::compile`].
#[derive(Debug)]
pub struct BridgeTransport {
    request_tx: mpsc::UnboundedSender<OutboundRequest>,
    pending_remove: Arc<StdMutex<Vec<ObjectId>>>,
    config: BridgeConfiguration,
    fatal: Fatal,
    /// Memoized ids of the converter framework's reserved builtin functions (`assert_int`,
    /// `__tuple_assemble_2`, …), so repeated `store`/`retrieve` calls don't re-submit a
    /// `StoreExpr` for the same well-known name every time.
    builtins: tokio::sync::Mutex<HashMap<String, ObjectId>>,
}

impl BridgeTransport {
    /// Spawns the writer/reader tasks over `read_half`/`write_half` and performs the one-time
    /// exception-carrier bootstrap declaration (§6) before returning.
    pub async fn connect<RH, WH>(read_half: RH, write_half: WH, config: BridgeConfiguration) -> BridgeResult<Self>
    where
        RH: AsyncRead + Unpin + Send + 'static,
        WH: AsyncWrite + Unpin + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let in_flight: InFlight = Arc::new(StdMutex::new(HashMap::new()));
        let fatal: Fatal = Arc::new(StdMutex::new(None));

        tokio::spawn(writer_loop(request_rx, write_half, Arc::clone(&in_flight), Arc::clone(&fatal)));
        tokio::spawn(reader_loop(read_half, Arc::clone(&in_flight), Arc::clone(&fatal)));

        let transport = Self {
            request_tx,
            pending_remove: Arc::new(StdMutex::new(Vec::new())),
            config,
            fatal,
            builtins: tokio::sync::Mutex::new(HashMap::new()),
        };
        transport.eval_code("declare_exception_carriers").await?;
        debug!("bridge transport connected, exception carriers declared");
        Ok(transport)
    }

    fn submit(&self, body: OutboundBody, reply: Option<oneshot::Sender<BridgeResult<Data>>>) -> BridgeResult<()> {
        if let Some(e) = self.fatal.lock().unwrap().clone() {
            return Err(e);
        }
        self.request_tx
            .send(OutboundRequest { body, reply })
            .map_err(|_| BridgeError::TransportClosed {
                reason: "writer task is no longer running".into(),
            })
    }

    async fn call(&self, body: OutboundBody) -> BridgeResult<Data> {
        let (tx, rx) = oneshot::channel();
        self.submit(body, Some(tx))?;
        rx.await.map_err(|_| BridgeError::TransportClosed {
            reason: "reply slot dropped before the engine answered".into(),
        })?
    }

    pub async fn eval_code(&self, code: &str) -> BridgeResult<()> {
        self.call(OutboundBody::EvalCode(code.to_string())).await?;
        Ok(())
    }

    pub async fn store_code(&self, code: &str) -> BridgeResult<ObjectId> {
        let reply = self.call(OutboundBody::StoreExpr(code.to_string())).await?;
        reply
            .as_object()
            .ok_or_else(|| BridgeError::Converter(format!("StoreExpr reply was not an object, got a {}", reply.kind_name())))
    }

    pub async fn apply(&self, function_id: ObjectId, argument: Data) -> BridgeResult<Data> {
        self.call(OutboundBody::Apply { function_id, argument }).await
    }

    /// Returns the id of the reserved converter-support function named `name` (e.g.
    /// `"assert_int"`, `"__tuple_assemble_3"`), storing it on first use and memoizing the
    /// result for the lifetime of the connection.
    pub async fn builtin_function(&self, name: &str) -> BridgeResult<ObjectId> {
        if let Some(id) = self.builtins.lock().await.get(name) {
            return Ok(*id);
        }
        let id = self.store_code(name).await?;
        self.builtins.lock().await.insert(name.to_string(), id);
        Ok(id)
    }

    /// Queues an explicit `Remove` without waiting for the engine's reply.
    pub fn remove(&self, ids: Vec<ObjectId>) {
        if ids.is_empty() {
            return;
        }
        if let Err(e) = self.submit(OutboundBody::Remove(ids), None) {
            warn!("failed to queue Remove after transport became unusable: {e}");
        }
    }

    /// Enqueues `id` for batched removal; flushes once the buffer reaches the configured
    /// threshold. Called from [`crate::handle::Handle`]'s `Drop` impl, so this must never block
    /// or await.
    pub fn enqueue_pending_remove(&self, id: ObjectId) {
        let mut buf = self.pending_remove.lock().unwrap();
        buf.push(id);
        if buf.len() >= self.config.pending_remove_threshold() {
            let batch = std::mem::take(&mut *buf);
            drop(buf);
            self.remove(batch);
        }
    }

    /// Forces an immediate flush of whatever is currently buffered, regardless of threshold.
    pub fn flush_pending_removes(&self) {
        let batch = std::mem::take(&mut *self.pending_remove.lock().unwrap());
        self.remove(batch);
    }
}

async fn writer_loop<W: AsyncWrite + Unpin>(
    mut requests: mpsc::UnboundedReceiver<OutboundRequest>,
    mut write_half: W,
    in_flight: InFlight,
    fatal: Fatal,
) {
    let mut next_seq: u64 = 0;
    while let Some(req) = requests.recv().await {
        if let Some(e) = fatal.lock().unwrap().clone() {
            reply_detached(req.reply, Err(e));
            continue;
        }
        let seq = next_seq;
        match next_seq.checked_add(1) {
            Some(n) => next_seq = n,
            None => {
                let err = BridgeError::SequenceExhausted;
                *fatal.lock().unwrap() = Some(err.clone());
                reply_detached(req.reply, Err(err));
                continue;
            }
        }
        in_flight.lock().unwrap().insert(seq, req.reply);
        if let Err(io_err) = write_frame(&mut write_half, seq, &req.body).await {
            let err = BridgeError::from(io_err);
            *fatal.lock().unwrap() = Some(err.clone());
            reject_all(&in_flight, err);
            return;
        }
    }
    debug!("bridge writer loop: request channel closed, shutting down");
}

async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, seq: u64, body: &OutboundBody) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    w.write_u64(seq).await?;
    match body {
        OutboundBody::EvalCode(code) => {
            w.write_u8(tags::CMD_EVAL_CODE).await?;
            write_string(w, code).await?;
        }
        OutboundBody::StoreExpr(code) => {
            w.write_u8(tags::CMD_STORE_EXPR).await?;
            write_string(w, code).await?;
        }
        OutboundBody::Apply { function_id, argument } => {
            w.write_u8(tags::CMD_APPLY).await?;
            w.write_u64(function_id.value()).await?;
            write_data(w, argument).await?;
        }
        OutboundBody::Remove(ids) => {
            w.write_u8(tags::CMD_REMOVE).await?;
            let as_data = Data::List(ids.iter().map(|id| Data::Int(id.value() as i64)).collect());
            write_data(w, &as_data).await?;
        }
    }
    w.flush().await?;
    Ok(())
}

async fn reader_loop<R: AsyncRead + Unpin>(mut read_half: R, in_flight: InFlight, fatal: Fatal) {
    loop {
        match read_reply(&mut read_half).await {
            Ok((seq, outcome)) => {
                let slot = in_flight.lock().unwrap().remove(&seq);
                match slot {
                    Some(Some(tx)) => {
                        let _ = tx.send(outcome);
                    }
                    Some(None) => trace!("reply for detached request seq={seq} discarded"),
                    None => warn!("reply for unknown sequence {seq}"),
                }
            }
            Err(ReadError::Eof) => {
                let err = BridgeError::TransportClosed {
                    reason: "engine closed its output stream".into(),
                };
                *fatal.lock().unwrap() = Some(err.clone());
                reject_all(&in_flight, err);
                return;
            }
            Err(ReadError::Protocol(e)) => {
                let err = BridgeError::from(e);
                *fatal.lock().unwrap() = Some(err.clone());
                reject_all(&in_flight, err);
                return;
            }
        }
    }
}

enum ReadError {
    Eof,
    Protocol(WireError),
}

impl From<WireError> for ReadError {
    fn from(e: WireError) -> Self {
        Self::Protocol(e)
    }
}

async fn read_reply<R: AsyncRead + Unpin>(r: &mut R) -> Result<(u64, BridgeResult<Data>), ReadError> {
    use tokio::io::AsyncReadExt;
    let seq = match r.read_u64().await {
        Ok(v) => v,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ReadError::Eof),
        Err(e) => return Err(WireError::from(e).into()),
    };
    let status = r.read_u8().await.map_err(WireError::from)?;
    let outcome = match status {
        tags::REPLY_OK => Ok(read_data_default(r).await?),
        tags::REPLY_ERR => {
            let message = read_string(r, DEFAULT_MAX_STRING_LEN).await?;
            Err(BridgeError::Engine(message))
        }
        other => return Err(WireError::UnknownReplyTag(other).into()),
    };
    Ok((seq, outcome))
}

fn reject_all(in_flight: &InFlight, err: BridgeError) {
    let mut table = in_flight.lock().unwrap();
    for (_, slot) in table.drain() {
        reply_detached(slot, Err(err.clone()));
    }
}

fn reply_detached(slot: Slot, outcome: BridgeResult<Data>) {
    if let Some(tx) = slot {
        let _ = tx.send(outcome);
    }
}
