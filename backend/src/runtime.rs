use crate::sink::{MessageSink, RuntimeError, RuntimeHost};
use anyhow::Context;
use async_trait::async_trait;
use location_bridge_shared::{
    InitializeDatabaseArgs, MethodCall, SaveLocationArgs, LOCATION_CHANNEL,
    METHOD_INITIALIZE_DATABASE, METHOD_SAVE_LOCATION,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const DISPATCH_QUEUE_DEPTH: usize = 32;

/// Where a callback handle's entrypoint lives and how to reach its runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackInfo {
    pub handle: i64,
    pub library_path: String,
    pub function_name: String,
    /// `host:port` the runtime accepts frames on.
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackRegistry {
    callbacks: Vec<CallbackInfo>,
}

impl CallbackRegistry {
    pub fn new(callbacks: Vec<CallbackInfo>) -> Self {
        Self { callbacks }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read callback registry {path:?}"))?;
        serde_json::from_str(&raw).context("Invalid callback registry JSON")
    }

    pub fn lookup(&self, handle: i64) -> Option<&CallbackInfo> {
        self.callbacks.iter().find(|cb| cb.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

/// One JSON line on the runtime connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeFrame {
    /// Boot the entrypoint behind a callback handle.
    Execute {
        library_path: String,
        function_name: String,
    },
    Invoke {
        channel: String,
        method: String,
        arguments: serde_json::Value,
    },
}

#[async_trait]
pub trait RuntimeTransport: Send {
    async fn send(&mut self, frame: &RuntimeFrame) -> Result<(), RuntimeError>;
}

/// Newline-delimited JSON over any async byte stream.
pub struct JsonLinesTransport<W> {
    writer: W,
}

impl<W> JsonLinesTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W> RuntimeTransport for JsonLinesTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: &RuntimeFrame) -> Result<(), RuntimeError> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Sink that marshals every invocation onto the runtime's dispatcher task.
pub struct MethodChannelSink {
    tx: Mutex<Option<mpsc::Sender<MethodCall>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl MethodChannelSink {
    pub fn start<T>(info: &CallbackInfo, transport: T) -> Self
    where
        T: RuntimeTransport + 'static,
    {
        let (tx, rx) = mpsc::channel(DISPATCH_QUEUE_DEPTH);
        let execute = RuntimeFrame::Execute {
            library_path: info.library_path.clone(),
            function_name: info.function_name.clone(),
        };
        let dispatcher = tokio::spawn(dispatch_task(transport, execute, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    async fn invoke_method(
        &self,
        method: &str,
        arguments: serde_json::Value,
    ) -> Result<(), RuntimeError> {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(RuntimeError::Released)?;
        tx.send(MethodCall {
            method: method.to_string(),
            arguments,
        })
        .await
        .map_err(|_| RuntimeError::Released)
    }
}

#[async_trait]
impl MessageSink for MethodChannelSink {
    async fn initialize(&self, args: &InitializeDatabaseArgs) -> Result<(), RuntimeError> {
        self.invoke_method(METHOD_INITIALIZE_DATABASE, serde_json::to_value(args)?)
            .await
    }

    async fn save_location(&self, args: &SaveLocationArgs) -> Result<(), RuntimeError> {
        self.invoke_method(METHOD_SAVE_LOCATION, serde_json::to_value(args)?)
            .await
    }

    /// Closes the queue and waits for the dispatcher to drain it.
    async fn shutdown(&self) {
        drop(self.tx.lock().unwrap_or_else(|p| p.into_inner()).take());
        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = dispatcher
            && let Err(e) = handle.await
        {
            tracing::error!("runtime dispatcher ended abnormally: {e}");
        }
    }
}

async fn dispatch_task<T: RuntimeTransport>(
    mut transport: T,
    execute: RuntimeFrame,
    mut rx: mpsc::Receiver<MethodCall>,
) {
    if let Err(e) = transport.send(&execute).await {
        tracing::error!("failed to execute runtime entrypoint: {e}");
    }

    while let Some(call) = rx.recv().await {
        let method = call.method.clone();
        let frame = RuntimeFrame::Invoke {
            channel: LOCATION_CHANNEL.to_string(),
            method: call.method,
            arguments: call.arguments,
        };
        if let Err(e) = transport.send(&frame).await {
            tracing::error!("invoking {method} on runtime failed: {e}");
        }
    }

    tracing::debug!("runtime dispatcher stopped");
}

/// Resolves callback handles through a registry and connects to the runtime
/// over TCP.
pub struct EmbeddedRuntimeHost {
    registry: CallbackRegistry,
}

impl EmbeddedRuntimeHost {
    pub fn new(registry: CallbackRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RuntimeHost for EmbeddedRuntimeHost {
    async fn launch(&self, callback_handle: i64) -> Result<Arc<dyn MessageSink>, RuntimeError> {
        let info = self
            .registry
            .lookup(callback_handle)
            .cloned()
            .ok_or(RuntimeError::CallbackNotFound(callback_handle))?;

        let stream = TcpStream::connect(&info.endpoint)
            .await
            .map_err(|source| RuntimeError::Connect {
                endpoint: info.endpoint.clone(),
                source,
            })?;

        tracing::info!(
            "runtime for handle {} connected at {}",
            callback_handle,
            info.endpoint
        );
        Ok(Arc::new(MethodChannelSink::start(
            &info,
            JsonLinesTransport::new(stream),
        )))
    }
}
