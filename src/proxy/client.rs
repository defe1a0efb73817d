//! Parent side of the proxy.

use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value, json};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::child::ProxyChild;
use super::protocol::{self, FrameReader, Request, Response};
use super::{ProxyError, ProxyResult};

/// Invoked once with the result of the request it was registered for.
pub type Callback = Box<dyn FnOnce(Value) + Send>;

type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

const LOCAL_CHANNEL_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyState {
    /// Child running, no plugin loaded yet.
    Starting,
    /// Plugin loaded, no request awaiting its callback.
    Ready,
    /// Plugin loaded, callbacks pending.
    Active,
    Closed,
}

enum ChildHandle {
    Process(Child),
    Task(JoinHandle<ProxyResult<()>>),
}

/// Handle to a plugin running in a child context.
///
/// Requests never block on their answer: register a [`Callback`] when
/// sending and call [`PluginProxy::handle_responses`] to deliver whatever
/// has arrived.
pub struct PluginProxy {
    writer: Option<BoxWriter>,
    responses: mpsc::UnboundedReceiver<Response>,
    reader: Option<JoinHandle<ProxyResult<()>>>,
    child: Option<ChildHandle>,
    callbacks: HashMap<u64, Callback>,
    seq: u64,
    ready: Arc<AtomicBool>,
}

impl PluginProxy {
    /// Spawns `command` as the child process, talking over its stdio.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(command: &mut Command) -> ProxyResult<Self> {
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("child stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("child stdout is not piped"))?;

        tracing::debug!(pid = ?child.id(), "proxy child process spawned");
        Ok(Self::connect(Box::new(stdin), stdout, ChildHandle::Process(child)))
    }

    /// Runs `child` in a local task connected by an in-memory pipe.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn_local(child: ProxyChild) -> Self {
        let (parent_end, child_end) = tokio::io::duplex(LOCAL_CHANNEL_CAPACITY);
        let (child_read, child_write) = tokio::io::split(child_end);
        let task = tokio::spawn(child.serve(child_read, child_write));

        let (parent_read, parent_write) = tokio::io::split(parent_end);
        Self::connect(Box::new(parent_write), parent_read, ChildHandle::Task(task))
    }

    fn connect<R>(writer: BoxWriter, reader: R, child: ChildHandle) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_responses(reader, tx));

        Self {
            writer: Some(writer),
            responses: rx,
            reader: Some(reader),
            child: Some(child),
            callbacks: HashMap::new(),
            seq: 0,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sends a request and returns its sequence number.
    pub async fn send_instruction(
        &mut self,
        instruction: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        callback: Option<Callback>,
    ) -> ProxyResult<u64> {
        let writer = self.writer.as_mut().ok_or(ProxyError::Closed)?;

        self.seq += 1;
        let request = Request {
            seq: self.seq,
            instruction: instruction.to_string(),
            args,
            kwargs,
        };
        protocol::write_frame(writer, &request).await?;
        tracing::trace!(seq = request.seq, instruction = %instruction, "request sent");

        if let Some(callback) = callback {
            self.callbacks.insert(request.seq, callback);
        }
        Ok(request.seq)
    }

    /// Asks the child to load `target`. The proxy becomes ready once the
    /// child reports success.
    pub async fn load(&mut self, target: &str) -> ProxyResult<u64> {
        let ready = Arc::clone(&self.ready);
        let target_name = target.to_string();
        let callback: Callback = Box::new(move |result| {
            if result.get("loaded").and_then(Value::as_bool) == Some(true) {
                ready.store(true, Ordering::SeqCst);
            } else {
                tracing::warn!(plugin = %target_name, result = %result, "proxy child could not load plugin");
            }
        });
        self.send_instruction("load", vec![json!(target)], Map::new(), Some(callback))
            .await
    }

    pub async fn echo(&mut self, value: Value, callback: Callback) -> ProxyResult<u64> {
        self.send_instruction("echo", vec![value], Map::new(), Some(callback))
            .await
    }

    pub async fn ping(&mut self, callback: Callback) -> ProxyResult<u64> {
        self.send_instruction("ping", Vec::new(), Map::new(), Some(callback))
            .await
    }

    /// Invokes `method` across the plugins loaded in the child. The callback
    /// receives an array with one entry per plugin implementing it.
    pub async fn call(&mut self, method: &str, args: Vec<Value>, callback: Callback) -> ProxyResult<u64> {
        let mut call_args = Vec::with_capacity(args.len() + 1);
        call_args.push(json!(method));
        call_args.extend(args);
        self.send_instruction("call", call_args, Map::new(), Some(callback))
            .await
    }

    /// Delivers every response received so far without waiting. Returns the
    /// number of callbacks invoked.
    pub fn handle_responses(&mut self) -> usize {
        let mut invoked = 0;
        while let Ok(response) = self.responses.try_recv() {
            match self.callbacks.remove(&response.seq) {
                Some(callback) => {
                    callback(response.result);
                    invoked += 1;
                }
                None => {
                    tracing::trace!(seq = response.seq, "discarding response without callback");
                }
            }
        }
        invoked
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Number of callbacks still waiting for their response.
    pub fn pending(&self) -> usize {
        self.callbacks.len()
    }

    pub fn last_seq(&self) -> u64 {
        self.seq
    }

    pub fn state(&self) -> ProxyState {
        if self.child.is_none() {
            ProxyState::Closed
        } else if !self.is_ready() {
            ProxyState::Starting
        } else if self.callbacks.is_empty() {
            ProxyState::Ready
        } else {
            ProxyState::Active
        }
    }

    /// Closes the channel and waits for the child to finish.
    ///
    /// Responses the child wrote before exiting stay available to
    /// [`PluginProxy::handle_responses`]. Returns the child's failure, if any.
    pub async fn close(&mut self) -> ProxyResult<()> {
        if let Some(mut writer) = self.writer.take()
            && let Err(e) = writer.shutdown().await
        {
            tracing::trace!(error = %e, "proxy channel already closed");
        }

        let result = match self.child.take() {
            Some(ChildHandle::Process(mut child)) => {
                let status = child.wait().await?;
                if status.success() {
                    Ok(())
                } else {
                    Err(ProxyError::ChildExited {
                        code: status.code(),
                    })
                }
            }
            Some(ChildHandle::Task(task)) => task.await.unwrap_or_else(|e| {
                Err(ProxyError::Io(std::io::Error::other(e)))
            }),
            None => return Ok(()),
        };

        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(error = %e, "proxy response reader stopped"),
                Err(e) => tracing::debug!(error = %e, "proxy response reader aborted"),
            }
        }

        if let Err(e) = &result {
            tracing::error!(error = %e, "proxy child failed");
        }
        result
    }
}

async fn read_responses<R>(reader: R, tx: mpsc::UnboundedSender<Response>) -> ProxyResult<()>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FrameReader::new(reader);
    while let Some(response) = frames.next::<Response>().await? {
        tracing::trace!(seq = response.seq, "response received");
        if tx.send(response).is_err() {
            break;
        }
    }
    Ok(())
}

impl fmt::Debug for PluginProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginProxy")
            .field("state", &self.state())
            .field("seq", &self.seq)
            .field("pending", &self.callbacks.len())
            .finish()
    }
}

impl Drop for PluginProxy {
    fn drop(&mut self) {
        if let Some(ChildHandle::Task(task)) = &self.child {
            task.abort();
        }
        if let Some(reader) = &self.reader {
            reader.abort();
        }
    }
}
