//! Child side of the proxy: a receive loop over an open instruction table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::io::{AsyncRead, AsyncWrite};

use super::protocol::{self, FrameReader, Request, Response};
use super::{ProxyError, ProxyResult};
use crate::plugins::{
    ImportError, Importer, Namespace, PluginCandidate, PluginDiscovery, PluginError, PluginManager,
    PluginRef, PluginResult,
};

/// Instruction handler: `(context, args, kwargs) -> result`.
pub type Handler = Box<dyn Fn(&mut ChildContext, &[Value], &Map<String, Value>) -> Value + Send + Sync>;

/// Plugin state owned by the child loop.
pub struct ChildContext {
    importer: Arc<dyn Importer>,
    discovery: Option<PluginDiscovery>,
    units: Vec<PluginRef>,
}

impl ChildContext {
    pub fn new(importer: Arc<dyn Importer>) -> Self {
        Self {
            importer,
            discovery: None,
            units: Vec::new(),
        }
    }

    /// Imports `target`, a dotted import path, and keeps the unit.
    ///
    /// With a discovery configured the target is located on disk first;
    /// otherwise the importer receives a detached candidate.
    pub fn load_target(&mut self, target: &str) -> PluginResult<()> {
        let import_path = Namespace::new(target)?;
        let candidate = match &self.discovery {
            Some(discovery) => discovery.locate(&import_path).ok_or_else(|| PluginError::Load {
                import_path: target.to_string(),
                source: ImportError::NotOnSearchPath(target.to_string()),
            })?,
            None => PluginCandidate::detached(import_path),
        };

        match self.importer.import(&candidate) {
            Ok(Some(unit)) => {
                tracing::debug!(plugin = %target, "plugin loaded in proxy child");
                self.units.push(unit);
                Ok(())
            }
            Ok(None) => Err(PluginError::Load {
                import_path: target.to_string(),
                source: ImportError::Empty(target.to_string()),
            }),
            Err(source) => Err(PluginError::Load {
                import_path: target.to_string(),
                source,
            }),
        }
    }

    pub fn units(&self) -> &[PluginRef] {
        &self.units
    }

    pub fn manager(&self) -> PluginManager {
        PluginManager::new(self.units.clone())
    }
}

impl fmt::Debug for ChildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildContext")
            .field("discovery", &self.discovery)
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

pub struct ProxyChild {
    context: ChildContext,
    handlers: HashMap<String, Handler>,
}

impl ProxyChild {
    /// A child with the built-in `echo`, `ping`, `load` and `call`
    /// instructions.
    pub fn new(importer: Arc<dyn Importer>) -> Self {
        Self {
            context: ChildContext::new(importer),
            handlers: HashMap::new(),
        }
        .register("echo", |_, args, kwargs| {
            args.first()
                .or_else(|| kwargs.get("value"))
                .cloned()
                .unwrap_or(Value::Null)
        })
        .register("ping", |_, _, _| json!("pong"))
        .register("load", load_instruction)
        .register("call", call_instruction)
    }

    /// Locates `load` targets on disk through `discovery`.
    pub fn with_discovery(mut self, discovery: PluginDiscovery) -> Self {
        self.context.discovery = Some(discovery);
        self
    }

    /// Adds or replaces an instruction.
    pub fn register<F>(mut self, instruction: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut ChildContext, &[Value], &Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.handlers.insert(instruction.into(), Box::new(handler));
        self
    }

    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn context(&self) -> &ChildContext {
        &self.context
    }

    /// Dispatches one request. An unregistered instruction is fatal.
    pub fn handle(&mut self, request: &Request) -> ProxyResult<Response> {
        let handler = self
            .handlers
            .get(&request.instruction)
            .ok_or_else(|| ProxyError::UnknownInstruction {
                name: request.instruction.clone(),
            })?;

        let result = handler(&mut self.context, &request.args, &request.kwargs);
        Ok(Response {
            seq: request.seq,
            result,
        })
    }

    /// Runs the receive loop until the reader reaches end of stream.
    pub async fn serve<R, W>(mut self, reader: R, mut writer: W) -> ProxyResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frames = FrameReader::new(reader);

        while let Some(request) = frames.next::<Request>().await? {
            tracing::trace!(seq = request.seq, instruction = %request.instruction, "request received");
            let response = match self.handle(&request) {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(seq = request.seq, error = %e, "proxy child stopping");
                    return Err(e);
                }
            };
            protocol::write_frame(&mut writer, &response).await?;
        }

        tracing::debug!("proxy channel closed by parent");
        Ok(())
    }

    pub async fn serve_stdio(self) -> ProxyResult<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }
}

impl fmt::Debug for ProxyChild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut instructions: Vec<_> = self.instructions().collect();
        instructions.sort_unstable();
        f.debug_struct("ProxyChild")
            .field("context", &self.context)
            .field("instructions", &instructions)
            .finish()
    }
}

fn load_instruction(context: &mut ChildContext, args: &[Value], kwargs: &Map<String, Value>) -> Value {
    let target = args
        .first()
        .or_else(|| kwargs.get("target"))
        .and_then(Value::as_str);

    let Some(target) = target else {
        return json!({"loaded": false, "error": "missing load target"});
    };

    match context.load_target(target) {
        Ok(()) => json!({"loaded": true}),
        Err(e) => {
            tracing::warn!(plugin = %target, error = %e, "proxy child failed to load plugin");
            json!({"loaded": false, "error": e.to_string()})
        }
    }
}

fn call_instruction(context: &mut ChildContext, args: &[Value], _kwargs: &Map<String, Value>) -> Value {
    let Some(method) = args.first().and_then(Value::as_str) else {
        return json!({"error": "missing method name"});
    };

    let manager = context.manager();
    let results: Vec<Value> = manager
        .call(method, &args[1..])
        .map(|result| match result {
            Ok(value) => value,
            Err(e) => json!({"error": e.to_string()}),
        })
        .collect();
    Value::Array(results)
}
