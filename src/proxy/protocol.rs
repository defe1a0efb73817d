//! Wire frames: one JSON object per line.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use super::ProxyResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub seq: u64,
    pub instruction: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
}

impl Request {
    pub fn new(seq: u64, instruction: impl Into<String>) -> Self {
        Self {
            seq,
            instruction: instruction.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Map<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub seq: u64,
    #[serde(default)]
    pub result: Value,
}

pub fn encode<T: Serialize>(frame: &T) -> ProxyResult<Vec<u8>> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    Ok(line)
}

pub fn decode<T: DeserializeOwned>(line: &str) -> ProxyResult<T> {
    Ok(serde_json::from_str(line)?)
}

/// Writes one frame and flushes it.
pub async fn write_frame<W, T>(writer: &mut W, frame: &T) -> ProxyResult<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    writer.write_all(&encode(frame)?).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads frames line by line, skipping blank lines.
pub struct FrameReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }

    /// Next frame, or `None` at end of stream.
    pub async fn next<T: DeserializeOwned>(&mut self) -> ProxyResult<Option<T>> {
        while let Some(line) = self.lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            return decode(&line).map(Some);
        }
        Ok(None)
    }
}
