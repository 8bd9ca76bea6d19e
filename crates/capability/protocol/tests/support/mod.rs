//! 脚本化传输：按预设回复驱动客户端，并记录发出的帧。

#![allow(dead_code)]

use async_trait::async_trait;
use relay_protocol::{FrameTransport, ProtocolError, ReceivedChunk, TransportConnector};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 设备的一次回复
#[derive(Debug, Clone)]
pub enum Reply {
    /// 一条消息，按给定分段依次到达
    Frame(Vec<&'static str>),
    /// 对端断开
    Hangup,
    /// 永不回复
    Silence,
}

pub fn frame(text: &'static str) -> Reply {
    Reply::Frame(vec![text])
}

/// 每次 open 消耗一个脚本；脚本为 None 表示 open 失败
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    scripts: Arc<Mutex<VecDeque<Option<Vec<Reply>>>>>,
    sent: Arc<Mutex<Vec<String>>>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(self, replies: Vec<Reply>) -> Self {
        self.scripts.lock().unwrap().push_back(Some(replies));
        self
    }

    pub fn with_refused_connection(self) -> Self {
        self.scripts.lock().unwrap().push_back(None);
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn open(&self, uri: &str) -> Result<ScriptedTransport, ProtocolError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front().flatten();
        match script {
            Some(replies) => Ok(ScriptedTransport::new(replies, self.sent.clone())),
            None => Err(ProtocolError::TransportFailure(format!(
                "connection refused: {}",
                uri
            ))),
        }
    }
}

pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    chunks: VecDeque<&'static str>,
    sent: Arc<Mutex<Vec<String>>>,
    open: bool,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>, sent: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            replies: replies.into(),
            chunks: VecDeque::new(),
            sent,
            open: true,
        }
    }
}

#[async_trait]
impl FrameTransport for ScriptedTransport {
    async fn send_text(&mut self, message: &str) -> Result<(), ProtocolError> {
        if !self.open {
            return Err(ProtocolError::TransportFailure("closed".to_string()));
        }
        self.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8]) -> Result<ReceivedChunk, ProtocolError> {
        if self.chunks.is_empty() {
            match self.replies.pop_front() {
                Some(Reply::Frame(chunks)) => self.chunks = chunks.into(),
                Some(Reply::Silence) => std::future::pending::<()>().await,
                Some(Reply::Hangup) | None => {
                    self.open = false;
                    return Err(ProtocolError::TransportFailure("hangup".to_string()));
                }
            }
        }
        let chunk = self.chunks.pop_front().unwrap_or_default();
        let bytes = chunk.as_bytes();
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(ReceivedChunk {
            len,
            end_of_message: self.chunks.is_empty(),
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.open = false;
        Ok(())
    }
}
