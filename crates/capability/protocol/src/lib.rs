//! # 设备协议能力模块
//!
//! 与电表设备之间的持久连接与请求/响应交换：
//! - **帧通道**：`"<opcode>,<payload>"` 单消息帧，固定容量接收缓冲区，响应操作码校验
//! - **连接状态机**：纯函数式迁移，Disconnected → Connecting → Connected → Authenticating → Authenticated
//! - **握手**：预认证探测 + PIN 认证，以步骤数据定义
//! - **设备客户端**：`connect` / `fetch_sample`，传输断开时自动重连一次
//!
//! ## 架构设计
//!
//! ```text
//! SamplingEngine
//!       │  SampleSource::fetch_sample
//!       ▼
//! DeviceClient ── transition() ── ConnectionState
//!       │
//!       ▼
//! FramedChannel
//!       │  FrameTransport
//!       ▼
//! WsTransport (tokio-tungstenite) → 设备
//! ```
//!
//! ## 报文格式
//!
//! ```text
//! → ?,6            ← ?,6          预认证探测
//! → 5,<PIN>        ← 5,1          认证
//! → ?,1            ← 1,<12 个数值>  抓取：电流×3, 电压×3, 功率×3, 相位角×3
//! ```

mod channel;
mod client;
mod error;
mod handshake;
mod state;
mod transport;
mod ws;

pub use channel::{FramedChannel, RECEIVE_BUFFER_CAPACITY};
pub use client::{parse_sample, DeviceClient, DeviceClientConfig, SampleSource};
pub use error::ProtocolError;
pub use handshake::{
    HandshakeStep, StepPayload, StepPhase, DEFAULT_HANDSHAKE, FETCH_OPCODE, FETCH_PAYLOAD,
    FETCH_RESPONSE_OPCODE,
};
pub use state::{transition, ConnectionEvent, ConnectionState, Transition};
pub use transport::{FrameTransport, ReceivedChunk, TransportConnector};
pub use ws::{WsConnector, WsTransport};
