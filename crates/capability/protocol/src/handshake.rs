//! 握手步骤与固定操作码
//!
//! 握手以 (发送, 期望) 步骤列表的形式定义，新的握手变体只需新增数据。

/// 抓取数据请求操作码
pub const FETCH_OPCODE: char = '?';
/// 抓取数据请求内容
pub const FETCH_PAYLOAD: &str = "1";
/// 抓取数据响应操作码
pub const FETCH_RESPONSE_OPCODE: char = '1';

/// 步骤所处的握手阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// 预认证探测（失败即放弃连接）
    Probe,
    /// 认证（失败保持 Authenticating）
    Authenticate,
}

/// 请求内容来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPayload {
    /// 固定文本
    Fixed(&'static str),
    /// 使用配置的 PIN
    Secret,
}

/// 单个握手步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeStep {
    pub name: &'static str,
    pub phase: StepPhase,
    pub request_opcode: char,
    pub payload: StepPayload,
    pub response_opcode: char,
    pub expected: &'static str,
}

impl HandshakeStep {
    /// 解析本步骤实际发送的内容
    pub fn payload<'a>(&self, secret: &'a str) -> &'a str {
        match self.payload {
            StepPayload::Fixed(text) => text,
            StepPayload::Secret => secret,
        }
    }

    /// 日志中展示的请求内容（密钥脱敏）
    pub fn loggable_payload(&self) -> &'static str {
        match self.payload {
            StepPayload::Fixed(text) => text,
            StepPayload::Secret => "<redacted>",
        }
    }
}

/// 设备默认握手：先探测回显，再用 PIN 认证
pub const DEFAULT_HANDSHAKE: &[HandshakeStep] = &[
    HandshakeStep {
        name: "pre_authenticate",
        phase: StepPhase::Probe,
        request_opcode: '?',
        payload: StepPayload::Fixed("6"),
        response_opcode: '?',
        expected: "6",
    },
    HandshakeStep {
        name: "authenticate",
        phase: StepPhase::Authenticate,
        request_opcode: '5',
        payload: StepPayload::Secret,
        response_opcode: '5',
        expected: "1",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handshake_probes_before_authenticating() {
        let phases: Vec<StepPhase> = DEFAULT_HANDSHAKE.iter().map(|step| step.phase).collect();
        assert_eq!(phases, vec![StepPhase::Probe, StepPhase::Authenticate]);
    }

    #[test]
    fn secret_payload_is_resolved_and_redacted() {
        let step = DEFAULT_HANDSHAKE[1];
        assert_eq!(step.payload("1234"), "1234");
        assert_eq!(step.loggable_payload(), "<redacted>");
        assert_eq!(DEFAULT_HANDSHAKE[0].payload("1234"), "6");
    }
}
