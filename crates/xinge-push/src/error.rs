//! 错误类型定义
//!
//! 区分调用方错误（设备类型非法、队列已满）、传输层错误、
//! 以及响应解析的两类失败：服务端返回的业务错误码（`Remote`）
//! 与响应结构不符合预期（`MalformedResponse` / `UnsupportedResultType` /
//! `NoSuitableData`），便于调用方按类别决定处理策略。

use thiserror::Error;

/// 信鸽推送客户端错误类型
#[derive(Debug, Error)]
pub enum XgPushError {
    /// 设备类型编码不在已识别范围内（仅 1=iOS、2=Android 合法）
    #[error("未知设备类型: {0}")]
    UnknownDeviceType(i32),

    /// 异步队列已满，消息被拒绝（快速失败，不阻塞调用方）
    #[error("推送队列已满，消息被丢弃")]
    QueueFull,

    /// 关闭信号发出后队列不再接收新消息
    #[error("推送队列已关闭")]
    QueueClosed,

    /// 配置校验失败
    #[error("配置非法: {0}")]
    InvalidConfig(String),

    /// 网络或 HTTP 层失败
    #[error("HTTP 请求失败: {0}")]
    Transport(String),

    /// 响应体不是合法的 JSON 响应信封
    #[error("响应解析失败: {0}")]
    MalformedResponse(String),

    /// 服务端返回非零错误码（业务层失败，而非传输失败）
    #[error("服务端错误: ret_code={code}, err_msg={message}")]
    Remote { code: i64, message: String },

    /// 信封中的 result 字段不是预期的 JSON 对象
    #[error("响应 result 字段类型不支持")]
    UnsupportedResultType,

    /// result 对象中缺少预期字段，或字段类型不匹配
    #[error("响应 result 中缺少可用数据")]
    NoSuitableData,

    /// 参数序列化失败（列表类参数的 JSON 编码）
    #[error("参数序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}
