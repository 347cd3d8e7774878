//! 客户端配置
//!
//! 配置由宿主应用在构造时以编程方式提供，本库不读取配置文件或环境变量。

use serde::Deserialize;

use crate::error::XgPushError;

/// 部署环境
///
/// 仅 iOS 通道需要携带该字段参与签名，对应 APNs 的生产/开发证书环境。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushEnvironment {
    Product,
    Develop,
}

impl PushEnvironment {
    /// 接口要求的字面值："1" 生产环境，"2" 开发环境
    pub fn as_str(&self) -> &'static str {
        match self {
            PushEnvironment::Product => "1",
            PushEnvironment::Develop => "2",
        }
    }
}

/// 信鸽推送客户端配置
#[derive(Debug, Clone, Deserialize)]
pub struct XgPushConfig {
    /// iOS 应用的 access_id
    pub ios_access_id: String,
    /// iOS 应用的 secret_key
    pub ios_secret_key: String,
    /// Android 应用的 access_id
    pub android_access_id: String,
    /// Android 应用的 secret_key
    pub android_secret_key: String,
    /// 并发发送 worker 数量
    pub connections: usize,
    /// 异步队列容量，入队满时快速失败
    pub queue_size: usize,
    /// 单次 HTTP 请求超时（秒）
    pub timeout_seconds: u64,
    /// 部署环境（仅影响 iOS 通道）
    pub environment: PushEnvironment,
}

impl Default for XgPushConfig {
    fn default() -> Self {
        Self {
            ios_access_id: String::new(),
            ios_secret_key: String::new(),
            android_access_id: String::new(),
            android_secret_key: String::new(),
            connections: 4,
            queue_size: 1024,
            timeout_seconds: 30,
            environment: PushEnvironment::Product,
        }
    }
}

impl XgPushConfig {
    /// 校验配置合法性
    ///
    /// worker 数量必须为正，否则队列中的消息永远不会被消费。
    pub fn validate(&self) -> Result<(), XgPushError> {
        if self.connections == 0 {
            return Err(XgPushError::InvalidConfig(
                "connections 必须大于 0".to_string(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(XgPushError::InvalidConfig(
                "timeout_seconds 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}
