//! 信鸽 v2 接口协议定义
//!
//! 包含接口路径常量、设备类型、推送消息载体、通用响应信封及其解码逻辑。
//! 所有接口共用同一个三字段信封 `{ret_code, err_msg, result}`，
//! `result` 的形状因接口而异，采用「通用信封 + 按调用点二次解析」的两段式解码。

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::XgPushError;

/// 接口主机与版本前缀，参与签名计算，不含 scheme
pub const V2_BASE_URL: &str = "openapi.xg.qq.com/v2/";
/// 实际请求地址前缀
pub const V2_BASE_URL_WITH_SCHEMA: &str = "http://openapi.xg.qq.com/v2/";
/// 所有接口均为 POST，该字面值参与签名
pub const HTTP_METHOD: &str = "POST";

pub const PUSH_SINGLE_ACCOUNT_METHOD: &str = "push/single_account";
pub const PUSH_SINGLE_DEVICE_METHOD: &str = "push/single_device";
pub const PUSH_ACCOUNT_LIST_METHOD: &str = "push/account_list";
pub const PUSH_ALL_DEVICE_METHOD: &str = "push/all_device";
pub const PUSH_TAGS_METHOD: &str = "push/tags_device";
pub const BATCH_SET_TAGS_METHOD: &str = "tags/batch_set";
pub const BATCH_DEL_TAGS_METHOD: &str = "tags/batch_del";
pub const GET_APP_DEVICE_NUM_METHOD: &str = "application/get_app_device_num";

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// 通知栏消息
    Notification,
    /// 透传消息
    Message,
}

impl MessageType {
    /// 接口要求的字面值
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Notification => "1",
            MessageType::Message => "2",
        }
    }
}

/// 标签筛选的组合方式（`push/tags_device` 的 `tags_op` 字段）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOperation {
    And,
    Or,
}

impl TagOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagOperation::And => "AND",
            TagOperation::Or => "OR",
        }
    }
}

/// 设备平台类型
///
/// iOS 与 Android 使用各自独立的凭证对，且 iOS 签名时额外携带 `environment` 字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Ios,
    Android,
}

impl DeviceType {
    /// 从接口的整数编码构造（1=iOS，2=Android）
    ///
    /// 其余编码返回 [`XgPushError::UnknownDeviceType`]，在进入任何
    /// 网络调用之前即失败。
    pub fn from_code(code: i32) -> Result<Self, XgPushError> {
        match code {
            1 => Ok(DeviceType::Ios),
            2 => Ok(DeviceType::Android),
            other => Err(XgPushError::UnknownDeviceType(other)),
        }
    }
}

/// 一次逻辑推送请求
///
/// 由调用方构造后进入队列，在被某个 worker 取走之前由队列槽位独占，
/// 取走后由该 worker 独占直至发送完成。
///
/// 参数使用 `BTreeMap` 保存：遍历顺序即按键的字节序升序，
/// 恰好是签名算法要求的字典序（大写字母在前）。
#[derive(Debug, Clone)]
pub struct PushMessage {
    /// 接口路径，如 `push/single_device`
    pub method: &'static str,
    /// 请求参数，签名阶段会原地补充 `access_id`/`timestamp`/`sign` 等字段
    pub params: BTreeMap<String, String>,
    pub device_type: DeviceType,
}

/// 通用响应信封
///
/// `ret_code == 0` 表示成功；`result` 形状因接口而异，保留为原始 JSON 值
/// 由调用点二次解析。
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub ret_code: i64,
    #[serde(default)]
    pub err_msg: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// 解码通用响应信封
///
/// 结构性解析失败（非 JSON、缺字段类型不符）返回 `MalformedResponse`；
/// `ret_code != 0` 返回 `Remote`，表示服务端业务层失败而非传输失败。
pub fn decode_envelope(body: &[u8]) -> Result<PushEnvelope, XgPushError> {
    let envelope: PushEnvelope = serde_json::from_slice(body)
        .map_err(|e| XgPushError::MalformedResponse(e.to_string()))?;

    if envelope.ret_code != 0 {
        return Err(XgPushError::Remote {
            code: envelope.ret_code,
            message: envelope.err_msg,
        });
    }
    Ok(envelope)
}

impl PushEnvelope {
    /// 从 result 中提取 `device_num` 字段
    ///
    /// result 不是 JSON 对象时返回 `UnsupportedResultType`；
    /// 字段缺失或不是非负整数时返回 `NoSuitableData`。
    pub fn device_num(&self) -> Result<u64, XgPushError> {
        let result = self
            .result
            .as_ref()
            .and_then(|v| v.as_object())
            .ok_or(XgPushError::UnsupportedResultType)?;

        result
            .get("device_num")
            .and_then(|v| v.as_u64())
            .ok_or(XgPushError::NoSuitableData)
    }

    /// 从 result 中提取 `push_id` 字段
    pub fn push_id(&self) -> Result<String, XgPushError> {
        let result = self
            .result
            .as_ref()
            .and_then(|v| v.as_object())
            .ok_or(XgPushError::UnsupportedResultType)?;

        result
            .get("push_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or(XgPushError::NoSuitableData)
    }
}
