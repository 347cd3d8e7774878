//! HTTP 传输层
//!
//! 通过 `PushTransport` trait 抽象「带表单体的 POST 请求」这一能力，
//! 生产实现基于 reqwest，测试中以 mock 替换，无需真实网络即可验证
//! 签名、派发与解码的完整链路。

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::XgPushError;

/// 发送一次 POST 请求的注入能力
///
/// 参数以 `application/x-www-form-urlencoded` 编码为请求体
/// （字段在请求体中的顺序与签名无关，百分号转义仅发生在这一层），
/// 返回响应体字节或传输层错误。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn post_form(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, XgPushError>;
}

/// 基于 reqwest 的生产实现
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 构造带请求超时的 HTTP 客户端
    ///
    /// 超时到期视为一次普通的传输失败，不做重试。
    pub fn new(timeout: Duration) -> Result<Self, XgPushError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| XgPushError::Transport(format!("创建 HTTP 客户端失败: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, XgPushError> {
        let resp = self
            .client
            .post(url)
            .form(params)
            .send()
            .await
            .map_err(|e| XgPushError::Transport(format!("发送请求失败: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(XgPushError::Transport(format!("HTTP 状态码异常: {status}")));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| XgPushError::Transport(format!("读取响应体失败: {e}")))?;
        Ok(body.to_vec())
    }
}
