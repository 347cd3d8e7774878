//! 端到端流程测试
//!
//! 以注入的假传输层替代真实网络，从公开 API 走通「构造客户端 →
//! 异步推送入队 → worker 签名发送 → 同步查询」的完整链路。

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use xinge_push::error::XgPushError;
use xinge_push::transport::PushTransport;
use xinge_push::{DeviceType, MessageType, PushEnvironment, XgPush, XgPushConfig};

/// 记录每次请求并返回成功信封的假传输层
struct FakeTransport {
    seen: mpsc::UnboundedSender<(String, BTreeMap<String, String>)>,
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn post_form(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, XgPushError> {
        self.seen
            .send((url.to_string(), params.clone()))
            .expect("测试通道已关闭");

        let body = if url.ends_with("application/get_app_device_num") {
            r#"{"ret_code":0,"err_msg":"","result":{"device_num":7}}"#
        } else {
            r#"{"ret_code":0,"err_msg":""}"#
        };
        Ok(body.as_bytes().to_vec())
    }
}

fn make_config() -> XgPushConfig {
    XgPushConfig {
        ios_access_id: "2100000001".to_string(),
        ios_secret_key: "ios-secret".to_string(),
        android_access_id: "2100000002".to_string(),
        android_secret_key: "android-secret".to_string(),
        connections: 2,
        queue_size: 16,
        timeout_seconds: 5,
        environment: PushEnvironment::Develop,
    }
}

#[tokio::test]
async fn test_full_push_flow() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .try_init();

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let client = XgPush::with_transport(&make_config(), Arc::new(FakeTransport { seen: seen_tx }))?;

    // 异步路径：入队即返回
    client.push_notification_to_single_device(DeviceType::Ios, "token-abc", "你好")?;
    client.push_to_all_device(DeviceType::Android, "全量消息", MessageType::Message)?;

    // 两条消息都应被 worker 实际发出，且已完成签名
    for _ in 0..2 {
        let (url, params) = seen_rx.recv().await.expect("消息未被发送");
        assert!(url.starts_with("http://openapi.xg.qq.com/v2/"));
        assert!(params.contains_key("access_id"));
        assert!(params.contains_key("timestamp"));
        assert_eq!(params.get("sign").map(String::len), Some(32));
    }

    // 同步路径：立即拿到类型化结果
    let num = client.get_app_device_num(DeviceType::Android).await?;
    assert_eq!(num, 7);

    client.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_develop_environment_on_ios_only() -> Result<()> {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let client = XgPush::with_transport(&make_config(), Arc::new(FakeTransport { seen: seen_tx }))?;

    client.push_notification_to_single_device(DeviceType::Ios, "token-ios", "a")?;
    let (_, params) = seen_rx.recv().await.expect("消息未被发送");
    assert_eq!(params.get("environment").map(String::as_str), Some("2"));

    client.push_notification_to_single_device(DeviceType::Android, "token-android", "b")?;
    let (_, params) = seen_rx.recv().await.expect("消息未被发送");
    assert!(!params.contains_key("environment"));

    client.shutdown().await;
    Ok(())
}
