//! 客户端门面
//!
//! `XgPush` 聚合凭证、传输层与派发器，对外提供两类操作：
//!
//! - **异步推送**：组装参数后入队即返回，由 worker 池在后台完成
//!   签名与发送；投递结果不反馈给调用方（至多一次、无回执）。
//! - **同步调用**：查询设备数、按标签推送这类需要立即拿到结果的接口，
//!   绕过队列在当前任务内完成一次「签名 → POST → 解码 → 取值」往返，
//!   任一步失败立即短路返回，不重试。

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::XgPushConfig;
use crate::dispatcher::Dispatcher;
use crate::error::XgPushError;
use crate::protocol::{
    BATCH_DEL_TAGS_METHOD, BATCH_SET_TAGS_METHOD, DeviceType, GET_APP_DEVICE_NUM_METHOD,
    MessageType, PUSH_ACCOUNT_LIST_METHOD, PUSH_ALL_DEVICE_METHOD, PUSH_SINGLE_ACCOUNT_METHOD,
    PUSH_SINGLE_DEVICE_METHOD, PUSH_TAGS_METHOD, PushEnvelope, PushMessage, TagOperation,
    V2_BASE_URL_WITH_SCHEMA, decode_envelope,
};
use crate::sign::Credentials;
use crate::transport::{PushTransport, ReqwestTransport};

/// 信鸽推送客户端
pub struct XgPush {
    credentials: Arc<Credentials>,
    transport: Arc<dyn PushTransport>,
    dispatcher: Dispatcher,
}

impl XgPush {
    /// 以默认的 reqwest 传输层构造客户端
    ///
    /// 需在 tokio 运行时内调用（内部会启动 worker 任务）。
    pub fn new(config: &XgPushConfig) -> Result<Self, XgPushError> {
        let transport: Arc<dyn PushTransport> = Arc::new(ReqwestTransport::new(
            Duration::from_secs(config.timeout_seconds),
        )?);
        Self::with_transport(config, transport)
    }

    /// 以注入的传输层构造客户端，测试时传入 mock 即可脱离真实网络
    pub fn with_transport(
        config: &XgPushConfig,
        transport: Arc<dyn PushTransport>,
    ) -> Result<Self, XgPushError> {
        config.validate()?;
        let credentials = Arc::new(Credentials::from_config(config));
        let dispatcher = Dispatcher::start(
            config.connections,
            config.queue_size,
            Arc::clone(&credentials),
            Arc::clone(&transport),
        );
        Ok(Self {
            credentials,
            transport,
            dispatcher,
        })
    }

    /// 关闭客户端：停止 worker 池并等待退出
    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }

    // -----------------------------------------------------------------------
    // 异步推送（入队即返回）
    // -----------------------------------------------------------------------

    /// 消息入队
    ///
    /// 队列满时快速失败返回 [`XgPushError::QueueFull`]。入队成功即返回，
    /// 后续发送失败只记录日志，不会以任何方式通知调用方。
    pub fn enqueue(&self, msg: PushMessage) -> Result<(), XgPushError> {
        self.dispatcher.enqueue(msg)
    }

    /// 推送到单个账号
    pub fn push_to_single_account(
        &self,
        device_type: DeviceType,
        account: &str,
        message: &str,
        message_type: MessageType,
    ) -> Result<(), XgPushError> {
        let mut params = BTreeMap::new();
        params.insert("account".to_string(), account.to_string());
        params.insert("message".to_string(), message.to_string());
        params.insert(
            "message_type".to_string(),
            message_type.as_str().to_string(),
        );
        self.enqueue(PushMessage {
            method: PUSH_SINGLE_ACCOUNT_METHOD,
            params,
            device_type,
        })
    }

    /// 推送通知栏消息到单个账号
    pub fn push_notification_to_single_account(
        &self,
        device_type: DeviceType,
        account: &str,
        message: &str,
    ) -> Result<(), XgPushError> {
        self.push_to_single_account(device_type, account, message, MessageType::Notification)
    }

    /// 推送到单个设备
    pub fn push_to_single_device(
        &self,
        device_type: DeviceType,
        device_token: &str,
        message: &str,
        message_type: MessageType,
    ) -> Result<(), XgPushError> {
        let mut params = BTreeMap::new();
        params.insert("device_token".to_string(), device_token.to_string());
        params.insert("message".to_string(), message.to_string());
        params.insert(
            "message_type".to_string(),
            message_type.as_str().to_string(),
        );
        self.enqueue(PushMessage {
            method: PUSH_SINGLE_DEVICE_METHOD,
            params,
            device_type,
        })
    }

    /// 推送通知栏消息到单个设备
    pub fn push_notification_to_single_device(
        &self,
        device_type: DeviceType,
        device_token: &str,
        message: &str,
    ) -> Result<(), XgPushError> {
        self.push_to_single_device(device_type, device_token, message, MessageType::Notification)
    }

    /// 推送到账号列表（列表 JSON 编码进 `account_list` 字段）
    pub fn push_to_account_list(
        &self,
        device_type: DeviceType,
        accounts: &[&str],
        message: &str,
        message_type: MessageType,
    ) -> Result<(), XgPushError> {
        let mut params = BTreeMap::new();
        params.insert("account_list".to_string(), to_json_param(&accounts)?);
        params.insert("message".to_string(), message.to_string());
        params.insert(
            "message_type".to_string(),
            message_type.as_str().to_string(),
        );
        self.enqueue(PushMessage {
            method: PUSH_ACCOUNT_LIST_METHOD,
            params,
            device_type,
        })
    }

    /// 推送通知栏消息到账号列表
    pub fn push_notification_to_account_list(
        &self,
        device_type: DeviceType,
        accounts: &[&str],
        message: &str,
    ) -> Result<(), XgPushError> {
        self.push_to_account_list(device_type, accounts, message, MessageType::Notification)
    }

    /// 推送到全量设备
    pub fn push_to_all_device(
        &self,
        device_type: DeviceType,
        message: &str,
        message_type: MessageType,
    ) -> Result<(), XgPushError> {
        let mut params = BTreeMap::new();
        params.insert("message".to_string(), message.to_string());
        params.insert(
            "message_type".to_string(),
            message_type.as_str().to_string(),
        );
        self.enqueue(PushMessage {
            method: PUSH_ALL_DEVICE_METHOD,
            params,
            device_type,
        })
    }

    /// 推送通知栏消息到全量设备
    pub fn push_notification_to_all_device(
        &self,
        device_type: DeviceType,
        message: &str,
    ) -> Result<(), XgPushError> {
        self.push_to_all_device(device_type, message, MessageType::Notification)
    }

    /// 推送到全量设备并循环展示
    pub fn push_to_all_device_with_loop(
        &self,
        device_type: DeviceType,
        message: &str,
        message_type: MessageType,
        loop_times: u32,
        loop_interval: u32,
    ) -> Result<(), XgPushError> {
        let mut params = BTreeMap::new();
        params.insert("message".to_string(), message.to_string());
        params.insert(
            "message_type".to_string(),
            message_type.as_str().to_string(),
        );
        params.insert("loop_times".to_string(), loop_times.to_string());
        params.insert("loop_interval".to_string(), loop_interval.to_string());
        self.enqueue(PushMessage {
            method: PUSH_ALL_DEVICE_METHOD,
            params,
            device_type,
        })
    }

    /// 推送通知栏消息到全量设备并循环展示
    pub fn push_notification_to_all_device_with_loop(
        &self,
        device_type: DeviceType,
        message: &str,
        loop_times: u32,
        loop_interval: u32,
    ) -> Result<(), XgPushError> {
        self.push_to_all_device_with_loop(
            device_type,
            message,
            MessageType::Notification,
            loop_times,
            loop_interval,
        )
    }

    /// 批量设置标签（`(tag, device_token)` 对列表 JSON 编码进 `tag_token_list`）
    pub fn batch_set_tags(
        &self,
        device_type: DeviceType,
        tag_tokens: &[(&str, &str)],
    ) -> Result<(), XgPushError> {
        self.batch_tags(BATCH_SET_TAGS_METHOD, device_type, tag_tokens)
    }

    /// 批量删除标签
    pub fn batch_del_tags(
        &self,
        device_type: DeviceType,
        tag_tokens: &[(&str, &str)],
    ) -> Result<(), XgPushError> {
        self.batch_tags(BATCH_DEL_TAGS_METHOD, device_type, tag_tokens)
    }

    fn batch_tags(
        &self,
        method: &'static str,
        device_type: DeviceType,
        tag_tokens: &[(&str, &str)],
    ) -> Result<(), XgPushError> {
        let mut params = BTreeMap::new();
        params.insert("tag_token_list".to_string(), to_json_param(&tag_tokens)?);
        self.enqueue(PushMessage {
            method,
            params,
            device_type,
        })
    }

    // -----------------------------------------------------------------------
    // 同步调用（需要立即拿到结果，绕过队列）
    // -----------------------------------------------------------------------

    /// 查询指定平台的注册设备数
    pub async fn get_app_device_num(&self, device_type: DeviceType) -> Result<u64, XgPushError> {
        let envelope = self
            .call(GET_APP_DEVICE_NUM_METHOD, device_type, BTreeMap::new())
            .await?;
        envelope.device_num()
    }

    /// 查询两个平台的注册设备数之和，任一查询失败立即返回该错误
    pub async fn get_app_device_num_total(&self) -> Result<u64, XgPushError> {
        let ios = self.get_app_device_num(DeviceType::Ios).await?;
        let android = self.get_app_device_num(DeviceType::Android).await?;
        Ok(ios + android)
    }

    /// 按标签推送，返回本次推送任务的 push_id
    ///
    /// 标签列表 JSON 编码进 `tags_list`；仅一个标签时 `tags_op` 固定为 OR
    /// （接口约定，单标签下 AND 无意义）。
    pub async fn push_to_tags(
        &self,
        device_type: DeviceType,
        message_type: MessageType,
        message: &str,
        tags: &[&str],
        tag_op: TagOperation,
    ) -> Result<String, XgPushError> {
        let mut params = BTreeMap::new();
        params.insert("message".to_string(), message.to_string());
        params.insert(
            "message_type".to_string(),
            message_type.as_str().to_string(),
        );
        params.insert("tags_list".to_string(), to_json_param(&tags)?);
        let op = if tags.len() == 1 {
            TagOperation::Or
        } else {
            tag_op
        };
        params.insert("tags_op".to_string(), op.as_str().to_string());

        let envelope = self.call(PUSH_TAGS_METHOD, device_type, params).await?;
        envelope.push_id()
    }

    /// 同步路径的单次往返：签名 → POST → 信封解码
    async fn call(
        &self,
        method: &'static str,
        device_type: DeviceType,
        mut params: BTreeMap<String, String>,
    ) -> Result<PushEnvelope, XgPushError> {
        self.credentials.sign(method, device_type, &mut params);
        let url = format!("{V2_BASE_URL_WITH_SCHEMA}{method}");
        let body = self.transport.post_form(&url, &params).await?;
        decode_envelope(&body)
    }
}

/// 列表类参数统一 JSON 编码为字符串字段
fn to_json_param<T: Serialize>(value: &T) -> Result<String, XgPushError> {
    Ok(serde_json::to_string(value)?)
}
