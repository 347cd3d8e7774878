//! 异步派发引擎
//!
//! 固定数量的长驻 worker 共享一条有界 FIFO 队列：取出消息后依次完成
//! 签名、表单编码 POST、信封解码。任何一步失败仅记录日志后继续取下一条，
//! 不重试、不回队、不向入队方反馈 —— 这是「至多一次、无回执」的既定投递
//! 契约，而非缺陷。队列保证每条消息恰好被一个 worker 取走（不丢失、不
//! 重复），出队顺序即入队顺序；各 worker 并行发送，完成顺序不作保证。

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::XgPushError;
use crate::protocol::{PushMessage, V2_BASE_URL_WITH_SCHEMA, decode_envelope};
use crate::sign::Credentials;
use crate::transport::PushTransport;

/// 派发器：有界队列 + 固定 worker 池
pub struct Dispatcher {
    tx: mpsc::Sender<PushMessage>,
    shutdown_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// 创建队列并启动 `connections` 个 worker
    ///
    /// 队列容量取 `queue_size`（为 0 时按 1 处理，tokio 有界通道不支持
    /// 零容量）。凭证与传输层均为构造后只读，经 `Arc` 共享给所有 worker。
    pub fn start(
        connections: usize,
        queue_size: usize,
        credentials: Arc<Credentials>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let workers = (0..connections)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&rx),
                    shutdown_rx.clone(),
                    Arc::clone(&credentials),
                    Arc::clone(&transport),
                ))
            })
            .collect();

        Self {
            tx,
            shutdown_tx,
            workers,
        }
    }

    /// 消息入队
    ///
    /// 队列满时快速失败返回 [`XgPushError::QueueFull`]，不阻塞调用方；
    /// 入队成功后投递结果不再反馈（见模块文档）。
    pub fn enqueue(&self, msg: PushMessage) -> Result<(), XgPushError> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => XgPushError::QueueFull,
            TrySendError::Closed(_) => XgPushError::QueueClosed,
        })
    }

    /// 发出关闭信号并等待所有 worker 退出
    ///
    /// 正在发送中的消息会自然完成；尚在队列中的消息随队列一起丢弃。
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.workers {
            let _ = handle.await;
        }
        info!("派发器已关闭");
    }
}

/// worker 主循环
///
/// 以 `tokio::select!` 同时等待队列与关闭信号：队列为空时挂起，
/// 关闭信号置位（或信号源消失）时退出。多个 worker 通过互斥锁
/// 轮流持有接收端，保证每条消息只被取走一次。
async fn worker_loop(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<PushMessage>>>,
    mut shutdown: watch::Receiver<bool>,
    credentials: Arc<Credentials>,
    transport: Arc<dyn PushTransport>,
) {
    info!(worker_id, "推送 worker 已启动");
    loop {
        let msg = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }

                msg = rx.recv() => msg,
            }
        };

        let Some(mut msg) = msg else {
            // 发送端全部关闭，队列不会再有新消息
            break;
        };

        if let Err(e) = deliver(&credentials, transport.as_ref(), &mut msg).await {
            error!(
                worker_id,
                method = msg.method,
                error = %e,
                "推送消息发送失败，已丢弃"
            );
        }
    }
    info!(worker_id, "推送 worker 已退出");
}

/// 单条消息的完整发送流程：签名 → POST → 信封校验
async fn deliver(
    credentials: &Credentials,
    transport: &dyn PushTransport,
    msg: &mut PushMessage,
) -> Result<(), XgPushError> {
    credentials.sign(msg.method, msg.device_type, &mut msg.params);

    let url = format!("{V2_BASE_URL_WITH_SCHEMA}{}", msg.method);
    let body = transport.post_form(&url, &msg.params).await?;
    decode_envelope(&body)?;

    debug!(method = msg.method, "推送消息已送达");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use crate::config::XgPushConfig;
    use crate::protocol::{DeviceType, PUSH_ALL_DEVICE_METHOD};

    fn make_test_credentials() -> Arc<Credentials> {
        let config = XgPushConfig {
            ios_access_id: "100".to_string(),
            ios_secret_key: "ios-secret".to_string(),
            android_access_id: "200".to_string(),
            android_secret_key: "android-secret".to_string(),
            ..Default::default()
        };
        Arc::new(Credentials::from_config(&config))
    }

    fn make_test_message(tag: &str) -> PushMessage {
        let mut params = BTreeMap::new();
        params.insert("message".to_string(), tag.to_string());
        params.insert("message_type".to_string(), "1".to_string());
        PushMessage {
            method: PUSH_ALL_DEVICE_METHOD,
            params,
            device_type: DeviceType::Android,
        }
    }

    /// 把每次请求的 message 参数按处理顺序回传给测试端
    struct RecordingTransport {
        seen: mpsc::UnboundedSender<String>,
        /// 每次调用依次弹出一个预置响应体，弹尽后返回成功信封
        responses: std::sync::Mutex<Vec<Vec<u8>>>,
    }

    impl RecordingTransport {
        fn new(seen: mpsc::UnboundedSender<String>) -> Self {
            Self {
                seen,
                responses: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn with_responses(seen: mpsc::UnboundedSender<String>, responses: Vec<Vec<u8>>) -> Self {
            Self {
                seen,
                responses: std::sync::Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl PushTransport for RecordingTransport {
        async fn post_form(
            &self,
            _url: &str,
            params: &BTreeMap<String, String>,
        ) -> Result<Vec<u8>, XgPushError> {
            let message = params.get("message").cloned().unwrap_or_default();
            self.seen.send(message).expect("测试通道已关闭");

            let mut responses = self.responses.lock().expect("锁被毒化");
            if responses.is_empty() {
                Ok(br#"{"ret_code":0,"err_msg":""}"#.to_vec())
            } else {
                Ok(responses.remove(0))
            }
        }
    }

    /// 单 worker 时出队顺序即入队顺序
    #[tokio::test]
    async fn test_single_worker_fifo_order() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RecordingTransport::new(seen_tx));
        let dispatcher = Dispatcher::start(1, 8, make_test_credentials(), transport);

        dispatcher.enqueue(make_test_message("m1")).unwrap();
        dispatcher.enqueue(make_test_message("m2")).unwrap();
        dispatcher.enqueue(make_test_message("m3")).unwrap();

        assert_eq!(seen_rx.recv().await.unwrap(), "m1");
        assert_eq!(seen_rx.recv().await.unwrap(), "m2");
        assert_eq!(seen_rx.recv().await.unwrap(), "m3");

        dispatcher.shutdown().await;
    }

    /// 服务端返回非零 ret_code 不会中断 worker，后续消息照常处理
    #[tokio::test]
    async fn test_fire_and_forget_on_remote_error() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RecordingTransport::with_responses(
            seen_tx,
            vec![br#"{"ret_code":14,"err_msg":"invalid sign"}"#.to_vec()],
        ));
        let dispatcher = Dispatcher::start(1, 8, make_test_credentials(), transport);

        dispatcher.enqueue(make_test_message("failing")).unwrap();
        dispatcher.enqueue(make_test_message("next")).unwrap();

        assert_eq!(seen_rx.recv().await.unwrap(), "failing");
        assert_eq!(seen_rx.recv().await.unwrap(), "next");

        dispatcher.shutdown().await;
    }

    /// 响应体不是合法 JSON 时同样只丢弃当前消息
    #[tokio::test]
    async fn test_fire_and_forget_on_malformed_body() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RecordingTransport::with_responses(
            seen_tx,
            vec![b"<html>502</html>".to_vec()],
        ));
        let dispatcher = Dispatcher::start(1, 8, make_test_credentials(), transport);

        dispatcher.enqueue(make_test_message("bad-body")).unwrap();
        dispatcher.enqueue(make_test_message("after")).unwrap();

        assert_eq!(seen_rx.recv().await.unwrap(), "bad-body");
        assert_eq!(seen_rx.recv().await.unwrap(), "after");

        dispatcher.shutdown().await;
    }

    /// 首次调用前先通知测试端，然后永久挂起，用于占住唯一的 worker
    struct StallingTransport {
        started: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl PushTransport for StallingTransport {
        async fn post_form(
            &self,
            _url: &str,
            _params: &BTreeMap<String, String>,
        ) -> Result<Vec<u8>, XgPushError> {
            self.started.send(()).expect("测试通道已关闭");
            futures::future::pending::<Result<Vec<u8>, XgPushError>>().await
        }
    }

    /// 队列满时入队快速失败
    #[tokio::test]
    async fn test_enqueue_fails_fast_when_queue_full() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(StallingTransport {
            started: started_tx,
        });
        // 容量 1 的队列 + 1 个被占住的 worker
        let dispatcher = Dispatcher::start(1, 1, make_test_credentials(), transport);

        dispatcher.enqueue(make_test_message("in-flight")).unwrap();
        // 等 worker 确实取走第一条，保证队列此刻为空
        started_rx.recv().await.unwrap();

        dispatcher.enqueue(make_test_message("queued")).unwrap();
        let err = dispatcher.enqueue(make_test_message("rejected")).unwrap_err();
        assert!(matches!(err, XgPushError::QueueFull));
    }

    /// 关闭信号使空闲 worker 退出，之后入队返回 QueueClosed
    #[tokio::test]
    async fn test_shutdown_stops_idle_workers() {
        let (seen_tx, _seen_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RecordingTransport::new(seen_tx));
        let dispatcher = Dispatcher::start(2, 8, make_test_credentials(), transport);

        let tx = dispatcher.tx.clone();
        dispatcher.shutdown().await;

        let err = tx
            .try_send(make_test_message("late"))
            .map_err(|e| match e {
                TrySendError::Full(_) => XgPushError::QueueFull,
                TrySendError::Closed(_) => XgPushError::QueueClosed,
            })
            .unwrap_err();
        assert!(matches!(err, XgPushError::QueueClosed));
    }
}
