//! 腾讯信鸽（XinGe）推送 v2 接口客户端
//!
//! 核心是两件事：与服务端约定的请求签名协议（MD5 规范串，见 [`sign`]），
//! 以及有界队列 + 固定 worker 池的异步派发引擎（见 [`dispatcher`]）。
//! 推送类接口走队列、发后不理；设备数查询与标签推送需要立即拿到结果，
//! 走同步路径（见 [`client`]）。
//!
//! 配置由宿主应用以编程方式提供（[`config::XgPushConfig`]），
//! 本库不读取配置文件或环境变量，也不做重试与持久化。

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod sign;
pub mod transport;

pub use client::XgPush;
pub use config::{PushEnvironment, XgPushConfig};
pub use error::XgPushError;
pub use protocol::{DeviceType, MessageType, PushMessage, TagOperation};
