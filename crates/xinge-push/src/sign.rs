//! 请求签名
//!
//! 签名生成规则（与服务端约定的线上协议，顺序与取舍不可更改）：
//! 1. 取请求方法字面值 `POST`；
//! 2. 取不含 scheme 的主机 + 版本前缀 + 接口路径，如
//!    `openapi.xg.qq.com/v2/push/single_device`；
//! 3. 将除 `sign` 外的所有参数格式化为 `k=v`（值不做 urlencode），
//!    按键的字节序升序排列后无分隔拼接，注意字典序中大写字母在前；
//! 4. 依次拼接方法、url、排序后的参数串、secret_key；
//! 5. 对拼接结果计算 MD5，取 32 位小写十六进制作为 `sign` 的值。
//!
//! 例：对 `push/single_device` 携带 access_id=123、timestamp=1386691200、
//! Param1=Value1、Param2=Value2，secret_key 为 abcde 时，待摘要串为
//! `POSTopenapi.xg.qq.com/v2/push/single_deviceParam1=Value1Param2=Value2access_id=123timestamp=1386691200abcde`，
//! MD5 为 `ccafecaef6be07493cfe75ebc43b7d53`。

use std::collections::BTreeMap;

use md5::{Digest, Md5};

use crate::config::{PushEnvironment, XgPushConfig};
use crate::protocol::{DeviceType, HTTP_METHOD, V2_BASE_URL};

/// `sign` 字段名，计算摘要时排除，计算完成后写回
const SIGN_KEY: &str = "sign";

/// 按设备类型划分的只读凭证
///
/// 构造后不再变更，可被所有 worker 并发只读共享，无需加锁。
#[derive(Debug, Clone)]
pub struct Credentials {
    ios_access_id: String,
    ios_secret_key: String,
    android_access_id: String,
    android_secret_key: String,
    environment: PushEnvironment,
}

impl Credentials {
    pub fn from_config(config: &XgPushConfig) -> Self {
        Self {
            ios_access_id: config.ios_access_id.clone(),
            ios_secret_key: config.ios_secret_key.clone(),
            android_access_id: config.android_access_id.clone(),
            android_secret_key: config.android_secret_key.clone(),
            environment: config.environment,
        }
    }

    /// 对参数集合原地签名
    ///
    /// 先按设备类型注入签名必需字段（iOS 注入 `environment` 与 `access_id`，
    /// Android 仅注入 `access_id`），`timestamp` 缺失时补当前 Unix 秒，
    /// 最后将摘要写入 `sign` 键。已存在的 `sign` 键不参与摘要并被覆盖。
    pub fn sign(
        &self,
        method: &str,
        device_type: DeviceType,
        params: &mut BTreeMap<String, String>,
    ) {
        let secret_key = match device_type {
            DeviceType::Ios => {
                params.insert(
                    "environment".to_string(),
                    self.environment.as_str().to_string(),
                );
                params.insert("access_id".to_string(), self.ios_access_id.clone());
                &self.ios_secret_key
            }
            DeviceType::Android => {
                params.insert("access_id".to_string(), self.android_access_id.clone());
                &self.android_secret_key
            }
        };

        if !params.contains_key("timestamp") {
            params.insert(
                "timestamp".to_string(),
                chrono::Utc::now().timestamp().to_string(),
            );
        }

        // BTreeMap 遍历顺序即键的字节序升序，无需额外排序
        let mut hasher = Md5::new();
        hasher.update(HTTP_METHOD);
        hasher.update(V2_BASE_URL);
        hasher.update(method);
        for (key, value) in params.iter() {
            if key == SIGN_KEY {
                continue;
            }
            hasher.update(key);
            hasher.update("=");
            hasher.update(value);
        }
        hasher.update(secret_key);

        params.insert(SIGN_KEY.to_string(), hex::encode(hasher.finalize()));
    }
}
