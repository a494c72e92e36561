use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub market: MarketConfig,
    pub llm: LlmConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 行情源配置 (无需密钥)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    /// 下发会话 Cookie 的地址，quoteSummary 的 crumb 依赖该 Cookie
    pub cookie_url: String,
    pub timeout_secs: u64,
}

/// 大模型补全接口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// 缺失时启动不受影响，补全调用返回 `Error: ...` 文本
    pub api_key: Option<String>,
    /// 完整的补全接口地址，请求直接 POST 到该地址
    pub api_base: String,
    pub model: String,
    /// 承载 API Key 的请求头名称
    pub api_key_header: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 会话空闲超过该时长后被回收
    pub idle_timeout_secs: u64,
    /// 空闲回收的巡检间隔
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// 默认过滤规则，`RUST_LOG` 优先
    pub filter: String,
    /// 若设置则额外按天滚动写入该目录
    pub dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            cookie_url: "https://fc.yahoo.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            api_key_header: "api-key".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            dir: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
