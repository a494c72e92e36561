use config::{Config, ConfigError, Environment, File, Map};
use kabu_core::config::{AppConfig, LogConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// 可选的配置文件 (不含扩展名，支持 toml / json / yaml)
pub const CONFIG_FILE: &str = "kabu";

/// 环境变量前缀，如 `KABU__SERVER__PORT=9000`
const ENV_PREFIX: &str = "KABU";

/// 直接覆盖 `llm.*` 的通用环境变量
const LLM_OVERRIDES: [(&str, &str); 3] = [
    ("OPENAI_API_KEY", "llm.api_key"),
    ("OPENAI_API_BASE", "llm.api_base"),
    ("MODEL_NAME", "llm.model"),
];

/// # Summary
/// 按优先级叠加各配置来源并反序列化为 `AppConfig`。
///
/// # Logic
/// 1. 代码内默认值 (`AppConfig` 的 `serde(default)`)。
/// 2. 可选的配置文件 `file`，不存在时跳过。
/// 3. `KABU__` 前缀的环境变量，`__` 分隔层级。
/// 4. `OPENAI_API_KEY` / `OPENAI_API_BASE` / `MODEL_NAME`，空值视为未设置。
///
/// # Arguments
/// * `file`: 配置文件路径。
/// * `vars`: 替代进程环境变量的键值表，为 `None` 时读取进程环境。
pub fn load_config(file: &str, vars: Option<Map<String, String>>) -> Result<AppConfig, ConfigError> {
    let lookup = |name: &str| -> Option<String> {
        let value = match &vars {
            Some(vars) => vars.get(name).cloned(),
            None => std::env::var(name).ok(),
        };
        value.filter(|v| !v.trim().is_empty())
    };

    let mut builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .source(vars.clone()),
        );
    for (var, key) in LLM_OVERRIDES {
        builder = builder.set_override_option(key, lookup(var))?;
    }

    builder.build()?.try_deserialize()
}

/// # Summary
/// 初始化全局日志：标准输出，外加可选的按天滚动文件。
///
/// # Logic
/// `RUST_LOG` 优先，否则使用 `log.filter`。
///
/// # Returns
/// 文件日志的后台写入守卫，需持有到进程退出。
pub fn init_tracing(log: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));

    let (file_layer, guard) = match &log.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "kabu.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
    guard
}
