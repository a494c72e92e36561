/// # Summary
/// 为进程安装 rustls 的 ring 加密后端。
///
/// # Logic
/// HTTP 客户端使用 `rustls-no-provider`，构建前必须存在进程级 CryptoProvider。
/// 重复调用是安全的，已安装时直接忽略。
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        tracing::trace!("rustls crypto provider already installed");
    }
}
