use crate::market::error::MarketError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// 代码允许的最大长度 (含交易所后缀，如 `BRK-B`、`0700.HK`)
const MAX_TICKER_LEN: usize = 15;

/// # Summary
/// 证券代码，系统中所有缓存键、请求与提示词的身份标识。
///
/// # Invariants
/// - 已去除首尾空白并统一转换为大写。
/// - 长度不超过 15，仅包含 ASCII 字母数字及 `.` `-` `^` `=`，且至少有一个字母或数字。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// # Summary
    /// 解析并规范化用户输入的证券代码。
    ///
    /// # Logic
    /// 1. 去除首尾空白并转为大写。
    /// 2. 校验长度与字符集，且至少包含一个字母或数字。
    ///
    /// # Arguments
    /// * `raw`: 原始输入，如 `" aapl "`。
    ///
    /// # Returns
    /// 合法则返回 `Ticker`，否则返回 `MarketError::InvalidTicker`。
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let symbol = raw.trim().to_ascii_uppercase();
        let valid_chars = symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));

        let has_alnum = symbol.chars().any(|c| c.is_ascii_alphanumeric());

        if symbol.len() > MAX_TICKER_LEN || !valid_chars || !has_alnum {
            return Err(MarketError::InvalidTicker(raw.trim().to_string()));
        }
        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

/// # Summary
/// K 线采样周期，取值集合固定，与行情源的 interval 参数一一对应。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum Interval {
    // 1分钟
    #[serde(rename = "1m")]
    Minute1,
    // 5分钟
    #[serde(rename = "5m")]
    Minute5,
    // 15分钟
    #[serde(rename = "15m")]
    Minute15,
    // 1小时
    #[serde(rename = "1h")]
    Hour1,
    // 1日
    #[default]
    #[serde(rename = "1d")]
    Day1,
    // 5日
    #[serde(rename = "5d")]
    Day5,
    // 1周
    #[serde(rename = "1wk")]
    Week1,
    // 1月
    #[serde(rename = "1mo")]
    Month1,
    // 3月
    #[serde(rename = "3mo")]
    Month3,
}

impl Interval {
    /// 全部可选周期，按粒度从细到粗排列
    pub const ALL: [Interval; 9] = [
        Interval::Minute1,
        Interval::Minute5,
        Interval::Minute15,
        Interval::Hour1,
        Interval::Day1,
        Interval::Day5,
        Interval::Week1,
        Interval::Month1,
        Interval::Month3,
    ];

    /// 对外展示及请求行情源时使用的代码
    pub fn code(self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
            Interval::Day5 => "5d",
            Interval::Week1 => "1wk",
            Interval::Month1 => "1mo",
            Interval::Month3 => "3mo",
        }
    }

    /// 是否为日内周期 (日内数据的时间戳需要保留到分钟)
    pub fn is_intraday(self) -> bool {
        matches!(
            self,
            Interval::Minute1 | Interval::Minute5 | Interval::Minute15 | Interval::Hour1
        )
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Interval::Minute1),
            "5m" => Ok(Interval::Minute5),
            "15m" => Ok(Interval::Minute15),
            "1h" | "60m" => Ok(Interval::Hour1),
            "1d" => Ok(Interval::Day1),
            "5d" => Ok(Interval::Day5),
            "1wk" => Ok(Interval::Week1),
            "1mo" => Ok(Interval::Month1),
            "3mo" => Ok(Interval::Month3),
            _ => Err(format!("Unknown Interval: {}", s)),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_normalization() {
        let ticker = Ticker::parse("  aapl ").unwrap();
        assert_eq!(ticker.as_str(), "AAPL");
        assert_eq!(Ticker::parse("brk-b").unwrap().as_str(), "BRK-B");
        assert_eq!(Ticker::parse("^gspc").unwrap().as_str(), "^GSPC");
    }

    #[test]
    fn test_ticker_rejects_garbage() {
        assert!(matches!(Ticker::parse(""), Err(MarketError::InvalidTicker(_))));
        assert!(matches!(Ticker::parse("   "), Err(MarketError::InvalidTicker(_))));
        assert!(Ticker::parse("AA PL").is_err());
        assert!(Ticker::parse("AAPL/../x").is_err());
        assert!(Ticker::parse("ABCDEFGHIJKLMNOP").is_err());
    }

    #[test]
    fn test_ticker_needs_letter_or_digit() {
        for raw in ["..", "-", "^=", " .^ "] {
            assert!(
                matches!(Ticker::parse(raw), Err(MarketError::InvalidTicker(_))),
                "{raw:?} should be rejected"
            );
        }
        assert_eq!(Ticker::parse("eurusd=x").unwrap().as_str(), "EURUSD=X");
    }

    #[test]
    fn test_ticker_serde_normalizes() {
        let ticker: Ticker = serde_json::from_str("\"msft\"").unwrap();
        assert_eq!(ticker.as_str(), "MSFT");
        assert!(serde_json::from_str::<Ticker>("\"\"").is_err());
    }

    #[test]
    fn test_interval_codes() {
        for interval in Interval::ALL {
            let parsed: Interval = interval.code().parse().unwrap();
            assert_eq!(parsed, interval);
        }
        assert_eq!("60m".parse::<Interval>().unwrap(), Interval::Hour1);
        assert_eq!(serde_json::to_string(&Interval::Week1).unwrap(), "\"1wk\"");
        assert!("2d".parse::<Interval>().is_err());
        assert!(Interval::Minute15.is_intraday());
        assert!(!Interval::Day5.is_intraday());
    }
}
