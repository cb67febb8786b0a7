//! 时长字符串解析
//!
//! 支持 `250ms`、`5s`、`1m`、`1h` 及其组合（如 `1m30s`），
//! 以及ISO-8601格式（如 `PT5S`）

use crate::error::ConfigError;
use regex::Regex;
use std::time::Duration;

/// 解析时长字符串
///
/// # 参数
/// * `input` - 时长字符串
///
/// # 返回
/// * `Result<Duration, ConfigError>` - 解析结果
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ConfigError::ParseError("时长不能为空".to_string()));
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }
    if input.starts_with('P') || input.starts_with('p') {
        return parse_iso8601(input);
    }

    let whole = Regex::new(r"^(?:\d+(?:\.\d+)?(?:ns|us|µs|ms|s|m|h))+$")
        .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {e}")))?;
    if !whole.is_match(input) {
        return Err(ConfigError::ParseError(format!(
            "无效的时长: {input}，示例: 250ms, 5s, 1m30s, PT5S"
        )));
    }

    let part = Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|s|m|h)")
        .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {e}")))?;

    let mut total_nanos: u128 = 0;
    for captures in part.captures_iter(input) {
        let unit_nanos = match &captures[2] {
            "ns" => 1,
            "us" | "µs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            _ => 3600 * NANOS_PER_SEC,
        };
        let nanos = scaled_nanos(&captures[1], unit_nanos, input)?;
        total_nanos = checked_total(total_nanos, nanos, input)?;
    }

    nanos_to_duration(total_nanos, input)
}

const NANOS_PER_MICRO: u128 = 1000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// 解析ISO-8601时长（仅支持天及以下的单位）
fn parse_iso8601(input: &str) -> Result<Duration, ConfigError> {
    let pattern = Regex::new(
        r"^[Pp](?:(\d+)[Dd])?(?:[Tt](?:(\d+)[Hh])?(?:(\d+)[Mm])?(?:(\d+(?:\.\d+)?)[Ss])?)?$",
    )
    .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {e}")))?;

    let captures = pattern.captures(input).ok_or_else(|| {
        ConfigError::ParseError(format!("无效的ISO-8601时长: {input}"))
    })?;

    let units = [
        86_400 * NANOS_PER_SEC,
        3600 * NANOS_PER_SEC,
        60 * NANOS_PER_SEC,
        NANOS_PER_SEC,
    ];
    let mut total_nanos: u128 = 0;
    let mut matched = false;
    for (index, unit_nanos) in units.iter().enumerate() {
        if let Some(value) = captures.get(index + 1) {
            let nanos = scaled_nanos(value.as_str(), *unit_nanos, input)?;
            total_nanos = checked_total(total_nanos, nanos, input)?;
            matched = true;
        }
    }

    if !matched {
        return Err(ConfigError::ParseError(format!(
            "无效的ISO-8601时长: {input}"
        )));
    }

    nanos_to_duration(total_nanos, input)
}

/// 将十进制数值按单位换算为纳秒，小数部分按整数运算避免精度损失
fn scaled_nanos(value: &str, unit_nanos: u128, input: &str) -> Result<u128, ConfigError> {
    let invalid = || ConfigError::ParseError(format!("无效的时长数值: {input}"));
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));

    let whole: u128 = whole.parse().map_err(|_| invalid())?;
    let mut nanos = whole.checked_mul(unit_nanos).ok_or_else(invalid)?;

    if !fraction.is_empty() {
        // 超出纳秒精度的位数没有意义
        let digits = &fraction[..fraction.len().min(18)];
        let numerator: u128 = digits.parse().map_err(|_| invalid())?;
        let denominator = 10u128.pow(digits.len() as u32);
        let fraction_nanos = numerator.checked_mul(unit_nanos).ok_or_else(invalid)? / denominator;
        nanos = nanos.checked_add(fraction_nanos).ok_or_else(invalid)?;
    }

    Ok(nanos)
}

/// 累加各段纳秒数，溢出时返回解析错误
fn checked_total(total: u128, nanos: u128, input: &str) -> Result<u128, ConfigError> {
    total
        .checked_add(nanos)
        .ok_or_else(|| ConfigError::ParseError(format!("时长超出范围: {input}")))
}

fn nanos_to_duration(nanos: u128, input: &str) -> Result<Duration, ConfigError> {
    let secs = u64::try_from(nanos / NANOS_PER_SEC)
        .map_err(|_| ConfigError::ParseError(format!("时长超出范围: {input}")))?;
    Ok(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}

/// 将时长格式化为可被 `parse_duration` 解析的字符串
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        "0s".to_string()
    } else if nanos % 1_000_000_000 == 0 {
        format!("{}s", duration.as_secs())
    } else if nanos % 1_000_000 == 0 {
        format!("{}ms", duration.as_millis())
    } else if nanos % 1000 == 0 {
        format!("{}us", duration.as_micros())
    } else {
        format!("{nanos}ns")
    }
}

/// 时长字符串的serde模块
pub mod serde_str {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1500us").unwrap(), Duration::from_micros(1500));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_duration("1s500ms").unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn test_parse_iso8601() {
        assert_eq!(parse_duration("PT5S").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("PT1M30S").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("PT0.5S").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("P1D").unwrap(), Duration::from_secs(86_400));
        assert!(parse_duration("PT").is_err());
        assert!(parse_duration("P").is_err());
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5").is_err());
        assert!(parse_duration("five seconds").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("5x").is_err());
    }

    #[test]
    fn test_parse_overflowing_sum_is_error() {
        // 单段恰好是 u128::MAX 纳秒，两段相加溢出
        let max = u128::MAX.to_string();
        let input = format!("{max}ns{max}ns");
        assert!(matches!(
            parse_duration(&input),
            Err(ConfigError::ParseError(_))
        ));

        let input = format!(
            "P{}DT{}H",
            u128::MAX / (86_400 * NANOS_PER_SEC),
            u128::MAX / (3600 * NANOS_PER_SEC)
        );
        assert!(matches!(
            parse_duration(&input),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0s");
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1500us");
    }

    #[test]
    fn test_format_parse_round_trip() {
        for duration in [
            Duration::from_secs(90),
            Duration::from_millis(1234),
            Duration::from_nanos(42),
        ] {
            assert_eq!(parse_duration(&format_duration(duration)).unwrap(), duration);
        }
    }
}
