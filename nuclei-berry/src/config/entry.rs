//! 声明式变换条目的解析.
//!
//! 一个条目可以是:
//!
//! 1. 裸字符串 `"random_flip"`: 使用默认参数;
//! 2. 单键映射 `{"random_flip": {"probability": 0.3}}`: 关键字参数;
//! 3. 单键映射 `{"random_flip": [0.3]}`: 按签名顺序的位置参数.
//!
//! 条目在配置加载阶段被解析为强类型记录, 之后的数据处理不再接触原始 JSON.

use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// 条目携带的原始参数.
#[derive(Copy, Clone, Debug)]
pub(crate) enum RawParams<'a> {
    /// 裸名称, 全部使用默认值.
    Default,
    /// 关键字参数.
    Keyword(&'a Map<String, Value>),
    /// 位置参数.
    Positional(&'a [Value]),
}

impl RawParams<'_> {
    /// 是否为裸名称.
    #[inline]
    pub(crate) fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

/// 将一个条目拆分为 (名称, 原始参数).
pub(crate) fn split_entry(entry: &Value) -> Result<(&str, RawParams<'_>), ConfigError> {
    match entry {
        Value::String(name) => Ok((name.as_str(), RawParams::Default)),
        Value::Object(map) => {
            let mut it = map.iter();
            let (Some((name, params)), None) = (it.next(), it.next()) else {
                return Err(ConfigError::MalformedEntry(entry.to_string()));
            };
            let raw = match params {
                Value::Object(kw) => RawParams::Keyword(kw),
                Value::Array(pos) => RawParams::Positional(pos.as_slice()),
                Value::Null => RawParams::Default,
                other => {
                    return Err(ConfigError::InvalidParams(
                        name.clone(),
                        format!("expected a mapping or a list, got `{other}`"),
                    ))
                }
            };
            Ok((name.as_str(), raw))
        }
        other => Err(ConfigError::MalformedEntry(other.to_string())),
    }
}

/// 一个形参: 规范名及其别名.
pub(crate) type Param = (&'static str, &'static [&'static str]);

/// 按签名对齐后的参数表.
#[derive(Debug)]
pub(crate) struct Params<'a> {
    transform: &'a str,
    values: BTreeMap<&'static str, &'a Value>,
}

impl<'a> Params<'a> {
    /// 将原始参数按签名 `signature` 对齐.
    ///
    /// 关键字参数中出现签名以外的键, 或位置参数多于签名长度时返回错误.
    pub(crate) fn resolve(
        transform: &'a str,
        raw: RawParams<'a>,
        signature: &[Param],
    ) -> Result<Self, ConfigError> {
        let mut values = BTreeMap::new();
        match raw {
            RawParams::Default => {}
            RawParams::Keyword(map) => {
                for (key, value) in map {
                    let Some((canonical, _)) = signature
                        .iter()
                        .find(|(name, aliases)| *name == key.as_str() || aliases.contains(&key.as_str()))
                    else {
                        return Err(ConfigError::InvalidParams(
                            transform.to_string(),
                            format!("unexpected keyword `{key}`"),
                        ));
                    };
                    values.insert(*canonical, value);
                }
            }
            RawParams::Positional(list) => {
                if list.len() > signature.len() {
                    return Err(ConfigError::InvalidParams(
                        transform.to_string(),
                        format!(
                            "expected at most {} positional parameters, got {}",
                            signature.len(),
                            list.len()
                        ),
                    ));
                }
                values.extend(signature.iter().map(|(name, _)| *name).zip(list.iter()));
            }
        }
        Ok(Self { transform, values })
    }

    fn invalid(&self, key: &str, want: &str) -> ConfigError {
        ConfigError::InvalidParams(
            self.transform.to_string(),
            format!("`{key}` must be {want}"),
        )
    }

    /// 取出非 `null` 的参数值.
    #[inline]
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.values.get(key).copied().filter(|v| !v.is_null())
    }

    /// 浮点参数, 缺省时为 `default`.
    pub(crate) fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.invalid(key, "a number")),
        }
    }

    /// 概率参数, 必须位于 `[0, 1]`.
    pub(crate) fn probability_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        let p = self.f64_or(key, default)?;
        if (0.0..=1.0).contains(&p) {
            Ok(p)
        } else {
            Err(self.invalid(key, "within [0, 1]"))
        }
    }

    /// 闭区间参数 `[lo, hi]`, 要求 `lo <= hi`.
    pub(crate) fn range_or(&self, key: &str, default: (f32, f32)) -> Result<(f32, f32), ConfigError> {
        let Some(v) = self.get(key) else {
            return Ok(default);
        };
        match v.as_array().map(Vec::as_slice) {
            Some([lo, hi]) => match (lo.as_f64(), hi.as_f64()) {
                (Some(lo), Some(hi)) if lo <= hi => Ok((lo as f32, hi as f32)),
                _ => Err(self.invalid(key, "a pair of numbers [lo, hi] with lo <= hi")),
            },
            _ => Err(self.invalid(key, "a pair of numbers [lo, hi]")),
        }
    }

    /// 布尔参数.
    pub(crate) fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.invalid(key, "a boolean")),
        }
    }

    /// 字符串参数, 可缺省.
    pub(crate) fn str_opt(&self, key: &str) -> Result<Option<&'a str>, ConfigError> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| self.invalid(key, "a string")),
        }
    }

    /// 要求参数必须为 `null` 或缺省.
    pub(crate) fn require_null(&self, key: &str) -> Result<(), ConfigError> {
        match self.get(key) {
            None => Ok(()),
            Some(_) => Err(self.invalid(key, "null")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SIG: &[Param] = &[("probability", &[]), ("range", &["value_range"])];

    #[test]
    fn test_split_entry_forms() {
        let bare = json!("random_flip");
        let (name, raw) = split_entry(&bare).unwrap();
        assert_eq!(name, "random_flip");
        assert!(raw.is_default());

        let kw = json!({"random_flip": {"probability": 0.1}});
        assert!(matches!(split_entry(&kw).unwrap().1, RawParams::Keyword(_)));

        let pos = json!({"random_flip": [0.1]});
        assert!(matches!(split_entry(&pos).unwrap().1, RawParams::Positional(_)));

        assert!(matches!(
            split_entry(&json!({"a": 1, "b": 2})),
            Err(ConfigError::MalformedEntry(_))
        ));
        assert!(matches!(
            split_entry(&json!({"a": 1})),
            Err(ConfigError::InvalidParams(..))
        ));
    }

    #[test]
    fn test_resolve_keyword_and_alias() {
        let kw = json!({"t": {"value_range": [1.0, 2.0]}});
        let (name, raw) = split_entry(&kw).unwrap();
        let params = Params::resolve(name, raw, SIG).unwrap();
        assert_eq!(params.range_or("range", (0.0, 0.0)).unwrap(), (1.0, 2.0));
        assert_eq!(params.f64_or("probability", 0.5).unwrap(), 0.5);
    }

    #[test]
    fn test_resolve_rejects_unknown_and_overlong() {
        let kw = json!({"t": {"nope": 1}});
        let (name, raw) = split_entry(&kw).unwrap();
        assert!(Params::resolve(name, raw, SIG).is_err());

        let pos = json!({"t": [0.1, [0, 1], 3]});
        let (name, raw) = split_entry(&pos).unwrap();
        assert!(Params::resolve(name, raw, SIG).is_err());
    }

    #[test]
    fn test_range_validation() {
        let pos = json!({"t": [0.1, [2.0, 1.0]]});
        let (name, raw) = split_entry(&pos).unwrap();
        let params = Params::resolve(name, raw, SIG).unwrap();
        assert!(params.range_or("range", (0.0, 0.0)).is_err());
        assert!(params.probability_or("probability", 0.5).is_ok());
    }
}
