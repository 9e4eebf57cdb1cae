//! 唯一 question_key 生成 - 业务能力层
//!
//! LLM 给出的候选 key 可能和单元内已有题目冲突，这里负责在冲突时
//! 顺延数字后缀直到找到空位。存在性检查通过 `KeyLookup` 抽象注入，
//! 生产环境由 `QuestionStore` 实现，测试里用内存集合替代。

use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, BusinessError};

/// 顺延重试的上限，超过即放弃
const MAX_KEY_ATTEMPTS: usize = 1000;

/// 形如 "SQLJ01" 的 key：字母前缀 + 数字后缀
static KEY_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)(\d+)$").expect("key 后缀正则应当合法")
});

/// question_key 存在性检查
///
/// 只要求回答"这个 key 在这个单元里用过没有"
pub trait KeyLookup {
    #[allow(async_fn_in_trait)]
    async fn key_exists(&self, unit_id: &str, key: &str) -> AppResult<bool>;
}

/// 为候选 key 找一个单元内未占用的最终值
///
/// - 候选未被占用时原样返回
/// - 候选形如"字母前缀 + 数字后缀"时，保持前缀、数字逐次 +1 顺延
///   （保留原有的零填充宽度，至少两位）
/// - 否则在候选末尾追加两位数字后缀
/// - 顺延 [`MAX_KEY_ATTEMPTS`] 次仍然冲突时返回
///   `BusinessError::KeyGenerationExhausted`
pub async fn ensure_unique_key<L: KeyLookup>(
    lookup: &L,
    unit_id: &str,
    base_key: &str,
) -> AppResult<String> {
    if !lookup.key_exists(unit_id, base_key).await? {
        return Ok(base_key.to_string());
    }

    debug!("key {} 已被占用，开始顺延", base_key);

    let parsed = KEY_SUFFIX_RE.captures(base_key).and_then(|caps| {
        let prefix = caps.get(1)?.as_str();
        let digits = caps.get(2)?.as_str();
        let num: usize = digits.parse().ok()?;
        Some((prefix, num, digits.len().max(2)))
    });

    for attempt in 1..=MAX_KEY_ATTEMPTS {
        let candidate = match parsed {
            Some((prefix, num, width)) => {
                format!("{}{:0width$}", prefix, num + attempt, width = width)
            }
            None => format!("{}{:02}", base_key, attempt),
        };

        if !lookup.key_exists(unit_id, &candidate).await? {
            debug!("key 顺延结果: {} -> {}", base_key, candidate);
            return Ok(candidate);
        }
    }

    warn!("key {} 顺延 {} 次仍然冲突，放弃", base_key, MAX_KEY_ATTEMPTS);
    Err(AppError::Business(BusinessError::KeyGenerationExhausted {
        base_key: base_key.to_string(),
        attempts: MAX_KEY_ATTEMPTS,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    /// 内存版存在性检查，测试专用
    struct InMemoryKeys {
        keys: RefCell<HashSet<String>>,
    }

    impl InMemoryKeys {
        fn with(keys: &[&str]) -> Self {
            Self {
                keys: RefCell::new(keys.iter().map(|k| k.to_string()).collect()),
            }
        }
    }

    impl KeyLookup for InMemoryKeys {
        async fn key_exists(&self, _unit_id: &str, key: &str) -> AppResult<bool> {
            Ok(self.keys.borrow().contains(key))
        }
    }

    #[test]
    fn test_free_key_returned_unchanged() {
        let store = InMemoryKeys::with(&["A01"]);
        let key = tokio_test::block_on(ensure_unique_key(&store, "unit-7", "B01")).unwrap();
        assert_eq!(key, "B01");
    }

    #[test]
    fn test_collision_advances_numeric_suffix() {
        // A01 和 A02 都被占用，应该顺延到 A03
        let store = InMemoryKeys::with(&["A01", "A02"]);
        let key = tokio_test::block_on(ensure_unique_key(&store, "unit-7", "A01")).unwrap();
        assert_eq!(key, "A03");
    }

    #[test]
    fn test_zero_padding_width_preserved() {
        let store = InMemoryKeys::with(&["SQLJ009"]);
        let key = tokio_test::block_on(ensure_unique_key(&store, "unit-7", "SQLJ009")).unwrap();
        assert_eq!(key, "SQLJ010");
    }

    #[test]
    fn test_non_numeric_key_gets_appended_suffix() {
        let store = InMemoryKeys::with(&["join_basics", "join_basics01"]);
        let key =
            tokio_test::block_on(ensure_unique_key(&store, "unit-7", "join_basics")).unwrap();
        assert_eq!(key, "join_basics02");
    }

    #[test]
    fn test_exhaustion_returns_business_error() {
        // 占满 Z01..Z999 之后 1000 次顺延全部冲突
        let keys: Vec<String> = (1..=1001).map(|n| format!("Z{:02}", n)).collect();
        let refs: Vec<&str> = keys.iter().map(|s| s.as_str()).collect();
        let store = InMemoryKeys::with(&refs);
        let err = tokio_test::block_on(ensure_unique_key(&store, "unit-7", "Z01")).unwrap_err();
        assert!(matches!(
            err,
            AppError::Business(BusinessError::KeyGenerationExhausted { .. })
        ));
    }
}
