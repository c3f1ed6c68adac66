//! ドメイン型定義

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 外部から与えられるオブジェクト識別子
pub type ObjectId = i32;

/// 1件のプローブ結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// オブジェクトID
    pub object_id: ObjectId,
    /// チェッカーがオンラインと判定したか
    pub online: bool,
}

/// 永続化された稼働状況レコード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessRecord {
    /// オブジェクトID（一意キー）
    pub object_id: ObjectId,
    /// 最後の照合結果
    pub online: bool,
    /// 最後にオンラインが確認された時刻
    pub last_seen: DateTime<Utc>,
}

/// 1バッチ分の照合対象
///
/// `online` と `offline` は互いに素で、それぞれ重複を含まない。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileBatch {
    /// オンラインが確認されたID
    pub online: Vec<ObjectId>,
    /// オフラインが確認されたID
    pub offline: Vec<ObjectId>,
}

impl ReconcileBatch {
    /// プローブ結果をオンライン/オフラインに振り分ける
    ///
    /// 同じIDの結果が複数ある場合は最初のものを採用する。
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = VerificationOutcome>,
    {
        let mut seen = HashSet::new();
        let mut batch = Self::default();
        for outcome in outcomes {
            if !seen.insert(outcome.object_id) {
                continue;
            }
            if outcome.online {
                batch.online.push(outcome.object_id);
            } else {
                batch.offline.push(outcome.object_id);
            }
        }
        batch
    }

    /// 照合対象が空か
    pub fn is_empty(&self) -> bool {
        self.online.is_empty() && self.offline.is_empty()
    }

    /// 照合対象の件数
    pub fn len(&self) -> usize {
        self.online.len() + self.offline.len()
    }
}

/// 照合トランザクションの結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// 新規作成されたID
    pub inserted: Vec<ObjectId>,
    /// `last_seen` を更新したID
    pub refreshed: Vec<ObjectId>,
    /// オフラインに変更したID（レコードが存在したもののみ）
    pub marked_offline: Vec<ObjectId>,
}

impl ReconcileReport {
    /// 実際に挿入・更新されたID一覧
    pub fn modified_ids(&self) -> Vec<ObjectId> {
        self.inserted
            .iter()
            .chain(&self.refreshed)
            .chain(&self.marked_offline)
            .copied()
            .collect()
    }
}

/// 出現順を保ったまま重複を除去する（最初の出現を採用）
pub fn dedup_preserving_order(ids: &[ObjectId]) -> Vec<ObjectId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// 4桁の年で表せる最小の保存値
const ENCODED_FLOOR: &str = "0000-01-01T00:00:00.000000Z";

/// 4桁の年で表せる最大の保存値
const ENCODED_CEILING: &str = "9999-12-31T23:59:59.999999Z";

/// `last_seen` の保存形式
///
/// 固定長にすることで文字列比較が時刻順と一致する。
/// 固定長になるのは0000年から9999年までなので、範囲外の時刻は両端に丸める。
pub fn encode_timestamp(at: DateTime<Utc>) -> String {
    match at.year() {
        year if year < 0 => ENCODED_FLOOR.to_string(),
        year if year > 9999 => ENCODED_CEILING.to_string(),
        _ => at.to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}

/// `encode_timestamp` で保存された文字列を復元する
pub fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
