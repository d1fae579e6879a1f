use std::sync::{Arc, Mutex, PoisonError};

use time::{Duration, OffsetDateTime, UtcOffset};

/// 現在日時を提供する。
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    /// `instant`の時点で有効なオフセットを返却する。
    ///
    /// 既定では現在日時のオフセットを返却する。
    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        let _ = instant;
        self.now().offset()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }

    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        (**self).offset_at(instant)
    }
}

/// 日時から、その時点のローカルのオフセットを求める関数
pub type OffsetLookup = fn(OffsetDateTime) -> Option<UtcOffset>;

/// ホストのローカル時刻を返却する時計
///
/// オフセットは日時ごとに求めるため、夏時間の切り替えをまたいでも正しいローカル時刻になる。
/// オフセットを求められない場合は、作成時に取得したオフセット（取得できなければUTC）を使用する。
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    fallback: UtcOffset,
    lookup: OffsetLookup,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            fallback: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
            lookup: |instant| UtcOffset::local_offset_at(instant).ok(),
        }
    }

    /// 常に`offset`を使用する時計を作成する。
    pub fn with_offset(offset: UtcOffset) -> Self {
        Self {
            fallback: offset,
            lookup: |_| None,
        }
    }

    /// オフセットを求める関数を置き換えた時計を作成する。
    pub fn with_offset_lookup(fallback: UtcOffset, lookup: OffsetLookup) -> Self {
        Self { fallback, lookup }
    }

    /// `instant`をローカル時刻に変換する。
    pub fn local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(self.offset_at(instant))
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        self.local(OffsetDateTime::now_utc())
    }

    fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        (self.lookup)(instant).unwrap_or(self.fallback)
    }
}

/// 明示的に設定した日時を返却する時計
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
