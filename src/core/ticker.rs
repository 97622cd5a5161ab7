//! 周期任务：紧急模式下的覆盖人数计数器
//!
//! 每个周期调用一次 tick；tick 返回 false 或令牌被取消时任务结束。

use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::state::RECEIVERS_CAP;

/// 覆盖人数的刷新周期
pub const REACH_TICK: Duration = Duration::from_millis(500);
/// 单次增量上限（不含）
pub const REACH_STEP_MAX: u32 = 50;

/// 计算下一次覆盖人数：随机增加 0..50，封顶 RECEIVERS_CAP
pub fn next_reach<R: Rng + ?Sized>(current: u32, rng: &mut R) -> u32 {
    current
        .saturating_add(rng.gen_range(0..REACH_STEP_MAX))
        .min(RECEIVERS_CAP)
}

/// 启动周期任务；第一次 tick 发生在一个周期之后
pub fn spawn_ticker<F>(period: Duration, token: CancellationToken, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if !tick() {
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_next_reach_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let next = next_reach(12_000, &mut rng);
            assert!((12_000..12_050).contains(&next));
        }
        assert_eq!(next_reach(RECEIVERS_CAP, &mut rng), RECEIVERS_CAP);
        assert!(next_reach(RECEIVERS_CAP - 1, &mut rng) <= RECEIVERS_CAP);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_runs_until_cancelled() {
        let count = Arc::new(AtomicU32::new(0));
        let token = CancellationToken::new();
        let c = count.clone();
        let handle = spawn_ticker(REACH_TICK, token.clone(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);

        token.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stops_when_tick_declines() {
        let token = CancellationToken::new();
        let handle = spawn_ticker(REACH_TICK, token, || false);
        handle.await.unwrap();
    }
}
