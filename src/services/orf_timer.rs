//! ORF 计时器
//!
//! 朗读计时固定 60 秒上限，到达上限时自动暂停并标记完成。
//! 其他分测验复用同一个计时器，上限由分测验或配置决定。
//! 计时器本身不持有时钟，由调用方每秒调用一次 `tick()`。

pub const DEFAULT_TIME_LIMIT_SECONDS: u32 = 60;

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// 未运行，忽略
    Idle,
    /// 已计时秒数
    Ticked(u32),
    /// 到达上限，已自动暂停
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrfTimer {
    elapsed_seconds: u32,
    limit_seconds: u32,
    running: bool,
    completed: bool,
}

impl Default for OrfTimer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_TIME_LIMIT_SECONDS)
    }
}

impl OrfTimer {
    pub fn with_limit(limit_seconds: u32) -> Self {
        Self {
            elapsed_seconds: 0,
            limit_seconds: limit_seconds.max(1),
            running: false,
            completed: false,
        }
    }

    /// 开始或继续计时；已完成的计时器需要先 `reset`
    pub fn start(&mut self) {
        if !self.completed {
            self.running = true;
        }
    }

    /// 暂停，保留已计时秒数
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// 清零并清除完成标记
    pub fn reset(&mut self) {
        self.elapsed_seconds = 0;
        self.running = false;
        self.completed = false;
    }

    pub fn tick(&mut self) -> TimerEvent {
        if !self.running {
            return TimerEvent::Idle;
        }
        self.elapsed_seconds += 1;
        if self.elapsed_seconds >= self.limit_seconds {
            self.elapsed_seconds = self.limit_seconds;
            self.running = false;
            self.completed = true;
            return TimerEvent::Completed;
        }
        TimerEvent::Ticked(self.elapsed_seconds)
    }

    pub fn elapsed_seconds(&self) -> u32 {
        self.elapsed_seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_pause_at_ceiling() {
        let mut timer = OrfTimer::default();
        timer.start();
        for _ in 0..59 {
            assert!(matches!(timer.tick(), TimerEvent::Ticked(_)));
        }
        assert_eq!(timer.tick(), TimerEvent::Completed);
        assert!(!timer.is_running());
        assert!(timer.is_completed());
        assert_eq!(timer.elapsed_seconds(), 60);
        assert_eq!(timer.tick(), TimerEvent::Idle);
        assert_eq!(timer.elapsed_seconds(), 60);
    }

    #[test]
    fn test_pause_resume_preserves_elapsed() {
        let mut timer = OrfTimer::default();
        timer.start();
        timer.tick();
        timer.tick();
        timer.pause();
        assert_eq!(timer.tick(), TimerEvent::Idle);
        timer.start();
        assert_eq!(timer.tick(), TimerEvent::Ticked(3));
    }

    #[test]
    fn test_reset_clears_completion() {
        let mut timer = OrfTimer::with_limit(2);
        timer.start();
        timer.tick();
        timer.tick();
        assert!(timer.is_completed());

        timer.start();
        assert!(!timer.is_running(), "completed timer must be reset first");

        timer.reset();
        assert_eq!(timer.elapsed_seconds(), 0);
        assert!(!timer.is_completed());
        timer.start();
        assert_eq!(timer.tick(), TimerEvent::Ticked(1));
    }
}
