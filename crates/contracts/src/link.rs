//! LinkStatus - session 与采样上下文共享的握手状态

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 连接 epoch、缓冲重置代数与参数就绪标志
///
/// `initialized` 是采样侧判断通道参数是否生效的唯一信号。
/// `epoch` 在连接断开时推进，此时队列中的消息全部过期。
/// `generation` 只在需要清空未满缓冲时推进（ACTIVE 状态下重新协商），
/// 队列中的完整批次仍然有效。
#[derive(Debug, Default)]
pub struct LinkStatus {
    initialized: AtomicBool,
    epoch: AtomicU64,
    generation: AtomicU64,
}

impl LinkStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::SeqCst);
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Start a new connection epoch, returns its number
    pub fn advance_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 请求重置缓冲但不使队列失效，返回新的 generation
    pub fn advance_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}
