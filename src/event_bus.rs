//! 事件总线，用于解耦模拟核心与外部观察者
//!
//! - 动作与回合处理器产生事件，会话统一发布
//! - 订阅者可以按事件类型或全局订阅，按优先级顺序执行
//! - 订阅者返回错误或发生 panic 时只记录日志，不影响其他订阅者
//! - 最近的事件保存在历史中，用于调试与回放

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::entity::AttrMap;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    // ===== 移动 =====
    EntityMoved,

    // ===== 战斗 =====
    DamageDealt,
    EntityDied,
    ExperienceGained,
    LevelUp,

    // ===== 物品 =====
    LootDropped,
    ItemPickedUp,
    ItemEquipped,
    ItemUnequipped,
    ItemCrafted,

    // ===== 采矿 =====
    MiningStarted,
    MiningProgressed,
    OreMined,
    VeinSurveyed,

    // ===== 动作与流程 =====
    ActionRejected,
    ActionFailed,
    HookExecuted,
    FloorTransition,
    TurnAdvanced,
    GameOver,
    Victory,
}

/// 动作执行期间产生、尚未盖上时间戳的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub data: AttrMap,
}

impl EventRecord {
    pub fn new(kind: EventKind, data: AttrMap) -> Self {
        Self { kind, data }
    }
}

/// 已发布的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub data: AttrMap,
    /// 发布时的墙钟时间(毫秒)，仅用于日志，不参与模拟
    pub timestamp_ms: u64,
    pub turn: u64,
}

impl Event {
    pub fn new(kind: EventKind, data: AttrMap, turn: u64) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            kind,
            data,
            timestamp_ms,
            turn,
        }
    }

    pub fn from_record(record: EventRecord, turn: u64) -> Self {
        Self::new(record.kind, record.data, turn)
    }

    pub fn event_type(&self) -> String {
        self.kind.to_string()
    }
}

/// 处理器优先级（数字越小越先执行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    Highest = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    Lowest = 4,
}

/// 事件处理器
pub trait EventHandler {
    fn handle(&mut self, event: &Event) -> anyhow::Result<()>;

    /// 处理器名称（用于日志）
    fn name(&self) -> &str;

    fn priority(&self) -> Priority {
        Priority::Normal
    }
}

/// 闭包包装的处理器
struct FnHandler<F> {
    name: String,
    priority: Priority,
    f: F,
}

impl<F> EventHandler for FnHandler<F>
where
    F: FnMut(&Event) -> anyhow::Result<()>,
{
    fn handle(&mut self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

struct HandlerEntry {
    handler: Box<dyn EventHandler>,
    priority: Priority,
}

pub struct EventBus {
    /// 按事件类型注册的处理器
    handlers: HashMap<EventKind, Vec<HandlerEntry>>,
    /// 处理所有事件的处理器
    global_handlers: Vec<HandlerEntry>,
    history: Vec<Event>,
    max_history: usize,
    /// 处理器失败(错误或 panic)的累计次数
    failures: u64,
    published: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_size(256)
    }

    pub fn with_history_size(max_history: usize) -> Self {
        Self {
            handlers: HashMap::new(),
            global_handlers: Vec::new(),
            history: Vec::new(),
            max_history,
            failures: 0,
            published: 0,
        }
    }

    /// 注册处理特定类型事件的处理器
    pub fn subscribe(&mut self, kind: EventKind, handler: Box<dyn EventHandler>) {
        let priority = handler.priority();
        let handlers = self.handlers.entry(kind).or_default();
        handlers.push(HandlerEntry { handler, priority });
        // 稳定排序，同优先级保持注册顺序
        handlers.sort_by_key(|entry| entry.priority);
    }

    /// 注册全局处理器
    pub fn subscribe_all(&mut self, handler: Box<dyn EventHandler>) {
        let priority = handler.priority();
        self.global_handlers.push(HandlerEntry { handler, priority });
        self.global_handlers.sort_by_key(|entry| entry.priority);
    }

    pub fn subscribe_fn<F>(&mut self, kind: EventKind, name: &str, f: F)
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        self.subscribe(
            kind,
            Box::new(FnHandler {
                name: name.to_string(),
                priority: Priority::Normal,
                f,
            }),
        );
    }

    pub fn subscribe_all_fn<F>(&mut self, name: &str, f: F)
    where
        F: FnMut(&Event) -> anyhow::Result<()> + 'static,
    {
        self.subscribe_all(Box::new(FnHandler {
            name: name.to_string(),
            priority: Priority::Normal,
            f,
        }));
    }

    /// 发布事件：依次调用全局与类型处理器，最后记入历史
    pub fn publish(&mut self, event: Event) {
        self.published += 1;
        tracing::trace!(kind = %event.kind, turn = event.turn, "publish event");

        let mut failures = 0;
        for entry in &mut self.global_handlers {
            if !invoke(entry.handler.as_mut(), &event) {
                failures += 1;
            }
        }
        if let Some(handlers) = self.handlers.get_mut(&event.kind) {
            for entry in handlers {
                if !invoke(entry.handler.as_mut(), &event) {
                    failures += 1;
                }
            }
        }
        self.failures += failures;
        self.add_to_history(event);
    }

    pub fn publish_records(&mut self, records: impl IntoIterator<Item = EventRecord>, turn: u64) {
        for record in records {
            self.publish(Event::from_record(record, turn));
        }
    }

    fn add_to_history(&mut self, event: Event) {
        if self.max_history == 0 {
            return;
        }
        if self.history.len() >= self.max_history {
            self.history.remove(0);
        }
        self.history.push(event);
    }

    /// 最近的 n 个事件
    pub fn get_history(&self, count: usize) -> &[Event] {
        let start = self.history.len().saturating_sub(count);
        &self.history[start..]
    }

    pub fn full_history(&self) -> &[Event] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.global_handlers.len() + self.handlers.values().map(Vec::len).sum::<usize>()
    }

    pub fn failure_count(&self) -> u64 {
        self.failures
    }

    pub fn published_count(&self) -> u64 {
        self.published
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("history", &self.history.len())
            .field("failures", &self.failures)
            .finish()
    }
}

/// 调用单个处理器，隔离其错误与 panic
fn invoke(handler: &mut dyn EventHandler, event: &Event) -> bool {
    match catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::warn!(handler = handler.name(), kind = %event.kind, error = %err, "event handler failed");
            false
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::warn!(handler = handler.name(), kind = %event.kind, %reason, "event handler panicked");
            false
        }
    }
}
