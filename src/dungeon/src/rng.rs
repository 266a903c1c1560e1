//src/dungeon/src/rng.rs
use rand::{
    distr::uniform,
    prelude::SliceRandom,
    {Rng, SeedableRng},
};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// 种子来源：整数、字符串或运行时随机
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeedInput {
    Int(u64),
    Text(String),
    Random,
}

impl From<u64> for SeedInput {
    fn from(seed: u64) -> Self {
        SeedInput::Int(seed)
    }
}

impl From<&str> for SeedInput {
    fn from(seed: &str) -> Self {
        SeedInput::Text(seed.to_string())
    }
}

/// 会话唯一的确定性RNG
///
/// 整个模拟只持有一个实例。存档时保存的是生成器的完整内部状态，
/// 而不仅仅是种子，因此读档后的随机序列与未存档时完全一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeededRng {
    rng: Pcg32,
    seed: u64,
}

/// RNG的不透明状态快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RngState {
    seed: u64,
    generator: Pcg32,
}

impl RngState {
    /// 生成该状态的原始种子
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl SeededRng {
    /// 使用整数种子创建RNG
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            seed,
        }
    }

    /// 使用字符串种子创建RNG（哈希为正整数）
    pub fn from_text(text: &str) -> Self {
        Self::new(hash_text_seed(text))
    }

    /// 使用本次运行的随机种子创建RNG
    pub fn from_entropy() -> Self {
        let seed = rand::rng().random::<u64>() & (i64::MAX as u64);
        Self::new(seed.max(1))
    }

    pub fn from_input(input: &SeedInput) -> Self {
        match input {
            SeedInput::Int(seed) => Self::new(*seed),
            SeedInput::Text(text) => Self::from_text(text),
            SeedInput::Random => Self::from_entropy(),
        }
    }

    /// 获取当前种子值
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// 闭区间 `[a, b]` 内的均匀整数，a > b 时自动交换
    pub fn range_i(&mut self, a: i64, b: i64) -> i64 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.rng.random_range(lo..=hi)
    }

    /// 生成指定范围内的随机值
    pub fn random_range<T, R>(&mut self, range: R) -> T
    where
        T: uniform::SampleUniform,
        R: uniform::SampleRange<T>,
    {
        self.rng.random_range(range)
    }

    /// `[0, 1)` 内的均匀浮点数
    pub fn random_f64(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// `[a, b]` 内的均匀浮点数
    pub fn uniform(&mut self, a: f64, b: f64) -> f64 {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        lo + (hi - lo) * self.random_f64()
    }

    /// 生成随机布尔值
    pub fn random_bool(&mut self, probability: f64) -> bool {
        self.rng.random_bool(probability.clamp(0.0, 1.0))
    }

    /// 从列表中随机选择
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            let idx = self.random_range(0..items.len());
            Some(&items[idx])
        }
    }

    /// 按权重随机选择，非正权重的元素永远不会被选中
    pub fn choose_weighted<'a, T, F>(&mut self, items: &'a [T], weight: F) -> Option<&'a T>
    where
        F: Fn(&T) -> f64,
    {
        let total: f64 = items.iter().map(|item| weight(item).max(0.0)).sum();
        if total <= 0.0 {
            return None;
        }

        let mut roll = self.random_f64() * total;
        let mut last_positive = None;
        for item in items {
            let w = weight(item).max(0.0);
            if w <= 0.0 {
                continue;
            }
            last_positive = Some(item);
            if roll < w {
                return Some(item);
            }
            roll -= w;
        }
        // 浮点累加误差
        last_positive
    }

    /// 随机打乱切片
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        slice.shuffle(&mut self.rng);
    }

    /// 不放回抽样 k 个元素（保持抽中的先后顺序）
    pub fn sample<T: Clone>(&mut self, items: &[T], k: usize) -> Vec<T> {
        let k = k.min(items.len());
        let mut indices: Vec<usize> = (0..items.len()).collect();
        for i in 0..k {
            let j = self.random_range(i..indices.len());
            indices.swap(i, j);
        }
        indices[..k].iter().map(|&i| items[i].clone()).collect()
    }

    /// 导出状态快照
    pub fn state(&self) -> RngState {
        RngState {
            seed: self.seed,
            generator: self.rng.clone(),
        }
    }

    /// 恢复状态快照
    pub fn set_state(&mut self, state: RngState) {
        self.seed = state.seed;
        self.rng = state.generator;
    }
}

/// 字符串种子 → 正整数种子
pub fn hash_text_seed(text: &str) -> u64 {
    let hashed = seahash::hash(text.as_bytes()) & (i64::MAX as u64);
    hashed.max(1)
}
