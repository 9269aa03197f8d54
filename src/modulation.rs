// Multilevel modulation module
// Carrier-based sinusoidal PWM generation for the 5-level cascaded H-bridge

pub mod engine;
pub mod sine_table;

// Re-export main types for easier access
pub use engine::Modulator;
pub use sine_table::SineTable;

/// キャリア戦略
///
/// 2つのHブリッジに対するキャリア配置を選択します。
/// 起動時に選択され、動作中は変更されません。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarrierStrategy {
    /// 位相シフト方式：ブリッジ2のキャリアを180°ずらして配置。
    /// 出力リプル周波数が2倍になり、フィルタが小型化できる。
    PhaseShifted,
    /// レベルシフト方式：キャリア1が[-1,0]、キャリア2が[0,+1]を受け持つ。
    /// 各ブリッジが自分の電圧帯域でのみスイッチングし、真の5レベル出力
    /// （-2,-1,0,+1,+2 × Vdc）が得られる。
    LevelShifted,
}

/// Duty cycle pair for one H-bridge (both legs of the bipolar output)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HbridgeDuty {
    /// Channel 1 duty (timer counts)
    pub ch1: u16,
    /// Channel 2 duty (timer counts, complementary leg)
    pub ch2: u16,
}

/// Complete duty set for the inverter (two cascaded H-bridges)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverterDuties {
    /// H-bridge 1 (TIM1)
    pub hbridge1: HbridgeDuty,
    /// H-bridge 2 (TIM8)
    pub hbridge2: HbridgeDuty,
}
