//! インバータ制御とハードウェアの設定パラメータ

/// システムクロック [Hz]（STM32G431 @ 170MHz）
pub const SYSTEM_CLOCK_HZ: u32 = 170_000_000;

/// PWMスイッチング周波数 [Hz]
pub const PWM_FREQUENCY_HZ: u32 = 10_000;

/// PWMキャリア周期 [カウント]
/// PWM_PERIOD = (SYSTEM_CLOCK_HZ / PWM_FREQUENCY_HZ) - 1
pub const PWM_PERIOD: u16 = (SYSTEM_CLOCK_HZ / PWM_FREQUENCY_HZ - 1) as u16;

/// 制御ループ周波数 [Hz]（キャリア2周期ごとに1回更新）
pub const CONTROL_FREQUENCY_HZ: u32 = 5_000;

/// 制御周期 [μs]（5kHz = 200μs）
pub const DEFAULT_CONTROL_PERIOD_US: u64 = 1_000_000 / CONTROL_FREQUENCY_HZ as u64;

/// 正弦波テーブルのサンプル数（1周期分）
pub const SINE_TABLE_SIZE: usize = 200;

/// 出力周波数のデフォルト値 [Hz]
pub const DEFAULT_OUTPUT_FREQUENCY_HZ: f32 = 50.0;

/// 出力周波数の設定可能範囲 [Hz]
pub const MIN_OUTPUT_FREQUENCY_HZ: f32 = 1.0;
pub const MAX_OUTPUT_FREQUENCY_HZ: f32 = 400.0;

/// 変調率のデフォルト値（0.0～1.0）
pub const DEFAULT_MODULATION_INDEX: f32 = 0.8;

/// PWM設定
pub mod pwm {
    use embassy_stm32::time::Hertz;

    /// PWMキャリア周波数（10kHz）
    pub const DEFAULT_FREQUENCY: Hertz = Hertz(super::PWM_FREQUENCY_HZ);

    /// デッドタイム [カウント]（1μs @ 170MHz = 170カウント）
    pub const DEFAULT_DEAD_TIME: u16 = 170;
}

/// ソフトスタート設定
pub mod softstart {
    /// ランプ時間 [ms]（突入電流抑制のため2秒かけて立ち上げる）
    pub const DEFAULT_RAMP_TIME_MS: u64 = 2000;
}

/// 保護しきい値
pub mod safety {
    /// 最大出力電流 [A]
    pub const MAX_CURRENT_A: f32 = 15.0;

    /// 最大出力電圧 [V]（100V RMS + マージン）
    pub const MAX_VOLTAGE_V: f32 = 125.0;

    /// 最大温度 [°C]
    pub const MAX_TEMPERATURE_C: f32 = 85.0;

    /// フォルトクリアが可能になるまでの待ち時間 [ms]
    pub const FAULT_RESET_DELAY_MS: u64 = 5000;
}

/// PRコントローラ設定
pub mod pr {
    /// 比例ゲイン（デフォルト値）
    pub const DEFAULT_KP: f32 = 1.0;

    /// 共振ゲイン（デフォルト値）
    pub const DEFAULT_KR: f32 = 50.0;

    /// カットオフ周波数 [rad/s]（共振ピークの帯域幅）
    pub const DEFAULT_WC: f32 = 10.0;

    /// 基本波周波数 [Hz]（共振ピークを置く周波数）
    pub const FUNDAMENTAL_FREQ_HZ: f32 = 50.0;

    /// サンプリング周波数 [Hz]（制御ループと同一）
    pub const SAMPLE_FREQ_HZ: f32 = super::CONTROL_FREQUENCY_HZ as f32;
}

/// 閉ループ電流制御設定
pub mod closedloop {
    /// 電流指令の振幅 [A]（50Hz正弦波）
    pub const DEFAULT_CURRENT_AMPLITUDE_A: f32 = 5.0;
}

/// センシング設定
pub mod sensing {
    /// ADC分解能（12ビット = 4096）
    pub const ADC_RESOLUTION: u16 = 4096;

    /// ADC基準電圧 [V]
    pub const ADC_VREF: f32 = 3.3;

    /// 電流センサ変換係数 [A/V]（ホールセンサ: 0.1V/A → 10A/V）
    pub const CURRENT_SCALE: f32 = 10.0;

    /// 出力電圧分圧係数 [V/V]（1:50）
    pub const VOLTAGE_SCALE: f32 = 50.0;

    /// DCバス電圧分圧係数 [V/V]（1:25）
    pub const DC_BUS_SCALE: f32 = 25.0;

    /// ローパスフィルタ係数（0.0-1.0、大きいほど応答が速い）
    pub const FILTER_ALPHA: f32 = 0.2;
}
