//! 電流・電圧センシング
//!
//! ADC生値を物理量（出力電流/出力電圧/DCバス電圧×2）へ換算します。
//! 変換そのものはDMA/タイマ駆動で制御経路の外にあり、制御タスクは
//! 取得済みの生値を渡すだけです（制御経路でのビジーウェイト禁止）。

use crate::config::sensing;

/// ADCチャネル数（出力電流、出力電圧、DCバス1、DCバス2）
pub const ADC_CHANNELS: usize = 4;

/// センシング換算パラメータ
pub struct SensingConfig {
    /// ADC分解能
    pub adc_max: u16,
    /// ADC基準電圧 [V]
    pub vref: f32,
    /// 電流換算係数 [A/V]
    pub current_scale: f32,
    /// 出力電圧分圧係数 [V/V]
    pub voltage_scale: f32,
    /// DCバス分圧係数 [V/V]
    pub dc_bus_scale: f32,
    /// ローパスフィルタ係数（0.0-1.0）
    pub filter_alpha: f32,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            adc_max: sensing::ADC_RESOLUTION,
            vref: sensing::ADC_VREF,
            current_scale: sensing::CURRENT_SCALE,
            voltage_scale: sensing::VOLTAGE_SCALE,
            dc_bus_scale: sensing::DC_BUS_SCALE,
            filter_alpha: sensing::FILTER_ALPHA,
        }
    }
}

/// 測定値スナップショット
#[derive(Debug, Clone, Copy)]
pub struct SensorData {
    /// 出力電流 [A]
    pub output_current: f32,
    /// 出力電圧 [V]
    pub output_voltage: f32,
    /// DCバス1電圧 [V]
    pub dc_bus1_voltage: f32,
    /// DCバス2電圧 [V]
    pub dc_bus2_voltage: f32,
    /// 累計サンプル数
    pub sample_count: u32,
    /// 有効フラグ（最初の更新まではfalse）
    pub valid: bool,
}

impl SensorData {
    pub const fn new() -> Self {
        Self {
            output_current: 0.0,
            output_voltage: 0.0,
            dc_bus1_voltage: 0.0,
            dc_bus2_voltage: 0.0,
            sample_count: 0,
            valid: false,
        }
    }
}

/// ADCセンサ換算器
///
/// 生値4チャネルを受け取り、スケーリングとローパスフィルタを適用
/// します。フィルタは初回サンプルで実測値に初期化されます
/// （起動時の誤検出防止）。
pub struct AdcSensor {
    config: SensingConfig,
    data: SensorData,
}

impl AdcSensor {
    /// 新しいセンサ換算器を作成
    pub fn new(config: SensingConfig) -> Self {
        Self {
            config,
            data: SensorData::new(),
        }
    }

    /// ADC生値をADC入力電圧 [V] に変換
    #[inline]
    fn adc_to_voltage(&self, raw: u16) -> f32 {
        raw as f32 / self.config.adc_max as f32 * self.config.vref
    }

    /// 一次ローパスフィルタ
    #[inline]
    fn filter(&self, previous: f32, sample: f32) -> f32 {
        previous + self.config.filter_alpha * (sample - previous)
    }

    /// 生値4チャネル [電流, 出力電圧, DCバス1, DCバス2] を換算して更新
    pub fn update(&mut self, raw: [u16; ADC_CHANNELS]) -> &SensorData {
        let current = self.adc_to_voltage(raw[0]) * self.config.current_scale;
        let voltage = self.adc_to_voltage(raw[1]) * self.config.voltage_scale;
        let dc_bus1 = self.adc_to_voltage(raw[2]) * self.config.dc_bus_scale;
        let dc_bus2 = self.adc_to_voltage(raw[3]) * self.config.dc_bus_scale;

        if self.data.valid {
            self.data.output_current = self.filter(self.data.output_current, current);
            self.data.output_voltage = self.filter(self.data.output_voltage, voltage);
            self.data.dc_bus1_voltage = self.filter(self.data.dc_bus1_voltage, dc_bus1);
            self.data.dc_bus2_voltage = self.filter(self.data.dc_bus2_voltage, dc_bus2);
        } else {
            // 初回はフィルタを実測値で初期化
            self.data.output_current = current;
            self.data.output_voltage = voltage;
            self.data.dc_bus1_voltage = dc_bus1;
            self.data.dc_bus2_voltage = dc_bus2;
            self.data.valid = true;
        }

        self.data.sample_count = self.data.sample_count.wrapping_add(1);
        &self.data
    }

    /// 最新の測定値スナップショット
    pub fn data(&self) -> &SensorData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_until_first_update() {
        let sensor = AdcSensor::new(SensingConfig::default());
        assert!(!sensor.data().valid);
    }

    #[test]
    fn test_scaling() {
        let mut sensor = AdcSensor::new(SensingConfig::default());
        // Full scale on every channel: 3.3V at the pin
        let data = sensor.update([4096, 4096, 4096, 4096]);
        assert!(data.valid);
        assert!((data.output_current - 33.0).abs() < 0.1); // 3.3V * 10 A/V
        assert!((data.output_voltage - 165.0).abs() < 0.5); // 3.3V * 50
        assert!((data.dc_bus1_voltage - 82.5).abs() < 0.5); // 3.3V * 25
    }

    #[test]
    fn test_filter_converges() {
        let mut sensor = AdcSensor::new(SensingConfig::default());
        sensor.update([0, 0, 0, 0]);
        // Step input: the filtered value approaches the step level
        for _ in 0..100 {
            sensor.update([2048, 0, 0, 0]);
        }
        let expected = 2048.0 / 4096.0 * 3.3 * 10.0;
        assert!((sensor.data().output_current - expected).abs() < 0.05);
    }
}
