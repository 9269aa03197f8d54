//! 保護監視モジュール
//!
//! 過電流/過電圧/過温度/非常停止をフォルトフラグとしてラッチし、
//! PWM出力の可否を判定します。フラグはOR蓄積のみで、クリアは
//! 最終フォルトから一定時間経過後の一括クリアに限られます。

/// フォルトフラグ（ビットセット）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultFlags(u32);

impl FaultFlags {
    /// フォルトなし
    pub const NONE: FaultFlags = FaultFlags(0);
    /// 過電流
    pub const OVERCURRENT: FaultFlags = FaultFlags(0x01);
    /// 過電圧
    pub const OVERVOLTAGE: FaultFlags = FaultFlags(0x02);
    /// 過温度
    pub const OVERTEMPERATURE: FaultFlags = FaultFlags(0x04);
    /// 非常停止
    pub const EMERGENCY_STOP: FaultFlags = FaultFlags(0x08);
    /// ハードウェア異常（ゲートドライバフォルト等）
    pub const HARDWARE: FaultFlags = FaultFlags(0x10);

    /// フラグをOR追加
    #[inline]
    pub fn insert(&mut self, other: FaultFlags) {
        self.0 |= other.0;
    }

    /// 指定フラグが立っているか
    #[inline]
    pub fn contains(&self, other: FaultFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// フォルトが一つも無いか
    #[inline]
    pub fn is_clear(&self) -> bool {
        self.0 == 0
    }

    /// 生のビット値（ログ表示用）
    #[inline]
    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// 保護しきい値
pub struct SafetyConfig {
    /// 最大出力電流 [A]
    pub max_current_a: f32,
    /// 最大出力電圧 [V]
    pub max_voltage_v: f32,
    /// 最大温度 [°C]
    pub max_temperature_c: f32,
    /// フォルトクリアが可能になるまでの待ち時間 [ms]
    pub fault_reset_delay_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_current_a: crate::config::safety::MAX_CURRENT_A,
            max_voltage_v: crate::config::safety::MAX_VOLTAGE_V,
            max_temperature_c: crate::config::safety::MAX_TEMPERATURE_C,
            fault_reset_delay_ms: crate::config::safety::FAULT_RESET_DELAY_MS,
        }
    }
}

/// 保護監視コントローラ
///
/// フォルトはしきい値超過でラッチされ、条件が解消しても自動では
/// クリアされません。`clear_faults()` は最終フォルトのタイムスタンプ
/// からデッドタイム（デフォルト5秒）経過後のみ有効です。
pub struct SafetyMonitor {
    config: SafetyConfig,
    fault_flags: FaultFlags,
    /// 直近の測定値（ステータス表示用）
    current_a: f32,
    voltage_v: f32,
    temperature_c: f32,
    /// 最終フォルト発生時刻 [ms]
    fault_timestamp_ms: u64,
    estop_active: bool,
}

impl SafetyMonitor {
    /// 新しい保護監視コントローラを作成
    pub fn new(config: SafetyConfig) -> Self {
        Self {
            config,
            fault_flags: FaultFlags::NONE,
            current_a: 0.0,
            voltage_v: 0.0,
            temperature_c: 0.0,
            fault_timestamp_ms: 0,
            estop_active: false,
        }
    }

    /// 電流・電圧の測定値を評価し、しきい値超過をラッチ
    pub fn update(&mut self, current: f32, voltage: f32, now_ms: u64) {
        self.current_a = current;
        self.voltage_v = voltage;

        if current > self.config.max_current_a {
            self.fault_flags.insert(FaultFlags::OVERCURRENT);
            self.fault_timestamp_ms = now_ms;
        }

        if voltage > self.config.max_voltage_v {
            self.fault_flags.insert(FaultFlags::OVERVOLTAGE);
            self.fault_timestamp_ms = now_ms;
        }
    }

    /// 温度測定値を評価し、過温度をラッチ
    pub fn update_temperature(&mut self, temperature: f32, now_ms: u64) {
        self.temperature_c = temperature;

        if temperature > self.config.max_temperature_c {
            self.fault_flags.insert(FaultFlags::OVERTEMPERATURE);
            self.fault_timestamp_ms = now_ms;
        }
    }

    /// ハードウェアフォルトをラッチ（ゲートドライバのnFAULT等）
    pub fn hardware_fault(&mut self, now_ms: u64) {
        self.fault_flags.insert(FaultFlags::HARDWARE);
        self.fault_timestamp_ms = now_ms;
    }

    /// 非常停止。デッドタイムに関係なく常に即時ラッチされる
    pub fn emergency_stop(&mut self, now_ms: u64) {
        self.fault_flags.insert(FaultFlags::EMERGENCY_STOP);
        self.estop_active = true;
        self.fault_timestamp_ms = now_ms;
    }

    /// 運転可否の判定。フォルトが一つも無いときのみtrue
    #[inline]
    pub fn check(&self) -> bool {
        self.fault_flags.is_clear()
    }

    /// フォルトの一括クリア。
    ///
    /// 最終フォルトからデッドタイム経過前の呼び出しは何もしない
    /// （過渡フォルト直後のクリア競合を防ぐ）。クリアできた場合true。
    pub fn clear_faults(&mut self, now_ms: u64) -> bool {
        if now_ms.wrapping_sub(self.fault_timestamp_ms) > self.config.fault_reset_delay_ms {
            self.fault_flags = FaultFlags::NONE;
            self.estop_active = false;
            return true;
        }
        false
    }

    /// フォルトが発生しているか
    pub fn is_fault(&self) -> bool {
        !self.fault_flags.is_clear()
    }

    /// 現在のフォルトフラグ
    pub fn faults(&self) -> FaultFlags {
        self.fault_flags
    }

    /// 非常停止が有効か
    pub fn estop_active(&self) -> bool {
        self.estop_active
    }

    /// 直近の測定値（電流 [A], 電圧 [V], 温度 [°C]）
    pub fn last_measurements(&self) -> (f32, f32, f32) {
        (self.current_a, self.voltage_v, self.temperature_c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> SafetyMonitor {
        SafetyMonitor::new(SafetyConfig::default())
    }

    #[test]
    fn test_overcurrent_latches() {
        let mut s = monitor();
        assert!(s.check());

        s.update(20.0, 50.0, 1000);
        assert!(!s.check());
        assert!(s.faults().contains(FaultFlags::OVERCURRENT));

        // Condition gone, flag stays latched
        s.update(1.0, 50.0, 1100);
        assert!(s.faults().contains(FaultFlags::OVERCURRENT));
    }

    #[test]
    fn test_clear_respects_dwell_time() {
        let mut s = monitor();
        s.update(20.0, 50.0, 1000);

        // Immediately after the fault: no-op
        assert!(!s.clear_faults(1001));
        assert!(s.is_fault());

        // Still inside the 5000ms dwell
        assert!(!s.clear_faults(5999));
        assert!(s.is_fault());

        // Past the dwell: bulk clear
        assert!(s.clear_faults(6001));
        assert!(s.check());
    }

    #[test]
    fn test_refault_restarts_dwell() {
        let mut s = monitor();
        s.update(20.0, 50.0, 1000);
        // A second breach restamps the timestamp
        s.update(20.0, 50.0, 4000);
        assert!(!s.clear_faults(6001));
        assert!(s.clear_faults(9001));
    }

    #[test]
    fn test_overvoltage_and_temperature_latch() {
        let mut s = monitor();
        s.update(1.0, 130.0, 0);
        assert!(s.faults().contains(FaultFlags::OVERVOLTAGE));

        s.update_temperature(90.0, 10);
        assert!(s.faults().contains(FaultFlags::OVERTEMPERATURE));
        assert!(!s.faults().contains(FaultFlags::OVERCURRENT));
    }

    #[test]
    fn test_emergency_stop_always_wins() {
        let mut s = monitor();
        s.emergency_stop(500);
        assert!(!s.check());
        assert!(s.estop_active());
        assert!(s.faults().contains(FaultFlags::EMERGENCY_STOP));

        // Estop is subject to the same bulk clear
        assert!(s.clear_faults(6000));
        assert!(!s.estop_active());
        assert!(s.check());
    }
}
