//! インバータ制御コア
//!
//! 1制御周期分の処理（保護ゲート→ソフトスタート→閉ループ電流制御→
//! デューティ計算→位相更新）をハードウェア非依存の形でまとめます。
//! PWM書き込みとADC読み取りはタスク側の責務で、このコアは計算のみを
//! 行うため、ターゲット外で単体テストできます。

use libm::sinf;

use crate::config;
use crate::modulation::{CarrierStrategy, InverterDuties, Modulator};
use crate::pr_controller::PrController;
use crate::safety::{FaultFlags, SafetyConfig, SafetyMonitor};
use crate::sensing::SensorData;
use crate::soft_start::SoftStart;

/// 動作モード
///
/// 起動時に選択してタスクへ渡します（コンパイル時スイッチではなく
/// 実行時の設定値）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    /// PWM動作確認（変調無効、全ch 50%固定）
    PwmTest,
    /// 開ループ正弦波変調
    OpenLoop,
    /// PRコントローラによる閉ループ電流制御
    ClosedLoopCurrent,
}

/// 1周期分の制御結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlOutput {
    /// 計算済みデューティ。呼び出し側がPWMハードウェアへ書き込む
    Duties(InverterDuties),
    /// フォルト検出。呼び出し側は出力を即時安全停止する
    Shutdown,
}

/// 周期制御コア
///
/// 変調エンジン・PRコントローラ・ソフトスタート・保護監視を所有し、
/// `step()` で1周期分を厳密な順序で実行します。保護チェックは常に
/// デューティ計算とPWM書き込みに先行します。
pub struct InverterControl {
    modulator: Modulator,
    soft_start: SoftStart,
    pr: PrController,
    safety: SafetyMonitor,
    mode: OperatingMode,
    /// 閉ループ時の電流指令振幅 [A]
    current_amplitude_a: f32,
    /// 累計制御周期数（閉ループのサンプルクロックを兼ねる）
    update_count: u32,
    /// フォルトでスキップした周期数
    fault_count: u32,
}

impl InverterControl {
    /// 新しい制御コアを作成し、動作モードのプリセットを適用
    pub fn new(mode: OperatingMode, strategy: CarrierStrategy) -> Self {
        let mut control = Self {
            modulator: Modulator::new(
                strategy,
                config::PWM_PERIOD,
                config::CONTROL_FREQUENCY_HZ as f32,
            ),
            soft_start: SoftStart::new(config::softstart::DEFAULT_RAMP_TIME_MS),
            pr: PrController::new(
                config::pr::DEFAULT_KP,
                config::pr::DEFAULT_KR,
                config::pr::DEFAULT_WC,
                config::pr::SAMPLE_FREQ_HZ,
                config::pr::FUNDAMENTAL_FREQ_HZ,
            ),
            safety: SafetyMonitor::new(SafetyConfig::default()),
            mode,
            current_amplitude_a: config::closedloop::DEFAULT_CURRENT_AMPLITUDE_A,
            update_count: 0,
            fault_count: 0,
        };

        match mode {
            OperatingMode::PwmTest => {
                // 変調無効のまま：calculate_duties()が全ch 50%を返す
            }
            OperatingMode::OpenLoop => {
                control
                    .modulator
                    .set_frequency(config::DEFAULT_OUTPUT_FREQUENCY_HZ);
                control.modulator.set_index(config::DEFAULT_MODULATION_INDEX);
            }
            OperatingMode::ClosedLoopCurrent => {
                control
                    .modulator
                    .set_frequency(config::DEFAULT_OUTPUT_FREQUENCY_HZ);
                // 初期変調率。ソフトスタート完了後はPRコントローラが上書きする
                control.modulator.set_index(0.5);
                control.pr.reset();
            }
        }

        control
    }

    /// 運転開始：変調を有効化し、ソフトスタートを開始
    pub fn start(&mut self, target_mi: f32, now_ms: u64) {
        if self.mode == OperatingMode::PwmTest {
            // PWMテストは変調無効のまま（50%固定出力）
            return;
        }
        self.modulator.set_enabled(true);
        self.soft_start.begin(target_mi, now_ms);
    }

    /// 運転停止：変調を無効化し、制御状態をリセット
    ///
    /// 次回の`start()`が新しい制御エピソードとして始まるよう、
    /// ソフトスタートとPRコントローラの履歴を破棄します。
    pub fn stop(&mut self) {
        self.modulator.set_enabled(false);
        self.soft_start.abort();
        self.pr.reset();
    }

    /// 1制御周期分を実行。
    ///
    /// 順序はシステム全体の正しさの根幹：保護ゲートが最初で、フォルト
    /// 時はデューティ計算も位相更新も行わずに抜けます。
    pub fn step(&mut self, sensor: &SensorData, now_ms: u64) -> ControlOutput {
        // 1. 保護ゲート（有効な測定値のみ評価）
        if sensor.valid {
            self.safety
                .update(sensor.output_current, sensor.dc_bus1_voltage, now_ms);
        }
        if !self.safety.check() {
            self.fault_count = self.fault_count.wrapping_add(1);
            return ControlOutput::Shutdown;
        }

        // 2. ソフトスタート。完了までは変調率を常にランプ値で上書きし、
        //    完了周期にはスナップされた最終値を反映する
        let was_complete = self.soft_start.is_complete();
        self.soft_start.update(now_ms);
        if !was_complete {
            self.modulator.set_index(self.soft_start.current_mi());
        }

        // 3. 閉ループ電流制御（ソフトスタート完了後のみ）
        if self.mode == OperatingMode::ClosedLoopCurrent && self.soft_start.is_complete() {
            let time = self.update_count as f32 / config::pr::SAMPLE_FREQ_HZ;
            let reference = self.current_amplitude_a
                * sinf(2.0 * core::f32::consts::PI * config::pr::FUNDAMENTAL_FREQ_HZ * time);
            let new_mi = self.pr.update(reference, sensor.output_current);
            self.modulator.set_index(new_mi);
        }

        // 4. デューティ計算
        let duties = self.modulator.calculate_duties();

        // 5. 位相更新とカウンタ（呼び出し側はこの周期のデューティを
        //    書き込む。位相は次周期の分）
        self.modulator.advance_phase();
        self.update_count = self.update_count.wrapping_add(1);

        ControlOutput::Duties(duties)
    }

    // ---- 下位優先度コンテキストから呼ばれるコマンド群 ----

    /// 変調率を設定（ソフトスタート中はランプ値が優先される）
    pub fn set_modulation_index(&mut self, mi: f32) {
        self.modulator.set_index(mi);
    }

    /// 出力周波数を設定 [Hz]（範囲外は無視）
    pub fn set_frequency(&mut self, freq: f32) {
        self.modulator.set_frequency(freq);
    }

    /// PRコントローラのゲインを設定（係数は自動で再計算される）
    pub fn set_pr_gains(&mut self, kp: f32, kr: f32) {
        self.pr.set_gains(kp, kr);
    }

    /// PRコントローラの出力リミットを設定
    pub fn set_pr_limits(&mut self, min: f32, max: f32) {
        self.pr.set_limits(min, max);
    }

    /// ソフトスタートを中断（出力は次周期から0になる）
    pub fn abort_soft_start(&mut self) {
        self.soft_start.abort();
    }

    /// 非常停止をラッチ
    pub fn emergency_stop(&mut self, now_ms: u64) {
        self.safety.emergency_stop(now_ms);
    }

    /// フォルトの一括クリアを試みる（デッドタイム経過前は無効）
    pub fn clear_faults(&mut self, now_ms: u64) -> bool {
        self.safety.clear_faults(now_ms)
    }

    // ---- 読み出しアクセサ ----

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn modulation_index(&self) -> f32 {
        self.modulator.modulation_index()
    }

    pub fn frequency_hz(&self) -> f32 {
        self.modulator.frequency_hz()
    }

    pub fn is_enabled(&self) -> bool {
        self.modulator.is_enabled()
    }

    pub fn soft_start_complete(&self) -> bool {
        self.soft_start.is_complete()
    }

    pub fn faults(&self) -> FaultFlags {
        self.safety.faults()
    }

    pub fn is_fault(&self) -> bool {
        self.safety.is_fault()
    }

    pub fn update_count(&self) -> u32 {
        self.update_count
    }

    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    #[cfg(test)]
    fn phase_index(&self) -> usize {
        self.modulator.phase_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_sensor() -> SensorData {
        let mut s = SensorData::new();
        s.output_current = 2.0;
        s.output_voltage = 80.0;
        s.dc_bus1_voltage = 48.0;
        s.dc_bus2_voltage = 48.0;
        s.valid = true;
        s
    }

    fn overcurrent_sensor() -> SensorData {
        let mut s = healthy_sensor();
        s.output_current = 20.0;
        s
    }

    #[test]
    fn test_healthy_period_produces_duties_and_advances() {
        let mut c = InverterControl::new(OperatingMode::OpenLoop, CarrierStrategy::PhaseShifted);
        c.start(0.8, 0);

        let out = c.step(&healthy_sensor(), 0);
        assert!(matches!(out, ControlOutput::Duties(_)));
        assert_eq!(c.update_count(), 1);
        assert_eq!(c.fault_count(), 0);
        // 50Hz at 5kHz: phase advances 2 entries per period
        assert_eq!(c.phase_index(), 2);
    }

    #[test]
    fn test_fault_skips_duty_computation_and_phase_advance() {
        let mut c = InverterControl::new(OperatingMode::OpenLoop, CarrierStrategy::PhaseShifted);
        c.start(0.8, 0);
        c.step(&healthy_sensor(), 0);
        let phase_before = c.phase_index();
        let count_before = c.update_count();

        // Overcurrent latches and shuts the period down
        let out = c.step(&overcurrent_sensor(), 200);
        assert_eq!(out, ControlOutput::Shutdown);
        assert_eq!(c.phase_index(), phase_before);
        assert_eq!(c.update_count(), count_before);
        assert_eq!(c.fault_count(), 1);
        assert!(c.faults().contains(FaultFlags::OVERCURRENT));

        // Still latched on the next period even with healthy readings
        let out = c.step(&healthy_sensor(), 400);
        assert_eq!(out, ControlOutput::Shutdown);
        assert_eq!(c.fault_count(), 2);
    }

    #[test]
    fn test_soft_start_overrides_index_while_ramping() {
        let mut c = InverterControl::new(OperatingMode::OpenLoop, CarrierStrategy::PhaseShifted);
        c.start(0.8, 0);

        c.step(&healthy_sensor(), 1000);
        assert!((c.modulation_index() - 0.4).abs() < 1e-3);
        assert!(!c.soft_start_complete());

        // A direct setter call loses against the ramp on the next period
        c.set_modulation_index(1.0);
        c.step(&healthy_sensor(), 1500);
        assert!((c.modulation_index() - 0.6).abs() < 1e-3);

        c.step(&healthy_sensor(), 2000);
        assert_eq!(c.modulation_index(), 0.8);
        assert!(c.soft_start_complete());
    }

    #[test]
    fn test_closed_loop_drives_index_after_ramp() {
        let mut c = InverterControl::new(
            OperatingMode::ClosedLoopCurrent,
            CarrierStrategy::PhaseShifted,
        );
        c.start(0.5, 0);

        // Run past the soft-start ramp
        let mut now = 0u64;
        while !c.soft_start_complete() {
            now += 1;
            c.step(&healthy_sensor(), now);
        }

        // PR output becomes the modulation index, inside its [0,1] limits
        for _ in 0..200 {
            c.step(&healthy_sensor(), now);
            let mi = c.modulation_index();
            assert!((0.0..=1.0).contains(&mi));
        }
    }

    #[test]
    fn test_pwm_test_mode_stays_at_safe_idle() {
        let mut c = InverterControl::new(OperatingMode::PwmTest, CarrierStrategy::PhaseShifted);
        c.start(0.8, 0);
        assert!(!c.is_enabled());

        match c.step(&healthy_sensor(), 0) {
            ControlOutput::Duties(d) => {
                let half = crate::config::PWM_PERIOD / 2;
                assert_eq!(d.hbridge1.ch1, half);
                assert_eq!(d.hbridge1.ch2, half);
                assert_eq!(d.hbridge2.ch1, half);
                assert_eq!(d.hbridge2.ch2, half);
            }
            ControlOutput::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn test_estop_and_dwell_gated_clear() {
        let mut c = InverterControl::new(OperatingMode::OpenLoop, CarrierStrategy::PhaseShifted);
        c.start(0.8, 0);
        c.step(&healthy_sensor(), 0);

        c.emergency_stop(100);
        assert_eq!(c.step(&healthy_sensor(), 200), ControlOutput::Shutdown);

        // Clear attempts inside the 5s dwell are no-ops
        assert!(!c.clear_faults(3000));
        assert_eq!(c.step(&healthy_sensor(), 3000), ControlOutput::Shutdown);

        // Past the dwell the latch clears and control resumes
        assert!(c.clear_faults(5200));
        assert!(matches!(
            c.step(&healthy_sensor(), 5400),
            ControlOutput::Duties(_)
        ));
    }
}
