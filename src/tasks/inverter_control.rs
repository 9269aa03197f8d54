//! インバータ制御タスク
//!
//! 5kHz制御ループを実行します。毎周期、コマンド取り込み→センサ
//! 読み取り→制御コア実行→PWM書き込みの順で処理し、保護チェックが
//! デューティ計算とPWM書き込みに必ず先行します。

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    peripherals,
    timer::{complementary_pwm::ComplementaryPwm, AdvancedInstance4Channel, Channel},
};
use embassy_time::{Duration, Instant, Ticker};

use crate::config;
use crate::control::{ControlOutput, InverterControl, OperatingMode};
use crate::fmt::*;
use crate::modulation::{CarrierStrategy, HbridgeDuty};
use crate::sensing::{AdcSensor, SensingConfig};
use crate::state::{
    CLEAR_FAULTS_REQUEST, ESTOP_REQUEST, INVERTER_ENABLE, INVERTER_STATUS, PR_GAINS,
    TARGET_FREQUENCY, TARGET_MODULATION_INDEX,
};

/// 測定チャネル一式（ADC1）
pub struct SensePins {
    /// 出力電流（PA0 = ADC1_IN1）
    pub output_current: AnyAdcChannel<peripherals::ADC1>,
    /// 出力電圧（PA1 = ADC1_IN2）
    pub output_voltage: AnyAdcChannel<peripherals::ADC1>,
    /// DCバス1電圧（PC0 = ADC1_IN6）
    pub dc_bus1: AnyAdcChannel<peripherals::ADC1>,
    /// DCバス2電圧（PC1 = ADC1_IN7）
    pub dc_bus2: AnyAdcChannel<peripherals::ADC1>,
}

/// Hブリッジ1個分のデューティを書き込み
fn write_hbridge<T: AdvancedInstance4Channel>(
    pwm: &mut ComplementaryPwm<'static, T>,
    duty: HbridgeDuty,
) {
    pwm.set_duty(Channel::Ch1, duty.ch1);
    pwm.set_duty(Channel::Ch2, duty.ch2);
}

/// Hブリッジ1個分の出力を有効化
fn enable_hbridge<T: AdvancedInstance4Channel>(pwm: &mut ComplementaryPwm<'static, T>) {
    pwm.enable(Channel::Ch1);
    pwm.enable(Channel::Ch2);
}

/// Hブリッジ1個分の出力を無効化（両レグともオフ）
fn disable_hbridge<T: AdvancedInstance4Channel>(pwm: &mut ComplementaryPwm<'static, T>) {
    pwm.disable(Channel::Ch1);
    pwm.disable(Channel::Ch2);
}

/// インバータ制御タスク（5kHz制御ループ）
#[embassy_executor::task]
pub async fn inverter_control_task(
    mut hb1_pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    mut hb2_pwm: ComplementaryPwm<'static, peripherals::TIM8>,
    mut adc: Adc<'static, peripherals::ADC1>,
    mut pins: SensePins,
    mode: OperatingMode,
    strategy: CarrierStrategy,
) {
    info!("Inverter control task started");

    // 制御コアとセンサ換算器を初期化
    let mut control = InverterControl::new(mode, strategy);
    let mut sensor = AdcSensor::new(SensingConfig::default());

    info!(
        "Control parameters: Control freq={}Hz, PWM freq={}Hz, period={} counts",
        config::CONTROL_FREQUENCY_HZ,
        config::PWM_FREQUENCY_HZ,
        config::PWM_PERIOD
    );

    // 制御周期
    let mut ticker = Ticker::every(Duration::from_micros(config::DEFAULT_CONTROL_PERIOD_US));

    // 運転状態の追跡（PWMチャネル制御用）
    let mut was_enabled = false;
    let mut pwm_active = false;

    // コマンド変化検出用の前回値
    let mut last_target_mi = config::DEFAULT_MODULATION_INDEX;
    let mut last_target_freq = config::DEFAULT_OUTPUT_FREQUENCY_HZ;
    let mut last_gains = (config::pr::DEFAULT_KP, config::pr::DEFAULT_KR);

    // デバッグログ用カウンタ（1秒ごと = 5000周期に1回）
    let mut log_counter = 0u32;

    loop {
        ticker.next().await;
        let now_ms = Instant::now().as_millis();

        // 1. 運転有効チェック
        let inverter_enabled = *INVERTER_ENABLE.lock().await;
        if !inverter_enabled {
            if was_enabled {
                info!("Inverter control loop: disabling PWM outputs");
                was_enabled = false;
            }

            // 出力停止と制御状態リセット
            disable_hbridge(&mut hb1_pwm);
            disable_hbridge(&mut hb2_pwm);
            pwm_active = false;
            control.stop();
            continue;
        }

        // 運転開始時の処理
        if !was_enabled {
            let target = *TARGET_MODULATION_INDEX.lock().await;
            info!(
                "Inverter control loop: starting (soft-start to MI={})",
                target
            );
            control.start(target, now_ms);
            enable_hbridge(&mut hb1_pwm);
            enable_hbridge(&mut hb2_pwm);
            pwm_active = true;
            was_enabled = true;
        }

        // 2. コマンド取り込み（次周期ではなくこの周期の保護チェックに反映）
        {
            let mut estop = ESTOP_REQUEST.lock().await;
            if *estop {
                *estop = false;
                control.emergency_stop(now_ms);
                error!("Emergency stop latched");
            }
        }
        {
            let mut clear = CLEAR_FAULTS_REQUEST.lock().await;
            if *clear {
                *clear = false;
                if control.clear_faults(now_ms) {
                    info!("Faults cleared");
                } else {
                    warn!("Fault clear ignored (reset delay not elapsed)");
                }
            }
        }
        {
            let target_mi = *TARGET_MODULATION_INDEX.lock().await;
            if target_mi != last_target_mi {
                last_target_mi = target_mi;
                control.set_modulation_index(target_mi);
                info!("Modulation index command: {}", target_mi);
            }
        }
        {
            let target_freq = *TARGET_FREQUENCY.lock().await;
            if target_freq != last_target_freq {
                last_target_freq = target_freq;
                control.set_frequency(target_freq);
                info!("Frequency command: {}Hz", target_freq);
            }
        }
        {
            let gains = *PR_GAINS.lock().await;
            if gains != last_gains {
                last_gains = gains;
                control.set_pr_gains(gains.0, gains.1);
                info!("PR gains updated: Kp={}, Kr={}", gains.0, gains.1);
            }
        }

        // 3. センサ読み取り（短いサンプル時間の単発変換、変換時間は固定）
        let raw = [
            adc.blocking_read(&mut pins.output_current),
            adc.blocking_read(&mut pins.output_voltage),
            adc.blocking_read(&mut pins.dc_bus1),
            adc.blocking_read(&mut pins.dc_bus2),
        ];
        let sensor_data = *sensor.update(raw);

        // 4. 制御コア実行とPWM書き込み
        match control.step(&sensor_data, now_ms) {
            ControlOutput::Duties(duties) => {
                if !pwm_active {
                    info!("Safety latch released, PWM outputs re-enabled");
                    enable_hbridge(&mut hb1_pwm);
                    enable_hbridge(&mut hb2_pwm);
                    pwm_active = true;
                }
                write_hbridge(&mut hb1_pwm, duties.hbridge1);
                write_hbridge(&mut hb2_pwm, duties.hbridge2);
            }
            ControlOutput::Shutdown => {
                // フォルト：即時に全出力を遮断
                if pwm_active {
                    error!(
                        "Safety fault active (flags={}), PWM forced to safe state",
                        control.faults().bits()
                    );
                    disable_hbridge(&mut hb1_pwm);
                    disable_hbridge(&mut hb2_pwm);
                    pwm_active = false;
                }
            }
        }

        // 5. ステータススナップショット更新
        {
            let mut status = INVERTER_STATUS.lock().await;
            status.update_count = control.update_count();
            status.fault_count = control.fault_count();
            status.modulation_index = control.modulation_index();
            status.frequency_hz = control.frequency_hz();
            status.fault_bits = control.faults().bits();
            status.soft_start_complete = control.soft_start_complete();
            status.output_current = sensor_data.output_current;
            status.output_voltage = sensor_data.output_voltage;
            status.dc_bus1_voltage = sensor_data.dc_bus1_voltage;
            status.dc_bus2_voltage = sensor_data.dc_bus2_voltage;
        }

        // 6. デバッグログ（低頻度）
        log_counter += 1;
        if log_counter >= 5000 {
            log_counter = 0;
            debug!(
                "[Control] MI={}, Freq={}Hz, I={}A, Updates={}, Faults={}",
                control.modulation_index(),
                control.frequency_hz(),
                sensor_data.output_current,
                control.update_count(),
                control.fault_count()
            );
        }
    }
}
