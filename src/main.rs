#![no_std]
#![no_main]

mod fmt;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

mod benchmark;
mod config;
mod control;
mod hardware;
mod modulation;
mod pr_controller;
mod safety;
mod sensing;
mod soft_start;
mod state;
mod tasks;

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    gpio::{Level, Output, Speed},
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
    },
};
use embassy_time::{Duration, Timer};

use control::OperatingMode;
use fmt::*;
use modulation::CarrierStrategy;
use tasks::inverter_control::SensePins;
use tasks::{inverter_control_task, led_task, status_task};

/// 起動時の動作モードを選択してログ出力
///
/// コンパイル時スイッチではなく、ここで選んだ値をタスクへ渡します。
fn select_startup_mode() -> (OperatingMode, CarrierStrategy) {
    let mode = OperatingMode::OpenLoop;
    let strategy = CarrierStrategy::PhaseShifted;

    match mode {
        OperatingMode::PwmTest => {
            info!("Mode: PWM test (50% duty on all outputs)");
        }
        OperatingMode::OpenLoop => {
            info!(
                "Mode: Open loop ({}Hz, MI={})",
                config::DEFAULT_OUTPUT_FREQUENCY_HZ,
                config::DEFAULT_MODULATION_INDEX
            );
        }
        OperatingMode::ClosedLoopCurrent => {
            info!(
                "Mode: Closed-loop current control ({}A sine @ {}Hz)",
                config::closedloop::DEFAULT_CURRENT_AMPLITUDE_A,
                config::pr::FUNDAMENTAL_FREQ_HZ
            );
        }
    }
    match strategy {
        CarrierStrategy::PhaseShifted => info!("Carrier strategy: phase-shifted"),
        CarrierStrategy::LevelShifted => info!("Carrier strategy: level-shifted"),
    }

    (mode, strategy)
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let rcc_config = hardware::create_clock_config();
    let p = embassy_stm32::init(rcc_config);

    info!("=====================================");
    info!("  5-Level Cascaded H-Bridge Inverter");
    info!("  STM32G431VB @ 170MHz");
    info!("=====================================");

    // LED初期化＆タスク起動
    let led1 = Output::new(p.PC13, Level::High, Speed::Low);
    let led2 = Output::new(p.PC14, Level::High, Speed::Low);
    let led3 = Output::new(p.PC15, Level::High, Speed::Low);
    spawner.spawn(led_task(led1, led2, led3)).unwrap();

    // ADC初期化（制御ループ内の単発変換用に短いサンプル時間）
    let mut adc1 = Adc::new(p.ADC1);
    adc1.set_sample_time(SampleTime::CYCLES24_5);

    let sense_pins = SensePins {
        output_current: p.PA0.degrade_adc(),
        output_voltage: p.PA1.degrade_adc(),
        dc_bus1: p.PC0.degrade_adc(),
        dc_bus2: p.PC1.degrade_adc(),
    };
    info!("Current/voltage sensing on PA0/PA1/PC0/PC1 (ADC1)");

    // Hブリッジ1（TIM1、補完PWM + デッドタイム）
    let mut hb1_pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(
            p.PA8,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PB13,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PA9,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PB14,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        None,
        None,
        None,
        None,
        config::pwm::DEFAULT_FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    hardware::init_hbridge_pwm(&mut hb1_pwm);

    // Hブリッジ2（TIM8）
    let mut hb2_pwm = ComplementaryPwm::new(
        p.TIM8,
        Some(PwmPin::new(
            p.PC6,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PC10,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(PwmPin::new(
            p.PC7,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        Some(ComplementaryPwmPin::new(
            p.PC11,
            embassy_stm32::gpio::OutputType::PushPull,
        )),
        None,
        None,
        None,
        None,
        config::pwm::DEFAULT_FREQUENCY,
        CountingMode::EdgeAlignedUp,
    );
    hardware::init_hbridge_pwm(&mut hb2_pwm);

    // ベンチマーク実行
    unsafe {
        benchmark::enable_cycle_counter();
    }
    benchmark::run_sine_reference_benchmark(1000);

    // 動作モード選択（起動時の実行時設定値）
    let (mode, strategy) = select_startup_mode();

    info!("Starting inverter control...");

    // 制御タスクとステータスタスクを起動
    spawner
        .spawn(inverter_control_task(
            hb1_pwm, hb2_pwm, adc1, sense_pins, mode, strategy,
        ))
        .unwrap();
    spawner.spawn(status_task()).unwrap();

    // メインループ（将来の拡張用）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
