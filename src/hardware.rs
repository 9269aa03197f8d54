//! ハードウェア初期化モジュール
//!
//! ペリフェラルの初期化ロジックを集約します。

use embassy_stm32::{
    timer::{complementary_pwm::ComplementaryPwm, AdvancedInstance4Channel, Channel},
    Config,
};

use crate::config;
use crate::fmt::*;

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R; // システムクロックをPLLに設定

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// Hブリッジ用補完PWMを安全状態で初期化
///
/// 全チャネルを無効化した上でデッドタイムを設定し、コンペア値を
/// キャリア周期の50%（ゼロ出力）に置きます。出力の有効化は制御
/// タスクの責務です。
pub fn init_hbridge_pwm<T: AdvancedInstance4Channel>(pwm: &mut ComplementaryPwm<'static, T>) {
    pwm.disable(Channel::Ch1);
    pwm.disable(Channel::Ch2);
    pwm.set_dead_time(config::pwm::DEFAULT_DEAD_TIME);
    pwm.set_duty(Channel::Ch1, config::PWM_PERIOD / 2);
    pwm.set_duty(Channel::Ch2, config::PWM_PERIOD / 2);
    info!(
        "H-bridge PWM initialized: period={}, dead time={} counts",
        config::PWM_PERIOD,
        config::pwm::DEFAULT_DEAD_TIME
    );
}
