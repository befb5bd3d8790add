use defmt::*;
use embassy_stm32::gpio::{Level, Output};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum LedState {
    Off,
    On,
}

impl From<bool> for LedState {
    fn from(on: bool) -> Self {
        if on {
            LedState::On
        } else {
            LedState::Off
        }
    }
}

impl From<LedState> for Level {
    fn from(state: LedState) -> Self {
        match state {
            LedState::On => Level::High,
            LedState::Off => Level::Low,
        }
    }
}

/// `None` leaves that LED as it is.
#[derive(Debug, Default, defmt::Format)]
pub struct LedMessage {
    pub monitoring: Option<LedState>,
    pub goal: Option<LedState>,
    pub fault: Option<LedState>,
}

pub static LED_DATA: Channel<CriticalSectionRawMutex, LedMessage, 4> = Channel::new();

#[embassy_executor::task]
pub async fn led_task(
    mut monitoring_led: Output<'static>,
    mut goal_led: Output<'static>,
    mut fault_led: Output<'static>,
) {
    loop {
        let message = LED_DATA.receive().await;
        trace!("LED update: {:?}", message);

        if let Some(state) = message.monitoring {
            monitoring_led.set_level(state.into());
        }
        if let Some(state) = message.goal {
            goal_led.set_level(state.into());
        }
        if let Some(state) = message.fault {
            fault_led.set_level(state.into());
        }
    }
}
