use defmt::*;
use embassy_stm32::exti::ExtiInput;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// Raised once when the operator asks the monitor to stop.
pub static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[embassy_executor::task]
pub async fn stop_button(mut button: ExtiInput<'static>) {
    // Pulled up, so a press reads low
    button.wait_for_high().await;
    info!("Press the stop button to end monitoring");
    button.wait_for_low().await;
    info!("Stop button pressed");
    STOP.signal(());
}
