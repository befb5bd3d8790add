#![no_std]
#![no_main]

#[path = "tasks/led_task.rs"]
mod led_task;
use crate::led_task::{led_task, LedMessage, LedState, LED_DATA};

#[path = "tasks/stop_button.rs"]
mod stop_button;
use crate::stop_button::{stop_button, STOP};

use core::cell::RefCell;

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;
use embassy_stm32::time::Hertz;
use embassy_time::{Delay, Duration, Timer};
use goal_sense::{Monitor, MonitorConfig};
use {defmt_rtt as _, panic_probe as _};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(Default::default());
    info!("Goal-line monitor starting");

    let monitoring_led = Output::new(p.PB15, Level::Low, Speed::Low);
    let goal_led = Output::new(p.PB14, Level::Low, Speed::Low);
    let fault_led = Output::new(p.PB13, Level::Low, Speed::Low);
    let button = ExtiInput::new(p.PC8, p.EXTI8, Pull::Up);

    let mut i2c_config = embassy_stm32::i2c::Config::default();
    i2c_config.timeout = Duration::from_millis(100); // Set a 100ms timeout

    // Bus traffic is blocking; only the settle and poll waits yield to the other tasks
    let i2c = I2c::new_blocking(p.I2C1, p.PB6, p.PB7, Hertz(100_000), i2c_config);

    spawner
        .spawn(led_task(monitoring_led, goal_led, fault_led))
        .unwrap();
    spawner.spawn(stop_button(button)).unwrap();
    spawner.spawn(monitor_task(i2c)).unwrap();
}

#[embassy_executor::task]
async fn monitor_task(i2c: I2c<'static, Blocking>) {
    let i2c_ref: RefCell<I2c<'static, Blocking>> = RefCell::new(i2c);
    let config = MonitorConfig::default();

    let outcome = {
        let mut monitor = Monitor::new(&i2c_ref, Delay, config);
        let started = monitor.start().await;
        match started {
            Ok(()) => {
                let _ = LED_DATA.try_send(LedMessage {
                    monitoring: Some(LedState::On),
                    ..Default::default()
                });
                info!("Monitoring... press the stop button to end.");

                let polls = monitor
                    .run(&STOP, |report| {
                        if let Some(latched) = report.goal_latched {
                            let _ = LED_DATA.try_send(LedMessage {
                                goal: Some(latched.into()),
                                ..Default::default()
                            });
                        }
                        if let Some(event) = report.goal {
                            debug!("goal edge: {:?}", event);
                        }
                    })
                    .await;
                debug!("{} polls before stop", polls);
                Ok(())
            }
            Err(e) => Err(e),
        }
        // monitor dropped here, multiplexer channels released
    };

    // Bus handed back on every path
    let _i2c = i2c_ref.into_inner();

    match outcome {
        Ok(()) => {
            LED_DATA
                .send(LedMessage {
                    monitoring: Some(LedState::Off),
                    goal: Some(LedState::Off),
                    fault: None,
                })
                .await;
        }
        Err(e) => {
            LED_DATA
                .send(LedMessage {
                    fault: Some(LedState::On),
                    ..Default::default()
                })
                .await;
            // let the LED task pick the message up before halting
            Timer::after_millis(10).await;
            defmt::panic!("No sensor detected on the required channels! Exiting. {:?}", e);
        }
    }
}
