//! Ring lights on a GPIO pin, dimmed with software PWM (feature `hardware`).
use rppal::gpio::{Gpio, OutputPin};
use station_traits::{BoxError, Lights};

use crate::error::{HwError, Result};

/// High enough that the camera exposure does not catch the flicker.
const PWM_HZ: f64 = 500.0;

pub struct GpioLights {
    pin: OutputPin,
}

impl GpioLights {
    /// Claim BCM pin `bcm`, starting dark.
    pub fn new(bcm: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio
            .get(bcm)
            .map_err(|e| HwError::Gpio(format!("pin {bcm}: {e}")))?
            .into_output_low();
        Ok(Self { pin })
    }
}

impl Lights for GpioLights {
    fn set_level(&mut self, level: f32) -> std::result::Result<(), BoxError> {
        let level = level.clamp(0.0, 1.0);
        if level <= 0.0 || level >= 1.0 {
            self.pin.clear_pwm()?;
            if level > 0.0 {
                self.pin.set_high();
            } else {
                self.pin.set_low();
            }
        } else {
            self.pin.set_pwm_frequency(PWM_HZ, f64::from(level))?;
        }
        tracing::debug!(level, "lights level set");
        Ok(())
    }
}
