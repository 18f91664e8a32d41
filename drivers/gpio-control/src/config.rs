//! Names and line numbers the module registers with.

pub const CLASS_NAME: &str = "classGpioControl";
pub const DRIVER_NAME: &str = "driverGpioControl";
pub const DEVICE_FILE_NAME: &str = "deviceFileGpioControl";

/// GPIO21 on the header, wired to the LED.
pub const LED_GPIO: u32 = 21;
/// GPIO20 on the header, the line whose state `read` reports.
pub const INPUT_GPIO: u32 = 20;

pub const LED_LABEL: &str = "gpioControl-led";
pub const INPUT_LABEL: &str = "gpioControl-input";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioConfig {
    pub class_name: &'static str,
    /// Name the device number region is registered under.
    pub driver_name: &'static str,
    pub device_file_name: &'static str,
    pub led_gpio: u32,
    pub input_gpio: u32,
}

impl Default for GpioConfig {
    fn default() -> Self {
        GpioConfig {
            class_name: CLASS_NAME,
            driver_name: DRIVER_NAME,
            device_file_name: DEVICE_FILE_NAME,
            led_gpio: LED_GPIO,
            input_gpio: INPUT_GPIO,
        }
    }
}
