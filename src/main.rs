// StrainLog - Firmware Entry Point
//
// Boot sequence:
//   1. Logger, peripherals, shared sensor I2C bus.
//   2. SHT45, LIS3DH and NAU7802 bring-up. A failed sensor is reported and
//      left disabled; the rest of the system keeps running.
//   3. SD card mount, playback of previously stored events.
//   4. Console reader thread, then the monitor loop on this thread.

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    env_logger::init();
    log::error!("strainlog firmware only runs on the ESP32-S3; use `cargo test` on the host");
}

#[cfg(target_os = "espidf")]
mod firmware {
    use std::cell::RefCell;
    use std::sync::mpsc;

    use embedded_hal_bus::i2c::RefCellDevice;
    use esp_idf_hal::delay::Delay;
    use esp_idf_hal::gpio::{AnyIOPin, Gpio33, Gpio34, Gpio35, Gpio36};
    use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_hal::prelude::*;
    use esp_idf_hal::sd::{spi::SdSpiHostDriver, SdCardConfiguration, SdCardDriver};
    use esp_idf_hal::spi::{config::DriverConfig, Dma, SpiDriver, SPI2};
    use esp_idf_svc::fs::fatfs::Fatfs;
    use esp_idf_svc::io::vfs::MountedFatfs;

    use strainlog::clock::SystemClock;
    use strainlog::commands::StrainBench;
    use strainlog::config::*;
    use strainlog::drivers::lis3dh::Lis3dh;
    use strainlog::drivers::nau7802::Nau7802;
    use strainlog::drivers::sht45::Sht45;
    use strainlog::events::HELP_TEXT;
    use strainlog::input::{spawn_reader, ConsoleInput};
    use strainlog::motion::MotionController;
    use strainlog::storage::{playback_events, FsStore};
    use strainlog::tasks::monitor::Monitor;

    pub fn run() -> anyhow::Result<()> {
        // Link esp-idf-sys runtime patches and initialise logging.
        esp_idf_svc::sys::link_patches();
        esp_idf_svc::log::EspLogger::initialize_default();
        log::info!("=== StrainLog receiver starting ===");

        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;

        // ---- Sensor I2C bus (shared by SHT45, LIS3DH and NAU7802) ----------
        log::info!(
            "Initializing I2C sensor bus (GPIO {}/{} @ {} kHz)",
            PIN_I2C_SENSOR_SDA,
            PIN_I2C_SENSOR_SCL,
            I2C_SENSOR_FREQ_KHZ
        );
        let i2c_config = I2cConfig::new().baudrate(I2C_SENSOR_FREQ_KHZ.kHz().into());
        let i2c = I2cDriver::new(
            peripherals.i2c1,
            pins.gpio41, // SDA
            pins.gpio42, // SCL
            &i2c_config,
        )?;
        let bus = RefCell::new(i2c);

        // ---- Sensors ------------------------------------------------------
        let mut sht45 = Sht45::new(RefCellDevice::new(&bus), I2C_ADDR_SHT45, Delay::new_default());
        match sht45.begin() {
            Ok(()) => log::info!("SHT45: OK"),
            Err(e) => log::error!("SHT45: FAILED ({e})"),
        }

        let mut lis3dh = Lis3dh::new(RefCellDevice::new(&bus), I2C_ADDR_LIS3DH);
        match lis3dh.begin(&mut Delay::new_default()) {
            Ok(()) => log::info!("LIS3DH: OK"),
            Err(e) => log::error!("LIS3DH: FAILED ({e}), motion events disabled"),
        }

        let mut adc = Nau7802::new(RefCellDevice::new(&bus), I2C_ADDR_NAU7802, Delay::new_default());
        let bench = match adc.begin() {
            Ok(()) => {
                log::info!("NAU7802: OK");
                Some(StrainBench::new(adc, BridgeConfig::default()))
            }
            Err(e) => {
                log::error!("NAU7802: FAILED ({e}), strain commands disabled");
                None
            }
        };

        // ---- SD card ------------------------------------------------------
        let _mounted = match mount_sd_card(
            peripherals.spi2,
            pins.gpio35, // SCK
            pins.gpio34, // MOSI
            pins.gpio33, // MISO
            pins.gpio36, // CS
        ) {
            Ok(mounted) => {
                log::info!("SD card mounted at {SD_MOUNT_POINT}");
                Some(mounted)
            }
            Err(e) => {
                log::error!("SD card initialization failed ({e:#}). Events will not be saved.");
                None
            }
        };
        let mut store = FsStore::new(SD_MOUNT_POINT);

        let config = MotionConfig::default();
        if let Err(e) = playback_events(
            &mut store,
            &config.events_dir,
            &config.event_prefix,
            &mut std::io::stdout(),
        ) {
            log::warn!("Event playback failed: {e:#}");
        }

        // ---- Console ------------------------------------------------------
        let (key_tx, key_rx) = mpsc::channel();
        spawn_reader(std::io::stdin(), key_tx)?;

        log::info!("=== Setup complete ===");
        log::info!(
            "Monitoring accelerometer, threshold {}.{:03} g on any axis",
            config.threshold_mg / 1000,
            config.threshold_mg % 1000
        );
        println!("{HELP_TEXT}");

        let controller = MotionController::new(
            lis3dh,
            sht45,
            store,
            SystemClock::new(),
            Delay::new_default(),
            config,
        );
        Monitor::new(controller, bench, ConsoleInput::new(key_rx), std::io::stdout()).run()
    }

    type SdCard = SdCardDriver<SdSpiHostDriver<'static, SpiDriver<'static>>>;

    fn mount_sd_card(
        spi: SPI2,
        sck: Gpio35,
        mosi: Gpio34,
        miso: Gpio33,
        cs: Gpio36,
    ) -> anyhow::Result<MountedFatfs<Fatfs<SdCard>>> {
        let spi = SpiDriver::new(
            spi,
            sck,
            mosi,
            Some(miso),
            &DriverConfig::default().dma(Dma::Auto(4096)),
        )?;
        let host = SdSpiHostDriver::new(
            spi,
            Some(cs),
            AnyIOPin::none(),
            AnyIOPin::none(),
            AnyIOPin::none(),
            None,
        )?;
        let card = SdCardDriver::new_spi(host, &SdCardConfiguration::new())?;
        Ok(MountedFatfs::mount(
            Fatfs::new_sdcard(0, card)?,
            SD_MOUNT_POINT,
            SD_MAX_OPEN_FILES,
        )?)
    }
}
