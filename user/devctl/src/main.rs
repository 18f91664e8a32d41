use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    process::ExitCode,
    sync::Arc,
};

use chardev::CharDeviceModule;
use clap::{Parser, Subcommand, ValueEnum};
use gpio_control::GpioControl;
use kernel::{fs::OpenFile, logger::init_logger, print::dmesg, Kernel, ModuleSlot};

const CHAR_NODE: &str = "/dev/charDevice";
const GPIO_NODE: &str = "/dev/deviceFileGpioControl";

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long)]
    /// Load both modules into an in-process host instead of using /dev
    sim: bool,
    #[arg(long, requires = "sim")]
    /// Print the host log once the command has run
    dmesg: bool,
    #[arg(long, requires = "sim", value_name = "LEVEL")]
    /// Level driven on the GPIO input line before the command runs
    input: Option<u8>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a message in the character device
    Write {
        message: String,
        #[arg(short, long, default_value = CHAR_NODE)]
        device: String,
    },
    /// Read back what the character device holds
    Read {
        #[arg(short, long, default_value_t = chardev::KBUFFER_CAPACITY)]
        count: usize,
        #[arg(short, long, default_value = CHAR_NODE)]
        device: String,
    },
    /// Switch the LED
    Led {
        state: LedState,
        #[arg(short, long, default_value = GPIO_NODE)]
        device: String,
    },
    /// Print the level of the GPIO input line
    Pin {
        #[arg(short, long, default_value = GPIO_NODE)]
        device: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LedState {
    On,
    Off,
}

#[derive(Debug)]
enum DevctlError {
    Io(io::Error),
    Kernel(kernel::error::Error),
}

impl fmt::Display for DevctlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevctlError::Io(e) => write!(f, "{}", e),
            DevctlError::Kernel(e) => write!(f, "{}", e),
        }
    }
}

impl From<io::Error> for DevctlError {
    fn from(e: io::Error) -> Self {
        DevctlError::Io(e)
    }
}

impl From<kernel::error::Error> for DevctlError {
    fn from(e: kernel::error::Error) -> Self {
        DevctlError::Kernel(e)
    }
}

/// Both modules loaded into a private host.
struct Sim {
    kernel: Arc<Kernel>,
    _chardev: ModuleSlot<CharDeviceModule>,
    _gpio: ModuleSlot<GpioControl>,
}

impl Sim {
    fn load() -> Result<Sim, DevctlError> {
        let kernel = Kernel::new();
        let chardev = ModuleSlot::new(&kernel, "characterDevice");
        chardev.load()?;
        let gpio = ModuleSlot::new(&kernel, "gpioDriver");
        gpio.load()?;
        Ok(Sim {
            kernel,
            _chardev: chardev,
            _gpio: gpio,
        })
    }
}

enum Node {
    Dev(File),
    Sim(OpenFile),
}

impl Node {
    fn open(sim: Option<&Sim>, path: &str) -> Result<Node, DevctlError> {
        Ok(match sim {
            Some(sim) => Node::Sim(sim.kernel.open(path)?),
            None => Node::Dev(OpenOptions::new().read(true).write(true).open(path)?),
        })
    }

    /// One `write(2)`; the drivers may accept fewer bytes than offered.
    fn write(&mut self, data: &[u8]) -> Result<usize, DevctlError> {
        Ok(match self {
            Node::Dev(file) => file.write(data)?,
            Node::Sim(file) => file.write_bytes(data)?,
        })
    }

    /// One `read(2)` of at most `count` bytes.
    fn read(&mut self, count: usize) -> Result<Vec<u8>, DevctlError> {
        Ok(match self {
            Node::Dev(file) => {
                let mut buf = vec![0u8; count];
                let n = file.read(&mut buf)?;
                buf.truncate(n);
                buf
            }
            Node::Sim(file) => file.read_bytes(count)?,
        })
    }
}

fn run(cli: &Cli, sim: Option<&Sim>) -> Result<String, DevctlError> {
    if let (Some(sim), Some(level)) = (sim, cli.input) {
        sim.kernel
            .drive_input(gpio_control::config::INPUT_GPIO, level != 0)?;
    }
    match &cli.command {
        Commands::Write { message, device } => {
            let n = Node::open(sim, device)?.write(message.as_bytes())?;
            Ok(format!("wrote {} of {} bytes", n, message.len()))
        }
        Commands::Read { count, device } => {
            let data = Node::open(sim, device)?.read(*count)?;
            Ok(String::from_utf8_lossy(&data).into_owned())
        }
        Commands::Led { state, device } => {
            let command: &[u8] = match state {
                LedState::On => b"1",
                LedState::Off => b"0",
            };
            Node::open(sim, device)?.write(command)?;
            Ok(format!(
                "LED {}",
                match state {
                    LedState::On => "on",
                    LedState::Off => "off",
                }
            ))
        }
        Commands::Pin { device } => {
            let level = Node::open(sim, device)?.read(1)?;
            Ok(String::from_utf8_lossy(&level).into_owned())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let sim = if cli.sim {
        init_logger();
        match Sim::load() {
            Ok(sim) => Some(sim),
            Err(e) => {
                eprintln!("devctl: loading modules failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let result = run(&cli, sim.as_ref());
    if cli.dmesg {
        for record in dmesg() {
            println!("<{}>{}", record.level, record.text);
        }
    }
    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("devctl: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim_run(args: &[&str]) -> Result<String, DevctlError> {
        let cli = Cli::try_parse_from(args).unwrap();
        let sim = Sim::load().unwrap();
        run(&cli, Some(&sim))
    }

    #[test]
    fn write_reports_truncation() {
        let long = "a".repeat(300);
        let out = sim_run(&["devctl", "--sim", "write", &long]).unwrap();
        assert_eq!(out, "wrote 256 of 300 bytes");
    }

    #[test]
    fn fresh_buffer_reads_empty() {
        assert_eq!(sim_run(&["devctl", "--sim", "read"]).unwrap(), "");
    }

    #[test]
    fn led_and_pin() {
        assert_eq!(sim_run(&["devctl", "--sim", "led", "on"]).unwrap(), "LED on");
        assert_eq!(sim_run(&["devctl", "--sim", "pin"]).unwrap(), "0");
        assert_eq!(
            sim_run(&["devctl", "--sim", "--input", "1", "pin"]).unwrap(),
            "1"
        );
    }

    #[test]
    fn missing_node() {
        let err = sim_run(&["devctl", "--sim", "pin", "-d", "/dev/nothing"]).unwrap_err();
        assert!(matches!(err, DevctlError::Kernel(e) if e == kernel::code::ENOENT));
    }

    #[test]
    fn sim_only_flags_need_sim() {
        assert!(Cli::try_parse_from(["devctl", "--dmesg", "pin"]).is_err());
        assert!(Cli::try_parse_from(["devctl", "led", "blink"]).is_err());
    }
}
