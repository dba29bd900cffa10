use std::error::Error;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use memscope_core::prelude::*;
use memscope_utils::{LogFormat, LogLevel, LogSettings, init_with};
use tracing::{info, warn};

type CliResult<T> = Result<T, Box<dyn Error>>;

/// Inspect and manipulate the memory of a running process.
#[derive(Parser, Debug)]
#[command(name = "memscope")]
#[command(version)]
#[command(about = "Typed process memory access, std::string fields and hardware breakpoints", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Log format: pretty or json (overrides MEMSCOPE_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
    /// Target pointer width: 32 or 64
    #[arg(long, global = true, default_value = "64")]
    bits: Bitness,
    /// Text encoding for strings: utf8, latin1 or ascii
    #[arg(long, global = true, default_value = "utf8")]
    encoding: TextEncoding,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// List the supported data types and their widths
    Types,
    /// Encode a value and print its bytes in hex
    Encode
    {
        /// Data type (e.g. int32, dword_be, double, vec3, string)
        data_type: TypeTag,
        /// Value to encode; vectors are comma separated
        value: String,
    },
    /// Decode hex bytes as a value
    Decode
    {
        /// Data type (e.g. int32, dword_be, double, vec3, string)
        data_type: TypeTag,
        /// Bytes in hex, optionally separated by spaces
        hex: String,
    },
    /// Arm a hardware breakpoint on a simulated process and print its traps
    Watch
    {
        /// Data type at the watched address
        #[arg(long = "type", default_value = "int32")]
        data_type: TypeTag,
        /// Trigger: execute, write or readwrite
        #[arg(long, default_value = "write")]
        trigger: TriggerKind,
        /// Number of simulated traps to raise
        #[arg(long, default_value_t = 3)]
        hits: u64,
        /// Monitor poll interval in milliseconds
        #[arg(long, default_value_t = 100)]
        interval_ms: u64,
    },
}

fn main()
{
    let cli = Cli::parse();

    let mut settings = LogSettings::from_env();
    if let Some(level) = cli.log_level {
        settings = settings.with_level(level);
    }
    if let Some(format) = cli.log_format {
        settings = settings.with_format(format);
    }
    let _guard = match init_with(settings) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> CliResult<()>
{
    let codec = TypeCodec::new(cli.bits).with_encoding(cli.encoding);
    match cli.command {
        Commands::Types => {
            for data_type in DataType::ALL {
                let width = data_type
                    .width(cli.bits)
                    .map_or_else(|| "variable".to_string(), |w| format!("{w} bytes"));
                let be = if data_type.supports_big_endian() { "  (_be)" } else { "" };
                println!("{:<10} {width}{be}", data_type.name());
            }
            Ok(())
        }
        Commands::Encode { data_type, value } => {
            let value = parse_value(data_type, &value)?;
            let bytes = codec.encode(data_type, &value)?;
            println!("{}", to_hex(&bytes));
            Ok(())
        }
        Commands::Decode { data_type, hex } => {
            let bytes = from_hex(&hex)?;
            println!("{}", codec.decode(data_type, &bytes)?);
            Ok(())
        }
        Commands::Watch {
            data_type,
            trigger,
            hits,
            interval_ms,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let config = SessionConfig::from_env()
                .with_bitness(cli.bits)
                .with_poll_interval(Duration::from_millis(interval_ms));
            runtime.block_on(watch(config, data_type, trigger, hits))
        }
    }
}

async fn watch(config: SessionConfig, tag: TypeTag, trigger: TriggerKind, hits: u64) -> CliResult<()>
{
    const PID: ProcessId = ProcessId(0x1d00);
    let address = Address::from(0x0040_1000);

    let target = Arc::new(SimulatedTarget::new(PID));
    target.map_region(address, 0x1000);
    target.poke(address, b"watched value\0")?;

    let mut session = DebuggerSession::in_current_runtime(target.clone(), config)?;
    session.attach(PID, false)?;
    let register = session.set_hardware_breakpoint(PID, address, trigger, tag)?;
    let mut events = session.subscribe_register(register);
    for breakpoint in session.breakpoints() {
        println!("armed {breakpoint}");
    }

    for hit in 0..hits {
        target.inject_event(register, ThreadId::from(hit + 1), Address::from(0x0040_2000 + hit * 4));
        let wait = config.poll_interval * 10 + config.poll_timeout;
        match tokio::time::timeout(wait, events.recv()).await {
            Ok(Ok(event)) => println!("{}", event.describe()),
            Ok(Err(e)) => warn!(error = %e, "event stream interrupted"),
            Err(_) => warn!(hit, "no event within {wait:?}"),
        }
    }

    session.remove_hardware_breakpoint(PID, register)?;
    session.detach(PID)?;
    info!(free = session.free_registers(), "watch finished");
    Ok(())
}

fn parse_value(tag: TypeTag, text: &str) -> CliResult<Value>
{
    let text = text.trim();
    let value = match tag.data_type() {
        DataType::Int8 => Value::Int8(parse_int(text)?),
        DataType::UInt8 => Value::UInt8(parse_int(text)?),
        DataType::Int16 => Value::Int16(parse_int(text)?),
        DataType::UInt16 => Value::UInt16(parse_int(text)?),
        DataType::Int32 => Value::Int32(parse_int(text)?),
        DataType::UInt32 => Value::UInt32(parse_int(text)?),
        DataType::Int64 => Value::Int64(parse_int(text)?),
        DataType::UInt64 => Value::UInt64(parse_int(text)?),
        DataType::Pointer => Value::Pointer(parse_int(text)?),
        DataType::Float32 => Value::Float32(text.parse()?),
        DataType::Float64 => Value::Float64(text.parse()?),
        DataType::Bool => Value::Bool(matches!(text, "1" | "true" | "yes")),
        DataType::String => Value::from(text),
        DataType::Vector3 => {
            let [x, y, z] = parse_floats::<3>(text)?;
            Value::Vector3(Vector3 { x, y, z })
        }
        DataType::Vector4 => {
            let [x, y, z, w] = parse_floats::<4>(text)?;
            Value::Vector4(Vector4 { x, y, z, w })
        }
    };
    Ok(value)
}

/// Decimal, or hex with a `0x` prefix.
fn parse_int<T>(text: &str) -> CliResult<T>
where
    T: TryFrom<i128>,
{
    let wide = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i128::from_str_radix(hex, 16)?,
        None => text.parse::<i128>()?,
    };
    T::try_from(wide).map_err(|_| format!("{text} is out of range").into())
}

fn parse_floats<const N: usize>(text: &str) -> CliResult<[f32; N]>
{
    let parts: Vec<f32> = text
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<_, _>>()?;
    parts
        .try_into()
        .map_err(|parts: Vec<f32>| format!("expected {N} components, got {}", parts.len()).into())
}

fn to_hex(bytes: &[u8]) -> String
{
    bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}

fn from_hex(text: &str) -> CliResult<Vec<u8>>
{
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(format!("invalid hex digit '{bad}'").into());
    }
    if digits.len() % 2 != 0 {
        return Err("hex input must have an even number of digits".into());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).map_err(Into::into))
        .collect()
}
