use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use rusty_bridge::client::BridgeClient;
use rusty_bridge::config::BridgeConfig;
use rusty_bridge::loader::{HexImage, Loader};
use rusty_bridge::protocol::CommandServer;
use rusty_bridge::sim::simulated_bridge;
use rusty_bridge::transport::{open_serial, ByteTransport, StreamTransport};
use rusty_bridge::{Address, BridgeError};

#[derive(Parser)]
#[clap(author, about, long_about = None, version)]
struct Cli {
    /// JSON configuration file.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the bridge firmware against the simulated target.
    Serve {
        /// Accept TCP connections on this address instead of using stdio.
        #[clap(long)]
        listen: Option<String>,
    },
    /// Uploads an Intel HEX image with verify and retry.
    Load {
        hex: PathBuf,
        #[clap(flatten)]
        link: Link,
    },
    /// Reads one byte of target memory.
    Read {
        #[clap(value_parser = parse_hex_u16)]
        address: u16,
        #[clap(flatten)]
        link: Link,
    },
    /// Writes one byte of target memory.
    Write {
        #[clap(value_parser = parse_hex_u16)]
        address: u16,
        #[clap(value_parser = parse_hex_u8)]
        value: u8,
        #[clap(flatten)]
        link: Link,
    },
}

#[derive(Args)]
struct Link {
    /// Serial device of the bridge.
    #[clap(long, conflicts_with = "connect")]
    port: Option<String>,
    /// host:port of a bridge served over TCP.
    #[clap(long)]
    connect: Option<String>,
    #[clap(long)]
    baud: Option<u32>,
}

fn parse_hex_u16(text: &str) -> Result<u16, String> {
    let digits = text
        .trim_start_matches("0x")
        .trim_start_matches('$');
    u16::from_str_radix(digits, 16).map_err(|e| format!("'{text}' is not a 16-bit hex value: {e}"))
}

fn parse_hex_u8(text: &str) -> Result<u8, String> {
    let digits = text.trim_start_matches("0x");
    u8::from_str_radix(digits, 16).map_err(|e| format!("'{text}' is not an 8-bit hex value: {e}"))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), BridgeError> {
    let config = match &cli.config {
        Some(path) => BridgeConfig::from_json_file(path)?,
        None => BridgeConfig::default(),
    };

    match cli.command {
        Command::Serve { listen } => serve(&config, listen.as_deref()),
        Command::Load { hex, link } => {
            let image = HexImage::from_file(&hex)?;
            log::info!(
                "{}: {} bytes in {} segments",
                hex.display(),
                image.len(),
                image.segments().len()
            );
            let mut client = connect(&config, &link)?;
            let report = Loader::new(&config.loader).load(&mut client, &image)?;
            println!("DONE, {} RETRIES", report.retries);
            Ok(())
        }
        Command::Read { address, link } => {
            let address = Address::new(address);
            let value = connect(&config, &link)?.read_byte(address)?;
            println!("{address} = {value:02x}");
            Ok(())
        }
        Command::Write {
            address,
            value,
            link,
        } => connect(&config, &link)?.write_byte(Address::new(address), value),
    }
}

fn serve(config: &BridgeConfig, listen: Option<&str>) -> Result<(), BridgeError> {
    let mut server = CommandServer::new(simulated_bridge(config), config.protocol.clone());
    match listen {
        None => server.serve(&mut StreamTransport::stdio()),
        Some(address) => {
            let listener = TcpListener::bind(address)?;
            log::info!("listening on {address}");
            for stream in listener.incoming() {
                let stream = stream?;
                log::info!("connection from {}", stream.peer_addr()?);
                let mut transport = StreamTransport::tcp(stream, config.protocol.input_timeout())?;
                if let Err(e) = server.serve(&mut transport) {
                    log::warn!("connection dropped: {e}");
                }
            }
            Ok(())
        }
    }
}

fn connect(
    config: &BridgeConfig,
    link: &Link,
) -> Result<BridgeClient<Box<dyn ByteTransport>>, BridgeError> {
    let transport: Box<dyn ByteTransport> = match (&link.connect, &link.port) {
        (Some(address), _) => {
            let stream = TcpStream::connect(address)?;
            Box::new(StreamTransport::tcp(stream, Some(config.serial.timeout()))?)
        }
        (None, port) => {
            let path = port
                .as_deref()
                .or(config.serial.port.as_deref())
                .ok_or(BridgeError::NoSerialPort)?;
            let baud = link.baud.unwrap_or(config.serial.baud_rate);
            Box::new(open_serial(path, baud, config.serial.timeout())?)
        }
    };
    Ok(BridgeClient::new(transport, config.protocol.echo_input))
}
