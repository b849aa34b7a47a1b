use std::{error::Error, net::TcpListener, path::PathBuf, process};

use clap::Parser;
use log::info;
use mrpc::{CodecRegistry, Server, ServiceRegistry, codec::BincodeCodec};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Listen for new connections at address (a socket path with --unix)
    address: String,
    /// Listen on a Unix domain socket instead of TCP
    #[arg(long)]
    unix: bool,
    /// Extra codec type names served by the binary codec, e.g. --alias gob
    #[arg(long = "alias")]
    aliases: Vec<String>,
}

fn services() -> Result<ServiceRegistry, Box<dyn Error>> {
    let mut services = ServiceRegistry::new();
    services.register("Service.Add", |body: String| {
        Ok::<_, String>(format!("mrpc resp to {body}"))
    })?;
    services.register("Arith.Double", |n: u64| {
        n.checked_mul(2).ok_or_else(|| format!("{n} doubled overflows"))
    })?;
    Ok(services)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let mut codecs = CodecRegistry::default();
    for alias in &cli.aliases {
        codecs.register(alias.as_str(), BincodeCodec::new);
    }
    let server = Server::new(codecs, services()?);

    let socket = cli.unix.then(|| PathBuf::from(&cli.address));
    ctrlc::set_handler(move || {
        info!("shutting down");
        if let Some(path) = &socket {
            let _ = std::fs::remove_file(path);
        }
        process::exit(0);
    })?;

    if cli.unix {
        serve_unix(&server, &cli.address)?;
    } else {
        server.accept(&TcpListener::bind(&cli.address)?)?;
    }
    Ok(())
}

#[cfg(unix)]
fn serve_unix(server: &Server, path: &str) -> Result<(), Box<dyn Error>> {
    let listener = std::os::unix::net::UnixListener::bind(path)?;
    server.accept(&listener)?;
    Ok(())
}

#[cfg(not(unix))]
fn serve_unix(_: &Server, _: &str) -> Result<(), Box<dyn Error>> {
    Err("unix sockets are not supported on this platform".into())
}
