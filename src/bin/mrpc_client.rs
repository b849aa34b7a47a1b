use std::error::Error;

use clap::Parser;
use mrpc::{Client, CodecRegistry, Options, Stream, codec::BincodeCodec};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address (a socket path with --unix)
    address: String,
    /// Connect to a Unix domain socket instead of TCP
    #[arg(long)]
    unix: bool,
    /// Codec type to negotiate
    #[arg(long, default_value = mrpc::codec::BINCODE)]
    codec: String,
    /// Number of calls to make
    #[arg(long, default_value_t = 5)]
    count: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let mut codecs = CodecRegistry::default();
    if !codecs.contains(&cli.codec) {
        // Unknown names are assumed to be aliases of the binary codec.
        codecs.register(cli.codec.as_str(), BincodeCodec::new);
    }

    let stream = connect(&cli)?;
    let mut client = Client::with_stream(stream, &Options::with_codec(&cli.codec), &codecs)?;

    for seq in 1..=cli.count {
        let reply: String = client.call("Service.Add", format!("req body,seq:{seq}"))?;
        println!("seq:{seq} reply:{reply}");
    }
    client.close()?;
    Ok(())
}

fn connect(cli: &Cli) -> Result<Box<dyn Stream>, Box<dyn Error>> {
    if cli.unix {
        #[cfg(unix)]
        return Ok(Box::new(std::os::unix::net::UnixStream::connect(
            &cli.address,
        )?));
        #[cfg(not(unix))]
        return Err("unix sockets are not supported on this platform".into());
    }
    Ok(Box::new(std::net::TcpStream::connect(&cli.address)?))
}
