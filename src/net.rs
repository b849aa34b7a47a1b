//! Byte streams and listeners the server runs on.
//!
//! The server never creates sockets itself. It is handed a [`Listener`] that
//! yields [`Stream`]s, which keeps startup and socket options with the caller
//! and lets tests drive connections over in-process socket pairs.
use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpListener, TcpStream},
};

/// A bidirectional byte stream whose halves can be used from separate threads.
pub trait Stream: Read + Write + Send + 'static {
    /// Returns a new handle to the same underlying stream.
    fn try_clone_stream(&self) -> io::Result<Box<dyn Stream>>;

    /// Shuts down both directions; every handle observes end-of-stream.
    fn shutdown(&self) -> io::Result<()>;

    /// Human readable peer description for logs.
    fn peer(&self) -> String;
}

/// Source of incoming streams. `accept` blocks until the next one arrives.
pub trait Listener {
    fn accept_stream(&self) -> io::Result<Box<dyn Stream>>;

    fn local(&self) -> String;
}

impl Stream for TcpStream {
    fn try_clone_stream(&self) -> io::Result<Box<dyn Stream>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }

    fn peer(&self) -> String {
        self.peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| String::from("unknown"))
    }
}

impl Listener for TcpListener {
    fn accept_stream(&self) -> io::Result<Box<dyn Stream>> {
        let (stream, _) = self.accept()?;
        Ok(Box::new(stream))
    }

    fn local(&self) -> String {
        self.local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| String::from("unknown"))
    }
}

#[cfg(unix)]
mod unix {
    use std::{
        io,
        net::Shutdown,
        os::unix::net::{UnixListener, UnixStream},
    };

    use super::{Listener, Stream};

    impl Stream for UnixStream {
        fn try_clone_stream(&self) -> io::Result<Box<dyn Stream>> {
            Ok(Box::new(self.try_clone()?))
        }

        fn shutdown(&self) -> io::Result<()> {
            UnixStream::shutdown(self, Shutdown::Both)
        }

        fn peer(&self) -> String {
            match self.peer_addr() {
                Ok(addr) => match addr.as_pathname() {
                    Some(path) => path.display().to_string(),
                    None => String::from("unix:unnamed"),
                },
                Err(_) => String::from("unknown"),
            }
        }
    }

    impl Listener for UnixListener {
        fn accept_stream(&self) -> io::Result<Box<dyn Stream>> {
            let (stream, _) = self.accept()?;
            Ok(Box::new(stream))
        }

        fn local(&self) -> String {
            match self.local_addr() {
                Ok(addr) => match addr.as_pathname() {
                    Some(path) => path.display().to_string(),
                    None => String::from("unix:unnamed"),
                },
                Err(_) => String::from("unknown"),
            }
        }
    }
}
