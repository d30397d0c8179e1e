//! Network transport - TCP client, as served by the vehicle simulator

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, Transport, TransportRead};
use tracing::debug;

pub const DEFAULT_PORT: u16 = 50001;

const READ_BUFFER_LEN: usize = 4096;

pub struct NetworkTransport {
    name: String,
    stream: TcpStream,
    buffer: Box<[u8]>,
}

impl NetworkTransport {
    /// Connect to `host:port`
    ///
    /// # Errors
    /// `DataSource` if the address does not resolve or the connection fails.
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ContractError> {
        let name = format!("tcp:{host}:{port}");
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| ContractError::data_source(&name, format!("cannot resolve: {e}")))?
            .collect();

        let mut last_error = None;
        for addr in &addrs {
            match TcpStream::connect_timeout(addr, timeout) {
                Ok(stream) => {
                    debug!(transport = %name, %addr, "opened socket connection");
                    return Self::from_stream(name, stream);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(ContractError::data_source(
            &name,
            match last_error {
                Some(e) => format!("unable to open socket connection: {e}"),
                None => "address resolved to nothing".to_string(),
            },
        ))
    }

    /// Wrap an already connected stream
    pub fn from_stream(name: impl Into<String>, stream: TcpStream) -> Result<Self, ContractError> {
        let name = name.into();
        stream
            .set_nodelay(true)
            .map_err(|e| ContractError::data_source(&name, e.to_string()))?;
        Ok(Self {
            name,
            stream,
            buffer: vec![0; READ_BUFFER_LEN].into_boxed_slice(),
        })
    }
}

impl Transport for NetworkTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, timeout: Duration) -> Result<TransportRead, ContractError> {
        // A zero timeout would mean "block forever"
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream
            .set_read_timeout(Some(timeout))
            .map_err(|e| ContractError::data_source(&self.name, e.to_string()))?;

        match self.stream.read(&mut self.buffer) {
            Ok(0) => Err(ContractError::data_source(
                &self.name,
                "connection closed by peer",
            )),
            Ok(n) => Ok(TransportRead::Data(Bytes::copy_from_slice(&self.buffer[..n]))),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(TransportRead::Idle)
            }
            Err(e) => Err(ContractError::data_source(&self.name, e.to_string())),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ContractError> {
        self.stream
            .write_all(data)
            .map_err(|e| ContractError::data_source(&self.name, e.to_string()))?;
        Ok(data.len())
    }
}
