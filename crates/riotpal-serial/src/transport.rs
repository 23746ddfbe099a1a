//! Line transports over serial ports and TCP sockets

use riotpal_core::Transport;

use crate::error::Result;

/// Splits received bytes into lines
///
/// Lines end in `\n`; a preceding `\r` is dropped. Invalid UTF-8 is
/// replaced rather than rejected.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Take the next complete line, if any
    pub fn take_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take whatever is buffered as a final, unterminated line
    pub fn take_partial(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line: Vec<u8> = self.pending.drain(..).collect();
        Some(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string())
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

pub mod serial {
    //! Serial port transport implementation

    use super::*;
    use crate::config::SerialConfig;
    use crate::discovery::PortRegistry;
    use crate::error::SerialError;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::io::{Read, Write};

    /// Opens the port behind a [`SerialTransport`]
    ///
    /// Called once when the transport is created and again on every
    /// reconnect.
    pub trait PortOpener: Send {
        /// Open the port described by `config`
        fn open(&mut self, config: &SerialConfig) -> Result<Box<dyn SerialPort>>;
    }

    /// Opens ports through the operating system
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemOpener;

    impl PortOpener for SystemOpener {
        fn open(&mut self, config: &SerialConfig) -> Result<Box<dyn SerialPort>> {
            log::debug!("Serial connection {:?}", config);
            let port = serialport::new(&config.port, config.baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(config.timeout)
                .open()?;

            log::info!("Opened serial port {} at {} baud", config.port, config.baud_rate);
            Ok(port)
        }
    }

    /// Serial port transport
    ///
    /// A read that returns nothing at all is taken as a dropped connection:
    /// the port is closed and reopened once, and the read reports a timeout.
    /// If the reopen fails the port stays closed until the next request
    /// opens it again.
    pub struct SerialTransport {
        config: SerialConfig,
        opener: Box<dyn PortOpener>,
        port: Option<Box<dyn SerialPort>>,
        buffer: LineBuffer,
        registry: PortRegistry,
        closed: bool,
    }

    impl SerialTransport {
        /// Open a serial port
        pub fn open(config: SerialConfig) -> Result<Self> {
            Self::open_registered(config, &PortRegistry::new())
        }

        /// Open a serial port and record it in `registry`
        ///
        /// Fails with [`SerialError::PortInUse`] if the registry already
        /// holds the port.
        pub fn open_registered(config: SerialConfig, registry: &PortRegistry) -> Result<Self> {
            Self::with_opener(config, registry, SystemOpener)
        }

        /// Open a port through `opener` and record it in `registry`
        pub fn with_opener(
            config: SerialConfig,
            registry: &PortRegistry,
            opener: impl PortOpener + 'static,
        ) -> Result<Self> {
            registry.claim(&config.port)?;
            // Dropping on failure releases the claim
            let mut transport = Self {
                config,
                opener: Box::new(opener),
                port: None,
                buffer: LineBuffer::default(),
                registry: registry.clone(),
                closed: false,
            };
            let port = transport.open_port()?;
            transport.port = Some(port);
            Ok(transport)
        }

        fn open_port(&mut self) -> Result<Box<dyn SerialPort>> {
            let port = self.opener.open(&self.config)?;
            if !self.config.connect_wait.is_zero() {
                log::debug!("Waiting {:?} for the device", self.config.connect_wait);
                std::thread::sleep(self.config.connect_wait);
            }
            Ok(port)
        }

        /// Settings this transport was opened with
        pub fn config(&self) -> &SerialConfig {
            &self.config
        }

        fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
            if self.closed {
                return Err(SerialError::ConnectionFailed(format!(
                    "{} is closed",
                    self.config.port
                )));
            }
            let port = match self.port.take() {
                Some(port) => port,
                None => {
                    log::debug!("Reopening {}", self.config.port);
                    self.open_port()?
                }
            };
            Ok(self.port.insert(port))
        }

        fn reconnect(&mut self) {
            log::debug!("Reconnecting {} due to timeout", self.config.port);
            self.port = None;
            self.buffer.clear();
            match self.open_port() {
                Ok(port) => self.port = Some(port),
                Err(e) => log::warn!("Reconnecting {} failed: {}", self.config.port, e),
            }
        }

        fn fill(&mut self) -> Result<usize> {
            let mut chunk = [0u8; 256];
            let n = match self.port()?.read(&mut chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
                Err(e) => return Err(SerialError::from(e)),
            };
            self.buffer.extend(&chunk[..n]);
            Ok(n)
        }

        fn next_line(&mut self) -> Result<Option<String>> {
            loop {
                if let Some(line) = self.buffer.take_line() {
                    return Ok(Some(line));
                }
                if self.fill()? > 0 {
                    continue;
                }
                if let Some(line) = self.buffer.take_partial() {
                    return Ok(Some(line));
                }
                self.reconnect();
                return Ok(None);
            }
        }

        fn send(&mut self, line: &str) -> Result<()> {
            self.buffer.clear();
            let port = self.port()?;
            port.clear(ClearBuffer::Input)?;
            port.write_all(format!("{}\n", line).as_bytes())?;
            port.flush()?;
            Ok(())
        }
    }

    impl Transport for SerialTransport {
        fn write_line(&mut self, line: &str) -> riotpal_core::Result<()> {
            self.send(line).map_err(riotpal_core::Error::from)
        }

        fn read_line(&mut self) -> riotpal_core::Result<Option<String>> {
            self.next_line().map_err(riotpal_core::Error::from)
        }

        fn close(&mut self) -> riotpal_core::Result<()> {
            if !self.closed {
                log::debug!("Closing {}", self.config.port);
                self.closed = true;
                self.port = None;
                self.registry.release(&self.config.port);
            }
            Ok(())
        }
    }

    impl Drop for SerialTransport {
        fn drop(&mut self) {
            if !self.closed {
                self.registry.release(&self.config.port);
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::VecDeque;
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        /// State shared between a test and the ports it hands out
        #[derive(Debug, Default)]
        struct Link {
            /// Read results in order; an empty chunk reads as zero bytes,
            /// an exhausted queue as a timeout
            reads: VecDeque<Vec<u8>>,
            written: Vec<u8>,
            opens: usize,
            fail_open: bool,
        }

        type SharedLink = Arc<Mutex<Link>>;

        struct FakePort(SharedLink);

        impl Read for FakePort {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                match self.0.lock().unwrap().reads.pop_front() {
                    Some(chunk) => {
                        buf[..chunk.len()].copy_from_slice(&chunk);
                        Ok(chunk.len())
                    }
                    None => Err(std::io::ErrorKind::TimedOut.into()),
                }
            }
        }

        impl Write for FakePort {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().written.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl SerialPort for FakePort {
            fn name(&self) -> Option<String> {
                Some("fake".into())
            }
            fn baud_rate(&self) -> serialport::Result<u32> {
                Ok(115_200)
            }
            fn data_bits(&self) -> serialport::Result<DataBits> {
                Ok(DataBits::Eight)
            }
            fn flow_control(&self) -> serialport::Result<FlowControl> {
                Ok(FlowControl::None)
            }
            fn parity(&self) -> serialport::Result<Parity> {
                Ok(Parity::None)
            }
            fn stop_bits(&self) -> serialport::Result<StopBits> {
                Ok(StopBits::One)
            }
            fn timeout(&self) -> Duration {
                Duration::from_millis(10)
            }
            fn set_baud_rate(&mut self, _: u32) -> serialport::Result<()> {
                Ok(())
            }
            fn set_data_bits(&mut self, _: DataBits) -> serialport::Result<()> {
                Ok(())
            }
            fn set_flow_control(&mut self, _: FlowControl) -> serialport::Result<()> {
                Ok(())
            }
            fn set_parity(&mut self, _: Parity) -> serialport::Result<()> {
                Ok(())
            }
            fn set_stop_bits(&mut self, _: StopBits) -> serialport::Result<()> {
                Ok(())
            }
            fn set_timeout(&mut self, _: Duration) -> serialport::Result<()> {
                Ok(())
            }
            fn write_request_to_send(&mut self, _: bool) -> serialport::Result<()> {
                Ok(())
            }
            fn write_data_terminal_ready(&mut self, _: bool) -> serialport::Result<()> {
                Ok(())
            }
            fn read_clear_to_send(&mut self) -> serialport::Result<bool> {
                Ok(true)
            }
            fn read_data_set_ready(&mut self) -> serialport::Result<bool> {
                Ok(true)
            }
            fn read_ring_indicator(&mut self) -> serialport::Result<bool> {
                Ok(false)
            }
            fn read_carrier_detect(&mut self) -> serialport::Result<bool> {
                Ok(true)
            }
            fn bytes_to_read(&self) -> serialport::Result<u32> {
                Ok(0)
            }
            fn bytes_to_write(&self) -> serialport::Result<u32> {
                Ok(0)
            }
            fn clear(&self, _: ClearBuffer) -> serialport::Result<()> {
                Ok(())
            }
            fn try_clone(&self) -> serialport::Result<Box<dyn SerialPort>> {
                Ok(Box::new(FakePort(self.0.clone())))
            }
            fn set_break(&self) -> serialport::Result<()> {
                Ok(())
            }
            fn clear_break(&self) -> serialport::Result<()> {
                Ok(())
            }
        }

        struct FakeOpener(SharedLink);

        impl PortOpener for FakeOpener {
            fn open(&mut self, _config: &SerialConfig) -> Result<Box<dyn SerialPort>> {
                let mut link = self.0.lock().unwrap();
                link.opens += 1;
                if link.fail_open {
                    return Err(SerialError::ConnectionFailed("device gone".into()));
                }
                Ok(Box::new(FakePort(self.0.clone())))
            }
        }

        fn transport(registry: &PortRegistry) -> (SerialTransport, SharedLink) {
            let link = SharedLink::default();
            let transport = SerialTransport::with_opener(
                SerialConfig::new("/dev/ttyFAKE0"),
                registry,
                FakeOpener(link.clone()),
            )
            .unwrap();
            (transport, link)
        }

        fn opens(link: &SharedLink) -> usize {
            link.lock().unwrap().opens
        }

        #[test]
        fn test_line_exchange() {
            let registry = PortRegistry::new();
            let (mut transport, link) = transport(&registry);
            assert_eq!(transport.config().port, "/dev/ttyFAKE0");
            assert!(registry.is_open("/dev/ttyFAKE0"));

            link.lock().unwrap().reads.extend([b"0,0x".to_vec(), b"2a\r\n0\n".to_vec()]);
            transport.write_line("rr 0 1").unwrap();
            assert_eq!(transport.read_line().unwrap().as_deref(), Some("0,0x2a"));
            assert_eq!(transport.read_line().unwrap().as_deref(), Some("0"));
            assert_eq!(link.lock().unwrap().written, b"rr 0 1\n");
            assert_eq!(opens(&link), 1);

            transport.close().unwrap();
            assert!(!registry.is_open("/dev/ttyFAKE0"));
            assert!(transport.write_line("ex").is_err());
        }

        #[test]
        fn test_empty_read_reconnects_once() {
            let registry = PortRegistry::new();
            let (mut transport, link) = transport(&registry);
            link.lock().unwrap().reads.push_back(Vec::new());

            assert_eq!(transport.read_line().unwrap(), None);
            assert_eq!(opens(&link), 2);

            // A timed out read counts as empty as well
            assert_eq!(transport.read_line().unwrap(), None);
            assert_eq!(opens(&link), 3);

            link.lock().unwrap().reads.push_back(b"0\n".to_vec());
            transport.write_line("ex").unwrap();
            assert_eq!(transport.read_line().unwrap().as_deref(), Some("0"));
            assert_eq!(opens(&link), 3);
        }

        #[test]
        fn test_partial_line_does_not_reconnect() {
            let registry = PortRegistry::new();
            let (mut transport, link) = transport(&registry);
            link.lock().unwrap().reads.push_back(b"0,0x2a".to_vec());

            assert_eq!(transport.read_line().unwrap().as_deref(), Some("0,0x2a"));
            assert_eq!(opens(&link), 1);
        }

        #[test]
        fn test_failed_reconnect_times_out_without_retry() {
            let registry = PortRegistry::new();
            let (mut transport, link) = transport(&registry);
            link.lock().unwrap().fail_open = true;

            assert_eq!(transport.read_line().unwrap(), None);
            assert_eq!(opens(&link), 2);

            // The next request opens the port again
            assert!(transport.write_line("ex").is_err());
            assert_eq!(opens(&link), 3);
            link.lock().unwrap().fail_open = false;
            transport.write_line("ex").unwrap();
            assert_eq!(opens(&link), 4);
            assert_eq!(link.lock().unwrap().written, b"ex\n");
            assert!(registry.is_open("/dev/ttyFAKE0"));
        }

        #[test]
        fn test_failed_open_releases_claim() {
            let registry = PortRegistry::new();
            let link = SharedLink::default();
            link.lock().unwrap().fail_open = true;
            let res = SerialTransport::with_opener(
                SerialConfig::new("/dev/ttyFAKE1"),
                &registry,
                FakeOpener(link.clone()),
            );
            assert!(matches!(res, Err(SerialError::ConnectionFailed(_))));
            assert!(!registry.is_open("/dev/ttyFAKE1"));
        }
    }
}

pub mod tcp {
    //! TCP socket transport implementation

    use super::*;
    use crate::discovery::PortRegistry;
    use crate::error::SerialError;
    use std::io::{Read, Write};
    use std::net::{Shutdown, TcpStream};
    use std::time::Duration;

    /// TCP socket transport, for devices behind a serial-to-network bridge
    pub struct TcpTransport {
        addr: String,
        stream: Option<TcpStream>,
        buffer: LineBuffer,
        registry: PortRegistry,
    }

    impl TcpTransport {
        /// Connect to `host:port` with the given read timeout
        pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
            Self::connect_registered(host, port, timeout, &PortRegistry::new())
        }

        /// Connect and record the address in `registry`
        pub fn connect_registered(
            host: &str,
            port: u16,
            timeout: Duration,
            registry: &PortRegistry,
        ) -> Result<Self> {
            let addr = format!("{}:{}", host, port);
            registry.claim(&addr)?;
            match Self::open_stream(&addr, timeout) {
                Ok(stream) => Ok(Self {
                    addr,
                    stream: Some(stream),
                    buffer: LineBuffer::default(),
                    registry: registry.clone(),
                }),
                Err(e) => {
                    registry.release(&addr);
                    Err(e)
                }
            }
        }

        fn open_stream(addr: &str, timeout: Duration) -> Result<TcpStream> {
            log::info!("Connecting to {}", addr);

            let stream = TcpStream::connect(addr)
                .map_err(|e| SerialError::ConnectionFailed(e.to_string()))?;

            stream.set_nodelay(true).map_err(|e| {
                SerialError::ConnectionFailed(format!("Failed to set TCP_NODELAY: {}", e))
            })?;
            stream.set_read_timeout(Some(timeout)).map_err(|e| {
                SerialError::ConnectionFailed(format!("Failed to set read timeout: {}", e))
            })?;

            log::info!("Connected to {}", addr);
            Ok(stream)
        }

        fn stream(&mut self) -> Result<&mut TcpStream> {
            self.stream
                .as_mut()
                .ok_or_else(|| SerialError::ConnectionFailed(format!("{} is closed", self.addr)))
        }

        fn next_line(&mut self) -> Result<Option<String>> {
            loop {
                if let Some(line) = self.buffer.take_line() {
                    return Ok(Some(line));
                }
                let mut chunk = [0u8; 256];
                let n = match self.stream()?.read(&mut chunk) {
                    Ok(0) => {
                        log::warn!("{} closed by peer", self.addr);
                        return Ok(self.buffer.take_partial());
                    }
                    Ok(n) => n,
                    Err(e)
                        if e.kind() == std::io::ErrorKind::TimedOut
                            || e.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        return Ok(self.buffer.take_partial());
                    }
                    Err(e) => return Err(SerialError::from(e)),
                };
                self.buffer.extend(&chunk[..n]);
            }
        }

        fn send(&mut self, line: &str) -> Result<()> {
            self.buffer.clear();
            let stream = self.stream()?;
            stream.write_all(format!("{}\n", line).as_bytes())?;
            stream.flush()?;
            Ok(())
        }
    }

    impl Transport for TcpTransport {
        fn write_line(&mut self, line: &str) -> riotpal_core::Result<()> {
            self.send(line).map_err(riotpal_core::Error::from)
        }

        fn read_line(&mut self) -> riotpal_core::Result<Option<String>> {
            self.next_line().map_err(riotpal_core::Error::from)
        }

        fn close(&mut self) -> riotpal_core::Result<()> {
            if let Some(stream) = self.stream.take() {
                log::debug!("Closing {}", self.addr);
                let _ = stream.shutdown(Shutdown::Both);
                self.registry.release(&self.addr);
            }
            Ok(())
        }
    }

    impl Drop for TcpTransport {
        fn drop(&mut self) {
            if self.stream.is_some() {
                self.registry.release(&self.addr);
            }
        }
    }

}
