//! Line transport abstraction
//!
//! Every exchange with a device is one line written followed by one or more
//! lines read back. Concrete transports (serial port, TCP socket, the
//! in-memory dummy device) live in their own crates and are selected by
//! explicit configuration when they are constructed.

use crate::error::Result;

/// Line-oriented transport to a device
///
/// A transport owns one read timeout, configured when it is created.
/// There is no internal locking: a transport serves one request at a time
/// and is handed from one facade to another by moving it.
pub trait Transport {
    /// Write one line to the device
    ///
    /// The line terminator is added by the transport.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Read one line from the device, without its terminator
    ///
    /// Returns `Ok(None)` if nothing arrived before the read timeout.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Close the underlying channel
    fn close(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write_line(&mut self, line: &str) -> Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        (**self).read_line()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_line(&mut self, line: &str) -> Result<()> {
        (**self).write_line(line)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        (**self).read_line()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
