//! The [`Transport`] trait.
use bytes::Bytes;
use std::io;

use crate::{Result, protocol::ClientCommand};

/// A buffered stream which can send and receive mysql packets.
///
/// The connection phase, authentication included, is done before the
/// stream is handed to a [`Connection`][crate::Connection], a transport
/// only carries the command phase.
pub trait Transport {
    /// Send a command to the server.
    ///
    /// Every command starts a new packet sequence.
    ///
    /// Note that this send is buffered, caller must also call
    /// [`flush`][Transport::flush] afterwards.
    fn send<C: ClientCommand>(&mut self, command: C);

    /// Flush the underlying io.
    fn flush(&mut self) -> io::Result<()>;

    /// Receive one packet payload.
    ///
    /// Calling `recv` will also [`flush`][Transport::flush] if there is
    /// buffered command. Payloads split over multiple packets are returned
    /// joined.
    fn recv(&mut self) -> Result<Bytes>;
}

impl<T> Transport for &mut T where T: Transport {
    fn send<C: ClientCommand>(&mut self, command: C) {
        T::send(self, command);
    }

    fn flush(&mut self) -> io::Result<()> {
        T::flush(self)
    }

    fn recv(&mut self) -> Result<Bytes> {
        T::recv(self)
    }
}
