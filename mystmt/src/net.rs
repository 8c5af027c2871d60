//! Packet framing over a byte stream.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    io::{self, Read, Write},
    net::TcpStream,
};

use crate::{
    Result,
    common::{span, verbose},
    connection::Config,
    protocol::{self, ClientCommand, MAX_PAYLOAD, ProtocolError},
    transport::Transport,
};

const DEFAULT_BUF_CAPACITY: usize = 8 * 1024;
const HEADER_LEN: usize = 4;

/// Buffered mysql packet stream.
///
/// Each packet is a 3 byte little endian payload length and a 1 byte
/// sequence id followed by the payload. A payload of `0xFFFFFF` bytes or
/// more is split, and a payload of exactly a multiple of `0xFFFFFF` bytes
/// is terminated by an empty packet.
#[derive(Debug)]
pub struct PacketStream<S = TcpStream> {
    io: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    scratch: BytesMut,
    seq: u8,
}

impl PacketStream<TcpStream> {
    /// Open a tcp connection with the configured timeouts.
    ///
    /// The stream is returned right after the socket is opened, the
    /// handshake is up to the caller.
    pub fn connect(config: &Config) -> io::Result<Self> {
        let io = TcpStream::connect((config.host.as_str(), config.port))?;
        io.set_nodelay(true)?;
        io.set_read_timeout(config.read_timeout)?;
        io.set_write_timeout(config.write_timeout)?;
        Ok(Self::new(io))
    }
}

impl<S: Read + Write> PacketStream<S> {
    pub fn new(io: S) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            scratch: BytesMut::new(),
            seq: 0,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.io
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }

    pub fn into_inner(self) -> S {
        self.io
    }

    /// Sequence id of the next packet.
    pub fn sequence(&self) -> u8 {
        self.seq
    }

    /// Buffer a payload continuing the current sequence.
    ///
    /// Used by the connection phase, where the sequence spans the whole
    /// handshake.
    pub fn send_packet(&mut self, payload: &[u8]) {
        let last_full = payload.len() % MAX_PAYLOAD == 0;

        self.write_buf.reserve(payload.len() + HEADER_LEN * (payload.len() / MAX_PAYLOAD + 1));

        for chunk in payload.chunks(MAX_PAYLOAD) {
            self.write_header(chunk.len());
            self.write_buf.put_slice(chunk);
        }
        if last_full {
            self.write_header(0);
        }
    }

    fn write_header(&mut self, len: usize) {
        self.write_buf.put_uint_le(len as u64, 3);
        self.write_buf.put_u8(self.seq);
        self.seq = self.seq.wrapping_add(1);
    }

    /// Receive one payload continuing the current sequence.
    pub fn recv_packet(&mut self) -> Result<Bytes> {
        if !self.write_buf.is_empty() {
            self.flush_buf()?;
        }

        let mut payload = BytesMut::new();
        loop {
            self.fill(HEADER_LEN)?;
            let len = u32::from_le_bytes([self.read_buf[0], self.read_buf[1], self.read_buf[2], 0]) as usize;
            let seq = self.read_buf[3];

            if seq != self.seq {
                return Err(ProtocolError::sequence(self.seq, seq).into());
            }
            self.seq = self.seq.wrapping_add(1);

            self.fill(HEADER_LEN + len)?;
            self.read_buf.advance(HEADER_LEN);
            let chunk = self.read_buf.split_to(len);

            verbose!(len, seq, "packet received");

            if payload.is_empty() && len < MAX_PAYLOAD {
                return Ok(chunk.freeze());
            }
            payload.unsplit(chunk);
            if len < MAX_PAYLOAD {
                return Ok(payload.freeze());
            }
        }
    }

    fn fill(&mut self, len: usize) -> io::Result<()> {
        while self.read_buf.len() < len {
            let start = self.read_buf.len();
            self.read_buf.resize(start + (len - start).max(DEFAULT_BUF_CAPACITY), 0);

            let read = loop {
                match self.io.read(&mut self.read_buf[start..]) {
                    Ok(read) => break read,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.read_buf.truncate(start);
                        return Err(e);
                    }
                }
            };
            self.read_buf.truncate(start + read);

            if read == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
        }
        Ok(())
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        self.io.write_all(&self.write_buf)?;
        self.write_buf.clear();
        self.io.flush()
    }
}

impl<S: Read + Write> Transport for PacketStream<S> {
    fn send<C: ClientCommand>(&mut self, command: C) {
        span!("send", command = C::COMMAND);

        self.seq = 0;
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        protocol::command::write(command, &mut scratch);
        self.send_packet(&scratch);
        self.scratch = scratch;

        verbose!(seq = self.seq, "command buffered");
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()
    }

    fn recv(&mut self) -> Result<Bytes> {
        self.recv_packet()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::command::{Ping, Query};
    use std::io::Cursor;

    /// In memory duplex, reads from `input`, writes to `output`.
    #[derive(Default)]
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn stream(input: Vec<u8>) -> PacketStream<Duplex> {
        PacketStream::new(Duplex { input: Cursor::new(input), output: vec![] })
    }

    #[test]
    fn command_resets_sequence() {
        let mut io = stream(vec![]);
        io.send(Ping);
        io.send(Query { sql: "DO 1" });
        io.flush().unwrap();
        let expect: &[u8] = b"\x01\x00\x00\x00\x0E\x05\x00\x00\x00\x03DO 1";
        assert_eq!(io.get_ref().output, expect);
        assert_eq!(io.sequence(), 1);
    }

    #[test]
    fn receive_checks_sequence() {
        let mut io = stream(vec![1, 0, 0, 1, 0x00, 1, 0, 0, 9, 0x00]);
        io.send(Ping);
        assert_eq!(&io.recv().unwrap()[..], &[0x00]);
        let err = io.recv().unwrap_err();
        assert!(matches!(
            err.kind(),
            crate::ErrorKind::Protocol(ProtocolError::Sequence { expect: 2, found: 9 })
        ));
    }

    #[test]
    fn eof_is_io_error() {
        let mut io = stream(vec![5, 0, 0, 0, 1]);
        let err = io.recv().unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(err.kind(), crate::ErrorKind::Io(_)));
    }

    #[test]
    fn large_payload_split_and_joined() {
        let payload = vec![7u8; MAX_PAYLOAD + 10];
        let mut writer = stream(vec![]);
        writer.send_packet(&payload);
        writer.flush().unwrap();
        let wire = std::mem::take(&mut writer.get_mut().output);
        assert_eq!(wire.len(), payload.len() + 2 * HEADER_LEN);
        assert_eq!(&wire[..4], &[0xFF, 0xFF, 0xFF, 0]);
        assert_eq!(&wire[HEADER_LEN + MAX_PAYLOAD..][..4], &[10, 0, 0, 1]);

        let mut reader = stream(wire);
        let joined = reader.recv().unwrap();
        assert_eq!(joined.len(), payload.len());
        assert_eq!(reader.sequence(), 2);
    }

    #[test]
    fn exact_multiple_gets_empty_terminator() {
        let mut writer = stream(vec![]);
        writer.send_packet(&vec![1u8; MAX_PAYLOAD]);
        writer.flush().unwrap();
        let wire = &writer.get_ref().output;
        assert_eq!(wire.len(), MAX_PAYLOAD + 2 * HEADER_LEN);
        assert_eq!(&wire[wire.len() - 4..], &[0, 0, 0, 1]);

        let mut reader = stream(wire.clone());
        assert_eq!(reader.recv().unwrap().len(), MAX_PAYLOAD);
    }
}
