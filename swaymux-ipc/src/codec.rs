use std::io::Cursor;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// IPC magic string - "i3-ipc", kept by sway for compatibility.
pub const MAGIC: [u8; MAGIC_LEN] = *b"i3-ipc";
pub const MAGIC_LEN: usize = 6;

/// Magic, payload length, payload type.
pub const HEADER_LEN: usize = MAGIC_LEN + 4 + 4;

#[derive(Error, Debug)]
pub enum PacketCodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("packet magic mismatch")]
    BadMagic,
}

/// Byte order of the length and type header fields, chosen per connection.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    fn put_u32(self, dst: &mut BytesMut, n: u32) {
        match self {
            ByteOrder::Little => dst.put_u32_le(n),
            ByteOrder::Big => dst.put_u32(n),
        }
    }

    fn get_u32(self, src: &mut Cursor<&[u8]>) -> u32 {
        match self {
            ByteOrder::Little => src.get_u32_le(),
            ByteOrder::Big => src.get_u32(),
        }
    }
}

/// The fixed-size frame header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    pub payload_len: u32,
    pub payload_type: u32,
}

impl Header {
    pub fn encode(&self, order: ByteOrder) -> [u8; HEADER_LEN] {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&MAGIC);
        order.put_u32(&mut buf, self.payload_len);
        order.put_u32(&mut buf, self.payload_type);

        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(&buf);
        raw
    }

    pub fn decode(
        raw: &[u8; HEADER_LEN],
        order: ByteOrder,
    ) -> Result<Header, PacketCodecError> {
        if raw[..MAGIC_LEN] != MAGIC {
            return Err(PacketCodecError::BadMagic);
        }

        let mut cursor = Cursor::new(&raw[MAGIC_LEN..]);
        let payload_len = order.get_u32(&mut cursor);
        let payload_type = order.get_u32(&mut cursor);

        Ok(Header {
            payload_len,
            payload_type,
        })
    }
}

/// One header + payload unit of the wire protocol.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Packet {
    pub payload_type: u32,
    pub payload: Bytes,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec {
    order: ByteOrder,
}

impl PacketCodec {
    pub fn new(order: ByteOrder) -> Self {
        PacketCodec { order }
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = PacketCodecError;

    fn decode(
        &mut self,
        src: &mut BytesMut,
    ) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut raw = [0u8; HEADER_LEN];
        raw.copy_from_slice(&src[..HEADER_LEN]);

        let header = match Header::decode(&raw, self.order) {
            Ok(h) => h,
            Err(err) => {
                // Drop whatever is buffered; the next reads resynchronize.
                src.clear();
                return Err(err);
            }
        };

        let payload_len = header.payload_len as usize;

        if src.len() < HEADER_LEN + payload_len {
            src.reserve(HEADER_LEN + payload_len - src.len());
            return Ok(None);
        }

        let mut packet = src.split_to(HEADER_LEN + payload_len);
        packet.advance(HEADER_LEN);

        Ok(Some(Packet {
            payload_type: header.payload_type,
            payload: packet.freeze(),
        }))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = PacketCodecError;

    fn encode(
        &mut self,
        item: Packet,
        dst: &mut BytesMut,
    ) -> Result<(), PacketCodecError> {
        dst.reserve(HEADER_LEN + item.payload.len());
        dst.extend_from_slice(&MAGIC);
        self.order.put_u32(dst, item.payload.len() as u32);
        self.order.put_u32(dst, item.payload_type);

        if !item.payload.is_empty() {
            dst.extend_from_slice(&item.payload);
        }

        Ok(())
    }
}
