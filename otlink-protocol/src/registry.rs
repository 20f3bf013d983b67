//! Packet types and the dispatch table
//!
//! Each packet is a fixed-layout record that knows its own type byte and
//! size. The receiving side registers the packets it understands against a
//! context type `C`; a frame whose type and payload size match an entry is
//! decoded into the concrete record and handed to `C`'s handler for it.
//!
//! Entries are plain function pointers monomorphized at registration time,
//! so the table needs no allocation and no runtime type information.

use heapless::FnvIndexMap;

use crate::frame::{FrameError, MAX_PAYLOAD_SIZE, STREAM_REQ_ID};

/// Maximum number of distinct packet types in one registry
pub const MAX_PACKET_TYPES: usize = 16;

/// A fixed-layout record carried in a frame payload
///
/// Multi-byte fields are little-endian and the layout is packed.
pub trait Packet: Sized {
    /// Packet type identifier on the wire
    const TYPE_ID: u8;

    /// Encoded payload size in bytes
    const SIZE: usize;

    /// Write the packed record into `buf`, which is exactly `SIZE` bytes
    fn write_to(&self, buf: &mut [u8]);

    /// Read the packed record from `bytes`
    ///
    /// Returns `None` if `bytes` is shorter than `SIZE`.
    fn read_from(bytes: &[u8]) -> Option<Self>;
}

/// Receiver of one packet type
pub trait PacketHandler<P: Packet> {
    /// Called once for every dispatched packet of type `P`
    fn on_packet(&mut self, packet: P);
}

/// Errors that can occur while building a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// No room for another packet type
    Full,
    /// Packet type collides with the streaming request identifier
    ReservedType(u8),
    /// Packet size cannot be carried by a frame
    InvalidSize { type_id: u8, size: usize },
}

type DispatchFn<C> = fn(&[u8], &mut C);

struct Entry<C> {
    size: usize,
    dispatch: DispatchFn<C>,
}

fn invoke<P, C>(payload: &[u8], ctx: &mut C)
where
    P: Packet,
    C: PacketHandler<P>,
{
    if let Some(packet) = P::read_from(payload) {
        ctx.on_packet(packet);
    }
}

/// Packet type → (size, handler) table
pub struct PacketRegistry<C> {
    entries: FnvIndexMap<u8, Entry<C>, MAX_PACKET_TYPES>,
}

impl<C> Default for PacketRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PacketRegistry<C> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: FnvIndexMap::new(),
        }
    }

    /// Register packet type `P`, dispatched to `C`'s `PacketHandler<P>`
    ///
    /// Registering a type id again replaces the previous entry.
    pub fn register<P>(&mut self) -> Result<(), RegistryError>
    where
        P: Packet,
        C: PacketHandler<P>,
    {
        if P::TYPE_ID == STREAM_REQ_ID {
            return Err(RegistryError::ReservedType(P::TYPE_ID));
        }
        if P::SIZE == 0 || P::SIZE > MAX_PAYLOAD_SIZE {
            return Err(RegistryError::InvalidSize {
                type_id: P::TYPE_ID,
                size: P::SIZE,
            });
        }

        let entry = Entry {
            size: P::SIZE,
            dispatch: invoke::<P, C>,
        };
        self.entries
            .insert(P::TYPE_ID, entry)
            .map(|_| ())
            .map_err(|_| RegistryError::Full)
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<P>(mut self) -> Result<Self, RegistryError>
    where
        P: Packet,
        C: PacketHandler<P>,
    {
        self.register::<P>()?;
        Ok(self)
    }

    /// Registered payload size for a type id
    pub fn expected_size(&self, type_id: u8) -> Option<usize> {
        self.entries.get(&type_id).map(|entry| entry.size)
    }

    /// Check whether a type id is registered
    pub fn contains(&self, type_id: u8) -> bool {
        self.entries.contains_key(&type_id)
    }

    /// Number of registered packet types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode `payload` as the packet registered for `type_id` and invoke it
    pub(crate) fn dispatch(&self, type_id: u8, payload: &[u8], ctx: &mut C) -> Result<(), FrameError> {
        let entry = self
            .entries
            .get(&type_id)
            .ok_or(FrameError::UnknownType(type_id))?;

        if payload.len() != entry.size {
            return Err(FrameError::SizeMismatch {
                type_id,
                expected: entry.size,
                actual: payload.len(),
            });
        }

        (entry.dispatch)(payload, ctx);
        Ok(())
    }
}
