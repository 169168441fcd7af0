//! Spatial payloads: positions, bone rotations, and actor spawn/update bodies.
//!
//! These are bodies of [`DataType::Actor`](crate::DataType::Actor) frames.
//! The session layer never looks inside them; they exist so applications
//! and clients share one definition of the layout.

use bytes::{Buf, BufMut};

use crate::error::{Structure, ensure_len};
use crate::{ProtocolError, Wire};

/// A point on the 2D play field (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position2D {
    pub x: f32,
    pub y: f32,
}

impl Wire for Position2D {
    const SIZE: usize = 8;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_f32_le(self.x);
        buf.put_f32_le(self.y);
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::Position2D, Self::SIZE)?;
        let mut cur = data;
        Ok(Self {
            x: cur.get_f32_le(),
            y: cur.get_f32_le(),
        })
    }
}

/// A 3D position plus orientation quaternion (28 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub qx: f32,
    pub qy: f32,
    pub qz: f32,
    pub qw: f32,
}

impl Wire for Position {
    const SIZE: usize = 28;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        for v in [self.x, self.y, self.z, self.qx, self.qy, self.qz, self.qw] {
            buf.put_f32_le(v);
        }
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::Position, Self::SIZE)?;
        let mut cur = data;
        Ok(Self {
            x: cur.get_f32_le(),
            y: cur.get_f32_le(),
            z: cur.get_f32_le(),
            qx: cur.get_f32_le(),
            qy: cur.get_f32_le(),
            qz: cur.get_f32_le(),
            qw: cur.get_f32_le(),
        })
    }
}

/// Rotation of a single bone (17 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoneData {
    pub bone_id: u8,
    pub qx: f32,
    pub qy: f32,
    pub qz: f32,
    pub qw: f32,
}

impl Wire for BoneData {
    const SIZE: usize = 17;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.bone_id);
        for v in [self.qx, self.qy, self.qz, self.qw] {
            buf.put_f32_le(v);
        }
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::BoneData, Self::SIZE)?;
        let mut cur = data;
        Ok(Self {
            bone_id: cur.get_u8(),
            qx: cur.get_f32_le(),
            qy: cur.get_f32_le(),
            qz: cur.get_f32_le(),
            qw: cur.get_f32_le(),
        })
    }
}

// ---------------------------------------------------------------------------
// Bone mask
// ---------------------------------------------------------------------------

/// Which bones an update carries: 128 bits, bit `n` lives in byte `n / 8`
/// at position `n % 8` (least significant first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoneMask(pub [u8; 16]);

impl BoneMask {
    pub const SIZE: usize = 16;

    /// Number of addressable bones.
    pub const CAPACITY: usize = 128;

    /// Marks `bone` as present. Ids ≥ 128 are ignored.
    pub fn insert(&mut self, bone: u8) {
        let bone = bone as usize;
        if bone < Self::CAPACITY {
            self.0[bone / 8] |= 1 << (bone % 8);
        }
    }

    pub fn contains(&self, bone: u8) -> bool {
        let bone = bone as usize;
        bone < Self::CAPACITY && self.0[bone / 8] & (1 << (bone % 8)) != 0
    }

    /// Number of set bits, i.e. how many bone entries follow the position.
    pub fn count(&self) -> usize {
        self.0.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Set bone ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..Self::CAPACITY as u16)
            .map(|b| b as u8)
            .filter(|b| self.contains(*b))
    }
}

// ---------------------------------------------------------------------------
// Actor bodies
// ---------------------------------------------------------------------------

/// Spawn a 2D actor at a position. The actor is identified by the
/// header's session id.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actor2DSpawn {
    pub position: Position2D,
}

impl Wire for Actor2DSpawn {
    const SIZE: usize = Position2D::SIZE;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        self.position.encode_to(buf);
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::Actor2DSpawn, Self::SIZE)?;
        Ok(Self {
            position: Position2D::decode(data)?,
        })
    }
}

/// Move a 2D actor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actor2DUpdate {
    pub position: Position2D,
}

impl Wire for Actor2DUpdate {
    const SIZE: usize = Position2D::SIZE;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        self.position.encode_to(buf);
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::Actor2DUpdate, Self::SIZE)?;
        Ok(Self {
            position: Position2D::decode(data)?,
        })
    }
}

/// Spawn a 3D actor with a full pose.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Actor3DSpawn {
    pub position: Position,
}

impl Wire for Actor3DSpawn {
    const SIZE: usize = Position::SIZE;

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        self.position.encode_to(buf);
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::Actor3DSpawn, Self::SIZE)?;
        Ok(Self {
            position: Position::decode(data)?,
        })
    }
}

/// Pose update for a 3D actor: a bone mask, the root position, then one
/// [`BoneData`] per set bit in ascending bit order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Actor3DUpdate {
    pub mask: BoneMask,
    pub position: Position,
    pub bones: Vec<BoneData>,
}

impl Actor3DUpdate {
    /// Builds an update whose mask matches `bones` exactly.
    ///
    /// Bones are sorted by id; duplicates and ids outside the mask's
    /// capacity are dropped, keeping the first entry for each id.
    pub fn new(position: Position, mut bones: Vec<BoneData>) -> Self {
        bones.retain(|b| (b.bone_id as usize) < BoneMask::CAPACITY);
        bones.sort_by_key(|b| b.bone_id);
        bones.dedup_by_key(|b| b.bone_id);
        let mut mask = BoneMask::default();
        for bone in &bones {
            mask.insert(bone.bone_id);
        }
        Self {
            mask,
            position,
            bones,
        }
    }
}

impl Wire for Actor3DUpdate {
    const SIZE: usize = BoneMask::SIZE + Position::SIZE;

    fn encoded_len(&self) -> usize {
        Self::SIZE + self.bones.len() * BoneData::SIZE
    }

    fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&self.mask.0);
        self.position.encode_to(buf);
        for bone in &self.bones {
            bone.encode_to(buf);
        }
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        ensure_len(data, Structure::Actor3DUpdate, Self::SIZE)?;
        let mut mask = BoneMask::default();
        mask.0.copy_from_slice(&data[..BoneMask::SIZE]);

        let bone_count = mask.count();
        let expected = Self::SIZE + bone_count * BoneData::SIZE;
        ensure_len(data, Structure::Actor3DUpdate, expected)?;

        let position = Position::decode(&data[BoneMask::SIZE..])?;
        let bones = data[Self::SIZE..expected]
            .chunks_exact(BoneData::SIZE)
            .map(BoneData::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            mask,
            position,
            bones,
        })
    }
}
