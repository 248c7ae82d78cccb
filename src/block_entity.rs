use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;

/// Owned mirror of an NBT tag, used to carry type-specific block-entity
/// fields through a decode/encode round trip without interpreting them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NbtValue {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    ByteArray(Vec<i8>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    List(Vec<NbtValue>),
    Compound(HashMap<String, NbtValue>),
}

impl NbtValue {
    pub fn from_tag(tag: &NbtTag) -> NbtValue {
        match tag {
            NbtTag::Byte(b) => NbtValue::Byte(*b),
            NbtTag::Short(s) => NbtValue::Short(*s),
            NbtTag::Int(i) => NbtValue::Int(*i),
            NbtTag::Long(l) => NbtValue::Long(*l),
            NbtTag::Float(f) => NbtValue::Float(*f),
            NbtTag::Double(d) => NbtValue::Double(*d),
            NbtTag::String(s) => NbtValue::String(s.clone()),
            NbtTag::ByteArray(arr) => NbtValue::ByteArray(arr.clone()),
            NbtTag::IntArray(arr) => NbtValue::IntArray(arr.clone()),
            NbtTag::LongArray(arr) => NbtValue::LongArray(arr.clone()),
            NbtTag::List(list) => NbtValue::List(list.iter().map(NbtValue::from_tag).collect()),
            NbtTag::Compound(compound) => {
                let mut map = HashMap::new();
                for (key, value) in compound.inner() {
                    map.insert(key.clone(), NbtValue::from_tag(value));
                }
                NbtValue::Compound(map)
            }
        }
    }

    pub fn to_tag(&self) -> NbtTag {
        match self {
            NbtValue::Byte(b) => NbtTag::Byte(*b),
            NbtValue::Short(s) => NbtTag::Short(*s),
            NbtValue::Int(i) => NbtTag::Int(*i),
            NbtValue::Long(l) => NbtTag::Long(*l),
            NbtValue::Float(f) => NbtTag::Float(*f),
            NbtValue::Double(d) => NbtTag::Double(*d),
            NbtValue::String(s) => NbtTag::String(s.clone()),
            NbtValue::ByteArray(arr) => NbtTag::ByteArray(arr.clone()),
            NbtValue::IntArray(arr) => NbtTag::IntArray(arr.clone()),
            NbtValue::LongArray(arr) => NbtTag::LongArray(arr.clone()),
            NbtValue::List(list) => {
                let tags: Vec<NbtTag> = list.iter().map(NbtValue::to_tag).collect();
                NbtTag::List(NbtList::from(tags))
            }
            NbtValue::Compound(map) => {
                let mut compound = NbtCompound::new();
                for (key, value) in map {
                    compound.insert(key, value.to_tag());
                }
                NbtTag::Compound(compound)
            }
        }
    }
}

/// Positioned metadata record attached to a specific block, e.g. chest
/// contents or sign text. The identifier and coordinates are interpreted;
/// everything else passes through opaquely in `nbt`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockEntity {
    pub id: String,
    /// Absolute block coordinates.
    pub position: (i32, i32, i32),
    pub nbt: HashMap<String, NbtValue>,
}

impl BlockEntity {
    pub fn new(id: impl Into<String>, position: (i32, i32, i32)) -> Self {
        BlockEntity {
            id: id.into(),
            position,
            nbt: HashMap::new(),
        }
    }

    /// Returns a copy relocated by the given block offset.
    pub fn shifted(&self, dx: i32, dy: i32, dz: i32) -> Self {
        let mut moved = self.clone();
        moved.position = (
            self.position.0 + dx,
            self.position.1 + dy,
            self.position.2 + dz,
        );
        moved
    }

    pub fn from_nbt(compound: &NbtCompound) -> Result<Self> {
        let id = compound.get::<_, &String>("id")?.clone();
        let x = compound.get::<_, i32>("x")?;
        let y = compound.get::<_, i32>("y")?;
        let z = compound.get::<_, i32>("z")?;

        let mut entity = BlockEntity::new(id, (x, y, z));
        for (key, value) in compound.inner() {
            match key.as_str() {
                "id" | "x" | "y" | "z" => continue,
                _ => {
                    entity.nbt.insert(key.clone(), NbtValue::from_tag(value));
                }
            }
        }
        Ok(entity)
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert("id", NbtTag::String(self.id.clone()));
        compound.insert("x", NbtTag::Int(self.position.0));
        compound.insert("y", NbtTag::Int(self.position.1));
        compound.insert("z", NbtTag::Int(self.position.2));
        for (key, value) in &self.nbt {
            compound.insert(key, value.to_tag());
        }
        compound
    }
}
