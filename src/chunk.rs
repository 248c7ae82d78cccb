//! Chunk decode/encode: zlib framing, tag-tree assembly, pass-through
//! field preservation and block-entity handling.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::debug;
use quartz_nbt::io::Flavor;
use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use crate::block_entity::BlockEntity;
use crate::block_state::BlockState;
use crate::coords::{block_to_section_index, block_to_section_y};
use crate::error::{Result, WorldError};
use crate::region::SECTOR_BYTES;
use crate::section::{Section, AIR};

/// Lowest section level the current world format stores (y = -64).
pub const MIN_SECTION_Y: i32 = -4;
/// Highest section level the current world format stores (y = 319).
pub const MAX_SECTION_Y: i32 = 19;

/// DataVersion written into freshly authored chunks.
pub const DEFAULT_DATA_VERSION: i32 = 3700;

/// The single supported chunk compression scheme (zlib). Scheme 1 (gzip)
/// existed historically and is rejected explicitly rather than misparsed.
pub const COMPRESSION_ZLIB: u8 = 2;

fn check_section_y(y: i32) -> Result<()> {
    if !(MIN_SECTION_Y..=MAX_SECTION_Y).contains(&y) {
        return Err(WorldError::OutOfRange {
            what: "section level",
            value: y as i64,
            min: MIN_SECTION_Y as i64,
            max: MAX_SECTION_Y as i64,
        });
    }
    Ok(())
}

/// One chunk column: up to 24 sections plus the metadata the host stores
/// alongside them. Fields this crate does not interpret are carried in
/// `extra` and re-emitted verbatim on encode.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Absolute chunk coordinates.
    pub x: i32,
    pub z: i32,
    pub data_version: i32,
    sections: BTreeMap<i32, Section>,
    block_entities: Vec<BlockEntity>,
    extra: Vec<(String, NbtTag)>,
}

impl Chunk {
    /// A fresh chunk for a slot the host never generated, carrying the
    /// minimal field set the host accepts.
    pub fn new(x: i32, z: i32) -> Self {
        let extra = vec![
            (
                "Status".to_string(),
                NbtTag::String("minecraft:full".to_string()),
            ),
            ("yPos".to_string(), NbtTag::Int(MIN_SECTION_Y)),
            ("isLightOn".to_string(), NbtTag::Byte(0)),
            ("LastUpdate".to_string(), NbtTag::Long(0)),
            ("InhabitedTime".to_string(), NbtTag::Long(0)),
        ];
        Chunk {
            x,
            z,
            data_version: DEFAULT_DATA_VERSION,
            sections: BTreeMap::new(),
            block_entities: Vec::new(),
            extra,
        }
    }

    /// Decode a chunk from its framed region payload:
    /// `[4-byte BE length][1-byte compression id][compressed data]`.
    pub fn from_region_payload(data: &[u8]) -> Result<Chunk> {
        if data.len() < 5 {
            return Err(WorldError::invalid_format("chunk payload shorter than its frame header"));
        }
        let total_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if total_len < 1 {
            return Err(WorldError::invalid_format("chunk frame declares an empty payload"));
        }

        let scheme = data[4];
        if scheme != COMPRESSION_ZLIB {
            return Err(WorldError::UnsupportedCompression(scheme));
        }

        let compressed_len = total_len - 1;
        let end = 5usize.checked_add(compressed_len).filter(|&e| e <= data.len());
        let end = end.ok_or_else(|| {
            WorldError::invalid_format("chunk frame length exceeds the available bytes")
        })?;

        let mut decompressed = Vec::new();
        ZlibDecoder::new(&data[5..end]).read_to_end(&mut decompressed)?;

        let (root, _) = quartz_nbt::io::read_nbt(&mut Cursor::new(&decompressed), Flavor::Uncompressed)?;
        Chunk::from_nbt(&root)
    }

    fn from_nbt(root: &NbtCompound) -> Result<Chunk> {
        let x = root.get::<_, i32>("xPos")?;
        let z = root.get::<_, i32>("zPos")?;
        let data_version = root.get::<_, i32>("DataVersion")?;

        let mut sections = BTreeMap::new();
        if let Ok(section_list) = root.get::<_, &NbtList>("sections") {
            for tag in section_list.iter() {
                let compound = match tag {
                    NbtTag::Compound(c) => c,
                    _ => return Err(WorldError::invalid_format("section entry is not a compound")),
                };
                // Entries with no block data are empty/unloaded slots;
                // they carry nothing to edit and are skipped.
                if compound.get::<_, &NbtCompound>("block_states").is_err() {
                    debug!("chunk ({}, {}): skipping empty section entry", x, z);
                    continue;
                }
                let section = Section::from_nbt(compound)?;
                sections.insert(section.y(), section);
            }
        }

        let mut block_entities = Vec::new();
        if let Ok(entity_list) = root.get::<_, &NbtList>("block_entities") {
            for tag in entity_list.iter() {
                match tag {
                    NbtTag::Compound(c) => block_entities.push(BlockEntity::from_nbt(c)?),
                    _ => {
                        return Err(WorldError::invalid_format(
                            "block entity entry is not a compound",
                        ))
                    }
                }
            }
        }

        let mut extra = Vec::new();
        for (key, value) in root.inner() {
            match key.as_str() {
                "xPos" | "zPos" | "DataVersion" | "sections" | "block_entities" => continue,
                _ => extra.push((key.clone(), value.clone())),
            }
        }

        Ok(Chunk {
            x,
            z,
            data_version,
            sections,
            block_entities,
            extra,
        })
    }

    /// The section at the given level, created empty on first access.
    pub fn section_mut(&mut self, section_y: i32) -> Result<&mut Section> {
        check_section_y(section_y)?;
        Ok(self
            .sections
            .entry(section_y)
            .or_insert_with(|| Section::empty(section_y)))
    }

    /// Adds a section wholesale. With `replace` disabled an occupied
    /// level is an error.
    pub fn add_section(&mut self, section: Section, replace: bool) -> Result<()> {
        check_section_y(section.y())?;
        if !replace && self.sections.contains_key(&section.y()) {
            return Err(WorldError::SectionExists(section.y()));
        }
        self.sections.insert(section.y(), section);
        Ok(())
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// Sets a block at chunk-local x/z (each in `[0, 15]`) and absolute y.
    pub fn set_block(&mut self, block: BlockState, local_x: i32, y: i32, local_z: i32) -> Result<()> {
        let section = self.section_mut(block_to_section_y(y))?;
        section.set_index(block_to_section_index(local_x, y, local_z), block);
        Ok(())
    }

    /// Reads a block at chunk-local x/z and absolute y. Levels with no
    /// stored section read as air.
    pub fn block_at(&self, local_x: i32, y: i32, local_z: i32) -> Result<BlockState> {
        self.block_at_index(
            block_to_section_y(y),
            block_to_section_index(local_x, y, local_z),
        )
    }

    /// Reads a block by section level and in-section index.
    pub fn block_at_index(&self, section_y: i32, index: usize) -> Result<BlockState> {
        check_section_y(section_y)?;
        Ok(match self.sections.get(&section_y) {
            Some(section) => section.get_index(index).clone(),
            None => BlockState::new(AIR),
        })
    }

    pub fn block_entities(&self) -> &[BlockEntity] {
        &self.block_entities
    }

    pub fn add_block_entity(&mut self, entity: BlockEntity) {
        self.block_entities.push(entity);
    }

    /// Re-encode the chunk to its framed region payload, zero-padded to
    /// a whole number of 4096-byte sectors.
    ///
    /// `extra_block_entities` are merged after the chunk's own list with
    /// no deduplication; callers are responsible for not double-adding.
    /// Sections that are entirely air are not persisted, matching the
    /// host convention.
    pub fn to_region_payload(&self, extra_block_entities: &[BlockEntity]) -> Result<Vec<u8>> {
        let mut root = NbtCompound::new();
        root.insert("DataVersion", NbtTag::Int(self.data_version));
        root.insert("xPos", NbtTag::Int(self.x));
        root.insert("zPos", NbtTag::Int(self.z));

        let section_tags: Vec<NbtTag> = self
            .sections
            .values()
            .filter(|s| !s.is_uniform_air())
            .map(|s| NbtTag::Compound(s.to_nbt()))
            .collect();
        root.insert("sections", NbtTag::List(NbtList::from(section_tags)));

        let entity_tags: Vec<NbtTag> = self
            .block_entities
            .iter()
            .chain(extra_block_entities.iter())
            .map(|be| NbtTag::Compound(be.to_nbt()))
            .collect();
        root.insert("block_entities", NbtTag::List(NbtList::from(entity_tags)));

        for (key, value) in &self.extra {
            root.insert(key, value.clone());
        }

        let mut nbt_bytes = Vec::new();
        quartz_nbt::io::write_nbt(&mut nbt_bytes, None, &root, Flavor::Uncompressed)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&nbt_bytes)?;
        let compressed = encoder.finish()?;

        let payload_len = compressed.len() as u32 + 1;
        let mut out = Vec::with_capacity(4 + compressed.len() + SECTOR_BYTES);
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.push(COMPRESSION_ZLIB);
        out.extend_from_slice(&compressed);

        let sectors = (out.len() + SECTOR_BYTES - 1) / SECTOR_BYTES;
        out.resize(sectors * SECTOR_BYTES, 0);
        Ok(out)
    }
}
