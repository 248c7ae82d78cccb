//! One 16x16x16 section of blocks: the unit of palette encoding.
//!
//! On disk a section is a `block_states` compound holding a `palette`
//! list and, when the palette has more than one entry, a bit-packed
//! `data` long-array of palette indices. Entries never span across long
//! boundaries: each 64-bit word holds `floor(64 / bits)` indices and the
//! leftover high bits are padding.

use quartz_nbt::{NbtCompound, NbtList, NbtTag};
use rustc_hash::FxHashMap;

use crate::block_state::BlockState;
use crate::coords::SECTION_VOLUME;
use crate::error::{Result, WorldError};

pub const AIR: &str = "minecraft:air";

/// Bits per packed palette index for a palette of the given size.
/// The host format never goes below 4 bits for block states.
pub fn bits_per_index(palette_len: usize) -> u32 {
    debug_assert!(palette_len >= 1);
    let needed = usize::BITS - (palette_len - 1).leading_zeros();
    needed.max(4)
}

/// Unpack palette indices from the `data` long-array.
///
/// Each stored long is reinterpreted as an unsigned 64-bit word before
/// bit extraction; indices are read from the low bits upward and a word's
/// trailing remainder (fewer than `bits` bits) is discarded.
pub fn unpack_indices(packed: &[i64], palette_len: usize) -> Vec<u16> {
    let bits = bits_per_index(palette_len);
    let per_long = (64 / bits) as usize;
    let mask = (1u64 << bits) - 1;

    let mut indices = Vec::with_capacity(SECTION_VOLUME);
    'words: for &word in packed {
        let word = word as u64;
        for slot in 0..per_long {
            if indices.len() == SECTION_VOLUME {
                break 'words;
            }
            indices.push(((word >> (slot as u32 * bits)) & mask) as u16);
        }
    }

    indices.resize(SECTION_VOLUME, 0);
    indices
}

/// Pack palette indices into the `data` long-array layout; the exact
/// inverse of [`unpack_indices`]. A single-entry palette produces no
/// data at all.
pub fn pack_indices(indices: &[u16], palette_len: usize) -> Vec<i64> {
    if palette_len <= 1 {
        return Vec::new();
    }

    let bits = bits_per_index(palette_len);
    let per_long = (64 / bits) as usize;
    let mask = (1u64 << bits) - 1;
    let num_longs = (SECTION_VOLUME + per_long - 1) / per_long;

    let mut packed = vec![0u64; num_longs];
    for (i, &index) in indices.iter().enumerate().take(SECTION_VOLUME) {
        let shift = (i % per_long) as u32 * bits;
        packed[i / per_long] |= ((index as u64) & mask) << shift;
    }

    packed.into_iter().map(|w| w as i64).collect()
}

/// A decoded section: 4096 concrete blocks at one vertical level.
#[derive(Debug, Clone)]
pub struct Section {
    y: i32,
    blocks: Vec<BlockState>,
    /// Pass-through biome data from the decoded section, if any.
    biomes: Option<NbtTag>,
    /// The compound this section was decoded from. Re-emitted verbatim
    /// as long as no block has been written.
    raw: Option<NbtCompound>,
    dirty: bool,
}

impl Section {
    /// A section filled entirely with one block.
    pub fn filled(y: i32, block: BlockState) -> Self {
        Section {
            y,
            blocks: vec![block; SECTION_VOLUME],
            biomes: None,
            raw: None,
            dirty: false,
        }
    }

    /// A fresh all-air section.
    pub fn empty(y: i32) -> Self {
        Section::filled(y, BlockState::new(AIR))
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True when every cell is plain air; such sections are not persisted.
    pub fn is_uniform_air(&self) -> bool {
        self.blocks[0].name == AIR && self.blocks.iter().all(|b| *b == self.blocks[0])
    }

    pub fn get_index(&self, index: usize) -> &BlockState {
        &self.blocks[index]
    }

    pub fn set_index(&mut self, index: usize, block: BlockState) {
        assert!(index < SECTION_VOLUME, "section index out of bounds");
        self.blocks[index] = block;
        self.dirty = true;
    }

    pub fn blocks(&self) -> &[BlockState] {
        &self.blocks
    }

    /// Decode a section from its on-disk compound. The caller has already
    /// established that a `block_states` compound is present.
    pub fn from_nbt(nbt: &NbtCompound) -> Result<Section> {
        let y = nbt.get::<_, i8>("Y")? as i32;
        let block_states = nbt.get::<_, &NbtCompound>("block_states")?;

        let palette_list = block_states.get::<_, &NbtList>("palette")?;
        let mut palette = Vec::with_capacity(palette_list.len());
        for tag in palette_list.iter() {
            match tag {
                NbtTag::Compound(compound) => palette.push(BlockState::from_nbt(compound)?),
                _ => {
                    return Err(WorldError::invalid_format(
                        "palette entry is not a compound",
                    ))
                }
            }
        }
        if palette.is_empty() {
            return Err(WorldError::invalid_format("section has an empty palette"));
        }

        let blocks = if palette.len() == 1 {
            // Single-entry palette: every cell is that block, no data array.
            vec![palette[0].clone(); SECTION_VOLUME]
        } else {
            let data = block_states.get::<_, &[i64]>("data")?;
            let indices = unpack_indices(data, palette.len());
            let mut blocks = Vec::with_capacity(SECTION_VOLUME);
            for index in indices {
                let block = palette.get(index as usize).ok_or_else(|| {
                    WorldError::invalid_format(format!(
                        "palette index {} out of bounds for palette of {}",
                        index,
                        palette.len()
                    ))
                })?;
                blocks.push(block.clone());
            }
            blocks
        };

        let biomes = nbt
            .get::<_, &NbtCompound>("biomes")
            .ok()
            .cloned()
            .map(NbtTag::Compound);

        Ok(Section {
            y,
            blocks,
            biomes,
            raw: Some(nbt.clone()),
            dirty: false,
        })
    }

    /// Deterministic palette for the current contents: distinct blocks
    /// sorted by their textual rendering, plus one index per cell.
    fn build_palette(&self) -> (Vec<&BlockState>, Vec<u16>) {
        let mut palette: Vec<&BlockState> = self.blocks.iter().collect();
        palette.sort_by_key(|b| b.to_string());
        palette.dedup();

        let lookup: FxHashMap<&BlockState, u16> = palette
            .iter()
            .enumerate()
            .map(|(i, b)| (*b, i as u16))
            .collect();
        let indices = self.blocks.iter().map(|b| lookup[b]).collect();
        (palette, indices)
    }

    /// Encode this section back to its on-disk compound. A section that
    /// was decoded and never written returns its original compound
    /// unchanged.
    pub fn to_nbt(&self) -> NbtCompound {
        if !self.dirty {
            if let Some(raw) = &self.raw {
                return raw.clone();
            }
        }

        let (palette, indices) = self.build_palette();

        let mut block_states = NbtCompound::new();
        let palette_tags: Vec<NbtTag> = palette.iter().map(|b| b.to_nbt()).collect();
        block_states.insert("palette", NbtTag::List(NbtList::from(palette_tags)));
        if palette.len() > 1 {
            block_states.insert(
                "data",
                NbtTag::LongArray(pack_indices(&indices, palette.len())),
            );
        }

        let mut section = NbtCompound::new();
        section.insert("Y", NbtTag::Byte(self.y as i8));
        section.insert("block_states", NbtTag::Compound(block_states));
        match &self.biomes {
            Some(biomes) => section.insert("biomes", biomes.clone()),
            None => {
                // Fresh sections still need a biome palette for the host
                // to accept the chunk.
                let mut biomes = NbtCompound::new();
                let palette = vec![NbtTag::String("minecraft:plains".to_string())];
                biomes.insert("palette", NbtTag::List(NbtList::from(palette)));
                section.insert("biomes", NbtTag::Compound(biomes));
            }
        }
        section
    }
}
