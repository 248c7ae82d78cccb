//! The editing session: batches block writes in memory and applies them
//! to region files in one pass per region.
//!
//! Writes are keyed by (region, chunk, section level) and applied in
//! insertion order at [`Editor::flush`], so later writes to the same
//! cell win. Reads go through a chunk cache; a region's bytes are read
//! once and treated as an immutable snapshot for the write cycle.

use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::block_entity::BlockEntity;
use crate::block_state::BlockState;
use crate::chunk::Chunk;
use crate::coords::{block_to_chunk, block_to_locator, chunk_to_region, floor_mod, CHUNKS_PER_REGION};
use crate::error::{Result, WorldError};
use crate::region::Region;

/// (region coordinates, region-relative chunk coordinates)
type ChunkKey = ((i32, i32), (i32, i32));

/// (region coordinates, region-relative chunk coordinates, section level)
type SectionKey = ((i32, i32), (i32, i32), i32);

/// A block search, deserializable from JSON settings.
///
/// With `exact` set, properties must match the target block completely;
/// otherwise only the identifier is compared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockSearch {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<(String, String)>,
    #[serde(default)]
    pub exact: bool,
}

impl BlockSearch {
    pub fn from_json(settings: &str) -> Result<Self> {
        Ok(serde_json::from_str(settings)?)
    }

    pub fn to_block(&self) -> BlockState {
        let mut block = BlockState::new(self.name.as_str());
        for (key, value) in &self.properties {
            block.set_property(key.as_str(), value.as_str());
        }
        block
    }
}

/// A block-editing session over one world's region directory.
pub struct Editor {
    region_dir: PathBuf,
    pending: FxHashMap<SectionKey, Vec<(BlockState, usize)>>,
    pending_entities: FxHashMap<ChunkKey, Vec<BlockEntity>>,
    chunks: FxHashMap<ChunkKey, Chunk>,
    regions: FxHashMap<(i32, i32), Region>,
}

impl Editor {
    /// Opens an editing session. `path` may be the world folder or its
    /// `region` subfolder.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let region_dir = if path.ends_with("region") {
            path.to_path_buf()
        } else {
            path.join("region")
        };
        Editor {
            region_dir,
            pending: FxHashMap::default(),
            pending_entities: FxHashMap::default(),
            chunks: FxHashMap::default(),
            regions: FxHashMap::default(),
        }
    }

    pub fn region_dir(&self) -> &Path {
        &self.region_dir
    }

    /// Records a block to be written at the given absolute coordinates.
    /// No I/O happens until [`Editor::flush`].
    pub fn set_block(&mut self, block: BlockState, x: i32, y: i32, z: i32) {
        let loc = block_to_locator(x, y, z);
        self.pending
            .entry((loc.region, loc.chunk, loc.section_y))
            .or_default()
            .push((block, loc.index));
    }

    /// Reads the block at the given absolute coordinates from the world
    /// as last flushed. Fails with `ChunkNotFound` when the chunk (or its
    /// region file) was never generated.
    pub fn get_block(&mut self, x: i32, y: i32, z: i32) -> Result<BlockState> {
        let loc = block_to_locator(x, y, z);
        let key = (loc.region, loc.chunk);
        match self.load_chunk(key)? {
            Some(chunk) => chunk.block_at_index(loc.section_y, loc.index),
            None => Err(WorldError::ChunkNotFound {
                region_x: loc.region.0,
                region_z: loc.region.1,
                chunk_x: loc.chunk.0,
                chunk_z: loc.chunk.1,
            }),
        }
    }

    /// Loads a chunk into the cache, returning `None` for chunks (or
    /// whole region files) that were never generated.
    fn load_chunk(&mut self, key: ChunkKey) -> Result<Option<&Chunk>> {
        if !self.chunks.contains_key(&key) {
            let (region_coord, chunk_coord) = key;
            if !self.regions.contains_key(&region_coord) {
                match Region::open(&self.region_dir, region_coord) {
                    Ok(region) => {
                        self.regions.insert(region_coord, region);
                    }
                    Err(WorldError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Ok(None)
                    }
                    Err(e) => return Err(e),
                }
            }
            let region = &self.regions[&region_coord];
            match region.read_chunk(chunk_coord.0, chunk_coord.1) {
                Ok(chunk) => {
                    debug!(
                        "loaded chunk {:?} from region {:?}",
                        chunk_coord, region_coord
                    );
                    self.chunks.insert(key, chunk);
                }
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            }
        }
        Ok(self.chunks.get(&key))
    }

    /// Copies a cuboid of the given size from `source` to `dest`.
    ///
    /// When `repetitions` is non-empty, one copy is placed at
    /// `dest + offset` for each listed offset; otherwise a single copy
    /// lands at `dest`. Block-entities inside the source cuboid are
    /// cloned along, their coordinates shifted the same way and re-keyed
    /// by destination chunk. The source is left untouched.
    pub fn copy_blocks(
        &mut self,
        source: (i32, i32, i32),
        dest: (i32, i32, i32),
        size: (i32, i32, i32),
        repetitions: &[(i32, i32, i32)],
    ) -> Result<()> {
        let (sx, sy, sz) = source;
        let (tx, ty, tz) = dest;
        let (wx, wy, wz) = size;
        let reps: Vec<(i32, i32, i32)> = if repetitions.is_empty() {
            vec![(0, 0, 0)]
        } else {
            repetitions.to_vec()
        };

        for dx in 0..wx {
            for dy in 0..wy {
                for dz in 0..wz {
                    let block = self.get_block(sx + dx, sy + dy, sz + dz)?;
                    for &(rx, ry, rz) in &reps {
                        self.set_block(block.clone(), tx + dx + rx, ty + dy + ry, tz + dz + rz);
                    }
                }
            }
        }

        // Carry block-entities along with the blocks they belong to.
        let delta = (tx - sx, ty - sy, tz - sz);
        let mut moved: Vec<BlockEntity> = Vec::new();
        let (min_chunk, max_chunk) = (
            block_to_chunk(sx, sz),
            block_to_chunk(sx + wx - 1, sz + wz - 1),
        );
        for cz in min_chunk.1..=max_chunk.1 {
            for cx in min_chunk.0..=max_chunk.0 {
                let key = (
                    chunk_to_region(cx, cz),
                    (
                        floor_mod(cx, CHUNKS_PER_REGION),
                        floor_mod(cz, CHUNKS_PER_REGION),
                    ),
                );
                let chunk = match self.load_chunk(key)? {
                    Some(chunk) => chunk,
                    None => continue,
                };
                for entity in chunk.block_entities() {
                    let (ex, ey, ez) = entity.position;
                    let inside = ex >= sx
                        && ex < sx + wx
                        && ey >= sy
                        && ey < sy + wy
                        && ez >= sz
                        && ez < sz + wz;
                    if !inside {
                        continue;
                    }
                    info!(
                        "carrying block entity {} at ({}, {}, {})",
                        entity.id, ex, ey, ez
                    );
                    for &(rx, ry, rz) in &reps {
                        moved.push(entity.shifted(delta.0 + rx, delta.1 + ry, delta.2 + rz));
                    }
                }
            }
        }
        for entity in moved {
            let loc = block_to_locator(entity.position.0, entity.position.1, entity.position.2);
            self.pending_entities
                .entry((loc.region, loc.chunk))
                .or_default()
                .push(entity);
        }
        Ok(())
    }

    /// Census of all blocks in the half-open cuboid `[start, end)`,
    /// sorted by descending count. Never-generated chunks are skipped.
    pub fn list_blocks(
        &mut self,
        start: (i32, i32, i32),
        end: (i32, i32, i32),
    ) -> Result<Vec<(String, u64)>> {
        let mut counts: FxHashMap<String, u64> = FxHashMap::default();
        for x in start.0..end.0 {
            for z in start.2..end.2 {
                for y in start.1..end.1 {
                    match self.get_block(x, y, z) {
                        Ok(block) => *counts.entry(block.name.to_string()).or_default() += 1,
                        Err(e) if e.is_not_found() => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
        }
        let mut sorted: Vec<(String, u64)> = counts.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(sorted)
    }

    /// Locations of the given block in the half-open cuboid `[start,
    /// end)`. With `exact`, properties must match; otherwise only the
    /// identifier is compared.
    pub fn find_blocks(
        &mut self,
        start: (i32, i32, i32),
        end: (i32, i32, i32),
        block: &BlockState,
        exact: bool,
    ) -> Result<Vec<(i32, i32, i32)>> {
        let mut locations = Vec::new();
        for x in start.0..end.0 {
            for z in start.2..end.2 {
                for y in start.1..end.1 {
                    let found = match self.get_block(x, y, z) {
                        Ok(found) => found,
                        Err(e) if e.is_not_found() => continue,
                        Err(e) => return Err(e),
                    };
                    let matches = if exact {
                        found == *block
                    } else {
                        found.same_name(block)
                    };
                    if matches {
                        locations.push((x, y, z));
                    }
                }
            }
        }
        Ok(locations)
    }

    /// [`Editor::find_blocks`] driven by a JSON [`BlockSearch`].
    pub fn find_blocks_with_settings(
        &mut self,
        start: (i32, i32, i32),
        end: (i32, i32, i32),
        settings: &str,
    ) -> Result<Vec<(i32, i32, i32)>> {
        let search = BlockSearch::from_json(settings)?;
        self.find_blocks(start, end, &search.to_block(), search.exact)
    }

    /// Block-entities whose coordinates fall inside the half-open cuboid
    /// `[start, end)`, optionally filtered by identifier. Never-generated
    /// chunks are skipped.
    pub fn find_block_entities(
        &mut self,
        start: (i32, i32, i32),
        end: (i32, i32, i32),
        id: Option<&str>,
    ) -> Result<Vec<BlockEntity>> {
        let mut found = Vec::new();
        let (min_chunk, max_chunk) = (
            block_to_chunk(start.0, start.2),
            block_to_chunk(end.0 - 1, end.2 - 1),
        );
        for cz in min_chunk.1..=max_chunk.1 {
            for cx in min_chunk.0..=max_chunk.0 {
                let key = (
                    chunk_to_region(cx, cz),
                    (
                        floor_mod(cx, CHUNKS_PER_REGION),
                        floor_mod(cz, CHUNKS_PER_REGION),
                    ),
                );
                let chunk = match self.load_chunk(key)? {
                    Some(chunk) => chunk,
                    None => continue,
                };
                for entity in chunk.block_entities() {
                    let (ex, ey, ez) = entity.position;
                    let inside = ex >= start.0
                        && ex < end.0
                        && ey >= start.1
                        && ey < end.1
                        && ez >= start.2
                        && ez < end.2;
                    let id_matches = id.map_or(true, |id| entity.id == id);
                    if inside && id_matches {
                        found.push(entity.clone());
                    }
                }
            }
        }
        Ok(found)
    }

    /// True if any block writes or block-entity moves are waiting for a
    /// flush.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.pending_entities.is_empty()
    }

    /// Applies all pending writes to disk, one rewrite per touched
    /// region.
    ///
    /// For each region, every touched chunk is loaded (a fresh chunk is
    /// authored for never-generated slots), its section writes are
    /// applied in insertion order, and the chunk is re-encoded fully in
    /// memory; only then is the region file rewritten. A failure while
    /// encoding aborts that region before any byte reaches disk. Pending
    /// state is cleared on success.
    pub fn flush(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let mut pending_entities = std::mem::take(&mut self.pending_entities);
        if pending.is_empty() && pending_entities.is_empty() {
            return Ok(());
        }

        // Group deterministically: region -> chunk -> section writes.
        let mut by_region: BTreeMap<(i32, i32), BTreeMap<(i32, i32), Vec<(i32, Vec<(BlockState, usize)>)>>> =
            BTreeMap::new();
        for ((region, chunk, section_y), writes) in pending {
            by_region
                .entry(region)
                .or_default()
                .entry(chunk)
                .or_default()
                .push((section_y, writes));
        }
        for (region, chunk) in pending_entities.keys() {
            by_region.entry(*region).or_default().entry(*chunk).or_default();
        }

        for (region_coord, chunk_map) in by_region {
            let region = match self.regions.remove(&region_coord) {
                Some(region) => region,
                None => Region::open_or_empty(&self.region_dir, region_coord)?,
            };

            let mut updates: FxHashMap<(i32, i32), Vec<u8>> = FxHashMap::default();
            for (chunk_coord, mut section_writes) in chunk_map {
                section_writes.sort_by_key(|(y, _)| *y);

                let key = (region_coord, chunk_coord);
                if !self.chunks.contains_key(&key) {
                    let chunk = match region.read_chunk(chunk_coord.0, chunk_coord.1) {
                        Ok(chunk) => chunk,
                        Err(e) if e.is_not_found() => Chunk::new(
                            region_coord.0 * CHUNKS_PER_REGION + chunk_coord.0,
                            region_coord.1 * CHUNKS_PER_REGION + chunk_coord.1,
                        ),
                        Err(e) => return Err(e),
                    };
                    self.chunks.insert(key, chunk);
                }
                let chunk = self.chunks.get_mut(&key).unwrap();

                for (section_y, writes) in section_writes {
                    let section = chunk.section_mut(section_y)?;
                    for (block, index) in writes {
                        section.set_index(index, block);
                    }
                }

                let extra = pending_entities.remove(&key).unwrap_or_default();
                updates.insert(chunk_coord, chunk.to_region_payload(&extra)?);
            }

            region.write(&updates)?;
            info!(
                "flushed {} chunks to region ({}, {})",
                updates.len(),
                region_coord.0,
                region_coord.1
            );
        }
        Ok(())
    }
}
