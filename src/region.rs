//! Region container: one `r.{x}.{z}.mca` file held fully in memory.
//!
//! Layout: 4096 bytes of location entries (1024 entries, 3-byte
//! big-endian sector offset + 1-byte sector count), 4096 bytes of
//! timestamp entries, then sector-aligned chunk payloads. An all-zero
//! location entry means the chunk was never generated. The file length
//! is always a multiple of 4096.

use log::{debug, info};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::chunk::Chunk;
use crate::coords::floor_mod;
use crate::error::{Result, WorldError};

/// Size of one sector, the region file's alignment unit.
pub const SECTOR_BYTES: usize = 4096;

/// Size of the two header tables (locations + timestamps).
pub const HEADER_BYTES: usize = 2 * SECTOR_BYTES;

/// A region file's raw bytes, treated as an immutable snapshot between
/// open and write. Unmodified chunks are carried over byte-for-byte.
#[derive(Debug, Clone)]
pub struct Region {
    /// Region coordinates.
    pub x: i32,
    pub z: i32,
    path: PathBuf,
    data: Vec<u8>,
}

/// File name for the region at the given region coordinates.
pub fn region_file_name(x: i32, z: i32) -> String {
    format!("r.{}.{}.mca", x, z)
}

fn header_offset(chunk_x: i32, chunk_z: i32) -> usize {
    4 * (floor_mod(chunk_x, 32) + floor_mod(chunk_z, 32) * 32) as usize
}

impl Region {
    /// Reads the region file for `(x, z)` from the given region directory
    /// fully into memory.
    pub fn open(dir: impl AsRef<Path>, (x, z): (i32, i32)) -> Result<Region> {
        let path = dir.as_ref().join(region_file_name(x, z));
        debug!("reading region file {}", path.display());
        let data = fs::read(&path)?;
        if data.len() < HEADER_BYTES {
            return Err(WorldError::invalid_format(format!(
                "{} is shorter than the 8192-byte region header",
                path.display()
            )));
        }
        Ok(Region { x, z, path, data })
    }

    /// A region with no chunks, for writing into a world that has no
    /// file at these coordinates yet.
    pub fn empty(dir: impl AsRef<Path>, (x, z): (i32, i32)) -> Region {
        Region {
            x,
            z,
            path: dir.as_ref().join(region_file_name(x, z)),
            data: vec![0; HEADER_BYTES],
        }
    }

    /// Opens the region file, falling back to an empty region when the
    /// file does not exist.
    pub fn open_or_empty(dir: impl AsRef<Path>, coords: (i32, i32)) -> Result<Region> {
        match Region::open(dir.as_ref(), coords) {
            Ok(region) => Ok(region),
            Err(WorldError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    "region {:?} does not exist yet, starting from an empty one",
                    coords
                );
                Ok(Region::empty(dir, coords))
            }
            Err(e) => Err(e),
        }
    }

    /// The location entry for a chunk: `(sector offset, sector count)`.
    /// `(0, 0)` means the chunk was never generated.
    pub fn location(&self, chunk_x: i32, chunk_z: i32) -> (u32, u32) {
        let off = header_offset(chunk_x, chunk_z);
        let sector_offset = u32::from_be_bytes([0, self.data[off], self.data[off + 1], self.data[off + 2]]);
        let sector_count = self.data[off + 3] as u32;
        (sector_offset, sector_count)
    }

    pub fn has_chunk(&self, chunk_x: i32, chunk_z: i32) -> bool {
        self.location(chunk_x, chunk_z) != (0, 0)
    }

    fn not_found(&self, chunk_x: i32, chunk_z: i32) -> WorldError {
        WorldError::ChunkNotFound {
            region_x: self.x,
            region_z: self.z,
            chunk_x,
            chunk_z,
        }
    }

    /// The raw sector-aligned byte range of a chunk, exactly as stored.
    /// Usable for splicing into another region's update map without a
    /// decode/re-encode round trip.
    pub fn raw_chunk_bytes(&self, chunk_x: i32, chunk_z: i32) -> Result<&[u8]> {
        let (sector_offset, sector_count) = self.location(chunk_x, chunk_z);
        if (sector_offset, sector_count) == (0, 0) {
            return Err(self.not_found(chunk_x, chunk_z));
        }
        let start = sector_offset as usize * SECTOR_BYTES;
        let end = start + sector_count as usize * SECTOR_BYTES;
        if sector_offset < 2 || end > self.data.len() {
            return Err(WorldError::invalid_format(format!(
                "chunk ({}, {}) location entry points outside {}",
                chunk_x,
                chunk_z,
                self.path.display()
            )));
        }
        Ok(&self.data[start..end])
    }

    /// Decodes the chunk at region-relative chunk coordinates.
    pub fn read_chunk(&self, chunk_x: i32, chunk_z: i32) -> Result<Chunk> {
        let payload = self.raw_chunk_bytes(chunk_x, chunk_z)?;
        Chunk::from_region_payload(payload)
    }

    /// Rewrites the region file with the given chunk updates.
    ///
    /// All 1024 slots are walked in header order with a sector cursor
    /// starting after the two header sectors. A slot present in
    /// `updates` takes the new payload (which must already be
    /// sector-aligned; an empty payload deletes the chunk); any other
    /// previously existing slot is copied byte-for-byte from the
    /// original file. The timestamp table is carried over unchanged.
    pub fn write(&self, updates: &FxHashMap<(i32, i32), Vec<u8>>) -> Result<()> {
        let mut locations = Vec::with_capacity(SECTOR_BYTES);
        let mut chunk_bytes: Vec<u8> = Vec::new();
        let mut sector_cursor: u32 = 2;

        for chunk_z in 0..32 {
            for chunk_x in 0..32 {
                let sectors = match updates.get(&(chunk_x, chunk_z)) {
                    Some(blob) if blob.is_empty() => 0,
                    Some(blob) => {
                        if blob.len() % SECTOR_BYTES != 0 {
                            return Err(WorldError::invalid_format(format!(
                                "updated chunk ({}, {}) payload is not sector-aligned",
                                chunk_x, chunk_z
                            )));
                        }
                        let sectors = (blob.len() / SECTOR_BYTES) as u32;
                        if sectors > 255 {
                            return Err(WorldError::invalid_format(format!(
                                "updated chunk ({}, {}) spans {} sectors (max 255)",
                                chunk_x, chunk_z, sectors
                            )));
                        }
                        debug!(
                            "region ({}, {}): writing modified chunk at ({}, {})",
                            self.x, self.z, chunk_x, chunk_z
                        );
                        chunk_bytes.extend_from_slice(blob);
                        sectors
                    }
                    None => match self.location(chunk_x, chunk_z) {
                        (0, 0) => 0,
                        _ => {
                            let original = self.raw_chunk_bytes(chunk_x, chunk_z)?;
                            chunk_bytes.extend_from_slice(original);
                            (original.len() / SECTOR_BYTES) as u32
                        }
                    },
                };

                if sectors == 0 {
                    locations.extend_from_slice(&[0, 0, 0, 0]);
                } else {
                    let offset_bytes = sector_cursor.to_be_bytes();
                    locations.extend_from_slice(&offset_bytes[1..4]);
                    locations.push(sectors as u8);
                    sector_cursor += sectors;
                }
            }
        }

        let mut out = Vec::with_capacity(HEADER_BYTES + chunk_bytes.len());
        out.extend_from_slice(&locations);
        out.extend_from_slice(&self.data[SECTOR_BYTES..HEADER_BYTES]);
        out.extend_from_slice(&chunk_bytes);
        assert_eq!(out.len() % SECTOR_BYTES, 0);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        info!(
            "writing region file {} ({} bytes, {} updated chunks)",
            self.path.display(),
            out.len(),
            updates.len()
        );
        fs::write(&self.path, &out)?;
        Ok(())
    }
}
