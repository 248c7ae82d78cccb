//! regionedit — a Minecraft region-file (Anvil) codec and bulk block
//! editing library.
//!
//! The crate decodes `.mca` region containers into individually
//! addressable chunks, unpacks their palette-indexed section data into
//! concrete blocks, lets you mutate blocks and block-entities in place,
//! and re-encodes everything into the exact on-disk layout the game
//! accepts: 4096-byte sectors, big-endian location headers, zlib-framed
//! chunk payloads and bit-packed palette indices.
//!
//! The usual entry point is [`Editor`]:
//!
//! ```no_run
//! use regionedit::{BlockState, Editor};
//!
//! # fn main() -> regionedit::Result<()> {
//! let mut editor = Editor::new("saves/my-world");
//! editor.set_block(BlockState::new("diamond_block"), 50, 100, 50);
//! editor.flush()?;
//! assert_eq!(
//!     editor.get_block(50, 100, 50)?,
//!     BlockState::new("diamond_block")
//! );
//! # Ok(())
//! # }
//! ```

pub mod block_entity;
pub mod block_state;
pub mod chunk;
pub mod coords;
pub mod editor;
pub mod error;
pub mod region;
pub mod section;

pub use block_entity::{BlockEntity, NbtValue};
pub use block_state::BlockState;
pub use chunk::{Chunk, DEFAULT_DATA_VERSION, MAX_SECTION_Y, MIN_SECTION_Y};
pub use coords::{block_to_chunk, block_to_locator, block_to_region, BlockLocator};
pub use editor::{BlockSearch, Editor};
pub use error::{Result, WorldError};
pub use region::Region;
pub use section::Section;
