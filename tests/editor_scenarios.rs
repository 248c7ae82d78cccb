//! End-to-end editing scenarios over real region files on disk.

use rustc_hash::FxHashMap;
use std::fs;
use std::path::PathBuf;

use regionedit::{BlockEntity, BlockState, Editor, Region, WorldError};

fn world_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir()
        .join(format!("regionedit-scenarios-{}", std::process::id()))
        .join(name);
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn set_flush_get_single_block_in_empty_world() {
    let dir = world_dir("single-block");
    let mut editor = Editor::new(&dir);

    editor.set_block(BlockState::new("diamond_block"), 50, 100, 50);
    editor.flush().unwrap();

    assert_eq!(
        editor.get_block(50, 100, 50).unwrap(),
        BlockState::new("diamond_block")
    );
    // Untouched cells in the authored chunk read as air.
    assert_eq!(
        editor.get_block(51, 100, 50).unwrap(),
        BlockState::new("minecraft:air")
    );

    // The write produced a well-formed region file.
    let region_file = dir.join("region").join("r.0.0.mca");
    let len = fs::metadata(&region_file).unwrap().len();
    assert!(len >= 8192 + 4096);
    assert_eq!(len % 4096, 0);

    // A fresh session sees the same world state.
    let mut reader = Editor::new(&dir);
    assert_eq!(
        reader.get_block(50, 100, 50).unwrap(),
        BlockState::new("diamond_block")
    );
}

#[test]
fn last_write_wins_on_same_cell() {
    let dir = world_dir("last-write-wins");
    let mut editor = Editor::new(&dir);

    editor.set_block(BlockState::new("stone"), 0, 64, 0);
    editor.set_block(BlockState::new("diamond_block"), 0, 64, 0);
    editor.flush().unwrap();

    assert_eq!(
        editor.get_block(0, 64, 0).unwrap(),
        BlockState::new("diamond_block")
    );
}

#[test]
fn negative_coordinates_roundtrip() {
    let dir = world_dir("negative-coords");
    let mut editor = Editor::new(&dir);

    editor.set_block(BlockState::new("obsidian"), -1, -60, -1);
    editor.set_block(BlockState::new("obsidian"), -512, 0, -512);
    editor.flush().unwrap();

    let mut reader = Editor::new(&dir);
    assert_eq!(
        reader.get_block(-1, -60, -1).unwrap(),
        BlockState::new("obsidian")
    );
    assert_eq!(
        reader.get_block(-512, 0, -512).unwrap(),
        BlockState::new("obsidian")
    );
    assert!(dir.join("region").join("r.-1.-1.mca").exists());
}

#[test]
fn get_block_in_never_generated_chunk_is_not_found() {
    let dir = world_dir("never-generated");
    let mut editor = Editor::new(&dir);
    editor.set_block(BlockState::new("stone"), 0, 64, 0);
    editor.flush().unwrap();

    // Same region file, different chunk slot.
    let err = editor.get_block(400, 64, 400).unwrap_err();
    assert!(err.is_not_found());
    // No region file at all.
    let err = editor.get_block(5000, 64, 5000).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn section_level_out_of_range_fails() {
    let dir = world_dir("out-of-range");
    let mut editor = Editor::new(&dir);
    editor.set_block(BlockState::new("stone"), 50, 100, 50);
    editor.flush().unwrap();

    // Section level 100 is far outside [-4, 19].
    let err = editor.get_block(50, 1600, 50).unwrap_err();
    assert!(matches!(err, WorldError::OutOfRange { .. }));
}

#[test]
fn copy_area_with_vertical_repetitions() {
    let dir = world_dir("copy-repetitions");
    let mut editor = Editor::new(&dir);

    // Seed a 5x3x5 source cuboid at (49, 61, 30): stone with one
    // gold_block marker in the corner.
    for dx in 0..5 {
        for dy in 0..3 {
            for dz in 0..5 {
                editor.set_block(BlockState::new("stone"), 49 + dx, 61 + dy, 30 + dz);
            }
        }
    }
    editor.set_block(BlockState::new("gold_block"), 49, 61, 30);
    editor.flush().unwrap();

    // Attach a chest block-entity to the marker through the region API.
    {
        let region = Region::open(dir.join("region"), (0, 0)).unwrap();
        let mut chunk = region.read_chunk(3, 1).unwrap();
        chunk.add_block_entity(BlockEntity::new("minecraft:chest", (49, 61, 30)));
        let mut updates = FxHashMap::default();
        updates.insert((3, 1), chunk.to_region_payload(&[]).unwrap());
        region.write(&updates).unwrap();
    }

    // Copy up by 3 blocks, five times, spaced 3 apart.
    let reps = [(0, 0, 0), (0, 3, 0), (0, 6, 0), (0, 9, 0), (0, 12, 0)];
    let mut editor = Editor::new(&dir);
    editor
        .copy_blocks((49, 61, 30), (49, 64, 30), (5, 3, 5), &reps)
        .unwrap();
    editor.flush().unwrap();

    let mut reader = Editor::new(&dir);
    for (_, ry, _) in reps {
        assert_eq!(
            reader.get_block(49, 64 + ry, 30).unwrap(),
            BlockState::new("gold_block"),
            "marker should appear at repetition offset {}",
            ry
        );
        assert_eq!(
            reader.get_block(53, 64 + ry, 34).unwrap(),
            BlockState::new("stone")
        );
    }

    // Source is unmodified.
    assert_eq!(
        reader.get_block(49, 61, 30).unwrap(),
        BlockState::new("gold_block")
    );
    assert_eq!(
        reader.get_block(53, 63, 34).unwrap(),
        BlockState::new("stone")
    );

    // The chest traveled with every copy, and the original stayed.
    let copied = reader
        .find_block_entities((49, 64, 30), (54, 77, 35), Some("minecraft:chest"))
        .unwrap();
    assert_eq!(copied.len(), 5);
    let mut ys: Vec<i32> = copied.iter().map(|be| be.position.1).collect();
    ys.sort();
    assert_eq!(ys, vec![64, 67, 70, 73, 76]);

    let original = reader
        .find_block_entities((49, 61, 30), (54, 64, 35), Some("minecraft:chest"))
        .unwrap();
    assert_eq!(original.len(), 1);
    assert_eq!(original[0].position, (49, 61, 30));
}

#[test]
fn copy_without_repetitions_places_single_copy() {
    let dir = world_dir("copy-single");
    let mut editor = Editor::new(&dir);
    editor.set_block(BlockState::new("bricks"), 10, 64, 10);
    editor.flush().unwrap();

    editor.copy_blocks((10, 64, 10), (20, 64, 20), (1, 1, 1), &[]).unwrap();
    editor.flush().unwrap();

    let mut reader = Editor::new(&dir);
    assert_eq!(
        reader.get_block(20, 64, 20).unwrap(),
        BlockState::new("bricks")
    );
    assert_eq!(
        reader.get_block(10, 64, 10).unwrap(),
        BlockState::new("bricks")
    );
}

#[test]
fn find_blocks_exact_vs_name_only() {
    let dir = world_dir("find-blocks");
    let mut editor = Editor::new(&dir);

    let floor_lever = BlockState::new("lever")
        .with_property("face", "floor")
        .with_property("facing", "north")
        .with_property("powered", "false");
    let wall_lever = BlockState::new("lever")
        .with_property("face", "wall")
        .with_property("facing", "south")
        .with_property("powered", "true");

    editor.set_block(floor_lever.clone(), 10, 64, 10);
    editor.set_block(wall_lever, 12, 64, 10);
    editor.flush().unwrap();

    let exact = editor
        .find_blocks((0, 60, 0), (16, 70, 16), &floor_lever, true)
        .unwrap();
    assert_eq!(exact, vec![(10, 64, 10)]);

    let by_name = editor
        .find_blocks((0, 60, 0), (16, 70, 16), &floor_lever, false)
        .unwrap();
    assert_eq!(by_name, vec![(10, 64, 10), (12, 64, 10)]);

    // The same search expressed as JSON settings.
    let via_settings = editor
        .find_blocks_with_settings(
            (0, 60, 0),
            (16, 70, 16),
            r#"{"name": "lever", "properties": [["face", "floor"], ["facing", "north"], ["powered", "false"]], "exact": true}"#,
        )
        .unwrap();
    assert_eq!(via_settings, vec![(10, 64, 10)]);
}

#[test]
fn list_blocks_census() {
    let dir = world_dir("list-blocks");
    let mut editor = Editor::new(&dir);

    for x in 0..4 {
        editor.set_block(BlockState::new("stone"), x, 64, 0);
    }
    editor.set_block(BlockState::new("diamond_block"), 0, 65, 0);
    editor.flush().unwrap();

    let census = editor.list_blocks((0, 64, 0), (4, 66, 1)).unwrap();
    // 8 cells scanned: 4 stone, 1 diamond, 3 air.
    assert_eq!(census[0], ("minecraft:stone".to_string(), 4));
    assert!(census.contains(&("minecraft:air".to_string(), 3)));
    assert!(census.contains(&("minecraft:diamond_block".to_string(), 1)));
}

#[test]
fn flush_without_pending_writes_is_a_noop() {
    let dir = world_dir("noop-flush");
    let mut editor = Editor::new(&dir);
    editor.flush().unwrap();
    assert!(!dir.join("region").exists());
}

#[test]
fn pending_writes_clear_after_flush() {
    let dir = world_dir("pending-clears");
    let mut editor = Editor::new(&dir);
    editor.set_block(BlockState::new("stone"), 0, 64, 0);
    assert!(editor.has_pending());
    editor.flush().unwrap();
    assert!(!editor.has_pending());
}
