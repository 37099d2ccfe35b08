//! Integration tests for asset loading.

use std::path::Path;

use minirender_resources::{Model, TextureData};

#[test]
fn test_load_obj_model() {
    let model_path = Path::new("../../assets/models/viking_room.obj");

    // Skip test if file doesn't exist (CI environment may not have assets)
    if !model_path.exists() {
        println!("Skipping test: model file not found at {:?}", model_path);
        return;
    }

    let model = Model::load(model_path).expect("Failed to load OBJ model");

    assert!(model.vertex_count() > 0, "Model should have vertices");
    assert_eq!(model.indices.len() % 3, 0, "Indices should form triangles");
    assert!(
        model.vertex_count() < model.indices.len(),
        "Shared vertices should be deduplicated"
    );
    assert!(
        model
            .indices
            .iter()
            .all(|&i| (i as usize) < model.vertex_count()),
        "Every index should reference a vertex"
    );
}

#[test]
fn test_load_texture() {
    let texture_path = Path::new("../../assets/textures/viking_room.png");

    if !texture_path.exists() {
        println!("Skipping test: texture not found at {:?}", texture_path);
        return;
    }

    let texture = TextureData::load(texture_path).expect("Failed to load texture");
    assert_eq!(
        texture.pixels.len(),
        (texture.width * texture.height * 4) as usize
    );
}

#[test]
fn test_obj_cube_shares_corners() {
    let obj = "\
v -1 -1 -1
v  1 -1 -1
v  1  1 -1
v -1  1 -1
v -1 -1  1
v  1 -1  1
v  1  1  1
v -1  1  1
f 1 2 3 4
f 5 6 7 8
f 1 2 6 5
f 2 3 7 6
f 3 4 8 7
f 4 1 5 8
";
    let model = Model::from_obj_reader(obj.as_bytes()).expect("Failed to parse cube");

    // Without texcoords every corner position is one vertex.
    assert_eq!(model.vertex_count(), 8);
    assert_eq!(model.triangle_count(), 12);
    assert_eq!(model.size(), glam::Vec3::splat(2.0));
}
