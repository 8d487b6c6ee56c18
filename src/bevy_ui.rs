use crate::ingest::Campus;
use crate::kernel_out::{MeshAttributes, RenderColor};
use crate::materials::Material as CampusMaterial;
use crate::picking::{Camera as CampusCamera, InfoDisplay, PickController};
use crate::registry::BuildingInfo;
use crate::scene::MaterialId;

///////////////////////////////////////////////////////////////////////////////////////////////////
// BEVY ///////////////////////////////////////////////////////////////////////////////////////////

use bevy::image::{ImageAddressMode, ImageLoaderSettings, ImageSampler, ImageSamplerDescriptor};
use bevy::math::{Affine2, DVec3};
use bevy::prelude::*;
use bevy::render::{
    mesh::Indices, render_asset::RenderAssetUsages, render_resource::PrimitiveTopology,
};
use bevy::window::PrimaryWindow;
use std::collections::HashMap;

static MOVE_SPEED: f32 = 2.0;

#[derive(Resource)]
struct CampusScene {
    campus: Campus,
    controller: PickController,
}

// Bevy material of each scene material, to mirror the emissive changes
#[derive(Resource, Default)]
struct BevyMaterials(HashMap<MaterialId, Handle<StandardMaterial>>);

// The info display of the window is the log
struct LogDisplay;

impl InfoDisplay for LogDisplay {
    fn show(&mut self, info: Option<&BuildingInfo>) {
        match info {
            Some(info) => info!(
                "{} (id {}): {} m, texture: {}, color: {}",
                info.display_name,
                info.building_id,
                info.height_meters,
                info.has_texture,
                info.base_color
            ),
            None => info!("no building selected"),
        }
    }
}

fn to_color(color: &RenderColor) -> Color {
    Color::srgba(color[0], color[1], color[2], color[3])
}

fn to_emissive(color: &RenderColor) -> LinearRgba {
    Color::srgb(color[0], color[1], color[2]).to_linear()
}

fn to_bevy_mesh(attributes: &MeshAttributes) -> Mesh {
    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
    .with_inserted_attribute(
        Mesh::ATTRIBUTE_POSITION,
        attributes.vertices_positions.clone(),
    )
    .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, attributes.vertices_uvs.clone())
    .with_inserted_indices(Indices::U32(attributes.indices_to_vertices.clone()));
    // caps share their corners, flat normals need them apart
    mesh.duplicate_vertices();
    mesh.compute_flat_normals();
    mesh
}

fn to_bevy_material(material: &CampusMaterial, asset_server: &AssetServer) -> StandardMaterial {
    let texture = material.texture.as_ref().map(|texture| {
        asset_server.load_with_settings(texture.path.clone(), |settings: &mut ImageLoaderSettings| {
            settings.sampler = ImageSampler::Descriptor(ImageSamplerDescriptor {
                address_mode_u: ImageAddressMode::Repeat,
                address_mode_v: ImageAddressMode::Repeat,
                ..default()
            });
        })
    });
    let repeat = material
        .texture
        .as_ref()
        .map_or(Vec2::ONE, |texture| Vec2::from(texture.repeat));

    StandardMaterial {
        base_color: to_color(&material.base_color),
        base_color_texture: texture,
        emissive: to_emissive(&material.emissive),
        perceptual_roughness: material.roughness,
        metallic: material.metalness,
        uv_transform: Affine2::from_scale(repeat),
        double_sided: true,
        cull_mode: None,
        ..default()
    }
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    asset_server: Res<AssetServer>,
    campus_scene: Res<CampusScene>,
) {
    let scene = &campus_scene.campus.scene;
    let mut handles = BevyMaterials::default();
    for (index, material) in scene.materials().iter().enumerate() {
        let handle = materials.add(to_bevy_material(material, &asset_server));
        handles.0.insert(MaterialId(index), handle);
    }

    for node in scene.nodes() {
        let Some(material) = handles.0.get(&node.material) else {
            continue;
        };
        commands.spawn((
            Mesh3d(meshes.add(to_bevy_mesh(&node.mesh))),
            MeshMaterial3d(material.clone()),
        ));
    }
    commands.insert_resource(handles);

    let camera = &campus_scene.campus.config.camera;
    let (right, up, backward) = camera
        .view_axes()
        .unwrap_or((DVec3::X, DVec3::NEG_Z, DVec3::Y));
    let rotation = Quat::from_mat3(&Mat3::from_cols(
        right.as_vec3(),
        up.as_vec3(),
        backward.as_vec3(),
    ));
    let position = camera.position.as_vec3();
    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: (camera.fov_y_degrees as f32).to_radians(),
            ..default()
        }),
        Transform::from_translation(position).with_rotation(rotation),
    ));

    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(200., 200., 100.).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

// WASD moves the camera over the ground
fn input_handler(
    keyboard_input: Res<ButtonInput<KeyCode>>,
    mut query: Query<&mut Transform, With<Camera3d>>,
) {
    for mut transform in &mut query {
        let mut forward = transform.forward().as_vec3();
        if forward.y.abs() > 0.999 {
            // looking down, "forward" is screen up
            forward = transform.up().as_vec3();
        }
        forward.y = 0.0;
        let forward = forward.normalize_or_zero();
        let right = Vec3::new(-forward.z, 0.0, forward.x);

        let mut step = Vec3::ZERO;
        if keyboard_input.pressed(KeyCode::KeyW) {
            step += forward;
        }
        if keyboard_input.pressed(KeyCode::KeyS) {
            step -= forward;
        }
        if keyboard_input.pressed(KeyCode::KeyA) {
            step -= right;
        }
        if keyboard_input.pressed(KeyCode::KeyD) {
            step += right;
        }
        transform.translation += step * MOVE_SPEED;
    }
}

fn click_handler(
    mouse_input: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Projection), With<Camera3d>>,
    mut campus_scene: ResMut<CampusScene>,
    handles: Res<BevyMaterials>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    if !mouse_input.just_pressed(MouseButton::Left) {
        return;
    }
    let Ok(window) = windows.get_single() else {
        return;
    };
    let Ok((transform, projection)) = cameras.get_single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };

    let fov_y_degrees = match projection {
        Projection::Perspective(perspective) => perspective.fov.to_degrees() as f64,
        _ => campus_scene.campus.config.camera.fov_y_degrees,
    };
    let (width, height) = (window.width() as f64, window.height() as f64);
    let camera = CampusCamera {
        position: transform.translation().as_dvec3(),
        target: (transform.translation() + transform.forward().as_vec3()).as_dvec3(),
        up: transform.up().as_vec3().as_dvec3(),
        fov_y_degrees,
        aspect: width / height,
    };
    let ray = camera.screen_ray(cursor.x as f64, cursor.y as f64, width, height);

    let CampusScene {
        campus,
        controller,
    } = &mut *campus_scene;
    controller.click(ray.as_ref(), &mut campus.scene, &campus.registry, &mut LogDisplay);

    for (material_id, handle) in &handles.0 {
        if let (Some(material), Some(bevy_material)) =
            (campus.scene.material(*material_id), materials.get_mut(handle))
        {
            bevy_material.emissive = to_emissive(&material.emissive);
        }
    }
}

/// Opens a window with the campus. Click a building to highlight it, WASD to move.
pub fn render_init(campus: Campus) {
    let controller = campus.pick_controller();
    App::new()
        // texture paths are relative to the working directory, not to "assets"
        .add_plugins(DefaultPlugins.set(AssetPlugin {
            file_path: ".".into(),
            ..default()
        }))
        .insert_resource(ClearColor(Color::srgb_u8(0x87, 0xce, 0xeb)))
        .insert_resource(AmbientLight {
            color: Color::WHITE,
            brightness: 300.0,
        })
        .insert_resource(CampusScene {
            campus,
            controller,
        })
        .add_systems(Startup, setup)
        .add_systems(Update, (input_handler, click_handler))
        .run();
}
