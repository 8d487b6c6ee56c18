mod common;

use campus_tb::*;
use common::*;
use serde_json::json;

async fn two_buildings() -> Campus {
    let fetcher = MockFetcher::new()
        .with_source(
            1,
            0,
            vec![building(0.0, 10.0, 5.0).with_property("name", json!("Rectorate"))],
        )
        .with_source(2, 0, vec![building(20.0, 30.0, 8.0)]);
    let mut campus = untextured_campus(test_config(2));
    campus.load(&fetcher).await;
    campus
}

fn emissive(campus: &Campus, building_id: u32) -> RenderColor {
    let record = campus.registry.get(BuildingId(building_id)).unwrap();
    campus.scene.material(record.material).unwrap().emissive
}

#[tokio::test]
async fn highlight_moves_and_clears_with_restored_emissive() {
    let mut campus = two_buildings().await;
    let highlight = campus.config.highlight_color();
    let (original_a, original_b) = (emissive(&campus, 1), emissive(&campus, 2));
    let mut controller = campus.pick_controller();
    let mut display = CollectedInfo::default();

    let state = controller.click(
        Some(&ray_down(3.0, 4.0)),
        &mut campus.scene,
        &campus.registry,
        &mut display,
    );
    assert_eq!(state, HighlightState::Highlighted(BuildingId(1)));
    assert_eq!(emissive(&campus, 1), highlight);
    assert_eq!(emissive(&campus, 2), original_b);

    let state = controller.click(
        Some(&ray_down(23.0, 24.0)),
        &mut campus.scene,
        &campus.registry,
        &mut display,
    );
    assert_eq!(state, HighlightState::Highlighted(BuildingId(2)));
    assert_eq!(emissive(&campus, 1), original_a);
    assert_eq!(emissive(&campus, 2), highlight);

    // the ground is under every pixel but never picked
    let state = controller.click(
        Some(&ray_down(60.0, 60.0)),
        &mut campus.scene,
        &campus.registry,
        &mut display,
    );
    assert_eq!(state, HighlightState::Idle);
    assert_eq!(emissive(&campus, 1), original_a);
    assert_eq!(emissive(&campus, 2), original_b);

    let emitted: Vec<Option<BuildingId>> = display
        .emitted
        .iter()
        .map(|info| info.as_ref().map(|info| info.building_id))
        .collect();
    assert_eq!(emitted, vec![Some(BuildingId(1)), Some(BuildingId(2)), None]);
    let first = display.emitted[0].as_ref().unwrap();
    assert_eq!(first.display_name, "Rectorate");
    assert_eq!(first.height_meters, 5.0);
    assert!(!first.has_texture);
    assert_eq!(first.base_color, "rgb(135, 206, 235)");
}

#[tokio::test]
async fn clicking_the_highlighted_building_keeps_it() {
    let mut campus = two_buildings().await;
    let highlight = campus.config.highlight_color();
    let mut controller = campus.pick_controller();
    let mut display = CollectedInfo::default();

    for _ in 0..2 {
        let state = controller.click(
            Some(&ray_down(3.0, 4.0)),
            &mut campus.scene,
            &campus.registry,
            &mut display,
        );
        assert_eq!(state, HighlightState::Highlighted(BuildingId(1)));
        assert_eq!(emissive(&campus, 1), highlight);
    }
    assert_eq!(display.emitted.len(), 2);
    assert_eq!(display.emitted[0], display.emitted[1]);

    let material = campus.registry.get(BuildingId(1)).unwrap().material;
    assert_eq!(controller.original_emissive(material), Some(BLACK));
}

#[tokio::test]
async fn alternating_highlights_restore_both_originals() {
    let mut campus = two_buildings().await;
    let highlight = campus.config.highlight_color();
    let mut controller = campus.pick_controller();
    let mut display = CollectedInfo::default();
    let on_a = ray_down(3.0, 4.0);
    let on_b = ray_down(23.0, 24.0);

    // A, B, A, B, A again, then nothing
    let clicks = [(&on_a, 1, 2), (&on_b, 2, 1), (&on_a, 1, 2), (&on_b, 2, 1), (&on_a, 1, 2)];
    for (ray, lit, dark) in clicks {
        let state = controller.click(Some(ray), &mut campus.scene, &campus.registry, &mut display);
        assert_eq!(state, HighlightState::Highlighted(BuildingId(lit)));
        assert_eq!(emissive(&campus, lit), highlight);
        assert_eq!(emissive(&campus, dark), BLACK);
    }

    let state = controller.click(
        Some(&ray_down(60.0, 60.0)),
        &mut campus.scene,
        &campus.registry,
        &mut display,
    );
    assert_eq!(state, HighlightState::Idle);
    assert_eq!(emissive(&campus, 1), BLACK);
    assert_eq!(emissive(&campus, 2), BLACK);

    // the highlight color was never taken for an original
    for building_id in [1, 2] {
        let material = campus.registry.get(BuildingId(building_id)).unwrap().material;
        assert_eq!(controller.original_emissive(material), Some(BLACK));
    }
    assert_eq!(display.emitted.len(), 6);
}

#[tokio::test]
async fn click_without_a_ray_clears() {
    let mut campus = two_buildings().await;
    let mut controller = campus.pick_controller();
    let mut display = CollectedInfo::default();

    controller.select(BuildingId(2), &mut campus.scene, &campus.registry, &mut display);
    let state = controller.click(None, &mut campus.scene, &campus.registry, &mut display);
    assert_eq!(state, HighlightState::Idle);
    assert_eq!(emissive(&campus, 2), BLACK);
    assert_eq!(display.emitted.last(), Some(&None));
}

#[tokio::test]
async fn overview_camera_picks_the_building_under_the_center() {
    // the camera looks down on (80.85, 197.06)
    let footprint = ring(&[[70.0, 187.0], [90.0, 187.0], [90.0, 207.0], [70.0, 207.0], [70.0, 187.0]]);
    let fetcher = MockFetcher::new().with_source(
        1,
        0,
        vec![GeoFeature::polygon(footprint, vec![]).with_property("estimated_height", json!(10))],
    );
    let mut config = test_config(1);
    config.bounds.max_lat = 300.0;
    let mut campus = untextured_campus(config);
    campus.load(&fetcher).await;

    let camera = Camera {
        aspect: 1280.0 / 720.0,
        ..campus.config.camera
    };
    let ray = camera.screen_ray(640.0, 360.0, 1280.0, 720.0).unwrap();
    let hit = pick_ray(&campus.scene, &ray).unwrap();
    assert_eq!(hit.building_id, BuildingId(1));
    // the roof is 30 scene units high
    assert!((hit.point.y - 30.0).abs() < 1e-3);

    let corner = camera.screen_ray(0.0, 0.0, 1280.0, 720.0).unwrap();
    assert!(pick_ray(&campus.scene, &corner).is_none());
}
