use super::*;
use crate::assets::files::list_extracted_dir;
use serde_json::{Value, json};

const CIRCLE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100" viewBox="0 0 100 100"><circle cx="50" cy="50" r="40"/></svg>"##;
const BAR: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="50" height="10" viewBox="0 0 50 10"><rect width="50" height="10"/></svg>"##;

/// Paints every request as an opaque red square.
struct Solid;

impl Renderer for Solid {
    fn render(&self, _path: &Path, size: u32) -> RecomposeResult<image::RgbaImage> {
        Ok(image::RgbaImage::from_pixel(
            size,
            size,
            image::Rgba([255, 0, 0, 255]),
        ))
    }
}

fn png(path: &Path, edge: u32) {
    image::RgbaImage::from_pixel(edge, edge, image::Rgba([0, 0, 255, 255]))
        .save(path)
        .unwrap();
}

fn two_group_catalog() -> Vec<Value> {
    vec![
        json!({"Platform": "ios"}),
        json!({
            "AssetType": "IconImageStack", "Name": "AppIcon", "CanvasWidth": 1024, "CanvasHeight": 1024,
            "Layers": [
                {"AssetType": "IconGroup", "Name": "AppIcon/front", "LayerHasSpecular": true},
                {"AssetType": "IconGroup", "Name": "AppIcon/back"}
            ]
        }),
        json!({
            "AssetType": "IconGroup", "Name": "AppIcon/front",
            "Layers": [
                {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerGradientColorName": "AppIcon/red"},
                {"AssetType": "Vector", "Name": "AppIcon/ring"}
            ]
        }),
        json!({
            "AssetType": "IconGroup", "Name": "AppIcon/front", "Appearance": "UIAppearanceDark",
            "Layers": [
                {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerGradientColorName": "AppIcon/white"},
                {"AssetType": "Vector", "Name": "AppIcon/ring"}
            ]
        }),
        json!({
            "AssetType": "IconGroup", "Name": "AppIcon/back",
            "Layers": [
                {"AssetType": "Image", "Name": "AppIcon/photo"},
                {"AssetType": "Image", "Name": "AppIcon/sticker", "LayerPosition": "100,100", "LayerSize": "200,200"}
            ]
        }),
        json!({"AssetType": "Vector", "Name": "AppIcon/glyph", "RenditionName": "glyph.svg"}),
        json!({"AssetType": "Vector", "Name": "AppIcon/ring", "RenditionName": "ring.svg"}),
        json!({"AssetType": "Image", "Name": "AppIcon/photo", "RenditionName": "photo.png"}),
        json!({"AssetType": "Image", "Name": "AppIcon/sticker", "RenditionName": "sticker.png"}),
        json!({"AssetType": "Icon Image", "Name": "AppIcon", "RenditionName": "icon_1024.png",
               "PixelWidth": 1024, "PixelHeight": 1024}),
        json!({"AssetType": "Color", "Name": "AppIcon/red", "Color components": [1, 0, 0, 1], "Colorspace": "srgb"}),
        json!({"AssetType": "Color", "Name": "AppIcon/white", "Color components": [1, 1], "Colorspace": "gray gamma 2.2"}),
    ]
}

fn two_group_files(dir: &Path) -> Vec<AssetFile> {
    std::fs::write(dir.join("glyph.svg"), CIRCLE).unwrap();
    std::fs::write(dir.join("ring.svg"), BAR).unwrap();
    png(&dir.join("photo.png"), 8);
    png(&dir.join("photo_dark.png"), 6);
    png(&dir.join("sticker.png"), 4);
    png(&dir.join("sticker@2x.png"), 8);
    png(&dir.join("icon_1024.png"), 16);
    png(&dir.join("unrelated.png"), 2);
    list_extracted_dir(dir).unwrap()
}

fn asset_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn matched(name: &str) -> LayerOutcome {
    LayerOutcome::Matched {
        file_name: name.to_owned(),
    }
}

#[test]
fn layers_get_ordinal_files_and_marked_variants() {
    let extracted = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    let assets = bundle.path().join("Assets");
    let model = CatalogModel::from_json(&two_group_catalog(), "AppIcon").unwrap();
    let files = two_group_files(extracted.path());
    let options = ResolveOptions {
        flatten: true,
        reframe: false,
    };

    let resolved = resolve_assets(&model, &files, &assets, &Solid, options).unwrap();

    let front = &resolved.groups[0];
    assert_eq!(front.flattened, None, "layer overrides keep the group apart");
    assert_eq!(front.layers[0].outcome, matched("01_01_glyph.svg"));
    assert_eq!(front.layers[1].outcome, matched("01_02_ring.svg"));

    let back = &resolved.groups[1];
    assert_eq!(back.layers[0].outcome, matched("02_01_photo.png"));
    assert_eq!(back.layers[0].marked_variants, [Appearance::Dark]);
    assert_eq!(back.layers[1].outcome, matched("02_02_sticker.png"));
    assert!(back.layers[1].marked_variants.is_empty());

    assert_eq!(
        asset_names(&assets),
        ["01_01_glyph.svg", "01_02_ring.svg", "02_01_photo.png", "02_02_sticker.png"]
    );
    assert_eq!(
        resolved.copied.iter().cloned().collect::<Vec<_>>(),
        asset_names(&assets)
    );
    assert_eq!(
        image::image_dimensions(assets.join("02_02_sticker.png")).unwrap(),
        (8, 8),
        "highest scale wins"
    );
    assert_eq!(resolved.filenames["photo"], "02_01_photo.png");
    assert!(resolved.reference.unwrap().ends_with("icon_1024.png"));
}

#[test]
fn partial_bitmaps_are_reframed_onto_the_canvas() {
    let extracted = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    let assets = bundle.path().join("Assets");
    let model = CatalogModel::from_json(&two_group_catalog(), "AppIcon").unwrap();
    let files = two_group_files(extracted.path());

    resolve_assets(&model, &files, &assets, &Solid, ResolveOptions::default()).unwrap();

    let sticker = image::open(assets.join("02_02_sticker.png")).unwrap().to_rgba8();
    assert_eq!(sticker.dimensions(), (1024, 1024));
    assert_eq!(sticker.get_pixel(50, 50)[3], 0);
    assert_eq!(sticker.get_pixel(100, 100).0, [255, 0, 0, 255]);
    assert_eq!(sticker.get_pixel(299, 299).0, [255, 0, 0, 255]);
    assert_eq!(sticker.get_pixel(301, 301)[3], 0);

    assert_eq!(
        image::image_dimensions(assets.join("02_01_photo.png")).unwrap(),
        (8, 8),
        "layers without geometry are left alone"
    );
}

#[test]
fn full_canvas_bitmaps_are_not_reframed() {
    assert!(fills_canvas(2048, 2048, Canvas::DEFAULT));
    assert!(!fills_canvas(200, 200, Canvas::DEFAULT));
    assert!(!fills_canvas(2048, 1024, Canvas::DEFAULT));
    assert!(same_rect(
        Rect::new(0.2, 0.0, 1024.0, 1024.3),
        Canvas::DEFAULT.rect()
    ));
}

fn loose_catalog() -> Vec<Value> {
    vec![
        json!({}),
        json!({"AssetType": "Vector", "Name": "AppIcon/a", "RenditionName": "shape.svg"}),
        json!({"AssetType": "Vector", "Name": "AppIcon/b", "RenditionName": "shape.svg"}),
        json!({"AssetType": "Vector", "Name": "AppIcon/c", "RenditionName": "lost.svg"}),
        json!({"AssetType": "Vector", "Name": "AppIcon/d", "RenditionName": "night.svg"}),
    ]
}

#[test]
fn shared_stems_duplicates_and_missing_files() {
    let extracted = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    let assets = bundle.path().join("Assets");
    std::fs::write(extracted.path().join("shape.svg"), CIRCLE).unwrap();
    std::fs::write(extracted.path().join("shape_copy.svg"), CIRCLE).unwrap();
    std::fs::write(extracted.path().join("shape_alt.svg"), BAR).unwrap();
    std::fs::write(extracted.path().join("night_dark.svg"), BAR).unwrap();
    let files = list_extracted_dir(extracted.path()).unwrap();
    let model = CatalogModel::from_json(&loose_catalog(), "AppIcon").unwrap();

    let resolved =
        resolve_assets(&model, &files, &assets, &Solid, ResolveOptions::default()).unwrap();
    let layers = &resolved.groups[0].layers;
    assert_eq!(layers[0].outcome, matched("01_01_a.svg"));
    assert_eq!(
        layers[1].outcome,
        LayerOutcome::Shared {
            file_name: "01_01_a.svg".into(),
            with: "AppIcon/a".into(),
        }
    );
    assert_eq!(layers[2].outcome, LayerOutcome::Unmatched);
    assert_eq!(layers[3].outcome, matched("01_04_d.svg"));
    assert_eq!(layers[3].marked_variants, [Appearance::Dark]);
    assert_eq!(resolved.groups[0].flattened, None);

    assert_eq!(
        asset_names(&assets),
        ["01_01_a.svg", "01_04_d.svg", "shape_alt.svg"]
    );
    assert_eq!(resolved.reference, None);
}

#[test]
fn glass_vector_groups_are_flattened() {
    let raw = vec![
        json!({}),
        json!({"AssetType": "Vector", "Name": "AppIcon/a", "RenditionName": "a.svg"}),
        json!({"AssetType": "Vector", "Name": "AppIcon/b", "RenditionName": "b.svg"}),
    ];
    let model = CatalogModel::from_json(&raw, "AppIcon").unwrap();
    let extracted = tempfile::tempdir().unwrap();
    std::fs::write(extracted.path().join("a.svg"), CIRCLE).unwrap();
    std::fs::write(extracted.path().join("b.svg"), BAR).unwrap();
    let files = list_extracted_dir(extracted.path()).unwrap();

    let bundle = tempfile::tempdir().unwrap();
    let assets = bundle.path().join("Assets");
    let resolved =
        resolve_assets(&model, &files, &assets, &Solid, ResolveOptions::default()).unwrap();
    assert_eq!(resolved.groups[0].flattened.as_deref(), Some("01_default.svg"));
    assert_eq!(asset_names(&assets), ["01_default.svg"]);
    assert_eq!(resolved.filenames["a"], "01_default.svg");
    assert_eq!(resolved.filenames["b"], "01_default.svg");

    let plain = tempfile::tempdir().unwrap();
    let kept = resolve_assets(
        &model,
        &files,
        plain.path(),
        &Solid,
        ResolveOptions {
            flatten: false,
            reframe: true,
        },
    )
    .unwrap();
    assert_eq!(kept.groups[0].flattened, None);
    assert_eq!(asset_names(plain.path()), ["01_01_a.svg", "01_02_b.svg"]);
}

#[test]
fn marked_files_stand_in_when_no_plain_file_exists() {
    let extracted = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    let assets = bundle.path().join("Assets");
    let model = CatalogModel::from_json(&two_group_catalog(), "AppIcon").unwrap();
    let mut files = two_group_files(extracted.path());
    std::fs::remove_file(extracted.path().join("photo.png")).unwrap();
    files.retain(|f| f.file_name != "photo.png");

    let resolved =
        resolve_assets(&model, &files, &assets, &Solid, ResolveOptions::default()).unwrap();

    let photo = &resolved.groups[1].layers[0];
    assert_eq!(photo.outcome, matched("02_01_photo.png"));
    assert_eq!(photo.marked_variants, [Appearance::Dark]);
    assert_eq!(
        image::image_dimensions(assets.join("02_01_photo.png")).unwrap(),
        (6, 6)
    );
    assert!(!assets.join("photo_dark.png").exists());
    assert_eq!(resolved.filenames["photo"], "02_01_photo.png");
}
