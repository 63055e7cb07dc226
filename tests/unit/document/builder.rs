use super::*;
use crate::assets::files::layer_file_name;
use crate::assets::resolver::{LayerOutcome, ResolvedLayer};
use crate::catalog::model::LayerKind;
use serde_json::{Value, json};

fn colors() -> Vec<Value> {
    vec![
        json!({"AssetType": "Color", "Name": "AppIcon/red", "Color components": [1, 0, 0, 1], "Colorspace": "srgb"}),
        json!({"AssetType": "Color", "Name": "AppIcon/white", "Color components": [1, 1], "Colorspace": "gray gamma 2.2"}),
        json!({"AssetType": "Named Gradient", "Name": "AppIcon/bg",
               "Gradient Colors": ["AppIcon/red", "AppIcon/white"], "Gradient Start/Stop": "0.5,0 - 0.5,1"}),
    ]
}

fn two_group_catalog() -> Vec<Value> {
    let mut raw = vec![
        json!({"Platform": "macosx-ios"}),
        json!({
            "AssetType": "IconImageStack", "Name": "AppIcon", "CanvasWidth": 1024, "CanvasHeight": 1024,
            "Layers": [
                {"AssetType": "Named Gradient", "Name": "AppIcon/bg"},
                {"AssetType": "IconGroup", "Name": "AppIcon/front", "LayerShadowStyle": 2,
                 "LayerShadowOpacity": 0.5, "LayerHasSpecular": true, "LayerTranslucency": 0.4,
                 "LayerBlurStrength": 0.123456789},
                {"AssetType": "IconGroup", "Name": "AppIcon/back", "LayerOpacity": 0.9,
                 "LayerShadowStyle": 1, "LayerShadowOpacity": 0.3}
            ]
        }),
        json!({
            "AssetType": "IconImageStack", "Name": "AppIcon", "Appearance": "UIAppearanceDark",
            "Layers": [
                {"AssetType": "IconGroup", "Name": "AppIcon/front"},
                {"AssetType": "IconGroup", "Name": "AppIcon/back", "LayerOpacity": 0.6}
            ]
        }),
        json!({
            "AssetType": "IconGroup", "Name": "AppIcon/front",
            "Layers": [
                {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerGradientColorName": "AppIcon/red",
                 "LayerOpacity": 0.8},
                {"AssetType": "Vector", "Name": "AppIcon/ring", "LayerGradientColorName": "AppIcon/white"}
            ]
        }),
        json!({
            "AssetType": "IconGroup", "Name": "AppIcon/front", "Appearance": "UIAppearanceDark",
            "Layers": [
                {"AssetType": "Vector", "Name": "AppIcon/glyph", "LayerGradientColorName": "AppIcon/white",
                 "LayerOpacity": 0.8},
                {"AssetType": "Vector", "Name": "AppIcon/ring", "LayerGradientColorName": "AppIcon/white"}
            ]
        }),
        json!({
            "AssetType": "IconGroup", "Name": "AppIcon/back",
            "Layers": [
                {"AssetType": "Image", "Name": "AppIcon/photo"},
                {"AssetType": "Image", "Name": "AppIcon/sticker"}
            ]
        }),
        json!({"AssetType": "Vector", "Name": "AppIcon/glyph", "RenditionName": "glyph.svg"}),
        json!({"AssetType": "Vector", "Name": "AppIcon/ring", "RenditionName": "ring.svg"}),
        json!({"AssetType": "Image", "Name": "AppIcon/photo", "RenditionName": "photo.png"}),
        json!({"AssetType": "Image", "Name": "AppIcon/sticker", "RenditionName": "sticker.png"}),
    ];
    raw.extend(colors());
    raw
}

fn model(raw: &[Value]) -> CatalogModel {
    CatalogModel::from_json(raw, "AppIcon").unwrap()
}

/// Every layer matched to its ordinal file name.
fn all_matched(model: &CatalogModel) -> ResolvedAssets {
    let groups = model
        .groups
        .iter()
        .enumerate()
        .map(|(gi, g)| ResolvedGroup {
            layers: g
                .layers
                .iter()
                .enumerate()
                .map(|(li, l)| {
                    let ext = match l.kind {
                        LayerKind::Vector => "svg",
                        LayerKind::Image => "png",
                    };
                    ResolvedLayer {
                        outcome: LayerOutcome::Matched {
                            file_name: layer_file_name(gi, li, &l.display_name, ext),
                        },
                        marked_variants: Vec::new(),
                    }
                })
                .collect(),
            flattened: None,
        })
        .collect();
    ResolvedAssets {
        groups,
        ..ResolvedAssets::default()
    }
}

fn doc_string(model: &CatalogModel, color: &str) -> String {
    model.colors[color].light.to_document_string()
}

#[test]
fn groups_and_layers_keep_catalog_order() {
    let m = model(&two_group_catalog());
    let doc = build_document(&m, &all_matched(&m)).unwrap();

    let names: Vec<_> = doc.groups.iter().map(|g| g.name.as_deref().unwrap()).collect();
    assert_eq!(names, ["front", "back"]);
    let images: Vec<_> = doc.image_names().collect();
    assert_eq!(
        images,
        ["01_01_glyph.svg", "01_02_ring.svg", "02_01_photo.png", "02_02_sticker.png"]
    );
    assert_eq!(
        doc.supported_platforms.circles.as_deref(),
        Some(&["watchOS".to_owned()][..])
    );
}

#[test]
fn root_fill_uses_the_declared_background() {
    let m = model(&two_group_catalog());
    let doc = build_document(&m, &all_matched(&m)).unwrap();
    assert_eq!(
        doc.fill.linear_gradient.as_deref().unwrap(),
        [doc_string(&m, "AppIcon/red"), doc_string(&m, "AppIcon/white")]
    );
    assert_eq!(doc.fill.orientation.unwrap().stop.y, 1.0);
    assert!(doc.fill_specializations.is_empty());
}

#[test]
fn group_properties_are_carried_over() {
    let m = model(&two_group_catalog());
    let doc = build_document(&m, &all_matched(&m)).unwrap();

    let front = &doc.groups[0];
    assert_eq!(front.shadow.kind, ShadowKind::LayerColor);
    assert_eq!(front.shadow.opacity, Some(0.5));
    assert_eq!(front.specular, None);
    assert_eq!(front.blur_material, Some(0.12346));
    assert_eq!(front.lighting, None);
    assert!(front.translucency.enabled);
    assert_eq!(front.translucency.value, 0.4);
    assert!(front.layers.iter().all(|l| l.glass));

    let back = &doc.groups[1];
    assert_eq!(back.shadow.kind, ShadowKind::Unconfirmed);
    assert_eq!(back.shadow.catalog_style, Some(1));
    assert_eq!(back.specular, Some(false));
    assert_eq!(back.lighting, Some(Lighting::Individual));
    assert_eq!(back.opacity, Some(0.9));
    assert_eq!(
        back.opacity_specializations,
        [Specialization {
            appearance: Appearance::Dark,
            value: 0.6
        }]
    );
    assert!(back.layers.iter().all(|l| !l.glass && l.fill.is_none()));
}

#[test]
fn specializations_appear_only_where_values_differ() {
    let m = model(&two_group_catalog());
    let doc = build_document(&m, &all_matched(&m)).unwrap();

    let glyph = &doc.groups[0].layers[0];
    let red = doc_string(&m, "AppIcon/red");
    let white = doc_string(&m, "AppIcon/white");
    let fill = glyph.fill.as_ref().unwrap();
    assert_eq!(fill.linear_gradient.as_deref().unwrap(), [red.clone(), red]);
    assert_eq!(fill.orientation, Some(CatalogOrientation::SOLID_FILL.into()));
    assert_eq!(glyph.fill_specializations.len(), 1);
    assert_eq!(glyph.fill_specializations[0].appearance, Appearance::Dark);
    assert_eq!(
        glyph.fill_specializations[0].value.linear_gradient.as_deref().unwrap(),
        [white.clone(), white]
    );
    assert_eq!(glyph.opacity, Some(0.8));
    assert!(glyph.opacity_specializations.is_empty(), "equal dark opacity");

    let ring = &doc.groups[0].layers[1];
    assert!(ring.fill.is_some());
    assert!(ring.fill_specializations.is_empty(), "equal dark fill");
    assert_eq!(ring.opacity, None);

    let values = AppearanceValues {
        light: 0.5,
        dark: Some(0.5 + OPACITY_EPSILON / 2.0),
        tinted: Some(0.25),
    };
    let (base, specs) = opacity_fields(&values);
    assert_eq!(base, Some(0.5));
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].appearance, Appearance::Tinted);
}

#[test]
fn unmatched_layers_are_omitted_and_empty_groups_dropped() {
    let m = model(&two_group_catalog());
    let mut resolved = all_matched(&m);
    resolved.groups[0].layers[1].outcome = LayerOutcome::Unmatched;
    for layer in &mut resolved.groups[1].layers {
        layer.outcome = LayerOutcome::Unmatched;
    }
    let doc = build_document(&m, &resolved).unwrap();
    assert_eq!(doc.groups.len(), 1);
    assert_eq!(doc.groups[0].layers.len(), 1);
    assert_eq!(doc.groups[0].layers[0].name, "glyph");
}

#[test]
fn flattened_groups_become_one_layer() {
    let m = model(&two_group_catalog());
    let mut resolved = all_matched(&m);
    resolved.groups[0].flattened = Some("01_front.svg".into());
    let doc = build_document(&m, &resolved).unwrap();
    let front = &doc.groups[0];
    assert_eq!(front.layers.len(), 1);
    assert_eq!(front.layers[0].name, "front");
    assert_eq!(front.layers[0].image_name, "01_front.svg");
    assert!(front.layers[0].glass);
    assert!(front.layers[0].fill.is_none());
}

#[test]
fn shared_files_are_referenced_twice() {
    let m = model(&two_group_catalog());
    let mut resolved = all_matched(&m);
    resolved.groups[1].layers[1].outcome = LayerOutcome::Shared {
        file_name: "02_01_photo.png".into(),
        with: "AppIcon/photo".into(),
    };
    let doc = build_document(&m, &resolved).unwrap();
    let images: Vec<_> = doc.groups[1].layers.iter().map(|l| l.image_name.as_str()).collect();
    assert_eq!(images, ["02_01_photo.png", "02_01_photo.png"]);
}

fn stack_without_background(gradients: &[&str]) -> Vec<Value> {
    let mut raw = vec![
        json!({}),
        json!({
            "AssetType": "IconImageStack", "Name": "AppIcon",
            "Layers": [{"AssetType": "IconGroup", "Name": "AppIcon/g"}]
        }),
        json!({
            "AssetType": "IconGroup", "Name": "AppIcon/g",
            "Layers": [{"AssetType": "Vector", "Name": "AppIcon/v", "LayerGradientColorName": "AppIcon/used"}]
        }),
        json!({"AssetType": "Vector", "Name": "AppIcon/v", "RenditionName": "v.svg"}),
        json!({"AssetType": "Color", "Name": "AppIcon/red", "Color components": [1, 0, 0, 1]}),
        json!({"AssetType": "Named Gradient", "Name": "AppIcon/used", "Gradient Colors": ["AppIcon/red"]}),
        json!({"AssetType": "Named Gradient", "Name": "Other/bg", "Gradient Colors": ["AppIcon/red"]}),
    ];
    for name in gradients {
        raw.push(json!({"AssetType": "Named Gradient", "Name": name, "Gradient Colors": ["AppIcon/red"]}));
    }
    raw
}

#[test]
fn undeclared_background_needs_a_single_candidate() {
    let one = model(&stack_without_background(&["AppIcon/bg"]));
    let doc = build_document(&one, &all_matched(&one)).unwrap();
    let red = doc_string(&one, "AppIcon/red");
    assert_eq!(doc.fill.linear_gradient.as_deref().unwrap(), [red.clone(), red]);

    for gradients in [&[][..], &["AppIcon/bg1", "AppIcon/bg2"][..]] {
        let m = model(&stack_without_background(gradients));
        let err = build_document(&m, &all_matched(&m)).unwrap_err();
        assert!(matches!(err, RecomposeError::Ambiguous(_)), "{err}");
    }
}

#[test]
fn tinted_fill_carries_only_the_changed_fields() {
    let mut raw = two_group_catalog();
    raw.push(json!({"AssetType": "Color", "Name": "AppIcon/white", "Appearance": "ISAppearanceTintable",
                    "Color components": [0.3, 1], "Colorspace": "gray gamma 2.2"}));
    let m = model(&raw);
    let doc = build_document(&m, &all_matched(&m)).unwrap();
    assert_eq!(doc.fill_specializations.len(), 1);
    let spec = &doc.fill_specializations[0];
    assert_eq!(spec.appearance, Appearance::Tinted);
    assert_eq!(spec.value.orientation, None);
    assert_eq!(
        spec.value.linear_gradient.as_ref().unwrap()[1],
        "extended-gray:0.30000,1.00000"
    );
}

#[test]
fn a_distinct_dark_background_becomes_the_tinted_fill() {
    let mut raw = two_group_catalog();
    raw[2]["Layers"]
        .as_array_mut()
        .unwrap()
        .insert(0, json!({"AssetType": "Named Gradient", "Name": "AppIcon/bg-dark"}));
    raw.push(json!({"AssetType": "Named Gradient", "Name": "AppIcon/bg-dark",
                    "Gradient Colors": ["AppIcon/white", "AppIcon/red"]}));
    let m = model(&raw);
    let doc = build_document(&m, &all_matched(&m)).unwrap();
    let spec = &doc.fill_specializations[0];
    assert_eq!(
        spec.value.linear_gradient.as_deref().unwrap(),
        [doc_string(&m, "AppIcon/white"), doc_string(&m, "AppIcon/red")]
    );
}

#[test]
fn legacy_icons_get_an_automatic_fill() {
    let bitmaps = vec![
        json!({"Platform": "macosx"}),
        json!({"AssetType": "Icon Image", "Name": "AppIcon", "RenditionName": "icon_512x512@2x.png",
               "PixelWidth": 1024, "PixelHeight": 1024}),
    ];
    let m = model(&bitmaps);
    let doc = build_document(&m, &all_matched(&m)).unwrap();
    assert_eq!(doc.fill.automatic_gradient.as_deref(), Some(MID_GRAY));
    assert_eq!(doc.groups.len(), 1);
    assert_eq!(doc.groups[0].shadow.kind, ShadowKind::None);
    assert_eq!(doc.supported_platforms.circles, None);

    let mut tinted = bitmaps;
    tinted.push(json!({"AssetType": "Color", "Name": "AppIcon/accent", "Color components": [0, 0, 1, 1]}));
    let m = model(&tinted);
    let doc = build_document(&m, &all_matched(&m)).unwrap();
    assert_eq!(
        doc.fill.automatic_gradient,
        Some(doc_string(&m, "AppIcon/accent"))
    );
}

#[test]
fn structural_mismatches_are_inconsistent() {
    let m = model(&two_group_catalog());
    let mut resolved = all_matched(&m);
    resolved.groups.pop();
    let err = build_document(&m, &resolved).unwrap_err();
    assert!(matches!(err, RecomposeError::Inconsistent(_)));

    let mut emptied = m.clone();
    emptied.groups[1].layers.clear();
    let mut resolved = all_matched(&m);
    resolved.groups[1].layers.clear();
    let err = build_document(&emptied, &resolved).unwrap_err();
    assert!(matches!(err, RecomposeError::Inconsistent(_)));
}
