use super::*;
use serde_json::json;

fn sample() -> IconDocument {
    IconDocument {
        fill: Fill::linear(
            vec!["display-p3:1.00000,0.00000,0.00000,1.00000".into(); 2],
            Some(Orientation {
                start: Xy { x: 0.5, y: 0.0 },
                stop: Xy { x: 0.5, y: 1.0 },
            }),
        ),
        fill_specializations: vec![Specialization {
            appearance: Appearance::Tinted,
            value: Fill::linear(vec!["extended-gray:0.50000,1.00000".into(); 2], None),
        }],
        groups: vec![Group {
            name: Some("front".into()),
            layers: vec![Layer {
                name: "glyph".into(),
                image_name: "01_01_glyph.svg".into(),
                glass: true,
                fill: None,
                fill_specializations: Vec::new(),
                opacity: Some(0.5),
                opacity_specializations: vec![Specialization {
                    appearance: Appearance::Dark,
                    value: 0.25,
                }],
            }],
            blur_material: None,
            lighting: Some(Lighting::Individual),
            shadow: Shadow {
                kind: ShadowKind::LayerColor,
                opacity: Some(0.5),
                catalog_style: None,
            },
            specular: Some(false),
            translucency: Translucency {
                enabled: true,
                value: 0.5,
            },
            opacity: None,
            opacity_specializations: Vec::new(),
        }],
        supported_platforms: SupportedPlatforms {
            squares: "shared".into(),
            circles: None,
        },
    }
}

#[test]
fn serializes_with_document_field_names() {
    let value = serde_json::to_value(sample()).unwrap();
    assert_eq!(value["fill"]["orientation"]["stop"]["y"], json!(1.0));
    assert_eq!(value["fill-specializations"][0]["appearance"], "tinted");
    assert!(value["fill-specializations"][0]["value"].get("orientation").is_none());

    let group = &value["groups"][0];
    assert_eq!(group["lighting"], "individual");
    assert_eq!(group["shadow"], json!({"kind": "layer-color", "opacity": 0.5}));
    assert_eq!(group["specular"], json!(false));
    assert!(group.get("blur-material").is_none());
    assert!(group.get("opacity-specializations").is_none());

    let layer = &group["layers"][0];
    assert_eq!(layer["image-name"], "01_01_glyph.svg");
    assert_eq!(layer["glass"], json!(true));
    assert!(layer.get("fill").is_none());
    assert_eq!(
        layer["opacity-specializations"],
        json!([{"appearance": "dark", "value": 0.25}])
    );
    assert_eq!(value["supported-platforms"], json!({"squares": "shared"}));
}

#[test]
fn unconfirmed_shadow_keeps_the_catalog_style() {
    let shadow = Shadow {
        kind: ShadowKind::Unconfirmed,
        opacity: Some(1.0),
        catalog_style: Some(1),
    };
    assert_eq!(
        serde_json::to_value(shadow).unwrap(),
        json!({"kind": "unconfirmed", "opacity": 1.0, "catalog-style": 1})
    );
}

#[test]
fn written_documents_read_back() {
    let doc = sample();
    let text = doc.to_json_pretty().unwrap();
    let back: IconDocument = serde_json::from_str(&text).unwrap();
    assert_eq!(back, doc);
    assert_eq!(back.layer_count(), 1);
    assert_eq!(back.image_names().collect::<Vec<_>>(), ["01_01_glyph.svg"]);
    assert!(!back.groups[0].has_specular());
}

#[test]
fn fill_diff_keeps_only_changed_fields() {
    let base = sample().fill;
    assert_eq!(base.diff(&base), None);

    let mut other = base.clone();
    other.linear_gradient = Some(vec!["extended-gray:0.10000,1.00000".into(); 2]);
    let diff = base.diff(&other).unwrap();
    assert_eq!(diff.linear_gradient, other.linear_gradient);
    assert_eq!(diff.orientation, None);
}
