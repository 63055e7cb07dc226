//! SVG rendering of an `icon.json` document.
//!
//! The output is a 1024x1024 approximation of the Icon Composer look: background gradient,
//! groups painted bottom-most first, shadow and glass filters, translucency and a backdrop
//! blur for blur materials. Assets are inlined so filters can read their pixels.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use base64::Engine as _;

use crate::catalog::color::DocumentColor;
use crate::document::model::{Fill, Group, IconDocument, ShadowKind};
use crate::foundation::core::{OPACITY_EPSILON, Rect};
use crate::foundation::error::RecomposeResult;
use crate::render::native::parse_svg;

/// Edge of the export viewBox.
pub const EXPORT_SIZE: f64 = 1024.0;
/// Shadow blur standard deviation on the export canvas.
pub const SHADOW_BLUR: f64 = 16.0;
/// Shadow vertical offset on the export canvas.
pub const SHADOW_OFFSET_Y: f64 = 10.0;
/// Document shadow opacity is full designed strength, not a literal alpha.
pub const SHADOW_ALPHA_SCALE: f64 = 0.35;
/// Blur material strength to backdrop blur radius.
pub const BLUR_MATERIAL_SCALE: f64 = 100.0;

/// A linear gradient paint in sRGB, ready to be written as `<linearGradient>`.
#[derive(Clone, Debug, PartialEq)]
pub struct SvgPaint {
    /// `(offset, [r, g, b], alpha)` per stop.
    pub stops: Vec<(f64, [u8; 3], f64)>,
    pub start: (f64, f64),
    pub stop: (f64, f64),
}

impl SvgPaint {
    /// Paint for a document fill. `None` when the fill carries no colors.
    pub fn from_fill(fill: &Fill) -> Option<Self> {
        let colors: Vec<&str> = match (&fill.linear_gradient, &fill.automatic_gradient) {
            (Some(list), _) if !list.is_empty() => list.iter().map(String::as_str).collect(),
            (_, Some(c)) => vec![c.as_str(), c.as_str()],
            _ => return None,
        };
        let n = colors.len();
        let stops = colors
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let offset = i as f64 / n.saturating_sub(1).max(1) as f64;
                let (rgb, alpha) = srgb_of(s);
                (offset, rgb, alpha)
            })
            .collect();
        let (start, stop) = match (&fill.orientation, &fill.automatic_gradient) {
            (Some(o), _) => ((o.start.x, o.start.y), (o.stop.x, o.stop.y)),
            _ => ((0.5, 0.0), (0.5, 1.0)),
        };
        Some(Self { stops, start, stop })
    }

    /// `<linearGradient>` element in object bounding box units.
    pub fn gradient_element(&self, id: &str) -> String {
        let mut out = format!(
            r#"<linearGradient id="{id}" gradientUnits="objectBoundingBox" x1="{}" y1="{}" x2="{}" y2="{}">"#,
            num(self.start.0),
            num(self.start.1),
            num(self.stop.0),
            num(self.stop.1)
        );
        for (offset, [r, g, b], alpha) in &self.stops {
            let _ = write!(
                out,
                r#"<stop offset="{}" stop-color="rgb({r},{g},{b})""#,
                num(*offset)
            );
            if (alpha - 1.0).abs() > OPACITY_EPSILON {
                let _ = write!(out, r#" stop-opacity="{}""#, num(*alpha));
            }
            out.push_str("/>");
        }
        out.push_str("</linearGradient>");
        out
    }
}

fn srgb_of(color: &str) -> ([u8; 3], f64) {
    match DocumentColor::parse(color) {
        Ok(c) => (c.to_srgb8(), c.a.clamp(0.0, 1.0)),
        Err(err) => {
            tracing::warn!(%err, "unreadable fill color, painting mid gray");
            ([128, 128, 128], 1.0)
        }
    }
}

/// Compact decimal for attribute values.
pub(crate) fn num(v: f64) -> String {
    let rounded = (v * 10_000.0).round() / 10_000.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

/// The drawable content of an SVG file, normalized by `usvg`, with every id prefixed.
#[derive(Clone, Debug)]
pub struct EmbeddedSvg {
    pub content: String,
    pub width: f64,
    pub height: f64,
}

impl EmbeddedSvg {
    /// Parse `bytes` and re-serialize its content with `id_prefix` on every id.
    pub fn parse(bytes: &[u8], id_prefix: &str) -> RecomposeResult<Self> {
        let tree = parse_svg(bytes, None)?;
        let text = tree.to_string(&usvg::WriteOptions {
            id_prefix: Some(id_prefix.to_owned()),
            ..usvg::WriteOptions::default()
        });
        let size = tree.size();
        Ok(Self {
            content: inner_content(&text)
                .context("normalized svg has no root element")?
                .to_owned(),
            width: f64::from(size.width()),
            height: f64::from(size.height()),
        })
    }

    /// Content stretched onto `target`.
    pub fn stretched(&self, target: Rect) -> String {
        let sx = target.width() / self.width;
        let sy = target.height() / self.height;
        self.wrapped(target.x0, target.y0, sx, sy)
    }

    /// Content scaled uniformly to fit `target`, centered.
    pub fn fitted(&self, target: Rect) -> String {
        let s = (target.width() / self.width).min(target.height() / self.height);
        let x = target.x0 + (target.width() - self.width * s) / 2.0;
        let y = target.y0 + (target.height() - self.height * s) / 2.0;
        self.wrapped(x, y, s, s)
    }

    fn wrapped(&self, x: f64, y: f64, sx: f64, sy: f64) -> String {
        format!(
            r#"<g transform="translate({} {}) scale({} {})">{}</g>"#,
            num(x),
            num(y),
            num(sx),
            num(sy),
            self.content
        )
    }
}

/// Text between the end of the first `<svg ...>` tag and the last `</svg>`.
fn inner_content(svg: &str) -> Option<&str> {
    let start = svg.find("<svg")?;
    let open_end = start + svg[start..].find('>')?;
    if svg[..=open_end].ends_with("/>") {
        return Some("");
    }
    let close = svg.rfind("</svg>")?;
    (close > open_end).then(|| svg[open_end + 1..close].trim())
}

/// Loads assets once and inlines them with a fresh id prefix per use.
struct Inliner<'a> {
    assets_dir: &'a Path,
    svgs: BTreeMap<String, Option<Vec<u8>>>,
    uses: usize,
}

impl<'a> Inliner<'a> {
    fn new(assets_dir: &'a Path) -> Self {
        Self {
            assets_dir,
            svgs: BTreeMap::new(),
            uses: 0,
        }
    }

    /// Markup drawing `image_name` onto the full export canvas, `None` for unusable assets.
    fn element(&mut self, image_name: &str, opacity: Option<f64>) -> RecomposeResult<Option<String>> {
        let path = self.assets_dir.join(image_name);
        let ext = image_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        let canvas = Rect::new(0.0, 0.0, EXPORT_SIZE, EXPORT_SIZE);
        let op = opacity_attr(opacity);
        self.uses += 1;
        match ext.as_str() {
            "svg" => {
                let bytes = self.svgs.entry(image_name.to_owned()).or_insert_with(|| {
                    std::fs::read(&path)
                        .inspect_err(|err| {
                            tracing::warn!(asset = image_name, %err, "svg asset missing, skipped")
                        })
                        .ok()
                });
                let Some(bytes) = bytes else {
                    return Ok(None);
                };
                let svg = EmbeddedSvg::parse(bytes, &format!("u{}_", self.uses))?;
                Ok(Some(format!("<g{op}>{}</g>", svg.fitted(canvas))))
            }
            "png" => {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("read asset {}", path.display()))?;
                let data = base64::engine::general_purpose::STANDARD.encode(bytes);
                Ok(Some(format!(
                    r#"<image href="data:image/png;base64,{data}" width="1024" height="1024"{op}/>"#
                )))
            }
            _ => {
                tracing::warn!(asset = image_name, "asset kind cannot be inlined, skipped");
                Ok(None)
            }
        }
    }
}

fn opacity_attr(opacity: Option<f64>) -> String {
    match opacity {
        Some(o) if (o - 1.0).abs() > OPACITY_EPSILON => format!(r#" opacity="{}""#, num(o)),
        _ => String::new(),
    }
}

const GLASS_SHEEN: &str = concat!(
    r#"<linearGradient id="glass-sheen" gradientUnits="objectBoundingBox" x1="0.5" y1="0" x2="0.5" y2="1">"#,
    r#"<stop offset="0" stop-color="white" stop-opacity="0.12"/>"#,
    r#"<stop offset="0.4" stop-color="white" stop-opacity="0"/>"#,
    r#"<stop offset="0.6" stop-color="black" stop-opacity="0"/>"#,
    r#"<stop offset="1" stop-color="black" stop-opacity="0.08"/>"#,
    "</linearGradient>"
);

fn shadow_filter(index: usize, kind: ShadowKind, opacity: f64) -> Option<String> {
    let input = match kind {
        ShadowKind::None => return None,
        ShadowKind::Neutral | ShadowKind::Unconfirmed => "SourceAlpha",
        ShadowKind::LayerColor => "SourceGraphic",
    };
    let slope = num(opacity * SHADOW_ALPHA_SCALE);
    Some(format!(
        concat!(
            r#"<filter id="shadow-g{i}" x="-30%" y="-30%" width="160%" height="160%">"#,
            r#"<feGaussianBlur in="{input}" stdDeviation="{blur}" result="blur"/>"#,
            r#"<feOffset in="blur" dy="{dy}" result="offset"/>"#,
            r#"<feComponentTransfer in="offset" result="shadow"><feFuncA type="linear" slope="{slope}"/></feComponentTransfer>"#,
            r#"<feMerge><feMergeNode in="shadow"/><feMergeNode in="SourceGraphic"/></feMerge>"#,
            "</filter>"
        ),
        i = index,
        input = input,
        blur = num(SHADOW_BLUR),
        dy = num(SHADOW_OFFSET_Y),
        slope = slope,
    ))
}

fn specular_filter(index: usize) -> String {
    format!(
        concat!(
            r#"<filter id="specular-g{i}">"#,
            r#"<feColorMatrix in="SourceGraphic" type="matrix" values="0.9 0 0 0 0 0 0.9 0 0 0 0 0 0.9 0 0 0 0 0 1 0" result="dimmed"/>"#,
            r#"<feMorphology in="SourceAlpha" operator="erode" radius="4" result="shrunk"/>"#,
            r#"<feGaussianBlur in="shrunk" stdDeviation="2" result="shrunkBlur"/>"#,
            r#"<feComposite in="SourceAlpha" in2="shrunkBlur" operator="arithmetic" k1="0" k2="1" k3="-1" k4="0" result="rimAlpha"/>"#,
            r#"<feFlood flood-color="white" result="white"/>"#,
            r#"<feComposite in="white" in2="rimAlpha" operator="in" result="rimLit"/>"#,
            r#"<feGaussianBlur in="SourceAlpha" stdDeviation="15" result="bump"/>"#,
            r#"<feSpecularLighting in="bump" surfaceScale="6" specularConstant="0.5" specularExponent="20" lighting-color="white" result="spec">"#,
            r#"<fePointLight x="512" y="0" z="500"/></feSpecularLighting>"#,
            r#"<feComposite in="spec" in2="SourceAlpha" operator="in" result="specClipped"/>"#,
            r#"<feComposite in="rimLit" in2="dimmed" operator="over" result="withRim"/>"#,
            r#"<feComposite in="specClipped" in2="withRim" operator="over"/>"#,
            "</filter>"
        ),
        i = index
    )
}

fn backdrop_filter(index: usize, radius: f64) -> String {
    format!(
        concat!(
            r#"<filter id="blur-g{i}">"#,
            r#"<feGaussianBlur stdDeviation="{r}" result="blurred"/>"#,
            r#"<feTurbulence type="fractalNoise" baseFrequency="0.008" numOctaves="2" seed="1" result="noise"/>"#,
            r#"<feDisplacementMap in="blurred" in2="noise" scale="10" xChannelSelector="R" yChannelSelector="G"/>"#,
            "</filter>"
        ),
        i = index,
        r = num(radius)
    )
}

/// Alpha mask made of every layer shape of a group.
fn shape_mask(
    id: &str,
    group: &Group,
    inliner: &mut Inliner<'_>,
    with_opacity: bool,
) -> RecomposeResult<String> {
    let mut out = format!(r#"<mask id="{id}" style="mask-type:alpha">"#);
    for layer in group.layers.iter().rev() {
        let opacity = if with_opacity { layer.opacity } else { None };
        if let Some(el) = inliner.element(&layer.image_name, opacity)? {
            out.push_str(&el);
        }
    }
    out.push_str("</mask>");
    Ok(out)
}

/// Render `doc` as a standalone SVG string, reading assets from `assets_dir`.
#[tracing::instrument(skip(doc), fields(groups = doc.groups.len()))]
pub fn build_svg(doc: &IconDocument, assets_dir: &Path) -> RecomposeResult<String> {
    let mut inliner = Inliner::new(assets_dir);
    let mut defs: Vec<String> = Vec::new();
    let mut body: Vec<String> = Vec::new();

    match SvgPaint::from_fill(&doc.fill) {
        Some(paint) => {
            defs.push(paint.gradient_element("bg-fill"));
            body.push(r#"<rect width="1024" height="1024" fill="url(#bg-fill)"/>"#.to_owned());
        }
        None => body.push(r#"<rect width="1024" height="1024" fill="gray"/>"#.to_owned()),
    }

    if doc.groups.iter().any(Group::has_specular) {
        defs.push(GLASS_SHEEN.to_owned());
    }

    // Documents list groups and layers front first; paint back to front.
    for (index, group) in doc.groups.iter().enumerate().rev() {
        let translucent = if group.translucency.enabled {
            (1.0 - group.translucency.value).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let group_opacity = translucent * group.opacity.unwrap_or(1.0);

        let shadow = shadow_filter(
            index,
            group.shadow.kind,
            group.shadow.opacity.unwrap_or(1.0),
        );
        let has_shadow = shadow.is_some();
        defs.extend(shadow);
        let specular = group.has_specular();
        if specular {
            defs.push(specular_filter(index));
        }

        if let Some(blur) = group.blur_material.filter(|b| *b > 0.0) {
            let backdrop = format!("backdrop-g{index}");
            let mask_id = format!("blur-mask-g{index}");
            let mut wrapped = vec![format!(r#"<g id="{backdrop}">"#)];
            wrapped.append(&mut body);
            wrapped.push("</g>".to_owned());
            body = wrapped;
            defs.push(shape_mask(&mask_id, group, &mut inliner, true)?);
            defs.push(backdrop_filter(index, blur * BLUR_MATERIAL_SCALE));
            body.push(format!(
                r##"<use href="#{backdrop}" filter="url(#blur-g{index})" mask="url(#{mask_id})"/>"##
            ));
        }

        let mut content = String::new();
        if has_shadow {
            let _ = write!(content, r#"<g filter="url(#shadow-g{index})">"#);
        }
        if specular {
            let _ = write!(content, r#"<g filter="url(#specular-g{index})">"#);
        }
        for (li, layer) in group.layers.iter().enumerate().rev() {
            if layer.image_name.to_ascii_lowercase().ends_with(".pdf") {
                tracing::warn!(asset = %layer.image_name, "pdf asset cannot be exported, skipped");
                continue;
            }
            let paint = layer.fill.as_ref().and_then(SvgPaint::from_fill);
            match paint {
                Some(paint) => {
                    let grad_id = format!("fill-g{index}-l{li}");
                    let mask_id = format!("mask-g{index}-l{li}");
                    defs.push(paint.gradient_element(&grad_id));
                    let shape = inliner.element(&layer.image_name, None)?.unwrap_or_default();
                    defs.push(format!(
                        r#"<mask id="{mask_id}" style="mask-type:alpha">{shape}</mask>"#
                    ));
                    let _ = write!(
                        content,
                        r#"<rect width="1024" height="1024" fill="url(#{grad_id})" mask="url(#{mask_id})"{}/>"#,
                        opacity_attr(layer.opacity)
                    );
                }
                None => {
                    if let Some(el) = inliner.element(&layer.image_name, layer.opacity)? {
                        content.push_str(&el);
                    }
                }
            }
        }
        if specular {
            content.push_str("</g>");
        }
        if has_shadow {
            content.push_str("</g>");
        }
        if specular {
            let mask_id = format!("glass-mask-g{index}");
            defs.push(shape_mask(&mask_id, group, &mut inliner, false)?);
            let _ = write!(
                content,
                r#"<rect width="1024" height="1024" fill="url(#glass-sheen)" mask="url(#{mask_id})"/>"#
            );
        }

        body.push(format!(
            "<g{}>{content}</g>",
            if group_opacity < 1.0 - OPACITY_EPSILON {
                format!(r#" opacity="{}""#, num(group_opacity))
            } else {
                String::new()
            }
        ));
    }

    let mut svg = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="1024" height="1024" viewBox="0 0 1024 1024">"#,
    );
    svg.push('\n');
    if !defs.is_empty() {
        svg.push_str("<defs>\n");
        for d in &defs {
            svg.push_str(d);
            svg.push('\n');
        }
        svg.push_str("</defs>\n");
    }
    for line in &body {
        svg.push_str(line);
        svg.push('\n');
    }
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Export the `icon.json` of a bundle directory as SVG.
pub fn bundle_svg(bundle: &Path) -> RecomposeResult<String> {
    let doc_path = bundle.join("icon.json");
    let text = std::fs::read_to_string(&doc_path)
        .with_context(|| format!("read {}", doc_path.display()))?;
    let doc: IconDocument = serde_json::from_str(&text)?;
    build_svg(&doc, &bundle.join("Assets"))
}

#[cfg(test)]
#[path = "../../tests/unit/render/svg_export.rs"]
mod tests;
