use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::color::Color;
use crate::catalog::entry::{
    CatalogEntry, CatalogMetadata, ColorEntry, GradientEntry, GroupContainerEntry, GroupEntry,
    RenditionEntry, StackMember, is_scoped, parse_entries,
};
use crate::foundation::core::{
    Appearance, AppearanceValues, Canvas, OPACITY_EPSILON, Point, Rect, parse_geometry, parse_pair,
};
use crate::foundation::error::{RecomposeError, RecomposeResult};

/// Name of the synthetic group used when the catalog has no group structure.
pub const DEFAULT_GROUP_NAME: &str = "default";

/// Translucency used when a group does not declare one.
pub const DEFAULT_TRANSLUCENCY: f64 = 0.5;

fn locale_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-([a-z]{2}(?:-[A-Za-z]+)?)$").expect("valid locale regex"))
}

/// Locale suffix of a rendition stem (`-ja`, `-zh-Hant`), if any.
pub fn locale_of(stem: &str) -> Option<&str> {
    locale_regex()
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Latin-script locale tag, preferred among locale variants.
pub const LATIN_LOCALE: &str = "la";

/// Gradient direction in unit coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub start: Point,
    pub stop: Point,
}

impl Orientation {
    /// Top-centre to bottom-centre, used for solid color fills.
    pub const SOLID_FILL: Orientation = Orientation {
        start: Point::new(0.5, 0.5),
        stop: Point::new(0.5, 1.0),
    };

    /// Parse catalog `"x,y - x,y"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (a, b) = raw.split_once(" - ")?;
        let (sx, sy) = parse_pair(a).ok()?;
        let (ex, ey) = parse_pair(b).ok()?;
        Some(Self {
            start: Point::new(sx, sy),
            stop: Point::new(ex, ey),
        })
    }

    /// Direction angle in degrees, `0` pointing right, growing clockwise (y down).
    pub fn angle_degrees(&self) -> f64 {
        let d = self.stop - self.start;
        d.y.atan2(d.x).to_degrees()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GradientStop {
    pub position: f64,
    pub color_name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    pub stops: Vec<GradientStop>,
    pub orientation: Option<Orientation>,
}

impl Gradient {
    fn from_entry(entry: &GradientEntry) -> Self {
        let n = entry.colors.len();
        let positions: Vec<f64> = match &entry.locations {
            Some(locs) if locs.len() == n => locs.clone(),
            other => {
                if other.is_some() {
                    tracing::warn!(
                        gradient = %entry.name,
                        "gradient locations do not match its colors, spacing stops evenly"
                    );
                }
                (0..n)
                    .map(|i| if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 })
                    .collect()
            }
        };
        let stops = entry
            .colors
            .iter()
            .zip(positions)
            .map(|(c, position)| GradientStop {
                position,
                color_name: c.clone(),
            })
            .collect();
        let orientation = entry.start_stop.as_deref().and_then(Orientation::parse);
        Self { stops, orientation }
    }
}

/// A gradient with every stop color resolved under one appearance.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGradient {
    pub stops: Vec<(f64, Color)>,
    pub orientation: Option<Orientation>,
}

/// What a fill reference name points at.
#[derive(Clone, Copy, Debug)]
pub enum FillTarget<'a> {
    Color(&'a AppearanceValues<Color>),
    Gradient(&'a AppearanceValues<Gradient>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Vector,
    Image,
}

/// Where a layer's matching stem came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StemSource {
    /// `RenditionName` of the layer's catalog rendition.
    Rendition,
    /// No rendition; derived from the layer name.
    LayerName,
}

/// A non-baseline bitmap the document cannot carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppearanceVariant {
    pub appearance: Appearance,
    /// Catalog name of the variant layer, icon prefix stripped.
    pub layer: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayerSpec {
    /// Full catalog name (`AppIcon/glyph`).
    pub name: String,
    /// Icon prefix stripped (`glyph`, or `a/b` for nested names).
    pub short_name: String,
    /// Last path segment.
    pub display_name: String,
    pub stem: String,
    pub stem_source: StemSource,
    pub kind: LayerKind,
    pub fill: AppearanceValues<Option<String>>,
    pub opacity: AppearanceValues<f64>,
    /// Glass flag, inherited from the group.
    pub specular: bool,
    pub geometry: Option<Rect>,
    /// Position inside the group in catalog order, front-most first.
    pub order: usize,
    /// Rendition stems known for this layer but not selected.
    pub locale_variants: Vec<String>,
    pub appearance_variants: Vec<AppearanceVariant>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shadow {
    None,
    Neutral { opacity: f64 },
    Chromatic { opacity: f64 },
    /// A catalog style whose document meaning has not been observed.
    Unconfirmed { style: i64, opacity: f64 },
}

impl Shadow {
    pub fn from_catalog(style: Option<i64>, opacity: Option<f64>, group: &str) -> Self {
        let opacity = opacity.unwrap_or(1.0);
        match style {
            None | Some(3) => Self::Neutral { opacity },
            Some(2) => Self::Chromatic { opacity },
            Some(style) => {
                tracing::warn!(group, style, "unconfirmed shadow style, kept as unconfirmed");
                Self::Unconfirmed { style, opacity }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Translucency {
    pub enabled: bool,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupSpec {
    pub name: String,
    pub short_name: String,
    pub display_name: String,
    pub layers: Vec<LayerSpec>,
    pub shadow: Shadow,
    pub translucency: Translucency,
    pub blur_strength: Option<f64>,
    pub specular: bool,
    pub image_only: bool,
    pub opacity: AppearanceValues<f64>,
}

impl GroupSpec {
    fn new(name: &str, icon_name: &str) -> Self {
        Self {
            name: name.to_owned(),
            short_name: short_name(name, icon_name),
            display_name: display_name(name),
            layers: Vec::new(),
            shadow: Shadow::Neutral { opacity: 1.0 },
            translucency: Translucency {
                enabled: true,
                value: DEFAULT_TRANSLUCENCY,
            },
            blur_strength: None,
            specular: true,
            image_only: false,
            opacity: AppearanceValues::baseline(1.0),
        }
    }

    fn apply_props(&mut self, member: &StackMember) {
        self.specular = member.has_specular || member.gathers_specular;
        self.shadow = Shadow::from_catalog(member.shadow_style, member.shadow_opacity, &self.name);
        let value = member.translucency.unwrap_or(DEFAULT_TRANSLUCENCY);
        self.translucency = Translucency {
            enabled: value > 0.0,
            value,
        };
        self.blur_strength = member.blur_strength.filter(|b| *b > 0.0);
    }

    fn finish_image_only(&mut self) {
        if self.image_only {
            self.specular = false;
            self.translucency.enabled = false;
        }
        for layer in &mut self.layers {
            layer.specular = self.specular;
        }
    }
}

/// A pre-rendered `Icon Image` rendition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyBitmap {
    pub name: String,
    pub stem: String,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl LegacyBitmap {
    fn pixel_count(&self) -> u64 {
        u64::from(self.pixel_width) * u64::from(self.pixel_height)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelShape {
    /// Groups and layers recovered from the catalog.
    Composable,
    /// Only pre-rendered bitmaps: one synthetic group with one layer.
    Legacy { bitmap: LegacyBitmap },
}

/// Everything recovered from one icon's catalog entries. Immutable once built.
#[derive(Clone, Debug)]
pub struct CatalogModel {
    pub icon_name: String,
    pub metadata: CatalogMetadata,
    pub colors: BTreeMap<String, AppearanceValues<Color>>,
    /// Color names in catalog order.
    pub color_order: Vec<String>,
    pub gradients: BTreeMap<String, AppearanceValues<Gradient>>,
    pub groups: Vec<GroupSpec>,
    pub canvas: Canvas,
    pub shape: ModelShape,
    /// Background gradient declared by the group container of each appearance.
    pub backgrounds: BTreeMap<Appearance, String>,
    /// Highest-resolution `Icon Image` stem (composable mode only).
    pub reference_stem: Option<String>,
}

/// Strip the `icon/` prefix from a scoped name.
pub fn short_name(name: &str, icon_name: &str) -> String {
    name.strip_prefix(icon_name)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name)
        .to_owned()
}

/// Last `/`-separated segment of a name.
pub fn display_name(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_owned()
}

#[derive(Default)]
struct Renditions {
    /// Unique stems per layer name in catalog order: (stem, appearance).
    stems: BTreeMap<String, Vec<(String, Appearance)>>,
    kinds: BTreeMap<String, LayerKind>,
    /// Layer names in first-seen order.
    order: Vec<String>,
}

impl Renditions {
    fn add(&mut self, entry: &RenditionEntry, kind: LayerKind) {
        let Some(stem) = entry.stem() else {
            return;
        };
        let appearance = Appearance::from_catalog(entry.appearance.as_deref());
        if !self.kinds.contains_key(&entry.name) {
            self.order.push(entry.name.clone());
            self.kinds.insert(entry.name.clone(), kind);
        }
        let stems = self.stems.entry(entry.name.clone()).or_default();
        if !stems.iter().any(|(s, _)| s == stem) {
            stems.push((stem.to_owned(), appearance));
        }
    }

    /// Selected stem plus the unselected baseline stems.
    fn select(&self, name: &str) -> Option<(String, Vec<String>)> {
        let all = self.stems.get(name)?;
        let light: Vec<&str> = all
            .iter()
            .filter(|(_, a)| *a == Appearance::Light)
            .map(|(s, _)| s.as_str())
            .collect();
        let pool: Vec<&str> = if light.is_empty() {
            all.iter().map(|(s, _)| s.as_str()).collect()
        } else {
            light
        };
        let selected = pool
            .iter()
            .find(|s| locale_of(s) == Some(LATIN_LOCALE))
            .or_else(|| pool.first())
            .copied()?;
        let others = pool
            .iter()
            .filter(|s| **s != selected)
            .map(|s| (*s).to_owned())
            .collect();
        Some((selected.to_owned(), others))
    }

    /// Stems recorded only under a non-baseline appearance.
    fn appearance_stems(&self, name: &str) -> Vec<(Appearance, String)> {
        self.stems
            .get(name)
            .map(|all| {
                all.iter()
                    .filter(|(_, a)| *a != Appearance::Light)
                    .map(|(s, a)| (*a, s.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Per-appearance view of one `IconGroup`.
struct GroupVariants<'a> {
    by_appearance: BTreeMap<Appearance, &'a GroupEntry>,
    first: Option<&'a GroupEntry>,
}

impl CatalogModel {
    /// Parse a raw (already filtered) catalog dump and build the model.
    pub fn from_json(raw: &[serde_json::Value], icon_name: &str) -> RecomposeResult<Self> {
        let (metadata, entries) = parse_entries(raw)?;
        Self::from_entries(metadata, &entries, icon_name)
    }

    /// Build the model from typed entries.
    #[tracing::instrument(skip(metadata, entries), fields(entries = entries.len()))]
    pub fn from_entries(
        metadata: CatalogMetadata,
        entries: &[CatalogEntry],
        icon_name: &str,
    ) -> RecomposeResult<Self> {
        let (colors, color_order) = collect_colors(entries)?;
        let gradients = collect_gradients(entries);

        let mut stacks: Vec<&GroupContainerEntry> = Vec::new();
        let mut group_entries: BTreeMap<&str, GroupVariants<'_>> = BTreeMap::new();
        let mut group_entry_order: Vec<&str> = Vec::new();
        let mut renditions = Renditions::default();
        let mut bitmaps: Vec<LegacyBitmap> = Vec::new();

        for entry in entries {
            if !is_scoped(entry.name(), icon_name) {
                continue;
            }
            match entry {
                CatalogEntry::GroupContainer(e) => stacks.push(e),
                CatalogEntry::Group(e) => {
                    let slot = group_entries.entry(e.name.as_str()).or_insert_with(|| {
                        group_entry_order.push(e.name.as_str());
                        GroupVariants {
                            by_appearance: BTreeMap::new(),
                            first: None,
                        }
                    });
                    slot.first.get_or_insert(e);
                    let appearance = Appearance::from_catalog(e.appearance.as_deref());
                    if slot.by_appearance.contains_key(&appearance) {
                        tracing::warn!(group = %e.name, %appearance, "duplicate group entry ignored");
                    } else {
                        slot.by_appearance.insert(appearance, e);
                    }
                }
                CatalogEntry::VectorLayer(e) => renditions.add(e, LayerKind::Vector),
                CatalogEntry::ImageLayer(e) => renditions.add(e, LayerKind::Image),
                CatalogEntry::LegacyBitmap(e) => {
                    if let Some(stem) = e.stem() {
                        bitmaps.push(LegacyBitmap {
                            name: e.name.clone(),
                            stem: stem.to_owned(),
                            pixel_width: e.pixel_width,
                            pixel_height: e.pixel_height,
                        });
                    }
                }
                CatalogEntry::MultiSizedImage(_)
                | CatalogEntry::Color(_)
                | CatalogEntry::Gradient(_) => {}
            }
        }

        // Baseline stacks first so they decide group order and properties.
        stacks.sort_by_key(|s| Appearance::from_catalog(s.appearance.as_deref()) != Appearance::Light);

        let best_bitmap = bitmaps
            .iter()
            .fold(None::<&LegacyBitmap>, |best, b| match best {
                Some(cur) if cur.pixel_count() >= b.pixel_count() => Some(cur),
                _ => Some(b),
            })
            .cloned();

        let mut backgrounds = BTreeMap::new();
        let (groups, shape, reference_stem) = if !stacks.is_empty() || !group_entries.is_empty() {
            for stack in &stacks {
                let appearance = Appearance::from_catalog(stack.appearance.as_deref());
                if let Some(bg) = stack.members.iter().find(|m| !m.is_group()) {
                    match bg.name.as_deref() {
                        Some(name) if gradients.contains_key(name) => {
                            backgrounds.entry(appearance).or_insert_with(|| name.to_owned());
                        }
                        other => tracing::debug!(
                            %appearance,
                            background = other.unwrap_or("<unnamed>"),
                            "stack background is not a named gradient"
                        ),
                    }
                }
            }
            let groups = walk_groups(
                icon_name,
                &stacks,
                &group_entries,
                &group_entry_order,
                &renditions,
            )?;
            (
                groups,
                ModelShape::Composable,
                best_bitmap.as_ref().map(|b| b.stem.clone()),
            )
        } else if !renditions.order.is_empty() {
            let group = loose_group(icon_name, &renditions);
            (
                vec![group],
                ModelShape::Composable,
                best_bitmap.as_ref().map(|b| b.stem.clone()),
            )
        } else if let Some(bitmap) = best_bitmap.clone() {
            tracing::info!(
                stem = %bitmap.stem,
                width = bitmap.pixel_width,
                height = bitmap.pixel_height,
                "legacy bitmap icon, using the largest bitmap as a single layer"
            );
            (
                vec![legacy_group(icon_name, &bitmap)],
                ModelShape::Legacy { bitmap },
                None,
            )
        } else {
            return Err(RecomposeError::malformed(format!(
                "catalog has no group containers, layers or bitmaps for icon '{icon_name}'"
            )));
        };

        let canvas = canvas_size(&stacks, &groups, best_bitmap.as_ref());

        let model = Self {
            icon_name: icon_name.to_owned(),
            metadata,
            colors,
            color_order,
            gradients,
            groups,
            canvas,
            shape,
            backgrounds,
            reference_stem,
        };
        model.validate_references()?;

        tracing::info!(
            groups = model.groups.len(),
            layers = model.groups.iter().map(|g| g.layers.len()).sum::<usize>(),
            colors = model.colors.len(),
            gradients = model.gradients.len(),
            legacy = model.is_legacy(),
            "catalog model built"
        );
        Ok(model)
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self.shape, ModelShape::Legacy { .. })
    }

    /// Resolve a fill reference name.
    pub fn fill_target(&self, name: &str) -> Option<FillTarget<'_>> {
        if let Some(c) = self.colors.get(name) {
            return Some(FillTarget::Color(c));
        }
        self.gradients.get(name).map(FillTarget::Gradient)
    }

    /// Resolve a gradient and its stop colors under one appearance.
    pub fn resolve_gradient(&self, name: &str, appearance: Appearance) -> Option<ResolvedGradient> {
        let gradient = self.gradients.get(name)?.resolved(appearance);
        let stops = gradient
            .stops
            .iter()
            .map(|s| {
                self.colors
                    .get(&s.color_name)
                    .map(|c| (s.position, *c.resolved(appearance)))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(ResolvedGradient {
            stops,
            orientation: gradient.orientation,
        })
    }

    /// First color in catalog order.
    pub fn first_color(&self) -> Option<&AppearanceValues<Color>> {
        self.color_order.first().and_then(|n| self.colors.get(n))
    }

    /// Every fill reference used by any layer under any appearance.
    pub fn layer_fill_refs(&self) -> BTreeSet<&str> {
        self.groups
            .iter()
            .flat_map(|g| &g.layers)
            .flat_map(fill_refs_of)
            .collect()
    }

    /// Layer fills must name a known color or gradient, and every gradient this icon can
    /// use must name known colors.
    fn validate_references(&self) -> RecomposeResult<()> {
        for layer in self.groups.iter().flat_map(|g| &g.layers) {
            for target in fill_refs_of(layer) {
                if self.fill_target(target).is_none() {
                    return Err(RecomposeError::unresolved_reference(&layer.name, target));
                }
            }
        }
        let used = self.layer_fill_refs();
        let reachable = self.gradients.iter().filter(|(name, _)| {
            is_scoped(name, &self.icon_name) || used.contains(name.as_str())
        });
        for (name, gradient) in reachable {
            for g in [Some(&gradient.light), gradient.dark.as_ref(), gradient.tinted.as_ref()]
                .into_iter()
                .flatten()
            {
                if let Some(stop) = g
                    .stops
                    .iter()
                    .find(|s| !self.colors.contains_key(&s.color_name))
                {
                    return Err(RecomposeError::unresolved_reference(name, &stop.color_name));
                }
            }
        }
        Ok(())
    }
}

fn fill_refs_of(layer: &LayerSpec) -> impl Iterator<Item = &str> {
    let fill = &layer.fill;
    [Some(&fill.light), fill.dark.as_ref(), fill.tinted.as_ref()]
        .into_iter()
        .flatten()
        .flatten()
        .map(String::as_str)
}

/// Per-appearance entries of one named color or gradient, before the baseline is fixed.
struct Variants<T> {
    light: Option<T>,
    dark: Option<T>,
    tinted: Option<T>,
    first: Appearance,
}

impl<T> Variants<T> {
    fn new(first: Appearance) -> Self {
        Self {
            light: None,
            dark: None,
            tinted: None,
            first,
        }
    }

    fn slot(&mut self, appearance: Appearance) -> &mut Option<T> {
        match appearance {
            Appearance::Light => &mut self.light,
            Appearance::Dark => &mut self.dark,
            Appearance::Tinted => &mut self.tinted,
        }
    }

    /// Without a Light entry the first entry seen becomes the baseline.
    fn finish(mut self) -> Option<AppearanceValues<T>> {
        let light = match self.light.take() {
            Some(v) => v,
            None => self.slot(self.first).take()?,
        };
        Some(AppearanceValues {
            light,
            dark: self.dark,
            tinted: self.tinted,
        })
    }
}

fn insert_variant<T>(
    map: &mut BTreeMap<String, Variants<T>>,
    order: &mut Vec<String>,
    name: &str,
    appearance: Appearance,
    value: T,
    what: &str,
) {
    let variants = map.entry(name.to_owned()).or_insert_with(|| {
        order.push(name.to_owned());
        Variants::new(appearance)
    });
    let slot = variants.slot(appearance);
    if slot.is_some() {
        tracing::warn!(name, what, %appearance, "duplicate catalog entry ignored");
        return;
    }
    *slot = Some(value);
}

fn finish_variants<T>(map: BTreeMap<String, Variants<T>>) -> BTreeMap<String, AppearanceValues<T>> {
    map.into_iter()
        .filter_map(|(name, v)| v.finish().map(|values| (name, values)))
        .collect()
}

fn collect_colors(
    entries: &[CatalogEntry],
) -> RecomposeResult<(BTreeMap<String, AppearanceValues<Color>>, Vec<String>)> {
    let mut colors = BTreeMap::new();
    let mut order = Vec::new();
    for entry in entries {
        let CatalogEntry::Color(ColorEntry {
            name,
            appearance,
            components,
            colorspace,
        }) = entry
        else {
            continue;
        };
        let color = Color::from_components(components, colorspace.as_deref().unwrap_or("srgb"))
            .map_err(|e| match e {
                RecomposeError::Malformed(msg) => {
                    RecomposeError::malformed(format!("color '{name}': {msg}"))
                }
                other => other,
            })?;
        let appearance = Appearance::from_catalog(appearance.as_deref());
        insert_variant(&mut colors, &mut order, name, appearance, color, "color");
    }
    Ok((finish_variants(colors), order))
}

fn collect_gradients(entries: &[CatalogEntry]) -> BTreeMap<String, AppearanceValues<Gradient>> {
    let mut gradients = BTreeMap::new();
    let mut order = Vec::new();
    for entry in entries {
        let CatalogEntry::Gradient(g) = entry else {
            continue;
        };
        if g.colors.is_empty() {
            tracing::warn!(gradient = %g.name, "named gradient has no colors, skipped");
            continue;
        }
        let appearance = Appearance::from_catalog(g.appearance.as_deref());
        insert_variant(
            &mut gradients,
            &mut order,
            &g.name,
            appearance,
            Gradient::from_entry(g),
            "gradient",
        );
    }
    finish_variants(gradients)
}

fn walk_groups(
    icon_name: &str,
    stacks: &[&GroupContainerEntry],
    group_entries: &BTreeMap<&str, GroupVariants<'_>>,
    group_entry_order: &[&str],
    renditions: &Renditions,
) -> RecomposeResult<Vec<GroupSpec>> {
    // Group order: first occurrence across stacks; without stacks, entry order.
    let mut order: Vec<&str> = Vec::new();
    let mut props: BTreeMap<&str, Vec<(Appearance, &StackMember)>> = BTreeMap::new();
    for stack in stacks {
        let appearance = Appearance::from_catalog(stack.appearance.as_deref());
        for member in stack.members.iter().filter(|m| m.is_group()) {
            let Some(name) = member.name.as_deref() else {
                return Err(RecomposeError::malformed(
                    "group container member of kind IconGroup has no Name",
                ));
            };
            if !order.contains(&name) {
                order.push(name);
            }
            props.entry(name).or_default().push((appearance, member));
        }
    }
    if stacks.is_empty() {
        order.extend(group_entry_order.iter().copied());
    }

    let mut groups = Vec::with_capacity(order.len());
    for name in order {
        let Some(variants) = group_entries.get(name) else {
            return Err(RecomposeError::malformed(format!(
                "group container references unknown group '{name}'"
            )));
        };
        let mut group = GroupSpec::new(name, icon_name);
        group.layers = build_layers(icon_name, name, variants, renditions)?;
        group.image_only = variants
            .by_appearance
            .values()
            .flat_map(|e| &e.members)
            .all(|m| !m.is_vector());

        let members = props.get(name).map(Vec::as_slice).unwrap_or_default();
        let baseline = members
            .iter()
            .find(|(a, _)| *a == Appearance::Light)
            .or_else(|| members.first());
        if let Some((_, member)) = baseline {
            group.apply_props(member);
        }
        for (appearance, member) in members {
            let opacity = member.opacity;
            match (appearance, opacity) {
                (Appearance::Light, Some(o)) => group.opacity.light = o,
                (Appearance::Light, None) => {}
                (a, Some(o)) => {
                    if !group.opacity.set_override(*a, o) {
                        tracing::warn!(group = name, appearance = %a, "duplicate group opacity ignored");
                    }
                }
                (_, None) => {}
            }
        }
        group.finish_image_only();
        groups.push(group);
    }
    Ok(groups)
}

fn build_layers(
    icon_name: &str,
    group_name: &str,
    variants: &GroupVariants<'_>,
    renditions: &Renditions,
) -> RecomposeResult<Vec<LayerSpec>> {
    let baseline = match variants.by_appearance.get(&Appearance::Light) {
        Some(e) => *e,
        None => {
            let Some(first) = variants.first else {
                return Ok(Vec::new());
            };
            tracing::warn!(
                group = group_name,
                "group has no light entry, using its first appearance as baseline"
            );
            first
        }
    };

    let mut layers: Vec<LayerSpec> = Vec::with_capacity(baseline.members.len());
    for (index, member) in baseline.members.iter().enumerate() {
        let m = member.layer();
        let geometry = parse_geometry(m.position.as_deref(), m.size.as_deref()).map_err(|e| {
            RecomposeError::malformed(format!("layer '{}' in group '{group_name}': {e}", m.name))
        })?;
        let kind = if member.is_vector() {
            LayerKind::Vector
        } else {
            LayerKind::Image
        };
        let mut layer = new_layer(icon_name, &m.name, kind, renditions);
        layer.fill = AppearanceValues::baseline(m.fill_ref.clone());
        layer.opacity = AppearanceValues::baseline(m.opacity.unwrap_or(1.0));
        layer.geometry = geometry;

        for appearance in Appearance::OVERRIDES {
            let Some(entry) = variants.by_appearance.get(&appearance) else {
                continue;
            };
            if std::ptr::eq(*entry, baseline) {
                continue;
            }
            let Some(other) = entry.members.get(index) else {
                continue;
            };
            let o = other.layer();
            if let Some(fill) = &o.fill_ref {
                layer.fill.set_override(appearance, Some(fill.clone()));
            }
            if let Some(op) = o.opacity
                && (op - layer.opacity.light).abs() > OPACITY_EPSILON
            {
                layer.opacity.set_override(appearance, op);
            }
            if !other.is_vector() && o.name != m.name {
                layer.appearance_variants.push(AppearanceVariant {
                    appearance,
                    layer: short_name(&o.name, icon_name),
                });
            }
        }
        layer.order = index;
        layers.push(layer);
    }
    Ok(layers)
}

fn new_layer(icon_name: &str, name: &str, kind: LayerKind, renditions: &Renditions) -> LayerSpec {
    let short = short_name(name, icon_name);
    let (stem, stem_source, locale_variants) = match renditions.select(name) {
        Some((stem, others)) => (stem, StemSource::Rendition, others),
        None => (short.clone(), StemSource::LayerName, Vec::new()),
    };
    let appearance_variants = renditions
        .appearance_stems(name)
        .into_iter()
        .filter(|(_, s)| *s != stem)
        .map(|(appearance, s)| AppearanceVariant {
            appearance,
            layer: s,
        })
        .collect();
    LayerSpec {
        name: name.to_owned(),
        display_name: display_name(name),
        short_name: short,
        stem,
        stem_source,
        kind,
        fill: AppearanceValues::baseline(None),
        opacity: AppearanceValues::baseline(1.0),
        specular: false,
        geometry: None,
        order: 0,
        locale_variants,
        appearance_variants,
    }
}

fn loose_group(icon_name: &str, renditions: &Renditions) -> GroupSpec {
    let mut group = GroupSpec::new(DEFAULT_GROUP_NAME, icon_name);
    for (order, name) in renditions.order.iter().enumerate() {
        let kind = renditions
            .kinds
            .get(name)
            .copied()
            .unwrap_or(LayerKind::Image);
        let mut layer = new_layer(icon_name, name, kind, renditions);
        layer.order = order;
        group.layers.push(layer);
    }
    group.image_only = group.layers.iter().all(|l| l.kind == LayerKind::Image);
    group.finish_image_only();
    tracing::info!(layers = group.layers.len(), "no group structure, using loose layers");
    group
}

fn legacy_group(icon_name: &str, bitmap: &LegacyBitmap) -> GroupSpec {
    let mut group = GroupSpec::new(DEFAULT_GROUP_NAME, icon_name);
    group.shadow = Shadow::None;
    group.image_only = true;
    group.layers.push(LayerSpec {
        name: bitmap.name.clone(),
        short_name: short_name(&bitmap.name, icon_name),
        display_name: display_name(&bitmap.name),
        stem: bitmap.stem.clone(),
        stem_source: StemSource::Rendition,
        kind: LayerKind::Image,
        fill: AppearanceValues::baseline(None),
        opacity: AppearanceValues::baseline(1.0),
        specular: false,
        geometry: None,
        order: 0,
        locale_variants: Vec::new(),
        appearance_variants: Vec::new(),
    });
    group.finish_image_only();
    group
}

fn canvas_size(
    stacks: &[&GroupContainerEntry],
    groups: &[GroupSpec],
    best_bitmap: Option<&LegacyBitmap>,
) -> Canvas {
    let declared = stacks.iter().find_map(|s| match (s.canvas_width, s.canvas_height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some(Canvas {
            width: w.round() as u32,
            height: h.round() as u32,
        }),
        _ => None,
    });
    if let Some(canvas) = declared {
        return canvas;
    }
    let extent = groups
        .iter()
        .flat_map(|g| &g.layers)
        .filter_map(|l| l.geometry)
        .fold(None::<(f64, f64)>, |acc, r| {
            let (w, h) = acc.unwrap_or((0.0, 0.0));
            Some((w.max(r.x1), h.max(r.y1)))
        });
    if let Some((w, h)) = extent {
        return Canvas {
            width: w.ceil() as u32,
            height: h.ceil() as u32,
        };
    }
    if let Some(b) = best_bitmap.filter(|b| b.pixel_width > 0 && b.pixel_height > 0) {
        return Canvas {
            width: b.pixel_width,
            height: b.pixel_height,
        };
    }
    Canvas::DEFAULT
}

#[cfg(test)]
#[path = "../../tests/unit/catalog/model.rs"]
mod tests;
