//! Headless stand-in for the render layer: props are bounding spheres in a
//! flat hierarchy and the camera is a position plus a forward vector.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use parking_lot::{Mutex, RwLock};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::world::{Handle, Highlighter, PickHit, WorldQuery};

/// Prop as described in the content pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropSpec {
    pub name: String,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl Default for PropSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            position: Vec3::ZERO,
            radius: default_radius(),
            parent: None,
        }
    }
}

fn default_radius() -> f32 {
    0.8
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub name: String,
    pub handle: Handle,
    pub position: Vec3,
    pub radius: f32,
    pub parent: Option<Handle>,
    pub pickable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(-6.0, 4.0, -24.0),
            forward: Vec3::Z,
        }
    }
}

#[derive(Debug, Default)]
pub struct TownScene {
    props: RwLock<Vec<Prop>>,
    camera: RwLock<Camera>,
    highlighted: Mutex<BTreeMap<Handle, Vec3>>,
    next_handle: Mutex<u64>,
}

impl TownScene {
    pub fn new() -> Self {
        Self {
            next_handle: Mutex::new(1),
            ..Self::default()
        }
    }

    /// Builds a scene from prop specs; parents must precede their children.
    pub fn from_specs(specs: &[PropSpec]) -> Result<Self> {
        let scene = Self::new();
        for spec in specs {
            let parent = match &spec.parent {
                Some(name) => Some(
                    scene
                        .handle(name)
                        .ok_or_else(|| anyhow!("prop {} has unknown parent {name}", spec.name))?,
                ),
                None => None,
            };
            scene.spawn(&spec.name, spec.position, spec.radius, parent);
        }
        Ok(scene)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let specs = document
            .descendants()
            .filter(|node| node.has_tag_name("prop"))
            .map(|node| parse_prop(&node))
            .collect::<Result<Vec<_>>>()?;
        Self::from_specs(&specs)
    }

    pub fn spawn(&self, name: &str, position: Vec3, radius: f32, parent: Option<Handle>) -> Handle {
        let handle = {
            let mut next = self.next_handle.lock();
            let handle = Handle::new((*next).max(1));
            *next = handle.raw() + 1;
            handle
        };
        self.props.write().push(Prop {
            name: name.to_string(),
            handle,
            position,
            radius: radius.max(0.01),
            parent,
            pickable: true,
        });
        handle
    }

    /// Repositions a prop without touching its parent link.
    pub fn move_prop(&self, handle: Handle, position: Vec3) -> bool {
        self.props
            .write()
            .iter_mut()
            .find(|prop| prop.handle == handle)
            .map(|prop| prop.position = position)
            .is_some()
    }

    pub fn set_pickable(&self, handle: Handle, pickable: bool) -> bool {
        self.props
            .write()
            .iter_mut()
            .find(|prop| prop.handle == handle)
            .map(|prop| prop.pickable = pickable)
            .is_some()
    }

    pub fn handle(&self, name: &str) -> Option<Handle> {
        self.props
            .read()
            .iter()
            .find(|prop| prop.name == name)
            .map(|prop| prop.handle)
    }

    pub fn prop(&self, handle: Handle) -> Option<Prop> {
        self.props
            .read()
            .iter()
            .find(|prop| prop.handle == handle)
            .cloned()
    }

    pub fn props(&self) -> Vec<Prop> {
        self.props.read().clone()
    }

    pub fn camera(&self) -> Camera {
        *self.camera.read()
    }

    pub fn set_camera(&self, position: Vec3, forward: Vec3) {
        let forward = forward.try_normalize().unwrap_or(Vec3::Z);
        *self.camera.write() = Camera { position, forward };
    }

    /// Places the camera `standoff` units in front of the named prop's
    /// surface, looking straight at it.
    pub fn look_at(&self, name: &str, standoff: f32) -> Result<()> {
        let handle = self
            .handle(name)
            .ok_or_else(|| anyhow!("no prop named {name}"))?;
        let prop = self
            .prop(handle)
            .ok_or_else(|| anyhow!("prop {name} disappeared"))?;
        let position = prop.position + Vec3::new(0.0, 0.0, -(prop.radius + standoff));
        self.set_camera(position, prop.position - position);
        Ok(())
    }

    /// Turns the camera to stare at empty sky.
    pub fn look_away(&self) {
        let camera = self.camera();
        self.set_camera(camera.position, Vec3::Y);
    }

    pub fn highlighted(&self) -> Vec<(Handle, Vec3)> {
        self.highlighted
            .lock()
            .iter()
            .map(|(handle, color)| (*handle, *color))
            .collect()
    }
}

impl WorldQuery for TownScene {
    fn pick_forward(&self, max_distance: f32, filter: &dyn Fn(Handle) -> bool) -> Option<PickHit> {
        let camera = self.camera();
        let candidates: Vec<(Handle, Vec3, f32)> = self
            .props
            .read()
            .iter()
            .filter(|prop| prop.pickable)
            .map(|prop| (prop.handle, prop.position, prop.radius))
            .collect();
        candidates
            .into_iter()
            .filter(|(handle, _, _)| filter(*handle))
            .filter_map(|(handle, center, radius)| {
                ray_sphere(camera.position, camera.forward, center, radius)
                    .filter(|distance| *distance <= max_distance)
                    .map(|distance| PickHit { handle, distance })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn parent_of(&self, handle: Handle) -> Option<Handle> {
        self.props
            .read()
            .iter()
            .find(|prop| prop.handle == handle)
            .and_then(|prop| prop.parent)
    }
}

impl Highlighter for TownScene {
    fn add(&self, handle: Handle, color: Vec3) {
        self.highlighted.lock().insert(handle, color);
    }

    fn remove(&self, handle: Handle) {
        self.highlighted.lock().remove(&handle);
    }
}

/// Distance along `direction` to the sphere surface, or zero from inside.
fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let direction = direction.try_normalize()?;
    let offset = origin - center;
    let b = offset.dot(direction);
    let c = offset.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let far = -b + root;
    if far < 0.0 {
        return None;
    }
    let near = -b - root;
    Some(near.max(0.0))
}

pub(crate) fn parse_prop(node: &Node<'_, '_>) -> Result<PropSpec> {
    let name = required_text(node, "name")?;
    let defaults = PropSpec::default();
    Ok(PropSpec {
        position: parse_vec3(optional_text(node, "position"), defaults.position)
            .with_context(|| format!("invalid position for prop {name}"))?,
        radius: parse_f32(optional_text(node, "radius"), defaults.radius)
            .with_context(|| format!("invalid radius for prop {name}"))?,
        parent: optional_text(node, "parent"),
        name,
    })
}

pub(crate) fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

pub(crate) fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

pub(crate) fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok());
    let x = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let y = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    let z = numbers
        .next()
        .ok_or_else(|| anyhow!("vector is missing components"))?;
    Ok(Vec3::new(x, y, z))
}

pub(crate) fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    if let Some(hex) = value.strip_prefix('#') {
        let channel = |range: std::ops::Range<usize>| -> Result<f32> {
            let digits = hex
                .get(range)
                .ok_or_else(|| anyhow!("color {value} is too short"))?;
            let byte = u8::from_str_radix(digits, 16)
                .map_err(|err| anyhow!("invalid color {value}: {err}"))?;
            Ok(f32::from(byte) / 255.0)
        };
        return Ok(Vec3::new(channel(0..2)?, channel(2..4)?, channel(4..6)?));
    }
    let mut numbers = value
        .split_whitespace()
        .filter_map(|component| component.parse::<f32>().ok());
    let r = numbers
        .next()
        .ok_or_else(|| anyhow!("color is missing components"))?;
    let g = numbers
        .next()
        .ok_or_else(|| anyhow!("color is missing components"))?;
    let b = numbers
        .next()
        .ok_or_else(|| anyhow!("color is missing components"))?;
    Ok(Vec3::new(r / 255.0, g / 255.0, b / 255.0))
}

pub(crate) fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}
