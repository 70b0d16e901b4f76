//! Minimal scene graph: meshes and lights tagged by [`NodeKind`].
//!
//! Nodes never need runtime type tests; disposal and rendering switch on the
//! explicit tag instead.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{DMat4, DQuat, DVec3, EulerRot, Vec3};

use crate::config::Color;

/// Identifies a CPU-side resource whose GPU copy a render target may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocates a process-wide unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Rotation (Euler XYZ, radians) and position of an object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub rotation: DVec3,
    pub position: DVec3,
}

impl Transform {
    /// Model matrix applying the rotation first, then the translation.
    pub fn matrix(&self) -> DMat4 {
        let rotation = DQuat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        DMat4::from_rotation_translation(rotation, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryKind {
    Box { width: f64, height: f64, depth: f64 },
}

/// One vertex of a triangle list with a flat face normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    id: ResourceId,
    kind: GeometryKind,
}

impl Geometry {
    pub fn cuboid(width: f64, height: f64, depth: f64) -> Self {
        Self {
            id: ResourceId::next(),
            kind: GeometryKind::Box {
                width,
                height,
                depth,
            },
        }
    }

    pub fn cube(size: f64) -> Self {
        Self::cuboid(size, size, size)
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Expands the geometry into a counter-clockwise triangle list.
    pub fn vertices(&self) -> Vec<GeometryVertex> {
        match self.kind {
            GeometryKind::Box {
                width,
                height,
                depth,
            } => box_vertices(Vec3::new(
                (width * 0.5) as f32,
                (height * 0.5) as f32,
                (depth * 0.5) as f32,
            )),
        }
    }
}

fn box_vertices(half: Vec3) -> Vec<GeometryVertex> {
    // (normal, u, v) with u x v == normal so each face winds outward.
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];
    let corners = [
        (-1.0, -1.0),
        (1.0, -1.0),
        (1.0, 1.0),
        (-1.0, -1.0),
        (1.0, 1.0),
        (-1.0, 1.0),
    ];

    let mut vertices = Vec::with_capacity(faces.len() * corners.len());
    for (normal, u, v) in faces {
        for (su, sv) in corners {
            let position = (normal + u * su + v * sv) * half;
            vertices.push(GeometryVertex {
                position: position.to_array(),
                normal: normal.to_array(),
            });
        }
    }
    vertices
}

/// Phong-style surface description.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    id: ResourceId,
    pub color: Color,
    pub flat_shading: bool,
    pub transparent: bool,
    pub opacity: f32,
}

impl Material {
    pub fn phong(color: Color) -> Self {
        Self {
            id: ResourceId::next(),
            color,
            flat_shading: false,
            transparent: false,
            opacity: 1.0,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }
}

/// A mesh may carry one material or one per geometry group.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialSlot {
    Single(Material),
    Multi(Vec<Material>),
}

impl MaterialSlot {
    pub fn iter(&self) -> std::slice::Iter<'_, Material> {
        match self {
            MaterialSlot::Single(material) => std::slice::from_ref(material).iter(),
            MaterialSlot::Multi(materials) => materials.iter(),
        }
    }

    /// Material used when the backend draws the whole mesh in one pass.
    pub fn primary(&self) -> Option<&Material> {
        self.iter().next()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: Geometry,
    pub material: MaterialSlot,
    pub transform: Transform,
}

impl Mesh {
    pub fn new(geometry: Geometry, material: MaterialSlot) -> Self {
        Self {
            geometry,
            material,
            transform: Transform::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Light {
    /// Parallel light shining from `position` towards the origin.
    Directional {
        color: Color,
        intensity: f64,
        position: DVec3,
    },
    /// Uniform fill light.
    Ambient { color: Color, intensity: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Mesh(Mesh),
    Light(Light),
    Group,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: Option<String>,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            name: Some(name.into()),
            kind: NodeKind::Mesh(mesh),
            children: Vec::new(),
        }
    }

    pub fn light(light: Light) -> Self {
        Self {
            name: None,
            kind: NodeKind::Light(light),
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<SceneNode>) -> Self {
        Self {
            name: Some(name.into()),
            kind: NodeKind::Group,
            children,
        }
    }

    fn visit<'a>(&'a self, visitor: &mut impl FnMut(&'a SceneNode)) {
        visitor(self);
        for child in &self.children {
            child.visit(visitor);
        }
    }
}

/// Index of a top-level node inside a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Root of the scene; owns every node passed to the render step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn mesh(&self, id: NodeId) -> Option<&Mesh> {
        match &self.nodes.get(id.0)?.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut Mesh> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    /// Depth-first, pre-order walk over every node.
    pub fn traverse<'a>(&'a self, mut visitor: impl FnMut(&'a SceneNode)) {
        for node in &self.nodes {
            node.visit(&mut visitor);
        }
    }

    pub fn meshes(&self) -> Vec<&Mesh> {
        let mut meshes = Vec::new();
        self.traverse(|node| {
            if let NodeKind::Mesh(mesh) = &node.kind {
                meshes.push(mesh);
            }
        });
        meshes
    }

    pub fn lights(&self) -> Vec<&Light> {
        let mut lights = Vec::new();
        self.traverse(|node| {
            if let NodeKind::Light(light) = &node.kind {
                lights.push(light);
            }
        });
        lights
    }
}

/// Receives release requests for GPU copies of geometry and materials.
pub trait ResourceReleaser {
    fn release_geometry(&mut self, id: ResourceId);
    fn release_material(&mut self, id: ResourceId);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposalReport {
    pub geometries: usize,
    pub materials: usize,
}

/// Releases the geometry and every material of each mesh in `scene`.
///
/// Without a releaser nothing was ever uploaded, so only the counts are
/// reported.
pub fn dispose_resources<R>(scene: &SceneGraph, mut releaser: Option<&mut R>) -> DisposalReport
where
    R: ResourceReleaser + ?Sized,
{
    let mut report = DisposalReport::default();
    scene.traverse(|node| match &node.kind {
        NodeKind::Mesh(mesh) => {
            if let Some(target) = releaser.as_deref_mut() {
                target.release_geometry(mesh.geometry.id());
            }
            report.geometries += 1;
            for material in mesh.material.iter() {
                if let Some(target) = releaser.as_deref_mut() {
                    target.release_material(material.id());
                }
                report.materials += 1;
            }
        }
        NodeKind::Light(_) | NodeKind::Group => {}
    });
    report
}
