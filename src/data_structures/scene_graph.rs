//! Scene graph and hierarchical scene organization.
//!
//! A [`Scene`] owns the lights, the background colour and a list of top-level
//! [`SceneNode`]s. Each node has a local transform, zero or more meshes and
//! its own children. Before drawing, the tree is flattened into
//! [`DrawItem`]s carrying world transforms and shadow participation.

use std::sync::Arc;

use cgmath::{Matrix4, Point3, Vector3};

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    data_structures::{instance::Instance, model::MeshData},
};

/// Handle to a top-level node of a [`Scene`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Instance,
    pub meshes: Vec<Arc<MeshData>>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    children: Vec<SceneNode>,
}

impl SceneNode {
    /// A node without meshes that only groups its children.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Instance::default(),
            meshes: Vec::new(),
            cast_shadow: false,
            receive_shadow: false,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            meshes: vec![Arc::new(mesh)],
            ..Self::group(name)
        }
    }

    pub fn is_drawable(&self) -> bool {
        !self.meshes.is_empty()
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    /// Depth-first, parent before children.
    pub fn traverse(&self, visit: &mut dyn FnMut(&SceneNode)) {
        visit(self);
        for child in &self.children {
            child.traverse(visit);
        }
    }

    pub fn traverse_mut(&mut self, visit: &mut dyn FnMut(&mut SceneNode)) {
        visit(self);
        for child in &mut self.children {
            child.traverse_mut(visit);
        }
    }

    /// Set both shadow flags on this node and every drawable descendant.
    pub fn enable_shadows(&mut self) {
        self.traverse_mut(&mut |node| {
            if node.is_drawable() {
                node.cast_shadow = true;
                node.receive_shadow = true;
            }
        });
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.traverse(&mut |_| count += 1);
        count
    }

    fn collect_draws(&self, parent: &Instance, out: &mut Vec<DrawItem>) {
        let world = parent * &self.transform;
        for mesh in &self.meshes {
            out.push(DrawItem {
                mesh: mesh.clone(),
                world: world.clone(),
                cast_shadow: self.cast_shadow,
                receive_shadow: self.receive_shadow,
            });
        }
        for child in &self.children {
            child.collect_draws(&world, out);
        }
    }
}

/// One mesh to draw this frame with its resolved world transform.
#[derive(Clone, Debug)]
pub struct DrawItem {
    pub mesh: Arc<MeshData>,
    pub world: Instance,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AmbientLight {
    /// Linear RGB.
    pub colour: [f32; 3],
    pub intensity: f32,
}

/// Orthographic frustum and resolution of a directional light's shadow map.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowConfig {
    pub map_size: u32,
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub colour: [f32; 3],
    pub intensity: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub cast_shadow: bool,
    pub shadow: ShadowConfig,
}

impl DirectionalLight {
    /// Unit vector pointing from the target towards the light.
    pub fn direction(&self) -> Vector3<f32> {
        use cgmath::InnerSpace;
        (self.position - self.target).normalize()
    }

    /// Light-space projection used both to render and to sample the shadow map.
    pub fn view_proj(&self) -> Matrix4<f32> {
        let view = Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y());
        let s = &self.shadow;
        let proj = cgmath::ortho(s.left, s.right, s.bottom, s.top, s.near, s.far);
        OPENGL_TO_WGPU_MATRIX * proj * view
    }
}

pub struct Scene {
    /// Linear RGB clear colour.
    pub background: [f32; 3],
    pub ambient: AmbientLight,
    pub sun: DirectionalLight,
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn new(background: [f32; 3], ambient: AmbientLight, sun: DirectionalLight) -> Self {
        Self {
            background,
            ambient,
            sun,
            nodes: Vec::new(),
        }
    }

    /// Attach `node` as a direct child of the scene root.
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.name == name).map(NodeId)
    }

    /// Flatten the tree into world-space draws, in depth-first order.
    pub fn draw_items(&self) -> Vec<DrawItem> {
        let root = Instance::default();
        let mut items = Vec::new();
        for node in &self.nodes {
            node.collect_draws(&root, &mut items);
        }
        items
    }
}
