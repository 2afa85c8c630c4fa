use crate::core::SkeletonDescriptor;
use prism_utils::BoundingBox;

/// Describes one submesh of a mesh, keyed by name within its parent.
#[derive(Debug, Clone)]
pub struct SubMeshDescriptor {
    pub name: String,
    pub bounds: Option<BoundingBox>,
}

impl SubMeshDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        SubMeshDescriptor {
            name: name.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Descriptive key handed to the backend when allocating a native mesh.
#[derive(Debug, Clone)]
pub struct MeshDescriptor {
    pub name: String,
    pub submeshes: Vec<SubMeshDescriptor>,
    pub skeleton: Option<SkeletonDescriptor>,
}

impl MeshDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        MeshDescriptor {
            name: name.into(),
            submeshes: Vec::new(),
            skeleton: None,
        }
    }

    pub fn with_submesh(mut self, submesh: SubMeshDescriptor) -> Self {
        self.submeshes.push(submesh);
        self
    }

    pub fn with_skeleton(mut self, skeleton: SkeletonDescriptor) -> Self {
        self.skeleton = Some(skeleton);
        self
    }

    /// Union of all submesh bounds.
    pub fn local_bounds(&self) -> BoundingBox {
        self.submeshes
            .iter()
            .flat_map(|s| s.bounds)
            .fold(BoundingBox::empty(), |acc, b| acc.merged(&b))
    }
}
