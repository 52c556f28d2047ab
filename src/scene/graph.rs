use glam::Mat4;

use super::primitive::Primitive;

/// Handle to a primitive attached to a scene. Handles of removed primitives
/// never resolve again, even after their slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveId {
    index: u32,
    generation: u32,
}

/// The part of the scene graph visualizers talk to.
pub trait SceneHost {
    /// Attach `primitive` under `parent`, or at the root when `parent` is `None`.
    fn add(&mut self, primitive: Primitive, parent: Option<PrimitiveId>) -> PrimitiveId;

    /// Detach a primitive together with its children and release their buffers.
    /// Returns the detached root primitive.
    fn remove(&mut self, id: PrimitiveId) -> Option<Primitive>;

    fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive>;

    /// Number of attached primitives, groups included.
    fn len(&self) -> usize;
}

struct Node {
    primitive: Primitive,
    parent: Option<PrimitiveId>,
    children: Vec<PrimitiveId>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Generational arena holding the primitive tree.
#[derive(Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    roots: Vec<PrimitiveId>,
    live: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: PrimitiveId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: PrimitiveId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn contains(&self, id: PrimitiveId) -> bool {
        self.node(id).is_some()
    }

    #[cfg(test)]
    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.node(id).map(|node| &node.primitive)
    }

    #[cfg(test)]
    pub fn children(&self, id: PrimitiveId) -> &[PrimitiveId] {
        self.node(id).map_or(&[], |node| node.children.as_slice())
    }

    /// Composed transform from the root down to `id`.
    #[cfg(test)]
    pub fn world_transform(&self, id: PrimitiveId) -> Option<Mat4> {
        let node = self.node(id)?;
        let local = node.primitive.transform.matrix();
        match node.parent {
            Some(parent) => Some(self.world_transform(parent)? * local),
            None => Some(local),
        }
    }

    /// Visit every primitive depth-first, parents before children, with its
    /// world transform.
    pub fn walk(&self, mut visit: impl FnMut(PrimitiveId, &Primitive, Mat4)) {
        let mut stack: Vec<(PrimitiveId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|&id| (id, Mat4::IDENTITY))
            .collect();

        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            let world = parent_world * node.primitive.transform.matrix();
            visit(id, &node.primitive, world);
            stack.extend(node.children.iter().rev().map(|&child| (child, world)));
        }
    }

    #[cfg(test)]
    pub fn count_where(&self, pred: impl Fn(&Primitive) -> bool) -> usize {
        self.slots
            .iter()
            .filter_map(|slot| slot.node.as_ref())
            .filter(|node| pred(&node.primitive))
            .count()
    }

    /// Clear the dirty flag of every vertex buffer after an upload.
    pub fn mark_clean(&mut self) {
        for node in self.slots.iter_mut().filter_map(|slot| slot.node.as_mut()) {
            if let Some(buffer) = node.primitive.vertex_buffer_mut() {
                buffer.mark_clean();
            }
        }
    }

    fn allocate(&mut self, node: Node) -> PrimitiveId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return PrimitiveId {
                index,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        PrimitiveId {
            index: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }

    fn release(&mut self, id: PrimitiveId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(node)
    }
}

impl SceneHost for Scene {
    fn add(&mut self, primitive: Primitive, parent: Option<PrimitiveId>) -> PrimitiveId {
        let parent = match parent {
            Some(p) if self.contains(p) => Some(p),
            Some(_) => {
                log::warn!("Parent primitive no longer attached; adding at scene root");
                None
            }
            None => None,
        };

        let id = self.allocate(Node {
            primitive,
            parent,
            children: Vec::new(),
        });

        match parent.and_then(|p| self.node_mut(p)) {
            Some(parent_node) => parent_node.children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    fn remove(&mut self, id: PrimitiveId) -> Option<Primitive> {
        let parent = self.node(id)?.parent;
        match parent.and_then(|p| self.node_mut(p)) {
            Some(parent_node) => parent_node.children.retain(|&child| child != id),
            None => self.roots.retain(|&root| root != id),
        }

        let root = self.release(id)?;
        let mut pending = root.children.clone();
        while let Some(child) = pending.pop() {
            if let Some(node) = self.release(child) {
                pending.extend(node.children);
            }
        }
        Some(root.primitive)
    }

    fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        self.node_mut(id).map(|node| &mut node.primitive)
    }

    fn len(&self) -> usize {
        self.live
    }
}
