use serde::Serialize;

/// Largest index an UNSIGNED_SHORT element buffer can address.
pub const MAX_INDEX: usize = 65535;

/// One draw call's worth of vertices and elements. Element indices inside a
/// group are local: vertex buffer position minus `vertex_start_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementGroup {
    pub vertex_start_index: usize,
    pub vertex_length: usize,
    pub element_start_index: usize,
    pub element_length: usize,
    pub second_element_start_index: usize,
    pub second_element_length: usize,
}

/// Buffer positions at which a newly opened group starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupOrigin {
    pub vertex: usize,
    pub element: usize,
    pub second_element: usize,
}

/// Ordered groups for one shader. Only the last group is written to.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ElementGroups {
    pub groups: Vec<ElementGroup>,
    #[serde(skip)]
    reserved: usize,
}

impl ElementGroups {
    pub fn new() -> Self {
        ElementGroups::default()
    }

    pub fn current(&self) -> Option<&ElementGroup> {
        self.groups.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut ElementGroup> {
        self.groups.last_mut()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Makes sure the current group can take `vertex_count` more vertices,
    /// opening a new group at `origin` when it cannot. Returns true when a
    /// group was opened. The caller checks `vertex_count <= MAX_INDEX`.
    pub fn make_room_for(&mut self, vertex_count: usize, origin: GroupOrigin) -> bool {
        let opened = match self.groups.last() {
            Some(current) => current.vertex_length + vertex_count > MAX_INDEX,
            None => true,
        };
        if opened {
            self.groups.push(ElementGroup {
                vertex_start_index: origin.vertex,
                element_start_index: origin.element,
                second_element_start_index: origin.second_element,
                ..ElementGroup::default()
            });
        }
        self.reserved = vertex_count;
        opened
    }

    /// Consumes one reserved vertex slot; false when none is left.
    pub(crate) fn take_reserved(&mut self) -> bool {
        if self.reserved == 0 {
            return false;
        }
        self.reserved -= 1;
        true
    }
}
