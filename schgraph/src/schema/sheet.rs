//! Sheet list: one entry per placement of a screen in the hierarchy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ItemId, SchItem, Schematic, ScreenId};
use crate::core::GraphError;

/// Index of an instance in a [`SheetList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// The root placement, always first in a [`SheetList`].
    pub const ROOT: InstanceId = InstanceId(0);
}

/// Sheet-symbol UUIDs from the root to one placement. The root path is empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetPath(pub Vec<Uuid>);

impl SheetPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, sheet: Uuid) -> Self {
        let mut path = self.0.clone();
        path.push(sheet);
        Self(path)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for SheetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/")?;
        for uuid in &self.0 {
            write!(f, "{}/", uuid)?;
        }
        Ok(())
    }
}

/// One placement of a screen.
#[derive(Debug, Clone, Serialize)]
pub struct SheetInstance {
    pub id: InstanceId,
    pub path: SheetPath,
    pub screen: ScreenId,
    pub parent: Option<InstanceId>,
    /// Sheet symbol on the parent screen that places this instance
    pub sheet: Option<Uuid>,
    /// Human-readable path, `/` for the root, `/Power/Regulator/` below it
    pub human_path: String,
    /// Prefix applied to local net names: empty for the root
    pub name_prefix: String,
}

impl SheetInstance {
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Flattened sheet-instance tree.
#[derive(Debug, Clone, Default)]
pub struct SheetList {
    instances: Vec<SheetInstance>,
    children: HashMap<(InstanceId, Uuid), InstanceId>,
}

impl SheetList {
    pub(crate) fn build(schematic: &Schematic) -> Result<Self, GraphError> {
        let mut list = SheetList::default();
        let mut stack = Vec::new();
        list.visit(schematic, schematic.root(), None, None, SheetPath::root(), "/", &mut stack)?;
        Ok(list)
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &mut self,
        schematic: &Schematic,
        screen: ScreenId,
        parent: Option<InstanceId>,
        sheet: Option<Uuid>,
        path: SheetPath,
        human_path: &str,
        stack: &mut Vec<ScreenId>,
    ) -> Result<(), GraphError> {
        let screen_def = schematic
            .screen(screen)
            .ok_or(GraphError::UnknownScreen(screen.0))?;
        if stack.contains(&screen) {
            return Err(GraphError::RecursiveSheet(screen_def.name.clone()));
        }

        let id = InstanceId(self.instances.len() as u32);
        let name_prefix = if parent.is_none() {
            String::new()
        } else {
            human_path.to_string()
        };
        self.instances.push(SheetInstance {
            id,
            path: path.clone(),
            screen,
            parent,
            sheet,
            human_path: human_path.to_string(),
            name_prefix,
        });
        if let (Some(parent), Some(sheet)) = (parent, sheet) {
            self.children.insert((parent, sheet), id);
        }

        stack.push(screen);
        for symbol in &screen_def.sheets {
            let child_path = format!("{}{}/", human_path, symbol.name);
            self.visit(
                schematic,
                symbol.screen,
                Some(id),
                Some(symbol.uuid),
                path.child(symbol.uuid),
                &child_path,
                stack,
            )?;
        }
        stack.pop();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn root(&self) -> Option<&SheetInstance> {
        self.instances.first()
    }

    pub fn get(&self, id: InstanceId) -> Option<&SheetInstance> {
        self.instances.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SheetInstance> {
        self.instances.iter()
    }

    /// Instance placed by `sheet` inside `parent`.
    pub fn child_for_sheet(&self, parent: InstanceId, sheet: Uuid) -> Option<InstanceId> {
        self.children.get(&(parent, sheet)).copied()
    }

    pub fn children(&self, parent: InstanceId) -> impl Iterator<Item = &SheetInstance> {
        self.instances
            .iter()
            .filter(move |inst| inst.parent == Some(parent))
    }

    pub fn find_by_path(&self, path: &SheetPath) -> Option<InstanceId> {
        self.instances
            .iter()
            .find(|inst| &inst.path == path)
            .map(|inst| inst.id)
    }

    pub fn find_by_human_path(&self, human_path: &str) -> Option<InstanceId> {
        self.instances
            .iter()
            .find(|inst| inst.human_path == human_path)
            .map(|inst| inst.id)
    }

    pub fn max_depth(&self) -> usize {
        self.instances.iter().map(|i| i.depth()).max().unwrap_or(0)
    }

    /// Items drawn on the instance's screen.
    pub fn items<'a>(
        &self,
        schematic: &'a Schematic,
        id: InstanceId,
    ) -> Vec<(ItemId, &'a SchItem)> {
        match self.get(id) {
            Some(inst) => schematic.items(inst.screen).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Point;

    #[test]
    fn test_shared_screen_yields_two_instances() {
        let mut sch = Schematic::new("root");
        let root = sch.root();
        let child = sch.add_screen("amp");
        let left = sch.add_sheet(root, "Left", child);
        let right = sch.add_sheet(root, "Right", child);
        sch.add_wire(child, Point::new(0, 0), Point::new(0, 10));

        let list = sch.sheet_list().unwrap();
        assert_eq!(list.len(), 3);

        let root_id = list.root().map(|r| r.id).unwrap();
        let l = list.child_for_sheet(root_id, left).unwrap();
        let r = list.child_for_sheet(root_id, right).unwrap();
        assert_ne!(l, r);
        assert_eq!(list.get(l).unwrap().name_prefix, "/Left/");
        assert_eq!(list.get(r).unwrap().name_prefix, "/Right/");
        assert_eq!(list.items(&sch, l).len(), 1);
        assert_eq!(list.children(root_id).count(), 2);
    }

    #[test]
    fn test_recursive_sheet_is_rejected() {
        let mut sch = Schematic::new("root");
        let root = sch.root();
        let a = sch.add_screen("a");
        sch.add_sheet(root, "A", a);
        sch.add_sheet(a, "Again", a);

        assert!(matches!(sch.sheet_list(), Err(GraphError::RecursiveSheet(name)) if name == "a"));
    }

    #[test]
    fn test_depth_and_paths() {
        let mut sch = Schematic::new("root");
        let mut parent = sch.root();
        for level in 0..3 {
            let child = sch.add_screen(format!("L{}", level));
            sch.add_sheet(parent, format!("L{}", level), child);
            parent = child;
        }

        let list = sch.sheet_list().unwrap();
        assert_eq!(list.max_depth(), 3);
        let deepest = list.find_by_human_path("/L0/L1/L2/").unwrap();
        assert_eq!(list.get(deepest).unwrap().depth(), 3);
        let path = list.get(deepest).unwrap().path.clone();
        assert_eq!(list.find_by_path(&path), Some(deepest));
    }
}
