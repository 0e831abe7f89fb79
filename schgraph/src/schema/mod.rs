//! Schematic Input Model
//!
//! The connectivity graph consumes this model; it never owns it. Screens are
//! sheet *definitions* that own their drawn items, and sheet symbols place a
//! child screen on a parent screen. One screen can be placed many times, which
//! is why every placement becomes its own [`SheetInstance`] in the
//! [`SheetList`] derived by [`Schematic::sheet_list`].
//!
//! Coordinates are integer schematic units. Two items touch only when they
//! share an exact coordinate.

pub mod sheet;

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::core::GraphError;

pub use sheet::{InstanceId, SheetInstance, SheetList, SheetPath};

/// A grid coordinate on one screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A straight wire or bus segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn endpoints(&self) -> [Point; 2] {
        [self.start, self.end]
    }

    /// True when `p` lies on the segment strictly between its endpoints.
    ///
    /// Exact integer arithmetic: collinear by cross product, then inside the
    /// bounding box. Degenerate segments have no interior. A cross product
    /// that leaves the `i128` range counts as off the segment.
    pub fn contains_interior(&self, p: Point) -> bool {
        if p == self.start || p == self.end {
            return false;
        }
        let dx = self.end.x as i128 - self.start.x as i128;
        let dy = self.end.y as i128 - self.start.y as i128;
        let px = p.x as i128 - self.start.x as i128;
        let py = p.y as i128 - self.start.y as i128;

        let cross = dx
            .checked_mul(py)
            .zip(dy.checked_mul(px))
            .and_then(|(a, b)| a.checked_sub(b));
        if cross != Some(0) {
            return false;
        }
        let within = |v: i64, a: i64, b: i64| a.min(b) <= v && v <= a.max(b);
        within(p.x, self.start.x, self.end.x) && within(p.y, self.start.y, self.end.y)
    }
}

/// Scope of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Local,
    Global,
    Hierarchical,
}

impl std::fmt::Display for LabelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelKind::Local => write!(f, "local label"),
            LabelKind::Global => write!(f, "global label"),
            LabelKind::Hierarchical => write!(f, "hierarchical label"),
        }
    }
}

/// Electrical type of a symbol pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ElectricalType {
    Input,
    Output,
    Bidirectional,
    TriState,
    Passive,
    Free,
    PowerIn,
    PowerOut,
    OpenCollector,
    OpenEmitter,
    NoConnect,
    #[default]
    Unspecified,
}

impl std::fmt::Display for ElectricalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectricalType::Input => write!(f, "Input"),
            ElectricalType::Output => write!(f, "Output"),
            ElectricalType::Bidirectional => write!(f, "Bidirectional"),
            ElectricalType::TriState => write!(f, "Tri-State"),
            ElectricalType::Passive => write!(f, "Passive"),
            ElectricalType::Free => write!(f, "Free"),
            ElectricalType::PowerIn => write!(f, "Power Input"),
            ElectricalType::PowerOut => write!(f, "Power Output"),
            ElectricalType::OpenCollector => write!(f, "Open Collector"),
            ElectricalType::OpenEmitter => write!(f, "Open Emitter"),
            ElectricalType::NoConnect => write!(f, "No Connect"),
            ElectricalType::Unspecified => write!(f, "Unspecified"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub kind: LabelKind,
    pub text: String,
    pub at: Point,
}

/// A pin of a placed symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pin {
    /// UUID of the parent symbol
    pub symbol: Uuid,
    /// Reference designator of the parent symbol (R1, U3)
    pub reference: String,
    pub number: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub electrical_type: ElectricalType,
    /// Net name exported by a power symbol (GND, +3V3)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_net: Option<String>,
    pub at: Point,
}

impl Pin {
    /// A power-input pin carrying an explicit power net name.
    pub fn is_power_driver(&self) -> bool {
        self.electrical_type == ElectricalType::PowerIn
            && self.power_net.as_deref().is_some_and(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SheetPinShape {
    Input,
    Output,
    #[default]
    Bidirectional,
    TriState,
    Passive,
}

/// A hierarchical pin on a sheet symbol, drawn on the parent screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetPin {
    /// UUID of the sheet symbol this pin belongs to
    pub sheet: Uuid,
    pub name: String,
    #[serde(default)]
    pub shape: SheetPinShape,
    pub at: Point,
}

/// Connector between a bus and a single-bit wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusEntry {
    pub bus_end: Point,
    pub wire_end: Point,
}

/// The closed set of connectable item kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Wire(Segment),
    Bus(Segment),
    BusEntry(BusEntry),
    Junction(Point),
    NoConnect(Point),
    Label(Label),
    Pin(Pin),
    SheetPin(SheetPin),
}

impl ItemKind {
    /// Connection points of the item, in endpoint order.
    pub fn points(&self) -> Vec<Point> {
        match self {
            ItemKind::Wire(seg) | ItemKind::Bus(seg) => seg.endpoints().to_vec(),
            ItemKind::BusEntry(entry) => vec![entry.wire_end, entry.bus_end],
            ItemKind::Junction(at) | ItemKind::NoConnect(at) => vec![*at],
            ItemKind::Label(label) => vec![label.at],
            ItemKind::Pin(pin) => vec![pin.at],
            ItemKind::SheetPin(pin) => vec![pin.at],
        }
    }

    /// Name text carried by labels, pins and sheet pins.
    pub fn text(&self) -> Option<&str> {
        match self {
            ItemKind::Label(label) => Some(&label.text),
            ItemKind::SheetPin(pin) => Some(&pin.name),
            ItemKind::Pin(pin) => pin.power_net.as_deref(),
            _ => None,
        }
    }

    pub fn segment(&self) -> Option<&Segment> {
        match self {
            ItemKind::Wire(seg) | ItemKind::Bus(seg) => Some(seg),
            _ => None,
        }
    }

    pub fn as_pin(&self) -> Option<&Pin> {
        match self {
            ItemKind::Pin(pin) => Some(pin),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&Label> {
        match self {
            ItemKind::Label(label) => Some(label),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ItemKind::Wire(_) => "wire",
            ItemKind::Bus(_) => "bus",
            ItemKind::BusEntry(_) => "bus entry",
            ItemKind::Junction(_) => "junction",
            ItemKind::NoConnect(_) => "no-connect",
            ItemKind::Label(label) => match label.kind {
                LabelKind::Local => "label",
                LabelKind::Global => "global label",
                LabelKind::Hierarchical => "hierarchical label",
            },
            ItemKind::Pin(_) => "pin",
            ItemKind::SheetPin(_) => "sheet pin",
        }
    }
}

/// An item drawn on a screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchItem {
    pub uuid: Uuid,
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl SchItem {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind,
        }
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }
}

/// Index of a screen in [`Schematic::screens`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenId(pub u32);

/// Handle of an item: its screen and position in that screen's item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub screen: ScreenId,
    pub index: u32,
}

/// Placement of a child screen on a parent screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetSymbol {
    pub uuid: Uuid,
    pub name: String,
    pub screen: ScreenId,
}

/// Named heterogeneous bus definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusAlias {
    pub name: String,
    pub members: Vec<String>,
}

/// One sheet definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub items: Vec<SchItem>,
    #[serde(default)]
    pub sheets: Vec<SheetSymbol>,
    #[serde(default)]
    pub bus_aliases: Vec<BusAlias>,
}

impl Screen {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            items: Vec::new(),
            sheets: Vec::new(),
            bus_aliases: Vec::new(),
        }
    }

    pub fn sheet(&self, uuid: Uuid) -> Option<&SheetSymbol> {
        self.sheets.iter().find(|s| s.uuid == uuid)
    }

    /// Hash of the screen's identity and drawn content.
    ///
    /// Two placements of the same screen hash equal; screens with different
    /// items do not.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.uuid.hash(&mut hasher);
        for item in &self.items {
            item.uuid.hash(&mut hasher);
            item.kind.hash(&mut hasher);
        }
        self.sheets.hash(&mut hasher);
        self.bus_aliases.hash(&mut hasher);
        hasher.finish()
    }
}

/// A complete schematic: screens plus the root screen handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schematic {
    pub screens: Vec<Screen>,
    #[serde(default = "root_screen")]
    pub root: ScreenId,
}

fn root_screen() -> ScreenId {
    ScreenId(0)
}

impl Schematic {
    /// Create a schematic with an empty root screen.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            screens: vec![Screen::new(root_name)],
            root: ScreenId(0),
        }
    }

    pub fn root(&self) -> ScreenId {
        self.root
    }

    pub fn add_screen(&mut self, name: impl Into<String>) -> ScreenId {
        self.screens.push(Screen::new(name));
        ScreenId((self.screens.len() - 1) as u32)
    }

    pub fn screen(&self, id: ScreenId) -> Option<&Screen> {
        self.screens.get(id.0 as usize)
    }

    /// Add an item with a fresh UUID.
    ///
    /// Panics if `screen` does not belong to this schematic.
    pub fn add_item(&mut self, screen: ScreenId, kind: ItemKind) -> ItemId {
        self.push_item(screen, SchItem::new(kind))
    }

    /// Add an item with a caller-chosen UUID.
    pub fn add_item_with_uuid(&mut self, screen: ScreenId, uuid: Uuid, kind: ItemKind) -> ItemId {
        self.push_item(screen, SchItem::new(kind).with_uuid(uuid))
    }

    fn push_item(&mut self, screen: ScreenId, item: SchItem) -> ItemId {
        let items = &mut self.screens[screen.0 as usize].items;
        items.push(item);
        ItemId {
            screen,
            index: (items.len() - 1) as u32,
        }
    }

    pub fn add_wire(&mut self, screen: ScreenId, start: Point, end: Point) -> ItemId {
        self.add_item(screen, ItemKind::Wire(Segment::new(start, end)))
    }

    pub fn add_bus(&mut self, screen: ScreenId, start: Point, end: Point) -> ItemId {
        self.add_item(screen, ItemKind::Bus(Segment::new(start, end)))
    }

    pub fn add_label(
        &mut self,
        screen: ScreenId,
        kind: LabelKind,
        text: impl Into<String>,
        at: Point,
    ) -> ItemId {
        self.add_item(
            screen,
            ItemKind::Label(Label {
                kind,
                text: text.into(),
                at,
            }),
        )
    }

    /// Place `child` on `parent`; returns the sheet symbol UUID.
    pub fn add_sheet(&mut self, parent: ScreenId, name: impl Into<String>, child: ScreenId) -> Uuid {
        let uuid = Uuid::new_v4();
        self.screens[parent.0 as usize].sheets.push(SheetSymbol {
            uuid,
            name: name.into(),
            screen: child,
        });
        uuid
    }

    pub fn add_sheet_pin(
        &mut self,
        parent: ScreenId,
        sheet: Uuid,
        name: impl Into<String>,
        at: Point,
    ) -> ItemId {
        self.add_item(
            parent,
            ItemKind::SheetPin(SheetPin {
                sheet,
                name: name.into(),
                shape: SheetPinShape::default(),
                at,
            }),
        )
    }

    pub fn add_bus_alias(&mut self, screen: ScreenId, name: impl Into<String>, members: &[&str]) {
        self.screens[screen.0 as usize].bus_aliases.push(BusAlias {
            name: name.into(),
            members: members.iter().map(|m| m.to_string()).collect(),
        });
    }

    pub fn item(&self, id: ItemId) -> Option<&SchItem> {
        self.screen(id.screen)
            .and_then(|s| s.items.get(id.index as usize))
    }

    /// Items of one screen together with their handles.
    pub fn items(&self, screen: ScreenId) -> impl Iterator<Item = (ItemId, &SchItem)> {
        self.screen(screen)
            .map(|s| s.items.as_slice())
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(move |(index, item)| {
                (
                    ItemId {
                        screen,
                        index: index as u32,
                    },
                    item,
                )
            })
    }

    /// Look up an item by UUID (linear scan).
    pub fn find_item(&self, uuid: Uuid) -> Option<ItemId> {
        (0..self.screens.len() as u32)
            .map(ScreenId)
            .flat_map(|screen| self.items(screen))
            .find(|(_, item)| item.uuid == uuid)
            .map(|(id, _)| id)
    }

    /// Bus aliases visible on `screen`: the root screen's, overridden by the
    /// screen's own.
    pub fn bus_aliases(&self, screen: ScreenId) -> HashMap<String, Vec<String>> {
        let mut aliases = HashMap::new();
        for id in [self.root, screen] {
            if let Some(s) = self.screen(id) {
                for alias in &s.bus_aliases {
                    aliases.insert(alias.name.clone(), alias.members.clone());
                }
            }
        }
        aliases
    }

    /// Check the structural contract: every sheet symbol points at an existing
    /// screen and every sheet pin belongs to a sheet symbol on its own screen.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.screens.is_empty() {
            return Err(GraphError::InvalidSchematic("schematic has no screens".into()));
        }
        if self.screen(self.root).is_none() {
            return Err(GraphError::UnknownScreen(self.root.0));
        }
        for screen in &self.screens {
            for sheet in &screen.sheets {
                if self.screen(sheet.screen).is_none() {
                    return Err(GraphError::UnknownScreen(sheet.screen.0));
                }
            }
            for item in &screen.items {
                if let ItemKind::SheetPin(pin) = &item.kind {
                    if screen.sheet(pin.sheet).is_none() {
                        return Err(GraphError::UnknownSheet {
                            pin: pin.name.clone(),
                            sheet: pin.sheet,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Build the flattened sheet-instance tree, root first, depth-first.
    pub fn sheet_list(&self) -> Result<SheetList, GraphError> {
        self.validate()?;
        SheetList::build(self)
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        let schematic: Schematic = serde_json::from_str(json)?;
        schematic.validate()?;
        Ok(schematic)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
