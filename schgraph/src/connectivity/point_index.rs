//! Connection Point Index
//!
//! Maps every exact connection coordinate of one sheet instance to the items
//! attached there. Built once per instance per recalculation and never
//! mutated afterwards.

use std::collections::BTreeMap;

use super::bus::BusAliases;
use crate::schema::{ItemId, ItemKind, Point, SchItem};

/// Electrical layer of an attachment. Items only join on the same layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    Net,
    Bus,
}

/// Where on the item the attachment sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Index into [`ItemKind::points`]
    Point(u8),
    /// Strictly inside a wire or bus segment
    Interior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    /// Position of the item in the instance's item slice
    pub slot: usize,
    pub item: ItemId,
    pub endpoint: Endpoint,
    pub layer: Layer,
    /// False for the bus side of a bus entry: it locates the bus without
    /// merging the entry into the bus subgraph.
    pub joins: bool,
}

/// Layer an item lives on. Labels and sheet pins follow their text.
pub fn item_layer(kind: &ItemKind, aliases: &BusAliases) -> Layer {
    match kind {
        ItemKind::Bus(_) => Layer::Bus,
        ItemKind::Label(label) if aliases.is_bus(&label.text) => Layer::Bus,
        ItemKind::SheetPin(pin) if aliases.is_bus(&pin.name) => Layer::Bus,
        _ => Layer::Net,
    }
}

fn attachments_of(slot: usize, id: ItemId, kind: &ItemKind, aliases: &BusAliases) -> Vec<(Point, Attachment)> {
    let layer = item_layer(kind, aliases);
    let attach = |p: Point, idx: u8, layer: Layer, joins: bool| {
        (
            p,
            Attachment {
                slot,
                item: id,
                endpoint: Endpoint::Point(idx),
                layer,
                joins,
            },
        )
    };

    match kind {
        ItemKind::BusEntry(entry) => vec![
            attach(entry.wire_end, 0, Layer::Net, true),
            attach(entry.bus_end, 1, Layer::Bus, false),
        ],
        _ => kind
            .points()
            .into_iter()
            .enumerate()
            .map(|(i, p)| attach(p, i as u8, layer, true))
            .collect(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct PointIndex {
    points: BTreeMap<Point, Vec<Attachment>>,
}

impl PointIndex {
    /// Index the items of one instance, including T-connections onto the
    /// interior of same-layer segments.
    pub fn build(items: &[(ItemId, &SchItem)], aliases: &BusAliases) -> Self {
        let mut points: BTreeMap<Point, Vec<Attachment>> = BTreeMap::new();

        for (slot, (id, item)) in items.iter().enumerate() {
            for (p, attachment) in attachments_of(slot, *id, &item.kind, aliases) {
                points.entry(p).or_default().push(attachment);
            }
        }

        let mut interior = Vec::new();
        for (slot, (id, item)) in items.iter().enumerate() {
            let Some(seg) = item.kind.segment() else {
                continue;
            };
            let layer = item_layer(&item.kind, aliases);
            let lo = Point::new(seg.start.x.min(seg.end.x), i64::MIN);
            let hi = Point::new(seg.start.x.max(seg.end.x), i64::MAX);

            for (p, attached) in points.range(lo..=hi) {
                if !seg.contains_interior(*p) {
                    continue;
                }
                if attached.iter().any(|a| a.layer == layer) {
                    interior.push((
                        *p,
                        Attachment {
                            slot,
                            item: *id,
                            endpoint: Endpoint::Interior,
                            layer,
                            joins: true,
                        },
                    ));
                }
            }
        }
        for (p, attachment) in interior {
            points.entry(p).or_default().push(attachment);
        }

        Self { points }
    }

    /// Everything attached at `p`.
    pub fn at(&self, p: Point) -> &[Attachment] {
        self.points.get(&p).map(Vec::as_slice).unwrap_or_default()
    }

    /// Attachments at `p` that merge items on `layer`.
    pub fn joining(&self, p: Point, layer: Layer) -> impl Iterator<Item = &Attachment> {
        self.at(p)
            .iter()
            .filter(move |a| a.joins && a.layer == layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point, &Vec<Attachment>)> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
