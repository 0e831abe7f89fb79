//! Bus name grammar
//!
//! - vector buses: `DATA[0..7]`, `A[7..0]` (members `DATA0`..`DATA7`)
//! - group buses: `{SDA SCL}`, `I2C{SDA SCL}` (members `I2C.SDA`, `I2C.SCL`);
//!   a group member may itself be a vector or an alias
//! - aliases: a bare name defined by a [`BusAlias`](crate::schema::BusAlias)

use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Upper bound on members produced by one vector range.
pub const MAX_BUS_WIDTH: i64 = 1024;

/// Upper bound on members produced by one bus name, aliases included.
pub const MAX_BUS_MEMBERS: usize = 4096;

/// Upper bound on member lookups while expanding one bus name.
pub const MAX_EXPANSION_STEPS: usize = 16 * MAX_BUS_MEMBERS;

/// One expanded bus member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BusMember {
    /// Full member name, `DATA3` or `I2C.SDA`
    pub name: String,
    /// Name without the group prefix, used to align buses across sheets
    pub base: String,
    /// Position in a vector range
    pub index: Option<i64>,
}

/// Parsed form of a bus name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusName {
    Vector { prefix: String, start: i64, end: i64 },
    Group { prefix: String, members: Vec<String> },
    Alias(String),
}

impl BusName {
    pub fn is_vector(&self) -> bool {
        matches!(self, BusName::Vector { .. })
    }
}

/// Parse `PREFIX[a..b]`.
pub fn parse_vector(text: &str) -> Option<(String, i64, i64)> {
    let text = text.trim();
    let body = text.strip_suffix(']')?;
    let open = body.rfind('[')?;
    let prefix = &body[..open];
    let range = &body[open + 1..];
    let (start, end) = range.split_once("..")?;
    let start: i64 = start.trim().parse().ok()?;
    let end: i64 = end.trim().parse().ok()?;

    if prefix.is_empty() || prefix.contains(['{', '}', '[', ']', ' ']) {
        return None;
    }
    if start.abs_diff(end) >= MAX_BUS_WIDTH as u64 {
        return None;
    }
    Some((prefix.to_string(), start, end))
}

/// Parse `PREFIX{m1 m2}`; the prefix may be empty.
pub fn parse_group(text: &str) -> Option<(String, Vec<String>)> {
    let text = text.trim();
    let body = text.strip_suffix('}')?;
    let open = body.find('{')?;
    let prefix = &body[..open];
    let inner = &body[open + 1..];

    if prefix.contains(['{', '}', ' ']) || inner.contains(['{', '}']) {
        return None;
    }
    let members: Vec<String> = inner
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    if members.is_empty() {
        return None;
    }
    Some((prefix.to_string(), members))
}

/// Bus aliases visible from one screen.
#[derive(Debug, Clone, Default)]
pub struct BusAliases {
    aliases: HashMap<String, Vec<String>>,
}

impl BusAliases {
    pub fn new(aliases: HashMap<String, Vec<String>>) -> Self {
        Self { aliases }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.aliases.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Classify `text` as a bus name.
    pub fn parse(&self, text: &str) -> Option<BusName> {
        if let Some((prefix, start, end)) = parse_vector(text) {
            return Some(BusName::Vector { prefix, start, end });
        }
        if let Some((prefix, members)) = parse_group(text) {
            return Some(BusName::Group { prefix, members });
        }
        if self.contains(text.trim()) {
            return Some(BusName::Alias(text.trim().to_string()));
        }
        None
    }

    pub fn is_bus(&self, text: &str) -> bool {
        self.parse(text).is_some()
    }

    /// Expand a bus name into its ordered members. `None` when `text` is not a
    /// bus name. Output stops at [`MAX_BUS_MEMBERS`] members and nested alias
    /// walks stop after [`MAX_EXPANSION_STEPS`] lookups.
    pub fn expand(&self, text: &str) -> Option<Vec<BusMember>> {
        let parsed = self.parse(text)?;
        let mut walk = Expansion::default();
        self.expand_parsed(&parsed, "", &mut walk);
        if walk.truncated {
            tracing::warn!(bus = text, members = walk.members.len(), "bus expansion truncated");
        }
        Some(walk.members)
    }

    fn expand_parsed(&self, parsed: &BusName, outer_prefix: &str, walk: &mut Expansion) {
        match parsed {
            BusName::Vector { prefix, start, end } => {
                let step = if end >= start { 1 } else { -1 };
                let mut i = *start;
                loop {
                    let base = format!("{}{}", prefix, i);
                    let member = BusMember {
                        name: format!("{}{}", outer_prefix, base),
                        base,
                        index: Some(i),
                    };
                    if !walk.push(member) || i == *end {
                        break;
                    }
                    i += step;
                }
            }
            BusName::Group { prefix, members } => {
                let inner_prefix = if prefix.is_empty() {
                    outer_prefix.to_string()
                } else {
                    format!("{}{}.", outer_prefix, prefix)
                };
                for member in members {
                    if !self.expand_member(member, &inner_prefix, walk) {
                        break;
                    }
                }
            }
            BusName::Alias(name) => {
                if !walk.visiting.insert(name.clone()) {
                    return;
                }
                for member in self.get(name).unwrap_or_default() {
                    if !self.expand_member(member, outer_prefix, walk) {
                        break;
                    }
                }
                walk.visiting.remove(name);
            }
        }
    }

    /// Returns false once the walk is out of budget.
    fn expand_member(&self, member: &str, prefix: &str, walk: &mut Expansion) -> bool {
        if !walk.step() {
            return false;
        }
        match self.parse(member) {
            Some(parsed) => self.expand_parsed(&parsed, prefix, walk),
            None => {
                walk.push(BusMember {
                    name: format!("{}{}", prefix, member),
                    base: member.to_string(),
                    index: None,
                });
            }
        }
        !walk.truncated
    }
}

/// State of one `expand` call.
#[derive(Default)]
struct Expansion {
    members: Vec<BusMember>,
    visiting: HashSet<String>,
    steps: usize,
    truncated: bool,
}

impl Expansion {
    fn push(&mut self, member: BusMember) -> bool {
        if self.members.len() >= MAX_BUS_MEMBERS {
            self.truncated = true;
            return false;
        }
        self.members.push(member);
        true
    }

    fn step(&mut self) -> bool {
        if self.steps >= MAX_EXPANSION_STEPS {
            self.truncated = true;
            return false;
        }
        self.steps += 1;
        true
    }
}
