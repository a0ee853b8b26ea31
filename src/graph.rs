//! # Ædificium graph model
//!
//! A graph is a set of rooms, each with a 2-bit label and six doors. Every door
//! is paired with exactly one door (possibly itself), and pairing is symmetric.
//! This module also hosts the exploration oracle: executing a [`Plan`] against a
//! graph yields the trace of labels an observer would see.

use crate::api;
use crate::error::{Error, Result};
use crate::plan::{Plan, Token};

pub const NUM_DOORS: usize = 6;
pub const NUM_LABELS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DoorRef {
    pub room: usize,
    pub door: usize,
}

impl DoorRef {
    pub fn new(room: usize, door: usize) -> Self {
        Self { room, door }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub label: u8,
    pub links: [DoorRef; NUM_DOORS],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    rooms: Vec<Room>,
    start_room: usize,
}

impl Graph {
    /// Builds a graph, checking labels, door ranges and pairing symmetry.
    /// Connectivity is not required here; see [`Graph::is_connected`].
    pub fn new(rooms: Vec<Room>, start_room: usize) -> Result<Self> {
        let n = rooms.len();
        if start_room >= n {
            return Err(Error::InvalidMap(format!(
                "start room {} out of 0..{}",
                start_room, n
            )));
        }
        for (r, room) in rooms.iter().enumerate() {
            if room.label >= NUM_LABELS {
                return Err(Error::InvalidMap(format!(
                    "room {} has label {}",
                    r, room.label
                )));
            }
            for (d, &to) in room.links.iter().enumerate() {
                if to.room >= n || to.door >= NUM_DOORS {
                    return Err(Error::InvalidMap(format!(
                        "door {}:{} leads to missing door {}:{}",
                        r, d, to.room, to.door
                    )));
                }
                if rooms[to.room].links[to.door] != DoorRef::new(r, d) {
                    return Err(Error::InvalidMap(format!(
                        "door {}:{} -> {}:{} is not paired back",
                        r, d, to.room, to.door
                    )));
                }
            }
        }
        Ok(Self { rooms, start_room })
    }

    pub fn num_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn start_room(&self) -> usize {
        self.start_room
    }

    pub fn label(&self, room: usize) -> u8 {
        self.rooms[room].label
    }

    pub fn labels(&self) -> Vec<u8> {
        self.rooms.iter().map(|r| r.label).collect()
    }

    /// The door on the other side of `door` in `room`.
    pub fn link(&self, room: usize, door: usize) -> DoorRef {
        self.rooms[room].links[door]
    }

    /// Whether every room is reachable from the start room.
    pub fn is_connected(&self) -> bool {
        let mut visited = vec![false; self.rooms.len()];
        visited[self.start_room] = true;
        let mut stack = vec![self.start_room];
        while let Some(u) = stack.pop() {
            for to in &self.rooms[u].links {
                if !visited[to.room] {
                    visited[to.room] = true;
                    stack.push(to.room);
                }
            }
        }
        visited.into_iter().all(|v| v)
    }

    /// Executes `plan` from the start room and returns the observed labels: one
    /// for the start room and one per token. Marks only touch a private copy of
    /// the labels, so the graph itself is never modified.
    pub fn explore(&self, plan: &Plan) -> Result<Vec<u8>> {
        Ok(self.walk(plan)?.1)
    }

    /// Like [`Graph::explore`], but also returns the room behind each trace
    /// position.
    pub fn walk(&self, plan: &Plan) -> Result<(Vec<usize>, Vec<u8>)> {
        let mut labels = self.labels();
        let mut u = self.start_room;
        let mut route = Vec::with_capacity(plan.len() + 1);
        let mut trace = Vec::with_capacity(plan.len() + 1);
        route.push(u);
        trace.push(labels[u]);
        for &token in plan.tokens() {
            match token.validate()? {
                Token::Door(door) => u = self.rooms[u].links[door].room,
                Token::Mark(label) => labels[u] = label,
            }
            route.push(u);
            trace.push(labels[u]);
        }
        Ok((route, trace))
    }

    /// Connection records, one per undirected pairing.
    pub fn connections(&self) -> Vec<api::MapConnection> {
        let mut connections = vec![];
        for (r, room) in self.rooms.iter().enumerate() {
            for (d, &to) in room.links.iter().enumerate() {
                if DoorRef::new(r, d) <= to {
                    connections.push(api::MapConnection {
                        from: api::MapConnectionEnd { room: r, door: d },
                        to: api::MapConnectionEnd {
                            room: to.room,
                            door: to.door,
                        },
                    });
                }
            }
        }
        connections
    }

    pub fn to_map(&self) -> api::Map {
        api::Map {
            rooms: self.labels(),
            starting_room: self.start_room,
            connections: self.connections(),
        }
    }

    /// Rebuilds a graph from its wire form. Every door must appear in exactly
    /// one connection and the result must be connected.
    pub fn from_map(map: &api::Map) -> Result<Self> {
        let n = map.rooms.len();
        let mut links: Vec<[Option<DoorRef>; NUM_DOORS]> = vec![[None; NUM_DOORS]; n];
        for c in &map.connections {
            let a = DoorRef::new(c.from.room, c.from.door);
            let b = DoorRef::new(c.to.room, c.to.door);
            for end in [a, b] {
                if end.room >= n || end.door >= NUM_DOORS {
                    return Err(Error::InvalidMap(format!(
                        "connection end {}:{} out of range",
                        end.room, end.door
                    )));
                }
            }
            for (x, y) in [(a, b), (b, a)] {
                match links[x.room][x.door] {
                    Some(prev) if prev != y => {
                        return Err(Error::InvalidMap(format!(
                            "door {}:{} connected twice",
                            x.room, x.door
                        )));
                    }
                    _ => links[x.room][x.door] = Some(y),
                }
            }
        }
        let mut rooms = Vec::with_capacity(n);
        for (r, (&label, doors)) in map.rooms.iter().zip(&links).enumerate() {
            let mut resolved = [DoorRef::new(0, 0); NUM_DOORS];
            for (d, to) in doors.iter().enumerate() {
                resolved[d] = to.ok_or_else(|| {
                    Error::InvalidMap(format!("door {}:{} is not connected", r, d))
                })?;
            }
            rooms.push(Room {
                label,
                links: resolved,
            });
        }
        let graph = Self::new(rooms, map.starting_room)?;
        if !graph.is_connected() {
            return Err(Error::InvalidMap("graph is not connected".to_string()));
        }
        Ok(graph)
    }
}
