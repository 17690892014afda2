//! Versioned binary cache for road graphs.
//!
//! Layout: 4-byte magic, u32 version, u32 xxh32 checksum of the compressed
//! payload, then the lz4-compressed bitcode payload. Load rejects unknown
//! magic/version and any checksum mismatch before attempting to decode.

use std::fmt;
use std::fs;
use std::path::Path;

use bitcode::{Decode, Encode};
use xxhash_rust::xxh32::xxh32;

use super::types::{RoadJunction, RoadPoint};
use super::RoadGraph;
use crate::status::CarStatusFlags;

const MAGIC: [u8; 4] = *b"RDG1";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 12;
const CHECKSUM_SEED: u32 = 0;

// ---------------------------------------------------------------------------
// Serializable mirror of the graph
// ---------------------------------------------------------------------------

#[derive(Encode, Decode)]
struct PointRecord {
    position: [f32; 3],
    radius: f32,
    length: f32,
    camber: f32,
    next_id: i32,
    prev_id: i32,
    left_id: i32,
    right_id: i32,
    junction_start_id: i32,
    junction_end_id: i32,
}

#[derive(Encode, Decode)]
struct JunctionRecord {
    start_point_id: i32,
    end_point_id: i32,
    probability: f32,
    indicate_distance_pre: f32,
    indicate_distance_post: f32,
    indicate_when_taken: CarStatusFlags,
    indicate_when_not_taken: CarStatusFlags,
}

#[derive(Encode, Decode)]
struct GraphPayload {
    points: Vec<PointRecord>,
    junctions: Vec<JunctionRecord>,
}

impl GraphPayload {
    fn from_graph(graph: &RoadGraph) -> Self {
        Self {
            points: graph
                .points
                .iter()
                .map(|p| PointRecord {
                    position: p.position.to_array(),
                    radius: p.radius,
                    length: p.length,
                    camber: p.camber,
                    next_id: p.next_id,
                    prev_id: p.prev_id,
                    left_id: p.left_id,
                    right_id: p.right_id,
                    junction_start_id: p.junction_start_id,
                    junction_end_id: p.junction_end_id,
                })
                .collect(),
            junctions: graph
                .junctions
                .iter()
                .map(|j| JunctionRecord {
                    start_point_id: j.start_point_id,
                    end_point_id: j.end_point_id,
                    probability: j.probability,
                    indicate_distance_pre: j.indicate_distance_pre,
                    indicate_distance_post: j.indicate_distance_post,
                    indicate_when_taken: j.indicate_when_taken,
                    indicate_when_not_taken: j.indicate_when_not_taken,
                })
                .collect(),
        }
    }

    fn into_graph(self) -> RoadGraph {
        RoadGraph {
            points: self
                .points
                .into_iter()
                .map(|p| RoadPoint {
                    position: bevy::math::Vec3::from_array(p.position),
                    radius: p.radius,
                    length: p.length,
                    camber: p.camber,
                    next_id: p.next_id,
                    prev_id: p.prev_id,
                    left_id: p.left_id,
                    right_id: p.right_id,
                    junction_start_id: p.junction_start_id,
                    junction_end_id: p.junction_end_id,
                })
                .collect(),
            junctions: self
                .junctions
                .into_iter()
                .map(|j| RoadJunction {
                    start_point_id: j.start_point_id,
                    end_point_id: j.end_point_id,
                    probability: j.probability,
                    indicate_distance_pre: j.indicate_distance_pre,
                    indicate_distance_post: j.indicate_distance_post,
                    indicate_when_taken: j.indicate_when_taken,
                    indicate_when_not_taken: j.indicate_when_not_taken,
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode(graph: &RoadGraph) -> Vec<u8> {
    let payload = bitcode::encode(&GraphPayload::from_graph(graph));
    let compressed = lz4_flex::compress_prepend_size(&payload);

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&xxh32(&compressed, CHECKSUM_SEED).to_le_bytes());
    out.extend_from_slice(&compressed);
    out
}

pub fn decode(bytes: &[u8]) -> Result<RoadGraph, GraphCacheError> {
    if bytes.len() < HEADER_LEN || bytes[..4] != MAGIC {
        return Err(GraphCacheError::BadMagic);
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != VERSION {
        return Err(GraphCacheError::BadVersion(version));
    }

    let stored = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let compressed = &bytes[HEADER_LEN..];
    if xxh32(compressed, CHECKSUM_SEED) != stored {
        return Err(GraphCacheError::ChecksumMismatch);
    }

    let payload = lz4_flex::decompress_size_prepended(compressed)
        .map_err(|e| GraphCacheError::Corrupt(e.to_string()))?;
    let decoded: GraphPayload =
        bitcode::decode(&payload).map_err(|e| GraphCacheError::Corrupt(e.to_string()))?;
    Ok(decoded.into_graph())
}

pub fn save(graph: &RoadGraph, path: &Path) -> Result<(), GraphCacheError> {
    fs::write(path, encode(graph))?;
    Ok(())
}

pub fn load(path: &Path) -> Result<RoadGraph, GraphCacheError> {
    let bytes = fs::read(path)?;
    decode(&bytes)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum GraphCacheError {
    Io(std::io::Error),
    BadMagic,
    BadVersion(u32),
    ChecksumMismatch,
    Corrupt(String),
}

impl fmt::Display for GraphCacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphCacheError::Io(e) => write!(f, "road graph cache IO error: {e}"),
            GraphCacheError::BadMagic => write!(f, "not a road graph cache file"),
            GraphCacheError::BadVersion(v) => {
                write!(f, "unsupported road graph cache version {v}")
            }
            GraphCacheError::ChecksumMismatch => {
                write!(f, "road graph cache checksum mismatch")
            }
            GraphCacheError::Corrupt(e) => write!(f, "road graph cache corrupt: {e}"),
        }
    }
}

impl std::error::Error for GraphCacheError {}

impl From<std::io::Error> for GraphCacheError {
    fn from(e: std::io::Error) -> Self {
        GraphCacheError::Io(e)
    }
}
