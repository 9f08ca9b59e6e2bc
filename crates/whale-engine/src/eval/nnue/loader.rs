//! Reader for the little-endian network file.
//!
//! Layout:
//! - header: `version: u32`, `hash: u32`, `arch_len: u32`, `arch_len` bytes
//!   of architecture text
//! - transformer: `hash: u32`, bias `i16 × 256`, weights `i16 × 41024 × 256`
//! - `network_hash: u32`
//! - hidden1, hidden2, output: bias `i32 × out`, then weights `i8 × in × out`

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::NnueError;

use super::features::NUM_FEATURES;
use super::network::{FeatureTransformer, HIDDEN, LAYER_SIZE, LinearLayer, Network};

const MAX_ARCHITECTURE_LEN: u32 = 1 << 16;

/// Metadata from the file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkHeader {
    pub version: u32,
    pub hash: u32,
    pub architecture: String,
}

/// Load a network file from disk.
pub fn load(path: impl AsRef<Path>) -> Result<Network, NnueError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let (header, network) = read_from(BufReader::new(file))?;
    debug!(
        path = %path.display(),
        version = header.version,
        hash = header.hash,
        architecture = %header.architecture,
        "network loaded"
    );
    Ok(network)
}

/// Parse a network from any byte source.
pub fn read_from<R: Read>(mut reader: R) -> Result<(NetworkHeader, Network), NnueError> {
    let header = read_header(&mut reader)?;

    let _transformer_hash = read_u32(&mut reader)?;
    let bias = read_i16s(&mut reader, HIDDEN)?;
    let weights = read_i16s(&mut reader, NUM_FEATURES * HIDDEN)?;
    let transformer = FeatureTransformer::new(bias, weights)?;

    let _network_hash = read_u32(&mut reader)?;
    let hidden1 = read_layer(&mut reader, 2 * HIDDEN, LAYER_SIZE)?;
    let hidden2 = read_layer(&mut reader, LAYER_SIZE, LAYER_SIZE)?;
    let output = read_layer(&mut reader, LAYER_SIZE, 1)?;

    Ok((header, Network::new(transformer, hidden1, hidden2, output)?))
}

fn read_header<R: Read>(reader: &mut R) -> Result<NetworkHeader, NnueError> {
    let version = read_u32(reader)?;
    let hash = read_u32(reader)?;
    let len = read_u32(reader)?;
    if len > MAX_ARCHITECTURE_LEN {
        return Err(NnueError::ArchitectureTooLong(len));
    }
    let mut text = vec![0u8; len as usize];
    reader.read_exact(&mut text)?;
    Ok(NetworkHeader {
        version,
        hash,
        architecture: String::from_utf8_lossy(&text).into_owned(),
    })
}

fn read_layer<R: Read>(reader: &mut R, inputs: usize, outputs: usize) -> Result<LinearLayer, NnueError> {
    let bias = read_i32s(reader, outputs)?;
    let mut raw = vec![0u8; inputs * outputs];
    reader.read_exact(&mut raw)?;
    let weights = raw.into_iter().map(|b| b as i8).collect();
    LinearLayer::new(inputs, outputs, bias, weights)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, NnueError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i16s<R: Read>(reader: &mut R, count: usize) -> Result<Vec<i16>, NnueError> {
    let mut buf = vec![0u8; count * 2];
    reader.read_exact(&mut buf)?;
    Ok(buf
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

fn read_i32s<R: Read>(reader: &mut R, count: usize) -> Result<Vec<i32>, NnueError> {
    let mut buf = vec![0u8; count * 4];
    reader.read_exact(&mut buf)?;
    Ok(buf
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
