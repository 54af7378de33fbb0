//! Network Serialization
//!
//! A network is stored as a self-describing, versioned binary descriptor:
//!
//! ```text
//! offset  size          field
//! 0       8             magic b"SYNAPSES"
//! 8       4             format version (u32 LE), currently 1
//! 12      4             topology length T (u32 LE)
//! 16      T             topology, UTF-8 JSON:
//!                       {"input_dim":2,"layers":[{"out_dim":2,"activation":"sigmoid","params":[]},...]}
//! 16+T    8             weight count N (u64 LE)
//! 24+T    8·N           f64 LE values
//! ```
//!
//! Values are written layer by layer: the weight matrix row by row (a row
//! holds the weights of one output unit, one column per input unit), then
//! the bias vector.
//!
//! Decoding is all-or-nothing. Any inconsistency yields [`Error::Format`]
//! and no network.
//!
//! A nested JSON form ([`to_json`] / [`from_json`]) is provided for human
//! inspection; it goes through the same validation.

use crate::error::{Error, Result};
use crate::layers::{ActivationFunction, DenseLayer};
use crate::network::Network;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::debug;

/// Leading bytes of every descriptor
pub const MAGIC: &[u8; 8] = b"SYNAPSES";

/// Version written by [`serialize`]
pub const FORMAT_VERSION: u32 = 1;

/// Topology header stored in front of the weights
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub input_dim: usize,
    pub layers: Vec<LayerTopology>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerTopology {
    pub out_dim: usize,
    pub activation: String,
    #[serde(default)]
    pub params: Vec<f64>,
}

impl Topology {
    /// Topology of an existing network, without its values
    pub fn of(network: &Network) -> Self {
        Self {
            input_dim: network.input_dim(),
            layers: network
                .layers()
                .iter()
                .map(|l| LayerTopology {
                    out_dim: l.out_dim(),
                    activation: l.activation().name().to_string(),
                    params: l.activation().parameters(),
                })
                .collect(),
        }
    }

    /// Number of stored values: `out·in + out` per layer
    ///
    /// `None` on arithmetic overflow, which only a corrupt header produces.
    pub fn weight_count(&self) -> Option<usize> {
        let mut in_dim = self.input_dim;
        let mut total = 0usize;
        for layer in &self.layers {
            let per_layer = layer.out_dim.checked_mul(in_dim)?.checked_add(layer.out_dim)?;
            total = total.checked_add(per_layer)?;
            in_dim = layer.out_dim;
        }
        Some(total)
    }

    fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(Error::format("input_dim must be > 0"));
        }
        if self.layers.is_empty() {
            return Err(Error::format("descriptor has no layers"));
        }
        if let Some(i) = self.layers.iter().position(|l| l.out_dim == 0) {
            return Err(Error::format(format!("layer {i} has out_dim 0")));
        }
        Ok(())
    }

    fn activations(&self) -> Result<Vec<ActivationFunction>> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| {
                ActivationFunction::from_parts(&l.activation, &l.params)
                    .map_err(|e| Error::format(format!("layer {i} activation: {e}")))
            })
            .collect()
    }
}

/// Encode a network as a binary descriptor
///
/// # Returns
///
/// The descriptor bytes, or [`Error::Format`] if the topology header could
/// not be encoded.
///
/// # Example
///
/// ```rust
/// # use synapses::{create_network, deserialize, serialize};
/// let net = create_network(2, &[(3, "tanh"), (1, "sigmoid")], 7)?;
/// let bytes = serialize(&net)?;
/// assert_eq!(deserialize(&bytes)?, net);
/// # Ok::<(), synapses::Error>(())
/// ```
pub fn serialize(network: &Network) -> Result<Vec<u8>> {
    let topology = serde_json::to_vec(&Topology::of(network))
        .map_err(|e| Error::format(format!("cannot encode topology: {e}")))?;
    let topology_len = u32::try_from(topology.len())
        .map_err(|_| Error::format("topology header exceeds 4 GiB"))?;
    let weight_count = network.num_parameters();

    let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + 4 + topology.len() + 8 + weight_count * 8);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&topology_len.to_le_bytes());
    bytes.extend_from_slice(&topology);
    bytes.extend_from_slice(&(weight_count as u64).to_le_bytes());
    for layer in network.layers() {
        for &w in layer.weights().data.iter().chain(&layer.bias().data) {
            bytes.extend_from_slice(&w.to_le_bytes());
        }
    }

    debug!(
        layers = network.layers().len(),
        weights = weight_count,
        bytes = bytes.len(),
        "network serialized"
    );
    Ok(bytes)
}

/// Decode a binary descriptor produced by [`serialize`]
pub fn deserialize(bytes: &[u8]) -> Result<Network> {
    let mut reader = Cursor::new(bytes);

    let mut magic = [0u8; 8];
    read_exact(&mut reader, &mut magic, "magic")?;
    if &magic != MAGIC {
        return Err(Error::format("invalid header, expected SYNAPSES"));
    }

    let version = read_u32(&mut reader, "version")?;
    if version != FORMAT_VERSION {
        return Err(Error::format(format!("unsupported format version: {version}")));
    }

    let topology_len = read_u32(&mut reader, "topology length")? as usize;
    if topology_len > remaining(&reader) {
        return Err(Error::format("truncated descriptor: topology"));
    }
    let mut topology_bytes = vec![0u8; topology_len];
    read_exact(&mut reader, &mut topology_bytes, "topology")?;
    let topology: Topology = serde_json::from_slice(&topology_bytes)
        .map_err(|e| Error::format(format!("invalid topology: {e}")))?;
    topology.validate()?;
    let activations = topology.activations()?;

    let declared = read_u64(&mut reader, "weight count")?;
    let expected = topology
        .weight_count()
        .ok_or_else(|| Error::format("topology too large"))?;
    if declared != expected as u64 {
        return Err(Error::format(format!(
            "weight count {declared} does not match topology ({expected})"
        )));
    }
    let needed = expected
        .checked_mul(8)
        .ok_or_else(|| Error::format("topology too large"))?;
    match remaining(&reader).cmp(&needed) {
        std::cmp::Ordering::Less => return Err(Error::format("truncated descriptor: weights")),
        std::cmp::Ordering::Greater => {
            return Err(Error::format(format!(
                "{} trailing bytes after weights",
                remaining(&reader) - needed
            )))
        }
        std::cmp::Ordering::Equal => {}
    }

    let mut values = Vec::with_capacity(expected);
    let mut buf = [0u8; 8];
    for _ in 0..expected {
        read_exact(&mut reader, &mut buf, "weights")?;
        values.push(f64::from_le_bytes(buf));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::format(format!("non-finite value at weight index {i}")));
    }

    let network = assemble(&topology, &activations, &values)?;
    debug!(layers = network.layers().len(), weights = expected, "network deserialized");
    Ok(network)
}

/// Write the binary descriptor to `path`
pub fn save_to_file<P: AsRef<Path>>(network: &Network, path: P) -> Result<()> {
    fs::write(path, serialize(network)?)?;
    Ok(())
}

/// Read a binary descriptor from `path`
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Network> {
    let bytes = fs::read(path)?;
    deserialize(&bytes)
}

#[derive(Serialize, Deserialize)]
struct JsonNetwork {
    version: u32,
    input_dim: usize,
    layers: Vec<JsonLayer>,
}

#[derive(Serialize, Deserialize)]
struct JsonLayer {
    activation: String,
    #[serde(default)]
    params: Vec<f64>,
    /// One inner array per output unit
    weights: Vec<Vec<f64>>,
    bias: Vec<f64>,
}

/// Export a network as pretty-printed JSON with nested weight arrays
pub fn to_json(network: &Network) -> Result<String> {
    let doc = JsonNetwork {
        version: FORMAT_VERSION,
        input_dim: network.input_dim(),
        layers: network
            .layers()
            .iter()
            .map(|l| JsonLayer {
                activation: l.activation().name().to_string(),
                params: l.activation().parameters(),
                weights: (0..l.out_dim()).map(|r| l.weights().row(r).to_vec()).collect(),
                bias: l.bias().data.clone(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&doc).map_err(|e| Error::format(e.to_string()))
}

/// Import a network from the JSON produced by [`to_json`]
pub fn from_json(json: &str) -> Result<Network> {
    let doc: JsonNetwork =
        serde_json::from_str(json).map_err(|e| Error::format(format!("invalid JSON: {e}")))?;
    if doc.version != FORMAT_VERSION {
        return Err(Error::format(format!("unsupported format version: {}", doc.version)));
    }

    let topology = Topology {
        input_dim: doc.input_dim,
        layers: doc
            .layers
            .iter()
            .map(|l| LayerTopology {
                out_dim: l.bias.len(),
                activation: l.activation.clone(),
                params: l.params.clone(),
            })
            .collect(),
    };
    topology.validate()?;
    let activations = topology.activations()?;

    let expected = topology
        .weight_count()
        .ok_or_else(|| Error::format("topology too large"))?;
    let mut values: Vec<f64> = Vec::with_capacity(expected);
    let mut in_dim = doc.input_dim;
    for (i, layer) in doc.layers.iter().enumerate() {
        if layer.weights.len() != layer.bias.len() {
            return Err(Error::format(format!(
                "layer {i}: {} weight rows for {} biases",
                layer.weights.len(),
                layer.bias.len()
            )));
        }
        if let Some(r) = layer.weights.iter().position(|row| row.len() != in_dim) {
            return Err(Error::format(format!(
                "layer {i} row {r}: expected {in_dim} weights"
            )));
        }
        values.extend(layer.weights.iter().flatten().copied());
        values.extend(layer.bias.iter().copied());
        in_dim = layer.bias.len();
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(Error::format("non-finite weight value"));
    }

    assemble(&topology, &activations, &values)
}

fn assemble(topology: &Topology, activations: &[ActivationFunction], values: &[f64]) -> Result<Network> {
    let mut layers = Vec::with_capacity(topology.layers.len());
    let mut offset = 0;
    let mut in_dim = topology.input_dim;
    for (layer, &activation) in topology.layers.iter().zip(activations) {
        let n_weights = layer.out_dim * in_dim;
        let weight = values
            .get(offset..offset + n_weights)
            .and_then(|w| Tensor::from_vec(w.to_vec(), vec![layer.out_dim, in_dim]))
            .ok_or_else(|| Error::format("weight section shorter than topology"))?;
        offset += n_weights;
        let bias = values
            .get(offset..offset + layer.out_dim)
            .and_then(|b| Tensor::from_vec(b.to_vec(), vec![layer.out_dim]))
            .ok_or_else(|| Error::format("weight section shorter than topology"))?;
        offset += layer.out_dim;

        layers.push(
            DenseLayer::from_parts(weight, bias, activation)
                .map_err(|e| Error::format(e.to_string()))?,
        );
        in_dim = layer.out_dim;
    }
    Network::from_layers(topology.input_dim, layers).map_err(|e| Error::format(e.to_string()))
}

fn remaining(reader: &Cursor<&[u8]>) -> usize {
    reader.get_ref().len().saturating_sub(reader.position() as usize)
}

fn read_exact(reader: &mut Cursor<&[u8]>, buf: &mut [u8], what: &str) -> Result<()> {
    reader
        .read_exact(buf)
        .map_err(|_| Error::format(format!("truncated descriptor: {what}")))
}

fn read_u32(reader: &mut Cursor<&[u8]>, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut Cursor<&[u8]>, what: &str) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact(reader, &mut buf, what)?;
    Ok(u64::from_le_bytes(buf))
}
