//! Float16 weight folding.
//!
//! TensorFlow's float16 post-training quantization stores every weight as a
//! FLOAT16 constant feeding a `DEQUANTIZE` op. tract has no `DEQUANTIZE`, so
//! the flatbuffer is patched before tract reads it: the constant is widened
//! into a FLOAT32 buffer appended to the file, the op's consumers read the
//! constant directly, and the op is dropped from the operator list.
//!
//! Offsets in a flatbuffer only point forward, so the rewrite never moves an
//! existing table; it only overwrites scalars and offsets in place and
//! appends new vectors past the end.

use std::collections::{HashMap, HashSet};

use flatbuffers::{Table, VOffsetT};
use gv_core::{Error, Result};
use tract_core::prelude::f16;
use tract_tflite::tflite as schema;
use tracing::debug;

use schema::{BuiltinOperator, TensorType};

/// Returns the patched model, or `None` when it holds no float16 `DEQUANTIZE`.
pub fn fold_fp16_dequantize(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
    let model = schema::root_as_model(bytes)
        .map_err(|e| Error::ModelLoad(format!("not a TFLite flatbuffer: {}", e)))?;
    let (Some(codes), Some(buffers), Some(subgraphs)) =
        (model.operator_codes(), model.buffers(), model.subgraphs())
    else {
        return Ok(None);
    };

    let dequantize: HashSet<u32> = codes
        .iter()
        .enumerate()
        .filter(|(_, code)| {
            let builtin = if code.deprecated_builtin_code() as i32
                == BuiltinOperator::PLACEHOLDER_FOR_GREATER_OP_CODES.0
            {
                code.builtin_code()
            } else {
                BuiltinOperator(code.deprecated_builtin_code() as i32)
            };
            builtin == BuiltinOperator::DEQUANTIZE
        })
        .map(|(ix, _)| ix as u32)
        .collect();
    if dequantize.is_empty() {
        return Ok(None);
    }

    let mut out = bytes.to_vec();
    let mut widened = HashSet::new();
    let mut folded = 0;

    for subgraph in subgraphs.iter() {
        let (Some(tensors), Some(operators)) = (subgraph.tensors(), subgraph.operators()) else {
            continue;
        };

        // dequantized output -> float16 constant
        let mut renames: HashMap<i32, i32> = HashMap::new();
        let mut dropped = HashSet::new();

        for (position, op) in operators.iter().enumerate() {
            if !dequantize.contains(&op.opcode_index()) {
                continue;
            }
            let (Some(inputs), Some(outputs)) = (op.inputs(), op.outputs()) else {
                continue;
            };
            if inputs.len() != 1 || outputs.len() != 1 {
                continue;
            }
            let (src, dst) = (inputs.get(0), outputs.get(0));
            if src < 0 || src as usize >= tensors.len() {
                continue;
            }

            let tensor = tensors.get(src as usize);
            let buffer_ix = tensor.buffer();
            if tensor.type_() != TensorType::FLOAT16
                || buffer_ix == 0
                || buffer_ix as usize >= buffers.len()
            {
                continue;
            }
            let buffer = buffers.get(buffer_ix as usize);
            let Some(data) = buffer.data() else {
                continue;
            };

            if widened.insert(buffer_ix) {
                let field = field_pos(&buffer._tab, schema::Buffer::VT_DATA)
                    .ok_or_else(|| Error::ModelLoad("buffer data field missing".to_string()))?;
                append_vector(&mut out, field, &widen(data.bytes()))?;
            }
            let type_field = field_pos(&tensor._tab, schema::Tensor::VT_TYPE_)
                .ok_or_else(|| Error::ModelLoad("tensor type field missing".to_string()))?;
            out[type_field] = TensorType::FLOAT32.0 as u8;

            renames.insert(dst, src);
            dropped.insert(position);
        }

        if dropped.is_empty() {
            continue;
        }
        for op in operators.iter() {
            if let Some(field) = field_pos(&op._tab, schema::Operator::VT_INPUTS) {
                rename_indices(&mut out, field, &renames);
            }
        }
        if let Some(field) = field_pos(&subgraph._tab, schema::SubGraph::VT_OUTPUTS) {
            rename_indices(&mut out, field, &renames);
        }
        if let Some(field) = field_pos(&subgraph._tab, schema::SubGraph::VT_OPERATORS) {
            remove_entries(&mut out, field, &dropped);
        }
        folded += dropped.len();
    }

    if folded == 0 {
        return Ok(None);
    }
    debug!(
        "Folded {} float16 DEQUANTIZE ops ({} buffers widened)",
        folded,
        widened.len()
    );
    Ok(Some(out))
}

/// Absolute position of a table field, `None` when the field is absent.
fn field_pos(table: &Table<'_>, slot: VOffsetT) -> Option<usize> {
    match table.vtable().get(slot) {
        0 => None,
        offset => Some(table.loc() + offset as usize),
    }
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

fn write_u32(buf: &mut [u8], pos: usize, value: u32) {
    buf[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
}

/// Follows the offset stored in `field` to the vector's length prefix.
fn vector_at(buf: &[u8], field: usize) -> usize {
    field + read_u32(buf, field) as usize
}

fn rename_indices(buf: &mut [u8], field: usize, renames: &HashMap<i32, i32>) {
    let vector = vector_at(buf, field);
    let len = read_u32(buf, vector) as usize;
    for i in 0..len {
        let pos = vector + 4 + 4 * i;
        if let Some(src) = renames.get(&(read_u32(buf, pos) as i32)) {
            write_u32(buf, pos, *src as u32);
        }
    }
}

/// Compacts a vector of table offsets in place, skipping `dropped` positions.
/// Entries only move towards the front, so every offset stays forward.
fn remove_entries(buf: &mut [u8], field: usize, dropped: &HashSet<usize>) {
    let vector = vector_at(buf, field);
    let len = read_u32(buf, vector) as usize;
    let targets: Vec<usize> = (0..len)
        .filter(|i| !dropped.contains(i))
        .map(|i| {
            let pos = vector + 4 + 4 * i;
            pos + read_u32(buf, pos) as usize
        })
        .collect();

    write_u32(buf, vector, targets.len() as u32);
    for (i, target) in targets.into_iter().enumerate() {
        let pos = vector + 4 + 4 * i;
        write_u32(buf, pos, (target - pos) as u32);
    }
}

/// Appends a byte vector (payload 16-byte aligned) and points `field` at it.
fn append_vector(buf: &mut Vec<u8>, field: usize, data: &[u8]) -> Result<()> {
    while (buf.len() + 4) % 16 != 0 {
        buf.push(0);
    }
    let vector = buf.len();
    let len = u32::try_from(data.len())
        .map_err(|_| Error::ModelLoad("widened buffer exceeds 4 GiB".to_string()))?;
    let offset = u32::try_from(vector - field)
        .map_err(|_| Error::ModelLoad("model exceeds 4 GiB once widened".to_string()))?;

    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(data);
    write_u32(buf, field, offset);
    Ok(())
}

fn widen(half: &[u8]) -> Vec<u8> {
    half.chunks_exact(2)
        .flat_map(|pair| f16::from_bits(u16::from_le_bytes([pair[0], pair[1]])).to_f32().to_le_bytes())
        .collect()
}
