//! Row byte format.
//!
//! ```text
//! +----------------+------------------+------------------------+
//! | Null Bitmap    | Fixed-Size Data  | Variable-Size Data     |
//! | ceil(n/8) B    | declaration order| u16 length + bytes     |
//! +----------------+------------------+------------------------+
//! ```
//!
//! Bit `i % 8` of bitmap byte `i / 8` is set when column `i` is null. Null
//! fixed-size columns are written as zeros and null variable-size columns as
//! a zero length, so every row of a schema has the same fixed prefix.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::common::{DbError, Result};

use super::{Column, DataType, Schema, Value};

/// Encodes values according to `schema`.
///
/// Fails with `SchemaMismatch` on an arity mismatch, a null in a
/// non-nullable column, a value of the wrong type or a string that exceeds
/// its declared length.
pub fn encode_row(schema: &Schema, values: &[Value]) -> Result<Bytes> {
    if values.len() != schema.column_count() {
        return Err(DbError::SchemaMismatch(format!(
            "expected {} values, got {}",
            schema.column_count(),
            values.len()
        )));
    }

    let mut bitmap = vec![0u8; schema.null_bitmap_size()];
    let mut fixed = BytesMut::with_capacity(schema.fixed_size());
    let mut variable = BytesMut::new();

    for (i, (column, value)) in schema.columns().zip(values).enumerate() {
        if value.is_null() {
            if !column.is_nullable() {
                return Err(DbError::SchemaMismatch(format!(
                    "column {} is not nullable",
                    column.name()
                )));
            }
            bitmap[i / 8] |= 1 << (i % 8);
            match column.data_type().fixed_size() {
                Some(size) => fixed.put_bytes(0, size),
                None => variable.put_u16_le(0),
            }
            continue;
        }

        match (column.data_type(), value) {
            (DataType::Boolean, Value::Boolean(b)) => fixed.put_u8(u8::from(*b)),
            (DataType::Integer, Value::Integer(v)) => fixed.put_i64_le(*v),
            (DataType::Float, Value::Float(v)) => fixed.put_f64_le(*v),
            (DataType::Float, Value::Integer(v)) => fixed.put_f64_le(*v as f64),
            (DataType::Char(n), Value::String(s)) => {
                check_length(column, s, n)?;
                fixed.put_slice(s.as_bytes());
                fixed.put_bytes(b' ', n as usize - s.len());
            }
            (DataType::VarChar(n), Value::String(s)) => {
                check_length(column, s, n)?;
                variable.put_u16_le(s.len() as u16);
                variable.put_slice(s.as_bytes());
            }
            (data_type, value) => {
                return Err(DbError::SchemaMismatch(format!(
                    "column {} of type {} cannot hold {}",
                    column.name(),
                    data_type,
                    value
                )));
            }
        }
    }

    let mut out = BytesMut::with_capacity(bitmap.len() + fixed.len() + variable.len());
    out.put_slice(&bitmap);
    out.put(fixed);
    out.put(variable);
    Ok(out.freeze())
}

fn check_length(column: &Column, s: &str, max: u16) -> Result<()> {
    if s.len() > max as usize {
        return Err(DbError::SchemaMismatch(format!(
            "value of {} bytes exceeds {} for column {}",
            s.len(),
            column.data_type(),
            column.name()
        )));
    }
    Ok(())
}

/// Decodes bytes produced by [`encode_row`] with the same schema.
pub fn decode_row(schema: &Schema, data: &[u8]) -> Result<Vec<Value>> {
    let bitmap_size = schema.null_bitmap_size();
    if data.len() < bitmap_size + schema.fixed_size() {
        return Err(corrupt(format!(
            "{} bytes is shorter than the fixed prefix of {} bytes",
            data.len(),
            bitmap_size + schema.fixed_size()
        )));
    }

    let (bitmap, mut buf) = data.split_at(bitmap_size);
    let is_null = |i: usize| bitmap[i / 8] & (1 << (i % 8)) != 0;

    let mut values = vec![Value::Null; schema.column_count()];

    // Fixed-size columns first, in declaration order
    for (i, column) in schema.columns().enumerate() {
        let data_type = column.data_type();
        let Some(size) = data_type.fixed_size() else {
            continue;
        };
        if is_null(i) {
            buf.advance(size);
            continue;
        }
        values[i] = match data_type {
            DataType::Boolean => Value::Boolean(buf.get_u8() != 0),
            DataType::Integer => Value::Integer(buf.get_i64_le()),
            DataType::Float => Value::Float(buf.get_f64_le()),
            DataType::Char(_) => {
                let text = read_string(&buf[..size])?;
                buf.advance(size);
                Value::String(text.trim_end_matches(' ').to_string())
            }
            DataType::VarChar(_) => continue,
        };
    }

    // Then the variable-size ones
    for (i, column) in schema.columns().enumerate() {
        if column.data_type().is_fixed_size() {
            continue;
        }
        if buf.remaining() < 2 {
            return Err(corrupt(format!("missing length of column {}", column.name())));
        }
        let len = buf.get_u16_le() as usize;
        if buf.remaining() < len {
            return Err(corrupt(format!(
                "column {} needs {} bytes, {} left",
                column.name(),
                len,
                buf.remaining()
            )));
        }
        if !is_null(i) {
            values[i] = Value::String(read_string(&buf[..len])?);
        }
        buf.advance(len);
    }

    if buf.has_remaining() {
        return Err(corrupt(format!("{} trailing bytes", buf.remaining())));
    }
    Ok(values)
}

fn read_string(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| corrupt(e.to_string()))
}

fn corrupt(message: String) -> DbError {
    DbError::CorruptTuple(message)
}
