use std::fmt;

/// Column types supported by the row codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Boolean type: 1 byte (0 = false, 1 = true)
    Boolean,

    /// 64-bit signed integer: 8 bytes, little-endian
    Integer,

    /// 64-bit floating point: 8 bytes, IEEE 754
    Float,

    /// Fixed-length character string: exactly n bytes, space-padded
    Char(u16),

    /// Variable-length character string: up to n bytes
    /// Stored as: length (2 bytes) + data (variable)
    VarChar(u16),
}

impl DataType {
    /// Returns true if this type has a fixed size in bytes.
    pub fn is_fixed_size(&self) -> bool {
        self.fixed_size().is_some()
    }

    /// Returns the fixed size in bytes, or None for variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            DataType::Boolean => Some(1),
            DataType::Integer | DataType::Float => Some(8),
            DataType::Char(n) => Some(*n as usize),
            DataType::VarChar(_) => None,
        }
    }

    /// Returns the maximum encoded size, length prefix included.
    pub fn max_size(&self) -> usize {
        match self {
            DataType::VarChar(n) => 2 + *n as usize,
            other => other.fixed_size().unwrap_or(0),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
            DataType::VarChar(n) => write!(f, "VARCHAR({})", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DataType::Boolean.fixed_size(), Some(1));
        assert_eq!(DataType::Integer.fixed_size(), Some(8));
        assert_eq!(DataType::Char(5).fixed_size(), Some(5));
        assert_eq!(DataType::VarChar(10).fixed_size(), None);
        assert_eq!(DataType::VarChar(10).max_size(), 12);
        assert!(!DataType::VarChar(1).is_fixed_size());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataType::VarChar(32).to_string(), "VARCHAR(32)");
        assert_eq!(DataType::Float.to_string(), "FLOAT");
    }
}
