//! Field layout tables.
//!
//! A [`FieldLayout`] describes, for one message type, where each fixed-size
//! field lives in the initial frame and in which order the variable-length
//! fields follow. Layouts are plain `'static` data: both ends of a connection
//! must agree on the mandatory prefix, so the tables are the contract and the
//! codecs merely follow them.

use crate::error::ProtocolError;
use crate::fixed::{BOOLEAN_SIZE, BYTE_SIZE, INT_SIZE, LONG_SIZE, UUID_SIZE};
use crate::message::{REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};
use serde::Serialize;

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Byte,
    Boolean,
    Int,
    Long,
    Uuid,
    String,
    Data,
    List,
    Nested,
}

impl FieldKind {
    /// Wire width of a fixed-size kind; `0` for variable-length kinds.
    pub const fn width(self) -> usize {
        match self {
            FieldKind::Byte => BYTE_SIZE,
            FieldKind::Boolean => BOOLEAN_SIZE,
            FieldKind::Int => INT_SIZE,
            FieldKind::Long => LONG_SIZE,
            FieldKind::Uuid => UUID_SIZE,
            FieldKind::String | FieldKind::Data | FieldKind::List | FieldKind::Nested => 0,
        }
    }

    pub const fn is_fixed(self) -> bool {
        self.width() > 0
    }
}

/// Whether a layout describes a request or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Request,
    Response,
}

/// A fixed-size field in the initial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FixedField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub offset: usize,
    /// Added after the message type's first released version. Decoders must
    /// check the frame length before reading it.
    pub optional: bool,
}

impl FixedField {
    pub const fn mandatory(name: &'static str, kind: FieldKind, offset: usize) -> Self {
        Self {
            name,
            kind,
            offset,
            optional: false,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind, offset: usize) -> Self {
        Self {
            name,
            kind,
            offset,
            optional: true,
        }
    }

    pub const fn width(&self) -> usize {
        self.kind.width()
    }

    /// Offset of the first byte after this field.
    pub const fn end(&self) -> usize {
        self.offset + self.kind.width()
    }
}

/// A variable-length field carried in frames after the initial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VarField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl VarField {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }
}

/// Byte layout of one message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldLayout {
    pub message_type: i32,
    pub role: Role,
    pub fixed: &'static [FixedField],
    pub variable: &'static [VarField],
}

impl FieldLayout {
    /// Size of the reserved prefix for this layout's role.
    pub const fn header_size(&self) -> usize {
        match self.role {
            Role::Request => REQUEST_HEADER_SIZE,
            Role::Response => RESPONSE_HEADER_SIZE,
        }
    }

    /// Size of the initial frame this version writes: the header plus every
    /// fixed field it knows, optional ones included.
    pub const fn initial_frame_size(&self) -> usize {
        let mut size = self.header_size();
        let mut i = 0;
        while i < self.fixed.len() {
            let end = self.fixed[i].end();
            if end > size {
                size = end;
            }
            i += 1;
        }
        size
    }

    /// Minimum initial frame length a decoder accepts: the end of the last
    /// mandatory field.
    pub const fn mandatory_size(&self) -> usize {
        let mut size = self.header_size();
        let mut i = 0;
        while i < self.fixed.len() {
            let field = &self.fixed[i];
            if !field.optional && field.end() > size {
                size = field.end();
            }
            i += 1;
        }
        size
    }

    pub fn field(&self, name: &str) -> Option<&FixedField> {
        self.fixed.iter().find(|f| f.name == name)
    }

    /// Returns whether `field` was written into `content`.
    pub fn is_present(&self, field: &FixedField, content: &[u8]) -> bool {
        content.len() >= field.end()
    }

    /// Checks the table: fields start right after the header, are contiguous,
    /// are all fixed-size, and optional fields only follow mandatory ones.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let invalid = |reason: &'static str| ProtocolError::InvalidLayout {
            message_type: self.message_type,
            reason,
        };

        let mut expected = self.header_size();
        let mut seen_optional = false;
        for field in self.fixed {
            if !field.kind.is_fixed() {
                return Err(invalid("variable-length kind in fixed section"));
            }
            if field.offset != expected {
                return Err(invalid("fixed fields are not contiguous"));
            }
            if seen_optional && !field.optional {
                return Err(invalid("mandatory field after optional field"));
            }
            seen_optional |= field.optional;
            expected = field.end();
        }

        if self.variable.iter().any(|f| f.kind.is_fixed()) {
            return Err(invalid("fixed-size kind in variable section"));
        }
        Ok(())
    }
}
