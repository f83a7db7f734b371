//! Record layout planning.
//!
//! From the vertex element's property list this computes, once per parse,
//! the fixed per-record byte stride and a name/offset/type table with each
//! property resolved to a semantic slot. The hot decode loop then only
//! does array indexing, never string comparison.

use crate::util::{Error, Result, ScalarType};

use super::{ElementDecl, PropertyDecl};

/// Semantic destination of one declared property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Slot {
    X,
    Y,
    Z,
    Red,
    Green,
    Blue,
    Nx,
    Ny,
    Nz,
    /// Declared but not routed to a semantic buffer. Still addressable by
    /// name through the entry table.
    #[default]
    Unmapped,
}

impl Slot {
    /// Resolve a property name. The color synonyms cover the common
    /// exporter variants.
    pub fn for_name(name: &str) -> Self {
        match name {
            "x" => Self::X,
            "y" => Self::Y,
            "z" => Self::Z,
            "red" | "diffuse_red" | "r" => Self::Red,
            "green" | "diffuse_green" | "g" => Self::Green,
            "blue" | "diffuse_blue" | "b" => Self::Blue,
            "nx" => Self::Nx,
            "ny" => Self::Ny,
            "nz" => Self::Nz,
            _ => Self::Unmapped,
        }
    }

    /// Component index within the target buffer, if mapped.
    #[inline]
    pub const fn component(self) -> Option<usize> {
        match self {
            Self::X | Self::Red | Self::Nx => Some(0),
            Self::Y | Self::Green | Self::Ny => Some(1),
            Self::Z | Self::Blue | Self::Nz => Some(2),
            Self::Unmapped => None,
        }
    }

    #[inline]
    pub const fn is_color(self) -> bool {
        matches!(self, Self::Red | Self::Green | Self::Blue)
    }

    #[inline]
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Nx | Self::Ny | Self::Nz)
    }
}

/// One scalar property's place within a record.
#[derive(Clone, Debug)]
pub struct LayoutEntry {
    pub name: String,
    /// Byte offset from record start (binary payloads).
    pub offset: usize,
    pub ty: ScalarType,
    pub slot: Slot,
}

/// Fixed layout of a vertex-like record, derived once per parse.
#[derive(Clone, Debug, Default)]
pub struct VertexLayout {
    pub entries: Vec<LayoutEntry>,
    /// Total byte size of one record.
    pub stride: usize,
    pub has_colors: bool,
    pub has_normals: bool,
}

impl VertexLayout {
    /// Plan the layout for a vertex element.
    ///
    /// Stride is the sum of each scalar property's byte width in
    /// declaration order. List properties have no fixed width and are
    /// only meaningful on the face element; one on the vertex element
    /// would break the stride walk, so it is rejected up front.
    pub fn plan(element: &ElementDecl) -> Result<Self> {
        let mut layout = Self {
            entries: Vec::with_capacity(element.properties.len()),
            ..Self::default()
        };

        for prop in &element.properties {
            match prop {
                PropertyDecl::Scalar { name, ty } => {
                    let slot = Slot::for_name(name);
                    layout.has_colors |= slot.is_color();
                    layout.has_normals |= slot.is_normal();
                    layout.entries.push(LayoutEntry {
                        name: name.clone(),
                        offset: layout.stride,
                        ty: *ty,
                        slot,
                    });
                    layout.stride += ty.num_bytes();
                }
                PropertyDecl::List { name, .. } => {
                    return Err(Error::UnsupportedType(format!(
                        "list property '{}' on element '{}'",
                        name, element.name
                    )));
                }
            }
        }

        Ok(layout)
    }

    /// Look up an entry by declared property name.
    pub fn entry(&self, name: &str) -> Option<&LayoutEntry> {
        self.entries.iter().find(|e| e.name == name)
    }
}
