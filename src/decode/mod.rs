//! Record decoders.
//!
//! [`binary`] walks raw bytes with a precomputed layout table; [`ascii`]
//! consumes tokenized text. Both populate the same columnar
//! [`GeometryDataset`](crate::geom::GeometryDataset) with no per-record
//! allocation, routing each property value through its precomputed slot.

pub mod ascii;
pub mod binary;

use crate::geom::GeometryDataset;
use crate::header::{HeaderEncoding, LayoutEntry, Slot};
use crate::util::ScalarType;

/// Byte order of a binary data section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// The endianness a header encoding implies, if binary.
    pub fn from_encoding(encoding: HeaderEncoding) -> Option<Self> {
        match encoding {
            HeaderEncoding::Ascii => None,
            HeaderEncoding::BinaryLittleEndian => Some(Self::Little),
            HeaderEncoding::BinaryBigEndian => Some(Self::Big),
        }
    }
}

/// Shape of the face element's single list property.
#[derive(Clone, Copy, Debug)]
pub struct FaceListDecl {
    /// Declared face record count.
    pub count: usize,
    pub count_ty: ScalarType,
    pub item_ty: ScalarType,
}

/// Clamp a decoded color component into a byte. Float-typed color
/// properties carry [0,1] and scale by 255; integer-typed ones clamp
/// directly.
#[inline]
pub(crate) fn color_byte(value: f64, from_float: bool) -> u8 {
    let scaled = if from_float { value * 255.0 } else { value };
    scaled.round().clamp(0.0, 255.0) as u8
}

/// Route one decoded value into the dataset buffer its slot points at.
/// `record * 3 + component` indexing; unmapped slots are dropped here and
/// stay addressable only through the layout table.
#[inline]
pub(crate) fn store_component(
    dataset: &mut GeometryDataset,
    record: usize,
    entry: &LayoutEntry,
    value: f64,
) {
    let Some(component) = entry.slot.component() else {
        return;
    };
    let at = record * 3 + component;
    match entry.slot {
        Slot::X | Slot::Y | Slot::Z => dataset.positions[at] = value as f32,
        slot if slot.is_color() => {
            if let Some(colors) = dataset.colors.as_mut() {
                colors[at] = color_byte(value, entry.ty.is_float());
            }
        }
        _ => {
            if let Some(normals) = dataset.normals.as_mut() {
                normals[at] = value as f32;
            }
        }
    }
}
