//! Format sniffing.
//!
//! Classifies a raw byte buffer's concrete format and sub-variant from
//! magic bytes or leading text, without parsing past the header. Never
//! inspects more than [`SNIFF_WINDOW`] bytes.

use byteorder::{ByteOrder, LittleEndian};

/// Maximum number of leading bytes a classification rule may inspect.
pub const SNIFF_WINDOW: usize = 16 * 1024;

/// NPY container magic.
pub const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Binary STL fixed sizes: 80-byte free-text header, u32 triangle count,
/// then 50 bytes per triangle.
pub const STL_HEADER_LEN: usize = 80;
pub const STL_RECORD_LEN: usize = 50;

/// Slack allowed in the binary STL size relation; some writers pad the
/// tail with a few bytes.
const STL_SIZE_TOLERANCE: usize = 4;

/// Concrete format of a classified buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatTag {
    Ply,
    StlBinary,
    StlAscii,
    Pcd,
    Obj,
    Off,
    Pfm,
    Npy,
    /// Permissive whitespace-delimited numeric table. Only ever assigned
    /// via the fallback path; no magic identifies it.
    Xyz,
}

impl FormatTag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ply => "ply",
            Self::StlBinary => "stl-binary",
            Self::StlAscii => "stl-ascii",
            Self::Pcd => "pcd",
            Self::Obj => "obj",
            Self::Off => "off",
            Self::Pfm => "pfm",
            Self::Npy => "npy",
            Self::Xyz => "xyz",
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FormatTag {
    /// Inverse of [`Self::as_str`], for tags carried over the wire.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ply" => Some(Self::Ply),
            "stl-binary" => Some(Self::StlBinary),
            "stl-ascii" => Some(Self::StlAscii),
            "pcd" => Some(Self::Pcd),
            "obj" => Some(Self::Obj),
            "off" => Some(Self::Off),
            "pfm" => Some(Self::Pfm),
            "npy" => Some(Self::Npy),
            "xyz" => Some(Self::Xyz),
            _ => None,
        }
    }
}

/// How sure the sniffer is about a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// A weaker structural or extension rule matched.
    Likely,
    /// A magic byte or size-relation rule matched.
    Certain,
}

/// Sniffer verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Detection {
    pub tag: FormatTag,
    pub confidence: Confidence,
}

impl Detection {
    const fn certain(tag: FormatTag) -> Self {
        Self { tag, confidence: Confidence::Certain }
    }

    const fn likely(tag: FormatTag) -> Self {
        Self { tag, confidence: Confidence::Likely }
    }
}

/// True when the buffer satisfies the binary STL size relation: a
/// trailer-derived record count combined with the fixed record size
/// reproduces the total length within a small tolerance. This is what
/// disambiguates a binary STL whose free-text header happens to start
/// with `solid`.
pub fn stl_binary_size_matches(bytes: &[u8]) -> bool {
    if bytes.len() < STL_HEADER_LEN + 4 {
        return false;
    }
    let count = LittleEndian::read_u32(&bytes[STL_HEADER_LEN..STL_HEADER_LEN + 4]) as usize;
    let Some(expected) = count
        .checked_mul(STL_RECORD_LEN)
        .and_then(|n| n.checked_add(STL_HEADER_LEN + 4))
    else {
        return false;
    };
    bytes.len() >= expected && bytes.len() - expected <= STL_SIZE_TOLERANCE
}

fn starts_with_keyword(window: &[u8], keyword: &[u8]) -> bool {
    let trimmed = skip_leading_whitespace(window);
    trimmed.starts_with(keyword)
        && trimmed
            .get(keyword.len())
            .is_none_or(|b| b.is_ascii_whitespace())
}

fn skip_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn looks_like_pcd(window: &[u8]) -> bool {
    let text = String::from_utf8_lossy(window);
    let mut has_fields = false;
    let mut has_data = false;
    for line in text.lines().take(64) {
        let keyword = line.split_whitespace().next().unwrap_or("");
        match keyword {
            "FIELDS" => has_fields = true,
            "DATA" => has_data = true,
            _ => {}
        }
        if line.starts_with("# .PCD") {
            return true;
        }
    }
    has_fields && has_data
}

fn looks_like_obj(window: &[u8]) -> bool {
    let text = String::from_utf8_lossy(window);
    let mut geometry_lines = 0;
    for line in text.lines().take(64) {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.split_whitespace().next().unwrap_or("") {
            "v" | "vn" | "vt" | "f" | "mtllib" | "usemtl" | "o" | "g" | "s" => {
                geometry_lines += 1;
                if geometry_lines >= 2 {
                    return true;
                }
            }
            _ => return false,
        }
    }
    geometry_lines > 0
}

fn extension(file_name: &str) -> Option<String> {
    std::path::Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Classify a buffer. Returns `None` when no rule matches; the caller
/// decides whether to fall back to the permissive numeric-table grammar.
pub fn sniff(bytes: &[u8], file_name: Option<&str>) -> Option<Detection> {
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];

    if starts_with_keyword(window, b"ply") {
        return Some(Detection::certain(FormatTag::Ply));
    }
    if starts_with_keyword(window, b"OFF") {
        return Some(Detection::certain(FormatTag::Off));
    }
    if window.starts_with(NPY_MAGIC) {
        return Some(Detection::certain(FormatTag::Npy));
    }
    if window.len() >= 3
        && (window.starts_with(b"PF") || window.starts_with(b"Pf"))
        && window[2].is_ascii_whitespace()
    {
        return Some(Detection::certain(FormatTag::Pfm));
    }
    if looks_like_pcd(window) {
        return Some(Detection::certain(FormatTag::Pcd));
    }

    // STL: a `solid` prefix suggests the text variant, but a matching
    // binary size relation wins since binary headers are free text.
    let solid_prefix = starts_with_keyword(window, b"solid");
    if stl_binary_size_matches(bytes) {
        return Some(Detection::certain(FormatTag::StlBinary));
    }
    if solid_prefix {
        return Some(Detection::likely(FormatTag::StlAscii));
    }

    if looks_like_obj(window) {
        return Some(Detection::likely(FormatTag::Obj));
    }

    if let Some(ext) = file_name.and_then(extension) {
        match ext.as_str() {
            "obj" => return Some(Detection::likely(FormatTag::Obj)),
            "stl" => return Some(Detection::likely(FormatTag::StlAscii)),
            "xyz" | "pts" | "txt" => return Some(Detection::likely(FormatTag::Xyz)),
            _ => {}
        }
    }

    None
}
