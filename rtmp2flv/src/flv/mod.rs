//! Emission of the FLV container byte layout.

mod writer;

pub use self::writer::{FlvWriter, TAG_HEADER_LEN};
