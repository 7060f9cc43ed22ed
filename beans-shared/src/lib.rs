pub mod money;
pub mod pii;

pub use money::format_rupiah;
pub use pii::Masked;
