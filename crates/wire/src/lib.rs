pub mod address;
pub mod codec;
pub mod digest;
pub mod logging;

pub use address::{AddressError, ShardAddress};
pub use codec::{CodecError, Opcode, Request};
pub use digest::{Digest, DigestError};
