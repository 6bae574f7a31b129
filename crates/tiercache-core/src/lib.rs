pub mod codec;
pub mod error;
pub mod time;
pub mod ttl;
pub mod value;

pub use codec::{NAN_TOKEN, NULL_TOKEN, UNDEFINED_TOKEN, decode, encode};
pub use error::{CodecError, CoreError, Result};
pub use time::now_millis;
pub use ttl::{Ttl, TtlRange};
pub use value::{Object, Value};
