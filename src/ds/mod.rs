pub mod fanout;
pub mod shard;

pub use fanout::fan_out;
pub use shard::ShardSelector;
