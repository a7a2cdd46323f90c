pub mod decode;
pub mod error;
pub mod parser;
pub mod producer;
pub mod version;

pub use decode::decode_field;
pub use error::DumpError;
pub use parser::{parse_dump, read_dump_file};
pub use producer::{DumpFile, Dumper, PgDumpProducer};
pub use version::backup_versions;
