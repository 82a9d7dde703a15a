pub mod env;
pub mod parser;

pub use env::SessionEnv;
pub use parser::{parse_input, tokenize, Command, Pipeline};
