pub mod shell;
pub mod tokenize;

pub use shell::statements;
pub use tokenize::{path_like, split_assignment, split_redirect, tokenize};
